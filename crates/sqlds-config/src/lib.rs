//! Application wiring for sqlds.
//!
//! - [`config`]: `AppConfig`, loaded from `sqlds.toml` and `SQLDS__` environment overrides
//! - [`observability`]: tracing subscriber with a reloadable level
//! - [`bootstrap`]: connection providers and the engine built from an `AppConfig`

pub mod bootstrap;
pub mod config;
mod error;
pub mod observability;

pub use bootstrap::{build_engine, build_provider};
pub use config::{AppConfig, Backend, DatabaseConfig, LoggingConfig, load_config};
pub use error::{ConfigError, Result};
