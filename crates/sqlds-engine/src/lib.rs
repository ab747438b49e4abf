//! # sqlds-engine
//!
//! Executes DataSource requests against SQL databases.
//!
//! [`SqlDataSourceEngine::handle`] is the single entry point: it takes a
//! [`Request`](sqlds_core::Request), compiles it with `sqlds-query`, runs it
//! through an injected [`ConnectionProvider`](sqlds_storage::ConnectionProvider)
//! and returns a [`Response`](sqlds_core::Response). Failures become failure
//! responses; `handle` never returns an error and never panics on bad input.
//!
//! ```ignore
//! use std::sync::Arc;
//! use sqlds_core::{DataSourceRegistry, Request};
//! use sqlds_engine::SqlDataSourceEngine;
//!
//! let engine = SqlDataSourceEngine::new(Arc::new(registry), provider);
//! let response = engine.handle(Request::fetch("EmployeeDS").with_range(0, 50)).await;
//! ```
//!
//! DataSources whose `serverType` is not `sql` are dispatched to a
//! [`DataSourceHandler`] registered for their id.

mod config;
mod engine;
mod error;
mod fetch;
mod handler;
mod mutation;

pub use config::EngineConfig;
pub use engine::SqlDataSourceEngine;
pub use error::{EngineError, ErrorCategory};
pub use handler::{DataSourceHandler, DynHandler};
