//! SQLite connection provider for sqlds.
//!
//! Implements the `sqlds-storage` traits on `sqlx-sqlite`. SQLite accepts `?`
//! placeholders natively, so statements are executed as built.
//!
//! Dates and times are stored as ISO-8601 text; booleans as 0/1. Values are
//! decoded by their runtime storage class and converted to the declared field
//! type by the engine.
//!
//! ```ignore
//! use sqlds_db_sqlite::{SqliteConfig, SqliteProvider};
//!
//! let provider = SqliteProvider::new(SqliteConfig::new("sqlite://hr.db")).await?;
//! ```

mod config;
mod error;
mod pool;
mod session;

pub use config::SqliteConfig;
pub use error::{Result, SqliteError};
pub use pool::create_pool;
pub use session::{SqliteProvider, SqliteSession};

pub use sqlds_storage::{ConnectionProvider, SqlSession, StorageError};

/// Creates a shareable provider from the given configuration.
///
/// # Errors
///
/// Returns an error if the database cannot be opened.
pub async fn create_provider(
    config: SqliteConfig,
) -> std::result::Result<sqlds_storage::DynProvider, StorageError> {
    let provider = SqliteProvider::new(config).await?;
    Ok(std::sync::Arc::new(provider))
}
