//! Connection pool management for the SQLite provider.

use std::str::FromStr;
use std::time::Duration;

use sqlx_core::pool::PoolOptions;
use sqlx_sqlite::{Sqlite, SqliteConnectOptions, SqliteJournalMode, SqlitePool};
use tracing::{debug, info, instrument};

use crate::config::SqliteConfig;
use crate::error::{Result, SqliteError};

/// Creates a new SQLite connection pool from the given configuration.
#[instrument(skip(config), fields(url = %config.url))]
pub async fn create_pool(config: &SqliteConfig) -> Result<SqlitePool> {
    info!(
        pool_size = config.pool_size,
        wal = config.wal,
        "Opening SQLite database"
    );

    if config.pool_size == 0 {
        return Err(SqliteError::config("pool_size must be at least 1"));
    }

    let journal_mode = if config.wal {
        SqliteJournalMode::Wal
    } else {
        SqliteJournalMode::Delete
    };
    let connect = SqliteConnectOptions::from_str(&config.url)
        .map_err(|e| SqliteError::config(format!("invalid url: {e}")))?
        .create_if_missing(config.create_if_missing)
        .journal_mode(journal_mode)
        .foreign_keys(config.foreign_keys)
        .busy_timeout(Duration::from_millis(config.busy_timeout_ms));

    let pool = PoolOptions::<Sqlite>::new()
        .max_connections(config.pool_size)
        .acquire_timeout(Duration::from_millis(config.connect_timeout_ms))
        .connect_with(connect)
        .await?;

    debug!("SQLite pool created successfully");

    Ok(pool)
}
