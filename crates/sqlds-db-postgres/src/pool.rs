//! Pool setup for one configured PostgreSQL database.
//!
//! Every engine request holds at most one connection at a time: a FETCH
//! returns its connection before nested sub-entity fetches start, and a write
//! keeps a single connection for its statement, verification fetch and
//! commit. `pool_size` is therefore the number of requests that can touch the
//! database concurrently.

use std::str::FromStr;
use std::time::Duration;

use sqlx_core::pool::PoolOptions;
use sqlx_postgres::{PgConnectOptions, PgPool, Postgres};
use tracing::{debug, info, instrument};

use crate::config::PostgresConfig;
use crate::error::{PostgresError, Result};

/// Shown in `pg_stat_activity.application_name` for engine sessions.
const APPLICATION_NAME: &str = "sqlds";

const DEFAULT_MAX_LIFETIME_SECS: u64 = 1800;

/// Opens the pool for one database.
///
/// A statement timeout, when configured, is set per connection so a runaway
/// FETCH surfaces as an execution error instead of holding its connection.
#[instrument(
    skip(config),
    fields(backend = "postgres", database = %database_name(&config.url), url = %mask_password(&config.url))
)]
pub async fn create_pool(config: &PostgresConfig) -> Result<PgPool> {
    if config.pool_size == 0 {
        return Err(PostgresError::config("pool_size must be at least 1"));
    }

    let min_connections = config
        .min_connections
        .unwrap_or(config.pool_size / 4)
        .clamp(1, config.pool_size);

    let mut connect = PgConnectOptions::from_str(&config.url)
        .map_err(|e| PostgresError::config(format!("invalid url: {e}")))?
        .application_name(APPLICATION_NAME);
    if let Some(timeout) = config.statement_timeout_ms {
        connect = connect.options([("statement_timeout", timeout.to_string())]);
    }

    let mut options = PoolOptions::<Postgres>::new()
        .max_connections(config.pool_size)
        .min_connections(min_connections)
        .acquire_timeout(Duration::from_millis(config.connect_timeout_ms))
        .max_lifetime(Duration::from_secs(
            config.max_lifetime_secs.unwrap_or(DEFAULT_MAX_LIFETIME_SECS),
        ))
        .test_before_acquire(false);
    if let Some(idle_timeout) = config.idle_timeout_ms {
        options = options.idle_timeout(Duration::from_millis(idle_timeout));
    }

    let pool = options.connect_with(connect).await?;

    info!(
        max_connections = config.pool_size,
        min_connections,
        acquire_timeout_ms = config.connect_timeout_ms,
        statement_timeout_ms = ?config.statement_timeout_ms,
        "PostgreSQL pool ready"
    );
    debug!(idle = pool.num_idle(), "Initial connections opened");

    Ok(pool)
}

/// Database part of a connection URL, for log fields.
pub(crate) fn database_name(url: &str) -> &str {
    let without_scheme = url.split_once("://").map_or(url, |(_, rest)| rest);
    without_scheme
        .split_once('/')
        .map(|(_, path)| path.split(['?', '#']).next().unwrap_or_default())
        .filter(|name| !name.is_empty())
        .unwrap_or("<default>")
}

/// Masks the password in a database URL for logging.
pub(crate) fn mask_password(url: &str) -> String {
    if let Some(at_pos) = url.find('@')
        && let Some(colon_pos) = url[..at_pos].rfind(':')
    {
        let scheme_end = url.find("://").map(|p| p + 3).unwrap_or(0);
        if colon_pos > scheme_end {
            return format!("{}:****{}", &url[..colon_pos], &url[at_pos..]);
        }
    }
    url.to_string()
}
