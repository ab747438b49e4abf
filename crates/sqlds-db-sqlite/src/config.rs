//! Configuration types for the SQLite provider.

use serde::{Deserialize, Serialize};

/// Configuration for the SQLite provider.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct SqliteConfig {
    /// Database URL: `sqlite://path/to/file.db`
    pub url: String,

    /// Connection pool size.
    pub pool_size: u32,

    /// Connection timeout in milliseconds.
    pub connect_timeout_ms: u64,

    /// How long a connection waits on a locked database, in milliseconds.
    pub busy_timeout_ms: u64,

    /// Create the database file if it does not exist.
    pub create_if_missing: bool,

    /// Use write-ahead logging.
    pub wal: bool,

    /// Enforce foreign-key constraints.
    pub foreign_keys: bool,
}

impl Default for SqliteConfig {
    fn default() -> Self {
        Self {
            url: "sqlite://sqlds.db".into(),
            pool_size: 5,
            connect_timeout_ms: 5000,
            busy_timeout_ms: 5000,
            create_if_missing: true,
            wal: true,
            foreign_keys: true,
        }
    }
}

impl SqliteConfig {
    /// Creates a new configuration with the given URL.
    #[must_use]
    pub fn new(url: impl Into<String>) -> Self {
        Self {
            url: url.into(),
            ..Default::default()
        }
    }

    /// Configuration for a database file at `path`.
    #[must_use]
    pub fn file(path: impl AsRef<std::path::Path>) -> Self {
        Self::new(format!("sqlite://{}", path.as_ref().display()))
    }

    /// Sets the pool size.
    #[must_use]
    pub fn with_pool_size(mut self, size: u32) -> Self {
        self.pool_size = size;
        self
    }

    /// Sets the busy timeout.
    #[must_use]
    pub fn with_busy_timeout_ms(mut self, timeout: u64) -> Self {
        self.busy_timeout_ms = timeout;
        self
    }

    /// Enables or disables write-ahead logging.
    #[must_use]
    pub fn with_wal(mut self, wal: bool) -> Self {
        self.wal = wal;
        self
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_config() {
        let config = SqliteConfig::default();
        assert_eq!(config.pool_size, 5);
        assert!(config.wal);
        assert!(config.create_if_missing);
    }

    #[test]
    fn test_file_config() {
        let config = SqliteConfig::file("/tmp/hr.db").with_pool_size(2).with_wal(false);
        assert_eq!(config.url, "sqlite:///tmp/hr.db");
        assert_eq!(config.pool_size, 2);
        assert!(!config.wal);
    }
}
