use sqlds_core::SchemaError;
use sqlds_storage::StorageError;

/// Errors raised while loading configuration or wiring the engine.
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("Config load error: {0}")]
    Load(#[from] ::config::ConfigError),

    #[error("Validation error: {0}")]
    Validation(String),

    #[error("Database '{name}' is unavailable: {source}")]
    Provider {
        name: String,
        #[source]
        source: StorageError,
    },

    #[error("Schema error: {0}")]
    Schema(#[from] SchemaError),
}

impl ConfigError {
    pub fn validation(msg: impl Into<String>) -> Self {
        Self::Validation(msg.into())
    }
}

/// Result type for configuration operations
pub type Result<T> = std::result::Result<T, ConfigError>;
