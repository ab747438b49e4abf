//! Routing by database name.
//!
//! A DataSource's `dbName` selects one of several configured databases. The
//! [`RoutingProvider`] keeps one provider per name and forwards session
//! requests to it; requests without a name go to the default database.

use async_trait::async_trait;
use dashmap::DashMap;

use crate::error::StorageError;
use crate::traits::{ConnectionProvider, SqlSession};
use crate::DynProvider;

/// Forwards sessions to named providers.
pub struct RoutingProvider {
    providers: DashMap<String, DynProvider>,
    default: Option<String>,
}

impl RoutingProvider {
    pub fn new() -> Self {
        Self {
            providers: DashMap::new(),
            default: None,
        }
    }

    /// Adds a named database.
    #[must_use]
    pub fn with_provider(self, name: impl Into<String>, provider: DynProvider) -> Self {
        self.register(name, provider);
        self
    }

    /// Names the database used when a DataSource declares no `dbName`.
    #[must_use]
    pub fn with_default(mut self, name: impl Into<String>) -> Self {
        self.default = Some(name.into());
        self
    }

    /// Adds or replaces a named database.
    pub fn register(&self, name: impl Into<String>, provider: DynProvider) {
        let name = name.into();
        tracing::debug!(
            database = %name,
            backend = provider.backend_name(),
            "Registered database"
        );
        self.providers.insert(name, provider);
    }

    /// Registered database names, sorted.
    pub fn names(&self) -> Vec<String> {
        let mut names: Vec<String> = self.providers.iter().map(|e| e.key().clone()).collect();
        names.sort();
        names
    }

    pub fn default_name(&self) -> Option<&str> {
        self.default.as_deref()
    }

    fn resolve(&self, db_name: Option<&str>) -> Result<DynProvider, StorageError> {
        let name = match (db_name, self.default.as_deref()) {
            (Some(name), _) | (None, Some(name)) => name,
            (None, None) => {
                return Err(StorageError::UnknownDatabase("<default>".to_string()));
            }
        };
        self.providers
            .get(name)
            .map(|p| p.value().clone())
            .ok_or_else(|| StorageError::UnknownDatabase(name.to_string()))
    }
}

impl Default for RoutingProvider {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl ConnectionProvider for RoutingProvider {
    async fn session(
        &self,
        db_name: Option<&str>,
        transactional: bool,
    ) -> Result<Box<dyn SqlSession>, StorageError> {
        let provider = self.resolve(db_name)?;
        provider.session(db_name, transactional).await
    }

    fn backend_name(&self) -> &'static str {
        "routing"
    }
}
