//! Builds connection providers and the engine from an [`AppConfig`].

use std::sync::Arc;

use sqlds_core::DataSourceRegistry;
use sqlds_db_postgres::PostgresConfig;
use sqlds_db_sqlite::SqliteConfig;
use sqlds_engine::SqlDataSourceEngine;
use sqlds_query::validate_registry;
use sqlds_storage::{DynProvider, RoutingProvider};
use tracing::{info, instrument};

use crate::config::{AppConfig, Backend, DatabaseConfig};
use crate::error::{ConfigError, Result};

/// Opens one pool per configured database behind a [`RoutingProvider`].
#[instrument(skip(config), fields(databases = config.databases.len()))]
pub async fn build_provider(config: &AppConfig) -> Result<RoutingProvider> {
    let mut routing = RoutingProvider::new();
    for (name, db) in &config.databases {
        let provider = open_database(db)
            .await
            .map_err(|source| ConfigError::Provider {
                name: name.clone(),
                source,
            })?;
        routing = routing.with_provider(name.clone(), provider);
    }
    if let Some(default) = config.default_database_name() {
        routing = routing.with_default(default);
    }
    info!(databases = ?routing.names(), default = ?routing.default_name(), "Databases ready");
    Ok(routing)
}

/// Validates the registry's relations and builds the engine.
pub async fn build_engine(
    config: &AppConfig,
    registry: Arc<DataSourceRegistry>,
) -> Result<SqlDataSourceEngine> {
    validate_registry(&registry, config.engine.max_relation_depth)?;
    let provider = build_provider(config).await?;
    Ok(SqlDataSourceEngine::new(registry, Arc::new(provider)).with_config(config.engine.clone()))
}

async fn open_database(db: &DatabaseConfig) -> sqlds_storage::StorageResult<DynProvider> {
    match db.backend {
        Backend::Postgres => {
            let config = PostgresConfig::new(db.url.clone())
                .with_pool_size(db.pool_size)
                .with_connect_timeout_ms(db.connect_timeout_ms)
                .with_idle_timeout_ms(db.idle_timeout_ms)
                .with_statement_timeout_ms(db.statement_timeout_ms);
            sqlds_db_postgres::create_provider(config).await
        }
        Backend::Sqlite => {
            let config = SqliteConfig {
                connect_timeout_ms: db.connect_timeout_ms,
                ..SqliteConfig::new(db.url.clone()).with_pool_size(db.pool_size)
            };
            sqlds_db_sqlite::create_provider(config).await
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use sqlds_core::{DataSource, Field, FieldType, Request, STATUS_SUCCESS};
    use sqlds_storage::ConnectionProvider;

    fn sqlite(url: String) -> DatabaseConfig {
        DatabaseConfig {
            backend: Backend::Sqlite,
            url,
            pool_size: 2,
            connect_timeout_ms: 5000,
            idle_timeout_ms: None,
            statement_timeout_ms: None,
        }
    }

    #[tokio::test]
    async fn test_build_provider_routes_by_name() {
        let dir = tempfile::tempdir().unwrap();
        let mut config = AppConfig::default();
        config.databases.insert(
            "hr".into(),
            sqlite(format!("sqlite://{}", dir.path().join("hr.db").display())),
        );

        let routing = build_provider(&config).await.unwrap();
        assert_eq!(routing.names(), vec!["hr".to_string()]);
        assert_eq!(routing.default_name(), Some("hr"));
        assert!(routing.session(None, false).await.is_ok());
        assert!(routing.session(Some("finance"), false).await.is_err());
    }

    #[tokio::test]
    async fn test_build_engine() {
        let dir = tempfile::tempdir().unwrap();
        let mut config = AppConfig::default();
        config.databases.insert(
            "hr".into(),
            sqlite(format!("sqlite://{}", dir.path().join("hr.db").display())),
        );

        let registry = DataSourceRegistry::from_data_sources([DataSource::new(
            "MetaDS",
            "sqlite_master",
        )
        .with_field(Field::new("name", FieldType::Text).with_primary_key())])
        .unwrap();

        let engine = build_engine(&config, Arc::new(registry)).await.unwrap();
        let response = engine.handle(Request::fetch("MetaDS")).await;
        assert_eq!(response.status, STATUS_SUCCESS);
        assert_eq!(response.total_rows, 0);
    }

    #[tokio::test]
    async fn test_broken_relation_fails_fast() {
        let registry = DataSourceRegistry::from_data_sources([DataSource::new("EmployeeDS", "employee")
            .with_field(Field::new("id", FieldType::Integer).with_primary_key())
            .with_field(Field::new("city", FieldType::Text).with_include_from("LocationDS.city"))])
        .unwrap();

        let err = build_engine(&AppConfig::default(), Arc::new(registry))
            .await
            .err()
            .unwrap();
        assert!(matches!(err, ConfigError::Schema(_)));
    }
}
