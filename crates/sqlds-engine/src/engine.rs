//! The request entry point.

use std::future::Future;
use std::pin::Pin;
use std::sync::Arc;

use dashmap::DashMap;
use sqlds_core::{DataSource, DataSourceRegistry, OperationType, Request, Response};
use sqlds_query::RelationResolver;
use sqlds_storage::{DynProvider, SqlSession};
use tracing::{error, instrument, warn};

use crate::config::EngineConfig;
use crate::error::{EngineError, ErrorCategory};
use crate::handler::DynHandler;

pub(crate) type BoxFuture<'a, T> = Pin<Box<dyn Future<Output = T> + Send + 'a>>;

/// An open session as handed out by the provider.
pub(crate) type Session = dyn SqlSession;

/// Executes requests against SQL DataSources.
///
/// Holds no per-request state; one engine serves any number of concurrent
/// requests from the caller's tasks.
pub struct SqlDataSourceEngine {
    pub(crate) registry: Arc<DataSourceRegistry>,
    pub(crate) provider: DynProvider,
    pub(crate) config: EngineConfig,
    handlers: DashMap<String, DynHandler>,
}

impl SqlDataSourceEngine {
    pub fn new(registry: Arc<DataSourceRegistry>, provider: DynProvider) -> Self {
        Self {
            registry,
            provider,
            config: EngineConfig::default(),
            handlers: DashMap::new(),
        }
    }

    #[must_use]
    pub fn with_config(mut self, config: EngineConfig) -> Self {
        self.config = config;
        self
    }

    /// Routes requests for `data_source_id` to `handler`.
    #[must_use]
    pub fn with_handler(self, data_source_id: impl Into<String>, handler: DynHandler) -> Self {
        self.register_handler(data_source_id, handler);
        self
    }

    pub fn register_handler(&self, data_source_id: impl Into<String>, handler: DynHandler) {
        self.handlers.insert(data_source_id.into(), handler);
    }

    pub fn registry(&self) -> &DataSourceRegistry {
        &self.registry
    }

    pub fn config(&self) -> &EngineConfig {
        &self.config
    }

    pub(crate) fn resolver(&self) -> RelationResolver<'_> {
        RelationResolver::new(&self.registry).with_max_depth(self.config.max_relation_depth)
    }

    /// Executes a request.
    ///
    /// Never fails: errors are returned as failure responses (status -1, or
    /// -4 with per-field errors for validation failures).
    #[instrument(
        skip(self, request),
        fields(data_source = %request.data_source, operation = %request.operation_type)
    )]
    pub async fn handle(&self, request: Request) -> Response {
        match self.execute(request, 0).await {
            Ok(response) => response,
            Err(err) => {
                match err.category() {
                    ErrorCategory::Execution => error!(
                        category = %err.category(),
                        error = %err,
                        "Request failed"
                    ),
                    _ => warn!(category = %err.category(), error = %err, "Request rejected"),
                }
                err.into_response()
            }
        }
    }

    /// Boxed [`execute`](Self::execute), for nested fetches.
    pub(crate) fn dispatch(
        &self,
        request: Request,
        depth: usize,
    ) -> BoxFuture<'_, Result<Response, EngineError>> {
        Box::pin(self.execute(request, depth))
    }

    async fn execute(&self, request: Request, depth: usize) -> Result<Response, EngineError> {
        let data_source = self.registry.require(&request.data_source)?;

        if !data_source.is_sql() {
            let handler = self
                .handlers
                .get(&data_source.id)
                .map(|h| h.value().clone())
                .ok_or_else(|| EngineError::NoHandler(data_source.id.clone()))?;
            return handler.handle(&data_source, request).await;
        }

        match &request.operation_type {
            OperationType::Fetch => self.fetch(&data_source, &request, depth).await,
            OperationType::Add => self.add(&data_source, &request, depth).await,
            OperationType::Update => self.update(&data_source, &request, depth).await,
            OperationType::Remove => self.remove(&data_source, &request).await,
            OperationType::Other(op) => Err(EngineError::UnsupportedOperation {
                data_source: data_source.id.clone(),
                operation: op.clone(),
            }),
        }
    }

    pub(crate) async fn session(
        &self,
        data_source: &DataSource,
        transactional: bool,
    ) -> Result<Box<dyn SqlSession>, EngineError> {
        Ok(self
            .provider
            .session(data_source.db_name.as_deref(), transactional)
            .await?)
    }
}

/// Commits on success and rolls back on failure.
pub(crate) async fn finish<T>(
    session: Box<dyn SqlSession>,
    result: Result<T, EngineError>,
) -> Result<T, EngineError> {
    match result {
        Ok(value) => {
            session.commit().await?;
            Ok(value)
        }
        Err(err) => {
            if let Err(rollback) = session.rollback().await {
                warn!(error = %rollback, "Rollback failed");
            }
            Err(err)
        }
    }
}
