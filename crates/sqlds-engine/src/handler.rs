//! Handlers for non-SQL DataSources.

use std::sync::Arc;

use async_trait::async_trait;
use sqlds_core::{DataSource, Request, Response};

use crate::error::EngineError;

/// Executes requests for a DataSource the SQL engine does not serve.
///
/// Registered per DataSource id. Sub-entity fetches that target such a
/// DataSource are dispatched here as well.
#[async_trait]
pub trait DataSourceHandler: Send + Sync {
    async fn handle(
        &self,
        data_source: &DataSource,
        request: Request,
    ) -> Result<Response, EngineError>;
}

/// Type alias for a shared handler.
pub type DynHandler = Arc<dyn DataSourceHandler>;
