//! # sqlds-storage
//!
//! Storage abstraction layer for the sqlds engine.
//!
//! This crate defines the traits database backends implement. It contains no
//! driver code; those live in `sqlds-db-postgres` and `sqlds-db-sqlite`.
//!
//! ## Overview
//!
//! A [`ConnectionProvider`] hands out [`SqlSession`]s. A session executes
//! [`BuiltQuery`](sqlds_core::BuiltQuery) values with `?` placeholders and
//! returns rows of [`SqlValue`](sqlds_core::SqlValue). A transactional session
//! must be finished with [`SqlSession::commit`] or
//! [`SqlSession::rollback`]; dropping it rolls back.
//!
//! ## Example
//!
//! ```ignore
//! use sqlds_core::BuiltQuery;
//! use sqlds_storage::{ConnectionProvider, StorageError};
//!
//! async fn count(provider: &dyn ConnectionProvider) -> Result<u64, StorageError> {
//!     let mut session = provider.session(None, false).await?;
//!     let rows = session.fetch(&BuiltQuery::new("SELECT count(*) FROM employee", vec![])).await?;
//!     session.commit().await?;
//!     Ok(rows.len() as u64)
//! }
//! ```

mod error;
mod routing;
mod traits;

pub use error::{ErrorCategory, StorageError};
pub use routing::RoutingProvider;
pub use traits::{ConnectionProvider, SqlSession};

/// Type alias for a storage result.
pub type StorageResult<T> = Result<T, StorageError>;

/// Type alias for a shared connection provider.
pub type DynProvider = std::sync::Arc<dyn ConnectionProvider>;

/// Prelude module for convenient imports.
///
/// ```ignore
/// use sqlds_storage::prelude::*;
/// ```
pub mod prelude {
    pub use crate::error::{ErrorCategory, StorageError};
    pub use crate::routing::RoutingProvider;
    pub use crate::traits::{ConnectionProvider, SqlSession};
    pub use crate::{DynProvider, StorageResult};
}
