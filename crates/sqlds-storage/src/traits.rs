//! Backend traits.

use async_trait::async_trait;
use sqlds_core::{BuiltQuery, SqlValue};

use crate::error::StorageError;

/// Hands out database sessions.
///
/// Implementations must be thread-safe (`Send + Sync`); one provider is shared
/// by every request the engine serves.
#[async_trait]
pub trait ConnectionProvider: Send + Sync {
    /// Acquires a session on the database named `db_name`, or the default
    /// database when `None`.
    ///
    /// A transactional session runs every statement in one transaction that
    /// is finished by [`SqlSession::commit`] or [`SqlSession::rollback`].
    /// A non-transactional session commits nothing; `commit` just releases it.
    ///
    /// # Errors
    ///
    /// Returns `StorageError::ConnectionError` when no connection can be acquired
    /// and `StorageError::UnknownDatabase` when `db_name` is not served here.
    async fn session(
        &self,
        db_name: Option<&str>,
        transactional: bool,
    ) -> Result<Box<dyn SqlSession>, StorageError>;

    /// Short backend name for logs (`postgres`, `sqlite`, ...).
    fn backend_name(&self) -> &'static str;
}

/// One connection, optionally inside a transaction.
///
/// Dropping a session without finishing it releases the connection; an open
/// transaction is rolled back.
#[async_trait]
pub trait SqlSession: Send {
    /// Runs a query and returns every row, columns in select-list order.
    async fn fetch(&mut self, query: &BuiltQuery) -> Result<Vec<Vec<SqlValue>>, StorageError>;

    /// Runs a statement and returns the number of affected rows.
    async fn execute(&mut self, query: &BuiltQuery) -> Result<u64, StorageError>;

    /// Commits the transaction, if any, and releases the connection.
    async fn commit(self: Box<Self>) -> Result<(), StorageError>;

    /// Rolls back the transaction, if any, and releases the connection.
    async fn rollback(self: Box<Self>) -> Result<(), StorageError>;
}
