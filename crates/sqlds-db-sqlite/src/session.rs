//! SQLite provider and sessions.

use async_trait::async_trait;
use sqlds_core::{BuiltQuery, SqlValue};
use sqlds_storage::{ConnectionProvider, SqlSession, StorageError};
use sqlx_core::pool::PoolConnection;
use sqlx_core::query::Query;
use sqlx_core::row::Row;
use sqlx_core::transaction::Transaction;
use sqlx_core::type_info::TypeInfo;
use sqlx_core::value::ValueRef;
use sqlx_sqlite::{Sqlite, SqliteArguments, SqliteConnection, SqlitePool, SqliteRow};
use tracing::debug;

use crate::config::SqliteConfig;
use crate::error::statement_error;
use crate::pool::create_pool;

const DATE_FORMAT: &str = "%Y-%m-%d";
const DATETIME_FORMAT: &str = "%Y-%m-%d %H:%M:%S%.f";
const TIME_FORMAT: &str = "%H:%M:%S%.f";

/// Connection provider over a SQLite pool.
///
/// Serves a single database file; the name passed to
/// [`ConnectionProvider::session`] is ignored.
#[derive(Clone)]
pub struct SqliteProvider {
    pool: SqlitePool,
}

impl SqliteProvider {
    /// Opens the database and creates the provider.
    ///
    /// # Errors
    ///
    /// Returns an error if the database cannot be opened.
    pub async fn new(config: SqliteConfig) -> crate::Result<Self> {
        let pool = create_pool(&config).await?;
        Ok(Self { pool })
    }

    /// Wraps an existing pool.
    pub fn from_pool(pool: SqlitePool) -> Self {
        Self { pool }
    }

    pub fn pool(&self) -> &SqlitePool {
        &self.pool
    }
}

#[async_trait]
impl ConnectionProvider for SqliteProvider {
    async fn session(
        &self,
        _db_name: Option<&str>,
        transactional: bool,
    ) -> Result<Box<dyn SqlSession>, StorageError> {
        let conn = if transactional {
            let tx = self.pool.begin().await.map_err(|e| {
                StorageError::transaction_error(format!("Failed to begin transaction: {e}"))
            })?;
            Conn::Transaction(tx)
        } else {
            let conn = self
                .pool
                .acquire()
                .await
                .map_err(|e| StorageError::connection_error(e.to_string()))?;
            Conn::Pooled(conn)
        };
        Ok(Box::new(SqliteSession { conn: Some(conn) }))
    }

    fn backend_name(&self) -> &'static str {
        "sqlite"
    }
}

enum Conn {
    Pooled(PoolConnection<Sqlite>),
    Transaction(Transaction<'static, Sqlite>),
}

/// One pooled connection, optionally inside a transaction.
pub struct SqliteSession {
    conn: Option<Conn>,
}

impl SqliteSession {
    fn connection(&mut self) -> Result<&mut SqliteConnection, StorageError> {
        match self.conn.as_mut() {
            Some(Conn::Pooled(c)) => Ok(&mut **c),
            Some(Conn::Transaction(tx)) => Ok(&mut **tx),
            None => Err(StorageError::transaction_error(
                "Session already completed (committed or rolled back)",
            )),
        }
    }
}

#[async_trait]
impl SqlSession for SqliteSession {
    async fn fetch(&mut self, query: &BuiltQuery) -> Result<Vec<Vec<SqlValue>>, StorageError> {
        debug!(sql = %query.sql, params = %query.params_display(), "Executing fetch");

        let conn = self.connection()?;
        let rows = bind_all(sqlx_core::query::query(&query.sql), &query.params)
            .fetch_all(conn)
            .await
            .map_err(|e| statement_error(e, query))?;

        rows.iter().map(decode_row).collect()
    }

    async fn execute(&mut self, query: &BuiltQuery) -> Result<u64, StorageError> {
        debug!(sql = %query.sql, params = %query.params_display(), "Executing statement");

        let conn = self.connection()?;
        let result = bind_all(sqlx_core::query::query(&query.sql), &query.params)
            .execute(conn)
            .await
            .map_err(|e| statement_error(e, query))?;

        Ok(result.rows_affected())
    }

    async fn commit(mut self: Box<Self>) -> Result<(), StorageError> {
        if let Some(Conn::Transaction(tx)) = self.conn.take() {
            tx.commit().await.map_err(|e| {
                StorageError::transaction_error(format!("Failed to commit transaction: {e}"))
            })?;
            debug!("Transaction committed");
        }
        Ok(())
    }

    async fn rollback(mut self: Box<Self>) -> Result<(), StorageError> {
        if let Some(Conn::Transaction(tx)) = self.conn.take() {
            tx.rollback().await.map_err(|e| {
                StorageError::transaction_error(format!("Failed to rollback transaction: {e}"))
            })?;
            debug!("Transaction rolled back");
        }
        Ok(())
    }
}

type SqliteQuery<'q> = Query<'q, Sqlite, SqliteArguments<'q>>;

fn bind_all<'q>(mut query: SqliteQuery<'q>, params: &'q [SqlValue]) -> SqliteQuery<'q> {
    for param in params {
        query = match param {
            SqlValue::Text(s) => query.bind(s.as_str()),
            SqlValue::Integer(i) => query.bind(*i),
            SqlValue::Float(f) => query.bind(*f),
            SqlValue::Boolean(b) => query.bind(*b),
            SqlValue::Date(d) => query.bind(d.format(DATE_FORMAT).to_string()),
            SqlValue::DateTime(dt) => query.bind(dt.format(DATETIME_FORMAT).to_string()),
            SqlValue::Time(t) => query.bind(t.format(TIME_FORMAT).to_string()),
            // SQLite columns are dynamically typed; an untyped NULL fits any of them.
            SqlValue::Null(_) => query.bind(None::<String>),
        };
    }
    query
}

fn decode_row(row: &SqliteRow) -> Result<Vec<SqlValue>, StorageError> {
    (0..row.len()).map(|i| decode_column(row, i)).collect()
}

/// Decodes by runtime storage class; the declared column type is lost in
/// derived tables anyway.
fn decode_column(row: &SqliteRow, index: usize) -> Result<SqlValue, StorageError> {
    let column = || {
        row.columns()
            .get(index)
            .map(|c| sqlx_core::column::Column::name(c).to_string())
            .unwrap_or_else(|| index.to_string())
    };
    let decode_err = |e: sqlx_core::error::Error| StorageError::decode(column(), e.to_string());

    let raw = row.try_get_raw(index).map_err(decode_err)?;
    if raw.is_null() {
        return Ok(SqlValue::Null(None));
    }
    let storage_class = raw.type_info().name().to_ascii_uppercase();

    let value = match storage_class.as_str() {
        "INTEGER" | "BOOLEAN" => {
            SqlValue::Integer(row.try_get_unchecked::<i64, _>(index).map_err(decode_err)?)
        }
        "REAL" => SqlValue::Float(row.try_get_unchecked::<f64, _>(index).map_err(decode_err)?),
        "TEXT" | "DATE" | "DATETIME" | "TIME" => {
            SqlValue::Text(row.try_get_unchecked::<String, _>(index).map_err(decode_err)?)
        }
        other => {
            return Err(StorageError::decode(
                column(),
                format!("unsupported storage class {other}"),
            ));
        }
    };
    Ok(value)
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::NaiveDate;
    use sqlds_core::FieldType;

    async fn provider() -> (tempfile::TempDir, SqliteProvider) {
        let dir = tempfile::tempdir().unwrap();
        let config = SqliteConfig::file(dir.path().join("test.db"));
        let provider = SqliteProvider::new(config).await.unwrap();
        (dir, provider)
    }

    async fn exec(provider: &SqliteProvider, sql: &str) {
        let mut session = provider.session(None, false).await.unwrap();
        session.execute(&BuiltQuery::new(sql, vec![])).await.unwrap();
        session.commit().await.unwrap();
    }

    #[tokio::test]
    async fn test_round_trip_values() {
        let (_dir, provider) = provider().await;
        exec(
            &provider,
            "CREATE TABLE t (id INTEGER PRIMARY KEY, name TEXT, hired DATE, score REAL, active BOOLEAN)",
        )
        .await;

        let mut session = provider.session(None, true).await.unwrap();
        let inserted = session
            .fetch(&BuiltQuery::new(
                "INSERT INTO t (name, hired, score, active) VALUES (?, ?, ?, ?) RETURNING id",
                vec![
                    SqlValue::Text("Ann".into()),
                    SqlValue::Date(NaiveDate::from_ymd_opt(2021, 3, 4).unwrap()),
                    SqlValue::Float(1.5),
                    SqlValue::Boolean(true),
                ],
            ))
            .await
            .unwrap();
        assert_eq!(inserted, vec![vec![SqlValue::Integer(1)]]);
        session.commit().await.unwrap();

        let mut session = provider.session(None, false).await.unwrap();
        let rows = session
            .fetch(&BuiltQuery::new(
                "SELECT name, hired, score, active, NULL FROM t WHERE id = ?",
                vec![SqlValue::Integer(1)],
            ))
            .await
            .unwrap();
        assert_eq!(
            rows,
            vec![vec![
                SqlValue::Text("Ann".into()),
                SqlValue::Text("2021-03-04".into()),
                SqlValue::Float(1.5),
                SqlValue::Integer(1),
                SqlValue::Null(None),
            ]]
        );
    }

    #[tokio::test]
    async fn test_rollback_discards_changes() {
        let (_dir, provider) = provider().await;
        exec(&provider, "CREATE TABLE t (id INTEGER PRIMARY KEY, name TEXT)").await;

        let mut session = provider.session(None, true).await.unwrap();
        let affected = session
            .execute(&BuiltQuery::new(
                "INSERT INTO t (name) VALUES (?)",
                vec![SqlValue::Null(Some(FieldType::Text))],
            ))
            .await
            .unwrap();
        assert_eq!(affected, 1);
        session.rollback().await.unwrap();

        let mut session = provider.session(None, false).await.unwrap();
        let rows = session
            .fetch(&BuiltQuery::new("SELECT count(*) FROM t", vec![]))
            .await
            .unwrap();
        assert_eq!(rows, vec![vec![SqlValue::Integer(0)]]);
    }

    #[tokio::test]
    async fn test_statement_error_carries_sql() {
        let (_dir, provider) = provider().await;
        let mut session = provider.session(None, false).await.unwrap();
        let err = session
            .fetch(&BuiltQuery::new(
                "SELECT * FROM missing WHERE id = ?",
                vec![SqlValue::Integer(5)],
            ))
            .await
            .unwrap_err();
        match err {
            StorageError::Execution { sql, params, .. } => {
                assert_eq!(sql, "SELECT * FROM missing WHERE id = ?");
                assert_eq!(params, "[5]");
            }
            other => panic!("unexpected error {other:?}"),
        }
    }

    #[tokio::test]
    async fn test_unique_violation_is_constraint_error() {
        let (_dir, provider) = provider().await;
        exec(&provider, "CREATE TABLE t (id INTEGER PRIMARY KEY, email TEXT UNIQUE)").await;
        exec(&provider, "INSERT INTO t (email) VALUES ('a@b.c')").await;

        let mut session = provider.session(None, false).await.unwrap();
        let err = session
            .execute(&BuiltQuery::new(
                "INSERT INTO t (email) VALUES (?)",
                vec![SqlValue::Text("a@b.c".into())],
            ))
            .await
            .unwrap_err();
        assert!(err.is_constraint_violation());
    }
}
