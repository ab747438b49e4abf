//! PostgreSQL provider and sessions.

use async_trait::async_trait;
use chrono::{DateTime, NaiveDate, NaiveDateTime, NaiveTime, Utc};
use sqlds_core::{BuiltQuery, FieldType, SqlValue};
use sqlds_storage::{ConnectionProvider, SqlSession, StorageError};
use sqlx_core::pool::PoolConnection;
use sqlx_core::query::Query;
use sqlx_core::row::Row;
use sqlx_core::transaction::Transaction;
use sqlx_core::type_info::TypeInfo;
use sqlx_core::value::ValueRef;
use sqlx_postgres::{PgArguments, PgConnection, PgPool, PgRow, Postgres};
use tracing::{debug, instrument};

use crate::config::PostgresConfig;
use crate::error::statement_error;
use crate::placeholders::renumber_placeholders;
use crate::pool::create_pool;

/// Connection provider over a PostgreSQL pool.
///
/// Serves a single database; the name passed to [`ConnectionProvider::session`]
/// is ignored.
#[derive(Clone)]
pub struct PostgresProvider {
    pool: PgPool,
}

impl PostgresProvider {
    /// Creates the pool and the provider.
    ///
    /// # Errors
    ///
    /// Returns an error if the connection pool cannot be created.
    pub async fn new(config: PostgresConfig) -> crate::Result<Self> {
        let pool = create_pool(&config).await?;
        Ok(Self { pool })
    }

    /// Wraps an existing pool.
    pub fn from_pool(pool: PgPool) -> Self {
        Self { pool }
    }

    pub fn pool(&self) -> &PgPool {
        &self.pool
    }
}

#[async_trait]
impl ConnectionProvider for PostgresProvider {
    #[instrument(skip(self))]
    async fn session(
        &self,
        db_name: Option<&str>,
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
        Ok(Box::new(PostgresSession { conn: Some(conn) }))
    }

    fn backend_name(&self) -> &'static str {
        "postgres"
    }
}

enum Conn {
    Pooled(PoolConnection<Postgres>),
    Transaction(Transaction<'static, Postgres>),
}

/// One pooled connection, optionally inside a transaction.
///
/// Dropping an unfinished transactional session rolls it back.
pub struct PostgresSession {
    conn: Option<Conn>,
}

impl PostgresSession {
    fn connection(&mut self) -> Result<&mut PgConnection, StorageError> {
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
impl SqlSession for PostgresSession {
    async fn fetch(&mut self, query: &BuiltQuery) -> Result<Vec<Vec<SqlValue>>, StorageError> {
        let sql = renumber_placeholders(&query.sql);
        debug!(sql = %sql, params = %query.params_display(), "Executing fetch");

        let conn = self.connection()?;
        let rows = bind_all(sqlx_core::query::query(&sql), &query.params)
            .fetch_all(conn)
            .await
            .map_err(|e| statement_error(e, query))?;

        rows.iter().map(decode_row).collect()
    }

    async fn execute(&mut self, query: &BuiltQuery) -> Result<u64, StorageError> {
        let sql = renumber_placeholders(&query.sql);
        debug!(sql = %sql, params = %query.params_display(), "Executing statement");

        let conn = self.connection()?;
        let result = bind_all(sqlx_core::query::query(&sql), &query.params)
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

// ============================================================================
// Binding
// ============================================================================

type PgQuery<'q> = Query<'q, Postgres, PgArguments>;

fn bind_all<'q>(mut query: PgQuery<'q>, params: &'q [SqlValue]) -> PgQuery<'q> {
    for param in params {
        query = bind_value(query, param);
    }
    query
}

fn bind_value<'q>(query: PgQuery<'q>, value: &'q SqlValue) -> PgQuery<'q> {
    match value {
        SqlValue::Text(s) => query.bind(s.as_str()),
        SqlValue::Integer(i) => query.bind(*i),
        SqlValue::Float(f) => query.bind(*f),
        SqlValue::Boolean(b) => query.bind(*b),
        SqlValue::Date(d) => query.bind(*d),
        SqlValue::DateTime(dt) => query.bind(*dt),
        SqlValue::Time(t) => query.bind(*t),
        SqlValue::Null(ty) => bind_null(query, *ty),
    }
}

/// Binds NULL with the parameter type PostgreSQL expects for the field.
fn bind_null(query: PgQuery<'_>, field_type: Option<FieldType>) -> PgQuery<'_> {
    match field_type {
        Some(FieldType::Integer | FieldType::IntEnum | FieldType::Sequence) => {
            query.bind(None::<i64>)
        }
        Some(FieldType::Float) => query.bind(None::<f64>),
        Some(FieldType::Boolean) => query.bind(None::<bool>),
        Some(FieldType::Date) => query.bind(None::<NaiveDate>),
        Some(FieldType::DateTime) => query.bind(None::<NaiveDateTime>),
        Some(FieldType::Time) => query.bind(None::<NaiveTime>),
        Some(FieldType::Text | FieldType::Enum | FieldType::Entity) | None => {
            query.bind(None::<String>)
        }
    }
}

// ============================================================================
// Decoding
// ============================================================================

fn decode_row(row: &PgRow) -> Result<Vec<SqlValue>, StorageError> {
    (0..row.len()).map(|i| decode_column(row, i)).collect()
}

fn decode_column(row: &PgRow, index: usize) -> Result<SqlValue, StorageError> {
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
    let type_name = raw.type_info().name().to_ascii_uppercase();

    let value = match type_name.as_str() {
        "BOOL" => SqlValue::Boolean(row.try_get::<bool, _>(index).map_err(decode_err)?),
        "INT2" => SqlValue::Integer(row.try_get::<i16, _>(index).map_err(decode_err)?.into()),
        "INT4" => SqlValue::Integer(row.try_get::<i32, _>(index).map_err(decode_err)?.into()),
        "INT8" => SqlValue::Integer(row.try_get::<i64, _>(index).map_err(decode_err)?),
        "FLOAT4" => SqlValue::Float(row.try_get::<f32, _>(index).map_err(decode_err)?.into()),
        "FLOAT8" => SqlValue::Float(row.try_get::<f64, _>(index).map_err(decode_err)?),
        "DATE" => SqlValue::Date(row.try_get::<NaiveDate, _>(index).map_err(decode_err)?),
        "TIMESTAMP" => {
            SqlValue::DateTime(row.try_get::<NaiveDateTime, _>(index).map_err(decode_err)?)
        }
        "TIMESTAMPTZ" => SqlValue::DateTime(
            row.try_get::<DateTime<Utc>, _>(index)
                .map_err(decode_err)?
                .naive_utc(),
        ),
        "TIME" => SqlValue::Time(row.try_get::<NaiveTime, _>(index).map_err(decode_err)?),
        "JSON" | "JSONB" => SqlValue::Text(
            row.try_get::<serde_json::Value, _>(index)
                .map_err(decode_err)?
                .to_string(),
        ),
        "TEXT" | "VARCHAR" | "BPCHAR" | "NAME" | "CHAR" | "UNKNOWN" => {
            SqlValue::Text(row.try_get::<String, _>(index).map_err(decode_err)?)
        }
        other => {
            return Err(StorageError::decode(
                column(),
                format!("unsupported column type {other}"),
            ));
        }
    };
    Ok(value)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_bind_all_keeps_parameter_count() {
        let params = vec![
            SqlValue::Text("Ann".into()),
            SqlValue::Integer(3),
            SqlValue::Null(Some(FieldType::Date)),
            SqlValue::Null(None),
        ];
        let sql = renumber_placeholders("SELECT 1 WHERE a = ? AND b = ? AND c = ? AND d = ?");
        let query = bind_all(sqlx_core::query::query(&sql), &params);
        assert_eq!(sqlx_core::executor::Execute::sql(&query), sql.as_str());
    }
}
