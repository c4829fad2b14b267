//! PostgreSQL driver
//!
//! Executes rendered statements over a sqlx connection pool. While a
//! transaction is open every statement runs on it; beginning a new
//! transaction implicitly commits the previous one.

use crate::driver::{escape_literal, Driver, DriverError, SqlRenderer};
use crate::options::QueryOptions;
use crate::row::Row;
use crate::schema::FieldDescription;
use crate::update::ChangeSet;
use async_trait::async_trait;
use sqlx::postgres::{PgArguments, PgPool, PgRow};
use sqlx::{Column, Postgres, Row as _, TypeInfo};
use tokio::sync::Mutex;
use type_mapping::SqlValue;

const DESCRIBE_FIELDS_SQL: &str = r#"
SELECT
    c.column_name,
    c.data_type,
    COALESCE(c.column_default, '') AS column_default,
    EXISTS (
        SELECT 1
        FROM information_schema.table_constraints tc
        JOIN information_schema.key_column_usage kcu
          ON kcu.constraint_name = tc.constraint_name
         AND kcu.table_schema = tc.table_schema
        WHERE tc.table_name = c.table_name
          AND tc.constraint_type = 'PRIMARY KEY'
          AND kcu.column_name = c.column_name
    ) AS is_primary
FROM information_schema.columns c
WHERE c.table_name = $1
ORDER BY c.ordinal_position
"#;

/// PostgreSQL implementation of the driver contract
pub struct PgDriver {
    pool: PgPool,
    transaction: Mutex<Option<sqlx::Transaction<'static, Postgres>>>,
}

impl PgDriver {
    pub fn new(pool: PgPool) -> Self {
        Self {
            pool,
            transaction: Mutex::new(None),
        }
    }

    pub fn pool(&self) -> &PgPool {
        &self.pool
    }

    fn bind_args<'q>(
        mut query: sqlx::query::Query<'q, Postgres, PgArguments>,
        args: &[SqlValue],
    ) -> sqlx::query::Query<'q, Postgres, PgArguments> {
        for value in args {
            query = match value {
                SqlValue::Text(s) | SqlValue::Decimal(s) => query.bind(s.clone()),
                SqlValue::Int(i) => query.bind(*i),
                SqlValue::Float(f) => query.bind(*f),
                SqlValue::Bool(b) => query.bind(*b),
                SqlValue::Uuid(u) => query.bind(*u),
                SqlValue::Timestamp(ts) => query.bind(*ts),
                SqlValue::Json(v) => query.bind(v.clone()),
                SqlValue::Null => query.bind(Option::<String>::None),
            };
        }
        query
    }

    async fn run(&self, sql: &str, args: &[SqlValue]) -> Result<u64, DriverError> {
        tracing::debug!("[EXECUTE] {}", sql);
        let query = Self::bind_args(sqlx::query(sql), args);
        let mut guard = self.transaction.lock().await;
        let result = match guard.as_mut() {
            Some(tx) => query.execute(&mut **tx).await?,
            None => query.execute(&self.pool).await?,
        };
        Ok(result.rows_affected())
    }

    async fn fetch(&self, sql: &str, args: &[SqlValue]) -> Result<Vec<PgRow>, DriverError> {
        tracing::debug!("[FETCH] {}", sql);
        let query = Self::bind_args(sqlx::query(sql), args);
        let mut guard = self.transaction.lock().await;
        let rows = match guard.as_mut() {
            Some(tx) => query.fetch_all(&mut **tx).await?,
            None => query.fetch_all(&self.pool).await?,
        };
        Ok(rows)
    }

    fn decode_row(row: &PgRow) -> Result<Row, DriverError> {
        let mut out = Row::new();
        for (i, column) in row.columns().iter().enumerate() {
            let value = match column.type_info().name() {
                "BOOL" => row.try_get::<Option<bool>, _>(i)?.map(SqlValue::Bool),
                "INT2" => row
                    .try_get::<Option<i16>, _>(i)?
                    .map(|v| SqlValue::Int(v as i64)),
                "INT4" => row
                    .try_get::<Option<i32>, _>(i)?
                    .map(|v| SqlValue::Int(v as i64)),
                "INT8" => row.try_get::<Option<i64>, _>(i)?.map(SqlValue::Int),
                "FLOAT4" => row
                    .try_get::<Option<f32>, _>(i)?
                    .map(|v| SqlValue::Float(v as f64)),
                "FLOAT8" => row.try_get::<Option<f64>, _>(i)?.map(SqlValue::Float),
                "UUID" => row.try_get::<Option<uuid::Uuid>, _>(i)?.map(SqlValue::Uuid),
                "TIMESTAMPTZ" => row
                    .try_get::<Option<chrono::DateTime<chrono::Utc>>, _>(i)?
                    .map(SqlValue::Timestamp),
                "TIMESTAMP" => row
                    .try_get::<Option<chrono::NaiveDateTime>, _>(i)?
                    .map(|naive| SqlValue::Timestamp(naive.and_utc())),
                "JSON" | "JSONB" => row
                    .try_get::<Option<serde_json::Value>, _>(i)?
                    .map(SqlValue::Json),
                "TEXT" | "VARCHAR" | "BPCHAR" | "CHAR" | "NAME" => row
                    .try_get::<Option<String>, _>(i)?
                    .map(SqlValue::Text),
                other => {
                    tracing::warn!(
                        "[DECODE] column {} has unhandled type {}, reading as text",
                        column.name(),
                        other
                    );
                    row.try_get::<Option<String>, _>(i)
                        .ok()
                        .flatten()
                        .map(SqlValue::Text)
                }
            }
            .unwrap_or(SqlValue::Null);
            out.insert(column.name(), value);
        }
        Ok(out)
    }
}

#[async_trait]
impl Driver for PgDriver {
    fn name(&self) -> &'static str {
        "postgres"
    }

    async fn insert(
        &self,
        row: &Row,
        options: &QueryOptions,
        replace: bool,
    ) -> Result<u64, DriverError> {
        let (sql, args) = SqlRenderer::insert(row, options, replace)?;
        self.run(&sql, &args).await
    }

    async fn insert_all(
        &self,
        rows: &[Row],
        options: &QueryOptions,
        replace: bool,
    ) -> Result<u64, DriverError> {
        let (sql, args) = SqlRenderer::insert_all(rows, options, replace)?;
        self.run(&sql, &args).await
    }

    async fn update(
        &self,
        changes: &ChangeSet,
        options: &QueryOptions,
    ) -> Result<u64, DriverError> {
        let (sql, args) = SqlRenderer::update(changes, options)?;
        self.run(&sql, &args).await
    }

    async fn delete(&self, options: &QueryOptions) -> Result<u64, DriverError> {
        let (sql, args) = SqlRenderer::delete(options)?;
        self.run(&sql, &args).await
    }

    async fn select(&self, options: &QueryOptions) -> Result<Vec<Row>, DriverError> {
        let (sql, args) = SqlRenderer::select(options)?;
        let rows = self.fetch(&sql, &args).await?;
        rows.iter().map(Self::decode_row).collect()
    }

    async fn query(&self, sql: &str) -> Result<Vec<Row>, DriverError> {
        let rows = self.fetch(sql, &[]).await?;
        rows.iter().map(Self::decode_row).collect()
    }

    async fn execute(&self, sql: &str) -> Result<u64, DriverError> {
        self.run(sql, &[]).await
    }

    async fn describe_fields(&self, table: &str) -> Result<Vec<FieldDescription>, DriverError> {
        let rows = self
            .fetch(DESCRIBE_FIELDS_SQL, &[SqlValue::Text(table.to_string())])
            .await?;
        let mut fields = Vec::with_capacity(rows.len());
        for row in &rows {
            let name: String = row.try_get("column_name")?;
            let type_name: String = row.try_get("data_type")?;
            let default: String = row.try_get("column_default")?;
            let primary: bool = row.try_get("is_primary")?;
            let autoinc = default.starts_with("nextval(")
                || type_name.to_lowercase().contains("serial");
            fields.push(FieldDescription {
                name,
                type_name,
                primary,
                autoinc,
            });
        }
        Ok(fields)
    }

    async fn last_insert_id(&self) -> Result<Option<i64>, DriverError> {
        // lastval() errors when no sequence was touched this session
        match self.fetch("SELECT lastval() AS id", &[]).await {
            Ok(rows) => match rows.first() {
                Some(row) => Ok(row.try_get::<Option<i64>, _>("id").ok().flatten()),
                None => Ok(None),
            },
            Err(_) => Ok(None),
        }
    }

    async fn begin(&self) -> Result<(), DriverError> {
        let mut guard = self.transaction.lock().await;
        if let Some(tx) = guard.take() {
            tx.commit().await?;
        }
        *guard = Some(self.pool.begin().await?);
        Ok(())
    }

    async fn commit(&self) -> Result<(), DriverError> {
        let mut guard = self.transaction.lock().await;
        if let Some(tx) = guard.take() {
            tx.commit().await?;
        }
        Ok(())
    }

    async fn rollback(&self) -> Result<(), DriverError> {
        let mut guard = self.transaction.lock().await;
        if let Some(tx) = guard.take() {
            tx.rollback().await?;
        }
        Ok(())
    }

    fn escape(&self, value: &SqlValue) -> String {
        escape_literal(value)
    }
}
