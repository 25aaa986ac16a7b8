use chrono::DateTime;
use duckdb::types::{TimeUnit, ValueRef};
use r2d2::Pool;
use serde_json::Value;
use std::error::Error;
use std::time::Duration;
use tracing::{info, warn};

use crate::db::pool::DuckDbConnectionManager;
use crate::rag::models::{ExecutionMetadata, Row, SqlGeneration};
use crate::rag::safety;

type BlockingResult = Result<Vec<Row>, Box<dyn Error + Send + Sync>>;

/// Runs validator-approved SQL against the store and shapes the result set
/// into ordered column->value records.
///
/// This is a total function over its input: every failure mode (safety
/// rejection, pool exhaustion, SQL error, timeout) is converted into
/// `(None, Failure)` and never propagated.
pub struct SqlExecutor {
    pool: Pool<DuckDbConnectionManager>,
    statement_timeout: Duration,
}

impl SqlExecutor {
    pub fn new(pool: Pool<DuckDbConnectionManager>, statement_timeout: Duration) -> Self {
        Self {
            pool,
            statement_timeout,
        }
    }

    pub async fn execute(&self, generated: &SqlGeneration) -> (Option<Vec<Row>>, ExecutionMetadata) {
        if !safety::validate_sql(&generated.sql) {
            warn!("SQL query failed safety validation: {}", generated.sql);
            return (
                None,
                ExecutionMetadata::Failure {
                    error: "Query failed safety validation".to_string(),
                },
            );
        }

        let pool = self.pool.clone();
        let sql = generated.sql.clone();

        let task = tokio::task::spawn_blocking(move || -> BlockingResult {
            let conn = pool.get()?;
            let mut stmt = conn.prepare(&sql)?;

            let column_count = stmt.column_count();
            let mut columns = Vec::with_capacity(column_count);
            for i in 0..column_count {
                columns.push(stmt.column_name(i)?.to_string());
            }

            let mut records = Vec::new();
            let mut rows = stmt.query([])?;
            while let Some(row) = rows.next()? {
                let mut record = Row::new();
                for (i, name) in columns.iter().enumerate() {
                    record.insert(name.clone(), value_to_json(row.get_ref(i)?));
                }
                records.push(record);
            }

            Ok(records)
        });

        let outcome = match tokio::time::timeout(self.statement_timeout, task).await {
            Ok(Ok(result)) => result,
            Ok(Err(join_err)) => Err(join_err.into()),
            Err(_) => Err(format!(
                "statement timed out after {}s",
                self.statement_timeout.as_secs()
            )
            .into()),
        };

        match outcome {
            Ok(rows) => {
                info!("SQL executed successfully: {} rows returned", rows.len());
                let metadata = ExecutionMetadata::Success {
                    query: generated.sql.clone(),
                    explanation: generated.explanation.clone(),
                    rows_returned: rows.len(),
                    safety_checks: generated.safety_checks.clone(),
                };
                (Some(rows), metadata)
            }
            Err(e) => {
                warn!("SQL execution failed: {}", e);
                (
                    None,
                    ExecutionMetadata::Failure {
                        error: e.to_string(),
                    },
                )
            }
        }
    }
}

fn value_to_json(value: ValueRef<'_>) -> Value {
    match value {
        ValueRef::Null => Value::Null,
        ValueRef::Boolean(b) => Value::Bool(b),
        ValueRef::TinyInt(i) => Value::from(i),
        ValueRef::SmallInt(i) => Value::from(i),
        ValueRef::Int(i) => Value::from(i),
        ValueRef::BigInt(i) => Value::from(i),
        ValueRef::HugeInt(i) => i64::try_from(i)
            .map(Value::from)
            .unwrap_or_else(|_| Value::String(i.to_string())),
        ValueRef::UTinyInt(i) => Value::from(i),
        ValueRef::USmallInt(i) => Value::from(i),
        ValueRef::UInt(i) => Value::from(i),
        ValueRef::UBigInt(i) => Value::from(i),
        ValueRef::Float(f) => serde_json::Number::from_f64(f as f64)
            .map(Value::Number)
            .unwrap_or(Value::Null),
        ValueRef::Double(d) => serde_json::Number::from_f64(d)
            .map(Value::Number)
            .unwrap_or(Value::Null),
        ValueRef::Decimal(d) => Value::String(d.to_string()),
        ValueRef::Text(bytes) => Value::String(String::from_utf8_lossy(bytes).to_string()),
        ValueRef::Timestamp(unit, raw) => timestamp_to_json(unit, raw),
        ValueRef::Date32(days) => DateTime::from_timestamp(i64::from(days) * 86_400, 0)
            .map(|dt| Value::String(dt.date_naive().to_string()))
            .unwrap_or(Value::Null),
        other => Value::String(format!("{:?}", other)),
    }
}

fn timestamp_to_json(unit: TimeUnit, raw: i64) -> Value {
    let micros = match unit {
        TimeUnit::Second => raw.saturating_mul(1_000_000),
        TimeUnit::Millisecond => raw.saturating_mul(1_000),
        TimeUnit::Microsecond => raw,
        TimeUnit::Nanosecond => raw / 1_000,
    };
    DateTime::from_timestamp_micros(micros)
        .map(|dt| Value::String(dt.to_rfc3339()))
        .unwrap_or(Value::Null)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn test_pool() -> Pool<DuckDbConnectionManager> {
        // A single shared in-memory connection; each `connect` would
        // otherwise open an unrelated database.
        Pool::builder()
            .max_size(1)
            .build(DuckDbConnectionManager::new(":memory:".to_string()))
            .unwrap()
    }

    fn generation(sql: &str) -> SqlGeneration {
        SqlGeneration {
            sql: sql.to_string(),
            explanation: "test".to_string(),
            estimated_rows: 0,
            safety_checks: vec!["read-only".to_string()],
        }
    }

    #[tokio::test]
    async fn rejects_unsafe_sql_without_touching_store() {
        let executor = SqlExecutor::new(test_pool(), Duration::from_secs(5));
        let (rows, metadata) = executor.execute(&generation("DROP TABLE argo_profiles")).await;

        assert!(rows.is_none());
        assert_eq!(
            metadata,
            ExecutionMetadata::Failure {
                error: "Query failed safety validation".to_string()
            }
        );
    }

    #[tokio::test]
    async fn returns_rows_in_column_order() {
        let pool = test_pool();
        {
            let conn = pool.get().unwrap();
            conn.execute_batch(
                "CREATE TABLE obs (latitude DOUBLE, longitude DOUBLE, avg_temp DOUBLE);
                 INSERT INTO obs VALUES (-15.2, 72.3, 24.5), (-10.0, 65.0, 26.1);",
            )
            .unwrap();
        }

        let executor = SqlExecutor::new(pool, Duration::from_secs(5));
        let (rows, metadata) = executor
            .execute(&generation(
                "SELECT latitude, longitude, avg_temp FROM obs LIMIT 10",
            ))
            .await;

        let rows = rows.expect("expected rows");
        assert_eq!(rows.len(), 2);
        let columns: Vec<&String> = rows[0].keys().collect();
        assert_eq!(columns, ["latitude", "longitude", "avg_temp"]);
        assert_eq!(rows[0]["latitude"], serde_json::json!(-15.2));
        match metadata {
            ExecutionMetadata::Success { rows_returned, .. } => assert_eq!(rows_returned, 2),
            other => panic!("unexpected metadata: {:?}", other),
        }
    }

    #[tokio::test]
    async fn execution_error_is_shaped_not_raised() {
        let executor = SqlExecutor::new(test_pool(), Duration::from_secs(5));
        let (rows, metadata) = executor
            .execute(&generation("SELECT * FROM missing_table LIMIT 5"))
            .await;

        assert!(rows.is_none());
        assert!(matches!(metadata, ExecutionMetadata::Failure { .. }));
    }

    #[tokio::test]
    async fn null_values_survive_shaping() {
        let pool = test_pool();
        {
            let conn = pool.get().unwrap();
            conn.execute_batch(
                "CREATE TABLE sparse (a INTEGER, b VARCHAR);
                 INSERT INTO sparse VALUES (1, NULL);",
            )
            .unwrap();
        }

        let executor = SqlExecutor::new(pool, Duration::from_secs(5));
        let (rows, _) = executor
            .execute(&generation("SELECT a, b FROM sparse LIMIT 1"))
            .await;

        let rows = rows.unwrap();
        assert_eq!(rows[0]["b"], Value::Null);
    }
}
