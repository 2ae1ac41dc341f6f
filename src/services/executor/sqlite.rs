//! SQLite executor
//!
//! Runs generated SQL against a SQLite pool with `PRAGMA query_only`
//! forced on for the duration of the statement and a tokio-enforced
//! statement timeout. Timeouts surface with the canonical message the
//! repair loop classifies as non-repairable.

use std::time::Duration;

use async_trait::async_trait;
use sqlx::sqlite::SqliteRow;
use sqlx::{Column, Row, SqlitePool, TypeInfo, ValueRef};

use super::{QueryResult, SqlExecutor};

pub struct SqliteExecutor {
    pool: SqlitePool,
    statement_timeout: Duration,
}

impl SqliteExecutor {
    pub fn new(pool: SqlitePool, statement_timeout: Duration) -> Self {
        Self { pool, statement_timeout }
    }
}

#[async_trait]
impl SqlExecutor for SqliteExecutor {
    async fn execute(&self, sql: &str) -> QueryResult {
        let mut conn = match self.pool.acquire().await {
            Ok(conn) => conn,
            Err(e) => return QueryResult::failure(format!("connection error: {e}")),
        };

        if let Err(e) = sqlx::query("PRAGMA query_only = ON").execute(&mut *conn).await {
            return QueryResult::failure(format!("failed to enter read-only mode: {e}"));
        }

        let outcome =
            tokio::time::timeout(self.statement_timeout, sqlx::query(sql).fetch_all(&mut *conn))
                .await;

        // Restore the connection before it returns to the pool; ingestion
        // and profiling share it.
        let _ = sqlx::query("PRAGMA query_only = OFF").execute(&mut *conn).await;

        match outcome {
            Err(_) => QueryResult::failure(format!(
                "statement timed out after {}s",
                self.statement_timeout.as_secs()
            )),
            Ok(Err(e)) => QueryResult::failure(e.to_string()),
            Ok(Ok(rows)) => {
                let columns: Vec<String> = rows
                    .first()
                    .map(|row| row.columns().iter().map(|c| c.name().to_string()).collect())
                    .unwrap_or_default();
                let data = rows.iter().map(row_to_map).collect();
                QueryResult::ok(data, columns)
            },
        }
    }
}

fn row_to_map(row: &SqliteRow) -> serde_json::Map<String, serde_json::Value> {
    let mut map = serde_json::Map::new();
    for (idx, column) in row.columns().iter().enumerate() {
        map.insert(column.name().to_string(), column_value(row, idx));
    }
    map
}

/// Decode one cell into JSON by its SQLite storage class
fn column_value(row: &SqliteRow, idx: usize) -> serde_json::Value {
    let raw = match row.try_get_raw(idx) {
        Ok(raw) => raw,
        Err(_) => return serde_json::Value::Null,
    };
    if raw.is_null() {
        return serde_json::Value::Null;
    }
    match raw.type_info().name() {
        "INTEGER" => row
            .try_get::<i64, _>(idx)
            .map(serde_json::Value::from)
            .unwrap_or(serde_json::Value::Null),
        "REAL" => row
            .try_get::<f64, _>(idx)
            .map(serde_json::Value::from)
            .unwrap_or(serde_json::Value::Null),
        "BLOB" => serde_json::Value::Null,
        _ => row
            .try_get::<String, _>(idx)
            .map(serde_json::Value::from)
            .unwrap_or(serde_json::Value::Null),
    }
}
