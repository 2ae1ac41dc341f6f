//! SQL Execution Module
//!
//! Read-only execution of generated SQL against the row store, plus the
//! bounded repair loop that asks the text-generation backend to patch a
//! failing statement. Execution always runs read-only with a bounded
//! statement timeout; the repair loop's fail-fast-on-timeout
//! classification keys off the canonical error text the executor emits.

mod repair;
mod sqlite;

pub use repair::{RepairLoop, RepairOutcome, is_timeout_error};
pub use sqlite::SqliteExecutor;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};

/// Result of one SQL execution attempt. The repair loop produces a fresh
/// one per attempt and keeps only the error text of prior failures as
/// repair-prompt context.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct QueryResult {
    pub success: bool,
    pub rows: Vec<serde_json::Map<String, serde_json::Value>>,
    pub columns: Vec<String>,
    pub row_count: usize,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

impl QueryResult {
    pub fn ok(rows: Vec<serde_json::Map<String, serde_json::Value>>, columns: Vec<String>) -> Self {
        let row_count = rows.len();
        Self { success: true, rows, columns, row_count, error: None }
    }

    pub fn failure(error: impl Into<String>) -> Self {
        Self {
            success: false,
            rows: Vec::new(),
            columns: Vec::new(),
            row_count: 0,
            error: Some(error.into()),
        }
    }
}

/// Read-only SQL execution seam.
///
/// Implementations guarantee a read-only transaction with a bounded
/// statement timeout; this core never issues DDL/DML.
#[async_trait]
pub trait SqlExecutor: Send + Sync {
    async fn execute(&self, sql: &str) -> QueryResult;
}

#[cfg(test)]
mod tests;
