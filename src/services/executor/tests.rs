//! Execution and repair loop unit tests

use std::collections::VecDeque;
use std::sync::{Arc, Mutex};
use std::time::Duration;

use async_trait::async_trait;
use sqlx::SqlitePool;

use crate::services::llm::{GenerateError, TextGenerator};

use super::*;

/// Executor stub replaying scripted results
struct ScriptedExecutor {
    results: Mutex<VecDeque<QueryResult>>,
    executed: Mutex<Vec<String>>,
}

impl ScriptedExecutor {
    fn new(results: Vec<QueryResult>) -> Arc<Self> {
        Arc::new(Self { results: Mutex::new(results.into()), executed: Mutex::new(Vec::new()) })
    }

    fn executed_sql(&self) -> Vec<String> {
        self.executed.lock().unwrap().clone()
    }
}

#[async_trait]
impl SqlExecutor for ScriptedExecutor {
    async fn execute(&self, sql: &str) -> QueryResult {
        self.executed.lock().unwrap().push(sql.to_string());
        self.results
            .lock()
            .unwrap()
            .pop_front()
            .unwrap_or_else(|| QueryResult::failure("script exhausted"))
    }
}

/// Backend stub counting repair requests
struct RepairBackend {
    responses: Mutex<VecDeque<Result<String, GenerateError>>>,
    calls: Mutex<u32>,
}

impl RepairBackend {
    fn new(responses: Vec<Result<String, GenerateError>>) -> Arc<Self> {
        Arc::new(Self { responses: Mutex::new(responses.into()), calls: Mutex::new(0) })
    }

    fn call_count(&self) -> u32 {
        *self.calls.lock().unwrap()
    }
}

#[async_trait]
impl TextGenerator for RepairBackend {
    async fn generate_text(
        &self,
        _prompt: &str,
        _temperature: f64,
        _max_output_tokens: u32,
    ) -> Result<String, GenerateError> {
        *self.calls.lock().unwrap() += 1;
        self.responses
            .lock()
            .unwrap()
            .pop_front()
            .unwrap_or(Err(GenerateError::Api("script exhausted".to_string())))
    }
}

fn one_row() -> QueryResult {
    let mut row = serde_json::Map::new();
    row.insert("total".to_string(), serde_json::json!(50));
    QueryResult::ok(vec![row], vec!["total".to_string()])
}

// ============================================================================
// Repair Loop
// ============================================================================

#[tokio::test]
async fn test_success_without_repair() {
    let executor = ScriptedExecutor::new(vec![one_row()]);
    let backend = RepairBackend::new(Vec::new());
    let repair = RepairLoop::new(executor.clone(), backend.clone());

    let outcome = repair
        .execute_with_repair("SELECT COUNT(*) AS total FROM orders", "how many orders", "stat")
        .await;

    assert!(outcome.result.success);
    assert!(!outcome.was_repaired);
    assert_eq!(outcome.attempts, 1);
    assert_eq!(backend.call_count(), 0);
    assert_eq!(outcome.final_sql, "SELECT COUNT(*) AS total FROM orders");
}

#[tokio::test]
async fn test_fail_fail_success_makes_two_repair_calls() {
    let executor = ScriptedExecutor::new(vec![
        QueryResult::failure("no such column: qty"),
        QueryResult::failure("no such column: amt"),
        one_row(),
    ]);
    let backend = RepairBackend::new(vec![
        Ok("SELECT SUM(amt) AS total FROM orders".to_string()),
        Ok("SELECT SUM(amount) AS total FROM orders".to_string()),
    ]);
    let repair = RepairLoop::new(executor.clone(), backend.clone());

    let outcome = repair
        .execute_with_repair("SELECT SUM(qty) AS total FROM orders", "total amount", "stat")
        .await;

    assert!(outcome.result.success);
    assert!(outcome.was_repaired);
    assert_eq!(outcome.attempts, 3);
    assert_eq!(backend.call_count(), 2, "exactly 2 repair calls expected");
    assert_eq!(outcome.final_sql, "SELECT SUM(amount) AS total FROM orders");
    assert_eq!(executor.executed_sql().len(), 3);
}

#[tokio::test]
async fn test_timeout_fails_fast_with_zero_repair_calls() {
    let executor = ScriptedExecutor::new(vec![QueryResult::failure(
        "statement timed out after 10s",
    )]);
    let backend = RepairBackend::new(vec![Ok("SELECT 1".to_string())]);
    let repair = RepairLoop::new(executor, backend.clone());

    let outcome = repair
        .execute_with_repair("SELECT * FROM huge_table", "everything", "table")
        .await;

    assert!(!outcome.result.success);
    assert!(!outcome.was_repaired);
    assert_eq!(outcome.attempts, 1);
    assert_eq!(backend.call_count(), 0, "timeouts must not spend repair calls");
}

#[tokio::test]
async fn test_budget_exhaustion_reports_last_failure() {
    let executor = ScriptedExecutor::new(vec![
        QueryResult::failure("error one"),
        QueryResult::failure("error two"),
        QueryResult::failure("error three"),
    ]);
    let backend = RepairBackend::new(vec![
        Ok("SELECT 1 AS a".to_string()),
        Ok("SELECT 2 AS b".to_string()),
    ]);
    let repair = RepairLoop::new(executor, backend.clone());

    let outcome = repair.execute_with_repair("SELECT 0 AS z", "q", "panel").await;

    assert!(!outcome.result.success);
    assert_eq!(outcome.attempts, 3);
    assert_eq!(outcome.result.error.as_deref(), Some("error three"));
    assert_eq!(backend.call_count(), 2);
}

#[tokio::test]
async fn test_unusable_repair_stops_the_loop() {
    let executor = ScriptedExecutor::new(vec![QueryResult::failure("syntax error")]);
    let backend = RepairBackend::new(vec![Ok("UNFIXABLE".to_string())]);
    let repair = RepairLoop::new(executor.clone(), backend.clone());

    let outcome = repair.execute_with_repair("SELEC 1", "q", "panel").await;

    assert!(!outcome.result.success);
    assert_eq!(outcome.attempts, 1);
    assert_eq!(backend.call_count(), 1);
    assert_eq!(executor.executed_sql().len(), 1);
}

#[tokio::test]
async fn test_backend_error_during_repair_stops_the_loop() {
    let executor = ScriptedExecutor::new(vec![QueryResult::failure("syntax error")]);
    let backend = RepairBackend::new(vec![Err(GenerateError::Timeout(30))]);
    let repair = RepairLoop::new(executor, backend);

    let outcome = repair.execute_with_repair("SELEC 1", "q", "panel").await;
    assert!(!outcome.result.success);
    assert_eq!(outcome.result.error.as_deref(), Some("syntax error"));
}

#[tokio::test]
async fn test_mutation_sql_rejected_before_execution() {
    let executor = ScriptedExecutor::new(vec![one_row()]);
    let backend = RepairBackend::new(Vec::new());
    let repair = RepairLoop::new(executor.clone(), backend);

    let outcome = repair.execute_with_repair("DROP TABLE orders", "q", "panel").await;
    assert!(!outcome.result.success);
    assert!(outcome.result.error.as_deref().unwrap_or("").contains("forbidden keyword"));
    assert!(executor.executed_sql().is_empty(), "mutation must never reach the executor");
}

#[tokio::test]
async fn test_repaired_sql_inside_code_fence_is_extracted() {
    let executor = ScriptedExecutor::new(vec![
        QueryResult::failure("no such column: x"),
        one_row(),
    ]);
    let backend = RepairBackend::new(vec![Ok(
        "Here you go:\n```sql\nSELECT COUNT(*) AS total FROM orders;\n```".to_string(),
    )]);
    let repair = RepairLoop::new(executor.clone(), backend);

    let outcome = repair.execute_with_repair("SELECT x FROM orders", "q", "panel").await;
    assert!(outcome.result.success);
    assert_eq!(outcome.final_sql, "SELECT COUNT(*) AS total FROM orders");
}

#[test]
fn test_timeout_classification_patterns() {
    assert!(is_timeout_error("statement timed out after 10s"));
    assert!(is_timeout_error("ERROR: canceling statement due to statement timeout"));
    assert!(is_timeout_error("Query TIMED OUT"));
    assert!(!is_timeout_error("no such column: qty"));
    assert!(!is_timeout_error("syntax error near SELEC"));
}

// ============================================================================
// SQLite Executor
// ============================================================================

async fn seeded_pool() -> SqlitePool {
    let pool = SqlitePool::connect("sqlite::memory:").await.unwrap();
    sqlx::query("CREATE TABLE orders (id TEXT, amount REAL)")
        .execute(&pool)
        .await
        .unwrap();
    for i in 0..50 {
        sqlx::query("INSERT INTO orders VALUES (?, ?)")
            .bind(format!("o{i}"))
            .bind(10.0 + i as f64)
            .execute(&pool)
            .await
            .unwrap();
    }
    pool
}

#[tokio::test]
async fn test_sqlite_executor_counts_rows() {
    let executor = SqliteExecutor::new(seeded_pool().await, Duration::from_secs(10));
    let result = executor.execute("SELECT COUNT(*) AS total FROM orders").await;

    assert!(result.success, "error: {:?}", result.error);
    assert_eq!(result.row_count, 1);
    assert_eq!(result.columns, vec!["total".to_string()]);
    assert_eq!(result.rows[0].get("total"), Some(&serde_json::json!(50)));
}

#[tokio::test]
async fn test_sqlite_executor_surfaces_errors() {
    let executor = SqliteExecutor::new(seeded_pool().await, Duration::from_secs(10));
    let result = executor.execute("SELECT missing_column FROM orders").await;
    assert!(!result.success);
    assert!(result.error.is_some());
}

#[tokio::test]
async fn test_sqlite_executor_blocks_writes() {
    let executor = SqliteExecutor::new(seeded_pool().await, Duration::from_secs(10));
    let result = executor.execute("INSERT INTO orders VALUES ('x', 1.0)").await;
    assert!(!result.success, "query_only must reject writes");
}

#[tokio::test]
async fn test_sqlite_executor_mixed_types() {
    let executor = SqliteExecutor::new(seeded_pool().await, Duration::from_secs(10));
    let result = executor
        .execute("SELECT id, amount, NULL AS missing FROM orders ORDER BY id LIMIT 1")
        .await;

    assert!(result.success);
    let row = &result.rows[0];
    assert_eq!(row.get("id"), Some(&serde_json::json!("o0")));
    assert_eq!(row.get("amount"), Some(&serde_json::json!(10.0)));
    assert_eq!(row.get("missing"), Some(&serde_json::Value::Null));
}
