// Common test utilities and helpers

use std::collections::VecDeque;
use std::sync::{Arc, Mutex};

use async_trait::async_trait;
use sqlx::SqlitePool;

use crate::services::llm::{GenerateError, TextGenerator};

/// Scripted text-generation backend: replays queued responses in order
/// and records every prompt it was sent. An exhausted script answers
/// with a transport error, which exercises the degraded paths.
pub struct ScriptedBackend {
    responses: Mutex<VecDeque<Result<String, GenerateError>>>,
    prompts: Mutex<Vec<String>>,
}

impl ScriptedBackend {
    pub fn new(responses: Vec<Result<String, GenerateError>>) -> Arc<Self> {
        Arc::new(Self { responses: Mutex::new(responses.into()), prompts: Mutex::new(Vec::new()) })
    }

    pub fn replies(responses: &[&str]) -> Arc<Self> {
        Self::new(responses.iter().map(|r| Ok(r.to_string())).collect())
    }

    pub fn call_count(&self) -> usize {
        self.prompts.lock().unwrap().len()
    }

    pub fn prompt(&self, index: usize) -> String {
        self.prompts.lock().unwrap()[index].clone()
    }
}

#[async_trait]
impl TextGenerator for ScriptedBackend {
    async fn generate_text(
        &self,
        prompt: &str,
        _temperature: f64,
        _max_output_tokens: u32,
    ) -> Result<String, GenerateError> {
        self.prompts.lock().unwrap().push(prompt.to_string());
        self.responses
            .lock()
            .unwrap()
            .pop_front()
            .unwrap_or(Err(GenerateError::Api("script exhausted".to_string())))
    }
}

/// Create an in-memory SQLite database seeded with a 50-row orders table
/// and a small monthly series table.
pub async fn create_test_db() -> SqlitePool {
    let pool = SqlitePool::connect("sqlite::memory:")
        .await
        .expect("Failed to create test database");

    sqlx::query("CREATE TABLE orders (id TEXT, order_date TEXT, amount REAL)")
        .execute(&pool)
        .await
        .expect("Failed to create orders table");
    for i in 0..50 {
        sqlx::query("INSERT INTO orders VALUES (?, ?, ?)")
            .bind(format!("o{i}"))
            .bind(format!("2024-{:02}-{:02}", i % 3 + 1, i % 28 + 1))
            .bind(10.0 + i as f64)
            .execute(&pool)
            .await
            .expect("Failed to seed orders");
    }

    sqlx::query("CREATE TABLE monthly_orders (month TEXT, total INTEGER)")
        .execute(&pool)
        .await
        .expect("Failed to create monthly_orders table");
    for (month, total) in [("2024-01", 100), ("2024-02", 110), ("2024-03", 120)] {
        sqlx::query("INSERT INTO monthly_orders VALUES (?, ?)")
            .bind(month)
            .bind(total)
            .execute(&pool)
            .await
            .expect("Failed to seed monthly_orders");
    }

    pool
}
