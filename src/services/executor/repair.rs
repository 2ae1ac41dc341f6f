//! SQL repair loop
//!
//! Executes a statement and, on failure, asks the text-generation
//! backend to patch it, up to a fixed attempt budget. Timeout failures
//! fail fast: they are resource problems, not correctness defects the
//! model can fix.

use std::sync::Arc;

use once_cell::sync::Lazy;
use regex::Regex;

use crate::services::compiler::validate_sql_readonly;
use crate::services::llm::TextGenerator;

use super::{QueryResult, SqlExecutor};

const REPAIR_PROMPT: &str = include_str!("repair_prompt.md");

/// Execution attempts per statement, counting the initial one
pub const MAX_EXECUTION_ATTEMPTS: u32 = 3;

static TIMEOUT_REGEX: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"(?i)(timed out|statement timeout|canceling statement due to statement timeout)")
        .unwrap()
});

static CODE_FENCE_REGEX: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"(?s)```(?:sql)?\s*\n?(.*?)```").unwrap());

/// Classify an execution error as a statement timeout.
///
/// Matching is against the explicit documented phrases, not a ported
/// engine-specific regex; an execution backend only needs to emit one of
/// them.
pub fn is_timeout_error(error_text: &str) -> bool {
    TIMEOUT_REGEX.is_match(error_text)
}

/// Outcome of [`RepairLoop::execute_with_repair`]
#[derive(Debug)]
pub struct RepairOutcome {
    pub result: QueryResult,
    /// The SQL that produced `result`. After a successful repair this is
    /// the new source of truth for the owning panel.
    pub final_sql: String,
    pub was_repaired: bool,
    pub attempts: u32,
}

pub struct RepairLoop {
    executor: Arc<dyn SqlExecutor>,
    backend: Arc<dyn TextGenerator>,
    max_attempts: u32,
}

impl RepairLoop {
    pub fn new(executor: Arc<dyn SqlExecutor>, backend: Arc<dyn TextGenerator>) -> Self {
        Self { executor, backend, max_attempts: MAX_EXECUTION_ATTEMPTS }
    }

    pub fn with_max_attempts(mut self, max_attempts: u32) -> Self {
        self.max_attempts = max_attempts.max(1);
        self
    }

    /// Execute a statement, repairing it on non-timeout failures while
    /// the attempt budget lasts.
    pub async fn execute_with_repair(
        &self,
        sql: &str,
        question: &str,
        label: &str,
    ) -> RepairOutcome {
        let mut current_sql = sql.trim().to_string();
        let mut was_repaired = false;

        for attempt in 1..=self.max_attempts {
            // Mutation keywords never reach the database, repaired or not
            if let Err(reason) = validate_sql_readonly(&current_sql) {
                return RepairOutcome {
                    result: QueryResult::failure(reason.to_string()),
                    final_sql: current_sql,
                    was_repaired,
                    attempts: attempt,
                };
            }

            let result = self.executor.execute(&current_sql).await;
            if result.success {
                if was_repaired {
                    tracing::info!("repaired SQL succeeded for '{}' on attempt {}", label, attempt);
                }
                return RepairOutcome { result, final_sql: current_sql, was_repaired, attempts: attempt };
            }

            let error_text = result.error.clone().unwrap_or_default();
            if is_timeout_error(&error_text) {
                tracing::warn!("statement timeout for '{}', not repairable: {}", label, error_text);
                return RepairOutcome { result, final_sql: current_sql, was_repaired, attempts: attempt };
            }

            if attempt == self.max_attempts {
                tracing::warn!("repair budget exhausted for '{}': {}", label, error_text);
                return RepairOutcome { result, final_sql: current_sql, was_repaired, attempts: attempt };
            }

            tracing::info!(
                "execution failed for '{}' (attempt {}): {}, requesting repair",
                label,
                attempt,
                error_text
            );
            match self.request_repair(question, &current_sql, &error_text).await {
                Some(fixed) => {
                    current_sql = fixed;
                    was_repaired = true;
                },
                None => {
                    // Backend declined or returned unusable output
                    return RepairOutcome {
                        result,
                        final_sql: current_sql,
                        was_repaired,
                        attempts: attempt,
                    };
                },
            }
        }

        // The loop always returns from inside; this is unreachable with
        // max_attempts >= 1.
        RepairOutcome {
            result: QueryResult::failure("no execution attempts were made"),
            final_sql: current_sql,
            was_repaired,
            attempts: 0,
        }
    }

    async fn request_repair(&self, question: &str, sql: &str, error_text: &str) -> Option<String> {
        let prompt = format!(
            "{REPAIR_PROMPT}\n## Question\n\n{question}\n\n## Failing SQL\n\n{sql}\n\n## Error\n\n{error_text}\n"
        );
        match self.backend.generate_text(&prompt, 0.1, 1024).await {
            Ok(text) => extract_sql(&text),
            Err(e) => {
                tracing::warn!("repair request failed: {}", e);
                None
            },
        }
    }
}

/// Pull a usable SELECT out of the repair response, tolerating fences
fn extract_sql(text: &str) -> Option<String> {
    let candidate = CODE_FENCE_REGEX
        .captures(text)
        .and_then(|c| c.get(1))
        .map(|m| m.as_str())
        .unwrap_or(text)
        .trim()
        .trim_end_matches(';')
        .to_string();

    if candidate.is_empty() || candidate.eq_ignore_ascii_case("UNFIXABLE") {
        return None;
    }
    let upper = candidate.to_uppercase();
    if !upper.starts_with("SELECT") && !upper.starts_with("WITH") {
        return None;
    }
    Some(candidate)
}
