//! Question Compiler Module
//!
//! Owns the retry state machine that asks the text-generation backend
//! for an analytical plan, validates its shape against the schema, and
//! re-prompts with corrective hints on format or semantic failures.
//! Also hosts the compiler-adjacent backend calls: overview dashboards,
//! executive summaries, and failure explanations.

#[allow(clippy::module_inception)]
mod compiler;
mod prompts;
mod validator;

pub use compiler::{MAX_COMPILE_ATTEMPTS, QuestionCompiler, wants_forecast};
pub use prompts::RetryReason;
pub use validator::{ValidationError, validate_plan, validate_sql_readonly};

use thiserror::Error;

/// Errors from the non-compile backend calls (overview generation).
/// `compile` itself never errors; it synthesizes a refusal plan.
#[derive(Debug, Error)]
pub enum CompileError {
    #[error(transparent)]
    Generate(#[from] crate::services::llm::GenerateError),

    #[error(transparent)]
    Notation(#[from] crate::services::plan::NotationError),
}

/// Plain-language explanation attached to a failed execution
#[derive(Debug, Clone)]
pub struct FailureExplanation {
    pub message: String,
    pub suggestions: Vec<String>,
}
