//! Compiler prompts
//!
//! Prompt templates for every compiler-owned backend call. The large
//! static parts live in markdown files next to this module; dynamic
//! context (schema, question, retry hints) is spliced in here.

use crate::services::executor::QueryResult;

pub const PLAN_PROMPT: &str = include_str!("plan_prompt.md");
pub const OVERVIEW_PROMPT: &str = include_str!("overview_prompt.md");

/// Reason the previous compile attempt failed, driving the next
/// attempt's corrective hint. Each variant consumes one retry and has
/// its own hint text.
#[derive(Debug, Clone)]
pub enum RetryReason {
    /// The reply was not parseable plan notation
    Format(String),
    /// The question asks for a forecast but the plan refused on grounds
    /// resembling "forecasting is not supported"
    ForecastRefusal,
    /// The plan parsed but failed schema/shape validation
    Validation(String),
}

impl RetryReason {
    pub fn hint(&self) -> String {
        match self {
            Self::Format(error) => format!(
                "Your previous reply was not valid plan notation ({error}). \
                 You MUST emit exactly one @plan{{...}} object in the documented \
                 notation, with no surrounding prose."
            ),
            Self::ForecastRefusal => "IMPORTANT: Forecasting IS supported by this platform. \
                 Do not refuse the question. Produce a feasible plan whose \
                 time-series panel carries a forecast:@forecast{...} spec with \
                 strategy:auto and a sensible horizon."
                .to_string(),
            Self::Validation(error) => format!(
                "Your previous plan failed validation: {error}. Correct this \
                 and emit a valid @plan object."
            ),
        }
    }
}

pub fn plan_prompt(schema_context: &str, question: &str, hint: Option<&RetryReason>) -> String {
    let mut prompt = PLAN_PROMPT.replace("{schema_context}", schema_context);
    prompt.push_str("\n\nQuestion: ");
    prompt.push_str(question);
    if let Some(reason) = hint {
        prompt.push_str("\n\n");
        prompt.push_str(&reason.hint());
    }
    prompt
}

pub fn overview_prompt(schema_context: &str) -> String {
    OVERVIEW_PROMPT.replace("{schema_context}", schema_context)
}

/// Plain-language executive summary of a successful result
pub fn summary_prompt(question: &str, result: &QueryResult) -> String {
    let sample: Vec<&serde_json::Map<String, serde_json::Value>> =
        result.rows.iter().take(5).collect();
    let sample_json = serde_json::to_string(&sample).unwrap_or_else(|_| "[]".to_string());
    format!(
        "Summarize this query result for a business reader in 2-3 plain \
         sentences. No markdown, no bullet points.\n\n\
         Question: {question}\nRow count: {}\nFirst rows: {sample_json}\n",
        result.row_count
    )
}

/// Plain-language explanation of a failed execution, with alternatives
pub fn failure_prompt(question: &str, error_text: &str) -> String {
    format!(
        "A SQL query for the question below failed. Explain what went wrong \
         in plain language and suggest alternative questions the data can \
         answer.\n\nRespond with a single @refusal{{reason:\"<plain-language \
         explanation>\" followUps:[\"<alternative question>\",...]}} object \
         and nothing else.\n\nQuestion: {question}\nDatabase error: {error_text}\n"
    )
}
