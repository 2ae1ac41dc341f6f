//! Question compiler
//!
//! The bounded retry state machine that turns a free-text question into
//! an [`AnalyticalPlan`]. Each attempt sends one prompt to the backend,
//! parses the reply, and either returns, or retries with a corrective
//! hint keyed to why the attempt failed. Compilation never throws past
//! the caller: exhaustion synthesizes a refusal plan.

use std::collections::BTreeMap;
use std::sync::Arc;

use once_cell::sync::Lazy;
use regex::Regex;

use crate::services::llm::TextGenerator;
use crate::services::plan::{AnalyticalPlan, DashboardSpec, parse_dashboard, parse_plan};
use crate::services::schema::{DatasetProfile, schema_context};

use super::prompts::{self, RetryReason};
use super::validator::validate_plan;
use super::{CompileError, FailureExplanation};

/// Backend calls per compile request, counting the first attempt
pub const MAX_COMPILE_ATTEMPTS: u32 = 3;

const COMPILE_TEMPERATURE: f64 = 0.1;
const COMPILE_MAX_TOKENS: u32 = 2048;
const OVERVIEW_MAX_TOKENS: u32 = 4096;

static FORECAST_INTENT_REGEX: Lazy<Regex> = Lazy::new(|| {
    Regex::new(
        r"(?i)\b(forecast|predict|projection|project(ed|ion)?|extrapolate|trend|next (month|quarter|year|week)|future)\b",
    )
    .unwrap()
});

static FORECAST_REFUSAL_REGEX: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"(?i)(forecast|predict|future)").unwrap()
});

static UNSUPPORTED_REGEX: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"(?i)(not supported|unsupported|cannot|can't|unable|do(es)? not support|only historical)")
        .unwrap()
});

/// Does the question imply a future projection?
pub fn wants_forecast(question: &str) -> bool {
    FORECAST_INTENT_REGEX.is_match(question)
}

/// Does a refusal's reason resemble "forecasting is not supported"?
fn refuses_forecast(plan: &AnalyticalPlan) -> bool {
    let reason = plan.reason.as_deref().unwrap_or("");
    FORECAST_REFUSAL_REGEX.is_match(reason) && UNSUPPORTED_REGEX.is_match(reason)
}

fn generic_follow_ups() -> Vec<String> {
    vec![
        "What does the overall data look like?".to_string(),
        "How many rows does each table have?".to_string(),
        "Show the trend of the main metric over time".to_string(),
    ]
}

pub struct QuestionCompiler {
    backend: Arc<dyn TextGenerator>,
    profiles: BTreeMap<String, DatasetProfile>,
    schema_context: String,
    max_attempts: u32,
}

impl QuestionCompiler {
    pub fn new(backend: Arc<dyn TextGenerator>, profiles: BTreeMap<String, DatasetProfile>) -> Self {
        let schema_context = schema_context(&profiles);
        Self { backend, profiles, schema_context, max_attempts: MAX_COMPILE_ATTEMPTS }
    }

    pub fn with_max_attempts(mut self, max_attempts: u32) -> Self {
        self.max_attempts = max_attempts.max(1);
        self
    }

    /// Compile a question into a plan. Always returns a well-formed plan
    /// value; compilation failure is a synthesized refusal, never an
    /// error.
    pub async fn compile(&self, question: &str) -> AnalyticalPlan {
        let mut hint: Option<RetryReason> = None;
        let mut last_error = String::from("no attempts were made");

        for attempt in 1..=self.max_attempts {
            let prompt = prompts::plan_prompt(&self.schema_context, question, hint.as_ref());

            let text = match self
                .backend
                .generate_text(&prompt, COMPILE_TEMPERATURE, COMPILE_MAX_TOKENS)
                .await
            {
                Ok(text) => text,
                Err(e) => {
                    // Transport failures gain nothing from a new hint;
                    // retry the same prompt while budget lasts.
                    tracing::warn!("compile attempt {} backend error: {}", attempt, e);
                    last_error = e.to_string();
                    continue;
                },
            };

            let plan = match parse_plan(&text) {
                Ok(plan) => plan,
                Err(e) => {
                    tracing::info!("compile attempt {} returned malformed notation: {}", attempt, e);
                    last_error = e.to_string();
                    hint = Some(RetryReason::Format(e.to_string()));
                    continue;
                },
            };

            // Semantic mismatch: the model declined a forecast-capable
            // question claiming forecasts are unsupported.
            if !plan.feasible && wants_forecast(question) && refuses_forecast(&plan) {
                tracing::info!("compile attempt {} refused a forecast question, overriding", attempt);
                last_error = plan
                    .reason
                    .clone()
                    .unwrap_or_else(|| "model refused a forecast-capable question".to_string());
                hint = Some(RetryReason::ForecastRefusal);
                continue;
            }

            if let Err(e) = validate_plan(&plan, &self.profiles) {
                tracing::info!("compile attempt {} failed validation: {}", attempt, e);
                last_error = e.to_string();
                hint = Some(RetryReason::Validation(e.to_string()));
                continue;
            }

            tracing::debug!(
                "compiled plan on attempt {}: feasible={} panels={}",
                attempt,
                plan.feasible,
                plan.panels.len()
            );
            return plan;
        }

        tracing::warn!("compilation exhausted after {} attempts: {}", self.max_attempts, last_error);
        AnalyticalPlan::refusal(question, &last_error, generic_follow_ups())
    }

    /// Generate an overview dashboard for all available data
    pub async fn generate_overview(&self) -> Result<DashboardSpec, CompileError> {
        let prompt = prompts::overview_prompt(&self.schema_context);
        let text = self.backend.generate_text(&prompt, 0.2, OVERVIEW_MAX_TOKENS).await?;
        Ok(parse_dashboard(&text)?)
    }

    /// Executive summary of a successful result. Best-effort: summary
    /// failures never fail the request.
    pub async fn summarize_result(
        &self,
        question: &str,
        result: &crate::services::executor::QueryResult,
    ) -> Option<String> {
        let prompt = prompts::summary_prompt(question, result);
        match self.backend.generate_text(&prompt, 0.3, 512).await {
            Ok(text) => {
                let summary = text.trim().to_string();
                (!summary.is_empty()).then_some(summary)
            },
            Err(e) => {
                tracing::debug!("summary generation failed: {}", e);
                None
            },
        }
    }

    /// Plain-language explanation for a failed execution, with
    /// alternative questions. Falls back to the raw error when the
    /// backend cannot help.
    pub async fn explain_failure(&self, question: &str, error_text: &str) -> FailureExplanation {
        let prompt = prompts::failure_prompt(question, error_text);
        if let Ok(text) = self.backend.generate_text(&prompt, 0.3, 512).await
            && let Ok(plan) = parse_plan(&text)
            && let Some(reason) = plan.reason
        {
            return FailureExplanation {
                message: reason,
                suggestions: if plan.follow_ups.is_empty() {
                    generic_follow_ups()
                } else {
                    plan.follow_ups
                },
            };
        }
        FailureExplanation {
            message: format!("The query failed to execute: {error_text}"),
            suggestions: generic_follow_ups(),
        }
    }
}
