//! Request-scoped orchestration
//!
//! One inbound question runs: compile, then all panel SQL concurrently
//! (each inside its own repair loop), then forecast overlays for panels
//! that carry a spec, then an executive summary or failure explanation.
//! Repaired SQL is spliced back onto the owning panel before the plan is
//! handed to persistence. The pipeline keeps no state across requests
//! beyond the session's query lineage.

use std::collections::BTreeMap;
use std::sync::{Arc, Mutex};

use tokio::task::JoinSet;
use uuid::Uuid;

use super::compiler::{FailureExplanation, QuestionCompiler};
use super::executor::{QueryResult, RepairLoop, SqlExecutor};
use super::forecast::{ForecastDefaults, ForecastEngine, ForecastOutcome};
use super::llm::TextGenerator;
use super::plan::{AnalyticalPlan, PanelSpec};
use super::schema::DatasetProfile;

/// Execution result for one panel
#[derive(Debug)]
pub struct PanelResult {
    pub title: String,
    pub final_sql: String,
    pub result: QueryResult,
    pub was_repaired: bool,
    pub attempts: u32,
    pub forecast: Option<ForecastOutcome>,
    /// Set when the overlay degraded; the query result above stays valid
    pub forecast_error: Option<String>,
}

/// Everything a persistence or rendering collaborator needs for one
/// answered question.
#[derive(Debug)]
pub struct AskOutcome {
    pub request_id: String,
    pub plan: AnalyticalPlan,
    pub panels: Vec<PanelResult>,
    pub explanation: Option<FailureExplanation>,
}

/// One unit of panel execution: which plan panel it belongs to (None for
/// the implicit panel synthesized from top-level SQL), and the SQL to run.
#[derive(Debug, Clone)]
struct ExecPanel {
    plan_index: Option<usize>,
    sql: String,
    title: String,
}

pub struct AnalyticsPipeline {
    compiler: QuestionCompiler,
    backend: Arc<dyn TextGenerator>,
    executor: Arc<dyn SqlExecutor>,
    repair: Arc<RepairLoop>,
    forecast: ForecastEngine,
    lineage: Mutex<QueryLineage>,
}

impl AnalyticsPipeline {
    pub fn new(
        backend: Arc<dyn TextGenerator>,
        executor: Arc<dyn SqlExecutor>,
        profiles: BTreeMap<String, DatasetProfile>,
        forecast_defaults: ForecastDefaults,
    ) -> Self {
        Self {
            compiler: QuestionCompiler::new(backend.clone(), profiles),
            repair: Arc::new(RepairLoop::new(executor.clone(), backend.clone())),
            forecast: ForecastEngine::new(backend.clone(), forecast_defaults),
            backend,
            executor,
            lineage: Mutex::new(QueryLineage::default()),
        }
    }

    pub fn with_max_compile_attempts(mut self, max_attempts: u32) -> Self {
        self.compiler = self.compiler.with_max_attempts(max_attempts);
        self
    }

    pub fn with_max_execution_attempts(mut self, max_attempts: u32) -> Self {
        self.repair = Arc::new(
            RepairLoop::new(self.executor.clone(), self.backend.clone())
                .with_max_attempts(max_attempts),
        );
        self
    }

    pub fn compiler(&self) -> &QuestionCompiler {
        &self.compiler
    }

    /// Answer one question end to end
    pub async fn ask(&self, question: &str) -> AskOutcome {
        let request_id = Uuid::new_v4().to_string();
        tracing::info!(request_id = %request_id, "question: {}", question);

        let mut plan = self.compiler.compile(question).await;

        if !plan.is_feasible() {
            tracing::info!("plan is not feasible: {:?}", plan.reason);
            self.record(question, &plan, &[]);
            return AskOutcome { request_id, plan, panels: Vec::new(), explanation: None };
        }

        let exec_panels = executable_panels(&plan);
        let executed = self.execute_panels(question, exec_panels).await;

        let mut panel_results = Vec::with_capacity(executed.len());
        for (exec, outcome) in executed {
            // A successful repair becomes the panel's source of truth
            if outcome.was_repaired
                && let Some(index) = exec.plan_index
            {
                plan.panels[index].sql = Some(outcome.final_sql.clone());
            }

            let panel_spec = exec.plan_index.map(|i| plan.panels[i].clone());
            let mut result = outcome.result;
            let (forecast, forecast_error) = match &panel_spec {
                Some(panel) => self.forecast_overlay(panel, &result).await,
                None => (None, None),
            };
            if let (Some(outcome), Some(panel)) = (&forecast, &panel_spec) {
                merge_overlay(&mut result, panel, outcome);
            }

            panel_results.push(PanelResult {
                title: exec.title,
                final_sql: outcome.final_sql,
                result,
                was_repaired: outcome.was_repaired,
                attempts: outcome.attempts,
                forecast,
                forecast_error,
            });
        }

        let explanation = match panel_results.iter().find(|p| p.result.success) {
            Some(success) => {
                plan.executive_summary =
                    self.compiler.summarize_result(question, &success.result).await;
                None
            },
            None => {
                let error_text = panel_results
                    .iter()
                    .find_map(|p| p.result.error.clone())
                    .unwrap_or_else(|| "unknown execution failure".to_string());
                Some(self.compiler.explain_failure(question, &error_text).await)
            },
        };

        self.record(question, &plan, &panel_results);
        AskOutcome { request_id, plan, panels: panel_results, explanation }
    }

    /// Run every panel's SQL concurrently. Panels are independent
    /// read-only queries; repair requests are intentionally not
    /// deduplicated across panels sharing identical failing SQL.
    async fn execute_panels(
        &self,
        question: &str,
        panels: Vec<ExecPanel>,
    ) -> Vec<(ExecPanel, super::executor::RepairOutcome)> {
        let mut join_set = JoinSet::new();
        for (order, exec) in panels.into_iter().enumerate() {
            let repair = Arc::clone(&self.repair);
            let question = question.to_string();
            join_set.spawn(async move {
                let outcome =
                    repair.execute_with_repair(&exec.sql, &question, &exec.title).await;
                (order, exec, outcome)
            });
        }

        let mut results = Vec::new();
        while let Some(joined) = join_set.join_next().await {
            match joined {
                Ok((order, exec, outcome)) => results.push((order, exec, outcome)),
                Err(e) => tracing::error!("panel execution task failed: {}", e),
            }
        }
        results.sort_by_key(|(order, _, _)| *order);
        results.into_iter().map(|(_, exec, outcome)| (exec, outcome)).collect()
    }

    /// Compute the overlay for a forecast-carrying panel. Failures
    /// degrade only this panel's overlay.
    async fn forecast_overlay(
        &self,
        panel: &PanelSpec,
        result: &QueryResult,
    ) -> (Option<ForecastOutcome>, Option<String>) {
        let Some(spec) = &panel.forecast else {
            return (None, None);
        };
        if !result.success {
            return (None, Some("panel query failed; no series to forecast".to_string()));
        }

        let series = extract_series(result, panel);
        match self.forecast.forecast(&series, spec).await {
            Ok(outcome) => (Some(outcome), None),
            Err(e) => {
                tracing::warn!("forecast for '{}' failed: {}", panel.title, e);
                (None, Some(e.to_string()))
            },
        }
    }

    fn record(&self, question: &str, plan: &AnalyticalPlan, panels: &[PanelResult]) {
        let row_count = panels.iter().map(|p| p.result.row_count).sum();
        let error = panels
            .iter()
            .find_map(|p| p.result.error.clone())
            .or_else(|| (!plan.feasible).then(|| plan.reason.clone().unwrap_or_default()));
        self.lineage.lock().unwrap().record(LineageEntry {
            question: question.to_string(),
            feasible: plan.is_feasible(),
            row_count,
            error,
        });
    }

    pub fn history(&self, limit: usize) -> Vec<LineageEntry> {
        self.lineage.lock().unwrap().recent(limit)
    }

    pub fn clear_history(&self) {
        self.lineage.lock().unwrap().clear();
    }
}

/// Resolve which SQL runs for which panel. A plan whose only SQL is
/// top-level gets one implicit result panel.
fn executable_panels(plan: &AnalyticalPlan) -> Vec<ExecPanel> {
    let mut panels = Vec::new();
    for (index, panel) in plan.panels.iter().enumerate() {
        if let Some(sql) = panel.sql.as_deref().or(plan.sql.as_deref()) {
            panels.push(ExecPanel {
                plan_index: Some(index),
                sql: sql.to_string(),
                title: panel.title.clone(),
            });
        }
    }
    if panels.is_empty()
        && let Some(sql) = plan.sql.as_deref()
    {
        panels.push(ExecPanel { plan_index: None, sql: sql.to_string(), title: "Result".to_string() });
    }
    panels
}

/// Pull the (x, y) series for a forecast panel from its query rows
fn extract_series(result: &QueryResult, panel: &PanelSpec) -> Vec<(serde_json::Value, f64)> {
    let x_key = panel
        .x
        .clone()
        .or_else(|| result.columns.first().cloned())
        .unwrap_or_default();
    let y_key = panel
        .y
        .clone()
        .or_else(|| result.columns.get(1).cloned())
        .unwrap_or_default();

    result
        .rows
        .iter()
        .filter_map(|row| {
            let x = row.get(&x_key)?.clone();
            let y = match row.get(&y_key)? {
                serde_json::Value::Number(n) => n.as_f64()?,
                serde_json::Value::String(s) => s.trim().parse().ok()?,
                _ => return None,
            };
            Some((x, y))
        })
        .collect()
}

/// Append projected points to the result rows so renderers see one
/// continuous series; forecast rows are flagged and carry their band.
fn merge_overlay(result: &mut QueryResult, panel: &PanelSpec, outcome: &ForecastOutcome) {
    let x_key = panel
        .x
        .clone()
        .or_else(|| result.columns.first().cloned())
        .unwrap_or_else(|| "x".to_string());
    let y_key = panel
        .y
        .clone()
        .or_else(|| result.columns.get(1).cloned())
        .unwrap_or_else(|| "y".to_string());

    for extra in ["forecast", "lower", "upper"] {
        if !result.columns.iter().any(|c| c == extra) {
            result.columns.push(extra.to_string());
        }
    }

    for point in &outcome.points {
        let mut row = serde_json::Map::new();
        row.insert(x_key.clone(), serde_json::json!(point.label));
        row.insert(y_key.clone(), serde_json::json!(point.value));
        row.insert("forecast".to_string(), serde_json::json!(true));
        row.insert("lower".to_string(), serde_json::json!(point.lower));
        row.insert("upper".to_string(), serde_json::json!(point.upper));
        result.rows.push(row);
    }
    result.row_count = result.rows.len();
}

// ============================================================================
// Lineage
// ============================================================================

/// One answered question in the session history
#[derive(Debug, Clone)]
pub struct LineageEntry {
    pub question: String,
    pub feasible: bool,
    pub row_count: usize,
    pub error: Option<String>,
}

/// Session-scoped history of answered questions
#[derive(Debug, Default)]
pub struct QueryLineage {
    history: Vec<LineageEntry>,
}

impl QueryLineage {
    pub fn record(&mut self, entry: LineageEntry) {
        self.history.push(entry);
    }

    pub fn recent(&self, limit: usize) -> Vec<LineageEntry> {
        let start = self.history.len().saturating_sub(limit);
        self.history[start..].to_vec()
    }

    pub fn clear(&mut self) {
        self.history.clear();
    }
}
