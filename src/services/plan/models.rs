//! Typed plan models
//!
//! The analytical plan and its visualization panels as produced by the
//! question compiler, plus the decode path from parsed notation. The plan
//! is immutable once compilation returns it; the pipeline only splices in
//! repaired SQL and the executive summary after execution.

use serde::{Deserialize, Serialize};

use super::error::{NotationError, NotationResult};
use super::parser::NotationValue;

// ============================================================================
// Plan
// ============================================================================

/// A compiled analytical plan: either executable SQL plus panels, or a
/// refusal carrying a reason and suggested alternatives.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AnalyticalPlan {
    pub question: String,
    pub feasible: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub reason: Option<String>,
    #[serde(default)]
    pub tables: Vec<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub sql: Option<String>,
    #[serde(default)]
    pub panels: Vec<PanelSpec>,
    #[serde(default)]
    pub follow_ups: Vec<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub executive_summary: Option<String>,
}

impl AnalyticalPlan {
    /// A plan is feasible iff it carries executable SQL at the top level
    /// or on at least one panel. The repair loop and forecasting engine
    /// must never see a plan where this is false.
    pub fn is_feasible(&self) -> bool {
        self.feasible
            && (self.sql.as_deref().is_some_and(|s| !s.trim().is_empty())
                || self
                    .panels
                    .iter()
                    .any(|p| p.sql.as_deref().is_some_and(|s| !s.trim().is_empty())))
    }

    /// Synthesize a refusal plan. Used when compilation exhausts its
    /// retry budget: the caller always receives a well-formed plan value.
    pub fn refusal(question: &str, reason: &str, follow_ups: Vec<String>) -> Self {
        Self {
            question: question.to_string(),
            feasible: false,
            reason: Some(reason.to_string()),
            tables: Vec::new(),
            sql: None,
            panels: Vec::new(),
            follow_ups,
            executive_summary: None,
        }
    }

    pub(super) fn from_notation(value: &NotationValue) -> NotationResult<Self> {
        Ok(Self {
            question: opt_string(value, "q")?.unwrap_or_default(),
            feasible: opt_bool(value, "feasible")?.unwrap_or(true),
            reason: opt_string(value, "reason")?,
            tables: string_array(value, "tables")?,
            sql: opt_string(value, "sql")?,
            panels: panel_array(value, "panels")?,
            follow_ups: string_array(value, "followUps")?,
            executive_summary: opt_string(value, "summary")?,
        })
    }

    /// An `@refusal{...}` object decodes to an infeasible plan
    pub(super) fn from_refusal(value: &NotationValue) -> NotationResult<Self> {
        Ok(Self {
            question: opt_string(value, "q")?.unwrap_or_default(),
            feasible: false,
            reason: opt_string(value, "reason")?,
            tables: Vec::new(),
            sql: None,
            panels: Vec::new(),
            follow_ups: string_array(value, "followUps")?,
            executive_summary: None,
        })
    }
}

// ============================================================================
// Panels
// ============================================================================

/// Visualization intent for one chart
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PanelSpec {
    #[serde(rename = "type")]
    pub panel_type: PanelType,
    pub title: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub sql: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub x: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub y: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
    /// Column holding the headline value for stat panels
    #[serde(skip_serializing_if = "Option::is_none")]
    pub value_field: Option<String>,
    #[serde(default)]
    pub columns: Vec<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub forecast: Option<ForecastSpec>,
}

impl PanelSpec {
    pub(super) fn from_notation(value: &NotationValue) -> NotationResult<Self> {
        let type_raw = opt_string(value, "type")?
            .ok_or_else(|| NotationError::field("type", "panel is missing its type"))?;
        let panel_type = PanelType::parse(&type_raw)
            .ok_or_else(|| NotationError::field("type", format!("unknown panel type '{type_raw}'")))?;

        let forecast = match value.get("forecast") {
            Some(v) => Some(ForecastSpec::from_notation(v)?),
            None => None,
        };

        Ok(Self {
            panel_type,
            title: opt_string(value, "title")?.unwrap_or_default(),
            sql: opt_string(value, "sql")?,
            x: opt_string(value, "x")?,
            y: opt_string(value, "y")?,
            description: opt_string(value, "description")?,
            value_field: opt_string(value, "value")?,
            columns: string_array(value, "columns")?,
            forecast,
        })
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PanelType {
    Bar,
    Line,
    Stat,
    Table,
    Pie,
    Gauge,
    Heatmap,
    Histogram,
    Insight,
}

impl PanelType {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Bar => "bar",
            Self::Line => "line",
            Self::Stat => "stat",
            Self::Table => "table",
            Self::Pie => "pie",
            Self::Gauge => "gauge",
            Self::Heatmap => "heatmap",
            Self::Histogram => "histogram",
            Self::Insight => "insight",
        }
    }

    pub fn parse(s: &str) -> Option<Self> {
        match s.to_lowercase().as_str() {
            "bar" => Some(Self::Bar),
            "line" => Some(Self::Line),
            "stat" => Some(Self::Stat),
            "table" => Some(Self::Table),
            "pie" => Some(Self::Pie),
            "gauge" => Some(Self::Gauge),
            "heatmap" => Some(Self::Heatmap),
            "histogram" => Some(Self::Histogram),
            "insight" => Some(Self::Insight),
            _ => None,
        }
    }
}

// ============================================================================
// Forecast Spec
// ============================================================================

/// How to project a panel's series forward. Consumed exclusively by the
/// forecasting engine.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ForecastSpec {
    pub strategy: ForecastStrategy,
    pub horizon: u32,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub window: Option<usize>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub alpha: Option<f64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub season_length: Option<usize>,
    pub confidence: ConfidenceLevel,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub interval_pct: Option<f64>,
}

impl Default for ForecastSpec {
    fn default() -> Self {
        Self {
            strategy: ForecastStrategy::Auto,
            horizon: 6,
            window: None,
            alpha: None,
            season_length: None,
            confidence: ConfidenceLevel::Medium,
            interval_pct: None,
        }
    }
}

impl ForecastSpec {
    pub(super) fn from_notation(value: &NotationValue) -> NotationResult<Self> {
        let strategy = match opt_string(value, "strategy")? {
            Some(raw) => ForecastStrategy::parse(&raw).ok_or_else(|| {
                NotationError::field("strategy", format!("unknown strategy '{raw}'"))
            })?,
            None => ForecastStrategy::Auto,
        };
        let confidence = match opt_string(value, "confidence")? {
            Some(raw) => ConfidenceLevel::parse(&raw).ok_or_else(|| {
                NotationError::field("confidence", format!("unknown confidence '{raw}'"))
            })?,
            None => ConfidenceLevel::Medium,
        };
        let alpha = opt_f64(value, "alpha")?;
        if let Some(a) = alpha
            && !(0.0..=1.0).contains(&a)
        {
            return Err(NotationError::field("alpha", format!("{a} outside [0, 1]")));
        }

        Ok(Self {
            strategy,
            horizon: opt_u32(value, "horizon")?.unwrap_or(6),
            window: opt_usize(value, "window")?,
            alpha,
            season_length: opt_usize(value, "seasonLength")?,
            confidence,
            interval_pct: opt_f64(value, "intervalPct")?,
        })
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ForecastStrategy {
    Auto,
    Linear,
    Drift,
    MovingAverage,
    ExpSmoothing,
    SeasonalNaive,
}

impl ForecastStrategy {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Auto => "auto",
            Self::Linear => "linear",
            Self::Drift => "drift",
            Self::MovingAverage => "moving_average",
            Self::ExpSmoothing => "exp_smoothing",
            Self::SeasonalNaive => "seasonal_naive",
        }
    }

    pub fn parse(s: &str) -> Option<Self> {
        match s.to_lowercase().as_str() {
            "auto" => Some(Self::Auto),
            "linear" => Some(Self::Linear),
            "drift" => Some(Self::Drift),
            "moving_average" => Some(Self::MovingAverage),
            "exp_smoothing" => Some(Self::ExpSmoothing),
            "seasonal_naive" => Some(Self::SeasonalNaive),
            _ => None,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ConfidenceLevel {
    High,
    Medium,
    Low,
}

impl ConfidenceLevel {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::High => "high",
            Self::Medium => "medium",
            Self::Low => "low",
        }
    }

    pub fn parse(s: &str) -> Option<Self> {
        match s.to_lowercase().as_str() {
            "high" => Some(Self::High),
            "medium" => Some(Self::Medium),
            "low" => Some(Self::Low),
            _ => None,
        }
    }
}

// ============================================================================
// Dashboard
// ============================================================================

/// Overview dashboard specification (`@dashboard{...}`)
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DashboardSpec {
    pub title: String,
    pub panels: Vec<PanelSpec>,
}

impl DashboardSpec {
    pub(super) fn from_notation(value: &NotationValue) -> NotationResult<Self> {
        Ok(Self {
            title: opt_string(value, "title")?.unwrap_or_default(),
            panels: panel_array(value, "panels")?,
        })
    }
}

// ============================================================================
// Field Coercion Helpers
// ============================================================================

fn opt_string(value: &NotationValue, name: &str) -> NotationResult<Option<String>> {
    match value.get(name) {
        None | Some(NotationValue::Null) => Ok(None),
        Some(NotationValue::Str(s)) => Ok(Some(s.clone())),
        // Models occasionally emit bare numbers where strings belong
        Some(NotationValue::Int(n)) => Ok(Some(n.to_string())),
        Some(NotationValue::Float(f)) => Ok(Some(f.to_string())),
        Some(other) => Err(NotationError::field(name, format!("expected string, got {other:?}"))),
    }
}

fn opt_bool(value: &NotationValue, name: &str) -> NotationResult<Option<bool>> {
    match value.get(name) {
        None | Some(NotationValue::Null) => Ok(None),
        Some(NotationValue::Bool(b)) => Ok(Some(*b)),
        Some(other) => Err(NotationError::field(name, format!("expected bool, got {other:?}"))),
    }
}

fn opt_f64(value: &NotationValue, name: &str) -> NotationResult<Option<f64>> {
    match value.get(name) {
        None | Some(NotationValue::Null) => Ok(None),
        Some(NotationValue::Float(f)) => Ok(Some(*f)),
        Some(NotationValue::Int(n)) => Ok(Some(*n as f64)),
        Some(other) => Err(NotationError::field(name, format!("expected number, got {other:?}"))),
    }
}

fn opt_u32(value: &NotationValue, name: &str) -> NotationResult<Option<u32>> {
    match value.get(name) {
        None | Some(NotationValue::Null) => Ok(None),
        Some(NotationValue::Int(n)) if *n >= 0 => Ok(Some(*n as u32)),
        Some(other) => {
            Err(NotationError::field(name, format!("expected non-negative int, got {other:?}")))
        },
    }
}

fn opt_usize(value: &NotationValue, name: &str) -> NotationResult<Option<usize>> {
    Ok(opt_u32(value, name)?.map(|n| n as usize))
}

fn string_array(value: &NotationValue, name: &str) -> NotationResult<Vec<String>> {
    match value.get(name) {
        None | Some(NotationValue::Null) => Ok(Vec::new()),
        Some(NotationValue::Array(items)) => items
            .iter()
            .map(|item| match item {
                NotationValue::Str(s) => Ok(s.clone()),
                NotationValue::Int(n) => Ok(n.to_string()),
                other => {
                    Err(NotationError::field(name, format!("expected string item, got {other:?}")))
                },
            })
            .collect(),
        Some(other) => Err(NotationError::field(name, format!("expected array, got {other:?}"))),
    }
}

fn panel_array(value: &NotationValue, name: &str) -> NotationResult<Vec<PanelSpec>> {
    match value.get(name) {
        None | Some(NotationValue::Null) => Ok(Vec::new()),
        Some(NotationValue::Array(items)) => {
            items.iter().map(PanelSpec::from_notation).collect()
        },
        Some(other) => Err(NotationError::field(name, format!("expected array, got {other:?}"))),
    }
}
