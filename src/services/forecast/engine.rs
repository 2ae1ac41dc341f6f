//! Forecast engine
//!
//! Runs the full pipeline for one panel's series: normalize the x axis,
//! infer cadence, compute trend statistics and seasonality, resolve the
//! strategy, fit, and emit future points with uncertainty bands and
//! projected labels in the same encoding as the input.

use std::sync::Arc;

use chrono::{Datelike, Months, NaiveDate};

use crate::services::llm::TextGenerator;
use crate::services::plan::{ConfidenceLevel, ForecastSpec, ForecastStrategy};

use super::models::{forecast_values, residual_std_dev};
use super::series::{
    CadenceInfo, CadenceUnit, ForecastError, SeriesPoint, XAxisFormat, build_series, infer_cadence,
};
use super::stats::{Seasonality, TrendStats, detect_seasonality, trend_stats};
use super::strategy::{ForecastDefaults, ResolvedStrategy, resolve_strategy};

/// One projected observation with its uncertainty band
#[derive(Debug, Clone, PartialEq)]
pub struct ForecastPoint {
    pub label: String,
    pub value: f64,
    pub lower: f64,
    pub upper: f64,
}

/// The engine's full answer for one panel
#[derive(Debug, Clone)]
pub struct ForecastOutcome {
    pub strategy: ForecastStrategy,
    pub points: Vec<ForecastPoint>,
    pub cadence: CadenceInfo,
    pub season: Option<Seasonality>,
    pub stats: TrendStats,
    pub residual_std: f64,
}

pub struct ForecastEngine {
    backend: Arc<dyn TextGenerator>,
    defaults: ForecastDefaults,
}

impl ForecastEngine {
    pub fn new(backend: Arc<dyn TextGenerator>, defaults: ForecastDefaults) -> Self {
        Self { backend, defaults }
    }

    /// Forecast one series according to its spec.
    ///
    /// Fewer than 2 points is a hard failure; the caller degrades only
    /// this panel's overlay.
    pub async fn forecast(
        &self,
        raw: &[(serde_json::Value, f64)],
        spec: &ForecastSpec,
    ) -> Result<ForecastOutcome, ForecastError> {
        let (points, format) = build_series(raw)?;
        let ys: Vec<f64> = points.iter().map(|p| p.y).collect();

        let cadence = infer_cadence(&points, format);
        let stats = trend_stats(&ys);
        let season = detect_seasonality(&ys, &cadence);

        let resolved: ResolvedStrategy =
            resolve_strategy(self.backend.as_ref(), spec, &stats, season, &points, &self.defaults)
                .await;

        let values = forecast_values(resolved.strategy, &ys, resolved.horizon, &resolved.params, &stats);
        let residual_std = residual_std_dev(resolved.strategy, &ys, &resolved.params, &stats);
        let multiplier = interval_multiplier(spec.confidence, spec.interval_pct);

        let labels = project_labels(&points, format, &cadence, resolved.horizon);
        let forecast_points = labels
            .into_iter()
            .zip(values)
            .map(|(label, value)| ForecastPoint {
                label,
                value,
                lower: value - multiplier * residual_std,
                upper: value + multiplier * residual_std,
            })
            .collect();

        tracing::debug!(
            "forecast: strategy={} horizon={} cadence={:?}/{} residual_std={:.4}",
            resolved.strategy.as_str(),
            resolved.horizon,
            cadence.unit,
            cadence.step,
            residual_std
        );

        Ok(ForecastOutcome {
            strategy: resolved.strategy,
            points: forecast_points,
            cadence,
            season,
            stats,
            residual_std,
        })
    }
}

// ============================================================================
// Intervals
// ============================================================================

/// Standard normal quantiles for the documented interval widths
const QUANTILES: &[(f64, f64)] = &[(80.0, 1.28), (90.0, 1.64), (95.0, 1.96), (99.0, 2.58)];

fn interval_multiplier(confidence: ConfidenceLevel, interval_pct: Option<f64>) -> f64 {
    if let Some(pct) = interval_pct {
        let (_, z) = QUANTILES
            .iter()
            .min_by(|a, b| {
                (a.0 - pct)
                    .abs()
                    .partial_cmp(&(b.0 - pct).abs())
                    .unwrap_or(std::cmp::Ordering::Equal)
            })
            .copied()
            .unwrap_or((95.0, 1.96));
        return z;
    }
    match confidence {
        ConfidenceLevel::High => 1.96,
        ConfidenceLevel::Medium => 1.64,
        ConfidenceLevel::Low => 1.28,
    }
}

// ============================================================================
// Label Projection
// ============================================================================

/// Generate future x-axis labels by advancing the last observation one
/// cadence step per horizon index, preserving the input encoding.
fn project_labels(
    points: &[SeriesPoint],
    format: XAxisFormat,
    cadence: &CadenceInfo,
    horizon: usize,
) -> Vec<String> {
    let last = match points.last() {
        Some(p) => p,
        None => return Vec::new(),
    };

    (1..=horizon as i64)
        .map(|h| match format {
            XAxisFormat::YearMonth => match last.parsed_date {
                Some(date) => format_yearmonth(add_months(date, cadence.step * h)),
                None => format!("t+{h}"),
            },
            XAxisFormat::Date => match last.parsed_date {
                Some(date) => advance_date(date, cadence, h).format("%Y-%m-%d").to_string(),
                None => format!("t+{h}"),
            },
            XAxisFormat::Number => {
                let base = last.parsed_number.unwrap_or(last.sort_key);
                format_number(base + (cadence.step * h) as f64)
            },
            XAxisFormat::Ordinal => format!("t+{h}"),
        })
        .collect()
}

fn advance_date(date: NaiveDate, cadence: &CadenceInfo, h: i64) -> NaiveDate {
    let amount = cadence.step * h;
    match cadence.unit {
        CadenceUnit::Day => date + chrono::Duration::days(amount),
        CadenceUnit::Week => date + chrono::Duration::days(7 * amount),
        CadenceUnit::Month => add_months(date, amount),
        CadenceUnit::Quarter => add_months(date, 3 * amount),
        CadenceUnit::Year => add_months(date, 12 * amount),
        CadenceUnit::Number | CadenceUnit::Unknown => date + chrono::Duration::days(amount),
    }
}

fn add_months(date: NaiveDate, months: i64) -> NaiveDate {
    if months >= 0 {
        date + Months::new(months as u32)
    } else {
        date - Months::new((-months) as u32)
    }
}

fn format_yearmonth(date: NaiveDate) -> String {
    format!("{:04}-{:02}", date.year(), date.month())
}

fn format_number(n: f64) -> String {
    if n.fract() == 0.0 && n.abs() < i64::MAX as f64 {
        format!("{}", n as i64)
    } else {
        format!("{n}")
    }
}
