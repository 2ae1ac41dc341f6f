//! Forecast strategy selection
//!
//! Either the caller names a strategy explicitly, or selection is
//! delegated to the text-generation backend, which sees the computed
//! statistics plus a tail of recent points and must answer with one
//! strategy and resolved parameters. The backend's reply is untyped at
//! the boundary, so it decodes into a tagged union with an explicit
//! Invalid variant; the deterministic fallback is a first-class branch,
//! not an exception handler.

use crate::services::llm::TextGenerator;
use crate::services::plan::{ForecastSpec, ForecastStrategy, parse_forecast_spec};

use super::models::StrategyParams;
use super::series::SeriesPoint;
use super::stats::{Seasonality, TrendStats};

const SELECTION_PROMPT: &str = include_str!("strategy_prompt.md");

/// How many recent points the selection prompt shows the backend
const TAIL_SAMPLE_LEN: usize = 6;

/// Fallback defaults when neither the spec nor the selection response
/// resolves a parameter
#[derive(Debug, Clone, Copy)]
pub struct ForecastDefaults {
    pub horizon: usize,
    pub window: usize,
    pub alpha: f64,
}

impl Default for ForecastDefaults {
    fn default() -> Self {
        Self { horizon: 6, window: 3, alpha: 0.3 }
    }
}

/// A fully resolved strategy: never `Auto`, every parameter bound
#[derive(Debug, Clone, Copy)]
pub struct ResolvedStrategy {
    pub strategy: ForecastStrategy,
    pub horizon: usize,
    pub params: StrategyParams,
}

/// Outcome of decoding a selection response
#[derive(Debug)]
pub enum StrategyDecision {
    Selected(ResolvedStrategy),
    /// Malformed, out-of-enum, or otherwise unusable selection. Carries
    /// the rejection reason for logging; the caller takes the
    /// deterministic fallback.
    Invalid(String),
}

/// Resolve the strategy for one series.
///
/// Explicit (non-auto) specs resolve locally without a backend call.
pub async fn resolve_strategy(
    backend: &dyn TextGenerator,
    spec: &ForecastSpec,
    stats: &TrendStats,
    season: Option<Seasonality>,
    tail: &[SeriesPoint],
    defaults: &ForecastDefaults,
) -> ResolvedStrategy {
    if spec.strategy != ForecastStrategy::Auto {
        return resolve_explicit(spec, season, defaults);
    }

    let prompt = build_selection_prompt(spec, stats, season, tail);
    let decision = match backend.generate_text(&prompt, 0.1, 512).await {
        Ok(text) => decode_selection(&text, spec, season, defaults),
        Err(e) => StrategyDecision::Invalid(format!("selection call failed: {e}")),
    };

    match decision {
        StrategyDecision::Selected(resolved) => {
            tracing::debug!(
                "strategy selection: {} horizon={}",
                resolved.strategy.as_str(),
                resolved.horizon
            );
            resolved
        },
        StrategyDecision::Invalid(reason) => {
            let fallback = fallback_strategy(spec, stats, defaults);
            tracing::warn!(
                "strategy selection rejected ({}), falling back to {}",
                reason,
                fallback.strategy.as_str()
            );
            fallback
        },
    }
}

/// Decode a selection response into a decision
pub fn decode_selection(
    text: &str,
    spec: &ForecastSpec,
    season: Option<Seasonality>,
    defaults: &ForecastDefaults,
) -> StrategyDecision {
    let selected = match parse_forecast_spec(text) {
        Ok(s) => s,
        Err(e) => return StrategyDecision::Invalid(e.to_string()),
    };

    if selected.strategy == ForecastStrategy::Auto {
        return StrategyDecision::Invalid("selection answered 'auto'".to_string());
    }

    let season_length = selected
        .season_length
        .or(spec.season_length)
        .or(season.map(|s| s.length));
    if selected.strategy == ForecastStrategy::SeasonalNaive && season_length.is_none() {
        return StrategyDecision::Invalid(
            "seasonal_naive selected without a season length".to_string(),
        );
    }

    StrategyDecision::Selected(ResolvedStrategy {
        strategy: selected.strategy,
        horizon: selected.horizon.max(1) as usize,
        params: StrategyParams {
            window: selected.window.or(spec.window).unwrap_or(defaults.window),
            alpha: selected.alpha.or(spec.alpha).unwrap_or(defaults.alpha),
            season_length: season_length.unwrap_or(1),
        },
    })
}

/// Deterministic fallback when selection is unusable: project the trend
/// when it explains the series, otherwise smooth toward the recent mean.
pub fn fallback_strategy(
    spec: &ForecastSpec,
    stats: &TrendStats,
    defaults: &ForecastDefaults,
) -> ResolvedStrategy {
    let strategy = if stats.r_squared >= 0.5 {
        ForecastStrategy::Linear
    } else {
        ForecastStrategy::MovingAverage
    };
    ResolvedStrategy {
        strategy,
        horizon: horizon_from(spec, defaults),
        params: StrategyParams {
            window: spec.window.unwrap_or(defaults.window),
            alpha: spec.alpha.unwrap_or(defaults.alpha),
            season_length: spec.season_length.unwrap_or(1),
        },
    }
}

fn resolve_explicit(
    spec: &ForecastSpec,
    season: Option<Seasonality>,
    defaults: &ForecastDefaults,
) -> ResolvedStrategy {
    ResolvedStrategy {
        strategy: spec.strategy,
        horizon: horizon_from(spec, defaults),
        params: StrategyParams {
            window: spec.window.unwrap_or(defaults.window),
            alpha: spec.alpha.unwrap_or(defaults.alpha),
            season_length: spec
                .season_length
                .or(season.map(|s| s.length))
                .unwrap_or(1),
        },
    }
}

fn horizon_from(spec: &ForecastSpec, defaults: &ForecastDefaults) -> usize {
    if spec.horizon > 0 { spec.horizon as usize } else { defaults.horizon }
}

fn build_selection_prompt(
    spec: &ForecastSpec,
    stats: &TrendStats,
    season: Option<Seasonality>,
    tail: &[SeriesPoint],
) -> String {
    let season_line = match season {
        Some(s) => format!("seasonLength:{} seasonStrength:{:.3}", s.length, s.strength),
        None => "seasonLength:none".to_string(),
    };
    let sample = tail
        .iter()
        .rev()
        .take(TAIL_SAMPLE_LEN)
        .rev()
        .map(|p| format!("({}, {})", p.x_raw, p.y))
        .collect::<Vec<_>>()
        .join(", ");

    format!(
        "{SELECTION_PROMPT}\n## Series statistics\n\n\
         slope:{:.4} rSquared:{:.3} mean:{:.3} stdDev:{:.3} cv:{:.3} {}\n\
         requestedHorizon:{}\n\n## Recent points\n\n{}\n",
        stats.slope,
        stats.r_squared,
        stats.mean,
        stats.std_dev,
        stats.coefficient_of_variation,
        season_line,
        spec.horizon,
        sample
    )
}
