//! Forecasting Engine Module
//!
//! Given a resolved (x, y) series from a panel query, infers the series'
//! cadence and seasonality, fits one of several candidate models, and
//! emits point forecasts with uncertainty bands plus projected x-axis
//! labels that match the input encoding.
//!
//! The engine is a pure function of its inputs apart from one optional
//! text-generation call for strategy selection, and every strategy is
//! deterministic: identical inputs produce bit-identical forecasts.

mod engine;
mod models;
mod series;
mod stats;
mod strategy;

pub use engine::{ForecastEngine, ForecastOutcome, ForecastPoint};
pub use models::{StrategyParams, fitted_values, forecast_values, residual_std_dev};
pub use series::{CadenceInfo, CadenceUnit, ForecastError, SeriesPoint, XAxisFormat, build_series, infer_cadence};
pub use stats::{Seasonality, TrendStats, detect_seasonality, trend_stats};
pub use strategy::{
    ForecastDefaults, ResolvedStrategy, StrategyDecision, decode_selection, fallback_strategy,
    resolve_strategy,
};

#[cfg(test)]
mod tests;
