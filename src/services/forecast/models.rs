//! Forecast model strategies
//!
//! Five interchangeable strategies, each a pure function from
//! (history, horizon, params) to point forecasts. Residuals come from
//! re-deriving each strategy's one-step-ahead fitted value across the
//! historical window; their standard deviation scales the interval.

use crate::services::plan::ForecastStrategy;

use super::stats::TrendStats;

/// Resolved numeric parameters for a fit. Every field has a value by the
/// time a model runs; resolution happens in strategy selection.
#[derive(Debug, Clone, Copy)]
pub struct StrategyParams {
    pub window: usize,
    pub alpha: f64,
    pub season_length: usize,
}

/// Point forecasts for `horizon` steps ahead.
///
/// `strategy` must not be `Auto` here; selection has already happened.
pub fn forecast_values(
    strategy: ForecastStrategy,
    ys: &[f64],
    horizon: usize,
    params: &StrategyParams,
    stats: &TrendStats,
) -> Vec<f64> {
    match strategy {
        ForecastStrategy::Linear => linear(ys, horizon, stats),
        ForecastStrategy::Drift => drift(ys, horizon),
        ForecastStrategy::MovingAverage => moving_average(ys, horizon, params.window),
        ForecastStrategy::ExpSmoothing => exp_smoothing(ys, horizon, params.alpha),
        ForecastStrategy::SeasonalNaive => seasonal_naive(ys, horizon, params.season_length),
        // Callers resolve Auto before fitting; projecting the trend is the
        // safe behavior if one slips through.
        ForecastStrategy::Auto => linear(ys, horizon, stats),
    }
}

/// Project the OLS trend line forward (x is 1-based, so step n+h)
fn linear(ys: &[f64], horizon: usize, stats: &TrendStats) -> Vec<f64> {
    let n = ys.len() as f64;
    (1..=horizon)
        .map(|h| stats.intercept + stats.slope * (n + h as f64))
        .collect()
}

/// Extrapolate the straight line between the first and last observation
fn drift(ys: &[f64], horizon: usize) -> Vec<f64> {
    let n = ys.len();
    let slope = (ys[n - 1] - ys[0]) / (n - 1) as f64;
    (1..=horizon).map(|h| ys[n - 1] + slope * h as f64).collect()
}

/// Iterative trailing-window average: each forecast is appended to the
/// series before computing the next, so the projection smooths toward
/// the recent mean.
fn moving_average(ys: &[f64], horizon: usize, window: usize) -> Vec<f64> {
    let window = window.clamp(2, ys.len());
    let mut extended = ys.to_vec();
    let mut out = Vec::with_capacity(horizon);
    for _ in 0..horizon {
        let tail = &extended[extended.len() - window..];
        let next = tail.iter().sum::<f64>() / window as f64;
        out.push(next);
        extended.push(next);
    }
    out
}

/// Single exponential smoothing: the forecast for every horizon step is
/// the final smoothed level (flat projection).
fn exp_smoothing(ys: &[f64], horizon: usize, alpha: f64) -> Vec<f64> {
    let mut level = ys[0];
    for y in &ys[1..] {
        level = alpha * y + (1.0 - alpha) * level;
    }
    vec![level; horizon]
}

/// Repeat the value observed one season back, cycling for horizons past
/// one full season.
fn seasonal_naive(ys: &[f64], horizon: usize, season_length: usize) -> Vec<f64> {
    let n = ys.len();
    let season = season_length.clamp(1, n);
    (0..horizon).map(|h| ys[n - season + (h % season)]).collect()
}

// ============================================================================
// Residuals
// ============================================================================

/// One-step-ahead fitted values over the historical window, as
/// (index, fitted) pairs. Indices are 0-based positions in `ys`.
pub fn fitted_values(
    strategy: ForecastStrategy,
    ys: &[f64],
    params: &StrategyParams,
    stats: &TrendStats,
) -> Vec<(usize, f64)> {
    let n = ys.len();
    match strategy {
        ForecastStrategy::Linear | ForecastStrategy::Auto => (0..n)
            .map(|i| (i, stats.intercept + stats.slope * (i + 1) as f64))
            .collect(),
        ForecastStrategy::Drift => {
            let slope = (ys[n - 1] - ys[0]) / (n - 1) as f64;
            (0..n).map(|i| (i, ys[0] + slope * i as f64)).collect()
        },
        ForecastStrategy::MovingAverage => {
            let window = params.window.clamp(2, n);
            (window..n)
                .map(|i| {
                    let avg = ys[i - window..i].iter().sum::<f64>() / window as f64;
                    (i, avg)
                })
                .collect()
        },
        ForecastStrategy::ExpSmoothing => {
            let mut level = ys[0];
            let mut fitted = Vec::with_capacity(n.saturating_sub(1));
            for (i, y) in ys.iter().enumerate().skip(1) {
                // The prior level is the one-step-ahead prediction for y_i
                fitted.push((i, level));
                level = params.alpha * y + (1.0 - params.alpha) * level;
            }
            fitted
        },
        ForecastStrategy::SeasonalNaive => {
            let season = params.season_length.clamp(1, n);
            (season..n).map(|i| (i, ys[i - season])).collect()
        },
    }
}

/// Bessel-corrected standard deviation of the one-step-ahead residuals.
/// Fewer than 2 residuals falls back to the overall series deviation.
pub fn residual_std_dev(
    strategy: ForecastStrategy,
    ys: &[f64],
    params: &StrategyParams,
    stats: &TrendStats,
) -> f64 {
    let residuals: Vec<f64> = fitted_values(strategy, ys, params, stats)
        .into_iter()
        .map(|(i, fitted)| ys[i] - fitted)
        .collect();

    if residuals.len() < 2 {
        return stats.std_dev;
    }

    let mean = residuals.iter().sum::<f64>() / residuals.len() as f64;
    let variance = residuals.iter().map(|r| (r - mean) * (r - mean)).sum::<f64>()
        / (residuals.len() - 1) as f64;
    variance.sqrt()
}
