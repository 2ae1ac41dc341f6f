//! Forecasting engine unit tests

use std::collections::VecDeque;
use std::sync::{Arc, Mutex};

use async_trait::async_trait;
use serde_json::json;

use crate::services::llm::{GenerateError, TextGenerator};
use crate::services::plan::{ConfidenceLevel, ForecastSpec, ForecastStrategy};

use super::*;

/// Backend stub that replays scripted responses
struct ScriptedBackend {
    responses: Mutex<VecDeque<Result<String, GenerateError>>>,
    calls: Mutex<u32>,
}

impl ScriptedBackend {
    fn new(responses: Vec<Result<String, GenerateError>>) -> Arc<Self> {
        Arc::new(Self { responses: Mutex::new(responses.into()), calls: Mutex::new(0) })
    }

    fn call_count(&self) -> u32 {
        *self.calls.lock().unwrap()
    }
}

#[async_trait]
impl TextGenerator for ScriptedBackend {
    async fn generate_text(
        &self,
        _prompt: &str,
        _temperature: f64,
        _max_output_tokens: u32,
    ) -> Result<String, GenerateError> {
        *self.calls.lock().unwrap() += 1;
        self.responses
            .lock()
            .unwrap()
            .pop_front()
            .unwrap_or(Err(GenerateError::Api("script exhausted".to_string())))
    }
}

fn yearmonth_series(start_year: i32, values: &[f64]) -> Vec<(serde_json::Value, f64)> {
    values
        .iter()
        .enumerate()
        .map(|(i, y)| {
            let month = i % 12 + 1;
            let year = start_year + (i / 12) as i32;
            (json!(format!("{year:04}-{month:02}")), *y)
        })
        .collect()
}

fn spec_with(strategy: ForecastStrategy, horizon: u32) -> ForecastSpec {
    ForecastSpec { strategy, horizon, ..ForecastSpec::default() }
}

// ============================================================================
// Series + Cadence
// ============================================================================

#[test]
fn test_too_few_points_is_hard_failure() {
    let raw = vec![(json!("2024-01"), 100.0)];
    let err = build_series(&raw).unwrap_err();
    assert!(matches!(err, ForecastError::TooFewPoints(1)));
}

#[test]
fn test_mixed_formats_rejected() {
    let raw = vec![(json!("2024-01"), 1.0), (json!("not a month"), 2.0)];
    let err = build_series(&raw).unwrap_err();
    assert!(matches!(err, ForecastError::UnparseableAxis { .. }));
}

#[test]
fn test_monthly_cadence_from_yearmonth() {
    let raw = yearmonth_series(2022, &(0..24).map(|i| i as f64).collect::<Vec<_>>());
    let (points, format) = build_series(&raw).unwrap();
    assert_eq!(format, XAxisFormat::YearMonth);
    let cadence = infer_cadence(&points, format);
    assert_eq!(cadence.unit, CadenceUnit::Month);
    assert_eq!(cadence.step, 1);
}

#[test]
fn test_weekly_cadence_from_dates() {
    let raw: Vec<(serde_json::Value, f64)> = (0..10)
        .map(|i| {
            let date = chrono::NaiveDate::from_ymd_opt(2024, 1, 1).unwrap()
                + chrono::Duration::days(7 * i);
            (json!(date.format("%Y-%m-%d").to_string()), i as f64)
        })
        .collect();
    let (points, format) = build_series(&raw).unwrap();
    assert_eq!(format, XAxisFormat::Date);
    let cadence = infer_cadence(&points, format);
    assert_eq!(cadence.unit, CadenceUnit::Week);
    assert_eq!(cadence.step, 1);
}

#[test]
fn test_quarterly_and_yearly_buckets() {
    let quarterly: Vec<(serde_json::Value, f64)> = (0..8)
        .map(|i| {
            let date = chrono::NaiveDate::from_ymd_opt(2022, 1, 1).unwrap()
                + chrono::Months::new(3 * i as u32);
            (json!(date.format("%Y-%m-%d").to_string()), i as f64)
        })
        .collect();
    let (points, format) = build_series(&quarterly).unwrap();
    assert_eq!(infer_cadence(&points, format).unit, CadenceUnit::Quarter);

    let yearly: Vec<(serde_json::Value, f64)> = (0..5)
        .map(|i| (json!(format!("{}-06-30", 2019 + i)), i as f64))
        .collect();
    let (points, format) = build_series(&yearly).unwrap();
    let cadence = infer_cadence(&points, format);
    assert_eq!(cadence.unit, CadenceUnit::Year);
    assert_eq!(cadence.step, 1);
}

#[test]
fn test_numeric_cadence() {
    let raw: Vec<(serde_json::Value, f64)> = (0..6).map(|i| (json!(10 + 5 * i), i as f64)).collect();
    let (points, format) = build_series(&raw).unwrap();
    assert_eq!(format, XAxisFormat::Number);
    let cadence = infer_cadence(&points, format);
    assert_eq!(cadence.unit, CadenceUnit::Number);
    assert_eq!(cadence.step, 5);
}

#[test]
fn test_ordinal_fallback_keeps_input_order() {
    let raw = vec![
        (json!("north"), 3.0),
        (json!("south"), 1.0),
        (json!("east"), 2.0),
    ];
    let (points, format) = build_series(&raw).unwrap();
    assert_eq!(format, XAxisFormat::Ordinal);
    assert_eq!(points[0].x_raw, "north");
    assert_eq!(points[2].x_raw, "east");
}

#[test]
fn test_unsorted_dates_are_ordered() {
    let raw = vec![
        (json!("2024-03"), 3.0),
        (json!("2024-01"), 1.0),
        (json!("2024-02"), 2.0),
    ];
    let (points, _) = build_series(&raw).unwrap();
    let labels: Vec<&str> = points.iter().map(|p| p.x_raw.as_str()).collect();
    assert_eq!(labels, vec!["2024-01", "2024-02", "2024-03"]);
}

// ============================================================================
// Strategies
// ============================================================================

#[test]
fn test_linear_projects_ols_line() {
    let ys = vec![100.0, 110.0, 120.0];
    let stats = trend_stats(&ys);
    let params = StrategyParams { window: 3, alpha: 0.3, season_length: 1 };
    let out = forecast_values(ForecastStrategy::Linear, &ys, 2, &params, &stats);
    assert!((out[0] - 130.0).abs() < 1e-9);
    assert!((out[1] - 140.0).abs() < 1e-9);
}

#[test]
fn test_drift_uses_first_and_last() {
    let ys = vec![10.0, 13.0, 11.0, 22.0];
    let stats = trend_stats(&ys);
    let params = StrategyParams { window: 2, alpha: 0.3, season_length: 1 };
    let out = forecast_values(ForecastStrategy::Drift, &ys, 3, &params, &stats);
    // slope = (22 - 10) / 3 = 4
    assert!((out[0] - 26.0).abs() < 1e-9);
    assert!((out[1] - 30.0).abs() < 1e-9);
    assert!((out[2] - 34.0).abs() < 1e-9);
}

#[test]
fn test_moving_average_smooths_toward_recent_mean() {
    let ys = vec![10.0, 20.0, 30.0, 40.0];
    let stats = trend_stats(&ys);
    let params = StrategyParams { window: 2, alpha: 0.3, season_length: 1 };
    let out = forecast_values(ForecastStrategy::MovingAverage, &ys, 3, &params, &stats);
    // step 1: (30+40)/2 = 35; step 2: (40+35)/2 = 37.5; step 3: (35+37.5)/2
    assert!((out[0] - 35.0).abs() < 1e-9);
    assert!((out[1] - 37.5).abs() < 1e-9);
    assert!((out[2] - 36.25).abs() < 1e-9);
}

#[test]
fn test_exp_smoothing_is_flat() {
    let ys = vec![10.0, 20.0, 30.0];
    let stats = trend_stats(&ys);
    let params = StrategyParams { window: 2, alpha: 0.5, season_length: 1 };
    let out = forecast_values(ForecastStrategy::ExpSmoothing, &ys, 3, &params, &stats);
    // level: 10 -> 15 -> 22.5
    for v in &out {
        assert!((v - 22.5).abs() < 1e-9);
    }
}

#[test]
fn test_seasonal_naive_cycles() {
    let ys = vec![1.0, 2.0, 3.0, 4.0, 5.0, 6.0];
    let stats = trend_stats(&ys);
    let params = StrategyParams { window: 2, alpha: 0.3, season_length: 3 };
    let out = forecast_values(ForecastStrategy::SeasonalNaive, &ys, 5, &params, &stats);
    assert_eq!(out, vec![4.0, 5.0, 6.0, 4.0, 5.0]);
}

#[test]
fn test_strategies_are_deterministic() {
    let ys: Vec<f64> = (0..30).map(|i| (i as f64 * 0.7).sin() * 10.0 + i as f64).collect();
    let stats = trend_stats(&ys);
    let params = StrategyParams { window: 4, alpha: 0.3, season_length: 7 };
    for strategy in [
        ForecastStrategy::Linear,
        ForecastStrategy::Drift,
        ForecastStrategy::MovingAverage,
        ForecastStrategy::ExpSmoothing,
        ForecastStrategy::SeasonalNaive,
    ] {
        let a = forecast_values(strategy, &ys, 8, &params, &stats);
        let b = forecast_values(strategy, &ys, 8, &params, &stats);
        assert_eq!(a, b, "{} not deterministic", strategy.as_str());
    }
}

#[test]
fn test_residual_std_falls_back_to_series_std() {
    // moving_average with window == n leaves no one-step-ahead residuals
    let ys = vec![10.0, 12.0, 14.0];
    let stats = trend_stats(&ys);
    let params = StrategyParams { window: 3, alpha: 0.3, season_length: 1 };
    let rsd = residual_std_dev(ForecastStrategy::MovingAverage, &ys, &params, &stats);
    assert!((rsd - stats.std_dev).abs() < 1e-12);
}

#[test]
fn test_perfect_linear_fit_has_zero_residuals() {
    let ys = vec![100.0, 110.0, 120.0];
    let stats = trend_stats(&ys);
    let params = StrategyParams { window: 2, alpha: 0.3, season_length: 1 };
    let rsd = residual_std_dev(ForecastStrategy::Linear, &ys, &params, &stats);
    assert!(rsd.abs() < 1e-9);
}

// ============================================================================
// Strategy Selection
// ============================================================================

#[test]
fn test_decode_valid_selection() {
    let spec = spec_with(ForecastStrategy::Auto, 6);
    let defaults = ForecastDefaults::default();
    let decision = decode_selection_helper(
        "@forecast{strategy:exp_smoothing horizon:4 alpha:0.4 confidence:medium}",
        &spec,
        None,
        &defaults,
    );
    match decision {
        StrategyDecision::Selected(r) => {
            assert_eq!(r.strategy, ForecastStrategy::ExpSmoothing);
            assert_eq!(r.horizon, 4);
            assert!((r.params.alpha - 0.4).abs() < 1e-12);
        },
        StrategyDecision::Invalid(reason) => panic!("unexpected rejection: {reason}"),
    }
}

#[test]
fn test_decode_rejects_out_of_enum() {
    let spec = spec_with(ForecastStrategy::Auto, 6);
    let defaults = ForecastDefaults::default();
    let decision = decode_selection_helper(
        "@forecast{strategy:prophet horizon:4}",
        &spec,
        None,
        &defaults,
    );
    assert!(matches!(decision, StrategyDecision::Invalid(_)));
}

#[test]
fn test_decode_rejects_auto_answer() {
    let spec = spec_with(ForecastStrategy::Auto, 6);
    let defaults = ForecastDefaults::default();
    let decision =
        decode_selection_helper("@forecast{strategy:auto horizon:4}", &spec, None, &defaults);
    assert!(matches!(decision, StrategyDecision::Invalid(_)));
}

#[test]
fn test_decode_rejects_seasonal_without_season() {
    let spec = spec_with(ForecastStrategy::Auto, 6);
    let defaults = ForecastDefaults::default();
    let decision = decode_selection_helper(
        "@forecast{strategy:seasonal_naive horizon:4}",
        &spec,
        None,
        &defaults,
    );
    assert!(matches!(decision, StrategyDecision::Invalid(_)));
}

fn decode_selection_helper(
    text: &str,
    spec: &ForecastSpec,
    season: Option<Seasonality>,
    defaults: &ForecastDefaults,
) -> StrategyDecision {
    super::strategy::decode_selection(text, spec, season, defaults)
}

#[tokio::test]
async fn test_invalid_selection_falls_back_by_r_squared() {
    // Strong trend: fallback must be linear
    let backend = ScriptedBackend::new(vec![Ok("this is not notation at all".to_string())]);
    let engine = ForecastEngine::new(backend.clone(), ForecastDefaults::default());
    let raw = yearmonth_series(2024, &[100.0, 110.0, 120.0, 130.0]);
    let outcome = engine.forecast(&raw, &spec_with(ForecastStrategy::Auto, 2)).await.unwrap();
    assert_eq!(outcome.strategy, ForecastStrategy::Linear);
    assert_eq!(backend.call_count(), 1);

    // Noisy, trendless series: fallback must be moving_average
    let backend = ScriptedBackend::new(vec![Ok("still not notation".to_string())]);
    let engine = ForecastEngine::new(backend, ForecastDefaults::default());
    let noisy = yearmonth_series(2024, &[10.0, 90.0, 15.0, 85.0, 12.0, 88.0]);
    let outcome = engine.forecast(&noisy, &spec_with(ForecastStrategy::Auto, 2)).await.unwrap();
    assert_eq!(outcome.strategy, ForecastStrategy::MovingAverage);
}

// ============================================================================
// Engine End-to-End
// ============================================================================

#[tokio::test]
async fn test_linear_end_to_end_with_labels() {
    let backend = ScriptedBackend::new(Vec::new());
    let engine = ForecastEngine::new(backend.clone(), ForecastDefaults::default());
    let raw = vec![
        (json!("2024-01"), 100.0),
        (json!("2024-02"), 110.0),
        (json!("2024-03"), 120.0),
    ];
    let spec = ForecastSpec {
        strategy: ForecastStrategy::Linear,
        horizon: 2,
        confidence: ConfidenceLevel::High,
        ..ForecastSpec::default()
    };

    let outcome = engine.forecast(&raw, &spec).await.unwrap();
    // Explicit strategy: no backend call at all
    assert_eq!(backend.call_count(), 0);
    assert_eq!(outcome.points.len(), 2);
    assert_eq!(outcome.points[0].label, "2024-04");
    assert_eq!(outcome.points[1].label, "2024-05");
    assert!((outcome.points[0].value - 130.0).abs() < 1e-9);
    assert!((outcome.points[1].value - 140.0).abs() < 1e-9);
    // Perfect fit: the band collapses onto the point forecast
    assert!((outcome.points[0].lower - 130.0).abs() < 1e-9);
    assert!((outcome.points[0].upper - 130.0).abs() < 1e-9);
    assert_eq!(outcome.cadence.unit, CadenceUnit::Month);
    assert_eq!(outcome.cadence.step, 1);
}

#[tokio::test]
async fn test_auto_selection_uses_backend_choice() {
    let backend = ScriptedBackend::new(vec![Ok(
        "@forecast{strategy:drift horizon:3 confidence:medium}".to_string(),
    )]);
    let engine = ForecastEngine::new(backend.clone(), ForecastDefaults::default());
    let raw = yearmonth_series(2024, &[10.0, 12.0, 15.0, 13.0, 18.0]);
    let outcome = engine.forecast(&raw, &spec_with(ForecastStrategy::Auto, 6)).await.unwrap();
    assert_eq!(backend.call_count(), 1);
    assert_eq!(outcome.strategy, ForecastStrategy::Drift);
    assert_eq!(outcome.points.len(), 3);
}

#[tokio::test]
async fn test_numeric_labels_advance_by_step() {
    let backend = ScriptedBackend::new(Vec::new());
    let engine = ForecastEngine::new(backend, ForecastDefaults::default());
    let raw: Vec<(serde_json::Value, f64)> =
        (0..5).map(|i| (json!(100 + 10 * i), (i * i) as f64)).collect();
    let outcome = engine
        .forecast(&raw, &spec_with(ForecastStrategy::Drift, 2))
        .await
        .unwrap();
    assert_eq!(outcome.points[0].label, "150");
    assert_eq!(outcome.points[1].label, "160");
}

#[tokio::test]
async fn test_ordinal_labels_are_relative() {
    let backend = ScriptedBackend::new(Vec::new());
    let engine = ForecastEngine::new(backend, ForecastDefaults::default());
    let raw = vec![
        (json!("alpha"), 1.0),
        (json!("beta"), 2.0),
        (json!("gamma"), 3.0),
    ];
    let outcome = engine
        .forecast(&raw, &spec_with(ForecastStrategy::MovingAverage, 2))
        .await
        .unwrap();
    assert_eq!(outcome.points[0].label, "t+1");
    assert_eq!(outcome.points[1].label, "t+2");
}

#[tokio::test]
async fn test_interval_width_scales_with_confidence() {
    let values: Vec<f64> = (0..12).map(|i| 50.0 + (i as f64 * 1.3).sin() * 8.0).collect();
    let raw = yearmonth_series(2024, &values);

    let mut high_spec = spec_with(ForecastStrategy::Linear, 3);
    high_spec.confidence = ConfidenceLevel::High;
    let mut low_spec = spec_with(ForecastStrategy::Linear, 3);
    low_spec.confidence = ConfidenceLevel::Low;

    let backend = ScriptedBackend::new(Vec::new());
    let engine = ForecastEngine::new(backend, ForecastDefaults::default());
    let high = engine.forecast(&raw, &high_spec).await.unwrap();
    let low = engine.forecast(&raw, &low_spec).await.unwrap();

    let high_width = high.points[0].upper - high.points[0].lower;
    let low_width = low.points[0].upper - low.points[0].lower;
    assert!(high_width > low_width);
}
