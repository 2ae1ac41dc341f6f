//! Trend statistics and seasonality detection

use super::series::{CadenceInfo, CadenceUnit};

/// Ordinary-least-squares trend over the index sequence 1..n, plus the
/// dispersion measures that drive model selection and interval width.
#[derive(Debug, Clone, Copy)]
pub struct TrendStats {
    pub slope: f64,
    pub intercept: f64,
    pub r_squared: f64,
    pub mean: f64,
    pub std_dev: f64,
    pub coefficient_of_variation: f64,
}

/// Fit OLS over x = 1..n against y
pub fn trend_stats(ys: &[f64]) -> TrendStats {
    let n = ys.len() as f64;
    let mean = ys.iter().sum::<f64>() / n;

    let x_mean = (n + 1.0) / 2.0;
    let mut sxy = 0.0;
    let mut sxx = 0.0;
    for (i, y) in ys.iter().enumerate() {
        let x = (i + 1) as f64;
        sxy += (x - x_mean) * (y - mean);
        sxx += (x - x_mean) * (x - x_mean);
    }
    let slope = if sxx > 0.0 { sxy / sxx } else { 0.0 };
    let intercept = mean - slope * x_mean;

    let ss_tot: f64 = ys.iter().map(|y| (y - mean) * (y - mean)).sum();
    let ss_res: f64 = ys
        .iter()
        .enumerate()
        .map(|(i, y)| {
            let fitted = intercept + slope * (i + 1) as f64;
            (y - fitted) * (y - fitted)
        })
        .sum();
    // A flat series is a perfect fit for its own trend line
    let r_squared = if ss_tot > 1e-12 { (1.0 - ss_res / ss_tot).clamp(0.0, 1.0) } else { 1.0 };

    let std_dev = if ys.len() > 1 {
        (ys.iter().map(|y| (y - mean) * (y - mean)).sum::<f64>() / (n - 1.0)).sqrt()
    } else {
        0.0
    };
    let coefficient_of_variation = if mean.abs() > 1e-12 { std_dev / mean.abs() } else { 0.0 };

    TrendStats { slope, intercept, r_squared, mean, std_dev, coefficient_of_variation }
}

// ============================================================================
// Seasonality
// ============================================================================

/// A candidate seasonal period with its lag-correlation strength
#[derive(Debug, Clone, Copy)]
pub struct Seasonality {
    pub length: usize,
    pub strength: f64,
}

/// Detect seasonality when cadence and series length support a plausible
/// season:
/// - month cadence with >= 24 points: season length 12
/// - week cadence with >= 26 points: 13, or 52 once two full years exist
/// - day cadence with >= 21 points: 7
///
/// Strength is the Pearson correlation between the series and its
/// lag-shifted self. A season is only reported when the candidate length
/// is strictly shorter than the series.
pub fn detect_seasonality(ys: &[f64], cadence: &CadenceInfo) -> Option<Seasonality> {
    let n = ys.len();
    let candidate = match cadence.unit {
        CadenceUnit::Month if n >= 24 => 12,
        CadenceUnit::Week if n >= 26 => {
            if n >= 104 { 52 } else { 13 }
        },
        CadenceUnit::Day if n >= 21 => 7,
        _ => return None,
    };

    if candidate >= n {
        return None;
    }

    let strength = lag_correlation(ys, candidate);
    Some(Seasonality { length: candidate, strength })
}

/// Pearson correlation between y[..n-lag] and y[lag..]
fn lag_correlation(ys: &[f64], lag: usize) -> f64 {
    let n = ys.len();
    if lag >= n {
        return 0.0;
    }
    let a = &ys[..n - lag];
    let b = &ys[lag..];
    let len = a.len() as f64;

    let mean_a = a.iter().sum::<f64>() / len;
    let mean_b = b.iter().sum::<f64>() / len;

    let mut cov = 0.0;
    let mut var_a = 0.0;
    let mut var_b = 0.0;
    for i in 0..a.len() {
        let da = a[i] - mean_a;
        let db = b[i] - mean_b;
        cov += da * db;
        var_a += da * da;
        var_b += db * db;
    }

    if var_a < 1e-12 || var_b < 1e-12 {
        return 0.0;
    }
    cov / (var_a.sqrt() * var_b.sqrt())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::services::forecast::series::{CadenceInfo, CadenceUnit};

    #[test]
    fn test_trend_stats_perfect_line() {
        // y = 90 + 10x over x = 1..=5
        let ys: Vec<f64> = (1..=5).map(|x| 90.0 + 10.0 * x as f64).collect();
        let stats = trend_stats(&ys);
        assert!((stats.slope - 10.0).abs() < 1e-9);
        assert!((stats.intercept - 90.0).abs() < 1e-9);
        assert!((stats.r_squared - 1.0).abs() < 1e-9);
    }

    #[test]
    fn test_trend_stats_flat_series() {
        let ys = vec![42.0; 10];
        let stats = trend_stats(&ys);
        assert!(stats.slope.abs() < 1e-9);
        assert!((stats.r_squared - 1.0).abs() < 1e-9);
        assert!(stats.std_dev < 1e-9);
    }

    #[test]
    fn test_monthly_sinusoid_detects_season_12() {
        let ys: Vec<f64> = (0..36)
            .map(|i| (2.0 * std::f64::consts::PI * i as f64 / 12.0).sin())
            .collect();
        let cadence = CadenceInfo { unit: CadenceUnit::Month, step: 1 };
        let season = detect_seasonality(&ys, &cadence).expect("season not detected");
        assert_eq!(season.length, 12);
        assert!(season.strength > 0.9, "strength {} too weak", season.strength);
    }

    #[test]
    fn test_short_series_has_no_season() {
        let ys: Vec<f64> = (0..12).map(|i| i as f64).collect();
        let cadence = CadenceInfo { unit: CadenceUnit::Month, step: 1 };
        assert!(detect_seasonality(&ys, &cadence).is_none());
    }

    #[test]
    fn test_weekly_candidate_depends_on_length() {
        let short: Vec<f64> = (0..30).map(|i| i as f64).collect();
        let long: Vec<f64> = (0..110).map(|i| i as f64).collect();
        let cadence = CadenceInfo { unit: CadenceUnit::Week, step: 1 };
        assert_eq!(detect_seasonality(&short, &cadence).unwrap().length, 13);
        assert_eq!(detect_seasonality(&long, &cadence).unwrap().length, 52);
    }

    #[test]
    fn test_daily_candidate_is_seven() {
        let ys: Vec<f64> = (0..28)
            .map(|i| (2.0 * std::f64::consts::PI * i as f64 / 7.0).sin())
            .collect();
        let cadence = CadenceInfo { unit: CadenceUnit::Day, step: 1 };
        let season = detect_seasonality(&ys, &cadence).unwrap();
        assert_eq!(season.length, 7);
        assert!(season.strength > 0.9);
    }
}
