//! Series normalization and cadence inference
//!
//! Raw query rows carry x values in whatever encoding the dataset uses:
//! `YYYY-MM` strings, full calendar dates, timestamps, plain numbers, or
//! arbitrary labels. This module normalizes one series into sortable
//! [`SeriesPoint`]s and infers the regular step between observations.

use chrono::{Datelike, NaiveDate, NaiveDateTime};
use once_cell::sync::Lazy;
use regex::Regex;
use thiserror::Error;

static YEARMONTH_REGEX: Lazy<Regex> = Lazy::new(|| Regex::new(r"^\d{4}-\d{2}$").unwrap());

/// Forecast input failures. These degrade only the forecast overlay for
/// the affected panel; the underlying query result stays intact.
#[derive(Debug, Error)]
pub enum ForecastError {
    #[error("need at least 2 points to fit a forecast, got {0}")]
    TooFewPoints(usize),

    #[error("unparseable x value '{value}' for inferred {format:?} axis")]
    UnparseableAxis { value: String, format: XAxisFormat },

    #[error("series has no usable y values")]
    EmptySeries,
}

/// X-axis encoding, classified once per series from its first point.
/// Mixed encodings within one series indicate an upstream data error
/// rather than something to reconcile row by row.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum XAxisFormat {
    /// Strict `YYYY-MM`
    YearMonth,
    /// A parseable calendar date or timestamp
    Date,
    /// Plain numeric x
    Number,
    /// Fallback: input order is the sort key
    Ordinal,
}

/// One normalized observation
#[derive(Debug, Clone)]
pub struct SeriesPoint {
    pub x_raw: String,
    pub y: f64,
    pub sort_key: f64,
    pub parsed_date: Option<NaiveDate>,
    pub parsed_number: Option<f64>,
}

// ============================================================================
// Series Construction
// ============================================================================

/// Normalize raw (x, y) pairs into a time-ordered series.
///
/// Classification is per-series: the first point decides the format and
/// every later point must parse under it.
pub fn build_series(
    raw: &[(serde_json::Value, f64)],
) -> Result<(Vec<SeriesPoint>, XAxisFormat), ForecastError> {
    if raw.len() < 2 {
        return Err(ForecastError::TooFewPoints(raw.len()));
    }

    let first_label = value_label(&raw[0].0);
    let format = classify(&raw[0].0, &first_label);

    let mut points = Vec::with_capacity(raw.len());
    for (index, (x, y)) in raw.iter().enumerate() {
        let label = value_label(x);
        let point = match format {
            XAxisFormat::YearMonth => {
                let date = parse_yearmonth(&label).ok_or_else(|| ForecastError::UnparseableAxis {
                    value: label.clone(),
                    format,
                })?;
                SeriesPoint {
                    sort_key: month_index(date),
                    parsed_date: Some(date),
                    parsed_number: None,
                    x_raw: label,
                    y: *y,
                }
            },
            XAxisFormat::Date => {
                let date = parse_date(&label).ok_or_else(|| ForecastError::UnparseableAxis {
                    value: label.clone(),
                    format,
                })?;
                SeriesPoint {
                    sort_key: date.num_days_from_ce() as f64,
                    parsed_date: Some(date),
                    parsed_number: None,
                    x_raw: label,
                    y: *y,
                }
            },
            XAxisFormat::Number => {
                let n = value_number(x).ok_or_else(|| ForecastError::UnparseableAxis {
                    value: label.clone(),
                    format,
                })?;
                SeriesPoint {
                    sort_key: n,
                    parsed_date: None,
                    parsed_number: Some(n),
                    x_raw: label,
                    y: *y,
                }
            },
            XAxisFormat::Ordinal => SeriesPoint {
                sort_key: index as f64,
                parsed_date: None,
                parsed_number: None,
                x_raw: label,
                y: *y,
            },
        };
        points.push(point);
    }

    points.sort_by(|a, b| a.sort_key.partial_cmp(&b.sort_key).unwrap_or(std::cmp::Ordering::Equal));
    Ok((points, format))
}

fn value_label(value: &serde_json::Value) -> String {
    match value {
        serde_json::Value::String(s) => s.clone(),
        other => other.to_string(),
    }
}

fn value_number(value: &serde_json::Value) -> Option<f64> {
    match value {
        serde_json::Value::Number(n) => n.as_f64(),
        serde_json::Value::String(s) => s.trim().parse().ok(),
        _ => None,
    }
}

fn classify(value: &serde_json::Value, label: &str) -> XAxisFormat {
    if let serde_json::Value::Number(_) = value {
        return XAxisFormat::Number;
    }
    if YEARMONTH_REGEX.is_match(label) {
        return XAxisFormat::YearMonth;
    }
    if parse_date(label).is_some() {
        return XAxisFormat::Date;
    }
    if label.trim().parse::<f64>().is_ok() {
        return XAxisFormat::Number;
    }
    XAxisFormat::Ordinal
}

fn parse_yearmonth(label: &str) -> Option<NaiveDate> {
    if !YEARMONTH_REGEX.is_match(label) {
        return None;
    }
    let (year, month) = label.split_once('-')?;
    NaiveDate::from_ymd_opt(year.parse().ok()?, month.parse().ok()?, 1)
}

fn parse_date(label: &str) -> Option<NaiveDate> {
    let label = label.trim();
    for format in ["%Y-%m-%d", "%Y/%m/%d", "%d.%m.%Y"] {
        if let Ok(d) = NaiveDate::parse_from_str(label, format) {
            return Some(d);
        }
    }
    for format in ["%Y-%m-%dT%H:%M:%S", "%Y-%m-%d %H:%M:%S", "%Y-%m-%dT%H:%M:%S%.f", "%Y-%m-%dT%H:%M:%S%z"] {
        if let Ok(dt) = NaiveDateTime::parse_from_str(label, format) {
            return Some(dt.date());
        }
    }
    None
}

/// Months since year zero, the sort key for `YYYY-MM` series
fn month_index(date: NaiveDate) -> f64 {
    (date.year() as f64) * 12.0 + (date.month0() as f64)
}

// ============================================================================
// Cadence
// ============================================================================

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CadenceUnit {
    Day,
    Week,
    Month,
    Quarter,
    Year,
    Number,
    Unknown,
}

/// The inferred regular step between consecutive observations, used to
/// project future x-axis labels.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct CadenceInfo {
    pub unit: CadenceUnit,
    pub step: i64,
}

/// Infer cadence from the median step between consecutive sort keys.
///
/// Date-like series bucket the median day-step into calendar units with
/// fixed thresholds; numeric series keep the rounded median delta.
pub fn infer_cadence(points: &[SeriesPoint], format: XAxisFormat) -> CadenceInfo {
    let deltas: Vec<f64> = points
        .windows(2)
        .map(|w| w[1].sort_key - w[0].sort_key)
        .filter(|d| *d > 0.0)
        .collect();

    let median = match median_of(&deltas) {
        Some(m) => m,
        None => return CadenceInfo { unit: CadenceUnit::Unknown, step: 1 },
    };

    match format {
        XAxisFormat::YearMonth => CadenceInfo {
            unit: CadenceUnit::Month,
            step: (median.round() as i64).max(1),
        },
        XAxisFormat::Date => {
            // Median is in days here
            if median >= 300.0 {
                CadenceInfo { unit: CadenceUnit::Year, step: ((median / 365.25).round() as i64).max(1) }
            } else if median >= 80.0 {
                CadenceInfo { unit: CadenceUnit::Quarter, step: ((median / 91.3).round() as i64).max(1) }
            } else if median >= 27.0 {
                CadenceInfo { unit: CadenceUnit::Month, step: ((median / 30.44).round() as i64).max(1) }
            } else if median >= 6.0 {
                CadenceInfo { unit: CadenceUnit::Week, step: ((median / 7.0).round() as i64).max(1) }
            } else {
                CadenceInfo { unit: CadenceUnit::Day, step: (median.round() as i64).max(1) }
            }
        },
        XAxisFormat::Number => CadenceInfo {
            unit: CadenceUnit::Number,
            step: (median.round() as i64).max(1),
        },
        XAxisFormat::Ordinal => CadenceInfo { unit: CadenceUnit::Unknown, step: 1 },
    }
}

fn median_of(values: &[f64]) -> Option<f64> {
    if values.is_empty() {
        return None;
    }
    let mut sorted = values.to_vec();
    sorted.sort_by(|a, b| a.partial_cmp(b).unwrap_or(std::cmp::Ordering::Equal));
    let mid = sorted.len() / 2;
    if sorted.len() % 2 == 0 {
        Some((sorted[mid - 1] + sorted[mid]) / 2.0)
    } else {
        Some(sorted[mid])
    }
}
