//! SQLite-backed dataset profiler
//!
//! Computes row counts, distinct counts, sample values, and min/max per
//! column, then classifies each column into a role (timestamp, metric,
//! entity id, categorical) from its declared type and name.

use std::collections::BTreeMap;

use once_cell::sync::Lazy;
use regex::Regex;
use sqlx::{Row, SqlitePool};

use super::models::{ColumnProfile, DatasetProfile};

static IDENT_REGEX: Lazy<Regex> = Lazy::new(|| Regex::new(r"^\w+$").unwrap());

/// Profile every user table in the database
pub async fn profile_datasets(
    pool: &SqlitePool,
) -> anyhow::Result<BTreeMap<String, DatasetProfile>> {
    let rows = sqlx::query(
        "SELECT name FROM sqlite_master WHERE type = 'table' AND name NOT LIKE 'sqlite_%' ORDER BY name",
    )
    .fetch_all(pool)
    .await?;

    let mut profiles = BTreeMap::new();
    for row in rows {
        let name: String = row.get("name");
        let profile = profile_dataset(pool, &name).await?;
        profiles.insert(name, profile);
    }
    Ok(profiles)
}

/// Profile a single table
pub async fn profile_dataset(pool: &SqlitePool, table: &str) -> anyhow::Result<DatasetProfile> {
    if !IDENT_REGEX.is_match(table) {
        anyhow::bail!("invalid table name: {table}");
    }

    let row_count: i64 = sqlx::query_scalar(&format!("SELECT COUNT(*) FROM \"{table}\""))
        .fetch_one(pool)
        .await?;

    let schema_rows = sqlx::query(&format!("PRAGMA table_info(\"{table}\")"))
        .fetch_all(pool)
        .await?;

    let mut columns = Vec::with_capacity(schema_rows.len());
    for schema_row in schema_rows {
        let name: String = schema_row.get("name");
        let dtype: String = schema_row.get("type");
        let notnull: i64 = schema_row.get("notnull");
        columns.push(profile_column(pool, table, &name, &dtype, notnull == 0).await?);
    }

    tracing::debug!("profiled dataset {} ({} rows, {} columns)", table, row_count, columns.len());
    Ok(DatasetProfile { name: table.to_string(), row_count, columns })
}

async fn profile_column(
    pool: &SqlitePool,
    table: &str,
    column: &str,
    dtype: &str,
    nullable: bool,
) -> anyhow::Result<ColumnProfile> {
    if !IDENT_REGEX.is_match(column) {
        anyhow::bail!("invalid column name: {column}");
    }

    let mut profile = ColumnProfile {
        name: column.to_string(),
        dtype: dtype.to_string(),
        nullable,
        ..ColumnProfile::default()
    };

    profile.distinct_count =
        sqlx::query_scalar(&format!("SELECT COUNT(DISTINCT \"{column}\") FROM \"{table}\""))
            .fetch_one(pool)
            .await?;

    let sample_rows = sqlx::query(&format!(
        "SELECT DISTINCT CAST(\"{column}\" AS TEXT) AS v FROM \"{table}\" \
         WHERE \"{column}\" IS NOT NULL LIMIT 5"
    ))
    .fetch_all(pool)
    .await?;
    profile.sample_values = sample_rows
        .iter()
        .filter_map(|r| r.get::<Option<String>, _>("v"))
        .collect();

    if is_numeric_type(dtype) || is_timestamp_type(dtype) {
        let bounds = sqlx::query(&format!(
            "SELECT CAST(MIN(\"{column}\") AS TEXT) AS lo, CAST(MAX(\"{column}\") AS TEXT) AS hi \
             FROM \"{table}\""
        ))
        .fetch_one(pool)
        .await?;
        profile.min_value = bounds.get("lo");
        profile.max_value = bounds.get("hi");
    }

    // Role classification: declared type first, then name heuristics
    if is_timestamp_type(dtype) || looks_like_timestamp(column) {
        profile.is_timestamp = true;
    } else if is_numeric_type(dtype) {
        if !looks_like_id(column) {
            profile.is_metric = true;
        }
    } else if is_string_type(dtype) {
        if looks_like_id(column) {
            profile.is_entity_id = true;
        } else if profile.distinct_count < 50 {
            profile.is_categorical = true;
        }
    }

    Ok(profile)
}

fn is_timestamp_type(dtype: &str) -> bool {
    let d = dtype.to_lowercase();
    ["timestamp", "date", "time"].iter().any(|t| d.contains(t))
}

fn is_numeric_type(dtype: &str) -> bool {
    let d = dtype.to_lowercase();
    ["integer", "bigint", "smallint", "tinyint", "int", "double", "float", "real", "decimal", "numeric"]
        .iter()
        .any(|t| d.contains(t))
}

fn is_string_type(dtype: &str) -> bool {
    let d = dtype.to_lowercase();
    ["varchar", "char", "text", "string", "clob"].iter().any(|t| d.contains(t))
}

fn looks_like_id(name: &str) -> bool {
    let n = name.to_lowercase();
    n == "id" || n.ends_with("_id") || n.ends_with("id") || n.starts_with("id_")
}

fn looks_like_timestamp(name: &str) -> bool {
    let n = name.to_lowercase();
    n.ends_with("_at")
        || ["date", "time", "timestamp", "created", "updated", "when", "datetime"]
            .iter()
            .any(|t| n.contains(t))
}
