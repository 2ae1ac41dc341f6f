//! NDJSON ingestion
//!
//! Loads newline-delimited JSON rows into a SQLite table. The row store
//! is schemaless on the wire; column names and affinities are inferred
//! from the first row and every later row binds by those keys.

use std::path::Path;

use once_cell::sync::Lazy;
use regex::Regex;
use sqlx::SqlitePool;

static IDENT_REGEX: Lazy<Regex> = Lazy::new(|| Regex::new(r"^\w+$").unwrap());

/// Load an NDJSON file into `table`, replacing any previous contents.
/// Returns the number of rows inserted.
pub async fn load_ndjson(pool: &SqlitePool, table: &str, path: &Path) -> anyhow::Result<u64> {
    let content = tokio::fs::read_to_string(path).await?;
    load_ndjson_str(pool, table, &content).await
}

/// Load NDJSON content that is already in memory
pub async fn load_ndjson_str(pool: &SqlitePool, table: &str, content: &str) -> anyhow::Result<u64> {
    if !IDENT_REGEX.is_match(table) {
        anyhow::bail!("invalid table name: {table}");
    }

    let mut rows = Vec::new();
    for (line_no, line) in content.lines().enumerate() {
        let line = line.trim();
        if line.is_empty() {
            continue;
        }
        let value: serde_json::Value = serde_json::from_str(line)
            .map_err(|e| anyhow::anyhow!("line {}: invalid JSON: {e}", line_no + 1))?;
        match value {
            serde_json::Value::Object(map) => rows.push(map),
            other => anyhow::bail!("line {}: expected a JSON object, got {other}", line_no + 1),
        }
    }

    let first = rows
        .first()
        .ok_or_else(|| anyhow::anyhow!("no rows to ingest"))?;

    let columns: Vec<(String, &'static str)> = first
        .iter()
        .map(|(name, value)| {
            if !IDENT_REGEX.is_match(name) {
                anyhow::bail!("invalid column name: {name}");
            }
            Ok((name.clone(), affinity_for(value)))
        })
        .collect::<anyhow::Result<_>>()?;

    let column_ddl = columns
        .iter()
        .map(|(name, affinity)| format!("\"{name}\" {affinity}"))
        .collect::<Vec<_>>()
        .join(", ");

    sqlx::query(&format!("DROP TABLE IF EXISTS \"{table}\""))
        .execute(pool)
        .await?;
    sqlx::query(&format!("CREATE TABLE \"{table}\" ({column_ddl})"))
        .execute(pool)
        .await?;

    let placeholders = vec!["?"; columns.len()].join(", ");
    let column_names = columns
        .iter()
        .map(|(name, _)| format!("\"{name}\""))
        .collect::<Vec<_>>()
        .join(", ");
    let insert_sql = format!("INSERT INTO \"{table}\" ({column_names}) VALUES ({placeholders})");

    let mut inserted = 0u64;
    for row in &rows {
        let mut query = sqlx::query(&insert_sql);
        for (name, _) in &columns {
            query = match row.get(name) {
                None | Some(serde_json::Value::Null) => query.bind(None::<String>),
                Some(serde_json::Value::Bool(b)) => query.bind(*b as i64),
                Some(serde_json::Value::Number(n)) => {
                    if let Some(i) = n.as_i64() {
                        query.bind(i)
                    } else {
                        query.bind(n.as_f64().unwrap_or(f64::NAN))
                    }
                },
                Some(serde_json::Value::String(s)) => query.bind(s.clone()),
                // Nested structures are stored as their JSON text
                Some(other) => query.bind(other.to_string()),
            };
        }
        query.execute(pool).await?;
        inserted += 1;
    }

    tracing::info!("ingested {} rows into {}", inserted, table);
    Ok(inserted)
}

fn affinity_for(value: &serde_json::Value) -> &'static str {
    match value {
        serde_json::Value::Number(n) if n.is_i64() || n.is_u64() => "INTEGER",
        serde_json::Value::Number(_) => "REAL",
        serde_json::Value::Bool(_) => "INTEGER",
        _ => "TEXT",
    }
}
