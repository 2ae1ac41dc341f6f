//! Plan validation
//!
//! Checks a compiled plan against the available schema before anything
//! executes: read-only SQL, known table references, a lenient column
//! reference check, and per-panel shape requirements. The mutation
//! keyword check is defense in depth; the executor's read-only
//! transaction is the primary safety mechanism.

use std::collections::{BTreeMap, HashSet};

use once_cell::sync::Lazy;
use regex::Regex;
use thiserror::Error;

use crate::services::plan::{AnalyticalPlan, PanelSpec, PanelType};
use crate::services::schema::DatasetProfile;

/// SQL keywords that indicate write operations
static WRITE_KEYWORD_REGEX: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"\b(INSERT|UPDATE|DELETE|DROP|CREATE|ALTER|TRUNCATE|REPLACE|MERGE)\b").unwrap()
});

/// Words that show up in SQL without being column references
const SQL_KEYWORDS: &[&str] = &[
    "select", "from", "where", "group", "by", "order", "having", "and", "or", "not", "in", "is",
    "null", "as", "on", "join", "left", "right", "inner", "outer", "full", "cross", "limit",
    "offset", "asc", "desc", "distinct", "count", "sum", "avg", "min", "max", "case", "when",
    "then", "else", "end", "like", "between", "exists", "union", "all", "any", "true", "false",
    "coalesce", "cast", "extract", "date", "time", "timestamp", "year", "month", "day", "hour",
    "minute", "second", "interval", "strftime", "round", "abs", "lower", "upper", "filter",
    "text", "integer", "real", "over", "partition", "row_number", "rank", "with",
];

static WORD_REGEX: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"\b([a-zA-Z_][a-zA-Z0-9_]*)\b").unwrap());
static SINGLE_QUOTED_REGEX: Lazy<Regex> = Lazy::new(|| Regex::new(r"'[^']*'").unwrap());
static DOUBLE_QUOTED_REGEX: Lazy<Regex> = Lazy::new(|| Regex::new(r#""[^"]*""#).unwrap());

#[derive(Debug, Error)]
pub enum ValidationError {
    #[error("SQL contains forbidden keyword: {0}. Only SELECT queries are allowed.")]
    ForbiddenKeyword(String),

    #[error("table '{table}' not found. Available tables: {available}")]
    UnknownTable { table: String, available: String },

    #[error("SQL may reference unknown columns: {0}")]
    UnknownColumns(String),

    #[error("panel '{0}' has no SQL and no main SQL is provided")]
    PanelMissingSql(String),

    #[error("{0} panel requires x and/or y axis fields")]
    MissingAxes(String),

    #[error("plan is marked feasible but carries no SQL")]
    MissingSql,
}

/// Validate a full plan against the available dataset profiles.
///
/// An infeasible plan is valid as-is; refusing is a legitimate answer.
pub fn validate_plan(
    plan: &AnalyticalPlan,
    profiles: &BTreeMap<String, DatasetProfile>,
) -> Result<(), ValidationError> {
    if !plan.feasible {
        return Ok(());
    }
    if !plan.is_feasible() {
        return Err(ValidationError::MissingSql);
    }

    validate_table_references(&plan.tables, profiles)?;

    if let Some(sql) = plan.sql.as_deref() {
        validate_sql_readonly(sql)?;
        validate_column_references(sql, profiles)?;
    }

    for panel in &plan.panels {
        let panel_sql = panel.sql.as_deref().or(plan.sql.as_deref());
        if panel_sql.is_none() {
            return Err(ValidationError::PanelMissingSql(panel.title.clone()));
        }
        if let Some(sql) = panel.sql.as_deref() {
            validate_sql_readonly(sql)?;
            validate_column_references(sql, profiles)?;
        }
        validate_panel(panel)?;
    }

    Ok(())
}

/// Reject SQL containing mutation keywords at word boundaries
pub fn validate_sql_readonly(sql: &str) -> Result<(), ValidationError> {
    let sql_upper = sql.to_uppercase();
    if let Some(cap) = WRITE_KEYWORD_REGEX.captures(&sql_upper) {
        return Err(ValidationError::ForbiddenKeyword(cap[1].to_string()));
    }
    Ok(())
}

fn validate_table_references(
    tables: &[String],
    profiles: &BTreeMap<String, DatasetProfile>,
) -> Result<(), ValidationError> {
    for table in tables {
        if !profiles.contains_key(table) {
            return Err(ValidationError::UnknownTable {
                table: table.clone(),
                available: profiles.keys().cloned().collect::<Vec<_>>().join(", "),
            });
        }
    }
    Ok(())
}

/// Lenient column check: flag only when several unknown identifiers pile
/// up, to keep alias-heavy SQL from tripping false positives.
fn validate_column_references(
    sql: &str,
    profiles: &BTreeMap<String, DatasetProfile>,
) -> Result<(), ValidationError> {
    let mut known: HashSet<String> = HashSet::new();
    for profile in profiles.values() {
        for col in &profile.columns {
            known.insert(col.name.to_lowercase());
        }
    }
    let table_names: HashSet<String> = profiles.keys().map(|t| t.to_lowercase()).collect();

    let cleaned = SINGLE_QUOTED_REGEX.replace_all(sql, "");
    let cleaned = DOUBLE_QUOTED_REGEX.replace_all(&cleaned, "");

    let mut unknown: Vec<String> = Vec::new();
    for cap in WORD_REGEX.captures_iter(&cleaned) {
        let word = cap.get(1).map(|m| m.as_str()).unwrap_or("");
        let lower = word.to_lowercase();
        if SQL_KEYWORDS.contains(&lower.as_str())
            || known.contains(&lower)
            || table_names.contains(&lower)
            || word.len() <= 2
        {
            continue;
        }
        unknown.push(word.to_string());
    }

    if unknown.len() > 3 {
        return Err(ValidationError::UnknownColumns(
            unknown.into_iter().take(5).collect::<Vec<_>>().join(", "),
        ));
    }
    Ok(())
}

fn validate_panel(panel: &PanelSpec) -> Result<(), ValidationError> {
    if matches!(panel.panel_type, PanelType::Bar | PanelType::Line | PanelType::Pie)
        && panel.x.is_none()
        && panel.y.is_none()
    {
        return Err(ValidationError::MissingAxes(panel.panel_type.as_str().to_string()));
    }
    Ok(())
}
