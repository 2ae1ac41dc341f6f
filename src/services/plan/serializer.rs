//! Plan notation serializer
//!
//! Renders value trees and typed models back to notation text. Used for
//! round-trip testing, for embedding schema descriptions in prompts, and
//! for showing the backend the exact format it must reply in.

use super::models::{AnalyticalPlan, DashboardSpec, ForecastSpec, PanelSpec};
use super::parser::NotationValue;

/// Render a value tree as notation text.
///
/// Compact mode produces single-line output for prompt embedding; the
/// indented mode is for logs and fixtures.
pub fn render(value: &NotationValue, compact: bool) -> String {
    render_value(value, 0, compact)
}

fn render_value(value: &NotationValue, indent: usize, compact: bool) -> String {
    match value {
        NotationValue::Null => "null".to_string(),
        NotationValue::Bool(b) => if *b { "true" } else { "false" }.to_string(),
        NotationValue::Int(n) => n.to_string(),
        NotationValue::Float(f) => f.to_string(),
        NotationValue::Str(s) => render_string(s),
        NotationValue::Array(items) => render_array(items, indent, compact),
        NotationValue::Object { tag, fields } => {
            let body = render_fields(fields, indent + 2, compact);
            let prefix = tag.as_deref().map(|t| format!("@{t}")).unwrap_or_default();
            if compact {
                format!("{prefix}{{{body}}}")
            } else {
                let pad = " ".repeat(indent);
                format!("{prefix}{{\n{body}\n{pad}}}")
            }
        },
    }
}

fn render_fields(fields: &[(String, NotationValue)], indent: usize, compact: bool) -> String {
    let parts: Vec<String> = fields
        .iter()
        .filter(|(_, v)| !matches!(v, NotationValue::Null))
        .map(|(k, v)| {
            let rendered = render_value(v, indent, compact);
            if compact {
                format!("{k}:{rendered}")
            } else {
                format!("{}{k}:{rendered}", " ".repeat(indent))
            }
        })
        .collect();
    if compact { parts.join(" ") } else { parts.join("\n") }
}

fn render_array(items: &[NotationValue], indent: usize, compact: bool) -> String {
    if items.is_empty() {
        return "[]".to_string();
    }
    let has_complex =
        items.iter().any(|i| matches!(i, NotationValue::Object { .. } | NotationValue::Array(_)));
    if compact || !has_complex {
        let rendered: Vec<String> = items.iter().map(|i| render_value(i, indent, true)).collect();
        format!("[{}]", rendered.join(","))
    } else {
        let inner = indent + 2;
        let rendered: Vec<String> = items
            .iter()
            .map(|i| format!("{}{}", " ".repeat(inner), render_value(i, inner, false)))
            .collect();
        format!("[\n{}\n{}]", rendered.join(",\n"), " ".repeat(indent))
    }
}

/// Quote a string unless it is a simple identifier-like token that will
/// survive the bare-token parse unchanged.
fn render_string(s: &str) -> String {
    let simple = !s.is_empty()
        && s.chars().next().is_some_and(|c| c.is_ascii_alphabetic() || c == '_')
        && s.chars().all(|c| c.is_ascii_alphanumeric() || c == '_')
        && !matches!(s, "true" | "false" | "null" | "none");
    if simple {
        s.to_string()
    } else {
        let escaped = s.replace('\\', "\\\\").replace('"', "\\\"");
        format!("\"{escaped}\"")
    }
}

// ============================================================================
// Typed Model Rendering
// ============================================================================

impl AnalyticalPlan {
    pub fn to_notation(&self) -> NotationValue {
        let mut fields = vec![
            ("q".to_string(), NotationValue::Str(self.question.clone())),
            ("feasible".to_string(), NotationValue::Bool(self.feasible)),
        ];
        if let Some(reason) = &self.reason {
            fields.push(("reason".to_string(), NotationValue::Str(reason.clone())));
        }
        if !self.tables.is_empty() {
            fields.push(("tables".to_string(), str_array(&self.tables)));
        }
        if let Some(sql) = &self.sql {
            fields.push(("sql".to_string(), NotationValue::Str(sql.clone())));
        }
        if !self.panels.is_empty() {
            fields.push((
                "panels".to_string(),
                NotationValue::Array(self.panels.iter().map(PanelSpec::to_notation).collect()),
            ));
        }
        if !self.follow_ups.is_empty() {
            fields.push(("followUps".to_string(), str_array(&self.follow_ups)));
        }
        if let Some(summary) = &self.executive_summary {
            fields.push(("summary".to_string(), NotationValue::Str(summary.clone())));
        }
        NotationValue::Object { tag: Some("plan".to_string()), fields }
    }

    pub fn to_notation_string(&self, compact: bool) -> String {
        render(&self.to_notation(), compact)
    }
}

impl PanelSpec {
    pub fn to_notation(&self) -> NotationValue {
        let mut fields = vec![
            ("type".to_string(), NotationValue::Str(self.panel_type.as_str().to_string())),
            ("title".to_string(), NotationValue::Str(self.title.clone())),
        ];
        if let Some(sql) = &self.sql {
            fields.push(("sql".to_string(), NotationValue::Str(sql.clone())));
        }
        if let Some(x) = &self.x {
            fields.push(("x".to_string(), NotationValue::Str(x.clone())));
        }
        if let Some(y) = &self.y {
            fields.push(("y".to_string(), NotationValue::Str(y.clone())));
        }
        if let Some(description) = &self.description {
            fields.push(("description".to_string(), NotationValue::Str(description.clone())));
        }
        if let Some(value_field) = &self.value_field {
            fields.push(("value".to_string(), NotationValue::Str(value_field.clone())));
        }
        if !self.columns.is_empty() {
            fields.push(("columns".to_string(), str_array(&self.columns)));
        }
        if let Some(forecast) = &self.forecast {
            fields.push(("forecast".to_string(), forecast.to_notation()));
        }
        NotationValue::Object { tag: Some("panel".to_string()), fields }
    }
}

impl ForecastSpec {
    pub fn to_notation(&self) -> NotationValue {
        let mut fields = vec![
            ("strategy".to_string(), NotationValue::Str(self.strategy.as_str().to_string())),
            ("horizon".to_string(), NotationValue::Int(self.horizon as i64)),
        ];
        if let Some(window) = self.window {
            fields.push(("window".to_string(), NotationValue::Int(window as i64)));
        }
        if let Some(alpha) = self.alpha {
            fields.push(("alpha".to_string(), NotationValue::Float(alpha)));
        }
        if let Some(season) = self.season_length {
            fields.push(("seasonLength".to_string(), NotationValue::Int(season as i64)));
        }
        fields.push((
            "confidence".to_string(),
            NotationValue::Str(self.confidence.as_str().to_string()),
        ));
        if let Some(pct) = self.interval_pct {
            fields.push(("intervalPct".to_string(), NotationValue::Float(pct)));
        }
        NotationValue::Object { tag: Some("forecast".to_string()), fields }
    }
}

impl DashboardSpec {
    pub fn to_notation(&self) -> NotationValue {
        NotationValue::Object {
            tag: Some("dashboard".to_string()),
            fields: vec![
                ("title".to_string(), NotationValue::Str(self.title.clone())),
                (
                    "panels".to_string(),
                    NotationValue::Array(self.panels.iter().map(PanelSpec::to_notation).collect()),
                ),
            ],
        }
    }
}

fn str_array(items: &[String]) -> NotationValue {
    NotationValue::Array(items.iter().map(|s| NotationValue::Str(s.clone())).collect())
}
