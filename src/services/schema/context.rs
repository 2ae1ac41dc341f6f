//! Schema context rendering
//!
//! Renders dataset profiles into the notation-formatted schema block the
//! compiler prompt embeds, and detects cross-dataset relationships from
//! naming conventions so the model can write joins.

use std::collections::BTreeMap;

use super::models::{DatasetProfile, Relationship};

/// Render profiles as an `@schemas{...}` block for the compiler prompt.
///
/// Datasets are emitted in name order so the prompt is stable across
/// runs with identical inputs.
pub fn schema_context(profiles: &BTreeMap<String, DatasetProfile>) -> String {
    let mut lines = vec!["@schemas{".to_string()];

    for (table_name, profile) in profiles {
        lines.push("  @table{".to_string());
        lines.push(format!("    name:\"{table_name}\""));
        lines.push(format!("    rows:{}", profile.row_count));
        lines.push("    columns:[".to_string());

        for col in &profile.columns {
            let mut roles = Vec::new();
            if col.is_timestamp {
                roles.push("timestamp");
            }
            if col.is_metric {
                roles.push("metric");
            }
            if col.is_entity_id {
                roles.push("entity_id");
            }
            if col.is_categorical {
                roles.push("categorical");
            }
            let role_str = if roles.is_empty() {
                String::new()
            } else {
                format!(" role:[{}]", roles.join(","))
            };
            let samples = col
                .sample_values
                .iter()
                .take(3)
                .map(|v| format!("\"{}\"", v.replace('"', "'")))
                .collect::<Vec<_>>()
                .join(",");
            lines.push(format!(
                "      @col{{name:\"{}\" type:{}{} samples:[{}]}}",
                col.name, col.dtype, role_str, samples
            ));
        }

        lines.push("    ]".to_string());

        let time_cols = profile.timestamp_columns();
        if !time_cols.is_empty() {
            lines.push(format!("    timeColumns:[{}]", time_cols.join(",")));
        }
        let metric_cols = profile.metric_columns();
        if !metric_cols.is_empty() {
            lines.push(format!("    metricColumns:[{}]", metric_cols.join(",")));
        }
        let category_cols = profile.categorical_columns();
        if !category_cols.is_empty() {
            lines.push(format!("    categoryColumns:[{}]", category_cols.join(",")));
        }

        lines.push("  }".to_string());
    }

    let relationships = detect_relationships(profiles);
    if !relationships.is_empty() {
        lines.push("  @relationships[".to_string());
        for rel in &relationships {
            lines.push(format!(
                "    @rel{{from:\"{}.{}\" to:\"{}.{}\" type:{}}}",
                rel.source_table, rel.source_column, rel.target_table, rel.target_column, rel.kind
            ));
        }
        lines.push("  ]".to_string());
    }

    lines.push("}".to_string());
    lines.join("\n")
}

/// Detect relationships between datasets.
///
/// Two strategies:
/// 1. Standard FK: a column `<name>_id` pointing at `<name>.id` or
///    `<name>s.id`.
/// 2. Polymorphic: an `entity_id` + `entity_type` pair whose type sample
///    values name other datasets.
pub fn detect_relationships(profiles: &BTreeMap<String, DatasetProfile>) -> Vec<Relationship> {
    let mut relationships = Vec::new();

    for (source_name, source_profile) in profiles {
        for col in &source_profile.columns {
            if !col.name.ends_with("_id") || col.name == "id" {
                continue;
            }
            let prefix = &col.name[..col.name.len() - 3];
            // Naive pluralization covers the common shipment_id -> shipments case
            for target in [prefix.to_string(), format!("{prefix}s")] {
                if profiles.contains_key(&target) {
                    relationships.push(Relationship {
                        source_table: source_name.clone(),
                        source_column: col.name.clone(),
                        target_table: target,
                        target_column: "id".to_string(),
                        kind: "fk".to_string(),
                    });
                }
            }
        }
    }

    for (source_name, source_profile) in profiles {
        let entity_id = source_profile.get_column("entity_id");
        let entity_type = source_profile.get_column("entity_type");
        let (Some(_), Some(type_col)) = (entity_id, entity_type) else {
            continue;
        };

        let mut seen = std::collections::HashSet::new();
        for value in &type_col.sample_values {
            if !seen.insert(value.clone()) {
                continue;
            }
            for target in [value.clone(), format!("{value}s")] {
                if profiles.contains_key(&target) {
                    relationships.push(Relationship {
                        source_table: source_name.clone(),
                        source_column: "entity_id".to_string(),
                        target_table: target,
                        target_column: "id".to_string(),
                        kind: "polymorphic".to_string(),
                    });
                }
            }
        }
    }

    relationships
}
