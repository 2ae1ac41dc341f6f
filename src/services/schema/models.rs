//! Dataset profile models

use serde::{Deserialize, Serialize};

/// Profile of a single column
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ColumnProfile {
    pub name: String,
    pub dtype: String,
    pub nullable: bool,
    pub is_timestamp: bool,
    pub is_metric: bool,
    pub is_entity_id: bool,
    pub is_categorical: bool,
    pub distinct_count: i64,
    pub sample_values: Vec<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub min_value: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub max_value: Option<String>,
}

/// Profile of a dataset (one table in the row store)
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DatasetProfile {
    pub name: String,
    pub row_count: i64,
    pub columns: Vec<ColumnProfile>,
}

impl DatasetProfile {
    pub fn get_column(&self, name: &str) -> Option<&ColumnProfile> {
        self.columns.iter().find(|c| c.name == name)
    }

    pub fn timestamp_columns(&self) -> Vec<&str> {
        self.columns.iter().filter(|c| c.is_timestamp).map(|c| c.name.as_str()).collect()
    }

    pub fn metric_columns(&self) -> Vec<&str> {
        self.columns.iter().filter(|c| c.is_metric).map(|c| c.name.as_str()).collect()
    }

    pub fn categorical_columns(&self) -> Vec<&str> {
        self.columns.iter().filter(|c| c.is_categorical).map(|c| c.name.as_str()).collect()
    }
}

/// A detected relationship between datasets
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Relationship {
    pub source_table: String,
    pub source_column: String,
    pub target_table: String,
    pub target_column: String,
    /// "fk" or "polymorphic"
    pub kind: String,
}
