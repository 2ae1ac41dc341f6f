//! Schema Context Module
//!
//! Dataset profiles (column types, roles, sample values) and the textual
//! schema description spliced into the compiler's prompt. Profiles are
//! normally supplied by the ingestion side; the SQLite-backed profiler
//! here computes them for local datasets.

mod context;
mod models;
mod profiler;

pub use context::{detect_relationships, schema_context};
pub use models::{ColumnProfile, DatasetProfile, Relationship};
pub use profiler::{profile_dataset, profile_datasets};
