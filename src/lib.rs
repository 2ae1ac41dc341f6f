//! Sibyl Library
//!
//! Sibyl translates free-text analytical questions into executable SQL
//! against a SQLite-backed JSON-row store, repairs failing SQL with
//! bounded LLM assistance, and overlays statistically grounded forecasts
//! on time-series panels.

pub mod config;
pub mod services;

// Re-export commonly used types
pub use config::Config;
pub use services::llm::{GenerateError, ProviderKind, ProviderSettings, TextGenerator};
pub use services::{
    AnalyticalPlan, AnalyticsPipeline, AskOutcome, ForecastEngine, ForecastSpec, ForecastStrategy,
    PanelSpec, PanelType, QueryResult, QuestionCompiler, RepairLoop, SqlExecutor, SqliteExecutor,
};

#[cfg(test)]
mod tests;
