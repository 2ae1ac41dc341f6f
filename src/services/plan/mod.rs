//! Plan Notation Module
//!
//! The compact `@type{field:value ...}` notation used for LLM structured
//! output in place of JSON. The notation is cheaper in tokens and survives
//! truncation better than JSON, so every structured exchange with the
//! text-generation backend (plans, dashboards, forecast specs) goes
//! through this module.
//!
//! # Grammar
//! - Objects: `@type{key:value key2:value2}` or bare `{...}` when nested
//! - Arrays: `[a,b,c]`
//! - Strings: bare identifiers when simple, `"quoted"` otherwise
//! - Booleans: `true`/`false`, null: `null`
//! - Numbers: unquoted integers and floats

mod error;
mod models;
mod parser;
mod serializer;

pub use error::{NotationError, NotationResult};
pub use models::{
    AnalyticalPlan, ConfidenceLevel, DashboardSpec, ForecastSpec, ForecastStrategy, PanelSpec,
    PanelType,
};
pub use parser::{
    NotationValue, extract_notation, parse, parse_dashboard, parse_forecast_spec, parse_plan,
};
pub use serializer::render;

#[cfg(test)]
mod tests;
