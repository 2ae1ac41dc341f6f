pub mod compiler;
pub mod executor;
pub mod forecast;
pub mod ingestion;
pub mod llm;
pub mod pipeline;
pub mod plan;
pub mod schema;

pub use compiler::{
    CompileError, FailureExplanation, MAX_COMPILE_ATTEMPTS, QuestionCompiler, RetryReason,
    ValidationError, validate_plan, validate_sql_readonly, wants_forecast,
};
pub use executor::{
    QueryResult, RepairLoop, RepairOutcome, SqlExecutor, SqliteExecutor, is_timeout_error,
};
pub use forecast::{
    CadenceInfo, CadenceUnit, ForecastDefaults, ForecastEngine, ForecastError, ForecastOutcome,
    ForecastPoint, Seasonality, SeriesPoint, TrendStats, XAxisFormat,
};
pub use ingestion::{load_ndjson, load_ndjson_str};
pub use llm::{
    ChatCompletionsBackend, GeminiBackend, GenerateError, ProviderKind, ProviderSettings,
    TextGenerator, backend_from_settings,
};
pub use pipeline::{AnalyticsPipeline, AskOutcome, LineageEntry, PanelResult, QueryLineage};
pub use plan::{
    AnalyticalPlan, ConfidenceLevel, DashboardSpec, ForecastSpec, ForecastStrategy, NotationError,
    PanelSpec, PanelType, parse_plan,
};
pub use schema::{
    ColumnProfile, DatasetProfile, Relationship, detect_relationships, profile_dataset,
    profile_datasets, schema_context,
};
