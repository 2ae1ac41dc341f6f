use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;

use clap::{Parser, Subcommand};
use sqlx::sqlite::{SqliteConnectOptions, SqlitePoolOptions};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use sibyl::config::{Config, ConfigOverrides};
use sibyl::services::forecast::ForecastDefaults;
use sibyl::services::{
    AnalyticsPipeline, SqliteExecutor, backend_from_settings, load_ndjson, profile_datasets,
    schema_context,
};

#[derive(Parser, Debug)]
#[command(name = "sibyl")]
#[command(version, about = "Sibyl - question-to-dashboard analytics engine")]
struct Cli {
    #[command(flatten)]
    overrides: ConfigOverrides,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Load an NDJSON file into the row store
    Ingest {
        /// Path to the newline-delimited JSON file
        file: PathBuf,
        /// Target table name
        #[arg(long)]
        table: String,
    },
    /// Profile every dataset and print the schema context
    Profile,
    /// Compile and execute one analytical question
    Ask {
        /// The question to answer
        question: String,
    },
    /// Generate an overview dashboard specification
    Overview,
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    dotenvy::dotenv().ok();
    let cli = Cli::parse();
    let config = Config::load(&cli.overrides)?;

    init_logging(&config)?;
    tracing::info!("sibyl starting with database {}", config.database.url);

    let connect_options: SqliteConnectOptions =
        config.database.url.parse::<SqliteConnectOptions>()?.create_if_missing(true);
    let pool = SqlitePoolOptions::new()
        .max_connections(5)
        .connect_with(connect_options)
        .await?;

    match cli.command {
        Command::Ingest { file, table } => {
            let inserted = load_ndjson(&pool, &table, &file).await?;
            println!("Ingested {inserted} rows into {table}");
        },
        Command::Profile => {
            let profiles = profile_datasets(&pool).await?;
            println!("{}", schema_context(&profiles));
        },
        Command::Ask { question } => {
            let pipeline = build_pipeline(&config, pool).await?;
            let outcome = pipeline.ask(&question).await;

            if !outcome.plan.is_feasible() {
                println!("Cannot answer: {}", outcome.plan.reason.as_deref().unwrap_or("unknown"));
                for follow_up in &outcome.plan.follow_ups {
                    println!("  try: {follow_up}");
                }
                return Ok(());
            }

            for panel in &outcome.panels {
                println!("== {} ==", panel.title);
                if panel.was_repaired {
                    println!("(SQL repaired after {} attempts)", panel.attempts);
                }
                match &panel.result.error {
                    Some(error) => println!("error: {error}"),
                    None => {
                        for row in panel.result.rows.iter().take(20) {
                            println!("{}", serde_json::to_string(row)?);
                        }
                        if panel.result.row_count > 20 {
                            println!("... {} rows total", panel.result.row_count);
                        }
                    },
                }
                if let Some(error) = &panel.forecast_error {
                    println!("forecast unavailable: {error}");
                }
            }

            if let Some(summary) = &outcome.plan.executive_summary {
                println!("\n{summary}");
            }
            if let Some(explanation) = &outcome.explanation {
                println!("\n{}", explanation.message);
                for suggestion in &explanation.suggestions {
                    println!("  try: {suggestion}");
                }
            }
        },
        Command::Overview => {
            let profiles = profile_datasets(&pool).await?;
            let backend = backend_from_settings(config.provider_settings());
            let compiler = sibyl::QuestionCompiler::new(backend, profiles);
            let dashboard = compiler.generate_overview().await?;
            println!("{}", sibyl::services::plan::render(&dashboard.to_notation(), false));
        },
    }

    Ok(())
}

async fn build_pipeline(
    config: &Config,
    pool: sqlx::SqlitePool,
) -> Result<AnalyticsPipeline, Box<dyn std::error::Error>> {
    let profiles = profile_datasets(&pool).await?;
    if profiles.is_empty() {
        return Err("no datasets found; run `sibyl ingest` first".into());
    }

    let backend = backend_from_settings(config.provider_settings());
    let executor = Arc::new(SqliteExecutor::new(
        pool,
        Duration::from_secs(config.executor.statement_timeout_seconds),
    ));
    let defaults = ForecastDefaults {
        horizon: config.forecast.default_horizon,
        window: config.forecast.default_window,
        alpha: config.forecast.default_alpha,
    };

    Ok(AnalyticsPipeline::new(backend, executor, profiles, defaults)
        .with_max_compile_attempts(config.compiler.max_attempts)
        .with_max_execution_attempts(config.executor.max_execution_attempts))
}

fn init_logging(config: &Config) -> Result<(), Box<dyn std::error::Error>> {
    let log_filter = tracing_subscriber::EnvFilter::new(&config.logging.level);
    let registry = tracing_subscriber::registry().with(log_filter);

    if let Some(log_file) = &config.logging.file {
        let log_path = std::path::Path::new(log_file);
        if let Some(parent) = log_path.parent() {
            let _ = std::fs::create_dir_all(parent);
        }
        let log_dir = log_path.parent().and_then(|p| p.to_str()).unwrap_or("logs");
        let file_name = log_path
            .file_name()
            .and_then(|n| n.to_str())
            .unwrap_or("sibyl.log");
        let file_prefix = file_name.strip_suffix(".log").unwrap_or(file_name);

        let file_appender = tracing_appender::rolling::daily(log_dir, file_prefix);
        let (non_blocking, guard) = tracing_appender::non_blocking(file_appender);
        // Keep the writer guard alive for the process lifetime
        Box::leak(Box::new(guard));
        registry
            .with(tracing_subscriber::fmt::layer().with_writer(non_blocking))
            .with(tracing_subscriber::fmt::layer())
            .init();
    } else {
        registry.with(tracing_subscriber::fmt::layer()).init();
    }

    Ok(())
}
