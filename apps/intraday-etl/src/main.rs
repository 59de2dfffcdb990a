//! Intraday ETL Binary
//!
//! Runs the pipeline once over the configured symbols and date range.
//!
//! # Usage
//!
//! ```bash
//! cargo run --bin intraday-etl
//! ```
//!
//! # Environment Variables
//!
//! - `INTRADAY_ETL_CONFIG`: Config file path (default: config.yaml)
//! - `INTRADAY_ETL_CLEAR_PAUSE`: `true` clears a persistent pause before running
//! - `RUST_LOG`: Overrides the configured log level
//!
//! # Exit codes
//!
//! - `0`: every unit succeeded or was already complete
//! - `1`: some units failed or the run was cancelled
//! - `2`: the run halted on lost connectivity or is paused

use std::path::Path;
use std::process::ExitCode;
use std::sync::Arc;

use anyhow::Context;
use chrono::Utc;
use intraday_etl::application::ports::{NoOpNotifier, NotifierPort, QuoteSourcePort};
use intraday_etl::application::services::{
    DecisionEngine, ErrorClassifier, Extractor, Loader, Transformer, WorkListGenerator,
};
use intraday_etl::application::use_cases::RunPipelineUseCase;
use intraday_etl::config::{Config, NotifierKind, load_config};
use intraday_etl::infrastructure::inference::HttpInferenceClient;
use intraday_etl::infrastructure::notification::{LogNotifier, WebhookNotifier};
use intraday_etl::infrastructure::persistence::SqliteStore;
use intraday_etl::infrastructure::quote_source::HttpQuoteSource;
use intraday_etl::observability::{init_metrics, init_tracing};
use intraday_etl::resilience::RateLimiter;
use tokio::signal;
use tokio_util::sync::CancellationToken;

/// Default configuration path.
const DEFAULT_CONFIG_PATH: &str = "config.yaml";

#[tokio::main]
async fn main() -> anyhow::Result<ExitCode> {
    load_dotenv();

    let config_path =
        std::env::var("INTRADAY_ETL_CONFIG").unwrap_or_else(|_| DEFAULT_CONFIG_PATH.to_string());
    let config = load_config(Some(&config_path))
        .with_context(|| format!("loading configuration from {config_path}"))?;

    init_tracing(&config.observability.tracing_config())?;
    if let Some(metrics) = config.observability.metrics_config() {
        init_metrics(&metrics)?;
        tracing::info!(addr = %metrics.listen_addr, "Prometheus exporter listening");
    }

    tracing::info!(
        environment = %config.environment.name,
        config = %config_path,
        symbols = config.source.symbols.len(),
        stored_tickers = config.source.stored_tickers,
        "Starting intraday ETL"
    );

    ensure_database_dir(&config.persistence.database_url)?;
    let store = Arc::new(
        SqliteStore::connect_with_retry(&config.persistence.store_config(), &config.retry.to_policy())
            .await
            .context("opening the database")?,
    );

    let pipeline = build_pipeline(&config, &store)?;

    if clear_pause_requested() && pipeline.clear_pause().await? {
        tracing::warn!("Persistent pause cleared on request");
    }

    let spec = config.source.work_list_spec(Utc::now().date_naive())?;
    let units = WorkListGenerator::new(store.clone())
        .generate(&spec)
        .await
        .context("building the work list")?;

    let cancel = CancellationToken::new();
    tokio::spawn(shutdown_signal(cancel.clone()));

    let summary = pipeline.execute(units, cancel).await?;
    store.close().await;

    let code = if summary.is_complete() {
        ExitCode::SUCCESS
    } else if summary.halted || summary.paused {
        ExitCode::from(2)
    } else {
        ExitCode::FAILURE
    };

    tracing::info!(
        run_id = %summary.run_id,
        succeeded = summary.succeeded,
        failed = summary.failed,
        halted = summary.halted,
        paused = summary.paused,
        "Intraday ETL finished"
    );
    Ok(code)
}

/// Wire adapters and services into the pipeline use case.
fn build_pipeline(config: &Config, store: &Arc<SqliteStore>) -> anyhow::Result<RunPipelineUseCase> {
    let source: Arc<dyn QuoteSourcePort> = Arc::new(HttpQuoteSource::new(config.source.http_config())?);
    let limiter = Arc::new(RateLimiter::new(config.source.rate_limit_config()));

    let classifier = match config.classifier.http_config() {
        Some(http) => {
            tracing::info!(endpoint = %http.endpoint, "Classifier delegation enabled");
            ErrorClassifier::with_inference(
                Arc::new(HttpInferenceClient::new(http)?),
                config.classifier.classifier_config(),
            )
        }
        None => ErrorClassifier::heuristic_only(),
    };
    let engine = Arc::new(DecisionEngine::new(classifier, config.retry.to_policy()));

    let notifier: Arc<dyn NotifierPort> = match config.notification.kind {
        NotifierKind::Log => Arc::new(LogNotifier),
        NotifierKind::None => Arc::new(NoOpNotifier),
        NotifierKind::Webhook => {
            let webhook = config
                .notification
                .webhook_config()
                .context("notification.webhook_url is required for the webhook notifier")?;
            Arc::new(WebhookNotifier::new(webhook)?)
        }
    };

    Ok(RunPipelineUseCase::new(
        Extractor::new(source, limiter, Arc::clone(&engine), config.source.call_timeout()),
        Transformer::new(config.source.bar_interval()?),
        Loader::new(store.clone(), engine, config.pipeline.load_timeout()),
        store.clone(),
        store.clone(),
        notifier,
        config.pipeline.to_pipeline_config(),
    ))
}

fn clear_pause_requested() -> bool {
    std::env::var("INTRADAY_ETL_CLEAR_PAUSE")
        .is_ok_and(|v| matches!(v.trim().to_ascii_lowercase().as_str(), "1" | "true" | "yes"))
}

/// SQLite creates the file but not its directory.
fn ensure_database_dir(database_url: &str) -> anyhow::Result<()> {
    let path = database_url
        .strip_prefix("sqlite://")
        .or_else(|| database_url.strip_prefix("sqlite:"))
        .unwrap_or(database_url);
    let path = path.split('?').next().unwrap_or(path);
    if path.is_empty() || path.starts_with(":memory:") {
        return Ok(());
    }
    if let Some(parent) = Path::new(path).parent().filter(|p| !p.as_os_str().is_empty()) {
        std::fs::create_dir_all(parent)
            .with_context(|| format!("creating database directory {}", parent.display()))?;
    }
    Ok(())
}

/// Load .env file from current directory or any ancestor directory.
fn load_dotenv() {
    if dotenvy::dotenv().is_ok() {
        return;
    }

    if let Ok(cwd) = std::env::current_dir() {
        let mut dir = cwd.as_path();
        while let Some(parent) = dir.parent() {
            let env_path = parent.join(".env");
            if env_path.exists() {
                let _ = dotenvy::from_path(&env_path);
                return;
            }
            dir = parent;
        }
    }
}

/// Cancel the run on SIGTERM or SIGINT.
///
/// In-flight units stop at their next wait; commits already started finish.
async fn shutdown_signal(cancel: CancellationToken) {
    let ctrl_c = async {
        if let Err(e) = signal::ctrl_c().await {
            tracing::error!(error = %e, "Ctrl+C handler unavailable");
            std::future::pending::<()>().await;
        }
    };

    #[cfg(unix)]
    let terminate = async {
        match signal::unix::signal(signal::unix::SignalKind::terminate()) {
            Ok(mut stream) => {
                stream.recv().await;
            }
            Err(e) => {
                tracing::error!(error = %e, "SIGTERM handler unavailable");
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        () = ctrl_c => {
            tracing::info!("Received Ctrl+C, cancelling run");
        }
        () = terminate => {
            tracing::info!("Received SIGTERM, cancelling run");
        }
    }

    cancel.cancel();
}
