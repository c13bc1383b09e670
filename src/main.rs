//! synoptic-server: batch document summarization orchestrator entry point.

use std::sync::Arc;

use synoptic::api::{ApiServer, AppState};
use synoptic::config::{AppConfig, ProviderKind};
use synoptic::database::{self, SqlxSummaryRecordStore, SummaryRecordStore};
use synoptic::logging::init_logging;
use synoptic::metrics::HealthChecker;
use synoptic::notifier::NotifierHub;
use synoptic::scheduler::BatchScheduler;
use synoptic::summarizer::ollama::OllamaSummarizer;
use synoptic::summarizer::openai::OpenAiSummarizer;
use synoptic::summarizer::Summarizer;
use tracing::{error, info, warn};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let log_dir = std::env::var("SYNOPTIC_LOG_DIR").unwrap_or_else(|_| "logs".to_string());
    let (logging_config, _guard) =
        init_logging(&log_dir).map_err(|e| anyhow::anyhow!("failed to initialize logging: {e}"))?;

    info!("starting synoptic v{}", env!("CARGO_PKG_VERSION"));

    let config = AppConfig::from_env();

    let summarizer: Arc<dyn Summarizer> = match config.provider.kind {
        ProviderKind::Ollama => Arc::new(OllamaSummarizer::new(config.provider.provider_config())),
        ProviderKind::OpenAi => Arc::new(OpenAiSummarizer::new(config.provider.openai_config()?)),
    };
    info!(provider = summarizer.name(), "summarizer backend configured");

    info!(url = %config.database.url, "connecting to database");
    let pool = database::init_pool(&config.database.url, config.database.max_connections).await?;
    let summary_store: Arc<dyn SummaryRecordStore> = Arc::new(SqlxSummaryRecordStore::new(pool.clone()));

    let notifier = Arc::new(NotifierHub::default());
    let scheduler = Arc::new(BatchScheduler::new(summarizer.clone(), notifier.clone(), config.scheduler.clone()));
    let health_checker = Arc::new(HealthChecker::new());

    let state = AppState::new(scheduler, notifier, summarizer)
        .with_logging_config(logging_config.clone())
        .with_summary_store(summary_store, pool)
        .with_health_checker(health_checker)
        .with_segmentation_config(config.segmentation.clone())
        .with_merge_defaults(config.merge.clone());

    let server = ApiServer::with_state(config.server.clone(), state);
    let cancel_token = server.cancel_token();

    logging_config.start_retention_cleanup(cancel_token.clone());

    let run_handle = tokio::spawn(async move {
        if let Err(e) = server.run().await {
            error!(error = %e, "API server exited with error");
        }
    });

    tokio::select! {
        _ = tokio::signal::ctrl_c() => {
            info!("received SIGINT (Ctrl+C), initiating shutdown...");
        }
        _ = wait_for_sigterm() => {
            info!("received SIGTERM, initiating shutdown...");
        }
    }

    cancel_token.cancel();
    if let Err(e) = run_handle.await {
        warn!(error = %e, "API server task join failed during shutdown");
    }

    info!("synoptic shutdown complete");
    Ok(())
}

/// Wait for SIGTERM (Unix only).
#[cfg(unix)]
async fn wait_for_sigterm() {
    use tokio::signal::unix::{SignalKind, signal};
    let mut sigterm = signal(SignalKind::terminate()).expect("failed to register SIGTERM handler");
    sigterm.recv().await;
}

/// On non-Unix platforms there is no SIGTERM; wait forever so Ctrl+C
/// remains the only shutdown trigger.
#[cfg(not(unix))]
async fn wait_for_sigterm() {
    std::future::pending::<()>().await;
}
