//! API server setup (spec.md §6 `ApiServer`), grounded in the teacher's
//! `api/server.rs` (`AppState`, `ApiServer`). Bind/CORS settings reuse
//! `config::ServerConfig` rather than a second, parallel config type.

use std::net::SocketAddr;
use std::sync::Arc;
use std::time::{Duration, Instant};

use axum::Router;
use axum::extract::Request;
use tokio::net::TcpListener;
use tokio_util::sync::CancellationToken;
use tower_http::cors::{Any, CorsLayer};
use tower_http::trace::TraceLayer;
use tracing::Span;

use crate::api::routes;
use crate::config::ServerConfig as ApiServerConfig;
use crate::database::{DbPool, SummaryRecordStore};
use crate::domain::MergeParams;
use crate::error::Result;
use crate::metrics::HealthChecker;
use crate::notifier::NotifierHub;
use crate::scheduler::BatchScheduler;
use crate::segmenter::SegmentationConfig;
use crate::summarizer::Summarizer;

/// Shared application state handed to every route handler.
#[derive(Clone)]
pub struct AppState {
    pub start_time: Instant,
    pub scheduler: Arc<BatchScheduler>,
    pub notifier: Arc<NotifierHub>,
    pub summarizer: Arc<dyn Summarizer>,
    pub health_checker: Arc<HealthChecker>,
    pub logging_config: Option<Arc<crate::logging::LoggingConfig>>,
    pub summary_store: Option<Arc<dyn SummaryRecordStore>>,
    pub db_pool: Option<DbPool>,
    pub segmentation_config: Arc<SegmentationConfig>,
    pub merge_defaults: Arc<MergeParams>,
}

impl AppState {
    pub fn new(scheduler: Arc<BatchScheduler>, notifier: Arc<NotifierHub>, summarizer: Arc<dyn Summarizer>) -> Self {
        Self {
            start_time: Instant::now(),
            scheduler,
            notifier,
            summarizer,
            health_checker: Arc::new(HealthChecker::new()),
            logging_config: None,
            summary_store: None,
            db_pool: None,
            segmentation_config: Arc::new(SegmentationConfig::default().clamped()),
            merge_defaults: Arc::new(MergeParams::default()),
        }
    }

    pub fn with_logging_config(mut self, config: Arc<crate::logging::LoggingConfig>) -> Self {
        self.logging_config = Some(config);
        self
    }

    pub fn with_summary_store(mut self, store: Arc<dyn SummaryRecordStore>, pool: DbPool) -> Self {
        self.summary_store = Some(store);
        self.db_pool = Some(pool);
        self
    }

    pub fn with_health_checker(mut self, health_checker: Arc<HealthChecker>) -> Self {
        self.health_checker = health_checker.into();
        self
    }

    pub fn with_segmentation_config(mut self, config: SegmentationConfig) -> Self {
        self.segmentation_config = Arc::new(config);
        self
    }

    pub fn with_merge_defaults(mut self, params: MergeParams) -> Self {
        self.merge_defaults = Arc::new(params);
        self
    }
}

/// API server: owns the router and a cancellation token for graceful
/// shutdown (spec.md §6, ambient stack).
pub struct ApiServer {
    config: ApiServerConfig,
    state: AppState,
    cancel_token: CancellationToken,
}

impl ApiServer {
    pub fn with_state(config: ApiServerConfig, state: AppState) -> Self {
        Self { config, state, cancel_token: CancellationToken::new() }
    }

    pub fn cancel_token(&self) -> CancellationToken {
        self.cancel_token.clone()
    }

    fn build_router(&self) -> Router {
        let mut router = routes::create_router(self.state.clone());

        if self.config.enable_cors {
            let cors = CorsLayer::new().allow_origin(Any).allow_methods(Any).allow_headers(Any);
            router = router.layer(cors);
        }

        router = router.layer(
            TraceLayer::new_for_http()
                .make_span_with(|req: &Request| {
                    if req.uri().path().starts_with("/api/summarize/health") {
                        Span::none()
                    } else {
                        let mut make_span =
                            tower_http::trace::DefaultMakeSpan::new().level(tracing::Level::INFO);
                        use tower_http::trace::MakeSpan;
                        make_span.make_span(req)
                    }
                })
                .on_request(|req: &Request, span: &Span| {
                    if span.is_disabled() || req.uri().path().starts_with("/api/summarize/health") {
                        return;
                    }
                    let mut on_request =
                        tower_http::trace::DefaultOnRequest::new().level(tracing::Level::INFO);
                    use tower_http::trace::OnRequest;
                    on_request.on_request(req, span);
                })
                .on_response(
                    |res: &axum::http::Response<_>, latency: Duration, span: &Span| {
                        if span.is_disabled() {
                            return;
                        }
                        let on_response =
                            tower_http::trace::DefaultOnResponse::new().level(tracing::Level::INFO);
                        use tower_http::trace::OnResponse;
                        on_response.on_response(res, latency, span);
                    },
                )
                .on_failure(
                    |class: tower_http::classify::ServerErrorsFailureClass,
                     latency: Duration,
                     span: &Span| {
                        if span.is_disabled() {
                            return;
                        }
                        let mut on_failure =
                            tower_http::trace::DefaultOnFailure::new().level(tracing::Level::ERROR);
                        use tower_http::trace::OnFailure;
                        on_failure.on_failure(class, latency, span);
                    },
                ),
        );
        router
    }

    pub async fn run(&self) -> Result<()> {
        let addr: SocketAddr = format!("{}:{}", self.config.bind_address, self.config.port)
            .parse()
            .map_err(|e| crate::error::Error::Configuration(format!("invalid bind address: {e}")))?;

        let router = self.build_router();
        let listener = TcpListener::bind(addr).await?;

        tracing::info!("API server listening on http://{addr}");

        let cancel_token = self.cancel_token.clone();
        axum::serve(listener, router)
            .with_graceful_shutdown(async move {
                cancel_token.cancelled().await;
                tracing::info!("API server shutting down");
            })
            .await?;

        Ok(())
    }

    pub fn shutdown(&self) {
        self.cancel_token.cancel();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::MergeParams;
    use crate::scheduler::SchedulerConfig;
    use async_trait::async_trait;
    use tokio_util::sync::CancellationToken as CToken;

    struct Stub;
    #[async_trait]
    impl Summarizer for Stub {
        fn name(&self) -> &str {
            "stub"
        }
        async fn summarize(&self, text: &str, _cancel: &CToken) -> crate::error::Result<String> {
            Ok(text.to_string())
        }
        async fn health(&self, _cancel: &CToken) -> crate::error::Result<bool> {
            Ok(true)
        }
    }

    fn test_state() -> AppState {
        let summarizer: Arc<dyn Summarizer> = Arc::new(Stub);
        let notifier = Arc::new(NotifierHub::default());
        let scheduler =
            Arc::new(BatchScheduler::new(summarizer.clone(), notifier.clone(), SchedulerConfig::default()));
        let _ = MergeParams::default();
        AppState::new(scheduler, notifier, summarizer)
    }

    #[test]
    fn config_defaults() {
        let config = ApiServerConfig::default();
        assert_eq!(config.bind_address, "0.0.0.0");
        assert_eq!(config.port, 8080);
        assert!(config.enable_cors);
    }

    #[test]
    fn app_state_starts_without_logging_or_store() {
        let state = test_state();
        assert!(state.logging_config.is_none());
        assert!(state.summary_store.is_none());
    }

    #[test]
    fn server_creation_has_uncancelled_token() {
        let config = ApiServerConfig::default();
        let server = ApiServer::with_state(config, test_state());
        assert!(!server.cancel_token().is_cancelled());
    }
}
