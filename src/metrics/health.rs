//! Health check implementation for the provider backend and summary store.

use std::sync::Arc;
use std::time::{Duration, Instant};

use serde::{Deserialize, Serialize};
use tokio_util::sync::CancellationToken;

use crate::database::DbPool;
use crate::summarizer::Summarizer;

/// Health status of a component.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default, utoipa::ToSchema)]
#[serde(rename_all = "lowercase")]
pub enum HealthStatus {
    Healthy,
    Degraded,
    Unhealthy,
    #[default]
    Unknown,
}

impl std::fmt::Display for HealthStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            HealthStatus::Healthy => write!(f, "healthy"),
            HealthStatus::Degraded => write!(f, "degraded"),
            HealthStatus::Unhealthy => write!(f, "unhealthy"),
            HealthStatus::Unknown => write!(f, "unknown"),
        }
    }
}

/// Health information for a single component.
#[derive(Debug, Clone, Serialize, Deserialize, utoipa::ToSchema)]
pub struct ComponentHealth {
    pub name: String,
    pub status: HealthStatus,
    pub message: Option<String>,
    pub last_check: Option<String>,
    pub check_duration_ms: Option<u64>,
}

impl ComponentHealth {
    pub fn healthy(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            status: HealthStatus::Healthy,
            message: None,
            last_check: Some(chrono::Utc::now().to_rfc3339()),
            check_duration_ms: None,
        }
    }

    pub fn unhealthy(name: impl Into<String>, message: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            status: HealthStatus::Unhealthy,
            message: Some(message.into()),
            last_check: Some(chrono::Utc::now().to_rfc3339()),
            check_duration_ms: None,
        }
    }

    pub fn with_duration(mut self, duration: Duration) -> Self {
        self.check_duration_ms = Some(duration.as_millis() as u64);
        self
    }
}

/// Overall system health.
#[derive(Debug, Clone, Serialize, Deserialize, utoipa::ToSchema)]
pub struct SystemHealth {
    pub status: HealthStatus,
    pub components: Vec<ComponentHealth>,
    pub version: String,
    pub uptime_secs: u64,
    pub timestamp: String,
}

impl SystemHealth {
    pub fn is_ready(&self) -> bool {
        matches!(self.status, HealthStatus::Healthy | HealthStatus::Degraded)
    }

    pub fn is_healthy(&self) -> bool {
        self.status == HealthStatus::Healthy
    }
}

/// Runs reachability checks against the provider backend and (optionally)
/// the summary record store, and reports process uptime.
pub struct HealthChecker {
    start_time: Instant,
    version: String,
}

impl HealthChecker {
    pub fn new() -> Self {
        Self { start_time: Instant::now(), version: env!("CARGO_PKG_VERSION").to_string() }
    }

    /// Probe the configured Summarizer backend (spec.md `GET
    /// /api/summarize/health`).
    pub async fn check_provider(&self, summarizer: &Arc<dyn Summarizer>) -> ComponentHealth {
        let start = Instant::now();
        let cancel = CancellationToken::new();
        let health = match summarizer.health(&cancel).await {
            Ok(true) => ComponentHealth::healthy(summarizer.name()),
            Ok(false) => ComponentHealth::unhealthy(summarizer.name(), "provider reported unhealthy"),
            Err(e) => ComponentHealth::unhealthy(summarizer.name(), e.to_string()),
        };
        health.with_duration(start.elapsed())
    }

    /// Probe the sqlite summary store with a trivial round-trip query.
    pub async fn check_database(&self, pool: &DbPool) -> ComponentHealth {
        let start = Instant::now();
        let health = match sqlx::query("SELECT 1").execute(pool).await {
            Ok(_) => ComponentHealth::healthy("database"),
            Err(e) => ComponentHealth::unhealthy("database", e.to_string()),
        };
        health.with_duration(start.elapsed())
    }

    /// Aggregate every configured component into one `SystemHealth` (spec.md
    /// `GET /api/summarize/health/system`).
    pub async fn check_all(
        &self,
        summarizer: Option<&Arc<dyn Summarizer>>,
        pool: Option<&DbPool>,
    ) -> SystemHealth {
        let mut components = Vec::new();
        let mut overall_status = HealthStatus::Healthy;

        if let Some(summarizer) = summarizer {
            let health = self.check_provider(summarizer).await;
            if health.status == HealthStatus::Unhealthy {
                overall_status = HealthStatus::Unhealthy;
            }
            components.push(health);
        }

        if let Some(pool) = pool {
            let health = self.check_database(pool).await;
            if health.status == HealthStatus::Unhealthy {
                overall_status = HealthStatus::Unhealthy;
            }
            components.push(health);
        }

        SystemHealth {
            status: overall_status,
            components,
            version: self.version.clone(),
            uptime_secs: self.start_time.elapsed().as_secs(),
            timestamp: chrono::Utc::now().to_rfc3339(),
        }
    }

    /// Readiness probe: ready as long as nothing reported unhealthy.
    pub async fn check_ready(&self, summarizer: Option<&Arc<dyn Summarizer>>, pool: Option<&DbPool>) -> bool {
        self.check_all(summarizer, pool).await.is_ready()
    }
}

impl Default for HealthChecker {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::Result;
    use async_trait::async_trait;

    struct AlwaysHealthy;
    #[async_trait]
    impl Summarizer for AlwaysHealthy {
        fn name(&self) -> &str {
            "always-healthy"
        }
        async fn summarize(&self, text: &str, _cancel: &CancellationToken) -> Result<String> {
            Ok(text.to_string())
        }
        async fn health(&self, _cancel: &CancellationToken) -> Result<bool> {
            Ok(true)
        }
    }

    struct AlwaysUnhealthy;
    #[async_trait]
    impl Summarizer for AlwaysUnhealthy {
        fn name(&self) -> &str {
            "always-unhealthy"
        }
        async fn summarize(&self, text: &str, _cancel: &CancellationToken) -> Result<String> {
            Ok(text.to_string())
        }
        async fn health(&self, _cancel: &CancellationToken) -> Result<bool> {
            Ok(false)
        }
    }

    #[test]
    fn health_status_default_is_unknown() {
        assert_eq!(HealthStatus::default(), HealthStatus::Unknown);
    }

    #[tokio::test]
    async fn check_all_with_no_components_is_healthy() {
        let checker = HealthChecker::new();
        let health = checker.check_all(None, None).await;
        assert_eq!(health.status, HealthStatus::Healthy);
        assert!(health.components.is_empty());
    }

    #[tokio::test]
    async fn check_provider_reflects_summarizer_health() {
        let checker = HealthChecker::new();
        let summarizer: Arc<dyn Summarizer> = Arc::new(AlwaysHealthy);
        let health = checker.check_provider(&summarizer).await;
        assert_eq!(health.status, HealthStatus::Healthy);
    }

    #[tokio::test]
    async fn check_all_is_unhealthy_when_provider_fails() {
        let checker = HealthChecker::new();
        let summarizer: Arc<dyn Summarizer> = Arc::new(AlwaysUnhealthy);
        let health = checker.check_all(Some(&summarizer), None).await;
        assert_eq!(health.status, HealthStatus::Unhealthy);
        assert!(!health.is_ready());
    }

    #[tokio::test]
    async fn check_database_round_trips() {
        let checker = HealthChecker::new();
        let pool = crate::database::init_pool("sqlite::memory:", 1).await.unwrap();
        let health = checker.check_database(&pool).await;
        assert_eq!(health.status, HealthStatus::Healthy);
    }
}
