//! Application configuration (spec §6): loaded from environment variables
//! with TOML-file overrides, following the teacher's
//! `from_env_or_default()` convention (`rust-srec/src/api/server.rs`).

use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::domain::RetryPolicy;
use crate::error::{Error, Result};
use crate::scheduler::SchedulerConfig;
use crate::segmenter::SegmentationConfig;
use crate::summarizer::ProviderConfig;
use crate::summarizer::openai::OpenAiConfig;

/// HTTP server bind settings (spec §6 `ApiServer`).
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ServerConfig {
    pub bind_address: String,
    pub port: u16,
    pub enable_cors: bool,
    pub body_limit_bytes: usize,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            bind_address: "0.0.0.0".to_string(),
            port: 8080,
            enable_cors: true,
            body_limit_bytes: 10 * 1024 * 1024,
        }
    }
}

impl ServerConfig {
    pub fn from_env_or_default() -> Self {
        let mut config = Self::default();

        if let Ok(v) = std::env::var("SYNOPTIC_BIND_ADDRESS") {
            if !v.trim().is_empty() {
                config.bind_address = v;
            }
        }
        if let Ok(v) = std::env::var("SYNOPTIC_PORT") {
            if let Ok(parsed) = v.parse() {
                config.port = parsed;
            }
        }
        if let Ok(v) = std::env::var("SYNOPTIC_ENABLE_CORS") {
            if let Ok(parsed) = v.parse() {
                config.enable_cors = parsed;
            }
        }

        config
    }
}

/// Which Summarizer backend to construct (spec §6 `aiProvider`).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ProviderKind {
    Ollama,
    OpenAi,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ProviderSettings {
    pub kind: ProviderKind,
    pub model: String,
    pub base_url: String,
    pub prompt_template: String,
    #[serde(with = "duration_secs")]
    pub request_timeout: Duration,
    /// Only read when `kind == OpenAi`.
    pub api_key: Option<String>,
}

impl Default for ProviderSettings {
    fn default() -> Self {
        Self {
            kind: ProviderKind::Ollama,
            model: "llama3.1".to_string(),
            base_url: "http://localhost:11434".to_string(),
            prompt_template: "Summarize the following text concisely:\n\n{text}".to_string(),
            request_timeout: Duration::from_secs(30),
            api_key: None,
        }
    }
}

impl ProviderSettings {
    pub fn from_env_or_default() -> Self {
        let mut config = Self::default();

        if let Ok(v) = std::env::var("SYNOPTIC_AI_PROVIDER") {
            config.kind = match v.to_lowercase().as_str() {
                "openai" => ProviderKind::OpenAi,
                _ => ProviderKind::Ollama,
            };
        }
        if let Ok(v) = std::env::var("SYNOPTIC_AI_MODEL") {
            if !v.trim().is_empty() {
                config.model = v;
            }
        }
        if let Ok(v) = std::env::var("SYNOPTIC_AI_BASE_URL") {
            if !v.trim().is_empty() {
                config.base_url = v;
            }
        }
        if let Ok(v) = std::env::var("SYNOPTIC_AI_PROMPT_TEMPLATE") {
            if !v.trim().is_empty() {
                config.prompt_template = v;
            }
        }
        if let Ok(v) = std::env::var("SYNOPTIC_AI_API_KEY") {
            config.api_key = Some(v);
        }

        config
    }

    pub fn provider_config(&self) -> ProviderConfig {
        ProviderConfig {
            model: self.model.clone(),
            prompt_template: self.prompt_template.clone(),
            base_url: self.base_url.clone(),
            request_timeout: self.request_timeout,
        }
    }

    pub fn openai_config(&self) -> Result<OpenAiConfig> {
        let api_key = self
            .api_key
            .clone()
            .ok_or_else(|| Error::config("SYNOPTIC_AI_API_KEY is required when aiProvider=openai"))?;
        Ok(OpenAiConfig { provider: self.provider_config(), api_key })
    }
}

/// Sqlite persistence settings for `SummaryRecord` (spec §6, ambient stack).
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DatabaseConfig {
    pub url: String,
    pub max_connections: u32,
}

impl Default for DatabaseConfig {
    fn default() -> Self {
        Self {
            url: "sqlite://synoptic.db?mode=rwc".to_string(),
            max_connections: 5,
        }
    }
}

impl DatabaseConfig {
    pub fn from_env_or_default() -> Self {
        let mut config = Self::default();
        if let Ok(v) = std::env::var("SYNOPTIC_DATABASE_URL") {
            if !v.trim().is_empty() {
                config.url = v;
            }
        }
        if let Ok(v) = std::env::var("SYNOPTIC_DATABASE_MAX_CONNECTIONS") {
            if let Ok(parsed) = v.parse() {
                config.max_connections = parsed;
            }
        }
        config
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LoggingConfig {
    pub level: String,
    pub directory: Option<String>,
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self { level: "info".to_string(), directory: None }
    }
}

impl LoggingConfig {
    pub fn from_env_or_default() -> Self {
        let mut config = Self::default();
        if let Ok(v) = std::env::var("SYNOPTIC_LOG_LEVEL") {
            if !v.trim().is_empty() {
                config.level = v;
            }
        }
        if let Ok(v) = std::env::var("SYNOPTIC_LOG_DIR") {
            config.directory = Some(v);
        }
        config
    }
}

/// Aggregate application configuration assembled from every sub-section
/// (spec §6). `scheduler` folds `BatchProcessing`, `RetryPolicy`, and
/// `ApiTimeout`/`ProgressReporting` together since they're consumed by the
/// same component.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AppConfig {
    pub server: ServerConfig,
    pub provider: ProviderSettings,
    pub scheduler: SchedulerConfig,
    pub segmentation: SegmentationConfig,
    pub merge: crate::domain::MergeParams,
    pub database: DatabaseConfig,
    pub logging: LoggingConfig,
}

impl Default for AppConfig {
    fn default() -> Self {
        Self {
            server: ServerConfig::default(),
            provider: ProviderSettings::default(),
            scheduler: SchedulerConfig::default().clamped(),
            segmentation: SegmentationConfig::default().clamped(),
            merge: crate::domain::MergeParams::default(),
            database: DatabaseConfig::default(),
            logging: LoggingConfig::default(),
        }
    }
}

impl AppConfig {
    /// Load `.env` (if present), then build every section from environment
    /// variables, falling back to defaults field by field.
    pub fn from_env() -> Self {
        dotenvy::dotenv().ok();

        let mut retry_policy = RetryPolicy::default();
        if let Ok(v) = std::env::var("SYNOPTIC_MAX_RETRIES") {
            if let Ok(parsed) = v.parse() {
                retry_policy.max_retries = parsed;
            }
        }
        if let Ok(v) = std::env::var("SYNOPTIC_RETRY_BASE_DELAY_MS") {
            if let Ok(parsed) = v.parse() {
                retry_policy.base_delay_ms = parsed;
            }
        }

        let mut scheduler = SchedulerConfig { retry_policy, ..SchedulerConfig::default() };
        if let Ok(v) = std::env::var("SYNOPTIC_CONCURRENCY_LIMIT") {
            if let Ok(parsed) = v.parse() {
                scheduler.concurrency_limit = parsed;
            }
        }
        let scheduler = scheduler.clamped();

        let mut segmentation = SegmentationConfig::default();
        if let Ok(v) = std::env::var("SYNOPTIC_MAX_SEGMENT_LEN") {
            if let Ok(parsed) = v.parse() {
                segmentation.max_segment_len = parsed;
            }
        }
        let segmentation = segmentation.clamped();

        Self {
            server: ServerConfig::from_env_or_default(),
            provider: ProviderSettings::from_env_or_default(),
            scheduler,
            segmentation,
            merge: crate::domain::MergeParams::default(),
            database: DatabaseConfig::from_env_or_default(),
            logging: LoggingConfig::from_env_or_default(),
        }
    }

    /// Overlay a TOML file on top of `self`. Unknown keys are rejected;
    /// missing sections keep whatever `self` already had.
    pub fn merge_toml_file(mut self, path: &std::path::Path) -> Result<Self> {
        let raw = std::fs::read_to_string(path).map_err(Error::Io)?;
        let overrides: TomlOverrides = toml::from_str(&raw)
            .map_err(|e| Error::config(format!("invalid config file {}: {e}", path.display())))?;

        if let Some(server) = overrides.server {
            self.server = server;
        }
        if let Some(provider) = overrides.provider {
            self.provider = provider;
        }
        if let Some(database) = overrides.database {
            self.database = database;
        }
        if let Some(logging) = overrides.logging {
            self.logging = logging;
        }
        Ok(self)
    }
}

/// Partial view of `AppConfig` accepted from a TOML file: every section is
/// optional so a file only needs to mention what it overrides.
#[derive(Debug, Deserialize)]
struct TomlOverrides {
    server: Option<ServerConfig>,
    provider: Option<ProviderSettings>,
    database: Option<DatabaseConfig>,
    logging: Option<LoggingConfig>,
}

mod duration_secs {
    use serde::{Deserialize, Deserializer, Serializer};
    use std::time::Duration;

    pub fn serialize<S: Serializer>(d: &Duration, s: S) -> Result<S::Ok, S::Error> {
        s.serialize_u64(d.as_secs())
    }

    pub fn deserialize<'de, D: Deserializer<'de>>(d: D) -> Result<Duration, D::Error> {
        Ok(Duration::from_secs(u64::deserialize(d)?))
    }
}
