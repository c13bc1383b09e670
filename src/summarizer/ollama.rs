//! Local model server provider (`aiProvider = "ollama"`).

use async_trait::async_trait;
use reqwest::Client;
use serde::{Deserialize, Serialize};
use serde_json::json;
use tokio_util::sync::CancellationToken;
use tracing::{debug, warn};

use super::{ProviderConfig, Summarizer};
use crate::error::{Error, Result};

#[derive(Debug, Deserialize)]
struct GenerateResponse {
    response: String,
}

#[derive(Debug, Serialize)]
struct GenerateRequest<'a> {
    model: &'a str,
    prompt: &'a str,
    stream: bool,
}

/// Talks to a local Ollama-compatible `/api/generate` endpoint.
pub struct OllamaSummarizer {
    config: ProviderConfig,
    client: Client,
}

impl OllamaSummarizer {
    pub fn new(config: ProviderConfig) -> Self {
        Self {
            client: Client::new(),
            config,
        }
    }

    fn generate_url(&self) -> String {
        format!("{}/api/generate", self.config.base_url.trim_end_matches('/'))
    }
}

#[async_trait]
impl Summarizer for OllamaSummarizer {
    fn name(&self) -> &str {
        "ollama"
    }

    async fn summarize(&self, text: &str, cancel: &CancellationToken) -> Result<String> {
        if cancel.is_cancelled() {
            return Err(Error::Cancelled);
        }

        let prompt = self.config.render_prompt(text);
        let body = GenerateRequest {
            model: &self.config.model,
            prompt: &prompt,
            stream: false,
        };

        let send = self
            .client
            .post(self.generate_url())
            .timeout(self.config.request_timeout)
            .json(&body)
            .send();

        let response = tokio::select! {
            biased;
            _ = cancel.cancelled() => return Err(Error::Cancelled),
            result = send => result.map_err(|e| classify(&e))?,
        };

        if !response.status().is_success() {
            let status = response.status();
            warn!(%status, "ollama generate returned non-success status");
            return Err(Error::ProviderUnavailable(format!(
                "ollama returned status {status}"
            )));
        }

        let parsed: GenerateResponse = response
            .json()
            .await
            .map_err(|e| Error::ProviderProtocol(format!("invalid ollama response body: {e}")))?;

        Ok(parsed.response)
    }

    async fn health(&self, cancel: &CancellationToken) -> Result<bool> {
        if cancel.is_cancelled() {
            return Err(Error::Cancelled);
        }
        let url = format!("{}/api/tags", self.config.base_url.trim_end_matches('/'));
        let request = self.client.get(url).timeout(self.config.request_timeout).send();

        let response = tokio::select! {
            biased;
            _ = cancel.cancelled() => return Err(Error::Cancelled),
            result = request => result,
        };

        match response {
            Ok(resp) => {
                let healthy = resp.status().is_success();
                debug!(healthy, "ollama health check completed");
                Ok(healthy)
            }
            Err(e) => {
                debug!(error = %e, "ollama health check failed");
                Ok(false)
            }
        }
    }
}

fn classify(err: &reqwest::Error) -> Error {
    match Error::classify_provider_error(err) {
        crate::error::ErrorKind::ProviderTimeout => Error::ProviderTimeout(err.to_string()),
        crate::error::ErrorKind::ProviderProtocol => Error::ProviderProtocol(err.to_string()),
        _ => Error::ProviderUnavailable(err.to_string()),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::time::Duration;
    use wiremock::matchers::{method, path};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    fn config(base_url: String) -> ProviderConfig {
        ProviderConfig {
            model: "llama3".into(),
            prompt_template: "Summarize: {text}".into(),
            base_url,
            request_timeout: Duration::from_secs(5),
        }
    }

    #[tokio::test]
    async fn summarize_parses_response_body() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/api/generate"))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({
                "response": "a short summary"
            })))
            .mount(&server)
            .await;

        let provider = OllamaSummarizer::new(config(server.uri()));
        let cancel = CancellationToken::new();
        let result = provider.summarize("long text", &cancel).await.unwrap();
        assert_eq!(result, "a short summary");
    }

    #[tokio::test]
    async fn summarize_maps_5xx_to_unavailable() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/api/generate"))
            .respond_with(ResponseTemplate::new(503))
            .mount(&server)
            .await;

        let provider = OllamaSummarizer::new(config(server.uri()));
        let cancel = CancellationToken::new();
        let err = provider.summarize("text", &cancel).await.unwrap_err();
        assert_eq!(err.kind(), crate::error::ErrorKind::ProviderUnavailable);
    }

    #[tokio::test]
    async fn summarize_respects_pre_cancelled_token() {
        let provider = OllamaSummarizer::new(config("http://localhost:1".into()));
        let cancel = CancellationToken::new();
        cancel.cancel();
        let err = provider.summarize("text", &cancel).await.unwrap_err();
        assert_eq!(err.kind(), crate::error::ErrorKind::Cancelled);
    }
}
