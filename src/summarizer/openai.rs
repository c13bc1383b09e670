//! Remote hosted model service provider (`aiProvider = "openai"`).

use async_trait::async_trait;
use reqwest::Client;
use serde::{Deserialize, Serialize};
use serde_json::json;
use tokio_util::sync::CancellationToken;
use tracing::{debug, warn};

use super::{ProviderConfig, Summarizer};
use crate::error::{Error, Result};

#[derive(Debug, Clone)]
pub struct OpenAiConfig {
    pub provider: ProviderConfig,
    pub api_key: String,
}

#[derive(Debug, Serialize)]
struct Message<'a> {
    role: &'a str,
    content: &'a str,
}

#[derive(Debug, Serialize)]
struct ChatRequest<'a> {
    model: &'a str,
    messages: Vec<Message<'a>>,
}

#[derive(Debug, Deserialize)]
struct ChatResponse {
    choices: Vec<Choice>,
}

#[derive(Debug, Deserialize)]
struct Choice {
    message: ChoiceMessage,
}

#[derive(Debug, Deserialize)]
struct ChoiceMessage {
    content: String,
}

/// Talks to an OpenAI-compatible `/v1/chat/completions` endpoint.
pub struct OpenAiSummarizer {
    config: OpenAiConfig,
    client: Client,
}

impl OpenAiSummarizer {
    pub fn new(config: OpenAiConfig) -> Self {
        Self {
            client: Client::new(),
            config,
        }
    }

    fn chat_url(&self) -> String {
        format!(
            "{}/v1/chat/completions",
            self.config.provider.base_url.trim_end_matches('/')
        )
    }
}

#[async_trait]
impl Summarizer for OpenAiSummarizer {
    fn name(&self) -> &str {
        "openai"
    }

    async fn summarize(&self, text: &str, cancel: &CancellationToken) -> Result<String> {
        if cancel.is_cancelled() {
            return Err(Error::Cancelled);
        }

        let prompt = self.config.provider.render_prompt(text);
        let body = ChatRequest {
            model: &self.config.provider.model,
            messages: vec![Message {
                role: "user",
                content: &prompt,
            }],
        };

        let send = self
            .client
            .post(self.chat_url())
            .timeout(self.config.provider.request_timeout)
            .bearer_auth(&self.config.api_key)
            .json(&body)
            .send();

        let response = tokio::select! {
            biased;
            _ = cancel.cancelled() => return Err(Error::Cancelled),
            result = send => result.map_err(|e| classify(&e))?,
        };

        if !response.status().is_success() {
            let status = response.status();
            warn!(%status, "openai chat completion returned non-success status");
            let kind = if status.as_u16() == 429 || status.is_server_error() {
                Error::ProviderUnavailable(format!("openai returned status {status}"))
            } else {
                Error::ProviderProtocol(format!("openai returned status {status}"))
            };
            return Err(kind);
        }

        let parsed: ChatResponse = response
            .json()
            .await
            .map_err(|e| Error::ProviderProtocol(format!("invalid openai response body: {e}")))?;

        parsed
            .choices
            .into_iter()
            .next()
            .map(|c| c.message.content)
            .ok_or_else(|| Error::ProviderProtocol("openai response had no choices".into()))
    }

    async fn health(&self, cancel: &CancellationToken) -> Result<bool> {
        if cancel.is_cancelled() {
            return Err(Error::Cancelled);
        }
        let url = format!(
            "{}/v1/models",
            self.config.provider.base_url.trim_end_matches('/')
        );
        let request = self
            .client
            .get(url)
            .timeout(self.config.provider.request_timeout)
            .bearer_auth(&self.config.api_key)
            .send();

        let response = tokio::select! {
            biased;
            _ = cancel.cancelled() => return Err(Error::Cancelled),
            result = request => result,
        };

        match response {
            Ok(resp) => {
                let healthy = resp.status().is_success();
                debug!(healthy, "openai health check completed");
                Ok(healthy)
            }
            Err(e) => {
                debug!(error = %e, "openai health check failed");
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
    use wiremock::matchers::{header, method, path};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    fn config(base_url: String) -> OpenAiConfig {
        OpenAiConfig {
            provider: ProviderConfig {
                model: "gpt-4o-mini".into(),
                prompt_template: "Summarize: {text}".into(),
                base_url,
                request_timeout: Duration::from_secs(5),
            },
            api_key: "test-key".into(),
        }
    }

    #[tokio::test]
    async fn summarize_extracts_first_choice() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/v1/chat/completions"))
            .and(header("authorization", "Bearer test-key"))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({
                "choices": [{"message": {"content": "concise summary"}}]
            })))
            .mount(&server)
            .await;

        let provider = OpenAiSummarizer::new(config(server.uri()));
        let cancel = CancellationToken::new();
        let result = provider.summarize("long text", &cancel).await.unwrap();
        assert_eq!(result, "concise summary");
    }

    #[tokio::test]
    async fn summarize_maps_429_to_unavailable() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/v1/chat/completions"))
            .respond_with(ResponseTemplate::new(429))
            .mount(&server)
            .await;

        let provider = OpenAiSummarizer::new(config(server.uri()));
        let cancel = CancellationToken::new();
        let err = provider.summarize("text", &cancel).await.unwrap_err();
        assert_eq!(err.kind(), crate::error::ErrorKind::ProviderUnavailable);
    }
}
