//! Summarizer capability (C1): the opaque provider contract.
//!
//! The scheduler never talks to a concrete backend directly — it holds an
//! `Arc<dyn Summarizer>` and is indifferent to which implementation answers.
//! `summarize`/`health` both accept a `CancellationToken` so a caller can
//! abandon an in-flight request without the implementation needing its own
//! cancellation plumbing.

pub mod ollama;
pub mod openai;

use async_trait::async_trait;
use tokio_util::sync::CancellationToken;

use crate::error::Result;

/// Prompt template and model selection shared by every provider.
#[derive(Debug, Clone)]
pub struct ProviderConfig {
    pub model: String,
    pub prompt_template: String,
    pub base_url: String,
    pub request_timeout: std::time::Duration,
}

impl ProviderConfig {
    /// Render the template by substituting the `{text}` placeholder.
    pub fn render_prompt(&self, text: &str) -> String {
        if self.prompt_template.contains("{text}") {
            self.prompt_template.replace("{text}", text)
        } else {
            format!("{}\n\n{}", self.prompt_template, text)
        }
    }
}

/// The opaque provider contract (spec §6: `summarize(text, cancel) -> text`,
/// `health(cancel) -> bool`).
#[async_trait]
pub trait Summarizer: Send + Sync {
    /// Human-readable provider identifier, e.g. `"ollama"` or `"openai"`.
    fn name(&self) -> &str;

    /// Summarize `text`, honoring `cancel` as a cooperative abort signal.
    async fn summarize(&self, text: &str, cancel: &CancellationToken) -> Result<String>;

    /// Lightweight reachability probe used by `/api/summarize/health`.
    async fn health(&self, cancel: &CancellationToken) -> Result<bool>;
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn render_prompt_substitutes_placeholder() {
        let cfg = ProviderConfig {
            model: "m".into(),
            prompt_template: "Summarize: {text}".into(),
            base_url: "http://localhost".into(),
            request_timeout: std::time::Duration::from_secs(30),
        };
        assert_eq!(cfg.render_prompt("hello"), "Summarize: hello");
    }

    #[test]
    fn render_prompt_appends_when_no_placeholder() {
        let cfg = ProviderConfig {
            model: "m".into(),
            prompt_template: "Summarize the following text".into(),
            base_url: "http://localhost".into(),
            request_timeout: std::time::Duration::from_secs(30),
        };
        assert_eq!(
            cfg.render_prompt("hello"),
            "Summarize the following text\n\nhello"
        );
    }
}
