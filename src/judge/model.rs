//! External language-model capability for the semantic judge.
//!
//! The judge only needs "send a prompt, get text back"; everything else
//! (endpoint, auth, wire format) lives behind [`SimilarityModel`]. The
//! bundled [`HttpChatModel`] speaks the OpenAI chat-completions wire format,
//! so it can talk to any server exposing `/v1/chat/completions`.

use crate::config::ModelConfig;
use crate::error::{PracticeError, Result};
use async_trait::async_trait;
use serde::Deserialize;
use tracing::debug;

/// A language-model capability that completes a single prompt.
#[async_trait]
pub trait SimilarityModel: Send + Sync {
    /// Send one prompt and return the model's raw text reply.
    ///
    /// # Errors
    ///
    /// Returns an error on transport failure, timeout, or a reply with no
    /// usable content. The semantic judge contains these errors; they never
    /// reach the session controller.
    async fn complete(&self, prompt: &str) -> Result<String>;
}

/// OpenAI-compatible chat completions client.
#[derive(Debug)]
pub struct HttpChatModel {
    client: reqwest::Client,
    base_url: String,
    api_key: String,
    model_id: String,
}

#[derive(Debug, Deserialize)]
struct ChatReply {
    choices: Vec<ChatChoice>,
}

#[derive(Debug, Deserialize)]
struct ChatChoice {
    message: ChatMessage,
}

#[derive(Debug, Deserialize)]
struct ChatMessage {
    content: Option<String>,
}

impl HttpChatModel {
    /// Create a client from model endpoint configuration.
    ///
    /// # Errors
    ///
    /// Returns an error if the base URL is missing or the HTTP client cannot
    /// be constructed.
    pub fn from_config(config: &ModelConfig) -> Result<Self> {
        if config.base_url.trim().is_empty() {
            return Err(PracticeError::Config(
                "semantic judge requires model.base_url".into(),
            ));
        }
        let client = reqwest::Client::builder()
            .timeout(std::time::Duration::from_millis(config.timeout_ms))
            .build()
            .map_err(|e| PracticeError::Judge(format!("failed to build HTTP client: {e}")))?;
        Ok(Self {
            client,
            base_url: config.base_url.trim_end_matches('/').to_owned(),
            api_key: config.api_key.clone(),
            model_id: config.model_id.clone(),
        })
    }
}

#[async_trait]
impl SimilarityModel for HttpChatModel {
    async fn complete(&self, prompt: &str) -> Result<String> {
        let body = serde_json::json!({
            "model": self.model_id,
            "messages": [{ "role": "user", "content": prompt }],
            "temperature": 0.0,
        });

        let mut request = self
            .client
            .post(format!("{}/chat/completions", self.base_url))
            .json(&body);
        if !self.api_key.is_empty() {
            request = request.bearer_auth(&self.api_key);
        }

        let response = request
            .send()
            .await
            .map_err(|e| PracticeError::Judge(format!("model request failed: {e}")))?;

        let status = response.status();
        if !status.is_success() {
            return Err(PracticeError::Judge(format!(
                "model returned HTTP {status}"
            )));
        }

        let reply: ChatReply = response
            .json()
            .await
            .map_err(|e| PracticeError::Judge(format!("malformed model reply: {e}")))?;

        let content = reply
            .choices
            .into_iter()
            .next()
            .and_then(|c| c.message.content)
            .ok_or_else(|| PracticeError::Judge("model reply had no content".into()))?;

        debug!(chars = content.len(), "model reply received");
        Ok(content)
    }
}
