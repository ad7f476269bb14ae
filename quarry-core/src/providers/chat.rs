//! Chat transport used by the search-augmented backends.
//!
//! A [`ChatModel`] reduces one provider-specific completion call to a single
//! text string. MiniMax and local endpoints both speak the OpenAI chat
//! completions dialect, so the body builder and reply parser live here.

use async_trait::async_trait;
use reqwest::Client;
use serde_json::{Value, json};
use std::time::Duration;

use crate::config::ProviderConfig;
use crate::error::BackendError;

/// A single-turn completion request.
#[derive(Debug, Clone, PartialEq)]
pub struct ChatRequest {
    pub system: Option<String>,
    pub prompt: String,
    pub temperature: f32,
}

impl ChatRequest {
    pub fn new(prompt: impl Into<String>, temperature: f32) -> Self {
        Self {
            system: None,
            prompt: prompt.into(),
            temperature,
        }
    }

    pub fn with_system(mut self, system: impl Into<String>) -> Self {
        self.system = Some(system.into());
        self
    }
}

/// Text completion over some HTTP API.
///
/// Implementations read endpoint, model and credentials from `config` on every
/// call rather than capturing them at construction.
#[async_trait]
pub trait ChatModel: Send + Sync {
    /// Display name of the backend this model powers.
    fn name(&self) -> &str;

    /// Perform one completion and return its text.
    async fn chat(
        &self,
        config: &ProviderConfig,
        request: ChatRequest,
    ) -> Result<String, BackendError>;
}

/// Build an HTTP client with the standard provider timeouts.
pub(crate) fn http_client(provider: &str) -> Result<Client, BackendError> {
    Client::builder()
        .timeout(Duration::from_secs(120))
        .connect_timeout(Duration::from_secs(10))
        .build()
        .map_err(|e| BackendError::Request {
            provider: provider.to_string(),
            message: format!("Failed to build HTTP client: {}", e),
        })
}

/// OpenAI-style `{model, messages, temperature}` body.
pub(crate) fn openai_chat_body(model: &str, request: &ChatRequest) -> Value {
    let mut messages = Vec::with_capacity(2);
    if let Some(system) = &request.system {
        messages.push(json!({"role": "system", "content": system}));
    }
    messages.push(json!({"role": "user", "content": request.prompt}));
    json!({
        "model": model,
        "messages": messages,
        "temperature": request.temperature,
    })
}

/// Pull `choices[0].message.content` out of an OpenAI-style reply.
pub(crate) fn parse_openai_reply(provider: &str, body: &Value) -> Result<String, BackendError> {
    body["choices"]
        .get(0)
        .and_then(|choice| choice["message"]["content"].as_str())
        .map(str::to_string)
        .ok_or_else(|| BackendError::ResponseParse {
            provider: provider.to_string(),
            message: "Missing 'choices[0].message.content' in response".to_string(),
        })
}

/// Send a JSON POST and return the parsed reply, surfacing non-2xx bodies verbatim.
pub(crate) async fn post_json(
    provider: &str,
    request: reqwest::RequestBuilder,
    body: &Value,
) -> Result<Value, BackendError> {
    let response = request
        .header("content-type", "application/json")
        .json(body)
        .send()
        .await
        .map_err(|e| BackendError::Request {
            provider: provider.to_string(),
            message: e.to_string(),
        })?;

    let status = response.status();
    let body_text = response
        .text()
        .await
        .map_err(|e| BackendError::ResponseParse {
            provider: provider.to_string(),
            message: format!("Failed to read response body: {}", e),
        })?;

    if !status.is_success() {
        return Err(BackendError::Http {
            provider: provider.to_string(),
            status: status.as_u16(),
            body: body_text,
        });
    }

    serde_json::from_str(&body_text).map_err(|e| BackendError::ResponseParse {
        provider: provider.to_string(),
        message: format!("Invalid JSON in response: {}", e),
    })
}
