//! Local OpenAI-compatible chat transport.
//!
//! Works with Ollama, LM Studio, vLLM, llama.cpp server and any endpoint that
//! follows the OpenAI chat completions format.

use async_trait::async_trait;
use reqwest::Client;
use tracing::debug;

use super::chat::{
    ChatModel, ChatRequest, http_client, openai_chat_body, parse_openai_reply, post_json,
};
use crate::config::{ProviderConfig, ProviderKind};
use crate::error::BackendError;

/// The default local endpoint (Ollama's OpenAI-compatible API).
pub const DEFAULT_BASE_URL: &str = "http://localhost:11434/v1";

/// The default local model.
pub const DEFAULT_MODEL: &str = "llama3.1";

const PROVIDER_NAME: &str = "Local";

/// Local chat model.
pub struct LocalChat {
    client: Client,
}

impl LocalChat {
    pub fn new() -> Result<Self, BackendError> {
        Ok(Self {
            client: http_client(PROVIDER_NAME)?,
        })
    }

    fn completions_url(base_url: &str) -> String {
        format!("{}/chat/completions", base_url.trim_end_matches('/'))
    }
}

#[async_trait]
impl ChatModel for LocalChat {
    fn name(&self) -> &str {
        PROVIDER_NAME
    }

    async fn chat(
        &self,
        config: &ProviderConfig,
        request: ChatRequest,
    ) -> Result<String, BackendError> {
        // Overrides only apply when the configuration targets this backend.
        let own = config.provider() == ProviderKind::Local;
        let base_url = config.base_url().filter(|_| own).unwrap_or(DEFAULT_BASE_URL);
        let model = config.model().filter(|_| own).unwrap_or(DEFAULT_MODEL);
        let url = Self::completions_url(base_url);
        let body = openai_chat_body(model, &request);

        debug!(model, url = url.as_str(), "Sending local completion request");

        let mut builder = self.client.post(&url);
        if let Some(key) = config.api_key().filter(|_| own) {
            builder = builder.header("Authorization", format!("Bearer {}", key));
        }

        let reply = post_json(PROVIDER_NAME, builder, &body).await?;
        parse_openai_reply(PROVIDER_NAME, &reply)
    }
}
