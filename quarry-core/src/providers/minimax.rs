//! MiniMax chat completion transport.
//!
//! Key differences from plain OpenAI-compatible APIs:
//! - The account group id travels as a `?GroupId=` query parameter
//! - Application-level failures can arrive with HTTP 200 and a non-zero
//!   `base_resp.status_code`

use async_trait::async_trait;
use reqwest::Client;
use serde_json::Value;
use tracing::debug;

use super::chat::{
    ChatModel, ChatRequest, http_client, openai_chat_body, parse_openai_reply, post_json,
};
use crate::config::{ProviderConfig, ProviderKind};
use crate::error::BackendError;

/// The default MiniMax API base URL.
pub const DEFAULT_BASE_URL: &str = "https://api.minimax.chat/v1";

/// The default MiniMax model.
pub const DEFAULT_MODEL: &str = "abab6.5s-chat";

const PROVIDER_NAME: &str = "MiniMax";

/// MiniMax chat model.
pub struct MiniMaxChat {
    client: Client,
}

impl MiniMaxChat {
    pub fn new() -> Result<Self, BackendError> {
        Ok(Self {
            client: http_client(PROVIDER_NAME)?,
        })
    }

    /// Endpoint, model, key and group id for this call.
    fn resolve(config: &ProviderConfig) -> Result<(String, String, String, String), BackendError> {
        let own = config.provider() == ProviderKind::MiniMax;
        let api_key = config
            .api_key()
            .filter(|_| own)
            .ok_or_else(|| BackendError::MissingCredential {
                provider: PROVIDER_NAME.to_string(),
                field: "provider.api_key".to_string(),
            })?;
        let group_id = config
            .group_id()
            .filter(|_| own)
            .ok_or_else(|| BackendError::MissingCredential {
                provider: PROVIDER_NAME.to_string(),
                field: "provider.group_id".to_string(),
            })?;
        let base_url = config.base_url().unwrap_or(DEFAULT_BASE_URL);
        let model = config.model().unwrap_or(DEFAULT_MODEL);
        Ok((
            Self::endpoint_url(base_url, group_id),
            model.to_string(),
            api_key.to_string(),
            group_id.to_string(),
        ))
    }

    fn endpoint_url(base_url: &str, group_id: &str) -> String {
        format!(
            "{}/text/chatcompletion_v2?GroupId={}",
            base_url.trim_end_matches('/'),
            group_id
        )
    }

    /// Reject replies whose `base_resp` reports an application error.
    fn check_base_resp(body: &Value) -> Result<(), BackendError> {
        let code = body["base_resp"]["status_code"].as_i64().unwrap_or(0);
        if code == 0 {
            return Ok(());
        }
        let message = body["base_resp"]["status_msg"]
            .as_str()
            .unwrap_or("unknown error")
            .to_string();
        Err(BackendError::Request {
            provider: PROVIDER_NAME.to_string(),
            message: format!("status_code {}: {}", code, message),
        })
    }
}

#[async_trait]
impl ChatModel for MiniMaxChat {
    fn name(&self) -> &str {
        PROVIDER_NAME
    }

    async fn chat(
        &self,
        config: &ProviderConfig,
        request: ChatRequest,
    ) -> Result<String, BackendError> {
        let (url, model, api_key, group_id) = Self::resolve(config)?;
        let body = openai_chat_body(&model, &request);

        debug!(
            model = model.as_str(),
            group_id = group_id.as_str(),
            "Sending MiniMax completion request"
        );

        let reply = post_json(
            PROVIDER_NAME,
            self.client
                .post(&url)
                .header("Authorization", format!("Bearer {}", api_key)),
            &body,
        )
        .await?;

        Self::check_base_resp(&reply)?;
        parse_openai_reply(PROVIDER_NAME, &reply)
    }
}
