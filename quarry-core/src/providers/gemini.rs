//! Google Gemini research backend.
//!
//! The self-grounding backend: research steps enable the `google_search` tool so
//! Gemini searches the web itself and returns citations in `groundingMetadata`.
//! No external evidence source is involved.
//!
//! Key differences from OpenAI-compatible APIs:
//! - Auth via `?key=API_KEY` query parameter (not header-based)
//! - System instruction is a top-level `system_instruction` field
//! - Citations arrive as `groundingChunks[].web.{uri,title}`

use async_trait::async_trait;
use reqwest::Client;
use serde_json::{Value, json};
use tracing::debug;

use super::ResearchBackend;
use super::chat::{http_client, post_json};
use super::parse::{parse_plan, parse_synthesis};
use super::prompts::{
    PLAN_TEMPERATURE, RESEARCHER_SYSTEM, STEP_TEMPERATURE, SYNTHESIS_TEMPERATURE, build_dossier,
    grounded_step_prompt, plan_prompt, synthesis_prompt,
};
use crate::config::{ProviderConfig, ProviderKind};
use crate::error::BackendError;
use crate::types::{ResearchStep, Source, StepOutcome, Synthesis};

/// The default Google Gemini API base URL.
pub const DEFAULT_BASE_URL: &str = "https://generativelanguage.googleapis.com/v1beta";

/// The default Gemini model.
pub const DEFAULT_MODEL: &str = "gemini-2.5-flash";

/// Process-level fallback for the Gemini credential.
pub const API_KEY_ENV: &str = "GEMINI_API_KEY";

const PROVIDER_NAME: &str = "Gemini";

/// Text and grounding citations from one Gemini reply.
#[derive(Debug, Clone, Default, PartialEq)]
struct GeminiReply {
    text: String,
    sources: Vec<Source>,
}

/// Google Gemini backend with Google Search grounding.
pub struct GeminiBackend {
    client: Client,
}

impl GeminiBackend {
    pub fn new() -> Result<Self, BackendError> {
        Ok(Self {
            client: http_client(PROVIDER_NAME)?,
        })
    }

    /// Resolve the API key.
    ///
    /// The configured credential is used when the configuration selects Gemini;
    /// otherwise (substitution) the process-level `GEMINI_API_KEY` applies.
    fn resolve_api_key(config: &ProviderConfig) -> Result<String, BackendError> {
        if config.provider() == ProviderKind::Gemini {
            if let Some(key) = config.api_key() {
                return Ok(key.to_string());
            }
        }
        std::env::var(API_KEY_ENV)
            .ok()
            .filter(|k| !k.trim().is_empty())
            .ok_or_else(|| BackendError::MissingCredential {
                provider: PROVIDER_NAME.to_string(),
                field: format!("provider.api_key (or {})", API_KEY_ENV),
            })
    }

    /// Build the `generateContent` URL, honoring overrides only for Gemini configs.
    fn endpoint_url(config: &ProviderConfig, api_key: &str) -> String {
        let own = config.provider() == ProviderKind::Gemini;
        let base_url = config.base_url().filter(|_| own).unwrap_or(DEFAULT_BASE_URL);
        let model = config.model().filter(|_| own).unwrap_or(DEFAULT_MODEL);
        format!(
            "{}/models/{}:generateContent?key={}",
            base_url.trim_end_matches('/'),
            model,
            api_key
        )
    }

    fn build_request_body(prompt: &str, temperature: f32, grounded: bool) -> Value {
        let mut body = json!({
            "contents": [{
                "role": "user",
                "parts": [{"text": prompt}],
            }],
            "system_instruction": {
                "parts": [{"text": RESEARCHER_SYSTEM}]
            },
            "generationConfig": {
                "temperature": temperature,
            },
        });
        if grounded {
            body["tools"] = json!([{"google_search": {}}]);
        }
        body
    }

    /// Parse a Gemini reply into text plus grounding citations.
    fn parse_response(body: &Value) -> Result<GeminiReply, BackendError> {
        let candidate = body["candidates"]
            .as_array()
            .and_then(|c| c.first())
            .ok_or_else(|| BackendError::ResponseParse {
                provider: PROVIDER_NAME.to_string(),
                message: "Missing or empty 'candidates' array in response".to_string(),
            })?;

        let text = candidate["content"]["parts"]
            .as_array()
            .map(|parts| {
                parts
                    .iter()
                    .filter_map(|p| p.get("text").and_then(Value::as_str))
                    .collect::<Vec<_>>()
                    .join("")
            })
            .unwrap_or_default();

        let sources = candidate["groundingMetadata"]["groundingChunks"]
            .as_array()
            .map(|chunks| {
                chunks
                    .iter()
                    .filter_map(|chunk| {
                        let web = chunk.get("web")?;
                        let uri = web.get("uri").and_then(Value::as_str)?;
                        let title = web.get("title").and_then(Value::as_str).unwrap_or("");
                        Some(Source::new(uri, title))
                    })
                    .collect()
            })
            .unwrap_or_default();

        Ok(GeminiReply { text, sources })
    }

    async fn generate(
        &self,
        config: &ProviderConfig,
        prompt: &str,
        temperature: f32,
        grounded: bool,
    ) -> Result<GeminiReply, BackendError> {
        let api_key = Self::resolve_api_key(config)?;
        let url = Self::endpoint_url(config, &api_key);
        let body = Self::build_request_body(prompt, temperature, grounded);

        debug!(grounded, "Sending Gemini generateContent request");

        let reply = post_json(PROVIDER_NAME, self.client.post(&url), &body).await?;
        Self::parse_response(&reply)
    }
}

#[async_trait]
impl ResearchBackend for GeminiBackend {
    fn name(&self) -> &str {
        PROVIDER_NAME
    }

    async fn generate_research_plan(
        &self,
        config: &ProviderConfig,
        query: &str,
    ) -> Result<Vec<ResearchStep>, BackendError> {
        let reply = self
            .generate(config, &plan_prompt(query), PLAN_TEMPERATURE, false)
            .await?;
        Ok(parse_plan(&reply.text, query))
    }

    async fn execute_research_step(
        &self,
        config: &ProviderConfig,
        query: &str,
    ) -> Result<StepOutcome, BackendError> {
        let reply = self
            .generate(config, &grounded_step_prompt(query), STEP_TEMPERATURE, true)
            .await?;
        Ok(StepOutcome {
            result: reply.text,
            sources: reply.sources,
        })
    }

    async fn synthesize_analysis(
        &self,
        config: &ProviderConfig,
        original_query: &str,
        steps: &[ResearchStep],
    ) -> Result<Synthesis, BackendError> {
        let dossier = build_dossier(steps);
        let reply = self
            .generate(
                config,
                &synthesis_prompt(original_query, &dossier),
                SYNTHESIS_TEMPERATURE,
                false,
            )
            .await?;
        Ok(parse_synthesis(&reply.text, &dossier))
    }
}
