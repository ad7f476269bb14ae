//! Configuration system for Quarry.
//!
//! Uses `figment` for layered configuration: defaults -> config file -> environment -> overrides.
//! Configuration is loaded from `~/.config/quarry/config.toml` and/or `.quarry/config.toml`
//! in the workspace directory.
//!
//! [`ProviderConfig`] keeps its fields private: every mutation goes through a setter
//! that clears the validity flag, so a credential edit can never leave a stale
//! "ready" configuration behind. Only the validator marks a configuration valid.

use figment::{
    Figment,
    providers::{Env, Format, Serialized, Toml},
};
use serde::{Deserialize, Serialize};
use std::path::Path;
use std::str::FromStr;
use std::sync::{Arc, RwLock};

use crate::error::ConfigError;

/// Default Tavily search endpoint.
pub const DEFAULT_SEARCH_ENDPOINT: &str = "https://api.tavily.com/search";

/// Process-level fallback for the search credential.
pub const SEARCH_API_KEY_ENV: &str = "TAVILY_API_KEY";

/// Reasoning backend kinds.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ProviderKind {
    /// Self-grounding cloud backend (Gemini with Google Search grounding).
    #[default]
    Gemini,
    /// Remote API backend paired with the evidence source.
    MiniMax,
    /// Local OpenAI-compatible endpoint paired with the evidence source.
    Local,
}

impl ProviderKind {
    /// Whether this backend relies on the external evidence source.
    pub fn is_search_augmented(&self) -> bool {
        !matches!(self, ProviderKind::Gemini)
    }
}

impl std::fmt::Display for ProviderKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            ProviderKind::Gemini => write!(f, "gemini"),
            ProviderKind::MiniMax => write!(f, "minimax"),
            ProviderKind::Local => write!(f, "local"),
        }
    }
}

impl FromStr for ProviderKind {
    type Err = ConfigError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "gemini" | "google" => Ok(ProviderKind::Gemini),
            "minimax" => Ok(ProviderKind::MiniMax),
            "local" | "ollama" | "openai-compatible" => Ok(ProviderKind::Local),
            other => Err(ConfigError::UnknownProvider {
                name: other.to_string(),
            }),
        }
    }
}

/// Backend selection plus credentials.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ProviderConfig {
    #[serde(default)]
    provider: ProviderKind,
    /// Primary credential.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    api_key: Option<String>,
    /// Secondary identifier (MiniMax group id).
    #[serde(default, skip_serializing_if = "Option::is_none")]
    group_id: Option<String>,
    /// Base endpoint override.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    base_url: Option<String>,
    /// Model override.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    model: Option<String>,
    /// Auxiliary search credential for the evidence source.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    search_api_key: Option<String>,
    /// Runtime attestation from the validator; never persisted or loaded.
    #[serde(skip)]
    is_valid: bool,
}

/// Treat empty and whitespace-only strings as absent.
fn non_empty(value: &Option<String>) -> Option<&str> {
    value.as_deref().map(str::trim).filter(|v| !v.is_empty())
}

impl ProviderConfig {
    pub fn new(provider: ProviderKind) -> Self {
        Self {
            provider,
            ..Default::default()
        }
    }

    pub fn with_api_key(mut self, key: impl Into<String>) -> Self {
        self.set_api_key(Some(key.into()));
        self
    }

    pub fn with_group_id(mut self, group_id: impl Into<String>) -> Self {
        self.set_group_id(Some(group_id.into()));
        self
    }

    pub fn with_base_url(mut self, url: impl Into<String>) -> Self {
        self.set_base_url(Some(url.into()));
        self
    }

    pub fn with_model(mut self, model: impl Into<String>) -> Self {
        self.set_model(Some(model.into()));
        self
    }

    pub fn with_search_api_key(mut self, key: impl Into<String>) -> Self {
        self.set_search_api_key(Some(key.into()));
        self
    }

    pub fn provider(&self) -> ProviderKind {
        self.provider
    }

    pub fn api_key(&self) -> Option<&str> {
        non_empty(&self.api_key)
    }

    pub fn group_id(&self) -> Option<&str> {
        non_empty(&self.group_id)
    }

    pub fn base_url(&self) -> Option<&str> {
        non_empty(&self.base_url)
    }

    pub fn model(&self) -> Option<&str> {
        non_empty(&self.model)
    }

    pub fn search_api_key(&self) -> Option<&str> {
        non_empty(&self.search_api_key)
    }

    pub fn is_valid(&self) -> bool {
        self.is_valid
    }

    pub fn set_provider(&mut self, provider: ProviderKind) {
        self.provider = provider;
        self.is_valid = false;
    }

    pub fn set_api_key(&mut self, key: Option<String>) {
        self.api_key = key;
        self.is_valid = false;
    }

    pub fn set_group_id(&mut self, group_id: Option<String>) {
        self.group_id = group_id;
        self.is_valid = false;
    }

    pub fn set_base_url(&mut self, url: Option<String>) {
        self.base_url = url;
        self.is_valid = false;
    }

    pub fn set_model(&mut self, model: Option<String>) {
        self.model = model;
        self.is_valid = false;
    }

    pub fn set_search_api_key(&mut self, key: Option<String>) {
        self.search_api_key = key;
        self.is_valid = false;
    }

    /// Only the validator may mark a configuration as ready.
    pub(crate) fn mark_valid(&mut self) {
        self.is_valid = true;
    }

    pub(crate) fn mark_invalid(&mut self) {
        self.is_valid = false;
    }

    /// Names of the required fields that are absent for the selected backend.
    ///
    /// The search credential is not listed here: it may come from the
    /// process environment at call time.
    pub fn missing_required_fields(&self) -> Vec<&'static str> {
        let mut missing = Vec::new();
        match self.provider {
            ProviderKind::Gemini => {
                if self.api_key().is_none() {
                    missing.push("provider.api_key");
                }
            }
            ProviderKind::MiniMax => {
                if self.api_key().is_none() {
                    missing.push("provider.api_key");
                }
                if self.group_id().is_none() {
                    missing.push("provider.group_id");
                }
            }
            ProviderKind::Local => {
                if self.base_url().is_none() {
                    missing.push("provider.base_url");
                }
            }
        }
        missing
    }

    /// A copy safe to print: credentials are masked.
    pub fn masked(&self) -> Self {
        Self {
            api_key: self.api_key.as_deref().map(mask_secret),
            search_api_key: self.search_api_key.as_deref().map(mask_secret),
            ..self.clone()
        }
    }
}

/// Mask all but the last four characters of a secret.
pub fn mask_secret(secret: &str) -> String {
    let chars: Vec<char> = secret.chars().collect();
    if chars.len() <= 4 {
        return "*".repeat(chars.len());
    }
    let tail: String = chars[chars.len() - 4..].iter().collect();
    format!("{}{}", "*".repeat(chars.len() - 4), tail)
}

/// Evidence source settings.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SearchConfig {
    pub endpoint: String,
    /// Environment variable consulted when no search credential is configured.
    pub api_key_env: String,
}

impl Default for SearchConfig {
    fn default() -> Self {
        Self {
            endpoint: DEFAULT_SEARCH_ENDPOINT.to_string(),
            api_key_env: SEARCH_API_KEY_ENV.to_string(),
        }
    }
}

/// Top-level configuration for Quarry.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct QuarryConfig {
    #[serde(default)]
    pub provider: ProviderConfig,
    #[serde(default)]
    pub search: SearchConfig,
}

/// Shared, mutable provider configuration.
///
/// Backends receive a fresh snapshot before every call, so an edit made while a
/// run is in flight is visible to the next call.
#[derive(Debug, Clone, Default)]
pub struct SharedConfig {
    inner: Arc<RwLock<ProviderConfig>>,
}

impl SharedConfig {
    pub fn new(config: ProviderConfig) -> Self {
        Self {
            inner: Arc::new(RwLock::new(config)),
        }
    }

    /// Clone of the current configuration.
    pub fn snapshot(&self) -> ProviderConfig {
        self.inner
            .read()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
            .clone()
    }

    pub fn is_valid(&self) -> bool {
        self.inner
            .read()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
            .is_valid()
    }

    /// Apply an edit through the public setters.
    pub fn update<F>(&self, edit: F)
    where
        F: FnOnce(&mut ProviderConfig),
    {
        let mut guard = self
            .inner
            .write()
            .unwrap_or_else(|poisoned| poisoned.into_inner());
        edit(&mut guard);
    }

    /// Replace the whole configuration (e.g. with a freshly validated one).
    pub fn replace(&self, config: ProviderConfig) {
        let mut guard = self
            .inner
            .write()
            .unwrap_or_else(|poisoned| poisoned.into_inner());
        *guard = config;
    }
}

/// Load configuration from layered sources.
///
/// Priority (highest to lowest):
/// 1. Environment variables (prefixed with `QUARRY_`, nested with `__`)
/// 2. Workspace-local config (`.quarry/config.toml`)
/// 3. User config (`~/.config/quarry/config.toml`)
/// 4. Built-in defaults
///
/// Each layer only replaces the keys it sets. Per-invocation changes go
/// through the [`ProviderConfig`] setters so they invalidate the result.
pub fn load_config(workspace: Option<&Path>) -> Result<QuarryConfig, Box<figment::Error>> {
    let mut figment = Figment::from(Serialized::defaults(QuarryConfig::default()));

    if let Some(config_dir) = directories::ProjectDirs::from("dev", "quarry", "quarry") {
        let user_config = config_dir.config_dir().join("config.toml");
        if user_config.exists() {
            figment = figment.merge(Toml::file(&user_config));
        }
    }

    if let Some(ws) = workspace {
        let ws_config = ws.join(".quarry").join("config.toml");
        if ws_config.exists() {
            figment = figment.merge(Toml::file(&ws_config));
        }
    }

    // QUARRY_PROVIDER__API_KEY, QUARRY_SEARCH__ENDPOINT, ...
    figment = figment.merge(Env::prefixed("QUARRY_").split("__"));

    figment.extract().map_err(Box::new)
}
