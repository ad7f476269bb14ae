//! Configuration validator.
//!
//! The only component allowed to mark a [`ProviderConfig`] valid. Gemini needs
//! just a primary credential. Search-augmented backends need their required
//! fields, a search credential, and one successful live probe: a planning call
//! whose returned plan is discarded.

use std::sync::Arc;
use tracing::{info, warn};

use crate::config::{ProviderConfig, SEARCH_API_KEY_ENV};
use crate::error::{ConfigError, QuarryError};
use crate::providers::{ResearchBackend, select_backend};
use crate::search::EvidenceSource;

/// Query sent by the live probe.
pub const PROBE_QUERY: &str = "test";

/// Validates provider configurations.
pub struct ConfigValidator {
    search: Arc<dyn EvidenceSource>,
    search_api_key_env: String,
}

impl ConfigValidator {
    pub fn new(search: Arc<dyn EvidenceSource>) -> Self {
        Self {
            search,
            search_api_key_env: SEARCH_API_KEY_ENV.to_string(),
        }
    }

    /// Use a different environment variable as the search credential fallback.
    pub fn with_search_api_key_env(mut self, name: impl Into<String>) -> Self {
        self.search_api_key_env = name.into();
        self
    }

    /// Validate `config`, returning whether it is now marked valid.
    pub async fn validate(&self, config: &mut ProviderConfig) -> bool {
        match self.check(config).await {
            Ok(()) => true,
            Err(e) => {
                warn!(provider = %config.provider(), error = %e, "Configuration is not valid");
                false
            }
        }
    }

    /// Validate `config` against the backend it selects.
    pub async fn check(&self, config: &mut ProviderConfig) -> Result<(), QuarryError> {
        config.mark_invalid();
        self.check_fields(config)?;
        if !config.provider().is_search_augmented() {
            config.mark_valid();
            info!(provider = %config.provider(), "Configuration validated");
            return Ok(());
        }
        let selection = select_backend(config, self.search.clone())?;
        self.probe(config, selection.backend.as_ref()).await
    }

    /// Validate `config`, probing `backend` instead of the selected one.
    pub async fn check_with(
        &self,
        config: &mut ProviderConfig,
        backend: &dyn ResearchBackend,
    ) -> Result<(), QuarryError> {
        config.mark_invalid();
        self.check_fields(config)?;
        if !config.provider().is_search_augmented() {
            config.mark_valid();
            return Ok(());
        }
        self.probe(config, backend).await
    }

    fn check_fields(&self, config: &ProviderConfig) -> Result<(), ConfigError> {
        if let Some(field) = config.missing_required_fields().first() {
            return Err(ConfigError::MissingField {
                field: field.to_string(),
            });
        }
        if config.provider().is_search_augmented() && !self.has_search_credential(config) {
            return Err(ConfigError::MissingField {
                field: format!("provider.search_api_key (or {})", self.search_api_key_env),
            });
        }
        Ok(())
    }

    fn has_search_credential(&self, config: &ProviderConfig) -> bool {
        config.search_api_key().is_some()
            || std::env::var(&self.search_api_key_env)
                .map(|v| !v.trim().is_empty())
                .unwrap_or(false)
    }

    async fn probe(
        &self,
        config: &mut ProviderConfig,
        backend: &dyn ResearchBackend,
    ) -> Result<(), QuarryError> {
        backend
            .generate_research_plan(config, PROBE_QUERY)
            .await
            .map_err(|e| ConfigError::ProbeFailed {
                message: e.to_string(),
            })?;
        config.mark_valid();
        info!(
            provider = %config.provider(),
            backend = backend.name(),
            "Configuration validated by live probe"
        );
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::ProviderKind;
    use crate::providers::SearchAugmented;
    use crate::testing::{MockChatModel, MockEvidenceSource};

    const UNSET_ENV: &str = "QUARRY_TEST_UNSET_SEARCH_KEY";

    fn validator() -> ConfigValidator {
        ConfigValidator::new(Arc::new(MockEvidenceSource::new())).with_search_api_key_env(UNSET_ENV)
    }

    fn mock_backend(model: MockChatModel) -> SearchAugmented<MockChatModel> {
        SearchAugmented::new(model, Arc::new(MockEvidenceSource::new()))
    }

    #[tokio::test]
    async fn test_gemini_needs_only_a_key() {
        let mut config = ProviderConfig::new(ProviderKind::Gemini).with_api_key("AIza-key");
        assert!(validator().validate(&mut config).await);
        assert!(config.is_valid());
    }

    #[tokio::test]
    async fn test_gemini_without_key_is_invalid() {
        let mut config = ProviderConfig::new(ProviderKind::Gemini);
        let err = validator().check(&mut config).await.unwrap_err();
        assert!(matches!(
            err,
            QuarryError::Config(ConfigError::MissingField { ref field }) if field == "provider.api_key"
        ));
        assert!(!config.is_valid());
    }

    #[tokio::test]
    async fn test_probe_success_marks_valid() {
        let model = MockChatModel::new();
        model.push_reply(r#"[{"query": "probe"}]"#);
        let backend = mock_backend(model);
        let mut config = ProviderConfig::new(ProviderKind::MiniMax)
            .with_api_key("k")
            .with_group_id("g")
            .with_search_api_key("tvly");

        validator().check_with(&mut config, &backend).await.unwrap();

        assert!(config.is_valid());
        assert_eq!(backend.model().call_count(), 1);
        assert!(backend.model().requests()[0].prompt.contains(PROBE_QUERY));
    }

    #[tokio::test]
    async fn test_probe_failure_leaves_invalid() {
        let model = MockChatModel::new();
        model.push_error("HTTP 401 invalid api key");
        let backend = mock_backend(model);
        let mut config = ProviderConfig::new(ProviderKind::Local)
            .with_base_url("http://localhost:11434/v1")
            .with_search_api_key("tvly");

        let err = validator().check_with(&mut config, &backend).await.unwrap_err();

        assert!(matches!(err, QuarryError::Config(ConfigError::ProbeFailed { .. })));
        assert!(!config.is_valid());
    }

    #[tokio::test]
    async fn test_missing_search_credential_skips_probe() {
        let backend = mock_backend(MockChatModel::new());
        let mut config =
            ProviderConfig::new(ProviderKind::Local).with_base_url("http://localhost:11434/v1");

        let err = validator().check_with(&mut config, &backend).await.unwrap_err();

        assert!(matches!(err, QuarryError::Config(ConfigError::MissingField { .. })));
        assert_eq!(backend.model().call_count(), 0);
    }

    #[tokio::test]
    async fn test_missing_group_id_is_reported() {
        let mut config = ProviderConfig::new(ProviderKind::MiniMax)
            .with_api_key("k")
            .with_search_api_key("tvly");
        let err = validator().check(&mut config).await.unwrap_err();
        assert!(matches!(
            err,
            QuarryError::Config(ConfigError::MissingField { ref field }) if field == "provider.group_id"
        ));
    }
}
