//! Reasoning backend implementations.
//!
//! Provides concrete implementations of the [`ResearchBackend`] trait for:
//! - Google Gemini with Google Search grounding (self-grounding)
//! - MiniMax chat completions paired with the evidence source
//! - Local OpenAI-compatible endpoints (Ollama, LM Studio, vLLM) paired with the evidence source
//!
//! Use [`select_backend()`] to instantiate the appropriate backend for a configuration.

pub mod augmented;
pub mod chat;
pub mod gemini;
pub mod local;
pub mod minimax;
pub mod parse;
pub mod prompts;

use async_trait::async_trait;
use std::sync::Arc;
use tracing::{info, warn};

use crate::config::{ProviderConfig, ProviderKind};
use crate::error::BackendError;
use crate::search::EvidenceSource;
use crate::types::{ResearchStep, StepOutcome, Synthesis};

pub use augmented::{LocalBackend, MiniMaxBackend, SearchAugmented};
pub use chat::{ChatModel, ChatRequest};
pub use gemini::GeminiBackend;
pub use local::LocalChat;
pub use minimax::MiniMaxChat;

/// The capability contract every reasoning backend satisfies.
///
/// Configuration is passed into every call instead of being captured at
/// construction, so an edit takes effect on the next call without re-selecting.
#[async_trait]
pub trait ResearchBackend: Send + Sync {
    /// Display name of the backend.
    fn name(&self) -> &str;

    /// Decompose `query` into an ordered list of pending steps.
    ///
    /// Malformed model output degrades to a single step holding `query`;
    /// transport failures are returned as errors.
    async fn generate_research_plan(
        &self,
        config: &ProviderConfig,
        query: &str,
    ) -> Result<Vec<ResearchStep>, BackendError>;

    /// Answer one sub-question with web-grounded evidence.
    async fn execute_research_step(
        &self,
        config: &ProviderConfig,
        query: &str,
    ) -> Result<StepOutcome, BackendError>;

    /// Merge the completed steps into a summary and a detailed narrative.
    ///
    /// Malformed model output degrades to a fixed summary plus the raw dossier.
    async fn synthesize_analysis(
        &self,
        config: &ProviderConfig,
        original_query: &str,
        steps: &[ResearchStep],
    ) -> Result<Synthesis, BackendError>;
}

/// The backend chosen for a configuration.
#[derive(Clone)]
pub struct BackendSelection {
    pub backend: Arc<dyn ResearchBackend>,
    /// Backend named by the configuration.
    pub requested: ProviderKind,
    /// Backend that will actually run.
    pub effective: ProviderKind,
}

impl BackendSelection {
    /// Wrap an already-built backend with no substitution.
    pub fn direct(backend: Arc<dyn ResearchBackend>, kind: ProviderKind) -> Self {
        Self {
            backend,
            requested: kind,
            effective: kind,
        }
    }

    /// Whether the self-grounding default replaced the requested backend.
    pub fn substituted(&self) -> bool {
        self.requested != self.effective
    }
}

impl std::fmt::Debug for BackendSelection {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("BackendSelection")
            .field("backend", &self.backend.name())
            .field("requested", &self.requested)
            .field("effective", &self.effective)
            .finish()
    }
}

/// Resolve exactly one backend for `config`.
///
/// A search-augmented backend whose required fields are missing is replaced
/// by the Gemini backend. The substitution is logged and recorded in the
/// returned [`BackendSelection`].
pub fn select_backend(
    config: &ProviderConfig,
    search: Arc<dyn EvidenceSource>,
) -> Result<BackendSelection, BackendError> {
    let requested = config.provider();
    let missing = config.missing_required_fields();

    let effective = if requested.is_search_augmented() && !missing.is_empty() {
        warn!(
            requested = %requested,
            missing = ?missing,
            "Required fields missing, substituting the Gemini backend"
        );
        ProviderKind::Gemini
    } else {
        requested
    };

    let backend: Arc<dyn ResearchBackend> = match effective {
        ProviderKind::Gemini => Arc::new(GeminiBackend::new()?),
        ProviderKind::MiniMax => Arc::new(SearchAugmented::minimax(search)?),
        ProviderKind::Local => Arc::new(SearchAugmented::local(search)?),
    };

    info!(backend = backend.name(), "Selected reasoning backend");

    Ok(BackendSelection {
        backend,
        requested,
        effective,
    })
}
