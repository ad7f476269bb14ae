//! Search-augmented research backend.
//!
//! Pairs a [`ChatModel`] with an [`EvidenceSource`]: each research step first
//! searches the web, then asks the model to answer from the numbered hits.
//!
//! Failure policy for a step:
//! - zero hits: fixed message, no sources, no model call
//! - evidence source failure: propagated (aborts the run)
//! - model failure: recovered, the raw search context becomes the result

use async_trait::async_trait;
use std::sync::Arc;
use tracing::{debug, warn};

use super::ResearchBackend;
use super::chat::{ChatModel, ChatRequest};
use super::local::LocalChat;
use super::minimax::MiniMaxChat;
use super::parse::{parse_plan, parse_synthesis};
use super::prompts::{
    MAX_SEARCH_RESULTS, NO_RESULTS_MESSAGE, PLAN_TEMPERATURE, RESEARCHER_SYSTEM, STEP_TEMPERATURE,
    SYNTHESIS_TEMPERATURE, analysis_prompt, build_dossier, build_search_context, plan_prompt,
    synthesis_prompt,
};
use crate::config::ProviderConfig;
use crate::error::BackendError;
use crate::search::EvidenceSource;
use crate::types::{ResearchStep, StepOutcome, Synthesis};

/// A reasoning backend that relies on an external evidence source.
pub struct SearchAugmented<M> {
    model: M,
    search: Arc<dyn EvidenceSource>,
}

/// MiniMax paired with the evidence source.
pub type MiniMaxBackend = SearchAugmented<MiniMaxChat>;

/// Local OpenAI-compatible endpoint paired with the evidence source.
pub type LocalBackend = SearchAugmented<LocalChat>;

impl<M: ChatModel> SearchAugmented<M> {
    pub fn new(model: M, search: Arc<dyn EvidenceSource>) -> Self {
        Self { model, search }
    }

    pub fn model(&self) -> &M {
        &self.model
    }
}

impl SearchAugmented<MiniMaxChat> {
    pub fn minimax(search: Arc<dyn EvidenceSource>) -> Result<Self, BackendError> {
        Ok(Self::new(MiniMaxChat::new()?, search))
    }
}

impl SearchAugmented<LocalChat> {
    pub fn local(search: Arc<dyn EvidenceSource>) -> Result<Self, BackendError> {
        Ok(Self::new(LocalChat::new()?, search))
    }
}

#[async_trait]
impl<M: ChatModel> ResearchBackend for SearchAugmented<M> {
    fn name(&self) -> &str {
        self.model.name()
    }

    async fn generate_research_plan(
        &self,
        config: &ProviderConfig,
        query: &str,
    ) -> Result<Vec<ResearchStep>, BackendError> {
        let request =
            ChatRequest::new(plan_prompt(query), PLAN_TEMPERATURE).with_system(RESEARCHER_SYSTEM);
        let reply = self.model.chat(config, request).await?;
        Ok(parse_plan(&reply, query))
    }

    async fn execute_research_step(
        &self,
        config: &ProviderConfig,
        query: &str,
    ) -> Result<StepOutcome, BackendError> {
        let results = self
            .search
            .search(query, MAX_SEARCH_RESULTS, config.search_api_key())
            .await?;

        if results.is_empty() {
            debug!(query, "No search hits, skipping analysis");
            return Ok(StepOutcome {
                result: NO_RESULTS_MESSAGE.to_string(),
                sources: Vec::new(),
            });
        }

        let context = build_search_context(&results.hits);
        let request = ChatRequest::new(analysis_prompt(query, &context), STEP_TEMPERATURE)
            .with_system(RESEARCHER_SYSTEM);

        match self.model.chat(config, request).await {
            Ok(answer) => Ok(StepOutcome {
                result: answer,
                sources: results.citations,
            }),
            Err(e) => {
                warn!(
                    provider = self.model.name(),
                    error = %e,
                    "Analysis call failed, returning raw search context"
                );
                Ok(StepOutcome {
                    result: context,
                    sources: results.citations,
                })
            }
        }
    }

    async fn synthesize_analysis(
        &self,
        config: &ProviderConfig,
        original_query: &str,
        steps: &[ResearchStep],
    ) -> Result<Synthesis, BackendError> {
        let dossier = build_dossier(steps);
        let request = ChatRequest::new(
            synthesis_prompt(original_query, &dossier),
            SYNTHESIS_TEMPERATURE,
        )
        .with_system(RESEARCHER_SYSTEM);
        let reply = self.model.chat(config, request).await?;
        Ok(parse_synthesis(&reply, &dossier))
    }
}
