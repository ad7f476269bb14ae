//! Scripted chat model, evidence source and recording observer for tests and
//! offline development.
//!
//! The mocks pop queued replies in FIFO order and record every call so tests
//! can assert on what the pipeline sent.

use async_trait::async_trait;
use std::collections::VecDeque;
use std::sync::{Mutex, MutexGuard};

use crate::config::{ProviderConfig, ProviderKind};
use crate::error::{BackendError, SearchError};
use crate::providers::chat::{ChatModel, ChatRequest};
use crate::research::ResearchObserver;
use crate::search::{EvidenceSource, SearchHit, SearchResults};
use crate::types::{AnalysisResult, ResearchStep, RunState};

/// Reply returned when the mock chat queue is empty.
pub const DEFAULT_MOCK_REPLY: &str = "mock reply";

fn lock<T>(mutex: &Mutex<T>) -> MutexGuard<'_, T> {
    mutex.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
}

/// Build a search hit.
pub fn hit(uri: &str, title: &str, content: &str) -> SearchHit {
    SearchHit {
        uri: uri.to_string(),
        title: title.to_string(),
        content: content.to_string(),
    }
}

/// A chat model that replays queued replies.
pub struct MockChatModel {
    name: String,
    replies: Mutex<VecDeque<Result<String, String>>>,
    requests: Mutex<Vec<ChatRequest>>,
    configs: Mutex<Vec<ProviderConfig>>,
}

impl MockChatModel {
    pub fn new() -> Self {
        Self::named("Mock")
    }

    pub fn named(name: &str) -> Self {
        Self {
            name: name.to_string(),
            replies: Mutex::new(VecDeque::new()),
            requests: Mutex::new(Vec::new()),
            configs: Mutex::new(Vec::new()),
        }
    }

    pub fn push_reply(&self, reply: &str) {
        lock(&self.replies).push_back(Ok(reply.to_string()));
    }

    /// Queue a transport failure for the next call.
    pub fn push_error(&self, message: &str) {
        lock(&self.replies).push_back(Err(message.to_string()));
    }

    pub fn call_count(&self) -> usize {
        lock(&self.requests).len()
    }

    pub fn requests(&self) -> Vec<ChatRequest> {
        lock(&self.requests).clone()
    }

    /// Configuration snapshots seen by each call, in order.
    pub fn configs_seen(&self) -> Vec<ProviderConfig> {
        lock(&self.configs).clone()
    }
}

impl Default for MockChatModel {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl ChatModel for MockChatModel {
    fn name(&self) -> &str {
        &self.name
    }

    async fn chat(
        &self,
        config: &ProviderConfig,
        request: ChatRequest,
    ) -> Result<String, BackendError> {
        lock(&self.requests).push(request);
        lock(&self.configs).push(config.clone());
        match lock(&self.replies).pop_front() {
            Some(Ok(reply)) => Ok(reply),
            Some(Err(message)) => Err(BackendError::Request {
                provider: self.name.clone(),
                message,
            }),
            None => Ok(DEFAULT_MOCK_REPLY.to_string()),
        }
    }
}

/// One recorded call to [`MockEvidenceSource`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SearchCall {
    pub query: String,
    pub max_results: usize,
    pub credential: Option<String>,
}

/// An evidence source that replays queued hit lists.
///
/// Returns no hits once the queue is empty.
pub struct MockEvidenceSource {
    responses: Mutex<VecDeque<Result<Vec<SearchHit>, SearchError>>>,
    calls: Mutex<Vec<SearchCall>>,
}

impl MockEvidenceSource {
    pub fn new() -> Self {
        Self {
            responses: Mutex::new(VecDeque::new()),
            calls: Mutex::new(Vec::new()),
        }
    }

    pub fn push_hits(&self, hits: Vec<SearchHit>) {
        lock(&self.responses).push_back(Ok(hits));
    }

    pub fn push_error(&self, error: SearchError) {
        lock(&self.responses).push_back(Err(error));
    }

    pub fn call_count(&self) -> usize {
        lock(&self.calls).len()
    }

    pub fn calls(&self) -> Vec<SearchCall> {
        lock(&self.calls).clone()
    }
}

impl Default for MockEvidenceSource {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl EvidenceSource for MockEvidenceSource {
    async fn search(
        &self,
        query: &str,
        max_results: usize,
        credential: Option<&str>,
    ) -> Result<SearchResults, SearchError> {
        lock(&self.calls).push(SearchCall {
            query: query.to_string(),
            max_results,
            credential: credential.map(str::to_string),
        });
        let hits = lock(&self.responses).pop_front().unwrap_or(Ok(Vec::new()))?;
        Ok(SearchResults::from_hits(
            hits.into_iter().take(max_results).collect(),
        ))
    }
}

/// An observer that records every callback for assertions.
pub struct RecordingObserver {
    states: tokio::sync::Mutex<Vec<RunState>>,
    selections: tokio::sync::Mutex<Vec<(String, ProviderKind, ProviderKind)>>,
    step_snapshots: tokio::sync::Mutex<Vec<Vec<ResearchStep>>>,
    completions: tokio::sync::Mutex<Vec<AnalysisResult>>,
    errors: tokio::sync::Mutex<Vec<String>>,
}

impl RecordingObserver {
    pub fn new() -> Self {
        Self {
            states: tokio::sync::Mutex::new(Vec::new()),
            selections: tokio::sync::Mutex::new(Vec::new()),
            step_snapshots: tokio::sync::Mutex::new(Vec::new()),
            completions: tokio::sync::Mutex::new(Vec::new()),
            errors: tokio::sync::Mutex::new(Vec::new()),
        }
    }

    pub async fn states(&self) -> Vec<RunState> {
        self.states.lock().await.clone()
    }

    pub async fn selections(&self) -> Vec<(String, ProviderKind, ProviderKind)> {
        self.selections.lock().await.clone()
    }

    pub async fn step_snapshots(&self) -> Vec<Vec<ResearchStep>> {
        self.step_snapshots.lock().await.clone()
    }

    pub async fn completions(&self) -> Vec<AnalysisResult> {
        self.completions.lock().await.clone()
    }

    pub async fn errors(&self) -> Vec<String> {
        self.errors.lock().await.clone()
    }
}

impl Default for RecordingObserver {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl ResearchObserver for RecordingObserver {
    async fn on_state_change(&self, state: RunState) {
        self.states.lock().await.push(state);
    }

    async fn on_backend_selected(
        &self,
        name: &str,
        requested: ProviderKind,
        effective: ProviderKind,
    ) {
        self.selections
            .lock()
            .await
            .push((name.to_string(), requested, effective));
    }

    async fn on_steps_updated(&self, steps: &[ResearchStep]) {
        self.step_snapshots.lock().await.push(steps.to_vec());
    }

    async fn on_complete(&self, result: &AnalysisResult) {
        self.completions.lock().await.push(result.clone());
    }

    async fn on_error(&self, message: &str) {
        self.errors.lock().await.push(message.to_string());
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_mock_chat_replays_in_order_then_defaults() {
        let model = MockChatModel::new();
        model.push_reply("first");
        model.push_error("boom");
        let config = ProviderConfig::new(ProviderKind::Local);

        let first = model.chat(&config, ChatRequest::new("a", 0.1)).await;
        let second = model.chat(&config, ChatRequest::new("b", 0.1)).await;
        let third = model.chat(&config, ChatRequest::new("c", 0.1)).await;

        assert_eq!(first.unwrap(), "first");
        assert!(matches!(second, Err(BackendError::Request { .. })));
        assert_eq!(third.unwrap(), DEFAULT_MOCK_REPLY);
        assert_eq!(model.call_count(), 3);
        assert_eq!(model.requests()[1].prompt, "b");
    }

    #[tokio::test]
    async fn test_mock_search_caps_and_records() {
        let search = MockEvidenceSource::new();
        search.push_hits(vec![hit("u1", "t1", "c1"), hit("u2", "t2", "c2")]);

        let results = search.search("q", 1, Some("key")).await.unwrap();
        let empty = search.search("q2", 5, None).await.unwrap();

        assert_eq!(results.hits.len(), 1);
        assert!(empty.is_empty());
        assert_eq!(search.calls()[0].credential.as_deref(), Some("key"));
        assert_eq!(search.calls()[1].credential, None);
    }
}
