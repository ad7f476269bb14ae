//! Progress surface of a research run.
//!
//! The orchestrator pushes every state change and every step-list change to a
//! [`ResearchObserver`]. The terminal result or error is pushed exactly once.

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use tokio::sync::mpsc;

use crate::config::ProviderKind;
use crate::types::{AnalysisResult, ResearchStep, RunState};

/// Callback trait for run progress. All methods default to no-ops.
#[async_trait]
pub trait ResearchObserver: Send + Sync {
    async fn on_state_change(&self, _state: RunState) {}

    /// Called once per run, before planning, with the backend that will run.
    async fn on_backend_selected(
        &self,
        _name: &str,
        _requested: ProviderKind,
        _effective: ProviderKind,
    ) {
    }

    /// Full snapshot of the step list after a status change.
    async fn on_steps_updated(&self, _steps: &[ResearchStep]) {}

    async fn on_complete(&self, _result: &AnalysisResult) {}

    async fn on_error(&self, _message: &str) {}
}

/// An observer that ignores everything.
pub struct NoOpObserver;

#[async_trait]
impl ResearchObserver for NoOpObserver {}

/// A run event, as delivered by [`ChannelObserver`].
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum ResearchEvent {
    StateChanged {
        state: RunState,
    },
    BackendSelected {
        name: String,
        requested: ProviderKind,
        effective: ProviderKind,
        substituted: bool,
    },
    StepsUpdated {
        steps: Vec<ResearchStep>,
    },
    Completed {
        result: Box<AnalysisResult>,
    },
    Failed {
        message: String,
    },
}

/// Forwards every callback as a [`ResearchEvent`] over an unbounded channel.
///
/// Events are dropped silently once the receiver is gone.
pub struct ChannelObserver {
    tx: mpsc::UnboundedSender<ResearchEvent>,
}

impl ChannelObserver {
    pub fn new(tx: mpsc::UnboundedSender<ResearchEvent>) -> Self {
        Self { tx }
    }

    /// Create an observer together with its receiving end.
    pub fn channel() -> (Self, mpsc::UnboundedReceiver<ResearchEvent>) {
        let (tx, rx) = mpsc::unbounded_channel();
        (Self::new(tx), rx)
    }

    fn send(&self, event: ResearchEvent) {
        let _ = self.tx.send(event);
    }
}

#[async_trait]
impl ResearchObserver for ChannelObserver {
    async fn on_state_change(&self, state: RunState) {
        self.send(ResearchEvent::StateChanged { state });
    }

    async fn on_backend_selected(
        &self,
        name: &str,
        requested: ProviderKind,
        effective: ProviderKind,
    ) {
        self.send(ResearchEvent::BackendSelected {
            name: name.to_string(),
            requested,
            effective,
            substituted: requested != effective,
        });
    }

    async fn on_steps_updated(&self, steps: &[ResearchStep]) {
        self.send(ResearchEvent::StepsUpdated {
            steps: steps.to_vec(),
        });
    }

    async fn on_complete(&self, result: &AnalysisResult) {
        self.send(ResearchEvent::Completed {
            result: Box::new(result.clone()),
        });
    }

    async fn on_error(&self, message: &str) {
        self.send(ResearchEvent::Failed {
            message: message.to_string(),
        });
    }
}
