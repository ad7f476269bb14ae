//! Core types for the Quarry research pipeline.
//!
//! Defines research steps, citations, run state, and the final analysis result.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Lifecycle status of a single research step.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum StepStatus {
    #[default]
    Pending,
    Searching,
    Analyzing,
    Completed,
    Failed,
}

impl std::fmt::Display for StepStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            StepStatus::Pending => write!(f, "pending"),
            StepStatus::Searching => write!(f, "searching"),
            StepStatus::Analyzing => write!(f, "analyzing"),
            StepStatus::Completed => write!(f, "completed"),
            StepStatus::Failed => write!(f, "failed"),
        }
    }
}

/// A web citation.
///
/// The `uri` is the identity of a source; the title may be empty.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Source {
    pub uri: String,
    #[serde(default)]
    pub title: String,
}

impl Source {
    pub fn new(uri: impl Into<String>, title: impl Into<String>) -> Self {
        Self {
            uri: uri.into(),
            title: title.into(),
        }
    }

    /// Title for display, falling back to the URI's hostname when the title is empty.
    pub fn display_title(&self) -> String {
        if !self.title.trim().is_empty() {
            return self.title.clone();
        }
        url::Url::parse(&self.uri)
            .ok()
            .and_then(|u| u.host_str().map(|h| h.trim_start_matches("www.").to_string()))
            .unwrap_or_else(|| self.uri.clone())
    }
}

/// One sub-question of a research plan.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ResearchStep {
    /// Identifier, stable for the duration of a run.
    pub id: String,
    pub query: String,
    pub status: StepStatus,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub result: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub sources: Option<Vec<Source>>,
}

impl ResearchStep {
    /// Create a pending step with a freshly assigned identifier.
    pub fn pending(query: impl Into<String>) -> Self {
        Self {
            id: Uuid::new_v4().to_string(),
            query: query.into(),
            status: StepStatus::Pending,
            result: None,
            sources: None,
        }
    }

    pub fn is_completed(&self) -> bool {
        self.status == StepStatus::Completed
    }
}

/// Output of a single research step call.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct StepOutcome {
    pub result: String,
    pub sources: Vec<Source>,
}

/// Output of the synthesis call.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Synthesis {
    pub summary: String,
    pub deep_dive: String,
}

/// Final result of a successful research run. Immutable once built.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AnalysisResult {
    pub query: String,
    pub summary: String,
    pub deep_dive: String,
    pub steps: Vec<ResearchStep>,
    /// Sources across all steps, deduplicated by URI.
    pub all_sources: Vec<Source>,
    /// Display name of the backend that actually ran.
    pub provider: String,
    pub completed_at: DateTime<Utc>,
}

/// State of the research orchestrator.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RunState {
    #[default]
    Idle,
    Planning,
    Researching,
    Synthesizing,
    Completed,
    Error,
}

impl RunState {
    /// Whether a new run may start from this state.
    pub fn can_start(&self) -> bool {
        matches!(self, RunState::Idle | RunState::Completed | RunState::Error)
    }

    /// Whether a run is currently in flight.
    pub fn is_active(&self) -> bool {
        !self.can_start()
    }
}

impl std::fmt::Display for RunState {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            RunState::Idle => write!(f, "idle"),
            RunState::Planning => write!(f, "planning"),
            RunState::Researching => write!(f, "researching"),
            RunState::Synthesizing => write!(f, "synthesizing"),
            RunState::Completed => write!(f, "completed"),
            RunState::Error => write!(f, "error"),
        }
    }
}
