//! # Quarry Core
//!
//! Core library for Quarry, a provider-agnostic web research assistant.
//! Decomposes a question into sub-questions, gathers web-grounded evidence for
//! each, and synthesizes a final report. Provides the reasoning backends, the
//! evidence source, the backend selector, the configuration validator and the
//! research orchestrator.

pub mod config;
pub mod error;
pub mod providers;
pub mod research;
pub mod search;
pub mod testing;
pub mod types;
pub mod validator;

// Re-export commonly used types at the crate root.
pub use config::{ProviderConfig, ProviderKind, QuarryConfig, SearchConfig, SharedConfig};
pub use error::{BackendError, ConfigError, QuarryError, Result, RunError, SearchError};
pub use providers::{BackendSelection, ResearchBackend, select_backend};
pub use research::{
    ChannelObserver, NoOpObserver, ResearchEvent, ResearchObserver, ResearchOrchestrator,
};
pub use search::{EvidenceSource, SearchHit, SearchResults, TavilySearch};
pub use types::{
    AnalysisResult, ResearchStep, RunState, Source, StepOutcome, StepStatus, Synthesis,
};
pub use validator::ConfigValidator;
