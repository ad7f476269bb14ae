//! Research pipeline: plan, research each step, synthesize.
//!
//! The [`ResearchOrchestrator`] owns the run state, the live step list and the
//! cross-step source aggregate. Progress is pushed to a [`ResearchObserver`].

pub mod observer;
pub mod orchestrator;
pub mod sources;

pub use observer::{ChannelObserver, NoOpObserver, ResearchEvent, ResearchObserver};
pub use orchestrator::ResearchOrchestrator;
pub use sources::{SourceAggregate, dedupe_sources};
