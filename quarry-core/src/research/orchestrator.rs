//! Research orchestrator: the plan → research → synthesize state machine.
//!
//! ```text
//! idle ─▶ planning ─▶ researching ─▶ synthesizing ─▶ completed
//!            │             │               │
//!            └─────────────┴───────────────┴────────▶ error
//! ```
//!
//! Only one run is in flight at a time. Steps run strictly one at a time. Each step is marked `searching` and
//! published before its calls start, then `completed` (or `failed`) and
//! published again once they resolve. The first unrecovered failure aborts
//! the run; later steps are never attempted.

use chrono::Utc;
use std::sync::{Arc, Mutex, MutexGuard};
use tracing::{info, warn};

use super::observer::ResearchObserver;
use super::sources::SourceAggregate;
use crate::config::SharedConfig;
use crate::error::{BackendError, RunError};
use crate::providers::BackendSelection;
use crate::types::{AnalysisResult, ResearchStep, RunState, Source, StepStatus};

/// Error recorded when a run future is dropped before it finishes.
pub const CANCELLED_MESSAGE: &str = "Research run cancelled";

/// Mutable state of the current (or last) run.
#[derive(Debug, Default)]
struct RunSlot {
    state: RunState,
    steps: Vec<ResearchStep>,
    sources: SourceAggregate,
    result: Option<AnalysisResult>,
    last_error: Option<String>,
}

impl RunSlot {
    fn clear(&mut self) {
        self.steps.clear();
        self.sources.clear();
        self.result = None;
        self.last_error = None;
    }
}

/// Drives one research run at a time.
///
/// Methods take `&self`, so the orchestrator can be shared behind an `Arc`
/// between the task running a query and whoever renders its progress. The
/// run lock is never held across an `.await`.
pub struct ResearchOrchestrator {
    config: SharedConfig,
    observer: Arc<dyn ResearchObserver>,
    slot: Mutex<RunSlot>,
}

/// Moves a run that is dropped mid-flight to `error`.
struct CancelGuard<'a> {
    orchestrator: &'a ResearchOrchestrator,
    armed: bool,
}

impl CancelGuard<'_> {
    fn disarm(mut self) {
        self.armed = false;
    }
}

impl Drop for CancelGuard<'_> {
    fn drop(&mut self) {
        if !self.armed {
            return;
        }
        let mut slot = self.orchestrator.slot();
        warn!(state = %slot.state, "Research run dropped before completion");
        for step in slot
            .steps
            .iter_mut()
            .filter(|s| s.status == StepStatus::Searching)
        {
            step.status = StepStatus::Failed;
        }
        slot.state = RunState::Error;
        slot.last_error = Some(CANCELLED_MESSAGE.to_string());
    }
}

impl ResearchOrchestrator {
    pub fn new(config: SharedConfig, observer: Arc<dyn ResearchObserver>) -> Self {
        Self {
            config,
            observer,
            slot: Mutex::new(RunSlot::default()),
        }
    }

    fn slot(&self) -> MutexGuard<'_, RunSlot> {
        self.slot
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
    }

    pub fn state(&self) -> RunState {
        self.slot().state
    }

    /// Snapshot of the step list of the current (or last) run.
    pub fn steps(&self) -> Vec<ResearchStep> {
        self.slot().steps.clone()
    }

    /// Every source committed so far, in arrival order and not yet deduplicated.
    pub fn collected_sources(&self) -> Vec<Source> {
        self.slot().sources.all().to_vec()
    }

    pub fn result(&self) -> Option<AnalysisResult> {
        self.slot().result.clone()
    }

    /// Message of the error that ended the last run, if it failed.
    pub fn last_error(&self) -> Option<String> {
        self.slot().last_error.clone()
    }

    pub fn config(&self) -> &SharedConfig {
        &self.config
    }

    /// Return to `idle`, discarding the steps and outcome of the last run.
    pub async fn reset(&self) -> Result<(), RunError> {
        {
            let mut slot = self.slot();
            if slot.state.is_active() {
                return Err(RunError::ResetWhileRunning {
                    state: slot.state.to_string(),
                });
            }
            slot.clear();
        }
        self.transition(RunState::Idle).await;
        Ok(())
    }

    /// Run `query` end to end on the selected backend.
    ///
    /// Refuses to start while another run is in flight, unless the shared
    /// configuration is marked valid, or when the query is blank. A refused
    /// start leaves the state untouched. Dropping the returned future ends
    /// the run in `error` with [`CANCELLED_MESSAGE`].
    pub async fn run(
        &self,
        query: &str,
        selection: &BackendSelection,
    ) -> Result<AnalysisResult, RunError> {
        let query = query.trim();
        {
            let mut slot = self.slot();
            if !slot.state.can_start() {
                return Err(RunError::AlreadyRunning {
                    state: slot.state.to_string(),
                });
            }
            if !self.config.is_valid() {
                return Err(RunError::NotValidated);
            }
            if query.is_empty() {
                return Err(RunError::EmptyQuery);
            }
            slot.clear();
            slot.state = RunState::Planning;
        }

        let guard = CancelGuard {
            orchestrator: self,
            armed: true,
        };
        let outcome = self.execute(query, selection).await;
        guard.disarm();
        outcome
    }

    async fn execute(
        &self,
        query: &str,
        selection: &BackendSelection,
    ) -> Result<AnalysisResult, RunError> {
        let backend = selection.backend.clone();
        info!(
            backend = backend.name(),
            substituted = selection.substituted(),
            "Starting research run"
        );
        self.observer
            .on_backend_selected(backend.name(), selection.requested, selection.effective)
            .await;

        // Planning: the state was claimed when the run was accepted.
        info!(from = %RunState::Idle, to = %RunState::Planning, "Research state change");
        self.observer.on_state_change(RunState::Planning).await;
        let plan = backend
            .generate_research_plan(&self.config.snapshot(), query)
            .await;
        let plan = match plan {
            Ok(steps) => steps,
            Err(e) => return Err(self.abort(e).await),
        };
        info!(steps = plan.len(), "Research plan ready");
        let snapshot = self.commit(|slot| slot.steps = plan);
        self.observer.on_steps_updated(&snapshot).await;

        // Researching
        self.transition(RunState::Researching).await;
        let step_count = self.slot().steps.len();
        for index in 0..step_count {
            let snapshot = self.commit(|slot| slot.steps[index].status = StepStatus::Searching);
            self.observer.on_steps_updated(&snapshot).await;

            let step_query = snapshot[index].query.clone();
            let outcome = backend
                .execute_research_step(&self.config.snapshot(), &step_query)
                .await;

            match outcome {
                Ok(outcome) => {
                    let snapshot = self.commit(|slot| {
                        let step = &mut slot.steps[index];
                        step.status = StepStatus::Completed;
                        step.result = Some(outcome.result);
                        step.sources = Some(outcome.sources.clone());
                        slot.sources.extend(outcome.sources);
                    });
                    self.observer.on_steps_updated(&snapshot).await;
                }
                Err(e) => {
                    let snapshot =
                        self.commit(|slot| slot.steps[index].status = StepStatus::Failed);
                    self.observer.on_steps_updated(&snapshot).await;
                    return Err(self.abort(e).await);
                }
            }
        }

        // Synthesizing
        self.transition(RunState::Synthesizing).await;
        let steps = self.steps();
        let synthesis = backend
            .synthesize_analysis(&self.config.snapshot(), query, &steps)
            .await;
        let synthesis = match synthesis {
            Ok(synthesis) => synthesis,
            Err(e) => return Err(self.abort(e).await),
        };

        let result = {
            let mut slot = self.slot();
            let result = AnalysisResult {
                query: query.to_string(),
                summary: synthesis.summary,
                deep_dive: synthesis.deep_dive,
                steps: slot.steps.clone(),
                all_sources: slot.sources.deduplicated(),
                provider: backend.name().to_string(),
                completed_at: Utc::now(),
            };
            slot.result = Some(result.clone());
            result
        };
        self.transition(RunState::Completed).await;
        self.observer.on_complete(&result).await;

        Ok(result)
    }

    /// Apply `edit` under the run lock and return the resulting step list.
    fn commit<F>(&self, edit: F) -> Vec<ResearchStep>
    where
        F: FnOnce(&mut RunSlot),
    {
        let mut slot = self.slot();
        edit(&mut slot);
        slot.steps.clone()
    }

    async fn transition(&self, next: RunState) {
        {
            let mut slot = self.slot();
            info!(from = %slot.state, to = %next, "Research state change");
            slot.state = next;
        }
        self.observer.on_state_change(next).await;
    }

    /// Move to `error`, publish the message once and return it as a run error.
    async fn abort(&self, error: BackendError) -> RunError {
        let message = error.to_string();
        {
            let mut slot = self.slot();
            warn!(state = %slot.state, error = %message, "Research run aborted");
            slot.last_error = Some(message.clone());
        }
        self.transition(RunState::Error).await;
        self.observer.on_error(&message).await;
        RunError::Aborted { message }
    }
}
