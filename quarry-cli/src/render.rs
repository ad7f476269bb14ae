//! Terminal rendering: live step progress and the final report.

use async_trait::async_trait;
use quarry_core::research::ResearchObserver;
use quarry_core::{AnalysisResult, ProviderKind, ResearchStep, RunState, StepStatus};
use std::io::Write;
use std::sync::Mutex;

/// Prints run progress as it happens.
///
/// Failures are not printed here: the command reports the run error once.
pub struct TerminalObserver {
    quiet: bool,
    out: Mutex<Box<dyn Write + Send>>,
    /// Last printed status per step, to print only transitions.
    printed: Mutex<Vec<StepStatus>>,
}

impl TerminalObserver {
    pub fn new(quiet: bool) -> Self {
        Self::with_writer(quiet, Box::new(std::io::stdout()))
    }

    pub fn with_writer(quiet: bool, out: Box<dyn Write + Send>) -> Self {
        Self {
            quiet,
            out: Mutex::new(out),
            printed: Mutex::new(Vec::new()),
        }
    }

    fn print_lines<I>(&self, lines: I)
    where
        I: IntoIterator<Item = String>,
    {
        let mut out = self
            .out
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner());
        for line in lines {
            // Progress output is best effort; a closed pipe must not fail the run.
            let _ = writeln!(out, "{}", line);
        }
        let _ = out.flush();
    }
}

/// Status marker shown in front of a step line.
fn status_marker(status: StepStatus) -> &'static str {
    match status {
        StepStatus::Pending => "[ ]",
        StepStatus::Searching => "[~]",
        StepStatus::Analyzing => "[*]",
        StepStatus::Completed => "[x]",
        StepStatus::Failed => "[!]",
    }
}

/// Lines for every step whose status differs from `previous`.
fn step_changes(previous: &[StepStatus], steps: &[ResearchStep]) -> Vec<String> {
    steps
        .iter()
        .enumerate()
        .filter(|(i, step)| previous.get(*i) != Some(&step.status))
        .map(|(i, step)| format!("  {} {}. {}", status_marker(step.status), i + 1, step.query))
        .collect()
}

fn state_line(state: RunState) -> Option<&'static str> {
    match state {
        RunState::Planning => Some("Planning research steps..."),
        RunState::Researching => Some("Researching:"),
        RunState::Synthesizing => Some("Synthesizing report..."),
        RunState::Idle | RunState::Completed | RunState::Error => None,
    }
}

#[async_trait]
impl ResearchObserver for TerminalObserver {
    async fn on_state_change(&self, state: RunState) {
        if self.quiet {
            return;
        }
        if let Some(line) = state_line(state) {
            self.print_lines([line.to_string()]);
        }
    }

    async fn on_backend_selected(
        &self,
        name: &str,
        requested: ProviderKind,
        effective: ProviderKind,
    ) {
        if requested != effective {
            // Shown even in quiet mode: the answer comes from a different engine.
            eprintln!(
                "Note: '{}' is missing required settings; using {} instead.",
                requested, name
            );
        } else if !self.quiet {
            self.print_lines([format!("Using {}.", name)]);
        }
    }

    async fn on_steps_updated(&self, steps: &[ResearchStep]) {
        let lines = {
            let mut printed = self
                .printed
                .lock()
                .unwrap_or_else(|poisoned| poisoned.into_inner());
            let lines = step_changes(&printed, steps);
            *printed = steps.iter().map(|s| s.status).collect();
            lines
        };
        if !self.quiet {
            self.print_lines(lines);
        }
    }
}

/// Render the final report as markdown.
pub fn render_report(result: &AnalysisResult) -> String {
    let mut out = String::new();
    out.push_str(&format!("# {}\n\n", result.query));
    out.push_str("## Summary\n\n");
    out.push_str(result.summary.trim());
    out.push_str("\n\n## Detailed findings\n\n");
    out.push_str(result.deep_dive.trim());
    out.push('\n');

    if !result.all_sources.is_empty() {
        out.push_str("\n## Sources\n\n");
        for (i, source) in result.all_sources.iter().enumerate() {
            out.push_str(&format!(
                "{}. {} <{}>\n",
                i + 1,
                source.display_title(),
                source.uri
            ));
        }
    }

    out.push_str(&format!(
        "\n_Researched with {} on {}_\n",
        result.provider,
        result.completed_at.format("%Y-%m-%d %H:%M UTC")
    ));
    out
}
