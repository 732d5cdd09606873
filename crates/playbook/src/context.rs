//! Progress and confirmation callbacks
//!
//! These traits let the playbook crate report progress and ask questions
//! without depending on a terminal UI.

use crate::options::ExecPolicy;
use crate::scheduler::{PhaseSummary, TaskReport};

/// Receives progress while a playbook runs
///
/// Task callbacks are invoked from worker threads.
pub trait ProgressCallback: Sync {
    /// A phase is about to run `tasks` tasks
    fn on_phase_start(&self, name: &str, tasks: usize, policy: &ExecPolicy);

    fn on_task_start(&self, name: &str, subname: &str);

    fn on_task_complete(&self, report: &TaskReport);

    fn on_phase_complete(&self, summary: &PhaseSummary, policy: &ExecPolicy);
}

/// Progress callback that ignores every event
pub struct NoProgress;

impl ProgressCallback for NoProgress {
    fn on_phase_start(&self, _name: &str, _tasks: usize, _policy: &ExecPolicy) {}
    fn on_task_start(&self, _name: &str, _subname: &str) {}
    fn on_task_complete(&self, _report: &TaskReport) {}
    fn on_phase_complete(&self, _summary: &PhaseSummary, _policy: &ExecPolicy) {}
}

/// Asks the user to confirm before a playbook runs
pub trait ConfirmCallback {
    fn confirm(&mut self, prompt: &str) -> anyhow::Result<bool>;
}

/// Always confirms
pub struct AutoConfirm;

impl ConfirmCallback for AutoConfirm {
    fn confirm(&mut self, _prompt: &str) -> anyhow::Result<bool> {
        Ok(true)
    }
}

/// Always declines
pub struct AutoDecline;

impl ConfirmCallback for AutoDecline {
    fn confirm(&mut self, _prompt: &str) -> anyhow::Result<bool> {
        Ok(false)
    }
}
