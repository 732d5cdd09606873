//! Terminal progress for playbook runs
//!
//! Each phase gets one bar. Finished tasks are printed above it, and the
//! phase ends with an `OK`, `SKIP` or `ERROR` line.

use colored::Colorize;
use indicatif::{ProgressBar, ProgressStyle};
use playbook::{ExecPolicy, PhaseStatus, PhaseSummary, ProgressCallback, TaskReport, TaskResult};
use std::sync::Mutex;

const BAR_TEMPLATE: &str = "{spinner:.green} [{bar:40.cyan/blue}] {pos}/{len} {msg}";

/// Phase bars drawn on stderr
pub struct TerminalProgress {
    quiet: bool,
    bar: Mutex<Option<PhaseBar>>,
}

struct PhaseBar {
    bar: ProgressBar,
    /// Print a line per finished task
    lines: bool,
}

impl TerminalProgress {
    pub fn new(quiet: bool) -> Self {
        Self {
            quiet,
            bar: Mutex::new(None),
        }
    }

    fn with_bar(&self, f: impl FnOnce(&PhaseBar)) {
        let guard = match self.bar.lock() {
            Ok(guard) => guard,
            Err(poisoned) => poisoned.into_inner(),
        };
        if let Some(bar) = guard.as_ref() {
            f(bar);
        }
    }
}

fn style() -> ProgressStyle {
    ProgressStyle::default_bar()
        .template(BAR_TEMPLATE)
        .unwrap_or_else(|_| ProgressStyle::default_bar())
        .progress_chars("=>-")
}

/// One line for a finished task
fn task_line(report: &TaskReport) -> String {
    let subname = if report.subname.is_empty() {
        String::new()
    } else {
        format!(" {}", report.subname.dimmed())
    };
    match &report.result {
        TaskResult::Done => format!("  {} {}{subname}", "✓".green(), report.name),
        TaskResult::Skipped { reason } => format!(
            "  {} {}{subname} {}",
            "-".dimmed(),
            report.name,
            format!("({reason})").dimmed()
        ),
        TaskResult::Failed { error } => format!(
            "  {} {}{subname}: {}",
            "✗".red(),
            report.name,
            format!("{error:#}").red()
        ),
    }
}

/// Closing line of a phase
fn phase_line(summary: &PhaseSummary) -> String {
    let status = match summary.status() {
        PhaseStatus::Ok => "[OK]".green(),
        PhaseStatus::Skipped => "[SKIP]".yellow(),
        PhaseStatus::Failed => "[ERROR]".red(),
    };
    format!("{}: {status}", summary.name.bold())
}

impl ProgressCallback for TerminalProgress {
    fn on_phase_start(&self, name: &str, tasks: usize, policy: &ExecPolicy) {
        if self.quiet || policy.silent_main_bar {
            return;
        }
        let bar = ProgressBar::new(tasks as u64);
        bar.set_style(style());
        bar.set_message(name.to_string());
        let phase = PhaseBar {
            bar,
            lines: !policy.silent_sub_bar,
        };
        match self.bar.lock() {
            Ok(mut guard) => *guard = Some(phase),
            Err(poisoned) => *poisoned.into_inner() = Some(phase),
        }
    }

    fn on_task_start(&self, _name: &str, subname: &str) {
        log::debug!("Task started: {subname}");
    }

    fn on_task_complete(&self, report: &TaskReport) {
        self.with_bar(|phase| {
            if phase.lines {
                let line = task_line(report);
                phase.bar.suspend(|| println!("{line}"));
            }
            phase.bar.inc(1);
        });
    }

    fn on_phase_complete(&self, summary: &PhaseSummary, policy: &ExecPolicy) {
        let taken = match self.bar.lock() {
            Ok(mut guard) => guard.take(),
            Err(poisoned) => poisoned.into_inner().take(),
        };
        if let Some(phase) = taken {
            phase.bar.finish_and_clear();
        }
        if !self.quiet && !policy.silent_main_bar {
            println!("{}", phase_line(summary));
        }
    }
}
