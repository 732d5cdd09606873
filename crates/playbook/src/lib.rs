//! # Playbook
//!
//! Phased task execution with bounded parallelism.
//!
//! A [`Playbook`] is an ordered list of [`PlaybookStep`]s. Each step names an
//! operation and the targets it applies to; a [`Compiler`] turns it into one
//! [`Task`] per target, and the scheduler runs those tasks on a worker pool
//! no wider than the step's [`ExecPolicy`]. Phases never overlap.
//!
//! ## Example
//!
//! ```
//! use playbook::{Compiler, Lambda, NoProgress, Options, Outcome, Playbook, PlaybookStep, Task};
//!
//! let mut compiler: Compiler<&str, u32, ()> = Compiler::new();
//! compiler.register("Ping", |n: &u32, _: &Options| {
//!     Ok(Some(
//!         Task::new("Ping", format!("n={n}"), ()).with_step(Lambda::new("ping", |_| Outcome::Done)),
//!     ))
//! });
//!
//! let mut playbook = Playbook::new();
//! playbook.add_step(PlaybookStep::new("Ping", vec![1, 2, 3]));
//! let summary = playbook.run(&compiler, &NoProgress)?;
//! assert_eq!(summary.phases[0].ok, 3);
//! # Ok::<(), playbook::Error>(())
//! ```

mod compiler;
mod context;
mod error;
mod options;
mod scheduler;
mod step;
mod task;

pub use compiler::{Compiler, PlaybookStep, TaskFactory};
pub use context::{AutoConfirm, AutoDecline, ConfirmCallback, NoProgress, ProgressCallback};
pub use error::{Error, Result};
pub use options::{DEFAULT_CONCURRENCY, ExecPolicy, Options};
pub use scheduler::{PhaseStatus, PhaseSummary, Playbook, RunSummary, TaskReport, run_phase};
pub use step::{Lambda, Outcome, Step, StepContext};
pub use task::{Task, TaskResult, TaskState};
