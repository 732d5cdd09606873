//! Tasks: ordered steps bound to one execution environment

use crate::step::{Outcome, Step, StepContext};
use std::fmt;
use std::sync::Mutex;

/// Lifecycle of a task
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TaskState {
    Pending,
    Running,
    Done,
    Skipped,
    Failed,
}

/// Result of running a task
#[derive(Debug)]
pub enum TaskResult {
    Done,
    Skipped { reason: String },
    Failed { error: anyhow::Error },
}

impl TaskResult {
    pub fn state(&self) -> TaskState {
        match self {
            Self::Done => TaskState::Done,
            Self::Skipped { .. } => TaskState::Skipped,
            Self::Failed { .. } => TaskState::Failed,
        }
    }
}

/// An ordered list of steps run against one environment
///
/// Steps run strictly in order. The first skip stops the task as skipped,
/// the first failure stops it as failed. Earlier steps are never undone.
pub struct Task<E> {
    name: String,
    subname: String,
    env: E,
    steps: Vec<Box<dyn Step<E>>>,
    state: Mutex<TaskState>,
}

impl<E> Task<E> {
    pub fn new(name: impl Into<String>, subname: impl Into<String>, env: E) -> Self {
        Self {
            name: name.into(),
            subname: subname.into(),
            env,
            steps: Vec::new(),
            state: Mutex::new(TaskState::Pending),
        }
    }

    pub fn add_step(&mut self, step: impl Step<E> + 'static) -> &mut Self {
        self.steps.push(Box::new(step));
        self
    }

    pub fn with_step(mut self, step: impl Step<E> + 'static) -> Self {
        self.add_step(step);
        self
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    /// Identifies the target, e.g. `host=h1 role=store containerId=3f2a..`
    pub fn subname(&self) -> &str {
        &self.subname
    }

    pub fn env(&self) -> &E {
        &self.env
    }

    pub fn len(&self) -> usize {
        self.steps.len()
    }

    pub fn is_empty(&self) -> bool {
        self.steps.is_empty()
    }

    pub fn state(&self) -> TaskState {
        match self.state.lock() {
            Ok(state) => *state,
            Err(poisoned) => *poisoned.into_inner(),
        }
    }

    fn set_state(&self, next: TaskState) {
        match self.state.lock() {
            Ok(mut state) => *state = next,
            Err(poisoned) => *poisoned.into_inner() = next,
        }
    }

    /// Run every step in order
    pub fn run(&self) -> TaskResult {
        self.set_state(TaskState::Running);
        let mut ctx = StepContext::new(&self.env);

        let result = self.run_steps(&mut ctx);
        self.set_state(result.state());
        result
    }

    fn run_steps(&self, ctx: &mut StepContext<'_, E>) -> TaskResult {
        for step in &self.steps {
            log::trace!("{} [{}]: {}", self.name, self.subname, step.name());
            match step.execute(ctx) {
                Outcome::Done => {}
                Outcome::Skip(reason) => {
                    log::debug!(
                        "{} [{}] skipped at {}: {}",
                        self.name,
                        self.subname,
                        step.name(),
                        reason
                    );
                    return TaskResult::Skipped { reason };
                }
                Outcome::Fail(error) => {
                    log::debug!(
                        "{} [{}] failed at {}: {:#}",
                        self.name,
                        self.subname,
                        step.name(),
                        error
                    );
                    return TaskResult::Failed { error };
                }
            }
        }
        TaskResult::Done
    }
}

impl<E> fmt::Debug for Task<E> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Task")
            .field("name", &self.name)
            .field("subname", &self.subname)
            .field("steps", &self.steps.len())
            .field("state", &self.state())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::step::Lambda;
    use std::sync::Arc;
    use std::sync::atomic::{AtomicUsize, Ordering};

    fn counting(counter: &Arc<AtomicUsize>, outcome: fn() -> Outcome) -> Lambda<()> {
        let counter = Arc::clone(counter);
        Lambda::new("count", move |_| {
            counter.fetch_add(1, Ordering::SeqCst);
            outcome()
        })
    }

    #[test]
    fn test_empty_task_is_done() {
        let task = Task::new("noop", "", ());
        assert_eq!(task.state(), TaskState::Pending);
        assert!(matches!(task.run(), TaskResult::Done));
        assert_eq!(task.state(), TaskState::Done);
    }

    #[test]
    fn test_skip_stops_task() {
        let ran = Arc::new(AtomicUsize::new(0));
        let third = Arc::new(AtomicUsize::new(0));
        let task = Task::new("t", "", ())
            .with_step(counting(&ran, || Outcome::Done))
            .with_step(counting(&ran, || Outcome::skip("already deployed")))
            .with_step(counting(&third, || Outcome::Done));

        let result = task.run();
        assert!(matches!(result, TaskResult::Skipped { ref reason } if reason == "already deployed"));
        assert_eq!(ran.load(Ordering::SeqCst), 2);
        assert_eq!(third.load(Ordering::SeqCst), 0);
        assert_eq!(task.state(), TaskState::Skipped);
    }

    #[test]
    fn test_failure_stops_task() {
        let after = Arc::new(AtomicUsize::new(0));
        let task = Task::new("t", "", ())
            .with_step(Lambda::new("fail", |_| {
                Outcome::Fail(anyhow::anyhow!("container not found"))
            }))
            .with_step(counting(&after, || Outcome::Done));

        let result = task.run();
        assert!(matches!(result, TaskResult::Failed { ref error } if error.to_string() == "container not found"));
        assert_eq!(after.load(Ordering::SeqCst), 0);
        assert_eq!(task.state(), TaskState::Failed);
    }

    #[test]
    fn test_steps_share_scratch() {
        let task = Task::new("t", "", ())
            .with_step(Lambda::new("produce", |ctx| {
                ctx.set("id", "c0ffee");
                Outcome::Done
            }))
            .with_step(Lambda::new("consume", |ctx| {
                Outcome::from(ctx.require("id").map(|id| assert_eq!(id, "c0ffee")))
            }));
        assert!(matches!(task.run(), TaskResult::Done));
    }
}
