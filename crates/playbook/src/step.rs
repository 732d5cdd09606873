//! Steps: the atomic actions a task is made of

use std::collections::HashMap;
use std::fmt;

/// How a step ended
#[derive(Debug)]
pub enum Outcome {
    /// Continue with the next step
    Done,
    /// Nothing to do; stop the task without failing it
    Skip(String),
    /// Stop the task and fail it
    Fail(anyhow::Error),
}

impl Outcome {
    pub fn skip(reason: impl Into<String>) -> Self {
        Self::Skip(reason.into())
    }

    pub fn is_done(&self) -> bool {
        matches!(self, Self::Done)
    }
}

impl From<anyhow::Result<()>> for Outcome {
    fn from(result: anyhow::Result<()>) -> Self {
        match result {
            Ok(()) => Self::Done,
            Err(e) => Self::Fail(e),
        }
    }
}

/// Per-task state handed to each step
///
/// `env` is whatever the task runs against (a host connection, for example).
/// Scratch slots carry values from one step to the next within the same
/// task; nothing here is shared between tasks.
pub struct StepContext<'a, E> {
    env: &'a E,
    scratch: HashMap<String, String>,
}

impl<'a, E> StepContext<'a, E> {
    pub fn new(env: &'a E) -> Self {
        Self {
            env,
            scratch: HashMap::new(),
        }
    }

    pub fn env(&self) -> &'a E {
        self.env
    }

    pub fn set(&mut self, slot: impl Into<String>, value: impl Into<String>) {
        self.scratch.insert(slot.into(), value.into());
    }

    pub fn get(&self, slot: &str) -> Option<&str> {
        self.scratch.get(slot).map(String::as_str)
    }

    /// Value of a slot an earlier step must have filled
    pub fn require(&self, slot: &str) -> anyhow::Result<&str> {
        self.get(slot)
            .ok_or_else(|| anyhow::anyhow!("slot {slot:?} was not set by an earlier step"))
    }
}

impl<E> fmt::Debug for StepContext<'_, E> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("StepContext")
            .field("scratch", &self.scratch)
            .finish_non_exhaustive()
    }
}

/// One atomic action
pub trait Step<E>: Send + Sync {
    /// Short name used in logs
    fn name(&self) -> &str;

    fn execute(&self, ctx: &mut StepContext<'_, E>) -> Outcome;
}

type LambdaFn<E> = dyn Fn(&mut StepContext<'_, E>) -> Outcome + Send + Sync;

/// A step backed by a closure
pub struct Lambda<E> {
    name: String,
    f: Box<LambdaFn<E>>,
}

impl<E> Lambda<E> {
    pub fn new(
        name: impl Into<String>,
        f: impl Fn(&mut StepContext<'_, E>) -> Outcome + Send + Sync + 'static,
    ) -> Self {
        Self {
            name: name.into(),
            f: Box::new(f),
        }
    }
}

impl<E> Step<E> for Lambda<E> {
    fn name(&self) -> &str {
        &self.name
    }

    fn execute(&self, ctx: &mut StepContext<'_, E>) -> Outcome {
        (self.f)(ctx)
    }
}

impl<E> fmt::Debug for Lambda<E> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Lambda").field("name", &self.name).finish()
    }
}
