//! Turning playbook steps into tasks

use crate::error::{Error, Result};
use crate::options::{ExecPolicy, Options};
use crate::task::Task;
use std::collections::HashMap;
use std::fmt;
use std::hash::Hash;

/// One phase of a playbook: an operation applied to a list of targets
#[derive(Debug, Clone)]
pub struct PlaybookStep<K, T> {
    pub kind: K,
    pub targets: Vec<T>,
    pub options: Options,
    pub policy: ExecPolicy,
}

impl<K, T> PlaybookStep<K, T> {
    pub fn new(kind: K, targets: Vec<T>) -> Self {
        Self {
            kind,
            targets,
            options: Options::new(),
            policy: ExecPolicy::default(),
        }
    }

    pub fn with_options(mut self, options: Options) -> Self {
        self.options = options;
        self
    }

    pub fn with_policy(mut self, policy: ExecPolicy) -> Self {
        self.policy = policy;
        self
    }
}

/// Builds the task for one target of an operation
///
/// Returning `Ok(None)` contributes no task for that target (already
/// deployed, filtered out). An error aborts compilation.
pub trait TaskFactory<T, E>: Send + Sync {
    fn create(&self, target: &T, options: &Options) -> anyhow::Result<Option<Task<E>>>;
}

impl<T, E, F> TaskFactory<T, E> for F
where
    F: Fn(&T, &Options) -> anyhow::Result<Option<Task<E>>> + Send + Sync,
{
    fn create(&self, target: &T, options: &Options) -> anyhow::Result<Option<Task<E>>> {
        self(target, options)
    }
}

/// Registry of task factories keyed by operation
pub struct Compiler<K, T, E> {
    factories: HashMap<K, Box<dyn TaskFactory<T, E>>>,
}

impl<K, T, E> Default for Compiler<K, T, E> {
    fn default() -> Self {
        Self {
            factories: HashMap::new(),
        }
    }
}

impl<K, T, E> Compiler<K, T, E>
where
    K: Copy + Eq + Hash + fmt::Display,
{
    pub fn new() -> Self {
        Self::default()
    }

    pub fn register(&mut self, kind: K, factory: impl TaskFactory<T, E> + 'static) -> &mut Self {
        self.factories.insert(kind, Box::new(factory));
        self
    }

    pub fn contains(&self, kind: K) -> bool {
        self.factories.contains_key(&kind)
    }

    /// Create the tasks of one step, dropping targets that yield none
    pub fn compile(&self, step: &PlaybookStep<K, T>) -> Result<Vec<Task<E>>> {
        let factory = self
            .factories
            .get(&step.kind)
            .ok_or_else(|| Error::NoFactory(step.kind.to_string()))?;

        let mut tasks = Vec::with_capacity(step.targets.len());
        for target in &step.targets {
            match factory.create(target, &step.options) {
                Ok(Some(task)) => tasks.push(task),
                Ok(None) => {}
                Err(source) => {
                    return Err(Error::Factory {
                        phase: step.kind.to_string(),
                        source,
                    });
                }
            }
        }
        log::debug!(
            "Compiled {}: {} task(s) from {} target(s)",
            step.kind,
            tasks.len(),
            step.targets.len()
        );
        Ok(tasks)
    }
}

impl<K: fmt::Debug, T, E> fmt::Debug for Compiler<K, T, E> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Compiler")
            .field("kinds", &self.factories.keys().collect::<Vec<_>>())
            .finish()
    }
}
