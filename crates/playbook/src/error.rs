//! Error types for the playbook crate

use thiserror::Error;

/// Errors that stop a playbook run
#[derive(Error, Debug)]
pub enum Error {
    /// No task factory is registered for an operation
    #[error("no task factory registered for {0}")]
    NoFactory(String),

    /// A task factory rejected one of its targets
    #[error("{phase}: {source}")]
    Factory {
        phase: String,
        #[source]
        source: anyhow::Error,
    },

    /// A task failed in a phase that does not tolerate errors
    #[error("{task} ({subname}) failed: {source:#}")]
    TaskFailed {
        phase: String,
        task: String,
        subname: String,
        #[source]
        source: anyhow::Error,
    },

    /// The worker pool could not be created
    #[error("failed to create worker pool: {0}")]
    ThreadPool(String),
}

impl Error {
    /// Whether the error was raised before any task of its phase ran
    pub fn is_precondition(&self) -> bool {
        matches!(self, Self::NoFactory(_) | Self::Factory { .. })
    }
}

/// Result type for playbook operations
pub type Result<T> = std::result::Result<T, Error>;
