//! Error types for the topology crate

use std::path::PathBuf;
use thiserror::Error;

/// Errors raised while parsing, expanding or resolving a cluster topology
///
/// Every variant is a configuration error: it is reported before any remote
/// action is taken.
#[derive(Error, Debug)]
pub enum Error {
    /// The topology document is empty
    #[error("topology is empty")]
    EmptyTopology,

    /// The topology document is not valid YAML
    #[error("failed to parse topology: {0}")]
    Parse(#[from] serde_yaml::Error),

    /// Failed to read a topology file
    #[error("failed to read topology {}: {source}", .path.display())]
    Read {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    /// `kind` is missing or names no known cluster family
    #[error("unsupported cluster kind: {0:?}")]
    UnsupportedKind(String),

    /// A `<role>_services` section has an unexpected shape
    #[error("invalid section {section}: {reason}")]
    InvalidSection { section: String, reason: String },

    /// A config value is a sequence or another unsupported type
    #[error("unsupported value type for config key {0:?}")]
    UnsupportedValueType(String),

    /// `replicas`, `replica` or `instances` is negative
    #[error("{field} must be non-negative for host {host}, got {value}")]
    InvalidReplicas {
        host: String,
        field: &'static str,
        value: i64,
    },

    /// Two instances produced the same id
    #[error("duplicate service id: {0}")]
    DuplicateServiceId(String),

    /// A host is missing from the hosts inventory
    #[error("host {0:?} not found in hosts inventory")]
    HostNotFound(String),

    /// A config value does not satisfy its item requirement
    #[error("{key}: expected {expected}, got {value:?}")]
    InvalidValue {
        key: String,
        expected: &'static str,
        value: String,
    },

    /// A variable name was registered twice
    #[error("variable {0:?} is already registered")]
    DuplicateVariable(String),

    /// A `${name}` placeholder references an unknown variable
    #[error("undefined variable {0:?}")]
    UndefinedVariable(String),

    /// Variable definitions reference each other in a cycle
    #[error("variable {0:?} references itself through a cycle")]
    VariableCycle(String),

    /// Variable resolution failed for one instance
    #[error("failed to resolve variables for {id}: {source}")]
    ResolveVariables {
        id: String,
        #[source]
        source: Box<Error>,
    },
}

/// Result type for topology operations
pub type Result<T> = std::result::Result<T, Error>;
