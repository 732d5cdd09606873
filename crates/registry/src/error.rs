//! Error types for the registry crate

use thiserror::Error;

/// Errors that can occur during registry operations
#[derive(Error, Debug)]
pub enum Error {
    /// Database error
    #[error("database error: {0}")]
    Database(#[from] rusqlite::Error),

    /// IO error
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    /// A cluster with this name is already registered
    #[error("cluster '{0}' already exists")]
    ClusterExists(String),

    /// No cluster with this name
    #[error("cluster '{0}' not found")]
    ClusterNotFound(String),

    /// No cluster has been checked out
    #[error("no cluster checked out, run `stackadm cluster checkout <name>` first")]
    NoCurrentCluster,
}

/// Result type for registry operations
pub type Result<T> = std::result::Result<T, Error>;
