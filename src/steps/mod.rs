//! Steps that act on cluster hosts
//!
//! Each task runs against one [`Target`]: a host (or the local machine) plus
//! the remote primitive used to reach it.

pub mod container;
pub mod file;
pub mod service;
pub mod shell;

use anyhow::{Context, Result};
use playbook::StepContext;
use std::path::Path;
use std::sync::Arc;

use crate::hosts::SshConfig;
use crate::remote::{ExecOptions, Remote};

/// Scratch slot holding the container a task operates on
pub const SLOT_CONTAINER_ID: &str = "container_id";
/// Scratch slot holding the container id recorded before this run
pub const SLOT_OLD_CONTAINER_ID: &str = "old_container_id";
/// Scratch slot holding a container's status line
pub const SLOT_STATUS: &str = "status";

/// Execution environment of a task
#[derive(Clone)]
pub struct Target {
    pub host: Option<SshConfig>,
    pub remote: Arc<dyn Remote>,
    pub options: ExecOptions,
}

impl Target {
    pub fn new(host: Option<SshConfig>, remote: Arc<dyn Remote>, options: ExecOptions) -> Self {
        Self {
            host,
            remote,
            options,
        }
    }

    pub fn engine(&self) -> &str {
        &self.options.engine
    }

    pub fn exec(&self, command: &str) -> Result<String> {
        self.remote.execute(self.host.as_ref(), command, &self.options)
    }

    pub fn upload(&self, local: &Path, remote: &str) -> Result<()> {
        self.remote
            .upload(self.host.as_ref(), local, remote, &self.options)
            .with_context(|| format!("upload to {remote} failed"))
    }

    pub fn download(&self, remote: &str, local: &Path) -> Result<()> {
        self.remote
            .download(self.host.as_ref(), remote, local, &self.options)
            .with_context(|| format!("download of {remote} failed"))
    }
}

impl std::fmt::Debug for Target {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Target")
            .field("host", &self.host.as_ref().map(|h| &h.hostname))
            .field("options", &self.options)
            .finish_non_exhaustive()
    }
}

/// A container known up front or produced by an earlier step
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ContainerRef {
    Id(String),
    Slot(&'static str),
}

impl ContainerRef {
    pub fn resolve(&self, ctx: &StepContext<'_, Target>) -> Result<String> {
        match self {
            Self::Id(id) => Ok(id.clone()),
            Self::Slot(slot) => ctx.require(slot).map(str::to_string),
        }
    }
}

impl From<&str> for ContainerRef {
    fn from(id: &str) -> Self {
        Self::Id(id.to_string())
    }
}

/// Scratch path on the remote host
pub fn remote_temp_path() -> String {
    format!("/tmp/stackadm-{}", uuid::Uuid::new_v4().simple())
}
