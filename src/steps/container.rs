//! Container engine steps

use anyhow::{Result, bail};
use playbook::{Outcome, Step, StepContext};
use std::time::Duration;

use super::{ContainerRef, SLOT_CONTAINER_ID, SLOT_STATUS, Target};
use crate::remote::shell_quote;

/// Everything `<engine> create` needs
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ContainerSpec {
    pub image: String,
    pub name: String,
    pub hostname: String,
    pub command: String,
    pub envs: Vec<String>,
    pub add_hosts: Vec<String>,
    /// (host path, container path)
    pub volumes: Vec<(String, String)>,
    pub ulimits: Vec<String>,
    pub restart: String,
    pub privileged: bool,
    pub init: bool,
}

impl ContainerSpec {
    pub fn create_command(&self, engine: &str) -> String {
        let mut cmd = vec![engine.to_string(), "create".to_string()];
        if self.init {
            cmd.push("--init".to_string());
        }
        if self.privileged {
            cmd.push("--privileged".to_string());
        }
        cmd.push("--network host".to_string());
        if !self.name.is_empty() {
            cmd.push(format!("--name {}", shell_quote(&self.name)));
        }
        if !self.hostname.is_empty() {
            cmd.push(format!("--hostname {}", shell_quote(&self.hostname)));
        }
        for host in &self.add_hosts {
            cmd.push(format!("--add-host {}", shell_quote(host)));
        }
        for env in &self.envs {
            cmd.push(format!("--env {}", shell_quote(env)));
        }
        for (host_path, container_path) in &self.volumes {
            cmd.push(format!("--volume {}", shell_quote(&format!("{host_path}:{container_path}"))));
        }
        for ulimit in &self.ulimits {
            cmd.push(format!("--ulimit {ulimit}"));
        }
        if !self.restart.is_empty() {
            cmd.push(format!("--restart {}", self.restart));
        }
        cmd.push(shell_quote(&self.image));
        if !self.command.is_empty() {
            cmd.push(self.command.clone());
        }
        cmd.join(" ")
    }
}

pub struct PullImage {
    pub image: String,
}

impl Step<Target> for PullImage {
    fn name(&self) -> &str {
        "pull image"
    }

    fn execute(&self, ctx: &mut StepContext<'_, Target>) -> Outcome {
        let target = ctx.env();
        let cmd = format!("{} pull {}", target.engine(), shell_quote(&self.image));
        target.exec(&cmd).map(drop).into()
    }
}

/// Creates the container and stores its id in [`SLOT_CONTAINER_ID`]
pub struct CreateContainer {
    pub spec: ContainerSpec,
}

impl Step<Target> for CreateContainer {
    fn name(&self) -> &str {
        "create container"
    }

    fn execute(&self, ctx: &mut StepContext<'_, Target>) -> Outcome {
        let target = ctx.env();
        let out = match target.exec(&self.spec.create_command(target.engine())) {
            Ok(out) => out,
            Err(e) => return Outcome::Fail(e),
        };
        // the engine may print pull progress before the id
        match out.lines().last().map(str::trim) {
            Some(id) if !id.is_empty() => {
                ctx.set(SLOT_CONTAINER_ID, id);
                Outcome::Done
            }
            _ => Outcome::Fail(anyhow::anyhow!("container engine returned no container id")),
        }
    }
}

/// Which lifecycle command to send
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Lifecycle {
    Start,
    Stop,
    Restart,
    Remove,
}

impl Lifecycle {
    fn verb(self) -> &'static str {
        match self {
            Self::Start => "start",
            Self::Stop => "stop",
            Self::Restart => "restart",
            Self::Remove => "rm",
        }
    }
}

pub struct ContainerLifecycle {
    pub action: Lifecycle,
    pub container: ContainerRef,
}

impl ContainerLifecycle {
    pub fn new(action: Lifecycle, container: impl Into<ContainerRef>) -> Self {
        Self {
            action,
            container: container.into(),
        }
    }
}

impl Step<Target> for ContainerLifecycle {
    fn name(&self) -> &str {
        match self.action {
            Lifecycle::Start => "start container",
            Lifecycle::Stop => "stop container",
            Lifecycle::Restart => "restart container",
            Lifecycle::Remove => "remove container",
        }
    }

    fn execute(&self, ctx: &mut StepContext<'_, Target>) -> Outcome {
        let run = || -> Result<()> {
            let id = self.container.resolve(ctx)?;
            let target = ctx.env();
            target.exec(&format!("{} {} {}", target.engine(), self.action.verb(), id))?;
            Ok(())
        };
        run().into()
    }
}

/// Fails unless the container exists (running or not)
pub struct CheckContainerExists {
    pub container: ContainerRef,
    /// `host=.. role=..` used in the error
    pub description: String,
}

impl Step<Target> for CheckContainerExists {
    fn name(&self) -> &str {
        "check container exists"
    }

    fn execute(&self, ctx: &mut StepContext<'_, Target>) -> Outcome {
        let run = || -> Result<()> {
            let id = self.container.resolve(ctx)?;
            let target = ctx.env();
            let out = target.exec(&format!(
                "{} ps --all --filter id={} --format '{{{{.ID}}}}'",
                target.engine(),
                id
            ))?;
            if out.trim().is_empty() {
                bail!("container {} not found ({})", short_id(&id), self.description);
            }
            Ok(())
        };
        run().into()
    }
}

/// Stores the `ps` status line (e.g. `Up 3 hours`) in [`SLOT_STATUS`]
///
/// A container that no longer exists yields an empty status.
pub struct ContainerStatus {
    pub container: ContainerRef,
}

impl Step<Target> for ContainerStatus {
    fn name(&self) -> &str {
        "container status"
    }

    fn execute(&self, ctx: &mut StepContext<'_, Target>) -> Outcome {
        let status = self.container.resolve(ctx).and_then(|id| {
            let target = ctx.env();
            target.exec(&format!(
                "{} ps --all --filter id={} --format '{{{{.Status}}}}'",
                target.engine(),
                id
            ))
        });
        match status {
            Ok(status) => {
                ctx.set(SLOT_STATUS, status.trim());
                Outcome::Done
            }
            Err(e) => Outcome::Fail(e),
        }
    }
}

/// Polls until the container reports `running`
pub struct WaitRunning {
    pub container: ContainerRef,
    pub attempts: usize,
    pub interval: Duration,
}

impl Step<Target> for WaitRunning {
    fn name(&self) -> &str {
        "wait container running"
    }

    fn execute(&self, ctx: &mut StepContext<'_, Target>) -> Outcome {
        let run = || -> Result<()> {
            let id = self.container.resolve(ctx)?;
            let target = ctx.env();
            let cmd = format!(
                "{} inspect --format '{{{{.State.Status}}}}' {}",
                target.engine(),
                id
            );
            let mut last = String::new();
            for attempt in 0..self.attempts.max(1) {
                if attempt > 0 {
                    std::thread::sleep(self.interval);
                }
                last = target.exec(&cmd)?;
                if last.trim() == "running" {
                    return Ok(());
                }
            }
            bail!("container {} is {}, not running", short_id(&id), last.trim());
        };
        run().into()
    }
}

/// Runs a command inside the container, optionally keeping stdout in a slot
pub struct ContainerExec {
    pub container: ContainerRef,
    pub command: String,
    pub out: Option<&'static str>,
}

impl Step<Target> for ContainerExec {
    fn name(&self) -> &str {
        "exec in container"
    }

    fn execute(&self, ctx: &mut StepContext<'_, Target>) -> Outcome {
        let out = self.container.resolve(ctx).and_then(|id| {
            let target = ctx.env();
            target.exec(&format!(
                "{} exec {} /bin/bash -c {}",
                target.engine(),
                id,
                shell_quote(&self.command)
            ))
        });
        match (out, self.out) {
            (Ok(out), Some(slot)) => {
                ctx.set(slot, out);
                Outcome::Done
            }
            (Ok(_), None) => Outcome::Done,
            (Err(e), _) => Outcome::Fail(e),
        }
    }
}

/// First 12 characters of a container id
pub fn short_id(id: &str) -> &str {
    id.get(..12).unwrap_or(id)
}
