// Cluster bookkeeping
pub mod cluster;
pub mod config;
pub mod hosts;

// Playbook driven commands
pub mod deploy;
pub mod lifecycle;
pub mod status;

use anyhow::{Context as _, Result};
use playbook::{
    AutoConfirm, Compiler, ConfirmCallback, ExecPolicy, Options, Playbook, PlaybookStep,
    RunSummary,
};
use std::sync::Arc;
use thiserror::Error;
use topology::{Filter, ServiceInstance};

use crate::Context;
use crate::config::AppConfig;
use crate::progress::TerminalProgress;
use crate::session::Session;
use crate::steps::Target;
use crate::tasks::Op;
use crate::ui;

/// Outcomes that are not failures but still end a command early
#[derive(Debug, Error)]
pub enum CommandError {
    #[error("operation cancelled")]
    Cancelled,
}

/// Asks on the terminal
pub struct TerminalConfirm;

impl ConfirmCallback for TerminalConfirm {
    fn confirm(&mut self, prompt: &str) -> Result<bool> {
        dialoguer::Confirm::new()
            .with_prompt(prompt)
            .default(false)
            .interact()
            .context("Failed to read confirmation")
    }
}

/// Ask before a destructive operation, `yes` answers for the user
pub fn confirm(prompt: &str, yes: bool) -> Result<()> {
    let mut callback: Box<dyn ConfirmCallback> = if yes {
        Box::new(AutoConfirm)
    } else {
        Box::new(TerminalConfirm)
    };
    if callback.confirm(prompt)? {
        Ok(())
    } else {
        Err(CommandError::Cancelled.into())
    }
}

/// Session on the checked out cluster, `jobs` overriding the configured width
pub fn open_session(jobs: Option<usize>) -> Result<Arc<Session>> {
    let config = AppConfig::load()?;
    let mut session = Session::open(&config)?;
    if let Some(jobs) = jobs {
        session.jobs = jobs;
    }
    Ok(Arc::new(session))
}

/// Instances picked by `--id/--role/--host`
pub fn select(
    session: &Session,
    instances: Vec<Arc<ServiceInstance>>,
    filter: &Filter,
) -> Vec<Arc<ServiceInstance>> {
    instances
        .into_iter()
        .filter(|dc| filter.matches(dc, &session.service_id(dc.id())))
        .collect()
}

/// One playbook step per operation
///
/// Operations bound to a role only see that role's instances, and single
/// instance operations keep the first of them.
pub fn build_playbook(
    session: &Session,
    ops: &[Op],
    instances: &[Arc<ServiceInstance>],
    options: &Options,
) -> Playbook<Op, Arc<ServiceInstance>> {
    let policy = ExecPolicy {
        concurrency: session.jobs,
        ..Default::default()
    };
    let mut playbook = Playbook::new();
    for &op in ops {
        let mut targets: Vec<_> = match op.role() {
            Some(role) => instances
                .iter()
                .filter(|dc| dc.role() == role)
                .cloned()
                .collect(),
            None => instances.to_vec(),
        };
        if op.single() {
            targets.truncate(1);
        }
        playbook.add_step(
            PlaybookStep::new(op, targets)
                .with_options(options.clone())
                .with_policy(policy),
        );
    }
    playbook
}

/// Run a playbook with phase bars and print a summary line
pub fn run_playbook(
    ctx: &Context,
    compiler: &Compiler<Op, Arc<ServiceInstance>, Target>,
    playbook: Playbook<Op, Arc<ServiceInstance>>,
) -> Result<RunSummary> {
    let progress = TerminalProgress::new(ctx.quiet);
    let summary = playbook.run(compiler, &progress)?;
    if !ctx.quiet {
        ui::print_run_summary(&summary);
    }
    Ok(summary)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::remote::fake::FakeRemote;
    use crate::session::testing;
    use topology::Role;

    const TOPOLOGY: &str = "
kind: dingofs
etcd_services:
  deploy:
    - host: h1
      instances: 3
mds_services:
  deploy:
    - host: h1
    - host: h2
";

    #[test]
    fn test_confirm_with_yes() {
        assert!(confirm("Stop?", true).is_ok());
    }

    #[test]
    fn test_select_by_role_and_host() {
        let remote = Arc::new(FakeRemote::new());
        let session = testing::session(TOPOLOGY, &remote);
        let dcs = session.instances().unwrap();

        let mds = select(&session, dcs.clone(), &Filter::new("*", "mds", "*"));
        assert_eq!(mds.len(), 2);
        let h2 = select(&session, dcs.clone(), &Filter::new("*", "*", "h2"));
        assert_eq!(h2.len(), 1);
        assert_eq!(h2[0].role(), Role::Mds);

        let sid = session.service_id("etcd_h1_1");
        let by_sid = select(&session, dcs, &Filter::new(sid, "*", "*"));
        assert_eq!(by_sid.len(), 1);
        assert_eq!(by_sid[0].id(), "etcd_h1_1");
    }

    #[test]
    fn test_build_playbook_targets() {
        let remote = Arc::new(FakeRemote::new());
        let mut session = testing::session(TOPOLOGY, &remote);
        session.jobs = 4;
        let dcs = session.instances().unwrap();
        let ops = [
            Op::StartRole(Role::Etcd),
            Op::EnableEtcdAuth,
            Op::StartService,
        ];

        let playbook = build_playbook(&session, &ops, &dcs, &Options::new());
        let steps = playbook.steps();
        assert_eq!(steps.len(), 3);
        assert_eq!(steps[0].targets.len(), 3);
        assert_eq!(steps[1].targets.len(), 1);
        assert_eq!(steps[1].targets[0].id(), "etcd_h1_0");
        assert_eq!(steps[2].targets.len(), 5);
        assert_eq!(steps[2].policy.concurrency, 4);
    }
}
