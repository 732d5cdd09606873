//! `stackadm start|stop|restart|reload|clean`

use anyhow::{Result, bail};
use playbook::Options;
use topology::Filter;

use super::{build_playbook, confirm, open_session, run_playbook, select};
use crate::Context;
use crate::tasks::{self, CLEAN_ITEMS, OPT_ONLY, Op};
use crate::ui;

/// Which lifecycle command is running
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Action {
    Start,
    Stop,
    Restart,
    Reload,
    Clean,
}

impl Action {
    fn ops(self) -> &'static [Op] {
        match self {
            Self::Start => &[Op::StartService],
            Self::Stop => &[Op::StopService],
            Self::Restart => &[Op::RestartService],
            Self::Reload => &[Op::SyncConfig, Op::RestartService],
            Self::Clean => &[Op::CleanService],
        }
    }

    fn verb(self) -> &'static str {
        match self {
            Self::Start => "start",
            Self::Stop => "stop",
            Self::Restart => "restart",
            Self::Reload => "reload",
            Self::Clean => "clean",
        }
    }

    /// Whether the user must agree before the action runs
    fn needs_confirm(self) -> bool {
        matches!(self, Self::Stop | Self::Restart | Self::Clean)
    }
}

/// Validate `--only`, an empty list meaning every item
fn clean_items(only: &[String]) -> Result<Vec<String>> {
    if only.is_empty() {
        return Ok(CLEAN_ITEMS.iter().map(ToString::to_string).collect());
    }
    for item in only {
        if !CLEAN_ITEMS.contains(&item.as_str()) {
            bail!(
                "Unknown clean item '{item}' (expected {})",
                CLEAN_ITEMS.join(", ")
            );
        }
    }
    Ok(only.to_vec())
}

fn prompt(action: Action, services: usize, only: &[String]) -> String {
    match action {
        Action::Clean => format!(
            "Clean {} of {services} service(s)? This cannot be undone",
            only.join(", ")
        ),
        _ => format!("{} {services} service(s)?", capitalize(action.verb())),
    }
}

fn capitalize(word: &str) -> String {
    let mut chars = word.chars();
    chars.next().map_or_else(String::new, |c| {
        c.to_uppercase().chain(chars).collect()
    })
}

pub fn run(
    ctx: &Context,
    action: Action,
    filter: &Filter,
    jobs: Option<usize>,
    yes: bool,
    only: &[String],
) -> Result<()> {
    let only = if action == Action::Clean {
        clean_items(only)?
    } else {
        Vec::new()
    };

    let session = open_session(jobs)?;
    let instances = select(&session, session.instances()?, filter);
    if instances.is_empty() {
        bail!(
            "No service matches id={} role={} host={}",
            filter.id,
            filter.role,
            filter.host
        );
    }
    log::debug!("{}: {} service(s) selected", action.verb(), instances.len());

    if action.needs_confirm() {
        confirm(&prompt(action, instances.len(), &only), yes)?;
    }

    let mut options = Options::new();
    if !only.is_empty() {
        options.set(OPT_ONLY, only);
    }
    let compiler = tasks::compiler(&session);
    let playbook = build_playbook(&session, action.ops(), &instances, &options);
    run_playbook(ctx, &compiler, playbook)?;

    if !ctx.quiet {
        ui::success(&format!(
            "{} {} service(s) of '{}'",
            capitalize(action.verb()),
            instances.len(),
            session.cluster.name
        ));
    }
    Ok(())
}
