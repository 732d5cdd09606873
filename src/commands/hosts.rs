//! `stackadm hosts`: the SSH inventory

use anyhow::{Context as _, Result};
use colored::Colorize;
use std::fs;
use std::path::Path;

use crate::Context;
use crate::hosts::Hosts;
use crate::paths;
use crate::ui;

pub fn commit(ctx: &Context, file: &Path) -> Result<()> {
    let path = paths::expand(&file.to_string_lossy());
    let text = fs::read_to_string(&path)
        .with_context(|| format!("Could not read {}", paths::display(&path)))?;
    let target = paths::hosts_file()?;
    let hosts = Hosts::commit(&text, &target)?;
    log::info!("Committed {} host(s) to {}", hosts.len(), target.display());

    if !ctx.quiet {
        ui::success(&format!("Hosts committed ({} hosts)", hosts.len()));
    }
    Ok(())
}

pub fn show(ctx: &Context, raw: bool) -> Result<()> {
    let hosts = Hosts::load()?;
    if raw {
        print!("{}", hosts.text());
        return Ok(());
    }
    if hosts.is_empty() {
        if !ctx.quiet {
            ui::info("No hosts committed, services run on the local machine");
        }
        return Ok(());
    }

    ui::header("Hosts");
    for hc in hosts.iter() {
        let ssh = &hc.ssh;
        println!(
            "  {:<20} {}@{}:{}",
            hc.host.bold(),
            ssh.user,
            ssh.hostname,
            ssh.port
        );
        if ctx.verbose > 0 {
            ui::kv("private key", &paths::display(&ssh.private_key));
            if let Some(user) = &ssh.become_user {
                ui::kv("become", user);
            }
        }
    }
    Ok(())
}
