//! `stackadm config`: cluster topology and application settings

use anyhow::{Context as _, Result};
use std::fs;
use std::path::Path;

use super::{cluster, confirm};
use crate::Context;
use crate::config::AppConfig;
use crate::paths;
use crate::session::open_registry;
use crate::ui;

/// Print the topology of the checked out cluster
pub fn show(ctx: &Context) -> Result<()> {
    let registry = open_registry()?;
    let cluster = registry.current_cluster()?;
    if !ctx.quiet {
        ui::dim(&format!("# cluster: {}", cluster.name));
    }
    print!("{}", cluster.topology);
    if !cluster.topology.ends_with('\n') {
        println!();
    }
    Ok(())
}

/// Replace the topology of the checked out cluster
///
/// Service ids depend only on the cluster uuid and instance ids, so services
/// kept by the new topology stay bound to their containers.
pub fn commit(ctx: &Context, file: &Path, yes: bool) -> Result<()> {
    let registry = open_registry()?;
    let cluster = registry.current_cluster()?;
    let path = paths::expand(&file.to_string_lossy());
    let text = fs::read_to_string(&path)
        .with_context(|| format!("Could not read topology {}", paths::display(&path)))?;
    let services = cluster::validate(&text)
        .with_context(|| format!("Invalid topology {}", paths::display(&path)))?;

    if text == cluster.topology {
        if !ctx.quiet {
            ui::info("Topology unchanged");
        }
        return Ok(());
    }
    confirm(
        &format!("Replace the topology of cluster '{}'?", cluster.name),
        yes,
    )?;
    registry.update_topology(cluster.id, &text)?;
    if !ctx.quiet {
        ui::success(&format!(
            "Topology of '{}' updated ({services} services)",
            cluster.name
        ));
        ui::dim("Run `stackadm reload` to apply configuration changes");
    }
    Ok(())
}

/// Write `stackadm.toml` with default settings, keeping an existing file
pub fn init(ctx: &Context) -> Result<()> {
    let path = paths::config_file()?;
    if path.exists() {
        ui::warn(&format!("{} already exists", paths::display(&path)));
        return Ok(());
    }
    AppConfig::default().save_to(&path)?;
    if !ctx.quiet {
        ui::success(&format!("Wrote {}", paths::display(&path)));
    }
    Ok(())
}

/// Print the effective application settings
pub fn settings() -> Result<()> {
    let path = paths::config_file()?;
    let config = AppConfig::load_from(&path)?;

    ui::header("Settings");
    ui::kv("file", &paths::display(&path));
    ui::kv("jobs", &config.jobs.to_string());
    ui::kv("engine", &config.engine);
    let sudo = if config.sudo { config.sudo_alias.as_str() } else { "off" };
    ui::kv("sudo", sudo);
    ui::kv("connect timeout", &format!("{}s", config.connect_timeout));
    ui::kv("command timeout", &format!("{}s", config.command_timeout));
    Ok(())
}
