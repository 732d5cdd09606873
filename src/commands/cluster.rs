//! `stackadm cluster`: registering and selecting clusters

use anyhow::{Context as _, Result, bail};
use colored::Colorize;
use registry::Registry;
use std::fs;
use std::path::Path;

use super::confirm;
use crate::Context;
use crate::paths;
use crate::session::open_registry;
use crate::ui;

/// Parse a topology once so a broken file never reaches the registry
pub fn validate(text: &str) -> Result<usize> {
    let instances = topology::parse_topology(text, topology::Context::new())?;
    if instances.is_empty() {
        bail!("Topology declares no services");
    }
    Ok(instances.len())
}

pub fn add(
    ctx: &Context,
    name: &str,
    file: &Path,
    description: Option<&str>,
    checkout: bool,
) -> Result<()> {
    let registry = open_registry()?;
    add_to(ctx, &registry, name, file, description, checkout)
}

fn add_to(
    ctx: &Context,
    registry: &Registry,
    name: &str,
    file: &Path,
    description: Option<&str>,
    checkout: bool,
) -> Result<()> {
    let path = paths::expand(&file.to_string_lossy());
    let text = fs::read_to_string(&path)
        .with_context(|| format!("Could not read topology {}", paths::display(&path)))?;
    let services = validate(&text)
        .with_context(|| format!("Invalid topology {}", paths::display(&path)))?;

    let uuid = uuid::Uuid::new_v4().simple().to_string();
    registry.insert_cluster(name, &uuid, description.unwrap_or_default(), &text)?;
    log::info!("Registered cluster {name} ({uuid})");

    if checkout {
        registry.checkout_cluster(name)?;
    }
    if !ctx.quiet {
        ui::success(&format!("Cluster '{name}' added ({services} services)"));
        if checkout {
            ui::dim(&format!("Switched to cluster '{name}'"));
        }
    }
    Ok(())
}

pub fn checkout(ctx: &Context, name: &str) -> Result<()> {
    let registry = open_registry()?;
    registry.checkout_cluster(name)?;
    if !ctx.quiet {
        ui::success(&format!("Switched to cluster '{name}'"));
    }
    Ok(())
}

pub fn list(ctx: &Context, verbose: bool) -> Result<()> {
    let registry = open_registry()?;
    let clusters = registry.list_clusters()?;
    if clusters.is_empty() {
        if !ctx.quiet {
            ui::info("No clusters yet, add one with `stackadm cluster add`");
        }
        return Ok(());
    }

    ui::header("Clusters");
    for cluster in &clusters {
        let marker = if cluster.current { "*".green().bold() } else { " ".normal() };
        let name = if cluster.current {
            cluster.name.green().bold()
        } else {
            cluster.name.normal()
        };
        println!(
            "{marker} {name:<24} {}",
            cluster
                .created_at
                .with_timezone(&chrono::Local)
                .format("%Y-%m-%d %H:%M:%S")
                .to_string()
                .dimmed()
        );
        if verbose {
            ui::kv("uuid", &cluster.uuid);
            if !cluster.description.is_empty() {
                ui::kv("description", &cluster.description);
            }
        }
    }
    Ok(())
}

pub fn remove(ctx: &Context, name: &str, yes: bool) -> Result<()> {
    let registry = open_registry()?;
    if registry.get_cluster(name)?.is_none() {
        bail!(registry::Error::ClusterNotFound(name.to_string()));
    }
    confirm(
        &format!("Remove cluster '{name}' and its service records?"),
        yes,
    )?;
    registry.delete_cluster(name)?;
    if !ctx.quiet {
        ui::success(&format!("Cluster '{name}' removed"));
        ui::dim("Containers on the hosts are left untouched, run `stackadm clean` first to remove them");
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    const TOPOLOGY: &str = "
kind: dingo-store
coordinator_services:
  deploy:
    - host: h1
      instances: 3
";

    fn quiet() -> Context {
        Context {
            verbose: 0,
            quiet: true,
        }
    }

    #[test]
    fn test_validate() {
        assert_eq!(validate(TOPOLOGY).unwrap(), 3);
        assert!(validate("kind: cassandra\n").is_err());
        assert!(validate("kind: dingo-store\n").is_err());
    }

    #[test]
    fn test_add_and_checkout() {
        let tmp = TempDir::new().unwrap();
        let file = tmp.path().join("topology.yaml");
        fs::write(&file, TOPOLOGY).unwrap();
        let registry = Registry::open_in_memory().unwrap();

        add_to(&quiet(), &registry, "c1", &file, Some("first"), true).unwrap();
        let current = registry.current_cluster().unwrap();
        assert_eq!(current.name, "c1");
        assert_eq!(current.description, "first");
        assert_eq!(current.uuid.len(), 32);
        assert_eq!(current.topology, TOPOLOGY);

        let dup = add_to(&quiet(), &registry, "c1", &file, None, false);
        assert!(dup.is_err());
    }

    #[test]
    fn test_add_rejects_bad_topology() {
        let tmp = TempDir::new().unwrap();
        let file = tmp.path().join("topology.yaml");
        fs::write(&file, "kind: dingo-store\nstore_services: 3\n").unwrap();
        let registry = Registry::open_in_memory().unwrap();

        assert!(add_to(&quiet(), &registry, "c1", &file, None, false).is_err());
        assert!(registry.list_clusters().unwrap().is_empty());
    }
}
