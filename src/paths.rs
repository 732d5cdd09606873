//! Centralized path resolution for stackadm
//!
//! # Environment Variables
//!
//! - `STACKADM_CONFIG_DIR` - Override config directory (holds `stackadm.toml`)
//! - `STACKADM_DATA_DIR` - Override data directory (registry database, hosts inventory)
//!
//! # Path Resolution Priority
//!
//! For config_dir():
//! 1. `STACKADM_CONFIG_DIR` environment variable
//! 2. `XDG_CONFIG_HOME/stackadm` (if set)
//! 3. `~/.config/stackadm`
//!
//! For data_dir():
//! 1. `STACKADM_DATA_DIR` environment variable
//! 2. `XDG_DATA_HOME/stackadm` (if set)
//! 3. `~/.local/share/stackadm`

use anyhow::{Context, Result};
use std::path::{Path, PathBuf};

/// Environment variable for config directory override
pub const ENV_CONFIG_DIR: &str = "STACKADM_CONFIG_DIR";

/// Environment variable for data directory override
pub const ENV_DATA_DIR: &str = "STACKADM_DATA_DIR";

const APP_DIR: &str = "stackadm";

/// Get the stackadm config directory path
pub fn config_dir() -> Result<PathBuf> {
    resolve_dir(
        ENV_CONFIG_DIR,
        "XDG_CONFIG_HOME",
        &[".config"],
        &|key: &str| std::env::var(key).ok(),
    )
}

/// Get the stackadm data directory path
pub fn data_dir() -> Result<PathBuf> {
    resolve_dir(
        ENV_DATA_DIR,
        "XDG_DATA_HOME",
        &[".local", "share"],
        &|key: &str| std::env::var(key).ok(),
    )
}

/// Application config file
pub fn config_file() -> Result<PathBuf> {
    Ok(config_dir()?.join("stackadm.toml"))
}

/// SQLite registry of clusters and services
pub fn registry_db() -> Result<PathBuf> {
    Ok(data_dir()?.join("stackadm.db"))
}

/// Committed hosts inventory
pub fn hosts_file() -> Result<PathBuf> {
    Ok(data_dir()?.join("hosts.yaml"))
}

fn resolve_dir(
    override_var: &str,
    xdg_var: &str,
    home_default: &[&str],
    env: &dyn Fn(&str) -> Option<String>,
) -> Result<PathBuf> {
    if let Some(dir) = env(override_var) {
        let path = expand(&dir);
        log::debug!("Using dir from {}: {}", override_var, path.display());
        return Ok(path);
    }

    if let Some(xdg) = env(xdg_var) {
        let path = PathBuf::from(xdg).join(APP_DIR);
        log::debug!("Using {}: {}", xdg_var, path.display());
        return Ok(path);
    }

    let home = dirs::home_dir().context("Could not determine home directory")?;
    let path = home_default
        .iter()
        .fold(home, |p, part| p.join(part))
        .join(APP_DIR);
    log::debug!("Using default dir: {}", path.display());
    Ok(path)
}

/// Expand ~ and environment variables in a path string.
pub fn expand(path: &str) -> PathBuf {
    let expanded = shellexpand::full(path).unwrap_or(std::borrow::Cow::Borrowed(path));
    PathBuf::from(expanded.as_ref())
}

/// Display a path relative to home as `~/...`
pub fn display(path: &Path) -> String {
    match dirs::home_dir().and_then(|home| path.strip_prefix(home).ok().map(Path::to_path_buf)) {
        Some(rel) => format!("~/{}", rel.display()),
        None => path.display().to_string(),
    }
}

// ============================================================================
// Tests
// ============================================================================

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    fn lookup(vars: &[(&str, &str)]) -> impl Fn(&str) -> Option<String> {
        let vars: HashMap<String, String> = vars
            .iter()
            .map(|(k, v)| ((*k).to_string(), (*v).to_string()))
            .collect();
        move |key| vars.get(key).cloned()
    }

    #[test]
    fn test_override_wins() {
        let env = lookup(&[
            (ENV_DATA_DIR, "/custom/data"),
            ("XDG_DATA_HOME", "/xdg"),
        ]);
        let dir = resolve_dir(ENV_DATA_DIR, "XDG_DATA_HOME", &[".local", "share"], &env).unwrap();
        assert_eq!(dir, PathBuf::from("/custom/data"));
    }

    #[test]
    fn test_override_with_tilde() {
        let home = dirs::home_dir().unwrap();
        let env = lookup(&[(ENV_CONFIG_DIR, "~/dotfiles/stackadm")]);
        let dir = resolve_dir(ENV_CONFIG_DIR, "XDG_CONFIG_HOME", &[".config"], &env).unwrap();
        assert_eq!(dir, home.join("dotfiles").join("stackadm"));
    }

    #[test]
    fn test_xdg_fallback() {
        let env = lookup(&[("XDG_CONFIG_HOME", "/tmp/xdg-config")]);
        let dir = resolve_dir(ENV_CONFIG_DIR, "XDG_CONFIG_HOME", &[".config"], &env).unwrap();
        assert_eq!(dir, PathBuf::from("/tmp/xdg-config/stackadm"));
    }

    #[test]
    fn test_home_default() {
        let env = lookup(&[]);
        let dir = resolve_dir(ENV_DATA_DIR, "XDG_DATA_HOME", &[".local", "share"], &env).unwrap();
        let home = dirs::home_dir().unwrap();
        assert_eq!(dir, home.join(".local").join("share").join("stackadm"));
    }

    #[test]
    fn test_expand_absolute() {
        assert_eq!(expand("/absolute/path"), PathBuf::from("/absolute/path"));
    }

    #[test]
    fn test_expand_unknown_env_var_unchanged() {
        let result = expand("/path/$NONEXISTENT_VAR_12345/file");
        assert_eq!(result, PathBuf::from("/path/$NONEXISTENT_VAR_12345/file"));
    }

    #[test]
    fn test_display_home_relative() {
        let home = dirs::home_dir().unwrap();
        assert_eq!(display(&home.join(".ssh").join("id_rsa")), "~/.ssh/id_rsa");
        assert_eq!(display(Path::new("/etc/hosts")), "/etc/hosts");
    }
}
