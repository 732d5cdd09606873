//! Application config (`stackadm.toml`)

use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::Path;

use crate::paths;

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct AppConfig {
    /// Tasks run at once in each phase
    pub jobs: usize,
    /// Container engine binary on the hosts
    pub engine: String,
    /// Prefix remote commands with `sudo_alias`
    pub sudo: bool,
    pub sudo_alias: String,
    /// SSH connect timeout in seconds
    pub connect_timeout: u64,
    /// Remote command timeout in seconds, 0 disables it
    pub command_timeout: u64,
}

impl Default for AppConfig {
    fn default() -> Self {
        Self {
            jobs: playbook::DEFAULT_CONCURRENCY,
            engine: "docker".to_string(),
            sudo: true,
            sudo_alias: "sudo".to_string(),
            connect_timeout: 10,
            command_timeout: 180,
        }
    }
}

impl AppConfig {
    /// Load `stackadm.toml`, falling back to defaults when it does not exist
    pub fn load() -> Result<Self> {
        let path = paths::config_file()?;
        Self::load_from(&path)
    }

    pub fn load_from(path: &Path) -> Result<Self> {
        if !path.exists() {
            log::debug!("No config at {}, using defaults", path.display());
            return Ok(Self::default());
        }
        let content = fs::read_to_string(path)
            .with_context(|| format!("Could not read {}", path.display()))?;
        toml::from_str(&content).with_context(|| format!("Invalid config {}", path.display()))
    }

    pub fn save_to(&self, path: &Path) -> Result<()> {
        if let Some(dir) = path.parent() {
            fs::create_dir_all(dir)?;
        }
        let content = toml::to_string_pretty(self)?;
        fs::write(path, content).with_context(|| format!("Could not write {}", path.display()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[test]
    fn test_missing_file_gives_defaults() {
        let tmp = TempDir::new().unwrap();
        let config = AppConfig::load_from(&tmp.path().join("stackadm.toml")).unwrap();
        assert_eq!(config, AppConfig::default());
        assert_eq!(config.jobs, 10);
    }

    #[test]
    fn test_partial_file_keeps_defaults() {
        let tmp = TempDir::new().unwrap();
        let path = tmp.path().join("stackadm.toml");
        fs::write(&path, "engine = \"podman\"\ncommand_timeout = 0\n").unwrap();

        let config = AppConfig::load_from(&path).unwrap();
        assert_eq!(config.engine, "podman");
        assert_eq!(config.command_timeout, 0);
        assert_eq!(config.sudo_alias, "sudo");
    }

    #[test]
    fn test_save_and_load() {
        let tmp = TempDir::new().unwrap();
        let path = tmp.path().join("nested").join("stackadm.toml");
        let config = AppConfig {
            jobs: 4,
            sudo: false,
            ..Default::default()
        };
        config.save_to(&path).unwrap();
        assert_eq!(AppConfig::load_from(&path).unwrap(), config);
    }

    #[test]
    fn test_invalid_file() {
        let tmp = TempDir::new().unwrap();
        let path = tmp.path().join("stackadm.toml");
        fs::write(&path, "jobs = \"many\"").unwrap();
        assert!(AppConfig::load_from(&path).is_err());
    }
}
