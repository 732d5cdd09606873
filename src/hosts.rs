//! Hosts inventory
//!
//! The inventory maps the host names used in a topology to SSH endpoints:
//!
//! ```yaml
//! global:
//!   user: dingo
//!   ssh_port: 22
//!   private_key_file: ~/.ssh/id_rsa
//! hosts:
//!   - host: server-1
//!     hostname: 10.0.1.1
//!   - host: server-2
//!     hostname: 10.0.1.2
//!     ssh_port: 2222
//! ```

use anyhow::{Context, Result, bail};
use serde::Deserialize;
use std::collections::{BTreeMap, HashMap};
use std::fs;
use std::path::{Path, PathBuf};

use crate::paths;

const DEFAULT_SSH_PORT: u16 = 22;
const DEFAULT_PRIVATE_KEY: &str = "~/.ssh/id_rsa";

#[derive(Debug, Default, Deserialize)]
#[serde(deny_unknown_fields)]
struct RawFields {
    user: Option<String>,
    ssh_port: Option<u16>,
    private_key_file: Option<String>,
    become_user: Option<String>,
}

#[derive(Debug, Deserialize)]
#[serde(deny_unknown_fields)]
struct RawHost {
    host: String,
    hostname: String,
    user: Option<String>,
    ssh_port: Option<u16>,
    private_key_file: Option<String>,
    become_user: Option<String>,
}

#[derive(Debug, Default, Deserialize)]
#[serde(deny_unknown_fields)]
struct RawInventory {
    #[serde(default)]
    global: RawFields,
    #[serde(default)]
    hosts: Vec<RawHost>,
}

/// How to reach one host
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SshConfig {
    pub user: String,
    pub hostname: String,
    pub port: u16,
    pub private_key: PathBuf,
    /// Run remote commands as this user through `sudo -iu`
    pub become_user: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct HostConfig {
    pub host: String,
    pub ssh: SshConfig,
}

/// Parsed inventory plus the text it came from
#[derive(Debug, Clone, Default)]
pub struct Hosts {
    text: String,
    hosts: BTreeMap<String, HostConfig>,
}

impl Hosts {
    pub fn parse(text: &str) -> Result<Self> {
        let raw: RawInventory = if text.trim().is_empty() {
            RawInventory::default()
        } else {
            serde_yaml::from_str(text).context("Invalid hosts inventory")?
        };

        let default_user = std::env::var("USER").unwrap_or_else(|_| "root".to_string());
        let mut hosts = BTreeMap::new();
        for h in raw.hosts {
            if h.host.is_empty() {
                bail!("hosts: entry with empty `host`");
            }
            if h.hostname.is_empty() {
                bail!("hosts: `{}` has no hostname", h.host);
            }
            if hosts.contains_key(&h.host) {
                bail!("hosts: `{}` is listed twice", h.host);
            }

            let key_file = h
                .private_key_file
                .or_else(|| raw.global.private_key_file.clone())
                .unwrap_or_else(|| DEFAULT_PRIVATE_KEY.to_string());
            let ssh = SshConfig {
                user: h
                    .user
                    .or_else(|| raw.global.user.clone())
                    .unwrap_or_else(|| default_user.clone()),
                hostname: h.hostname,
                port: h.ssh_port.or(raw.global.ssh_port).unwrap_or(DEFAULT_SSH_PORT),
                private_key: paths::expand(&key_file),
                become_user: h.become_user.or_else(|| raw.global.become_user.clone()),
            };
            hosts.insert(h.host.clone(), HostConfig { host: h.host, ssh });
        }

        Ok(Self {
            text: text.to_string(),
            hosts,
        })
    }

    /// Load the committed inventory; none committed yet is an empty inventory
    pub fn load() -> Result<Self> {
        Self::load_from(&paths::hosts_file()?)
    }

    pub fn load_from(path: &Path) -> Result<Self> {
        if !path.exists() {
            return Ok(Self::default());
        }
        let text = fs::read_to_string(path)
            .with_context(|| format!("Could not read {}", path.display()))?;
        Self::parse(&text)
    }

    /// Validate and store the inventory text
    pub fn commit(text: &str, path: &Path) -> Result<Self> {
        let hosts = Self::parse(text)?;
        if let Some(dir) = path.parent() {
            fs::create_dir_all(dir)?;
        }
        fs::write(path, text).with_context(|| format!("Could not write {}", path.display()))?;
        Ok(hosts)
    }

    pub fn text(&self) -> &str {
        &self.text
    }

    pub fn is_empty(&self) -> bool {
        self.hosts.is_empty()
    }

    pub fn len(&self) -> usize {
        self.hosts.len()
    }

    pub fn iter(&self) -> impl Iterator<Item = &HostConfig> {
        self.hosts.values()
    }

    /// Look up a host; with an empty inventory every host is reached locally
    pub fn get(&self, host: &str) -> Result<Option<&HostConfig>> {
        if self.hosts.is_empty() {
            return Ok(None);
        }
        match self.hosts.get(host) {
            Some(hc) => Ok(Some(hc)),
            None => bail!("host `{host}` not found in hosts inventory, run `stackadm hosts commit`"),
        }
    }

    /// Host to hostname map for topology expansion; `None` when the inventory is empty
    pub fn hostname_map(&self) -> Option<HashMap<String, String>> {
        if self.hosts.is_empty() {
            return None;
        }
        Some(
            self.hosts
                .values()
                .map(|hc| (hc.host.clone(), hc.ssh.hostname.clone()))
                .collect(),
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    const INVENTORY: &str = "
global:
  user: dingo
  ssh_port: 22
  private_key_file: /keys/id_rsa
hosts:
  - host: server-1
    hostname: 10.0.1.1
  - host: server-2
    hostname: 10.0.1.2
    ssh_port: 2222
    become_user: root
";

    #[test]
    fn test_parse_layers_global() {
        let hosts = Hosts::parse(INVENTORY).unwrap();
        assert_eq!(hosts.len(), 2);

        let h1 = hosts.get("server-1").unwrap().unwrap();
        assert_eq!(h1.ssh.user, "dingo");
        assert_eq!(h1.ssh.port, 22);
        assert_eq!(h1.ssh.private_key, PathBuf::from("/keys/id_rsa"));
        assert_eq!(h1.ssh.become_user, None);

        let h2 = hosts.get("server-2").unwrap().unwrap();
        assert_eq!(h2.ssh.port, 2222);
        assert_eq!(h2.ssh.become_user.as_deref(), Some("root"));
    }

    #[test]
    fn test_unknown_host() {
        let hosts = Hosts::parse(INVENTORY).unwrap();
        let err = hosts.get("server-9").unwrap_err();
        assert!(err.to_string().contains("server-9"));
    }

    #[test]
    fn test_empty_inventory_is_local() {
        let hosts = Hosts::parse("").unwrap();
        assert!(hosts.is_empty());
        assert!(hosts.get("anything").unwrap().is_none());
        assert!(hosts.hostname_map().is_none());
    }

    #[test]
    fn test_hostname_map() {
        let map = Hosts::parse(INVENTORY).unwrap().hostname_map().unwrap();
        assert_eq!(map["server-2"], "10.0.1.2");
    }

    #[test]
    fn test_rejects_duplicates_and_unknown_fields() {
        let dup = "hosts:\n  - host: a\n    hostname: 1.1.1.1\n  - host: a\n    hostname: 1.1.1.2\n";
        assert!(Hosts::parse(dup).is_err());
        let typo = "hosts:\n  - host: a\n    hostnme: 1.1.1.1\n";
        assert!(Hosts::parse(typo).is_err());
    }

    #[test]
    fn test_commit_then_load() {
        let tmp = TempDir::new().unwrap();
        let path = tmp.path().join("data").join("hosts.yaml");
        Hosts::commit(INVENTORY, &path).unwrap();

        let loaded = Hosts::load_from(&path).unwrap();
        assert_eq!(loaded.text(), INVENTORY);
        assert_eq!(loaded.len(), 2);
        assert!(Hosts::commit("hosts: [", &path).is_err());
        assert_eq!(fs::read_to_string(&path).unwrap(), INVENTORY);
    }
}
