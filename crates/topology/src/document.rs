//! Topology documents
//!
//! ```yaml
//! kind: dingo-store
//! global:
//!   log_dir: /logs/${service_role}
//! coordinator_services:
//!   config:
//!     data_dir: /data/coordinator
//!   deploy:
//!     - host: server-host1
//!     - host: server-host2
//!       instances: 2
//! ```

use crate::error::{Error, Result};
use crate::kind::{ClusterKind, Role};
use crate::value::{ConfigMap, map_from_yaml};
use serde::Deserialize;
use std::collections::BTreeMap;
use std::path::Path;

/// One `deploy` entry of a role section
#[derive(Debug, Clone, Default)]
pub struct DeployEntry {
    pub host: String,
    pub name: String,
    pub replica: Option<i64>,
    pub replicas: Option<i64>,
    pub instances: Option<i64>,
    pub config: ConfigMap,
}

impl DeployEntry {
    /// Number of instances this entry declares
    ///
    /// `instances` wins over `replicas`, which wins over `replica`. Missing or
    /// zero counts fall through to the next alias, then to 1.
    pub fn instance_count(&self) -> Result<usize> {
        let fields = [
            ("instances", self.instances),
            ("replicas", self.replicas),
            ("replica", self.replica),
        ];
        for (field, value) in fields {
            if let Some(value) = value
                && value < 0
            {
                return Err(Error::InvalidReplicas {
                    host: self.host.clone(),
                    field,
                    value,
                });
            }
        }
        Ok(fields
            .iter()
            .find_map(|(_, v)| v.filter(|n| *n > 0))
            .map_or(1, |n| n as usize))
    }
}

/// Service-level config and deploy entries of one role
#[derive(Debug, Clone, Default)]
pub struct ServiceSection {
    pub config: ConfigMap,
    pub deploy: Vec<DeployEntry>,
}

/// A parsed cluster declaration
#[derive(Debug, Clone)]
pub struct Topology {
    pub kind: ClusterKind,
    pub global: ConfigMap,
    pub services: BTreeMap<Role, ServiceSection>,
}

#[derive(Deserialize)]
struct RawDeploy {
    host: String,
    #[serde(default)]
    name: Option<String>,
    #[serde(default)]
    replica: Option<i64>,
    #[serde(default)]
    replicas: Option<i64>,
    #[serde(default)]
    instances: Option<i64>,
    #[serde(default)]
    config: Option<serde_yaml::Mapping>,
}

#[derive(Deserialize)]
struct RawSection {
    #[serde(default)]
    config: Option<serde_yaml::Mapping>,
    #[serde(default)]
    deploy: Option<Vec<RawDeploy>>,
}

impl Topology {
    /// Parse a topology from YAML text
    pub fn parse(text: &str) -> Result<Self> {
        if text.trim().is_empty() {
            return Err(Error::EmptyTopology);
        }
        let doc = match serde_yaml::from_str::<serde_yaml::Value>(text)? {
            serde_yaml::Value::Null => return Err(Error::EmptyTopology),
            serde_yaml::Value::Mapping(m) if m.is_empty() => return Err(Error::EmptyTopology),
            serde_yaml::Value::Mapping(m) => m,
            _ => {
                return Err(Error::InvalidSection {
                    section: "<root>".into(),
                    reason: "expected a mapping".into(),
                });
            }
        };

        let kind = doc
            .get("kind")
            .and_then(serde_yaml::Value::as_str)
            .ok_or_else(|| Error::UnsupportedKind(String::new()))?
            .parse::<ClusterKind>()?;

        let global = match doc.get("global") {
            None | Some(serde_yaml::Value::Null) => ConfigMap::new(),
            Some(serde_yaml::Value::Mapping(m)) => map_from_yaml(m)?,
            Some(_) => {
                return Err(Error::InvalidSection {
                    section: "global".into(),
                    reason: "expected a mapping".into(),
                });
            }
        };

        let mut services = BTreeMap::new();
        for (key, node) in &doc {
            let Some(section) = key.as_str().and_then(|k| k.strip_suffix("_services")) else {
                continue;
            };
            let role: Role = section.parse()?;
            let raw: RawSection =
                serde_yaml::from_value(node.clone()).map_err(|e| Error::InvalidSection {
                    section: role.section(),
                    reason: e.to_string(),
                })?;
            services.insert(role, ServiceSection::from_raw(raw)?);
        }

        log::debug!(
            "Parsed {} topology with {} role section(s)",
            kind,
            services.len()
        );
        Ok(Self {
            kind,
            global,
            services,
        })
    }

    /// Read and parse a topology file
    pub fn from_file(path: &Path) -> Result<Self> {
        let text = std::fs::read_to_string(path).map_err(|source| Error::Read {
            path: path.to_path_buf(),
            source,
        })?;
        Self::parse(&text)
    }

    pub fn section(&self, role: Role) -> Option<&ServiceSection> {
        self.services.get(&role)
    }

    /// Whether `role` declares at least one deploy entry
    pub fn has_role(&self, role: Role) -> bool {
        self.section(role).is_some_and(|s| !s.deploy.is_empty())
    }
}

impl ServiceSection {
    fn from_raw(raw: RawSection) -> Result<Self> {
        let config = raw
            .config
            .as_ref()
            .map(map_from_yaml)
            .transpose()?
            .unwrap_or_default();
        let deploy = raw
            .deploy
            .unwrap_or_default()
            .into_iter()
            .map(|d| -> Result<DeployEntry> {
                Ok(DeployEntry {
                    host: d.host,
                    name: d.name.unwrap_or_default(),
                    replica: d.replica,
                    replicas: d.replicas,
                    instances: d.instances,
                    config: d
                        .config
                        .as_ref()
                        .map(map_from_yaml)
                        .transpose()?
                        .unwrap_or_default(),
                })
            })
            .collect::<Result<Vec<_>>>()?;
        Ok(Self { config, deploy })
    }
}
