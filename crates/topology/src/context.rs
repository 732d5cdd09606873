//! Shared lookup visible to every instance of one topology

use crate::error::{Error, Result};
use std::collections::HashMap;

/// Context key naming the metadata service generation in use (`v1` or `v2`)
pub const KEY_MDS_VERSION: &str = "mds_version";

/// Read-only name/value lookup shared by all instances of one expansion
///
/// Holds the host inventory (host name to reachable hostname) plus a few
/// discriminators computed from the topology itself.
#[derive(Debug, Clone, Default)]
pub struct Context {
    hosts: Option<HashMap<String, String>>,
    values: HashMap<String, String>,
}

impl Context {
    pub fn new() -> Self {
        Self::default()
    }

    /// Context backed by a host inventory
    ///
    /// Once an inventory is present every host named by the topology must be
    /// declared in it.
    pub fn with_hosts(hosts: HashMap<String, String>) -> Self {
        Self {
            hosts: Some(hosts),
            values: HashMap::new(),
        }
    }

    pub fn set(&mut self, key: impl Into<String>, value: impl Into<String>) {
        self.values.insert(key.into(), value.into());
    }

    pub fn lookup(&self, key: &str) -> Option<&str> {
        self.values.get(key).map(String::as_str)
    }

    /// Resolve a topology host name to its address
    pub fn hostname(&self, host: &str) -> Result<String> {
        match &self.hosts {
            None => Ok(host.to_string()),
            Some(hosts) => hosts
                .get(host)
                .cloned()
                .ok_or_else(|| Error::HostNotFound(host.to_string())),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_hostname_without_inventory() {
        let ctx = Context::new();
        assert_eq!(ctx.hostname("h1").unwrap(), "h1");
    }

    #[test]
    fn test_hostname_with_inventory() {
        let ctx = Context::with_hosts(HashMap::from([("h1".into(), "10.0.0.1".into())]));
        assert_eq!(ctx.hostname("h1").unwrap(), "10.0.0.1");
        assert!(matches!(ctx.hostname("h2"), Err(Error::HostNotFound(h)) if h == "h2"));
    }
}
