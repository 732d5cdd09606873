//! Everything a command needs to act on the checked out cluster

use anyhow::{Context as _, Result};
use registry::{Cluster, Registry};
use std::sync::Arc;
use topology::{Context, ServiceInstance};

use crate::config::AppConfig;
use crate::hosts::Hosts;
use crate::paths;
use crate::remote::{ExecOptions, Remote, SshRemote};
use crate::steps::Target;

/// Length of a service id, in hex characters
const SERVICE_ID_LEN: usize = 12;

/// Registry, inventory and remote access for one cluster
pub struct Session {
    pub registry: Arc<Registry>,
    pub cluster: Cluster,
    pub hosts: Hosts,
    pub remote: Arc<dyn Remote>,
    pub exec: ExecOptions,
    /// Default pool width for playbook steps
    pub jobs: usize,
}

impl Session {
    pub fn new(
        registry: Arc<Registry>,
        cluster: Cluster,
        hosts: Hosts,
        remote: Arc<dyn Remote>,
        exec: ExecOptions,
    ) -> Self {
        Self {
            registry,
            cluster,
            hosts,
            remote,
            exec,
            jobs: playbook::DEFAULT_CONCURRENCY,
        }
    }

    /// Open the registry and the inventory and select the current cluster
    pub fn open(config: &AppConfig) -> Result<Self> {
        let registry = open_registry()?;
        let cluster = registry.current_cluster()?;
        let hosts = Hosts::load()?;
        log::debug!("Session on cluster {} ({} hosts)", cluster.name, hosts.len());

        let mut session = Self::new(
            Arc::new(registry),
            cluster,
            hosts,
            Arc::new(SshRemote),
            ExecOptions::from(config),
        );
        session.jobs = config.jobs;
        Ok(session)
    }

    /// Expand the cluster topology against the inventory
    pub fn instances(&self) -> Result<Vec<Arc<ServiceInstance>>> {
        let context = match self.hosts.hostname_map() {
            Some(map) => Context::with_hosts(map),
            None => Context::new(),
        };
        let instances = topology::parse_topology(&self.cluster.topology, context)
            .with_context(|| format!("Invalid topology of cluster `{}`", self.cluster.name))?;
        Ok(instances.into_iter().map(Arc::new).collect())
    }

    /// Registry key of an instance, stable for the life of the cluster
    pub fn service_id(&self, instance_id: &str) -> String {
        let hash = blake3::hash(format!("{}{}", self.cluster.uuid, instance_id).as_bytes());
        hash.to_hex()[..SERVICE_ID_LEN].to_string()
    }

    /// Container bound to a service, or an error if it was never deployed
    pub fn container_id(&self, service_id: &str) -> Result<String> {
        self.registry
            .get_container_id(service_id)?
            .with_context(|| format!("service {service_id} not found, deploy the cluster first"))
    }

    /// Container bound to a service; empty when none is recorded
    pub fn container_id_or_default(&self, service_id: &str) -> Result<String> {
        Ok(self.registry.get_container_id(service_id)?.unwrap_or_default())
    }

    pub fn target(&self, host: &str) -> Result<Target> {
        let ssh = self.hosts.get(host)?.map(|hc| hc.ssh.clone());
        Ok(Target::new(ssh, Arc::clone(&self.remote), self.exec.clone()))
    }
}

/// Open the registry database in the data dir
pub fn open_registry() -> Result<Registry> {
    let path = paths::registry_db()?;
    Registry::open(&path).with_context(|| format!("Could not open {}", paths::display(&path)))
}
