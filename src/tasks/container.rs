//! Pulling images and creating service containers

use anyhow::Result;
use playbook::{Options, Task};
use std::sync::Arc;
use topology::{ClusterKind, Role, ServiceInstance, keys};

use crate::session::Session;
use crate::steps::container::{ContainerSpec, CreateContainer, PullImage};
use crate::steps::service::{GetService, InsertService};
use crate::steps::Target;
use crate::steps::shell::CreateDirectory;
use crate::tasks::Op;

const RESTART_ALWAYS: &str = "always";
const JEMALLOC: &str = "/usr/local/lib/libjemalloc.so";
const SMC_PRELOAD: &str = "/usr/local/lib/libsmc-preload.so";

pub fn pull_image(
    session: &Session,
    dc: &Arc<ServiceInstance>,
    _options: &Options,
) -> Result<Option<Task<Target>>> {
    let image = dc.container_image();
    let task = Task::new(
        Op::PullImage.to_string(),
        format!("host={} image={image}", dc.host()),
        session.target(dc.host())?,
    )
    .with_step(PullImage { image });
    Ok(Some(task))
}

pub fn create_container(
    session: &Session,
    dc: &Arc<ServiceInstance>,
    _options: &Options,
) -> Result<Option<Task<Target>>> {
    let service_id = session.service_id(dc.id());
    let mut paths = vec![dc.log_dir(), dc.data_dir()];
    if dc.role().is_store_family() {
        paths.push(dc.raft_dir());
    }

    let task = Task::new(
        Op::CreateContainer.to_string(),
        format!("host={} role={}", dc.host(), dc.role()),
        session.target(dc.host())?,
    )
    .with_step(GetService {
        registry: Arc::clone(&session.registry),
        service_id: service_id.clone(),
    })
    .with_step(CreateDirectory { paths })
    .with_step(CreateContainer {
        spec: container_spec(dc, &service_id),
    })
    .with_step(InsertService {
        registry: Arc::clone(&session.registry),
        cluster_id: session.cluster.id,
        service_id,
    });
    Ok(Some(task))
}

/// Flags handed to chunkserver through `--args`
fn chunkserver_arguments(dc: &ServiceInstance) -> String {
    let layout = dc.layout();
    let data = &layout.service_data_dir;
    let args = [
        ("conf", format!("{}/chunkserver.conf", layout.service_conf_dir)),
        ("chunkServerIp", dc.listen_ip()),
        (
            "enableExternalServer",
            dc.get_bool(keys::ENABLE_EXTERNAL_SERVER).to_string(),
        ),
        ("chunkServerExternalIp", dc.listen_external_ip()),
        ("chunkServerPort", dc.listen_port().to_string()),
        ("chunkFilePoolDir", data.clone()),
        ("chunkFilePoolMetaPath", format!("{data}/chunkfilepool.meta")),
        ("walFilePoolDir", data.clone()),
        ("walFilePoolMetaPath", format!("{data}/walfilepool.meta")),
        ("copySetUri", format!("local://{data}/copysets")),
        ("recycleUri", format!("local://{data}/recycler")),
        ("raftLogUri", format!("curve://{data}/copysets")),
        ("raftSnapshotUri", format!("curve://{data}/copysets")),
        ("chunkServerStoreUri", format!("local://{data}")),
        ("chunkServerMetaUri", format!("local://{data}/chunkserver.dat")),
        ("bthread_concurrency", "18".to_string()),
        ("graceful_quit_on_sigterm", "true".to_string()),
        ("raft_sync", "true".to_string()),
        ("raft_sync_meta", "true".to_string()),
        ("raft_sync_segments", "true".to_string()),
        ("raft_max_segment_size", "8388608".to_string()),
        ("raft_max_install_snapshot_tasks_num", "1".to_string()),
        ("raft_use_fsync_rather_than_fdatasync", "false".to_string()),
    ];
    args.iter()
        .map(|(k, v)| format!("-{k}={v}"))
        .collect::<Vec<_>>()
        .join(" ")
}

/// Command passed to the image entrypoint
fn command(dc: &ServiceInstance) -> String {
    match dc.role() {
        role if role.is_store_family() => "cleanstart".to_string(),
        Role::Chunkserver => format!("--role {} --args='{}'", dc.role(), chunkserver_arguments(dc)),
        role => format!("--role {role} --args=''"),
    }
}

fn environment(dc: &ServiceInstance) -> Vec<String> {
    let mut envs = Vec::new();
    if dc.role().is_store_family() {
        let var = |name: &str| dc.variables().get(name).map(str::to_string);
        envs.extend([
            format!("FLAGS_role={}", dc.role()),
            format!("SERVER_LISTEN_HOST={}", dc.get_string(keys::SERVER_LISTEN_HOST)),
            format!("RAFT_LISTEN_HOST={}", dc.get_string(keys::RAFT_LISTEN_HOST)),
            format!("SERVER_HOST={}", dc.hostname()),
            format!("RAFT_HOST={}", dc.hostname()),
            format!("DEFAULT_REPLICA_NUM={}", dc.get_int(keys::DEFAULT_REPLICA_NUM)),
            format!("COORDINATOR_SERVER_START_PORT={}", dc.server_port()),
            format!("COORDINATOR_RAFT_START_PORT={}", dc.raft_port()),
            format!("SERVER_START_PORT={}", dc.server_port()),
            format!("RAFT_START_PORT={}", dc.raft_port()),
            format!("INSTANCE_START_ID={}", dc.get_int(keys::INSTANCE_START_ID)),
            "ENABLE_LITE=false".to_string(),
        ]);
        if let Some(peers) = var("cluster_coor_srv_peers") {
            envs.push(format!("COOR_SRV_PEERS={peers}"));
        }
        if let Some(peers) = var("cluster_coor_raft_peers") {
            envs.push(format!("COOR_RAFT_PEERS={peers}"));
        }
    } else if dc.kind() == ClusterKind::DingoFs {
        let mut preloads = vec![JEMALLOC];
        if dc.get_bool(keys::ENABLE_RDMA) {
            preloads.push(SMC_PRELOAD);
        }
        envs.push(format!("LD_PRELOAD={}", preloads.join(" ")));
    }
    envs.extend(dc.env().split_whitespace().map(str::to_string));
    envs
}

fn volumes(dc: &ServiceInstance) -> Vec<(String, String)> {
    let layout = dc.layout();
    let mut volumes = Vec::new();
    let mut mount = |host: String, container: &str| {
        if !host.is_empty() {
            volumes.push((host, container.to_string()));
        }
    };
    mount(dc.log_dir(), &layout.service_log_dir);
    mount(dc.data_dir(), &layout.service_data_dir);
    mount(dc.core_dir(), &layout.core_system_dir);
    if dc.role().is_store_family() {
        mount(dc.raft_dir(), &layout.service_raft_dir);
    }
    volumes
}

/// Container definition of an instance
///
/// Name and hostname are `<kind>-<role>-<service id>`, which also resolves
/// to loopback inside the container.
pub fn container_spec(dc: &ServiceInstance, service_id: &str) -> ContainerSpec {
    let name = format!("{}-{}-{service_id}", dc.kind(), dc.role());
    ContainerSpec {
        image: dc.container_image(),
        command: command(dc),
        envs: environment(dc),
        add_hosts: vec![format!("{name}:127.0.0.1")],
        volumes: volumes(dc),
        ulimits: vec!["core=-1".to_string(), "nofile=65535:65535".to_string()],
        restart: RESTART_ALWAYS.to_string(),
        privileged: true,
        init: true,
        hostname: name.clone(),
        name,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use topology::{Context, parse_topology};

    fn instances(text: &str) -> Vec<ServiceInstance> {
        parse_topology(text, Context::new()).unwrap()
    }

    #[test]
    fn test_store_container_spec() {
        let dcs = instances(
            "
kind: dingo-store
global:
  log_dir: /data/logs
  data_dir: /data/data
  raft_dir: /data/raft
coordinator_services:
  deploy:
    - host: h1
store_services:
  deploy:
    - host: h1
",
        );
        let store = dcs.iter().find(|dc| dc.role() == Role::Store).unwrap();
        let spec = container_spec(store, "abcdef012345");

        assert_eq!(spec.name, "dingo-store-store-abcdef012345");
        assert_eq!(spec.hostname, spec.name);
        assert_eq!(spec.add_hosts, ["dingo-store-store-abcdef012345:127.0.0.1"]);
        assert_eq!(spec.command, "cleanstart");
        assert!(spec.envs.contains(&"FLAGS_role=store".to_string()));
        assert!(spec.envs.contains(&"SERVER_HOST=h1".to_string()));
        assert!(spec.envs.iter().any(|e| e.starts_with("COOR_SRV_PEERS=")));
        assert!(spec.volumes.iter().any(|(host, _)| host == "/data/raft"));
        assert_eq!(spec.restart, "always");
    }

    #[test]
    fn test_dingofs_container_spec() {
        let dcs = instances(
            "
kind: dingofs
global:
  env: FOO=1 BAR=2
etcd_services:
  deploy:
    - host: h1
",
        );
        let spec = container_spec(&dcs[0], "abcdef012345");
        assert_eq!(spec.command, "--role etcd --args=''");
        assert_eq!(
            spec.envs,
            ["LD_PRELOAD=/usr/local/lib/libjemalloc.so", "FOO=1", "BAR=2"]
        );
        // no host directories configured
        assert!(spec.volumes.is_empty());
    }

    #[test]
    fn test_chunkserver_arguments() {
        let dcs = instances(
            "
kind: curvebs
chunkserver_services:
  deploy:
    - host: h1
",
        );
        let spec = container_spec(&dcs[0], "abcdef012345");
        assert!(spec.command.starts_with("--role chunkserver --args='-conf="));
        assert!(spec.command.contains("-chunkFilePoolDir=/curvebs/chunkserver/data"));
    }
}
