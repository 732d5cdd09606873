//! Variables injected into every instance
//!
//! Phase A registers values describing the instance itself and its same-role
//! peers. Phase B runs once every instance is built and adds values spanning
//! roles, such as the etcd member list or the coordinator peers.

use crate::error::{Error, Result};
use crate::instance::ServiceInstance;
use crate::kind::Role;
use crate::schema::keys;
use crate::variables::Variable;

/// Unrendered port value, `0` when unset
fn raw_port(dc: &ServiceInstance, key: &str) -> String {
    let raw = dc.get_string(key);
    if raw.is_empty() {
        "0".to_string()
    } else {
        raw
    }
}

/// Phase A: register the variables describing `dc` itself
///
/// Values come from the unrendered config and resolve against the instance's
/// own variables, so `${service_host}` in `listen.ip` is always its own host.
pub fn add_service_variables(dc: &mut ServiceInstance) -> Result<()> {
    let values = [
        ("prefix", dc.prefix()),
        ("service_role", dc.role().to_string()),
        ("service_host", dc.host().to_string()),
        ("service_host_sequence", dc.host_sequence().to_string()),
        ("service_replicas_sequence", dc.instance_sequence().to_string()),
        (
            "format_replicas_sequence",
            format!("{:02}", dc.instance_sequence()),
        ),
        ("service_replica_count", dc.instances().to_string()),
        ("service_addr", dc.listen_ip()),
        ("service_port", raw_port(dc, keys::LISTEN_PORT)),
        ("service_client_port", raw_port(dc, keys::LISTEN_CLIENT_PORT)),
        ("service_dummy_port", raw_port(dc, keys::LISTEN_DUMMY_PORT)),
        ("service_proxy_port", raw_port(dc, keys::LISTEN_PROXY_PORT)),
        ("service_external_addr", dc.listen_external_ip()),
        ("service_external_port", raw_port(dc, keys::LISTEN_EXTERNAL_PORT)),
        ("log_dir", dc.log_dir()),
        ("data_dir", dc.data_dir()),
    ];

    for (name, value) in values {
        dc.register_variable(Variable::literal(name, value))?;
    }
    dc.register_variable(
        Variable::computed("random_uuid", || uuid::Uuid::new_v4().simple().to_string())
            .with_description("random uuid generated once per instance"),
    )?;
    Ok(())
}

/// Comma separated `ip:port` of every address tagged `role`, sorted
///
/// Sorting makes the list identical for every peer regardless of the order
/// instances were constructed in.
pub fn peer_list(addrs: &[(Role, String)], role: Role) -> String {
    let mut peers: Vec<&str> = addrs
        .iter()
        .filter(|(r, _)| *r == role)
        .map(|(_, addr)| addr.as_str())
        .collect();
    peers.sort_unstable();
    peers.join(",")
}

/// Phase A, once every instance has its own variables: register `service_peers`
///
/// Each peer contributes the address it resolved itself.
pub fn add_peer_variables(instances: &mut [ServiceInstance]) -> Result<()> {
    let mut addrs = Vec::with_capacity(instances.len());
    for dc in instances.iter_mut() {
        let ip = dc.resolve_variable("service_addr")?;
        let port = dc.resolve_variable("service_port")?;
        addrs.push((dc.role(), format!("{ip}:{port}")));
    }
    for dc in instances.iter_mut() {
        let peers = peer_list(&addrs, dc.role());
        dc.register_variable(Variable::literal("service_peers", peers))?;
    }
    Ok(())
}

/// Values shared by every instance, computed once all of them are built
pub fn cluster_variables(instances: &[ServiceInstance]) -> Vec<(String, String)> {
    let of = |role: Role| instances.iter().filter(move |dc| dc.role() == role);
    let join = |role: Role, f: &dyn Fn(&ServiceInstance) -> String, sep: &str| {
        of(role).map(f).collect::<Vec<_>>().join(sep)
    };
    let addr = |dc: &ServiceInstance| format!("{}:{}", dc.listen_ip(), dc.listen_port());
    let coor_srv = join(
        Role::Coordinator,
        &|dc| format!("{}:{}", dc.listen_ip(), dc.server_port()),
        ",",
    );

    let mut vars = vec![
        (
            "cluster_etcd_http_addr",
            join(
                Role::Etcd,
                &|dc| {
                    format!(
                        "etcd{}{}=http://{}:{}",
                        dc.host_sequence(),
                        dc.instance_sequence(),
                        dc.listen_ip(),
                        dc.listen_port()
                    )
                },
                ",",
            ),
        ),
        (
            "cluster_etcd_addr",
            join(
                Role::Etcd,
                &|dc| format!("{}:{}", dc.listen_ip(), dc.listen_client_port()),
                ",",
            ),
        ),
        ("cluster_mds_addr", join(Role::Mds, &addr, ",")),
        (
            "cluster_mds_dummy_addr",
            join(
                Role::Mds,
                &|dc| format!("{}:{}", dc.listen_ip(), dc.listen_dummy_port()),
                ",",
            ),
        ),
        (
            "cluster_mds_dummy_port",
            join(Role::Mds, &|dc| dc.listen_dummy_port().to_string(), ","),
        ),
        ("cluster_chunkserver_addr", join(Role::Chunkserver, &addr, ",")),
        ("cluster_snapshotclone_addr", join(Role::Snapshotclone, &addr, ",")),
        (
            "cluster_snapshotclone_proxy_addr",
            join(
                Role::Snapshotclone,
                &|dc| format!("{}:{}", dc.listen_ip(), dc.listen_proxy_port()),
                ",",
            ),
        ),
        (
            "cluster_snapshotclone_dummy_port",
            join(
                Role::Snapshotclone,
                &|dc| dc.listen_dummy_port().to_string(),
                ",",
            ),
        ),
        ("cluster_metaserver_addr", join(Role::Metaserver, &addr, ",")),
        ("cluster_mdsv2_addr", join(Role::MdsV2, &addr, ",")),
        ("cluster_coor_srv_peers", coor_srv.clone()),
        (
            "cluster_coor_raft_peers",
            join(
                Role::Coordinator,
                &|dc| format!("{}:{}", dc.listen_ip(), dc.raft_port()),
                ",",
            ),
        ),
        ("coordinator_addr", coor_srv),
        (
            "cluster_store_srv_peers",
            join(
                Role::Store,
                &|dc| format!("{}:{}", dc.listen_ip(), dc.server_port()),
                ",",
            ),
        ),
    ]
    .into_iter()
    .map(|(name, value)| (name.to_string(), value))
    .collect::<Vec<_>>();

    for role in Role::ALL {
        let count = of(role).count();
        if count > 0 {
            vars.push((format!("cluster_{role}_count"), count.to_string()));
        }
    }
    vars
}

/// Phase B: register cluster variables on every instance and build them
///
/// A user variable with the same name takes precedence over the computed one.
pub fn add_cluster_variables(instances: &mut [ServiceInstance]) -> Result<()> {
    let vars = cluster_variables(instances);
    for dc in instances.iter_mut() {
        for (name, value) in &vars {
            if !dc.variables().contains(name) {
                dc.register_variable(Variable::literal(name.clone(), value.clone()))?;
            }
        }
        dc.build_variables().map_err(|e| Error::ResolveVariables {
            id: dc.id().to_string(),
            source: Box::new(e),
        })?;
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::context::Context;
    use crate::expand::parse_topology;

    #[test]
    fn test_peer_list_filters_role_and_sorts() {
        let addrs = vec![
            (Role::Etcd, "h2:2380".to_string()),
            (Role::Mds, "h1:6700".to_string()),
            (Role::Etcd, "h1:2380".to_string()),
        ];
        assert_eq!(peer_list(&addrs, Role::Etcd), "h1:2380,h2:2380");
        assert_eq!(peer_list(&addrs, Role::Chunkserver), "");
    }

    #[test]
    fn test_snapshotclone_cluster_variables() {
        let dcs = parse_topology(
            r"
kind: curvebs
snapshotclone_services:
  config:
    listen.dummy_port: 8081
    listen.proxy_port: 8080
  deploy:
    - host: h1
    - host: h2
",
            Context::new(),
        )
        .unwrap();

        let mut names: Vec<String> = cluster_variables(&dcs)
            .into_iter()
            .map(|(name, _)| name)
            .filter(|name| name.starts_with("cluster_snapshotclone"))
            .collect();
        names.sort();
        assert_eq!(
            names,
            [
                "cluster_snapshotclone_addr",
                "cluster_snapshotclone_count",
                "cluster_snapshotclone_dummy_port",
                "cluster_snapshotclone_proxy_addr",
            ]
        );
        let vars = dcs[1].variables();
        assert_eq!(vars.get("cluster_snapshotclone_proxy_addr"), Some("h1:8080,h2:8080"));
        assert_eq!(vars.get("cluster_snapshotclone_dummy_port"), Some("8081,8081"));
    }
}
