//! Topology expansion
//!
//! Turns a [`Topology`] into the flat list of [`ServiceInstance`]s it
//! declares. Config is layered global → role → deploy entry, every replica
//! gets its own copy, and the variable passes run once all instances exist.

use crate::context::{Context, KEY_MDS_VERSION};
use crate::document::{DeployEntry, Topology};
use crate::error::{Error, Result};
use crate::instance::{InstanceSpec, ServiceInstance};
use crate::kind::{ClusterKind, Role};
use crate::schema::{Schema, keys};
use crate::service_vars::{add_cluster_variables, add_peer_variables, add_service_variables};
use crate::value::{ConfigMap, Value};
use std::collections::HashSet;
use std::sync::Arc;

/// Ordered roles deployed for the topology's cluster family
pub fn roles_for(topology: &Topology) -> Vec<Role> {
    use Role::*;

    match topology.kind {
        ClusterKind::CurveBs => vec![Etcd, Mds, Chunkserver, Snapshotclone],
        ClusterKind::DingoFs if topology.has_role(MdsV2) => {
            if topology.has_role(Coordinator) && topology.has_role(Store) {
                vec![MdsV2, Coordinator, Store, Tmp]
            } else {
                vec![MdsV2]
            }
        }
        ClusterKind::DingoFs => vec![Etcd, Mds, Metaserver, Coordinator, Store, MdsV2],
        ClusterKind::DingoStore => vec![Coordinator, Store],
        ClusterKind::DingoDb => vec![
            Coordinator,
            Store,
            Document,
            Diskann,
            Index,
            Executor,
            Web,
            Proxy,
        ],
    }
}

/// Copy keys from `parent` missing in `child`
///
/// The `variable` map is merged key by key while `depth` is below 2; every
/// other key is taken whole from whichever side defines it, child first.
pub fn merge(parent: &ConfigMap, child: &mut ConfigMap, depth: usize) {
    for (key, value) in parent {
        match child.get_mut(key) {
            None => {
                child.insert(key.clone(), value.clone());
            }
            Some(Value::Map(child_map)) if key == keys::VARIABLE && depth < 2 => {
                if let Value::Map(parent_map) = value {
                    merge(parent_map, child_map, depth + 1);
                }
            }
            Some(_) => {}
        }
    }
}

/// Expand a topology into resolved service instances
pub fn expand(
    topology: &Topology,
    mut context: Context,
    schema: Arc<Schema>,
) -> Result<Vec<ServiceInstance>> {
    if topology.kind == ClusterKind::DingoFs {
        let version = if topology.has_role(Role::MdsV2) { "v2" } else { "v1" };
        context.set(KEY_MDS_VERSION, version);
    }
    let context = Arc::new(context);

    let mut instances = Vec::new();
    for role in roles_for(topology) {
        // the table-creation role borrows the first mdsv2 entry
        let source = if role == Role::Tmp { Role::MdsV2 } else { role };
        let Some(section) = topology.section(source) else {
            continue;
        };

        let mut role_config = section.config.clone();
        merge(&topology.global, &mut role_config, 1);

        let deploys: &[DeployEntry] = if role == Role::Tmp {
            &section.deploy[..section.deploy.len().min(1)]
        } else {
            &section.deploy
        };

        for (host_sequence, deploy) in deploys.iter().enumerate() {
            let mut config = deploy.config.clone();
            merge(&role_config, &mut config, 1);

            let mut count = deploy.instance_count()?;
            if role == Role::Tmp {
                count = 1;
            }

            for instance_sequence in 0..count {
                let spec = InstanceSpec {
                    kind: topology.kind,
                    role,
                    host: deploy.host.clone(),
                    name: deploy.name.clone(),
                    instances: count,
                    host_sequence,
                    instance_sequence,
                    config: config.clone(),
                };
                instances.push(ServiceInstance::new(
                    spec,
                    Arc::clone(&context),
                    Arc::clone(&schema),
                )?);
            }
        }
    }

    for dc in &mut instances {
        dc.resolve_host()?;
        add_service_variables(dc)?;
    }
    add_peer_variables(&mut instances)?;

    let mut seen = HashSet::new();
    for dc in &mut instances {
        dc.build()?;
        if !seen.insert(dc.id().to_string()) {
            return Err(Error::DuplicateServiceId(dc.id().to_string()));
        }
    }

    add_cluster_variables(&mut instances)?;

    log::debug!(
        "Expanded {} topology into {} instance(s)",
        topology.kind,
        instances.len()
    );
    Ok(instances)
}

/// Parse and expand a YAML topology with the builtin schema
pub fn parse_topology(text: &str, context: Context) -> Result<Vec<ServiceInstance>> {
    let topology = Topology::parse(text)?;
    expand(&topology, context, Arc::new(Schema::builtin()))
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    fn parse(text: &str) -> Result<Vec<ServiceInstance>> {
        parse_topology(text, Context::new())
    }

    #[test]
    fn test_etcd_example() {
        let dcs = parse(
            r"
kind: curvebs
global:
  data_dir: /data
etcd_services:
  deploy:
    - host: h1
      instances: 3
",
        )
        .unwrap();

        assert_eq!(dcs.len(), 3);
        let ids: Vec<&str> = dcs.iter().map(ServiceInstance::id).collect();
        assert_eq!(ids, ["etcd_h1_0", "etcd_h1_1", "etcd_h1_2"]);
        for (seq, dc) in dcs.iter().enumerate() {
            assert_eq!(dc.instance_sequence(), seq);
            assert_eq!(dc.data_dir(), "/data");
            assert_eq!(dc.parent_id(), "etcd_h1_0");
            assert_eq!(dc.variables().get("service_peers"), Some("h1:2380,h1:2380,h1:2380"));
        }
    }

    #[test]
    fn test_peer_list_contains_every_peer_once() {
        let dcs = parse(
            r"
kind: dingo-store
coordinator_services:
  deploy:
    - host: h3
    - host: h1
    - host: h2
",
        )
        .unwrap();

        let expected = "h1:6500,h2:6500,h3:6500";
        for dc in &dcs {
            assert_eq!(dc.variables().get("service_peers"), Some(expected));
        }
    }

    #[test]
    fn test_templated_listen_address_in_peers() {
        let dcs = parse(
            r#"
kind: dingo-store
coordinator_services:
  config:
    listen.ip: "${service_host}"
    listen.port: "65${format_replicas_sequence}"
  deploy:
    - host: h1
      instances: 2
    - host: h2
"#,
        )
        .unwrap();

        let ports: Vec<i64> = dcs.iter().map(ServiceInstance::listen_port).collect();
        assert_eq!(ports, [6500, 6501, 6500]);

        let expected = "h1:6500,h1:6501,h2:6500";
        for dc in &dcs {
            assert_eq!(dc.variables().get("service_addr"), Some(dc.host()));
            assert_eq!(
                dc.variables().get("service_port"),
                Some(dc.listen_port().to_string().as_str())
            );
            assert_eq!(dc.variables().get("service_peers"), Some(expected));
            assert_eq!(dc.variables().get("cluster_coor_srv_peers"), Some(expected));
        }
    }

    #[test]
    fn test_replicas_share_config_but_sequence_fields() {
        let dcs = parse(
            r#"
kind: curvebs
global:
  copysets: 10
  custom.key: "${service_host}-x"
mds_services:
  config:
    listen.port: "67${format_replicas_sequence}"
  deploy:
    - host: h1
      instances: 3
"#,
        )
        .unwrap();

        assert_eq!(dcs.len(), 3);
        let without_port = |dc: &ServiceInstance| {
            let mut config = dc.service_config().clone();
            let port = config.remove(keys::LISTEN_PORT).unwrap();
            (port, config)
        };
        let (first_port, first) = without_port(&dcs[0]);
        assert_eq!(first_port, "6700");
        assert_eq!(first.get("copysets").map(String::as_str), Some("10"));
        assert_eq!(first.get("custom.key").map(String::as_str), Some("h1-x"));

        for (seq, dc) in dcs.iter().enumerate().skip(1) {
            let (port, config) = without_port(dc);
            assert_eq!(port, format!("670{seq}"));
            assert_eq!(config, first);
        }
    }

    #[test]
    fn test_config_layering() {
        let dcs = parse(
            r"
kind: dingo-store
global:
  log_dir: /global/logs
  data_dir: /global/data
  copysets: 10
coordinator_services:
  config:
    copysets: 20
  deploy:
    - host: h1
      config:
        data_dir: /host/data
    - host: h2
",
        )
        .unwrap();

        assert_eq!(dcs[0].log_dir(), "/global/logs");
        assert_eq!(dcs[0].data_dir(), "/host/data");
        assert_eq!(dcs[1].data_dir(), "/global/data");
        assert_eq!(dcs[0].get_int(keys::COPYSETS), 20);
    }

    #[test]
    fn test_variable_section_merges_deeply() {
        let dcs = parse(
            r"
kind: dingo-store
global:
  variable:
    a: global
    b: global
coordinator_services:
  config:
    variable:
      b: role
  deploy:
    - host: h1
      config:
        log_dir: /logs/${a}/${b}
",
        )
        .unwrap();

        assert_eq!(dcs[0].log_dir(), "/logs/global/role");
    }

    #[test]
    fn test_duplicate_ids_rejected() {
        let result = parse(
            r"
kind: dingo-store
store_services:
  deploy:
    - host: h1
    - host: h1
",
        );
        assert!(matches!(result, Err(Error::DuplicateServiceId(id)) if id == "store_h1_0"));
    }

    #[test]
    fn test_named_entries_on_same_host() {
        let dcs = parse(
            r"
kind: dingo-store
store_services:
  deploy:
    - host: h1
      name: a
    - host: h1
      name: b
",
        )
        .unwrap();
        assert_eq!(dcs[0].id(), "store_h1_a_0");
        assert_eq!(dcs[1].id(), "store_h1_b_0");
        assert_eq!(dcs[1].host_sequence(), 1);
    }

    #[test]
    fn test_negative_replicas_rejected() {
        let result = parse(
            r"
kind: dingo-store
store_services:
  deploy:
    - host: h1
      replicas: -2
",
        );
        assert!(matches!(result, Err(Error::InvalidReplicas { value: -2, .. })));
    }

    #[test]
    fn test_mdsv2_with_store_adds_table_role() {
        let dcs = parse(
            r"
kind: dingofs
mdsv2_services:
  deploy:
    - host: h1
      instances: 2
    - host: h2
coordinator_services:
  deploy:
    - host: h1
store_services:
  deploy:
    - host: h1
",
        )
        .unwrap();

        let roles: Vec<Role> = dcs.iter().map(ServiceInstance::role).collect();
        assert_eq!(
            roles,
            [Role::MdsV2, Role::MdsV2, Role::MdsV2, Role::Coordinator, Role::Store, Role::Tmp]
        );
        let tmp = dcs.last().unwrap();
        assert_eq!(tmp.id(), "tmp_h1_0");
        assert_eq!(tmp.instances(), 1);
        assert_eq!(tmp.context().lookup(KEY_MDS_VERSION), Some("v2"));
        assert_eq!(
            tmp.get_string(keys::COORDINATOR_ADDR),
            "h1:6500",
            "cross-role address from the second pass"
        );
    }

    #[test]
    fn test_mdsv2_only() {
        let dcs = parse(
            r"
kind: dingofs
mdsv2_services:
  deploy:
    - host: h1
etcd_services:
  deploy:
    - host: h1
",
        )
        .unwrap();
        assert_eq!(dcs.len(), 1);
        assert_eq!(dcs[0].role(), Role::MdsV2);
    }

    #[test]
    fn test_role_order_follows_kind() {
        let dcs = parse(
            r"
kind: curvebs
snapshotclone_services:
  deploy:
    - host: h1
mds_services:
  deploy:
    - host: h1
etcd_services:
  deploy:
    - host: h1
",
        )
        .unwrap();
        let roles: Vec<Role> = dcs.iter().map(ServiceInstance::role).collect();
        assert_eq!(roles, [Role::Etcd, Role::Mds, Role::Snapshotclone]);
    }

    #[test]
    fn test_cluster_variables() {
        let dcs = parse(
            r"
kind: curvebs
etcd_services:
  deploy:
    - host: h1
    - host: h2
mds_services:
  config:
    listen.dummy_port: 7701
  deploy:
    - host: h1
",
        )
        .unwrap();

        let mds = &dcs[2];
        let vars = mds.variables();
        assert_eq!(
            vars.get("cluster_etcd_http_addr"),
            Some("etcd00=http://h1:2380,etcd10=http://h2:2380")
        );
        assert_eq!(vars.get("cluster_etcd_addr"), Some("h1:2379,h2:2379"));
        assert_eq!(vars.get("cluster_mds_dummy_addr"), Some("h1:7701"));
        assert_eq!(vars.get("cluster_etcd_count"), Some("2"));
        assert_eq!(vars.get("cluster_chunkserver_addr"), Some(""));
    }

    #[test]
    fn test_host_inventory() {
        let hosts = HashMap::from([("h1".to_string(), "10.0.0.1".to_string())]);
        let text = "kind: dingo-store\nstore_services:\n  deploy:\n    - host: h1\n";
        let dcs = parse_topology(text, Context::with_hosts(hosts.clone())).unwrap();
        assert_eq!(dcs[0].hostname(), "10.0.0.1");
        assert_eq!(dcs[0].listen_ip(), "10.0.0.1");

        let text = "kind: dingo-store\nstore_services:\n  deploy:\n    - host: h9\n";
        assert!(matches!(
            parse_topology(text, Context::with_hosts(hosts)),
            Err(Error::HostNotFound(h)) if h == "h9"
        ));
    }

    #[test]
    fn test_undefined_variable_in_config() {
        let text = "kind: dingo-store\nstore_services:\n  deploy:\n    - host: h1\n      config:\n        log_dir: /logs/${nope}\n";
        assert!(matches!(parse(text), Err(Error::UndefinedVariable(v)) if v == "nope"));
    }

    #[test]
    fn test_merge_child_wins() {
        let mut parent = ConfigMap::new();
        parent.insert("a".into(), Value::from("p"));
        parent.insert("b".into(), Value::from("p"));
        let mut child = ConfigMap::new();
        child.insert("a".into(), Value::from("c"));

        merge(&parent, &mut child, 1);
        assert_eq!(child.get("a"), Some(&Value::from("c")));
        assert_eq!(child.get("b"), Some(&Value::from("p")));
    }
}
