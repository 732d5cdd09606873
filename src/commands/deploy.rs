//! `stackadm deploy`: bring a cluster up from nothing
//!
//! Every cluster family has a fixed phase order. Containers are created for
//! all services first, then each role is started once the roles it depends
//! on are running.

use anyhow::{Result, bail};
use playbook::Options;
use std::collections::BTreeSet;
use topology::{ClusterKind, Role};

use super::{build_playbook, open_session, run_playbook};
use crate::Context;
use crate::tasks::{self, OPT_SKIP, Op};
use crate::ui;

/// Roles `--skip` accepts
const SKIPPABLE_ROLES: [Role; 1] = [Role::Snapshotclone];

fn check_skip(skip: &[String]) -> Result<()> {
    for role in skip {
        if !SKIPPABLE_ROLES.iter().any(|r| r.as_str() == role) {
            bail!(
                "Role '{role}' cannot be skipped (skippable: {})",
                SKIPPABLE_ROLES.map(|r| r.as_str()).join(", ")
            );
        }
    }
    Ok(())
}

/// Phase order of a cluster family before any option is applied
fn deploy_steps(kind: ClusterKind, roles: &BTreeSet<Role>) -> Vec<Op> {
    use Op::{
        CheckStoreHealth, CreateContainer, CreateMetaTables, EnableEtcdAuth, PullImage, StartRole,
        SyncConfig,
    };
    use Role::{
        Chunkserver, Coordinator, Diskann, Document, Etcd, Executor, Index, Mds, MdsV2, Metaserver,
        Proxy, Snapshotclone, Store, Tmp, Web,
    };

    match kind {
        ClusterKind::CurveBs => vec![
            PullImage,
            CreateContainer,
            SyncConfig,
            StartRole(Etcd),
            EnableEtcdAuth,
            StartRole(Mds),
            StartRole(Chunkserver),
            StartRole(Snapshotclone),
        ],
        ClusterKind::DingoFs if roles.contains(&MdsV2) && roles.contains(&Coordinator) => vec![
            PullImage,
            CreateContainer,
            SyncConfig,
            StartRole(Coordinator),
            StartRole(Store),
            CheckStoreHealth,
            StartRole(Tmp),
            CreateMetaTables,
            StartRole(MdsV2),
            StartRole(Executor),
        ],
        ClusterKind::DingoFs if roles.contains(&MdsV2) => {
            vec![PullImage, CreateContainer, StartRole(MdsV2)]
        }
        ClusterKind::DingoFs => {
            let mut steps = vec![
                PullImage,
                CreateContainer,
                SyncConfig,
                StartRole(Etcd),
                EnableEtcdAuth,
                StartRole(Mds),
            ];
            if roles.contains(&Metaserver) {
                steps.push(StartRole(Metaserver));
            }
            steps
        }
        ClusterKind::DingoStore => vec![
            PullImage,
            CreateContainer,
            StartRole(Coordinator),
            StartRole(Store),
        ],
        ClusterKind::DingoDb => vec![
            PullImage,
            CreateContainer,
            SyncConfig,
            StartRole(Coordinator),
            StartRole(Store),
            CheckStoreHealth,
            StartRole(Document),
            StartRole(Diskann),
            StartRole(Index),
            StartRole(Executor),
            StartRole(Web),
            StartRole(Proxy),
        ],
    }
}

/// Phases `deploy` runs for a cluster declaring `roles`
pub fn deploy_ops(
    kind: ClusterKind,
    roles: &BTreeSet<Role>,
    skip: &[String],
    local: bool,
    etcd_auth: bool,
) -> Vec<Op> {
    deploy_steps(kind, roles)
        .into_iter()
        .filter(|op| match op {
            Op::PullImage => !local,
            Op::EnableEtcdAuth => etcd_auth && roles.contains(&Role::Etcd),
            op => op.role().is_none_or(|role| {
                roles.contains(&role) && !skip.iter().any(|s| s == role.as_str())
            }),
        })
        .collect()
}

pub fn run(ctx: &Context, jobs: Option<usize>, skip: &[String], local: bool) -> Result<()> {
    check_skip(skip)?;
    let session = open_session(jobs)?;
    let instances = session.instances()?;
    let Some(first) = instances.first() else {
        bail!("Cluster '{}' declares no services", session.cluster.name);
    };

    let roles: BTreeSet<Role> = instances.iter().map(|dc| dc.role()).collect();
    let etcd_auth = instances
        .iter()
        .any(|dc| dc.role() == Role::Etcd && dc.etcd_auth_enabled());
    let ops = deploy_ops(first.kind(), &roles, skip, local, etcd_auth);
    log::debug!("Deploy phases: {ops:?}");

    if !ctx.quiet {
        ui::header(&format!(
            "Deploying {} cluster '{}'",
            first.kind(),
            session.cluster.name
        ));
    }

    let options = Options::new().with(OPT_SKIP, skip.to_vec());
    let compiler = tasks::compiler(&session);
    let playbook = build_playbook(&session, &ops, &instances, &options);
    run_playbook(ctx, &compiler, playbook)?;

    if !ctx.quiet {
        ui::success(&format!("Cluster '{}' deployed", session.cluster.name));
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    fn roles(list: &[Role]) -> BTreeSet<Role> {
        list.iter().copied().collect()
    }

    #[test]
    fn test_curvebs_phases() {
        let r = roles(&[Role::Etcd, Role::Mds, Role::Chunkserver, Role::Snapshotclone]);
        let ops = deploy_ops(ClusterKind::CurveBs, &r, &[], false, true);
        assert_eq!(
            ops,
            [
                Op::PullImage,
                Op::CreateContainer,
                Op::SyncConfig,
                Op::StartRole(Role::Etcd),
                Op::EnableEtcdAuth,
                Op::StartRole(Role::Mds),
                Op::StartRole(Role::Chunkserver),
                Op::StartRole(Role::Snapshotclone),
            ]
        );
    }

    #[test]
    fn test_local_skip_and_auth_options() {
        let r = roles(&[Role::Etcd, Role::Mds, Role::Chunkserver, Role::Snapshotclone]);
        let skip = vec!["snapshotclone".to_string()];
        let ops = deploy_ops(ClusterKind::CurveBs, &r, &skip, true, false);
        assert!(!ops.contains(&Op::PullImage));
        assert!(!ops.contains(&Op::EnableEtcdAuth));
        assert!(!ops.contains(&Op::StartRole(Role::Snapshotclone)));
        assert_eq!(ops.first(), Some(&Op::CreateContainer));
        assert_eq!(ops.last(), Some(&Op::StartRole(Role::Chunkserver)));
    }

    #[test]
    fn test_dingofs_variants() {
        let with_meta = roles(&[Role::Etcd, Role::Mds, Role::Metaserver]);
        let ops = deploy_ops(ClusterKind::DingoFs, &with_meta, &[], false, false);
        assert_eq!(ops.last(), Some(&Op::StartRole(Role::Metaserver)));

        let mds_only = roles(&[Role::Etcd, Role::Mds]);
        let ops = deploy_ops(ClusterKind::DingoFs, &mds_only, &[], false, false);
        assert_eq!(ops.last(), Some(&Op::StartRole(Role::Mds)));

        let mdsv2 = roles(&[Role::MdsV2]);
        let ops = deploy_ops(ClusterKind::DingoFs, &mdsv2, &[], false, false);
        assert_eq!(
            ops,
            [Op::PullImage, Op::CreateContainer, Op::StartRole(Role::MdsV2)]
        );
    }

    #[test]
    fn test_mdsv2_follow_drops_missing_executor() {
        let r = roles(&[Role::MdsV2, Role::Coordinator, Role::Store, Role::Tmp]);
        let ops = deploy_ops(ClusterKind::DingoFs, &r, &[], true, false);
        assert_eq!(
            ops,
            [
                Op::CreateContainer,
                Op::SyncConfig,
                Op::StartRole(Role::Coordinator),
                Op::StartRole(Role::Store),
                Op::CheckStoreHealth,
                Op::StartRole(Role::Tmp),
                Op::CreateMetaTables,
                Op::StartRole(Role::MdsV2),
            ]
        );

        let mut with_executor = r;
        with_executor.insert(Role::Executor);
        let ops = deploy_ops(ClusterKind::DingoFs, &with_executor, &[], true, false);
        assert_eq!(ops.last(), Some(&Op::StartRole(Role::Executor)));
    }

    #[test]
    fn test_dingo_store_skips_config_sync() {
        let r = roles(&[Role::Coordinator, Role::Store]);
        let ops = deploy_ops(ClusterKind::DingoStore, &r, &[], false, false);
        assert!(!ops.contains(&Op::SyncConfig));
        assert_eq!(ops.len(), 4);
    }

    #[test]
    fn test_check_skip() {
        assert!(check_skip(&["snapshotclone".to_string()]).is_ok());
        assert!(check_skip(&["etcd".to_string()]).is_err());
        assert!(check_skip(&[]).is_ok());
    }
}
