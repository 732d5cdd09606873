//! Service lifecycle, config sync and one-shot cluster setup

use anyhow::{Result, bail};
use playbook::{Options, Task};
use std::sync::Arc;
use std::time::Duration;
use topology::{ServiceInstance, keys};

use super::{OPT_ONLY, Op, subname};
use crate::session::Session;
use crate::steps::container::{
    CheckContainerExists, ContainerExec, ContainerLifecycle, Lifecycle, WaitRunning,
};
use crate::steps::file::{InstallFile, Mutate, SyncFile};
use crate::steps::service::MarkCleaned;
use crate::steps::shell::RemoveFiles;
use crate::steps::{ContainerRef, Target};

/// What `clean` may remove
pub const CLEAN_ITEMS: [&str; 3] = ["log", "data", "container"];

const WAIT_ATTEMPTS: usize = 5;
const WAIT_INTERVAL: Duration = Duration::from_secs(1);

/// Task on an already deployed service, starting with an existence check
fn service_task(
    session: &Session,
    dc: &ServiceInstance,
    name: impl Into<String>,
) -> Result<(Task<Target>, String)> {
    let service_id = session.service_id(dc.id());
    let container_id = session.container_id(&service_id)?;
    let task = Task::new(name, subname(dc, &container_id), session.target(dc.host())?)
        .with_step(CheckContainerExists {
            container: ContainerRef::Id(container_id.clone()),
            description: format!("host={} role={}", dc.host(), dc.role()),
        });
    Ok((task, container_id))
}

fn wait_running(container_id: &str) -> WaitRunning {
    WaitRunning {
        container: container_id.into(),
        attempts: WAIT_ATTEMPTS,
        interval: WAIT_INTERVAL,
    }
}

pub fn start_service(
    session: &Session,
    dc: &Arc<ServiceInstance>,
    _options: &Options,
) -> Result<Option<Task<Target>>> {
    let (task, id) = service_task(session, dc, Op::StartService.to_string())?;
    let task = task
        .with_step(ContainerLifecycle::new(Lifecycle::Start, id.as_str()))
        .with_step(wait_running(&id));
    Ok(Some(task))
}

pub fn stop_service(
    session: &Session,
    dc: &Arc<ServiceInstance>,
    _options: &Options,
) -> Result<Option<Task<Target>>> {
    let (task, id) = service_task(session, dc, Op::StopService.to_string())?;
    Ok(Some(
        task.with_step(ContainerLifecycle::new(Lifecycle::Stop, id.as_str())),
    ))
}

pub fn restart_service(
    session: &Session,
    dc: &Arc<ServiceInstance>,
    _options: &Options,
) -> Result<Option<Task<Target>>> {
    let (task, id) = service_task(session, dc, Op::RestartService.to_string())?;
    let task = task
        .with_step(ContainerLifecycle::new(Lifecycle::Restart, id.as_str()))
        .with_step(wait_running(&id));
    Ok(Some(task))
}

/// Rewrites `key<delimiter>value` lines from the instance's service config
///
/// Values, overridden or not, have variables rendered. Other lines pass
/// through untouched.
pub fn config_mutate(dc: &Arc<ServiceInstance>, delimiter: &'static str) -> Mutate {
    let dc = Arc::clone(dc);
    Arc::new(move |line: &str, key: &str, value: &str| -> Result<String> {
        if key.is_empty() {
            return Ok(line.to_string());
        }
        let value = dc
            .service_config()
            .get(&key.to_lowercase())
            .map_or(value, String::as_str);
        let value = dc.variables().render(value)?;
        Ok(format!("{key}{delimiter}{value}"))
    })
}

pub fn sync_config(
    session: &Session,
    dc: &Arc<ServiceInstance>,
    _options: &Options,
) -> Result<Option<Task<Target>>> {
    let (mut task, id) = service_task(session, dc, Op::SyncConfig.to_string())?;
    if dc.role().is_store_family() {
        // raft servers are configured through their environment
        return Ok(Some(task));
    }
    for conf in dc.layout().conf_files {
        task.add_step(SyncFile {
            container: id.as_str().into(),
            source: conf.source_path,
            dest: conf.path,
            delimiter: conf.delimiter,
            mutate: config_mutate(dc, conf.delimiter),
        });
    }
    Ok(Some(task))
}

pub fn enable_etcd_auth(
    session: &Session,
    dc: &Arc<ServiceInstance>,
    _options: &Options,
) -> Result<Option<Task<Target>>> {
    let user = dc.get_string(keys::ETCD_AUTH_USERNAME);
    let password = dc.get_string(keys::ETCD_AUTH_PASSWORD);
    if user.is_empty() || password.is_empty() {
        bail!(
            "{}: {} and {} are required when etcd auth is enabled",
            dc.id(),
            keys::ETCD_AUTH_USERNAME,
            keys::ETCD_AUTH_PASSWORD
        );
    }

    let endpoints = dc.variables().get("cluster_etcd_addr").unwrap_or_default();
    let etcdctl = format!(
        "ETCDCTL_API=3 {}/etcdctl --endpoints={endpoints}",
        dc.layout().service_bin_dir
    );
    let command = format!(
        "{etcdctl} user add {user}:{password} && {etcdctl} user grant-role {user} root && {etcdctl} auth enable"
    );

    let (task, id) = service_task(session, dc, Op::EnableEtcdAuth.to_string())?;
    Ok(Some(task.with_step(ContainerExec {
        container: id.as_str().into(),
        command,
        out: None,
    })))
}

pub fn check_store_health(
    session: &Session,
    dc: &Arc<ServiceInstance>,
    _options: &Options,
) -> Result<Option<Task<Target>>> {
    let (task, id) = service_task(session, dc, Op::CheckStoreHealth.to_string())?;
    Ok(Some(task.with_step(ContainerExec {
        container: id.as_str().into(),
        command: format!("bash {}/scripts/check_store_health.sh", dc.layout().service_root),
        out: None,
    })))
}

/// Script creating the metadata tables of `mdsv2` through the coordinators
pub fn meta_tables_script(dc: &ServiceInstance) -> Result<String> {
    let template = "#!/usr/bin/env bash\n\
        set -e\n\
        ${prefix}/sbin/dingo-mdsv2-client --cmd=CreateAllTable --coor_addr=list://${cluster_coor_srv_peers}\n";
    Ok(dc.variables().render(template)?)
}

pub fn create_meta_tables(
    session: &Session,
    dc: &Arc<ServiceInstance>,
    _options: &Options,
) -> Result<Option<Task<Target>>> {
    let path = format!("{}/create_mdsv2_tables.sh", dc.layout().service_bin_dir);
    let content = meta_tables_script(dc)?;

    let (task, id) = service_task(session, dc, Op::CreateMetaTables.to_string())?;
    let task = task
        .with_step(InstallFile {
            container: id.as_str().into(),
            path: path.clone(),
            content,
        })
        .with_step(ContainerExec {
            container: id.as_str().into(),
            command: format!("bash {path}"),
            out: None,
        });
    Ok(Some(task))
}

pub fn clean_service(
    session: &Session,
    dc: &Arc<ServiceInstance>,
    options: &Options,
) -> Result<Option<Task<Target>>> {
    let mut only = options.get_strings(OPT_ONLY);
    if only.is_empty() {
        only = CLEAN_ITEMS.iter().map(ToString::to_string).collect();
    }
    let wants = |item: &str| only.iter().any(|o| o == item);

    let service_id = session.service_id(dc.id());
    let container_id = session.container_id_or_default(&service_id)?;
    let mut task = Task::new(
        Op::CleanService.to_string(),
        subname(dc, &container_id),
        session.target(dc.host())?,
    );

    let mut paths = Vec::new();
    if wants("log") {
        paths.push(dc.log_dir());
    }
    if wants("data") {
        paths.push(dc.data_dir());
        if dc.role().is_store_family() {
            paths.push(dc.raft_dir());
        }
    }
    task.add_step(RemoveFiles { paths });

    let live = !container_id.is_empty() && container_id != registry::CLEANED_CONTAINER_ID;
    if wants("container") && live {
        task.add_step(ContainerLifecycle::new(Lifecycle::Stop, container_id.as_str()))
            .add_step(ContainerLifecycle::new(Lifecycle::Remove, container_id.as_str()))
            .add_step(MarkCleaned {
                registry: Arc::clone(&session.registry),
                service_id,
            });
    }
    Ok(Some(task))
}
