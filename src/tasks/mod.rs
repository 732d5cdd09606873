//! Task factories for every cluster operation
//!
//! Each [`Op`] maps to a factory building one [`Task`] per service instance.
//! Factories run when their phase is compiled, so a phase sees the registry
//! as left by the phases before it.

mod container;
mod service;
mod status;

pub use service::CLEAN_ITEMS;
pub use status::{STATUS_CLEANED, STATUS_LOSED, StatusRow, StatusTable};

use anyhow::Result;
use playbook::{Compiler, Options, Task};
use std::fmt;
use std::sync::Arc;
use topology::{Role, ServiceInstance};

use crate::session::Session;
use crate::steps::Target;
use crate::steps::container::short_id;

/// Roles to leave out (`--skip`)
pub const OPT_SKIP: &str = "skip";
/// What `clean` removes (`--only`)
pub const OPT_ONLY: &str = "only";

/// Operations a playbook step can run
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Op {
    PullImage,
    CreateContainer,
    SyncConfig,
    /// Start the containers of one role during deploy
    StartRole(Role),
    EnableEtcdAuth,
    CheckStoreHealth,
    CreateMetaTables,
    StartService,
    StopService,
    RestartService,
    CleanService,
    ServiceStatus,
}

impl fmt::Display for Op {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::PullImage => f.write_str("Pull Image"),
            Self::CreateContainer => f.write_str("Create Container"),
            Self::SyncConfig => f.write_str("Sync Config"),
            Self::StartRole(role) => write!(f, "Start {role}"),
            Self::EnableEtcdAuth => f.write_str("Enable etcd Auth"),
            Self::CheckStoreHealth => f.write_str("Check Store Health"),
            Self::CreateMetaTables => f.write_str("Create Meta Tables"),
            Self::StartService => f.write_str("Start Service"),
            Self::StopService => f.write_str("Stop Service"),
            Self::RestartService => f.write_str("Restart Service"),
            Self::CleanService => f.write_str("Clean Service"),
            Self::ServiceStatus => f.write_str("Service Status"),
        }
    }
}

impl Op {
    /// Role whose instances the operation targets; `None` means all
    pub fn role(self) -> Option<Role> {
        match self {
            Self::StartRole(role) => Some(role),
            Self::EnableEtcdAuth => Some(Role::Etcd),
            Self::CheckStoreHealth => Some(Role::Store),
            Self::CreateMetaTables => Some(Role::Tmp),
            _ => None,
        }
    }

    /// Whether the operation runs on a single instance of its role
    pub fn single(self) -> bool {
        matches!(
            self,
            Self::EnableEtcdAuth | Self::CheckStoreHealth | Self::CreateMetaTables
        )
    }
}

type Instance = Arc<ServiceInstance>;

/// Whether `--skip` names the instance's role
fn skipped(dc: &ServiceInstance, options: &Options) -> bool {
    options
        .get_strings(OPT_SKIP)
        .iter()
        .any(|role| role == dc.role().as_str())
}

/// `host=.. role=.. containerId=..` shown next to a task
pub fn subname(dc: &ServiceInstance, container_id: &str) -> String {
    format!(
        "host={} role={} containerId={}",
        dc.host(),
        dc.role(),
        short_id(container_id)
    )
}

/// Factory signature shared by every operation
type Factory = fn(&Session, &Instance, &Options) -> Result<Option<Task<Target>>>;

fn bind(
    compiler: &mut Compiler<Op, Instance, Target>,
    session: &Arc<Session>,
    op: Op,
    factory: Factory,
) {
    let session = Arc::clone(session);
    compiler.register(op, move |dc: &Instance, options: &Options| {
        if skipped(dc, options) {
            log::debug!("{op}: skipping {}", dc.id());
            return Ok(None);
        }
        factory(&session, dc, options)
    });
}

/// Compiler knowing every operation but [`Op::ServiceStatus`]
pub fn compiler(session: &Arc<Session>) -> Compiler<Op, Instance, Target> {
    let mut compiler = Compiler::new();
    bind(&mut compiler, session, Op::PullImage, container::pull_image);
    bind(&mut compiler, session, Op::CreateContainer, container::create_container);
    bind(&mut compiler, session, Op::SyncConfig, service::sync_config);
    for role in Role::ALL {
        bind(&mut compiler, session, Op::StartRole(role), service::start_service);
    }
    bind(&mut compiler, session, Op::EnableEtcdAuth, service::enable_etcd_auth);
    bind(&mut compiler, session, Op::CheckStoreHealth, service::check_store_health);
    bind(&mut compiler, session, Op::CreateMetaTables, service::create_meta_tables);
    bind(&mut compiler, session, Op::StartService, service::start_service);
    bind(&mut compiler, session, Op::StopService, service::stop_service);
    bind(&mut compiler, session, Op::RestartService, service::restart_service);
    bind(&mut compiler, session, Op::CleanService, service::clean_service);
    compiler
}

/// Register the status operation, gathering rows into `table`
pub fn register_status(
    compiler: &mut Compiler<Op, Instance, Target>,
    session: &Arc<Session>,
    table: &StatusTable,
) {
    let session = Arc::clone(session);
    let table = table.clone();
    compiler.register(Op::ServiceStatus, move |dc: &Instance, _: &Options| {
        status::service_status(&session, dc, &table)
    });
}
