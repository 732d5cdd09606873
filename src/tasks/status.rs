//! Gathering service status rows

use anyhow::Result;
use playbook::{Lambda, Outcome, Task};
use registry::CLEANED_CONTAINER_ID;
use std::sync::{Arc, Mutex};
use topology::{Role, ServiceInstance};

use super::{Op, subname};
use crate::session::Session;
use crate::steps::container::{ContainerStatus, short_id};
use crate::steps::{SLOT_STATUS, Target};

pub const STATUS_CLEANED: &str = "Cleaned";
pub const STATUS_LOSED: &str = "Losed";

/// One line of `stackadm status`
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StatusRow {
    pub id: String,
    pub parent_id: String,
    pub role: Role,
    pub host: String,
    pub host_sequence: usize,
    pub instance_sequence: usize,
    /// `<shown>/<declared>` instances
    pub instances: String,
    pub container_id: String,
    pub status: String,
    pub ports: String,
    pub log_dir: String,
    pub data_dir: String,
}

/// Rows shared by every status task of a run
#[derive(Debug, Clone, Default)]
pub struct StatusTable(Arc<Mutex<Vec<StatusRow>>>);

impl StatusTable {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn insert(&self, row: StatusRow) {
        let mut rows = match self.0.lock() {
            Ok(guard) => guard,
            Err(poisoned) => poisoned.into_inner(),
        };
        rows.retain(|r| r.id != row.id);
        rows.push(row);
    }

    /// Rows ordered by role, then host and instance
    pub fn rows(&self) -> Vec<StatusRow> {
        let mut rows = match self.0.lock() {
            Ok(guard) => guard.clone(),
            Err(poisoned) => poisoned.into_inner().clone(),
        };
        rows.sort_by(|a, b| {
            (a.role, a.host_sequence, a.instance_sequence)
                .cmp(&(b.role, b.host_sequence, b.instance_sequence))
        });
        rows
    }
}

fn ports(dc: &ServiceInstance) -> String {
    let ports = match dc.role() {
        Role::Etcd => vec![dc.listen_port(), dc.listen_client_port()],
        r if r.is_store_family() => vec![dc.server_port(), dc.raft_port()],
        _ => vec![dc.listen_port(), dc.listen_dummy_port()],
    };
    ports
        .into_iter()
        .filter(|p| *p > 0)
        .map(|p| p.to_string())
        .collect::<Vec<_>>()
        .join(",")
}

/// Status shown for a container given its `ps` status line
fn describe(container_id: &str, ps_status: &str) -> String {
    if container_id == CLEANED_CONTAINER_ID {
        STATUS_CLEANED.to_string()
    } else if ps_status.is_empty() {
        STATUS_LOSED.to_string()
    } else {
        ps_status.to_string()
    }
}

pub fn service_status(
    session: &Session,
    dc: &Arc<ServiceInstance>,
    table: &StatusTable,
) -> Result<Option<Task<Target>>> {
    let service_id = session.service_id(dc.id());
    let container_id = session.container_id_or_default(&service_id)?;
    let row = StatusRow {
        id: service_id,
        parent_id: dc.parent_id().to_string(),
        role: dc.role(),
        host: dc.host().to_string(),
        host_sequence: dc.host_sequence(),
        instance_sequence: dc.instance_sequence(),
        instances: format!("1/{}", dc.instances()),
        container_id: short_id(&container_id).to_string(),
        status: String::new(),
        ports: ports(dc),
        log_dir: dc.log_dir(),
        data_dir: dc.data_dir(),
    };

    let mut task = Task::new(
        Op::ServiceStatus.to_string(),
        subname(dc, &container_id),
        session.target(dc.host())?,
    );
    let live = !container_id.is_empty() && container_id != CLEANED_CONTAINER_ID;
    if live {
        task.add_step(ContainerStatus {
            container: container_id.as_str().into(),
        });
    }
    let table = table.clone();
    task.add_step(Lambda::new("record status", move |ctx| {
        let ps_status = ctx.get(SLOT_STATUS).unwrap_or_default();
        table.insert(StatusRow {
            status: describe(&container_id, ps_status),
            ..row.clone()
        });
        Outcome::Done
    }));
    Ok(Some(task))
}
