//! Paths inside a service container

use crate::instance::ServiceInstance;
use crate::schema::keys;

/// A config file as synced into the container
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ConfFileLayout {
    pub name: String,
    /// Template shipped in the image
    pub source_path: String,
    /// Rendered file read by the service
    pub path: String,
    pub delimiter: &'static str,
}

/// Container-side directory layout of one instance
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Layout {
    pub project_root: String,
    pub service_root: String,
    pub service_bin_dir: String,
    pub service_conf_dir: String,
    pub service_log_dir: String,
    pub service_data_dir: String,
    pub service_raft_dir: String,
    pub core_system_dir: String,
    pub conf_files: Vec<ConfFileLayout>,
}

impl Layout {
    pub fn new(dc: &ServiceInstance) -> Self {
        let service_root = dc.prefix();
        let project_root = match service_root.rsplit_once('/') {
            Some(("", _)) | None => service_root.clone(),
            Some((parent, _)) => parent.to_string(),
        };
        let service_conf_dir = format!("{service_root}/conf");

        let conf_files = dc
            .schema()
            .conf_files(dc.role())
            .iter()
            .map(|f| ConfFileLayout {
                name: f.name.to_string(),
                source_path: format!("{project_root}/conf/{}", f.name),
                path: format!("{service_conf_dir}/{}", f.name),
                delimiter: f.delimiter,
            })
            .collect();

        Self {
            service_bin_dir: format!("{service_root}/sbin"),
            service_log_dir: format!("{service_root}/logs"),
            service_data_dir: format!("{service_root}/data"),
            service_raft_dir: format!("{service_root}/raft"),
            core_system_dir: dc.get_string(keys::TARGET_CORE_DIR),
            conf_files,
            service_conf_dir,
            project_root,
            service_root,
        }
    }
}

impl ServiceInstance {
    pub fn layout(&self) -> Layout {
        Layout::new(self)
    }
}
