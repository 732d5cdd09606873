//! # Topology
//!
//! Cluster topology expansion and service configuration resolution.
//!
//! This crate provides functionality to:
//! - Parse YAML cluster declarations (`<role>_services` sections)
//! - Expand them into one [`ServiceInstance`] per replica, layering global,
//!   role and host config
//! - Resolve config keys against an explicit [`Schema`] of typed items and
//!   defaults
//! - Inject per-instance and cluster-wide variables and render `${name}`
//!   templates
//!
//! ## Example
//!
//! ```
//! use topology::{Context, parse_topology};
//!
//! let text = "
//! kind: dingo-store
//! global:
//!   data_dir: /data
//! coordinator_services:
//!   deploy:
//!     - host: h1
//!       instances: 3
//! ";
//! let instances = parse_topology(text, Context::new())?;
//! assert_eq!(instances.len(), 3);
//! assert_eq!(instances[0].id(), "coordinator_h1_0");
//! assert_eq!(instances[2].data_dir(), "/data");
//! # Ok::<(), topology::Error>(())
//! ```

mod context;
mod document;
mod error;
mod expand;
mod filter;
mod instance;
mod kind;
mod layout;
mod schema;
mod service_vars;
mod value;
mod variables;

pub use context::{Context, KEY_MDS_VERSION};
pub use document::{DeployEntry, ServiceSection, Topology};
pub use error::{Error, Result};
pub use expand::{expand, merge, parse_topology, roles_for};
pub use filter::{Filter, WILDCARD};
pub use instance::{InstanceSpec, ServiceInstance, format_id};
pub use kind::{ClusterKind, Role};
pub use layout::{ConfFileLayout, Layout};
pub use schema::{ConfFile, ConfigItem, DefaultValue, Require, Schema, keys};
pub use service_vars::{
    add_cluster_variables, add_peer_variables, add_service_variables, cluster_variables, peer_list,
};
pub use value::{ConfigMap, Value};
pub use variables::{Variable, VariableValue, Variables};
