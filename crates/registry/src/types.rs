//! Data types for the registry crate

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Container id recorded for a service whose container was removed
pub const CLEANED_CONTAINER_ID: &str = "-";

/// A registered cluster
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Cluster {
    pub id: i64,
    /// Stable identity mixed into every service id
    pub uuid: String,
    pub name: String,
    pub description: String,
    /// Topology document, as committed
    pub topology: String,
    pub created_at: DateTime<Utc>,
    /// Whether this is the checked out cluster
    pub current: bool,
}

/// A service of a cluster and the container backing it
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Service {
    pub service_id: String,
    pub cluster_id: i64,
    pub container_id: String,
}

impl Service {
    /// Whether a live container is bound to the service
    pub fn has_container(&self) -> bool {
        !self.container_id.is_empty() && self.container_id != CLEANED_CONTAINER_ID
    }
}
