//! Selecting instances by id, role and host

use crate::instance::ServiceInstance;

/// Matches everything
pub const WILDCARD: &str = "*";

/// Instance selector; each field is `*` or an exact value
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Filter {
    pub id: String,
    pub role: String,
    pub host: String,
}

impl Default for Filter {
    fn default() -> Self {
        Self {
            id: WILDCARD.to_string(),
            role: WILDCARD.to_string(),
            host: WILDCARD.to_string(),
        }
    }
}

impl Filter {
    pub fn new(id: impl Into<String>, role: impl Into<String>, host: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            role: role.into(),
            host: host.into(),
        }
    }

    /// `id` matches either the instance id or its registry service id
    pub fn matches(&self, dc: &ServiceInstance, service_id: &str) -> bool {
        let hit = |pattern: &str, value: &str| pattern == WILDCARD || pattern == value;
        (hit(&self.id, dc.id()) || hit(&self.id, service_id))
            && hit(&self.role, dc.role().as_str())
            && hit(&self.host, dc.host())
    }

    pub fn is_wildcard(&self) -> bool {
        self.id == WILDCARD && self.role == WILDCARD && self.host == WILDCARD
    }
}
