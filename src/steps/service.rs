//! Steps that read and record service bindings in the registry

use playbook::{Outcome, Step, StepContext};
use registry::{CLEANED_CONTAINER_ID, Registry};
use std::sync::Arc;

use super::{SLOT_CONTAINER_ID, SLOT_OLD_CONTAINER_ID, Target};

/// Skip the task when the service already owns a container
pub struct GetService {
    pub registry: Arc<Registry>,
    pub service_id: String,
}

impl Step<Target> for GetService {
    fn name(&self) -> &str {
        "get service"
    }

    fn execute(&self, ctx: &mut StepContext<'_, Target>) -> Outcome {
        let old = match self.registry.get_container_id(&self.service_id) {
            Ok(id) => id.unwrap_or_default(),
            Err(e) => return Outcome::Fail(e.into()),
        };
        if !old.is_empty() && old != CLEANED_CONTAINER_ID {
            return Outcome::skip(format!("service {} already has a container", self.service_id));
        }
        ctx.set(SLOT_OLD_CONTAINER_ID, old);
        Outcome::Done
    }
}

/// Bind the container created earlier in the task to the service
pub struct InsertService {
    pub registry: Arc<Registry>,
    pub cluster_id: i64,
    pub service_id: String,
}

impl Step<Target> for InsertService {
    fn name(&self) -> &str {
        "insert service"
    }

    fn execute(&self, ctx: &mut StepContext<'_, Target>) -> Outcome {
        let container_id = match ctx.require(SLOT_CONTAINER_ID) {
            Ok(id) => id.to_string(),
            Err(e) => return Outcome::Fail(e),
        };
        let result = if ctx.get(SLOT_OLD_CONTAINER_ID) == Some(CLEANED_CONTAINER_ID) {
            self.registry.set_container_id(&self.service_id, &container_id)
        } else {
            self.registry
                .insert_service(self.cluster_id, &self.service_id, &container_id)
        };
        result.map_err(anyhow::Error::from).into()
    }
}

/// Record that the service's container is gone
pub struct MarkCleaned {
    pub registry: Arc<Registry>,
    pub service_id: String,
}

impl Step<Target> for MarkCleaned {
    fn name(&self) -> &str {
        "mark cleaned"
    }

    fn execute(&self, _ctx: &mut StepContext<'_, Target>) -> Outcome {
        self.registry
            .set_container_id(&self.service_id, CLEANED_CONTAINER_ID)
            .map_err(anyhow::Error::from)
            .into()
    }
}
