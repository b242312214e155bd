//! Template snapshot.

use ovirt_common::{TemplateId, TemplateStatus};
use serde::Serialize;

/// Point-in-time snapshot of a template.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Template {
    pub(crate) id: TemplateId,
    pub(crate) name: String,
    pub(crate) description: String,
    pub(crate) status: TemplateStatus,
}

impl Template {
    pub fn id(&self) -> &TemplateId {
        &self.id
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn description(&self) -> &str {
        &self.description
    }

    pub fn status(&self) -> TemplateStatus {
        self.status
    }
}
