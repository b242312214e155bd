//! Tag snapshot.

use ovirt_common::TagId;
use serde::Serialize;

/// Point-in-time snapshot of a tag.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Tag {
    pub(crate) id: TagId,
    pub(crate) name: String,
    pub(crate) description: String,
}

impl Tag {
    pub fn id(&self) -> &TagId {
        &self.id
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn description(&self) -> &str {
        &self.description
    }
}
