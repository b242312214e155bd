//! Network interface snapshot.

use ovirt_common::{NicId, VmId, VnicProfileId};
use serde::Serialize;

/// Point-in-time snapshot of a VM network interface.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Nic {
    pub(crate) id: NicId,
    pub(crate) name: String,
    pub(crate) vm_id: VmId,
    pub(crate) vnic_profile_id: VnicProfileId,
}

impl Nic {
    pub fn id(&self) -> &NicId {
        &self.id
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    /// VM the interface is plugged into.
    pub fn vm_id(&self) -> &VmId {
        &self.vm_id
    }

    pub fn vnic_profile_id(&self) -> &VnicProfileId {
        &self.vnic_profile_id
    }
}
