//! Disk and disk attachment snapshots.

use ovirt_common::{
    DiskAttachmentId, DiskFormat, DiskId, DiskInterface, DiskStatus, StorageDomainId, VmId,
};
use serde::Serialize;

/// Point-in-time snapshot of a disk.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Disk {
    pub(crate) id: DiskId,
    pub(crate) alias: String,
    pub(crate) provisioned_size: u64,
    pub(crate) format: DiskFormat,
    pub(crate) status: DiskStatus,
    pub(crate) storage_domain_ids: Vec<StorageDomainId>,
}

impl Disk {
    pub fn id(&self) -> &DiskId {
        &self.id
    }

    pub fn alias(&self) -> &str {
        &self.alias
    }

    /// Size visible to the guest, in bytes.
    pub fn provisioned_size(&self) -> u64 {
        self.provisioned_size
    }

    pub fn format(&self) -> DiskFormat {
        self.format
    }

    pub fn status(&self) -> DiskStatus {
        self.status
    }

    /// Storage domains holding the disk. May be empty.
    pub fn storage_domain_ids(&self) -> &[StorageDomainId] {
        &self.storage_domain_ids
    }
}

/// Point-in-time snapshot of a disk attached to a VM.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct DiskAttachment {
    pub(crate) id: DiskAttachmentId,
    pub(crate) vm_id: VmId,
    pub(crate) disk_id: DiskId,
    pub(crate) interface: DiskInterface,
    pub(crate) bootable: bool,
    pub(crate) active: bool,
}

impl DiskAttachment {
    pub fn id(&self) -> &DiskAttachmentId {
        &self.id
    }

    pub fn vm_id(&self) -> &VmId {
        &self.vm_id
    }

    pub fn disk_id(&self) -> &DiskId {
        &self.disk_id
    }

    pub fn interface(&self) -> DiskInterface {
        self.interface
    }

    pub fn bootable(&self) -> bool {
        self.bootable
    }

    pub fn active(&self) -> bool {
        self.active
    }
}
