//! Transport seam between [`Client`](crate::Client) and the engine.

use crate::wire;
use async_trait::async_trait;
use ovirt_common::{
    DiskAttachmentId, DiskId, NicId, Result, TagId, TemplateId, VmId,
};

/// Server-side VM search filter. Set fields are combined with AND.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct VmFilter {
    pub name: Option<String>,
    /// Tag name.
    pub tag: Option<String>,
}

impl VmFilter {
    pub fn is_empty(&self) -> bool {
        self.name.is_none() && self.tag.is_none()
    }
}

/// Lifecycle action on a VM.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum VmAction {
    Start,
    /// Power off.
    Stop { force: bool },
    /// ACPI shutdown.
    Shutdown { force: bool },
    /// Let the engine pick CPU pinning and NUMA settings.
    AutoPinCpuAndNumaNodes { optimize: bool },
}

impl VmAction {
    /// Engine action name.
    pub fn name(&self) -> &'static str {
        match self {
            VmAction::Start => "start",
            VmAction::Stop { .. } => "stop",
            VmAction::Shutdown { .. } => "shutdown",
            VmAction::AutoPinCpuAndNumaNodes { .. } => "autopincpuandnumanodes",
        }
    }

    /// Request body for the action.
    pub fn body(&self) -> wire::Action {
        match *self {
            VmAction::Start => wire::Action::default(),
            VmAction::Stop { force } | VmAction::Shutdown { force } => wire::Action {
                force: Some(force),
                ..Default::default()
            },
            VmAction::AutoPinCpuAndNumaNodes { optimize } => wire::Action {
                optimize_cpu_settings: Some(optimize),
                ..Default::default()
            },
        }
    }
}

/// One method per remote call. Implementations perform a single attempt;
/// retries happen in the client.
///
/// A missing resource must be reported as a not-found error so that callers
/// can rely on idempotent removal.
#[async_trait]
pub trait OvirtApi: Send + Sync {
    /// Create a VM.
    ///
    /// # Arguments
    /// * `vm` - request carrying name, cluster, template and optional settings
    ///
    /// # Returns
    /// The VM as stored by the engine, including its new ID.
    ///
    /// # Errors
    /// Returns not-found if the cluster or template does not exist, or a
    /// bad-argument error if the name is taken.
    async fn create_vm(&self, vm: wire::Vm) -> Result<wire::Vm>;

    /// Fetch one VM.
    ///
    /// # Errors
    /// Returns not-found if the VM doesn't exist.
    async fn get_vm(&self, id: &VmId) -> Result<wire::Vm>;

    /// Apply a patch. Fields that are `None` are left unchanged.
    async fn update_vm(&self, id: &VmId, patch: wire::Vm) -> Result<wire::Vm>;

    /// List all VMs.
    async fn list_vms(&self) -> Result<Vec<wire::Vm>>;

    /// List VMs matching the name and tag of `filter`.
    async fn search_vms(&self, filter: &VmFilter) -> Result<Vec<wire::Vm>>;

    /// Remove a VM together with its NICs and disk attachments.
    ///
    /// # Errors
    /// Returns not-found if the VM doesn't exist.
    async fn remove_vm(&self, id: &VmId) -> Result<()>;

    /// Trigger a lifecycle action. The status change is observed later.
    ///
    /// # Errors
    /// Returns not-found if the VM doesn't exist, or conflict while another
    /// operation holds it.
    async fn vm_action(&self, id: &VmId, action: VmAction) -> Result<()>;

    /// Attach a tag to a VM.
    async fn add_tag_to_vm(&self, id: &VmId, tag_id: &TagId) -> Result<()>;

    /// Create a template from the VM referenced in `template.vm`.
    async fn create_template(&self, template: wire::Template) -> Result<wire::Template>;

    /// Fetch one template.
    async fn get_template(&self, id: &TemplateId) -> Result<wire::Template>;

    /// List all templates, the blank template included.
    async fn list_templates(&self) -> Result<Vec<wire::Template>>;

    /// Remove a template.
    async fn remove_template(&self, id: &TemplateId) -> Result<()>;

    /// Create a tag. Tag names are unique.
    async fn create_tag(&self, tag: wire::Tag) -> Result<wire::Tag>;

    /// Fetch one tag.
    async fn get_tag(&self, id: &TagId) -> Result<wire::Tag>;

    /// List all tags.
    async fn list_tags(&self) -> Result<Vec<wire::Tag>>;

    /// Remove a tag and drop it from every VM.
    async fn remove_tag(&self, id: &TagId) -> Result<()>;

    /// Add a NIC to a VM.
    async fn create_nic(&self, vm_id: &VmId, nic: wire::Nic) -> Result<wire::Nic>;

    /// Fetch one NIC of a VM.
    async fn get_nic(&self, vm_id: &VmId, id: &NicId) -> Result<wire::Nic>;

    /// List the NICs of a VM.
    async fn list_nics(&self, vm_id: &VmId) -> Result<Vec<wire::Nic>>;

    /// Remove a NIC from a VM.
    async fn remove_nic(&self, vm_id: &VmId, id: &NicId) -> Result<()>;

    /// Create a floating disk.
    async fn create_disk(&self, disk: wire::Disk) -> Result<wire::Disk>;

    /// Fetch one disk.
    async fn get_disk(&self, id: &DiskId) -> Result<wire::Disk>;

    /// List all disks.
    async fn list_disks(&self) -> Result<Vec<wire::Disk>>;

    /// Remove a disk.
    async fn remove_disk(&self, id: &DiskId) -> Result<()>;

    /// Attach a disk to a VM.
    async fn create_disk_attachment(
        &self,
        vm_id: &VmId,
        attachment: wire::DiskAttachment,
    ) -> Result<wire::DiskAttachment>;

    /// Fetch one disk attachment of a VM.
    async fn get_disk_attachment(
        &self,
        vm_id: &VmId,
        id: &DiskAttachmentId,
    ) -> Result<wire::DiskAttachment>;

    /// List the disk attachments of a VM.
    async fn list_disk_attachments(&self, vm_id: &VmId) -> Result<Vec<wire::DiskAttachment>>;

    /// Detach a disk from a VM.
    async fn remove_disk_attachment(&self, vm_id: &VmId, id: &DiskAttachmentId) -> Result<()>;
}
