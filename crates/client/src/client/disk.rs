use super::Client;
use crate::mapper;
use crate::models::{CreateDiskAttachmentParams, CreateDiskParams, Disk, DiskAttachment};
use crate::poll;
use crate::retry::{OperationClass, RetryStrategy};
use crate::wire;
use ovirt_common::{
    DiskAttachmentId, DiskFormat, DiskId, DiskInterface, DiskStatus, Error, Result,
    StorageDomainId, VmId,
};

impl Client {
    /// Create a floating disk of `size` bytes. The disk is locked until the
    /// engine has allocated it; see [`Client::wait_for_disk_status`].
    ///
    /// # Errors
    /// Returns a bad-argument error if `size` is zero, or not-found if the
    /// storage domain does not exist.
    pub async fn create_disk(
        &self,
        storage_domain_id: &StorageDomainId,
        format: DiskFormat,
        size: u64,
        params: &CreateDiskParams,
        retries: &[RetryStrategy],
    ) -> Result<Disk> {
        if size == 0 {
            return Err(Error::bad_argument("disk size must be positive"));
        }
        let request = wire::Disk {
            alias: params.alias(),
            provisioned_size: Some(size),
            format: Some(format.as_str().to_string()),
            sparse: params.sparse(),
            storage_domains: Some(wire::StorageDomains {
                storage_domain: vec![wire::Link::to(storage_domain_id.as_str())],
            }),
            ..Default::default()
        };

        tracing::info!(%storage_domain_id, %format, size, alias = ?request.alias, "Creating disk");
        let created = self
            .retry("creating disk", OperationClass::Write, retries, move |_| {
                let request = request.clone();
                async move { self.api.create_disk(request).await }
            })
            .await?;

        let disk = mapper::disk_from_wire(created)?;
        tracing::info!(disk_id = %disk.id(), "Created disk");
        Ok(disk)
    }

    /// # Errors
    /// Returns not-found if the disk does not exist.
    pub async fn get_disk(&self, id: &DiskId, retries: &[RetryStrategy]) -> Result<Disk> {
        tracing::debug!(disk_id = %id, "Fetching disk");
        let disk = self
            .retry(
                &format!("getting disk {id}"),
                OperationClass::Read,
                retries,
                move |_| async move { self.api.get_disk(id).await },
            )
            .await?;
        mapper::disk_from_wire(disk)
    }

    pub async fn list_disks(&self, retries: &[RetryStrategy]) -> Result<Vec<Disk>> {
        tracing::debug!("Listing disks");
        let disks = self
            .retry("listing disks", OperationClass::Read, retries, move |_| async move {
                self.api.list_disks().await
            })
            .await?;
        disks.into_iter().map(mapper::disk_from_wire).collect()
    }

    /// Remove a disk.
    ///
    /// # Errors
    /// Returns not-found if the disk did not exist on the first attempt.
    pub async fn remove_disk(&self, id: &DiskId, retries: &[RetryStrategy]) -> Result<()> {
        tracing::info!(disk_id = %id, "Removing disk");
        self.remove_with_retry(&format!("removing disk {id}"), retries, move || async move {
            self.api.remove_disk(id).await
        })
        .await
    }

    /// Poll the disk until it reports `status`.
    ///
    /// # Errors
    /// Returns a timeout error naming the last observed status.
    pub async fn wait_for_disk_status(
        &self,
        id: &DiskId,
        status: DiskStatus,
        retries: &[RetryStrategy],
    ) -> Result<Disk> {
        tracing::info!(disk_id = %id, %status, "Waiting for disk status");
        poll::wait_for_status(
            format!("disk {id}"),
            status,
            retries,
            &self.defaults,
            move || async move {
                let disk = self.get_disk(id, retries).await?;
                let current = disk.status();
                Ok((disk, current))
            },
        )
        .await
    }

    /// Attach an existing disk to a VM.
    ///
    /// # Errors
    /// Returns not-found if the VM or disk does not exist, or a bad-argument
    /// error if the disk is already attached to that VM.
    pub async fn create_disk_attachment(
        &self,
        vm_id: &VmId,
        disk_id: &DiskId,
        interface: DiskInterface,
        params: &CreateDiskAttachmentParams,
        retries: &[RetryStrategy],
    ) -> Result<DiskAttachment> {
        let request = wire::DiskAttachment {
            disk: Some(wire::Link::to(disk_id.as_str())),
            interface: Some(interface.as_str().to_string()),
            bootable: params.bootable(),
            active: params.active(),
            ..Default::default()
        };

        tracing::info!(%vm_id, %disk_id, %interface, "Attaching disk");
        let created = self
            .retry(
                &format!("attaching disk {disk_id} to VM {vm_id}"),
                OperationClass::Write,
                retries,
                move |_| {
                    let request = request.clone();
                    async move { self.api.create_disk_attachment(vm_id, request).await }
                },
            )
            .await?;
        mapper::disk_attachment_from_wire(created)
    }

    /// # Errors
    /// Returns not-found if the VM or the attachment does not exist.
    pub async fn get_disk_attachment(
        &self,
        vm_id: &VmId,
        id: &DiskAttachmentId,
        retries: &[RetryStrategy],
    ) -> Result<DiskAttachment> {
        tracing::debug!(%vm_id, attachment_id = %id, "Fetching disk attachment");
        let attachment = self
            .retry(
                &format!("getting disk attachment {id} of VM {vm_id}"),
                OperationClass::Read,
                retries,
                move |_| async move { self.api.get_disk_attachment(vm_id, id).await },
            )
            .await?;
        mapper::disk_attachment_from_wire(attachment)
    }

    /// List the disks attached to a VM.
    pub async fn list_disk_attachments(
        &self,
        vm_id: &VmId,
        retries: &[RetryStrategy],
    ) -> Result<Vec<DiskAttachment>> {
        tracing::debug!(%vm_id, "Listing disk attachments");
        let attachments = self
            .retry(
                &format!("listing disk attachments of VM {vm_id}"),
                OperationClass::Read,
                retries,
                move |_| async move { self.api.list_disk_attachments(vm_id).await },
            )
            .await?;
        attachments
            .into_iter()
            .map(mapper::disk_attachment_from_wire)
            .collect()
    }

    /// Detach a disk from a VM. The disk itself is kept.
    pub async fn remove_disk_attachment(
        &self,
        vm_id: &VmId,
        id: &DiskAttachmentId,
        retries: &[RetryStrategy],
    ) -> Result<()> {
        tracing::info!(%vm_id, attachment_id = %id, "Detaching disk");
        self.remove_with_retry(
            &format!("removing disk attachment {id} of VM {vm_id}"),
            retries,
            move || async move { self.api.remove_disk_attachment(vm_id, id).await },
        )
        .await
    }
}
