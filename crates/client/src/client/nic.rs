use super::Client;
use crate::mapper;
use crate::models::Nic;
use crate::retry::{OperationClass, RetryStrategy};
use crate::wire;
use ovirt_common::{Error, NicId, Result, VmId, VnicProfileId};

impl Client {
    /// Add a network interface to a VM, connected through `vnic_profile_id`.
    ///
    /// # Errors
    /// Returns a bad-argument error if `name` is empty, or not-found if the
    /// VM or the vNIC profile does not exist.
    pub async fn create_nic(
        &self,
        vm_id: &VmId,
        name: &str,
        vnic_profile_id: &VnicProfileId,
        retries: &[RetryStrategy],
    ) -> Result<Nic> {
        if name.is_empty() {
            return Err(Error::bad_argument("NIC name must not be empty"));
        }
        let request = wire::Nic {
            name: Some(name.to_string()),
            vnic_profile: Some(wire::Link::to(vnic_profile_id.as_str())),
            ..Default::default()
        };

        tracing::info!(%vm_id, name, %vnic_profile_id, "Creating NIC");
        let created = self
            .retry(
                &format!("creating NIC {name} on VM {vm_id}"),
                OperationClass::Write,
                retries,
                move |_| {
                    let request = request.clone();
                    async move { self.api.create_nic(vm_id, request).await }
                },
            )
            .await?;
        mapper::nic_from_wire(created)
    }

    /// # Errors
    /// Returns not-found if the VM or the NIC does not exist.
    pub async fn get_nic(
        &self,
        vm_id: &VmId,
        id: &NicId,
        retries: &[RetryStrategy],
    ) -> Result<Nic> {
        tracing::debug!(%vm_id, nic_id = %id, "Fetching NIC");
        let nic = self
            .retry(
                &format!("getting NIC {id} of VM {vm_id}"),
                OperationClass::Read,
                retries,
                move |_| async move { self.api.get_nic(vm_id, id).await },
            )
            .await?;
        mapper::nic_from_wire(nic)
    }

    /// List the network interfaces of a VM.
    pub async fn list_nics(&self, vm_id: &VmId, retries: &[RetryStrategy]) -> Result<Vec<Nic>> {
        tracing::debug!(%vm_id, "Listing NICs");
        let nics = self
            .retry(
                &format!("listing NICs of VM {vm_id}"),
                OperationClass::Read,
                retries,
                move |_| async move { self.api.list_nics(vm_id).await },
            )
            .await?;
        nics.into_iter().map(mapper::nic_from_wire).collect()
    }

    /// Remove a network interface.
    ///
    /// # Errors
    /// Returns not-found if the NIC did not exist on the first attempt.
    pub async fn remove_nic(
        &self,
        vm_id: &VmId,
        id: &NicId,
        retries: &[RetryStrategy],
    ) -> Result<()> {
        tracing::info!(%vm_id, nic_id = %id, "Removing NIC");
        self.remove_with_retry(
            &format!("removing NIC {id} of VM {vm_id}"),
            retries,
            move || async move { self.api.remove_nic(vm_id, id).await },
        )
        .await
    }
}
