use super::Client;
use crate::api::{VmAction, VmFilter};
use crate::mapper;
use crate::models::{
    validate_vm_name, OptionalVmParameters, Tag, UpdateVmParameters, Vm, VmSearchParameters,
};
use crate::poll;
use crate::retry::{OperationClass, RetryStrategy};
use ovirt_common::{ClusterId, Result, TagId, TemplateId, VmId, VmStatus};

fn status_allowed(
    status: VmStatus,
    statuses: Option<&[VmStatus]>,
    not_statuses: Option<&[VmStatus]>,
) -> bool {
    // An empty accepted list places no constraint.
    let accepted = statuses.map_or(true, |list| list.is_empty() || list.contains(&status));
    let excluded = not_statuses.is_some_and(|list| list.contains(&status));
    accepted && !excluded
}

impl Client {
    /// Create a VM in `cluster_id` from `template_id`.
    ///
    /// # Arguments
    /// * `name` - VM name, checked locally before anything is sent
    /// * `params` - optional settings; unset ones are left to the engine
    /// * `retries` - strategies for this call, the write defaults apply if empty
    ///
    /// # Errors
    /// Returns a bad-argument error for an invalid name, not-found if the
    /// cluster or template does not exist, and a timeout error carrying the
    /// last failure when retries run out.
    pub async fn create_vm(
        &self,
        cluster_id: &ClusterId,
        template_id: &TemplateId,
        name: &str,
        params: &dyn OptionalVmParameters,
        retries: &[RetryStrategy],
    ) -> Result<Vm> {
        validate_vm_name(name)?;
        let request = mapper::to_create_vm_request(cluster_id, template_id, name, params);

        tracing::info!(%cluster_id, %template_id, name, "Creating VM");
        let created = self
            .retry(
                &format!("creating VM {name}"),
                OperationClass::Write,
                retries,
                move |_| {
                    let request = request.clone();
                    async move { self.api.create_vm(request).await }
                },
            )
            .await?;

        let vm = mapper::vm_from_wire(created)?;
        tracing::info!(vm_id = %vm.id(), name, "Created VM");
        Ok(vm)
    }

    /// Fetch a fresh snapshot of a VM.
    ///
    /// # Errors
    /// Returns not-found if the VM does not exist, or field-missing if the
    /// engine response lacks a mandatory field.
    pub async fn get_vm(&self, id: &VmId, retries: &[RetryStrategy]) -> Result<Vm> {
        tracing::debug!(vm_id = %id, "Fetching VM");
        let vm = self
            .retry(
                &format!("getting VM {id}"),
                OperationClass::Read,
                retries,
                move |_| async move { self.api.get_vm(id).await },
            )
            .await?;
        mapper::vm_from_wire(vm)
    }

    /// Change the name and/or comment of a VM. Unset parameters are left alone.
    ///
    /// # Errors
    /// Returns not-found if the VM does not exist.
    pub async fn update_vm(
        &self,
        id: &VmId,
        params: &dyn UpdateVmParameters,
        retries: &[RetryStrategy],
    ) -> Result<Vm> {
        let patch = mapper::to_update_vm_request(params);

        tracing::info!(vm_id = %id, name = ?patch.name, comment = ?patch.comment, "Updating VM");
        let updated = self
            .retry(
                &format!("updating VM {id}"),
                OperationClass::Write,
                retries,
                move |_| {
                    let patch = patch.clone();
                    async move { self.api.update_vm(id, patch).await }
                },
            )
            .await?;
        mapper::vm_from_wire(updated)
    }

    /// List every VM visible to the user.
    ///
    /// # Errors
    /// Returns field-missing if any listed VM cannot be converted.
    pub async fn list_vms(&self, retries: &[RetryStrategy]) -> Result<Vec<Vm>> {
        tracing::debug!("Listing VMs");
        let vms = self
            .retry("listing VMs", OperationClass::Read, retries, move |_| async move {
                self.api.list_vms().await
            })
            .await?;
        vms.into_iter().map(mapper::vm_from_wire).collect()
    }

    /// Find VMs matching every set filter. Name and tag are matched by the
    /// engine, statuses are filtered here.
    pub async fn search_vms(
        &self,
        params: &dyn VmSearchParameters,
        retries: &[RetryStrategy],
    ) -> Result<Vec<Vm>> {
        let filter = VmFilter {
            name: params.name(),
            tag: params.tag(),
        };
        let statuses = params.statuses();
        let not_statuses = params.not_statuses();

        tracing::debug!(?filter, ?statuses, ?not_statuses, "Searching VMs");
        let filter = &filter;
        let found = self
            .retry("searching VMs", OperationClass::Read, retries, move |_| async move {
                if filter.is_empty() {
                    self.api.list_vms().await
                } else {
                    self.api.search_vms(filter).await
                }
            })
            .await?;

        let mut vms = Vec::with_capacity(found.len());
        for vm in found {
            let vm = mapper::vm_from_wire(vm)?;
            if status_allowed(vm.status(), statuses.as_deref(), not_statuses.as_deref()) {
                vms.push(vm);
            }
        }
        Ok(vms)
    }

    /// Remove a VM.
    ///
    /// Not-found on a retried attempt counts as success, since an earlier
    /// attempt may have gone through with its response lost.
    ///
    /// # Errors
    /// Returns not-found if the VM did not exist on the first attempt. Use
    /// [`ResultExt::ignore_not_found`](ovirt_common::ResultExt) for cleanup.
    pub async fn remove_vm(&self, id: &VmId, retries: &[RetryStrategy]) -> Result<()> {
        tracing::info!(vm_id = %id, "Removing VM");
        self.remove_with_retry(&format!("removing VM {id}"), retries, move || async move {
            self.api.remove_vm(id).await
        })
        .await
    }

    async fn vm_action(
        &self,
        id: &VmId,
        action: VmAction,
        retries: &[RetryStrategy],
    ) -> Result<()> {
        tracing::info!(vm_id = %id, action = action.name(), "Running VM action");
        self.retry(
            &format!("running {} on VM {id}", action.name()),
            OperationClass::Write,
            retries,
            move |_| async move { self.api.vm_action(id, action).await },
        )
        .await
    }

    /// Start a VM. Returns once the engine accepted the request; use
    /// [`Client::wait_for_vm_status`] to wait for [`VmStatus::Up`].
    ///
    /// # Errors
    /// Returns not-found if the VM does not exist, or conflict while another
    /// operation holds the VM.
    pub async fn start_vm(&self, id: &VmId, retries: &[RetryStrategy]) -> Result<()> {
        self.vm_action(id, VmAction::Start, retries).await
    }

    /// Power off a VM. `force` also works while the VM is locked by another
    /// operation.
    pub async fn stop_vm(&self, id: &VmId, force: bool, retries: &[RetryStrategy]) -> Result<()> {
        self.vm_action(id, VmAction::Stop { force }, retries).await
    }

    /// Ask the guest OS to shut down.
    pub async fn shutdown_vm(
        &self,
        id: &VmId,
        force: bool,
        retries: &[RetryStrategy],
    ) -> Result<()> {
        self.vm_action(id, VmAction::Shutdown { force }, retries).await
    }

    /// Let the engine pick CPU pinning and NUMA settings for the VM.
    pub async fn auto_optimize_vm_cpu_pinning_settings(
        &self,
        id: &VmId,
        optimize: bool,
        retries: &[RetryStrategy],
    ) -> Result<()> {
        self.vm_action(id, VmAction::AutoPinCpuAndNumaNodes { optimize }, retries)
            .await
    }

    /// Attach an existing tag to a VM.
    ///
    /// # Errors
    /// Returns not-found if either the VM or the tag does not exist.
    pub async fn add_tag_to_vm(
        &self,
        id: &VmId,
        tag_id: &TagId,
        retries: &[RetryStrategy],
    ) -> Result<()> {
        tracing::info!(vm_id = %id, %tag_id, "Tagging VM");
        self.retry(
            &format!("adding tag {tag_id} to VM {id}"),
            OperationClass::Write,
            retries,
            move |_| async move { self.api.add_tag_to_vm(id, tag_id).await },
        )
        .await
    }

    /// Fetch the tags referenced by a VM snapshot.
    pub async fn vm_tags(&self, vm: &Vm, retries: &[RetryStrategy]) -> Result<Vec<Tag>> {
        let fetches = vm.tag_ids().iter().map(|id| self.get_tag(id, retries));
        futures::future::try_join_all(fetches).await
    }

    /// Poll the VM until it reports `status` and return that snapshot.
    ///
    /// # Errors
    /// Returns a timeout error naming the last observed status if the wait
    /// budget runs out. Non-retryable fetch errors end the wait at once.
    pub async fn wait_for_vm_status(
        &self,
        id: &VmId,
        status: VmStatus,
        retries: &[RetryStrategy],
    ) -> Result<Vm> {
        tracing::info!(vm_id = %id, %status, "Waiting for VM status");
        poll::wait_for_status(
            format!("VM {id}"),
            status,
            retries,
            &self.defaults,
            move || async move {
                let vm = self.get_vm(id, retries).await?;
                let current = vm.status();
                Ok((vm, current))
            },
        )
        .await
    }
}
