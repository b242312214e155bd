use super::Client;
use crate::mapper;
use crate::models::Template;
use crate::poll;
use crate::retry::{OperationClass, RetryStrategy};
use crate::wire;
use ovirt_common::{Result, TemplateId, TemplateStatus, VmId};

impl Client {
    /// Create a template from an existing VM. The template starts out locked
    /// while the engine copies the VM's disks.
    ///
    /// # Errors
    /// Returns not-found if the VM does not exist.
    pub async fn create_template(
        &self,
        vm_id: &VmId,
        name: &str,
        description: &str,
        retries: &[RetryStrategy],
    ) -> Result<Template> {
        let request = wire::Template {
            name: Some(name.to_string()),
            description: Some(description.to_string()),
            vm: Some(wire::Link::to(vm_id.as_str())),
            ..Default::default()
        };

        tracing::info!(%vm_id, name, "Creating template");
        let created = self
            .retry(
                &format!("creating template {name}"),
                OperationClass::Write,
                retries,
                move |_| {
                    let request = request.clone();
                    async move { self.api.create_template(request).await }
                },
            )
            .await?;

        let template = mapper::template_from_wire(created)?;
        tracing::info!(template_id = %template.id(), name, "Created template");
        Ok(template)
    }

    /// # Errors
    /// Returns not-found if the template does not exist.
    pub async fn get_template(
        &self,
        id: &TemplateId,
        retries: &[RetryStrategy],
    ) -> Result<Template> {
        tracing::debug!(template_id = %id, "Fetching template");
        let template = self
            .retry(
                &format!("getting template {id}"),
                OperationClass::Read,
                retries,
                move |_| async move { self.api.get_template(id).await },
            )
            .await?;
        mapper::template_from_wire(template)
    }

    pub async fn list_templates(&self, retries: &[RetryStrategy]) -> Result<Vec<Template>> {
        tracing::debug!("Listing templates");
        let templates = self
            .retry("listing templates", OperationClass::Read, retries, move |_| async move {
                self.api.list_templates().await
            })
            .await?;
        templates.into_iter().map(mapper::template_from_wire).collect()
    }

    /// Remove a template. The blank template cannot be removed.
    pub async fn remove_template(&self, id: &TemplateId, retries: &[RetryStrategy]) -> Result<()> {
        tracing::info!(template_id = %id, "Removing template");
        self.remove_with_retry(&format!("removing template {id}"), retries, move || async move {
            self.api.remove_template(id).await
        })
        .await
    }

    /// Poll the template until it reports `status`, usually
    /// [`TemplateStatus::Ok`] after creation.
    ///
    /// # Errors
    /// Returns a timeout error naming the last observed status.
    pub async fn wait_for_template_status(
        &self,
        id: &TemplateId,
        status: TemplateStatus,
        retries: &[RetryStrategy],
    ) -> Result<Template> {
        tracing::info!(template_id = %id, %status, "Waiting for template status");
        poll::wait_for_status(
            format!("template {id}"),
            status,
            retries,
            &self.defaults,
            move || async move {
                let template = self.get_template(id, retries).await?;
                let current = template.status();
                Ok((template, current))
            },
        )
        .await
    }
}
