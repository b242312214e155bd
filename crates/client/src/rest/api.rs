//! [`OvirtApi`] over the engine's REST API.

use super::client::RestClient;
use crate::api::{OvirtApi, VmAction, VmFilter};
use crate::wire;
use async_trait::async_trait;
use ovirt_common::{
    ClientConfig, DiskAttachmentId, DiskId, NicId, Result, TagId, TemplateId, VmId,
};
use serde::Deserialize;

#[derive(Debug, Default, Deserialize)]
struct VmList {
    #[serde(default)]
    vm: Vec<wire::Vm>,
}

#[derive(Debug, Default, Deserialize)]
struct TemplateList {
    #[serde(default)]
    template: Vec<wire::Template>,
}

#[derive(Debug, Default, Deserialize)]
struct TagList {
    #[serde(default)]
    tag: Vec<wire::Tag>,
}

#[derive(Debug, Default, Deserialize)]
struct NicList {
    #[serde(default)]
    nic: Vec<wire::Nic>,
}

#[derive(Debug, Default, Deserialize)]
struct DiskList {
    #[serde(default)]
    disk: Vec<wire::Disk>,
}

#[derive(Debug, Default, Deserialize)]
struct DiskAttachmentList {
    #[serde(default)]
    disk_attachment: Vec<wire::DiskAttachment>,
}

/// Values with whitespace or quotes are quoted, inner quotes escaped.
fn search_term(field: &str, value: &str) -> String {
    if value.chars().any(|c| c.is_whitespace() || c == '"') {
        format!("{field}=\"{}\"", value.replace('"', "\\\""))
    } else {
        format!("{field}={value}")
    }
}

/// Render a filter in the engine's search language.
pub(crate) fn search_query(filter: &VmFilter) -> String {
    let mut terms = Vec::new();
    if let Some(name) = &filter.name {
        terms.push(search_term("name", name));
    }
    if let Some(tag) = &filter.tag {
        terms.push(search_term("tag", tag));
    }
    terms.join(" and ")
}

#[derive(Clone)]
pub struct RestApi {
    client: RestClient,
}

impl RestApi {
    pub fn new(config: &ClientConfig) -> Result<Self> {
        Ok(Self {
            client: RestClient::new(config)?,
        })
    }
}

#[async_trait]
impl OvirtApi for RestApi {
    async fn create_vm(&self, vm: wire::Vm) -> Result<wire::Vm> {
        self.client.post("vms", &vm).await
    }

    async fn get_vm(&self, id: &VmId) -> Result<wire::Vm> {
        self.client.get(&format!("vms/{id}")).await
    }

    async fn update_vm(&self, id: &VmId, patch: wire::Vm) -> Result<wire::Vm> {
        self.client.put(&format!("vms/{id}"), &patch).await
    }

    async fn list_vms(&self) -> Result<Vec<wire::Vm>> {
        let list: VmList = self.client.get("vms").await?;
        Ok(list.vm)
    }

    async fn search_vms(&self, filter: &VmFilter) -> Result<Vec<wire::Vm>> {
        let query = search_query(filter);
        let list: VmList = self
            .client
            .get_with_query("vms", &[("search", query.as_str())])
            .await?;
        Ok(list.vm)
    }

    async fn remove_vm(&self, id: &VmId) -> Result<()> {
        self.client.delete(&format!("vms/{id}")).await
    }

    async fn vm_action(&self, id: &VmId, action: VmAction) -> Result<()> {
        self.client
            .post_discard(&format!("vms/{id}/{}", action.name()), &action.body())
            .await
    }

    async fn add_tag_to_vm(&self, id: &VmId, tag_id: &TagId) -> Result<()> {
        let body = wire::Tag {
            id: Some(tag_id.to_string()),
            ..Default::default()
        };
        self.client.post_discard(&format!("vms/{id}/tags"), &body).await
    }

    async fn create_template(&self, template: wire::Template) -> Result<wire::Template> {
        self.client.post("templates", &template).await
    }

    async fn get_template(&self, id: &TemplateId) -> Result<wire::Template> {
        self.client.get(&format!("templates/{id}")).await
    }

    async fn list_templates(&self) -> Result<Vec<wire::Template>> {
        let list: TemplateList = self.client.get("templates").await?;
        Ok(list.template)
    }

    async fn remove_template(&self, id: &TemplateId) -> Result<()> {
        self.client.delete(&format!("templates/{id}")).await
    }

    async fn create_tag(&self, tag: wire::Tag) -> Result<wire::Tag> {
        self.client.post("tags", &tag).await
    }

    async fn get_tag(&self, id: &TagId) -> Result<wire::Tag> {
        self.client.get(&format!("tags/{id}")).await
    }

    async fn list_tags(&self) -> Result<Vec<wire::Tag>> {
        let list: TagList = self.client.get("tags").await?;
        Ok(list.tag)
    }

    async fn remove_tag(&self, id: &TagId) -> Result<()> {
        self.client.delete(&format!("tags/{id}")).await
    }

    async fn create_nic(&self, vm_id: &VmId, nic: wire::Nic) -> Result<wire::Nic> {
        self.client.post(&format!("vms/{vm_id}/nics"), &nic).await
    }

    async fn get_nic(&self, vm_id: &VmId, id: &NicId) -> Result<wire::Nic> {
        self.client.get(&format!("vms/{vm_id}/nics/{id}")).await
    }

    async fn list_nics(&self, vm_id: &VmId) -> Result<Vec<wire::Nic>> {
        let list: NicList = self.client.get(&format!("vms/{vm_id}/nics")).await?;
        Ok(list.nic)
    }

    async fn remove_nic(&self, vm_id: &VmId, id: &NicId) -> Result<()> {
        self.client.delete(&format!("vms/{vm_id}/nics/{id}")).await
    }

    async fn create_disk(&self, disk: wire::Disk) -> Result<wire::Disk> {
        self.client.post("disks", &disk).await
    }

    async fn get_disk(&self, id: &DiskId) -> Result<wire::Disk> {
        self.client.get(&format!("disks/{id}")).await
    }

    async fn list_disks(&self) -> Result<Vec<wire::Disk>> {
        let list: DiskList = self.client.get("disks").await?;
        Ok(list.disk)
    }

    async fn remove_disk(&self, id: &DiskId) -> Result<()> {
        self.client.delete(&format!("disks/{id}")).await
    }

    async fn create_disk_attachment(
        &self,
        vm_id: &VmId,
        attachment: wire::DiskAttachment,
    ) -> Result<wire::DiskAttachment> {
        self.client
            .post(&format!("vms/{vm_id}/diskattachments"), &attachment)
            .await
    }

    async fn get_disk_attachment(
        &self,
        vm_id: &VmId,
        id: &DiskAttachmentId,
    ) -> Result<wire::DiskAttachment> {
        self.client
            .get(&format!("vms/{vm_id}/diskattachments/{id}"))
            .await
    }

    async fn list_disk_attachments(&self, vm_id: &VmId) -> Result<Vec<wire::DiskAttachment>> {
        let list: DiskAttachmentList = self
            .client
            .get(&format!("vms/{vm_id}/diskattachments"))
            .await?;
        Ok(list.disk_attachment)
    }

    async fn remove_disk_attachment(&self, vm_id: &VmId, id: &DiskAttachmentId) -> Result<()> {
        self.client
            .delete(&format!("vms/{vm_id}/diskattachments/{id}"))
            .await
    }
}
