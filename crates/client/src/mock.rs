//! In-memory [`OvirtApi`] for tests.
//!
//! The mock keeps wire objects in a shared map and mimics the engine closely
//! enough for client tests: missing resources are not-found errors, names are
//! unique, new VMs inherit the CPU of their template and status changes
//! progress as the resource is read.

use crate::api::{OvirtApi, VmAction, VmFilter};
use crate::wire;
use async_trait::async_trait;
use ovirt_common::{
    ClusterId, DiskAttachmentId, DiskFormat, DiskId, DiskInterface, DiskStatus, Error, ErrorKind,
    NicId, Result, StorageDomainId, TagId, TemplateId, TemplateStatus, VmId, VmStatus,
    VnicProfileId,
};
use std::collections::{HashMap, VecDeque};
use std::str::FromStr;
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use uuid::Uuid;

const CLUSTER_ID: &str = "mock-cluster";
const STORAGE_DOMAIN_ID: &str = "mock-storage-domain";
const VNIC_PROFILE_ID: &str = "mock-vnic-profile";

fn new_id() -> String {
    Uuid::new_v4().to_string()
}

fn not_found(what: &str, id: &str) -> Error {
    Error::NotFound(format!("{what} {id}"))
}

fn link_id(link: &Option<wire::Link>) -> Option<&str> {
    link.as_ref().and_then(|link| link.id.as_deref())
}

fn injected(kind: ErrorKind) -> Error {
    let message = "injected failure".to_string();
    match kind {
        ErrorKind::BadArgument => Error::BadArgument(message),
        ErrorKind::FieldMissing => Error::field_missing("injected", "injected"),
        ErrorKind::NotFound => Error::NotFound(message),
        ErrorKind::Bug => Error::bug(message),
        ErrorKind::Connection => Error::Connection(message),
        ErrorKind::Conflict => Error::Conflict(message),
        ErrorKind::PermissionDenied => Error::PermissionDenied(message),
        ErrorKind::Pending => Error::Pending(message),
        ErrorKind::Timeout => Error::StatusTimeout {
            resource: "injected".to_string(),
            target: "injected".to_string(),
            last_observed: None,
            attempts: 0,
        },
        ErrorKind::Cancelled => Error::Cancelled(message),
        ErrorKind::Config => Error::Config(message),
    }
}

trait HasStatus {
    fn status_mut(&mut self) -> &mut Option<String>;
}

impl HasStatus for wire::Vm {
    fn status_mut(&mut self) -> &mut Option<String> {
        &mut self.status
    }
}

impl HasStatus for wire::Template {
    fn status_mut(&mut self) -> &mut Option<String> {
        &mut self.status
    }
}

impl HasStatus for wire::Disk {
    fn status_mut(&mut self) -> &mut Option<String> {
        &mut self.status
    }
}

/// Remaining statuses of an in-flight change. Each status holds for
/// `delay` reads before the next one shows.
#[derive(Debug)]
struct Transition {
    steps: VecDeque<&'static str>,
    countdown: u32,
}

#[derive(Debug)]
struct Tracked<T> {
    object: T,
    transition: Option<Transition>,
}

impl<T: HasStatus> Tracked<T> {
    fn new(object: T) -> Self {
        Self {
            object,
            transition: None,
        }
    }

    /// Start walking through `steps`. Without a delay the last step applies
    /// at once.
    fn begin(&mut self, delay: u32, steps: &[&'static str]) {
        let Some((first, rest)) = steps.split_first() else {
            return;
        };
        if delay == 0 || rest.is_empty() {
            let last = rest.last().unwrap_or(first);
            *self.object.status_mut() = Some(last.to_string());
            self.transition = None;
            return;
        }
        *self.object.status_mut() = Some(first.to_string());
        self.transition = Some(Transition {
            steps: rest.iter().copied().collect(),
            countdown: delay,
        });
    }

    /// Count one read and return the object as the reader sees it.
    fn observe(&mut self, delay: u32) -> &T {
        if let Some(transition) = &mut self.transition {
            transition.countdown = transition.countdown.saturating_sub(1);
            if transition.countdown == 0 {
                transition.countdown = delay;
                if let Some(next) = transition.steps.pop_front() {
                    *self.object.status_mut() = Some(next.to_string());
                }
            }
            if transition.steps.is_empty() {
                self.transition = None;
            }
        }
        &self.object
    }

    fn set_status(&mut self, status: &str) {
        *self.object.status_mut() = Some(status.to_string());
        self.transition = None;
    }
}

#[derive(Debug)]
struct State {
    vms: HashMap<String, Tracked<wire::Vm>>,
    templates: HashMap<String, Tracked<wire::Template>>,
    tags: HashMap<String, wire::Tag>,
    nics: HashMap<String, wire::Nic>,
    disks: HashMap<String, Tracked<wire::Disk>>,
    disk_attachments: HashMap<String, wire::DiskAttachment>,
    transition_delay: u32,
    failures: VecDeque<ErrorKind>,
    lost_responses: u32,
    vm_fetches: HashMap<String, u32>,
}

impl State {
    fn seeded() -> Self {
        let blank = wire::Template {
            id: Some(TemplateId::blank().to_string()),
            name: Some("Blank".to_string()),
            description: Some("Blank template".to_string()),
            status: Some(TemplateStatus::Ok.as_str().to_string()),
            vm: None,
            cpu: Some(wire::Cpu {
                topology: Some(wire::CpuTopology {
                    cores: Some(1),
                    threads: Some(1),
                    sockets: Some(1),
                }),
            }),
        };
        let mut templates = HashMap::new();
        templates.insert(TemplateId::blank().to_string(), Tracked::new(blank));

        Self {
            vms: HashMap::new(),
            templates,
            tags: HashMap::new(),
            nics: HashMap::new(),
            disks: HashMap::new(),
            disk_attachments: HashMap::new(),
            transition_delay: 0,
            failures: VecDeque::new(),
            lost_responses: 0,
            vm_fetches: HashMap::new(),
        }
    }

    fn take_injected_failure(&mut self) -> Result<()> {
        match self.failures.pop_front() {
            Some(kind) => Err(injected(kind)),
            None => Ok(()),
        }
    }

    /// Hand a result back, unless the response is to be lost.
    fn deliver<T>(&mut self, value: T) -> Result<T> {
        if self.lost_responses > 0 {
            self.lost_responses -= 1;
            return Err(Error::Connection("connection reset before response".to_string()));
        }
        Ok(value)
    }

    fn vm(&mut self, id: &str) -> Result<&mut Tracked<wire::Vm>> {
        self.vms.get_mut(id).ok_or_else(|| not_found("VM", id))
    }

    fn vm_name_taken(&self, name: &str, except: Option<&str>) -> bool {
        self.vms.iter().any(|(id, vm)| {
            Some(id.as_str()) != except && vm.object.name.as_deref() == Some(name)
        })
    }

    fn create_vm(&mut self, mut vm: wire::Vm) -> Result<wire::Vm> {
        let name = vm
            .name
            .clone()
            .filter(|name| !name.is_empty())
            .ok_or_else(|| Error::bad_argument("VM name is required"))?;
        if self.vm_name_taken(&name, None) {
            return Err(Error::bad_argument(format!("VM name {name} is already in use")));
        }

        let cluster_id = link_id(&vm.cluster).unwrap_or_default();
        if cluster_id != CLUSTER_ID {
            return Err(not_found("cluster", cluster_id));
        }

        let template_id = link_id(&vm.template)
            .map(str::to_string)
            .unwrap_or_else(|| TemplateId::blank().to_string());
        let template = self
            .templates
            .get(&template_id)
            .ok_or_else(|| not_found("template", &template_id))?;
        if template.object.status.as_deref() != Some(TemplateStatus::Ok.as_str()) {
            return Err(Error::Conflict(format!("template {template_id} is locked")));
        }
        if vm.cpu.is_none() {
            vm.cpu = template.object.cpu.clone();
        }

        let id = new_id();
        vm.id = Some(id.clone());
        vm.template = Some(wire::Link::to(template_id));
        vm.status = Some(VmStatus::Down.as_str().to_string());
        vm.comment.get_or_insert_with(String::new);
        vm.tags = Some(wire::Tags::default());

        self.vms.insert(id, Tracked::new(vm.clone()));
        Ok(vm)
    }

    fn update_vm(&mut self, id: &str, patch: wire::Vm) -> Result<wire::Vm> {
        if let Some(name) = &patch.name {
            if name.is_empty() {
                return Err(Error::bad_argument("VM name must not be empty"));
            }
            if self.vm_name_taken(name, Some(id)) {
                return Err(Error::bad_argument(format!("VM name {name} is already in use")));
            }
        }
        let vm = &mut self.vm(id)?.object;
        if let Some(name) = patch.name {
            vm.name = Some(name);
        }
        if let Some(comment) = patch.comment {
            vm.comment = Some(comment);
        }
        Ok(vm.clone())
    }

    fn list_vms(&self, filter: &VmFilter) -> Vec<wire::Vm> {
        let tag_ids: Option<Vec<&str>> = filter.tag.as_ref().map(|tag_name| {
            self.tags
                .values()
                .filter(|tag| tag.name.as_ref() == Some(tag_name))
                .filter_map(|tag| tag.id.as_deref())
                .collect()
        });

        let mut vms: Vec<wire::Vm> = self
            .vms
            .values()
            .map(|vm| &vm.object)
            .filter(|vm| filter.name.is_none() || vm.name == filter.name)
            .filter(|vm| match &tag_ids {
                None => true,
                Some(ids) => vm.tags.as_ref().is_some_and(|tags| {
                    tags.tag
                        .iter()
                        .any(|tag| tag.id.as_deref().is_some_and(|id| ids.contains(&id)))
                }),
            })
            .cloned()
            .collect();
        vms.sort_by(|a, b| a.name.cmp(&b.name));
        vms
    }

    fn remove_vm(&mut self, id: &str) -> Result<()> {
        self.vms.remove(id).ok_or_else(|| not_found("VM", id))?;
        self.nics.retain(|_, nic| link_id(&nic.vm) != Some(id));
        self.disk_attachments
            .retain(|_, attachment| link_id(&attachment.vm) != Some(id));
        Ok(())
    }

    fn vm_action(&mut self, id: &str, action: VmAction) -> Result<()> {
        let delay = self.transition_delay;
        let vm = self.vm(id)?;
        match action {
            VmAction::Start => vm.begin(
                delay,
                &[
                    VmStatus::WaitForLaunch.as_str(),
                    VmStatus::PoweringUp.as_str(),
                    VmStatus::Up.as_str(),
                ],
            ),
            VmAction::Stop { .. } | VmAction::Shutdown { .. } => vm.begin(
                delay,
                &[VmStatus::PoweringDown.as_str(), VmStatus::Down.as_str()],
            ),
            VmAction::AutoPinCpuAndNumaNodes { .. } => {}
        }
        Ok(())
    }

    fn add_tag_to_vm(&mut self, id: &str, tag_id: &str) -> Result<()> {
        let tag = self
            .tags
            .get(tag_id)
            .cloned()
            .ok_or_else(|| not_found("tag", tag_id))?;
        let tags = self.vm(id)?.object.tags.get_or_insert_with(Default::default);
        if !tags.tag.iter().any(|t| t.id.as_deref() == Some(tag_id)) {
            tags.tag.push(tag);
        }
        Ok(())
    }

    fn create_template(&mut self, mut template: wire::Template) -> Result<wire::Template> {
        let name = template
            .name
            .clone()
            .filter(|name| !name.is_empty())
            .ok_or_else(|| Error::bad_argument("template name is required"))?;
        if self
            .templates
            .values()
            .any(|t| t.object.name.as_deref() == Some(name.as_str()))
        {
            return Err(Error::bad_argument(format!("template name {name} is already in use")));
        }
        let vm_id = link_id(&template.vm).unwrap_or_default().to_string();
        let cpu = self
            .vms
            .get(&vm_id)
            .ok_or_else(|| not_found("VM", &vm_id))?
            .object
            .cpu
            .clone();

        let id = new_id();
        template.id = Some(id.clone());
        template.description.get_or_insert_with(String::new);
        template.cpu = cpu;
        template.vm = None;

        let mut tracked = Tracked::new(template);
        tracked.begin(
            self.transition_delay,
            &[TemplateStatus::Locked.as_str(), TemplateStatus::Ok.as_str()],
        );
        let created = tracked.object.clone();
        self.templates.insert(id, tracked);
        Ok(created)
    }

    fn remove_template(&mut self, id: &str) -> Result<()> {
        if TemplateId::from(id).is_blank() {
            return Err(Error::bad_argument("the blank template cannot be removed"));
        }
        self.templates
            .remove(id)
            .map(|_| ())
            .ok_or_else(|| not_found("template", id))
    }

    fn create_tag(&mut self, mut tag: wire::Tag) -> Result<wire::Tag> {
        let name = tag
            .name
            .clone()
            .filter(|name| !name.is_empty())
            .ok_or_else(|| Error::bad_argument("tag name is required"))?;
        if self.tags.values().any(|t| t.name.as_deref() == Some(name.as_str())) {
            return Err(Error::bad_argument(format!("tag name {name} is already in use")));
        }
        let id = new_id();
        tag.id = Some(id.clone());
        tag.description.get_or_insert_with(String::new);
        self.tags.insert(id, tag.clone());
        Ok(tag)
    }

    fn remove_tag(&mut self, id: &str) -> Result<()> {
        self.tags.remove(id).ok_or_else(|| not_found("tag", id))?;
        for vm in self.vms.values_mut() {
            if let Some(tags) = &mut vm.object.tags {
                tags.tag.retain(|tag| tag.id.as_deref() != Some(id));
            }
        }
        Ok(())
    }

    fn create_nic(&mut self, vm_id: &str, mut nic: wire::Nic) -> Result<wire::Nic> {
        self.vm(vm_id)?;
        let name = nic
            .name
            .clone()
            .filter(|name| !name.is_empty())
            .ok_or_else(|| Error::bad_argument("NIC name is required"))?;
        if self
            .nics
            .values()
            .any(|n| link_id(&n.vm) == Some(vm_id) && n.name.as_deref() == Some(name.as_str()))
        {
            return Err(Error::bad_argument(format!(
                "NIC name {name} is already in use on VM {vm_id}"
            )));
        }
        let profile_id = link_id(&nic.vnic_profile).unwrap_or_default();
        if profile_id != VNIC_PROFILE_ID {
            return Err(not_found("vNIC profile", profile_id));
        }

        let id = new_id();
        nic.id = Some(id.clone());
        nic.vm = Some(wire::Link::to(vm_id));
        self.nics.insert(id, nic.clone());
        Ok(nic)
    }

    fn nic(&self, vm_id: &str, id: &str) -> Result<&wire::Nic> {
        self.nics
            .get(id)
            .filter(|nic| link_id(&nic.vm) == Some(vm_id))
            .ok_or_else(|| not_found("NIC", id))
    }

    fn create_disk(&mut self, mut disk: wire::Disk) -> Result<wire::Disk> {
        let domain_id = disk
            .storage_domains
            .as_ref()
            .and_then(|domains| domains.storage_domain.first())
            .and_then(|domain| domain.id.clone())
            .unwrap_or_default();
        if domain_id != STORAGE_DOMAIN_ID {
            return Err(not_found("storage domain", &domain_id));
        }
        if disk.provisioned_size.unwrap_or(0) == 0 {
            return Err(Error::bad_argument("disk size must be positive"));
        }
        let format = disk.format.clone().unwrap_or_default();
        let format = DiskFormat::from_str(&format)?;

        let id = new_id();
        disk.id = Some(id.clone());
        disk.alias.get_or_insert_with(|| format!("disk-{}", &id[..8]));
        disk.sparse.get_or_insert(format == DiskFormat::Cow);

        let mut tracked = Tracked::new(disk);
        tracked.begin(
            self.transition_delay,
            &[DiskStatus::Locked.as_str(), DiskStatus::Ok.as_str()],
        );
        let created = tracked.object.clone();
        self.disks.insert(id, tracked);
        Ok(created)
    }

    fn remove_disk(&mut self, id: &str) -> Result<()> {
        self.disks.remove(id).ok_or_else(|| not_found("disk", id))?;
        self.disk_attachments
            .retain(|_, attachment| link_id(&attachment.disk) != Some(id));
        Ok(())
    }

    fn create_disk_attachment(
        &mut self,
        vm_id: &str,
        mut attachment: wire::DiskAttachment,
    ) -> Result<wire::DiskAttachment> {
        self.vm(vm_id)?;
        let disk_id = link_id(&attachment.disk).unwrap_or_default().to_string();
        if !self.disks.contains_key(&disk_id) {
            return Err(not_found("disk", &disk_id));
        }
        let interface = attachment.interface.clone().unwrap_or_default();
        DiskInterface::from_str(&interface)?;
        if self.disk_attachments.values().any(|a| {
            link_id(&a.vm) == Some(vm_id) && link_id(&a.disk) == Some(disk_id.as_str())
        }) {
            return Err(Error::bad_argument(format!(
                "disk {disk_id} is already attached to VM {vm_id}"
            )));
        }

        let id = new_id();
        attachment.id = Some(id.clone());
        attachment.vm = Some(wire::Link::to(vm_id));
        attachment.bootable.get_or_insert(false);
        attachment.active.get_or_insert(false);
        self.disk_attachments.insert(id, attachment.clone());
        Ok(attachment)
    }

    fn disk_attachment(&self, vm_id: &str, id: &str) -> Result<&wire::DiskAttachment> {
        self.disk_attachments
            .get(id)
            .filter(|attachment| link_id(&attachment.vm) == Some(vm_id))
            .ok_or_else(|| not_found("disk attachment", id))
    }
}

/// Shared in-memory engine. Clones share state, so a test can keep one
/// handle for assertions and give another to the client.
#[derive(Debug, Clone)]
pub struct MockApi {
    state: Arc<Mutex<State>>,
}

impl Default for MockApi {
    fn default() -> Self {
        Self::new()
    }
}

impl MockApi {
    /// Create an engine holding one cluster, the blank template, one storage
    /// domain and one vNIC profile.
    pub fn new() -> Self {
        Self {
            state: Arc::new(Mutex::new(State::seeded())),
        }
    }

    /// Make status changes take `reads` reads per intermediate status
    /// instead of completing at once.
    pub fn with_transition_delay(self, reads: u32) -> Self {
        self.lock().transition_delay = reads;
        self
    }

    fn lock(&self) -> MutexGuard<'_, State> {
        self.state.lock().unwrap_or_else(PoisonError::into_inner)
    }

    fn call<T>(&self, operation: impl FnOnce(&mut State) -> Result<T>) -> Result<T> {
        let mut state = self.lock();
        state.take_injected_failure()?;
        let value = operation(&mut state)?;
        state.deliver(value)
    }

    pub fn cluster_id(&self) -> ClusterId {
        ClusterId::from(CLUSTER_ID)
    }

    pub fn blank_template_id(&self) -> TemplateId {
        TemplateId::blank()
    }

    pub fn storage_domain_id(&self) -> StorageDomainId {
        StorageDomainId::from(STORAGE_DOMAIN_ID)
    }

    pub fn vnic_profile_id(&self) -> VnicProfileId {
        VnicProfileId::from(VNIC_PROFILE_ID)
    }

    /// Fail the next `count` calls with an error of `kind`, before they
    /// touch any state.
    pub fn fail_next(&self, count: u32, kind: ErrorKind) {
        let mut state = self.lock();
        state.failures.extend(std::iter::repeat(kind).take(count as usize));
    }

    /// Apply the next `count` successful calls but report a connection error
    /// instead of their result.
    pub fn lose_next_responses(&self, count: u32) {
        self.lock().lost_responses += count;
    }

    /// Number of `get_vm` calls made for `id`.
    pub fn vm_fetch_count(&self, id: &VmId) -> u32 {
        self.lock()
            .vm_fetches
            .get(id.as_str())
            .copied()
            .unwrap_or(0)
    }

    /// Force a VM into `status`, cancelling any change in progress.
    pub fn set_vm_status(&self, id: &VmId, status: VmStatus) -> Result<()> {
        self.lock().vm(id.as_str())?.set_status(status.as_str());
        Ok(())
    }
}

#[async_trait]
impl OvirtApi for MockApi {
    async fn create_vm(&self, vm: wire::Vm) -> Result<wire::Vm> {
        self.call(|state| state.create_vm(vm))
    }

    async fn get_vm(&self, id: &VmId) -> Result<wire::Vm> {
        *self
            .lock()
            .vm_fetches
            .entry(id.to_string())
            .or_insert(0) += 1;
        self.call(|state| {
            let delay = state.transition_delay;
            Ok(state.vm(id.as_str())?.observe(delay).clone())
        })
    }

    async fn update_vm(&self, id: &VmId, patch: wire::Vm) -> Result<wire::Vm> {
        self.call(|state| state.update_vm(id.as_str(), patch))
    }

    async fn list_vms(&self) -> Result<Vec<wire::Vm>> {
        self.call(|state| Ok(state.list_vms(&VmFilter::default())))
    }

    async fn search_vms(&self, filter: &VmFilter) -> Result<Vec<wire::Vm>> {
        self.call(|state| Ok(state.list_vms(filter)))
    }

    async fn remove_vm(&self, id: &VmId) -> Result<()> {
        self.call(|state| state.remove_vm(id.as_str()))
    }

    async fn vm_action(&self, id: &VmId, action: VmAction) -> Result<()> {
        self.call(|state| state.vm_action(id.as_str(), action))
    }

    async fn add_tag_to_vm(&self, id: &VmId, tag_id: &TagId) -> Result<()> {
        self.call(|state| state.add_tag_to_vm(id.as_str(), tag_id.as_str()))
    }

    async fn create_template(&self, template: wire::Template) -> Result<wire::Template> {
        self.call(|state| state.create_template(template))
    }

    async fn get_template(&self, id: &TemplateId) -> Result<wire::Template> {
        self.call(|state| {
            let delay = state.transition_delay;
            let template = state
                .templates
                .get_mut(id.as_str())
                .ok_or_else(|| not_found("template", id.as_str()))?;
            Ok(template.observe(delay).clone())
        })
    }

    async fn list_templates(&self) -> Result<Vec<wire::Template>> {
        self.call(|state| {
            let mut templates: Vec<wire::Template> =
                state.templates.values().map(|t| t.object.clone()).collect();
            templates.sort_by(|a, b| a.name.cmp(&b.name));
            Ok(templates)
        })
    }

    async fn remove_template(&self, id: &TemplateId) -> Result<()> {
        self.call(|state| state.remove_template(id.as_str()))
    }

    async fn create_tag(&self, tag: wire::Tag) -> Result<wire::Tag> {
        self.call(|state| state.create_tag(tag))
    }

    async fn get_tag(&self, id: &TagId) -> Result<wire::Tag> {
        self.call(|state| {
            state
                .tags
                .get(id.as_str())
                .cloned()
                .ok_or_else(|| not_found("tag", id.as_str()))
        })
    }

    async fn list_tags(&self) -> Result<Vec<wire::Tag>> {
        self.call(|state| {
            let mut tags: Vec<wire::Tag> = state.tags.values().cloned().collect();
            tags.sort_by(|a, b| a.name.cmp(&b.name));
            Ok(tags)
        })
    }

    async fn remove_tag(&self, id: &TagId) -> Result<()> {
        self.call(|state| state.remove_tag(id.as_str()))
    }

    async fn create_nic(&self, vm_id: &VmId, nic: wire::Nic) -> Result<wire::Nic> {
        self.call(|state| state.create_nic(vm_id.as_str(), nic))
    }

    async fn get_nic(&self, vm_id: &VmId, id: &NicId) -> Result<wire::Nic> {
        self.call(|state| state.nic(vm_id.as_str(), id.as_str()).cloned())
    }

    async fn list_nics(&self, vm_id: &VmId) -> Result<Vec<wire::Nic>> {
        self.call(|state| {
            state.vm(vm_id.as_str())?;
            let mut nics: Vec<wire::Nic> = state
                .nics
                .values()
                .filter(|nic| link_id(&nic.vm) == Some(vm_id.as_str()))
                .cloned()
                .collect();
            nics.sort_by(|a, b| a.name.cmp(&b.name));
            Ok(nics)
        })
    }

    async fn remove_nic(&self, vm_id: &VmId, id: &NicId) -> Result<()> {
        self.call(|state| {
            state.nic(vm_id.as_str(), id.as_str())?;
            state.nics.remove(id.as_str());
            Ok(())
        })
    }

    async fn create_disk(&self, disk: wire::Disk) -> Result<wire::Disk> {
        self.call(|state| state.create_disk(disk))
    }

    async fn get_disk(&self, id: &DiskId) -> Result<wire::Disk> {
        self.call(|state| {
            let delay = state.transition_delay;
            let disk = state
                .disks
                .get_mut(id.as_str())
                .ok_or_else(|| not_found("disk", id.as_str()))?;
            Ok(disk.observe(delay).clone())
        })
    }

    async fn list_disks(&self) -> Result<Vec<wire::Disk>> {
        self.call(|state| {
            let mut disks: Vec<wire::Disk> =
                state.disks.values().map(|d| d.object.clone()).collect();
            disks.sort_by(|a, b| a.alias.cmp(&b.alias));
            Ok(disks)
        })
    }

    async fn remove_disk(&self, id: &DiskId) -> Result<()> {
        self.call(|state| state.remove_disk(id.as_str()))
    }

    async fn create_disk_attachment(
        &self,
        vm_id: &VmId,
        attachment: wire::DiskAttachment,
    ) -> Result<wire::DiskAttachment> {
        self.call(|state| state.create_disk_attachment(vm_id.as_str(), attachment))
    }

    async fn get_disk_attachment(
        &self,
        vm_id: &VmId,
        id: &DiskAttachmentId,
    ) -> Result<wire::DiskAttachment> {
        self.call(|state| state.disk_attachment(vm_id.as_str(), id.as_str()).cloned())
    }

    async fn list_disk_attachments(&self, vm_id: &VmId) -> Result<Vec<wire::DiskAttachment>> {
        self.call(|state| {
            state.vm(vm_id.as_str())?;
            let mut attachments: Vec<wire::DiskAttachment> = state
                .disk_attachments
                .values()
                .filter(|attachment| link_id(&attachment.vm) == Some(vm_id.as_str()))
                .cloned()
                .collect();
            attachments.sort_by(|a, b| a.id.cmp(&b.id));
            Ok(attachments)
        })
    }

    async fn remove_disk_attachment(&self, vm_id: &VmId, id: &DiskAttachmentId) -> Result<()> {
        self.call(|state| {
            state.disk_attachment(vm_id.as_str(), id.as_str())?;
            state.disk_attachments.remove(id.as_str());
            Ok(())
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn vm_request(name: &str) -> wire::Vm {
        wire::Vm {
            name: Some(name.to_string()),
            cluster: Some(wire::Link::to(CLUSTER_ID)),
            template: Some(wire::Link::to(TemplateId::blank().as_str())),
            ..Default::default()
        }
    }

    #[tokio::test]
    async fn test_create_vm_defaults() {
        let mock = MockApi::new();
        let vm = mock.create_vm(vm_request("test-vm")).await.unwrap();

        assert!(vm.id.is_some());
        assert_eq!(vm.comment.as_deref(), Some(""));
        assert_eq!(vm.status.as_deref(), Some("down"));
        let topology = vm.cpu.unwrap().topology.unwrap();
        assert_eq!(
            (topology.cores, topology.threads, topology.sockets),
            (Some(1), Some(1), Some(1))
        );
    }

    #[tokio::test]
    async fn test_duplicate_vm_name_rejected() {
        let mock = MockApi::new();
        mock.create_vm(vm_request("test-vm")).await.unwrap();
        let err = mock.create_vm(vm_request("test-vm")).await.unwrap_err();
        assert_eq!(err.kind(), ErrorKind::BadArgument);
    }

    #[tokio::test]
    async fn test_unknown_cluster() {
        let mock = MockApi::new();
        let mut request = vm_request("test-vm");
        request.cluster = Some(wire::Link::to("elsewhere"));
        assert!(mock.create_vm(request).await.unwrap_err().is_not_found());
    }

    #[tokio::test]
    async fn test_start_transition_counts_reads() {
        let mock = MockApi::new().with_transition_delay(2);
        let vm = mock.create_vm(vm_request("test-vm")).await.unwrap();
        let id = VmId::from_string(vm.id.unwrap());

        mock.vm_action(&id, VmAction::Start).await.unwrap();
        let mut seen = Vec::new();
        for _ in 0..5 {
            seen.push(mock.get_vm(&id).await.unwrap().status.unwrap());
        }
        assert_eq!(
            seen,
            ["wait_for_launch", "powering_up", "powering_up", "up", "up"]
        );
        assert_eq!(mock.vm_fetch_count(&id), 5);
    }

    #[tokio::test]
    async fn test_immediate_transitions() {
        let mock = MockApi::new();
        let vm = mock.create_vm(vm_request("test-vm")).await.unwrap();
        let id = VmId::from_string(vm.id.unwrap());

        mock.vm_action(&id, VmAction::Start).await.unwrap();
        assert_eq!(mock.get_vm(&id).await.unwrap().status.as_deref(), Some("up"));
        mock.vm_action(&id, VmAction::Stop { force: false }).await.unwrap();
        assert_eq!(mock.get_vm(&id).await.unwrap().status.as_deref(), Some("down"));
    }

    #[tokio::test]
    async fn test_fault_injection() {
        let mock = MockApi::new();
        mock.fail_next(2, ErrorKind::Conflict);

        let err = mock.list_vms().await.unwrap_err();
        assert_eq!(err.kind(), ErrorKind::Conflict);
        let err = mock.create_vm(vm_request("test-vm")).await.unwrap_err();
        assert_eq!(err.kind(), ErrorKind::Conflict);

        // Injected failures leave state untouched.
        assert!(mock.list_vms().await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_lost_response_still_applies() {
        let mock = MockApi::new();
        mock.lose_next_responses(1);

        let err = mock.create_vm(vm_request("test-vm")).await.unwrap_err();
        assert_eq!(err.kind(), ErrorKind::Connection);
        assert_eq!(mock.list_vms().await.unwrap().len(), 1);
    }

    #[tokio::test]
    async fn test_blank_template_cannot_be_removed() {
        let mock = MockApi::new();
        let err = mock.remove_template(&TemplateId::blank()).await.unwrap_err();
        assert_eq!(err.kind(), ErrorKind::BadArgument);
    }

    #[tokio::test]
    async fn test_removing_vm_drops_its_nics() {
        let mock = MockApi::new();
        let vm = mock.create_vm(vm_request("test-vm")).await.unwrap();
        let id = VmId::from_string(vm.id.unwrap());
        let nic = wire::Nic {
            name: Some("eth0".to_string()),
            vnic_profile: Some(wire::Link::to(VNIC_PROFILE_ID)),
            ..Default::default()
        };
        let nic = mock.create_nic(&id, nic).await.unwrap();
        let nic_id = NicId::from_string(nic.id.unwrap());

        mock.remove_vm(&id).await.unwrap();
        assert!(mock.get_nic(&id, &nic_id).await.unwrap_err().is_not_found());
    }
}
