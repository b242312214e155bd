//! Conversion between wire objects and entity snapshots.

use crate::models::{
    Disk, DiskAttachment, Initialization, Nic, OptionalVmParameters, Tag, Template,
    UpdateVmParameters, Vm, VmCpu, VmCpuTopo, VmHugePages,
};
use crate::wire;
use ovirt_common::{
    ClusterId, DiskFormat, DiskId, DiskInterface, DiskStatus, Error, Result, TemplateId,
    TemplateStatus, VmId, VmStatus,
};
use std::str::FromStr;

/// Name of the VM custom property holding the huge page size.
pub const HUGE_PAGES_PROPERTY: &str = "hugepages";

fn required<T>(value: Option<T>, object: &'static str, field: &'static str) -> Result<T> {
    value.ok_or_else(|| Error::field_missing(object, field))
}

fn link_id(
    link: Option<wire::Link>,
    object: &'static str,
    field: &'static str,
    nested: &'static str,
) -> Result<String> {
    let link = required(link, object, field)?;
    required(link.id, nested, "id")
}

fn parse_status<S>(value: &str, object: &'static str) -> Result<S>
where
    S: FromStr<Err = Error>,
{
    value
        .parse()
        .map_err(|e| Error::bug_with_source(format!("unexpected {object} status {value:?}"), e))
}

fn topo_component(value: Option<u64>, field: &'static str) -> Result<u32> {
    let value = required(value, "CPU topology in CPU in VM", field)?;
    u32::try_from(value)
        .map_err(|e| Error::bug_with_source(format!("CPU {field} out of range: {value}"), e))
}

pub fn vm_from_wire(vm: wire::Vm) -> Result<Vm> {
    let id = required(vm.id, "VM", "id")?;
    let name = required(vm.name, "VM", "name")?;
    let comment = required(vm.comment, "VM", "comment")?;
    let cluster_id = link_id(vm.cluster, "VM", "cluster", "cluster in VM")?;
    let template_id = link_id(vm.template, "VM", "template", "template in VM")?;
    let status = parse_status::<VmStatus>(&required(vm.status, "VM", "status")?, "VM")?;

    let cpu = required(vm.cpu, "VM", "CPU")?;
    let topology = required(cpu.topology, "CPU in VM", "topology")?;
    let topo = VmCpuTopo::new(
        topo_component(topology.cores, "cores")?,
        topo_component(topology.threads, "threads")?,
        topo_component(topology.sockets, "sockets")?,
    )
    .map_err(|e| Error::bug_with_source("engine reported an invalid CPU topology", e))?;

    let tag_ids = vm
        .tags
        .map(|tags| tags.tag)
        .unwrap_or_default()
        .into_iter()
        .map(|tag| required(tag.id, "tag in VM", "id").map(Into::into))
        .collect::<Result<Vec<_>>>()?;

    let huge_pages = huge_pages_from_wire(vm.custom_properties)?;

    let initialization = vm
        .initialization
        .map(|init| {
            Initialization::new(
                init.custom_script.unwrap_or_default(),
                init.host_name.unwrap_or_default(),
            )
        })
        .unwrap_or_default();

    Ok(Vm {
        id: VmId::from_string(id),
        name,
        comment,
        cluster_id: ClusterId::from_string(cluster_id),
        template_id: TemplateId::from_string(template_id),
        status,
        cpu: VmCpu::new(topo),
        tag_ids,
        huge_pages,
        initialization,
    })
}

fn huge_pages_from_wire(properties: Option<wire::CustomProperties>) -> Result<Option<VmHugePages>> {
    let Some(properties) = properties else {
        return Ok(None);
    };
    let value = properties
        .custom_property
        .into_iter()
        .find(|p| p.name.as_deref() == Some(HUGE_PAGES_PROPERTY))
        .and_then(|p| p.value);
    match value {
        None => Ok(None),
        Some(text) => {
            let pages = text.trim().parse::<u64>().map_err(|e| {
                Error::bug_with_source(
                    format!("failed to parse '{HUGE_PAGES_PROPERTY}' custom property: {text}"),
                    e,
                )
            })?;
            Ok(Some(VmHugePages::new(pages)))
        }
    }
}

pub fn template_from_wire(template: wire::Template) -> Result<Template> {
    let id = required(template.id, "template", "id")?;
    let name = required(template.name, "template", "name")?;
    let status = required(template.status, "template", "status")?;
    Ok(Template {
        id: TemplateId::from_string(id),
        name,
        description: template.description.unwrap_or_default(),
        status: parse_status::<TemplateStatus>(&status, "template")?,
    })
}

pub fn tag_from_wire(tag: wire::Tag) -> Result<Tag> {
    let id = required(tag.id, "tag", "id")?;
    let name = required(tag.name, "tag", "name")?;
    Ok(Tag {
        id: id.into(),
        name,
        description: tag.description.unwrap_or_default(),
    })
}

pub fn nic_from_wire(nic: wire::Nic) -> Result<Nic> {
    let id = required(nic.id, "NIC", "id")?;
    let name = required(nic.name, "NIC", "name")?;
    let vm_id = link_id(nic.vm, "NIC", "vm", "VM in NIC")?;
    let vnic_profile_id = link_id(nic.vnic_profile, "NIC", "vnic_profile", "vNIC profile in NIC")?;
    Ok(Nic {
        id: id.into(),
        name,
        vm_id: vm_id.into(),
        vnic_profile_id: vnic_profile_id.into(),
    })
}

pub fn disk_from_wire(disk: wire::Disk) -> Result<Disk> {
    let id = required(disk.id, "disk", "id")?;
    let alias = required(disk.alias, "disk", "alias")?;
    let provisioned_size = required(disk.provisioned_size, "disk", "provisioned_size")?;
    let format = required(disk.format, "disk", "format")?;
    let format = DiskFormat::from_str(&format)
        .map_err(|e| Error::bug_with_source(format!("unexpected disk format {format:?}"), e))?;
    let status = parse_status::<DiskStatus>(&required(disk.status, "disk", "status")?, "disk")?;
    let storage_domain_ids = disk
        .storage_domains
        .map(|domains| domains.storage_domain)
        .unwrap_or_default()
        .into_iter()
        .map(|domain| required(domain.id, "storage domain in disk", "id").map(Into::into))
        .collect::<Result<Vec<_>>>()?;
    Ok(Disk {
        id: DiskId::from_string(id),
        alias,
        provisioned_size,
        format,
        status,
        storage_domain_ids,
    })
}

pub fn disk_attachment_from_wire(attachment: wire::DiskAttachment) -> Result<DiskAttachment> {
    let id = required(attachment.id, "disk attachment", "id")?;
    let vm_id = link_id(attachment.vm, "disk attachment", "vm", "VM in disk attachment")?;
    let disk_id = link_id(attachment.disk, "disk attachment", "disk", "disk in disk attachment")?;
    let interface = required(attachment.interface, "disk attachment", "interface")?;
    let interface = DiskInterface::from_str(&interface)
        .map_err(|e| {
            Error::bug_with_source(format!("unexpected disk interface {interface:?}"), e)
        })?;
    Ok(DiskAttachment {
        id: id.into(),
        vm_id: vm_id.into(),
        disk_id: disk_id.into(),
        interface,
        bootable: attachment.bootable.unwrap_or(false),
        active: attachment.active.unwrap_or(false),
    })
}

/// Build the creation request for a VM. Unset optional parameters are left
/// out so the engine applies its defaults.
pub fn to_create_vm_request(
    cluster_id: &ClusterId,
    template_id: &TemplateId,
    name: &str,
    params: &dyn OptionalVmParameters,
) -> wire::Vm {
    let cpu = params.cpu().map(|topo| wire::Cpu {
        topology: Some(wire::CpuTopology {
            cores: Some(u64::from(topo.cores())),
            threads: Some(u64::from(topo.threads())),
            sockets: Some(u64::from(topo.sockets())),
        }),
    });
    let custom_properties = params.huge_pages().map(|pages| wire::CustomProperties {
        custom_property: vec![wire::CustomProperty {
            name: Some(HUGE_PAGES_PROPERTY.to_string()),
            value: Some(pages.to_string()),
        }],
    });
    let initialization = params.initialization().map(|init| wire::Initialization {
        custom_script: Some(init.custom_script().to_string()),
        host_name: Some(init.host_name().to_string()),
    });

    wire::Vm {
        name: Some(name.to_string()),
        comment: params.comment(),
        cluster: Some(wire::Link::to(cluster_id.as_str())),
        template: Some(wire::Link::to(template_id.as_str())),
        cpu,
        custom_properties,
        initialization,
        ..Default::default()
    }
}

/// Build the patch for a VM update. Absent fields are omitted entirely.
pub fn to_update_vm_request(params: &dyn UpdateVmParameters) -> wire::Vm {
    wire::Vm {
        name: params.name(),
        comment: params.comment(),
        ..Default::default()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::{CreateVmParams, UpdateVmParams};
    use ovirt_common::{ErrorKind, TagId};

    fn full_vm() -> wire::Vm {
        wire::Vm {
            id: Some("vm-1".to_string()),
            name: Some("test-vm".to_string()),
            comment: Some("a comment".to_string()),
            status: Some("powering_up".to_string()),
            cluster: Some(wire::Link::to("cluster-1")),
            template: Some(wire::Link::to("template-1")),
            cpu: Some(wire::Cpu {
                topology: Some(wire::CpuTopology {
                    cores: Some(2),
                    threads: Some(1),
                    sockets: Some(4),
                }),
            }),
            custom_properties: Some(wire::CustomProperties {
                custom_property: vec![
                    wire::CustomProperty {
                        name: Some("sap_agent".to_string()),
                        value: Some("true".to_string()),
                    },
                    wire::CustomProperty {
                        name: Some("hugepages".to_string()),
                        value: Some("1048576".to_string()),
                    },
                ],
            }),
            tags: Some(wire::Tags {
                tag: vec![wire::Tag {
                    id: Some("tag-1".to_string()),
                    ..Default::default()
                }],
            }),
            initialization: Some(wire::Initialization {
                custom_script: Some("#cloud-config".to_string()),
                host_name: None,
            }),
        }
    }

    #[test]
    fn test_vm_from_wire() {
        let vm = vm_from_wire(full_vm()).unwrap();
        assert_eq!(vm.id().as_str(), "vm-1");
        assert_eq!(vm.name(), "test-vm");
        assert_eq!(vm.comment(), "a comment");
        assert_eq!(vm.cluster_id().as_str(), "cluster-1");
        assert_eq!(vm.template_id().as_str(), "template-1");
        assert_eq!(vm.status(), VmStatus::PoweringUp);
        assert_eq!(vm.cpu().topo(), VmCpuTopo::must_new(2, 1, 4));
        assert_eq!(vm.tag_ids(), &[TagId::from("tag-1")]);
        assert_eq!(vm.huge_pages(), Some(VmHugePages::G1));
        assert_eq!(vm.initialization().custom_script(), "#cloud-config");
        assert_eq!(vm.initialization().host_name(), "");
    }

    #[test]
    fn test_vm_missing_fields() {
        let mut vm = full_vm();
        vm.id = None;
        let err = vm_from_wire(vm).unwrap_err();
        assert_eq!(err.kind(), ErrorKind::FieldMissing);
        assert_eq!(err.to_string(), "id field missing from VM object");

        let mut vm = full_vm();
        vm.cluster = Some(wire::Link::default());
        let err = vm_from_wire(vm).unwrap_err();
        assert_eq!(err.to_string(), "id field missing from cluster in VM object");

        let mut vm = full_vm();
        vm.cpu.as_mut().unwrap().topology.as_mut().unwrap().sockets = None;
        let err = vm_from_wire(vm).unwrap_err();
        assert_eq!(err.to_string(), "sockets field missing from CPU topology in CPU in VM object");
    }

    #[test]
    fn test_vm_optional_fields_absent() {
        let mut vm = full_vm();
        vm.tags = None;
        vm.custom_properties = None;
        vm.initialization = None;
        let vm = vm_from_wire(vm).unwrap();
        assert!(vm.tag_ids().is_empty());
        assert_eq!(vm.huge_pages(), None);
        assert!(vm.initialization().is_empty());
    }

    #[test]
    fn test_huge_pages_without_property() {
        let mut vm = full_vm();
        vm.custom_properties = Some(wire::CustomProperties {
            custom_property: vec![wire::CustomProperty {
                name: Some("other".to_string()),
                value: Some("1".to_string()),
            }],
        });
        assert_eq!(vm_from_wire(vm).unwrap().huge_pages(), None);
    }

    #[test]
    fn test_unparsable_huge_pages_is_bug() {
        let mut vm = full_vm();
        vm.custom_properties.as_mut().unwrap().custom_property[1].value = Some("big".to_string());
        assert_eq!(vm_from_wire(vm).unwrap_err().kind(), ErrorKind::Bug);
    }

    #[test]
    fn test_tag_without_id() {
        let mut vm = full_vm();
        vm.tags = Some(wire::Tags {
            tag: vec![wire::Tag::default()],
        });
        assert_eq!(vm_from_wire(vm).unwrap_err().kind(), ErrorKind::FieldMissing);
    }

    #[test]
    fn test_unknown_status_is_bug() {
        let mut vm = full_vm();
        vm.status = Some("exploded".to_string());
        assert_eq!(vm_from_wire(vm).unwrap_err().kind(), ErrorKind::Bug);
    }

    #[test]
    fn test_disk_attachment_defaults() {
        let attachment = wire::DiskAttachment {
            id: Some("a1".to_string()),
            vm: Some(wire::Link::to("vm-1")),
            disk: Some(wire::Link::to("disk-1")),
            interface: Some("virtio_scsi".to_string()),
            bootable: None,
            active: None,
        };
        let attachment = disk_attachment_from_wire(attachment).unwrap();
        assert_eq!(attachment.interface(), DiskInterface::VirtioScsi);
        assert!(!attachment.bootable());
        assert!(!attachment.active());
    }

    #[test]
    fn test_disk_without_storage_domains() {
        let disk = wire::Disk {
            id: Some("disk-1".to_string()),
            alias: Some("root".to_string()),
            provisioned_size: Some(1 << 30),
            format: Some("cow".to_string()),
            status: Some("locked".to_string()),
            sparse: Some(true),
            storage_domains: None,
        };
        let disk = disk_from_wire(disk).unwrap();
        assert_eq!(disk.format(), DiskFormat::Cow);
        assert_eq!(disk.status(), DiskStatus::Locked);
        assert!(disk.storage_domain_ids().is_empty());
    }

    #[test]
    fn test_template_description_defaults_to_empty() {
        let template = wire::Template {
            id: Some("t1".to_string()),
            name: Some("base".to_string()),
            status: Some("ok".to_string()),
            ..Default::default()
        };
        let template = template_from_wire(template).unwrap();
        assert_eq!(template.description(), "");
        assert_eq!(template.status(), TemplateStatus::Ok);
    }

    #[test]
    fn test_create_request_omits_unset_parameters() {
        let request = to_create_vm_request(
            &"cluster-1".into(),
            &TemplateId::blank(),
            "test-vm",
            &CreateVmParams::new(),
        );
        assert_eq!(request.name.as_deref(), Some("test-vm"));
        assert_eq!(request.comment, None);
        assert_eq!(request.cpu, None);
        assert_eq!(request.custom_properties, None);
        assert_eq!(request.initialization, None);
    }

    #[test]
    fn test_create_request_carries_parameters() {
        let params = CreateVmParams::new();
        params
            .must_with_cpu_parameters(3, 3, 3)
            .must_with_huge_pages(VmHugePages::M2)
            .must_with_initialization_parameters("script-test", "test-vm");
        let request = to_create_vm_request(&"c".into(), &"t".into(), "vm", &params);

        let topo = request.cpu.unwrap().topology.unwrap();
        assert_eq!((topo.cores, topo.threads, topo.sockets), (Some(3), Some(3), Some(3)));
        let property = &request.custom_properties.unwrap().custom_property[0];
        assert_eq!(property.value.as_deref(), Some("2048"));
        assert_eq!(
            request.initialization.unwrap().host_name.as_deref(),
            Some("test-vm")
        );
    }

    #[test]
    fn test_update_request_with_only_name() {
        let params = UpdateVmParams::new();
        params.must_with_name("new_name");
        let patch = to_update_vm_request(&params);
        assert_eq!(patch.name.as_deref(), Some("new_name"));
        assert_eq!(patch.comment, None);
    }
}
