//! Entity snapshots and parameter builders.

pub mod disk;
pub mod nic;
pub mod params;
pub mod tag;
pub mod template;
pub mod vm;

pub use disk::{Disk, DiskAttachment};
pub use nic::Nic;
pub use params::{
    CreateDiskAttachmentParams, CreateDiskParams, CreateVmParams, OptionalVmParameters,
    UpdateVmParameters, UpdateVmParams, VmSearchParameters, VmSearchParams, validate_vm_name,
};
pub use tag::Tag;
pub use template::Template;
pub use vm::{Initialization, Vm, VmCpu, VmCpuTopo, VmHugePages};
