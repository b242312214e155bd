//! Client library for the oVirt engine API.
//!
//! This crate provides:
//! - [`Client`] with create, read, update, delete and lifecycle calls for VMs,
//!   templates, tags, NICs, disks and disk attachments
//! - Composable [`RetryStrategy`] values accepted by every call
//! - Parameter builders that validate input before any network call
//! - The [`OvirtApi`] transport seam with a REST implementation ([`RestApi`])
//!   and an in-memory one for tests ([`MockApi`])

pub mod api;
pub mod client;
pub mod mapper;
pub mod mock;
pub mod models;
mod poll;
pub mod rest;
pub mod retry;
pub mod wire;

// Re-export main types
pub use api::{OvirtApi, VmAction, VmFilter};
pub use client::Client;
pub use mock::MockApi;
pub use models::{
    CreateDiskAttachmentParams, CreateDiskParams, CreateVmParams, Disk, DiskAttachment,
    Initialization, Nic, OptionalVmParameters, Tag, Template, UpdateVmParameters,
    UpdateVmParams, Vm, VmCpu, VmCpuTopo, VmHugePages, VmSearchParameters, VmSearchParams,
};
pub use rest::RestApi;
pub use retry::{OperationClass, RetryDefaults, RetryStrategy};

pub use ovirt_common::{
    ClientConfig, ClusterId, DiskAttachmentId, DiskFormat, DiskId, DiskInterface, DiskStatus,
    Error, ErrorKind, NicId, Result, ResultExt, RetryConfig, StorageDomainId, TagId, TemplateId,
    TemplateStatus, VmId, VmStatus, VnicProfileId,
};
