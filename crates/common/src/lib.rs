//! Common types shared by the oVirt client crates.
//!
//! This crate provides:
//! - Resource identifiers and status enumerations
//! - The error taxonomy
//! - Client configuration

pub mod config;
pub mod error;
pub mod types;

// Re-export commonly used items
pub use config::{ClientConfig, RetryConfig};
pub use error::{Error, ErrorKind, Result, ResultExt};
pub use types::{
    ClusterId, DiskAttachmentId, DiskFormat, DiskId, DiskInterface, DiskStatus, NicId,
    StorageDomainId, TagId, TemplateId, TemplateStatus, VmId, VmStatus, VnicProfileId,
};
