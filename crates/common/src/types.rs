//! Identifiers and status enumerations shared by the oVirt client.

use crate::error::Error;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

macro_rules! string_id {
    ($(#[$meta:meta])* $name:ident) => {
        $(#[$meta])*
        #[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
        #[serde(transparent)]
        pub struct $name(String);

        impl $name {
            /// Create an identifier from a string.
            pub fn from_string(id: String) -> Self {
                Self(id)
            }

            /// Get the inner string representation.
            pub fn as_str(&self) -> &str {
                &self.0
            }
        }

        impl fmt::Display for $name {
            fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
                f.write_str(&self.0)
            }
        }

        impl From<String> for $name {
            fn from(s: String) -> Self {
                Self(s)
            }
        }

        impl From<&str> for $name {
            fn from(s: &str) -> Self {
                Self(s.to_string())
            }
        }

        impl From<$name> for String {
            fn from(id: $name) -> String {
                id.0
            }
        }
    };
}

string_id!(
    /// Identifier of a virtual machine.
    VmId
);
string_id!(
    /// Identifier of a cluster.
    ClusterId
);
string_id!(
    /// Identifier of a template.
    TemplateId
);
string_id!(
    /// Identifier of a tag.
    TagId
);
string_id!(
    /// Identifier of a network interface.
    NicId
);
string_id!(
    /// Identifier of a disk.
    DiskId
);
string_id!(
    /// Identifier of a disk attachment.
    DiskAttachmentId
);
string_id!(
    /// Identifier of a storage domain.
    StorageDomainId
);
string_id!(
    /// Identifier of a vNIC profile.
    VnicProfileId
);

/// Identifier the engine uses for the built-in blank template.
pub const BLANK_TEMPLATE_ID: &str = "00000000-0000-0000-0000-000000000000";

impl TemplateId {
    /// The built-in blank template every engine ships with.
    pub fn blank() -> Self {
        Self(BLANK_TEMPLATE_ID.to_string())
    }

    /// Whether this is the blank template.
    pub fn is_blank(&self) -> bool {
        self.0 == BLANK_TEMPLATE_ID
    }
}

/// Declares a closed enumeration whose values travel as fixed strings.
macro_rules! wire_enum {
    (
        $(#[$meta:meta])*
        $name:ident, $what:literal {
            $($(#[$vmeta:meta])* $variant:ident => $wire:literal),+ $(,)?
        }
    ) => {
        $(#[$meta])*
        #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
        pub enum $name {
            $(
                $(#[$vmeta])*
                #[serde(rename = $wire)]
                $variant,
            )+
        }

        impl $name {
            /// All values, in declaration order.
            pub fn values() -> &'static [$name] {
                &[$($name::$variant),+]
            }

            /// The wire name of this value.
            pub fn as_str(self) -> &'static str {
                match self {
                    $($name::$variant => $wire),+
                }
            }
        }

        impl fmt::Display for $name {
            fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
                f.write_str(self.as_str())
            }
        }

        impl FromStr for $name {
            type Err = Error;

            fn from_str(s: &str) -> Result<Self, Self::Err> {
                match s {
                    $($wire => Ok($name::$variant),)+
                    other => Err(Error::bad_argument(format!(
                        "invalid value for {}: {}",
                        $what, other
                    ))),
                }
            }
        }
    };
}

wire_enum!(
    /// Status of a virtual machine as reported by the engine.
    VmStatus, "VM status" {
        /// The VM is powered off.
        Down => "down",
        /// A disk image of the VM is locked.
        ImageLocked => "image_locked",
        /// The VM is moving between hosts.
        Migrating => "migrating",
        /// The host lost contact with the VM.
        NotResponding => "not_responding",
        /// The VM is paused.
        Paused => "paused",
        /// The VM is shutting down.
        PoweringDown => "powering_down",
        /// The VM is booting.
        PoweringUp => "powering_up",
        /// The VM is rebooting.
        RebootInProgress => "reboot_in_progress",
        /// The VM is being restored from a saved state.
        RestoringState => "restoring_state",
        /// The VM state is being saved.
        SavingState => "saving_state",
        /// The VM is suspended.
        Suspended => "suspended",
        /// The VM has no assigned status yet.
        Unassigned => "unassigned",
        /// The engine cannot determine the status.
        Unknown => "unknown",
        /// The VM is running.
        Up => "up",
        /// The VM is scheduled to start.
        WaitForLaunch => "wait_for_launch",
    }
);

wire_enum!(
    /// Status of a template.
    TemplateStatus, "template status" {
        /// Ready for use.
        Ok => "ok",
        /// An operation is in progress.
        Locked => "locked",
        /// The template is broken.
        Illegal => "illegal",
    }
);

wire_enum!(
    /// Status of a disk.
    DiskStatus, "disk status" {
        /// Ready for use.
        Ok => "ok",
        /// An operation is in progress.
        Locked => "locked",
        /// The disk is broken.
        Illegal => "illegal",
    }
);

wire_enum!(
    /// On-disk image format.
    DiskFormat, "disk format" {
        /// Raw, fully allocated layout.
        Raw => "raw",
        /// Copy-on-write (qcow2).
        Cow => "cow",
    }
);

wire_enum!(
    /// Bus a disk is attached to a VM through.
    DiskInterface, "disk interface" {
        Ide => "ide",
        Sata => "sata",
        SpaprVscsi => "spapr_vscsi",
        Virtio => "virtio",
        VirtioScsi => "virtio_scsi",
    }
);
