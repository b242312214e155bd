//! Virtual machine snapshot and its value types.

use ovirt_common::{ClusterId, Error, Result, TagId, TemplateId, VmId, VmStatus};
use serde::{Deserialize, Serialize};
use std::fmt;

/// CPU topology of a VM. Every component is at least 1.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct VmCpuTopo {
    cores: u32,
    threads: u32,
    sockets: u32,
}

impl VmCpuTopo {
    /// Create a topology, rejecting zero components.
    pub fn new(cores: u32, threads: u32, sockets: u32) -> Result<Self> {
        if cores == 0 {
            return Err(Error::bad_argument("number of cores must be positive"));
        }
        if threads == 0 {
            return Err(Error::bad_argument("number of threads must be positive"));
        }
        if sockets == 0 {
            return Err(Error::bad_argument("number of sockets must be positive"));
        }
        Ok(Self {
            cores,
            threads,
            sockets,
        })
    }

    /// Like [`VmCpuTopo::new`], but panics on invalid input.
    pub fn must_new(cores: u32, threads: u32, sockets: u32) -> Self {
        Self::new(cores, threads, sockets).unwrap_or_else(|e| panic!("{e}"))
    }

    pub fn cores(&self) -> u32 {
        self.cores
    }

    pub fn threads(&self) -> u32 {
        self.threads
    }

    pub fn sockets(&self) -> u32 {
        self.sockets
    }
}

/// CPU configuration of a VM.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct VmCpu {
    topo: VmCpuTopo,
}

impl VmCpu {
    pub fn new(topo: VmCpuTopo) -> Self {
        Self { topo }
    }

    pub fn topo(&self) -> VmCpuTopo {
        self.topo
    }
}

/// Huge page size of a VM in KiB.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct VmHugePages(u64);

impl VmHugePages {
    /// 2 MiB pages.
    pub const M2: VmHugePages = VmHugePages(2048);
    /// 1 GiB pages.
    pub const G1: VmHugePages = VmHugePages(1_048_576);

    /// Wrap a raw value. Use [`VmHugePages::validate`] to check it.
    pub const fn new(kib: u64) -> Self {
        Self(kib)
    }

    pub fn value(self) -> u64 {
        self.0
    }

    /// All values the engine accepts.
    pub fn values() -> &'static [VmHugePages] {
        &[VmHugePages::M2, VmHugePages::G1]
    }

    pub fn validate(self) -> Result<()> {
        if Self::values().contains(&self) {
            return Ok(());
        }
        let allowed = Self::values()
            .iter()
            .map(|v| v.to_string())
            .collect::<Vec<_>>()
            .join(", ");
        Err(Error::bad_argument(format!(
            "invalid value for VM huge pages: {} must be one of: {}",
            self.0, allowed
        )))
    }
}

impl fmt::Display for VmHugePages {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Initialization (cloud-init) settings of a VM.
///
/// A VM without initialization reports the empty value.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Initialization {
    custom_script: String,
    host_name: String,
}

impl Initialization {
    pub fn new(custom_script: impl Into<String>, host_name: impl Into<String>) -> Self {
        Self {
            custom_script: custom_script.into(),
            host_name: host_name.into(),
        }
    }

    /// Script run by cloud-init on first boot.
    pub fn custom_script(&self) -> &str {
        &self.custom_script
    }

    /// Host name set on first boot.
    pub fn host_name(&self) -> &str {
        &self.host_name
    }

    pub fn is_empty(&self) -> bool {
        self.custom_script.is_empty() && self.host_name.is_empty()
    }
}

/// Point-in-time snapshot of a virtual machine.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Vm {
    pub(crate) id: VmId,
    pub(crate) name: String,
    pub(crate) comment: String,
    pub(crate) cluster_id: ClusterId,
    pub(crate) template_id: TemplateId,
    pub(crate) status: VmStatus,
    pub(crate) cpu: VmCpu,
    pub(crate) tag_ids: Vec<TagId>,
    pub(crate) huge_pages: Option<VmHugePages>,
    pub(crate) initialization: Initialization,
}

impl Vm {
    pub fn id(&self) -> &VmId {
        &self.id
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn comment(&self) -> &str {
        &self.comment
    }

    /// Cluster the VM belongs to.
    pub fn cluster_id(&self) -> &ClusterId {
        &self.cluster_id
    }

    /// Template the VM was created from.
    pub fn template_id(&self) -> &TemplateId {
        &self.template_id
    }

    pub fn status(&self) -> VmStatus {
        self.status
    }

    pub fn cpu(&self) -> VmCpu {
        self.cpu
    }

    pub fn tag_ids(&self) -> &[TagId] {
        &self.tag_ids
    }

    /// Huge page setting, if the VM has one.
    pub fn huge_pages(&self) -> Option<VmHugePages> {
        self.huge_pages
    }

    pub fn initialization(&self) -> &Initialization {
        &self.initialization
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use ovirt_common::ErrorKind;
    use proptest::prelude::*;

    #[test]
    fn test_cpu_topo_rejects_zero() {
        let err = VmCpuTopo::new(0, 1, 1).unwrap_err();
        assert_eq!(err.kind(), ErrorKind::BadArgument);
        assert!(err.to_string().contains("cores"));

        assert!(VmCpuTopo::new(1, 0, 1).unwrap_err().to_string().contains("threads"));
        assert!(VmCpuTopo::new(1, 1, 0).unwrap_err().to_string().contains("sockets"));
    }

    #[test]
    #[should_panic(expected = "number of sockets must be positive")]
    fn test_must_new_panics() {
        VmCpuTopo::must_new(2, 2, 0);
    }

    #[test]
    fn test_huge_pages_message_lists_allowed_values() {
        let err = VmHugePages::new(4096).validate().unwrap_err();
        assert_eq!(err.kind(), ErrorKind::BadArgument);
        assert!(err.to_string().ends_with("4096 must be one of: 2048, 1048576"));
        assert!(VmHugePages::M2.validate().is_ok());
        assert!(VmHugePages::G1.validate().is_ok());
    }

    #[test]
    fn test_empty_initialization() {
        let init = Initialization::default();
        assert!(init.is_empty());
        assert_eq!(init.custom_script(), "");
        assert!(!Initialization::new("script-test", "test-vm").is_empty());
    }

    proptest! {
        #[test]
        fn cpu_topo_valid_iff_all_positive(
            cores in 0u32..8,
            threads in 0u32..8,
            sockets in 0u32..8,
        ) {
            let result = VmCpuTopo::new(cores, threads, sockets);
            prop_assert_eq!(result.is_ok(), cores >= 1 && threads >= 1 && sockets >= 1);
            if let Ok(topo) = result {
                prop_assert_eq!(
                    (topo.cores(), topo.threads(), topo.sockets()),
                    (cores, threads, sockets)
                );
            }
        }

        #[test]
        fn huge_pages_valid_iff_allowed(value in any::<u64>()) {
            let result = VmHugePages::new(value).validate();
            prop_assert_eq!(result.is_ok(), value == 2048 || value == 1_048_576);
        }
    }
}
