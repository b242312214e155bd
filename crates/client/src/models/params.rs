//! Parameter builders for create, update and search calls.
//!
//! Builders validate every value as it is set. A rejected value leaves the
//! builder unchanged. Each builder guards its state with its own lock, so a
//! shared builder can be filled from several tasks.

use super::vm::{Initialization, VmCpuTopo, VmHugePages};
use ovirt_common::{Error, Result, VmStatus};
use std::sync::{Mutex, MutexGuard, PoisonError};

fn lock<T>(mutex: &Mutex<T>) -> MutexGuard<'_, T> {
    mutex.lock().unwrap_or_else(PoisonError::into_inner)
}

fn is_name_char(c: char) -> bool {
    c.is_ascii_alphanumeric() || matches!(c, '_' | '-' | '.')
}

/// Check a VM name against `[A-Za-z0-9_.-]*`.
pub fn validate_vm_name(name: &str) -> Result<()> {
    if name.chars().all(is_name_char) {
        Ok(())
    } else {
        Err(Error::bad_argument(format!("invalid VM name: {name}")))
    }
}

/// Check a disk alias against `[A-Za-z0-9_.-]*`.
pub fn validate_disk_alias(alias: &str) -> Result<()> {
    if alias.chars().all(is_name_char) {
        Ok(())
    } else {
        Err(Error::bad_argument(format!("invalid disk alias: {alias}")))
    }
}

fn must<T>(result: Result<T>) -> T {
    result.unwrap_or_else(|e| panic!("{e}"))
}

/// Optional settings for VM creation. `None` lets the engine decide.
pub trait OptionalVmParameters: Send + Sync {
    fn comment(&self) -> Option<String>;
    fn cpu(&self) -> Option<VmCpuTopo>;
    fn huge_pages(&self) -> Option<VmHugePages>;
    fn initialization(&self) -> Option<Initialization>;
}

#[derive(Debug, Clone, Default)]
struct VmParamsState {
    comment: Option<String>,
    cpu: Option<VmCpuTopo>,
    huge_pages: Option<VmHugePages>,
    initialization: Option<Initialization>,
}

/// Builder for [`OptionalVmParameters`].
///
/// ```
/// use ovirt_client::{CreateVmParams, VmHugePages};
///
/// let params = CreateVmParams::new();
/// params
///     .must_with_cpu_parameters(2, 2, 2)
///     .must_with_huge_pages(VmHugePages::M2);
/// ```
#[derive(Debug, Default)]
pub struct CreateVmParams {
    state: Mutex<VmParamsState>,
}

impl CreateVmParams {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_comment(&self, comment: impl Into<String>) -> Result<&Self> {
        lock(&self.state).comment = Some(comment.into());
        Ok(self)
    }

    pub fn must_with_comment(&self, comment: impl Into<String>) -> &Self {
        must(self.with_comment(comment))
    }

    pub fn with_cpu(&self, cpu: VmCpuTopo) -> Result<&Self> {
        lock(&self.state).cpu = Some(cpu);
        Ok(self)
    }

    pub fn must_with_cpu(&self, cpu: VmCpuTopo) -> &Self {
        must(self.with_cpu(cpu))
    }

    /// Shorthand for [`VmCpuTopo::new`] followed by [`CreateVmParams::with_cpu`].
    pub fn with_cpu_parameters(&self, cores: u32, threads: u32, sockets: u32) -> Result<&Self> {
        let cpu = VmCpuTopo::new(cores, threads, sockets)?;
        self.with_cpu(cpu)
    }

    pub fn must_with_cpu_parameters(&self, cores: u32, threads: u32, sockets: u32) -> &Self {
        must(self.with_cpu_parameters(cores, threads, sockets))
    }

    pub fn with_huge_pages(&self, huge_pages: VmHugePages) -> Result<&Self> {
        huge_pages.validate()?;
        lock(&self.state).huge_pages = Some(huge_pages);
        Ok(self)
    }

    pub fn must_with_huge_pages(&self, huge_pages: VmHugePages) -> &Self {
        must(self.with_huge_pages(huge_pages))
    }

    pub fn with_initialization(&self, initialization: Initialization) -> Result<&Self> {
        lock(&self.state).initialization = Some(initialization);
        Ok(self)
    }

    pub fn must_with_initialization(&self, initialization: Initialization) -> &Self {
        must(self.with_initialization(initialization))
    }

    pub fn must_with_initialization_parameters(
        &self,
        custom_script: impl Into<String>,
        host_name: impl Into<String>,
    ) -> &Self {
        self.must_with_initialization(Initialization::new(custom_script, host_name))
    }
}

impl OptionalVmParameters for CreateVmParams {
    fn comment(&self) -> Option<String> {
        lock(&self.state).comment.clone()
    }

    fn cpu(&self) -> Option<VmCpuTopo> {
        lock(&self.state).cpu
    }

    fn huge_pages(&self) -> Option<VmHugePages> {
        lock(&self.state).huge_pages
    }

    fn initialization(&self) -> Option<Initialization> {
        lock(&self.state).initialization.clone()
    }
}

/// Fields to change on a VM. `None` leaves the field untouched.
pub trait UpdateVmParameters: Send + Sync {
    fn name(&self) -> Option<String>;
    fn comment(&self) -> Option<String>;
}

#[derive(Debug, Clone, Default)]
struct UpdateVmState {
    name: Option<String>,
    comment: Option<String>,
}

/// Builder for [`UpdateVmParameters`].
#[derive(Debug, Default)]
pub struct UpdateVmParams {
    state: Mutex<UpdateVmState>,
}

impl UpdateVmParams {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_name(&self, name: impl Into<String>) -> Result<&Self> {
        let name = name.into();
        validate_vm_name(&name)?;
        lock(&self.state).name = Some(name);
        Ok(self)
    }

    pub fn must_with_name(&self, name: impl Into<String>) -> &Self {
        must(self.with_name(name))
    }

    pub fn with_comment(&self, comment: impl Into<String>) -> Result<&Self> {
        lock(&self.state).comment = Some(comment.into());
        Ok(self)
    }

    pub fn must_with_comment(&self, comment: impl Into<String>) -> &Self {
        must(self.with_comment(comment))
    }
}

impl UpdateVmParameters for UpdateVmParams {
    fn name(&self) -> Option<String> {
        lock(&self.state).name.clone()
    }

    fn comment(&self) -> Option<String> {
        lock(&self.state).comment.clone()
    }
}

/// Filters for a VM search. Set filters are combined with AND.
pub trait VmSearchParameters: Send + Sync {
    /// Exact VM name.
    fn name(&self) -> Option<String>;
    /// Name of a tag the VM carries.
    fn tag(&self) -> Option<String>;
    /// Acceptable statuses.
    fn statuses(&self) -> Option<Vec<VmStatus>>;
    /// Excluded statuses.
    fn not_statuses(&self) -> Option<Vec<VmStatus>>;
}

#[derive(Debug, Clone, Default)]
struct VmSearchState {
    name: Option<String>,
    tag: Option<String>,
    statuses: Option<Vec<VmStatus>>,
    not_statuses: Option<Vec<VmStatus>>,
}

/// Builder for [`VmSearchParameters`]. None of the filters can be invalid,
/// so the setters return the builder directly.
#[derive(Debug, Default)]
pub struct VmSearchParams {
    state: Mutex<VmSearchState>,
}

impl VmSearchParams {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_name(&self, name: impl Into<String>) -> &Self {
        lock(&self.state).name = Some(name.into());
        self
    }

    pub fn with_tag(&self, tag: impl Into<String>) -> &Self {
        lock(&self.state).tag = Some(tag.into());
        self
    }

    /// Add one status to the accepted list.
    pub fn with_status(&self, status: VmStatus) -> &Self {
        lock(&self.state)
            .statuses
            .get_or_insert_with(Vec::new)
            .push(status);
        self
    }

    /// Add one status to the excluded list.
    pub fn with_not_status(&self, status: VmStatus) -> &Self {
        lock(&self.state)
            .not_statuses
            .get_or_insert_with(Vec::new)
            .push(status);
        self
    }

    /// Replace the accepted list.
    pub fn with_statuses(&self, statuses: &[VmStatus]) -> &Self {
        lock(&self.state).statuses = Some(statuses.to_vec());
        self
    }

    /// Replace the excluded list.
    pub fn with_not_statuses(&self, statuses: &[VmStatus]) -> &Self {
        lock(&self.state).not_statuses = Some(statuses.to_vec());
        self
    }
}

impl VmSearchParameters for VmSearchParams {
    fn name(&self) -> Option<String> {
        lock(&self.state).name.clone()
    }

    fn tag(&self) -> Option<String> {
        lock(&self.state).tag.clone()
    }

    fn statuses(&self) -> Option<Vec<VmStatus>> {
        lock(&self.state).statuses.clone()
    }

    fn not_statuses(&self) -> Option<Vec<VmStatus>> {
        lock(&self.state).not_statuses.clone()
    }
}

#[derive(Debug, Clone, Default)]
struct DiskParamsState {
    alias: Option<String>,
    sparse: Option<bool>,
}

/// Optional settings for disk creation.
#[derive(Debug, Default)]
pub struct CreateDiskParams {
    state: Mutex<DiskParamsState>,
}

impl CreateDiskParams {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_alias(&self, alias: impl Into<String>) -> Result<&Self> {
        let alias = alias.into();
        validate_disk_alias(&alias)?;
        lock(&self.state).alias = Some(alias);
        Ok(self)
    }

    pub fn must_with_alias(&self, alias: impl Into<String>) -> &Self {
        must(self.with_alias(alias))
    }

    pub fn with_sparse(&self, sparse: bool) -> Result<&Self> {
        lock(&self.state).sparse = Some(sparse);
        Ok(self)
    }

    pub fn must_with_sparse(&self, sparse: bool) -> &Self {
        must(self.with_sparse(sparse))
    }

    pub fn alias(&self) -> Option<String> {
        lock(&self.state).alias.clone()
    }

    pub fn sparse(&self) -> Option<bool> {
        lock(&self.state).sparse
    }
}

#[derive(Debug, Clone, Default)]
struct DiskAttachmentParamsState {
    bootable: Option<bool>,
    active: Option<bool>,
}

/// Optional settings for attaching a disk to a VM.
#[derive(Debug, Default)]
pub struct CreateDiskAttachmentParams {
    state: Mutex<DiskAttachmentParamsState>,
}

impl CreateDiskAttachmentParams {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_bootable(&self, bootable: bool) -> Result<&Self> {
        lock(&self.state).bootable = Some(bootable);
        Ok(self)
    }

    pub fn must_with_bootable(&self, bootable: bool) -> &Self {
        must(self.with_bootable(bootable))
    }

    pub fn with_active(&self, active: bool) -> Result<&Self> {
        lock(&self.state).active = Some(active);
        Ok(self)
    }

    pub fn must_with_active(&self, active: bool) -> &Self {
        must(self.with_active(active))
    }

    pub fn bootable(&self) -> Option<bool> {
        lock(&self.state).bootable
    }

    pub fn active(&self) -> Option<bool> {
        lock(&self.state).active
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use ovirt_common::ErrorKind;
    use proptest::prelude::*;
    use std::sync::Arc;

    #[test]
    fn test_rejected_value_keeps_previous_state() {
        let params = CreateVmParams::new();
        params.must_with_cpu_parameters(2, 2, 2);

        assert!(params.with_cpu_parameters(0, 1, 1).is_err());
        assert_eq!(params.cpu(), Some(VmCpuTopo::must_new(2, 2, 2)));

        params.must_with_huge_pages(VmHugePages::M2);
        let err = params.with_huge_pages(VmHugePages::new(1)).unwrap_err();
        assert_eq!(err.kind(), ErrorKind::BadArgument);
        assert_eq!(params.huge_pages(), Some(VmHugePages::M2));
    }

    #[test]
    fn test_unset_fields_are_absent() {
        let params = CreateVmParams::new();
        assert_eq!(params.comment(), None);
        assert_eq!(params.cpu(), None);
        assert_eq!(params.huge_pages(), None);
        assert_eq!(params.initialization(), None);
    }

    #[test]
    fn test_initialization_parameters() {
        let params = CreateVmParams::new();
        params.must_with_initialization_parameters("script-test", "test-vm");
        let init = params.initialization().unwrap();
        assert_eq!(init.custom_script(), "script-test");
        assert_eq!(init.host_name(), "test-vm");
    }

    #[test]
    fn test_update_only_name_leaves_comment_absent() {
        let params = UpdateVmParams::new();
        params.must_with_name("new_name");
        assert_eq!(params.name(), Some("new_name".to_string()));
        assert_eq!(params.comment(), None);

        params.must_with_comment("");
        assert_eq!(params.comment(), Some(String::new()));
    }

    #[test]
    #[should_panic(expected = "invalid VM name: bad name")]
    fn test_must_with_name_panics() {
        UpdateVmParams::new().must_with_name("bad name");
    }

    #[test]
    fn test_search_status_accumulation() {
        let params = VmSearchParams::new();
        assert_eq!(params.statuses(), None);

        params
            .with_status(VmStatus::Up)
            .with_status(VmStatus::PoweringUp)
            .with_not_status(VmStatus::Down);
        assert_eq!(params.statuses(), Some(vec![VmStatus::Up, VmStatus::PoweringUp]));
        assert_eq!(params.not_statuses(), Some(vec![VmStatus::Down]));

        params.with_statuses(&[VmStatus::Paused]);
        assert_eq!(params.statuses(), Some(vec![VmStatus::Paused]));
        assert_eq!(params.not_statuses(), Some(vec![VmStatus::Down]));
    }

    #[test]
    fn test_disk_alias_validation() {
        let params = CreateDiskParams::new();
        params.must_with_alias("disk-1.img");
        assert!(params.with_alias("disk/1").is_err());
        assert_eq!(params.alias(), Some("disk-1.img".to_string()));
    }

    #[test]
    fn test_concurrent_setters() {
        let params = Arc::new(CreateVmParams::new());
        let handles: Vec<_> = (1..=8u32)
            .map(|n| {
                let params = Arc::clone(&params);
                std::thread::spawn(move || {
                    params.must_with_cpu_parameters(n, 1, 1);
                })
            })
            .collect();
        for handle in handles {
            handle.join().unwrap();
        }
        let cores = params.cpu().unwrap().cores();
        assert!((1..=8).contains(&cores));
    }

    proptest! {
        #[test]
        fn valid_names_are_accepted(name in "[A-Za-z0-9_.-]{0,32}") {
            prop_assert!(UpdateVmParams::new().with_name(name).is_ok());
        }

        #[test]
        fn names_with_a_disallowed_char_are_rejected(
            prefix in "[A-Za-z0-9_.-]{0,8}",
            bad in "[^A-Za-z0-9_.-]",
            suffix in "[A-Za-z0-9_.-]{0,8}",
        ) {
            let name = format!("{prefix}{bad}{suffix}");
            let params = UpdateVmParams::new();
            let err = params.with_name(name).unwrap_err();
            prop_assert_eq!(err.kind(), ErrorKind::BadArgument);
            prop_assert_eq!(params.name(), None);
        }
    }
}
