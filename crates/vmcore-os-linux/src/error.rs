use vmcore_arch_amd64::PagingMode;
use vmcore_core::{Pa, Va, VmcoreError};

/// Error types for Linux operations.
#[derive(thiserror::Error, Debug)]
pub enum LinuxError {
    /// The string used to find the symbol name pool is not in the kernel.
    #[error("kernel symbol anchor not found")]
    AnchorNotFound,

    /// Nothing is mapped in the KASLR range.
    #[error("no kernel mapping found in {start}..{end}")]
    KernelNotFound {
        /// First address of the searched range.
        start: Va,

        /// One past the last address of the searched range.
        end: Va,
    },

    /// Two consecutive kernel pages are not adjacent.
    #[error("kernel is not contiguous at {va}: expected {expected}, found {found}")]
    KernelNotContiguous {
        /// Virtual address of the offending page.
        va: Va,

        /// Physical address that would have continued the image.
        expected: Pa,

        /// Physical address the page is actually mapped to.
        found: Pa,
    },

    /// The vCPU was stopped in user mode, where the kernel may not be
    /// mapped.
    #[error("vCPU {0} stopped in user mode")]
    UserModeVcpu(usize),

    /// The vCPU does not use 4-level paging.
    #[error("unsupported paging mode: {0:?}")]
    UnsupportedPagingMode(Option<PagingMode>),

    /// A memory access failed.
    #[error(transparent)]
    Core(#[from] VmcoreError),
}

impl From<LinuxError> for VmcoreError {
    fn from(value: LinuxError) -> Self {
        match value {
            LinuxError::Core(err) => err,
            err => VmcoreError::Os(err.into()),
        }
    }
}
