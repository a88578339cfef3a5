//! Post-mortem memory forensics for virtual machine coredumps.
//!
//! `vmcore` re-exports its component crates behind cargo features:
//!
//! - [`arch::amd64`]: AMD64 registers, paging structures and the page-table
//!   walker (`arch-amd64`).
//! - [`driver::elf`]: the ELF coredump loader (`driver-elf`).
//! - [`os::linux`]: Linux kernel location and symbol recovery (`os-linux`).
//!
//! The core types ([`Memory`], [`MappedMemory`], [`Pa`], [`Va`],
//! [`VmcoreError`], ...) are re-exported at the crate root.
//!
//! ```no_run
//! use vmcore::{driver::elf::ElfCore, os::linux::LinuxKernel};
//!
//! # fn main() -> Result<(), vmcore::VmcoreError> {
//! let core = ElfCore::open("guest.core")?;
//! let kernel = LinuxKernel::locate(&core)?;
//! println!("kernel at {:?}", kernel.range());
//! # Ok(())
//! # }
//! ```

pub use vmcore_core::*;

/// Architecture support.
pub mod arch {
    /// AMD64 registers and paging.
    #[cfg(feature = "arch-amd64")]
    pub mod amd64 {
        pub use vmcore_arch_amd64::*;
    }
}

/// Coredump loaders.
pub mod driver {
    /// ELF coredump loader.
    #[cfg(feature = "driver-elf")]
    pub mod elf {
        pub use vmcore_driver_elf::*;
    }
}

/// Guest operating system support.
pub mod os {
    /// Linux kernel analysis.
    #[cfg(feature = "os-linux")]
    pub mod linux {
        pub use vmcore_os_linux::*;
    }
}
