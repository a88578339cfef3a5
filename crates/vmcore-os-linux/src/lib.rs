//! Linux kernel analysis for x86-64 coredumps.
//!
//! Finds the kernel image inside the KASLR range by walking the page tables
//! of a vCPU halted in kernel mode, then recovers what the image itself
//! reveals without debug information: the `linux_banner` string and the
//! exported symbols in `__ksymtab`.
//!
//! ```no_run
//! use vmcore_driver_elf::ElfCore;
//! use vmcore_os_linux::LinuxKernel;
//!
//! # fn main() -> Result<(), vmcore_core::VmcoreError> {
//! let core = ElfCore::open("guest.core")?;
//! let kernel = LinuxKernel::locate(&core)?;
//!
//! if let Some(printk) = kernel.symbol("_printk") {
//!     println!("_printk @ {printk}");
//! }
//! # Ok(())
//! # }
//! ```

mod banner;
mod error;
mod kernel;
mod layout;
mod locator;
mod symbols;

#[cfg(test)]
mod testing;

pub use self::{
    banner::find_banner,
    error::LinuxError,
    kernel::{LinuxKernel, LinuxKernelOptions},
    layout::{LINUX_MEMORY_MAP, MemoryRegion, memory_region},
    locator::{KASLR_KERNEL_RANGE, KernelSection, kernel_sections, locate_kernel},
    symbols::{
        DEFAULT_ANCHOR, KernelSymbolLayout, KernelSymbolTable, find_string_pool, find_symbol_table,
        recover_symbols, recover_symbols_with_anchor, symbols_from_string_pool,
    },
};
