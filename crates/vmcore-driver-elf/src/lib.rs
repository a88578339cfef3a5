//! ELF coredump loader.
//!
//! Reads the core files written by the VM dumper: a 64-bit little-endian
//! `ET_CORE` ELF with one `PT_NOTE` segment holding three notes per vCPU
//! (`NT_PRSTATUS`, `NT_PRXFPREG` and the vendor `NT_PRXREG`) and one
//! `PT_LOAD` segment per captured guest-physical memory region.
//!
//! ```no_run
//! use vmcore_core::{Pa, PhysicalMemory as _};
//! use vmcore_driver_elf::ElfCore;
//!
//! # fn main() -> Result<(), vmcore_core::VmcoreError> {
//! let core = ElfCore::open("guest.core")?;
//! let cr3 = core.registers(0)?.cr3;
//!
//! let mut buffer = [0u8; 8];
//! core.read(Pa(cr3.0 & !0xfff), &mut buffer)?;
//! # Ok(())
//! # }
//! ```

mod convert;
mod dump;
mod error;
mod note;
mod segment;
mod snapshot;
pub mod sys;

use self::convert::{FromExt, IntoExt};
pub use self::{
    dump::ElfCore,
    error::Error,
    note::CoreNote,
    segment::Segment,
    snapshot::{CpuSnapshot, Msr},
};
