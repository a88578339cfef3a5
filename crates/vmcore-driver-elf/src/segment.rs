use std::ops::Range;

use vmcore_core::Pa;

/// One `PT_LOAD` segment of the core.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Segment {
    pub(crate) index: usize,

    /// Guest physical address of the first byte (`p_paddr`).
    pub phys_start: Pa,

    /// Base address recorded by the dumper (`p_vaddr`). The dumper writes
    /// the physical base here as well.
    pub virt_start: u64,

    /// Offset of the first byte in the file (`p_offset`).
    pub file_offset: u64,

    /// Number of bytes present in the file (`p_filesz`).
    pub file_size: u64,

    /// Size of the segment in guest memory (`p_memsz`).
    pub mem_size: u64,
}

impl Segment {
    /// Returns the position of the segment among the `PT_LOAD` entries.
    pub fn index(&self) -> usize {
        self.index
    }

    /// Returns the physical range backed by file bytes.
    pub fn phys_range(&self) -> Range<Pa> {
        let end = self
            .phys_start
            .checked_add(self.file_size)
            .unwrap_or(Pa(u64::MAX));

        self.phys_start..end
    }

    /// Checks if `addr` lies in `[p_vaddr, p_vaddr + p_memsz)`.
    pub fn contains(&self, addr: u64) -> bool {
        addr >= self.virt_start && addr - self.virt_start < self.mem_size
    }
}
