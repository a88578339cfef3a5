use zerocopy::{FromBytes, Immutable, IntoBytes, KnownLayout};

use crate::Pa;

/// Supported paging modes.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PagingMode {
    /// 32-bit paging (4KB pages).
    Legacy,

    /// Physical Address Extension on a 32-bit system.
    PAE,

    /// 64-bit paging (4-level paging).
    Ia32e,

    /// 64-bit paging with 5-level paging (57-bit linear addresses).
    Ia32eLA57,
}

/// The levels in the 4-level page table hierarchy.
///
/// The discriminant order is bottom-up (`Pt < Pd < Pdpt < Pml4`). The
/// walker also numbers the levels top-down from the root, see
/// [`depth`](Self::depth).
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
#[repr(u8)]
pub enum PageTableLevel {
    /// Page Table (PT), pointing directly to 4KB pages.
    Pt,

    /// Page Directory (PD), pointing to PTs or 2MB large pages.
    Pd,

    /// Page Directory Pointer Table (PDPT), pointing to PDs or 1GB large
    /// pages.
    Pdpt,

    /// Page Map Level 4 (PML4), the root of 4-level paging.
    Pml4,
}

impl PageTableLevel {
    /// Returns the next lower level in the page table hierarchy.
    pub fn next(self) -> Option<Self> {
        match self {
            Self::Pt => None,
            Self::Pd => Some(Self::Pt),
            Self::Pdpt => Some(Self::Pd),
            Self::Pml4 => Some(Self::Pdpt),
        }
    }

    /// Returns the distance from the root: 0 for PML4 through 3 for PT.
    pub fn depth(self) -> u8 {
        3 - self as u8
    }

    /// Returns the position of the lowest virtual-address bit indexed by
    /// this level: `12 + 9 * (3 - depth)`.
    pub fn shift(self) -> u32 {
        12 + 9 * (3 - u32::from(self.depth()))
    }

    /// Returns the span of virtual memory covered by one entry of a table
    /// at this level.
    pub fn entry_span(self) -> u64 {
        1 << self.shift()
    }
}

bitflags::bitflags! {
    /// Flag bits of a paging-structure entry.
    #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
    pub struct PageTableFlags: u64 {
        /// The entry is present.
        const PRESENT = 1;
        /// Writes are allowed.
        const WRITABLE = 1 << 1;
        /// User-mode accesses are allowed.
        const USER_ACCESSIBLE = 1 << 2;
        /// Page-level write-through.
        const WRITE_THROUGH = 1 << 3;
        /// Page-level cache disable.
        const NO_CACHE = 1 << 4;
        /// Set by the processor on access.
        const ACCESSED = 1 << 5;
        /// Set by the processor on write (leaves only).
        const DIRTY = 1 << 6;
        /// Maps a 2MB or 1GB page (PAT bit in a PT entry).
        const HUGE_PAGE = 1 << 7;
        /// Global translation (leaves only).
        const GLOBAL = 1 << 8;
        /// Instruction fetches are not allowed (needs `EFER.NXE`).
        const NO_EXECUTE = 1 << 63;
    }
}

/// A page table entry in the paging structures.
#[repr(transparent)]
#[derive(Default, Clone, Copy, PartialEq, Eq, FromBytes, IntoBytes, Immutable, KnownLayout)]
pub struct PageTableEntry(pub u64);

impl PageTableEntry {
    /// Bits 12-51: the physical address referenced by the entry.
    pub const ADDRESS_MASK: u64 = 0x000f_ffff_ffff_f000;

    /// Checks if the page is present in physical memory.
    pub fn present(self) -> bool {
        self.0 & 1 != 0
    }

    /// Checks if the page is writable.
    pub fn write(self) -> bool {
        (self.0 >> 1) & 1 != 0
    }

    /// Checks if the page is accessible in user mode.
    pub fn user(self) -> bool {
        (self.0 >> 2) & 1 != 0
    }

    /// Checks if write-through caching is enabled for the page.
    pub fn page_level_write_through(self) -> bool {
        (self.0 >> 3) & 1 != 0
    }

    /// Checks if caching is disabled for the page.
    pub fn page_level_cache_disable(self) -> bool {
        (self.0 >> 4) & 1 != 0
    }

    /// Checks if the page has been accessed.
    pub fn accessed(self) -> bool {
        (self.0 >> 5) & 1 != 0
    }

    /// Checks if the page has been written to.
    pub fn dirty(self) -> bool {
        (self.0 >> 6) & 1 != 0
    }

    /// Checks if this entry refers to a large page.
    pub fn large(self) -> bool {
        (self.0 >> 7) & 1 != 0
    }

    /// Checks if the page is global (shared between all address spaces).
    pub fn global(self) -> bool {
        (self.0 >> 8) & 1 != 0
    }

    /// Checks if instruction fetches from the page are disallowed.
    pub fn no_execute(self) -> bool {
        (self.0 >> 63) & 1 != 0
    }

    /// Returns the known flag bits of the entry.
    pub fn flags(self) -> PageTableFlags {
        PageTableFlags::from_bits_truncate(self.0)
    }

    /// Extracts the physical address referenced by the entry: the next
    /// table, or the 4KB page of a PT entry.
    pub fn pa(self) -> Pa {
        Pa(self.0 & Self::ADDRESS_MASK)
    }

    /// Extracts the base of the page mapped by a leaf entry at `level`.
    ///
    /// Large pages drop the PAT bit and the low reserved bits.
    pub fn page_base(self, level: PageTableLevel) -> Pa {
        let size = match level {
            PageTableLevel::Pt => 0x1000,
            _ if self.large() => level.entry_span(),
            _ => 0x1000,
        };

        Pa(self.0 & Self::ADDRESS_MASK & !(size - 1))
    }

    /// Returns the reserved bits that are set, for an entry at `level`.
    ///
    /// Bits `physical_address_bits..52` are reserved in every entry. A PD
    /// large page additionally reserves bits 13-20, and a PDPT large page
    /// bits 13-29. Bit 12 of a large page is the PAT bit. The large-page bit
    /// itself is reserved in a PML4 entry.
    pub fn reserved_bits(self, level: PageTableLevel, physical_address_bits: u8) -> u64 {
        let bits = u32::from(physical_address_bits.clamp(12, 52));
        let mut reserved = Self::ADDRESS_MASK & !((1u64 << bits) - 1);

        if self.large() {
            reserved |= match level {
                PageTableLevel::Pd => 0x1f_e000,
                PageTableLevel::Pdpt => 0x3fff_e000,
                PageTableLevel::Pml4 => 1 << 7,
                PageTableLevel::Pt => 0,
            };
        }

        self.0 & reserved
    }
}

impl std::fmt::Debug for PageTableEntry {
    fn fmt(&self, f: &mut std::fmt::Formatter) -> std::fmt::Result {
        f.debug_struct("PageTableEntry")
            .field("present", &self.present())
            .field("write", &self.write())
            .field("user", &self.user())
            .field("page_level_write_through", &self.page_level_write_through())
            .field("page_level_cache_disable", &self.page_level_cache_disable())
            .field("accessed", &self.accessed())
            .field("dirty", &self.dirty())
            .field("large", &self.large())
            .field("global", &self.global())
            .field("no_execute", &self.no_execute())
            .field("pa", &self.pa())
            .finish()
    }
}
