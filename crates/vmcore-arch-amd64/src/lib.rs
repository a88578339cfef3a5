//! AMD64 architecture definitions.
//!
//! Registers as captured in a core dump, the 4-level paging structures and
//! a lazy walker over them.

mod cr;
mod descriptor;
mod efer;
mod paging;
mod registers;
mod rflags;
mod segment;
mod translation;
mod walker;

use vmcore_core::{Gfn, Pa, PhysicalMemory, Va};
use zerocopy::IntoBytes;

pub use self::{
    cr::{Cr0, Cr2, Cr3, Cr4},
    descriptor::{Gdtr, Idtr},
    efer::MsrEfer,
    paging::{PageTableEntry, PageTableFlags, PageTableLevel, PagingMode},
    registers::{FpuRegisters, Registers},
    rflags::Rflags,
    segment::{
        DescriptorTable, DescriptorType, Granularity, SegmentAccess, SegmentDescriptor, Selector,
    },
    translation::{TranslationEntries, TranslationEntry, VaTranslation},
    walker::{
        ENTRY_COUNT, PageTable, PageTableIter, PageTableWalker, WalkEntry, read_table,
        walk_page_table,
    },
};

/// AMD64 architecture.
#[derive(Debug)]
pub struct Amd64;

impl Amd64 {
    /// Size of a base page.
    pub const PAGE_SIZE: u64 = 0x1000;

    /// Number of address bits below the base-page boundary.
    pub const PAGE_SHIFT: u64 = 12;

    /// Mask selecting the base-page part of an address.
    pub const PAGE_MASK: u64 = 0xFFFFFFFFFFFFF000;

    /// Returns the frame number holding `pa`.
    pub fn gfn_from_pa(pa: Pa) -> Gfn {
        Gfn(pa.0 >> Self::PAGE_SHIFT)
    }

    /// Returns the physical address of the first byte of `gfn`.
    pub fn pa_from_gfn(gfn: Gfn) -> Pa {
        Pa(gfn.0 << Self::PAGE_SHIFT)
    }

    /// Returns the offset of `va` within a page mapped at `level`.
    pub fn va_offset_for(va: Va, level: PageTableLevel) -> u64 {
        va.0 & (level.entry_span() - 1)
    }

    /// Returns the index of `va` in a table at `level`.
    pub fn va_index_for(va: Va, level: PageTableLevel) -> u64 {
        (va.0 >> level.shift()) & 0x1ff
    }

    /// Sign-extends bit 47 of `va` into bits 48-63.
    pub fn sign_extend(va: Va) -> Va {
        if (va.0 >> 47) & 1 != 0 {
            Va(va.0 | 0xffff << 48)
        }
        else {
            Va(va.0 & ((1 << 48) - 1))
        }
    }

    /// Checks if `va` is canonical under 4-level paging.
    pub fn is_canonical(va: Va) -> bool {
        Self::sign_extend(va) == va
    }

    /// Determine the paging mode of the processor based on control register
    /// values.
    ///
    /// # Paging Modes
    ///
    /// - **No Paging**: When paging is disabled (CR0.PG = 0)
    /// - **32-bit Paging**: Used when CR0.PG = 1 and CR4.PAE = 0
    /// - **PAE Paging**: Used when CR0.PG = 1, CR4.PAE = 1, and IA32_EFER.LME = 0
    /// - **4-level Paging**: Used when CR0.PG = 1, CR4.PAE = 1, IA32_EFER.LME = 1, and CR4.LA57 = 0
    /// - **5-level Paging**: Used when CR0.PG = 1, CR4.PAE = 1, IA32_EFER.LME = 1, and CR4.LA57 = 1
    ///
    /// If paging is disabled, the function returns `None`.
    pub fn paging_mode(registers: &Registers) -> Option<PagingMode> {
        if !registers.cr0.paging() {
            return None;
        }

        if !registers.cr4.physical_address_extension() {
            return Some(PagingMode::Legacy);
        }

        if !registers.msr_efer.long_mode_enable() {
            return Some(PagingMode::PAE);
        }

        if !registers.cr4.linear_address_57_bit() {
            return Some(PagingMode::Ia32e);
        }

        Some(PagingMode::Ia32eLA57)
    }

    /// Returns the physical address of the PML4 table.
    ///
    /// With `CR4.PCIDE` set the low 12 bits of `CR3` are a PCID and the
    /// address is bits 12-51. Otherwise only the low 12 flag bits are
    /// cleared.
    pub fn translation_root(cr3: Cr3, cr4: Cr4) -> Pa {
        if cr4.pcid_enable() {
            cr3.page_table_base()
        }
        else {
            Pa(cr3.0 & Self::PAGE_MASK)
        }
    }

    /// Translates `va` by walking the tables rooted at `root`, reading one
    /// entry per level.
    ///
    /// A failed read or a non-present entry ends the walk with the entries
    /// collected so far and no physical address.
    pub fn translation<M>(memory: &M, va: Va, root: Pa) -> VaTranslation
    where
        M: PhysicalMemory + ?Sized,
    {
        let mut entries = TranslationEntries::new();
        let mut table = root;
        let mut level = PageTableLevel::Pml4;

        loop {
            let index = Self::va_index_for(va, level);
            let entry_address = table + index * size_of::<PageTableEntry>() as u64;

            let mut entry = PageTableEntry::default();
            if memory.read(entry_address, entry.as_mut_bytes()).is_err() {
                return VaTranslation { entries, pa: None };
            }

            entries.push(TranslationEntry {
                level,
                entry,
                entry_address,
            });

            if !entry.present() {
                return VaTranslation { entries, pa: None };
            }

            if level == PageTableLevel::Pt || entry.large() {
                let pa = entry.page_base(level) + Self::va_offset_for(va, level);
                return VaTranslation {
                    entries,
                    pa: Some(pa),
                };
            }

            let Some(next) = level.next()
            else {
                return VaTranslation { entries, pa: None };
            };

            table = entry.pa();
            level = next;
        }
    }
}

impl Registers {
    /// Returns the physical address of the PML4 table for these registers.
    pub fn translation_root(&self) -> Pa {
        Amd64::translation_root(self.cr3, self.cr4)
    }
}
