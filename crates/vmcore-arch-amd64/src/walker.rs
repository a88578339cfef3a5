//! Lazy traversal of 4-level paging structures.
//!
//! The walker visits entries in index order (0..512) at every level,
//! descending depth-first into the next table unless the entry is a leaf:
//! a PT entry, or an entry with the large-page bit set. Leaves therefore
//! come out in increasing virtual-address order within each half of the
//! canonical address space. The only discontinuity is at PML4 index 256,
//! where the sign extension turns on.
//!
//! Non-present entries are skipped. Entries with reserved bits set are
//! reported through `tracing` but still followed.

use std::ops::Range;

use vmcore_core::{Pa, PhysicalMemory, Va, VmcoreError};
use zerocopy::IntoBytes;

use crate::{Amd64, PageTableEntry, PageTableFlags, PageTableLevel, VaTranslation};

/// Number of entries in every paging-structure table.
pub const ENTRY_COUNT: usize = 512;

/// Physical-address width assumed when none is configured. No address bit
/// below 52 is then treated as reserved.
const DEFAULT_PHYSICAL_ADDRESS_BITS: u8 = 52;

/// One paging-structure table, as read from physical memory.
#[derive(Clone)]
pub struct PageTable {
    pa: Pa,
    level: PageTableLevel,
    virt_prefix: Va,
    entries: Box<[PageTableEntry; ENTRY_COUNT]>,
}

impl PageTable {
    /// Returns the physical address of the table.
    pub fn pa(&self) -> Pa {
        self.pa
    }

    /// Returns the level of the table.
    pub fn level(&self) -> PageTableLevel {
        self.level
    }

    /// Returns the virtual-address bits contributed by the ancestors of this
    /// table.
    pub fn virt_prefix(&self) -> Va {
        self.virt_prefix
    }

    /// Returns the raw entries.
    pub fn entries(&self) -> &[PageTableEntry; ENTRY_COUNT] {
        &self.entries
    }

    /// Returns the present entry at `index`, with the virtual address it
    /// starts at.
    ///
    /// The address is the table's prefix with `index << level.shift()`
    /// merged in, sign-extended from bit 47.
    pub fn entry_at(&self, index: usize) -> Option<WalkEntry> {
        let entry = *self.entries.get(index)?;

        if !entry.present() {
            return None;
        }

        let va = Amd64::sign_extend(self.virt_prefix | ((index as u64) << self.level.shift()));

        Some(WalkEntry {
            entry,
            level: self.level,
            va,
            entry_address: self.pa + (index * size_of::<PageTableEntry>()) as u64,
        })
    }
}

impl std::fmt::Debug for PageTable {
    fn fmt(&self, f: &mut std::fmt::Formatter) -> std::fmt::Result {
        f.debug_struct("PageTable")
            .field("pa", &self.pa)
            .field("level", &self.level)
            .field("virt_prefix", &self.virt_prefix)
            .field("present", &self.entries.iter().filter(|e| e.present()).count())
            .finish()
    }
}

/// Reads the 512 entries of the table at `pa`.
///
/// `virt_prefix` holds the virtual-address bits selected by the entries
/// leading to this table (zero for the root).
pub fn read_table<M>(
    memory: &M,
    pa: Pa,
    virt_prefix: Va,
    level: PageTableLevel,
) -> Result<PageTable, VmcoreError>
where
    M: PhysicalMemory + ?Sized,
{
    let mut entries = Box::new([PageTableEntry::default(); ENTRY_COUNT]);
    memory.read(pa, entries.as_mut_bytes())?;

    tracing::trace!(%pa, ?level, "read page table");

    Ok(PageTable {
        pa,
        level,
        virt_prefix,
        entries,
    })
}

/// A present paging-structure entry, located in the virtual address space.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct WalkEntry {
    /// The raw entry.
    pub entry: PageTableEntry,

    /// The level of the table holding the entry.
    pub level: PageTableLevel,

    /// The first virtual address translated through the entry.
    pub va: Va,

    /// The physical address of the entry itself.
    pub entry_address: Pa,
}

impl WalkEntry {
    /// Checks if the entry maps a page rather than pointing to another
    /// table.
    pub fn is_leaf(&self) -> bool {
        self.level == PageTableLevel::Pt || self.entry.large()
    }

    /// Returns the physical address the entry points to: the mapped page
    /// for a leaf, the next table otherwise.
    pub fn pa(&self) -> Pa {
        if self.is_leaf() {
            self.entry.page_base(self.level)
        }
        else {
            self.entry.pa()
        }
    }

    /// Returns the size of the virtual range translated through the entry.
    ///
    /// For a leaf this is the page size: 4KB, 2MB or 1GB.
    pub fn size(&self) -> u64 {
        self.level.entry_span()
    }

    /// Returns the virtual range translated through the entry.
    ///
    /// The end saturates at the top of the address space.
    pub fn virt_range(&self) -> Range<Va> {
        self.va..Va(self.va.0.saturating_add(self.size()))
    }

    /// Returns the flag bits of the entry.
    pub fn flags(&self) -> PageTableFlags {
        self.entry.flags()
    }

    /// Checks if writes are allowed.
    pub fn writable(&self) -> bool {
        self.entry.write()
    }

    /// Checks if user-mode accesses are allowed.
    pub fn user(&self) -> bool {
        self.entry.user()
    }

    /// Checks if the translation is global.
    pub fn global(&self) -> bool {
        self.entry.global()
    }

    /// Checks if instruction fetches are disallowed.
    pub fn no_execute(&self) -> bool {
        self.entry.no_execute()
    }

    /// Checks if the entry has been accessed.
    pub fn accessed(&self) -> bool {
        self.entry.accessed()
    }

    /// Checks if the page-level write-through flag is set.
    pub fn write_through(&self) -> bool {
        self.entry.page_level_write_through()
    }

    /// Checks if the page-level cache disable flag is set.
    pub fn cache_disable(&self) -> bool {
        self.entry.page_level_cache_disable()
    }

    /// Returns the reserved bits that are set in the entry.
    pub fn reserved_bits(&self, physical_address_bits: u8) -> u64 {
        self.entry.reserved_bits(self.level, physical_address_bits)
    }

    /// Translates `va` through a leaf entry.
    pub fn translate(&self, va: Va) -> Option<Pa> {
        if !self.is_leaf() || va < self.va {
            return None;
        }

        let offset = va - self.va;
        if offset >= self.size() {
            return None;
        }

        Some(self.pa() + offset)
    }
}

/// Walks the paging structures rooted at a PML4 table.
///
/// Every call to [`iter`](Self::iter) or [`iter_range`](Self::iter_range)
/// restarts from the root, so repeated walks over the same memory yield
/// identical sequences.
#[derive(Debug, Clone)]
pub struct PageTableWalker<M> {
    memory: M,
    root: Pa,
    physical_address_bits: u8,
}

impl<M> PageTableWalker<M>
where
    M: PhysicalMemory,
{
    /// Creates a walker over the tables rooted at `root` (the PML4 physical
    /// address, see [`Amd64::translation_root`]).
    pub fn new(memory: M, root: Pa) -> Self {
        Self {
            memory,
            root,
            physical_address_bits: DEFAULT_PHYSICAL_ADDRESS_BITS,
        }
    }

    /// Sets the processor's physical-address width (`MAXPHYADDR`). Entry
    /// bits between it and bit 51 are reported as reserved.
    pub fn with_physical_address_bits(self, physical_address_bits: u8) -> Self {
        Self {
            physical_address_bits,
            ..self
        }
    }

    /// Returns the physical address of the PML4 table.
    pub fn root(&self) -> Pa {
        self.root
    }

    /// Returns the memory the tables are read from.
    pub fn memory(&self) -> &M {
        &self.memory
    }

    /// Returns the configured physical-address width.
    pub fn physical_address_bits(&self) -> u8 {
        self.physical_address_bits
    }

    /// Reads the PML4 table.
    pub fn root_table(&self) -> Result<PageTable, VmcoreError> {
        read_table(&self.memory, self.root, Va(0), PageTableLevel::Pml4)
    }

    /// Returns an iterator over every leaf.
    ///
    /// An unreadable root yields nothing; use [`walk_page_table`] to have
    /// that reported as an error.
    pub fn iter(&self) -> PageTableIter<'_, M> {
        self.start(None)
    }

    /// Returns an iterator over the leaves whose virtual address lies in
    /// `range`. Subtrees outside the range are not read.
    pub fn iter_range(&self, range: Range<Va>) -> PageTableIter<'_, M> {
        self.start(Some(range))
    }

    /// Translates a single virtual address.
    pub fn translate(&self, va: Va) -> VaTranslation {
        Amd64::translation(&self.memory, va, self.root)
    }

    fn start(&self, range: Option<Range<Va>>) -> PageTableIter<'_, M> {
        let mut iter = PageTableIter::empty(&self.memory, range, self.physical_address_bits);

        match self.root_table() {
            Ok(table) => iter.stack.push((table, 0)),
            Err(err) => {
                tracing::warn!(root = %self.root, %err, "page table root is unreadable");
            }
        }

        iter
    }
}

/// Walks the page tables rooted at `root`, failing if the root table
/// cannot be read.
pub fn walk_page_table<M>(memory: &M, root: Pa) -> Result<PageTableIter<'_, M>, VmcoreError>
where
    M: PhysicalMemory + ?Sized,
{
    let table = read_table(memory, root, Va(0), PageTableLevel::Pml4)?;

    let mut iter = PageTableIter::empty(memory, None, DEFAULT_PHYSICAL_ADDRESS_BITS);
    iter.stack.push((table, 0));
    Ok(iter)
}

/// Lazy depth-first iterator over page-table leaves.
pub struct PageTableIter<'a, M>
where
    M: ?Sized,
{
    memory: &'a M,
    range: Option<Range<Va>>,
    physical_address_bits: u8,
    stack: Vec<(PageTable, usize)>,
}

impl<'a, M> PageTableIter<'a, M>
where
    M: PhysicalMemory + ?Sized,
{
    fn empty(memory: &'a M, range: Option<Range<Va>>, physical_address_bits: u8) -> Self {
        Self {
            memory,
            range,
            physical_address_bits,
            stack: Vec::with_capacity(4),
        }
    }

    fn overlaps(&self, entry: &WalkEntry) -> bool {
        match &self.range {
            Some(range) => {
                let end = entry.va.0.checked_add(entry.size());
                entry.va < range.end && end.is_none_or(|end| end > range.start.0)
            }
            None => true,
        }
    }

    fn wants_leaf(&self, entry: &WalkEntry) -> bool {
        match &self.range {
            Some(range) => range.contains(&entry.va),
            None => true,
        }
    }

    fn check_reserved(&self, entry: &WalkEntry) {
        let reserved = entry.reserved_bits(self.physical_address_bits);

        if reserved != 0 {
            tracing::warn!(
                va = %entry.va,
                entry_address = %entry.entry_address,
                level = ?entry.level,
                reserved = %vmcore_core::Hex(reserved),
                "reserved bits set in page table entry"
            );
        }
    }
}

impl<M> Iterator for PageTableIter<'_, M>
where
    M: PhysicalMemory + ?Sized,
{
    type Item = WalkEntry;

    fn next(&mut self) -> Option<Self::Item> {
        loop {
            let (table, index) = self.stack.last_mut()?;

            if *index >= ENTRY_COUNT {
                self.stack.pop();
                continue;
            }

            let slot = *index;
            *index += 1;

            let Some(entry) = table.entry_at(slot)
            else {
                continue;
            };

            if !self.overlaps(&entry) {
                continue;
            }

            self.check_reserved(&entry);

            if entry.is_leaf() {
                if self.wants_leaf(&entry) {
                    return Some(entry);
                }

                continue;
            }

            let Some(level) = entry.level.next()
            else {
                continue;
            };

            match read_table(self.memory, entry.entry.pa(), entry.va, level) {
                Ok(child) => self.stack.push((child, 0)),
                Err(err) => {
                    tracing::warn!(
                        va = %entry.va,
                        table = %entry.entry.pa(),
                        ?level,
                        %err,
                        "skipping unreadable page table"
                    );
                }
            }
        }
    }
}

#[cfg(test)]
#[path = "walker_tests.rs"]
mod tests;
