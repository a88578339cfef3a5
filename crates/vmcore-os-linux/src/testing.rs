//! Synthetic guest memory for unit tests.

use vmcore_arch_amd64::{
    Amd64, Cr0, Cr3, Cr4, MsrEfer, PageTableEntry, PageTableFlags, PageTableLevel, Registers,
    Selector,
};
use vmcore_core::{Memory, Pa, Va};

/// Flags of an ordinary kernel text page.
pub const TEXT: PageTableFlags = PageTableFlags::PRESENT;

/// Flags of an ordinary kernel data page.
pub const DATA: PageTableFlags = PageTableFlags::PRESENT
    .union(PageTableFlags::WRITABLE)
    .union(PageTableFlags::NO_EXECUTE);

/// Builds a flat physical memory image holding 4-level page tables.
///
/// Tables are allocated from page 1 upward. Data pages should live above
/// [`DATA_BASE`].
pub struct GuestBuilder {
    bytes: Vec<u8>,
    next_table: u64,
}

/// Lowest physical address handed to data pages.
pub const DATA_BASE: Pa = Pa(0x10_0000);

const ROOT: Pa = Pa(0x1000);

impl GuestBuilder {
    pub fn new() -> Self {
        let mut builder = Self {
            bytes: Vec::new(),
            next_table: 2,
        };
        builder.reserve(ROOT + Amd64::PAGE_SIZE);
        builder
    }

    pub fn root(&self) -> Pa {
        ROOT
    }

    /// Maps the 4KB page at `va` to `pa`.
    pub fn map(mut self, va: Va, pa: Pa, flags: PageTableFlags) -> Self {
        let mut table = ROOT;
        let mut level = PageTableLevel::Pml4;

        while let Some(next) = level.next() {
            let slot = table + Amd64::va_index_for(va, level) * 8;
            let entry = self.entry(slot);

            table = if entry.present() {
                entry.pa()
            }
            else {
                let child = Amd64::pa_from_gfn(vmcore_core::Gfn(self.next_table));
                self.next_table += 1;
                self.reserve(child + Amd64::PAGE_SIZE);

                let flags = PageTableFlags::PRESENT | PageTableFlags::WRITABLE;
                self.set_entry(slot, PageTableEntry(child.0 | flags.bits()));
                child
            };

            level = next;
        }

        let slot = table + Amd64::va_index_for(va, level) * 8;
        self.set_entry(slot, PageTableEntry(pa.0 | flags.bits()));
        self.reserve(pa + Amd64::PAGE_SIZE);
        self
    }

    /// Maps `count` consecutive pages.
    pub fn map_range(mut self, va: Va, pa: Pa, count: u64, flags: PageTableFlags) -> Self {
        for page in 0..count {
            let offset = page * Amd64::PAGE_SIZE;
            self = self.map(va + offset, pa + offset, flags);
        }
        self
    }

    pub fn write(mut self, pa: Pa, data: &[u8]) -> Self {
        self.reserve(pa + data.len() as u64);
        let offset = pa.0 as usize;
        self.bytes[offset..offset + data.len()].copy_from_slice(data);
        self
    }

    pub fn build(self) -> Memory<Pa> {
        Memory::from_vec(Pa(0), self.bytes).unwrap()
    }

    fn reserve(&mut self, end: Pa) {
        if self.bytes.len() < end.0 as usize {
            self.bytes.resize(end.0 as usize, 0);
        }
    }

    fn entry(&self, slot: Pa) -> PageTableEntry {
        let offset = slot.0 as usize;
        let mut raw = [0u8; 8];
        raw.copy_from_slice(&self.bytes[offset..offset + 8]);
        PageTableEntry(u64::from_le_bytes(raw))
    }

    fn set_entry(&mut self, slot: Pa, entry: PageTableEntry) {
        let offset = slot.0 as usize;
        self.bytes[offset..offset + 8].copy_from_slice(&entry.0.to_le_bytes());
    }
}

/// Registers of a vCPU halted in kernel mode with 4-level paging.
pub fn kernel_registers(root: Pa) -> Registers {
    let mut registers = Registers {
        cr0: Cr0(0x8005_0033),
        cr3: Cr3(root.0),
        cr4: Cr4(0x3606f0),
        msr_efer: MsrEfer(0xd01),
        ..Default::default()
    };
    registers.cs.selector = Selector(0x10);
    registers
}
