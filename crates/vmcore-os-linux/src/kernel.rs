use std::ops::Range;

use indexmap::IndexMap;
use vmcore_arch_amd64::{Amd64, PageTableWalker, PagingMode, Registers};
use vmcore_core::{MappedMemory, PhysicalMemory, Va, VmcoreError};
use vmcore_driver_elf::ElfCore;

use crate::{
    KASLR_KERNEL_RANGE, KernelSection, LinuxError, find_banner, kernel_sections, locate_kernel,
    symbols::{DEFAULT_ANCHOR, recover_symbols_with_anchor},
};

/// Options for [`LinuxKernel::locate_with`].
#[derive(Debug, Clone)]
pub struct LinuxKernelOptions {
    /// The vCPU whose page tables are walked.
    pub vcpu: usize,

    /// The virtual range the kernel image is searched in.
    pub kaslr_range: Range<Va>,

    /// A symbol name used to find the symbol string pool.
    pub anchor: String,
}

impl Default for LinuxKernelOptions {
    fn default() -> Self {
        Self {
            vcpu: 0,
            kaslr_range: KASLR_KERNEL_RANGE,
            anchor: DEFAULT_ANCHOR.into(),
        }
    }
}

/// A Linux kernel image located in a coredump.
#[derive(Debug)]
pub struct LinuxKernel {
    image: MappedMemory,
    kaslr_range: Range<Va>,
    sections: Vec<KernelSection>,
    banner: Option<String>,
    symbols: IndexMap<String, Va>,
}

impl LinuxKernel {
    /// Locates the kernel through the page tables of vCPU 0.
    pub fn locate(core: &ElfCore) -> Result<Self, LinuxError> {
        Self::locate_with(core, &LinuxKernelOptions::default())
    }

    /// Locates the kernel with explicit options.
    pub fn locate_with(core: &ElfCore, options: &LinuxKernelOptions) -> Result<Self, LinuxError> {
        let registers = core.registers(options.vcpu).map_err(VmcoreError::from)?;
        Self::from_registers(core, &registers, options)
    }

    /// Locates the kernel in `memory`, walking the page tables `registers`
    /// point to.
    ///
    /// The vCPU must be halted in kernel mode with 4-level paging enabled.
    pub fn from_registers<M>(
        memory: &M,
        registers: &Registers,
        options: &LinuxKernelOptions,
    ) -> Result<Self, LinuxError>
    where
        M: PhysicalMemory + ?Sized,
    {
        if registers.current_privilege_level() == 3 {
            return Err(LinuxError::UserModeVcpu(options.vcpu));
        }

        match Amd64::paging_mode(registers) {
            Some(PagingMode::Ia32e) => {}
            mode => return Err(LinuxError::UnsupportedPagingMode(mode)),
        }

        let range = options.kaslr_range.clone();
        let walker = PageTableWalker::new(memory, registers.translation_root());

        let image = locate_kernel(&walker, memory, range.clone())?.ok_or(
            LinuxError::KernelNotFound {
                start: range.start,
                end: range.end,
            },
        )?;

        let sections = kernel_sections(&walker, image.virt_range());
        let banner = find_banner(&image.virtual_memory());
        let symbols = recover_symbols_with_anchor(&image, &options.anchor)?;

        let kernel = Self {
            image,
            kaslr_range: range,
            sections,
            banner,
            symbols,
        };

        tracing::debug!(
            start = %kernel.range().start,
            end = %kernel.range().end,
            space_before_kib = kernel.space_before() / 1024,
            space_after_kib = kernel.space_after() / 1024,
            symbols = kernel.symbols.len(),
            "located kernel"
        );

        Ok(kernel)
    }

    /// Returns the virtual range of the kernel image.
    pub fn range(&self) -> Range<Va> {
        self.image.virt_range()
    }

    /// Returns the kernel image.
    pub fn memory(&self) -> &MappedMemory {
        &self.image
    }

    /// Returns the free part of the KASLR range below the image.
    pub fn space_before(&self) -> u64 {
        self.range().start.0.saturating_sub(self.kaslr_range.start.0)
    }

    /// Returns the free part of the KASLR range above the image.
    pub fn space_after(&self) -> u64 {
        self.kaslr_range.end.0.saturating_sub(self.range().end.0)
    }

    /// Returns the runs of equally protected pages making up the image.
    pub fn sections(&self) -> &[KernelSection] {
        &self.sections
    }

    /// Returns the `linux_banner` string, if found.
    pub fn banner(&self) -> Option<&str> {
        self.banner.as_deref()
    }

    /// Returns the recovered exported symbols, in table order.
    pub fn symbols(&self) -> &IndexMap<String, Va> {
        &self.symbols
    }

    /// Returns the address of the exported symbol `name`.
    pub fn symbol(&self, name: &str) -> Option<Va> {
        self.symbols.get(name).copied()
    }
}

#[cfg(test)]
mod tests {
    use vmcore_arch_amd64::{Cr4, Selector};
    use vmcore_core::Pa;

    use super::*;
    use crate::testing::{DATA, DATA_BASE, GuestBuilder, TEXT, kernel_registers};

    const KERNEL: Va = Va(0xffff_ffff_8100_0000);

    fn prel32(field: Va, target: Va) -> [u8; 4] {
        ((target.0 as i64 - field.0 as i64) as i32).to_le_bytes()
    }

    /// Two text pages holding the banner and one data page holding a
    /// two-record symbol table.
    fn guest() -> GuestBuilder {
        let table = KERNEL + 0x2000;
        let pool = table + 24;

        let mut exports = Vec::new();
        for (record, name, value) in [
            (table, pool, KERNEL + 0x40),
            (table + 12, pool + 10, KERNEL + 0x80),
        ] {
            exports.extend_from_slice(&prel32(record, value));
            exports.extend_from_slice(&prel32(record + 4, name));
            exports.extend_from_slice(&[0; 4]);
        }
        exports.extend_from_slice(b"init_task\0printk\0\0");

        GuestBuilder::new()
            .map_range(KERNEL, DATA_BASE, 2, TEXT)
            .map(KERNEL + 0x2000, DATA_BASE + 0x2000, DATA)
            .write(DATA_BASE + 0x800, b"Linux version 6.6.0 (builder@host) #1 SMP\n\0")
            .write(DATA_BASE + 0x2000, &exports)
    }

    #[test]
    fn locate_full_pipeline() -> Result<(), LinuxError> {
        let guest = guest();
        let registers = kernel_registers(guest.root());
        let memory = guest.build();

        let kernel =
            LinuxKernel::from_registers(&memory, &registers, &LinuxKernelOptions::default())?;

        assert_eq!(kernel.range(), KERNEL..KERNEL + 0x3000);
        assert_eq!(kernel.memory().phys_range(), DATA_BASE..DATA_BASE + 0x3000);
        assert_eq!(kernel.space_before(), 0x100_0000);
        assert_eq!(kernel.space_after(), 0xc000_0000 - 0x8100_3000);
        assert_eq!(kernel.banner(), Some("Linux version 6.6.0 (builder@host) #1 SMP"));

        assert_eq!(kernel.sections().len(), 2);
        assert!(kernel.sections()[0].executable);
        assert!(kernel.sections()[1].writable);

        assert_eq!(kernel.symbols().len(), 2);
        assert_eq!(kernel.symbol("init_task"), Some(KERNEL + 0x40));
        assert_eq!(kernel.symbol("printk"), Some(KERNEL + 0x80));
        assert_eq!(kernel.symbol("schedule"), None);

        Ok(())
    }

    #[test]
    fn user_mode_vcpu_is_rejected() {
        let guest = guest();
        let mut registers = kernel_registers(guest.root());
        registers.cs.selector = Selector(0x33);
        let memory = guest.build();

        let options = LinuxKernelOptions {
            vcpu: 2,
            ..Default::default()
        };
        assert!(matches!(
            LinuxKernel::from_registers(&memory, &registers, &options),
            Err(LinuxError::UserModeVcpu(2))
        ));
    }

    #[test]
    fn five_level_paging_is_rejected() {
        let guest = guest();
        let mut registers = kernel_registers(guest.root());
        registers.cr4 = Cr4(registers.cr4.0 | 1 << 12);
        let memory = guest.build();

        assert!(matches!(
            LinuxKernel::from_registers(&memory, &registers, &LinuxKernelOptions::default()),
            Err(LinuxError::UnsupportedPagingMode(Some(PagingMode::Ia32eLA57)))
        ));
    }

    #[test]
    fn empty_range_is_not_found() {
        let guest = guest();
        let registers = kernel_registers(guest.root());
        let memory = guest.build();

        let options = LinuxKernelOptions {
            kaslr_range: Va(0xffff_ffff_a000_0000)..Va(0xffff_ffff_c000_0000),
            ..Default::default()
        };
        let err = LinuxKernel::from_registers(&memory, &registers, &options).unwrap_err();
        assert!(matches!(err, LinuxError::KernelNotFound { .. }));
        assert!(matches!(VmcoreError::from(err), VmcoreError::Os(_)));
    }

    #[test]
    fn unreadable_root_finds_nothing() {
        let guest = guest();
        let registers = kernel_registers(Pa(0x4000_0000));
        let memory = guest.build();

        assert!(matches!(
            LinuxKernel::from_registers(&memory, &registers, &LinuxKernelOptions::default()),
            Err(LinuxError::KernelNotFound { .. })
        ));
    }
}
