use std::ops::RangeInclusive;

use vmcore_core::Va;

/// A region of the x86-64 Linux virtual memory map (4-level paging).
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MemoryRegion {
    /// Addresses covered by the region.
    pub range: RangeInclusive<u64>,

    /// What the kernel uses the region for.
    pub name: &'static str,
}

macro_rules! regions {
    ($($start:literal ..= $end:literal => $name:literal),* $(,)?) => {
        &[$(MemoryRegion { range: $start..=$end, name: $name }),*]
    };
}

/// The x86-64 Linux virtual memory map, from
/// `Documentation/arch/x86/x86_64/mm.rst`.
///
/// Randomized bases (`page_offset_base`, `vmalloc_base`, `vmemmap_base`)
/// are listed at their non-KASLR defaults.
pub const LINUX_MEMORY_MAP: &[MemoryRegion] = regions![
    0x0000_0000_0000_0000..=0x0000_7fff_ffff_ffff => "user-space virtual memory",
    0xffff_8000_0000_0000..=0xffff_87ff_ffff_ffff => "guard hole, reserved for hypervisor",
    0xffff_8800_0000_0000..=0xffff_887f_ffff_ffff => "LDT remap for PTI",
    0xffff_8880_0000_0000..=0xffff_c87f_ffff_ffff => "direct mapping of all physical memory",
    0xffff_c880_0000_0000..=0xffff_c8ff_ffff_ffff => "unused hole",
    0xffff_c900_0000_0000..=0xffff_e8ff_ffff_ffff => "vmalloc/ioremap space",
    0xffff_e900_0000_0000..=0xffff_e9ff_ffff_ffff => "unused hole",
    0xffff_ea00_0000_0000..=0xffff_eaff_ffff_ffff => "virtual memory map",
    0xffff_eb00_0000_0000..=0xffff_ebff_ffff_ffff => "unused hole",
    0xffff_ec00_0000_0000..=0xffff_fbff_ffff_ffff => "KASAN shadow memory",
    0xffff_fc00_0000_0000..=0xffff_fdff_ffff_ffff => "unused hole",
    0xffff_fe00_0000_0000..=0xffff_fe7f_ffff_ffff => "cpu_entry_area mapping",
    0xffff_fe80_0000_0000..=0xffff_feff_ffff_ffff => "unused hole",
    0xffff_ff00_0000_0000..=0xffff_ff7f_ffff_ffff => "%esp fixup stacks",
    0xffff_ff80_0000_0000..=0xffff_ffee_ffff_ffff => "unused hole",
    0xffff_ffef_0000_0000..=0xffff_fffe_ffff_ffff => "EFI region mapping space",
    0xffff_ffff_0000_0000..=0xffff_ffff_7fff_ffff => "unused hole",
    0xffff_ffff_8000_0000..=0xffff_ffff_9fff_ffff => "kernel text mapping",
    0xffff_ffff_a000_0000..=0xffff_ffff_feff_ffff => "module mapping space",
    0xffff_ffff_ff00_0000..=0xffff_ffff_ff5f_ffff => "kernel-internal fixmap range",
    0xffff_ffff_ff60_0000..=0xffff_ffff_ff60_0fff => "legacy vsyscall ABI",
    0xffff_ffff_ffe0_0000..=0xffff_ffff_ffff_ffff => "unused hole",
];

/// Returns the region of the Linux memory map containing `va`.
///
/// Non-canonical addresses and the gaps between fixmap entries belong to
/// no region.
pub fn memory_region(va: Va) -> Option<&'static MemoryRegion> {
    LINUX_MEMORY_MAP
        .iter()
        .find(|region| region.range.contains(&va.0))
}

#[cfg(test)]
mod tests {
    use super::*;

    fn name(va: u64) -> Option<&'static str> {
        memory_region(Va(va)).map(|region| region.name)
    }

    #[test]
    fn well_known_addresses() {
        assert_eq!(name(0x5555_5555_4000), Some("user-space virtual memory"));
        assert_eq!(
            name(0xffff_8880_0010_0000),
            Some("direct mapping of all physical memory")
        );
        assert_eq!(name(0xffff_c900_0001_0000), Some("vmalloc/ioremap space"));
        assert_eq!(name(0xffff_ea00_0000_0040), Some("virtual memory map"));
        assert_eq!(name(0xffff_fe00_0000_1000), Some("cpu_entry_area mapping"));
        assert_eq!(name(0xffff_ffff_8100_0000), Some("kernel text mapping"));
        assert_eq!(name(0xffff_ffff_c000_0000), Some("module mapping space"));
        assert_eq!(name(0xffff_ffff_ff60_0000), Some("legacy vsyscall ABI"));
    }

    #[test]
    fn non_canonical_addresses_have_no_region() {
        assert_eq!(name(0x0000_8000_0000_0000), None);
        assert_eq!(name(0xffff_7fff_ffff_ffff), None);
        assert_eq!(name(0xffff_ffff_ff70_0000), None);
    }

    #[test]
    fn regions_are_sorted_and_disjoint() {
        for pair in LINUX_MEMORY_MAP.windows(2) {
            assert!(pair[0].range.end() < pair[1].range.start());
        }
    }
}
