use std::ops::Range;

use vmcore_arch_amd64::{PageTableWalker, WalkEntry};
use vmcore_core::{Hex, MappedMemory, Pa, PhysicalMemory, Va};

use crate::LinuxError;

/// The virtual range the x86-64 kernel image is relocated within.
pub const KASLR_KERNEL_RANGE: Range<Va> = Va(0xffff_ffff_8000_0000)..Va(0xffff_ffff_c000_0000);

/// A run of kernel pages sharing the same protection.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct KernelSection {
    /// Virtual range of the run.
    pub virt_range: Range<Va>,

    /// Physical address of the first page.
    pub phys_start: Pa,

    /// Whether the pages are writable.
    pub writable: bool,

    /// Whether the pages are executable.
    pub executable: bool,
}

impl KernelSection {
    fn from_leaf(leaf: &WalkEntry) -> Self {
        Self {
            virt_range: leaf.virt_range(),
            phys_start: leaf.pa(),
            writable: leaf.writable(),
            executable: !leaf.no_execute(),
        }
    }

    /// Returns the length of the run in bytes.
    pub fn len(&self) -> u64 {
        self.virt_range.end - self.virt_range.start
    }

    /// Checks if the run is empty.
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    fn same_protection(&self, leaf: &WalkEntry) -> bool {
        self.writable == leaf.writable() && self.executable == !leaf.no_execute()
    }
}

/// Finds the kernel image among the leaves mapped in `range`.
///
/// Every leaf in the range must continue the previous one both virtually
/// and physically. The image spans from the first leaf's physical start to
/// the last leaf's physical end and is mapped at the first leaf's virtual
/// address.
///
/// Returns `Ok(None)` if nothing is mapped in `range`.
pub fn locate_kernel<M, P>(
    walker: &PageTableWalker<M>,
    phys: &P,
    range: Range<Va>,
) -> Result<Option<MappedMemory>, LinuxError>
where
    M: PhysicalMemory,
    P: PhysicalMemory + ?Sized,
{
    let mut leaves = walker.iter_range(range.clone());

    let Some(first) = leaves.next()
    else {
        tracing::debug!(start = %range.start, end = %range.end, "no mappings in range");
        return Ok(None);
    };

    let mut last = first;
    for leaf in leaves {
        // Physical addresses fit in 52 bits. Only the virtual end can wrap.
        let expected_pa = last.pa() + last.size();
        let expected_va = last.va.checked_add(last.size());

        if expected_va != Some(leaf.va) || leaf.pa() != expected_pa {
            return Err(LinuxError::KernelNotContiguous {
                va: leaf.va,
                expected: expected_pa,
                found: leaf.pa(),
            });
        }

        last = leaf;
    }

    let memory = phys.map(first.pa()..last.pa() + last.size())?;
    let kernel = MappedMemory::map(memory, first.va)?;

    tracing::debug!(
        virt_start = %kernel.virt_start(),
        virt_end = %kernel.virt_end(),
        phys_start = %first.pa(),
        size = %Hex(kernel.len()),
        "found kernel image"
    );

    Ok(Some(kernel))
}

/// Groups the leaves mapped in `range` into runs of equal protection.
///
/// Consecutive leaves merge when their writable and executable bits match.
/// A change in either bit starts a new section.
pub fn kernel_sections<M>(walker: &PageTableWalker<M>, range: Range<Va>) -> Vec<KernelSection>
where
    M: PhysicalMemory,
{
    let mut sections: Vec<KernelSection> = Vec::new();

    for leaf in walker.iter_range(range) {
        match sections.last_mut() {
            Some(last) if last.same_protection(&leaf) && last.virt_range.end == leaf.va => {
                last.virt_range.end = leaf.virt_range().end;
            }
            _ => sections.push(KernelSection::from_leaf(&leaf)),
        }
    }

    sections
}

#[cfg(test)]
mod tests {
    use vmcore_core::{Memory, VmcoreError};

    use super::*;
    use crate::testing::{DATA, DATA_BASE, GuestBuilder, TEXT};

    const KERNEL: Va = Va(0xffff_ffff_8100_0000);

    fn walker(memory: &Memory<Pa>, root: Pa) -> PageTableWalker<&Memory<Pa>> {
        PageTableWalker::new(memory, root)
    }

    #[test]
    fn contiguous_image_is_mapped_at_first_leaf() -> Result<(), LinuxError> {
        let builder = GuestBuilder::new()
            .map_range(KERNEL, DATA_BASE, 3, TEXT)
            .map(KERNEL + 0x3000, DATA_BASE + 0x3000, DATA)
            .write(DATA_BASE + 0x2ffc, b"edge");
        let root = builder.root();
        let memory = builder.build();

        let kernel = locate_kernel(&walker(&memory, root), &memory, KASLR_KERNEL_RANGE)?
            .ok_or(VmcoreError::NotFound("kernel"))?;

        assert_eq!(kernel.virt_range(), KERNEL..KERNEL + 0x4000);
        assert_eq!(kernel.phys_range(), DATA_BASE..DATA_BASE + 0x4000);
        assert_eq!(kernel.len(), 4 * 0x1000);
        assert_eq!(
            kernel.virtual_memory().bytes(KERNEL + 0x2ffc..KERNEL + 0x3000)?,
            b"edge"
        );

        Ok(())
    }

    #[test]
    fn physical_gap_is_fatal() {
        let builder = GuestBuilder::new()
            .map(KERNEL, DATA_BASE, TEXT)
            .map(KERNEL + 0x1000, DATA_BASE + 0x2000, TEXT);
        let root = builder.root();
        let memory = builder.build();

        let result = locate_kernel(&walker(&memory, root), &memory, KASLR_KERNEL_RANGE);
        assert!(matches!(
            result,
            Err(LinuxError::KernelNotContiguous {
                va,
                expected,
                found,
            }) if va == KERNEL + 0x1000 && expected == DATA_BASE + 0x1000 && found == DATA_BASE + 0x2000
        ));
    }

    #[test]
    fn virtual_gap_is_fatal() {
        let builder = GuestBuilder::new()
            .map(KERNEL, DATA_BASE, TEXT)
            .map(KERNEL + 0x2000, DATA_BASE + 0x1000, TEXT);
        let root = builder.root();
        let memory = builder.build();

        let result = locate_kernel(&walker(&memory, root), &memory, KASLR_KERNEL_RANGE);
        assert!(matches!(result, Err(LinuxError::KernelNotContiguous { .. })));
    }

    #[test]
    fn image_at_top_of_address_space_is_rejected() {
        let top = Va(0xffff_ffff_ffff_e000);
        let builder = GuestBuilder::new().map_range(top, DATA_BASE, 2, TEXT);
        let root = builder.root();
        let memory = builder.build();

        let result = locate_kernel(&walker(&memory, root), &memory, top..Va(u64::MAX));
        assert!(matches!(result, Err(LinuxError::Core(VmcoreError::Other(_)))));

        let sections = kernel_sections(&walker(&memory, root), top..Va(u64::MAX));
        assert_eq!(sections.len(), 1);
        assert_eq!(sections[0].virt_range, top..Va(u64::MAX));
    }

    #[test]
    fn nothing_mapped_in_range() -> Result<(), LinuxError> {
        // Mapped, but in the direct map rather than the kernel range.
        let builder = GuestBuilder::new().map(Va(0xffff_8880_0010_0000), DATA_BASE, DATA);
        let root = builder.root();
        let memory = builder.build();

        let kernel = locate_kernel(&walker(&memory, root), &memory, KASLR_KERNEL_RANGE)?;
        assert!(kernel.is_none());

        Ok(())
    }

    #[test]
    fn sections_split_on_protection_change() {
        let builder = GuestBuilder::new()
            .map_range(KERNEL, DATA_BASE, 2, TEXT)
            .map_range(KERNEL + 0x2000, DATA_BASE + 0x2000, 3, DATA)
            .map(KERNEL + 0x5000, DATA_BASE + 0x5000, TEXT);
        let root = builder.root();
        let memory = builder.build();

        let sections = kernel_sections(&walker(&memory, root), KASLR_KERNEL_RANGE);

        assert_eq!(sections.len(), 3);
        assert_eq!(sections[0].virt_range, KERNEL..KERNEL + 0x2000);
        assert!(sections[0].executable && !sections[0].writable);
        assert_eq!(sections[1].virt_range, KERNEL + 0x2000..KERNEL + 0x5000);
        assert_eq!(sections[1].phys_start, DATA_BASE + 0x2000);
        assert!(sections[1].writable && !sections[1].executable);
        assert_eq!(sections[2].len(), 0x1000);
    }
}
