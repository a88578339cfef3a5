use std::ops::Range;

use crate::{Memory, Pa, VmcoreError};

/// A source of guest physical memory.
///
/// Page-table walks and kernel location only need to map physical ranges,
/// so they are written against this trait. A single [`Memory`] window
/// implements it, as does a loaded coredump, which dispatches to whichever
/// segment backs the requested range.
pub trait PhysicalMemory {
    /// Returns a window covering exactly `range`.
    ///
    /// Fails if no single backing region contains the whole range.
    fn map(&self, range: Range<Pa>) -> Result<Memory<Pa>, VmcoreError>;

    /// Copies `buffer.len()` bytes starting at `pa` into `buffer`.
    fn read(&self, pa: Pa, buffer: &mut [u8]) -> Result<(), VmcoreError> {
        let end = pa
            .checked_add(buffer.len() as u64)
            .ok_or(VmcoreError::out_of_bounds(pa, pa, pa))?;

        let memory = self.map(pa..end)?;
        buffer.copy_from_slice(memory.as_slice());
        Ok(())
    }
}

impl PhysicalMemory for Memory<Pa> {
    fn map(&self, range: Range<Pa>) -> Result<Memory<Pa>, VmcoreError> {
        self.slice(range)
    }
}

impl<T> PhysicalMemory for &T
where
    T: PhysicalMemory + ?Sized,
{
    fn map(&self, range: Range<Pa>) -> Result<Memory<Pa>, VmcoreError> {
        (**self).map(range)
    }
}
