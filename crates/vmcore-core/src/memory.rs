use std::ops::Range;

use zerocopy::FromBytes;

use crate::{Address, Arena, Pa, Va, VmcoreError};

/// A read-only window over a contiguous run of guest memory.
///
/// The window is tagged with the address of its first byte and every
/// accessor takes absolute addresses. Addresses are translated into the
/// backing [`Arena`] by subtracting the window's base; an address outside
/// `[start, end)` is an [`OutOfBounds`](VmcoreError::OutOfBounds) error.
///
/// Windows are cheap to clone and to slice. Neither copies the bytes.
#[derive(Clone)]
pub struct Memory<A = Pa>
where
    A: Address,
{
    arena: Arena,
    offset: usize,
    start: A,
    end: A,
}

impl<A> Memory<A>
where
    A: Address,
{
    /// Creates a window over the whole `arena`, based at `start`.
    pub fn new(arena: Arena, start: A) -> Result<Self, VmcoreError> {
        let len = arena.len();
        Self::from_arena(arena, 0..len, start)
    }

    /// Creates a window over an owned buffer, based at `start`.
    pub fn from_vec(start: A, data: Vec<u8>) -> Result<Self, VmcoreError> {
        Self::new(Arena::new(data), start)
    }

    /// Creates a window over `range` of `arena`, based at `start`.
    ///
    /// The first byte of the window is `arena[range.start]`.
    pub fn from_arena(arena: Arena, range: Range<usize>, start: A) -> Result<Self, VmcoreError> {
        if range.start > range.end || range.end > arena.len() {
            return Err(VmcoreError::out_of_bounds(
                range.end as u64,
                0u64,
                arena.len() as u64,
            ));
        }

        let base = start.raw();
        let end = base
            .checked_add((range.end - range.start) as u64)
            .ok_or(VmcoreError::Other("memory window wraps the address space"))?;

        Ok(Self {
            arena,
            offset: range.start,
            start,
            end: A::from(end),
        })
    }

    /// Returns the address of the first byte.
    pub fn start(&self) -> A {
        self.start
    }

    /// Returns the address one past the last byte.
    pub fn end(&self) -> A {
        self.end
    }

    /// Returns the address range covered by this window.
    pub fn range(&self) -> Range<A> {
        self.start..self.end
    }

    /// Returns the number of bytes in the window.
    pub fn len(&self) -> usize {
        (self.end.raw() - self.start.raw()) as usize
    }

    /// Checks if the window holds no bytes.
    pub fn is_empty(&self) -> bool {
        self.start == self.end
    }

    /// Checks if `address` lies within `[start, end)`.
    pub fn contains(&self, address: A) -> bool {
        self.start <= address && address < self.end
    }

    /// Checks if `range` lies entirely within the window.
    ///
    /// Empty ranges are contained if their bound lies within
    /// `[start, end]`.
    pub fn contains_range(&self, range: &Range<A>) -> bool {
        range.start <= range.end && self.start <= range.start && range.end <= self.end
    }

    /// Returns all bytes of the window.
    pub fn as_slice(&self) -> &[u8] {
        &self.arena[self.offset..self.offset + self.len()]
    }

    /// Returns the offset of `address` from the start of the window.
    pub fn offset_of(&self, address: A) -> Result<usize, VmcoreError> {
        if !self.contains(address) {
            return Err(self.out_of_bounds(address));
        }

        Ok((address.raw() - self.start.raw()) as usize)
    }

    /// Returns a new window restricted to `range`.
    ///
    /// The new window is based at `range.start`.
    pub fn slice(&self, range: Range<A>) -> Result<Self, VmcoreError> {
        self.check_range(&range)?;

        Ok(Self {
            arena: self.arena.clone(),
            offset: self.offset + (range.start.raw() - self.start.raw()) as usize,
            start: range.start,
            end: range.end,
        })
    }

    /// Returns the bytes covered by `range`.
    pub fn bytes(&self, range: Range<A>) -> Result<&[u8], VmcoreError> {
        self.check_range(&range)?;

        let from = (range.start.raw() - self.start.raw()) as usize;
        let to = (range.end.raw() - self.start.raw()) as usize;
        Ok(&self.as_slice()[from..to])
    }

    /// Returns the byte at `address`.
    pub fn byte_at(&self, address: A) -> Result<u8, VmcoreError> {
        let offset = self.offset_of(address)?;
        Ok(self.as_slice()[offset])
    }

    /// Copies `buffer.len()` bytes starting at `address` into `buffer`.
    pub fn read(&self, address: A, buffer: &mut [u8]) -> Result<(), VmcoreError> {
        let range = self.span(address, buffer.len())?;
        buffer.copy_from_slice(self.bytes(range)?);
        Ok(())
    }

    /// Reads a little-endian `u32`.
    pub fn read_u32(&self, address: A) -> Result<u32, VmcoreError> {
        let mut buffer = [0u8; 4];
        self.read(address, &mut buffer)?;
        Ok(u32::from_le_bytes(buffer))
    }

    /// Reads a little-endian `i32`.
    pub fn read_i32(&self, address: A) -> Result<i32, VmcoreError> {
        let mut buffer = [0u8; 4];
        self.read(address, &mut buffer)?;
        Ok(i32::from_le_bytes(buffer))
    }

    /// Reads a little-endian `u64`.
    pub fn read_u64(&self, address: A) -> Result<u64, VmcoreError> {
        let mut buffer = [0u8; 8];
        self.read(address, &mut buffer)?;
        Ok(u64::from_le_bytes(buffer))
    }

    /// Reads a plain-data structure. The source does not need to be aligned.
    pub fn read_struct<T>(&self, address: A) -> Result<T, VmcoreError>
    where
        T: FromBytes,
    {
        let range = self.span(address, size_of::<T>())?;
        T::read_from_bytes(self.bytes(range)?)
            .map_err(|_| VmcoreError::Other("structure size mismatch"))
    }

    /// Reads the bytes from `address` up to, but not including, the next
    /// NUL byte.
    pub fn read_cstr(&self, address: A) -> Result<&[u8], VmcoreError> {
        let tail = self.bytes(address..self.end)?;

        match memchr::memchr(0, tail) {
            Some(length) => Ok(&tail[..length]),
            None => Err(self.out_of_bounds(self.end)),
        }
    }

    /// Returns the lowest address at which `needle` occurs.
    pub fn find(&self, needle: &[u8]) -> Option<A> {
        memchr::memmem::find(self.as_slice(), needle).map(|index| self.address_at(index))
    }

    /// Returns the lowest address at or above `from` at which `needle`
    /// occurs.
    pub fn find_from(&self, needle: &[u8], from: A) -> Option<A> {
        if from < self.start || from > self.end {
            return None;
        }

        let skip = (from.raw() - self.start.raw()) as usize;
        memchr::memmem::find(&self.as_slice()[skip..], needle)
            .map(|index| self.address_at(skip + index))
    }

    /// Returns a window over the same bytes, tagged with a different base
    /// address (and possibly a different address space).
    pub fn rebase<B>(&self, start: B) -> Result<Memory<B>, VmcoreError>
    where
        B: Address,
    {
        Memory::from_arena(
            self.arena.clone(),
            self.offset..self.offset + self.len(),
            start,
        )
    }

    fn address_at(&self, index: usize) -> A {
        A::from(self.start.raw() + index as u64)
    }

    fn span(&self, address: A, length: usize) -> Result<Range<A>, VmcoreError> {
        let base = address.raw();
        let end = base
            .checked_add(length as u64)
            .ok_or_else(|| self.out_of_bounds(address))?;

        Ok(address..A::from(end))
    }

    fn check_range(&self, range: &Range<A>) -> Result<(), VmcoreError> {
        if self.contains_range(range) {
            return Ok(());
        }

        let offender = if range.start < self.start || range.start > self.end {
            range.start
        }
        else {
            range.end
        };

        Err(self.out_of_bounds(offender))
    }

    fn out_of_bounds(&self, address: A) -> VmcoreError {
        VmcoreError::out_of_bounds(address, self.start, self.end)
    }
}

impl<A> std::fmt::Debug for Memory<A>
where
    A: Address,
{
    fn fmt(&self, f: &mut std::fmt::Formatter) -> std::fmt::Result {
        f.debug_struct("Memory")
            .field("start", &self.start)
            .field("end", &self.end)
            .field("len", &self.len())
            .finish()
    }
}

/// A physical memory window that is also known at a virtual address.
///
/// The mapping is one-to-one and contiguous: the byte at physical address
/// `start + n` is the byte at virtual address `virt_start + n`.
#[derive(Clone)]
pub struct MappedMemory {
    memory: Memory<Pa>,
    virt_start: Va,
}

impl MappedMemory {
    /// Maps `memory` at virtual address `virt_offset`.
    pub fn map(memory: Memory<Pa>, virt_offset: Va) -> Result<Self, VmcoreError> {
        virt_offset
            .checked_add(memory.len() as u64)
            .ok_or(VmcoreError::Other("mapped region wraps the virtual address space"))?;

        Ok(Self {
            memory,
            virt_start: virt_offset,
        })
    }

    /// Returns the physical window.
    pub fn memory(&self) -> &Memory<Pa> {
        &self.memory
    }

    /// Returns a window over the same bytes, addressed virtually.
    pub fn virtual_memory(&self) -> Memory<Va> {
        Memory {
            arena: self.memory.arena.clone(),
            offset: self.memory.offset,
            start: self.virt_start,
            end: self.virt_end(),
        }
    }

    /// Returns the number of bytes in the region.
    pub fn len(&self) -> usize {
        self.memory.len()
    }

    /// Checks if the region holds no bytes.
    pub fn is_empty(&self) -> bool {
        self.memory.is_empty()
    }

    /// Returns the physical range.
    pub fn phys_range(&self) -> Range<Pa> {
        self.memory.range()
    }

    /// Returns the virtual range.
    pub fn virt_range(&self) -> Range<Va> {
        self.virt_start..self.virt_end()
    }

    /// Returns the virtual address of the first byte.
    pub fn virt_start(&self) -> Va {
        self.virt_start
    }

    /// Returns the virtual address one past the last byte.
    pub fn virt_end(&self) -> Va {
        self.virt_start + self.memory.len() as u64
    }

    /// Checks if `va` lies within the virtual range.
    pub fn contains_virt(&self, va: Va) -> bool {
        self.virt_start <= va && va < self.virt_end()
    }

    /// Translates a virtual address inside the region to its physical
    /// address.
    pub fn phys_addr(&self, va: Va) -> Result<Pa, VmcoreError> {
        if !self.contains_virt(va) {
            return Err(VmcoreError::out_of_bounds(
                va,
                self.virt_start,
                self.virt_end(),
            ));
        }

        Ok(self.memory.start() + (va - self.virt_start))
    }

    /// Translates a physical address inside the region to its virtual
    /// address.
    pub fn virt_addr(&self, pa: Pa) -> Result<Va, VmcoreError> {
        let offset = self.memory.offset_of(pa)?;
        Ok(self.virt_start + offset as u64)
    }

    /// Returns the sub-region covering the physical `range`.
    pub fn slice(&self, range: Range<Pa>) -> Result<Self, VmcoreError> {
        let memory = self.memory.slice(range)?;
        let virt_start = self.virt_start + (memory.start() - self.memory.start());

        Ok(Self { memory, virt_start })
    }

    /// Returns the sub-region covering the virtual `range`.
    pub fn slice_virt(&self, range: Range<Va>) -> Result<Self, VmcoreError> {
        let virt_end = self.virt_end();
        if !(range.start <= range.end && self.virt_start <= range.start && range.end <= virt_end) {
            return Err(VmcoreError::out_of_bounds(
                range.start,
                self.virt_start,
                virt_end,
            ));
        }

        let start = self.memory.start() + (range.start - self.virt_start);
        let end = self.memory.start() + (range.end - self.virt_start);
        self.slice(start..end)
    }
}

impl std::fmt::Debug for MappedMemory {
    fn fmt(&self, f: &mut std::fmt::Formatter) -> std::fmt::Result {
        f.debug_struct("MappedMemory")
            .field("phys", &self.memory.range())
            .field("virt", &self.virt_range())
            .finish()
    }
}
