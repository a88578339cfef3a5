use std::{fs::File, ops::Range, path::Path};

use elf::{
    ElfBytes,
    abi::{EM_X86_64, ET_CORE, PT_LOAD, PT_NOTE},
    endian::LittleEndian,
    file::Class,
    note::Note,
};
use memmap2::{Mmap, MmapOptions};
use once_cell::sync::OnceCell;
use vmcore_arch_amd64::{Amd64, Registers};
use vmcore_core::{Arena, Memory, Pa, PhysicalMemory, VmcoreError};

use crate::{CoreNote, CpuSnapshot, Error, Segment};

/// A loaded ELF coredump.
///
/// The headers and notes are parsed once by [`open`](Self::open). Segment
/// contents are memory-mapped on first use and the mapping is shared by
/// every window handed out for that segment.
pub struct ElfCore {
    file: File,
    segments: Vec<Segment>,
    mappings: Vec<OnceCell<Memory<Pa>>>,
    snapshots: Vec<CpuSnapshot>,
}

impl ElfCore {
    /// Opens and validates the coredump at `path`.
    pub fn open(path: impl AsRef<Path>) -> Result<Self, Error> {
        let path = path.as_ref();
        let file = File::open(path)?;
        let file_len = file.metadata()?.len();

        // SAFETY: The mapping is read-only and dropped before returning.
        let mmap = unsafe { Mmap::map(&file)? };
        let (segments, snapshots) = parse(&mmap, file_len)?;
        drop(mmap);

        tracing::debug!(
            path = %path.display(),
            segments = segments.len(),
            vcpus = snapshots.len(),
            "opened coredump"
        );

        Ok(Self {
            file,
            mappings: segments.iter().map(|_| OnceCell::new()).collect(),
            segments,
            snapshots,
        })
    }

    /// Returns the `PT_LOAD` segments, in program-header order.
    pub fn segments(&self) -> &[Segment] {
        &self.segments
    }

    /// Returns the segment whose `[p_vaddr, p_vaddr + p_memsz)` contains
    /// `addr`.
    pub fn find_segment_by_addr(&self, addr: Pa) -> Option<&Segment> {
        self.segments
            .iter()
            .find(|segment| segment.contains(addr.0))
    }

    /// Returns a window over the file bytes of `segment`, based at its
    /// physical address.
    ///
    /// The segment is mapped from the page boundary at or below its file
    /// offset, then trimmed to its exact byte range.
    pub fn map_segment(&self, segment: &Segment) -> Result<Memory<Pa>, VmcoreError> {
        let cell = self
            .mappings
            .get(segment.index)
            .filter(|_| self.segments.get(segment.index) == Some(segment))
            .ok_or(Error::OutOfBounds {
                start: segment.phys_start.0,
                end: segment.phys_start.0.saturating_add(segment.file_size),
            })?;

        cell.get_or_try_init(|| self.map_file_range(segment))
            .cloned()
    }

    /// Returns the number of captured vCPUs.
    pub fn vcpu_count(&self) -> usize {
        self.snapshots.len()
    }

    /// Returns the CPU state of vCPU `vcpu`.
    pub fn cpu_state(&self, vcpu: usize) -> Result<&CpuSnapshot, Error> {
        self.snapshots.get(vcpu).ok_or(Error::VcpuNotFound(vcpu))
    }

    /// Returns the registers of vCPU `vcpu`.
    pub fn registers(&self, vcpu: usize) -> Result<Registers, Error> {
        Ok(self.cpu_state(vcpu)?.registers)
    }

    fn map_file_range(&self, segment: &Segment) -> Result<Memory<Pa>, VmcoreError> {
        if segment.file_size == 0 {
            return Memory::new(Arena::empty(), segment.phys_start);
        }

        let aligned = segment.file_offset & Amd64::PAGE_MASK;
        let delta = (segment.file_offset - aligned) as usize;
        let len = usize::try_from(segment.file_size)
            .ok()
            .and_then(|size| size.checked_add(delta))
            .ok_or(VmcoreError::Other("segment too large to map"))?;

        // SAFETY: The mapping is read-only. The coredump is not expected to
        //         change while it is being analyzed.
        let mmap = unsafe { MmapOptions::new().offset(aligned).len(len).map(&self.file)? };

        tracing::debug!(
            index = segment.index,
            phys_start = %segment.phys_start,
            offset = %vmcore_core::Hex(segment.file_offset),
            size = %vmcore_core::Hex(segment.file_size),
            "mapped segment"
        );

        Memory::from_arena(Arena::new(mmap), delta..len, segment.phys_start)
    }

    fn segment_for_range(&self, range: &Range<Pa>) -> Option<&Segment> {
        self.segments.iter().find(|segment| {
            let phys = segment.phys_range();
            phys.start <= range.start && range.end <= phys.end
        })
    }
}

impl PhysicalMemory for ElfCore {
    fn map(&self, range: Range<Pa>) -> Result<Memory<Pa>, VmcoreError> {
        let segment = self
            .segment_for_range(&range)
            .ok_or(Error::OutOfBounds {
                start: range.start.0,
                end: range.end.0,
            })?;

        self.map_segment(segment)?.slice(range)
    }
}

impl std::fmt::Debug for ElfCore {
    fn fmt(&self, f: &mut std::fmt::Formatter) -> std::fmt::Result {
        f.debug_struct("ElfCore")
            .field("segments", &self.segments)
            .field("vcpus", &self.snapshots.len())
            .finish()
    }
}

fn parse(data: &[u8], file_len: u64) -> Result<(Vec<Segment>, Vec<CpuSnapshot>), Error> {
    let elf = ElfBytes::<LittleEndian>::minimal_parse(data)?;

    if elf.ehdr.class != Class::ELF64 {
        return Err(Error::UnsupportedFile("not a 64-bit ELF"));
    }

    if elf.ehdr.e_type != ET_CORE {
        return Err(Error::UnsupportedFile("not a core file"));
    }

    if elf.ehdr.e_machine != EM_X86_64 {
        return Err(Error::UnsupportedFile("not an x86-64 core"));
    }

    let phdrs = elf.segments().ok_or(Error::MissingNoteSegment)?;

    let mut note_phdr = None;
    let mut segments = Vec::new();

    for phdr in phdrs.iter() {
        match phdr.p_type {
            PT_NOTE => {
                if note_phdr.replace(phdr).is_some() {
                    return Err(Error::MultipleNoteSegments);
                }
            }
            PT_LOAD => {
                let end = phdr.p_offset.checked_add(phdr.p_filesz);
                if end.is_none_or(|end| end > file_len) {
                    return Err(Error::Truncated {
                        offset: phdr.p_offset,
                        size: phdr.p_filesz,
                    });
                }

                let ranges = [(phdr.p_paddr, phdr.p_filesz), (phdr.p_vaddr, phdr.p_memsz)];
                for (address, size) in ranges {
                    if address.checked_add(size).is_none() {
                        return Err(Error::AddressOverflow { address, size });
                    }
                }

                if phdr.p_filesz != phdr.p_memsz {
                    tracing::warn!(
                        paddr = %vmcore_core::Hex(phdr.p_paddr),
                        filesz = %vmcore_core::Hex(phdr.p_filesz),
                        memsz = %vmcore_core::Hex(phdr.p_memsz),
                        "segment file size differs from memory size"
                    );
                }

                let segment = Segment {
                    index: segments.len(),
                    phys_start: Pa(phdr.p_paddr),
                    virt_start: phdr.p_vaddr,
                    file_offset: phdr.p_offset,
                    file_size: phdr.p_filesz,
                    mem_size: phdr.p_memsz,
                };

                tracing::trace!(?segment, "found segment");
                segments.push(segment);
            }
            _ => {}
        }
    }

    let mut note_phdr = note_phdr.ok_or(Error::MissingNoteSegment)?;

    // The dumper writes the note segment with alignment 0, which the ELF
    // specification does not allow. Its notes are 4-byte aligned.
    if note_phdr.p_align == 0 {
        note_phdr.p_align = 4;
    }

    let mut prstatus = Vec::new();
    let mut fpregs = Vec::new();
    let mut sregs = Vec::new();

    for note in elf.segment_data_as_notes(&note_phdr)? {
        let Note::Unknown(note) = note
        else {
            tracing::trace!(?note, "ignoring note");
            continue;
        };

        match CoreNote::decode(note.n_type, note.desc)? {
            Some(CoreNote::GeneralRegisters(value)) => prstatus.push(value),
            Some(CoreNote::FpuRegisters(value)) => fpregs.push(value),
            Some(CoreNote::SpecialRegisters(value)) => sregs.push(value),
            None => {}
        }
    }

    if prstatus.len() != fpregs.len() || prstatus.len() != sregs.len() {
        return Err(Error::InconsistentVcpuNotes {
            prstatus: prstatus.len(),
            fpregs: fpregs.len(),
            sregs: sregs.len(),
        });
    }

    let snapshots = prstatus
        .iter()
        .zip(&fpregs)
        .zip(&sregs)
        .map(|((prstatus, fpregs), sregs)| CpuSnapshot::new(prstatus, fpregs, sregs))
        .collect();

    Ok((segments, snapshots))
}
