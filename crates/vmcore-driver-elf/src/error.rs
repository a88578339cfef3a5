use vmcore_core::{Hex, VmcoreError};

/// Error type for the ELF coredump driver.
#[derive(thiserror::Error, Debug)]
pub enum Error {
    /// The ELF headers could not be parsed.
    #[error("failed to parse ELF: {0}")]
    Elf(#[from] elf::ParseError),

    /// An I/O error occurred.
    #[error(transparent)]
    Io(#[from] std::io::Error),

    /// The file is a valid ELF, but not an x86-64 core.
    #[error("unsupported file: {0}")]
    UnsupportedFile(&'static str),

    /// The program-header table has no `PT_NOTE` entry.
    #[error("missing note segment")]
    MissingNoteSegment,

    /// The program-header table has more than one `PT_NOTE` entry.
    #[error("multiple note segments")]
    MultipleNoteSegments,

    /// A recognized note does not have the size of its payload struct.
    #[error("invalid size of note {}: expected {expected} bytes, found {found}", Hex(*.note_type))]
    InvalidNoteSize {
        /// The note type.
        note_type: u64,

        /// The size of the payload struct.
        expected: usize,

        /// The size of the note descriptor.
        found: usize,
    },

    /// A segment extends beyond the end of the file.
    #[error("segment at offset {} with size {} overruns the file", Hex(*.offset), Hex(*.size))]
    Truncated {
        /// File offset of the segment.
        offset: u64,

        /// File size of the segment.
        size: u64,
    },

    /// A segment's address range wraps around the 64-bit address space.
    #[error("segment at {} with size {} wraps the address space", Hex(*.address), Hex(*.size))]
    AddressOverflow {
        /// Base address of the segment.
        address: u64,

        /// Size of the segment.
        size: u64,
    },

    /// The per-vCPU note lists have different lengths.
    #[error(
        "inconsistent vCPU notes: {prstatus} NT_PRSTATUS, {fpregs} NT_PRXFPREG, {sregs} NT_PRXREG"
    )]
    InconsistentVcpuNotes {
        /// Number of general-register notes.
        prstatus: usize,

        /// Number of FPU notes.
        fpregs: usize,

        /// Number of special-register notes.
        sregs: usize,
    },

    /// The vCPU index is beyond the number of captured vCPUs.
    #[error("vCPU {0} not found")]
    VcpuNotFound(usize),

    /// The physical range is not backed by a single segment.
    #[error("physical range [{}, {}) is not backed by a segment", Hex(*.start), Hex(*.end))]
    OutOfBounds {
        /// First address of the range.
        start: u64,

        /// One past the last address of the range.
        end: u64,
    },
}

impl From<Error> for VmcoreError {
    fn from(value: Error) -> Self {
        match value {
            Error::Io(value) => Self::Io(value),
            Error::Elf(_)
            | Error::UnsupportedFile(_)
            | Error::MissingNoteSegment
            | Error::MultipleNoteSegments
            | Error::InvalidNoteSize { .. }
            | Error::Truncated { .. }
            | Error::AddressOverflow { .. }
            | Error::InconsistentVcpuNotes { .. } => Self::MalformedInput(value.to_string()),
            Error::OutOfBounds { start, end } => Self::out_of_bounds(start, start, end),
            Error::VcpuNotFound(_) => Self::Driver(Box::new(value)),
        }
    }
}
