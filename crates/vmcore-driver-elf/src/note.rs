use zerocopy::FromBytes;

use crate::{
    Error,
    sys::{
        NT_PRPSINFO, NT_PRSTATUS, NT_PRXFPREG, NT_PRXREG, core_user, elf_prstatus,
        user_fpregs_struct,
    },
};

/// A per-vCPU note recognized in the note segment.
#[derive(Debug, Clone)]
pub enum CoreNote {
    /// `NT_PRSTATUS`: general-purpose registers.
    GeneralRegisters(Box<elf_prstatus>),

    /// `NT_PRXFPREG`: x87 FPU and SSE registers.
    FpuRegisters(Box<user_fpregs_struct>),

    /// `NT_PRXREG`: special registers and the trailing MSR entry.
    SpecialRegisters(Box<core_user>),
}

impl CoreNote {
    /// Decodes a note descriptor.
    ///
    /// Returns `Ok(None)` for note types that are not recognized. A
    /// recognized note whose descriptor is not exactly the size of its
    /// payload struct is an error.
    pub fn decode(note_type: u64, desc: &[u8]) -> Result<Option<Self>, Error> {
        let note = match note_type {
            NT_PRSTATUS => Self::GeneralRegisters(Box::new(payload(note_type, desc)?)),
            NT_PRXFPREG => Self::FpuRegisters(Box::new(payload(note_type, desc)?)),
            NT_PRXREG => Self::SpecialRegisters(Box::new(payload(note_type, desc)?)),
            NT_PRPSINFO => {
                tracing::trace!("ignoring NT_PRPSINFO note");
                return Ok(None);
            }
            _ => {
                tracing::trace!(note_type, len = desc.len(), "ignoring unknown note");
                return Ok(None);
            }
        };

        Ok(Some(note))
    }
}

fn payload<T>(note_type: u64, desc: &[u8]) -> Result<T, Error>
where
    T: FromBytes,
{
    T::read_from_bytes(desc).map_err(|_| Error::InvalidNoteSize {
        note_type,
        expected: size_of::<T>(),
        found: desc.len(),
    })
}

#[cfg(test)]
mod tests {
    use zerocopy::IntoBytes;

    use super::*;

    #[test]
    fn decode_known_notes() {
        let prstatus = elf_prstatus::default();
        let note = CoreNote::decode(NT_PRSTATUS, prstatus.as_bytes()).unwrap();
        assert!(matches!(note, Some(CoreNote::GeneralRegisters(_))));

        let sregs = core_user::default();
        let note = CoreNote::decode(NT_PRXREG, sregs.as_bytes()).unwrap();
        assert!(matches!(note, Some(CoreNote::SpecialRegisters(_))));
    }

    #[test]
    fn unknown_and_ignored_notes() {
        assert!(CoreNote::decode(NT_PRPSINFO, &[0; 136]).unwrap().is_none());
        assert!(CoreNote::decode(0x53494749, &[0; 128]).unwrap().is_none());
    }

    #[test]
    fn size_mismatch_is_fatal() {
        let fpu = user_fpregs_struct::default();
        let short = &fpu.as_bytes()[..508];

        match CoreNote::decode(NT_PRXFPREG, short) {
            Err(Error::InvalidNoteSize {
                note_type,
                expected,
                found,
            }) => {
                assert_eq!(note_type, NT_PRXFPREG);
                assert_eq!(expected, 512);
                assert_eq!(found, 508);
            }
            other => panic!("unexpected result: {other:?}"),
        }

        // Longer is as wrong as shorter.
        assert!(CoreNote::decode(NT_PRSTATUS, &[0; 340]).is_err());
    }
}
