#![allow(dead_code)]

use std::io::Write as _;

use tempfile::NamedTempFile;
use vmcore_driver_elf::sys::{
    NT_PRSTATUS, NT_PRXFPREG, NT_PRXREG, core_user, elf_prstatus, user_fpregs_struct,
};
use zerocopy::IntoBytes;

const EHDR_SIZE: usize = 64;
const PHDR_SIZE: usize = 56;

const PT_LOAD: u32 = 1;
const PT_NOTE: u32 = 4;

pub const ET_EXEC: u16 = 2;
pub const ET_CORE: u16 = 4;

/// Builds synthetic coredumps in the dumper's format.
pub struct CoreBuilder {
    e_type: u16,
    note_segments: usize,
    notes: Vec<(u32, Vec<u8>)>,
    loads: Vec<Load>,
}

struct Load {
    paddr: u64,
    data: Vec<u8>,
    filesz: Option<u64>,
}

impl Default for CoreBuilder {
    fn default() -> Self {
        Self {
            e_type: ET_CORE,
            note_segments: 1,
            notes: Vec::new(),
            loads: Vec::new(),
        }
    }
}

impl CoreBuilder {
    pub fn e_type(mut self, e_type: u16) -> Self {
        self.e_type = e_type;
        self
    }

    pub fn note_segments(mut self, count: usize) -> Self {
        self.note_segments = count;
        self
    }

    /// Appends the three notes of one vCPU.
    pub fn vcpu(self, prstatus: &elf_prstatus, fpregs: &user_fpregs_struct, user: &core_user) -> Self {
        self.note(NT_PRSTATUS as u32, prstatus.as_bytes())
            .note(NT_PRXREG as u32, user.as_bytes())
            .note(NT_PRXFPREG as u32, fpregs.as_bytes())
    }

    pub fn note(mut self, n_type: u32, desc: &[u8]) -> Self {
        self.notes.push((n_type, desc.to_vec()));
        self
    }

    pub fn load(mut self, paddr: u64, data: Vec<u8>) -> Self {
        self.loads.push(Load {
            paddr,
            data,
            filesz: None,
        });
        self
    }

    /// Adds a load segment claiming `filesz` bytes while storing `data`.
    pub fn load_with_filesz(mut self, paddr: u64, data: Vec<u8>, filesz: u64) -> Self {
        self.loads.push(Load {
            paddr,
            data,
            filesz: Some(filesz),
        });
        self
    }

    pub fn build(&self) -> Vec<u8> {
        let mut notes = Vec::new();
        for (n_type, desc) in &self.notes {
            notes.extend_from_slice(&5u32.to_le_bytes());
            notes.extend_from_slice(&(desc.len() as u32).to_le_bytes());
            notes.extend_from_slice(&n_type.to_le_bytes());
            notes.extend_from_slice(b"CORE\0\0\0\0");
            notes.extend_from_slice(desc);
            notes.resize(notes.len().next_multiple_of(4), 0);
        }

        let phnum = self.note_segments + self.loads.len();
        let notes_offset = EHDR_SIZE + phnum * PHDR_SIZE;

        // Load segments are packed on 8-byte boundaries, so most of them do
        // not start on a page boundary in the file.
        let mut offset = (notes_offset + notes.len()).next_multiple_of(8);
        let mut load_offsets = Vec::new();
        for load in &self.loads {
            load_offsets.push(offset);
            offset = (offset + load.data.len()).next_multiple_of(8);
        }

        let mut out = Vec::new();

        // ELF header.
        out.extend_from_slice(&[0x7f, b'E', b'L', b'F', 2, 1, 1, 0]);
        out.extend_from_slice(&[0; 8]);
        out.extend_from_slice(&self.e_type.to_le_bytes());
        out.extend_from_slice(&62u16.to_le_bytes());
        out.extend_from_slice(&1u32.to_le_bytes());
        out.extend_from_slice(&0u64.to_le_bytes());
        out.extend_from_slice(&(EHDR_SIZE as u64).to_le_bytes());
        out.extend_from_slice(&0u64.to_le_bytes());
        out.extend_from_slice(&0u32.to_le_bytes());
        out.extend_from_slice(&(EHDR_SIZE as u16).to_le_bytes());
        out.extend_from_slice(&(PHDR_SIZE as u16).to_le_bytes());
        out.extend_from_slice(&(phnum as u16).to_le_bytes());
        out.extend_from_slice(&64u16.to_le_bytes());
        out.extend_from_slice(&0u16.to_le_bytes());
        out.extend_from_slice(&0u16.to_le_bytes());
        assert_eq!(out.len(), EHDR_SIZE);

        for _ in 0..self.note_segments {
            phdr(&mut out, PT_NOTE, notes_offset as u64, 0, notes.len() as u64, 0, 0);
        }

        for (load, &offset) in self.loads.iter().zip(&load_offsets) {
            let filesz = load.filesz.unwrap_or(load.data.len() as u64);
            phdr(&mut out, PT_LOAD, offset as u64, load.paddr, filesz, filesz, 0x1000);
        }

        out.extend_from_slice(&notes);

        for (load, &offset) in self.loads.iter().zip(&load_offsets) {
            out.resize(offset, 0);
            out.extend_from_slice(&load.data);
        }

        out
    }

    pub fn write(&self) -> NamedTempFile {
        let mut file = NamedTempFile::new().unwrap();
        file.write_all(&self.build()).unwrap();
        file.flush().unwrap();
        file
    }
}

fn phdr(out: &mut Vec<u8>, p_type: u32, offset: u64, addr: u64, filesz: u64, memsz: u64, align: u64) {
    out.extend_from_slice(&p_type.to_le_bytes());
    out.extend_from_slice(&4u32.to_le_bytes());
    out.extend_from_slice(&offset.to_le_bytes());
    out.extend_from_slice(&addr.to_le_bytes());
    out.extend_from_slice(&addr.to_le_bytes());
    out.extend_from_slice(&filesz.to_le_bytes());
    out.extend_from_slice(&memsz.to_le_bytes());
    out.extend_from_slice(&align.to_le_bytes());
}

/// vCPU notes with a recognizable `rip`, `cr3` and vCPU index.
pub fn vcpu_notes(vcpu: u64) -> (elf_prstatus, user_fpregs_struct, core_user) {
    let mut prstatus = elf_prstatus::default();
    prstatus.pr_pid = vcpu as i32 + 1;
    prstatus.pr_reg.rip = 0xffff_ffff_8100_0000 + vcpu * 0x10;
    prstatus.pr_reg.cs = 0x10;

    let mut fpregs = user_fpregs_struct::default();
    fpregs.mxcsr = 0x1f80;

    let mut user = core_user::default();
    user.vcpu = vcpu;
    user.sregs.cr0 = 0x8005_0033;
    user.sregs.cr3 = 0x1000;
    user.sregs.cr4 = 0x3606f0;
    user.sregs.efer = 0xd01;
    user.sregs.cs.selector = 0x10;
    user.sregs.cs.l = 1;

    (prstatus, fpregs, user)
}

/// Bytes `0, 1, 2, ...` wrapping at 251, so offsets are distinguishable.
pub fn pattern(len: usize) -> Vec<u8> {
    (0..len).map(|i| (i % 251) as u8).collect()
}
