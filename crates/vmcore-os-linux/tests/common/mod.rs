#![allow(dead_code)]

use std::io::Write as _;

use tempfile::NamedTempFile;
use vmcore_core::Va;
use vmcore_driver_elf::sys::{
    NT_PRSTATUS, NT_PRXFPREG, NT_PRXREG, core_user, elf_prstatus, user_fpregs_struct,
};
use zerocopy::IntoBytes as _;

pub const KERNEL: Va = Va(0xffff_ffff_8100_0000);
pub const KERNEL_PA: u64 = 0x10_0000;
pub const KERNEL_PAGES: u64 = 3;

const PML4: u64 = 0x1000;
const PDPT: u64 = 0x2000;
const PD: u64 = 0x3000;
const PT: u64 = 0x4000;

const PRESENT: u64 = 1;
const WRITABLE: u64 = 1 << 1;
const NO_EXECUTE: u64 = 1 << 63;

fn put(image: &mut [u8], offset: u64, data: &[u8]) {
    let offset = offset as usize;
    image[offset..offset + data.len()].copy_from_slice(data);
}

fn put_entry(image: &mut [u8], table: u64, index: u64, entry: u64) {
    put(image, table + index * 8, &entry.to_le_bytes());
}

fn prel32(field: Va, target: Va) -> [u8; 4] {
    ((target.0 as i64 - field.0 as i64) as i32).to_le_bytes()
}

/// Guest physical memory: page tables mapping three kernel pages at
/// `KERNEL`, one page of the direct map, the banner and a symbol table.
fn guest_memory() -> Vec<u8> {
    let mut image = vec![0u8; (KERNEL_PA + KERNEL_PAGES * 0x1000) as usize];

    put_entry(&mut image, PML4, 511, PDPT | PRESENT | WRITABLE);
    put_entry(&mut image, PML4, 273, PDPT | PRESENT | WRITABLE);
    put_entry(&mut image, PDPT, 510, PD | PRESENT | WRITABLE);
    put_entry(&mut image, PD, 8, PT | PRESENT | WRITABLE);
    put_entry(&mut image, PT, 0, KERNEL_PA | PRESENT);
    put_entry(&mut image, PT, 1, (KERNEL_PA + 0x1000) | PRESENT);
    put_entry(&mut image, PT, 2, (KERNEL_PA + 0x2000) | PRESENT | WRITABLE | NO_EXECUTE);

    put(
        &mut image,
        KERNEL_PA + 0x100,
        b"Linux version 6.8.0-test (gcc 13.2) #1 SMP PREEMPT\n\0",
    );

    // Three `kernel_symbol` records, two checksums, then the names.
    let table = KERNEL + 0x2000;
    let pool = table + 3 * 12 + 8;
    let names: [(&[u8], Va); 3] = [
        (b"_printk\0", KERNEL + 0x400),
        (b"init_task\0", KERNEL + 0x2800),
        (b"schedule\0", KERNEL + 0x600),
    ];

    let mut exports = Vec::new();
    let mut name = pool;
    for (index, (string, value)) in names.iter().enumerate() {
        let record = table + index as u64 * 12;
        exports.extend_from_slice(&prel32(record, *value));
        exports.extend_from_slice(&prel32(record + 4, name));
        exports.extend_from_slice(&[0; 4]);
        name = name + string.len() as u64;
    }
    exports.extend_from_slice(&0x1234_89abu32.to_le_bytes());
    exports.extend_from_slice(&0xfedc_ba98u32.to_le_bytes());
    for (string, _) in &names {
        exports.extend_from_slice(string);
    }
    put(&mut image, KERNEL_PA + 0x2000, &exports);

    image
}

fn vcpu_notes(vcpu: u64, cs: u16) -> (elf_prstatus, user_fpregs_struct, core_user) {
    let mut prstatus = elf_prstatus::default();
    prstatus.pr_reg.rip = KERNEL.0 + 0x10;
    prstatus.pr_reg.cs = u64::from(cs);

    let mut fpregs = user_fpregs_struct::default();
    fpregs.mxcsr = 0x1f80;

    let mut user = core_user::default();
    user.vcpu = vcpu;
    user.sregs.cr0 = 0x8005_0033;
    user.sregs.cr3 = PML4;
    user.sregs.cr4 = 0x3606f0;
    user.sregs.efer = 0xd01;
    user.sregs.cs.selector = cs;
    user.sregs.cs.l = 1;

    (prstatus, fpregs, user)
}

fn note(out: &mut Vec<u8>, n_type: u64, desc: &[u8]) {
    out.extend_from_slice(&5u32.to_le_bytes());
    out.extend_from_slice(&(desc.len() as u32).to_le_bytes());
    out.extend_from_slice(&(n_type as u32).to_le_bytes());
    out.extend_from_slice(b"CORE\0\0\0\0");
    out.extend_from_slice(desc);
    out.resize(out.len().next_multiple_of(4), 0);
}

fn phdr(out: &mut Vec<u8>, p_type: u32, offset: u64, addr: u64, size: u64, align: u64) {
    out.extend_from_slice(&p_type.to_le_bytes());
    out.extend_from_slice(&4u32.to_le_bytes());
    out.extend_from_slice(&offset.to_le_bytes());
    out.extend_from_slice(&addr.to_le_bytes());
    out.extend_from_slice(&addr.to_le_bytes());
    out.extend_from_slice(&size.to_le_bytes());
    out.extend_from_slice(&size.to_le_bytes());
    out.extend_from_slice(&align.to_le_bytes());
}

/// Writes a coredump with one vCPU per `cs` selector and a single load
/// segment holding [`guest_memory`].
pub fn write_core(selectors: &[u16]) -> NamedTempFile {
    let mut notes = Vec::new();
    for (vcpu, &cs) in selectors.iter().enumerate() {
        let (prstatus, fpregs, user) = vcpu_notes(vcpu as u64, cs);
        note(&mut notes, NT_PRSTATUS, prstatus.as_bytes());
        note(&mut notes, NT_PRXREG, user.as_bytes());
        note(&mut notes, NT_PRXFPREG, fpregs.as_bytes());
    }

    let memory = guest_memory();
    let notes_offset = 64 + 2 * 56;
    let load_offset = (notes_offset + notes.len()).next_multiple_of(0x1000);

    let mut out = Vec::new();
    out.extend_from_slice(&[0x7f, b'E', b'L', b'F', 2, 1, 1, 0, 0, 0, 0, 0, 0, 0, 0, 0]);
    out.extend_from_slice(&4u16.to_le_bytes());
    out.extend_from_slice(&62u16.to_le_bytes());
    out.extend_from_slice(&1u32.to_le_bytes());
    out.extend_from_slice(&0u64.to_le_bytes());
    out.extend_from_slice(&64u64.to_le_bytes());
    out.extend_from_slice(&0u64.to_le_bytes());
    out.extend_from_slice(&0u32.to_le_bytes());
    out.extend_from_slice(&64u16.to_le_bytes());
    out.extend_from_slice(&56u16.to_le_bytes());
    out.extend_from_slice(&2u16.to_le_bytes());
    out.extend_from_slice(&[0; 6]);

    phdr(&mut out, 4, notes_offset as u64, 0, notes.len() as u64, 0);
    phdr(&mut out, 1, load_offset as u64, 0, memory.len() as u64, 0x1000);
    out.extend_from_slice(&notes);
    out.resize(load_offset, 0);
    out.extend_from_slice(&memory);

    let mut file = NamedTempFile::new().unwrap();
    file.write_all(&out).unwrap();
    file.flush().unwrap();
    file
}
