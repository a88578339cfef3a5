//! Prints what can be recovered from a Linux guest coredump.
//!
//! Usage: `inspect-core <coredump>`.

use indexmap::IndexMap;
use vmcore::{
    Hex,
    arch::amd64::{Amd64, PageTableWalker},
    driver::elf::ElfCore,
    os::linux::{KASLR_KERNEL_RANGE, LinuxKernel, memory_region},
};

fn main() -> Result<(), Box<dyn std::error::Error>> {
    tracing_subscriber::fmt()
        .with_max_level(tracing::Level::DEBUG)
        .with_target(false)
        .init();

    let path = std::env::args().nth(1).ok_or("usage: inspect-core <coredump>")?;
    let core = ElfCore::open(&path)?;

    println!("{} segments, {} vCPUs", core.segments().len(), core.vcpu_count());
    for segment in core.segments() {
        println!(
            "  segment {}: {:?} ({} KiB)",
            segment.index(),
            segment.phys_range(),
            segment.file_size / 1024
        );
    }

    let registers = core.registers(0)?;
    println!(
        "vCPU 0: rip={} rsp={} cr3={} cpl={} interrupts={} paging={:?}",
        Hex(registers.rip),
        Hex(registers.rsp),
        Hex(registers.cr3.0),
        registers.current_privilege_level(),
        if registers.rflags.interrupt_enable() { "on" } else { "off" },
        Amd64::paging_mode(&registers)
    );

    // Count the mapped bytes per region of the Linux memory map.
    let walker = PageTableWalker::new(&core, registers.translation_root());
    let mut regions = IndexMap::<&str, (u64, u64)>::new();
    for leaf in walker.iter() {
        let name = memory_region(leaf.va).map_or("unknown", |region| region.name);
        let (count, bytes) = regions.entry(name).or_default();
        *count += 1;
        *bytes += leaf.size();
    }

    println!("page table leaves:");
    for (name, (count, bytes)) in &regions {
        println!("  {name}: {count} leaves, {} KiB", bytes / 1024);
    }

    let kernel = LinuxKernel::locate(&core)?;
    let range = kernel.range();
    println!(
        "kernel at {}-{} ({} KiB)",
        range.start,
        range.end,
        (range.end - range.start) / 1024
    );
    println!(
        "free KASLR space: {} KiB before, {} KiB after (range {}-{})",
        kernel.space_before() / 1024,
        kernel.space_after() / 1024,
        KASLR_KERNEL_RANGE.start,
        KASLR_KERNEL_RANGE.end
    );

    for section in kernel.sections() {
        println!(
            "  {}-{} {}{}",
            section.virt_range.start,
            section.virt_range.end,
            if section.writable { "w" } else { "-" },
            if section.executable { "x" } else { "-" }
        );
    }

    if let Some(banner) = kernel.banner() {
        println!("{banner}");
    }

    println!("{} kernel symbols", kernel.symbols().len());
    for name in ["init_task", "_printk", "printk", "_text"] {
        if let Some(address) = kernel.symbol(name) {
            println!("  {name} @ {address}");
        }
    }

    Ok(())
}
