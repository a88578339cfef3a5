use super::{Cr0, Cr2, Cr3, Cr4, Gdtr, Idtr, MsrEfer, Rflags, SegmentDescriptor};

/// The state of the CPU registers captured for one vCPU.
#[expect(missing_docs)]
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq)]
pub struct Registers {
    pub rax: u64,
    pub rbx: u64,
    pub rcx: u64,
    pub rdx: u64,
    pub rbp: u64,
    pub rsi: u64,
    pub rdi: u64,
    pub rsp: u64,
    pub r8: u64,
    pub r9: u64,
    pub r10: u64,
    pub r11: u64,
    pub r12: u64,
    pub r13: u64,
    pub r14: u64,
    pub r15: u64,
    pub rip: u64,
    pub rflags: Rflags,

    /// System call number at the time of the dump (`-1` when none).
    pub orig_rax: u64,

    pub cr0: Cr0,
    pub cr2: Cr2,
    pub cr3: Cr3,
    pub cr4: Cr4,
    pub cr8: u64,

    pub cs: SegmentDescriptor,
    pub ds: SegmentDescriptor,
    pub es: SegmentDescriptor,
    pub fs: SegmentDescriptor,
    pub gs: SegmentDescriptor,
    pub ss: SegmentDescriptor,
    pub tr: SegmentDescriptor,
    pub ldtr: SegmentDescriptor,

    pub idtr: Idtr,
    pub gdtr: Gdtr,

    pub msr_efer: MsrEfer,
    pub apic_base: u64,
}

impl Registers {
    /// Returns the current privilege level, taken from the `CS` selector.
    pub fn current_privilege_level(&self) -> u8 {
        self.cs.selector.request_privilege_level()
    }
}

/// The x87 FPU and SSE state (`FXSAVE` layout).
#[expect(missing_docs)]
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct FpuRegisters {
    pub fcw: u16,
    pub fsw: u16,
    /// Abridged tag word.
    pub ftw: u16,
    pub fop: u16,
    pub rip: u64,
    pub rdp: u64,
    pub mxcsr: u32,
    pub mxcsr_mask: u32,
    /// Eight 80-bit registers, each in a 16-byte slot.
    pub st_space: [u32; 32],
    /// Sixteen 128-bit XMM registers.
    pub xmm_space: [u32; 64],
}

impl FpuRegisters {
    /// Returns XMM register `index` (0-15).
    pub fn xmm(&self, index: usize) -> Option<u128> {
        let lanes = self.xmm_space.get(index * 4..index * 4 + 4)?;

        Some(
            lanes
                .iter()
                .rev()
                .fold(0u128, |value, lane| (value << 32) | u128::from(*lane)),
        )
    }
}

impl Default for FpuRegisters {
    fn default() -> Self {
        Self {
            fcw: 0,
            fsw: 0,
            ftw: 0,
            fop: 0,
            rip: 0,
            rdp: 0,
            mxcsr: 0,
            mxcsr_mask: 0,
            st_space: [0; 32],
            xmm_space: [0; 64],
        }
    }
}
