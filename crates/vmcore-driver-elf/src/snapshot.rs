use vmcore_arch_amd64::{FpuRegisters, Gdtr, Idtr, Registers, SegmentAccess, SegmentDescriptor};

use crate::{
    FromExt, IntoExt,
    sys::{core_user, elf_prstatus, kvm_segment, user_fpregs_struct},
};

/// A model-specific register captured with the vCPU.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Msr {
    /// The MSR index.
    pub index: u32,

    /// The MSR value.
    pub value: u64,
}

/// The CPU state of one vCPU, composed from its three notes.
#[derive(Debug, Clone)]
pub struct CpuSnapshot {
    /// The vCPU index recorded by the dumper.
    pub vcpu: u64,

    /// General-purpose, control and segment registers.
    pub registers: Registers,

    /// x87 FPU and SSE registers.
    pub fpu: FpuRegisters,

    /// Pending external interrupts, one bit per vector.
    pub interrupt_bitmap: [u64; 4],

    /// MSRs stored after the special registers.
    pub msrs: Vec<Msr>,
}

impl CpuSnapshot {
    pub(crate) fn new(
        prstatus: &elf_prstatus,
        fpregs: &user_fpregs_struct,
        user: &core_user,
    ) -> Self {
        Self {
            vcpu: user.vcpu,
            registers: (prstatus, user).into_ext(),
            fpu: fpregs.into_ext(),
            interrupt_bitmap: user.sregs.interrupt_bitmap,
            msrs: user
                .msrs
                .iter()
                .map(|msr| Msr {
                    index: msr.index,
                    value: msr.data,
                })
                .collect(),
        }
    }

    /// Returns the value of the MSR `index`, if it was captured.
    pub fn msr(&self, index: u32) -> Option<u64> {
        self.msrs
            .iter()
            .find(|msr| msr.index == index)
            .map(|msr| msr.value)
    }
}

impl FromExt<&kvm_segment> for SegmentDescriptor {
    fn from_ext(value: &kvm_segment) -> Self {
        let access = u32::from(value.type_ & 0xf)
            | u32::from(value.s & 1) << 4
            | u32::from(value.dpl & 0b11) << 5
            | u32::from(value.present & 1) << 7
            | u32::from(value.avl & 1) << 8
            | u32::from(value.l & 1) << 9
            | u32::from(value.db & 1) << 10
            | u32::from(value.g & 1) << 11
            | u32::from(value.unusable & 1) << 16;

        Self {
            base: value.base,
            limit: value.limit,
            selector: value.selector.into(),
            access: SegmentAccess(access),
        }
    }
}

impl FromExt<(&elf_prstatus, &core_user)> for Registers {
    fn from_ext((prstatus, user): (&elf_prstatus, &core_user)) -> Self {
        let regs = &prstatus.pr_reg;
        let sregs = &user.sregs;

        Self {
            rax: regs.rax,
            rbx: regs.rbx,
            rcx: regs.rcx,
            rdx: regs.rdx,
            rbp: regs.rbp,
            rsi: regs.rsi,
            rdi: regs.rdi,
            rsp: regs.rsp,
            r8: regs.r8,
            r9: regs.r9,
            r10: regs.r10,
            r11: regs.r11,
            r12: regs.r12,
            r13: regs.r13,
            r14: regs.r14,
            r15: regs.r15,
            rip: regs.rip,
            rflags: regs.eflags.into(),
            orig_rax: regs.orig_rax,

            cr0: sregs.cr0.into(),
            cr2: sregs.cr2.into(),
            cr3: sregs.cr3.into(),
            cr4: sregs.cr4.into(),
            cr8: sregs.cr8,

            cs: (&sregs.cs).into_ext(),
            ds: (&sregs.ds).into_ext(),
            es: (&sregs.es).into_ext(),
            fs: (&sregs.fs).into_ext(),
            gs: (&sregs.gs).into_ext(),
            ss: (&sregs.ss).into_ext(),
            tr: (&sregs.tr).into_ext(),
            ldtr: (&sregs.ldt).into_ext(),

            idtr: Idtr {
                base: sregs.idt.base,
                limit: sregs.idt.limit,
            },
            gdtr: Gdtr {
                base: sregs.gdt.base,
                limit: sregs.gdt.limit,
            },

            msr_efer: sregs.efer.into(),
            apic_base: sregs.apic_base,
        }
    }
}

impl FromExt<&user_fpregs_struct> for FpuRegisters {
    fn from_ext(value: &user_fpregs_struct) -> Self {
        Self {
            fcw: value.cwd,
            fsw: value.swd,
            ftw: value.ftw,
            fop: value.fop,
            rip: value.rip,
            rdp: value.rdp,
            mxcsr: value.mxcsr,
            mxcsr_mask: value.mxcsr_mask,
            st_space: value.st_space,
            xmm_space: value.xmm_space,
        }
    }
}
