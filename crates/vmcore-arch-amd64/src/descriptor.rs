/// Global Descriptor Table Register (GDTR).
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq)]
pub struct Gdtr {
    /// The linear address of the GDT.
    pub base: u64,

    /// The size of the GDT in bytes, minus one.
    pub limit: u16,
}

/// Interrupt Descriptor Table Register (IDTR).
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq)]
pub struct Idtr {
    /// The linear address of the IDT.
    pub base: u64,

    /// The size of the IDT in bytes, minus one.
    pub limit: u16,
}
