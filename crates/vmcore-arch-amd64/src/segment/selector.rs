/// A 16-bit segment selector.
///
/// Selects a descriptor in the GDT or LDT and carries the requested
/// privilege level. For `CS`, the RPL is the current privilege level.
#[repr(transparent)]
#[derive(Default, Clone, Copy, PartialEq, Eq)]
pub struct Selector(pub u16);

/// A descriptor table.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DescriptorTable {
    /// The Global Descriptor Table.
    Gdt,

    /// The Local Descriptor Table.
    Ldt,
}

impl Selector {
    /// Returns the requested privilege level (0 is the most privileged).
    pub fn request_privilege_level(self) -> u8 {
        (self.0 & 0b11) as _
    }

    /// Returns the descriptor table the selector indexes.
    pub fn table(self) -> DescriptorTable {
        if self.0 >> 2 & 1 == 0 {
            DescriptorTable::Gdt
        }
        else {
            DescriptorTable::Ldt
        }
    }

    /// Returns the descriptor index within the table.
    pub fn index(self) -> u16 {
        self.0 >> 3 & 0x1fff
    }
}

impl From<u16> for Selector {
    fn from(value: u16) -> Self {
        Self(value)
    }
}

impl From<Selector> for u16 {
    fn from(value: Selector) -> Self {
        value.0
    }
}

impl std::fmt::Debug for Selector {
    fn fmt(&self, f: &mut std::fmt::Formatter) -> std::fmt::Result {
        f.debug_struct("Selector")
            .field("request_privilege_level", &self.request_privilege_level())
            .field("table", &self.table())
            .field("index", &self.index())
            .finish()
    }
}
