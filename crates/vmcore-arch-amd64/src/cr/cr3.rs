use vmcore_core::Pa;

/// `CR3` control register.
///
/// Holds the physical address of the top-level paging structure. The low
/// 12 bits are either the PCID or the PWT/PCD cache flags, depending on
/// `CR4.PCIDE`.
#[derive(Default, Clone, Copy, PartialEq, Eq)]
pub struct Cr3(pub u64);

impl Cr3 {
    /// Bits 12-51: the physical address of the PML4 table.
    pub const ADDRESS_MASK: u64 = 0x000f_ffff_ffff_f000;

    /// Returns the Process Context Identifier (PCID).
    ///
    /// Only meaningful when `CR4.PCIDE` is set.
    pub fn pcid(self) -> u16 {
        (self.0 & 0xfff) as _
    }

    /// Checks if the page-level write-through flag is set.
    ///
    /// Only meaningful when `CR4.PCIDE` is clear.
    pub fn page_level_write_through(self) -> bool {
        (self.0 >> 3) & 1 != 0
    }

    /// Checks if the page-level cache disable flag is set.
    ///
    /// Only meaningful when `CR4.PCIDE` is clear.
    pub fn page_level_cache_disable(self) -> bool {
        (self.0 >> 4) & 1 != 0
    }

    /// Returns the physical address of the PML4 table when `CR4.PCIDE` is
    /// set.
    pub fn page_table_base(self) -> Pa {
        Pa(self.0 & Self::ADDRESS_MASK)
    }

    /// Checks if bits above `physical_address_bits` are set.
    pub fn has_reserved_bits(self, physical_address_bits: u8) -> bool {
        let bits = u32::from(physical_address_bits.min(52));
        let reserved = (!0u64).checked_shl(bits).unwrap_or(0) & !(1 << 63);
        self.0 & reserved != 0
    }
}

impl std::fmt::Debug for Cr3 {
    fn fmt(&self, f: &mut std::fmt::Formatter) -> std::fmt::Result {
        f.debug_struct("Cr3")
            .field("pcid", &self.pcid())
            .field("page_table_base", &self.page_table_base())
            .finish()
    }
}

impl From<u64> for Cr3 {
    fn from(value: u64) -> Self {
        Self(value)
    }
}

impl From<Cr3> for u64 {
    fn from(value: Cr3) -> Self {
        value.0
    }
}
