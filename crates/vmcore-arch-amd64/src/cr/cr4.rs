/// `CR4` control register.
///
/// Contains architectural feature enable bits.
#[derive(Default, Clone, Copy, PartialEq, Eq)]
pub struct Cr4(pub u64);

impl Cr4 {
    /// Checks if the CR4.PSE flag is set.
    pub fn page_size_extension(self) -> bool {
        (self.0 >> 4) & 1 != 0
    }

    /// Checks if the CR4.PAE flag is set.
    ///
    /// PAE must be set before entering IA-32e mode.
    pub fn physical_address_extension(self) -> bool {
        (self.0 >> 5) & 1 != 0
    }

    /// Checks if the CR4.PGE flag is set.
    ///
    /// Enables global pages, which survive a CR3 reload in the TLB.
    pub fn page_global_enable(self) -> bool {
        (self.0 >> 7) & 1 != 0
    }

    /// Checks if the CR4.LA57 flag is set.
    ///
    /// Selects 5-level paging in IA-32e mode.
    pub fn linear_address_57_bit(self) -> bool {
        (self.0 >> 12) & 1 != 0
    }

    /// Checks if the CR4.PCIDE flag is set.
    ///
    /// When set, the low 12 bits of CR3 hold a process-context identifier
    /// instead of cache flags.
    pub fn pcid_enable(self) -> bool {
        (self.0 >> 17) & 1 != 0
    }

    /// Checks if the CR4.SMEP flag is set.
    pub fn supervisor_mode_execution_prevention(self) -> bool {
        (self.0 >> 20) & 1 != 0
    }

    /// Checks if the CR4.SMAP flag is set.
    pub fn supervisor_mode_access_prevention(self) -> bool {
        (self.0 >> 21) & 1 != 0
    }

    /// Checks if the CR4.PKE flag is set.
    ///
    /// Enables protection keys for user-mode pages.
    pub fn protection_key_enable(self) -> bool {
        (self.0 >> 22) & 1 != 0
    }
}

impl std::fmt::Debug for Cr4 {
    fn fmt(&self, f: &mut std::fmt::Formatter) -> std::fmt::Result {
        f.debug_struct("Cr4")
            .field("page_size_extension", &self.page_size_extension())
            .field("physical_address_extension", &self.physical_address_extension())
            .field("page_global_enable", &self.page_global_enable())
            .field("linear_address_57_bit", &self.linear_address_57_bit())
            .field("pcid_enable", &self.pcid_enable())
            .field(
                "supervisor_mode_execution_prevention",
                &self.supervisor_mode_execution_prevention(),
            )
            .field(
                "supervisor_mode_access_prevention",
                &self.supervisor_mode_access_prevention(),
            )
            .field("protection_key_enable", &self.protection_key_enable())
            .finish()
    }
}

impl From<u64> for Cr4 {
    fn from(value: u64) -> Self {
        Self(value)
    }
}

impl From<Cr4> for u64 {
    fn from(value: Cr4) -> Self {
        value.0
    }
}
