/// `CR0` control register.
///
/// Controls the operating mode of the processor.
#[derive(Default, Clone, Copy, PartialEq, Eq)]
pub struct Cr0(pub u64);

impl Cr0 {
    /// Checks if the CR0.PE flag is set.
    ///
    /// Protected mode is enabled when set. On its own this flag enables
    /// segment-level protection only.
    pub fn protection_enable(self) -> bool {
        self.0 & 1 != 0
    }

    /// Checks if the CR0.WP flag is set.
    ///
    /// Supervisor-level writes to read-only pages fault when set.
    pub fn write_protect(self) -> bool {
        (self.0 >> 16) & 1 != 0
    }

    /// Checks if the CR0.CD flag is set.
    pub fn cache_disable(self) -> bool {
        (self.0 >> 30) & 1 != 0
    }

    /// Checks if the CR0.PG flag is set.
    ///
    /// Paging is enabled when set. Has no effect unless CR0.PE is also set.
    pub fn paging(self) -> bool {
        (self.0 >> 31) & 1 != 0
    }
}

impl std::fmt::Debug for Cr0 {
    fn fmt(&self, f: &mut std::fmt::Formatter) -> std::fmt::Result {
        f.debug_struct("Cr0")
            .field("protection_enable", &self.protection_enable())
            .field("write_protect", &self.write_protect())
            .field("cache_disable", &self.cache_disable())
            .field("paging", &self.paging())
            .finish()
    }
}

impl From<u64> for Cr0 {
    fn from(value: u64) -> Self {
        Self(value)
    }
}

impl From<Cr0> for u64 {
    fn from(value: Cr0) -> Self {
        value.0
    }
}
