/// Extended Feature Enable Register (EFER).
#[derive(Default, Clone, Copy, PartialEq, Eq)]
pub struct MsrEfer(pub u64);

impl MsrEfer {
    /// MSR index of `IA32_EFER`.
    pub const INDEX: u32 = 0xc000_0080;

    /// Checks if the SYSCALL enable (SCE) bit is set.
    pub fn syscall_enable(self) -> bool {
        self.0 & 1 != 0
    }

    /// Checks if the Long Mode Enable (LME) bit is set.
    ///
    /// IA-32e mode becomes active once paging is enabled on top of it.
    pub fn long_mode_enable(self) -> bool {
        (self.0 >> 8) & 1 != 0
    }

    /// Checks if the Long Mode Active (LMA) bit is set.
    pub fn long_mode_active(self) -> bool {
        (self.0 >> 10) & 1 != 0
    }

    /// Checks if the No-Execute Enable (NXE) bit is set.
    ///
    /// Bit 63 of paging-structure entries is reserved unless this is set.
    pub fn execute_disable(self) -> bool {
        (self.0 >> 11) & 1 != 0
    }
}

impl std::fmt::Debug for MsrEfer {
    fn fmt(&self, f: &mut std::fmt::Formatter) -> std::fmt::Result {
        f.debug_struct("MsrEfer")
            .field("syscall_enable", &self.syscall_enable())
            .field("long_mode_enable", &self.long_mode_enable())
            .field("long_mode_active", &self.long_mode_active())
            .field("execute_disable", &self.execute_disable())
            .finish()
    }
}

impl From<u64> for MsrEfer {
    fn from(value: u64) -> Self {
        Self(value)
    }
}

impl From<MsrEfer> for u64 {
    fn from(value: MsrEfer) -> Self {
        value.0
    }
}
