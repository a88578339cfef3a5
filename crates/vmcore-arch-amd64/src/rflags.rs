/// The RFLAGS register.
#[derive(Default, Clone, Copy, PartialEq, Eq)]
pub struct Rflags(pub u64);

impl Rflags {
    /// Checks if the Interrupt Enable Flag (IF) is set.
    pub fn interrupt_enable(self) -> bool {
        (self.0 >> 9) & 1 != 0
    }

    /// Returns the I/O Privilege Level (IOPL).
    pub fn io_privilege_level(self) -> u8 {
        ((self.0 >> 12) & 0b11) as _
    }
}

impl std::fmt::Debug for Rflags {
    fn fmt(&self, f: &mut std::fmt::Formatter) -> std::fmt::Result {
        write!(f, "Rflags(0x{:x}", self.0)?;
        if self.interrupt_enable() {
            write!(f, " IF")?;
        }
        write!(f, " IOPL={})", self.io_privilege_level())
    }
}

impl From<u64> for Rflags {
    fn from(value: u64) -> Self {
        Self(value)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn interrupt_flag_and_iopl() {
        let rflags = Rflags::from(0x3246);
        assert!(rflags.interrupt_enable());
        assert_eq!(rflags.io_privilege_level(), 3);
        assert_eq!(format!("{rflags:?}"), "Rflags(0x3246 IF IOPL=3)");

        let rflags = Rflags(0x2);
        assert!(!rflags.interrupt_enable());
        assert_eq!(rflags.io_privilege_level(), 0);
    }
}
