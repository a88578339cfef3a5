use vmcore_core::Va;

/// `CR2` control register.
///
/// Holds the linear address of the most recent page fault.
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq)]
pub struct Cr2(pub u64);

impl From<u64> for Cr2 {
    fn from(value: u64) -> Self {
        Self(value)
    }
}

impl From<Cr2> for Va {
    fn from(value: Cr2) -> Self {
        Va(value.0)
    }
}
