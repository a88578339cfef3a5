mod hex;
pub(crate) mod macros;

use self::macros::{impl_address, impl_binop};
pub use self::hex::Hex;

/// An address in one of the guest's address spaces.
///
/// Implemented by [`Pa`] and [`Va`] so that a
/// [`Memory`](crate::Memory) window can be tagged with the address space
/// it lives in.
pub trait Address:
    Copy
    + Ord
    + std::hash::Hash
    + std::fmt::Debug
    + std::fmt::Display
    + From<u64>
    + Into<u64>
    + Send
    + Sync
    + 'static
{
    /// Returns the address as a plain integer.
    fn raw(self) -> u64 {
        self.into()
    }
}

impl_address!(Gfn, "Guest Frame Number");
impl_address!(Pa, "Guest Physical Address");
impl_address!(Va, "Guest Virtual Address");
