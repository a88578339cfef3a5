macro_rules! impl_binop {
    ($name:ident, $type:ty, $trait:ident, $method:ident, $assign_trait:ident, $assign_method:ident, $op:tt) => {
        impl ::std::ops::$trait<$type> for $name {
            type Output = $name;

            fn $method(self, rhs: $type) -> Self::Output {
                Self(self.0 $op rhs)
            }
        }

        impl ::std::ops::$assign_trait<$type> for $name {
            fn $assign_method(&mut self, rhs: $type) {
                self.0 = self.0 $op rhs;
            }
        }
    };
}

macro_rules! impl_address {
    ($name:ident, $doc:expr) => {
        #[doc = concat!("A ", $doc, ".")]
        #[repr(transparent)]
        #[derive(Default, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
        pub struct $name(pub u64);

        impl $name {
            #[doc = concat!("Creates a new `", stringify!($name), "`.")]
            pub const fn new(value: u64) -> Self {
                Self(value)
            }

            /// Adds `rhs`, returning `None` on overflow.
            pub const fn checked_add(self, rhs: u64) -> Option<Self> {
                match self.0.checked_add(rhs) {
                    Some(value) => Some(Self(value)),
                    None => None,
                }
            }

            /// Adds a signed displacement, returning `None` on overflow.
            pub const fn checked_add_signed(self, rhs: i64) -> Option<Self> {
                match self.0.checked_add_signed(rhs) {
                    Some(value) => Some(Self(value)),
                    None => None,
                }
            }

            /// Subtracts `rhs`, returning `None` on underflow.
            pub const fn checked_sub(self, rhs: u64) -> Option<Self> {
                match self.0.checked_sub(rhs) {
                    Some(value) => Some(Self(value)),
                    None => None,
                }
            }

            /// Rounds up to a multiple of `align` (a power of two), returning
            /// `None` on overflow.
            pub const fn align_up(self, align: u64) -> Option<Self> {
                match self.0.checked_add(align - 1) {
                    Some(value) => Some(Self(value & !(align - 1))),
                    None => None,
                }
            }
        }

        impl From<u64> for $name {
            fn from(value: u64) -> Self {
                Self(value)
            }
        }

        impl From<$name> for u64 {
            fn from(value: $name) -> u64 {
                value.0
            }
        }

        impl_binop!($name, u64, Add, add, AddAssign, add_assign, +);
        impl_binop!($name, u64, Sub, sub, SubAssign, sub_assign, -);
        impl_binop!($name, u64, BitAnd, bitand, BitAndAssign, bitand_assign, &);
        impl_binop!($name, u64, BitOr, bitor, BitOrAssign, bitor_assign, |);

        impl ::std::ops::Sub<$name> for $name {
            type Output = u64;

            fn sub(self, rhs: $name) -> u64 {
                self.0 - rhs.0
            }
        }

        impl ::std::fmt::Debug for $name {
            fn fmt(&self, f: &mut ::std::fmt::Formatter) -> ::std::fmt::Result {
                write!(f, "0x{:016x}", self.0)
            }
        }

        impl ::std::fmt::Display for $name {
            fn fmt(&self, f: &mut ::std::fmt::Formatter) -> ::std::fmt::Result {
                write!(f, "0x{:016x}", self.0)
            }
        }

        impl ::std::fmt::LowerHex for $name {
            fn fmt(&self, f: &mut ::std::fmt::Formatter) -> ::std::fmt::Result {
                ::std::fmt::LowerHex::fmt(&self.0, f)
            }
        }

        impl $crate::Address for $name {}
    };
}

pub(crate) use {impl_address, impl_binop};
