/// Displays an integer as zero-padded hexadecimal, sized to its type.
///
/// Mostly used for structured log fields.
///
/// # Examples
///
/// ```
/// # use vmcore_core::Hex;
/// assert_eq!(format!("{}", Hex(42u16)), "0x002a");
/// assert_eq!(format!("{}", Hex(0x46e62b7fu32)), "0x46e62b7f");
/// ```
#[derive(Clone, Copy)]
pub struct Hex<T>(pub T);

fn write_padded<T>(f: &mut std::fmt::Formatter, value: T) -> std::fmt::Result
where
    T: std::fmt::LowerHex,
{
    let width = 2 * size_of::<T>();
    write!(f, "0x{value:0width$x}")
}

macro_rules! impl_hex {
    ($($type:ty),*) => {
        $(
            impl std::fmt::Display for Hex<$type> {
                fn fmt(&self, f: &mut std::fmt::Formatter) -> std::fmt::Result {
                    write_padded(f, self.0)
                }
            }

            impl std::fmt::Debug for Hex<$type> {
                fn fmt(&self, f: &mut std::fmt::Formatter) -> std::fmt::Result {
                    write_padded(f, self.0)
                }
            }
        )*
    };
}

impl_hex!(u8, u16, u32, u64, usize, i32, i64);
