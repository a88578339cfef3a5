//! Recovery of exported kernel symbols from `__ksymtab`.
//!
//! Every `EXPORT_SYMBOL` adds a record to `__ksymtab` (or `__ksymtab_gpl`)
//! and its name to `__ksymtab_strings`. The linker places the tables below
//! the string pool, optionally separated by the `__kcrctab` checksums when
//! the kernel is built with `CONFIG_MODVERSIONS`:
//!
//! ```text
//! | __ksymtab | __ksymtab_gpl | __kcrctab | __kcrctab_gpl | __ksymtab_strings |
//! ```
//!
//! Recovery finds the string pool around a well-known name, walks down
//! from the pool until two consecutive records point into it, then reads
//! records downward until a name falls outside the pool.

use std::ops::Range;

use indexmap::{IndexMap, map::Entry};
use vmcore_core::{Hex, MappedMemory, Memory, Va, VmcoreError};

use crate::LinuxError;

/// The default string used to find the symbol name pool.
pub const DEFAULT_ANCHOR: &str = "init_task";

/// Record layouts of `struct kernel_symbol`, newest first.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum KernelSymbolLayout {
    /// `{ int value_offset; int name_offset; int namespace_offset; }`
    /// (since 5.4).
    Prel32Namespace,

    /// `{ int value_offset; int name_offset; }` (4.19 to 5.3).
    Prel32,

    /// `{ unsigned long value; const char *name; }` (up to 4.18).
    Absolute,
}

impl KernelSymbolLayout {
    /// Every layout, in the order they are tried.
    pub const ALL: [Self; 3] = [Self::Prel32Namespace, Self::Prel32, Self::Absolute];

    /// Returns the size of one record.
    pub const fn size(self) -> u64 {
        match self {
            Self::Prel32Namespace => 12,
            Self::Prel32 => 8,
            Self::Absolute => 16,
        }
    }

    /// Returns the offset of the name field within a record.
    pub const fn name_offset(self) -> u64 {
        match self {
            Self::Prel32Namespace | Self::Prel32 => 4,
            Self::Absolute => 8,
        }
    }

    /// Resolves the address of the name of the record at `record`.
    pub fn name(self, memory: &Memory<Va>, record: Va) -> Result<Va, VmcoreError> {
        self.resolve(memory, record + self.name_offset())
    }

    /// Resolves the value of the record at `record`.
    pub fn value(self, memory: &Memory<Va>, record: Va) -> Result<Va, VmcoreError> {
        self.resolve(memory, record)
    }

    /// Reads the pointer stored in the field at `field`.
    ///
    /// Relative fields hold a signed 32-bit displacement from the field's
    /// own address.
    fn resolve(self, memory: &Memory<Va>, field: Va) -> Result<Va, VmcoreError> {
        match self {
            Self::Prel32Namespace | Self::Prel32 => {
                let offset = memory.read_i32(field)?;
                field
                    .checked_add_signed(i64::from(offset))
                    .ok_or_else(|| VmcoreError::out_of_bounds(field, memory.start(), memory.end()))
            }
            Self::Absolute => memory.read_u64(field).map(Va),
        }
    }
}

/// The located symbol table.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct KernelSymbolTable {
    /// One past the highest record. Records are read downward from here.
    pub end: Va,

    /// Layout of the records.
    pub layout: KernelSymbolLayout,
}

impl KernelSymbolTable {
    /// Reads the records downward from [`end`](Self::end) until one names a
    /// string outside `pool`.
    ///
    /// On a duplicate name the first record read wins.
    pub fn symbols(&self, memory: &Memory<Va>, pool: &Range<Va>) -> IndexMap<String, Va> {
        let size = self.layout.size();
        let mut symbols = IndexMap::new();
        let mut end = self.end;

        while let Some(record) = end.checked_sub(size).filter(|&record| record >= memory.start()) {
            let Ok(name) = self.layout.name(memory, record)
            else {
                break;
            };

            if !pool.contains(&name) {
                break;
            }

            let (Ok(name), Ok(value)) = (memory.read_cstr(name), self.layout.value(memory, record))
            else {
                break;
            };

            let name = String::from_utf8_lossy(name).into_owned();
            match symbols.entry(name) {
                Entry::Vacant(entry) => {
                    tracing::trace!(name = %entry.key(), %value, "found symbol");
                    entry.insert(value);
                }
                Entry::Occupied(entry) => {
                    tracing::warn!(
                        name = %entry.key(),
                        kept = %entry.get(),
                        ignored = %value,
                        "duplicate symbol"
                    );
                }
            }

            end = record;
        }

        symbols
    }
}

fn is_printable(byte: u8) -> bool {
    (0x21..=0x7e).contains(&byte)
}

fn is_boundary(pair: &[u8]) -> bool {
    !is_printable(pair[0]) && !is_printable(pair[1])
}

/// Finds `__ksymtab_strings`, the pool of symbol names containing
/// `anchor`.
///
/// The pool extends from the match in both directions up to a pair of
/// non-printable bytes. It ends just past the first NUL of the upper pair
/// and its start is rounded up to 4 bytes. A boundary that is never found
/// is clamped to the edge of `memory`.
pub fn find_string_pool(memory: &Memory<Va>, anchor: &[u8]) -> Option<Range<Va>> {
    let hit = memory.find(anchor)?;
    let data = memory.as_slice();
    let index = (hit - memory.start()) as usize;

    let start = data[..index]
        .windows(2)
        .rev()
        .position(is_boundary)
        .map_or(0, |distance| index - distance);

    let end = data[index..]
        .windows(2)
        .position(is_boundary)
        .map_or(data.len(), |distance| index + distance + 1);

    let start = (memory.start() + start as u64).align_up(4)?;
    let end = memory.start() + end as u64;

    tracing::debug!(
        %start,
        %end,
        strings = memory
            .bytes(start..end)
            .map_or(0, |pool| memchr::memchr_iter(0, pool).count()),
        "found symbol string pool"
    );

    Some(start..end)
}

/// Finds the symbol table below `pool`.
///
/// Candidates are tried from the start of the pool downward in 4-byte
/// steps, which skips over `__kcrctab`. A candidate is accepted when the
/// two records below it both name distinct strings in the pool.
pub fn find_symbol_table(memory: &Memory<Va>, pool: &Range<Va>) -> Option<KernelSymbolTable> {
    let mut end = pool.start;

    loop {
        for layout in KernelSymbolLayout::ALL {
            if is_symbol_table_end(memory, pool, end, layout) {
                tracing::debug!(
                    %end,
                    ?layout,
                    gap = %Hex(pool.start - end),
                    "found symbol table"
                );
                return Some(KernelSymbolTable { end, layout });
            }
        }

        end = match end.checked_sub(4) {
            Some(next) if next >= memory.start() => next,
            _ => break,
        };
    }

    tracing::warn!(pool_start = %pool.start, "no symbol table below the string pool");
    None
}

fn is_symbol_table_end(
    memory: &Memory<Va>,
    pool: &Range<Va>,
    end: Va,
    layout: KernelSymbolLayout,
) -> bool {
    let size = layout.size();
    let (Some(upper), Some(lower)) = (end.checked_sub(size), end.checked_sub(2 * size))
    else {
        return false;
    };

    if lower < memory.start() {
        return false;
    }

    match (layout.name(memory, upper), layout.name(memory, lower)) {
        (Ok(upper), Ok(lower)) => pool.contains(&upper) && pool.contains(&lower) && upper != lower,
        _ => false,
    }
}

/// Recovers the symbols whose names lie in `pool`.
///
/// Returns an empty map if no symbol table is found.
pub fn symbols_from_string_pool(memory: &Memory<Va>, pool: &Range<Va>) -> IndexMap<String, Va> {
    match find_symbol_table(memory, pool) {
        Some(table) => table.symbols(memory, pool),
        None => IndexMap::new(),
    }
}

/// Recovers the exported symbols of the kernel image, anchored on
/// `init_task`.
pub fn recover_symbols(kernel: &MappedMemory) -> Result<IndexMap<String, Va>, LinuxError> {
    recover_symbols_with_anchor(kernel, DEFAULT_ANCHOR)
}

/// Recovers the exported symbols of the kernel image, finding the string
/// pool around `anchor`.
pub fn recover_symbols_with_anchor(
    kernel: &MappedMemory,
    anchor: &str,
) -> Result<IndexMap<String, Va>, LinuxError> {
    let memory = kernel.virtual_memory();
    let pool = find_string_pool(&memory, anchor.as_bytes()).ok_or(LinuxError::AnchorNotFound)?;
    let symbols = symbols_from_string_pool(&memory, &pool);

    tracing::debug!(count = symbols.len(), "recovered kernel symbols");
    Ok(symbols)
}

#[cfg(test)]
#[path = "symbols_tests.rs"]
mod tests;
