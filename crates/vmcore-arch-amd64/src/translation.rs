use smallvec::SmallVec;

use super::{PageTableEntry, PageTableLevel};
use crate::Pa;

/// One paging-structure entry visited while translating a single virtual
/// address.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct TranslationEntry {
    /// The level of the table holding the entry.
    pub level: PageTableLevel,

    /// The raw entry.
    pub entry: PageTableEntry,

    /// The physical address of the entry itself.
    pub entry_address: Pa,
}

impl TranslationEntry {
    /// Checks if the entry terminates the walk with a mapped page.
    pub fn is_leaf(&self) -> bool {
        self.entry.present() && (self.level == PageTableLevel::Pt || self.entry.large())
    }
}

/// Entries visited by one translation, root first.
pub type TranslationEntries = SmallVec<[TranslationEntry; 4]>;

/// The outcome of translating one virtual address.
///
/// The entries are kept even when the translation fails, so a caller can
/// see at which level the walk stopped.
#[derive(Debug)]
pub struct VaTranslation {
    pub(crate) entries: TranslationEntries,
    pub(crate) pa: Option<Pa>,
}

impl VaTranslation {
    /// Returns the entries visited, root first.
    pub fn entries(&self) -> &[TranslationEntry] {
        &self.entries
    }

    /// Consumes the translation and returns the visited entries.
    pub fn into_entries(self) -> TranslationEntries {
        self.entries
    }

    /// Returns the translated physical address, if the walk reached a leaf.
    pub fn pa(&self) -> Option<Pa> {
        self.pa
    }

    /// Returns the leaf entry that mapped the address.
    pub fn leaf(&self) -> Option<&TranslationEntry> {
        self.entries.last().filter(|entry| entry.is_leaf())
    }

    /// Checks if every visited entry is present.
    pub fn present(&self) -> bool {
        self.entries.iter().all(|entry| entry.entry.present())
    }

    /// Checks if every visited entry allows writes.
    pub fn write(&self) -> bool {
        self.entries.iter().all(|entry| entry.entry.write())
    }

    /// Checks if every visited entry allows user-mode access.
    pub fn user(&self) -> bool {
        self.entries.iter().all(|entry| entry.entry.user())
    }
}

impl IntoIterator for VaTranslation {
    type Item = TranslationEntry;
    type IntoIter = <TranslationEntries as IntoIterator>::IntoIter;

    fn into_iter(self) -> Self::IntoIter {
        self.entries.into_iter()
    }
}
