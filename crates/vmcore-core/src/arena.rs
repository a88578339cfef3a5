use std::{ops::Deref, sync::Arc};

/// Shared, immutable backing bytes of one or more memory windows.
///
/// An arena is typically a memory-mapped file region, but anything that
/// dereferences to a byte slice works. Cloning is cheap and never copies
/// the bytes.
#[derive(Clone)]
pub struct Arena(Arc<dyn Deref<Target = [u8]> + Send + Sync>);

impl Arena {
    /// Creates a new arena over `inner`.
    pub fn new<T>(inner: T) -> Self
    where
        T: Deref<Target = [u8]> + Send + Sync + 'static,
    {
        Self(Arc::new(inner))
    }

    /// Creates an arena holding no bytes.
    pub fn empty() -> Self {
        Self::new(Vec::new())
    }
}

impl Deref for Arena {
    type Target = [u8];

    fn deref(&self) -> &Self::Target {
        &self.0
    }
}

impl AsRef<[u8]> for Arena {
    fn as_ref(&self) -> &[u8] {
        self.deref()
    }
}

impl std::fmt::Debug for Arena {
    fn fmt(&self, f: &mut std::fmt::Formatter) -> std::fmt::Result {
        f.debug_struct("Arena").field("len", &self.len()).finish()
    }
}
