use crate::Hex;

/// An error that can occur while analyzing a coredump.
#[derive(thiserror::Error, Debug)]
pub enum VmcoreError {
    /// An error occurred in the coredump driver.
    #[error(transparent)]
    Driver(Box<dyn std::error::Error + Send + Sync>),

    /// An OS-specific error occurred.
    #[error(transparent)]
    Os(Box<dyn std::error::Error + Send + Sync>),

    /// An I/O error occurred.
    #[error(transparent)]
    Io(#[from] std::io::Error),

    /// An access fell outside the window it was made against.
    #[error("address {} out of bounds [{}, {})", Hex(*.address), Hex(*.start), Hex(*.end))]
    OutOfBounds {
        /// The offending address.
        address: u64,

        /// First address of the window.
        start: u64,

        /// One past the last address of the window.
        end: u64,
    },

    /// The input does not have the expected structure.
    #[error("malformed input: {0}")]
    MalformedInput(String),

    /// Something expected to exist was not found.
    #[error("{0} not found")]
    NotFound(&'static str),

    /// Other error.
    #[error("{0}")]
    Other(&'static str),
}

impl VmcoreError {
    /// Creates an [`OutOfBounds`](Self::OutOfBounds) error.
    pub fn out_of_bounds(
        address: impl Into<u64>,
        start: impl Into<u64>,
        end: impl Into<u64>,
    ) -> Self {
        Self::OutOfBounds {
            address: address.into(),
            start: start.into(),
            end: end.into(),
        }
    }
}
