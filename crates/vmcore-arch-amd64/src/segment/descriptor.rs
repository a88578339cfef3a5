use super::{SegmentAccess, Selector};

/// The hidden part of a segment register: a cached copy of the descriptor
/// the processor loaded when the selector was written.
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq)]
pub struct SegmentDescriptor {
    /// Linear address of byte 0 of the segment.
    pub base: u64,

    /// Segment limit, already scaled by the granularity flag.
    pub limit: u32,

    /// The visible selector.
    pub selector: Selector,

    /// The access rights of the segment.
    pub access: SegmentAccess,
}
