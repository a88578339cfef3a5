mod descriptor;
pub use self::descriptor::SegmentDescriptor;

mod selector;
pub use self::selector::{DescriptorTable, Selector};

/// Determines the type of segment descriptor.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DescriptorType {
    /// The descriptor is for a system segment.
    System,

    /// The descriptor is for a code or data segment.
    CodeOrData,
}

/// Determines the scaling of the segment limit field.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Granularity {
    /// The segment limit is interpreted in byte units.
    Byte,

    /// The segment limit is interpreted in 4-KByte units.
    Page4K,
}

/// The access rights of a cached segment descriptor.
///
/// Bit layout:
///
/// | bits | field                      |
/// |------|----------------------------|
/// | 0-3  | type                       |
/// | 4    | S (code or data)           |
/// | 5-6  | DPL                        |
/// | 7    | P (present)                |
/// | 8    | AVL                        |
/// | 9    | L (64-bit code)            |
/// | 10   | D/B (default operand size) |
/// | 11   | G (granularity)            |
/// | 16   | unusable                   |
#[derive(Default, Clone, Copy, PartialEq, Eq)]
pub struct SegmentAccess(pub u32);

impl SegmentAccess {
    /// Returns the segment or gate type.
    pub fn typ(self) -> u8 {
        (self.0 & 0b1111) as _
    }

    /// Returns whether the descriptor describes a system segment or a code
    /// or data segment.
    pub fn descriptor_type(self) -> DescriptorType {
        if (self.0 >> 4) & 1 == 0 {
            DescriptorType::System
        }
        else {
            DescriptorType::CodeOrData
        }
    }

    /// Returns the descriptor privilege level.
    pub fn descriptor_privilege_level(self) -> u8 {
        ((self.0 >> 5) & 0b11) as _
    }

    /// Checks if the segment is present.
    pub fn present(self) -> bool {
        (self.0 >> 7) & 1 != 0
    }

    /// Checks if the bit available to system software is set.
    pub fn available_bit(self) -> bool {
        (self.0 >> 8) & 1 != 0
    }

    /// Checks if a code segment contains native 64-bit code.
    pub fn long_mode(self) -> bool {
        (self.0 >> 9) & 1 != 0
    }

    /// Checks if the D/B flag is set (32-bit default operand size).
    pub fn default_big(self) -> bool {
        (self.0 >> 10) & 1 != 0
    }

    /// Returns the scaling of the segment limit.
    pub fn granularity(self) -> Granularity {
        if (self.0 >> 11) & 1 == 0 {
            Granularity::Byte
        }
        else {
            Granularity::Page4K
        }
    }

    /// Checks if the hypervisor marked the segment register unusable.
    pub fn unusable(self) -> bool {
        (self.0 >> 16) & 1 != 0
    }
}

impl From<u32> for SegmentAccess {
    fn from(value: u32) -> Self {
        Self(value)
    }
}

impl From<SegmentAccess> for u32 {
    fn from(value: SegmentAccess) -> Self {
        value.0
    }
}

impl std::fmt::Debug for SegmentAccess {
    fn fmt(&self, f: &mut std::fmt::Formatter) -> std::fmt::Result {
        f.debug_struct("SegmentAccess")
            .field("type", &self.typ())
            .field("descriptor_type", &self.descriptor_type())
            .field(
                "descriptor_privilege_level",
                &self.descriptor_privilege_level(),
            )
            .field("present", &self.present())
            .field("available_bit", &self.available_bit())
            .field("long_mode", &self.long_mode())
            .field("default_big", &self.default_big())
            .field("granularity", &self.granularity())
            .field("unusable", &self.unusable())
            .finish()
    }
}
