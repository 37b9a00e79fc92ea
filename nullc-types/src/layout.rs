use crate::error::LayoutError;

bitflags::bitflags! {
    /// Flags carried on a type entry, per the bytecode container's `TypeFlags`.
    #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
    #[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
    pub struct TypeFlags: u8 {
        const HAS_FINALIZER       = 1 << 0;
        const DEPENDS_ON_GENERIC  = 1 << 1;
        const IS_EXTENDABLE       = 1 << 2;
        const INTERNAL            = 1 << 3;
    }
}

/// Width of a pointer-shaped value in the target image, as recorded on the
/// container header.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub enum PointerWidth {
    Bits32,
    Bits64,
}

impl PointerWidth {
    pub const fn byte_size(self) -> u32 {
        match self {
            PointerWidth::Bits32 => 4,
            PointerWidth::Bits64 => 8,
        }
    }
}

/// Natural alignment of a type, stored log2-encoded on disk (`1 << value`)
/// but handled as a plain byte count everywhere else.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct Alignment(u8);

impl Alignment {
    pub const ONE: Alignment = Alignment(1);

    pub fn new(byte_alignment: u32) -> Result<Self, LayoutError> {
        if byte_alignment == 0 || !byte_alignment.is_power_of_two() {
            return Err(LayoutError::InvalidAlignment(byte_alignment));
        }
        Ok(Alignment(byte_alignment.trailing_zeros() as u8))
    }

    pub const fn from_log2(log2: u8) -> Self {
        Alignment(log2)
    }

    pub const fn log2(self) -> u8 {
        self.0
    }

    pub const fn bytes(self) -> u32 {
        1u32 << self.0
    }
}

/// Rounds `size` up to a multiple of `alignment` bytes (must be a power of two).
pub const fn align_up(size: u32, alignment: u32) -> u32 {
    let mask = alignment - 1;
    (size + mask) & !mask
}

/// Layout helper for struct (class) values, which the bytecode format
/// requires to be packed to 4-byte multiples: struct push/pop is only
/// defined on sizes that are a multiple of 4.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct StructLayout {
    byte_size: u32,
}

impl StructLayout {
    pub const PACK_UNIT: u32 = 4;

    pub fn new(byte_size: u32) -> Result<Self, LayoutError> {
        if byte_size % Self::PACK_UNIT != 0 {
            return Err(LayoutError::UnpackedStructSize(byte_size));
        }
        Ok(StructLayout { byte_size })
    }

    pub const fn byte_size(self) -> u32 {
        self.byte_size
    }

    /// Number of 4-byte pushes a stack-VM struct push/pop emits; a
    /// size-zero struct still emits exactly one (zero) push.
    pub const fn push_unit_count(self) -> u32 {
        if self.byte_size == 0 {
            1
        } else {
            self.byte_size / Self::PACK_UNIT
        }
    }
}

/// Layout of an unsized array value: a pointer and a 32-bit length,
/// independent of pointer width.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct UnsizedArrayLayout {
    pointer_width: PointerWidth,
}

impl UnsizedArrayLayout {
    pub const LENGTH_FIELD_SIZE: u32 = 4;

    pub const fn new(pointer_width: PointerWidth) -> Self {
        UnsizedArrayLayout { pointer_width }
    }

    pub const fn byte_size(self) -> u32 {
        self.pointer_width.byte_size() + Self::LENGTH_FIELD_SIZE
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn alignment_round_trips_through_log2() {
        let a = Alignment::new(16).unwrap();
        assert_eq!(a.log2(), 4);
        assert_eq!(a.bytes(), 16);
    }

    #[test]
    fn non_power_of_two_alignment_is_rejected() {
        assert!(matches!(
            Alignment::new(3),
            Err(LayoutError::InvalidAlignment(3))
        ));
    }

    #[test]
    fn struct_layout_rejects_unpacked_sizes() {
        assert!(StructLayout::new(5).is_err());
        assert!(StructLayout::new(8).is_ok());
    }

    #[test]
    fn zero_size_struct_still_emits_one_push_unit() {
        let layout = StructLayout::new(0).unwrap();
        assert_eq!(layout.push_unit_count(), 1);
    }

    #[test]
    fn struct_push_count_matches_four_byte_multiples() {
        let layout = StructLayout::new(12).unwrap();
        assert_eq!(layout.push_unit_count(), 3);
    }

    #[test]
    fn align_up_rounds_frame_sizes_to_sixteen() {
        assert_eq!(align_up(0, 16), 0);
        assert_eq!(align_up(1, 16), 16);
        assert_eq!(align_up(16, 16), 16);
        assert_eq!(align_up(17, 16), 32);
    }

    #[test]
    fn unsized_array_layout_is_pointer_plus_length() {
        assert_eq!(UnsizedArrayLayout::new(PointerWidth::Bits32).byte_size(), 8);
        assert_eq!(UnsizedArrayLayout::new(PointerWidth::Bits64).byte_size(), 12);
    }
}
