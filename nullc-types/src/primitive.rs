/// Primitive category tag carried on every [`crate::StructLayout`]-less
/// scalar type entry.
///
/// Mirrors the original bytecode format's `TypeCategory`, widened with
/// `Complex` for struct-shaped values that don't reduce to one of the
/// scalar categories.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, strum::EnumIter)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
#[repr(u8)]
pub enum PrimitiveCategory {
    Void = 0,
    Int = 1,
    Float = 2,
    Long = 3,
    Double = 4,
    Short = 5,
    Char = 6,
    Complex = 7,
}

impl PrimitiveCategory {
    /// Natural byte size of the category, or `0` for `Void`/`Complex`
    /// (whose size is carried on the owning type entry instead).
    pub const fn byte_size(self) -> u32 {
        match self {
            PrimitiveCategory::Void => 0,
            PrimitiveCategory::Char => 1,
            PrimitiveCategory::Short => 2,
            PrimitiveCategory::Int | PrimitiveCategory::Float => 4,
            PrimitiveCategory::Long | PrimitiveCategory::Double => 8,
            PrimitiveCategory::Complex => 0,
        }
    }

    /// Whether this category is a floating-point representation.
    pub const fn is_float(self) -> bool {
        matches!(self, PrimitiveCategory::Float | PrimitiveCategory::Double)
    }

    /// Whether a 64-bit value is passed as two 32-bit halves on the stack
    /// VM (true for every 8-byte primitive).
    pub const fn is_wide(self) -> bool {
        self.byte_size() == 8
    }

    pub fn from_u8(tag: u8) -> Option<Self> {
        Some(match tag {
            0 => Self::Void,
            1 => Self::Int,
            2 => Self::Float,
            3 => Self::Long,
            4 => Self::Double,
            5 => Self::Short,
            6 => Self::Char,
            7 => Self::Complex,
            _ => return None,
        })
    }
}

/// Structural category of a type: whether it is a bare primitive or one of
/// the composite shapes that carry a subtype or a member slice.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, strum::EnumIter)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
#[repr(u8)]
pub enum StructuralCategory {
    None = 0,
    Array = 1,
    Pointer = 2,
    Function = 3,
    Class = 4,
}

impl StructuralCategory {
    /// Array and pointer and function types all carry a subtype index;
    /// only classes carry a member-table starting offset instead.
    pub const fn has_subtype(self) -> bool {
        matches!(
            self,
            StructuralCategory::Array | StructuralCategory::Pointer | StructuralCategory::Function
        )
    }

    pub fn from_u8(tag: u8) -> Option<Self> {
        Some(match tag {
            0 => Self::None,
            1 => Self::Array,
            2 => Self::Pointer,
            3 => Self::Function,
            4 => Self::Class,
            _ => return None,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn byte_sizes_match_primitive_widths() {
        assert_eq!(PrimitiveCategory::Char.byte_size(), 1);
        assert_eq!(PrimitiveCategory::Short.byte_size(), 2);
        assert_eq!(PrimitiveCategory::Int.byte_size(), 4);
        assert_eq!(PrimitiveCategory::Float.byte_size(), 4);
        assert_eq!(PrimitiveCategory::Long.byte_size(), 8);
        assert_eq!(PrimitiveCategory::Double.byte_size(), 8);
    }

    #[test]
    fn wide_values_are_exactly_the_eight_byte_primitives() {
        assert!(PrimitiveCategory::Long.is_wide());
        assert!(PrimitiveCategory::Double.is_wide());
        assert!(!PrimitiveCategory::Int.is_wide());
        assert!(!PrimitiveCategory::Float.is_wide());
    }

    #[test]
    fn subtype_presence_matches_structural_shape() {
        assert!(StructuralCategory::Array.has_subtype());
        assert!(StructuralCategory::Pointer.has_subtype());
        assert!(StructuralCategory::Function.has_subtype());
        assert!(!StructuralCategory::Class.has_subtype());
        assert!(!StructuralCategory::None.has_subtype());
    }
}
