//! Value layout and the primitive vocabulary shared by the bytecode
//! container, the linker, and both virtual machines.
//!
//! This crate has no notion of instructions or modules; it only describes
//! how language values occupy memory, so that the container format, the
//! linker, and the two execution engines agree on byte sizes and alignment
//! without depending on each other.

mod error;
mod layout;
mod primitive;
mod value;

pub use error::LayoutError;
pub use layout::{align_up, Alignment, PointerWidth, StructLayout, TypeFlags, UnsizedArrayLayout};
pub use primitive::{PrimitiveCategory, StructuralCategory};
pub use value::{FunctionPointer, RegisterId, Word};

/// A module index as it appears packed into a cross-module global operand.
///
/// The top 8 bits of a global variable operand carry the defining module;
/// zero denotes the current image (see [`pack_global_operand`]).
pub type ModuleIndex = u32;

/// Number of bits reserved for the module tag in a packed global operand.
pub const MODULE_TAG_SHIFT: u32 = 24;

/// Mask selecting the in-module offset portion of a packed global operand.
pub const MODULE_OFFSET_MASK: u32 = (1 << MODULE_TAG_SHIFT) - 1;

/// Packs a module index and an in-module byte offset into the single
/// operand a `load`/`store` instruction carries for a global variable.
///
/// `(module_index << 24) | offset_within_module`, per the cross-module
/// addressing scheme: the top 8 bits carry the defining module of a global
/// reference, zero denotes the current image.
pub fn pack_global_operand(module_index: ModuleIndex, offset_within_module: u32) -> u32 {
    debug_assert!(
        offset_within_module <= MODULE_OFFSET_MASK,
        "global offset does not fit in 24 bits"
    );
    (module_index << MODULE_TAG_SHIFT) | (offset_within_module & MODULE_OFFSET_MASK)
}

/// Splits a packed global operand back into its module index and
/// in-module offset.
pub fn unpack_global_operand(operand: u32) -> (ModuleIndex, u32) {
    (operand >> MODULE_TAG_SHIFT, operand & MODULE_OFFSET_MASK)
}
