/// Errors raised while describing or validating a value's memory layout.
#[derive(Debug, Clone, Copy, PartialEq, Eq, thiserror::Error)]
pub enum LayoutError {
    #[error("alignment {0} is not a power of two")]
    InvalidAlignment(u32),
    #[error("struct size {0} is not a multiple of the {} byte pack unit", crate::StructLayout::PACK_UNIT)]
    UnpackedStructSize(u32),
}
