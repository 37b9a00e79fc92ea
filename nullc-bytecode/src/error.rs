/// Errors raised while reading, writing, or validating a bytecode image.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum BytecodeError {
    #[error("image is malformed: {0}")]
    Malformed(String),
    #[error("section '{section}' offset {offset} + length {length} exceeds image size {image_size}")]
    SectionOutOfBounds {
        section: &'static str,
        offset: u32,
        length: u32,
        image_size: u32,
    },
    #[error("{table} index {index} is out of bounds (table has {len} entries)")]
    IndexOutOfBounds {
        table: &'static str,
        index: u32,
        len: u32,
    },
    #[error(transparent)]
    Decode(#[from] nullc_asm::DecodeError),
}

impl BytecodeError {
    pub fn malformed(message: impl Into<String>) -> Self {
        BytecodeError::Malformed(message.into())
    }
}
