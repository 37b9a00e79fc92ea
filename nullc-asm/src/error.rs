/// Errors raised while decoding a raw instruction stream into `VMCmd`s or
/// `RegVmCmd`s.
#[derive(Debug, Clone, Copy, PartialEq, Eq, thiserror::Error)]
pub enum DecodeError {
    #[error("opcode byte {0:#04x} does not name a known instruction")]
    InvalidOpcode(u8),
    #[error("expected a {expected}-byte instruction, got {actual}")]
    WrongLength { expected: usize, actual: usize },
}
