/// Errors raised while lowering a value-IR function into an instruction
/// stream, for either VM target.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum LowerError {
    #[error("block {0} branches to an undefined target block {1}")]
    UnresolvedBranchTarget(u32, u32),
    #[error("register file exhausted after {0} allocations (file size is {1})")]
    RegisterFileExhausted(u32, u32),
    #[error("function has no terminating return in block {0}")]
    MissingTerminator(u32),
}

/// A well-formed instruction's failure: the VM was correctly dispatching
/// but the operation itself cannot proceed (out-of-bounds index, division
/// by zero, a failed pointer cast). Recoverable at a call boundary the
/// host has wired a handler for; unwinds the call stack popping frames
/// until one does.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum RuntimeError {
    #[error("array index {index} out of bounds for size {size}")]
    ArrayOutOfBounds { index: i64, size: u32 },
    #[error("invalid pointer cast to type {target_type}")]
    InvalidPointerCast { target_type: u32 },
    #[error("null pointer dereference")]
    NullPointerDereference,
    #[error("division by zero")]
    DivisionByZero,
    #[error("native ABI mismatch: {0}")]
    NativeAbiMismatch(String),
    #[error("invalid operand: {0}")]
    InvalidOperand(String),
}

/// An interpreter-level halt: the VM itself cannot continue, independent
/// of any particular instruction's semantics. Always unwinds to the
/// outermost frame.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum VmError {
    #[error(transparent)]
    Runtime(#[from] RuntimeError),
    #[error("call stack overflow")]
    StackOverflow,
    #[error("execution cancelled")]
    ExecutionCancelled,
    #[error("execution exceeded its instruction budget")]
    ExecutionTimeout,
    #[error(transparent)]
    Bytecode(#[from] nullc_bytecode::BytecodeError),
}
