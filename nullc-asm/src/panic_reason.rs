use core::fmt;

/// Runtime panic taxonomy shared by both virtual machines: the same
/// program produces the same panic reason regardless of which VM ran it.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, strum::EnumIter)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
#[repr(u8)]
pub enum PanicReason {
    /// Indexing an array with `i` where `!(0 <= i < size)`.
    ArrayOutOfBounds = 0x01,
    /// `convert_ptr(v, T)` where `v`'s dynamic type is neither `T` nor a
    /// type derived from `T`.
    InvalidPointerCast = 0x02,
    /// Dereference of a null pointer value.
    NullPointerDereference = 0x03,
    /// Integer division or modulo by zero.
    DivisionByZero = 0x04,
    /// The call stack exceeded its configured depth.
    StackOverflow = 0x05,
    /// The host requested termination and a back-edge jump or call
    /// observed the cancellation flag.
    ExecutionCancelled = 0x06,
    /// The configured maximum instruction count was exceeded.
    ExecutionTimeout = 0x07,
    /// A native function call's argument/return marshalling did not match
    /// the function table entry's declared signature.
    NativeAbiMismatch = 0x08,
    /// An override attempted to change a function table entry's
    /// bytecode/native classification.
    OverrideClassificationMismatch = 0x09,
    /// An ALU operation received an operand it isn't defined for, such as
    /// a negative exponent on an integer power.
    InvalidOperand = 0x0a,
}

impl fmt::Display for PanicReason {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let text = match self {
            PanicReason::ArrayOutOfBounds => "array index out of bounds",
            PanicReason::InvalidPointerCast => "invalid pointer cast",
            PanicReason::NullPointerDereference => "null pointer dereference",
            PanicReason::DivisionByZero => "division by zero",
            PanicReason::StackOverflow => "stack overflow",
            PanicReason::ExecutionCancelled => "execution cancelled",
            PanicReason::ExecutionTimeout => "execution timeout",
            PanicReason::NativeAbiMismatch => "native ABI mismatch",
            PanicReason::OverrideClassificationMismatch => "override classification mismatch",
            PanicReason::InvalidOperand => "invalid operand",
        };
        f.write_str(text)
    }
}
