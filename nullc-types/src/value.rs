/// A register or stack slot value; the machine word size used by both VMs
/// for integer arithmetic and addresses.
pub type Word = i64;

/// A register number within a register-VM frame's 256-entry file.
pub type RegisterId = u8;

/// Runtime representation of a function-pointer value: a stable function
/// index plus an optional captured context pointer.
///
/// The context type (if any) is recorded on the function's entry in the
/// bytecode container, not here; this is purely the runtime payload that
/// flows through registers, stack slots, and host callbacks.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct FunctionPointer {
    pub function_index: u32,
    pub context_pointer: Option<u64>,
}

impl FunctionPointer {
    pub const fn new(function_index: u32) -> Self {
        FunctionPointer {
            function_index,
            context_pointer: None,
        }
    }

    pub const fn with_context(function_index: u32, context_pointer: u64) -> Self {
        FunctionPointer {
            function_index,
            context_pointer: Some(context_pointer),
        }
    }

    pub const fn is_null_context(self) -> bool {
        self.context_pointer.is_none()
    }
}
