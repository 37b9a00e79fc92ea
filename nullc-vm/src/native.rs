//! The host ABI: native functions the embedding application registers
//! before linking, observed by the VM as `(type_index, pointer)` operand
//! pairs and invoked through the platform calling convention via a boxed
//! trampoline rather than raw function pointers, since Rust has no stable
//! ABI to marshal arguments through otherwise.

use std::sync::Arc;

use crate::error::RuntimeError;

/// Raw argument/return bytes a native function exchanges with a VM,
/// already marshalled off the operand stack or register file by the
/// caller; the trampoline only interprets widths it was registered with.
pub type NativeArgs<'a> = &'a [u8];

pub type NativeFn = Arc<dyn Fn(NativeArgs) -> Result<Vec<u8>, RuntimeError> + Send + Sync>;

/// One registered native function: the host-supplied trampoline plus the
/// `native_arg_bytes` width both VMs need to know how many bytes to pop
/// after a native call.
#[derive(Clone)]
pub struct NativeBinding {
    pub function_index: u32,
    pub arg_bytes: u16,
    pub trampoline: NativeFn,
}

impl std::fmt::Debug for NativeBinding {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("NativeBinding")
            .field("function_index", &self.function_index)
            .field("arg_bytes", &self.arg_bytes)
            .finish_non_exhaustive()
    }
}

/// The host's registered native functions, indexed by function table
/// position. Empty slots mean "bytecode-only function"; the bytecode
/// container's own convention (a zero native pointer) is what this table
/// replaces with an `Option`, since Rust has no "null function pointer"
/// that is also callable.
#[derive(Debug, Clone, Default)]
pub struct NativeTable {
    bindings: Vec<Option<NativeBinding>>,
}

impl NativeTable {
    pub fn with_capacity(function_count: usize) -> Self {
        NativeTable {
            bindings: vec![None; function_count],
        }
    }

    pub fn register(&mut self, binding: NativeBinding) {
        let index = binding.function_index as usize;
        if index >= self.bindings.len() {
            self.bindings.resize(index + 1, None);
        }
        self.bindings[index] = Some(binding);
    }

    pub fn get(&self, function_index: u32) -> Option<&NativeBinding> {
        self.bindings.get(function_index as usize).and_then(|b| b.as_ref())
    }

    pub fn is_native(&self, function_index: u32) -> bool {
        self.get(function_index).is_some()
    }
}
