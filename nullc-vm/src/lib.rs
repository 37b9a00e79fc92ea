//! Stack-machine and register-machine interpreters for linked `nullc`
//! bytecode images: lowering from the value-IR both machines consume, the
//! dispatch loops themselves, the host ABI for native functions, cooperative
//! coroutines, and the in-place function-table override surface.

pub mod cancellation;
pub mod coroutine;
mod error;
pub mod ir;
pub mod lower;
pub mod native;
pub mod override_surface;
pub mod vm;

pub use cancellation::ExecutionLimits;
pub use coroutine::CoroutineTable;
pub use error::{LowerError, RuntimeError, VmError};
pub use native::{NativeBinding, NativeFn, NativeTable};
pub use override_surface::{FunctionTable, OverridePolicy};
pub use vm::register::RegisterVm;
pub use vm::stack::StackVm;
