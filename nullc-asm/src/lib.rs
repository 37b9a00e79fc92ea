//! Instruction encoding for the nullc-vm bytecode pipeline: the stack-VM
//! `VMCmd` stream and the register-VM `RegVmCmd` stream, plus the panic
//! taxonomy both virtual machines share.
//!
//! This crate knows nothing about modules, linking, or execution; it is the
//! instruction vocabulary and its byte encoding, the same role `fuel-asm`
//! plays for the FuelVM.

mod error;
mod panic_reason;
mod reg_cmd;
mod reg_opcode;
mod vm_cmd;
mod vm_opcode;

pub use error::DecodeError;
pub use panic_reason::PanicReason;
pub use reg_cmd::{RegVmCmd, REG_VM_CMD_SIZE};
pub use reg_opcode::{
    RegVmOpcode, RegVmReturnType, RegVmWidth, REG_FILE_SIZE, REG_FRAME, REG_GLOBALS,
    REG_RESERVED_COUNT,
};
pub use vm_cmd::{VMCmd, VM_CMD_SIZE};
pub use vm_opcode::VmOpcode;
