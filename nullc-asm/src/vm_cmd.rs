use crate::error::DecodeError;
use crate::VmOpcode;

/// A single stack-VM instruction.
///
/// `flag` carries the opcode-dependent tag (the argument's primitive type
/// for arithmetic/comparison opcodes, the local-vs-global scope bit for
/// loads, or the "local return" bit that distinguishes a coroutine `yield`
/// from an ordinary `return`). `short_arg` carries a byte count (load/store
/// size, `pushvtop` argument-byte count). `int_arg` carries the absolute
/// operand: a scoped container offset, a branch target, a function index,
/// or a frame byte count, depending on the opcode.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct VMCmd {
    pub opcode: VmOpcode,
    pub flag: u8,
    pub short_arg: u16,
    pub int_arg: i32,
}

/// Byte size of a single encoded `VMCmd` in the instruction stream; the
/// container format requires every section to be 4-byte packed, and this
/// encoding (1 + 1 + 2 + 4) already satisfies that with no padding.
pub const VM_CMD_SIZE: usize = 8;

impl VMCmd {
    pub const fn new(opcode: VmOpcode, flag: u8, short_arg: u16, int_arg: i32) -> Self {
        VMCmd {
            opcode,
            flag,
            short_arg,
            int_arg,
        }
    }

    pub const fn simple(opcode: VmOpcode) -> Self {
        VMCmd::new(opcode, 0, 0, 0)
    }

    /// Encodes this instruction as 8 little-endian bytes.
    pub fn encode(self) -> [u8; VM_CMD_SIZE] {
        let mut bytes = [0u8; VM_CMD_SIZE];
        bytes[0] = self.opcode as u8;
        bytes[1] = self.flag;
        bytes[2..4].copy_from_slice(&self.short_arg.to_le_bytes());
        bytes[4..8].copy_from_slice(&self.int_arg.to_le_bytes());
        bytes
    }

    /// Decodes a single instruction from an exactly-sized byte slice.
    pub fn decode(bytes: &[u8]) -> Result<Self, DecodeError> {
        if bytes.len() != VM_CMD_SIZE {
            return Err(DecodeError::WrongLength {
                expected: VM_CMD_SIZE,
                actual: bytes.len(),
            });
        }
        let opcode = opcode_from_u8(bytes[0])?;
        let flag = bytes[1];
        let short_arg = u16::from_le_bytes([bytes[2], bytes[3]]);
        let int_arg = i32::from_le_bytes([bytes[4], bytes[5], bytes[6], bytes[7]]);
        Ok(VMCmd {
            opcode,
            flag,
            short_arg,
            int_arg,
        })
    }
}

fn opcode_from_u8(tag: u8) -> Result<VmOpcode, DecodeError> {
    use strum::IntoEnumIterator;
    VmOpcode::iter()
        .find(|op| *op as u8 == tag)
        .ok_or(DecodeError::InvalidOpcode(tag))
}
