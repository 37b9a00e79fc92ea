use crate::error::DecodeError;
use crate::RegVmOpcode;

/// A single register-VM instruction: `opcode rA, rB, rC, argument`.
///
/// Not every opcode uses all four operand slots; e.g. `load_*` uses `rA`
/// as the base register and `rB` as the destination, with `argument` as
/// the immediate displacement, while three-address ALU ops use `rA`/`rB`/`rC`
/// and leave `argument` zero.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct RegVmCmd {
    pub opcode: RegVmOpcode,
    pub ra: u8,
    pub rb: u8,
    pub rc: u8,
    pub argument: i32,
}

/// Byte size of a single encoded `RegVmCmd`: 1 + 1 + 1 + 1 + 4, already a
/// multiple of 4.
pub const REG_VM_CMD_SIZE: usize = 8;

impl RegVmCmd {
    pub const fn new(opcode: RegVmOpcode, ra: u8, rb: u8, rc: u8, argument: i32) -> Self {
        RegVmCmd {
            opcode,
            ra,
            rb,
            rc,
            argument,
        }
    }

    pub const fn simple(opcode: RegVmOpcode) -> Self {
        RegVmCmd::new(opcode, 0, 0, 0, 0)
    }

    pub fn encode(self) -> [u8; REG_VM_CMD_SIZE] {
        let mut bytes = [0u8; REG_VM_CMD_SIZE];
        bytes[0] = self.opcode as u8;
        bytes[1] = self.ra;
        bytes[2] = self.rb;
        bytes[3] = self.rc;
        bytes[4..8].copy_from_slice(&self.argument.to_le_bytes());
        bytes
    }

    pub fn decode(bytes: &[u8]) -> Result<Self, DecodeError> {
        if bytes.len() != REG_VM_CMD_SIZE {
            return Err(DecodeError::WrongLength {
                expected: REG_VM_CMD_SIZE,
                actual: bytes.len(),
            });
        }
        let opcode = reg_opcode_from_u8(bytes[0])?;
        let argument = i32::from_le_bytes([bytes[4], bytes[5], bytes[6], bytes[7]]);
        Ok(RegVmCmd {
            opcode,
            ra: bytes[1],
            rb: bytes[2],
            rc: bytes[3],
            argument,
        })
    }
}

fn reg_opcode_from_u8(tag: u8) -> Result<RegVmOpcode, DecodeError> {
    use strum::IntoEnumIterator;
    RegVmOpcode::iter()
        .find(|op| *op as u8 == tag)
        .ok_or(DecodeError::InvalidOpcode(tag))
}
