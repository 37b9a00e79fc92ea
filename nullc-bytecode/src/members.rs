use crate::codec::{Reader, Writer};
use crate::error::BytecodeError;

/// One entry of the flat, shared member table; a class type owns a
/// contiguous slice of it starting at `TypeEntry::subtype_or_member_start`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct TypeMember {
    pub type_index: u32,
    pub byte_offset: u32,
}

pub const TYPE_MEMBER_SIZE: usize = 8;

impl TypeMember {
    pub fn encode(&self, w: &mut Writer) {
        w.u32(self.type_index);
        w.u32(self.byte_offset);
    }

    pub fn decode(r: &mut Reader) -> Result<Self, BytecodeError> {
        Ok(TypeMember {
            type_index: r.u32()?,
            byte_offset: r.u32()?,
        })
    }
}

/// One entry of the flat compile-time class constant table.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct TypeConstant {
    pub type_index: u32,
    pub value: u64,
}

pub const TYPE_CONSTANT_SIZE: usize = 12;

impl TypeConstant {
    pub fn encode(&self, w: &mut Writer) {
        w.u32(self.type_index);
        w.u64(self.value);
    }

    pub fn decode(r: &mut Reader) -> Result<Self, BytecodeError> {
        Ok(TypeConstant {
            type_index: r.u32()?,
            value: r.u64()?,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn member_round_trips() {
        let m = TypeMember {
            type_index: 2,
            byte_offset: 8,
        };
        let mut w = Writer::new();
        m.encode(&mut w);
        assert_eq!(w.buf.len(), TYPE_MEMBER_SIZE);
        assert_eq!(TypeMember::decode(&mut Reader::new(&w.buf)).unwrap(), m);
    }

    #[test]
    fn constant_round_trips() {
        let c = TypeConstant {
            type_index: 1,
            value: 0x1122_3344_5566_7788,
        };
        let mut w = Writer::new();
        c.encode(&mut w);
        assert_eq!(w.buf.len(), TYPE_CONSTANT_SIZE);
        assert_eq!(TypeConstant::decode(&mut Reader::new(&w.buf)).unwrap(), c);
    }
}
