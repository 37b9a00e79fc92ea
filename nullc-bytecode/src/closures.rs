use crate::codec::{Reader, Writer};
use crate::error::BytecodeError;

/// One upvalue capture within a closure-lowering close list: the captured
/// local's index in the owning function's locals table, and the slot it
/// occupies in the closure's capture array.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ClosureCapture {
    pub local_index: u32,
    pub capture_slot: u32,
}

pub const CLOSURE_CAPTURE_SIZE: usize = 8;

impl ClosureCapture {
    pub fn encode(&self, w: &mut Writer) {
        w.u32(self.local_index);
        w.u32(self.capture_slot);
    }

    pub fn decode(r: &mut Reader) -> Result<Self, BytecodeError> {
        Ok(ClosureCapture {
            local_index: r.u32()?,
            capture_slot: r.u32()?,
        })
    }
}

/// One entry of the closure-list table: a contiguous slice of
/// [`ClosureCapture`]s produced by the closure-lowering pass for a single
/// nested function, referenced from [`LocalVariable::close_list_id`](crate::variables::LocalVariable).
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ClosureList {
    pub captures_start: u32,
    pub captures_count: u32,
}

pub const CLOSURE_LIST_SIZE: usize = 8;

impl ClosureList {
    pub fn encode(&self, w: &mut Writer) {
        w.u32(self.captures_start);
        w.u32(self.captures_count);
    }

    pub fn decode(r: &mut Reader) -> Result<Self, BytecodeError> {
        Ok(ClosureList {
            captures_start: r.u32()?,
            captures_count: r.u32()?,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn capture_round_trips() {
        let c = ClosureCapture {
            local_index: 3,
            capture_slot: 1,
        };
        let mut w = Writer::new();
        c.encode(&mut w);
        assert_eq!(w.buf.len(), CLOSURE_CAPTURE_SIZE);
        assert_eq!(ClosureCapture::decode(&mut Reader::new(&w.buf)).unwrap(), c);
    }

    #[test]
    fn list_round_trips() {
        let l = ClosureList {
            captures_start: 4,
            captures_count: 2,
        };
        let mut w = Writer::new();
        l.encode(&mut w);
        assert_eq!(w.buf.len(), CLOSURE_LIST_SIZE);
        assert_eq!(ClosureList::decode(&mut Reader::new(&w.buf)).unwrap(), l);
    }
}
