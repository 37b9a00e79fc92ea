use crate::codec::{Reader, Writer};
use crate::error::BytecodeError;

/// A named alias for a type, retained so diagnostics and the linker's
/// namespace merge can resolve `using`-style aliases without re-deriving
/// them from the type table.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Typedef {
    pub name_offset: u32,
    pub name_hash: u32,
    pub target_type_index: u32,
    pub namespace_index: u32,
}

pub const TYPEDEF_SIZE: usize = 16;

impl Typedef {
    pub fn encode(&self, w: &mut Writer) {
        w.u32(self.name_offset);
        w.u32(self.name_hash);
        w.u32(self.target_type_index);
        w.u32(self.namespace_index);
    }

    pub fn decode(r: &mut Reader) -> Result<Self, BytecodeError> {
        Ok(Typedef {
            name_offset: r.u32()?,
            name_hash: r.u32()?,
            target_type_index: r.u32()?,
            namespace_index: r.u32()?,
        })
    }
}

/// One entry of the namespace table, forming a tree via `parent_index`.
/// The root namespace is its own parent.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Namespace {
    pub name_offset: u32,
    pub name_hash: u32,
    pub parent_index: u32,
}

pub const NAMESPACE_SIZE: usize = 12;

impl Namespace {
    pub fn encode(&self, w: &mut Writer) {
        w.u32(self.name_offset);
        w.u32(self.name_hash);
        w.u32(self.parent_index);
    }

    pub fn decode(r: &mut Reader) -> Result<Self, BytecodeError> {
        Ok(Namespace {
            name_offset: r.u32()?,
            name_hash: r.u32()?,
            parent_index: r.u32()?,
        })
    }

    pub fn is_root(&self, self_index: u32) -> bool {
        self.parent_index == self_index
    }
}
