use crate::codec::{Reader, Writer};
use crate::error::BytecodeError;

/// A global variable: name, type, and its byte offset into the global
/// segment.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Variable {
    pub name_offset: u32,
    pub name_hash: u32,
    pub type_index: u32,
    pub byte_offset: u32,
}

pub const VARIABLE_SIZE: usize = 16;

impl Variable {
    pub fn encode(&self, w: &mut Writer) {
        w.u32(self.name_offset);
        w.u32(self.name_hash);
        w.u32(self.type_index);
        w.u32(self.byte_offset);
    }

    pub fn decode(r: &mut Reader) -> Result<Self, BytecodeError> {
        Ok(Variable {
            name_offset: r.u32()?,
            name_hash: r.u32()?,
            type_index: r.u32()?,
            byte_offset: r.u32()?,
        })
    }
}

/// Role of a local within its owning function's frame.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[repr(u8)]
pub enum LocalKind {
    Parameter = 0,
    Local = 1,
    Upvalue = 2,
}

impl LocalKind {
    pub fn from_u8(tag: u8) -> Option<Self> {
        Some(match tag {
            0 => Self::Parameter,
            1 => Self::Local,
            2 => Self::Upvalue,
            _ => return None,
        })
    }
}

/// A local (parameter, stack local, or captured upvalue), with the extra
/// bookkeeping the closure-lowering pass and defaulted-parameter handling
/// need beyond a plain [`Variable`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct LocalVariable {
    pub name_offset: u32,
    pub name_hash: u32,
    pub type_index: u32,
    /// Byte offset into the owning function's local frame.
    pub byte_offset: u32,
    pub kind: LocalKind,
    /// Function id supplying the default value, for defaulted parameters.
    pub default_function_id: Option<u32>,
    pub size: u32,
    /// Id of the closure-lowering pass's close list this local belongs to,
    /// if it is captured by a nested function.
    pub close_list_id: Option<u32>,
    pub alignment_log2: u8,
    pub is_explicit: bool,
}

pub const LOCAL_VARIABLE_SIZE: usize = 32;

const NO_DEFAULT_FUNCTION_ID: u32 = u32::MAX;
const NO_CLOSE_LIST_ID: u32 = u32::MAX;

impl LocalVariable {
    pub fn encode(&self, w: &mut Writer) {
        w.u32(self.name_offset);
        w.u32(self.name_hash);
        w.u32(self.type_index);
        w.u32(self.byte_offset);
        w.u8(self.kind as u8);
        w.u8(self.alignment_log2);
        w.u8(self.is_explicit as u8);
        w.u8(0); // padding
        w.u32(self.default_function_id.unwrap_or(NO_DEFAULT_FUNCTION_ID));
        w.u32(self.size);
        w.u32(self.close_list_id.unwrap_or(NO_CLOSE_LIST_ID));
    }

    pub fn decode(r: &mut Reader) -> Result<Self, BytecodeError> {
        let name_offset = r.u32()?;
        let name_hash = r.u32()?;
        let type_index = r.u32()?;
        let byte_offset = r.u32()?;
        let kind_tag = r.u8()?;
        let alignment_log2 = r.u8()?;
        let is_explicit = r.u8()? != 0;
        let _pad = r.u8()?;
        let default_function_id = r.u32()?;
        let size = r.u32()?;
        let close_list_id = r.u32()?;

        let kind = LocalKind::from_u8(kind_tag)
            .ok_or_else(|| BytecodeError::malformed(format!("unknown local kind {kind_tag}")))?;

        Ok(LocalVariable {
            name_offset,
            name_hash,
            type_index,
            byte_offset,
            kind,
            default_function_id: (default_function_id != NO_DEFAULT_FUNCTION_ID)
                .then_some(default_function_id),
            size,
            close_list_id: (close_list_id != NO_CLOSE_LIST_ID).then_some(close_list_id),
            alignment_log2,
            is_explicit,
        })
    }
}
