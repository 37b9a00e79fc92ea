use crate::codec::{Reader, Writer};
use crate::error::BytecodeError;

/// How a return value is classified at the ABI boundary.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[repr(u8)]
pub enum ReturnTypeTag {
    Void = 0,
    Int = 1,
    Double = 2,
    Long = 3,
    Struct = 4,
}

impl ReturnTypeTag {
    pub fn from_u8(tag: u8) -> Option<Self> {
        Some(match tag {
            0 => Self::Void,
            1 => Self::Int,
            2 => Self::Double,
            3 => Self::Long,
            4 => Self::Struct,
            _ => return None,
        })
    }
}

/// Whether a function entry is implemented in bytecode or backed by a host
/// native. Overrides may only replace a function with one of the same
/// category; see `override_surface` in `nullc-vm`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[repr(u8)]
pub enum FunctionCategory {
    Bytecode = 0,
    Native = 1,
}

impl FunctionCategory {
    pub fn from_u8(tag: u8) -> Option<Self> {
        Some(match tag {
            0 => Self::Bytecode,
            1 => Self::Native,
            _ => return None,
        })
    }
}

/// No entry recorded in this stream: either the function is native-only,
/// or (before linking) the stub of an as-yet-unresolved import.
pub const NO_ENTRY: u32 = u32::MAX;

/// A function's position within one VM's instruction stream.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct EntryPoint {
    pub offset: u32,
    pub length: u32,
}

impl EntryPoint {
    pub const NONE: EntryPoint = EntryPoint { offset: NO_ENTRY, length: 0 };

    pub fn is_present(&self) -> bool {
        self.offset != NO_ENTRY
    }

    fn encode(&self, w: &mut Writer) {
        w.u32(self.offset);
        w.u32(self.length);
    }

    fn decode(r: &mut Reader) -> Result<Self, BytecodeError> {
        Ok(EntryPoint {
            offset: r.u32()?,
            length: r.u32()?,
        })
    }
}

/// One entry of the function table: signature, entry points in both
/// instruction streams, and frame layout. An import stub (used before
/// linking resolves a cross-module call) is a `Bytecode` entry with no
/// entry point in either stream.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct FunctionEntry {
    pub name_offset: u32,
    pub name_hash: u32,
    pub function_type_index: u32,
    pub return_type: ReturnTypeTag,
    pub category: FunctionCategory,
    pub stack_vm_entry: EntryPoint,
    pub register_vm_entry: EntryPoint,
    pub parameter_count: u16,
    pub local_count: u16,
    /// Size in bytes of the function's stack frame (stack VM) or register
    /// window (register VM).
    pub frame_size: u32,
    /// First index into the locals table owned by this function.
    pub locals_start: u32,
    /// Number of upvalues a closure over this function must capture.
    pub upvalue_count: u16,
    /// For native functions, the width in bytes the host ABI expects
    /// arguments to be packed to; zero for bytecode functions.
    pub native_arg_bytes: u16,
    pub defining_module: u32,
}

pub const FUNCTION_ENTRY_SIZE: usize = 52;

impl FunctionEntry {
    /// Whether this entry is an unresolved cross-module import stub,
    /// recorded by the front end and filled in by the linker.
    pub fn is_import_stub(&self) -> bool {
        self.category == FunctionCategory::Bytecode && !self.stack_vm_entry.is_present() && !self.register_vm_entry.is_present()
    }

    pub fn encode(&self, w: &mut Writer) {
        w.u32(self.name_offset);
        w.u32(self.name_hash);
        w.u32(self.function_type_index);
        w.u8(self.return_type as u8);
        w.u8(self.category as u8);
        w.u16(self.parameter_count);
        self.stack_vm_entry.encode(w);
        self.register_vm_entry.encode(w);
        w.u16(self.local_count);
        w.u16(self.upvalue_count);
        w.u32(self.frame_size);
        w.u32(self.locals_start);
        w.u16(self.native_arg_bytes);
        w.u16(0); // padding
        w.u32(self.defining_module);
    }

    pub fn decode(r: &mut Reader) -> Result<Self, BytecodeError> {
        let name_offset = r.u32()?;
        let name_hash = r.u32()?;
        let function_type_index = r.u32()?;
        let return_tag = r.u8()?;
        let category_tag = r.u8()?;
        let parameter_count = r.u16()?;
        let stack_vm_entry = EntryPoint::decode(r)?;
        let register_vm_entry = EntryPoint::decode(r)?;
        let local_count = r.u16()?;
        let upvalue_count = r.u16()?;
        let frame_size = r.u32()?;
        let locals_start = r.u32()?;
        let native_arg_bytes = r.u16()?;
        let _pad = r.u16()?;
        let defining_module = r.u32()?;

        let return_type = ReturnTypeTag::from_u8(return_tag)
            .ok_or_else(|| BytecodeError::malformed(format!("unknown return type tag {return_tag}")))?;
        let category = FunctionCategory::from_u8(category_tag)
            .ok_or_else(|| BytecodeError::malformed(format!("unknown function category {category_tag}")))?;

        Ok(FunctionEntry {
            name_offset,
            name_hash,
            function_type_index,
            return_type,
            category,
            stack_vm_entry,
            register_vm_entry,
            parameter_count,
            local_count,
            frame_size,
            locals_start,
            upvalue_count,
            native_arg_bytes,
            defining_module,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sample() -> FunctionEntry {
        FunctionEntry {
            name_offset: 1,
            name_hash: 2,
            function_type_index: 3,
            return_type: ReturnTypeTag::Int,
            category: FunctionCategory::Bytecode,
            stack_vm_entry: EntryPoint { offset: 100, length: 20 },
            register_vm_entry: EntryPoint { offset: 50, length: 10 },
            parameter_count: 2,
            local_count: 3,
            frame_size: 16,
            locals_start: 5,
            upvalue_count: 0,
            native_arg_bytes: 0,
            defining_module: 0,
        }
    }

    #[test]
    fn bytecode_function_round_trips() {
        let f = sample();
        let mut w = Writer::new();
        f.encode(&mut w);
        assert_eq!(w.buf.len(), FUNCTION_ENTRY_SIZE);
        assert_eq!(FunctionEntry::decode(&mut Reader::new(&w.buf)).unwrap(), f);
        assert!(!f.is_import_stub());
    }

    #[test]
    fn native_function_round_trips() {
        let mut f = sample();
        f.category = FunctionCategory::Native;
        f.native_arg_bytes = 8;
        f.stack_vm_entry = EntryPoint::NONE;
        f.register_vm_entry = EntryPoint::NONE;
        let mut w = Writer::new();
        f.encode(&mut w);
        assert_eq!(FunctionEntry::decode(&mut Reader::new(&w.buf)).unwrap(), f);
    }

    #[test]
    fn import_stub_has_no_entry_in_either_stream() {
        let mut f = sample();
        f.stack_vm_entry = EntryPoint::NONE;
        f.register_vm_entry = EntryPoint::NONE;
        assert!(f.is_import_stub());
    }

    #[test]
    fn unknown_category_tag_is_malformed() {
        let mut w = Writer::new();
        sample().encode(&mut w);
        w.buf[13] = 0xff; // category byte
        assert!(FunctionEntry::decode(&mut Reader::new(&w.buf)).is_err());
    }
}
