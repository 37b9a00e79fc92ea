use crate::codec::{Reader, Writer};
use crate::error::BytecodeError;

/// One entry of a source map: associates a run of instructions with the
/// source span that produced them. Each instruction stream (stack VM,
/// register VM) owns its own source-map stream, since the two lowering
/// passes emit a different number of instructions per source expression.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SourceMapEntry {
    /// Byte offset of the first instruction this entry covers, within its
    /// instruction stream.
    pub instruction_offset: u32,
    pub source_module: u32,
    pub source_offset: u32,
    pub source_length: u32,
}

pub const SOURCE_MAP_ENTRY_SIZE: usize = 16;

impl SourceMapEntry {
    pub fn encode(&self, w: &mut Writer) {
        w.u32(self.instruction_offset);
        w.u32(self.source_module);
        w.u32(self.source_offset);
        w.u32(self.source_length);
    }

    pub fn decode(r: &mut Reader) -> Result<Self, BytecodeError> {
        Ok(SourceMapEntry {
            instruction_offset: r.u32()?,
            source_module: r.u32()?,
            source_offset: r.u32()?,
            source_length: r.u32()?,
        })
    }
}

/// A source map is sorted ascending by `instruction_offset`; lookups binary
/// search for the last entry at or before the queried offset.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct SourceMap {
    pub entries: Vec<SourceMapEntry>,
}

impl SourceMap {
    pub fn lookup(&self, instruction_offset: u32) -> Option<&SourceMapEntry> {
        match self
            .entries
            .binary_search_by_key(&instruction_offset, |e| e.instruction_offset)
        {
            Ok(i) => Some(&self.entries[i]),
            Err(0) => None,
            Err(i) => Some(&self.entries[i - 1]),
        }
    }
}
