use nullc_asm::{RegVmCmd, VMCmd};

use crate::closures::{ClosureCapture, ClosureList};
use crate::codec::{Reader, Writer};
use crate::error::BytecodeError;
use crate::functions::FunctionEntry;
use crate::header::{BlobSlice, ImageHeader, StreamSlice, TableSlice};
use crate::members::{TypeConstant, TypeMember};
use crate::modules::ModuleEntry;
use crate::sourcemap::SourceMap;
use crate::symbol::SymbolBlob;
use crate::typedef_ns::{Namespace, Typedef};
use crate::types_table::TypeEntry;
use crate::variables::{LocalVariable, Variable};

/// One VM's instruction stream plus its parallel source map.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct InstructionStream<Cmd> {
    pub instructions: Vec<Cmd>,
    pub source_map: SourceMap,
    /// Offset, in instructions, where module-initializer code begins.
    pub global_code_start: u32,
}

// Hand-written rather than derived: `#[derive(Default)]` would add a
// `Cmd: Default` bound that neither `VMCmd` nor `RegVmCmd` satisfies, even
// though an empty instruction stream never needs one.
impl<Cmd> Default for InstructionStream<Cmd> {
    fn default() -> Self {
        InstructionStream { instructions: Vec::new(), source_map: SourceMap::default(), global_code_start: 0 }
    }
}

/// One complete linked bytecode image: every table and blob enumerated by
/// the container format, held in memory in decoded form.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Image {
    pub types: Vec<TypeEntry>,
    pub members: Vec<TypeMember>,
    pub constants: Vec<TypeConstant>,
    pub modules: Vec<ModuleEntry>,
    pub variables: Vec<Variable>,
    pub functions: Vec<FunctionEntry>,
    pub locals: Vec<LocalVariable>,
    pub closure_lists: Vec<ClosureList>,
    pub closure_captures: Vec<ClosureCapture>,
    pub typedefs: Vec<Typedef>,
    pub namespaces: Vec<Namespace>,
    pub global_segment_size: u32,
    pub stack_vm: InstructionStream<VMCmd>,
    pub register_vm: InstructionStream<RegVmCmd>,
    pub symbols: SymbolBlob,
    pub source: Vec<u8>,
    pub llvm_blob: Vec<u8>,
}

impl Image {
    /// Serializes the image into the single contiguous binary container
    /// described in §4.2, computing the header's section layout.
    pub fn serialize(&self) -> Vec<u8> {
        let mut header = ImageHeader::default();

        // Fixed header size: magic (4) + overall_size (4) + 11 table
        // slices (8 each) + global_segment_size (4) + 2 stream slices
        // (20 each) + 3 blob slices (8 each).
        let header_size: u32 = 4 + 4 + 11 * 8 + 4 + 2 * 20 + 3 * 8;
        let mut cursor = header_size;

        let mut place_table = |count: usize, entry_size: u32, cursor: &mut u32| -> TableSlice {
            let slice = TableSlice {
                offset: *cursor,
                count: count as u32,
            };
            *cursor += slice.byte_length(entry_size);
            slice
        };

        header.types = place_table(self.types.len(), crate::types_table::TYPE_ENTRY_SIZE as u32, &mut cursor);
        header.members = place_table(self.members.len(), crate::members::TYPE_MEMBER_SIZE as u32, &mut cursor);
        header.constants = place_table(self.constants.len(), crate::members::TYPE_CONSTANT_SIZE as u32, &mut cursor);
        header.modules = place_table(self.modules.len(), crate::modules::MODULE_ENTRY_SIZE as u32, &mut cursor);
        header.variables = place_table(self.variables.len(), crate::variables::VARIABLE_SIZE as u32, &mut cursor);
        header.functions = place_table(self.functions.len(), crate::functions::FUNCTION_ENTRY_SIZE as u32, &mut cursor);
        header.locals = place_table(self.locals.len(), crate::variables::LOCAL_VARIABLE_SIZE as u32, &mut cursor);
        header.closure_lists = place_table(self.closure_lists.len(), crate::closures::CLOSURE_LIST_SIZE as u32, &mut cursor);
        header.closure_captures =
            place_table(self.closure_captures.len(), crate::closures::CLOSURE_CAPTURE_SIZE as u32, &mut cursor);
        header.typedefs = place_table(self.typedefs.len(), crate::typedef_ns::TYPEDEF_SIZE as u32, &mut cursor);
        header.namespaces = place_table(self.namespaces.len(), crate::typedef_ns::NAMESPACE_SIZE as u32, &mut cursor);

        header.global_segment_size = self.global_segment_size;

        let mut stack_instr_bytes = Writer::new();
        for cmd in &self.stack_vm.instructions {
            stack_instr_bytes.bytes(&cmd.encode());
        }
        let stack_instructions = BlobSlice {
            offset: cursor,
            length: stack_instr_bytes.buf.len() as u32,
        };
        cursor += stack_instructions.length;

        let mut stack_map_bytes = Writer::new();
        for entry in &self.stack_vm.source_map.entries {
            entry.encode(&mut stack_map_bytes);
        }
        let stack_source_map = BlobSlice {
            offset: cursor,
            length: stack_map_bytes.buf.len() as u32,
        };
        cursor += stack_source_map.length;

        header.stack_vm_stream = StreamSlice {
            instructions: stack_instructions,
            source_map: stack_source_map,
            global_code_start: self.stack_vm.global_code_start,
        };

        let mut reg_instr_bytes = Writer::new();
        for cmd in &self.register_vm.instructions {
            reg_instr_bytes.bytes(&cmd.encode());
        }
        let reg_instructions = BlobSlice {
            offset: cursor,
            length: reg_instr_bytes.buf.len() as u32,
        };
        cursor += reg_instructions.length;

        let mut reg_map_bytes = Writer::new();
        for entry in &self.register_vm.source_map.entries {
            entry.encode(&mut reg_map_bytes);
        }
        let reg_source_map = BlobSlice {
            offset: cursor,
            length: reg_map_bytes.buf.len() as u32,
        };
        cursor += reg_source_map.length;

        header.register_vm_stream = StreamSlice {
            instructions: reg_instructions,
            source_map: reg_source_map,
            global_code_start: self.register_vm.global_code_start,
        };

        header.symbols = BlobSlice {
            offset: cursor,
            length: self.symbols.len() as u32,
        };
        cursor += header.symbols.length;

        header.source = BlobSlice {
            offset: cursor,
            length: self.source.len() as u32,
        };
        cursor += header.source.length;

        header.llvm_blob = BlobSlice {
            offset: cursor,
            length: self.llvm_blob.len() as u32,
        };
        cursor += header.llvm_blob.length;

        header.overall_size = cursor;

        let mut w = Writer::new();
        header.encode(&mut w);
        for t in &self.types {
            t.encode(&mut w);
        }
        for m in &self.members {
            m.encode(&mut w);
        }
        for c in &self.constants {
            c.encode(&mut w);
        }
        for m in &self.modules {
            m.encode(&mut w);
        }
        for v in &self.variables {
            v.encode(&mut w);
        }
        for f in &self.functions {
            f.encode(&mut w);
        }
        for l in &self.locals {
            l.encode(&mut w);
        }
        for cl in &self.closure_lists {
            cl.encode(&mut w);
        }
        for cc in &self.closure_captures {
            cc.encode(&mut w);
        }
        for td in &self.typedefs {
            td.encode(&mut w);
        }
        for ns in &self.namespaces {
            ns.encode(&mut w);
        }
        w.bytes(&stack_instr_bytes.buf);
        w.bytes(&stack_map_bytes.buf);
        w.bytes(&reg_instr_bytes.buf);
        w.bytes(&reg_map_bytes.buf);
        w.bytes(self.symbols.as_bytes());
        w.bytes(&self.source);
        w.bytes(&self.llvm_blob);

        debug_assert_eq!(w.buf.len() as u32, header.overall_size);
        w.buf
    }

    /// Parses a container back into an [`Image`], validating that every
    /// section lies within bounds before any table is decoded.
    pub fn deserialize(bytes: &[u8]) -> Result<Self, BytecodeError> {
        let mut r = Reader::new(bytes);
        let header = ImageHeader::decode(&mut r)?;

        if bytes.len() as u32 != header.overall_size {
            return Err(BytecodeError::malformed(format!(
                "image declares size {} but buffer has {} bytes",
                header.overall_size,
                bytes.len()
            )));
        }
        header.validate_bounds()?;

        fn decode_table<T>(
            bytes: &[u8],
            slice: TableSlice,
            entry_size: u32,
            decode_one: impl Fn(&mut Reader) -> Result<T, BytecodeError>,
        ) -> Result<Vec<T>, BytecodeError> {
            let start = slice.offset as usize;
            let end = start + slice.byte_length(entry_size) as usize;
            let mut r = Reader::new(&bytes[start..end]);
            (0..slice.count).map(|_| decode_one(&mut r)).collect()
        }

        let types = decode_table(bytes, header.types, crate::types_table::TYPE_ENTRY_SIZE as u32, TypeEntry::decode)?;
        let members = decode_table(bytes, header.members, crate::members::TYPE_MEMBER_SIZE as u32, TypeMember::decode)?;
        let constants =
            decode_table(bytes, header.constants, crate::members::TYPE_CONSTANT_SIZE as u32, TypeConstant::decode)?;
        let modules = decode_table(bytes, header.modules, crate::modules::MODULE_ENTRY_SIZE as u32, ModuleEntry::decode)?;
        let variables = decode_table(bytes, header.variables, crate::variables::VARIABLE_SIZE as u32, Variable::decode)?;
        let functions =
            decode_table(bytes, header.functions, crate::functions::FUNCTION_ENTRY_SIZE as u32, FunctionEntry::decode)?;
        let locals =
            decode_table(bytes, header.locals, crate::variables::LOCAL_VARIABLE_SIZE as u32, LocalVariable::decode)?;
        let closure_lists =
            decode_table(bytes, header.closure_lists, crate::closures::CLOSURE_LIST_SIZE as u32, ClosureList::decode)?;
        let closure_captures = decode_table(
            bytes,
            header.closure_captures,
            crate::closures::CLOSURE_CAPTURE_SIZE as u32,
            ClosureCapture::decode,
        )?;
        let typedefs = decode_table(bytes, header.typedefs, crate::typedef_ns::TYPEDEF_SIZE as u32, Typedef::decode)?;
        let namespaces =
            decode_table(bytes, header.namespaces, crate::typedef_ns::NAMESPACE_SIZE as u32, Namespace::decode)?;

        // Cross-reference bounds: every table index field must dereference
        // within its target table.
        for m in &members {
            if m.type_index as usize >= types.len() {
                return Err(BytecodeError::IndexOutOfBounds {
                    table: "types",
                    index: m.type_index,
                    len: types.len() as u32,
                });
            }
        }
        for f in &functions {
            if f.function_type_index as usize >= types.len() {
                return Err(BytecodeError::IndexOutOfBounds {
                    table: "types",
                    index: f.function_type_index,
                    len: types.len() as u32,
                });
            }
        }
        for v in &variables {
            if v.type_index as usize >= types.len() {
                return Err(BytecodeError::IndexOutOfBounds {
                    table: "types",
                    index: v.type_index,
                    len: types.len() as u32,
                });
            }
        }

        fn decode_stream<Cmd, E: Into<BytecodeError>>(
            bytes: &[u8],
            instr_slice: BlobSlice,
            map_slice: BlobSlice,
            global_code_start: u32,
            decode_cmd: impl Fn(&[u8]) -> Result<Cmd, E>,
            cmd_size: usize,
        ) -> Result<InstructionStream<Cmd>, BytecodeError> {
            let instr_bytes = &bytes[instr_slice.offset as usize..(instr_slice.offset + instr_slice.length) as usize];
            if instr_bytes.len() % cmd_size != 0 {
                return Err(BytecodeError::malformed("instruction stream length is not a multiple of the command size"));
            }
            let instructions = instr_bytes
                .chunks_exact(cmd_size)
                .map(|chunk| decode_cmd(chunk).map_err(Into::into))
                .collect::<Result<Vec<_>, BytecodeError>>()?;

            let mut map_reader = Reader::new(&bytes[map_slice.offset as usize..(map_slice.offset + map_slice.length) as usize]);
            let mut entries = Vec::new();
            while map_reader.remaining() > 0 {
                entries.push(crate::sourcemap::SourceMapEntry::decode(&mut map_reader)?);
            }

            Ok(InstructionStream {
                instructions,
                source_map: SourceMap { entries },
                global_code_start,
            })
        }

        let stack_vm = decode_stream(
            bytes,
            header.stack_vm_stream.instructions,
            header.stack_vm_stream.source_map,
            header.stack_vm_stream.global_code_start,
            VMCmd::decode,
            nullc_asm::VM_CMD_SIZE,
        )?;
        let register_vm = decode_stream(
            bytes,
            header.register_vm_stream.instructions,
            header.register_vm_stream.source_map,
            header.register_vm_stream.global_code_start,
            RegVmCmd::decode,
            nullc_asm::REG_VM_CMD_SIZE,
        )?;

        let symbols = SymbolBlob::new(
            bytes[header.symbols.offset as usize..(header.symbols.offset + header.symbols.length) as usize].to_vec(),
        );
        let source =
            bytes[header.source.offset as usize..(header.source.offset + header.source.length) as usize].to_vec();
        let llvm_blob = bytes
            [header.llvm_blob.offset as usize..(header.llvm_blob.offset + header.llvm_blob.length) as usize]
            .to_vec();

        Ok(Image {
            types,
            members,
            constants,
            modules,
            variables,
            functions,
            locals,
            closure_lists,
            closure_captures,
            typedefs,
            namespaces,
            global_segment_size: header.global_segment_size,
            stack_vm,
            register_vm,
            symbols,
            source,
            llvm_blob,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use nullc_asm::VmOpcode;
    use nullc_types::{Alignment, PrimitiveCategory, StructuralCategory, TypeFlags};

    fn sample_image() -> Image {
        let mut symbols = SymbolBlob::default();
        let name_offset = symbols.intern("counter");

        Image {
            types: vec![TypeEntry {
                name_offset,
                byte_size: 4,
                align: Alignment::new(4).unwrap(),
                primitive_category: PrimitiveCategory::Int,
                structural_category: StructuralCategory::None,
                flags: TypeFlags::empty(),
                pointer_depth: 0,
                element_or_member_count: 0,
                constant_count: 0,
                subtype_or_member_start: 0,
                name_hash: 1,
                namespace_hash: 0,
                base_type_index: 0,
                defining_module: 0,
                source_offset: 0,
                source_length: 0,
                generic_origin: Default::default(),
            }],
            variables: vec![Variable {
                name_offset,
                name_hash: 1,
                type_index: 0,
                byte_offset: 0,
            }],
            global_segment_size: 4,
            stack_vm: InstructionStream {
                instructions: vec![VMCmd::simple(VmOpcode::Nop)],
                source_map: SourceMap::default(),
                global_code_start: 0,
            },
            symbols,
            ..Default::default()
        }
    }

    #[test]
    fn serialize_then_deserialize_round_trips() {
        let image = sample_image();
        let bytes = image.serialize();
        let decoded = Image::deserialize(&bytes).unwrap();
        assert_eq!(decoded, image);
    }

    #[test]
    fn truncated_buffer_is_rejected() {
        let image = sample_image();
        let mut bytes = image.serialize();
        bytes.truncate(bytes.len() - 1);
        assert!(Image::deserialize(&bytes).is_err());
    }

    #[test]
    fn dangling_variable_type_index_is_rejected() {
        let mut image = sample_image();
        image.variables[0].type_index = 99;
        let bytes = image.serialize();
        assert!(matches!(
            Image::deserialize(&bytes),
            Err(BytecodeError::IndexOutOfBounds { table: "types", .. })
        ));
    }
}
