use crate::codec::{Reader, Writer};
use crate::error::BytecodeError;
use nullc_types::{Alignment, PrimitiveCategory, StructuralCategory, TypeFlags};

/// Generic-instantiation provenance, supplemented from the original
/// format's `definitionOffsetStart`/`definitionOffset`/`genericTypeCount`
/// fields. Generic instantiation itself is out of scope; this is carried
/// purely so the on-disk layout matches the format's width.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct GenericOrigin {
    pub definition_offset_start: u32,
    pub definition_offset: u32,
    pub generic_type_count: u32,
}

/// Either an array element count / class member count, or the array's /
/// function's subtype index vs. a class's member-table starting offset —
/// the bytecode format reuses the same word for different structural
/// categories.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct TypeEntry {
    pub name_offset: u32,
    pub byte_size: u32,
    pub align: Alignment,
    pub primitive_category: PrimitiveCategory,
    pub structural_category: StructuralCategory,
    pub flags: TypeFlags,
    pub pointer_depth: u16,
    /// Array element count for `Array`, member count for `Class`, unused
    /// otherwise.
    pub element_or_member_count: u32,
    pub constant_count: u32,
    /// Subtype index for `Array`/`Pointer`/`Function`, member-table start
    /// offset for `Class`.
    pub subtype_or_member_start: u32,
    pub name_hash: u32,
    pub namespace_hash: u32,
    pub base_type_index: u32,
    pub defining_module: u32,
    pub source_offset: u32,
    pub source_length: u32,
    pub generic_origin: GenericOrigin,
}

pub const TYPE_ENTRY_SIZE: usize = 60;

impl TypeEntry {
    pub fn encode(&self, w: &mut Writer) {
        w.u32(self.name_offset);
        w.u32(self.byte_size);
        w.u8(self.align.log2());
        w.u8(self.primitive_category as u8);
        w.u8(self.structural_category as u8);
        w.u8(self.flags.bits());
        w.u16(self.pointer_depth);
        w.u16(0); // padding to keep the record 4-byte aligned
        w.u32(self.element_or_member_count);
        w.u32(self.constant_count);
        w.u32(self.subtype_or_member_start);
        w.u32(self.name_hash);
        w.u32(self.namespace_hash);
        w.u32(self.base_type_index);
        w.u32(self.defining_module);
        w.u32(self.source_offset);
        w.u32(self.source_length);
        w.u32(self.generic_origin.definition_offset_start);
        w.u32(self.generic_origin.definition_offset);
        w.u32(self.generic_origin.generic_type_count);
    }

    pub fn decode(r: &mut Reader) -> Result<Self, BytecodeError> {
        let name_offset = r.u32()?;
        let byte_size = r.u32()?;
        let align_log2 = r.u8()?;
        let primitive_tag = r.u8()?;
        let structural_tag = r.u8()?;
        let flags_bits = r.u8()?;
        let pointer_depth = r.u16()?;
        let _pad = r.u16()?;
        let element_or_member_count = r.u32()?;
        let constant_count = r.u32()?;
        let subtype_or_member_start = r.u32()?;
        let name_hash = r.u32()?;
        let namespace_hash = r.u32()?;
        let base_type_index = r.u32()?;
        let defining_module = r.u32()?;
        let source_offset = r.u32()?;
        let source_length = r.u32()?;
        let generic_origin = GenericOrigin {
            definition_offset_start: r.u32()?,
            definition_offset: r.u32()?,
            generic_type_count: r.u32()?,
        };

        let primitive_category = PrimitiveCategory::from_u8(primitive_tag)
            .ok_or_else(|| BytecodeError::malformed(format!("unknown primitive category {primitive_tag}")))?;
        let structural_category = StructuralCategory::from_u8(structural_tag)
            .ok_or_else(|| BytecodeError::malformed(format!("unknown structural category {structural_tag}")))?;
        let flags = TypeFlags::from_bits(flags_bits)
            .ok_or_else(|| BytecodeError::malformed(format!("unknown type flags {flags_bits:#x}")))?;

        Ok(TypeEntry {
            name_offset,
            byte_size,
            align: Alignment::from_log2(align_log2),
            primitive_category,
            structural_category,
            flags,
            pointer_depth,
            element_or_member_count,
            constant_count,
            subtype_or_member_start,
            name_hash,
            namespace_hash,
            base_type_index,
            defining_module,
            source_offset,
            source_length,
            generic_origin,
        })
    }

    /// A stable structural hash used by the linker to deduplicate
    /// structurally equal types: it deliberately excludes provenance
    /// (`defining_module`, source span) and only covers shape.
    pub fn structural_hash(&self) -> u64 {
        use std::hash::{Hash, Hasher};
        let mut hasher = std::collections::hash_map::DefaultHasher::new();
        self.byte_size.hash(&mut hasher);
        self.align.log2().hash(&mut hasher);
        (self.primitive_category as u8).hash(&mut hasher);
        (self.structural_category as u8).hash(&mut hasher);
        self.flags.bits().hash(&mut hasher);
        self.pointer_depth.hash(&mut hasher);
        self.element_or_member_count.hash(&mut hasher);
        self.constant_count.hash(&mut hasher);
        self.base_type_index.hash(&mut hasher);
        hasher.finish()
    }
}
