//! Exercises the linker's public API end to end: two independently
//! compiled units with identical primitive type definitions but no
//! functional dependency between them should still dedup that shared
//! type into one merged entry.

use nullc_bytecode::{Image, SymbolBlob, TypeEntry};
use nullc_linker::{link, CompiledUnit};
use nullc_types::{Alignment, PrimitiveCategory, StructuralCategory, TypeFlags};

fn int_type() -> TypeEntry {
    TypeEntry {
        name_offset: 0,
        byte_size: 4,
        align: Alignment::new(4).unwrap(),
        primitive_category: PrimitiveCategory::Int,
        structural_category: StructuralCategory::None,
        flags: TypeFlags::empty(),
        pointer_depth: 0,
        element_or_member_count: 0,
        constant_count: 0,
        subtype_or_member_start: 0,
        name_hash: 0,
        namespace_hash: 0,
        base_type_index: 0,
        defining_module: 0,
        source_offset: 0,
        source_length: 0,
        generic_origin: Default::default(),
    }
}

fn unit_with_only_int(name: &str) -> CompiledUnit {
    CompiledUnit::new(
        name,
        Image {
            types: vec![int_type()],
            symbols: SymbolBlob::default(),
            ..Default::default()
        },
    )
}

#[test]
fn identical_primitive_types_from_dependency_units_dedup_through_public_api() {
    let main = unit_with_only_int("a").depends_on("b");
    let merged = link(vec![main, unit_with_only_int("b")]).unwrap();
    assert_eq!(merged.types.len(), 1);
}

#[test]
fn linking_a_single_unit_with_no_dependencies_preserves_its_tables() {
    let merged = link(vec![unit_with_only_int("solo")]).unwrap();
    assert_eq!(merged.types.len(), 1);
    assert_eq!(merged.types[0].byte_size, 4);
}
