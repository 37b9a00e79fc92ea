use std::collections::HashMap;

use nullc_bytecode::{TypeConstant, TypeEntry, TypeMember};
use nullc_types::StructuralCategory;

/// Resolves an in-unit type reference through the remap built so far.
/// References to a type not yet processed (a forward reference) pass
/// through unchanged; the front end is assumed to emit types in
/// dependency order, so this only affects the unsupported case of mutual
/// type recursion without an intervening pointer indirection.
fn resolve(remap: &[u32], old_index: u32) -> u32 {
    remap.get(old_index as usize).copied().unwrap_or(old_index)
}

/// Accumulates the merged type/member/constant tables across every unit
/// processed so far, plus a candidate index for deduplication.
#[derive(Default)]
pub struct TypeTableBuilder {
    pub types: Vec<TypeEntry>,
    pub members: Vec<TypeMember>,
    pub constants: Vec<TypeConstant>,
    candidates: HashMap<u64, Vec<u32>>,
}

impl TypeTableBuilder {
    /// Merges one unit's type table in, returning that unit's
    /// old-index-to-new-index remap.
    pub fn merge_unit(
        &mut self,
        unit_types: &[TypeEntry],
        unit_members: &[TypeMember],
        unit_constants: &[TypeConstant],
        module_remap: &[u32],
    ) -> Vec<u32> {
        let mut remap: Vec<u32> = Vec::with_capacity(unit_types.len());

        for (old_index, ty) in unit_types.iter().enumerate() {
            let remapped_base = resolve(&remap, ty.base_type_index);
            let defining_module = resolve(module_remap, ty.defining_module);

            let (remapped_subtype, member_slice): (u32, Option<Vec<TypeMember>>) = match ty.structural_category {
                StructuralCategory::Array | StructuralCategory::Pointer | StructuralCategory::Function => {
                    (resolve(&remap, ty.subtype_or_member_start), None)
                }
                StructuralCategory::Class => {
                    let start = ty.subtype_or_member_start as usize;
                    let count = ty.element_or_member_count as usize;
                    let remapped_members = unit_members[start..start + count]
                        .iter()
                        .map(|m| TypeMember {
                            type_index: resolve(&remap, m.type_index),
                            byte_offset: m.byte_offset,
                        })
                        .collect::<Vec<_>>();
                    (0, Some(remapped_members))
                }
                StructuralCategory::None => (ty.subtype_or_member_start, None),
            };

            let candidate = TypeEntry {
                base_type_index: remapped_base,
                subtype_or_member_start: remapped_subtype,
                defining_module,
                ..*ty
            };

            let new_index = self.find_or_insert(candidate, old_index as u32, member_slice, unit_constants);
            remap.push(new_index);
        }

        remap
    }

    fn find_or_insert(
        &mut self,
        candidate: TypeEntry,
        old_index: u32,
        member_slice: Option<Vec<TypeMember>>,
        unit_constants: &[TypeConstant],
    ) -> u32 {
        let hash_key = candidate.structural_hash();
        if let Some(existing_candidates) = self.candidates.get(&hash_key) {
            for &existing_index in existing_candidates {
                if self.structurally_equal(existing_index, &candidate, member_slice.as_deref()) {
                    return existing_index;
                }
            }
        }

        let new_index = self.types.len() as u32;
        let finalized = match (&member_slice, candidate.structural_category) {
            (Some(members), StructuralCategory::Class) => {
                let members_start = self.members.len() as u32;
                self.members.extend_from_slice(members);
                TypeEntry {
                    subtype_or_member_start: members_start,
                    ..candidate
                }
            }
            _ => candidate,
        };
        self.types.push(finalized);

        if finalized.constant_count > 0 {
            // Constants are keyed by owning type index in the source
            // unit's table, so they must be looked up before the index is
            // remapped away.
            let owned: Vec<TypeConstant> = unit_constants
                .iter()
                .filter(|c| c.type_index == old_index)
                .cloned()
                .collect();
            self.constants.extend(owned);
        }

        self.candidates.entry(hash_key).or_default().push(new_index);
        new_index
    }

    fn structurally_equal(&self, existing_index: u32, candidate: &TypeEntry, member_slice: Option<&[TypeMember]>) -> bool {
        let existing = &self.types[existing_index as usize];
        if existing.byte_size != candidate.byte_size
            || existing.align != candidate.align
            || existing.primitive_category != candidate.primitive_category
            || existing.structural_category != candidate.structural_category
            || existing.flags != candidate.flags
            || existing.pointer_depth != candidate.pointer_depth
            || existing.element_or_member_count != candidate.element_or_member_count
            || existing.constant_count != candidate.constant_count
            || existing.base_type_index != candidate.base_type_index
        {
            return false;
        }

        match candidate.structural_category {
            StructuralCategory::Class => {
                let Some(members) = member_slice else { return false };
                let start = existing.subtype_or_member_start as usize;
                let count = existing.element_or_member_count as usize;
                self.members.get(start..start + count) == Some(members)
            }
            StructuralCategory::Array | StructuralCategory::Pointer | StructuralCategory::Function => {
                existing.subtype_or_member_start == candidate.subtype_or_member_start
            }
            StructuralCategory::None => true,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use nullc_types::{Alignment, PrimitiveCategory, TypeFlags};

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

    #[test]
    fn identical_primitive_types_from_two_units_dedup_to_one() {
        let mut builder = TypeTableBuilder::default();
        let remap_a = builder.merge_unit(&[int_type()], &[], &[], &[0]);
        let remap_b = builder.merge_unit(&[int_type()], &[], &[], &[1]);
        assert_eq!(builder.types.len(), 1);
        assert_eq!(remap_a[0], remap_b[0]);
    }

    #[test]
    fn identical_classes_from_two_units_dedup_to_one() {
        let mut class = int_type();
        class.structural_category = StructuralCategory::Class;
        class.byte_size = 8;
        class.element_or_member_count = 2;
        class.subtype_or_member_start = 0;

        let members = vec![
            TypeMember { type_index: 0, byte_offset: 0 },
            TypeMember { type_index: 0, byte_offset: 4 },
        ];

        let mut builder = TypeTableBuilder::default();
        let unit_types = [int_type(), class];
        let remap_a = builder.merge_unit(&unit_types, &members, &[], &[0, 0]);
        let remap_b = builder.merge_unit(&unit_types, &members, &[], &[1, 1]);

        // int dedups, and the class (same member shape) dedups too.
        assert_eq!(builder.types.len(), 2);
        assert_eq!(remap_a[1], remap_b[1]);
    }

    #[test]
    fn classes_with_different_members_do_not_dedup() {
        let mut class_a = int_type();
        class_a.structural_category = StructuralCategory::Class;
        class_a.byte_size = 4;
        class_a.element_or_member_count = 1;

        let mut class_b = class_a;
        class_b.byte_size = 8;

        let members_a = vec![TypeMember { type_index: 0, byte_offset: 0 }];
        let members_b = vec![TypeMember { type_index: 0, byte_offset: 0 }, TypeMember { type_index: 0, byte_offset: 4 }];
        let mut class_b_fixed = class_b;
        class_b_fixed.element_or_member_count = 2;

        let mut builder = TypeTableBuilder::default();
        builder.merge_unit(&[int_type(), class_a], &members_a, &[], &[0, 0]);
        builder.merge_unit(&[int_type(), class_b_fixed], &members_b, &[], &[1, 1]);

        // one int (deduped) + two distinct classes.
        assert_eq!(builder.types.len(), 3);
    }
}
