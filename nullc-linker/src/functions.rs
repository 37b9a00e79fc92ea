use std::collections::HashMap;

use nullc_bytecode::{ClosureCapture, ClosureList, EntryPoint, FunctionEntry, Image, LocalVariable, SymbolBlob};

use crate::error::LinkError;

fn resolve(remap: &[u32], old_index: u32) -> u32 {
    remap.get(old_index as usize).copied().unwrap_or(old_index)
}

fn shift_entry(entry: EntryPoint, base: u32) -> EntryPoint {
    if entry.is_present() {
        EntryPoint {
            offset: entry.offset + base,
            length: entry.length,
        }
    } else {
        entry
    }
}

/// Accumulates the merged function, local, and closure-list tables.
#[derive(Default)]
pub struct FunctionTableBuilder {
    pub functions: Vec<FunctionEntry>,
    pub locals: Vec<LocalVariable>,
    pub closure_lists: Vec<ClosureList>,
    pub closure_captures: Vec<ClosureCapture>,
    name_index: HashMap<String, u32>,
}

impl FunctionTableBuilder {
    /// Merges one unit's function table, resolving its import stubs
    /// against functions already merged from earlier (dependency) units
    /// and appending the rest with their cross-references remapped.
    /// Returns the unit's old-index-to-new-index function remap.
    pub fn merge_unit(
        &mut self,
        unit: &Image,
        type_remap: &[u32],
        symbol_shift: u32,
        module_remap: &[u32],
        stack_stream_base: u32,
        register_stream_base: u32,
    ) -> Result<Vec<u32>, LinkError> {
        let locals_base = self.locals.len() as u32;
        let closure_lists_base = self.closure_lists.len() as u32;
        let closure_captures_base = self.closure_captures.len() as u32;

        self.closure_captures.extend_from_slice(&unit.closure_captures);
        for list in &unit.closure_lists {
            self.closure_lists.push(ClosureList {
                captures_start: list.captures_start + closure_captures_base,
                ..*list
            });
        }
        for local in &unit.locals {
            self.locals.push(LocalVariable {
                type_index: resolve(type_remap, local.type_index),
                close_list_id: local.close_list_id.map(|id| id + closure_lists_base),
                ..*local
            });
        }

        let mut remap = Vec::with_capacity(unit.functions.len());
        for f in &unit.functions {
            if f.is_import_stub() {
                let name = unit.symbols.read_str(f.name_offset)?;
                let resolved = *self
                    .name_index
                    .get(name)
                    .ok_or_else(|| LinkError::UnresolvedImport(name.to_string()))?;
                remap.push(resolved);
                continue;
            }

            let new_index = self.functions.len() as u32;
            let new_name_offset = f.name_offset + symbol_shift;
            self.functions.push(FunctionEntry {
                name_offset: new_name_offset,
                function_type_index: resolve(type_remap, f.function_type_index),
                stack_vm_entry: shift_entry(f.stack_vm_entry, stack_stream_base),
                register_vm_entry: shift_entry(f.register_vm_entry, register_stream_base),
                locals_start: f.locals_start + locals_base,
                defining_module: resolve(module_remap, f.defining_module),
                ..*f
            });

            let name = unit.symbols.read_str(f.name_offset)?;
            self.name_index.entry(name.to_string()).or_insert(new_index);
            remap.push(new_index);
        }
        Ok(remap)
    }

    /// Looks a merged function up by name against the final symbol blob;
    /// exposed for host-ABI registration after linking.
    pub fn find_by_name(&self, symbols: &SymbolBlob, name: &str) -> Option<u32> {
        self.functions
            .iter()
            .position(|f| symbols.read_str(f.name_offset).ok() == Some(name))
            .map(|i| i as u32)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use nullc_bytecode::{FunctionCategory, ReturnTypeTag};

    fn unit_with_function(name: &str, defining_module: u32) -> Image {
        let mut symbols = SymbolBlob::default();
        let name_offset = symbols.intern(name);
        Image {
            functions: vec![FunctionEntry {
                name_offset,
                name_hash: 0,
                function_type_index: 0,
                return_type: ReturnTypeTag::Int,
                category: FunctionCategory::Bytecode,
                stack_vm_entry: EntryPoint { offset: 0, length: 4 },
                register_vm_entry: EntryPoint { offset: 0, length: 4 },
                parameter_count: 0,
                local_count: 0,
                frame_size: 0,
                locals_start: 0,
                upvalue_count: 0,
                native_arg_bytes: 0,
                defining_module,
            }],
            symbols,
            ..Default::default()
        }
    }

    fn unit_with_import_stub(name: &str) -> Image {
        let mut symbols = SymbolBlob::default();
        let name_offset = symbols.intern(name);
        Image {
            functions: vec![FunctionEntry {
                name_offset,
                name_hash: 0,
                function_type_index: 0,
                return_type: ReturnTypeTag::Int,
                category: FunctionCategory::Bytecode,
                stack_vm_entry: EntryPoint::NONE,
                register_vm_entry: EntryPoint::NONE,
                parameter_count: 0,
                local_count: 0,
                frame_size: 0,
                locals_start: 0,
                upvalue_count: 0,
                native_arg_bytes: 0,
                defining_module: 0,
            }],
            symbols,
            ..Default::default()
        }
    }

    #[test]
    fn merged_function_carries_remapped_defining_module() {
        let unit = unit_with_function("fact", 0);
        let mut builder = FunctionTableBuilder::default();
        // Unit's own module 0 lands at merged module index 3.
        builder.merge_unit(&unit, &[], 0, &[3], 0, 0).unwrap();
        assert_eq!(builder.functions[0].defining_module, 3);
    }

    #[test]
    fn import_stub_resolves_against_already_merged_function() {
        let provider = unit_with_function("counter_bump", 0);
        let consumer = unit_with_import_stub("counter_bump");

        let mut builder = FunctionTableBuilder::default();
        builder.merge_unit(&provider, &[], 0, &[0], 0, 0).unwrap();
        let remap = builder.merge_unit(&consumer, &[], 0, &[1], 0, 0).unwrap();

        assert_eq!(builder.functions.len(), 1);
        assert_eq!(remap[0], 0);
    }

    #[test]
    fn unresolved_import_stub_is_reported() {
        let consumer = unit_with_import_stub("missing");
        let mut builder = FunctionTableBuilder::default();
        let err = builder.merge_unit(&consumer, &[], 0, &[0], 0, 0).unwrap_err();
        assert!(matches!(err, LinkError::UnresolvedImport(name) if name == "missing"));
    }
}
