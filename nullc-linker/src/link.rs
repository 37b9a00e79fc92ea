use nullc_bytecode::{Image, Namespace, SymbolBlob, Typedef};

use crate::dag::topological_order;
use crate::error::LinkError;
use crate::functions::FunctionTableBuilder;
use crate::modules::ModuleTableBuilder;
use crate::operands::{merge_register_vm_stream, merge_stack_vm_stream};
use crate::types::TypeTableBuilder;
use crate::unit::CompiledUnit;
use crate::variables::VariableTableBuilder;

fn resolve(remap: &[u32], old_index: u32) -> u32 {
    remap.get(old_index as usize).copied().unwrap_or(old_index)
}

/// Links `units[0]` (the primary module) against its transitive
/// dependencies, producing one merged [`Image`]. Units are processed in
/// dependency order so that every cross-module import stub in a later
/// unit resolves against an already-merged function from an earlier one.
///
/// Linking an already-linked image (passed back in as a single unit with
/// no dependencies) is a no-op: every table dedups or passes straight
/// through, and no operand needs rewriting since its module tags already
/// point at index 0.
pub fn link(units: Vec<CompiledUnit>) -> Result<Image, LinkError> {
    let order = topological_order(&units)?;

    let mut types = TypeTableBuilder::default();
    let mut functions = FunctionTableBuilder::default();
    let mut variables = VariableTableBuilder::default();
    let mut modules = ModuleTableBuilder::default();
    let mut typedefs: Vec<Typedef> = Vec::new();
    let mut namespaces: Vec<Namespace> = Vec::new();
    let mut symbols = SymbolBlob::default();
    let mut source: Vec<u8> = Vec::new();
    let mut llvm_blob: Vec<u8> = Vec::new();
    let mut global_segment_size: u32 = 0;
    let mut stack_vm = nullc_bytecode::InstructionStream::default();
    let mut register_vm = nullc_bytecode::InstructionStream::default();

    for idx in order {
        let unit = &units[idx].image;
        tracing::debug!(unit_index = idx, functions = unit.functions.len(), "merging unit");

        let symbol_shift = symbols.len() as u32;
        let source_shift = source.len() as u32;
        let function_base = functions.functions.len() as u32;
        let global_segment_base = global_segment_size;
        let stack_stream_base = stack_vm.instructions.len() as u32;
        let register_stream_base = register_vm.instructions.len() as u32;
        let namespace_base = namespaces.len() as u32;

        let module_remap = modules.merge_unit(&unit.modules, symbol_shift, function_base, global_segment_base, source_shift);
        let type_remap = types.merge_unit(&unit.types, &unit.members, &unit.constants, &module_remap);
        let function_remap = functions.merge_unit(
            unit,
            &type_remap,
            symbol_shift,
            &module_remap,
            stack_stream_base,
            register_stream_base,
        )?;
        variables.merge_unit(&unit.variables, &type_remap, symbol_shift);

        for ns in &unit.namespaces {
            namespaces.push(Namespace {
                name_offset: ns.name_offset + symbol_shift,
                parent_index: ns.parent_index + namespace_base,
                ..*ns
            });
        }
        for td in &unit.typedefs {
            typedefs.push(Typedef {
                name_offset: td.name_offset + symbol_shift,
                target_type_index: resolve(&type_remap, td.target_type_index),
                namespace_index: td.namespace_index + namespace_base,
                ..*td
            });
        }

        merge_stack_vm_stream(&mut stack_vm, &unit.stack_vm, &type_remap, &function_remap, &module_remap);
        merge_register_vm_stream(&mut register_vm, &unit.register_vm, &type_remap, &function_remap, &module_remap);
        tracing::trace!(
            stack_vm_len = stack_vm.instructions.len(),
            register_vm_len = register_vm.instructions.len(),
            "merged instruction streams"
        );

        symbols = SymbolBlob::new([symbols.as_bytes(), unit.symbols.as_bytes()].concat());
        source.extend_from_slice(&unit.source);
        llvm_blob.extend_from_slice(&unit.llvm_blob);
        global_segment_size += unit.global_segment_size;
    }

    Ok(Image {
        types: types.types,
        members: types.members,
        constants: types.constants,
        modules: modules.modules,
        variables: variables.variables,
        functions: functions.functions,
        locals: functions.locals,
        closure_lists: functions.closure_lists,
        closure_captures: functions.closure_captures,
        typedefs,
        namespaces,
        global_segment_size,
        stack_vm,
        register_vm,
        symbols,
        source,
        llvm_blob,
    })
}
