//! Links three units (an unrelated module that only consumes global-segment
//! space, a module owning a global variable, and a caller that writes and
//! reads it through imported functions) and executes the result, proving
//! the linker's module-tag retagging and global-segment-base shifting are
//! correct end to end, not just at the operand-rewrite unit level.

use nullc_asm::{VMCmd, VmOpcode};
use nullc_bytecode::{EntryPoint, FunctionCategory, FunctionEntry, Image, InstructionStream, ModuleEntry, ReturnTypeTag};
use nullc_linker::{link, CompiledUnit};
use nullc_types::pack_global_operand;
use nullc_vm::vm::stack::StackVm;
use nullc_vm::{CoroutineTable, ExecutionLimits, NativeTable};

fn module_entry(function_count: u32) -> ModuleEntry {
    ModuleEntry {
        name_offset: 0,
        name_hash: 0,
        first_function_index: 0,
        function_count,
        global_variable_base_offset: 0,
        source_offset: nullc_bytecode::NO_SOURCE,
        source_length: 0,
    }
}

fn padding_unit() -> CompiledUnit {
    let image = Image { modules: vec![module_entry(0)], global_segment_size: 8, ..Default::default() };
    CompiledUnit::new("padding", image)
}

fn entry(offset: u32, length: u32, parameter_count: u16) -> FunctionEntry {
    FunctionEntry {
        name_offset: 0,
        name_hash: 0,
        function_type_index: 0,
        return_type: ReturnTypeTag::Int,
        category: FunctionCategory::Bytecode,
        stack_vm_entry: EntryPoint { offset, length },
        register_vm_entry: EntryPoint::NONE,
        parameter_count,
        local_count: 0,
        frame_size: 16,
        locals_start: 0,
        upvalue_count: 0,
        native_arg_bytes: 0,
        defining_module: 0,
    }
}

fn import_stub(parameter_count: u16) -> FunctionEntry {
    FunctionEntry { stack_vm_entry: EntryPoint::NONE, ..entry(0, 0, parameter_count) }
}

fn store_unit() -> CompiledUnit {
    let mut symbols = nullc_bytecode::SymbolBlob::default();
    let store_name = symbols.intern("store_value");
    let load_name = symbols.intern("load_value");

    let image = Image {
        modules: vec![module_entry(2)],
        global_segment_size: 4,
        functions: vec![
            FunctionEntry { name_offset: store_name, ..entry(0, 4, 1) },
            FunctionEntry { name_offset: load_name, ..entry(4, 3, 0) },
        ],
        stack_vm: InstructionStream {
            instructions: vec![
                // store_value(n): writes its one argument into this module's own global.
                VMCmd::new(VmOpcode::PushVTop, 0, 4, 16),
                VMCmd::new(VmOpcode::PushIntStk, 0, 0, 0),
                VMCmd::new(VmOpcode::MovInt, 0, 0, pack_global_operand(0, 0) as i32),
                VMCmd::simple(VmOpcode::Return),
                // load_value(): returns this module's own global.
                VMCmd::new(VmOpcode::PushVTop, 0, 0, 16),
                VMCmd::new(VmOpcode::PushInt, 0, 0, pack_global_operand(0, 0) as i32),
                VMCmd::simple(VmOpcode::Return),
            ],
            ..Default::default()
        },
        symbols,
        ..Default::default()
    };
    CompiledUnit::new("store", image).depends_on("padding")
}

fn main_unit() -> CompiledUnit {
    let mut symbols = nullc_bytecode::SymbolBlob::default();
    let store_name = symbols.intern("store_value");
    let load_name = symbols.intern("load_value");

    let image = Image {
        modules: vec![module_entry(1)],
        functions: vec![
            FunctionEntry { name_offset: store_name, ..import_stub(1) },
            FunctionEntry { name_offset: load_name, ..import_stub(0) },
            entry(0, 5, 0),
        ],
        stack_vm: InstructionStream {
            instructions: vec![
                VMCmd::new(VmOpcode::PushVTop, 0, 0, 16),
                VMCmd::new(VmOpcode::PushImmt, 0, 0, 77),
                VMCmd::new(VmOpcode::Call, 0, 0, 0), // store_value stub, local index 0
                VMCmd::new(VmOpcode::Call, 0, 0, 1), // load_value stub, local index 1
                VMCmd::simple(VmOpcode::Return),
            ],
            ..Default::default()
        },
        symbols,
        ..Default::default()
    };
    CompiledUnit::new("main", image).depends_on("store")
}

#[test]
fn write_then_read_round_trips_through_a_dependency_modules_global() {
    let merged = link(vec![main_unit(), store_unit(), padding_unit()]).unwrap();

    assert_eq!(merged.modules.len(), 3, "padding, store, and main each contribute one module");
    assert_eq!(merged.global_segment_size, 12, "8 (padding) + 4 (store) + 0 (main)");
    assert_eq!(merged.modules[1].global_variable_base_offset, 8, "store's global lands after padding's 8 bytes");

    let natives = NativeTable::default();
    let vm = StackVm::new(&merged, &natives, Vec::new());
    let mut globals = vec![0u8; merged.global_segment_size as usize];

    let run_index = merged.functions.len() as u32 - 1;
    let result = vm
        .call(run_index, &[], &mut globals, &ExecutionLimits::unbounded(), &mut CoroutineTable::default())
        .unwrap();
    assert_eq!(i32::from_le_bytes(result.try_into().unwrap()), 77);
    assert_eq!(i32::from_le_bytes(globals[8..12].try_into().unwrap()), 77, "value landed at store's merged offset");
}
