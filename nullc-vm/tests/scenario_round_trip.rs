//! A linked image still executes correctly after a `serialize`/`deserialize`
//! round trip through the on-disk container format.

use nullc_asm::{VMCmd, VmOpcode};
use nullc_bytecode::{EntryPoint, FunctionCategory, FunctionEntry, Image, InstructionStream, ReturnTypeTag};
use nullc_vm::vm::stack::StackVm;
use nullc_vm::{CoroutineTable, ExecutionLimits, NativeTable};

fn entry(length: u32) -> FunctionEntry {
    FunctionEntry {
        name_offset: 0,
        name_hash: 0,
        function_type_index: 0,
        return_type: ReturnTypeTag::Int,
        category: FunctionCategory::Bytecode,
        stack_vm_entry: EntryPoint { offset: 0, length },
        register_vm_entry: EntryPoint::NONE,
        parameter_count: 0,
        local_count: 0,
        frame_size: 16,
        locals_start: 0,
        upvalue_count: 0,
        native_arg_bytes: 0,
        defining_module: 0,
    }
}

#[test]
fn a_round_tripped_image_still_executes_its_entry_function() {
    let image = Image {
        functions: vec![entry(3)],
        stack_vm: InstructionStream {
            instructions: vec![
                VMCmd::new(VmOpcode::PushVTop, 0, 0, 16),
                VMCmd::new(VmOpcode::PushImmt, 0, 0, 7),
                VMCmd::simple(VmOpcode::Return),
            ],
            ..Default::default()
        },
        ..Default::default()
    };

    let bytes = image.serialize();
    let decoded = Image::deserialize(&bytes).unwrap();
    assert_eq!(decoded, image, "round trip is lossless");

    let natives = NativeTable::default();
    let vm = StackVm::new(&decoded, &natives, Vec::new());
    let mut globals = Vec::new();
    let result = vm
        .call(0, &[], &mut globals, &ExecutionLimits::unbounded(), &mut CoroutineTable::default())
        .unwrap();
    assert_eq!(i32::from_le_bytes(result.try_into().unwrap()), 7);
}

#[test]
fn a_truncated_buffer_is_rejected_rather_than_executed() {
    let image = Image {
        functions: vec![entry(1)],
        stack_vm: InstructionStream { instructions: vec![VMCmd::simple(VmOpcode::Return)], ..Default::default() },
        ..Default::default()
    };
    let mut bytes = image.serialize();
    bytes.truncate(bytes.len() - 1);
    assert!(Image::deserialize(&bytes).is_err());
}
