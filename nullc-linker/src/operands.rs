use nullc_asm::{RegVmCmd, RegVmOpcode, VMCmd, VmOpcode, REG_GLOBALS};
use nullc_bytecode::InstructionStream;
use nullc_types::{pack_global_operand, unpack_global_operand};

fn resolve(remap: &[u32], old_index: u32) -> u32 {
    remap.get(old_index as usize).copied().unwrap_or(old_index)
}

fn rewrite_global(operand: i32, module_remap: &[u32]) -> i32 {
    let (module_index, offset) = unpack_global_operand(operand as u32);
    let new_module = resolve(module_remap, module_index);
    pack_global_operand(new_module, offset) as i32
}

/// Rewrites one unit's stack-VM instruction stream in place as it is
/// appended to the merged image: global operands get their module tag
/// remapped, function/type index operands go through their respective
/// remaps, and branch targets are shifted by this unit's new base offset
/// in the merged stream (they are stable, in-stream-relative byte offsets
/// otherwise).
pub fn rewrite_stack_vm(cmd: VMCmd, type_remap: &[u32], function_remap: &[u32], module_remap: &[u32], stream_base: i32) -> VMCmd {
    let op = cmd.opcode;
    let int_arg = if op.has_global_operand() {
        rewrite_global(cmd.int_arg, module_remap)
    } else if op.has_function_index_operand() {
        resolve(function_remap, cmd.int_arg as u32) as i32
    } else if op.has_type_index_operand() {
        resolve(type_remap, cmd.int_arg as u32) as i32
    } else if op.is_branch() {
        cmd.int_arg + stream_base
    } else {
        cmd.int_arg
    };
    VMCmd { int_arg, ..cmd }
}

pub fn rewrite_register_vm(
    cmd: RegVmCmd,
    type_remap: &[u32],
    function_remap: &[u32],
    module_remap: &[u32],
    stream_base: i32,
) -> RegVmCmd {
    let op = cmd.opcode;
    let argument = if op.has_function_index_operand() {
        resolve(function_remap, cmd.argument as u32) as i32
    } else if op.has_type_index_operand() {
        resolve(type_remap, cmd.argument as u32) as i32
    } else if op.is_load_store() && cmd.ra == REG_GLOBALS {
        rewrite_global(cmd.argument, module_remap)
    } else if op.is_branch() {
        cmd.argument + stream_base
    } else {
        cmd.argument
    };
    RegVmCmd { argument, ..cmd }
}

/// Appends `unit`'s instructions and source map to `merged`, rewriting
/// every instruction's cross-referencing operands and shifting the source
/// map's instruction offsets and module tags to match.
pub fn merge_stack_vm_stream(
    merged: &mut InstructionStream<VMCmd>,
    unit: &InstructionStream<VMCmd>,
    type_remap: &[u32],
    function_remap: &[u32],
    module_remap: &[u32],
) {
    let stream_base = merged.instructions.len() as i32;
    for cmd in &unit.instructions {
        merged
            .instructions
            .push(rewrite_stack_vm(*cmd, type_remap, function_remap, module_remap, stream_base));
    }
    for entry in &unit.source_map.entries {
        merged.source_map.entries.push(nullc_bytecode::SourceMapEntry {
            instruction_offset: entry.instruction_offset + stream_base as u32,
            source_module: resolve(module_remap, entry.source_module),
            ..*entry
        });
    }
}

pub fn merge_register_vm_stream(
    merged: &mut InstructionStream<RegVmCmd>,
    unit: &InstructionStream<RegVmCmd>,
    type_remap: &[u32],
    function_remap: &[u32],
    module_remap: &[u32],
) {
    let stream_base = merged.instructions.len() as i32;
    for cmd in &unit.instructions {
        merged
            .instructions
            .push(rewrite_register_vm(*cmd, type_remap, function_remap, module_remap, stream_base));
    }
    for entry in &unit.source_map.entries {
        merged.source_map.entries.push(nullc_bytecode::SourceMapEntry {
            instruction_offset: entry.instruction_offset + stream_base as u32,
            source_module: resolve(module_remap, entry.source_module),
            ..*entry
        });
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use nullc_bytecode::SourceMap;

    #[test]
    fn global_operand_gets_module_tag_remapped_but_keeps_offset() {
        let packed = pack_global_operand(0, 0x1234);
        let cmd = VMCmd::new(VmOpcode::PushInt, 0, 0, packed as i32);
        let rewritten = rewrite_stack_vm(cmd, &[], &[], &[5], 0);
        assert_eq!(unpack_global_operand(rewritten.int_arg as u32), (5, 0x1234));
    }

    #[test]
    fn function_index_operand_is_remapped() {
        let cmd = VMCmd::new(VmOpcode::Call, 0, 0, 2);
        let rewritten = rewrite_stack_vm(cmd, &[], &[10, 11, 12], &[], 0);
        assert_eq!(rewritten.int_arg, 12);
    }

    #[test]
    fn branch_target_shifts_by_stream_base() {
        let cmd = VMCmd::new(VmOpcode::Jmp, 0, 0, 4);
        let rewritten = rewrite_stack_vm(cmd, &[], &[], &[], 100);
        assert_eq!(rewritten.int_arg, 104);
    }

    #[test]
    fn register_vm_global_load_is_remapped_only_when_base_is_globals_register() {
        let packed = pack_global_operand(0, 8);
        let global_load = RegVmCmd::new(RegVmOpcode::LoadDword, REG_GLOBALS, 2, 0, packed as i32);
        let rewritten = rewrite_register_vm(global_load, &[], &[], &[7], 0);
        assert_eq!(unpack_global_operand(rewritten.argument as u32), (7, 8));

        let frame_load = RegVmCmd::new(RegVmOpcode::LoadDword, nullc_asm::REG_FRAME, 2, 0, 16);
        let unchanged = rewrite_register_vm(frame_load, &[], &[], &[7], 0);
        assert_eq!(unchanged.argument, 16);
    }

    #[test]
    fn merging_two_unit_streams_shifts_second_units_branch_target() {
        let mut merged = InstructionStream::<VMCmd>::default();
        let first = InstructionStream {
            instructions: vec![VMCmd::simple(VmOpcode::Nop), VMCmd::simple(VmOpcode::Return)],
            source_map: SourceMap::default(),
            global_code_start: 0,
        };
        let second = InstructionStream {
            instructions: vec![VMCmd::new(VmOpcode::Jmp, 0, 0, 1)],
            source_map: SourceMap::default(),
            global_code_start: 0,
        };
        merge_stack_vm_stream(&mut merged, &first, &[], &[], &[]);
        merge_stack_vm_stream(&mut merged, &second, &[], &[], &[]);
        assert_eq!(merged.instructions[2].int_arg, 3);
    }
}
