//! A self-recursive function whose result feeds an enclosing expression
//! (`n * factorial(n - 1)`): exercises local-variable addressing through
//! `get_addr`/`FrameOffset` and the call-as-expression lowering path.

use nullc_bytecode::{EntryPoint, FunctionCategory, FunctionEntry, Image, InstructionStream, ReturnTypeTag};
use nullc_vm::ir::{ConstantValue, IrBlock, IrConstant, IrFunction, IrInstruction, IrOp, IrOperand, IrType};
use nullc_vm::lower::stack::lower_function;
use nullc_vm::vm::stack::StackVm;
use nullc_vm::{CoroutineTable, ExecutionLimits, NativeTable};

fn int_ty() -> IrType {
    IrType::primitive(nullc_types::PrimitiveCategory::Int)
}

fn constant(value: i32) -> IrOperand {
    IrOperand::Constant(IrConstant { value: ConstantValue::Int(value), ty: int_ty() })
}

/// `factorial(n) { if (n <= 1) return 1; return n * factorial(n - 1); }`
fn factorial_ir() -> IrFunction {
    let param_addr = IrInstruction {
        id: 0,
        ty: int_ty(),
        op: IrOp::GetAddr,
        operands: vec![IrOperand::Constant(IrConstant { value: ConstantValue::FrameOffset(0), ty: int_ty() })],
        source_offset: 0,
        source_length: 0,
    };
    let load_n = IrInstruction {
        id: 1,
        ty: int_ty(),
        op: IrOp::Load { is_direct: false, module_tag: 0 },
        operands: vec![IrOperand::Value(0)],
        source_offset: 0,
        source_length: 0,
    };
    let is_base_case = IrInstruction {
        id: 2,
        ty: int_ty(),
        op: IrOp::LEqual,
        operands: vec![IrOperand::Value(1), constant(1)],
        source_offset: 0,
        source_length: 0,
    };
    let branch = IrInstruction {
        id: 3,
        ty: int_ty(),
        op: IrOp::Branch { target_true: 1, target_false: 2 },
        operands: vec![IrOperand::Value(2)],
        source_offset: 0,
        source_length: 0,
    };
    let base_return = IrInstruction {
        id: 4,
        ty: int_ty(),
        op: IrOp::Return,
        operands: vec![constant(1)],
        source_offset: 0,
        source_length: 0,
    };
    let n_minus_one = IrInstruction {
        id: 5,
        ty: int_ty(),
        op: IrOp::Sub,
        operands: vec![IrOperand::Value(1), constant(1)],
        source_offset: 0,
        source_length: 0,
    };
    let recurse = IrInstruction {
        id: 6,
        ty: int_ty(),
        op: IrOp::Call { function_index: 0 },
        operands: vec![IrOperand::Value(5)],
        source_offset: 0,
        source_length: 0,
    };
    let product = IrInstruction {
        id: 7,
        ty: int_ty(),
        op: IrOp::Mul,
        operands: vec![IrOperand::Value(1), IrOperand::Value(6)],
        source_offset: 0,
        source_length: 0,
    };
    let recursive_return = IrInstruction {
        id: 8,
        ty: int_ty(),
        op: IrOp::Return,
        operands: vec![IrOperand::Value(7)],
        source_offset: 0,
        source_length: 0,
    };

    IrFunction {
        function_index: 0,
        parameter_types: vec![int_ty()],
        return_type: int_ty(),
        is_coroutine: false,
        blocks: vec![
            IrBlock { index: 0, instructions: vec![param_addr, load_n, is_base_case, branch] },
            IrBlock { index: 1, instructions: vec![base_return] },
            IrBlock { index: 2, instructions: vec![n_minus_one, recurse, product, recursive_return] },
        ],
    }
}

#[test]
fn factorial_of_five_is_120() {
    let lowered = lower_function(&factorial_ir()).unwrap();

    let image = Image {
        functions: vec![FunctionEntry {
            name_offset: 0,
            name_hash: 0,
            function_type_index: 0,
            return_type: ReturnTypeTag::Int,
            category: FunctionCategory::Bytecode,
            stack_vm_entry: EntryPoint { offset: 0, length: lowered.code.len() as u32 },
            register_vm_entry: EntryPoint::NONE,
            parameter_count: 1,
            local_count: 0,
            frame_size: 16,
            locals_start: 0,
            upvalue_count: 0,
            native_arg_bytes: 0,
            defining_module: 0,
        }],
        stack_vm: InstructionStream { instructions: lowered.code, ..Default::default() },
        ..Default::default()
    };

    let natives = NativeTable::default();
    let vm = StackVm::new(&image, &natives, Vec::new());
    let mut globals = Vec::new();
    let result = vm
        .call(0, &5i32.to_le_bytes(), &mut globals, &ExecutionLimits::unbounded(), &mut CoroutineTable::default())
        .unwrap();
    assert_eq!(i32::from_le_bytes(result.try_into().unwrap()), 120);
}
