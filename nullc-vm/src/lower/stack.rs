//! Lowers a value-IR function to a `VMCmd` stream.
//!
//! A block's top-level instruction list is its statements, in execution
//! order (`Store`, a discarded `Call`, and the block's terminator:
//! `Jump`/`Branch`/`Return`/`Yield`). Everything else — `Add`, `Load`,
//! `Index`, and the rest of the expression vocabulary — is only lowered
//! at the point some statement or another expression references it as an
//! operand, via [`Lowering::emit_value`], which looks the referenced
//! instruction up by id and re-emits it inline. This walks the stack
//! machine's "push operands immediately before using them" discipline
//! without a separate register allocator or value-reuse pass; a shared
//! subexpression is simply re-evaluated at each use. Forward jumps are
//! recorded as `(instruction_position, target_block)` fixups and patched
//! once every block's start offset is known, per the back-patching design
//! the source calls for instead of a mutable control-flow graph.

use std::collections::HashMap;

use nullc_asm::{VMCmd, VmOpcode};
use nullc_bytecode::{SourceMap, SourceMapEntry};
use nullc_types::pack_global_operand;

use crate::error::LowerError;
use crate::ir::{ConstantValue, IrFunction, IrInstruction, IrOp, IrOperand, NumericConversion};

/// Result of lowering one function: its code relative to offset 0, the
/// parallel source map, and the yield points a coroutine dispatch needs
/// (`resume_index` to the absolute offset, within this function's own
/// code, of the block it resumes).
pub struct LoweredFunction {
    pub code: Vec<VMCmd>,
    pub source_map: SourceMap,
    pub resume_points: Vec<(u32, u32)>,
}

struct Lowering<'f> {
    func: &'f IrFunction,
    by_id: HashMap<u32, &'f IrInstruction>,
    /// Ids consumed by some other instruction's `Value` operand. A
    /// `Call`/`CallPtr` in this set is lowered only where it's referenced,
    /// not again at its own top-level position, so a call feeding an
    /// enclosing expression (`n * factorial(n - 1)`) runs once instead of
    /// once as a discarded statement and once inline.
    referenced: std::collections::HashSet<u32>,
    code: Vec<VMCmd>,
    source_map: Vec<SourceMapEntry>,
    block_offsets: Vec<Option<u32>>,
    fixups: Vec<(usize, u32)>,
    resume_points: Vec<(u32, u32)>,
}

/// Lowers `func`'s prologue (`pushvtop`) and every reachable block.
pub fn lower_function(func: &IrFunction) -> Result<LoweredFunction, LowerError> {
    let mut by_id = HashMap::new();
    for block in &func.blocks {
        for instr in &block.instructions {
            by_id.insert(instr.id, instr);
        }
    }

    let mut referenced = std::collections::HashSet::new();
    for block in &func.blocks {
        for instr in &block.instructions {
            for operand in &instr.operands {
                if let IrOperand::Value(id) = operand {
                    referenced.insert(*id);
                }
            }
        }
    }

    let arg_bytes: u32 = func.parameter_types.iter().map(|t| t.byte_size).sum();
    let frame_bytes = nullc_types::align_up(arg_bytes, 16);

    let mut lowering = Lowering {
        func,
        by_id,
        referenced,
        code: vec![VMCmd::new(VmOpcode::PushVTop, 0, arg_bytes as u16, frame_bytes as i32)],
        source_map: Vec::new(),
        block_offsets: vec![None; func.blocks.len()],
        fixups: Vec::new(),
        resume_points: Vec::new(),
    };

    for (index, block) in func.blocks.iter().enumerate() {
        lowering.block_offsets[index] = Some(lowering.code.len() as u32);
        let next_block = func.blocks.get(index + 1).map(|b| b.index);
        lowering.lower_block(block, next_block)?;
    }

    for (position, target_block) in &lowering.fixups {
        let offset = lowering.block_offsets[*target_block as usize]
            .ok_or(LowerError::UnresolvedBranchTarget(*target_block, *target_block))?;
        lowering.code[*position].int_arg = offset as i32;
    }

    let resume_points = lowering
        .resume_points
        .iter()
        .map(|(resume_index, target_block)| {
            let offset = lowering.block_offsets[*target_block as usize]
                .ok_or(LowerError::UnresolvedBranchTarget(*target_block, *target_block))?;
            Ok((*resume_index, offset))
        })
        .collect::<Result<Vec<_>, LowerError>>()?;

    Ok(LoweredFunction {
        code: lowering.code,
        source_map: SourceMap { entries: lowering.source_map },
        resume_points,
    })
}

impl<'f> Lowering<'f> {
    fn lower_block(&mut self, block: &'f crate::ir::IrBlock, next_block: Option<u32>) -> Result<(), LowerError> {
        for instr in &block.instructions {
            self.lower_statement(instr, next_block)?;
        }
        Ok(())
    }

    fn lower_statement(&mut self, instr: &'f IrInstruction, next_block: Option<u32>) -> Result<(), LowerError> {
        match &instr.op {
            IrOp::Store { is_direct, module_tag } => {
                let [address, value] = [&instr.operands[0], &instr.operands[1]];
                self.emit_operand(value)?;
                if !*is_direct {
                    self.emit_operand(address)?;
                }
                let opcode = store_opcode(instr.ty.byte_size, *is_direct);
                let int_arg = if *is_direct {
                    match address {
                        IrOperand::Constant(c) => match c.value {
                            ConstantValue::GlobalOffset(offset) => pack_global_operand(*module_tag, offset) as i32,
                            _ => 0,
                        },
                        _ => 0,
                    }
                } else {
                    0
                };
                self.push(VMCmd::new(opcode, 0, instr.ty.byte_size as u16, int_arg), instr);
            }
            IrOp::Call { .. } | IrOp::CallPtr => {
                // A call some other instruction consumes as a value is
                // lowered only at that reference; lowering it again here
                // would run it twice.
                if !self.referenced.contains(&instr.id) {
                    self.emit_call(instr)?;
                    if instr.ty.byte_size > 0 {
                        self.push(VMCmd::simple(VmOpcode::Pop), instr);
                    }
                }
            }
            IrOp::Jump { target_block } => {
                // A jump to the block that's about to be emitted next is a
                // no-op: execution already falls through to it.
                if Some(*target_block) != next_block {
                    let position = self.code.len();
                    self.push(VMCmd::new(VmOpcode::Jmp, 0, 0, 0), instr);
                    self.fixups.push((position, *target_block));
                }
            }
            IrOp::Branch { target_true, target_false } => {
                self.emit_operand(&instr.operands[0])?;
                let position = self.code.len();
                self.push(VMCmd::new(VmOpcode::JmpNZ, 0, 0, 0), instr);
                self.fixups.push((position, *target_true));
                if Some(*target_false) != next_block {
                    let fallthrough = self.code.len();
                    self.push(VMCmd::new(VmOpcode::Jmp, 0, 0, 0), instr);
                    self.fixups.push((fallthrough, *target_false));
                }
            }
            IrOp::Return => {
                if let Some(value) = instr.operands.first() {
                    self.emit_operand(value)?;
                }
                self.push(VMCmd::new(VmOpcode::Return, 0, 0, 0), instr);
            }
            IrOp::Yield { resume_block } => {
                if let Some(value) = instr.operands.first() {
                    self.emit_operand(value)?;
                }
                let resume_index = self.resume_points.len() as u32 + 1;
                // The resume block's offset isn't known yet; record a
                // fixup against this yield's resume-index slot too, by
                // reusing the block-offset table once every block is laid
                // out.
                self.resume_points.push((resume_index, *resume_block));
                self.push(VMCmd::new(VmOpcode::Return, 1, 0, resume_index as i32), instr);
            }
            // Pure expression ops reached the top level unreferenced; they
            // have no side effect worth lowering standalone.
            _ => {}
        }
        Ok(())
    }

    fn emit_operand(&mut self, operand: &IrOperand) -> Result<(), LowerError> {
        match operand {
            IrOperand::Constant(c) => {
                match c.value {
                    ConstantValue::Int(v) => self.code.push(VMCmd::new(VmOpcode::PushImmt, 0, 0, v)),
                    ConstantValue::Long(v) => self.code.push(VMCmd::new(VmOpcode::PushImmt, 1, 0, v as i32)),
                    ConstantValue::Float(v) => self.code.push(VMCmd::new(VmOpcode::PushImmt, 2, 0, v.to_bits() as i32)),
                    ConstantValue::Double(v) => {
                        self.code.push(VMCmd::new(VmOpcode::PushImmt, 3, 0, v.to_bits() as i32))
                    }
                    ConstantValue::GlobalOffset(offset) => {
                        self.code.push(VMCmd::new(VmOpcode::PushInt, 0, 0, pack_global_operand(0, offset) as i32))
                    }
                    ConstantValue::FrameOffset(_) => {
                        unreachable!("a frame offset only appears as get_addr's own operand, never as a pushed value")
                    }
                }
                Ok(())
            }
            IrOperand::Value(id) => {
                let instr = *self
                    .by_id
                    .get(id)
                    .ok_or(LowerError::UnresolvedBranchTarget(*id, *id))?;
                self.emit_expression(instr)
            }
        }
    }

    fn emit_expression(&mut self, instr: &'f IrInstruction) -> Result<(), LowerError> {
        match &instr.op {
            IrOp::Load { is_direct, module_tag } => {
                let opcode = load_opcode(instr.ty.byte_size, *is_direct);
                let int_arg = if *is_direct {
                    match &instr.operands[0] {
                        IrOperand::Constant(c) => match c.value {
                            ConstantValue::GlobalOffset(offset) => pack_global_operand(*module_tag, offset) as i32,
                            _ => 0,
                        },
                        _ => 0,
                    }
                } else {
                    self.emit_operand(&instr.operands[0])?;
                    0
                };
                self.push(VMCmd::new(opcode, 0, instr.ty.byte_size as u16, int_arg), instr);
            }
            IrOp::GetAddr => {
                let (flag, int_arg) = match &instr.operands[0] {
                    IrOperand::Constant(c) => match c.value {
                        ConstantValue::GlobalOffset(offset) => (1u8, pack_global_operand(0, offset) as i32),
                        ConstantValue::FrameOffset(offset) => (0u8, offset as i32),
                        _ => (0u8, 0),
                    },
                    IrOperand::Value(_) => (0u8, 0),
                };
                self.push(VMCmd::new(VmOpcode::GetAddr, flag, 0, int_arg), instr);
            }
            IrOp::Index { element_size, fixed_size } => {
                self.emit_operand(&instr.operands[0])?;
                self.emit_operand(&instr.operands[1])?;
                match fixed_size {
                    // A fixed-size array's bound is known statically and
                    // travels as the opcode's own operand.
                    Some(array_size) => {
                        self.push(VMCmd::new(VmOpcode::Index, 0, *element_size as u16, *array_size as i32), instr);
                    }
                    // An unsized array's bound only exists at the value's
                    // own runtime length, pushed alongside its pointer; the
                    // stack form of indexing reads it off the stack instead.
                    None => {
                        self.push(VMCmd::new(VmOpcode::IndexStk, 0, *element_size as u16, 0), instr);
                    }
                }
            }
            IrOp::ConvertPtr { source_type, target_type } => {
                self.emit_operand(&instr.operands[0])?;
                self.push(VMCmd::new(VmOpcode::ConvertPtr, 0, *source_type as u16, *target_type as i32), instr);
            }
            IrOp::Convert(kind) => {
                // A double literal converted to float is folded at lowering
                // time into the float immediate directly, skipping the
                // runtime `dtof` entirely.
                if *kind == NumericConversion::DoubleToFloat {
                    if let IrOperand::Constant(c) = &instr.operands[0] {
                        if let ConstantValue::Double(v) = c.value {
                            self.push(VMCmd::new(VmOpcode::PushImmt, 2, 0, (v as f32).to_bits() as i32), instr);
                            return Ok(());
                        }
                    }
                }
                self.emit_operand(&instr.operands[0])?;
                self.push(VMCmd::simple(conversion_opcode(*kind)), instr);
            }
            IrOp::Neg | IrOp::LogNot => {
                self.emit_operand(&instr.operands[0])?;
                self.push(VMCmd::simple(arith_unary_opcode(&instr.op, instr.ty.category)), instr);
            }
            binary if is_binary_arith(binary) => {
                self.emit_operand(&instr.operands[0])?;
                match inc_dec_opcode(binary, instr.ty.category, &instr.operands[1]) {
                    Some(opcode) => self.push(VMCmd::simple(opcode), instr),
                    None => {
                        self.emit_operand(&instr.operands[1])?;
                        self.push(VMCmd::simple(arith_binary_opcode(binary, instr.ty.category)), instr);
                    }
                }
            }
            IrOp::Call { .. } | IrOp::CallPtr => self.emit_call(instr)?,
            _ => {}
        }
        Ok(())
    }

    /// Pushes a call's arguments (right-to-left) and its `call`/`callptr`
    /// opcode, leaving any return value on the stack. The statement-level
    /// caller decides whether to discard it; an expression-level caller
    /// consumes it as the next operand.
    fn emit_call(&mut self, instr: &'f IrInstruction) -> Result<(), LowerError> {
        match &instr.op {
            IrOp::Call { function_index } => {
                for operand in instr.operands.iter().rev() {
                    self.emit_operand(operand)?;
                }
                self.push(VMCmd::new(VmOpcode::Call, 0, 0, *function_index as i32), instr);
            }
            IrOp::CallPtr => {
                for operand in instr.operands.iter().rev() {
                    self.emit_operand(operand)?;
                }
                self.push(VMCmd::simple(VmOpcode::CallPtr), instr);
            }
            _ => unreachable!("emit_call called with a non-call instruction"),
        }
        Ok(())
    }

    fn push(&mut self, cmd: VMCmd, source: &IrInstruction) {
        self.source_map.push(SourceMapEntry {
            instruction_offset: self.code.len() as u32,
            source_module: 0,
            source_offset: source.source_offset,
            source_length: source.source_length,
        });
        self.code.push(cmd);
    }
}

fn is_binary_arith(op: &IrOp) -> bool {
    matches!(
        op,
        IrOp::Add
            | IrOp::Sub
            | IrOp::Mul
            | IrOp::Div
            | IrOp::Pow
            | IrOp::Mod
            | IrOp::Less
            | IrOp::Greater
            | IrOp::LEqual
            | IrOp::GEqual
            | IrOp::Equal
            | IrOp::NEqual
    )
}

fn arith_unary_opcode(op: &IrOp, category: nullc_types::PrimitiveCategory) -> VmOpcode {
    use nullc_types::PrimitiveCategory as P;
    match (op, category) {
        (IrOp::Neg, P::Long) => VmOpcode::NegL,
        (IrOp::Neg, P::Double) => VmOpcode::NegD,
        (IrOp::Neg, _) => VmOpcode::Neg,
        (IrOp::LogNot, P::Long) => VmOpcode::LogNotL,
        (IrOp::LogNot, _) => VmOpcode::LogNot,
        _ => unreachable!("arith_unary_opcode called with a non-unary op"),
    }
}

fn arith_binary_opcode(op: &IrOp, category: nullc_types::PrimitiveCategory) -> VmOpcode {
    use nullc_types::PrimitiveCategory as P;
    macro_rules! by_category {
        ($int:ident, $long:ident, $double:ident) => {
            match category {
                P::Long => VmOpcode::$long,
                P::Double => VmOpcode::$double,
                _ => VmOpcode::$int,
            }
        };
    }
    match op {
        IrOp::Add => by_category!(Add, AddL, AddD),
        IrOp::Sub => by_category!(Sub, SubL, SubD),
        IrOp::Mul => by_category!(Mul, MulL, MulD),
        IrOp::Div => by_category!(Div, DivL, DivD),
        IrOp::Pow => by_category!(Pow, PowL, PowD),
        IrOp::Mod => by_category!(Mod, ModL, ModD),
        IrOp::Less => by_category!(Less, LessL, LessD),
        IrOp::Greater => by_category!(Greater, GreaterL, GreaterD),
        IrOp::LEqual => by_category!(LEqual, LEqualL, LEqualD),
        IrOp::GEqual => by_category!(GEqual, GEqualL, GEqualD),
        IrOp::Equal => by_category!(Equal, EqualL, EqualD),
        IrOp::NEqual => by_category!(NEqual, NEqualL, NEqualD),
        _ => unreachable!("arith_binary_opcode called with a non-binary op"),
    }
}

/// Collapses `x + 1`/`x - 1` to the dedicated increment/decrement opcode,
/// matching the only two constants the source's increment-folding pass
/// recognizes. Returns `None` for anything else, leaving the caller to
/// emit the full binary op with both operands pushed.
fn inc_dec_opcode(op: &IrOp, category: nullc_types::PrimitiveCategory, rhs: &IrOperand) -> Option<VmOpcode> {
    use nullc_types::PrimitiveCategory as P;
    let IrOperand::Constant(c) = rhs else { return None };
    let is_one = match category {
        P::Long => matches!(c.value, ConstantValue::Long(1)),
        P::Double => matches!(c.value, ConstantValue::Double(d) if d == 1.0),
        _ => matches!(c.value, ConstantValue::Int(1)),
    };
    if !is_one {
        return None;
    }
    match (op, category) {
        (IrOp::Add, P::Long) => Some(VmOpcode::IncL),
        (IrOp::Add, P::Double) => Some(VmOpcode::IncD),
        (IrOp::Add, _) => Some(VmOpcode::IncI),
        (IrOp::Sub, P::Long) => Some(VmOpcode::DecL),
        (IrOp::Sub, P::Double) => Some(VmOpcode::DecD),
        (IrOp::Sub, _) => Some(VmOpcode::DecI),
        _ => None,
    }
}

fn conversion_opcode(kind: NumericConversion) -> VmOpcode {
    match kind {
        NumericConversion::DoubleToInt => VmOpcode::DtoI,
        NumericConversion::DoubleToLong => VmOpcode::DtoL,
        NumericConversion::DoubleToFloat => VmOpcode::DtoF,
        NumericConversion::IntToDouble => VmOpcode::ItoD,
        NumericConversion::IntToLong => VmOpcode::ItoL,
        NumericConversion::LongToDouble => VmOpcode::LtoD,
        NumericConversion::LongToInt => VmOpcode::LtoI,
    }
}

fn load_opcode(byte_size: u32, is_direct: bool) -> VmOpcode {
    match (byte_size, is_direct) {
        (1, true) => VmOpcode::PushChar,
        (2, true) => VmOpcode::PushShort,
        (4, true) => VmOpcode::PushInt,
        (8, true) => VmOpcode::PushDorL,
        (1, false) => VmOpcode::PushCharStk,
        (2, false) => VmOpcode::PushShortStk,
        (4, false) => VmOpcode::PushIntStk,
        (8, false) => VmOpcode::PushDorLStk,
        (_, true) => VmOpcode::PushCmplx,
        (_, false) => VmOpcode::PushCmplxStk,
    }
}

fn store_opcode(byte_size: u32, is_direct: bool) -> VmOpcode {
    match (byte_size, is_direct) {
        (1, true) => VmOpcode::MovChar,
        (2, true) => VmOpcode::MovShort,
        (4, true) => VmOpcode::MovInt,
        (8, true) => VmOpcode::MovDorL,
        (1, false) => VmOpcode::MovCharStk,
        (2, false) => VmOpcode::MovShortStk,
        (4, false) => VmOpcode::MovIntStk,
        (8, false) => VmOpcode::MovDorLStk,
        (_, true) => VmOpcode::MovCmplx,
        (_, false) => VmOpcode::MovCmplxStk,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ir::{ConstantValue, IrBlock, IrConstant, IrType};
    use nullc_types::PrimitiveCategory;

    fn int_ty() -> IrType {
        IrType::primitive(PrimitiveCategory::Int)
    }

    fn constant(value: i32) -> IrOperand {
        IrOperand::Constant(IrConstant { value: ConstantValue::Int(value), ty: int_ty() })
    }

    #[test]
    fn return_of_a_constant_lowers_to_immediate_then_return() {
        let func = IrFunction {
            function_index: 0,
            parameter_types: vec![],
            return_type: int_ty(),
            is_coroutine: false,
            blocks: vec![IrBlock {
                index: 0,
                instructions: vec![IrInstruction {
                    id: 0,
                    ty: int_ty(),
                    op: IrOp::Return,
                    operands: vec![constant(42)],
                    source_offset: 0,
                    source_length: 0,
                }],
            }],
        };
        let lowered = lower_function(&func).unwrap();
        assert_eq!(lowered.code[0].opcode, VmOpcode::PushVTop);
        assert_eq!(lowered.code[1], VMCmd::new(VmOpcode::PushImmt, 0, 0, 42));
        assert_eq!(lowered.code[2].opcode, VmOpcode::Return);
    }

    #[test]
    fn forward_branch_is_patched_to_the_later_blocks_offset() {
        let func = IrFunction {
            function_index: 0,
            parameter_types: vec![],
            return_type: int_ty(),
            is_coroutine: false,
            blocks: vec![
                IrBlock {
                    index: 0,
                    instructions: vec![IrInstruction {
                        id: 0,
                        ty: int_ty(),
                        op: IrOp::Jump { target_block: 2 },
                        operands: vec![],
                        source_offset: 0,
                        source_length: 0,
                    }],
                },
                IrBlock {
                    index: 1,
                    instructions: vec![IrInstruction {
                        id: 1,
                        ty: int_ty(),
                        op: IrOp::Return,
                        operands: vec![constant(1)],
                        source_offset: 0,
                        source_length: 0,
                    }],
                },
                IrBlock {
                    index: 2,
                    instructions: vec![IrInstruction {
                        id: 2,
                        ty: int_ty(),
                        op: IrOp::Return,
                        operands: vec![constant(0)],
                        source_offset: 0,
                        source_length: 0,
                    }],
                },
            ],
        };
        let lowered = lower_function(&func).unwrap();
        let jump = lowered.code.iter().find(|c| c.opcode == VmOpcode::Jmp).unwrap();
        assert_eq!(jump.int_arg, lowered.code.len() as i32 - 2);
    }

    #[test]
    fn jump_to_the_immediately_next_block_is_elided() {
        let func = IrFunction {
            function_index: 0,
            parameter_types: vec![],
            return_type: int_ty(),
            is_coroutine: false,
            blocks: vec![
                IrBlock {
                    index: 0,
                    instructions: vec![IrInstruction {
                        id: 0,
                        ty: int_ty(),
                        op: IrOp::Jump { target_block: 1 },
                        operands: vec![],
                        source_offset: 0,
                        source_length: 0,
                    }],
                },
                IrBlock {
                    index: 1,
                    instructions: vec![IrInstruction {
                        id: 1,
                        ty: int_ty(),
                        op: IrOp::Return,
                        operands: vec![constant(0)],
                        source_offset: 0,
                        source_length: 0,
                    }],
                },
            ],
        };
        let lowered = lower_function(&func).unwrap();
        assert!(lowered.code.iter().all(|c| c.opcode != VmOpcode::Jmp));
    }

    #[test]
    fn int_to_double_conversion_emits_the_conversion_opcode_after_its_operand() {
        let func = IrFunction {
            function_index: 0,
            parameter_types: vec![],
            return_type: int_ty(),
            is_coroutine: false,
            blocks: vec![IrBlock {
                index: 0,
                instructions: vec![
                    IrInstruction {
                        id: 0,
                        ty: IrType::primitive(PrimitiveCategory::Double),
                        op: IrOp::Convert(crate::ir::NumericConversion::IntToDouble),
                        operands: vec![constant(7)],
                        source_offset: 0,
                        source_length: 0,
                    },
                    IrInstruction {
                        id: 1,
                        ty: IrType::primitive(PrimitiveCategory::Double),
                        op: IrOp::Return,
                        operands: vec![IrOperand::Value(0)],
                        source_offset: 0,
                        source_length: 0,
                    },
                ],
            }],
        };
        let lowered = lower_function(&func).unwrap();
        let convert = lowered.code.iter().position(|c| c.opcode == VmOpcode::ItoD).unwrap();
        assert_eq!(lowered.code[convert - 1], VMCmd::new(VmOpcode::PushImmt, 0, 0, 7));
    }

    #[test]
    fn double_to_float_conversion_of_a_constant_folds_without_a_runtime_opcode() {
        let func = IrFunction {
            function_index: 0,
            parameter_types: vec![],
            return_type: int_ty(),
            is_coroutine: false,
            blocks: vec![IrBlock {
                index: 0,
                instructions: vec![
                    IrInstruction {
                        id: 0,
                        ty: IrType::primitive(PrimitiveCategory::Float),
                        op: IrOp::Convert(crate::ir::NumericConversion::DoubleToFloat),
                        operands: vec![IrOperand::Constant(IrConstant {
                            value: ConstantValue::Double(0.5),
                            ty: IrType::primitive(PrimitiveCategory::Double),
                        })],
                        source_offset: 0,
                        source_length: 0,
                    },
                    IrInstruction {
                        id: 1,
                        ty: IrType::primitive(PrimitiveCategory::Float),
                        op: IrOp::Return,
                        operands: vec![IrOperand::Value(0)],
                        source_offset: 0,
                        source_length: 0,
                    },
                ],
            }],
        };
        let lowered = lower_function(&func).unwrap();
        assert!(lowered.code.iter().all(|c| c.opcode != VmOpcode::DtoF));
        let immediate = lowered.code.iter().find(|c| c.opcode == VmOpcode::PushImmt && c.flag == 2).unwrap();
        assert_eq!(immediate.int_arg, 0.5f32.to_bits() as i32);
    }

    #[test]
    fn unsized_array_index_lowers_to_index_stk_with_no_static_bound() {
        let func = IrFunction {
            function_index: 0,
            parameter_types: vec![],
            return_type: int_ty(),
            is_coroutine: false,
            blocks: vec![IrBlock {
                index: 0,
                instructions: vec![IrInstruction {
                    id: 0,
                    ty: int_ty(),
                    op: IrOp::Index { element_size: 4, fixed_size: None },
                    operands: vec![constant(0), constant(1)],
                    source_offset: 0,
                    source_length: 0,
                }],
            }],
        };
        let lowered = lower_function(&func).unwrap();
        assert!(lowered.code.iter().all(|c| c.opcode != VmOpcode::Index));
        let index_stk = lowered.code.iter().find(|c| c.opcode == VmOpcode::IndexStk).unwrap();
        assert_eq!(index_stk.short_arg, 4);
    }

    #[test]
    fn fixed_size_array_index_still_lowers_to_index_with_its_bound() {
        let func = IrFunction {
            function_index: 0,
            parameter_types: vec![],
            return_type: int_ty(),
            is_coroutine: false,
            blocks: vec![IrBlock {
                index: 0,
                instructions: vec![IrInstruction {
                    id: 0,
                    ty: int_ty(),
                    op: IrOp::Index { element_size: 4, fixed_size: Some(3) },
                    operands: vec![constant(0), constant(1)],
                    source_offset: 0,
                    source_length: 0,
                }],
            }],
        };
        let lowered = lower_function(&func).unwrap();
        assert!(lowered.code.iter().all(|c| c.opcode != VmOpcode::IndexStk));
        let index = lowered.code.iter().find(|c| c.opcode == VmOpcode::Index).unwrap();
        assert_eq!(index.int_arg, 3);
    }

    #[test]
    fn yield_records_a_resume_point_and_tags_the_return_as_local() {
        let func = IrFunction {
            function_index: 0,
            parameter_types: vec![],
            return_type: int_ty(),
            is_coroutine: true,
            blocks: vec![IrBlock {
                index: 0,
                instructions: vec![IrInstruction {
                    id: 0,
                    ty: int_ty(),
                    op: IrOp::Yield { resume_block: 0 },
                    operands: vec![constant(1)],
                    source_offset: 0,
                    source_length: 0,
                }],
            }],
        };
        let lowered = lower_function(&func).unwrap();
        assert_eq!(lowered.resume_points, vec![(1, 1)]);
        let ret = lowered.code.last().unwrap();
        assert_eq!(ret.opcode, VmOpcode::Return);
        assert_eq!(ret.flag, 1);
        assert_eq!(ret.int_arg, 1);
    }
}
