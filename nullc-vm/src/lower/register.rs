//! Lowers a value-IR function to a `RegVmCmd` stream.
//!
//! The real register allocator lives in the (out-of-scope) value-IR layer;
//! this crate stands in a minimal sequential one (`RegisterAllocator`) that
//! never reuses a register once assigned, trading register pressure for the
//! simplicity of not tracking liveness. `r0`/`r1` stay reserved for
//! `REG_GLOBALS`/`REG_FRAME` per the calling convention; everything else is
//! handed out in instruction-id order the first time a value is needed.
//!
//! Coroutines are a stack-VM-only feature here: a `Yield` lowers as a plain
//! `Return`, since no named scenario drives a coroutine through the
//! register VM and the source material's `yield` encoding (the stack VM's
//! local-return flag) has no register-VM counterpart to borrow.

use std::collections::HashMap;

use nullc_asm::{RegVmCmd, RegVmOpcode, REG_FILE_SIZE, REG_FRAME, REG_GLOBALS, REG_RESERVED_COUNT};
use nullc_bytecode::{SourceMap, SourceMapEntry};
use nullc_types::{pack_global_operand, PrimitiveCategory};

use crate::error::LowerError;
use crate::ir::{ConstantValue, IrFunction, IrInstruction, IrOp, IrOperand, NumericConversion};

pub struct LoweredFunction {
    pub code: Vec<RegVmCmd>,
    pub source_map: SourceMap,
}

/// Hands out general-purpose registers above the two reserved slots,
/// failing once the per-frame file is exhausted.
pub struct RegisterAllocator {
    next: u16,
}

impl RegisterAllocator {
    pub fn new() -> Self {
        RegisterAllocator { next: REG_RESERVED_COUNT as u16 }
    }

    pub fn alloc(&mut self, function_index: u32) -> Result<u8, LowerError> {
        if self.next as usize >= REG_FILE_SIZE {
            return Err(LowerError::RegisterFileExhausted(function_index, self.next as u32));
        }
        let reg = self.next as u8;
        self.next += 1;
        Ok(reg)
    }
}

impl Default for RegisterAllocator {
    fn default() -> Self {
        Self::new()
    }
}

struct Lowering<'f> {
    func: &'f IrFunction,
    by_id: HashMap<u32, &'f IrInstruction>,
    registers: HashMap<u32, u8>,
    allocator: RegisterAllocator,
    code: Vec<RegVmCmd>,
    source_map: Vec<SourceMapEntry>,
    block_offsets: Vec<Option<u32>>,
    fixups: Vec<(usize, u32)>,
}

pub fn lower_function(func: &IrFunction) -> Result<LoweredFunction, LowerError> {
    let mut by_id = HashMap::new();
    for block in &func.blocks {
        for instr in &block.instructions {
            by_id.insert(instr.id, instr);
        }
    }

    let mut lowering = Lowering {
        func,
        by_id,
        registers: HashMap::new(),
        allocator: RegisterAllocator::new(),
        code: vec![RegVmCmd::simple(RegVmOpcode::Pushvtop)],
        source_map: Vec::new(),
        block_offsets: vec![None; func.blocks.len()],
        fixups: Vec::new(),
    };

    for (index, block) in func.blocks.iter().enumerate() {
        lowering.block_offsets[index] = Some(lowering.code.len() as u32);
        let next_block = func.blocks.get(index + 1).map(|b| b.index);
        for instr in &block.instructions {
            lowering.lower_statement(instr, next_block)?;
        }
    }

    for (position, target_block) in &lowering.fixups {
        let offset = lowering.block_offsets[*target_block as usize]
            .ok_or(LowerError::UnresolvedBranchTarget(*target_block, *target_block))?;
        lowering.code[*position].argument = offset as i32;
    }

    Ok(LoweredFunction { code: lowering.code, source_map: SourceMap { entries: lowering.source_map } })
}

impl<'f> Lowering<'f> {
    fn lower_statement(&mut self, instr: &'f IrInstruction, next_block: Option<u32>) -> Result<(), LowerError> {
        match &instr.op {
            IrOp::Store { is_direct, module_tag } => {
                let value_reg = self.operand_register(&instr.operands[1])?;
                let opcode = store_opcode(instr.ty.byte_size);
                if *is_direct {
                    let offset = global_offset(&instr.operands[0], *module_tag);
                    self.push(RegVmCmd::new(opcode, REG_GLOBALS, value_reg, 0, offset), instr);
                } else {
                    let addr_reg = self.operand_register(&instr.operands[0])?;
                    self.push(RegVmCmd::new(opcode, addr_reg, value_reg, 0, 0), instr);
                }
            }
            IrOp::Call { function_index } => {
                self.emit_call(instr, *function_index, false)?;
            }
            IrOp::CallPtr => {
                self.emit_call(instr, 0, true)?;
            }
            IrOp::Jump { target_block } => {
                if Some(*target_block) != next_block {
                    let position = self.code.len();
                    self.push(RegVmCmd::new(RegVmOpcode::Jmp, 0, 0, 0, 0), instr);
                    self.fixups.push((position, *target_block));
                }
            }
            IrOp::Branch { target_true, target_false } => {
                let cond = self.operand_register(&instr.operands[0])?;
                let position = self.code.len();
                self.push(RegVmCmd::new(RegVmOpcode::Jmpnz, cond, 0, 0, 0), instr);
                self.fixups.push((position, *target_true));
                if Some(*target_false) != next_block {
                    let fallthrough = self.code.len();
                    self.push(RegVmCmd::new(RegVmOpcode::Jmp, 0, 0, 0, 0), instr);
                    self.fixups.push((fallthrough, *target_false));
                }
            }
            IrOp::Return | IrOp::Yield { .. } => {
                let reg = match instr.operands.first() {
                    Some(operand) => self.operand_register(operand)?,
                    None => 0,
                };
                self.push(RegVmCmd::new(RegVmOpcode::Return, reg, 0, 0, 0), instr);
            }
            _ => {
                // A pure expression reached statement position unreferenced;
                // still evaluate it for any side effect its operands embed
                // (a call nested inside, for instance), but discard the
                // register it produces.
                self.operand_register(&IrOperand::Value(instr.id))?;
            }
        }
        Ok(())
    }

    fn emit_call(&mut self, instr: &'f IrInstruction, function_index: u32, indirect: bool) -> Result<(), LowerError> {
        for operand in &instr.operands {
            let reg = self.operand_register(operand)?;
            self.push(RegVmCmd::new(RegVmOpcode::Push, reg, 0, 0, 0), instr);
        }
        if indirect {
            self.push(RegVmCmd::simple(RegVmOpcode::CallPtr), instr);
        } else {
            self.push(RegVmCmd::new(RegVmOpcode::Call, 0, 0, 0, function_index as i32), instr);
        }
        if instr.ty.byte_size > 0 {
            let dest = self.allocator.alloc(self.func.function_index)?;
            self.registers.insert(instr.id, dest);
            self.push(RegVmCmd::new(RegVmOpcode::Mov, dest, 0, 0, 0), instr);
        }
        Ok(())
    }

    /// Returns the register holding `operand`'s value, assigning and
    /// emitting the code to produce it the first time it's referenced.
    fn operand_register(&mut self, operand: &IrOperand) -> Result<u8, LowerError> {
        match operand {
            IrOperand::Constant(c) => {
                let dest = self.allocator.alloc(self.func.function_index)?;
                match c.value {
                    ConstantValue::Int(v) => self.code.push(RegVmCmd::new(RegVmOpcode::LoadImm, dest, 0, 0, v)),
                    ConstantValue::Long(v) => self.code.push(RegVmCmd::new(RegVmOpcode::LoadImm, dest, 0, 0, v as i32)),
                    ConstantValue::Float(v) => {
                        self.code.push(RegVmCmd::new(RegVmOpcode::LoadImm, dest, 0, 0, v.to_bits() as i32))
                    }
                    ConstantValue::Double(v) => {
                        self.code.push(RegVmCmd::new(RegVmOpcode::LoadImm, dest, 0, 0, v.to_bits() as i32))
                    }
                    ConstantValue::GlobalOffset(offset) => self.code.push(RegVmCmd::new(
                        RegVmOpcode::LoadDword,
                        REG_GLOBALS,
                        dest,
                        0,
                        pack_global_operand(0, offset) as i32,
                    )),
                    ConstantValue::FrameOffset(_) => {
                        unreachable!("a frame offset only appears as get_addr's own operand")
                    }
                }
                Ok(dest)
            }
            IrOperand::Value(id) => {
                if let Some(reg) = self.registers.get(id) {
                    return Ok(*reg);
                }
                let instr = *self.by_id.get(id).ok_or(LowerError::UnresolvedBranchTarget(*id, *id))?;
                let reg = self.emit_expression(instr)?;
                self.registers.insert(*id, reg);
                Ok(reg)
            }
        }
    }

    fn emit_expression(&mut self, instr: &'f IrInstruction) -> Result<u8, LowerError> {
        match &instr.op {
            IrOp::Load { is_direct, module_tag } => {
                let dest = self.allocator.alloc(self.func.function_index)?;
                let opcode = load_opcode(instr.ty.byte_size);
                if *is_direct {
                    let offset = global_offset(&instr.operands[0], *module_tag);
                    self.push(RegVmCmd::new(opcode, REG_GLOBALS, dest, 0, offset), instr);
                } else {
                    let addr_reg = self.operand_register(&instr.operands[0])?;
                    self.push(RegVmCmd::new(opcode, addr_reg, dest, 0, 0), instr);
                }
                Ok(dest)
            }
            IrOp::GetAddr => {
                let dest = self.allocator.alloc(self.func.function_index)?;
                match &instr.operands[0] {
                    IrOperand::Constant(c) => match c.value {
                        ConstantValue::GlobalOffset(offset) => self.push(
                            RegVmCmd::new(RegVmOpcode::GetAddr, REG_GLOBALS, dest, 0, pack_global_operand(0, offset) as i32),
                            instr,
                        ),
                        ConstantValue::FrameOffset(offset) => {
                            self.push(RegVmCmd::new(RegVmOpcode::GetAddr, REG_FRAME, dest, 0, offset as i32), instr)
                        }
                        _ => self.push(RegVmCmd::new(RegVmOpcode::GetAddr, REG_FRAME, dest, 0, 0), instr),
                    },
                    IrOperand::Value(_) => self.push(RegVmCmd::new(RegVmOpcode::GetAddr, REG_FRAME, dest, 0, 0), instr),
                }
                Ok(dest)
            }
            IrOp::Index { element_size, fixed_size } => {
                let base = self.operand_register(&instr.operands[0])?;
                let index = self.operand_register(&instr.operands[1])?;
                let dest = self.allocator.alloc(self.func.function_index)?;
                let array_size = fixed_size.unwrap_or(0) & 0xffff;
                let argument = ((*element_size & 0xffff) << 16) as i32 | array_size as i32;
                self.push(RegVmCmd::new(RegVmOpcode::Index, base, index, dest, argument), instr);
                Ok(dest)
            }
            IrOp::ConvertPtr { source_type, target_type } => {
                let src = self.operand_register(&instr.operands[0])?;
                let dest = self.allocator.alloc(self.func.function_index)?;
                self.push(RegVmCmd::new(RegVmOpcode::ConvertPtr, src, dest, *source_type as u8, *target_type as i32), instr);
                Ok(dest)
            }
            IrOp::Neg | IrOp::LogNot => {
                let src = self.operand_register(&instr.operands[0])?;
                let dest = self.allocator.alloc(self.func.function_index)?;
                self.push(RegVmCmd::new(unary_opcode(&instr.op, instr.ty.category), dest, src, 0, 0), instr);
                Ok(dest)
            }
            IrOp::Convert(kind) => {
                let src = self.operand_register(&instr.operands[0])?;
                let dest = self.allocator.alloc(self.func.function_index)?;
                self.push(RegVmCmd::new(conversion_opcode(*kind), dest, src, 0, 0), instr);
                Ok(dest)
            }
            binary if is_binary_arith(binary) => {
                let lhs = self.operand_register(&instr.operands[0])?;
                let rhs = self.operand_register(&instr.operands[1])?;
                let dest = self.allocator.alloc(self.func.function_index)?;
                // Convention: `ra` is always the destination for a
                // three-address ALU op, `rb`/`rc` the two sources.
                self.push(RegVmCmd::new(binary_opcode(binary, instr.ty.category), dest, lhs, rhs, 0), instr);
                Ok(dest)
            }
            IrOp::Call { function_index } => {
                self.emit_call(instr, *function_index, false)?;
                Ok(self.registers[&instr.id])
            }
            IrOp::CallPtr => {
                self.emit_call(instr, 0, true)?;
                Ok(self.registers[&instr.id])
            }
            _ => {
                let dest = self.allocator.alloc(self.func.function_index)?;
                self.push(RegVmCmd::new(RegVmOpcode::LoadImm, dest, 0, 0, 0), instr);
                Ok(dest)
            }
        }
    }

    fn push(&mut self, cmd: RegVmCmd, source: &IrInstruction) {
        self.source_map.push(SourceMapEntry {
            instruction_offset: self.code.len() as u32,
            source_module: 0,
            source_offset: source.source_offset,
            source_length: source.source_length,
        });
        self.code.push(cmd);
    }
}

fn global_offset(operand: &IrOperand, module_tag: u32) -> i32 {
    match operand {
        IrOperand::Constant(c) => match c.value {
            ConstantValue::GlobalOffset(offset) => pack_global_operand(module_tag, offset) as i32,
            _ => 0,
        },
        _ => 0,
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

fn unary_opcode(op: &IrOp, category: PrimitiveCategory) -> RegVmOpcode {
    use PrimitiveCategory as P;
    match (op, category) {
        (IrOp::Neg, P::Long) => RegVmOpcode::Negl,
        (IrOp::Neg, P::Double) => RegVmOpcode::Negd,
        (IrOp::Neg, _) => RegVmOpcode::Neg,
        (IrOp::LogNot, P::Long) => RegVmOpcode::LogNotl,
        (IrOp::LogNot, _) => RegVmOpcode::LogNot,
        _ => unreachable!("unary_opcode called with a non-unary op"),
    }
}

fn binary_opcode(op: &IrOp, category: PrimitiveCategory) -> RegVmOpcode {
    use PrimitiveCategory as P;
    macro_rules! by_category {
        ($int:ident, $long:ident, $double:ident) => {
            match category {
                P::Long => RegVmOpcode::$long,
                P::Double => RegVmOpcode::$double,
                _ => RegVmOpcode::$int,
            }
        };
    }
    match op {
        IrOp::Add => by_category!(Add, Addl, Addd),
        IrOp::Sub => by_category!(Sub, Subl, Subd),
        IrOp::Mul => by_category!(Mul, Mull, Muld),
        IrOp::Div => by_category!(Div, Divl, Divd),
        IrOp::Pow => by_category!(Pow, Powl, Powd),
        IrOp::Mod => by_category!(Mod, Modl, Modd),
        IrOp::Less => by_category!(Less, Lessl, Lessd),
        IrOp::Greater => by_category!(Greater, Greaterl, Greaterd),
        IrOp::LEqual => by_category!(Lequal, Lequall, Lequald),
        IrOp::GEqual => by_category!(Gequal, Gequall, Gequald),
        IrOp::Equal => by_category!(Equal, Equall, Equald),
        IrOp::NEqual => by_category!(Nequal, Nequall, Nequald),
        _ => unreachable!("binary_opcode called with a non-binary op"),
    }
}

fn conversion_opcode(kind: NumericConversion) -> RegVmOpcode {
    match kind {
        NumericConversion::DoubleToInt => RegVmOpcode::DtoI,
        NumericConversion::DoubleToLong => RegVmOpcode::DtoL,
        NumericConversion::DoubleToFloat => RegVmOpcode::DtoF,
        NumericConversion::IntToDouble => RegVmOpcode::ItoD,
        NumericConversion::IntToLong => RegVmOpcode::ItoL,
        NumericConversion::LongToDouble => RegVmOpcode::LtoD,
        NumericConversion::LongToInt => RegVmOpcode::LtoI,
    }
}

fn load_opcode(byte_size: u32) -> RegVmOpcode {
    match byte_size {
        1 => RegVmOpcode::LoadByte,
        2 => RegVmOpcode::LoadWord,
        4 => RegVmOpcode::LoadDword,
        _ => RegVmOpcode::LoadQword,
    }
}

fn store_opcode(byte_size: u32) -> RegVmOpcode {
    match byte_size {
        1 => RegVmOpcode::StoreByte,
        2 => RegVmOpcode::StoreWord,
        4 => RegVmOpcode::StoreDword,
        _ => RegVmOpcode::StoreQword,
    }
}
