//! The stack VM: a dispatch loop over `VMCmd` against a flat byte memory
//! region. The global segment occupies `[0, global_segment_size)`; the
//! operand stack grows above it, so a `get_addr`-produced pointer
//! addresses either region uniformly, the way a real process's data
//! segment and stack coexist in one address space.

use nullc_asm::{VMCmd, VmOpcode};
use nullc_bytecode::{BytecodeError, FunctionCategory, FunctionEntry, Image};
use nullc_types::unpack_global_operand;

use crate::cancellation::ExecutionLimits;
use crate::coroutine::{unyield_target, CoroutineTable};
use crate::error::{RuntimeError, VmError};
use crate::native::NativeTable;

struct CallFrame {
    return_pc: u32,
    saved_frame_top: u32,
    saved_frame_end: u32,
    function_index: u32,
}

fn read_i32(mem: &[u8], at: usize) -> i32 {
    i32::from_le_bytes(mem[at..at + 4].try_into().unwrap())
}

fn write_i32(mem: &mut [u8], at: usize, value: i32) {
    mem[at..at + 4].copy_from_slice(&value.to_le_bytes());
}

fn pop_i32(stack: &mut Vec<u8>) -> i32 {
    let at = stack.len() - 4;
    let value = read_i32(stack, at);
    stack.truncate(at);
    value
}

fn push_i32(stack: &mut Vec<u8>, value: i32) {
    stack.extend_from_slice(&value.to_le_bytes());
}

fn read_i64(mem: &[u8], at: usize) -> i64 {
    i64::from_le_bytes(mem[at..at + 8].try_into().unwrap())
}

fn write_i64(mem: &mut [u8], at: usize, value: i64) {
    mem[at..at + 8].copy_from_slice(&value.to_le_bytes());
}

fn pop_i64(stack: &mut Vec<u8>) -> i64 {
    let at = stack.len() - 8;
    let value = read_i64(stack, at);
    stack.truncate(at);
    value
}

fn push_i64(stack: &mut Vec<u8>, value: i64) {
    stack.extend_from_slice(&value.to_le_bytes());
}

fn pop_f64(stack: &mut Vec<u8>) -> f64 {
    f64::from_bits(pop_i64(stack) as u64)
}

fn push_f64(stack: &mut Vec<u8>, value: f64) {
    push_i64(stack, value.to_bits() as i64);
}

fn pop_u8(stack: &mut Vec<u8>) -> i32 {
    pop_i32(stack) as u8 as i32
}

fn pop_u16(stack: &mut Vec<u8>) -> i32 {
    pop_i32(stack) as u16 as i32
}

fn binop_i64(stack: &mut Vec<u8>, f: impl Fn(i64, i64) -> i64) {
    let b = pop_i64(stack);
    let a = pop_i64(stack);
    push_i64(stack, f(a, b));
}

fn cmp_i64(stack: &mut Vec<u8>, f: impl Fn(i64, i64) -> bool) {
    let b = pop_i64(stack);
    let a = pop_i64(stack);
    push_i32(stack, f(a, b) as i32);
}

fn binop_f64(stack: &mut Vec<u8>, f: impl Fn(f64, f64) -> f64) {
    let b = pop_f64(stack);
    let a = pop_f64(stack);
    push_f64(stack, f(a, b));
}

fn cmp_f64(stack: &mut Vec<u8>, f: impl Fn(f64, f64) -> bool) {
    let b = pop_f64(stack);
    let a = pop_f64(stack);
    push_i32(stack, f(a, b) as i32);
}

/// Executes one linked image's stack-VM instruction stream, a call at a
/// time. `resume_points`, keyed by function index, is the per-function
/// yield-point table a coroutine-bearing function's lowering produced;
/// its absence means "not a coroutine", so every call dispatches to the
/// entry offset.
pub struct StackVm<'i> {
    functions: &'i [FunctionEntry],
    modules_global_base: Vec<u32>,
    instructions: &'i [VMCmd],
    natives: &'i NativeTable,
    resume_points: Vec<(u32, Vec<(u32, u32)>)>,
}

impl<'i> StackVm<'i> {
    pub fn new(image: &'i Image, natives: &'i NativeTable, resume_points: Vec<(u32, Vec<(u32, u32)>)>) -> Self {
        StackVm {
            functions: &image.functions,
            modules_global_base: image.modules.iter().map(|m| m.global_variable_base_offset).collect(),
            instructions: &image.stack_vm.instructions,
            natives,
            resume_points,
        }
    }

    fn global_address(&self, packed: u32) -> usize {
        let (module_index, offset) = unpack_global_operand(packed);
        let base = self.modules_global_base.get(module_index as usize).copied().unwrap_or(0);
        (base + offset) as usize
    }

    fn entry_offset(&self, function_index: u32, entry: &FunctionEntry, coroutines: &CoroutineTable) -> u32 {
        match self.resume_points.iter().find(|(f, _)| *f == function_index) {
            Some((_, points)) => {
                unyield_target(coroutines.saved_resume_index(function_index), points, entry.stack_vm_entry.offset)
            }
            None => entry.stack_vm_entry.offset,
        }
    }

    /// Invokes `function_index` with `args` already marshalled into
    /// little-endian bytes, against `global_segment` (shared across calls
    /// on the same image) and returns the callee's marshalled result.
    pub fn call(
        &self,
        function_index: u32,
        args: &[u8],
        global_segment: &mut Vec<u8>,
        limits: &ExecutionLimits,
        coroutines: &mut CoroutineTable,
    ) -> Result<Vec<u8>, VmError> {
        let entry = self.function(function_index)?;

        if entry.category == FunctionCategory::Native {
            return self.call_native(function_index, args);
        }

        let mut stack: Vec<u8> = args.to_vec();
        let mut frame_top: u32 = 0;
        let mut frame_end: u32 = stack.len() as u32;
        let mut frames: Vec<CallFrame> = Vec::new();
        let mut ip = self.entry_offset(function_index, entry, coroutines);
        let mut current_function = function_index;

        loop {
            limits.tick()?;
            let cmd = *self.instructions.get(ip as usize).ok_or(BytecodeError::IndexOutOfBounds {
                table: "stack_vm instructions",
                index: ip,
                len: self.instructions.len() as u32,
            })?;
            let fallthrough = ip + 1;
            ip = fallthrough;

            if let Some(result) = self.step(
                cmd,
                &mut stack,
                &mut frame_top,
                &mut frame_end,
                &mut ip,
                &mut frames,
                global_segment,
                coroutines,
                &mut current_function,
            )? {
                return Ok(result);
            }
        }
    }

    fn function(&self, function_index: u32) -> Result<&FunctionEntry, VmError> {
        self.functions.get(function_index as usize).ok_or_else(|| {
            VmError::from(BytecodeError::IndexOutOfBounds {
                table: "functions",
                index: function_index,
                len: self.functions.len() as u32,
            })
        })
    }

    fn call_native(&self, function_index: u32, args: &[u8]) -> Result<Vec<u8>, VmError> {
        let binding = self.natives.get(function_index).ok_or_else(|| {
            VmError::Runtime(RuntimeError::NativeAbiMismatch(format!(
                "function {function_index} has no registered native binding"
            )))
        })?;
        Ok((binding.trampoline)(args)?)
    }

    #[allow(clippy::too_many_arguments)]
    #[tracing::instrument(level = "trace", skip_all, fields(opcode = ?cmd.opcode))]
    fn step(
        &self,
        cmd: VMCmd,
        stack: &mut Vec<u8>,
        frame_top: &mut u32,
        frame_end: &mut u32,
        ip: &mut u32,
        frames: &mut Vec<CallFrame>,
        global_segment: &mut Vec<u8>,
        coroutines: &mut CoroutineTable,
        current_function: &mut u32,
    ) -> Result<Option<Vec<u8>>, VmError> {
        match cmd.opcode {
            VmOpcode::Nop => {}

            VmOpcode::PushImmt => push_i32(stack, cmd.int_arg),

            VmOpcode::PushInt | VmOpcode::PushFloat => {
                let at = self.global_address(cmd.int_arg as u32);
                push_i32(stack, read_i32(global_segment, at));
            }
            VmOpcode::PushIntStk | VmOpcode::PushFloatStk => {
                let addr = pop_i32(stack) as usize + cmd.int_arg as usize;
                push_i32(stack, read_i32(memory_at(global_segment, stack, addr), local_offset(global_segment, addr)));
            }

            VmOpcode::MovInt | VmOpcode::MovFloat => {
                let value = pop_i32(stack);
                let at = self.global_address(cmd.int_arg as u32);
                write_i32(global_segment, at, value);
            }
            VmOpcode::MovIntStk | VmOpcode::MovFloatStk => {
                let addr = pop_i32(stack) as usize + cmd.int_arg as usize;
                let value = pop_i32(stack);
                write_scalar(global_segment, stack, addr, value);
            }

            VmOpcode::PushChar => {
                let at = self.global_address(cmd.int_arg as u32);
                push_i32(stack, global_segment[at] as i32);
            }
            VmOpcode::PushCharStk => {
                let addr = pop_i32(stack) as usize + cmd.int_arg as usize;
                let byte = memory_at(global_segment, stack, addr)[local_offset(global_segment, addr)];
                push_i32(stack, byte as i32);
            }
            VmOpcode::MovChar => {
                let value = pop_u8(stack);
                let at = self.global_address(cmd.int_arg as u32);
                global_segment[at] = value as u8;
            }
            VmOpcode::MovCharStk => {
                let addr = pop_i32(stack) as usize + cmd.int_arg as usize;
                let value = pop_u8(stack);
                write_bytes(global_segment, stack, addr, &[value as u8]);
            }

            VmOpcode::PushShort => {
                let at = self.global_address(cmd.int_arg as u32);
                push_i32(stack, u16::from_le_bytes(global_segment[at..at + 2].try_into().unwrap()) as i32);
            }
            VmOpcode::PushShortStk => {
                let addr = pop_i32(stack) as usize + cmd.int_arg as usize;
                let off = local_offset(global_segment, addr);
                let bytes = &memory_at(global_segment, stack, addr)[off..off + 2];
                push_i32(stack, u16::from_le_bytes(bytes.try_into().unwrap()) as i32);
            }
            VmOpcode::MovShort => {
                let value = pop_u16(stack);
                let at = self.global_address(cmd.int_arg as u32);
                global_segment[at..at + 2].copy_from_slice(&(value as u16).to_le_bytes());
            }
            VmOpcode::MovShortStk => {
                let addr = pop_i32(stack) as usize + cmd.int_arg as usize;
                let value = pop_u16(stack);
                write_bytes(global_segment, stack, addr, &(value as u16).to_le_bytes());
            }

            VmOpcode::PushDorL => {
                let at = self.global_address(cmd.int_arg as u32);
                push_i64(stack, read_i64(global_segment, at));
            }
            VmOpcode::PushDorLStk => {
                let addr = pop_i32(stack) as usize + cmd.int_arg as usize;
                let off = local_offset(global_segment, addr);
                push_i64(stack, read_i64(memory_at(global_segment, stack, addr), off));
            }
            VmOpcode::MovDorL => {
                let value = pop_i64(stack);
                let at = self.global_address(cmd.int_arg as u32);
                write_i64(global_segment, at, value);
            }
            VmOpcode::MovDorLStk => {
                let addr = pop_i32(stack) as usize + cmd.int_arg as usize;
                let value = pop_i64(stack);
                write_bytes(global_segment, stack, addr, &value.to_le_bytes());
            }

            VmOpcode::PushCmplx => {
                let size = cmd.short_arg as usize;
                let at = self.global_address(cmd.int_arg as u32);
                stack.extend_from_slice(&global_segment[at..at + size]);
            }
            VmOpcode::PushCmplxStk => {
                let size = cmd.short_arg as usize;
                let addr = pop_i32(stack) as usize + cmd.int_arg as usize;
                let off = local_offset(global_segment, addr);
                let bytes = memory_at(global_segment, stack, addr)[off..off + size].to_vec();
                stack.extend_from_slice(&bytes);
            }
            VmOpcode::MovCmplx => {
                let size = cmd.short_arg as usize;
                let at = stack.len() - size;
                let value = stack[at..].to_vec();
                stack.truncate(at);
                let dest = self.global_address(cmd.int_arg as u32);
                global_segment[dest..dest + size].copy_from_slice(&value);
            }
            VmOpcode::MovCmplxStk => {
                let size = cmd.short_arg as usize;
                let addr = pop_i32(stack) as usize + cmd.int_arg as usize;
                let at = stack.len() - size;
                let value = stack[at..].to_vec();
                stack.truncate(at);
                write_bytes(global_segment, stack, addr, &value);
            }

            VmOpcode::PushTypeId | VmOpcode::PushPtrImmt => push_i32(stack, cmd.int_arg),
            VmOpcode::PushPtr => push_i32(stack, self.global_address(cmd.int_arg as u32) as i32),

            VmOpcode::Pop => {
                stack.truncate(stack.len() - cmd.short_arg.max(4) as usize);
            }

            VmOpcode::PushVTop => {
                let args_start = stack.len() as u32 - cmd.short_arg as u32;
                frames_save_frame_top(frame_top, stack, args_start);
                let needed = args_start + cmd.int_arg as u32;
                stack.resize(needed as usize, 0);
                *frame_top = args_start;
                // Locals occupy `[frame_top, frame_end)`; only bytes pushed
                // above `frame_end` are a `return`'s actual result, so a
                // padded-out frame's unused bytes never leak into it.
                *frame_end = needed;
            }

            VmOpcode::GetAddr => {
                // Local and global addresses share one numeric space so a
                // pointer value doesn't need a side tag: locals are offset
                // past the (fixed-size, never-resized) global segment.
                let address = if cmd.flag == 1 {
                    self.global_address(cmd.int_arg as u32)
                } else {
                    global_segment.len() + *frame_top as usize + cmd.int_arg as usize
                };
                push_i32(stack, address as i32);
            }

            VmOpcode::Index => {
                let index = pop_i32(stack);
                let base = pop_i32(stack);
                let array_size = cmd.int_arg as i64;
                if array_size > 0 && (index < 0 || index as i64 >= array_size) {
                    return Err(RuntimeError::ArrayOutOfBounds { index: index as i64, size: array_size as u32 }.into());
                }
                push_i32(stack, base + index * cmd.short_arg as i32);
            }
            VmOpcode::IndexStk => {
                // An unsized array value is a `{pointer, length}` pair; the
                // length travels on the stack right above the pointer
                // instead of coming from a static operand, so every access
                // is bounds-checked against the value's own runtime length.
                let index = pop_i32(stack);
                let length = pop_i32(stack);
                let base = pop_i32(stack);
                if index < 0 || index as i64 >= length as i64 {
                    return Err(RuntimeError::ArrayOutOfBounds { index: index as i64, size: length as u32 }.into());
                }
                push_i32(stack, base + index * cmd.short_arg as i32);
            }

            VmOpcode::ConvertPtr => {
                // `short_arg` carries the operand's static source type, 0
                // meaning "no static type to check" (an untyped/primitive
                // pointer, or one produced by `Index` with no element-type
                // info); such pointers pass through unchecked, matching
                // the legacy always-succeeds behavior.
                let source_type = cmd.short_arg as u32;
                let target_type = cmd.int_arg as u32;
                if source_type != 0 && source_type != target_type {
                    return Err(RuntimeError::InvalidPointerCast { target_type }.into());
                }
            }

            VmOpcode::FuncAddr => push_i32(stack, cmd.int_arg),

            VmOpcode::Add => binop_i32(stack, i32::wrapping_add),
            VmOpcode::Sub => binop_i32(stack, i32::wrapping_sub),
            VmOpcode::Mul => binop_i32(stack, i32::wrapping_mul),
            VmOpcode::Div => {
                let b = pop_i32(stack);
                let a = pop_i32(stack);
                if b == 0 {
                    return Err(RuntimeError::DivisionByZero.into());
                }
                push_i32(stack, a.wrapping_div(b));
            }
            VmOpcode::Mod => {
                let b = pop_i32(stack);
                let a = pop_i32(stack);
                if b == 0 {
                    return Err(RuntimeError::DivisionByZero.into());
                }
                push_i32(stack, a.wrapping_rem(b));
            }
            VmOpcode::Pow => {
                let exponent = pop_i32(stack);
                let base = pop_i32(stack);
                if exponent < 0 {
                    return Err(RuntimeError::InvalidOperand("negative exponent on integer power".into()).into());
                }
                push_i32(stack, base.wrapping_pow(exponent as u32));
            }
            VmOpcode::BitAnd => binop_i32(stack, |a, b| a & b),
            VmOpcode::BitOr => binop_i32(stack, |a, b| a | b),
            VmOpcode::BitXor => binop_i32(stack, |a, b| a ^ b),
            VmOpcode::Shl => binop_i32(stack, |a, b| a.wrapping_shl(b as u32)),
            VmOpcode::Shr => binop_i32(stack, |a, b| a.wrapping_shr(b as u32)),
            VmOpcode::Neg => {
                let v = pop_i32(stack);
                push_i32(stack, v.wrapping_neg());
            }
            VmOpcode::LogNot | VmOpcode::BitNot => {
                let v = pop_i32(stack);
                push_i32(stack, if cmd.opcode == VmOpcode::LogNot { (v == 0) as i32 } else { !v });
            }
            VmOpcode::IncI => {
                let v = pop_i32(stack);
                push_i32(stack, v.wrapping_add(1));
            }
            VmOpcode::DecI => {
                let v = pop_i32(stack);
                push_i32(stack, v.wrapping_sub(1));
            }
            VmOpcode::LogXor => {
                let b = pop_i32(stack);
                let a = pop_i32(stack);
                push_i32(stack, ((a != 0) ^ (b != 0)) as i32);
            }

            VmOpcode::Less => cmp_i32(stack, |a, b| a < b),
            VmOpcode::Greater => cmp_i32(stack, |a, b| a > b),
            VmOpcode::LEqual => cmp_i32(stack, |a, b| a <= b),
            VmOpcode::GEqual => cmp_i32(stack, |a, b| a >= b),
            VmOpcode::Equal => cmp_i32(stack, |a, b| a == b),
            VmOpcode::NEqual => cmp_i32(stack, |a, b| a != b),

            VmOpcode::AddL => binop_i64(stack, i64::wrapping_add),
            VmOpcode::SubL => binop_i64(stack, i64::wrapping_sub),
            VmOpcode::MulL => binop_i64(stack, i64::wrapping_mul),
            VmOpcode::DivL => {
                let b = pop_i64(stack);
                let a = pop_i64(stack);
                if b == 0 {
                    return Err(RuntimeError::DivisionByZero.into());
                }
                push_i64(stack, a.wrapping_div(b));
            }
            VmOpcode::ModL => {
                let b = pop_i64(stack);
                let a = pop_i64(stack);
                if b == 0 {
                    return Err(RuntimeError::DivisionByZero.into());
                }
                push_i64(stack, a.wrapping_rem(b));
            }
            VmOpcode::PowL => {
                let exponent = pop_i64(stack);
                let base = pop_i64(stack);
                if exponent < 0 {
                    return Err(RuntimeError::InvalidOperand("negative exponent on integer power".into()).into());
                }
                push_i64(stack, base.wrapping_pow(exponent as u32));
            }
            VmOpcode::BitAndL => binop_i64(stack, |a, b| a & b),
            VmOpcode::BitOrL => binop_i64(stack, |a, b| a | b),
            VmOpcode::BitXorL => binop_i64(stack, |a, b| a ^ b),
            VmOpcode::ShlL => binop_i64(stack, |a, b| a.wrapping_shl(b as u32)),
            VmOpcode::ShrL => binop_i64(stack, |a, b| a.wrapping_shr(b as u32)),
            VmOpcode::NegL => {
                let v = pop_i64(stack);
                push_i64(stack, v.wrapping_neg());
            }
            VmOpcode::LogNotL => {
                let v = pop_i64(stack);
                push_i32(stack, (v == 0) as i32);
            }
            VmOpcode::BitNotL => {
                let v = pop_i64(stack);
                push_i64(stack, !v);
            }
            VmOpcode::LogXorL => {
                let b = pop_i64(stack);
                let a = pop_i64(stack);
                push_i32(stack, ((a != 0) ^ (b != 0)) as i32);
            }
            VmOpcode::IncL => {
                let v = pop_i64(stack);
                push_i64(stack, v.wrapping_add(1));
            }
            VmOpcode::DecL => {
                let v = pop_i64(stack);
                push_i64(stack, v.wrapping_sub(1));
            }

            VmOpcode::LessL => cmp_i64(stack, |a, b| a < b),
            VmOpcode::GreaterL => cmp_i64(stack, |a, b| a > b),
            VmOpcode::LEqualL => cmp_i64(stack, |a, b| a <= b),
            VmOpcode::GEqualL => cmp_i64(stack, |a, b| a >= b),
            VmOpcode::EqualL => cmp_i64(stack, |a, b| a == b),
            VmOpcode::NEqualL => cmp_i64(stack, |a, b| a != b),

            VmOpcode::AddD => binop_f64(stack, |a, b| a + b),
            VmOpcode::SubD => binop_f64(stack, |a, b| a - b),
            VmOpcode::MulD => binop_f64(stack, |a, b| a * b),
            VmOpcode::DivD => binop_f64(stack, |a, b| a / b),
            VmOpcode::ModD => binop_f64(stack, |a, b| a % b),
            VmOpcode::PowD => binop_f64(stack, f64::powf),
            VmOpcode::NegD => {
                let v = pop_f64(stack);
                push_f64(stack, -v);
            }
            VmOpcode::IncD => {
                let v = pop_f64(stack);
                push_f64(stack, v + 1.0);
            }
            VmOpcode::DecD => {
                let v = pop_f64(stack);
                push_f64(stack, v - 1.0);
            }

            VmOpcode::LessD => cmp_f64(stack, |a, b| a < b),
            VmOpcode::GreaterD => cmp_f64(stack, |a, b| a > b),
            VmOpcode::LEqualD => cmp_f64(stack, |a, b| a <= b),
            VmOpcode::GEqualD => cmp_f64(stack, |a, b| a >= b),
            VmOpcode::EqualD => cmp_f64(stack, |a, b| a == b),
            VmOpcode::NEqualD => cmp_f64(stack, |a, b| a != b),

            VmOpcode::DtoI => {
                let v = pop_f64(stack);
                push_i32(stack, v as i32);
            }
            VmOpcode::DtoL => {
                let v = pop_f64(stack);
                push_i64(stack, v as i64);
            }
            VmOpcode::DtoF => {
                let v = pop_f64(stack);
                push_i32(stack, (v as f32).to_bits() as i32);
            }
            VmOpcode::ItoD => {
                let v = pop_i32(stack);
                push_f64(stack, v as f64);
            }
            VmOpcode::ItoL => {
                let v = pop_i32(stack);
                push_i64(stack, v as i64);
            }
            VmOpcode::LtoD => {
                let v = pop_i64(stack);
                push_f64(stack, v as f64);
            }
            VmOpcode::LtoI => {
                let v = pop_i64(stack);
                push_i32(stack, v as i32);
            }

            VmOpcode::Jmp => *ip = cmd.int_arg as u32,
            VmOpcode::JmpZ => {
                let v = pop_i32(stack);
                if v == 0 {
                    *ip = cmd.int_arg as u32;
                }
            }
            VmOpcode::JmpNZ => {
                let v = pop_i32(stack);
                if v != 0 {
                    *ip = cmd.int_arg as u32;
                }
            }

            VmOpcode::Call => {
                let callee_index = cmd.int_arg as u32;
                let callee = self.function(callee_index)?;
                if callee.category == FunctionCategory::Native {
                    let arg_bytes = callee.native_arg_bytes as usize;
                    let split = stack.len() - arg_bytes;
                    let args = stack.split_off(split);
                    let result = self.call_native(callee_index, &args)?;
                    stack.extend_from_slice(&result);
                } else {
                    frames.push(CallFrame {
                        return_pc: *ip,
                        saved_frame_top: *frame_top,
                        saved_frame_end: *frame_end,
                        function_index: *current_function,
                    });
                    *current_function = callee_index;
                    *ip = self.entry_offset(callee_index, callee, coroutines);
                }
            }
            VmOpcode::CallPtr => {
                let callee_index = pop_i32(stack) as u32;
                let callee = self.function(callee_index)?;
                frames.push(CallFrame {
                    return_pc: *ip,
                    saved_frame_top: *frame_top,
                    saved_frame_end: *frame_end,
                    function_index: *current_function,
                });
                *current_function = callee_index;
                *ip = self.entry_offset(callee_index, callee, coroutines);
            }

            VmOpcode::Return | VmOpcode::CheckedRet => {
                let has_result = stack.len() as u32 > *frame_end;
                let result: Vec<u8> = if has_result { stack[*frame_end as usize..].to_vec() } else { Vec::new() };
                stack.truncate(*frame_top as usize);

                if cmd.flag == 1 {
                    coroutines.record_yield(*current_function, cmd.int_arg as u32);
                } else {
                    coroutines.record_return(*current_function);
                }

                match frames.pop() {
                    Some(frame) => {
                        *ip = frame.return_pc;
                        *frame_top = frame.saved_frame_top;
                        *frame_end = frame.saved_frame_end;
                        *current_function = frame.function_index;
                        stack.extend_from_slice(&result);
                    }
                    None => return Ok(Some(result)),
                }
            }

            other => {
                return Err(RuntimeError::InvalidOperand(format!("opcode {other:?} is not supported by this executor")).into());
            }
        }
        Ok(None)
    }
}

fn binop_i32(stack: &mut Vec<u8>, f: impl Fn(i32, i32) -> i32) {
    let b = pop_i32(stack);
    let a = pop_i32(stack);
    push_i32(stack, f(a, b));
}

fn cmp_i32(stack: &mut Vec<u8>, f: impl Fn(i32, i32) -> bool) {
    let b = pop_i32(stack);
    let a = pop_i32(stack);
    push_i32(stack, f(a, b) as i32);
}

fn frames_save_frame_top(frame_top: &mut u32, _stack: &[u8], _args_start: u32) {
    // Saving/restoring the previous frame top is handled by the call
    // stack's `CallFrame::saved_frame_top`, recorded at `Call` time; this
    // hook exists so `PushVTop`'s intent (save, then shift) stays visible
    // at the call site even though the actual save already happened.
    let _ = frame_top;
}

/// Resolves an address produced by `get_addr`/`index` against whichever
/// region it falls in: the global segment if it's below the segment's
/// length, otherwise the operand stack.
fn memory_at<'a>(global_segment: &'a [u8], stack: &'a [u8], addr: usize) -> &'a [u8] {
    if addr < global_segment.len() {
        global_segment
    } else {
        stack
    }
}

fn local_offset(global_segment: &[u8], addr: usize) -> usize {
    if addr < global_segment.len() {
        addr
    } else {
        addr - global_segment.len()
    }
}

fn write_scalar(global_segment: &mut [u8], stack: &mut [u8], addr: usize, value: i32) {
    if addr < global_segment.len() {
        write_i32(global_segment, addr, value);
    } else {
        write_i32(stack, addr - global_segment.len(), value);
    }
}

/// Writes `bytes` at `addr`, resolving which of the two regions it falls
/// in the way [`memory_at`]/[`local_offset`] do for reads.
fn write_bytes(global_segment: &mut [u8], stack: &mut [u8], addr: usize, bytes: &[u8]) {
    if addr < global_segment.len() {
        global_segment[addr..addr + bytes.len()].copy_from_slice(bytes);
    } else {
        let off = addr - global_segment.len();
        stack[off..off + bytes.len()].copy_from_slice(bytes);
    }
}
