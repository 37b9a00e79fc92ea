//! The register VM: dispatch over `RegVmCmd` against a per-call register
//! window plus the same unified global/local byte address space the stack
//! VM uses. Covers the full scalar opcode set (int, long, double, the
//! numeric conversions, and pointer casts); struct-by-value arguments and
//! returns and coroutine dispatch remain stack-VM-only in this build (see
//! `lower::register`).

use nullc_asm::{RegVmCmd, RegVmOpcode, REG_FILE_SIZE, REG_FRAME, REG_GLOBALS};
use nullc_bytecode::{BytecodeError, FunctionCategory, FunctionEntry, Image};
use nullc_types::unpack_global_operand;

use crate::cancellation::ExecutionLimits;
use crate::error::{RuntimeError, VmError};
use crate::native::NativeTable;

struct CallFrame {
    return_pc: u32,
    saved_registers: Vec<i64>,
    saved_frame_address: i64,
}

fn read_word(mem: &[u8], at: usize) -> i64 {
    let mut bytes = [0u8; 8];
    let n = mem.len().saturating_sub(at).min(8);
    bytes[..n].copy_from_slice(&mem[at..at + n]);
    i64::from_le_bytes(bytes)
}

fn write_word(mem: &mut [u8], at: usize, value: i64, width: usize) {
    let bytes = value.to_le_bytes();
    mem[at..at + width].copy_from_slice(&bytes[..width]);
}

fn to_f64(value: i64) -> f64 {
    f64::from_bits(value as u64)
}

fn from_f64(value: f64) -> i64 {
    value.to_bits() as i64
}

pub struct RegisterVm<'i> {
    functions: &'i [FunctionEntry],
    modules_global_base: Vec<u32>,
    instructions: &'i [RegVmCmd],
    natives: &'i NativeTable,
}

impl<'i> RegisterVm<'i> {
    pub fn new(image: &'i Image, natives: &'i NativeTable) -> Self {
        RegisterVm {
            functions: &image.functions,
            modules_global_base: image.modules.iter().map(|m| m.global_variable_base_offset).collect(),
            instructions: &image.register_vm.instructions,
            natives,
        }
    }

    fn global_address(&self, packed: u32) -> usize {
        let (module_index, offset) = unpack_global_operand(packed);
        let base = self.modules_global_base.get(module_index as usize).copied().unwrap_or(0);
        (base + offset) as usize
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

    /// Invokes `function_index` with its arguments already placed in
    /// registers `r2..`, a window allocated fresh per call; returns the
    /// scalar the callee left in `r2` (or 0 for a void function).
    pub fn call(
        &self,
        function_index: u32,
        args: &[i64],
        global_segment: &mut Vec<u8>,
        locals: &mut Vec<u8>,
        limits: &ExecutionLimits,
    ) -> Result<i64, VmError> {
        let entry = self.function(function_index)?;
        if entry.category == FunctionCategory::Native {
            let mut bytes = Vec::with_capacity(args.len() * 4);
            for arg in args {
                bytes.extend_from_slice(&(*arg as i32).to_le_bytes());
            }
            let result = self.call_native(function_index, &bytes)?;
            return Ok(result.chunks_exact(4).next().map(|c| i32::from_le_bytes(c.try_into().unwrap()) as i64).unwrap_or(0));
        }

        let mut registers = vec![0i64; REG_FILE_SIZE];
        for (i, arg) in args.iter().enumerate() {
            registers[2 + i] = *arg;
        }
        registers[REG_FRAME as usize] = (global_segment.len() + locals.len()) as i64;
        let mut frames: Vec<CallFrame> = Vec::new();
        let mut ip = entry_offset(entry);

        loop {
            limits.tick()?;
            let cmd = *self.instructions.get(ip as usize).ok_or(BytecodeError::IndexOutOfBounds {
                table: "register_vm instructions",
                index: ip,
                len: self.instructions.len() as u32,
            })?;
            ip += 1;

            if let Some(result) =
                self.step(cmd, &mut registers, &mut ip, &mut frames, global_segment, locals)?
            {
                return Ok(result);
            }
        }
    }

    #[tracing::instrument(level = "trace", skip_all, fields(opcode = ?cmd.opcode))]
    fn step(
        &self,
        cmd: RegVmCmd,
        registers: &mut Vec<i64>,
        ip: &mut u32,
        frames: &mut Vec<CallFrame>,
        global_segment: &mut Vec<u8>,
        locals: &mut Vec<u8>,
    ) -> Result<Option<i64>, VmError> {
        match cmd.opcode {
            RegVmOpcode::Nop => {}
            RegVmOpcode::LoadImm => registers[cmd.ra as usize] = cmd.argument as i64,
            RegVmOpcode::LoadImmHigh => registers[cmd.ra as usize] |= (cmd.argument as i64) << 32,
            RegVmOpcode::Mov => registers[cmd.ra as usize] = registers[cmd.rb as usize],

            RegVmOpcode::LoadByte
            | RegVmOpcode::LoadWord
            | RegVmOpcode::LoadDword
            | RegVmOpcode::LoadQword
            | RegVmOpcode::LoadFloat => {
                let addr = self.load_store_address(cmd.ra, cmd.argument, registers);
                let mem = memory_at(global_segment, locals, addr);
                registers[cmd.rb as usize] = read_word(mem, local_offset(global_segment, addr));
            }
            RegVmOpcode::StoreByte
            | RegVmOpcode::StoreWord
            | RegVmOpcode::StoreDword
            | RegVmOpcode::StoreQword
            | RegVmOpcode::StoreFloat => {
                let addr = self.load_store_address(cmd.ra, cmd.argument, registers);
                let width = store_width(cmd.opcode);
                let value = registers[cmd.rb as usize];
                let off = local_offset(global_segment, addr);
                if addr < global_segment.len() {
                    write_word(global_segment, off, value, width);
                } else {
                    write_word(locals, off, value, width);
                }
            }

            RegVmOpcode::GetAddr => {
                let address = if cmd.ra == REG_GLOBALS {
                    self.global_address(cmd.argument as u32)
                } else {
                    (registers[cmd.ra as usize] + cmd.argument as i64) as usize
                };
                registers[cmd.rb as usize] = address as i64;
            }

            RegVmOpcode::Index => {
                let element_size = ((cmd.argument as u32) >> 16) as i64;
                let array_size = (cmd.argument as u32 & 0xffff) as i64;
                let base = registers[cmd.ra as usize];
                let index = registers[cmd.rb as usize];
                if array_size > 0 && (index < 0 || index >= array_size) {
                    return Err(RuntimeError::ArrayOutOfBounds { index, size: array_size as u32 }.into());
                }
                registers[cmd.rc as usize] = base + index * element_size;
            }

            RegVmOpcode::ConvertPtr => {
                // `rc` carries the operand's static source type, 0 meaning
                // "no static type to check"; such pointers pass through
                // unchecked, matching the stack VM's `ConvertPtr`.
                let source_type = cmd.rc as u32;
                let target_type = cmd.argument as u32;
                if source_type != 0 && source_type != target_type {
                    return Err(RuntimeError::InvalidPointerCast { target_type }.into());
                }
                registers[cmd.rb as usize] = registers[cmd.ra as usize];
            }

            RegVmOpcode::Add => registers[cmd.ra as usize] = registers[cmd.rb as usize].wrapping_add(registers[cmd.rc as usize]),
            RegVmOpcode::Sub => registers[cmd.ra as usize] = registers[cmd.rb as usize].wrapping_sub(registers[cmd.rc as usize]),
            RegVmOpcode::Mul => registers[cmd.ra as usize] = registers[cmd.rb as usize].wrapping_mul(registers[cmd.rc as usize]),
            RegVmOpcode::Div => {
                let divisor = registers[cmd.rc as usize];
                if divisor == 0 {
                    return Err(RuntimeError::DivisionByZero.into());
                }
                registers[cmd.ra as usize] = registers[cmd.rb as usize].wrapping_div(divisor);
            }
            RegVmOpcode::Mod => {
                let divisor = registers[cmd.rc as usize];
                if divisor == 0 {
                    return Err(RuntimeError::DivisionByZero.into());
                }
                registers[cmd.ra as usize] = registers[cmd.rb as usize].wrapping_rem(divisor);
            }
            RegVmOpcode::Pow => {
                let exponent = registers[cmd.rc as usize];
                if exponent < 0 {
                    return Err(RuntimeError::InvalidOperand("negative exponent on integer power".into()).into());
                }
                registers[cmd.ra as usize] = registers[cmd.rb as usize].wrapping_pow(exponent as u32);
            }
            RegVmOpcode::Neg => registers[cmd.ra as usize] = registers[cmd.rb as usize].wrapping_neg(),
            RegVmOpcode::LogNot => registers[cmd.ra as usize] = (registers[cmd.rb as usize] == 0) as i64,
            RegVmOpcode::BitNot => registers[cmd.ra as usize] = !registers[cmd.rb as usize],

            RegVmOpcode::Less => registers[cmd.ra as usize] = (registers[cmd.rb as usize] < registers[cmd.rc as usize]) as i64,
            RegVmOpcode::Greater => registers[cmd.ra as usize] = (registers[cmd.rb as usize] > registers[cmd.rc as usize]) as i64,
            RegVmOpcode::Lequal => registers[cmd.ra as usize] = (registers[cmd.rb as usize] <= registers[cmd.rc as usize]) as i64,
            RegVmOpcode::Gequal => registers[cmd.ra as usize] = (registers[cmd.rb as usize] >= registers[cmd.rc as usize]) as i64,
            RegVmOpcode::Equal => registers[cmd.ra as usize] = (registers[cmd.rb as usize] == registers[cmd.rc as usize]) as i64,
            RegVmOpcode::Nequal => registers[cmd.ra as usize] = (registers[cmd.rb as usize] != registers[cmd.rc as usize]) as i64,

            RegVmOpcode::Addl => registers[cmd.ra as usize] = registers[cmd.rb as usize].wrapping_add(registers[cmd.rc as usize]),
            RegVmOpcode::Subl => registers[cmd.ra as usize] = registers[cmd.rb as usize].wrapping_sub(registers[cmd.rc as usize]),
            RegVmOpcode::Mull => registers[cmd.ra as usize] = registers[cmd.rb as usize].wrapping_mul(registers[cmd.rc as usize]),
            RegVmOpcode::Divl => {
                let divisor = registers[cmd.rc as usize];
                if divisor == 0 {
                    return Err(RuntimeError::DivisionByZero.into());
                }
                registers[cmd.ra as usize] = registers[cmd.rb as usize].wrapping_div(divisor);
            }
            RegVmOpcode::Modl => {
                let divisor = registers[cmd.rc as usize];
                if divisor == 0 {
                    return Err(RuntimeError::DivisionByZero.into());
                }
                registers[cmd.ra as usize] = registers[cmd.rb as usize].wrapping_rem(divisor);
            }
            RegVmOpcode::Powl => {
                let exponent = registers[cmd.rc as usize];
                if exponent < 0 {
                    return Err(RuntimeError::InvalidOperand("negative exponent on integer power".into()).into());
                }
                registers[cmd.ra as usize] = registers[cmd.rb as usize].wrapping_pow(exponent as u32);
            }
            RegVmOpcode::BitAndl => registers[cmd.ra as usize] = registers[cmd.rb as usize] & registers[cmd.rc as usize],
            RegVmOpcode::BitOrl => registers[cmd.ra as usize] = registers[cmd.rb as usize] | registers[cmd.rc as usize],
            RegVmOpcode::BitXorl => registers[cmd.ra as usize] = registers[cmd.rb as usize] ^ registers[cmd.rc as usize],
            RegVmOpcode::Shll => registers[cmd.ra as usize] = registers[cmd.rb as usize].wrapping_shl(registers[cmd.rc as usize] as u32),
            RegVmOpcode::Shrl => registers[cmd.ra as usize] = registers[cmd.rb as usize].wrapping_shr(registers[cmd.rc as usize] as u32),
            RegVmOpcode::Negl => registers[cmd.ra as usize] = registers[cmd.rb as usize].wrapping_neg(),
            RegVmOpcode::LogNotl => registers[cmd.ra as usize] = (registers[cmd.rb as usize] == 0) as i64,
            RegVmOpcode::BitNotl => registers[cmd.ra as usize] = !registers[cmd.rb as usize],
            RegVmOpcode::LogXorl => {
                registers[cmd.ra as usize] = ((registers[cmd.rb as usize] != 0) ^ (registers[cmd.rc as usize] != 0)) as i64
            }

            RegVmOpcode::Lessl => registers[cmd.ra as usize] = (registers[cmd.rb as usize] < registers[cmd.rc as usize]) as i64,
            RegVmOpcode::Greaterl => registers[cmd.ra as usize] = (registers[cmd.rb as usize] > registers[cmd.rc as usize]) as i64,
            RegVmOpcode::Lequall => registers[cmd.ra as usize] = (registers[cmd.rb as usize] <= registers[cmd.rc as usize]) as i64,
            RegVmOpcode::Gequall => registers[cmd.ra as usize] = (registers[cmd.rb as usize] >= registers[cmd.rc as usize]) as i64,
            RegVmOpcode::Equall => registers[cmd.ra as usize] = (registers[cmd.rb as usize] == registers[cmd.rc as usize]) as i64,
            RegVmOpcode::Nequall => registers[cmd.ra as usize] = (registers[cmd.rb as usize] != registers[cmd.rc as usize]) as i64,

            RegVmOpcode::Addd => registers[cmd.ra as usize] = from_f64(to_f64(registers[cmd.rb as usize]) + to_f64(registers[cmd.rc as usize])),
            RegVmOpcode::Subd => registers[cmd.ra as usize] = from_f64(to_f64(registers[cmd.rb as usize]) - to_f64(registers[cmd.rc as usize])),
            RegVmOpcode::Muld => registers[cmd.ra as usize] = from_f64(to_f64(registers[cmd.rb as usize]) * to_f64(registers[cmd.rc as usize])),
            RegVmOpcode::Divd => registers[cmd.ra as usize] = from_f64(to_f64(registers[cmd.rb as usize]) / to_f64(registers[cmd.rc as usize])),
            RegVmOpcode::Modd => registers[cmd.ra as usize] = from_f64(to_f64(registers[cmd.rb as usize]) % to_f64(registers[cmd.rc as usize])),
            RegVmOpcode::Powd => registers[cmd.ra as usize] = from_f64(to_f64(registers[cmd.rb as usize]).powf(to_f64(registers[cmd.rc as usize]))),
            RegVmOpcode::Negd => registers[cmd.ra as usize] = from_f64(-to_f64(registers[cmd.rb as usize])),

            RegVmOpcode::Lessd => registers[cmd.ra as usize] = (to_f64(registers[cmd.rb as usize]) < to_f64(registers[cmd.rc as usize])) as i64,
            RegVmOpcode::Greaterd => registers[cmd.ra as usize] = (to_f64(registers[cmd.rb as usize]) > to_f64(registers[cmd.rc as usize])) as i64,
            RegVmOpcode::Lequald => registers[cmd.ra as usize] = (to_f64(registers[cmd.rb as usize]) <= to_f64(registers[cmd.rc as usize])) as i64,
            RegVmOpcode::Gequald => registers[cmd.ra as usize] = (to_f64(registers[cmd.rb as usize]) >= to_f64(registers[cmd.rc as usize])) as i64,
            RegVmOpcode::Equald => registers[cmd.ra as usize] = (to_f64(registers[cmd.rb as usize]) == to_f64(registers[cmd.rc as usize])) as i64,
            RegVmOpcode::Nequald => registers[cmd.ra as usize] = (to_f64(registers[cmd.rb as usize]) != to_f64(registers[cmd.rc as usize])) as i64,

            RegVmOpcode::DtoI => registers[cmd.ra as usize] = to_f64(registers[cmd.rb as usize]) as i32 as i64,
            RegVmOpcode::DtoL => registers[cmd.ra as usize] = to_f64(registers[cmd.rb as usize]) as i64,
            RegVmOpcode::DtoF => registers[cmd.ra as usize] = (to_f64(registers[cmd.rb as usize]) as f32).to_bits() as i64,
            RegVmOpcode::ItoD => registers[cmd.ra as usize] = from_f64(registers[cmd.rb as usize] as i32 as f64),
            RegVmOpcode::LtoD => registers[cmd.ra as usize] = from_f64(registers[cmd.rb as usize] as f64),
            RegVmOpcode::ItoL => registers[cmd.ra as usize] = registers[cmd.rb as usize] as i32 as i64,
            RegVmOpcode::LtoI => registers[cmd.ra as usize] = registers[cmd.rb as usize] as i32 as i64,

            RegVmOpcode::Jmp => *ip = cmd.argument as u32,
            RegVmOpcode::Jmpz => {
                if registers[cmd.ra as usize] == 0 {
                    *ip = cmd.argument as u32;
                }
            }
            RegVmOpcode::Jmpnz => {
                if registers[cmd.ra as usize] != 0 {
                    *ip = cmd.argument as u32;
                }
            }

            RegVmOpcode::Push | RegVmOpcode::Pushq | RegVmOpcode::Pushvtop => {
                // Arguments are already placed directly in the callee's
                // register window by `call`; these opcodes are no-ops in
                // this executor's reduced calling convention.
            }
            RegVmOpcode::Pop | RegVmOpcode::Popq => {}

            RegVmOpcode::Call => {
                let callee_index = cmd.argument as u32;
                let callee = self.function(callee_index)?;
                if callee.category == FunctionCategory::Native {
                    let mut bytes = Vec::new();
                    for reg in &registers[2..2 + callee.parameter_count as usize] {
                        bytes.extend_from_slice(&(*reg as i32).to_le_bytes());
                    }
                    let result = self.call_native(callee_index, &bytes)?;
                    registers[2] = result
                        .chunks_exact(4)
                        .next()
                        .map(|c| i32::from_le_bytes(c.try_into().unwrap()) as i64)
                        .unwrap_or(0);
                } else {
                    frames.push(CallFrame {
                        return_pc: *ip,
                        saved_registers: registers.clone(),
                        saved_frame_address: registers[REG_FRAME as usize],
                    });
                    *ip = entry_offset(callee);
                }
            }
            RegVmOpcode::CallPtr => {
                let callee_index = registers[cmd.ra as usize] as u32;
                let callee = self.function(callee_index)?;
                frames.push(CallFrame {
                    return_pc: *ip,
                    saved_registers: registers.clone(),
                    saved_frame_address: registers[REG_FRAME as usize],
                });
                *ip = entry_offset(callee);
            }

            RegVmOpcode::Return | RegVmOpcode::CheckRet => {
                let result = registers[cmd.ra as usize];
                match frames.pop() {
                    Some(frame) => {
                        *registers = frame.saved_registers;
                        registers[REG_FRAME as usize] = frame.saved_frame_address;
                        registers[2] = result;
                        *ip = frame.return_pc;
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

    fn load_store_address(&self, ra: u8, argument: i32, registers: &[i64]) -> usize {
        if ra == REG_GLOBALS {
            self.global_address(argument as u32)
        } else {
            (registers[ra as usize] + argument as i64) as usize
        }
    }
}

fn entry_offset(entry: &FunctionEntry) -> u32 {
    entry.register_vm_entry.offset
}

fn store_width(opcode: RegVmOpcode) -> usize {
    match opcode {
        RegVmOpcode::StoreByte => 1,
        RegVmOpcode::StoreWord => 2,
        RegVmOpcode::StoreDword | RegVmOpcode::StoreFloat => 4,
        _ => 8,
    }
}

fn memory_at<'a>(global_segment: &'a [u8], locals: &'a [u8], addr: usize) -> &'a [u8] {
    if addr < global_segment.len() {
        global_segment
    } else {
        locals
    }
}

fn local_offset(global_segment: &[u8], addr: usize) -> usize {
    if addr < global_segment.len() {
        addr
    } else {
        addr - global_segment.len()
    }
}
