/// Opcode of a three-address `RegVmCmd`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, strum::EnumIter)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
#[repr(u8)]
pub enum RegVmOpcode {
    Nop = 0,

    LoadByte,
    LoadWord,
    LoadDword,
    LoadQword,
    LoadFloat,

    LoadImm,
    LoadImmHigh,

    StoreByte,
    StoreWord,
    StoreDword,
    StoreQword,
    StoreFloat,

    Mov,

    DtoI,
    DtoL,
    DtoF,
    ItoD,
    LtoD,
    ItoL,
    LtoI,

    Index,
    GetAddr,

    Jmp,
    Jmpz,
    Jmpnz,

    Push,
    Pushq,
    PushImm,
    PushImmq,
    Pop,
    Popq,

    Call,
    CallPtr,
    Return,
    Pushvtop,

    Add,
    Sub,
    Mul,
    Div,
    Pow,
    Mod,
    Less,
    Greater,
    Lequal,
    Gequal,
    Equal,
    Nequal,
    Shl,
    Shr,
    BitAnd,
    BitOr,
    BitXor,
    LogXor,

    Addl,
    Subl,
    Mull,
    Divl,
    Powl,
    Modl,
    Lessl,
    Greaterl,
    Lequall,
    Gequall,
    Equall,
    Nequall,
    Shll,
    Shrl,
    BitAndl,
    BitOrl,
    BitXorl,
    LogXorl,

    Addd,
    Subd,
    Muld,
    Divd,
    Powd,
    Modd,
    Lessd,
    Greaterd,
    Lequald,
    Gequald,
    Equald,
    Nequald,

    Neg,
    Negl,
    Negd,
    BitNot,
    BitNotl,
    LogNot,
    LogNotl,

    ConvertPtr,
    CheckRet,

    FuncAddr,
    Typeid,
}

impl RegVmOpcode {
    pub const fn is_branch(self) -> bool {
        matches!(self, RegVmOpcode::Jmp | RegVmOpcode::Jmpz | RegVmOpcode::Jmpnz)
    }

    pub const fn is_call(self) -> bool {
        matches!(self, RegVmOpcode::Call | RegVmOpcode::CallPtr)
    }

    /// Whether `argument` holds a function index.
    pub const fn has_function_index_operand(self) -> bool {
        matches!(self, RegVmOpcode::Call | RegVmOpcode::FuncAddr)
    }

    /// Whether `argument` holds a type index.
    pub const fn has_type_index_operand(self) -> bool {
        matches!(self, RegVmOpcode::Typeid | RegVmOpcode::ConvertPtr)
    }

    /// Whether this is one of the `load_*`/`store_*` opcodes, whose
    /// `argument` is a displacement off `ra`. When `ra` is [`REG_GLOBALS`]
    /// that displacement is a scoped global operand like the stack VM's
    /// direct loads/stores; when `ra` is [`REG_FRAME`] or a computed
    /// pointer register it is a plain frame/struct byte offset.
    pub const fn is_load_store(self) -> bool {
        matches!(
            self,
            RegVmOpcode::LoadByte
                | RegVmOpcode::LoadWord
                | RegVmOpcode::LoadDword
                | RegVmOpcode::LoadQword
                | RegVmOpcode::LoadFloat
                | RegVmOpcode::StoreByte
                | RegVmOpcode::StoreWord
                | RegVmOpcode::StoreDword
                | RegVmOpcode::StoreQword
                | RegVmOpcode::StoreFloat
        )
    }
}

/// Reserved register: the current frame's globals-segment base.
pub const REG_GLOBALS: u8 = 0;
/// Reserved register: the current frame's base (`$frame`).
pub const REG_FRAME: u8 = 1;
/// Number of registers reserved by the calling convention before the
/// register allocator may assign general-purpose slots.
pub const REG_RESERVED_COUNT: u8 = 2;
/// Size of a per-frame register file.
pub const REG_FILE_SIZE: usize = 256;

/// Return-type discipline a register-VM `return` instruction and its
/// caller must agree on.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, strum::EnumIter)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
#[repr(u8)]
pub enum RegVmReturnType {
    Void = 0,
    Double = 1,
    Long = 2,
    Int = 3,
    Struct = 4,
    Error = 5,
}

impl RegVmReturnType {
    pub fn from_u8(tag: u8) -> Option<Self> {
        Some(match tag {
            0 => Self::Void,
            1 => Self::Double,
            2 => Self::Long,
            3 => Self::Int,
            4 => Self::Struct,
            5 => Self::Error,
            _ => return None,
        })
    }
}

/// Primitive width tag used by `SetRange`-style bulk writes; kept here as
/// the register VM's width vocabulary even though this build doesn't lower
/// a `SetRange` opcode, since `load_*`/`store_*` opcode selection uses the
/// same widths.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum RegVmWidth {
    Double,
    Float,
    Long,
    Int,
    Short,
    Char,
}

impl RegVmWidth {
    pub const fn byte_size(self) -> u32 {
        match self {
            RegVmWidth::Double | RegVmWidth::Long => 8,
            RegVmWidth::Float | RegVmWidth::Int => 4,
            RegVmWidth::Short => 2,
            RegVmWidth::Char => 1,
        }
    }
}
