/// Opcode of a stack-VM `VMCmd`.
///
/// Named after the lowering pass's actual opcode vocabulary: a `Push*`
/// family for direct (constant-container) loads, a `*Stk` suffix for the
/// indirect form that lowers a computed pointer first, a per-width `Mov*`
/// family for stores, and typed arithmetic/comparison suffixes (`I` int
/// implicit/untagged, `D` double, `L` long).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, strum::EnumIter)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
#[repr(u8)]
pub enum VmOpcode {
    Nop = 0,

    // Direct loads: source is a global/constant container, operand is the
    // scoped absolute `container_offset + module_tag`.
    PushChar,
    PushShort,
    PushInt,
    PushFloat,
    PushDorL,
    PushCmplx,

    // Indirect loads: source is a computed pointer already on the stack,
    // operand is the static displacement.
    PushCharStk,
    PushShortStk,
    PushIntStk,
    PushFloatStk,
    PushDorLStk,
    PushCmplxStk,

    PushImmt,
    PushPtr,
    PushPtrImmt,
    PushTypeId,

    // Stores, mirroring the load families; each additionally pops the
    // stored operand's byte size after writing it.
    MovChar,
    MovShort,
    MovInt,
    MovFloat,
    MovDorL,
    MovCmplx,
    MovCharStk,
    MovShortStk,
    MovIntStk,
    MovFloatStk,
    MovDorLStk,
    MovCmplxStk,

    Pop,
    PushVTop,

    // Integer/pointer-width arithmetic.
    Add,
    Sub,
    Mul,
    Div,
    Pow,
    Mod,
    BitAnd,
    BitOr,
    BitXor,
    BitNot,
    Shl,
    Shr,
    Neg,
    LogNot,
    LogXor,
    IncI,
    DecI,

    // Long (64-bit integer) arithmetic.
    AddL,
    SubL,
    MulL,
    DivL,
    PowL,
    ModL,
    BitAndL,
    BitOrL,
    BitXorL,
    BitNotL,
    ShlL,
    ShrL,
    NegL,
    LogNotL,
    LogXorL,
    IncL,
    DecL,

    // Double (floating point) arithmetic.
    AddD,
    SubD,
    MulD,
    DivD,
    PowD,
    ModD,
    NegD,
    IncD,
    DecD,

    // Comparisons, typed from the argument type, not the (always-int) result.
    Less,
    Greater,
    LEqual,
    GEqual,
    Equal,
    NEqual,
    LessL,
    GreaterL,
    LEqualL,
    GEqualL,
    EqualL,
    NEqualL,
    LessD,
    GreaterD,
    LEqualD,
    GEqualD,
    EqualD,
    NEqualD,

    // Conversions.
    DtoI,
    DtoL,
    DtoF,
    ItoD,
    ItoL,
    LtoD,
    LtoI,

    Index,
    IndexStk,
    GetAddr,
    ConvertPtr,
    FuncAddr,

    Jmp,
    JmpZ,
    JmpNZ,

    Call,
    CallPtr,
    Return,
    CheckedRet,
}

impl VmOpcode {
    /// Whether this load/store opcode is the "direct" form (scoped push
    /// from a constant container) as opposed to the "indirect" `*Stk` form.
    pub const fn is_direct_load(self) -> bool {
        matches!(
            self,
            VmOpcode::PushChar
                | VmOpcode::PushShort
                | VmOpcode::PushInt
                | VmOpcode::PushFloat
                | VmOpcode::PushDorL
                | VmOpcode::PushCmplx
        )
    }

    pub const fn is_indirect_load(self) -> bool {
        matches!(
            self,
            VmOpcode::PushCharStk
                | VmOpcode::PushShortStk
                | VmOpcode::PushIntStk
                | VmOpcode::PushFloatStk
                | VmOpcode::PushDorLStk
                | VmOpcode::PushCmplxStk
        )
    }

    /// Whether this store opcode is the "direct" form; mirrors
    /// [`Self::is_direct_load`] for the `Mov*` store family.
    pub const fn is_direct_store(self) -> bool {
        matches!(
            self,
            VmOpcode::MovChar
                | VmOpcode::MovShort
                | VmOpcode::MovInt
                | VmOpcode::MovFloat
                | VmOpcode::MovDorL
                | VmOpcode::MovCmplx
        )
    }

    /// Whether `int_arg` holds a scoped global operand
    /// (`(module_index << 24) | offset_within_module`), as opposed to some
    /// other use of the field. Covers both direct loads/stores and the
    /// explicit pointer-to-global forms.
    pub const fn has_global_operand(self) -> bool {
        self.is_direct_load() || self.is_direct_store() || matches!(self, VmOpcode::PushPtr)
    }

    /// Whether `int_arg` holds a function index.
    pub const fn has_function_index_operand(self) -> bool {
        matches!(self, VmOpcode::Call | VmOpcode::FuncAddr)
    }

    /// Whether `int_arg` holds a type index.
    pub const fn has_type_index_operand(self) -> bool {
        matches!(self, VmOpcode::PushTypeId | VmOpcode::ConvertPtr)
    }

    /// Whether the opcode transfers control (used by the lowering pass's
    /// fall-through elision and by the linker's instruction walker).
    pub const fn is_branch(self) -> bool {
        matches!(self, VmOpcode::Jmp | VmOpcode::JmpZ | VmOpcode::JmpNZ)
    }

    pub const fn is_call(self) -> bool {
        matches!(self, VmOpcode::Call | VmOpcode::CallPtr)
    }
}
