//! The value-IR shape this crate consumes from the (external, out-of-scope)
//! front end: a forest of `{function, block, instruction, constant}` nodes,
//! each instruction carrying a type and an ordered operand list. Modeled as
//! a tagged union, not a trait-object hierarchy, matching the bytecode
//! container's own arena-plus-index style: blocks and instructions
//! reference each other by position within their owning function, not by
//! pointer.

use nullc_types::{PrimitiveCategory, StructuralCategory};

/// The value type an IR node evaluates to: primitive category plus the
/// class type index when the category is `Complex`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct IrType {
    pub category: PrimitiveCategory,
    pub structural_category: StructuralCategory,
    pub byte_size: u32,
    /// Set when `structural_category` is `Class`: the type index a
    /// struct-shaped value's fields are laid out by.
    pub type_index: Option<u32>,
}

impl IrType {
    pub const fn primitive(category: PrimitiveCategory) -> Self {
        IrType {
            category,
            structural_category: StructuralCategory::None,
            byte_size: category.byte_size(),
            type_index: None,
        }
    }

    pub const fn class(type_index: u32, byte_size: u32) -> Self {
        IrType {
            category: PrimitiveCategory::Complex,
            structural_category: StructuralCategory::Class,
            byte_size,
            type_index: Some(type_index),
        }
    }
}

/// A primitive numeric conversion, named after the bytecode opcode family
/// each variant lowers to (`DtoI`, `ItoL`, ...) rather than a generic
/// `{from, to}` pair.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum NumericConversion {
    DoubleToInt,
    DoubleToLong,
    DoubleToFloat,
    IntToDouble,
    IntToLong,
    LongToDouble,
    LongToInt,
}

/// A literal value attached to a `Constant` node.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum ConstantValue {
    Int(i32),
    Long(i64),
    Float(f32),
    Double(f64),
    /// A scoped reference to a global/constant-container slot, as opposed
    /// to an immediate: carries the container offset the direct-load form
    /// of a load instruction pushes.
    GlobalOffset(u32),
    /// A local or parameter's byte offset within its function's frame, as
    /// laid out by `pushvtop`. The counterpart to `GlobalOffset` for
    /// `GetAddr` operands that name a stack slot instead of a global.
    FrameOffset(u32),
}

/// One value-IR node. `Function` and `Block` are containers; `Instruction`
/// and `Constant` are leaves (and the only producers of a runtime value).
#[derive(Debug, Clone, PartialEq)]
pub enum IrNode {
    Function(IrFunction),
    Block(IrBlock),
    Instruction(IrInstruction),
    Constant(IrConstant),
}

#[derive(Debug, Clone, PartialEq)]
pub struct IrFunction {
    pub function_index: u32,
    pub parameter_types: Vec<IrType>,
    pub return_type: IrType,
    pub blocks: Vec<IrBlock>,
    pub is_coroutine: bool,
}

#[derive(Debug, Clone, PartialEq)]
pub struct IrBlock {
    pub index: u32,
    pub instructions: Vec<IrInstruction>,
}

#[derive(Debug, Clone, PartialEq)]
pub struct IrConstant {
    pub value: ConstantValue,
    pub ty: IrType,
}

/// An operand an instruction consumes: either another instruction's
/// result (by position within the owning function, arena-style) or an
/// inline constant.
#[derive(Debug, Clone, PartialEq)]
pub enum IrOperand {
    Value(u32),
    Constant(IrConstant),
}

#[derive(Debug, Clone, PartialEq)]
pub struct IrInstruction {
    pub id: u32,
    pub ty: IrType,
    pub op: IrOp,
    pub operands: Vec<IrOperand>,
    pub source_offset: u32,
    pub source_length: u32,
}

/// The opcode vocabulary both lowering passes translate, named after the
/// operation rather than either target VM's encoding.
#[derive(Debug, Clone, PartialEq)]
pub enum IrOp {
    Add,
    Sub,
    Mul,
    Div,
    Pow,
    Mod,
    Less,
    Greater,
    LEqual,
    GEqual,
    Equal,
    NEqual,
    Neg,
    LogNot,
    /// Loads a value. `is_direct` selects the scoped-container form
    /// (operand is a `Constant::GlobalOffset`) versus the
    /// computed-pointer form (operand is a `Value` producing the address).
    Load { is_direct: bool, module_tag: u32 },
    /// Stores the second operand's value at the address/offset the first
    /// operand denotes, mirroring `Load`.
    Store { is_direct: bool, module_tag: u32 },
    Index { element_size: u32, fixed_size: Option<u32> },
    GetAddr,
    /// A pointer cast. `source_type` is the static type the operand was
    /// produced as (0 when the producer has no static type to report, e.g.
    /// an `Index` result); the executor treats a zero source as an
    /// untyped/primitive pointer and lets the cast through unchecked, the
    /// way the legacy behavior always did.
    ConvertPtr { source_type: u32, target_type: u32 },
    /// A primitive numeric conversion, named after the bytecode opcode
    /// family it lowers to rather than a generic from/to pair.
    Convert(NumericConversion),
    /// A direct call to a known function index, context operand first (if
    /// any) then arguments right-to-left.
    Call { function_index: u32 },
    /// An indirect call through a runtime function-pointer operand.
    CallPtr,
    Jump { target_block: u32 },
    Branch { target_true: u32, target_false: u32 },
    Return,
    /// A coroutine suspend point: a `Return` with the local-return flag,
    /// resuming at `resume_block` on the next call.
    Yield { resume_block: u32 },
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn primitive_ir_type_derives_byte_size_from_category() {
        let ty = IrType::primitive(PrimitiveCategory::Long);
        assert_eq!(ty.byte_size, 8);
        assert_eq!(ty.type_index, None);
    }

    #[test]
    fn class_ir_type_carries_explicit_byte_size_and_type_index() {
        let ty = IrType::class(3, 16);
        assert_eq!(ty.structural_category, StructuralCategory::Class);
        assert_eq!(ty.type_index, Some(3));
        assert_eq!(ty.byte_size, 16);
    }
}
