//! # veclow IR
//!
//! Shared vocabulary between the vector lowering engine and the code that
//! materializes instructions.
//!
//! ## Overview
//!
//! The lowering engine never builds instructions itself. It describes each
//! step as an [`Op`] applied to previously produced values and hands it to
//! an [`Emitter`], which returns a fresh [`ValueId`]. The engine only ever
//! compares handles for identity; everything else about a value lives in
//! the emitter.
//!
//! ```text
//! [Lowering engine]  -- Op + VectorType + operands -->  [Emitter]
//!                    <-------------- ValueId ----------
//! ```
//!
//! ## Main Types
//!
//! - [`VectorType`]: lane width, lane count and interpretation flags
//! - [`ValueId`]: opaque handle to an emitted value
//! - [`Op`]: generic and target-native operations
//! - [`Literal`]: constant payloads
//! - [`Emitter`]: the instruction sink

#![warn(missing_docs)]
#![warn(clippy::all)]
#![warn(clippy::pedantic)]
#![allow(clippy::module_name_repetitions)]

mod ty;

pub use ty::{SignKind, TypeError, VectorType};

use serde::{Deserialize, Serialize};
use smallvec::SmallVec;
use std::fmt;
use std::ops::Range;

/// Shuffle index whose lane value does not matter.
pub const UNDEF_LANE: u32 = u32::MAX;

// ============================================================================
// Values
// ============================================================================

/// Handle to a value produced by an [`Emitter`].
///
/// Handles are only compared for identity. Two handles holding the same
/// numbers are still different values.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct ValueId(u32);

impl ValueId {
    /// Create a handle from a dense index.
    ///
    /// # Panics
    ///
    /// Panics if `index` does not fit in 32 bits.
    #[must_use]
    pub fn new(index: usize) -> Self {
        Self(u32::try_from(index).expect("value index overflow"))
    }

    /// The dense index this handle was created from.
    #[must_use]
    pub const fn index(self) -> usize {
        self.0 as usize
    }
}

impl fmt::Display for ValueId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "%{}", self.0)
    }
}

/// Rounding direction shared by the float- and integer-result rounding ops.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum RoundingMode {
    /// Round to nearest, ties to even.
    Nearest,
    /// Round toward negative infinity.
    Floor,
    /// Round toward positive infinity.
    Ceil,
    /// Round toward zero.
    Truncate,
}

impl RoundingMode {
    /// Short mnemonic.
    #[must_use]
    pub const fn name(self) -> &'static str {
        match self {
            Self::Nearest => "nearbyint",
            Self::Floor => "floor",
            Self::Ceil => "ceil",
            Self::Truncate => "trunc",
        }
    }
}

// ============================================================================
// Operations
// ============================================================================

/// Lane-wise binary operations.
///
/// Integer division, remainder and right shift follow the sign of the
/// operand type.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum BinOp {
    /// Addition, wrapping for integers.
    Add,
    /// Subtraction, wrapping for integers.
    Sub,
    /// Multiplication, wrapping for integers.
    Mul,
    /// Division.
    Div,
    /// Remainder with the sign of the dividend.
    Rem,
    /// Bitwise and.
    And,
    /// Bitwise or.
    Or,
    /// Bitwise xor.
    Xor,
    /// Left shift.
    Shl,
    /// Right shift, arithmetic for signed types.
    Shr,
}

impl BinOp {
    /// Short mnemonic.
    #[must_use]
    pub const fn name(self) -> &'static str {
        match self {
            Self::Add => "add",
            Self::Sub => "sub",
            Self::Mul => "mul",
            Self::Div => "div",
            Self::Rem => "rem",
            Self::And => "and",
            Self::Or => "or",
            Self::Xor => "xor",
            Self::Shl => "shl",
            Self::Shr => "shr",
        }
    }
}

/// Lane-wise unary operations available on every target.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum UnOp {
    /// Negation.
    Neg,
    /// Bitwise complement.
    Not,
    /// Correctly rounded square root.
    Sqrt,
    /// Absolute value.
    Abs,
    /// Library rounding to an integral float.
    Round(RoundingMode),
}

/// Comparison predicates.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum CmpOp {
    /// Equal.
    Eq,
    /// Not equal.
    Ne,
    /// Less than.
    Lt,
    /// Less than or equal.
    Le,
    /// Greater than.
    Gt,
    /// Greater than or equal.
    Ge,
}

impl CmpOp {
    /// The predicate with swapped operands.
    #[must_use]
    pub const fn swap(self) -> Self {
        match self {
            Self::Eq => Self::Eq,
            Self::Ne => Self::Ne,
            Self::Lt => Self::Gt,
            Self::Le => Self::Ge,
            Self::Gt => Self::Lt,
            Self::Ge => Self::Le,
        }
    }

    /// Short mnemonic.
    #[must_use]
    pub const fn name(self) -> &'static str {
        match self {
            Self::Eq => "eq",
            Self::Ne => "ne",
            Self::Lt => "lt",
            Self::Le => "le",
            Self::Gt => "gt",
            Self::Ge => "ge",
        }
    }
}

/// Conversions between lane interpretations.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Convert {
    /// Float to signed integer, truncating toward zero.
    ///
    /// NaN and out-of-range lanes produce the integer minimum.
    FloatToInt,
    /// Integer to float, signed or unsigned per the source type.
    IntToFloat,
    /// Reinterpret the register bits.
    Bitcast,
}

/// How a native float min/max instruction treats NaN operands.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum NativeNan {
    /// Returns the second operand when either is NaN (x86 `minps`).
    ReturnSecond,
    /// Returns the non-NaN operand (IEEE `minNum`).
    ReturnNumber,
    /// Returns NaN when either operand is NaN.
    Propagate,
}

/// Semantics of a target-native instruction.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum NativeKind {
    /// Saturating integer addition.
    SatAdd,
    /// Saturating integer subtraction.
    SatSub,
    /// Lane minimum.
    Min(NativeNan),
    /// Lane maximum.
    Max(NativeNan),
    /// Round to an integral float.
    Round(RoundingMode),
    /// Approximate reciprocal, about 12 bits of precision.
    RcpApprox,
    /// Approximate reciprocal square root, about 12 bits of precision.
    RsqrtApprox,
    /// Pairwise add of adjacent lanes, first operand's sums first.
    HorizontalAdd,
    /// Signed 16-bit `(a * b + 0x4000) >> 15`.
    MulHiRound,
    /// Integer absolute value.
    Abs,
    /// Narrow two signed vectors into one, saturating to the result type.
    ///
    /// Registers wider than 128 bits are packed per 128-bit half.
    PackSaturate,
    /// Float to integer, rounding to nearest even.
    ConvertNearest,
    /// Base-2 exponential.
    Exp2,
    /// Base-2 logarithm.
    Log2,
    /// Sine.
    Sin,
    /// Cosine.
    Cos,
}

/// A target-native instruction: an opaque name plus the semantics it has.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize)]
pub struct NativeOp {
    /// Target instruction name, e.g. `llvm.x86.sse2.paddus.b`.
    pub name: &'static str,
    /// What the instruction computes.
    pub kind: NativeKind,
}

/// One operation request.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize)]
pub enum Op {
    /// Binary arithmetic or logic.
    Bin(BinOp),
    /// Unary arithmetic or logic.
    Un(UnOp),
    /// Comparison producing an all-ones / all-zeros integer mask.
    ///
    /// Ordered float comparisons are false when either operand is NaN,
    /// unordered ones are true.
    Cmp {
        /// Predicate.
        op: CmpOp,
        /// Ordered float comparison.
        ordered: bool,
    },
    /// `select(mask, a, b)`: lanes of `a` where the mask is set.
    Select,
    /// `a * b + c`, fused when the target allows.
    MulAdd,
    /// Lane conversion.
    Convert(Convert),
    /// Target-native instruction.
    Native(NativeOp),
}

impl fmt::Display for Op {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Bin(op) => f.write_str(op.name()),
            Self::Un(UnOp::Neg) => f.write_str("neg"),
            Self::Un(UnOp::Not) => f.write_str("not"),
            Self::Un(UnOp::Sqrt) => f.write_str("sqrt"),
            Self::Un(UnOp::Abs) => f.write_str("abs"),
            Self::Un(UnOp::Round(mode)) => f.write_str(mode.name()),
            Self::Cmp { op, ordered } => {
                write!(f, "cmp.{}{}", if *ordered { "o" } else { "u" }, op.name())
            }
            Self::Select => f.write_str("select"),
            Self::MulAdd => f.write_str("fmuladd"),
            Self::Convert(Convert::FloatToInt) => f.write_str("fptosi"),
            Self::Convert(Convert::IntToFloat) => f.write_str("itofp"),
            Self::Convert(Convert::Bitcast) => f.write_str("bitcast"),
            Self::Native(native) => f.write_str(native.name),
        }
    }
}

// ============================================================================
// Constants
// ============================================================================

/// Constant payload for [`Emitter::constant`].
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub enum Literal {
    /// Float value splatted across lanes of a floating type.
    Float(f64),
    /// Integer value splatted across lanes, truncated to the lane width.
    Int(i64),
    /// Raw lane bits, one entry per lane.
    Bits(SmallVec<[u64; 8]>),
    /// A value with no defined contents.
    Undef,
}

// ============================================================================
// Emitter
// ============================================================================

/// Instruction sink used by the lowering engine.
///
/// Implementations own every value they hand out. Calls are append-only;
/// the engine never asks an emitter to change an earlier value.
pub trait Emitter {
    /// Emit `op` over `operands`, producing a value of type `ty`.
    fn emit(&mut self, op: Op, ty: VectorType, operands: &[ValueId]) -> ValueId;

    /// Materialize a constant of type `ty`.
    fn constant(&mut self, ty: VectorType, literal: Literal) -> ValueId;

    /// Extract the lanes in `lanes` as a shorter vector of the same format.
    fn extract(&mut self, value: ValueId, lanes: Range<u32>) -> ValueId;

    /// Select lanes from the concatenation of `a` and `b`.
    ///
    /// The result has `indices.len()` lanes; [`UNDEF_LANE`] marks lanes
    /// whose contents do not matter.
    fn shuffle(&mut self, a: ValueId, b: ValueId, indices: &[u32]) -> ValueId;

    /// The type a value was created with.
    fn type_of(&self, value: ValueId) -> VectorType;

    /// Whether the value is a compile-time constant.
    fn is_constant(&self, _value: ValueId) -> bool {
        false
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_value_id_roundtrip() {
        let id = ValueId::new(42);
        assert_eq!(id.index(), 42);
        assert_eq!(id.to_string(), "%42");
    }

    #[test]
    fn test_cmp_swap() {
        assert_eq!(CmpOp::Lt.swap(), CmpOp::Gt);
        assert_eq!(CmpOp::Ge.swap(), CmpOp::Le);
        assert_eq!(CmpOp::Eq.swap(), CmpOp::Eq);
    }

    #[test]
    fn test_op_display() {
        assert_eq!(Op::Bin(BinOp::Add).to_string(), "add");
        assert_eq!(
            Op::Cmp {
                op: CmpOp::Lt,
                ordered: true
            }
            .to_string(),
            "cmp.olt"
        );
        assert_eq!(Op::Un(UnOp::Round(RoundingMode::Floor)).to_string(), "floor");
        let native = NativeOp {
            name: "llvm.x86.sse2.paddus.b",
            kind: NativeKind::SatAdd,
        };
        assert_eq!(Op::Native(native).to_string(), "llvm.x86.sse2.paddus.b");
    }

    #[test]
    fn test_vector_type_serde() {
        let json = serde_json::to_string(&VectorType::VEC4F32).unwrap();
        let back: VectorType = serde_json::from_str(&json).unwrap();
        assert_eq!(back, VectorType::VEC4F32);
    }
}
