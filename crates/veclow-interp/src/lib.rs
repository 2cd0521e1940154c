//! # veclow interpreter
//!
//! A reference [`Emitter`] that evaluates each instruction as it is emitted.
//!
//! Every value handed out is backed by concrete lane bits, so a lowering can
//! be run end to end on real numbers and its result inspected. Each
//! instruction is also recorded, which makes the interpreter useful for
//! checking which path a lowering took and for printing a listing.
//!
//! ```text
//! %0 = const v4f32 [1, 2, 3, 4]
//! %1 = const v4f32 [0, 0, 0, 0]
//! %2 = add v4f32 %0, %1
//! ```
//!
//! Out-of-contract requests (mismatched lane counts, out-of-range shuffle
//! indices) are programming errors in the lowering engine and panic.

#![warn(missing_docs)]
#![warn(clippy::all)]

mod eval;
mod lanes;

use smallvec::SmallVec;
use std::fmt;
use std::ops::Range;
use veclow_ir::{Emitter, Literal, Op, ValueId, VectorType, UNDEF_LANE};

/// Lane bits of one value.
pub type Lanes = SmallVec<[u64; 16]>;

/// How an instruction was created.
#[derive(Clone, Debug, PartialEq)]
pub enum InstKind {
    /// A lowered operation.
    Op(Op),
    /// A constant.
    Constant,
    /// An undefined value.
    Undef,
    /// A lane range extraction.
    Extract(Range<u32>),
    /// A two-input shuffle.
    Shuffle(SmallVec<[u32; 16]>),
}

/// One recorded instruction together with its evaluated lanes.
#[derive(Clone, Debug)]
pub struct Inst {
    /// What produced the value.
    pub kind: InstKind,
    /// Result type.
    pub ty: VectorType,
    /// Input values.
    pub operands: SmallVec<[ValueId; 3]>,
    /// Evaluated lane bits.
    pub lanes: Lanes,
}

/// Evaluating, recording instruction emitter.
#[derive(Clone, Debug, Default)]
pub struct Interpreter {
    insts: Vec<Inst>,
}

impl Interpreter {
    /// Create an empty interpreter.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    fn push(&mut self, inst: Inst) -> ValueId {
        assert_eq!(
            inst.lanes.len(),
            inst.ty.length as usize,
            "lane count does not match {}",
            inst.ty
        );
        let id = ValueId::new(self.insts.len());
        tracing::trace!(value = %id, ty = %inst.ty, "interp");
        self.insts.push(inst);
        id
    }

    /// Every recorded instruction, in emission order.
    #[must_use]
    pub fn instructions(&self) -> &[Inst] {
        &self.insts
    }

    /// The recorded instruction behind `value`.
    #[must_use]
    pub fn inst(&self, value: ValueId) -> &Inst {
        &self.insts[value.index()]
    }

    /// Number of non-constant instructions emitted so far.
    #[must_use]
    pub fn instruction_count(&self) -> usize {
        self.insts
            .iter()
            .filter(|inst| !matches!(inst.kind, InstKind::Constant | InstKind::Undef))
            .count()
    }

    /// Whether any emitted instruction matches `pred`.
    pub fn any_op(&self, pred: impl Fn(&Op) -> bool) -> bool {
        self.insts.iter().any(|inst| match &inst.kind {
            InstKind::Op(op) => pred(op),
            _ => false,
        })
    }

    /// Raw lane bits of a value.
    #[must_use]
    pub fn lanes(&self, value: ValueId) -> &[u64] {
        &self.inst(value).lanes
    }

    /// Lanes of a 32-bit float value.
    #[must_use]
    pub fn lanes_f32(&self, value: ValueId) -> Vec<f32> {
        let inst = self.inst(value);
        assert_eq!(inst.ty.width, 32, "not a 32-bit value: {}", inst.ty);
        inst.lanes
            .iter()
            .map(|&bits| f32::from_bits(bits as u32))
            .collect()
    }

    /// Lanes of any float value, widened to `f64`.
    #[must_use]
    pub fn lanes_f64(&self, value: ValueId) -> Vec<f64> {
        let inst = self.inst(value);
        inst.lanes
            .iter()
            .map(|&bits| lanes::to_float(bits, inst.ty.width))
            .collect()
    }

    /// Lanes read as unsigned integers.
    #[must_use]
    pub fn lanes_u64(&self, value: ValueId) -> Vec<u64> {
        self.inst(value).lanes.to_vec()
    }

    /// Lanes read as sign-extended integers.
    #[must_use]
    pub fn lanes_i64(&self, value: ValueId) -> Vec<i64> {
        let inst = self.inst(value);
        inst.lanes
            .iter()
            .map(|&bits| lanes::to_signed(bits, inst.ty.width))
            .collect()
    }

    /// Input vector from `f32` lanes.
    pub fn input_f32(&mut self, ty: VectorType, values: &[f32]) -> ValueId {
        self.input_f64(ty, &values.iter().map(|&v| f64::from(v)).collect::<Vec<_>>())
    }

    /// Input vector from float lanes, rounded to the lane format.
    pub fn input_f64(&mut self, ty: VectorType, values: &[f64]) -> ValueId {
        let lanes = values
            .iter()
            .map(|&v| lanes::from_float(v, ty.width))
            .collect();
        self.input_bits(ty, lanes)
    }

    /// Input vector from unsigned integer lanes, truncated to the lane width.
    pub fn input_u64(&mut self, ty: VectorType, values: &[u64]) -> ValueId {
        let lanes = values.iter().map(|&v| v & lanes::mask(ty.width)).collect();
        self.input_bits(ty, lanes)
    }

    /// Input vector from signed integer lanes, truncated to the lane width.
    pub fn input_i64(&mut self, ty: VectorType, values: &[i64]) -> ValueId {
        let lanes = values
            .iter()
            .map(|&v| lanes::from_signed(v, ty.width))
            .collect();
        self.input_bits(ty, lanes)
    }

    fn input_bits(&mut self, ty: VectorType, lanes: Lanes) -> ValueId {
        self.push(Inst {
            kind: InstKind::Constant,
            ty,
            operands: SmallVec::new(),
            lanes,
        })
    }
}

impl Emitter for Interpreter {
    fn emit(&mut self, op: Op, ty: VectorType, operands: &[ValueId]) -> ValueId {
        let lanes = {
            let args: SmallVec<[&Lanes; 3]> = operands
                .iter()
                .map(|&v| &self.insts[v.index()].lanes)
                .collect();
            let arg_tys: SmallVec<[VectorType; 3]> = operands
                .iter()
                .map(|&v| self.insts[v.index()].ty)
                .collect();
            eval::evaluate(op, ty, &args, &arg_tys)
        };
        self.push(Inst {
            kind: InstKind::Op(op),
            ty,
            operands: operands.iter().copied().collect(),
            lanes,
        })
    }

    fn constant(&mut self, ty: VectorType, literal: Literal) -> ValueId {
        let len = ty.length as usize;
        let (kind, lanes) = match literal {
            Literal::Float(v) => (
                InstKind::Constant,
                std::iter::repeat(lanes::from_float(v, ty.width))
                    .take(len)
                    .collect(),
            ),
            Literal::Int(v) => (
                InstKind::Constant,
                std::iter::repeat(lanes::from_signed(v, ty.width))
                    .take(len)
                    .collect(),
            ),
            Literal::Bits(bits) if bits.len() == 1 => (
                InstKind::Constant,
                std::iter::repeat(bits[0] & lanes::mask(ty.width))
                    .take(len)
                    .collect(),
            ),
            Literal::Bits(bits) => (
                InstKind::Constant,
                bits.iter().map(|b| b & lanes::mask(ty.width)).collect(),
            ),
            Literal::Undef => (InstKind::Undef, std::iter::repeat(0).take(len).collect()),
        };
        self.push(Inst {
            kind,
            ty,
            operands: SmallVec::new(),
            lanes,
        })
    }

    fn extract(&mut self, value: ValueId, lanes: Range<u32>) -> ValueId {
        let src = &self.insts[value.index()];
        assert!(
            lanes.end <= src.ty.length && lanes.start < lanes.end,
            "extract {lanes:?} out of range for {}",
            src.ty
        );
        let ty = src.ty.with_length(lanes.end - lanes.start);
        let out = src.lanes[lanes.start as usize..lanes.end as usize]
            .iter()
            .copied()
            .collect();
        self.push(Inst {
            kind: InstKind::Extract(lanes),
            ty,
            operands: SmallVec::from_slice(&[value]),
            lanes: out,
        })
    }

    fn shuffle(&mut self, a: ValueId, b: ValueId, indices: &[u32]) -> ValueId {
        let (left, right) = (&self.insts[a.index()], &self.insts[b.index()]);
        assert_eq!(left.ty, right.ty, "shuffle operands differ in type");
        let total = left.lanes.len() + right.lanes.len();
        let out: Lanes = indices
            .iter()
            .map(|&i| {
                if i == UNDEF_LANE {
                    return 0;
                }
                let i = i as usize;
                assert!(i < total, "shuffle index {i} out of range");
                if i < left.lanes.len() {
                    left.lanes[i]
                } else {
                    right.lanes[i - left.lanes.len()]
                }
            })
            .collect();
        let ty = left.ty.with_length(u32::try_from(indices.len()).unwrap_or(u32::MAX));
        self.push(Inst {
            kind: InstKind::Shuffle(SmallVec::from_slice(indices)),
            ty,
            operands: SmallVec::from_slice(&[a, b]),
            lanes: out,
        })
    }

    fn type_of(&self, value: ValueId) -> VectorType {
        self.insts[value.index()].ty
    }

    fn is_constant(&self, value: ValueId) -> bool {
        matches!(
            self.insts[value.index()].kind,
            InstKind::Constant | InstKind::Undef
        )
    }
}

impl fmt::Display for Interpreter {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        for (index, inst) in self.insts.iter().enumerate() {
            write!(f, "{} = ", ValueId::new(index))?;
            match &inst.kind {
                InstKind::Op(op) => write!(f, "{op} {}", inst.ty)?,
                InstKind::Constant => write!(f, "const {}", inst.ty)?,
                InstKind::Undef => write!(f, "undef {}", inst.ty)?,
                InstKind::Extract(range) => {
                    write!(f, "extract {} [{}..{}]", inst.ty, range.start, range.end)?;
                }
                InstKind::Shuffle(indices) => write!(f, "shuffle {} {indices:?}", inst.ty)?,
            }
            for (i, operand) in inst.operands.iter().enumerate() {
                f.write_str(if i == 0 { " " } else { ", " })?;
                write!(f, "{operand}")?;
            }
            writeln!(f)?;
        }
        Ok(())
    }
}
