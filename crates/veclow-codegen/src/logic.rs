//! Comparisons, selects and bit manipulation.
//!
//! Masks are vectors of the current type's integer shape with all-ones or
//! all-zeros lanes. Float comparisons come in two flavours:
//!
//! | predicate | `cmp`     | `cmp_ordered` |
//! |-----------|-----------|---------------|
//! | `Eq`      | ordered   | ordered       |
//! | `Ne`      | unordered | unordered     |
//! | others    | unordered | ordered       |
//!
//! An unordered comparison is true when either operand is NaN.

use crate::context::LoweringContext;
use crate::LowerResult;
use veclow_ir::{BinOp, CmpOp, UnOp, ValueId};

impl LoweringContext<'_> {
    /// Compare `a` and `b`, true on NaN except for `Eq`.
    pub fn cmp(&mut self, op: CmpOp, a: ValueId, b: ValueId) -> LowerResult<ValueId> {
        self.check(&[a, b])?;
        Ok(self.compare(op, op == CmpOp::Eq, a, b))
    }

    /// Compare `a` and `b`, false on NaN except for `Ne`.
    pub fn cmp_ordered(&mut self, op: CmpOp, a: ValueId, b: ValueId) -> LowerResult<ValueId> {
        self.check(&[a, b])?;
        Ok(self.compare(op, op != CmpOp::Ne, a, b))
    }

    /// Lanes of `a` where `mask` is set, lanes of `b` elsewhere.
    pub fn select(&mut self, mask: ValueId, a: ValueId, b: ValueId) -> LowerResult<ValueId> {
        self.check(&[a, b])?;
        self.check_ty(self.ty().int_type(), &[mask])?;
        if a == b {
            return Ok(a);
        }
        Ok(self.pick(mask, a, b))
    }

    fn bitwise(&mut self, op: BinOp, a: ValueId, b: ValueId) -> LowerResult<ValueId> {
        self.check(&[a, b])?;
        let ty = self.ty();
        if !ty.floating {
            return Ok(self.bin(op, a, b));
        }
        let int_ty = ty.int_type();
        let a = self.bitcast(a, int_ty);
        let b = self.bitcast(b, int_ty);
        let r = self.bin(op, a, b);
        Ok(self.bitcast(r, ty))
    }

    /// Bitwise and. Float lanes are treated as their bit patterns.
    pub fn and(&mut self, a: ValueId, b: ValueId) -> LowerResult<ValueId> {
        self.bitwise(BinOp::And, a, b)
    }

    /// Bitwise or.
    pub fn or(&mut self, a: ValueId, b: ValueId) -> LowerResult<ValueId> {
        self.bitwise(BinOp::Or, a, b)
    }

    /// Bitwise xor.
    pub fn xor(&mut self, a: ValueId, b: ValueId) -> LowerResult<ValueId> {
        self.bitwise(BinOp::Xor, a, b)
    }

    /// `a & !b`.
    pub fn andnot(&mut self, a: ValueId, b: ValueId) -> LowerResult<ValueId> {
        let not_b = self.not(b)?;
        self.and(a, not_b)
    }

    /// Bitwise complement.
    pub fn not(&mut self, a: ValueId) -> LowerResult<ValueId> {
        self.check(&[a])?;
        let ty = self.ty();
        if !ty.floating {
            return Ok(self.un(UnOp::Not, a));
        }
        let bits = self.bitcast(a, ty.int_type());
        let r = self.un(UnOp::Not, bits);
        Ok(self.bitcast(r, ty))
    }

    /// Shift left by a constant.
    pub fn shl_imm(&mut self, a: ValueId, imm: u32) -> LowerResult<ValueId> {
        self.shift_imm(BinOp::Shl, a, imm)
    }

    /// Shift right by a constant, arithmetic for signed types.
    pub fn shr_imm(&mut self, a: ValueId, imm: u32) -> LowerResult<ValueId> {
        self.shift_imm(BinOp::Shr, a, imm)
    }

    fn shift_imm(&mut self, op: BinOp, a: ValueId, imm: u32) -> LowerResult<ValueId> {
        self.check(&[a])?;
        let ty = self.ty();
        if ty.floating || imm >= ty.width {
            return Err(crate::LowerError::unsupported(format!(
                "{} by {imm} on {ty}",
                op.name()
            )));
        }
        if imm == 0 {
            return Ok(a);
        }
        let amount = self.const_int(ty, i64::from(imm));
        Ok(self.bin(op, a, amount))
    }

    /// Mask of NaN lanes. All zeros for integer types.
    pub fn isnan(&mut self, a: ValueId) -> LowerResult<ValueId> {
        self.check(&[a])?;
        if !self.ty().floating {
            return Ok(self.const_int_lanes(0));
        }
        Ok(self.compare(CmpOp::Ne, false, a, a))
    }

    /// Mask of lanes that are neither infinite nor NaN.
    pub fn isfinite(&mut self, a: ValueId) -> LowerResult<ValueId> {
        self.exponent_test(CmpOp::Ne, a)
    }

    /// Mask of lanes that are infinite or NaN.
    pub fn is_inf_or_nan(&mut self, a: ValueId) -> LowerResult<ValueId> {
        self.exponent_test(CmpOp::Eq, a)
    }

    fn exponent_test(&mut self, op: CmpOp, a: ValueId) -> LowerResult<ValueId> {
        self.check(&[a])?;
        let ty = self.ty();
        if !ty.floating {
            let all = if op == CmpOp::Ne { -1 } else { 0 };
            return Ok(self.const_int_lanes(all));
        }
        let int_ty = ty.int_type();
        let exp_mask = self.const_int(int_ty, ty.exponent_mask() as i64);
        let bits = self.bitcast(a, int_ty);
        let exp = self.bin(BinOp::And, bits, exp_mask);
        Ok(self.compare(op, true, exp, exp_mask))
    }
}
