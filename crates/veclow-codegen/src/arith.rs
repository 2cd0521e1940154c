//! Basic arithmetic.
//!
//! Each operation first tries identity shortcuts on the cached constants,
//! then a native instruction for the lane format, then a generic sequence.
//! Normalized integer types saturate: results never leave `[0, 1]` for
//! unsigned lanes or the integer range for signed lanes.

use crate::config::{DivByZero, NormFloor};
use crate::context::LoweringContext;
use crate::dispatch::{self, NativeOperation};
use crate::minmax::NanBehavior;
use crate::pack::wide_int;
use crate::{LowerError, LowerResult};
use veclow_ir::{BinOp, CmpOp, Convert, Op, UnOp, ValueId};
use veclow_target::Feature;

impl LoweringContext<'_> {
    fn try_native(&mut self, op: NativeOperation, args: &[ValueId]) -> LowerResult<Option<ValueId>> {
        let ty = self.ty();
        match dispatch::lookup(self.caps(), op, ty) {
            Some(row) => self
                .apply_native(row.native(), row.bits(), ty, args)
                .map(Some),
            None => Ok(None),
        }
    }

    /// `a + b`.
    pub fn add(&mut self, a: ValueId, b: ValueId) -> LowerResult<ValueId> {
        self.check(&[a, b])?;
        let ty = self.ty();

        if self.is_zero(a) {
            return Ok(b);
        }
        if self.is_zero(b) {
            return Ok(a);
        }
        if self.is_undef(a) || self.is_undef(b) {
            return Ok(self.undef());
        }
        if ty.norm {
            if !ty.sign && (self.is_one(a) || self.is_one(b)) {
                return Ok(self.one());
            }
            if ty.is_norm_int() {
                if let Some(r) = self.try_native(NativeOperation::SatAdd, &[a, b])? {
                    return Ok(r);
                }
            }
        }
        self.note_constant("add", &[a, b]);

        let mut a = a;
        if ty.is_norm_int() && ty.sign {
            // Pull `a` in so the wrapping add cannot leave the range.
            let max = self.const_int(ty, ty.int_max());
            let min = self.const_int(ty, ty.int_min());
            let zero = self.zero();
            let max_minus_b = self.bin(BinOp::Sub, max, b);
            let min_minus_b = self.bin(BinOp::Sub, min, b);
            let a_clamp_max = self.min_simple(a, max_minus_b, NanBehavior::Undefined)?;
            let a_clamp_min = self.max_simple(a, min_minus_b, NanBehavior::Undefined)?;
            let b_positive = self.compare(CmpOp::Gt, false, b, zero);
            a = self.pick(b_positive, a_clamp_max, a_clamp_min);
        }

        let mut res = self.bin(BinOp::Add, a, b);

        if ty.norm && (ty.floating || ty.fixed) {
            let one = self.one();
            res = self.min_simple(res, one, NanBehavior::ReturnOtherSecondNonNan)?;
            if self.config().norm_floor == NormFloor::Clamped {
                let floor = if ty.sign { self.splat(-1.0) } else { self.zero() };
                res = self.max_simple(res, floor, NanBehavior::ReturnOtherSecondNonNan)?;
            }
        }

        if ty.is_norm_int() && !ty.sign {
            // Unsigned overflow wraps below either operand.
            let overflowed = self.compare(CmpOp::Gt, false, a, res);
            let all_ones = self.one();
            res = self.pick(overflowed, all_ones, res);
        }
        Ok(res)
    }

    /// `a - b`.
    pub fn sub(&mut self, a: ValueId, b: ValueId) -> LowerResult<ValueId> {
        self.check(&[a, b])?;
        let ty = self.ty();

        if self.is_zero(b) {
            return Ok(a);
        }
        if self.is_undef(a) || self.is_undef(b) {
            return Ok(self.undef());
        }
        if a == b {
            return Ok(self.zero());
        }
        if ty.norm {
            if !ty.sign && self.is_one(b) {
                return Ok(self.zero());
            }
            if ty.is_norm_int() {
                if let Some(r) = self.try_native(NativeOperation::SatSub, &[a, b])? {
                    return Ok(r);
                }
            }
        }
        self.note_constant("sub", &[a, b]);

        let mut a = a;
        if ty.is_norm_int() {
            if ty.sign {
                let max = self.const_int(ty, ty.int_max());
                let min = self.const_int(ty, ty.int_min());
                let zero = self.zero();
                let max_plus_b = self.bin(BinOp::Add, max, b);
                let min_plus_b = self.bin(BinOp::Add, min, b);
                let a_clamp_max = self.min_simple(a, max_plus_b, NanBehavior::Undefined)?;
                let a_clamp_min = self.max_simple(a, min_plus_b, NanBehavior::Undefined)?;
                let b_positive = self.compare(CmpOp::Gt, false, b, zero);
                a = self.pick(b_positive, a_clamp_min, a_clamp_max);
            } else {
                a = self.max_simple(a, b, NanBehavior::Undefined)?;
            }
        }

        let mut res = self.bin(BinOp::Sub, a, b);

        if ty.norm && (ty.floating || ty.fixed) {
            let floor = if !ty.sign {
                Some(self.zero())
            } else if self.config().norm_floor == NormFloor::Clamped {
                Some(self.splat(-1.0))
            } else {
                None
            };
            if let Some(floor) = floor {
                res = self.max_simple(res, floor, NanBehavior::ReturnOtherSecondNonNan)?;
            }
        }
        Ok(res)
    }

    /// `a * b`.
    ///
    /// Normalized integers are multiplied in double-width lanes and rounded
    /// to nearest; fixed-point products are rescaled.
    pub fn mul(&mut self, a: ValueId, b: ValueId) -> LowerResult<ValueId> {
        self.check(&[a, b])?;
        let ty = self.ty();

        if self.is_zero(a) || self.is_zero(b) {
            return Ok(self.zero());
        }
        if self.is_one(a) {
            return Ok(b);
        }
        if self.is_one(b) {
            return Ok(a);
        }
        if self.is_undef(a) || self.is_undef(b) {
            return Ok(self.undef());
        }

        if ty.is_norm_int() {
            if ty.length == 1 {
                return self.on_two_lanes(&[a, b], |c, v| c.mul(v[0], v[1]));
            }
            let wide = wide_int(ty)
                .ok_or_else(|| LowerError::unsupported(format!("normalized multiply on {ty}")))?;
            let (al, ah) = self.unpack2_native(ty, wide, a)?;
            let (bl, bh) = self.unpack2_native(ty, wide, b)?;
            let (lo, hi) = self.scoped(wide, |c| Ok((c.mul_norm(al, bl)?, c.mul_norm(ah, bh)?)))?;
            return self.pack2_native(wide, ty, lo, hi);
        }
        self.note_constant("mul", &[a, b]);

        let res = self.bin(BinOp::Mul, a, b);
        if ty.fixed {
            let shift = self.const_int(ty, i64::from(ty.width / 2));
            return Ok(self.bin(BinOp::Shr, res, shift));
        }
        Ok(res)
    }

    /// `a * b + c`, fused on targets with FMA.
    pub fn mad(&mut self, a: ValueId, b: ValueId, c: ValueId) -> LowerResult<ValueId> {
        self.check(&[a, b, c])?;
        if self.ty().floating && self.has(Feature::Fma) {
            return self.fmuladd(a, b, c);
        }
        let ab = self.mul(a, b)?;
        self.add(ab, c)
    }

    /// `a * b + c` as one instruction, fused when the target allows.
    pub fn fmuladd(&mut self, a: ValueId, b: ValueId, c: ValueId) -> LowerResult<ValueId> {
        self.check(&[a, b, c])?;
        self.require_float("fmuladd")?;
        let ty = self.ty();
        Ok(self.emit(Op::MulAdd, ty, &[a, b, c]))
    }

    /// `a * imm`.
    pub fn mul_imm(&mut self, a: ValueId, imm: i32) -> LowerResult<ValueId> {
        self.check(&[a])?;
        let ty = self.ty();
        match imm {
            0 => return Ok(self.zero()),
            1 => return Ok(a),
            -1 => return self.negate(a),
            2 if ty.floating => return self.add(a, a),
            _ => {}
        }
        if imm > 0 && imm.unsigned_abs().is_power_of_two() && ty.is_plain_int() {
            return self.shl_imm(a, imm.trailing_zeros());
        }
        let factor = self.splat(f64::from(imm));
        self.mul(a, factor)
    }

    /// `a / b`.
    pub fn div(&mut self, a: ValueId, b: ValueId) -> LowerResult<ValueId> {
        self.check(&[a, b])?;
        let ty = self.ty();

        // A zero divisor wins over the numerator shortcuts: 0/0 is not 0.
        if self.is_zero(b) {
            if self.config().div_by_zero == DivByZero::Undef {
                return Ok(self.undef());
            }
        } else {
            if self.is_zero(a) {
                return Ok(self.zero());
            }
            if ty.floating && self.is_one(a) {
                return self.rcp(b);
            }
        }
        if self.is_one(b) {
            return Ok(a);
        }
        if self.is_undef(a) || self.is_undef(b) {
            return Ok(self.undef());
        }
        if ty.norm || ty.fixed {
            return Err(LowerError::unsupported(format!("division on {ty}")));
        }
        self.note_constant("div", &[a, b]);
        Ok(self.bin(BinOp::Div, a, b))
    }

    /// Remainder with the sign of `a`.
    pub fn modulo(&mut self, a: ValueId, b: ValueId) -> LowerResult<ValueId> {
        self.check(&[a, b])?;
        Ok(self.bin(BinOp::Rem, a, b))
    }

    /// `1 - a`.
    pub fn comp(&mut self, a: ValueId) -> LowerResult<ValueId> {
        self.check(&[a])?;
        let ty = self.ty();
        if self.is_one(a) {
            return Ok(self.zero());
        }
        if self.is_zero(a) {
            return Ok(self.one());
        }
        if ty.is_norm_int() && !ty.sign {
            return Ok(self.un(UnOp::Not, a));
        }
        let one = self.one();
        Ok(self.bin(BinOp::Sub, one, a))
    }

    /// `-a`.
    pub fn negate(&mut self, a: ValueId) -> LowerResult<ValueId> {
        self.check(&[a])?;
        Ok(self.un(UnOp::Neg, a))
    }

    /// `|a|`.
    pub fn abs(&mut self, a: ValueId) -> LowerResult<ValueId> {
        self.check(&[a])?;
        let ty = self.ty();
        if !ty.sign {
            return Ok(a);
        }
        if ty.floating {
            return Ok(self.un(UnOp::Abs, a));
        }
        if let Some(r) = self.try_native(NativeOperation::Abs, &[a])? {
            return Ok(r);
        }
        let zero = self.zero();
        let positive = self.compare(CmpOp::Gt, false, a, zero);
        let negated = self.un(UnOp::Neg, a);
        Ok(self.pick(positive, a, negated))
    }

    /// Sign of `a`: one, zero or minus one.
    pub fn sgn(&mut self, a: ValueId) -> LowerResult<ValueId> {
        self.check(&[a])?;
        let ty = self.ty();
        let zero = self.zero();
        let one = self.one();

        let res = if !ty.sign {
            one
        } else if ty.floating {
            let int_ty = ty.int_type();
            let sign_mask = self.const_int(int_ty, ty.sign_mask() as i64);
            let bits = self.bitcast(a, int_ty);
            let sign = self.bin(BinOp::And, bits, sign_mask);
            let one_bits = self.bitcast(one, int_ty);
            let signed_one = self.bin(BinOp::Or, sign, one_bits);
            self.bitcast(signed_one, ty)
        } else {
            let minus_one = self.splat(-1.0);
            let positive = self.compare(CmpOp::Gt, false, a, zero);
            self.pick(positive, one, minus_one)
        };

        let is_zero = self.compare(CmpOp::Eq, true, a, zero);
        Ok(self.pick(is_zero, zero, res))
    }

    /// Copy `a` with its sign bit replaced by the low bit of `sign`.
    ///
    /// `sign` has the integer lane shape of the current type.
    pub fn set_sign(&mut self, a: ValueId, sign: ValueId) -> LowerResult<ValueId> {
        self.check(&[a])?;
        let ty = self.ty();
        let int_ty = ty.int_type();
        self.check_ty(int_ty, &[sign])?;
        let magnitude = self.const_int(int_ty, !(ty.sign_mask() as i64));
        let shift = self.const_int(int_ty, i64::from(ty.width - 1));
        let bits = self.bitcast(a, int_ty);
        let bits = self.bin(BinOp::And, bits, magnitude);
        let sign = self.bin(BinOp::Shl, sign, shift);
        let bits = self.bin(BinOp::Or, bits, sign);
        Ok(self.bitcast(bits, ty))
    }

    /// Convert integer lanes of the current type's shape to floats.
    pub fn int_to_float(&mut self, a: ValueId) -> LowerResult<ValueId> {
        self.require_float("int_to_float")?;
        let ty = self.ty();
        let src = self.type_of(a);
        if src.floating || src.width != ty.width || src.length != ty.length {
            return Err(LowerError::TypeMismatch {
                expected: ty.int_type(),
                found: src,
            });
        }
        Ok(self.convert(Convert::IntToFloat, a, ty))
    }
}
