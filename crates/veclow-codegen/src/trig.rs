//! Sine and cosine.
//!
//! Cephes-style: `|x|` is scaled by `4/pi` to find its octant, reduced to
//! `[-pi/4, pi/4]` in three extended-precision steps, and evaluated with
//! one of two short polynomials. The octant's low bits select the
//! polynomial and the sign of the result. Non-finite inputs give NaN.

use crate::context::LoweringContext;
use crate::dispatch::{self, NativeOperation};
use crate::LowerResult;
use veclow_ir::{BinOp, CmpOp, Convert, UnOp, ValueId};

const FOUR_OVER_PI: f64 = 1.273_239_544_735_16;

/// `pi/4` split into three parts for the reduction.
const MINUS_DP1: f64 = -0.785_156_25;
const MINUS_DP2: f64 = -2.418_756_484_985_351_562_5e-4;
const MINUS_DP3: f64 = -3.774_894_977_445_941_08e-8;

const COSCOF: [f64; 3] = [
    2.443_315_711_809_948e-5,
    -1.388_731_625_493_765e-3,
    4.166_664_568_298_827e-2,
];

const SINCOF: [f64; 3] = [-1.951_529_589_1e-4, 8.332_160_873_6e-3, -1.666_665_461_1e-1];

impl LoweringContext<'_> {
    /// `sin(a)`.
    pub fn sin(&mut self, a: ValueId) -> LowerResult<ValueId> {
        self.sin_or_cos(a, false)
    }

    /// `cos(a)`.
    pub fn cos(&mut self, a: ValueId) -> LowerResult<ValueId> {
        self.sin_or_cos(a, true)
    }

    fn sin_or_cos(&mut self, a: ValueId, cos: bool) -> LowerResult<ValueId> {
        self.check(&[a])?;
        let name = if cos { "cos" } else { "sin" };
        self.require_float(name)?;
        let ty = self.ty();

        let op = if cos {
            NativeOperation::Cos
        } else {
            NativeOperation::Sin
        };
        if let Some(row) = dispatch::lookup(self.caps(), op, ty) {
            return self.apply_native(row.native(), row.bits(), ty, &[a]);
        }
        self.require_native_half(name)?;
        self.note_constant(name, &[a]);

        let int_ty = ty.int_type();
        let c = |ctx: &mut Self, v: i64| ctx.const_int(int_ty, v);

        let a_bits = self.bitcast(a, int_ty);
        let abs_mask = c(self, !(ty.sign_mask() as i64));
        let abs_bits = self.bin(BinOp::And, a_bits, abs_mask);
        let x_abs = self.bitcast(abs_bits, ty);

        // Octant index, rounded up to even.
        let fopi = self.splat(FOUR_OVER_PI);
        let scaled = self.bin(BinOp::Mul, x_abs, fopi);
        let j = self.convert(Convert::FloatToInt, scaled, int_ty);
        let one_i = c(self, 1);
        let j_plus = self.bin(BinOp::Add, j, one_i);
        let not_one = c(self, !1);
        let j_even = self.bin(BinOp::And, j_plus, not_one);
        let y = self.convert(Convert::IntToFloat, j_even, ty);

        let two_i = c(self, 2);
        let four_i = c(self, 4);
        let sign_shift = c(self, i64::from(ty.width - 3));
        let sign_mask = c(self, ty.sign_mask() as i64);

        let octant = if cos {
            self.bin(BinOp::Sub, j_even, two_i)
        } else {
            j_even
        };
        let sign_bit = if cos {
            let inv = self.un(UnOp::Not, octant);
            let bit = self.bin(BinOp::And, four_i, inv);
            self.bin(BinOp::Shl, bit, sign_shift)
        } else {
            let swap = self.bin(BinOp::Shl, j_plus, sign_shift);
            let sign = self.bin(BinOp::Xor, a_bits, swap);
            self.bin(BinOp::And, sign, sign_mask)
        };

        // Lanes where the sine polynomial applies.
        let zero_i = c(self, 0);
        let sel = self.bin(BinOp::And, octant, two_i);
        let poly_mask = self.compare(CmpOp::Eq, true, sel, zero_i);

        let dp1 = self.splat(MINUS_DP1);
        let dp2 = self.splat(MINUS_DP2);
        let dp3 = self.splat(MINUS_DP3);
        let x = self.fmuladd(y, dp1, x_abs)?;
        let x = self.fmuladd(y, dp2, x)?;
        let x = self.fmuladd(y, dp3, x)?;
        let z = self.bin(BinOp::Mul, x, x);

        // cos polynomial: 1 - z/2 + z^2 * P(z)
        let [c0, c1, c2] = COSCOF.map(|v| self.splat(v));
        let p = self.fmuladd(z, c0, c1)?;
        let p = self.fmuladd(p, z, c2)?;
        let p = self.bin(BinOp::Mul, p, z);
        let p = self.bin(BinOp::Mul, p, z);
        let half = self.splat(0.5);
        let hz = self.bin(BinOp::Mul, z, half);
        let p = self.bin(BinOp::Sub, p, hz);
        let one = self.splat(1.0);
        let cos_poly = self.bin(BinOp::Add, p, one);

        // sin polynomial: x + x * z * Q(z)
        let [s0, s1, s2] = SINCOF.map(|v| self.splat(v));
        let q = self.fmuladd(z, s0, s1)?;
        let q = self.fmuladd(q, z, s2)?;
        let q = self.bin(BinOp::Mul, q, z);
        let sin_poly = self.fmuladd(q, x, x)?;

        let picked = self.pick(poly_mask, sin_poly, cos_poly);
        let picked_bits = self.bitcast(picked, int_ty);
        let signed = self.bin(BinOp::Xor, picked_bits, sign_bit);
        let res = self.bitcast(signed, ty);

        let lo = self.splat(-1.0);
        let hi = self.splat(1.0);
        let res = self.clamp(res, lo, hi)?;
        let finite = self.isfinite(a)?;
        let nan = self.splat(f64::NAN);
        Ok(self.pick(finite, res, nan))
    }
}
