//! Square roots and reciprocals.
//!
//! `rcp` and `rsqrt` divide exactly unless the configuration opts into the
//! approximate instructions, which give about 12 bits and are refined with
//! Newton-Raphson steps.

use crate::context::LoweringContext;
use crate::dispatch::{self, NativeOperation};
use crate::LowerResult;
use veclow_ir::{BinOp, CmpOp, UnOp, ValueId};

impl LoweringContext<'_> {
    /// Correctly rounded square root.
    pub fn sqrt(&mut self, a: ValueId) -> LowerResult<ValueId> {
        self.check(&[a])?;
        self.require_float("sqrt")?;
        if self.is_zero(a) || self.is_one(a) || self.is_undef(a) {
            return Ok(a);
        }
        Ok(self.un(UnOp::Sqrt, a))
    }

    /// `1 / a`.
    pub fn rcp(&mut self, a: ValueId) -> LowerResult<ValueId> {
        self.check(&[a])?;
        self.require_float("rcp")?;
        if self.is_zero(a) || self.is_undef(a) {
            return Ok(self.undef());
        }
        if self.is_one(a) {
            return Ok(self.one());
        }

        if self.config().fast_rcp {
            let ty = self.ty();
            if let Some(row) = dispatch::lookup(self.caps(), NativeOperation::RcpApprox, ty) {
                let mut x = self.apply_native(row.native(), row.bits(), ty, &[a])?;
                for _ in 0..self.config().refine_steps {
                    x = self.rcp_refine(a, x)?;
                }
                return Ok(x);
            }
        }
        self.note_constant("rcp", &[a]);
        let one = self.one();
        Ok(self.bin(BinOp::Div, one, a))
    }

    /// One Newton-Raphson step for `1 / a`: `x + x * (1 - a * x)`.
    fn rcp_refine(&mut self, a: ValueId, x: ValueId) -> LowerResult<ValueId> {
        let one = self.one();
        let neg_a = self.un(UnOp::Neg, a);
        let err = self.fmuladd(neg_a, x, one)?;
        self.fmuladd(err, x, x)
    }

    /// One Newton-Raphson step for `1 / sqrt(a)`: `0.5 * x * (3 - a * x * x)`.
    fn rsqrt_refine(&mut self, a: ValueId, x: ValueId) -> LowerResult<ValueId> {
        let half = self.splat(0.5);
        let three = self.splat(3.0);
        let ax = self.bin(BinOp::Mul, a, x);
        let axx = self.bin(BinOp::Mul, ax, x);
        let t = self.bin(BinOp::Sub, three, axx);
        let hx = self.bin(BinOp::Mul, half, x);
        Ok(self.bin(BinOp::Mul, hx, t))
    }

    /// `1 / sqrt(a)`.
    pub fn rsqrt(&mut self, a: ValueId) -> LowerResult<ValueId> {
        self.check(&[a])?;
        self.require_float("rsqrt")?;

        if self.config().fast_rsqrt && self.fast_rsqrt_available() {
            let mut x = self.fast_rsqrt(a)?;
            let steps = self.config().refine_steps;
            if steps == 0 {
                return Ok(x);
            }
            for _ in 0..steps {
                x = self.rsqrt_refine(a, x)?;
            }
            // The refinement turns 0 into NaN, inf into NaN and may miss 1.
            // Inputs below the smallest normal are flushed by the estimate.
            let ty = self.ty();
            let min_normal = if ty.width == 64 {
                f64::MIN_POSITIVE
            } else {
                f64::from(f32::MIN_POSITIVE)
            };
            let min_normal = self.splat(min_normal);
            let inf = self.splat(f64::INFINITY);
            let zero = self.zero();
            let one = self.one();
            let tiny = self.cmp(CmpOp::Lt, a, min_normal)?;
            x = self.pick(tiny, inf, x);
            let is_inf = self.cmp(CmpOp::Eq, a, inf)?;
            x = self.pick(is_inf, zero, x);
            let is_one = self.cmp(CmpOp::Eq, a, one)?;
            return Ok(self.pick(is_one, one, x));
        }

        let root = self.sqrt(a)?;
        self.rcp(root)
    }

    /// Does the target have an approximate reciprocal square root for the
    /// exact current type?
    #[must_use]
    pub fn fast_rsqrt_available(&self) -> bool {
        let ty = self.ty();
        ty.floating
            && dispatch::lookup_exact(self.caps(), NativeOperation::RsqrtApprox, ty, ty.sign_kind())
                .is_some()
    }

    /// Unrefined approximate `1 / sqrt(a)`.
    ///
    /// Falls back to `rcp(sqrt(a))` when the target has no estimate.
    pub fn fast_rsqrt(&mut self, a: ValueId) -> LowerResult<ValueId> {
        self.check(&[a])?;
        self.require_float("fast_rsqrt")?;
        let ty = self.ty();
        if let Some(row) =
            dispatch::lookup_exact(self.caps(), NativeOperation::RsqrtApprox, ty, ty.sign_kind())
        {
            return Ok(self.native(row.native(), ty, &[a]));
        }
        tracing::debug!(%ty, "no rsqrt estimate, using rcp(sqrt(x))");
        let root = self.sqrt(a)?;
        self.rcp(root)
    }
}
