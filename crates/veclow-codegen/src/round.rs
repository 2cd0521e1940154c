//! Rounding to integral values.
//!
//! A native round instruction is used whenever the target has one for the
//! lane format. Without one, 32-bit lanes round-trip through a truncating
//! integer conversion and fix up the direction with a compare. Lanes with
//! magnitude above 2^24 are already integral (or NaN/inf) and pass through
//! unchanged. Other float widths use the library rounding operation.

use crate::context::LoweringContext;
use crate::dispatch::{self, NativeOperation};
use crate::minmax::NanBehavior;
use crate::LowerResult;
use veclow_ir::{BinOp, CmpOp, Convert, RoundingMode, UnOp, ValueId};

/// Largest float below one half, per lane width.
fn below_half(width: u32) -> f64 {
    match width {
        16 => 0.499_755_859_375,
        64 => f64::from_bits(0x3fdf_ffff_ffff_ffff),
        _ => f64::from(f32::from_bits(0x3eff_ffff)),
    }
}

impl LoweringContext<'_> {
    /// Does the target round the current type natively?
    #[must_use]
    pub fn arch_rounding_available(&self) -> bool {
        let ty = self.ty();
        ty.floating && dispatch::lookup(self.caps(), NativeOperation::Round, ty).is_some()
    }

    fn round_arch(&mut self, a: ValueId, mode: RoundingMode) -> LowerResult<Option<ValueId>> {
        let ty = self.ty();
        match dispatch::lookup(self.caps(), NativeOperation::Round, ty) {
            Some(row) => self
                .apply_native(row.rounding(mode), row.bits(), ty, &[a])
                .map(Some),
            None => Ok(None),
        }
    }

    /// Keep `a` where `|a| > 2^24`, `res` elsewhere.
    fn pass_large(&mut self, a: ValueId, res: ValueId) -> ValueId {
        let int_ty = self.ty().int_type();
        let abs = self.un(UnOp::Abs, a);
        let abs_bits = self.bitcast(abs, int_ty);
        let limit = self.const_int(int_ty, i64::from(16_777_216f32.to_bits()));
        let large = self.compare(CmpOp::Gt, false, abs_bits, limit);
        self.pick(large, a, res)
    }

    /// Truncate through the integer conversion, as a float.
    fn trunc_via_int(&mut self, a: ValueId) -> ValueId {
        let ty = self.ty();
        let i = self.convert(Convert::FloatToInt, a, ty.int_type());
        self.convert(Convert::IntToFloat, i, ty)
    }

    /// Float with just the bits of `one` where `mask` is set, zero elsewhere.
    fn one_where(&mut self, mask: ValueId) -> ValueId {
        let ty = self.ty();
        let one = self.one();
        let one_bits = self.bitcast(one, ty.int_type());
        let bits = self.bin(BinOp::And, mask, one_bits);
        self.bitcast(bits, ty)
    }

    /// Round toward zero.
    pub fn trunc(&mut self, a: ValueId) -> LowerResult<ValueId> {
        self.check(&[a])?;
        self.require_float("trunc")?;
        if let Some(r) = self.round_arch(a, RoundingMode::Truncate)? {
            return Ok(r);
        }
        if self.ty().width != 32 {
            return Ok(self.un(UnOp::Round(RoundingMode::Truncate), a));
        }
        let res = self.trunc_via_int(a);
        Ok(self.pass_large(a, res))
    }

    /// Round to nearest.
    ///
    /// Ties go to even when the target rounds natively and for f16 and f64
    /// lanes. The generic 32-bit path adds just under one half and
    /// truncates, so there ties go away from zero (`2.5` gives `3`).
    pub fn round(&mut self, a: ValueId) -> LowerResult<ValueId> {
        self.check(&[a])?;
        self.require_float("round")?;
        if let Some(r) = self.round_arch(a, RoundingMode::Nearest)? {
            return Ok(r);
        }
        let ty = self.ty();
        if ty.width != 32 {
            return Ok(self.un(UnOp::Round(RoundingMode::Nearest), a));
        }
        let i = self.iround(a)?;
        let res = self.convert(Convert::IntToFloat, i, ty);
        Ok(self.pass_large(a, res))
    }

    /// Round toward negative infinity.
    pub fn floor(&mut self, a: ValueId) -> LowerResult<ValueId> {
        self.check(&[a])?;
        self.require_float("floor")?;
        if let Some(r) = self.round_arch(a, RoundingMode::Floor)? {
            return Ok(r);
        }
        if self.ty().width != 32 {
            return Ok(self.un(UnOp::Round(RoundingMode::Floor), a));
        }
        let mut res = self.trunc_via_int(a);
        if self.ty().sign {
            // Truncation rounded a negative value up.
            let wrong = self.compare(CmpOp::Gt, false, res, a);
            let step = self.one_where(wrong);
            res = self.bin(BinOp::Sub, res, step);
        }
        Ok(self.pass_large(a, res))
    }

    /// Round toward positive infinity.
    pub fn ceil(&mut self, a: ValueId) -> LowerResult<ValueId> {
        self.check(&[a])?;
        self.require_float("ceil")?;
        if let Some(r) = self.round_arch(a, RoundingMode::Ceil)? {
            return Ok(r);
        }
        if self.ty().width != 32 {
            return Ok(self.un(UnOp::Round(RoundingMode::Ceil), a));
        }
        let mut res = self.trunc_via_int(a);
        let wrong = self.compare(CmpOp::Lt, false, res, a);
        let step = self.one_where(wrong);
        res = self.bin(BinOp::Add, res, step);
        Ok(self.pass_large(a, res))
    }

    /// `a - floor(a)`.
    pub fn fract(&mut self, a: ValueId) -> LowerResult<ValueId> {
        let floor = self.floor(a)?;
        Ok(self.bin(BinOp::Sub, a, floor))
    }

    /// Clamp a fractional part to the largest float below one.
    fn clamp_fract(&mut self, fract: ValueId) -> LowerResult<ValueId> {
        let mantissa = self.ty().mantissa_bits();
        let max = self.splat(1.0 - 1.0 / (1u64 << (mantissa + 1)) as f64);
        self.min_ext(fract, max, NanBehavior::ReturnOtherSecondNonNan)
    }

    /// [`fract`](Self::fract) guaranteed to stay below one.
    ///
    /// Tiny negative inputs make `a - floor(a)` round up to exactly one.
    pub fn fract_safe(&mut self, a: ValueId) -> LowerResult<ValueId> {
        let fract = self.fract(a)?;
        self.clamp_fract(fract)
    }

    /// Truncating conversion to integer lanes.
    pub fn itrunc(&mut self, a: ValueId) -> LowerResult<ValueId> {
        self.check(&[a])?;
        self.require_float("itrunc")?;
        let int_ty = self.ty().int_type();
        Ok(self.convert(Convert::FloatToInt, a, int_ty))
    }

    /// Round-to-nearest conversion to integer lanes.
    ///
    /// Same tie rule as [`round`](Self::round): even with a native
    /// conversion or rounding row, away from zero otherwise.
    pub fn iround(&mut self, a: ValueId) -> LowerResult<ValueId> {
        self.check(&[a])?;
        self.require_float("iround")?;
        let ty = self.ty();
        let int_ty = ty.int_type();

        if let Some(row) =
            dispatch::lookup_exact(self.caps(), NativeOperation::ConvertNearest, ty, ty.sign_kind())
        {
            return Ok(self.native(row.native(), int_ty, &[a]));
        }

        let res = if let Some(r) = self.round_arch(a, RoundingMode::Nearest)? {
            r
        } else {
            let mut half = self.splat(below_half(ty.width));
            if ty.sign {
                let sign_mask = self.const_int(int_ty, ty.sign_mask() as i64);
                let bits = self.bitcast(a, int_ty);
                let sign = self.bin(BinOp::And, bits, sign_mask);
                let half_bits = self.bitcast(half, int_ty);
                let signed_half = self.bin(BinOp::Or, sign, half_bits);
                half = self.bitcast(signed_half, ty);
            }
            self.bin(BinOp::Add, a, half)
        };
        Ok(self.convert(Convert::FloatToInt, res, int_ty))
    }

    /// Round-down conversion to integer lanes.
    pub fn ifloor(&mut self, a: ValueId) -> LowerResult<ValueId> {
        self.check(&[a])?;
        self.require_float("ifloor")?;
        let ty = self.ty();
        let int_ty = ty.int_type();
        let mut res = a;
        if ty.sign {
            match self.round_arch(a, RoundingMode::Floor)? {
                Some(r) => res = r,
                None => {
                    let itrunc = self.convert(Convert::FloatToInt, a, int_ty);
                    let trunc = self.convert(Convert::IntToFloat, itrunc, ty);
                    // The mask is minus one where truncation went up.
                    let wrong = self.compare(CmpOp::Gt, false, trunc, a);
                    return Ok(self.bin(BinOp::Add, itrunc, wrong));
                }
            }
        }
        Ok(self.convert(Convert::FloatToInt, res, int_ty))
    }

    /// Round-up conversion to integer lanes.
    pub fn iceil(&mut self, a: ValueId) -> LowerResult<ValueId> {
        self.check(&[a])?;
        self.require_float("iceil")?;
        let ty = self.ty();
        let int_ty = ty.int_type();
        let res = match self.round_arch(a, RoundingMode::Ceil)? {
            Some(r) => r,
            None => {
                let itrunc = self.convert(Convert::FloatToInt, a, int_ty);
                let trunc = self.convert(Convert::IntToFloat, itrunc, ty);
                let wrong = self.compare(CmpOp::Lt, false, trunc, a);
                return Ok(self.bin(BinOp::Sub, itrunc, wrong));
            }
        };
        Ok(self.convert(Convert::FloatToInt, res, int_ty))
    }

    /// Integer floor and the fractional remainder, `a = ipart + fpart`.
    pub fn ifloor_fract(&mut self, a: ValueId) -> LowerResult<(ValueId, ValueId)> {
        self.check(&[a])?;
        self.require_float("ifloor_fract")?;
        let ty = self.ty();
        if self.arch_rounding_available() {
            let floor = self.floor(a)?;
            let fpart = self.bin(BinOp::Sub, a, floor);
            let ipart = self.convert(Convert::FloatToInt, floor, ty.int_type());
            return Ok((ipart, fpart));
        }
        let ipart = self.ifloor(a)?;
        let floor = self.convert(Convert::IntToFloat, ipart, ty);
        let fpart = self.bin(BinOp::Sub, a, floor);
        Ok((ipart, fpart))
    }

    /// [`ifloor_fract`](Self::ifloor_fract) with the fraction kept below one.
    pub fn ifloor_fract_safe(&mut self, a: ValueId) -> LowerResult<(ValueId, ValueId)> {
        let (ipart, fpart) = self.ifloor_fract(a)?;
        Ok((ipart, self.clamp_fract(fpart)?))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use veclow_interp::Interpreter;
    use veclow_ir::{Op, VectorType};
    use veclow_target::FeatureSet;

    const INPUTS: [f32; 8] = [-2.5, -1.5, -0.3, 0.0, 0.5, 1.7, 2.5, 3.0e7];

    fn run(caps: FeatureSet, f: impl Fn(&mut LoweringContext<'_>, ValueId) -> ValueId) -> Vec<f32> {
        let ty = VectorType::VEC8F32;
        let mut interp = Interpreter::new();
        let a = interp.input_f32(ty, &INPUTS);
        let mut ctx = LoweringContext::new(&mut interp, &caps, ty).unwrap();
        let r = f(&mut ctx, a);
        drop(ctx);
        if interp.inst(r).ty.floating {
            interp.lanes_f32(r)
        } else {
            interp.lanes_i64(r).into_iter().map(|v| v as f32).collect()
        }
    }

    fn targets() -> [FeatureSet; 3] {
        [FeatureSet::empty(), FeatureSet::X86_64_V2, FeatureSet::X86_64_V3]
    }

    #[test]
    fn test_float_rounding() {
        for caps in targets() {
            assert_eq!(
                run(caps, |c, a| c.trunc(a).unwrap()),
                vec![-2.0, -1.0, -0.0, 0.0, 0.0, 1.0, 2.0, 3.0e7],
                "{caps}"
            );
            assert_eq!(
                run(caps, |c, a| c.floor(a).unwrap()),
                vec![-3.0, -2.0, -1.0, 0.0, 0.0, 1.0, 2.0, 3.0e7],
                "{caps}"
            );
            assert_eq!(
                run(caps, |c, a| c.ceil(a).unwrap()),
                vec![-2.0, -1.0, 0.0, 0.0, 1.0, 2.0, 3.0, 3.0e7],
                "{caps}"
            );
        }
    }

    #[test]
    fn test_round_nearest() {
        // Without native rounding, halfway cases round away from zero.
        let generic = run(FeatureSet::empty(), |c, a| c.round(a).unwrap());
        assert_eq!(generic, vec![-3.0, -2.0, 0.0, 0.0, 1.0, 2.0, 3.0, 3.0e7]);
        let native = run(FeatureSet::X86_64_V3, |c, a| c.round(a).unwrap());
        assert_eq!(native, vec![-2.0, -2.0, 0.0, 0.0, 0.0, 2.0, 2.0, 3.0e7]);
        let generic = run(FeatureSet::empty(), |c, a| c.iround(a).unwrap());
        assert_eq!(generic, vec![-3.0, -2.0, 0.0, 0.0, 1.0, 2.0, 3.0, 3.0e7]);
        let native = run(FeatureSet::X86_64_V3, |c, a| c.iround(a).unwrap());
        assert_eq!(native, vec![-2.0, -2.0, 0.0, 0.0, 0.0, 2.0, 2.0, 3.0e7]);
    }

    #[test]
    fn test_integer_rounding() {
        for caps in targets() {
            assert_eq!(
                run(caps, |c, a| c.ifloor(a).unwrap()),
                vec![-3.0, -2.0, -1.0, 0.0, 0.0, 1.0, 2.0, 3.0e7],
                "{caps}"
            );
            assert_eq!(
                run(caps, |c, a| c.iceil(a).unwrap()),
                vec![-2.0, -1.0, 0.0, 0.0, 1.0, 2.0, 3.0, 3.0e7],
                "{caps}"
            );
            assert_eq!(
                run(caps, |c, a| c.itrunc(a).unwrap()),
                vec![-2.0, -1.0, 0.0, 0.0, 0.0, 1.0, 2.0, 3.0e7],
                "{caps}"
            );
        }
    }

    #[test]
    fn test_fract() {
        for caps in targets() {
            let r = run(caps, |c, a| c.fract(a).unwrap());
            let expected = [0.5, 0.5, 0.7, 0.0, 0.5, 0.7, 0.5, 0.0];
            for (got, want) in r.iter().zip(expected) {
                assert!((got - want).abs() < 1e-6, "{caps}: {got} vs {want}");
            }
        }
    }

    #[test]
    fn test_fract_safe_below_one() {
        let ty = VectorType::VEC4F32;
        let mut interp = Interpreter::new();
        let a = interp.input_f32(ty, &[-1.0e-10, 0.25, -0.0, 5.0]);
        let caps = FeatureSet::empty();
        let mut ctx = LoweringContext::new(&mut interp, &caps, ty).unwrap();
        let r = ctx.fract_safe(a).unwrap();
        let (ipart, fpart) = ctx.ifloor_fract_safe(a).unwrap();
        drop(ctx);
        let lanes = interp.lanes_f32(r);
        assert!(lanes[0] < 1.0);
        assert_eq!(&lanes[1..], &[0.25, 0.0, 0.0]);
        assert_eq!(interp.lanes_i64(ipart), vec![-1, 0, 0, 5]);
        assert!(interp.lanes_f32(fpart).iter().all(|&f| (0.0..1.0).contains(&f)));
    }

    #[test]
    fn test_iround_uses_convert_nearest() {
        let ty = VectorType::VEC4F32;
        let mut interp = Interpreter::new();
        let a = interp.input_f32(ty, &[0.5, 1.5, -2.5, 2.4]);
        let caps = FeatureSet::X86_64_V1;
        let mut ctx = LoweringContext::new(&mut interp, &caps, ty).unwrap();
        let r = ctx.iround(a).unwrap();
        drop(ctx);
        assert_eq!(interp.lanes_i64(r), vec![0, 2, -2, 2]);
        assert!(interp.any_op(|op| matches!(op, Op::Native(n) if n.name == "llvm.x86.sse2.cvtps2dq")));
    }

    #[test]
    fn test_nan_passes_through_generic_floor() {
        let ty = VectorType::VEC4F32;
        let mut interp = Interpreter::new();
        let a = interp.input_f32(ty, &[f32::NAN, f32::INFINITY, f32::NEG_INFINITY, -0.5]);
        let caps = FeatureSet::empty();
        let mut ctx = LoweringContext::new(&mut interp, &caps, ty).unwrap();
        let r = ctx.floor(a).unwrap();
        drop(ctx);
        let lanes = interp.lanes_f32(r);
        assert!(lanes[0].is_nan());
        assert_eq!(&lanes[1..], &[f32::INFINITY, f32::NEG_INFINITY, -1.0]);
    }

    #[test]
    fn test_half_and_double_use_library_rounding() {
        let ty = VectorType::float(64, 2);
        let mut interp = Interpreter::new();
        let a = interp.input_f64(ty, &[1.5, -1.5]);
        let caps = FeatureSet::empty();
        let mut ctx = LoweringContext::new(&mut interp, &caps, ty).unwrap();
        let r = ctx.floor(a).unwrap();
        drop(ctx);
        assert_eq!(interp.lanes_f64(r), vec![1.0, -2.0]);
        assert!(interp.any_op(|op| *op == Op::Un(UnOp::Round(RoundingMode::Floor))));
    }
}
