//! Exponentials and logarithms.
//!
//! `exp2` splits its argument into integer and fractional parts, builds
//! `2^i` directly in the exponent field and approximates `2^f` with a
//! minimax polynomial on `[0, 1)`. `log2` reads the exponent field and
//! approximates the mantissa term as `y * P(y^2)` with
//! `y = (m - 1) / (m + 1)`.
//!
//! Half-precision lanes need the native instructions: the polynomials
//! lose too much at 11 bits of mantissa, so without a native row `exp2`,
//! `log2` and everything built on them fail as unsupported.

use crate::context::LoweringContext;
use crate::dispatch::{self, NativeOperation};
use crate::minmax::NanBehavior;
use crate::{LowerError, LowerResult};
use veclow_ir::{BinOp, CmpOp, Convert, ValueId};

/// Minimax fits of `2^x` on `[0, 1)`, by degree.
const EXP2_POLY_5: [f64; 6] = [
    1.0,
    0.693_153_073_200_168_932_794,
    0.240_153_617_044_375_388_211,
    0.055_826_318_053_295_666_477_5,
    0.008_989_340_090_494_663_911_01,
    0.001_877_576_675_191_479_126_99,
];
const EXP2_POLY_4: [f64; 5] = [
    1.000_002_593_370_694_346_83,
    0.693_003_834_469_974_940_458,
    0.241_442_756_891_507_930_76,
    0.052_011_460_610_307_015_023_5,
    0.013_534_167_916_127_026_876_4,
];
const EXP2_POLY_3: [f64; 4] = [
    0.999_925_218_562_710_312_959,
    0.695_833_540_494_823_811_697,
    0.226_067_155_427_249_155_588,
    0.078_024_522_640_637_299_296_7,
];
const EXP2_POLY_2: [f64; 3] = [
    1.001_724_763_214_745_035_78,
    0.657_636_275_736_077_639_316,
    0.337_189_434_619_687_207_04,
];

/// Minimax fits of `log2((1 + sqrt(x)) / (1 - sqrt(x))) / sqrt(x)` on
/// `[0, 1/9)`, by degree.
const LOG2_POLY_5: [f64; 6] = [
    2.885_390_081_487_777_864_88,
    0.961_796_878_841_293_367_824,
    0.577_058_946_784_739_859_012,
    0.412_914_355_135_828_735_411,
    0.308_591_899_232_910_175_289,
    0.352_376_952_300_281_371_868,
];
const LOG2_POLY_4: [f64; 5] = [
    2.885_390_093_433_091_783_25,
    0.961_791_550_404_184_197_881,
    0.577_440_339_438_736_392_009,
    0.403_343_858_251_329_912_514,
    0.406_718_052_498_846_252_698,
];
const LOG2_POLY_3: [f64; 4] = [
    2.885_389_597_488_727_538_38,
    0.961_932_915_889_597_772_928,
    0.571_118_517_972_136_195_241,
    0.493_997_535_084_709_500_285,
];

fn exp2_coeffs(degree: u8) -> &'static [f64] {
    match degree {
        2 => &EXP2_POLY_2,
        3 => &EXP2_POLY_3,
        4 => &EXP2_POLY_4,
        _ => &EXP2_POLY_5,
    }
}

fn log2_coeffs(degree: u8) -> &'static [f64] {
    match degree {
        3 => &LOG2_POLY_3,
        5 => &LOG2_POLY_5,
        _ => &LOG2_POLY_4,
    }
}

/// The three results of [`LoweringContext::log2_approx`].
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct Log2Parts {
    /// The exponent field of `x` alone, as a float (`2^floor(log2(x))`).
    pub exponent: ValueId,
    /// `floor(log2(x))` as a float.
    pub floor_log2: ValueId,
    /// Approximate `log2(x)`.
    pub log2: ValueId,
}

impl LoweringContext<'_> {
    /// Evaluate `coeffs[0] + x * coeffs[1] + x^2 * coeffs[2] + ...`.
    ///
    /// Even and odd terms are accumulated separately in `x^2` to shorten
    /// the dependency chain.
    pub fn polynomial(&mut self, x: ValueId, coeffs: &[f64]) -> LowerResult<ValueId> {
        self.check(&[x])?;
        self.note_constant("polynomial", &[x]);
        let x2 = self.mul(x, x)?;
        let mut even: Option<ValueId> = None;
        let mut odd: Option<ValueId> = None;
        for (i, &c) in coeffs.iter().enumerate().rev() {
            let coeff = self.splat(c);
            let acc = if i % 2 == 0 { &mut even } else { &mut odd };
            *acc = Some(match *acc {
                Some(prev) => self.mad(x2, prev, coeff)?,
                None => coeff,
            });
        }
        match (odd, even) {
            (Some(odd), Some(even)) => self.mad(odd, x, even),
            (None, Some(even)) => Ok(even),
            _ => Ok(self.undef()),
        }
    }

    fn try_native_unary(&mut self, op: NativeOperation, x: ValueId) -> LowerResult<Option<ValueId>> {
        let ty = self.ty();
        match dispatch::lookup(self.caps(), op, ty) {
            Some(row) => self.apply_native(row.native(), row.bits(), ty, &[x]).map(Some),
            None => Ok(None),
        }
    }

    /// Fail for half-precision lanes, which have no polynomial fallback.
    pub(crate) fn require_native_half(&self, name: &str) -> LowerResult<()> {
        let ty = self.ty();
        if ty.floating && ty.width == 16 {
            return Err(LowerError::unsupported(format!("{name} on {ty} without native support")));
        }
        Ok(())
    }

    /// `2^x`.
    ///
    /// Inputs above the exponent range give infinity, inputs below it give
    /// the smallest normal or zero, NaN stays NaN.
    pub fn exp2(&mut self, x: ValueId) -> LowerResult<ValueId> {
        self.check(&[x])?;
        self.require_float("exp2")?;
        if let Some(r) = self.try_native_unary(NativeOperation::Exp2, x)? {
            return Ok(r);
        }
        self.require_native_half("exp2")?;
        self.note_constant("exp2", &[x]);

        let ty = self.ty();
        let int_ty = ty.int_type();
        let bias = ty.exponent_bias();
        let hi = self.splat((bias + 1) as f64);
        let lo = self.splat(-((bias - 1) as f64) - 0.99999);
        let x = self.min_ext(hi, x, NanBehavior::ReturnNanFirstNonNan)?;
        let x = self.max_ext(lo, x, NanBehavior::ReturnNanFirstNonNan)?;

        let (ipart, fpart) = self.ifloor_fract(x)?;

        let bias = self.const_int(int_ty, bias);
        let shift = self.const_int(int_ty, i64::from(ty.mantissa_bits()));
        let biased = self.bin(BinOp::Add, ipart, bias);
        let field = self.bin(BinOp::Shl, biased, shift);
        let exp_ipart = self.bitcast(field, ty);

        let degree = self.config().exp2_degree;
        let exp_fpart = self.polynomial(fpart, exp2_coeffs(degree))?;
        Ok(self.bin(BinOp::Mul, exp_ipart, exp_fpart))
    }

    /// `floor(log2(x)) + bias` as integer lanes, read from the exponent
    /// field.
    pub fn extract_exponent(&mut self, x: ValueId, bias: i32) -> LowerResult<ValueId> {
        self.check(&[x])?;
        self.require_float("extract_exponent")?;
        let ty = self.ty();
        let int_ty = ty.int_type();
        let mantissa = ty.mantissa_bits();
        let bits = self.bitcast(x, int_ty);
        let shift = self.const_int(int_ty, i64::from(mantissa));
        let field_mask = self.const_int(int_ty, (ty.exponent_mask() >> mantissa) as i64);
        let offset = self.const_int(int_ty, ty.exponent_bias() - i64::from(bias));
        let exp = self.bin(BinOp::Shr, bits, shift);
        let exp = self.bin(BinOp::And, exp, field_mask);
        Ok(self.bin(BinOp::Sub, exp, offset))
    }

    /// `x / 2^floor(log2(x))`, in `[1, 2)` for positive normal `x`.
    pub fn extract_mantissa(&mut self, x: ValueId) -> LowerResult<ValueId> {
        self.check(&[x])?;
        self.require_float("extract_mantissa")?;
        let ty = self.ty();
        let int_ty = ty.int_type();
        let bits = self.bitcast(x, int_ty);
        let mant_mask = self.const_int(int_ty, ((1u64 << ty.mantissa_bits()) - 1) as i64);
        let one = self.one();
        let one_bits = self.bitcast(one, int_ty);
        let mant = self.bin(BinOp::And, bits, mant_mask);
        let mant = self.bin(BinOp::Or, mant, one_bits);
        Ok(self.bitcast(mant, ty))
    }

    /// Exponent, `floor(log2(x))` and `log2(x)` of `x` together.
    ///
    /// Denormals are not special-cased and land near the bottom of the
    /// exponent range. With `handle_edge_cases`, negative and NaN inputs
    /// give NaN, zeros give negative infinity and positive infinity gives
    /// itself; without it those lanes are unspecified.
    pub fn log2_approx(&mut self, x: ValueId, handle_edge_cases: bool) -> LowerResult<Log2Parts> {
        self.check(&[x])?;
        self.require_float("log2_approx")?;
        let ty = self.ty();
        let int_ty = ty.int_type();

        let bits = self.bitcast(x, int_ty);
        let exp_mask = self.const_int(int_ty, ty.exponent_mask() as i64);
        let exp_bits = self.bin(BinOp::And, bits, exp_mask);
        let exponent = self.bitcast(exp_bits, ty);

        let shift = self.const_int(int_ty, i64::from(ty.mantissa_bits()));
        let bias = self.const_int(int_ty, ty.exponent_bias());
        let log_exp = self.bin(BinOp::Shr, exp_bits, shift);
        let log_exp = self.bin(BinOp::Sub, log_exp, bias);
        let floor_log2 = self.convert(Convert::IntToFloat, log_exp, ty);

        if let Some(log2) = self.try_native_unary(NativeOperation::Log2, x)? {
            return Ok(Log2Parts {
                exponent,
                floor_log2,
                log2,
            });
        }
        self.require_native_half("log2")?;
        self.note_constant("log2", &[x]);

        let mant = self.extract_mantissa(x)?;
        let one = self.one();
        let num = self.bin(BinOp::Sub, mant, one);
        let den = self.bin(BinOp::Add, mant, one);
        let y = self.bin(BinOp::Div, num, den);
        let z = self.mul(y, y)?;
        let degree = self.config().log2_degree;
        let p_z = self.polynomial(z, log2_coeffs(degree))?;
        let mut res = self.mad(y, p_z, floor_log2)?;

        if handle_edge_cases {
            let zero = self.zero();
            let inf = self.splat(f64::INFINITY);
            let neg_inf = self.splat(f64::NEG_INFINITY);
            let nan = self.splat(f64::NAN);
            let neg = self.cmp(CmpOp::Lt, x, zero)?;
            let is_zero = self.cmp(CmpOp::Eq, x, zero)?;
            let is_inf = self.cmp(CmpOp::Ge, x, inf)?;
            res = self.pick(is_inf, inf, res);
            res = self.pick(is_zero, neg_inf, res);
            res = self.pick(neg, nan, res);
        }
        Ok(Log2Parts {
            exponent,
            floor_log2,
            log2: res,
        })
    }

    /// `log2(x)` for positive finite `x`.
    pub fn log2(&mut self, x: ValueId) -> LowerResult<ValueId> {
        Ok(self.log2_approx(x, false)?.log2)
    }

    /// `log2(x)` with IEEE results for zero, negative, infinite and NaN
    /// inputs.
    pub fn log2_safe(&mut self, x: ValueId) -> LowerResult<ValueId> {
        Ok(self.log2_approx(x, true)?.log2)
    }

    /// Piecewise linear `log2`, exact at powers of two.
    pub fn fast_log2(&mut self, x: ValueId) -> LowerResult<ValueId> {
        let ty = self.ty();
        let ipart = self.extract_exponent(x, -1)?;
        let ipart = self.convert(Convert::IntToFloat, ipart, ty);
        let fpart = self.extract_mantissa(x)?;
        Ok(self.bin(BinOp::Add, ipart, fpart))
    }

    /// `iround(log2(x))` as integer lanes, exact.
    pub fn ilog2(&mut self, x: ValueId) -> LowerResult<ValueId> {
        self.check(&[x])?;
        self.require_float("ilog2")?;
        let sqrt2 = self.splat(std::f64::consts::SQRT_2);
        let scaled = self.bin(BinOp::Mul, x, sqrt2);
        self.extract_exponent(scaled, 0)
    }

    /// `e^x`.
    pub fn exp(&mut self, x: ValueId) -> LowerResult<ValueId> {
        self.check(&[x])?;
        let log2e = self.splat(std::f64::consts::LOG2_E);
        let scaled = self.mul(log2e, x)?;
        self.exp2(scaled)
    }

    /// Natural logarithm for positive finite `x`.
    pub fn log(&mut self, x: ValueId) -> LowerResult<ValueId> {
        self.check(&[x])?;
        let ln2 = self.splat(std::f64::consts::LN_2);
        let l = self.log2(x)?;
        self.mul(ln2, l)
    }

    /// Natural logarithm with IEEE edge cases.
    pub fn log_safe(&mut self, x: ValueId) -> LowerResult<ValueId> {
        self.check(&[x])?;
        let ln2 = self.splat(std::f64::consts::LN_2);
        let l = self.log2_safe(x)?;
        self.mul(ln2, l)
    }

    /// `x^y`, with `0^y = 0` for every `y`.
    pub fn pow(&mut self, x: ValueId, y: ValueId) -> LowerResult<ValueId> {
        self.check(&[x, y])?;
        self.require_float("pow")?;
        self.note_constant("pow", &[x, y]);
        let zero = self.splat(0.0);
        let x_zero = self.cmp(CmpOp::Eq, x, zero)?;
        let l = self.log2_safe(x)?;
        let ly = self.mul(l, y)?;
        let res = self.exp2(ly)?;
        Ok(self.pick(x_zero, zero, res))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::LowerConfig;
    use veclow_interp::Interpreter;
    use veclow_ir::{Op, VectorType};
    use veclow_target::{Feature, FeatureSet};

    fn run_f32(
        caps: FeatureSet,
        input: &[f32],
        f: impl Fn(&mut LoweringContext<'_>, ValueId) -> ValueId,
    ) -> Vec<f32> {
        let ty = VectorType::float(32, input.len() as u32);
        let mut interp = Interpreter::new();
        let a = interp.input_f32(ty, input);
        let mut ctx = LoweringContext::new(&mut interp, &caps, ty).unwrap();
        let r = f(&mut ctx, a);
        drop(ctx);
        interp.lanes_f32(r)
    }

    fn assert_close(got: &[f32], want: &[f64], rel: f64) {
        for (&g, &w) in got.iter().zip(want) {
            let err = (f64::from(g) - w).abs();
            assert!(err <= rel * w.abs().max(1.0), "{g} vs {w}");
        }
    }

    #[test]
    fn test_polynomial_horner_order() {
        let r = run_f32(FeatureSet::empty(), &[0.0, 1.0, 2.0, -1.0], |c, x| {
            c.polynomial(x, &[1.0, 2.0, 3.0]).unwrap()
        });
        assert_eq!(r, vec![1.0, 6.0, 17.0, 2.0]);
    }

    #[test]
    fn test_exp2_exact_at_integers() {
        let r = run_f32(FeatureSet::empty(), &[0.0, 1.0, 3.0, -1.0], |c, x| c.exp2(x).unwrap());
        assert_eq!(r, vec![1.0, 2.0, 8.0, 0.5]);
    }

    #[test]
    fn test_exp2_accuracy() {
        let xs = [0.5f32, -2.3, 7.77, 0.1];
        for caps in [FeatureSet::empty(), FeatureSet::X86_64_V3] {
            let r = run_f32(caps, &xs, |c, x| c.exp2(x).unwrap());
            let want: Vec<f64> = xs.iter().map(|&x| f64::from(x).exp2()).collect();
            assert_close(&r, &want, 1e-5);
        }
    }

    #[test]
    fn test_exp2_range_limits() {
        let r = run_f32(FeatureSet::empty(), &[200.0, -200.0, f32::NAN, 128.0], |c, x| {
            c.exp2(x).unwrap()
        });
        assert_eq!(r[0], f32::INFINITY);
        assert!(r[1] >= 0.0 && r[1] < 1e-37);
        assert!(r[2].is_nan());
        assert_eq!(r[3], f32::INFINITY);
    }

    #[test]
    fn test_low_degree_exp2() {
        let ty = VectorType::VEC4F32;
        let mut interp = Interpreter::new();
        let a = interp.input_f32(ty, &[0.25, 0.5, 0.75, 1.5]);
        let caps = FeatureSet::empty();
        let mut ctx = LoweringContext::new(&mut interp, &caps, ty)
            .unwrap()
            .with_config(LowerConfig::default().with_exp2_degree(2))
            .unwrap();
        let r = ctx.exp2(a).unwrap();
        drop(ctx);
        let want: Vec<f64> = [0.25f64, 0.5, 0.75, 1.5].iter().map(|x| x.exp2()).collect();
        assert_close(&interp.lanes_f32(r), &want, 5e-3);
    }

    #[test]
    fn test_log2() {
        let r = run_f32(FeatureSet::empty(), &[1.0, 8.0, 3.0, 0.1], |c, x| c.log2(x).unwrap());
        assert_eq!(&r[..2], &[0.0, 3.0]);
        assert_close(&r[2..], &[3f64.log2(), 0.1f64.log2()], 1e-5);
    }

    #[test]
    fn test_log2_safe_edge_cases() {
        let r = run_f32(
            FeatureSet::empty(),
            &[0.0, -1.0, f32::INFINITY, f32::NAN, -0.0, f32::NEG_INFINITY, 2.0, 1.0],
            |c, x| c.log2_safe(x).unwrap(),
        );
        assert_eq!(r[0], f32::NEG_INFINITY);
        assert!(r[1].is_nan());
        assert_eq!(r[2], f32::INFINITY);
        assert!(r[3].is_nan());
        assert_eq!(r[4], f32::NEG_INFINITY);
        assert!(r[5].is_nan());
        assert_eq!(&r[6..], &[1.0, 0.0]);
    }

    #[test]
    fn test_log2_approx_parts() {
        let ty = VectorType::VEC4F32;
        let mut interp = Interpreter::new();
        let a = interp.input_f32(ty, &[1.0, 5.0, 0.3, 1024.0]);
        let caps = FeatureSet::empty();
        let mut ctx = LoweringContext::new(&mut interp, &caps, ty).unwrap();
        let parts = ctx.log2_approx(a, false).unwrap();
        drop(ctx);
        assert_eq!(interp.lanes_f32(parts.exponent), vec![1.0, 4.0, 0.25, 1024.0]);
        assert_eq!(interp.lanes_f32(parts.floor_log2), vec![0.0, 2.0, -2.0, 10.0]);
    }

    #[test]
    fn test_exponent_and_mantissa() {
        let ty = VectorType::VEC4F32;
        let mut interp = Interpreter::new();
        let a = interp.input_f32(ty, &[1.0, 6.0, 0.75, -12.0]);
        let caps = FeatureSet::empty();
        let mut ctx = LoweringContext::new(&mut interp, &caps, ty).unwrap();
        let e = ctx.extract_exponent(a, 0).unwrap();
        let e1 = ctx.extract_exponent(a, 1).unwrap();
        let m = ctx.extract_mantissa(a).unwrap();
        let il = ctx.ilog2(a).unwrap();
        let fl = ctx.fast_log2(a).unwrap();
        drop(ctx);
        assert_eq!(interp.lanes_i64(e), vec![0, 2, -1, 3]);
        assert_eq!(interp.lanes_i64(e1), vec![1, 3, 0, 4]);
        assert_eq!(interp.lanes_f32(m), vec![1.0, 1.5, 1.5, 1.5]);
        // log2(6) = 2.58, log2(0.75) = -0.41
        assert_eq!(interp.lanes_i64(il), vec![0, 3, 0, 4]);
        assert_eq!(interp.lanes_f32(fl), vec![0.0, 2.5, -0.5, 3.5]);
    }

    #[test]
    fn test_exp_and_log() {
        let xs = [0.0f32, 1.0, -0.5, 2.0];
        let r = run_f32(FeatureSet::empty(), &xs, |c, x| c.exp(x).unwrap());
        let want: Vec<f64> = xs.iter().map(|&x| f64::from(x).exp()).collect();
        assert_close(&r, &want, 1e-5);

        let xs = [1.0f32, std::f32::consts::E, 10.0, 0.5];
        let r = run_f32(FeatureSet::empty(), &xs, |c, x| c.log(x).unwrap());
        let want: Vec<f64> = xs.iter().map(|&x| f64::from(x).ln()).collect();
        assert_close(&r, &want, 1e-5);

        let r = run_f32(FeatureSet::empty(), &[0.0, -1.0, 1.0, 4.0], |c, x| c.log_safe(x).unwrap());
        assert_eq!(r[0], f32::NEG_INFINITY);
        assert!(r[1].is_nan());
        assert_eq!(r[2], 0.0);
    }

    #[test]
    fn test_pow() {
        let ty = VectorType::VEC4F32;
        let mut interp = Interpreter::new();
        let x = interp.input_f32(ty, &[0.0, 0.0, 2.0, 9.0]);
        let y = interp.input_f32(ty, &[0.0, 3.0, 10.0, 0.5]);
        let caps = FeatureSet::empty();
        let mut ctx = LoweringContext::new(&mut interp, &caps, ty).unwrap();
        let r = ctx.pow(x, y).unwrap();
        drop(ctx);
        let lanes = interp.lanes_f32(r);
        assert_eq!(&lanes[..2], &[0.0, 0.0]);
        assert_close(&lanes[2..], &[1024.0, 3.0], 1e-5);
    }

    #[test]
    fn test_half_native_exp2() {
        let ty = VectorType::float(16, 8);
        let mut interp = Interpreter::new();
        let a = interp.input_f64(ty, &[0.0, 1.0, 2.0, 3.0, -1.0, 0.5, 4.0, 5.0]);
        let caps = FeatureSet::empty().with(Feature::NeonFp16);
        let mut ctx = LoweringContext::new(&mut interp, &caps, ty).unwrap();
        let r = ctx.exp2(a).unwrap();
        drop(ctx);
        assert!(interp.any_op(|op| matches!(op, Op::Native(n) if n.name == "llvm.exp2.v8f16")));
        let lanes = interp.lanes_f64(r);
        assert_eq!(&lanes[..5], &[1.0, 2.0, 4.0, 8.0, 0.5]);
    }

    #[test]
    fn test_half_without_native_is_unsupported() {
        let ty = VectorType::float(16, 8);
        let mut interp = Interpreter::new();
        let a = interp.input_f64(ty, &[0.0, 1.0, -2.0, 3.0, 0.5, 2.0, 4.0, 8.0]);
        let caps = FeatureSet::empty();
        let mut ctx = LoweringContext::new(&mut interp, &caps, ty).unwrap();
        let unsupported =
            |r: LowerResult<ValueId>| matches!(r, Err(LowerError::UnsupportedConfiguration(_)));
        assert!(unsupported(ctx.exp2(a)));
        assert!(unsupported(ctx.log2(a)));
        assert!(unsupported(ctx.log2_safe(a)));
        assert!(unsupported(ctx.exp(a)));
        assert!(unsupported(ctx.log(a)));
        assert!(unsupported(ctx.pow(a, a)));
    }

    #[test]
    fn test_half_native_log2() {
        let ty = VectorType::float(16, 8);
        let mut interp = Interpreter::new();
        let a = interp.input_f64(ty, &[1.0, 2.0, 4.0, 8.0, 0.5, 0.25, 16.0, 32.0]);
        let caps = FeatureSet::empty().with(Feature::NeonFp16);
        let mut ctx = LoweringContext::new(&mut interp, &caps, ty).unwrap();
        let r = ctx.log2(a).unwrap();
        drop(ctx);
        assert_eq!(interp.lanes_f64(r), vec![0.0, 1.0, 2.0, 3.0, -1.0, -2.0, 4.0, 5.0]);
    }
}
