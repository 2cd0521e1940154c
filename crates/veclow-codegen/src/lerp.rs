//! Linear, bilinear and trilinear interpolation.
//!
//! Normalized integers interpolate in double-width lanes: the weight and
//! both endpoints are unpacked, `x * (v1 - v0)` is scaled back to the
//! narrow range and the sum is repacked. Unsigned weights in `[0, 2^n - 1]`
//! are first rescaled to `[0, 2^n]` so the scale-back is a plain shift.

use crate::context::LoweringContext;
use crate::dispatch::{self, NativeOperation};
use crate::pack::wide_int;
use crate::{LowerError, LowerResult};
use serde::{Deserialize, Serialize};
use veclow_ir::{SignKind, ValueId, VectorType};

/// Options for [`LoweringContext::lerp`].
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct LerpFlags {
    /// Operands are narrow normalized values held in double-width lanes.
    ///
    /// Set internally by `lerp` for normalized types; callers of
    /// [`lerp_simple`](LoweringContext::lerp_simple) may set it directly.
    pub wide_normalized: bool,
    /// Weights are already scaled to `[0, 2^n]`. Only valid for unsigned
    /// normalized interpolation.
    pub prescaled_weights: bool,
}

impl LerpFlags {
    /// Flags for weights already scaled to `[0, 2^n]`.
    #[must_use]
    pub const fn prescaled() -> Self {
        Self {
            wide_normalized: false,
            prescaled_weights: true,
        }
    }

    fn validate(self, ty: VectorType) -> LowerResult<()> {
        if self.wide_normalized && ty.floating {
            return Err(LowerError::unsupported(format!("wide normalized lerp on {ty}")));
        }
        if self.prescaled_weights && (ty.floating || ty.sign) {
            return Err(LowerError::unsupported(format!("prescaled lerp weights on {ty}")));
        }
        Ok(())
    }
}

impl LoweringContext<'_> {
    /// `v0 + x * (v1 - v0)`.
    pub fn lerp(&mut self, x: ValueId, v0: ValueId, v1: ValueId, flags: LerpFlags) -> LowerResult<ValueId> {
        self.check(&[x, v0, v1])?;
        let ty = self.ty();
        if flags.wide_normalized {
            return Err(LowerError::unsupported("lerp sets the wide normalized flag itself"));
        }
        flags.validate(ty)?;
        if flags.prescaled_weights && !ty.norm {
            return Err(LowerError::unsupported(format!("prescaled lerp weights on {ty}")));
        }

        if !ty.is_norm_int() {
            return self.lerp_simple(x, v0, v1, flags);
        }
        if ty.length == 1 {
            return self.on_two_lanes(&[x, v0, v1], |c, v| c.lerp(v[0], v[1], v[2], flags));
        }

        let wide = wide_int(ty)
            .ok_or_else(|| LowerError::unsupported(format!("normalized lerp on {ty}")))?;
        let (xl, xh) = self.unpack2_native(ty, wide, x)?;
        let (v0l, v0h) = self.unpack2_native(ty, wide, v0)?;
        let (v1l, v1h) = self.unpack2_native(ty, wide, v1)?;
        let flags = LerpFlags {
            wide_normalized: true,
            ..flags
        };
        let (lo, hi) = self.scoped(wide, |c| {
            Ok((
                c.lerp_simple(xl, v0l, v1l, flags)?,
                c.lerp_simple(xh, v0h, v1h, flags)?,
            ))
        })?;
        tracing::trace!(%ty, %wide, "lerp in wide lanes");
        self.pack2_native(wide, ty, lo, hi)
    }

    /// Interpolate in the current type without widening.
    pub fn lerp_simple(
        &mut self,
        x: ValueId,
        v0: ValueId,
        v1: ValueId,
        flags: LerpFlags,
    ) -> LowerResult<ValueId> {
        self.check(&[x, v0, v1])?;
        let ty = self.ty();
        flags.validate(ty)?;
        if flags.prescaled_weights && !flags.wide_normalized {
            return Err(LowerError::unsupported("prescaled lerp weights need wide lanes"));
        }
        let half_width = ty.width / 2;
        let delta = self.sub(v1, v0)?;

        if ty.floating {
            return self.mad(x, delta, v0);
        }

        let res = if flags.wide_normalized && !ty.sign {
            let x = if flags.prescaled_weights {
                x
            } else {
                // [0, 2^n - 1] -> [0, 2^n]
                let msb = self.shr_imm(x, half_width - 1)?;
                self.add(x, msb)?
            };
            // (x * delta) >> n, with the rounding high multiply when there
            // is one for these exact lanes.
            match dispatch::lookup_exact(self.caps(), NativeOperation::MulHiRound, ty, SignKind::Signed) {
                Some(row) => {
                    let scaled = self.shl_imm(delta, 7)?;
                    let r = self.native(row.native(), ty, &[x, scaled]);
                    let low = self.const_int(ty, (1i64 << half_width) - 1);
                    self.and(r, low)?
                }
                None => {
                    let r = self.mul(x, delta)?;
                    self.shr_imm(r, half_width)?
                }
            }
        } else if flags.wide_normalized {
            self.mul_norm(x, delta)?
        } else {
            self.mul(x, delta)?
        };

        if flags.wide_normalized && !ty.sign {
            // Both halves only use the low bits, so add at half width and
            // let the carry fall off.
            let narrow = VectorType::uint(half_width, ty.length * 2);
            let res = self.bitcast(res, narrow);
            let v0 = self.bitcast(v0, narrow);
            let sum = self.scoped(narrow, |c| c.add(v0, res))?;
            return Ok(self.bitcast(sum, ty));
        }

        let sum = self.add(v0, res)?;
        if ty.fixed {
            // Keep 8-bit values stored in 16-bit lanes in range.
            let low = self.const_int(ty, (1i64 << half_width) - 1);
            return self.and(sum, low);
        }
        Ok(sum)
    }

    /// Bilinear interpolation of `v_yx`.
    #[allow(clippy::too_many_arguments)]
    pub fn lerp_2d(
        &mut self,
        x: ValueId,
        y: ValueId,
        v00: ValueId,
        v01: ValueId,
        v10: ValueId,
        v11: ValueId,
        flags: LerpFlags,
    ) -> LowerResult<ValueId> {
        let v0 = self.lerp(x, v00, v01, flags)?;
        let v1 = self.lerp(x, v10, v11, flags)?;
        self.lerp(y, v0, v1, flags)
    }

    /// Trilinear interpolation of `v_zyx`.
    pub fn lerp_3d(
        &mut self,
        x: ValueId,
        y: ValueId,
        z: ValueId,
        v: [ValueId; 8],
        flags: LerpFlags,
    ) -> LowerResult<ValueId> {
        let [v000, v001, v010, v011, v100, v101, v110, v111] = v;
        let v0 = self.lerp_2d(x, y, v000, v001, v010, v011, flags)?;
        let v1 = self.lerp_2d(x, y, v100, v101, v110, v111, flags)?;
        self.lerp(z, v0, v1, flags)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use veclow_interp::Interpreter;
    use veclow_ir::Op;
    use veclow_target::FeatureSet;

    fn lerp_unorm8(caps: FeatureSet, x: &[u64], v0: &[u64], v1: &[u64], flags: LerpFlags) -> Vec<u64> {
        let ty = VectorType::unorm(8, x.len() as u32);
        let mut interp = Interpreter::new();
        let x = interp.input_u64(ty, x);
        let v0 = interp.input_u64(ty, v0);
        let v1 = interp.input_u64(ty, v1);
        let mut ctx = LoweringContext::new(&mut interp, &caps, ty).unwrap();
        let r = ctx.lerp(x, v0, v1, flags).unwrap();
        drop(ctx);
        interp.lanes_u64(r)
    }

    #[test]
    fn test_unorm8_midpoint() {
        for caps in [FeatureSet::empty(), FeatureSet::X86_64_V2, FeatureSet::X86_64_V3] {
            let r = lerp_unorm8(caps, &[128; 16], &[0; 16], &[255; 16], LerpFlags::default());
            assert!(r.iter().all(|&v| v.abs_diff(128) <= 1), "{caps}: {r:?}");
        }
    }

    #[test]
    fn test_unorm8_endpoints() {
        let v0: Vec<u64> = (0..16).map(|i| i * 17).collect();
        let v1: Vec<u64> = (0..16).map(|i| 255 - i * 13).collect();
        for caps in [FeatureSet::empty(), FeatureSet::X86_64_V2] {
            assert_eq!(lerp_unorm8(caps, &[0; 16], &v0, &v1, LerpFlags::default()), v0, "{caps}");
            assert_eq!(lerp_unorm8(caps, &[255; 16], &v0, &v1, LerpFlags::default()), v1, "{caps}");
        }
    }

    #[test]
    fn test_unorm8_uses_mul_hi_round() {
        let ty = VectorType::VEC16UNORM8;
        let mut interp = Interpreter::new();
        let x = interp.input_u64(ty, &[64; 16]);
        let v0 = interp.input_u64(ty, &[200; 16]);
        let v1 = interp.input_u64(ty, &[100; 16]);
        let caps = FeatureSet::X86_64_V2;
        let mut ctx = LoweringContext::new(&mut interp, &caps, ty).unwrap();
        let r = ctx.lerp(x, v0, v1, LerpFlags::default()).unwrap();
        drop(ctx);
        assert!(interp.any_op(|op| matches!(op, Op::Native(n) if n.name == "llvm.x86.ssse3.pmul.hr.sw.128")));
        // 200 - 100 * 64 / 256
        assert!(interp.lanes_u64(r).iter().all(|&v| v.abs_diff(175) <= 1));
    }

    #[test]
    fn test_prescaled_weights() {
        // x = 128 already means one half.
        let r = lerp_unorm8(FeatureSet::empty(), &[128; 8], &[0; 8], &[200; 8], LerpFlags::prescaled());
        assert_eq!(r, vec![100; 8]);
    }

    #[test]
    fn test_snorm8() {
        let ty = VectorType::snorm(8, 8);
        let mut interp = Interpreter::new();
        let x = interp.input_i64(ty, &[0, 127, 64, 0, 127, 64, 0, 127]);
        let v0 = interp.input_i64(ty, &[-100, -100, 0, 50, 50, 100, 0, 0]);
        let v1 = interp.input_i64(ty, &[100, 100, 100, -50, -50, 0, 0, 0]);
        let caps = FeatureSet::empty();
        let mut ctx = LoweringContext::new(&mut interp, &caps, ty).unwrap();
        let r = ctx.lerp(x, v0, v1, LerpFlags::default()).unwrap();
        drop(ctx);
        let got = interp.lanes_i64(r);
        let want = [-100i64, 100, 50, 50, -50, 50, 0, 0];
        for (g, w) in got.iter().zip(want) {
            assert!((g - w).abs() <= 1, "{got:?}");
        }
    }

    #[test]
    fn test_float_lerp() {
        let ty = VectorType::VEC4F32;
        let mut interp = Interpreter::new();
        let x = interp.input_f32(ty, &[0.0, 1.0, 0.25, 0.5]);
        let v0 = interp.input_f32(ty, &[2.0, 2.0, 0.0, -4.0]);
        let v1 = interp.input_f32(ty, &[6.0, 6.0, 8.0, 4.0]);
        let caps = FeatureSet::empty();
        let mut ctx = LoweringContext::new(&mut interp, &caps, ty).unwrap();
        let r = ctx.lerp(x, v0, v1, LerpFlags::default()).unwrap();
        assert!(ctx.lerp(x, v0, v1, LerpFlags::prescaled()).is_err());
        drop(ctx);
        assert_eq!(interp.lanes_f32(r), vec![2.0, 6.0, 2.0, 0.0]);
    }

    #[test]
    fn test_lerp_2d_and_3d() {
        let ty = VectorType::VEC4F32;
        let mut interp = Interpreter::new();
        let x = interp.input_f32(ty, &[0.5; 4]);
        let y = interp.input_f32(ty, &[0.25; 4]);
        let z = interp.input_f32(ty, &[1.0; 4]);
        let corners: Vec<ValueId> = (0..8).map(|i| interp.input_f32(ty, &[i as f32; 4])).collect();
        let caps = FeatureSet::empty();
        let mut ctx = LoweringContext::new(&mut interp, &caps, ty).unwrap();
        let flags = LerpFlags::default();
        let r2 = ctx.lerp_2d(x, y, corners[0], corners[1], corners[2], corners[3], flags).unwrap();
        let v: [ValueId; 8] = corners.clone().try_into().unwrap();
        let r3 = ctx.lerp_3d(x, y, z, v, flags).unwrap();
        drop(ctx);
        // v00 + 0.5 * (v01 - v00) + 0.25 * (v10 - v00) = 0.5 + 0.5
        assert_eq!(interp.lanes_f32(r2), vec![1.0; 4]);
        assert_eq!(interp.lanes_f32(r3), vec![5.0; 4]);
    }

    #[test]
    fn test_scalar_unorm() {
        let r = lerp_unorm8(FeatureSet::empty(), &[255], &[10], &[20], LerpFlags::default());
        assert_eq!(r, vec![20]);
    }
}
