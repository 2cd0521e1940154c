//! Horizontal (cross-lane) sums.

use crate::context::LoweringContext;
use crate::dispatch::{self, NativeOperation};
use crate::{LowerError, LowerResult};
use smallvec::SmallVec;
use veclow_ir::{BinOp, ValueId};

impl LoweringContext<'_> {
    /// Sum every lane of `a` into a single-lane value.
    ///
    /// Halves the vector with shuffles until two lanes remain, then adds
    /// those two. A single-lane input is returned unchanged.
    pub fn horizontal_add(&mut self, a: ValueId) -> LowerResult<ValueId> {
        self.check(&[a])?;
        let ty = self.ty();
        if ty.norm {
            return Err(LowerError::unsupported(format!("horizontal_add on {ty}")));
        }
        if ty.length == 1 {
            return Ok(a);
        }

        let mut acc = a;
        let mut half = ty.length / 2;
        while half > 1 {
            let lo: SmallVec<[u32; 32]> = (0..half).collect();
            let hi: SmallVec<[u32; 32]> = (half..2 * half).collect();
            let v1 = self.emitter().shuffle(acc, acc, &lo);
            let v2 = self.emitter().shuffle(acc, acc, &hi);
            acc = self.bin(BinOp::Add, v1, v2);
            half /= 2;
        }

        let e0 = self.emitter().extract(acc, 0..1);
        let e1 = self.emitter().extract(acc, 1..2);
        Ok(self.bin(BinOp::Add, e0, e1))
    }

    /// Sum each of four 4-lane float vectors, giving
    /// `[sum(v[0]), sum(v[1]), sum(v[2]), sum(v[3])]`.
    pub fn horizontal_add4x4f(&mut self, v: &[ValueId; 4]) -> LowerResult<ValueId> {
        let ty = self.ty();
        if !ty.floating || ty.length != 4 {
            return Err(LowerError::unsupported(format!("horizontal_add4x4f on {ty}")));
        }
        self.check(v)?;
        Ok(self.add4x4(v))
    }

    fn add4x4(&mut self, v: &[ValueId; 4]) -> ValueId {
        let e = self.emitter();
        let lo0 = e.shuffle(v[0], v[1], &[0, 1, 4, 5]);
        let lo1 = e.shuffle(v[2], v[3], &[0, 1, 4, 5]);
        let hi0 = e.shuffle(v[0], v[1], &[2, 3, 6, 7]);
        let hi1 = e.shuffle(v[2], v[3], &[2, 3, 6, 7]);
        let s0 = self.bin(BinOp::Add, lo0, hi0);
        let s1 = self.bin(BinOp::Add, lo1, hi1);

        let e = self.emitter();
        let even = e.shuffle(s0, s1, &[0, 2, 4, 6]);
        let odd = e.shuffle(s0, s1, &[1, 3, 5, 7]);
        self.bin(BinOp::Add, even, odd)
    }

    /// Sum each group of four adjacent lanes across 2 to 4 float vectors.
    ///
    /// For every 4-lane block `j` the result holds the block sums of each
    /// input in order, so three 8-lane inputs `x, y, z` give
    /// `[Σx0..3, Σy0..3, Σz0..3, _, Σx4..7, Σy4..7, Σz4..7, _]`. Lanes past
    /// the number of inputs are unspecified.
    pub fn hadd_partial4(&mut self, vectors: &[ValueId]) -> LowerResult<ValueId> {
        let ty = self.ty();
        if !(2..=4).contains(&vectors.len()) {
            return Err(LowerError::InvalidConfig(format!(
                "hadd_partial4 takes 2 to 4 vectors, got {}",
                vectors.len()
            )));
        }
        if !ty.floating || ty.length % 4 != 0 {
            return Err(LowerError::unsupported(format!("hadd_partial4 on {ty}")));
        }
        self.check(vectors)?;

        let tmp = [
            vectors[0],
            vectors[1],
            vectors.get(2).copied().unwrap_or(vectors[0]),
            vectors.get(3).copied().unwrap_or(vectors[0]),
        ];

        if let Some(row) =
            dispatch::lookup_exact(self.caps(), NativeOperation::HorizontalAdd, ty, ty.sign_kind())
        {
            let op = row.native();
            let first = self.native(op, ty, &[tmp[0], tmp[1]]);
            let second = if vectors.len() > 2 {
                self.native(op, ty, &[tmp[2], tmp[3]])
            } else {
                first
            };
            return Ok(self.native(op, ty, &[first, second]));
        }

        if ty.length == 4 {
            return Ok(self.add4x4(&tmp));
        }

        let mut parts: SmallVec<[ValueId; 4]> = SmallVec::new();
        for j in 0..ty.length / 4 {
            let lanes = j * 4..j * 4 + 4;
            let block = tmp.map(|v| self.emitter().extract(v, lanes.clone()));
            parts.push(self.add4x4(&block));
        }
        Ok(self.concat(&parts))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use veclow_interp::Interpreter;
    use veclow_ir::{Op, VectorType};
    use veclow_target::FeatureSet;

    #[test]
    fn test_horizontal_add_float() {
        let ty = VectorType::VEC4F32;
        let mut interp = Interpreter::new();
        let a = interp.input_f32(ty, &[1.0, 2.0, 3.0, 4.0]);
        let caps = FeatureSet::empty();
        let mut ctx = LoweringContext::new(&mut interp, &caps, ty).unwrap();
        let r = ctx.horizontal_add(a).unwrap();
        drop(ctx);
        assert_eq!(interp.lanes_f32(r), vec![10.0]);
        assert_eq!(interp.inst(r).ty, ty.with_length(1));
    }

    #[test]
    fn test_horizontal_add_int_wraps() {
        let ty = VectorType::uint(8, 16);
        let mut interp = Interpreter::new();
        let a = interp.input_u64(ty, &[20; 16]);
        let caps = FeatureSet::empty();
        let mut ctx = LoweringContext::new(&mut interp, &caps, ty).unwrap();
        let r = ctx.horizontal_add(a).unwrap();
        drop(ctx);
        assert_eq!(interp.lanes_u64(r), vec![320 % 256]);
    }

    #[test]
    fn test_horizontal_add_scalar_identity() {
        let ty = VectorType::float(32, 1);
        let mut interp = Interpreter::new();
        let a = interp.input_f32(ty, &[5.0]);
        let caps = FeatureSet::empty();
        let mut ctx = LoweringContext::new(&mut interp, &caps, ty).unwrap();
        assert_eq!(ctx.horizontal_add(a).unwrap(), a);
    }

    #[test]
    fn test_horizontal_add_rejects_norm() {
        let ty = VectorType::VEC16UNORM8;
        let mut interp = Interpreter::new();
        let a = interp.input_u64(ty, &[1; 16]);
        let caps = FeatureSet::empty();
        let mut ctx = LoweringContext::new(&mut interp, &caps, ty).unwrap();
        assert!(ctx.horizontal_add(a).is_err());
    }

    #[test]
    fn test_add4x4() {
        let ty = VectorType::VEC4F32;
        let mut interp = Interpreter::new();
        let v = [
            interp.input_f32(ty, &[1.0, 2.0, 3.0, 4.0]),
            interp.input_f32(ty, &[10.0, 20.0, 30.0, 40.0]),
            interp.input_f32(ty, &[0.5, 0.5, 0.5, 0.5]),
            interp.input_f32(ty, &[-1.0, 1.0, -2.0, 2.0]),
        ];
        let caps = FeatureSet::empty();
        let mut ctx = LoweringContext::new(&mut interp, &caps, ty).unwrap();
        let r = ctx.horizontal_add4x4f(&v).unwrap();
        drop(ctx);
        assert_eq!(interp.lanes_f32(r), vec![10.0, 100.0, 2.0, 0.0]);
    }

    #[test]
    fn test_partial4_native_and_generic_agree() {
        let ty = VectorType::VEC4F32;
        for caps in [FeatureSet::empty(), FeatureSet::X86_64_V2] {
            let mut interp = Interpreter::new();
            let v = [
                interp.input_f32(ty, &[1.0, 2.0, 3.0, 4.0]),
                interp.input_f32(ty, &[5.0, 6.0, 7.0, 8.0]),
                interp.input_f32(ty, &[0.0, 0.0, 1.0, 1.0]),
            ];
            let mut ctx = LoweringContext::new(&mut interp, &caps, ty).unwrap();
            let r = ctx.hadd_partial4(&v).unwrap();
            drop(ctx);
            let lanes = interp.lanes_f32(r);
            assert_eq!(&lanes[..3], &[10.0, 26.0, 2.0], "{caps}");
            let native = interp.any_op(|op| matches!(op, Op::Native(_)));
            assert_eq!(native, caps.contains(FeatureSet::X86_64_V2));
        }
    }

    #[test]
    fn test_partial4_eight_lanes() {
        let ty = VectorType::VEC8F32;
        for caps in [FeatureSet::empty(), FeatureSet::X86_64_V3] {
            let mut interp = Interpreter::new();
            let x: Vec<f32> = (1..=8).map(|i| i as f32).collect();
            let y: Vec<f32> = (1..=8).map(|i| (i * 10) as f32).collect();
            let v = [interp.input_f32(ty, &x), interp.input_f32(ty, &y)];
            let mut ctx = LoweringContext::new(&mut interp, &caps, ty).unwrap();
            let r = ctx.hadd_partial4(&v).unwrap();
            drop(ctx);
            let lanes = interp.lanes_f32(r);
            assert_eq!(lanes.len(), 8);
            assert_eq!([lanes[0], lanes[1]], [10.0, 100.0], "{caps}");
            assert_eq!([lanes[4], lanes[5]], [26.0, 260.0], "{caps}");
        }
    }

    #[test]
    fn test_partial4_vector_count() {
        let ty = VectorType::VEC4F32;
        let mut interp = Interpreter::new();
        let a = interp.input_f32(ty, &[1.0; 4]);
        let caps = FeatureSet::empty();
        let mut ctx = LoweringContext::new(&mut interp, &caps, ty).unwrap();
        assert!(matches!(ctx.hadd_partial4(&[a]), Err(LowerError::InvalidConfig(_))));
        assert!(ctx.hadd_partial4(&[a; 5]).is_err());
    }
}
