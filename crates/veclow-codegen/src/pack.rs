//! Widening and narrowing between lane widths.
//!
//! `unpack2` splits one vector into two with double-width lanes, sign- or
//! zero-extending per the source type; `pack2` is its inverse. The plain
//! variants keep lanes in sequential order. The `_native` variants use the
//! lane order of the target's 256-bit integer instructions, which work per
//! 128-bit half:
//!
//! ```text
//! src            [a0 a1 a2 a3 | a4 a5 a6 a7]
//! unpack2        lo = [a0 a1 a2 a3]  hi = [a4 a5 a6 a7]
//! unpack2_native lo = [a0 a1 a4 a5]  hi = [a2 a3 a6 a7]
//! ```
//!
//! A native unpack must be undone by a native pack; mixing the two orders
//! permutes lanes.

use crate::context::LoweringContext;
use crate::dispatch::{self, NativeOperation};
use crate::minmax::NanBehavior;
use crate::{LowerError, LowerResult};
use smallvec::{smallvec, SmallVec};
use veclow_ir::{BinOp, CmpOp, ValueId, VectorType, UNDEF_LANE};
use veclow_target::Feature;

type Indices = SmallVec<[u32; 64]>;

/// Plain integer type with double-width lanes and half the lanes.
pub(crate) fn wide_int(ty: VectorType) -> Option<VectorType> {
    if ty.floating {
        return None;
    }
    let wide = ty.wider()?;
    Some(if ty.sign {
        VectorType::int(wide.width, wide.length)
    } else {
        VectorType::uint(wide.width, wide.length)
    })
}

fn check_widening(narrow: VectorType, wide: VectorType) -> LowerResult<()> {
    if narrow.floating
        || wide.floating
        || wide.width != narrow.width * 2
        || wide.length * 2 != narrow.length
    {
        return Err(LowerError::unsupported(format!(
            "cannot convert between {narrow} and {wide} by halving"
        )));
    }
    Ok(())
}

/// Interleave indices taking one half of every block of `a` with `ext`.
fn unpack_indices(n: u32, blocks: u32, high: bool) -> Indices {
    let per_block = n / blocks;
    let half = per_block / 2;
    let mut out = Indices::new();
    for b in 0..blocks {
        let base = b * per_block + if high { half } else { 0 };
        for i in base..base + half {
            out.push(i);
            out.push(n + i);
        }
    }
    out
}

/// Even-lane indices collecting each block of `lo` then the same block of `hi`.
fn pack_indices(n_wide: u32, blocks: u32) -> Indices {
    let per_block = n_wide / blocks;
    let mut out = Indices::new();
    for b in 0..blocks {
        let lanes = b * per_block..(b + 1) * per_block;
        out.extend(lanes.clone().map(|j| 2 * j));
        out.extend(lanes.map(|j| 2 * n_wide + 2 * j));
    }
    out
}

impl LoweringContext<'_> {
    fn native_blocks(&self, ty: VectorType) -> u32 {
        if ty.total_bits() == 256 && self.has(Feature::Avx2) {
            2
        } else {
            1
        }
    }

    /// Split `a` into two vectors of type `dst`, low lanes first.
    pub fn unpack2(
        &mut self,
        src: VectorType,
        dst: VectorType,
        a: ValueId,
    ) -> LowerResult<(ValueId, ValueId)> {
        self.unpack2_blocks(src, dst, a, 1)
    }

    /// [`unpack2`](Self::unpack2) in the target's native lane order.
    pub fn unpack2_native(
        &mut self,
        src: VectorType,
        dst: VectorType,
        a: ValueId,
    ) -> LowerResult<(ValueId, ValueId)> {
        let blocks = self.native_blocks(src);
        self.unpack2_blocks(src, dst, a, blocks)
    }

    fn unpack2_blocks(
        &mut self,
        src: VectorType,
        dst: VectorType,
        a: ValueId,
        blocks: u32,
    ) -> LowerResult<(ValueId, ValueId)> {
        check_widening(src, dst)?;
        self.check_ty(src, &[a])?;
        let zero = self.const_int(src, 0);
        let ext = if src.sign {
            let negative = self.compare(CmpOp::Lt, false, a, zero);
            self.bitcast(negative, src)
        } else {
            zero
        };
        let n = src.length;
        let lo = self
            .emitter()
            .shuffle(a, ext, &unpack_indices(n, blocks, false));
        let hi = self
            .emitter()
            .shuffle(a, ext, &unpack_indices(n, blocks, true));
        Ok((self.bitcast(lo, dst), self.bitcast(hi, dst)))
    }

    /// Narrow `lo` and `hi` into one vector of type `dst`.
    ///
    /// Lanes out of `dst`'s range produce unspecified values.
    pub fn pack2(
        &mut self,
        src: VectorType,
        dst: VectorType,
        lo: ValueId,
        hi: ValueId,
    ) -> LowerResult<ValueId> {
        self.pack2_blocks(src, dst, lo, hi, 1)
    }

    /// Inverse of [`unpack2_native`](Self::unpack2_native).
    pub fn pack2_native(
        &mut self,
        src: VectorType,
        dst: VectorType,
        lo: ValueId,
        hi: ValueId,
    ) -> LowerResult<ValueId> {
        let blocks = self.native_blocks(src);
        self.pack2_blocks(src, dst, lo, hi, blocks)
    }

    /// Narrow `lo` and `hi`, saturating out-of-range lanes to `dst`.
    pub fn pack2_saturate(
        &mut self,
        src: VectorType,
        dst: VectorType,
        lo: ValueId,
        hi: ValueId,
    ) -> LowerResult<ValueId> {
        check_widening(dst, src)?;
        self.check_ty(src, &[lo, hi])?;
        let (lo, hi) = self.scoped(src, |c| {
            let upper = c.const_int(src, dst.int_max());
            let mut lo = c.min_simple(lo, upper, NanBehavior::Undefined)?;
            let mut hi = c.min_simple(hi, upper, NanBehavior::Undefined)?;
            if src.sign {
                let lower = c.const_int(src, dst.int_min());
                lo = c.max_simple(lo, lower, NanBehavior::Undefined)?;
                hi = c.max_simple(hi, lower, NanBehavior::Undefined)?;
            }
            Ok((lo, hi))
        })?;
        self.pack2(src, dst, lo, hi)
    }

    fn pack2_blocks(
        &mut self,
        src: VectorType,
        dst: VectorType,
        lo: ValueId,
        hi: ValueId,
        blocks: u32,
    ) -> LowerResult<ValueId> {
        check_widening(dst, src)?;
        self.check_ty(src, &[lo, hi])?;

        if src.total_bits() == 128 * blocks {
            let row = dispatch::lookup_exact(
                self.caps(),
                NativeOperation::PackSaturate,
                src,
                dst.sign_kind(),
            );
            if let Some(row) = row {
                return Ok(self.native(row.native(), dst, &[lo, hi]));
            }
        }

        let lo = self.bitcast(lo, dst);
        let hi = self.bitcast(hi, dst);
        Ok(self
            .emitter()
            .shuffle(lo, hi, &pack_indices(src.length, blocks)))
    }

    /// Widen `a` from `src` to `dst` lanes in as many steps as needed.
    ///
    /// Returns `dst.width / src.width` vectors in lane order.
    pub fn unpack(
        &mut self,
        src: VectorType,
        dst: VectorType,
        a: ValueId,
    ) -> LowerResult<SmallVec<[ValueId; 8]>> {
        if dst.width <= src.width || dst.length * (dst.width / src.width) != src.length {
            return Err(LowerError::unsupported(format!("cannot unpack {src} into {dst}")));
        }
        let mut ty = src;
        let mut values: SmallVec<[ValueId; 8]> = smallvec![a];
        while ty.width < dst.width {
            let next = if ty.width * 2 == dst.width {
                dst
            } else {
                ty.wider()
                    .ok_or_else(|| LowerError::unsupported(format!("cannot widen {ty}")))?
            };
            let mut out = SmallVec::new();
            for v in values {
                let (lo, hi) = self.unpack2(ty, next, v)?;
                out.push(lo);
                out.push(hi);
            }
            values = out;
            ty = next;
        }
        Ok(values)
    }

    /// Narrow `values` from `src` to `dst` lanes in as many steps as needed.
    pub fn pack(
        &mut self,
        src: VectorType,
        dst: VectorType,
        values: &[ValueId],
        saturate: bool,
    ) -> LowerResult<ValueId> {
        let ratio = src.width.checked_div(dst.width).unwrap_or(0);
        if ratio < 2 || values.len() != ratio as usize || dst.length != src.length * ratio {
            return Err(LowerError::unsupported(format!(
                "cannot pack {} x {src} into {dst}",
                values.len()
            )));
        }
        let mut ty = src;
        let mut current: SmallVec<[ValueId; 8]> = values.iter().copied().collect();
        while ty.width > dst.width {
            let next = if ty.width == dst.width * 2 {
                dst
            } else {
                ty.narrower()
                    .ok_or_else(|| LowerError::unsupported(format!("cannot narrow {ty}")))?
            };
            let mut out = SmallVec::new();
            for pair in current.chunks(2) {
                let packed = if saturate {
                    self.pack2_saturate(ty, next, pair[0], pair[1])?
                } else {
                    self.pack2(ty, next, pair[0], pair[1])?
                };
                out.push(packed);
            }
            current = out;
            ty = next;
        }
        Ok(current[0])
    }

    /// Normalized multiply of two wide lanes holding narrow normalized values.
    ///
    /// The current type is the wide type; the narrow values use half its
    /// width. Computes `a * b / one` rounded to nearest.
    pub fn mul_norm(&mut self, a: ValueId, b: ValueId) -> LowerResult<ValueId> {
        self.check(&[a, b])?;
        let wide = self.ty();
        let n = wide.width / 2 - u32::from(wide.sign);
        let shift = self.const_int(wide, i64::from(n));

        // ab / (2^n - 1) ~= (ab + (ab >> n) + half) >> n
        let mut ab = self.bin(BinOp::Mul, a, b);
        let t = self.bin(BinOp::Shr, ab, shift);
        ab = self.bin(BinOp::Add, ab, t);

        let mut half = self.const_int(wide, 1i64 << (n - 1));
        if wide.sign {
            let minus_half = self.const_int(wide, -(1i64 << (n - 1)));
            let sign_shift = self.const_int(wide, i64::from(wide.width - 1));
            let sign = self.bin(BinOp::Shr, ab, sign_shift);
            let sign = self.bitcast(sign, wide.int_type());
            half = self.pick(sign, minus_half, half);
        }
        ab = self.bin(BinOp::Add, ab, half);
        Ok(self.bin(BinOp::Shr, ab, shift))
    }

    /// Run `f` on two-lane copies of single-lane operands.
    ///
    /// Operations that widen lanes need at least two of them.
    pub(crate) fn on_two_lanes(
        &mut self,
        args: &[ValueId],
        f: impl FnOnce(&mut Self, &[ValueId]) -> LowerResult<ValueId>,
    ) -> LowerResult<ValueId> {
        let ty = self.ty();
        let padded: SmallVec<[ValueId; 4]> = args
            .iter()
            .map(|&v| self.emitter().shuffle(v, v, &[0, UNDEF_LANE]))
            .collect();
        let r = self.scoped(ty.with_length(2), |c| f(c, &padded))?;
        Ok(self.emitter().extract(r, 0..1))
    }
}
