//! Width adaptation for native instructions.
//!
//! A native row works on a fixed register width. When the logical vector is
//! narrower, operands are padded with don't-care lanes and the result is
//! truncated. When it is wider by an exact multiple, operands are split into
//! native-width pieces and the per-piece results are concatenated in order.
//!
//! ```text
//! logical 256, native 128:  [a0 a1] -> op(a0), op(a1) -> concat
//! logical  64, native 128:  [a ?]   -> op -> extract low half
//! ```

use crate::context::LoweringContext;
use crate::{LowerError, LowerResult};
use smallvec::SmallVec;
use veclow_ir::{NativeOp, ValueId, VectorType, UNDEF_LANE};

type Parts = SmallVec<[ValueId; 4]>;

impl LoweringContext<'_> {
    /// Emit `op` over `args` at the native register width `native_bits`.
    ///
    /// All arguments share one type. `result` is the logical result type;
    /// its lanes must correspond one to one with the argument lanes.
    ///
    /// # Errors
    ///
    /// Returns [`LowerError::UnsupportedWidthRatio`] when neither width is
    /// a multiple of the other.
    pub fn apply_native(
        &mut self,
        op: NativeOp,
        native_bits: u32,
        result: VectorType,
        args: &[ValueId],
    ) -> LowerResult<ValueId> {
        let Some(&first) = args.first() else {
            return Err(LowerError::unsupported(format!("{} called without operands", op.name)));
        };
        let arg_ty = self.type_of(first);
        self.check_ty(arg_ty, args)?;
        let logical = arg_ty.total_bits();

        if logical == native_bits {
            return Ok(self.native(op, result, args));
        }

        let ratio_error = LowerError::UnsupportedWidthRatio {
            logical,
            native: native_bits,
        };

        if logical < native_bits {
            if native_bits % logical != 0 {
                return Err(ratio_error);
            }
            let len = arg_ty.length;
            let native_len = native_bits / arg_ty.width;
            let pad: SmallVec<[u32; 32]> = (0..native_len)
                .map(|i| if i < len { i } else { UNDEF_LANE })
                .collect();
            let padded: Parts = args
                .iter()
                .map(|&a| self.emitter().shuffle(a, a, &pad))
                .collect();
            let wide = self.native(op, result.with_length(native_len), &padded);
            return Ok(self.emitter().extract(wide, 0..len));
        }

        if logical % native_bits != 0 {
            return Err(ratio_error);
        }
        let chunk = native_bits / arg_ty.width;
        let pieces = logical / native_bits;
        tracing::trace!(name = op.name, pieces, "splitting native op");
        let mut results = Parts::new();
        for i in 0..pieces {
            let lanes = i * chunk..(i + 1) * chunk;
            let piece: Parts = args
                .iter()
                .map(|&a| self.emitter().extract(a, lanes.clone()))
                .collect();
            results.push(self.native(op, result.with_length(chunk), &piece));
        }
        Ok(self.concat(&results))
    }

    /// Concatenate equally typed vectors in order.
    ///
    /// The number of parts must be a power of two.
    pub fn concat(&mut self, parts: &[ValueId]) -> ValueId {
        debug_assert!(parts.len().is_power_of_two());
        let mut level: Parts = parts.iter().copied().collect();
        while level.len() > 1 {
            let len = self.type_of(level[0]).length;
            let indices: SmallVec<[u32; 32]> = (0..2 * len).collect();
            level = level
                .chunks(2)
                .map(|pair| self.emitter().shuffle(pair[0], pair[1], &indices))
                .collect();
        }
        level[0]
    }
}
