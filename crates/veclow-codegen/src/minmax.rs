//! Lane minimum and maximum with explicit NaN policy.
//!
//! Float min/max instructions disagree on NaN inputs, so every call names
//! the behavior it needs. A native instruction is only used when its NaN
//! rule can deliver that behavior; otherwise the generic compare-and-select
//! sequence is emitted.

use crate::context::LoweringContext;
use crate::dispatch::{self, NativeOperation};
use crate::LowerResult;
use serde::{Deserialize, Serialize};
use veclow_ir::{BinOp, CmpOp, NativeNan, ValueId};

/// Result of a float min/max when an operand is NaN.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum NanBehavior {
    /// Return the other operand; NaN only if both are NaN.
    ReturnOther,
    /// Return the second operand if the first is NaN. The second operand
    /// must not be NaN.
    ReturnOtherSecondNonNan,
    /// Return NaN if the second operand is NaN. The first operand must not
    /// be NaN.
    ReturnNanFirstNonNan,
    /// Any of the above.
    #[default]
    Undefined,
}

impl NanBehavior {
    /// Can a native instruction with rule `native` deliver this behavior,
    /// possibly after a fixup?
    const fn native_compatible(self, native: NativeNan) -> bool {
        match native {
            NativeNan::ReturnSecond => true,
            NativeNan::ReturnNumber => !matches!(self, Self::ReturnNanFirstNonNan),
            NativeNan::Propagate => matches!(self, Self::ReturnNanFirstNonNan | Self::Undefined),
        }
    }
}

impl LoweringContext<'_> {
    /// Lane minimum with undefined NaN behavior.
    pub fn min(&mut self, a: ValueId, b: ValueId) -> LowerResult<ValueId> {
        self.min_ext(a, b, NanBehavior::Undefined)
    }

    /// Lane maximum with undefined NaN behavior.
    pub fn max(&mut self, a: ValueId, b: ValueId) -> LowerResult<ValueId> {
        self.max_ext(a, b, NanBehavior::Undefined)
    }

    /// Lane minimum with the given NaN behavior.
    pub fn min_ext(&mut self, a: ValueId, b: ValueId, nan: NanBehavior) -> LowerResult<ValueId> {
        self.check(&[a, b])?;
        if self.is_undef(a) || self.is_undef(b) {
            return Ok(self.undef());
        }
        if a == b {
            return Ok(a);
        }
        let ty = self.ty();
        if ty.norm {
            if !ty.sign && (self.is_zero(a) || self.is_zero(b)) {
                return Ok(self.zero());
            }
            if self.is_one(a) {
                return Ok(b);
            }
            if self.is_one(b) {
                return Ok(a);
            }
        }
        self.min_simple(a, b, nan)
    }

    /// Lane maximum with the given NaN behavior.
    pub fn max_ext(&mut self, a: ValueId, b: ValueId, nan: NanBehavior) -> LowerResult<ValueId> {
        self.check(&[a, b])?;
        if self.is_undef(a) || self.is_undef(b) {
            return Ok(self.undef());
        }
        if a == b {
            return Ok(a);
        }
        let ty = self.ty();
        if ty.norm {
            if self.is_one(a) || self.is_one(b) {
                return Ok(self.one());
            }
            if !ty.sign {
                if self.is_zero(a) {
                    return Ok(b);
                }
                if self.is_zero(b) {
                    return Ok(a);
                }
            }
        }
        self.max_simple(a, b, nan)
    }

    /// Minimum without shortcuts.
    pub(crate) fn min_simple(&mut self, a: ValueId, b: ValueId, nan: NanBehavior) -> LowerResult<ValueId> {
        self.min_max_simple(true, a, b, nan)
    }

    /// Maximum without shortcuts.
    pub(crate) fn max_simple(&mut self, a: ValueId, b: ValueId, nan: NanBehavior) -> LowerResult<ValueId> {
        self.min_max_simple(false, a, b, nan)
    }

    fn min_max_simple(
        &mut self,
        is_min: bool,
        a: ValueId,
        b: ValueId,
        nan: NanBehavior,
    ) -> LowerResult<ValueId> {
        let ty = self.ty();
        let op = if is_min {
            NativeOperation::Min
        } else {
            NativeOperation::Max
        };

        if let Some(row) = dispatch::lookup(self.caps(), op, ty) {
            let rule = row.nan_rule().unwrap_or(NativeNan::ReturnSecond);
            if !ty.floating || nan.native_compatible(rule) {
                let r = self.apply_native(row.native(), row.bits(), ty, &[a, b])?;
                if ty.floating && nan == NanBehavior::ReturnOther && rule == NativeNan::ReturnSecond {
                    // A NaN second operand leaks through; replace it with the first.
                    let b_nan = self.compare(CmpOp::Ne, false, b, b);
                    return Ok(self.pick(b_nan, a, r));
                }
                return Ok(r);
            }
            tracing::debug!(name = row.name, ?nan, "native min/max cannot honor NaN behavior");
        }

        let cmp = if is_min { CmpOp::Lt } else { CmpOp::Gt };
        if !ty.floating {
            let cond = self.compare(cmp, false, a, b);
            return Ok(self.pick(cond, a, b));
        }
        let r = match nan {
            NanBehavior::ReturnOther => {
                let a_nan = self.compare(CmpOp::Ne, false, a, a);
                let less = self.compare(cmp, false, a, b);
                let cond = self.bin(BinOp::Xor, less, a_nan);
                self.pick(cond, a, b)
            }
            NanBehavior::ReturnOtherSecondNonNan => {
                let cond = self.compare(cmp, true, a, b);
                self.pick(cond, a, b)
            }
            NanBehavior::ReturnNanFirstNonNan => {
                let cond = self.compare(cmp, false, b, a);
                self.pick(cond, b, a)
            }
            NanBehavior::Undefined => {
                let cond = self.compare(cmp, false, a, b);
                self.pick(cond, a, b)
            }
        };
        Ok(r)
    }

    /// Clamp `a` to `[lo, hi]`.
    pub fn clamp(&mut self, a: ValueId, lo: ValueId, hi: ValueId) -> LowerResult<ValueId> {
        self.check(&[a, lo, hi])?;
        let a = self.min(a, hi)?;
        self.max(a, lo)
    }

    /// Clamp to `[0, 1]`, mapping NaN to zero.
    pub fn clamp_zero_one_nanzero(&mut self, a: ValueId) -> LowerResult<ValueId> {
        let zero = self.zero();
        let one = self.one();
        let a = self.max_ext(a, zero, NanBehavior::ReturnOtherSecondNonNan)?;
        self.min(a, one)
    }
}
