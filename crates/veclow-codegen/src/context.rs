//! The lowering context and its special-value cache.
//!
//! Each context lowers operations on one [`VectorType`] at a time. The
//! canonical `zero`, `one` and `undef` handles for every type the context
//! has touched are kept in a small map; operations compare operands against
//! these handles to take algebraic shortcuts.
//!
//! The shortcuts are identity checks only. A value that is numerically one
//! but was not obtained from [`LoweringContext::one`] does not trigger them
//! and goes down the general path, which still computes the right answer.

use crate::config::LowerConfig;
use crate::perf::{PerfLog, PerfNote};
use crate::{LowerError, LowerResult};
use rustc_hash::FxHashMap;
use smallvec::smallvec;
use veclow_ir::{
    BinOp, CmpOp, Convert, Emitter, Literal, NativeOp, Op, UnOp, ValueId, VectorType,
};
use veclow_target::{Capabilities, Feature};

/// Canonical handles for one type, filled on first use.
#[derive(Clone, Copy, Debug, Default)]
struct Specials {
    zero: Option<ValueId>,
    one: Option<ValueId>,
    undef: Option<ValueId>,
}

/// Lowers operations on one vector type into emitter calls.
///
/// The emitter and capability oracle are borrowed for the session. The
/// context is not `Sync`; independent sessions use independent contexts.
pub struct LoweringContext<'a> {
    ty: VectorType,
    emitter: &'a mut dyn Emitter,
    caps: &'a dyn Capabilities,
    config: LowerConfig,
    perf: Option<&'a dyn PerfLog>,
    cache: FxHashMap<VectorType, Specials>,
}

impl<'a> LoweringContext<'a> {
    /// Create a context lowering operations on `ty`.
    ///
    /// # Errors
    ///
    /// Returns [`LowerError::UnsupportedConfiguration`] if `ty` breaks the
    /// [`VectorType`] invariants.
    pub fn new(
        emitter: &'a mut dyn Emitter,
        caps: &'a dyn Capabilities,
        ty: VectorType,
    ) -> LowerResult<Self> {
        ty.validate()
            .map_err(|e| LowerError::unsupported(format!("{ty}: {e}")))?;
        Ok(Self {
            ty,
            emitter,
            caps,
            config: LowerConfig::default(),
            perf: None,
            cache: FxHashMap::default(),
        })
    }

    /// Replace the configuration.
    ///
    /// # Errors
    ///
    /// Returns [`LowerError::InvalidConfig`] if the configuration is invalid.
    pub fn with_config(mut self, config: LowerConfig) -> LowerResult<Self> {
        config.validate()?;
        self.config = config;
        Ok(self)
    }

    /// Report inefficient lowerings to `log`.
    #[must_use]
    pub fn with_perf_log(mut self, log: &'a dyn PerfLog) -> Self {
        self.perf = Some(log);
        self
    }

    /// The type operations currently lower for.
    #[must_use]
    pub fn ty(&self) -> VectorType {
        self.ty
    }

    /// The active configuration.
    #[must_use]
    pub fn config(&self) -> &LowerConfig {
        &self.config
    }

    /// The emitter this context writes to.
    pub fn emitter(&mut self) -> &mut (dyn Emitter + 'a) {
        self.emitter
    }

    /// Does the target have `feature`?
    #[must_use]
    pub fn has(&self, feature: Feature) -> bool {
        self.caps.has(feature)
    }

    pub(crate) fn caps(&self) -> &'a dyn Capabilities {
        self.caps
    }

    /// Run `f` with the context switched to `ty`, then switch back.
    ///
    /// The constant cache is shared, so handles for `ty` created inside `f`
    /// are reused by later calls.
    ///
    /// # Errors
    ///
    /// Returns whatever `f` returns, or [`LowerError::UnsupportedConfiguration`]
    /// when `ty` is not a valid type.
    pub fn scoped<R>(
        &mut self,
        ty: VectorType,
        f: impl FnOnce(&mut Self) -> LowerResult<R>,
    ) -> LowerResult<R> {
        ty.validate()
            .map_err(|e| LowerError::unsupported(format!("{ty}: {e}")))?;
        let saved = std::mem::replace(&mut self.ty, ty);
        let result = f(self);
        self.ty = saved;
        result
    }

    // ------------------------------------------------------------------
    // Special values
    // ------------------------------------------------------------------

    /// Canonical zero for the current type.
    pub fn zero(&mut self) -> ValueId {
        let ty = self.ty;
        if let Some(v) = self.specials(ty).zero {
            return v;
        }
        let literal = if ty.floating {
            Literal::Float(0.0)
        } else {
            Literal::Int(0)
        };
        let v = self.emitter.constant(ty, literal);
        self.cache.entry(ty).or_default().zero = Some(v);
        v
    }

    /// Canonical one for the current type.
    ///
    /// For unsigned normalized types this is all ones, for signed normalized
    /// types the largest positive value.
    pub fn one(&mut self) -> ValueId {
        let ty = self.ty;
        if let Some(v) = self.specials(ty).one {
            return v;
        }
        let literal = if ty.floating {
            Literal::Float(1.0)
        } else if ty.norm && !ty.sign {
            Literal::Bits(smallvec![ty.lane_mask()])
        } else {
            Literal::Int(ty.one_bits())
        };
        let v = self.emitter.constant(ty, literal);
        self.cache.entry(ty).or_default().one = Some(v);
        v
    }

    /// Canonical undefined value for the current type.
    pub fn undef(&mut self) -> ValueId {
        let ty = self.ty;
        if let Some(v) = self.specials(ty).undef {
            return v;
        }
        let v = self.emitter.constant(ty, Literal::Undef);
        self.cache.entry(ty).or_default().undef = Some(v);
        v
    }

    fn specials(&self, ty: VectorType) -> Specials {
        self.cache.get(&ty).copied().unwrap_or_default()
    }

    /// Is `v` the cached zero of the current type?
    #[must_use]
    pub fn is_zero(&self, v: ValueId) -> bool {
        self.specials(self.ty).zero == Some(v)
    }

    /// Is `v` the cached one of the current type?
    #[must_use]
    pub fn is_one(&self, v: ValueId) -> bool {
        self.specials(self.ty).one == Some(v)
    }

    /// Is `v` the cached undef of the current type?
    #[must_use]
    pub fn is_undef(&self, v: ValueId) -> bool {
        self.specials(self.ty).undef == Some(v)
    }

    // ------------------------------------------------------------------
    // Constants
    // ------------------------------------------------------------------

    /// Splat `value` in the current type's encoding.
    ///
    /// Normalized and fixed-point types scale the value by their encoding
    /// of one; plain integers truncate it.
    pub fn splat(&mut self, value: f64) -> ValueId {
        let ty = self.ty;
        let literal = if ty.floating {
            Literal::Float(value)
        } else if ty.norm || ty.fixed {
            Literal::Int((value * ty.one_bits() as f64).round() as i64)
        } else {
            Literal::Int(value as i64)
        };
        self.emitter.constant(ty, literal)
    }

    /// Integer constant of type `ty`.
    pub fn const_int(&mut self, ty: VectorType, value: i64) -> ValueId {
        self.emitter.constant(ty, Literal::Int(value))
    }

    /// Integer constant with the current type's lane shape.
    pub(crate) fn const_int_lanes(&mut self, value: i64) -> ValueId {
        let ty = self.ty.int_type();
        self.const_int(ty, value)
    }

    /// Float constant of type `ty`.
    pub fn const_float(&mut self, ty: VectorType, value: f64) -> ValueId {
        self.emitter.constant(ty, Literal::Float(value))
    }

    // ------------------------------------------------------------------
    // Checks
    // ------------------------------------------------------------------

    /// Check every value has the current type.
    pub(crate) fn check(&self, values: &[ValueId]) -> LowerResult<()> {
        self.check_ty(self.ty, values)
    }

    pub(crate) fn check_ty(&self, expected: VectorType, values: &[ValueId]) -> LowerResult<()> {
        for &v in values {
            let found = self.emitter.type_of(v);
            if found != expected {
                return Err(LowerError::TypeMismatch { expected, found });
            }
        }
        Ok(())
    }

    pub(crate) fn require_float(&self, op: &str) -> LowerResult<()> {
        if self.ty.floating {
            Ok(())
        } else {
            Err(LowerError::unsupported(format!(
                "{op} needs a floating type, got {}",
                self.ty
            )))
        }
    }

    /// Tell the perf log when every input is a compile-time constant.
    pub(crate) fn note_constant(&self, op: &'static str, values: &[ValueId]) {
        if let Some(log) = self.perf {
            if values.iter().all(|&v| self.emitter.is_constant(v)) {
                log.note(PerfNote {
                    op,
                    reason: "inefficient constant arithmetic",
                });
            }
        }
    }

    // ------------------------------------------------------------------
    // Raw emission, no shortcuts
    // ------------------------------------------------------------------

    pub(crate) fn emit(&mut self, op: Op, ty: VectorType, operands: &[ValueId]) -> ValueId {
        tracing::trace!(%op, %ty, "emit");
        self.emitter.emit(op, ty, operands)
    }

    pub(crate) fn bin(&mut self, op: BinOp, a: ValueId, b: ValueId) -> ValueId {
        let ty = self.emitter.type_of(a);
        self.emit(Op::Bin(op), ty, &[a, b])
    }

    pub(crate) fn un(&mut self, op: UnOp, a: ValueId) -> ValueId {
        let ty = self.emitter.type_of(a);
        self.emit(Op::Un(op), ty, &[a])
    }

    /// Compare two values of any type, producing a mask of its integer shape.
    pub(crate) fn compare(&mut self, op: CmpOp, ordered: bool, a: ValueId, b: ValueId) -> ValueId {
        let ty = self.emitter.type_of(a).int_type();
        self.emit(Op::Cmp { op, ordered }, ty, &[a, b])
    }

    /// Select between two values of any type.
    pub(crate) fn pick(&mut self, mask: ValueId, a: ValueId, b: ValueId) -> ValueId {
        let ty = self.emitter.type_of(a);
        self.emit(Op::Select, ty, &[mask, a, b])
    }

    pub(crate) fn bitcast(&mut self, v: ValueId, ty: VectorType) -> ValueId {
        if self.emitter.type_of(v) == ty {
            return v;
        }
        self.emit(Op::Convert(Convert::Bitcast), ty, &[v])
    }

    pub(crate) fn convert(&mut self, conv: Convert, v: ValueId, ty: VectorType) -> ValueId {
        self.emit(Op::Convert(conv), ty, &[v])
    }

    pub(crate) fn native(&mut self, op: NativeOp, ty: VectorType, args: &[ValueId]) -> ValueId {
        tracing::debug!(name = op.name, %ty, "native instruction");
        self.emit(Op::Native(op), ty, args)
    }

    pub(crate) fn type_of(&self, v: ValueId) -> VectorType {
        self.emitter.type_of(v)
    }
}
