//! # veclow codegen
//!
//! Lowers abstract vector arithmetic into instruction sequences.
//!
//! ## Overview
//!
//! A [`LoweringContext`] is bound to one [`VectorType`], one [`Emitter`] and
//! one capability oracle. Each operation on the context (add, multiply,
//! min/max, interpolate, exp2, horizontal add, ...) emits the instructions
//! that compute it with well-defined semantics for the type:
//!
//! - NaN handling for float min/max is chosen per call ([`NanBehavior`]);
//! - normalized integer arithmetic saturates;
//! - transcendental functions use range reduction plus minimax polynomials.
//!
//! ## Lowering Strategy
//!
//! Every operation follows the same three steps:
//!
//! 1. **Identity shortcuts** on cached constants (`x + 0`, `x * 1`, ...).
//! 2. **Native path** when the oracle reports an instruction for the exact
//!    lane format, routed through the width adapter.
//! 3. **Generic path** built from compares, selects and bit manipulation.
//!
//! ## Modules
//!
//! - [`context`]: the lowering context and its constant cache
//! - [`dispatch`]: the native instruction table
//! - [`adapt`]: width adaptation for native instructions
//! - [`arith`], [`minmax`], [`logic`], [`recip`]: arithmetic lowering
//! - [`pack`]: widening and narrowing between lane widths
//! - [`round`], [`exp_log`], [`trig`]: rounding and transcendental functions
//! - [`lerp`], [`reduce`]: interpolation and horizontal reduction

#![warn(missing_docs)]
#![warn(clippy::all)]
#![warn(clippy::pedantic)]
#![allow(clippy::module_name_repetitions)]
#![allow(clippy::cast_possible_truncation)]
#![allow(clippy::cast_possible_wrap)]
#![allow(clippy::cast_sign_loss)]

pub mod adapt;
pub mod arith;
pub mod config;
pub mod context;
pub mod dispatch;
pub mod exp_log;
pub mod lerp;
pub mod logic;
pub mod minmax;
pub mod pack;
pub mod perf;
pub mod recip;
pub mod reduce;
pub mod round;
pub mod trig;

pub use config::{DivByZero, LowerConfig, NormFloor};
pub use context::LoweringContext;
pub use lerp::LerpFlags;
pub use minmax::NanBehavior;
pub use perf::{PerfLog, PerfNote, TracingPerfLog};

pub use veclow_ir::{Emitter, RoundingMode, ValueId, VectorType};
pub use veclow_target::{Capabilities, Feature, FeatureSet};

use thiserror::Error;

/// Errors raised while lowering.
///
/// Every variant is a precondition violation by the caller. A lowering call
/// that fails may already have emitted instructions; those must be discarded
/// along with the rest of the session.
#[derive(Clone, Debug, Error, PartialEq, Eq)]
pub enum LowerError {
    /// An operand does not have the type the operation expects.
    #[error("type mismatch: expected {expected}, found {found}")]
    TypeMismatch {
        /// Type the operation works on.
        expected: VectorType,
        /// Type of the offending operand.
        found: VectorType,
    },

    /// The operation is not available for this type or target.
    #[error("unsupported configuration: {0}")]
    UnsupportedConfiguration(String),

    /// The logical register width is not a multiple of the native width.
    #[error("unsupported width ratio: {logical}-bit vector on {native}-bit instruction")]
    UnsupportedWidthRatio {
        /// Logical width in bits.
        logical: u32,
        /// Native instruction width in bits.
        native: u32,
    },

    /// A [`LowerConfig`] value is out of range.
    #[error("invalid lowering config: {0}")]
    InvalidConfig(String),
}

/// Result type for lowering operations.
pub type LowerResult<T> = Result<T, LowerError>;

impl LowerError {
    pub(crate) fn unsupported(what: impl Into<String>) -> Self {
        Self::UnsupportedConfiguration(what.into())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_messages() {
        let err = LowerError::TypeMismatch {
            expected: VectorType::VEC4F32,
            found: VectorType::int(32, 4),
        };
        assert_eq!(err.to_string(), "type mismatch: expected v4f32, found v4i32");

        let err = LowerError::UnsupportedWidthRatio {
            logical: 96,
            native: 128,
        };
        assert!(err.to_string().contains("96-bit"));
    }
}
