//! Lowering configuration.

use crate::{LowerError, LowerResult};
use serde::{Deserialize, Serialize};

/// What `div` produces for a divisor known to be the cached zero.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum DivByZero {
    /// Return the cached `undef`; division by zero is the caller's problem.
    #[default]
    Undef,
    /// Emit the division and let the target decide (IEEE inf/NaN for floats).
    Emit,
}

/// Lower clamp for `add` on normalized float and fixed-point types.
///
/// Addition on these types always clamps to one from above. Whether it also
/// clamps from below is a policy choice.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum NormFloor {
    /// Leave the lower end alone.
    #[default]
    Unclamped,
    /// Clamp to zero for unsigned and minus one for signed types.
    Clamped,
}

/// Knobs for one lowering session.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct LowerConfig {
    /// Degree of the `exp2` fraction polynomial, 2 to 5.
    pub exp2_degree: u8,
    /// Degree of the `log2` mantissa polynomial, 3 to 5.
    pub log2_degree: u8,
    /// Use the approximate reciprocal plus refinement for `rcp`.
    pub fast_rcp: bool,
    /// Use the approximate reciprocal square root plus refinement for `rsqrt`.
    pub fast_rsqrt: bool,
    /// Newton-Raphson steps applied after an approximate reciprocal.
    pub refine_steps: u8,
    /// Result of dividing by the cached zero.
    pub div_by_zero: DivByZero,
    /// Lower clamp for normalized float and fixed-point addition.
    pub norm_floor: NormFloor,
}

impl Default for LowerConfig {
    fn default() -> Self {
        Self {
            exp2_degree: 5,
            log2_degree: 4,
            fast_rcp: false,
            fast_rsqrt: false,
            refine_steps: 1,
            div_by_zero: DivByZero::Undef,
            norm_floor: NormFloor::Unclamped,
        }
    }
}

impl LowerConfig {
    /// Set the `exp2` polynomial degree.
    #[must_use]
    pub fn with_exp2_degree(mut self, degree: u8) -> Self {
        self.exp2_degree = degree;
        self
    }

    /// Set the `log2` polynomial degree.
    #[must_use]
    pub fn with_log2_degree(mut self, degree: u8) -> Self {
        self.log2_degree = degree;
        self
    }

    /// Opt into approximate reciprocals.
    #[must_use]
    pub fn with_fast_rcp(mut self, enabled: bool) -> Self {
        self.fast_rcp = enabled;
        self
    }

    /// Opt into approximate reciprocal square roots.
    #[must_use]
    pub fn with_fast_rsqrt(mut self, enabled: bool) -> Self {
        self.fast_rsqrt = enabled;
        self
    }

    /// Set the number of refinement steps after an approximation.
    #[must_use]
    pub fn with_refine_steps(mut self, steps: u8) -> Self {
        self.refine_steps = steps;
        self
    }

    /// Set the division-by-zero policy.
    #[must_use]
    pub fn with_div_by_zero(mut self, policy: DivByZero) -> Self {
        self.div_by_zero = policy;
        self
    }

    /// Set the normalized addition floor policy.
    #[must_use]
    pub fn with_norm_floor(mut self, policy: NormFloor) -> Self {
        self.norm_floor = policy;
        self
    }

    /// Check every field is in range.
    ///
    /// # Errors
    ///
    /// Returns [`LowerError::InvalidConfig`] naming the first bad field.
    pub fn validate(&self) -> LowerResult<()> {
        if !(2..=5).contains(&self.exp2_degree) {
            return Err(LowerError::InvalidConfig(format!(
                "exp2_degree must be 2..=5, got {}",
                self.exp2_degree
            )));
        }
        if !(3..=5).contains(&self.log2_degree) {
            return Err(LowerError::InvalidConfig(format!(
                "log2_degree must be 3..=5, got {}",
                self.log2_degree
            )));
        }
        if self.refine_steps > 4 {
            return Err(LowerError::InvalidConfig(format!(
                "refine_steps must be at most 4, got {}",
                self.refine_steps
            )));
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_is_valid() {
        assert!(LowerConfig::default().validate().is_ok());
    }

    #[test]
    fn test_degree_bounds() {
        let cfg = LowerConfig::default().with_exp2_degree(6);
        assert!(matches!(cfg.validate(), Err(LowerError::InvalidConfig(_))));
        let cfg = LowerConfig::default().with_log2_degree(2);
        assert!(matches!(cfg.validate(), Err(LowerError::InvalidConfig(_))));
    }

    #[test]
    fn test_partial_json() {
        let cfg: LowerConfig = serde_json::from_str(r#"{"fast_rcp": true}"#).unwrap();
        assert!(cfg.fast_rcp);
        assert_eq!(cfg.exp2_degree, 5);
        assert_eq!(cfg.div_by_zero, DivByZero::Undef);
    }
}
