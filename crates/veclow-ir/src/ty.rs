//! Vector format descriptors.

use serde::{Deserialize, Serialize};
use std::fmt;
use thiserror::Error;

/// Errors raised when a [`VectorType`] violates its own invariants.
#[derive(Clone, Debug, Error, PartialEq, Eq)]
pub enum TypeError {
    /// Lane width is not one of 8, 16, 32 or 64 bits.
    #[error("unsupported lane width {0}")]
    BadWidth(u32),

    /// Lane count is zero or not a power of two.
    #[error("lane count {0} is not a power of two")]
    BadLength(u32),

    /// Both `floating` and `fixed` were set.
    #[error("a vector type cannot be both floating and fixed point")]
    FloatingAndFixed,

    /// Floating lanes must be 16, 32 or 64 bits.
    #[error("no floating-point format with {0}-bit lanes")]
    BadFloatWidth(u32),
}

/// How the lanes of a type are interpreted when choosing instructions.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum SignKind {
    /// Unsigned integer lanes (plain, normalized or fixed).
    Unsigned,
    /// Signed integer lanes (plain, normalized or fixed).
    Signed,
    /// IEEE floating-point lanes.
    Float,
}

/// Description of one SIMD vector format.
///
/// A type is a lane width in bits, a lane count and a set of flags saying
/// how the bits of each lane are read. `length == 1` describes a scalar.
///
/// `floating` and `fixed` are mutually exclusive. `norm` on an integer type
/// means the lanes encode a fraction: `[0, 1]` for unsigned lanes with
/// `(1 << width) - 1` as one, `[-1, 1]` for signed lanes with
/// `(1 << (width - 1)) - 1` as one. Fixed-point lanes carry an implicit scale
/// of `width / 2` fractional bits.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct VectorType {
    /// Bits per lane.
    pub width: u32,
    /// Number of lanes.
    pub length: u32,
    /// IEEE floating-point lanes.
    pub floating: bool,
    /// Binary fixed-point lanes.
    pub fixed: bool,
    /// Normalized fraction lanes.
    pub norm: bool,
    /// Signed lanes.
    pub sign: bool,
}

impl VectorType {
    /// 4 x f32, the common shader vector.
    pub const VEC4F32: Self = Self::float(32, 4);
    /// 8 x f32, one AVX register.
    pub const VEC8F32: Self = Self::float(32, 8);
    /// 16 x unorm8, one SSE register of 8-bit color channels.
    pub const VEC16UNORM8: Self = Self::unorm(8, 16);

    /// Floating-point lanes.
    #[must_use]
    pub const fn float(width: u32, length: u32) -> Self {
        Self {
            width,
            length,
            floating: true,
            fixed: false,
            norm: false,
            sign: true,
        }
    }

    /// Signed integer lanes.
    #[must_use]
    pub const fn int(width: u32, length: u32) -> Self {
        Self {
            width,
            length,
            floating: false,
            fixed: false,
            norm: false,
            sign: true,
        }
    }

    /// Unsigned integer lanes.
    #[must_use]
    pub const fn uint(width: u32, length: u32) -> Self {
        Self {
            sign: false,
            ..Self::int(width, length)
        }
    }

    /// Unsigned normalized lanes covering `[0, 1]`.
    #[must_use]
    pub const fn unorm(width: u32, length: u32) -> Self {
        Self {
            norm: true,
            ..Self::uint(width, length)
        }
    }

    /// Signed normalized lanes covering `[-1, 1]`.
    #[must_use]
    pub const fn snorm(width: u32, length: u32) -> Self {
        Self {
            norm: true,
            ..Self::int(width, length)
        }
    }

    /// Fixed-point lanes with `width / 2` fractional bits.
    #[must_use]
    pub const fn fixed(width: u32, length: u32, sign: bool) -> Self {
        Self {
            width,
            length,
            floating: false,
            fixed: true,
            norm: false,
            sign,
        }
    }

    /// Check the type invariants.
    ///
    /// # Errors
    ///
    /// Returns the first violated invariant.
    pub fn validate(self) -> Result<(), TypeError> {
        if !matches!(self.width, 8 | 16 | 32 | 64) {
            return Err(TypeError::BadWidth(self.width));
        }
        if self.length == 0 || !self.length.is_power_of_two() {
            return Err(TypeError::BadLength(self.length));
        }
        if self.floating && self.fixed {
            return Err(TypeError::FloatingAndFixed);
        }
        if self.floating && self.width == 8 {
            return Err(TypeError::BadFloatWidth(self.width));
        }
        Ok(())
    }

    /// Total register bits, `width * length`.
    #[must_use]
    pub const fn total_bits(self) -> u32 {
        self.width * self.length
    }

    /// True for single-lane types.
    #[must_use]
    pub const fn is_scalar(self) -> bool {
        self.length == 1
    }

    /// Plain integer lanes: not floating, fixed or normalized.
    #[must_use]
    pub const fn is_plain_int(self) -> bool {
        !self.floating && !self.fixed && !self.norm
    }

    /// Normalized integer lanes.
    #[must_use]
    pub const fn is_norm_int(self) -> bool {
        self.norm && !self.floating && !self.fixed
    }

    /// Lane interpretation used for instruction selection.
    #[must_use]
    pub const fn sign_kind(self) -> SignKind {
        if self.floating {
            SignKind::Float
        } else if self.sign {
            SignKind::Signed
        } else {
            SignKind::Unsigned
        }
    }

    /// Double the lane width and halve the lane count, keeping every flag.
    ///
    /// Returns `None` for scalars and for 64-bit lanes.
    #[must_use]
    pub const fn wider(self) -> Option<Self> {
        if self.length < 2 || self.width >= 64 {
            return None;
        }
        Some(Self {
            width: self.width * 2,
            length: self.length / 2,
            ..self
        })
    }

    /// Halve the lane width and double the lane count, keeping every flag.
    #[must_use]
    pub const fn narrower(self) -> Option<Self> {
        if self.width <= 8 {
            return None;
        }
        Some(Self {
            width: self.width / 2,
            length: self.length * 2,
            ..self
        })
    }

    /// Signed integer type with the same lane shape.
    ///
    /// Comparison masks and bit manipulation of floats use this type.
    #[must_use]
    pub const fn int_type(self) -> Self {
        Self::int(self.width, self.length)
    }

    /// Float type with the same lane shape.
    #[must_use]
    pub const fn float_type(self) -> Self {
        Self::float(self.width, self.length)
    }

    /// Same lane format with a different lane count.
    #[must_use]
    pub const fn with_length(self, length: u32) -> Self {
        Self { length, ..self }
    }

    /// Plain unsigned type with the same lane shape and no interpretation flags.
    #[must_use]
    pub const fn bits_type(self) -> Self {
        Self::uint(self.width, self.length)
    }

    /// Mask covering one lane.
    #[must_use]
    pub const fn lane_mask(self) -> u64 {
        if self.width >= 64 {
            u64::MAX
        } else {
            (1u64 << self.width) - 1
        }
    }

    /// Explicit mantissa bits of a floating type.
    #[must_use]
    pub const fn mantissa_bits(self) -> u32 {
        match self.width {
            16 => 10,
            64 => 52,
            _ => 23,
        }
    }

    /// Exponent bias of a floating type.
    #[must_use]
    pub const fn exponent_bias(self) -> i64 {
        match self.width {
            16 => 15,
            64 => 1023,
            _ => 127,
        }
    }

    /// Bit pattern of the exponent field of a floating type.
    #[must_use]
    pub const fn exponent_mask(self) -> u64 {
        let bits = self.width - 1 - self.mantissa_bits();
        ((1u64 << bits) - 1) << self.mantissa_bits()
    }

    /// Bit pattern of the sign bit.
    #[must_use]
    pub const fn sign_mask(self) -> u64 {
        1u64 << (self.width - 1)
    }

    /// Smallest representable integer lane value.
    #[must_use]
    pub const fn int_min(self) -> i64 {
        if self.sign {
            if self.width >= 64 {
                i64::MIN
            } else {
                -(1i64 << (self.width - 1))
            }
        } else {
            0
        }
    }

    /// Largest representable integer lane value, saturating at `i64::MAX`.
    #[must_use]
    pub const fn int_max(self) -> i64 {
        if self.width >= 64 {
            i64::MAX
        } else if self.sign {
            (1i64 << (self.width - 1)) - 1
        } else {
            (1i64 << self.width) - 1
        }
    }

    /// Integer encoding of `1.0` for normalized and fixed types.
    #[must_use]
    pub const fn one_bits(self) -> i64 {
        if self.fixed {
            1i64 << (self.width / 2)
        } else if self.norm {
            self.int_max()
        } else {
            1
        }
    }
}

impl fmt::Display for VectorType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let kind = if self.floating {
            "f"
        } else if self.fixed {
            if self.sign {
                "sfixed"
            } else {
                "ufixed"
            }
        } else if self.norm {
            if self.sign {
                "snorm"
            } else {
                "unorm"
            }
        } else if self.sign {
            "i"
        } else {
            "u"
        };
        if self.length == 1 {
            write!(f, "{kind}{}", self.width)
        } else {
            write!(f, "v{}{kind}{}", self.length, self.width)
        }
    }
}
