//! Target capabilities for the veclow lowering engine.
//!
//! The lowering engine asks one question of a target: does it have a given
//! instruction family? This crate names those families ([`Feature`]),
//! answers the question through the [`Capabilities`] trait, and provides a
//! ready-made answer in [`FeatureSet`].
//!
//! # Feature Strings
//!
//! Feature sets are written as comma-separated names, optionally prefixed
//! with `+` or `-`:
//!
//! - `sse2,ssse3,sse4.1`
//! - `+avx2,+fma`
//! - `neon,-fp16`
//!
//! Host detection is an explicit call ([`FeatureSet::detect_host`]); nothing
//! in this crate consults process-wide state behind the caller's back.

#![warn(missing_docs)]

use bitflags::bitflags;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;
use thiserror::Error;

/// Target architecture family.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[non_exhaustive]
pub enum Arch {
    /// x86-64 (AMD64).
    X86_64,
    /// 64-bit ARM.
    Aarch64,
    /// 64-bit PowerPC.
    Powerpc64,
    /// IBM z/Architecture.
    S390x,
    /// 32-bit WebAssembly.
    Wasm32,
    /// Anything without a vector unit we know about.
    Generic,
}

impl Arch {
    /// Get the name of this architecture.
    #[must_use]
    pub const fn name(self) -> &'static str {
        match self {
            Self::X86_64 => "x86_64",
            Self::Aarch64 => "aarch64",
            Self::Powerpc64 => "powerpc64",
            Self::S390x => "s390x",
            Self::Wasm32 => "wasm32",
            Self::Generic => "generic",
        }
    }

    /// The architecture this crate was compiled for.
    #[must_use]
    pub const fn host() -> Self {
        if cfg!(target_arch = "x86_64") {
            Self::X86_64
        } else if cfg!(target_arch = "aarch64") {
            Self::Aarch64
        } else if cfg!(target_arch = "powerpc64") {
            Self::Powerpc64
        } else if cfg!(target_arch = "s390x") {
            Self::S390x
        } else if cfg!(target_arch = "wasm32") {
            Self::Wasm32
        } else {
            Self::Generic
        }
    }
}

impl fmt::Display for Arch {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.name())
    }
}

impl FromStr for Arch {
    type Err = TargetError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "x86_64" | "amd64" => Ok(Self::X86_64),
            "aarch64" | "arm64" => Ok(Self::Aarch64),
            "powerpc64" | "powerpc64le" | "ppc64" | "ppc64le" => Ok(Self::Powerpc64),
            "s390x" => Ok(Self::S390x),
            "wasm32" => Ok(Self::Wasm32),
            "generic" => Ok(Self::Generic),
            _ => Err(TargetError::UnknownArch(s.to_string())),
        }
    }
}

/// Instruction families the lowering engine can exploit.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Feature {
    /// SSE: 128-bit float min/max, approximate reciprocals.
    Sse,
    /// SSE2: 128-bit integer saturating add/sub, packs, `cvtps2dq`.
    Sse2,
    /// SSE3: horizontal float add.
    Sse3,
    /// SSSE3: integer abs, multiply-high-round.
    Ssse3,
    /// SSE4.1: float rounding, wider integer min/max, `packusdw`.
    Sse41,
    /// AVX: 256-bit float ops and rounding.
    Avx,
    /// AVX2: 256-bit integer ops.
    Avx2,
    /// AVX-512 foundation: 512-bit rounding.
    Avx512f,
    /// Fused multiply-add.
    Fma,
    /// Half-precision conversions and arithmetic.
    F16c,
    /// PowerPC AltiVec.
    Altivec,
    /// PowerPC VSX.
    Vsx,
    /// ARM Advanced SIMD.
    Neon,
    /// ARM half-precision vector arithmetic.
    NeonFp16,
    /// WebAssembly 128-bit SIMD.
    Simd128,
    /// IBM z/Architecture vector facility.
    ZVector,
}

impl Feature {
    /// Every feature, in declaration order.
    pub const ALL: [Self; 16] = [
        Self::Sse,
        Self::Sse2,
        Self::Sse3,
        Self::Ssse3,
        Self::Sse41,
        Self::Avx,
        Self::Avx2,
        Self::Avx512f,
        Self::Fma,
        Self::F16c,
        Self::Altivec,
        Self::Vsx,
        Self::Neon,
        Self::NeonFp16,
        Self::Simd128,
        Self::ZVector,
    ];

    /// Canonical feature-string name.
    #[must_use]
    pub const fn name(self) -> &'static str {
        match self {
            Self::Sse => "sse",
            Self::Sse2 => "sse2",
            Self::Sse3 => "sse3",
            Self::Ssse3 => "ssse3",
            Self::Sse41 => "sse4.1",
            Self::Avx => "avx",
            Self::Avx2 => "avx2",
            Self::Avx512f => "avx512f",
            Self::Fma => "fma",
            Self::F16c => "f16c",
            Self::Altivec => "altivec",
            Self::Vsx => "vsx",
            Self::Neon => "neon",
            Self::NeonFp16 => "fp16",
            Self::Simd128 => "simd128",
            Self::ZVector => "vector",
        }
    }

    const fn flag(self) -> FeatureSet {
        match self {
            Self::Sse => FeatureSet::SSE,
            Self::Sse2 => FeatureSet::SSE2,
            Self::Sse3 => FeatureSet::SSE3,
            Self::Ssse3 => FeatureSet::SSSE3,
            Self::Sse41 => FeatureSet::SSE41,
            Self::Avx => FeatureSet::AVX,
            Self::Avx2 => FeatureSet::AVX2,
            Self::Avx512f => FeatureSet::AVX512F,
            Self::Fma => FeatureSet::FMA,
            Self::F16c => FeatureSet::F16C,
            Self::Altivec => FeatureSet::ALTIVEC,
            Self::Vsx => FeatureSet::VSX,
            Self::Neon => FeatureSet::NEON,
            Self::NeonFp16 => FeatureSet::NEON_FP16,
            Self::Simd128 => FeatureSet::SIMD128,
            Self::ZVector => FeatureSet::ZVECTOR,
        }
    }
}

impl fmt::Display for Feature {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

impl FromStr for Feature {
    type Err = TargetError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let found = match s {
            "sse4_1" | "sse41" => Some(Self::Sse41),
            "avx512" => Some(Self::Avx512f),
            "asimd" => Some(Self::Neon),
            "neon-fp16" | "fullfp16" => Some(Self::NeonFp16),
            _ => Self::ALL.iter().copied().find(|f| f.name() == s),
        };
        found.ok_or_else(|| TargetError::UnknownFeature(s.to_string()))
    }
}

/// Answers capability queries during a lowering session.
///
/// Answers must not change while a session is running.
pub trait Capabilities {
    /// Does the target have `feature`?
    fn has(&self, feature: Feature) -> bool;
}

bitflags! {
    /// A concrete set of [`Feature`]s.
    #[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
    pub struct FeatureSet: u32 {
        /// See [`Feature::Sse`].
        const SSE = 1 << 0;
        /// See [`Feature::Sse2`].
        const SSE2 = 1 << 1;
        /// See [`Feature::Sse3`].
        const SSE3 = 1 << 2;
        /// See [`Feature::Ssse3`].
        const SSSE3 = 1 << 3;
        /// See [`Feature::Sse41`].
        const SSE41 = 1 << 4;
        /// See [`Feature::Avx`].
        const AVX = 1 << 5;
        /// See [`Feature::Avx2`].
        const AVX2 = 1 << 6;
        /// See [`Feature::Avx512f`].
        const AVX512F = 1 << 7;
        /// See [`Feature::Fma`].
        const FMA = 1 << 8;
        /// See [`Feature::F16c`].
        const F16C = 1 << 9;
        /// See [`Feature::Altivec`].
        const ALTIVEC = 1 << 10;
        /// See [`Feature::Vsx`].
        const VSX = 1 << 11;
        /// See [`Feature::Neon`].
        const NEON = 1 << 12;
        /// See [`Feature::NeonFp16`].
        const NEON_FP16 = 1 << 13;
        /// See [`Feature::Simd128`].
        const SIMD128 = 1 << 14;
        /// See [`Feature::ZVector`].
        const ZVECTOR = 1 << 15;

        /// Baseline x86-64.
        const X86_64_V1 = Self::SSE.bits() | Self::SSE2.bits();
        /// x86-64-v2 level.
        const X86_64_V2 = Self::X86_64_V1.bits() | Self::SSE3.bits()
            | Self::SSSE3.bits() | Self::SSE41.bits();
        /// x86-64-v3 level.
        const X86_64_V3 = Self::X86_64_V2.bits() | Self::AVX.bits()
            | Self::AVX2.bits() | Self::FMA.bits() | Self::F16C.bits();
    }
}

impl FeatureSet {
    /// Features every CPU of the architecture is guaranteed to have.
    #[must_use]
    pub const fn for_arch(arch: Arch) -> Self {
        match arch {
            Arch::X86_64 => Self::X86_64_V1,
            Arch::Aarch64 => Self::NEON,
            Arch::Powerpc64 => Self::ALTIVEC,
            Arch::S390x => Self::ZVECTOR,
            Arch::Wasm32 => Self::SIMD128,
            Arch::Generic => Self::empty(),
        }
    }

    /// Parse a feature string on top of `self`.
    ///
    /// # Errors
    ///
    /// Returns [`TargetError::UnknownFeature`] for a name this crate does not
    /// know and [`TargetError::EmptyFeature`] for an empty list entry.
    pub fn apply(mut self, features: &str) -> Result<Self, TargetError> {
        for raw in features.split(',') {
            let item = raw.trim();
            if item.is_empty() {
                if features.trim().is_empty() {
                    break;
                }
                return Err(TargetError::EmptyFeature(features.to_string()));
            }
            let (enable, name) = match item.as_bytes()[0] {
                b'+' => (true, &item[1..]),
                b'-' => (false, &item[1..]),
                _ => (true, item),
            };
            let feature: Feature = name.parse()?;
            self.set(feature.flag(), enable);
        }
        Ok(self)
    }

    /// Parse a feature string starting from the empty set.
    ///
    /// # Errors
    ///
    /// See [`FeatureSet::apply`].
    pub fn parse(features: &str) -> Result<Self, TargetError> {
        Self::empty().apply(features)
    }

    /// Add one feature.
    #[must_use]
    pub const fn with(self, feature: Feature) -> Self {
        self.union(feature.flag())
    }

    /// Remove one feature.
    #[must_use]
    pub const fn without(self, feature: Feature) -> Self {
        self.difference(feature.flag())
    }

    /// Iterate over the contained features.
    pub fn features(self) -> impl Iterator<Item = Feature> {
        Feature::ALL.into_iter().filter(move |f| self.contains(f.flag()))
    }

    /// Widest vector register in bits.
    #[must_use]
    pub const fn max_vector_bits(self) -> u32 {
        if self.contains(Self::AVX512F) {
            512
        } else if self.intersects(Self::AVX.union(Self::AVX2)) {
            256
        } else if self.is_empty() {
            64
        } else {
            128
        }
    }

    /// Query the CPU this process runs on.
    #[must_use]
    pub fn detect_host() -> Self {
        let detected = detect::host();
        tracing::debug!(features = %detected, "detected host features");
        detected
    }
}

impl Capabilities for FeatureSet {
    fn has(&self, feature: Feature) -> bool {
        self.contains(feature.flag())
    }
}

impl fmt::Display for FeatureSet {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let mut first = true;
        for feature in self.features() {
            if !first {
                f.write_str(",")?;
            }
            first = false;
            f.write_str(feature.name())?;
        }
        Ok(())
    }
}

impl FromStr for FeatureSet {
    type Err = TargetError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::parse(s)
    }
}

#[cfg(target_arch = "x86_64")]
mod detect {
    use super::FeatureSet;

    pub(super) fn host() -> FeatureSet {
        let probes = [
            (std::arch::is_x86_feature_detected!("sse"), FeatureSet::SSE),
            (std::arch::is_x86_feature_detected!("sse2"), FeatureSet::SSE2),
            (std::arch::is_x86_feature_detected!("sse3"), FeatureSet::SSE3),
            (std::arch::is_x86_feature_detected!("ssse3"), FeatureSet::SSSE3),
            (std::arch::is_x86_feature_detected!("sse4.1"), FeatureSet::SSE41),
            (std::arch::is_x86_feature_detected!("avx"), FeatureSet::AVX),
            (std::arch::is_x86_feature_detected!("avx2"), FeatureSet::AVX2),
            (std::arch::is_x86_feature_detected!("avx512f"), FeatureSet::AVX512F),
            (std::arch::is_x86_feature_detected!("fma"), FeatureSet::FMA),
            (std::arch::is_x86_feature_detected!("f16c"), FeatureSet::F16C),
        ];
        probes
            .into_iter()
            .filter(|(present, _)| *present)
            .fold(FeatureSet::empty(), |acc, (_, flag)| acc | flag)
    }
}

#[cfg(target_arch = "aarch64")]
mod detect {
    use super::FeatureSet;

    pub(super) fn host() -> FeatureSet {
        let mut set = FeatureSet::NEON;
        if std::arch::is_aarch64_feature_detected!("fp16") {
            set |= FeatureSet::NEON_FP16;
        }
        set
    }
}

#[cfg(not(any(target_arch = "x86_64", target_arch = "aarch64")))]
mod detect {
    use super::{Arch, FeatureSet};

    pub(super) fn host() -> FeatureSet {
        FeatureSet::for_arch(Arch::host())
    }
}

/// Errors from parsing target descriptions.
#[derive(Debug, Error, PartialEq, Eq)]
pub enum TargetError {
    /// Unknown architecture name.
    #[error("unknown architecture: {0}")]
    UnknownArch(String),

    /// Unknown feature name.
    #[error("unknown feature: {0}")]
    UnknownFeature(String),

    /// A feature list contained an empty entry.
    #[error("empty entry in feature list: {0:?}")]
    EmptyFeature(String),
}
