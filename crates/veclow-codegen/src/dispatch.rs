//! Native instruction table.
//!
//! Maps an abstract operation and a lane format to the target instruction
//! implementing it and the capability that instruction needs. Lookup is the
//! only place that asks the capability oracle which instruction to use; the
//! lowering code only ever sees the chosen [`NativeRow`].
//!
//! ```text
//! (operation, lane width, lane count, sign kind) -> (feature, instruction)
//! ```
//!
//! A row does not have to match the logical vector length. The width adapter
//! splits or pads the operands when the row's register width differs.

use veclow_ir::{NativeKind, NativeNan, NativeOp, RoundingMode, SignKind, VectorType};
use veclow_target::{Capabilities, Feature};

/// Operations with target-native implementations.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum NativeOperation {
    /// Saturating add.
    SatAdd,
    /// Saturating subtract.
    SatSub,
    /// Lane minimum.
    Min,
    /// Lane maximum.
    Max,
    /// Round to integral float. The mode is supplied at emission.
    Round,
    /// Approximate reciprocal.
    RcpApprox,
    /// Approximate reciprocal square root.
    RsqrtApprox,
    /// Pairwise horizontal add.
    HorizontalAdd,
    /// Rounding high multiply of 16-bit lanes.
    MulHiRound,
    /// Integer absolute value.
    Abs,
    /// Saturating narrow; keyed by the wide source format and the result sign.
    PackSaturate,
    /// Float to int, round to nearest.
    ConvertNearest,
    /// Base-2 exponential.
    Exp2,
    /// Base-2 logarithm.
    Log2,
    /// Sine.
    Sin,
    /// Cosine.
    Cos,
}

/// One native instruction and the lane format it works on.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct NativeRow {
    /// Abstract operation.
    pub op: NativeOperation,
    /// Lane width in bits.
    pub width: u32,
    /// Lanes per instruction.
    pub lanes: u32,
    /// Lane interpretation.
    pub sign: SignKind,
    /// Capability the instruction needs.
    pub feature: Feature,
    /// Instruction name.
    pub name: &'static str,
    /// Instruction semantics.
    pub kind: NativeKind,
}

impl NativeRow {
    /// Register width of the instruction.
    #[must_use]
    pub const fn bits(&self) -> u32 {
        self.width * self.lanes
    }

    /// The instruction to emit.
    #[must_use]
    pub const fn native(&self) -> NativeOp {
        NativeOp {
            name: self.name,
            kind: self.kind,
        }
    }

    /// The instruction to emit for a rounding row, with `mode` filled in.
    #[must_use]
    pub const fn rounding(&self, mode: RoundingMode) -> NativeOp {
        NativeOp {
            name: self.name,
            kind: NativeKind::Round(mode),
        }
    }

    /// NaN rule of a float min/max row.
    #[must_use]
    pub const fn nan_rule(&self) -> Option<NativeNan> {
        match self.kind {
            NativeKind::Min(rule) | NativeKind::Max(rule) => Some(rule),
            _ => None,
        }
    }
}

#[allow(clippy::too_many_arguments)]
const fn row(
    op: NativeOperation,
    width: u32,
    lanes: u32,
    sign: SignKind,
    feature: Feature,
    name: &'static str,
    kind: NativeKind,
) -> NativeRow {
    NativeRow {
        op,
        width,
        lanes,
        sign,
        feature,
        name,
        kind,
    }
}

use NativeOperation as N;
use SignKind::{Float as F, Signed as S, Unsigned as U};

const NEAREST: NativeKind = NativeKind::Round(RoundingMode::Nearest);
const SECOND: NativeNan = NativeNan::ReturnSecond;
const NUMBER: NativeNan = NativeNan::ReturnNumber;

/// Every native instruction the lowering engine knows about.
pub static NATIVE_TABLE: &[NativeRow] = &[
    // Saturating add
    row(N::SatAdd, 8, 16, U, Feature::Sse2, "llvm.x86.sse2.paddus.b", NativeKind::SatAdd),
    row(N::SatAdd, 8, 16, S, Feature::Sse2, "llvm.x86.sse2.padds.b", NativeKind::SatAdd),
    row(N::SatAdd, 16, 8, U, Feature::Sse2, "llvm.x86.sse2.paddus.w", NativeKind::SatAdd),
    row(N::SatAdd, 16, 8, S, Feature::Sse2, "llvm.x86.sse2.padds.w", NativeKind::SatAdd),
    row(N::SatAdd, 8, 32, U, Feature::Avx2, "llvm.x86.avx2.paddus.b", NativeKind::SatAdd),
    row(N::SatAdd, 8, 32, S, Feature::Avx2, "llvm.x86.avx2.padds.b", NativeKind::SatAdd),
    row(N::SatAdd, 16, 16, U, Feature::Avx2, "llvm.x86.avx2.paddus.w", NativeKind::SatAdd),
    row(N::SatAdd, 16, 16, S, Feature::Avx2, "llvm.x86.avx2.padds.w", NativeKind::SatAdd),
    row(N::SatAdd, 8, 16, U, Feature::Altivec, "llvm.ppc.altivec.vaddubs", NativeKind::SatAdd),
    row(N::SatAdd, 8, 16, S, Feature::Altivec, "llvm.ppc.altivec.vaddsbs", NativeKind::SatAdd),
    row(N::SatAdd, 16, 8, U, Feature::Altivec, "llvm.ppc.altivec.vadduhs", NativeKind::SatAdd),
    row(N::SatAdd, 16, 8, S, Feature::Altivec, "llvm.ppc.altivec.vaddshs", NativeKind::SatAdd),
    row(N::SatAdd, 8, 16, U, Feature::Neon, "llvm.aarch64.neon.uqadd.v16i8", NativeKind::SatAdd),
    row(N::SatAdd, 8, 16, S, Feature::Neon, "llvm.aarch64.neon.sqadd.v16i8", NativeKind::SatAdd),
    row(N::SatAdd, 16, 8, U, Feature::Neon, "llvm.aarch64.neon.uqadd.v8i16", NativeKind::SatAdd),
    row(N::SatAdd, 16, 8, S, Feature::Neon, "llvm.aarch64.neon.sqadd.v8i16", NativeKind::SatAdd),
    // Saturating subtract
    row(N::SatSub, 8, 16, U, Feature::Sse2, "llvm.x86.sse2.psubus.b", NativeKind::SatSub),
    row(N::SatSub, 8, 16, S, Feature::Sse2, "llvm.x86.sse2.psubs.b", NativeKind::SatSub),
    row(N::SatSub, 16, 8, U, Feature::Sse2, "llvm.x86.sse2.psubus.w", NativeKind::SatSub),
    row(N::SatSub, 16, 8, S, Feature::Sse2, "llvm.x86.sse2.psubs.w", NativeKind::SatSub),
    row(N::SatSub, 8, 32, U, Feature::Avx2, "llvm.x86.avx2.psubus.b", NativeKind::SatSub),
    row(N::SatSub, 8, 32, S, Feature::Avx2, "llvm.x86.avx2.psubs.b", NativeKind::SatSub),
    row(N::SatSub, 16, 16, U, Feature::Avx2, "llvm.x86.avx2.psubus.w", NativeKind::SatSub),
    row(N::SatSub, 16, 16, S, Feature::Avx2, "llvm.x86.avx2.psubs.w", NativeKind::SatSub),
    row(N::SatSub, 8, 16, U, Feature::Altivec, "llvm.ppc.altivec.vsububs", NativeKind::SatSub),
    row(N::SatSub, 8, 16, S, Feature::Altivec, "llvm.ppc.altivec.vsubsbs", NativeKind::SatSub),
    row(N::SatSub, 16, 8, U, Feature::Altivec, "llvm.ppc.altivec.vsubuhs", NativeKind::SatSub),
    row(N::SatSub, 16, 8, S, Feature::Altivec, "llvm.ppc.altivec.vsubshs", NativeKind::SatSub),
    row(N::SatSub, 8, 16, U, Feature::Neon, "llvm.aarch64.neon.uqsub.v16i8", NativeKind::SatSub),
    row(N::SatSub, 8, 16, S, Feature::Neon, "llvm.aarch64.neon.sqsub.v16i8", NativeKind::SatSub),
    row(N::SatSub, 16, 8, U, Feature::Neon, "llvm.aarch64.neon.uqsub.v8i16", NativeKind::SatSub),
    row(N::SatSub, 16, 8, S, Feature::Neon, "llvm.aarch64.neon.sqsub.v8i16", NativeKind::SatSub),
    // Float min/max
    row(N::Min, 32, 1, F, Feature::Sse, "llvm.x86.sse.min.ss", NativeKind::Min(SECOND)),
    row(N::Min, 32, 4, F, Feature::Sse, "llvm.x86.sse.min.ps", NativeKind::Min(SECOND)),
    row(N::Min, 64, 1, F, Feature::Sse2, "llvm.x86.sse2.min.sd", NativeKind::Min(SECOND)),
    row(N::Min, 64, 2, F, Feature::Sse2, "llvm.x86.sse2.min.pd", NativeKind::Min(SECOND)),
    row(N::Min, 32, 8, F, Feature::Avx, "llvm.x86.avx.min.ps.256", NativeKind::Min(SECOND)),
    row(N::Min, 64, 4, F, Feature::Avx, "llvm.x86.avx.min.pd.256", NativeKind::Min(SECOND)),
    row(N::Min, 32, 4, F, Feature::Altivec, "llvm.ppc.altivec.vminfp", NativeKind::Min(NUMBER)),
    row(N::Min, 32, 4, F, Feature::Neon, "llvm.aarch64.neon.fminnm.v4f32", NativeKind::Min(NUMBER)),
    row(N::Min, 64, 2, F, Feature::Neon, "llvm.aarch64.neon.fminnm.v2f64", NativeKind::Min(NUMBER)),
    row(N::Max, 32, 1, F, Feature::Sse, "llvm.x86.sse.max.ss", NativeKind::Max(SECOND)),
    row(N::Max, 32, 4, F, Feature::Sse, "llvm.x86.sse.max.ps", NativeKind::Max(SECOND)),
    row(N::Max, 64, 1, F, Feature::Sse2, "llvm.x86.sse2.max.sd", NativeKind::Max(SECOND)),
    row(N::Max, 64, 2, F, Feature::Sse2, "llvm.x86.sse2.max.pd", NativeKind::Max(SECOND)),
    row(N::Max, 32, 8, F, Feature::Avx, "llvm.x86.avx.max.ps.256", NativeKind::Max(SECOND)),
    row(N::Max, 64, 4, F, Feature::Avx, "llvm.x86.avx.max.pd.256", NativeKind::Max(SECOND)),
    row(N::Max, 32, 4, F, Feature::Altivec, "llvm.ppc.altivec.vmaxfp", NativeKind::Max(NUMBER)),
    row(N::Max, 32, 4, F, Feature::Neon, "llvm.aarch64.neon.fmaxnm.v4f32", NativeKind::Max(NUMBER)),
    row(N::Max, 64, 2, F, Feature::Neon, "llvm.aarch64.neon.fmaxnm.v2f64", NativeKind::Max(NUMBER)),
    // Integer min/max
    row(N::Min, 8, 16, U, Feature::Sse2, "llvm.x86.sse2.pminu.b", NativeKind::Min(SECOND)),
    row(N::Min, 16, 8, S, Feature::Sse2, "llvm.x86.sse2.pmins.w", NativeKind::Min(SECOND)),
    row(N::Min, 8, 16, S, Feature::Sse41, "llvm.x86.sse41.pminsb", NativeKind::Min(SECOND)),
    row(N::Min, 16, 8, U, Feature::Sse41, "llvm.x86.sse41.pminuw", NativeKind::Min(SECOND)),
    row(N::Min, 32, 4, U, Feature::Sse41, "llvm.x86.sse41.pminud", NativeKind::Min(SECOND)),
    row(N::Min, 32, 4, S, Feature::Sse41, "llvm.x86.sse41.pminsd", NativeKind::Min(SECOND)),
    row(N::Min, 8, 16, U, Feature::Altivec, "llvm.ppc.altivec.vminub", NativeKind::Min(SECOND)),
    row(N::Min, 8, 16, S, Feature::Altivec, "llvm.ppc.altivec.vminsb", NativeKind::Min(SECOND)),
    row(N::Min, 16, 8, U, Feature::Altivec, "llvm.ppc.altivec.vminuh", NativeKind::Min(SECOND)),
    row(N::Min, 16, 8, S, Feature::Altivec, "llvm.ppc.altivec.vminsh", NativeKind::Min(SECOND)),
    row(N::Min, 32, 4, U, Feature::Altivec, "llvm.ppc.altivec.vminuw", NativeKind::Min(SECOND)),
    row(N::Min, 32, 4, S, Feature::Altivec, "llvm.ppc.altivec.vminsw", NativeKind::Min(SECOND)),
    row(N::Max, 8, 16, U, Feature::Sse2, "llvm.x86.sse2.pmaxu.b", NativeKind::Max(SECOND)),
    row(N::Max, 16, 8, S, Feature::Sse2, "llvm.x86.sse2.pmaxs.w", NativeKind::Max(SECOND)),
    row(N::Max, 8, 16, S, Feature::Sse41, "llvm.x86.sse41.pmaxsb", NativeKind::Max(SECOND)),
    row(N::Max, 16, 8, U, Feature::Sse41, "llvm.x86.sse41.pmaxuw", NativeKind::Max(SECOND)),
    row(N::Max, 32, 4, U, Feature::Sse41, "llvm.x86.sse41.pmaxud", NativeKind::Max(SECOND)),
    row(N::Max, 32, 4, S, Feature::Sse41, "llvm.x86.sse41.pmaxsd", NativeKind::Max(SECOND)),
    row(N::Max, 8, 16, U, Feature::Altivec, "llvm.ppc.altivec.vmaxub", NativeKind::Max(SECOND)),
    row(N::Max, 8, 16, S, Feature::Altivec, "llvm.ppc.altivec.vmaxsb", NativeKind::Max(SECOND)),
    row(N::Max, 16, 8, U, Feature::Altivec, "llvm.ppc.altivec.vmaxuh", NativeKind::Max(SECOND)),
    row(N::Max, 16, 8, S, Feature::Altivec, "llvm.ppc.altivec.vmaxsh", NativeKind::Max(SECOND)),
    row(N::Max, 32, 4, U, Feature::Altivec, "llvm.ppc.altivec.vmaxuw", NativeKind::Max(SECOND)),
    row(N::Max, 32, 4, S, Feature::Altivec, "llvm.ppc.altivec.vmaxsw", NativeKind::Max(SECOND)),
    // Rounding
    row(N::Round, 32, 1, F, Feature::Sse41, "llvm.x86.sse41.round.ss", NEAREST),
    row(N::Round, 32, 4, F, Feature::Sse41, "llvm.x86.sse41.round.ps", NEAREST),
    row(N::Round, 64, 1, F, Feature::Sse41, "llvm.x86.sse41.round.sd", NEAREST),
    row(N::Round, 64, 2, F, Feature::Sse41, "llvm.x86.sse41.round.pd", NEAREST),
    row(N::Round, 32, 8, F, Feature::Avx, "llvm.x86.avx.round.ps.256", NEAREST),
    row(N::Round, 64, 4, F, Feature::Avx, "llvm.x86.avx.round.pd.256", NEAREST),
    row(N::Round, 32, 16, F, Feature::Avx512f, "llvm.x86.avx512.mask.rndscale.ps.512", NEAREST),
    row(N::Round, 64, 8, F, Feature::Avx512f, "llvm.x86.avx512.mask.rndscale.pd.512", NEAREST),
    row(N::Round, 32, 4, F, Feature::Altivec, "llvm.ppc.altivec.vrfi", NEAREST),
    row(N::Round, 32, 4, F, Feature::Neon, "llvm.aarch64.neon.frint.v4f32", NEAREST),
    row(N::Round, 64, 2, F, Feature::Neon, "llvm.aarch64.neon.frint.v2f64", NEAREST),
    row(N::Round, 32, 4, F, Feature::ZVector, "llvm.s390.vfisb", NEAREST),
    row(N::Round, 64, 2, F, Feature::ZVector, "llvm.s390.vfidb", NEAREST),
    // Approximate reciprocals
    row(N::RcpApprox, 32, 4, F, Feature::Sse, "llvm.x86.sse.rcp.ps", NativeKind::RcpApprox),
    row(N::RcpApprox, 32, 8, F, Feature::Avx, "llvm.x86.avx.rcp.ps.256", NativeKind::RcpApprox),
    row(N::RsqrtApprox, 32, 4, F, Feature::Sse, "llvm.x86.sse.rsqrt.ps", NativeKind::RsqrtApprox),
    row(N::RsqrtApprox, 32, 8, F, Feature::Avx, "llvm.x86.avx.rsqrt.ps.256", NativeKind::RsqrtApprox),
    // Horizontal add
    row(N::HorizontalAdd, 32, 4, F, Feature::Sse3, "llvm.x86.sse3.hadd.ps", NativeKind::HorizontalAdd),
    row(N::HorizontalAdd, 32, 8, F, Feature::Avx, "llvm.x86.avx.hadd.ps.256", NativeKind::HorizontalAdd),
    // Rounding high multiply
    row(N::MulHiRound, 16, 8, S, Feature::Ssse3, "llvm.x86.ssse3.pmul.hr.sw.128", NativeKind::MulHiRound),
    row(N::MulHiRound, 16, 16, S, Feature::Avx2, "llvm.x86.avx2.pmul.hr.sw", NativeKind::MulHiRound),
    // Integer abs
    row(N::Abs, 8, 16, S, Feature::Ssse3, "llvm.x86.ssse3.pabs.b.128", NativeKind::Abs),
    row(N::Abs, 16, 8, S, Feature::Ssse3, "llvm.x86.ssse3.pabs.w.128", NativeKind::Abs),
    row(N::Abs, 32, 4, S, Feature::Ssse3, "llvm.x86.ssse3.pabs.d.128", NativeKind::Abs),
    row(N::Abs, 8, 32, S, Feature::Avx2, "llvm.x86.avx2.pabs.b", NativeKind::Abs),
    row(N::Abs, 16, 16, S, Feature::Avx2, "llvm.x86.avx2.pabs.w", NativeKind::Abs),
    row(N::Abs, 32, 8, S, Feature::Avx2, "llvm.x86.avx2.pabs.d", NativeKind::Abs),
    // Saturating pack
    row(N::PackSaturate, 16, 8, U, Feature::Sse2, "llvm.x86.sse2.packuswb.128", NativeKind::PackSaturate),
    row(N::PackSaturate, 16, 8, S, Feature::Sse2, "llvm.x86.sse2.packsswb.128", NativeKind::PackSaturate),
    row(N::PackSaturate, 32, 4, S, Feature::Sse2, "llvm.x86.sse2.packssdw.128", NativeKind::PackSaturate),
    row(N::PackSaturate, 32, 4, U, Feature::Sse41, "llvm.x86.sse41.packusdw", NativeKind::PackSaturate),
    row(N::PackSaturate, 16, 16, U, Feature::Avx2, "llvm.x86.avx2.packuswb", NativeKind::PackSaturate),
    row(N::PackSaturate, 16, 16, S, Feature::Avx2, "llvm.x86.avx2.packsswb", NativeKind::PackSaturate),
    row(N::PackSaturate, 32, 8, S, Feature::Avx2, "llvm.x86.avx2.packssdw", NativeKind::PackSaturate),
    row(N::PackSaturate, 32, 8, U, Feature::Avx2, "llvm.x86.avx2.packusdw", NativeKind::PackSaturate),
    // Float to int, round to nearest
    row(N::ConvertNearest, 32, 1, F, Feature::Sse, "llvm.x86.sse.cvtss2si", NativeKind::ConvertNearest),
    row(N::ConvertNearest, 32, 4, F, Feature::Sse2, "llvm.x86.sse2.cvtps2dq", NativeKind::ConvertNearest),
    row(N::ConvertNearest, 32, 8, F, Feature::Avx, "llvm.x86.avx.cvt.ps2dq.256", NativeKind::ConvertNearest),
    // Half-precision transcendentals
    row(N::Exp2, 16, 8, F, Feature::NeonFp16, "llvm.exp2.v8f16", NativeKind::Exp2),
    row(N::Log2, 16, 8, F, Feature::NeonFp16, "llvm.log2.v8f16", NativeKind::Log2),
    row(N::Sin, 16, 8, F, Feature::NeonFp16, "llvm.sin.v8f16", NativeKind::Sin),
    row(N::Cos, 16, 8, F, Feature::NeonFp16, "llvm.cos.v8f16", NativeKind::Cos),
];

/// Pick the native row for `op` on `ty`, if the target has one.
///
/// Among rows for the lane format whose feature is present:
///
/// 1. a row whose register width equals the logical width wins;
/// 2. otherwise the widest row that evenly divides the logical width;
/// 3. otherwise the narrowest row wider than the logical width.
#[must_use]
pub fn lookup(caps: &dyn Capabilities, op: NativeOperation, ty: VectorType) -> Option<&'static NativeRow> {
    lookup_as(caps, op, ty, ty.sign_kind())
}

/// [`lookup`] with an explicit lane interpretation.
#[must_use]
pub fn lookup_as(
    caps: &dyn Capabilities,
    op: NativeOperation,
    ty: VectorType,
    sign: SignKind,
) -> Option<&'static NativeRow> {
    let logical = ty.total_bits();
    let candidates = || {
        NATIVE_TABLE
            .iter()
            .filter(move |r| r.op == op && r.width == ty.width && r.sign == sign)
            .filter(|r| caps.has(r.feature))
    };

    let found = candidates()
        .find(|r| r.bits() == logical)
        .or_else(|| {
            candidates()
                .filter(|r| r.bits() < logical && logical % r.bits() == 0)
                .max_by_key(|r| r.bits())
        })
        .or_else(|| {
            candidates()
                .filter(|r| r.bits() > logical)
                .min_by_key(|r| r.bits())
        });
    if let Some(r) = found {
        tracing::trace!(?op, %ty, name = r.name, "native row");
    }
    found
}

/// Exact-width row lookup, for operations that cannot be split or padded.
#[must_use]
pub fn lookup_exact(
    caps: &dyn Capabilities,
    op: NativeOperation,
    ty: VectorType,
    sign: SignKind,
) -> Option<&'static NativeRow> {
    NATIVE_TABLE.iter().find(|r| {
        r.op == op
            && r.width == ty.width
            && r.lanes == ty.length
            && r.sign == sign
            && caps.has(r.feature)
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use veclow_target::FeatureSet;

    #[test]
    fn test_exact_width_preferred() {
        let caps = FeatureSet::X86_64_V3;
        let row = lookup(&caps, NativeOperation::Min, VectorType::VEC8F32).unwrap();
        assert_eq!(row.name, "llvm.x86.avx.min.ps.256");
        let row = lookup(&caps, NativeOperation::Min, VectorType::VEC4F32).unwrap();
        assert_eq!(row.name, "llvm.x86.sse.min.ps");
    }

    #[test]
    fn test_split_and_pad() {
        let caps = FeatureSet::X86_64_V1;
        // 512 bits on SSE: split into 128-bit pieces.
        let row = lookup(&caps, NativeOperation::SatAdd, VectorType::unorm(8, 64)).unwrap();
        assert_eq!(row.bits(), 128);
        // 64 bits on SSE: pad to 128.
        let row = lookup(&caps, NativeOperation::SatAdd, VectorType::unorm(8, 8)).unwrap();
        assert_eq!(row.bits(), 128);
    }

    #[test]
    fn test_missing_feature() {
        let caps = FeatureSet::X86_64_V1;
        assert!(lookup(&caps, NativeOperation::Round, VectorType::VEC4F32).is_none());
        let caps = FeatureSet::X86_64_V2;
        assert!(lookup(&caps, NativeOperation::Round, VectorType::VEC4F32).is_some());
    }

    #[test]
    fn test_sign_kind_is_part_of_key() {
        let caps = FeatureSet::X86_64_V1;
        // pminsb needs SSE4.1.
        assert!(lookup(&caps, NativeOperation::Min, VectorType::int(8, 16)).is_none());
        assert!(lookup(&caps, NativeOperation::Min, VectorType::uint(8, 16)).is_some());
    }

    #[test]
    fn test_exact_lookup() {
        let caps = FeatureSet::X86_64_V3;
        let row = lookup_exact(&caps, NativeOperation::PackSaturate, VectorType::int(16, 8), SignKind::Unsigned);
        assert_eq!(row.map(|r| r.name), Some("llvm.x86.sse2.packuswb.128"));
        assert!(lookup_exact(&caps, NativeOperation::PackSaturate, VectorType::int(16, 4), SignKind::Unsigned).is_none());
    }

    #[test]
    fn test_table_rows_are_well_formed() {
        for r in NATIVE_TABLE {
            assert!(r.lanes.is_power_of_two(), "{}", r.name);
            assert!(matches!(r.width, 8 | 16 | 32 | 64), "{}", r.name);
            if r.sign == SignKind::Float {
                assert!(r.width >= 16, "{}", r.name);
            }
        }
    }
}
