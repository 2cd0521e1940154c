//! Lane-level numeric helpers.
//!
//! Lanes are stored as raw bits in a `u64`, masked to the lane width.
//! Floats are widened to `f64` for arithmetic; for 16- and 32-bit lanes the
//! single rounding back to the lane format gives the correctly rounded
//! result for the basic operations.

use half::f16;
use veclow_ir::VectorType;

pub(crate) fn mask(width: u32) -> u64 {
    if width >= 64 {
        u64::MAX
    } else {
        (1u64 << width) - 1
    }
}

pub(crate) fn to_signed(bits: u64, width: u32) -> i64 {
    if width >= 64 {
        bits as i64
    } else {
        let shift = 64 - width;
        ((bits << shift) as i64) >> shift
    }
}

pub(crate) fn from_signed(value: i64, width: u32) -> u64 {
    (value as u64) & mask(width)
}

pub(crate) fn to_float(bits: u64, width: u32) -> f64 {
    match width {
        16 => f16::from_bits(bits as u16).to_f64(),
        32 => f64::from(f32::from_bits(bits as u32)),
        _ => f64::from_bits(bits),
    }
}

pub(crate) fn from_float(value: f64, width: u32) -> u64 {
    match width {
        16 => u64::from(f16::from_f64(value).to_bits()),
        32 => u64::from((value as f32).to_bits()),
        _ => value.to_bits(),
    }
}

/// Integer value of a lane, sign-extended when the type is signed.
pub(crate) fn to_int(bits: u64, ty: VectorType) -> i128 {
    if ty.sign {
        i128::from(to_signed(bits, ty.width))
    } else {
        i128::from(bits)
    }
}

/// Clamp an integer into the lane range of `ty` and encode it.
pub(crate) fn saturate(value: i128, ty: VectorType) -> u64 {
    let (lo, hi) = if ty.sign {
        (
            i128::from(to_signed(1 << (ty.width - 1), ty.width)),
            i128::from(mask(ty.width - 1)),
        )
    } else {
        (0, i128::from(mask(ty.width)))
    };
    (value.clamp(lo, hi) as u64) & mask(ty.width)
}

/// x86 "integer indefinite" conversion: NaN and out-of-range inputs give
/// the minimum signed value.
pub(crate) fn float_to_int(value: f64, width: u32) -> u64 {
    let limit = 2f64.powi(width as i32 - 1);
    if value.is_nan() || value >= limit || value < -limit {
        1u64 << (width - 1)
    } else {
        from_signed(value as i64, width)
    }
}

/// Keep the top `bits` mantissa bits of an `f32`, modelling an approximate
/// hardware estimate.
pub(crate) fn approximate(value: f64, width: u32, bits: u32) -> u64 {
    let exact = from_float(value, width);
    if width != 32 {
        return exact;
    }
    let dropped = 23 - bits;
    exact & !((1u64 << dropped) - 1)
}

/// Split a register into bytes, lowest lane first.
pub(crate) fn to_bytes(lanes: &[u64], width: u32) -> Vec<u8> {
    let lane_bytes = (width / 8) as usize;
    lanes
        .iter()
        .flat_map(|lane| lane.to_le_bytes().into_iter().take(lane_bytes))
        .collect()
}

/// Reassemble a register from bytes, lowest lane first.
pub(crate) fn from_bytes(bytes: &[u8], width: u32) -> Vec<u64> {
    let lane_bytes = (width / 8) as usize;
    bytes
        .chunks(lane_bytes)
        .map(|chunk| {
            let mut buf = [0u8; 8];
            buf[..chunk.len()].copy_from_slice(chunk);
            u64::from_le_bytes(buf)
        })
        .collect()
}
