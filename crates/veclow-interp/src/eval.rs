//! Lane-wise evaluation of every [`Op`].

use crate::lanes::{
    approximate, float_to_int, from_float, from_signed, mask, saturate, to_float, to_int,
    to_signed,
};
use crate::Lanes;
use veclow_ir::{BinOp, CmpOp, Convert, NativeKind, NativeNan, Op, RoundingMode, UnOp, VectorType};

/// Quiet NaN used when an operation has to invent one.
fn nan(width: u32) -> u64 {
    from_float(f64::NAN, width)
}

/// Evaluate `op` producing a value of type `ty` from `args`.
///
/// `arg_tys` holds the type each argument was created with.
pub(crate) fn evaluate(op: Op, ty: VectorType, args: &[&Lanes], arg_tys: &[VectorType]) -> Lanes {
    match op {
        Op::Bin(bin) => zip2(args, |a, b| binary(bin, ty, a, b)),
        Op::Un(un) => map1(args, |a| unary(un, ty, a)),
        Op::Cmp { op, ordered } => {
            let src = arg_tys[0];
            zip2(args, |a, b| {
                if compare(op, ordered, src, a, b) {
                    mask(ty.width)
                } else {
                    0
                }
            })
        }
        Op::Select => args[0]
            .iter()
            .zip(args[1].iter().zip(args[2].iter()))
            .map(|(&m, (&a, &b))| if m != 0 { a } else { b })
            .collect(),
        Op::MulAdd => args[0]
            .iter()
            .zip(args[1].iter().zip(args[2].iter()))
            .map(|(&a, (&b, &c))| {
                if ty.floating {
                    let w = ty.width;
                    from_float(to_float(a, w).mul_add(to_float(b, w), to_float(c, w)), w)
                } else {
                    a.wrapping_mul(b).wrapping_add(c) & mask(ty.width)
                }
            })
            .collect(),
        Op::Convert(conv) => convert(conv, ty, args[0], arg_tys[0]),
        Op::Native(native) => self::native(native.kind, ty, args, arg_tys),
    }
}

fn map1(args: &[&Lanes], f: impl Fn(u64) -> u64) -> Lanes {
    args[0].iter().map(|&a| f(a)).collect()
}

fn zip2(args: &[&Lanes], f: impl Fn(u64, u64) -> u64) -> Lanes {
    args[0]
        .iter()
        .zip(args[1].iter())
        .map(|(&a, &b)| f(a, b))
        .collect()
}

fn binary(op: BinOp, ty: VectorType, a: u64, b: u64) -> u64 {
    let w = ty.width;
    let m = mask(w);
    if ty.floating && !matches!(op, BinOp::And | BinOp::Or | BinOp::Xor | BinOp::Shl | BinOp::Shr) {
        let (x, y) = (to_float(a, w), to_float(b, w));
        let r = match op {
            BinOp::Add => x + y,
            BinOp::Sub => x - y,
            BinOp::Mul => x * y,
            BinOp::Div => x / y,
            _ => x % y,
        };
        return from_float(r, w);
    }
    match op {
        BinOp::Add => a.wrapping_add(b) & m,
        BinOp::Sub => a.wrapping_sub(b) & m,
        BinOp::Mul => a.wrapping_mul(b) & m,
        BinOp::Div | BinOp::Rem => {
            // Division by zero is undefined in generated code; fold it to zero.
            if b == 0 {
                return 0;
            }
            if ty.sign {
                let (x, y) = (to_signed(a, w), to_signed(b, w));
                let r = if op == BinOp::Div {
                    x.wrapping_div(y)
                } else {
                    x.wrapping_rem(y)
                };
                from_signed(r, w)
            } else if op == BinOp::Div {
                a / b
            } else {
                a % b
            }
        }
        BinOp::And => a & b,
        BinOp::Or => a | b,
        BinOp::Xor => a ^ b,
        BinOp::Shl => {
            if b >= u64::from(w) {
                0
            } else {
                (a << b) & m
            }
        }
        BinOp::Shr => {
            let shift = b.min(u64::from(w) - 1);
            if ty.sign {
                from_signed(to_signed(a, w) >> shift, w)
            } else if b >= u64::from(w) {
                0
            } else {
                a >> shift
            }
        }
    }
}

fn round(mode: RoundingMode, x: f64) -> f64 {
    match mode {
        RoundingMode::Nearest => x.round_ties_even(),
        RoundingMode::Floor => x.floor(),
        RoundingMode::Ceil => x.ceil(),
        RoundingMode::Truncate => x.trunc(),
    }
}

fn unary(op: UnOp, ty: VectorType, a: u64) -> u64 {
    let w = ty.width;
    match op {
        UnOp::Not => !a & mask(w),
        UnOp::Neg if ty.floating => a ^ ty.sign_mask(),
        UnOp::Neg => a.wrapping_neg() & mask(w),
        UnOp::Abs if ty.floating => a & !ty.sign_mask(),
        UnOp::Abs => from_signed(to_signed(a, w).wrapping_abs(), w),
        UnOp::Sqrt => from_float(to_float(a, w).sqrt(), w),
        UnOp::Round(mode) => from_float(round(mode, to_float(a, w)), w),
    }
}

fn compare(op: CmpOp, ordered: bool, ty: VectorType, a: u64, b: u64) -> bool {
    use std::cmp::Ordering;

    let ord = if ty.floating {
        let (x, y) = (to_float(a, ty.width), to_float(b, ty.width));
        match x.partial_cmp(&y) {
            Some(ord) => ord,
            None => return !ordered,
        }
    } else {
        to_int(a, ty).cmp(&to_int(b, ty))
    };
    match op {
        CmpOp::Eq => ord == Ordering::Equal,
        CmpOp::Ne => ord != Ordering::Equal,
        CmpOp::Lt => ord == Ordering::Less,
        CmpOp::Le => ord != Ordering::Greater,
        CmpOp::Gt => ord == Ordering::Greater,
        CmpOp::Ge => ord != Ordering::Less,
    }
}

fn convert(conv: Convert, ty: VectorType, src: &Lanes, src_ty: VectorType) -> Lanes {
    match conv {
        Convert::FloatToInt => src
            .iter()
            .map(|&a| float_to_int(to_float(a, src_ty.width), ty.width))
            .collect(),
        Convert::IntToFloat => src
            .iter()
            .map(|&a| {
                let value = if src_ty.sign {
                    to_signed(a, src_ty.width) as f64
                } else {
                    a as f64
                };
                from_float(value, ty.width)
            })
            .collect(),
        Convert::Bitcast => {
            let bytes = crate::lanes::to_bytes(src, src_ty.width);
            crate::lanes::from_bytes(&bytes, ty.width).into_iter().collect()
        }
    }
}

fn float_min_max(nan_rule: NativeNan, is_min: bool, ty: VectorType, a: u64, b: u64) -> u64 {
    let w = ty.width;
    let (x, y) = (to_float(a, w), to_float(b, w));
    let pick_a = if is_min { x < y } else { x > y };
    match nan_rule {
        NativeNan::ReturnSecond => {
            if pick_a {
                a
            } else {
                b
            }
        }
        NativeNan::ReturnNumber => {
            if x.is_nan() {
                b
            } else if y.is_nan() || pick_a {
                a
            } else {
                b
            }
        }
        NativeNan::Propagate => {
            if x.is_nan() || y.is_nan() {
                nan(w)
            } else if pick_a {
                a
            } else {
                b
            }
        }
    }
}

fn native(kind: NativeKind, ty: VectorType, args: &[&Lanes], arg_tys: &[VectorType]) -> Lanes {
    let w = ty.width;
    match kind {
        NativeKind::SatAdd => zip2(args, |a, b| saturate(to_int(a, ty) + to_int(b, ty), ty)),
        NativeKind::SatSub => zip2(args, |a, b| saturate(to_int(a, ty) - to_int(b, ty), ty)),
        NativeKind::Min(rule) | NativeKind::Max(rule) => {
            let is_min = matches!(kind, NativeKind::Min(_));
            zip2(args, |a, b| {
                if ty.floating {
                    float_min_max(rule, is_min, ty, a, b)
                } else {
                    let pick_a = if is_min {
                        to_int(a, ty) < to_int(b, ty)
                    } else {
                        to_int(a, ty) > to_int(b, ty)
                    };
                    if pick_a {
                        a
                    } else {
                        b
                    }
                }
            })
        }
        NativeKind::Round(mode) => map1(args, |a| from_float(round(mode, to_float(a, w)), w)),
        NativeKind::RcpApprox => map1(args, |a| approximate(1.0 / to_float(a, w), w, 12)),
        NativeKind::RsqrtApprox => {
            map1(args, |a| approximate(1.0 / to_float(a, w).sqrt(), w, 12))
        }
        NativeKind::HorizontalAdd => {
            // Pairs of `a` then pairs of `b`, per 128-bit block.
            let block = ((128 / w) as usize).min(args[0].len()).max(2);
            let mut out = Lanes::new();
            for (a, b) in args[0].chunks(block).zip(args[1].chunks(block)) {
                for pair in a.chunks(2).chain(b.chunks(2)) {
                    let sum = to_float(pair[0], w) + to_float(pair[1], w);
                    out.push(from_float(sum, w));
                }
            }
            out
        }
        NativeKind::MulHiRound => zip2(args, |a, b| {
            let product = to_signed(a, 16) * to_signed(b, 16);
            from_signed((product + 0x4000) >> 15, 16)
        }),
        NativeKind::Abs => map1(args, |a| from_signed(to_signed(a, w).wrapping_abs(), w)),
        NativeKind::PackSaturate => pack_saturate(ty, args, arg_tys[0]),
        NativeKind::ConvertNearest => map1(args, |a| {
            float_to_int(to_float(a, arg_tys[0].width).round_ties_even(), w)
        }),
        NativeKind::Exp2 => map1(args, |a| from_float(to_float(a, w).exp2(), w)),
        NativeKind::Log2 => map1(args, |a| from_float(to_float(a, w).log2(), w)),
        NativeKind::Sin => map1(args, |a| from_float(to_float(a, w).sin(), w)),
        NativeKind::Cos => map1(args, |a| from_float(to_float(a, w).cos(), w)),
    }
}

/// Narrow `lo` and `hi`, saturating each signed source lane to `ty`.
///
/// Sources wider than 128 bits are packed per 128-bit half, the way x86
/// packs behave.
fn pack_saturate(ty: VectorType, args: &[&Lanes], src_ty: VectorType) -> Lanes {
    let narrow = |lane: u64| saturate(i128::from(to_signed(lane, src_ty.width)), ty);
    let per_block = (128 / src_ty.width) as usize;
    let block = per_block.min(args[0].len()).max(1);
    let mut out = Lanes::new();
    for (lo, hi) in args[0].chunks(block).zip(args[1].chunks(block)) {
        out.extend(lo.iter().map(|&l| narrow(l)));
        out.extend(hi.iter().map(|&h| narrow(h)));
    }
    out
}
