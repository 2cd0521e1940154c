//! End-to-end lowering scenarios, evaluated on the reference emitter.

use std::cell::RefCell;

use proptest::prelude::*;
use veclow_codegen::{
    LerpFlags, LowerConfig, LoweringContext, NanBehavior, PerfLog, PerfNote, TracingPerfLog,
};
use veclow_interp::Interpreter;
use veclow_ir::VectorType;
use veclow_target::FeatureSet;

fn init_tracing() {
    let _ = tracing_subscriber::fmt()
        .with_env_filter(tracing_subscriber::EnvFilter::from_default_env())
        .with_test_writer()
        .try_init();
}

/// Every capability level the tests run against.
const LEVELS: [FeatureSet; 4] = [
    FeatureSet::empty(),
    FeatureSet::X86_64_V1,
    FeatureSet::X86_64_V2,
    FeatureSet::X86_64_V3,
];

#[test]
fn test_lerp_unorm8_midpoint() {
    init_tracing();
    let ty = VectorType::VEC16UNORM8;
    for caps in LEVELS {
        let mut interp = Interpreter::new();
        let x = interp.input_u64(ty, &[128; 16]);
        let v0 = interp.input_u64(ty, &[0; 16]);
        let v1 = interp.input_u64(ty, &[255; 16]);
        let mut ctx = LoweringContext::new(&mut interp, &caps, ty).unwrap();
        let r = ctx.lerp(x, v0, v1, LerpFlags::default()).unwrap();
        drop(ctx);
        for lane in interp.lanes_u64(r) {
            assert!(lane.abs_diff(128) <= 1, "{caps}: {lane}");
        }
    }
}

#[test]
fn test_mul_unorm8_full_scale() {
    let ty = VectorType::unorm(8, 4);
    for caps in LEVELS {
        let mut interp = Interpreter::new();
        let a = interp.input_u64(ty, &[255; 4]);
        let b = interp.input_u64(ty, &[255; 4]);
        let mut ctx = LoweringContext::new(&mut interp, &caps, ty).unwrap();
        let r = ctx.mul(a, b).unwrap();
        drop(ctx);
        assert_eq!(interp.lanes_u64(r), vec![255; 4], "{caps}");
    }
}

#[test]
fn test_exp2_log2_identities() {
    let ty = VectorType::VEC4F32;
    for caps in LEVELS {
        let mut interp = Interpreter::new();
        let zero = interp.input_f32(ty, &[0.0; 4]);
        let one = interp.input_f32(ty, &[1.0; 4]);
        let mut ctx = LoweringContext::new(&mut interp, &caps, ty).unwrap();
        let e = ctx.exp2(zero).unwrap();
        let l = ctx.log2(one).unwrap();
        drop(ctx);
        assert_eq!(interp.lanes_f32(e), vec![1.0; 4], "{caps}");
        assert_eq!(interp.lanes_f32(l), vec![0.0; 4], "{caps}");
    }
}

#[test]
fn test_log2_safe_edges() {
    let ty = VectorType::VEC4F32;
    let mut interp = Interpreter::new();
    let x = interp.input_f32(ty, &[0.0, -1.0, f32::INFINITY, 8.0]);
    let caps = FeatureSet::X86_64_V3;
    let mut ctx = LoweringContext::new(&mut interp, &caps, ty).unwrap();
    let r = ctx.log2_safe(x).unwrap();
    drop(ctx);
    let lanes = interp.lanes_f32(r);
    assert_eq!(lanes[0], f32::NEG_INFINITY);
    assert!(lanes[1].is_nan());
    assert_eq!(lanes[2], f32::INFINITY);
    assert!((lanes[3] - 3.0).abs() < 1e-5);
}

#[test]
fn test_pow_zero_base() {
    let ty = VectorType::VEC4F32;
    let mut interp = Interpreter::new();
    let x = interp.input_f32(ty, &[0.0; 4]);
    let y = interp.input_f32(ty, &[0.0, 1.0, 2.5, -3.0]);
    let caps = FeatureSet::X86_64_V1;
    let mut ctx = LoweringContext::new(&mut interp, &caps, ty).unwrap();
    let r = ctx.pow(x, y).unwrap();
    drop(ctx);
    assert_eq!(interp.lanes_f32(r), vec![0.0; 4]);
}

#[test]
fn test_sin_non_finite_and_accuracy() {
    let ty = VectorType::VEC8F32;
    let half_pi = std::f32::consts::FRAC_PI_2;
    let xs = [f32::INFINITY, f32::NAN, f32::NEG_INFINITY, -half_pi, -0.7, 0.0, 0.3, half_pi];
    for caps in LEVELS {
        let mut interp = Interpreter::new();
        let a = interp.input_f32(ty, &xs);
        let mut ctx = LoweringContext::new(&mut interp, &caps, ty).unwrap();
        let r = ctx.sin(a).unwrap();
        drop(ctx);
        let lanes = interp.lanes_f32(r);
        assert!(lanes[..3].iter().all(|v| v.is_nan()), "{caps}: {lanes:?}");
        for (&got, &x) in lanes[3..].iter().zip(&xs[3..]) {
            let want = f64::from(x).sin();
            assert!((f64::from(got) - want).abs() < 2e-6, "{caps}: sin({x}) = {got}");
        }
    }
}

#[test]
fn test_horizontal_add_scenario() {
    let ty = VectorType::VEC4F32;
    let mut interp = Interpreter::new();
    let a = interp.input_f32(ty, &[1.0, 2.0, 3.0, 4.0]);
    let caps = FeatureSet::X86_64_V2;
    let mut ctx = LoweringContext::new(&mut interp, &caps, ty).unwrap();
    let r = ctx.horizontal_add(a).unwrap();
    drop(ctx);
    assert_eq!(interp.lanes_f32(r), vec![10.0]);
}

#[test]
fn test_min_nan_behaviors_agree_on_numbers() {
    let ty = VectorType::VEC4F32;
    let behaviors = [
        NanBehavior::ReturnOther,
        NanBehavior::ReturnOtherSecondNonNan,
        NanBehavior::ReturnNanFirstNonNan,
        NanBehavior::Undefined,
    ];
    for caps in LEVELS {
        for nan in behaviors {
            let mut interp = Interpreter::new();
            let a = interp.input_f32(ty, &[3.0, 5.0, -1.0, 0.5]);
            let b = interp.input_f32(ty, &[5.0, 3.0, -2.0, 0.5]);
            let mut ctx = LoweringContext::new(&mut interp, &caps, ty).unwrap();
            let r = ctx.min_ext(a, b, nan).unwrap();
            drop(ctx);
            assert_eq!(interp.lanes_f32(r), vec![3.0, 3.0, -2.0, 0.5], "{caps} {nan:?}");
        }
    }
}

#[test]
fn test_min_return_other_skips_nan() {
    let ty = VectorType::VEC4F32;
    for caps in LEVELS {
        let mut interp = Interpreter::new();
        let a = interp.input_f32(ty, &[f32::NAN, 5.0, f32::NAN, 1.0]);
        let b = interp.input_f32(ty, &[5.0, f32::NAN, f32::NAN, 2.0]);
        let mut ctx = LoweringContext::new(&mut interp, &caps, ty).unwrap();
        let r = ctx.min_ext(a, b, NanBehavior::ReturnOther).unwrap();
        drop(ctx);
        let lanes = interp.lanes_f32(r);
        assert_eq!([lanes[0], lanes[1], lanes[3]], [5.0, 5.0, 1.0], "{caps}");
        assert!(lanes[2].is_nan());
    }
}

struct Collect(RefCell<Vec<PerfNote>>);

impl PerfLog for Collect {
    fn note(&self, note: PerfNote) {
        self.0.borrow_mut().push(note);
    }
}

#[test]
fn test_constant_inputs_are_reported() {
    let ty = VectorType::VEC4F32;
    let mut interp = Interpreter::new();
    let caps = FeatureSet::empty();
    let log = Collect(RefCell::new(Vec::new()));
    let mut ctx = LoweringContext::new(&mut interp, &caps, ty)
        .unwrap()
        .with_perf_log(&log);
    let x = ctx.splat(1.5);
    ctx.exp2(x).unwrap();
    drop(ctx);
    let notes = log.0.borrow();
    assert!(notes.iter().any(|n| n.op == "exp2"), "{notes:?}");
}

#[test]
fn test_tracing_perf_log_accepts_notes() {
    init_tracing();
    let ty = VectorType::VEC4F32;
    let mut interp = Interpreter::new();
    let caps = FeatureSet::empty();
    let log = TracingPerfLog;
    let mut ctx = LoweringContext::new(&mut interp, &caps, ty)
        .unwrap()
        .with_perf_log(&log);
    let a = ctx.splat(2.0);
    let b = ctx.splat(3.0);
    let r = ctx.add(a, b).unwrap();
    drop(ctx);
    assert_eq!(interp.lanes_f32(r), vec![5.0; 4]);
}

#[test]
fn test_config_round_trips_through_json() {
    let config = LowerConfig::default()
        .with_exp2_degree(3)
        .with_fast_rcp(true);
    let text = serde_json::to_string(&config).unwrap();
    let back: LowerConfig = serde_json::from_str(&text).unwrap();
    assert_eq!(back, config);

    let partial: LowerConfig = serde_json::from_str(r#"{"fast_rsqrt": true}"#).unwrap();
    assert!(partial.fast_rsqrt);
    assert_eq!(partial.exp2_degree, LowerConfig::default().exp2_degree);
}

/// Unsigned normalized shapes lerp is checked on, with the target each
/// one runs against.
fn lerp_shapes() -> [(VectorType, FeatureSet); 6] {
    [
        (VectorType::VEC16UNORM8, FeatureSet::empty()),
        (VectorType::VEC16UNORM8, FeatureSet::X86_64_V2),
        (VectorType::unorm(16, 8), FeatureSet::X86_64_V2),
        (VectorType::unorm(32, 4), FeatureSet::X86_64_V1),
        (VectorType::unorm(8, 4), FeatureSet::X86_64_V1),
        (VectorType::unorm(8, 32), FeatureSet::X86_64_V3),
    ]
}

fn unorm8() -> impl Strategy<Value = Vec<u64>> {
    prop::collection::vec(0u64..=255, 16)
}

proptest! {
    #[test]
    fn prop_unorm8_add_saturates(a in unorm8(), b in unorm8(), level in 0usize..4) {
        let ty = VectorType::VEC16UNORM8;
        let caps = LEVELS[level];
        let mut interp = Interpreter::new();
        let va = interp.input_u64(ty, &a);
        let vb = interp.input_u64(ty, &b);
        let mut ctx = LoweringContext::new(&mut interp, &caps, ty).unwrap();
        let sum = ctx.add(va, vb).unwrap();
        let diff = ctx.sub(va, va).unwrap();
        drop(ctx);
        let want: Vec<u64> = a.iter().zip(&b).map(|(x, y)| (x + y).min(255)).collect();
        prop_assert_eq!(interp.lanes_u64(sum), want);
        prop_assert_eq!(interp.lanes_u64(diff), vec![0; 16]);
    }

    #[test]
    fn prop_lerp_endpoints(
        raw0 in prop::collection::vec(any::<u64>(), 32),
        raw1 in prop::collection::vec(any::<u64>(), 32),
        shape in 0usize..6,
    ) {
        let (ty, caps) = lerp_shapes()[shape];
        let mask = ty.lane_mask();
        let len = ty.length as usize;
        let v0: Vec<u64> = raw0[..len].iter().map(|v| v & mask).collect();
        let v1: Vec<u64> = raw1[..len].iter().map(|v| v & mask).collect();
        let mut interp = Interpreter::new();
        let a = interp.input_u64(ty, &v0);
        let b = interp.input_u64(ty, &v1);
        let mut ctx = LoweringContext::new(&mut interp, &caps, ty).unwrap();
        let zero = ctx.zero();
        let one = ctx.one();
        let at0 = ctx.lerp(zero, a, b, LerpFlags::default()).unwrap();
        let at1 = ctx.lerp(one, a, b, LerpFlags::default()).unwrap();
        drop(ctx);
        for (got, want) in interp.lanes_u64(at0).iter().zip(&v0) {
            prop_assert!(got.abs_diff(*want) <= 1, "{}: {} vs {}", ty, got, want);
        }
        for (got, want) in interp.lanes_u64(at1).iter().zip(&v1) {
            prop_assert!(got.abs_diff(*want) <= 1, "{}: {} vs {}", ty, got, want);
        }
    }

    #[test]
    fn prop_unpack_pack_round_trip(lanes in prop::collection::vec(0u64..=255, 16)) {
        let src = VectorType::uint(8, 16);
        let dst = VectorType::uint(16, 8);
        let caps = FeatureSet::X86_64_V1;
        let mut interp = Interpreter::new();
        let a = interp.input_u64(src, &lanes);
        let mut ctx = LoweringContext::new(&mut interp, &caps, src).unwrap();
        let wide = ctx.unpack(src, dst, a).unwrap();
        let back = ctx.pack(dst, src, &wide, false).unwrap();
        drop(ctx);
        prop_assert_eq!(interp.lanes_u64(back), lanes);
    }

    #[test]
    fn prop_floor_matches_std(xs in prop::collection::vec(-1.0e6f32..1.0e6, 8), level in 0usize..4) {
        let ty = VectorType::VEC8F32;
        let caps = LEVELS[level];
        let mut interp = Interpreter::new();
        let a = interp.input_f32(ty, &xs);
        let mut ctx = LoweringContext::new(&mut interp, &caps, ty).unwrap();
        let r = ctx.floor(a).unwrap();
        drop(ctx);
        let want: Vec<f32> = xs.iter().map(|x| x.floor()).collect();
        prop_assert_eq!(interp.lanes_f32(r), want);
    }

    #[test]
    fn prop_horizontal_add_wraps(xs in prop::collection::vec(any::<i32>(), 8)) {
        let ty = VectorType::int(32, 8);
        let caps = FeatureSet::empty();
        let mut interp = Interpreter::new();
        let lanes: Vec<i64> = xs.iter().map(|&x| i64::from(x)).collect();
        let a = interp.input_i64(ty, &lanes);
        let mut ctx = LoweringContext::new(&mut interp, &caps, ty).unwrap();
        let r = ctx.horizontal_add(a).unwrap();
        drop(ctx);
        let want = xs.iter().fold(0i32, |acc, &x| acc.wrapping_add(x));
        prop_assert_eq!(interp.lanes_i64(r), vec![i64::from(want)]);
    }
}
