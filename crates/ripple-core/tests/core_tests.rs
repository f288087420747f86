use half::{bf16, f16};
use ripple_core::{
    Accumulate, AtomicCell, AtomicF16, AtomicF32, AtomicF64, Element, ElementKind, IndexTensor,
    OutputAccumulator, ScatterError, ScatterGeometry, ScatterOptions, ScatterState, Schedule,
    StrideTable, UpdateTensor, WorkerPlan, MAX_RANK,
};

#[test]
fn row_major_strides_end_in_one() {
    let s = StrideTable::row_major(&[4, 3, 5]).unwrap();
    assert_eq!(s.as_slice(), &[15, 5, 1]);
    assert_eq!(s.rank(), 3);
    assert_eq!(s.project(&[1i64, 2, 3]), 15 + 10 + 3);
    assert_eq!(s.project(&[0i32, 0, 4]), 4);
}

#[test]
fn projection_saturates_instead_of_wrapping() {
    let s = StrideTable::new(vec![i64::MAX / 2, 1]).unwrap();
    assert_eq!(s.project(&[4i64, 0]), i64::MAX);
    assert_eq!(s.project(&[-4i64, 0]), i64::MIN);
}

#[test]
fn stride_table_rank_limits() {
    assert!(matches!(StrideTable::new(vec![]), Err(ScatterError::RankOutOfRange { rank: 0, .. })));
    assert!(StrideTable::new(vec![1; MAX_RANK]).is_ok());
    assert!(matches!(
        StrideTable::row_major(&[2; MAX_RANK + 1]),
        Err(ScatterError::RankOutOfRange { rank: 8, max: 7 })
    ));
    assert!(StrideTable::new(vec![3, -1]).is_err());
}

#[test]
fn geometry_from_shapes_splits_leading_and_inner() {
    // var [6, 4, 8], indices [10, 2] -> updates [10, 8]
    let g = ScatterGeometry::from_shapes(&[6, 4, 8], &[10, 2], &[10, 8]).unwrap();
    assert_eq!(g.var_rows, 24);
    assert_eq!(g.inner_width, 8);
    assert_eq!(g.strides.as_slice(), &[4, 1]);
    assert_eq!(g.rank(), 2);

    // batched indices [2, 5, 1] -> updates [2, 5, 4, 8]
    let g = ScatterGeometry::from_shapes(&[6, 4, 8], &[2, 5, 1], &[2, 5, 4, 8]).unwrap();
    assert_eq!(g.var_rows, 6);
    assert_eq!(g.inner_width, 32);
}

#[test]
fn geometry_rejects_mismatched_updates() {
    let err = ScatterGeometry::from_shapes(&[6, 4], &[10, 1], &[10, 5]).unwrap_err();
    match err {
        ScatterError::ShapeMismatch { expected, got } => {
            assert_eq!(expected, vec![10, 4]);
            assert_eq!(got, vec![10, 5]);
        }
        other => panic!("unexpected error: {other}"),
    }
    assert!(ScatterGeometry::from_shapes(&[6], &[3, 2], &[3]).is_err());
    assert!(ScatterGeometry::from_shapes(&[6], &[], &[]).is_err());
}

#[test]
fn full_rank_index_has_unit_inner_width() {
    let g = ScatterGeometry::from_shapes(&[3, 3], &[4, 2], &[4]).unwrap();
    assert_eq!(g.var_rows, 9);
    assert_eq!(g.inner_width, 1);
}

#[test]
fn tensors_check_lengths() {
    let idx = [0i64, 1, 2, 3, 4, 5];
    let t = IndexTensor::from_parts(&idx, 2).unwrap();
    assert_eq!(t.rows(), 3);
    assert_eq!(t.tuple(1), &[2, 3]);
    assert!(matches!(
        IndexTensor::from_parts(&idx, 4),
        Err(ScatterError::IndexShape { len: 6, rank: 4 })
    ));
    assert!(IndexTensor::<i64>::from_parts(&idx, 0).is_err());

    let upd = [1.0f32; 6];
    let u = UpdateTensor::from_parts(&upd, 3, 2).unwrap();
    assert_eq!(u.row(2), &[1.0, 1.0]);
    assert!(matches!(
        UpdateTensor::from_parts(&upd, 2, 2),
        Err(ScatterError::UpdateShape { expected: 4, got: 6 })
    ));

    let mut out = [0.0f32; 4];
    assert!(OutputAccumulator::from_parts(&mut out, 3, 2).is_err());
    assert!(OutputAccumulator::from_parts(&mut out, 2, 2).is_ok());
}

#[test]
fn shared_output_round_trips_through_the_arena() {
    let mut buf = [1.0f64, 2.0, 3.0, 4.0];
    let mut out = OutputAccumulator::from_parts(&mut buf, 2, 2).unwrap();
    let shared = out.share();
    shared.accumulate_row(1, &[0.5, 0.25]);
    shared.accumulate(0, 0, 10.0);
    assert_eq!(shared.load(1, 1), 4.25);
    out.store(shared);
    assert_eq!(buf, [11.0, 2.0, 3.5, 4.25]);
}

#[test]
fn logical_outputs_take_the_max() {
    let mut buf = [false, false, true];
    let mut out = OutputAccumulator::from_parts(&mut buf, 3, 1).unwrap();
    let shared = out.share();
    shared.accumulate(1, 0, true);
    shared.accumulate(1, 0, false);
    shared.accumulate(2, 0, false);
    out.store(shared);
    assert_eq!(buf, [false, true, true]);
}

#[test]
fn float_cells_add_and_max() {
    let c = AtomicF64::new(1.5);
    assert_eq!(c.fetch_add(2.0), 1.5);
    assert_eq!(c.load(), 3.5);
    c.fetch_max(2.0);
    assert_eq!(c.load(), 3.5);
    c.fetch_max(7.0);
    assert_eq!(c.exchange(0.0), 7.0);
    assert_eq!(c.into_inner(), 0.0);

    let h = AtomicF16::new(f16::from_f32(1.0));
    h.fetch_add(f16::from_f32(0.5));
    assert_eq!(h.load().to_f32(), 1.5);
}

#[test]
fn float_cell_concurrent_adds_are_not_lost() {
    let c = AtomicF32::new(0.0);
    std::thread::scope(|s| {
        for _ in 0..4 {
            s.spawn(|| {
                for _ in 0..1000 {
                    c.fetch_add(1.0);
                }
            });
        }
    });
    assert_eq!(c.load(), 4000.0);
}

#[test]
fn integer_cells_wrap() {
    let c = <std::sync::atomic::AtomicI32 as AtomicCell<i32>>::new(i32::MAX);
    AtomicCell::fetch_add(&c, 1);
    assert_eq!(AtomicCell::load(&c), i32::MIN);
}

#[test]
fn element_widening() {
    assert_eq!(<f16 as Element>::KIND, ElementKind::Float);
    assert_eq!(f16::from_f32(2.5).widen(), 2.5f32);
    assert_eq!(<bf16 as Element>::narrow(3.0), bf16::from_f32(3.0));
    assert_eq!(7i32.widen(), 7i64);
    assert_eq!(<i32 as Element>::narrow(i64::from(i32::MAX) + 1), i32::MIN);
    assert!(<bool as Element>::KIND.is_exact());
    assert!(!<f64 as Element>::KIND.is_exact());
    assert!(<f16 as Element>::WIDENED && <bf16 as Element>::WIDENED);
    assert!(!<f32 as Element>::WIDENED && !<i32 as Element>::WIDENED);
}

#[test]
fn combine_slice_matches_scalar_adds() {
    let mut a: Vec<f32> = (0..11).map(|i| i as f32 * 0.1).collect();
    let b: Vec<f32> = (0..11).map(|i| 1.0 / (i as f32 + 1.0)).collect();
    let expected: Vec<f32> = a.iter().zip(&b).map(|(x, y)| x + y).collect();
    f32::combine_slice(&mut a, &b);
    assert_eq!(a, expected);

    let mut c = vec![true, false, false];
    bool::combine_slice(&mut c, &[false, false, true]);
    assert_eq!(c, vec![true, false, true]);
}

#[test]
fn even_plan_gives_ceil_chunks_and_short_tail() {
    let p = WorkerPlan::even(10, 4).unwrap();
    assert_eq!(p.ranges(), &[0..3, 3..6, 6..9, 9..10]);
    let p = WorkerPlan::even(4, 8).unwrap();
    assert_eq!(p.workers(), 4);
    let p = WorkerPlan::even(0, 3).unwrap();
    assert_eq!(p.ranges(), &[0..0]);
    assert!(WorkerPlan::even(5, 0).is_err());
}

#[test]
fn explicit_ranges_must_tile_rows() {
    assert!(WorkerPlan::from_ranges(vec![0..1, 1..3, 3..4, 4..4], 4).is_ok());
    assert!(WorkerPlan::from_ranges(vec![0..1, 2..4], 4).is_err());
    assert!(WorkerPlan::from_ranges(vec![0..3], 4).is_err());
    assert!(WorkerPlan::from_ranges(vec![], 0).is_err());
}

#[test]
fn sequential_schedule_must_be_a_permutation() {
    assert!(Schedule::Sequential(vec![2, 0, 1]).validate(3).is_ok());
    assert!(Schedule::Sequential(vec![0, 0, 1]).validate(3).is_err());
    assert!(Schedule::Sequential(vec![0, 1]).validate(3).is_err());
    assert!(Schedule::Sequential(vec![0, 1, 5]).validate(3).is_err());
    assert!(Schedule::Parallel.validate(3).is_ok());
    let opts = ScatterOptions::fast().with_schedule(Schedule::Sequential(vec![0]));
    assert!(!opts.require_determinism);
}

#[test]
fn state_names() {
    assert_eq!(ScatterState::Phase2.to_string(), "phase2");
    assert!(ScatterState::Phase3.is_deterministic_phase());
    assert!(!ScatterState::SortedLocalSum.is_deterministic_phase());
    assert!(ScatterState::Done.is_terminal());
}

#[test]
fn state_machine_errors_name_the_state() {
    let err = ScatterError::StateMachine { state: ScatterState::Phase3, detail: "no staged partials to finalize" };
    assert_eq!(err.to_string(), "scatter-add state machine broken in phase3: no staged partials to finalize");
    assert!(!matches!(err, ScatterError::Geometry(_)));
}
