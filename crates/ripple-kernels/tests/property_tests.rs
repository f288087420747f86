//! Property-based tests for the scatter-add paths.
//!
//! Covers schedule determinism, permutation invariance, exactness of integer
//! accumulation, sorter agreement and value agreement between paths.

use proptest::prelude::*;
use ripple_core::{
    Element, IndexTensor, OutputAccumulator, ScatterConfig, ScatterGeometry, ScatterOptions,
    Schedule, SortStrategy, StrideTable, UpdateTensor, WorkerPlan,
};
use ripple_kernels::*;

fn run<T: Element>(
    rows: &[(i64, T)],
    out: &mut [T],
    workers: usize,
    options: ScatterOptions,
    config: &ScatterConfig,
) -> ScatterReport {
    let index: Vec<i64> = rows.iter().map(|r| r.0).collect();
    let updates: Vec<T> = rows.iter().map(|r| r.1).collect();
    let var_rows = out.len();
    let geometry = ScatterGeometry::new(var_rows, 1, StrideTable::new(vec![1]).unwrap());
    let plan = WorkerPlan::even(rows.len(), workers).unwrap();
    let options = match options.schedule {
        Schedule::Sequential(keys) => {
            // keys rank the workers; ties fall back to worker id
            let mut order: Vec<usize> = (0..plan.workers()).collect();
            order.sort_by_key(|&w| keys.get(w).copied().unwrap_or(usize::MAX));
            ScatterOptions { schedule: Schedule::Sequential(order), ..options }
        }
        Schedule::Parallel => options,
    };
    scatter_add(
        IndexTensor::from_parts(&index, 1).unwrap(),
        UpdateTensor::from_parts(&updates, rows.len(), 1).unwrap(),
        OutputAccumulator::from_parts(out, var_rows, 1).unwrap(),
        &geometry,
        &plan,
        options,
        config,
    )
    .unwrap()
}

// ── Strategies ──────────────────────────────────────────────────────────────

/// Non-negative multiples of 1/4; every partial and total is exact in f32.
fn arb_dyadic_rows() -> impl Strategy<Value = Vec<(i64, f32)>> {
    prop::collection::vec((0i64..6, 0u8..64), 1..64)
        .prop_map(|v| v.into_iter().map(|(i, k)| (i, f32::from(k) / 4.0)).collect())
}

fn arb_float_rows() -> impl Strategy<Value = Vec<(i64, f32)>> {
    prop::collection::vec((0i64..8, -1000.0f32..1000.0), 0..80)
}

fn arb_schedule_keys() -> impl Strategy<Value = Vec<usize>> {
    prop::collection::vec(0usize..100, 6)
}

proptest! {
    /// Any arrival order yields bit-identical float output.
    #[test]
    fn schedule_never_changes_bits(
        rows in arb_float_rows(),
        workers in 1usize..6,
        keys in arb_schedule_keys(),
    ) {
        let config = ScatterConfig { min_sort_rows: 0, ..ScatterConfig::default() };
        let mut a = vec![0.0f32; 8];
        let mut b = vec![0.0f32; 8];
        run(&rows, &mut a, workers, ScatterOptions::default(), &config);
        run(
            &rows,
            &mut b,
            workers,
            ScatterOptions::default().with_schedule(Schedule::Sequential(keys)),
            &config,
        );
        let bits = |v: &[f32]| v.iter().map(|x| x.to_bits()).collect::<Vec<_>>();
        prop_assert_eq!(bits(&a), bits(&b));
    }

    /// Row order does not matter when partial sums are exact.
    #[test]
    fn permutation_invariance_on_exact_partials(
        (rows, shuffled) in arb_dyadic_rows().prop_flat_map(|r| (Just(r.clone()), Just(r).prop_shuffle())),
        workers in 1usize..=4,
    ) {
        let mut expected = vec![0.0f32; 6];
        for &(i, v) in &rows {
            expected[i as usize] += v;
        }
        let config = ScatterConfig::default();
        let mut a = vec![0.0f32; 6];
        let mut b = vec![0.0f32; 6];
        run(&rows, &mut a, workers, ScatterOptions::default(), &config);
        run(&shuffled, &mut b, workers, ScatterOptions::default(), &config);
        prop_assert_eq!(&a, &expected);
        prop_assert_eq!(&b, &expected);
    }

    /// Integer scatter is exact on every path.
    #[test]
    fn integer_paths_are_exact(
        rows in prop::collection::vec((0i64..10, any::<i32>()), 0..100),
        workers in 1usize..6,
        threshold in prop_oneof![Just(0.0f32), Just(1.0f32)],
        deterministic in any::<bool>(),
        min_sort_rows in prop_oneof![Just(0usize), Just(256usize)],
    ) {
        let mut expected = vec![0i32; 10];
        for &(i, v) in &rows {
            expected[i as usize] = expected[i as usize].wrapping_add(v);
        }
        let config = ScatterConfig { duplicate_threshold: threshold, min_sort_rows, ..ScatterConfig::default() };
        let options = ScatterOptions { require_determinism: deterministic, ..ScatterOptions::default() };
        let mut out = vec![0i32; 10];
        let report = run(&rows, &mut out, workers, options, &config);
        prop_assert_ne!(report.path, ExecutionPath::Deterministic);
        prop_assert_eq!(out, expected);
    }

    /// Direct, sorted and quantized paths agree on value. Unquantized paths
    /// only carry f64 round-off; the quantized path adds at most half a step
    /// of `reference / 2^30` per contributing worker.
    #[test]
    fn paths_agree_on_value(
        rows in prop::collection::vec((0i64..12, -100.0f64..100.0), 1..120),
        workers in 1usize..6,
    ) {
        let mut expected = vec![0.0f64; 12];
        let mut magnitude = vec![0.0f64; 12];
        for &(i, v) in &rows {
            expected[i as usize] += v;
            magnitude[i as usize] += v.abs();
        }
        let plan = WorkerPlan::even(rows.len(), workers).unwrap();
        let mut reference = vec![0.0f64; 12];
        let mut count = vec![0.0f64; 12];
        for range in plan.ranges() {
            let mut partial = vec![None::<f64>; 12];
            for &(i, v) in &rows[range.clone()] {
                *partial[i as usize].get_or_insert(0.0) += v;
            }
            for (id, p) in partial.into_iter().enumerate() {
                if let Some(p) = p {
                    reference[id] = reference[id].max(p.abs());
                    count[id] += 1.0;
                }
            }
        }
        let direct = ScatterConfig { duplicate_threshold: 1.0, ..ScatterConfig::default() };
        let sorted = ScatterConfig { duplicate_threshold: 0.0, min_sort_rows: 0, ..ScatterConfig::default() };
        let mut outs = [vec![0.0f64; 12], vec![0.0f64; 12], vec![0.0f64; 12]];
        run(&rows, &mut outs[0], workers, ScatterOptions::fast(), &direct);
        run(&rows, &mut outs[1], workers, ScatterOptions::fast(), &sorted);
        let report = run(&rows, &mut outs[2], workers, ScatterOptions::default(), &ScatterConfig::default());
        for (path, out) in outs.iter().enumerate() {
            for id in 0..12 {
                let mut tol = 1e-12 * (1.0 + magnitude[id]);
                if path == 2 && report.path == ExecutionPath::Deterministic {
                    tol += count[id] * reference[id] * (-31f64).exp2();
                }
                prop_assert!((out[id] - expected[id]).abs() <= tol, "path {} row {}: {} vs {}", path, id, out[id], expected[id]);
            }
        }
    }

    /// Out-of-range rows contribute nothing and leave other rows alone.
    #[test]
    fn out_of_range_rows_are_inert(
        rows in prop::collection::vec((-4i64..14, -1000i64..1000), 0..60),
        workers in 1usize..5,
    ) {
        let in_range: Vec<(i64, i64)> = rows.iter().copied().filter(|r| (0..10).contains(&r.0)).collect();
        let mut a = vec![0i64; 10];
        let mut b = vec![0i64; 10];
        let report = run(&rows, &mut a, workers, ScatterOptions::default(), &ScatterConfig::default());
        run(&in_range, &mut b, 1, ScatterOptions::default(), &ScatterConfig::default());
        prop_assert_eq!(report.skipped_rows, rows.len() - in_range.len());
        prop_assert_eq!(a, b);
    }

    /// All sort strategies produce the same order.
    #[test]
    fn sorters_agree(offsets in prop::collection::vec(0usize..5000, 0..3000)) {
        let rows: Vec<usize> = (0..offsets.len()).collect();
        let cmp = IndexSorter::new(SortStrategy::Comparison, 1).sort(&offsets, &rows);
        let radix = IndexSorter::new(SortStrategy::Radix, 1).sort(&offsets, &rows);
        let par = IndexSorter::new(SortStrategy::Parallel, 1).sort(&offsets, &rows);
        prop_assert!(cmp.offsets.windows(2).all(|w| w[0] <= w[1]));
        prop_assert_eq!(&cmp, &radix);
        prop_assert_eq!(&cmp, &par);
    }

    /// Runs partition the sorted sequence and are stable under re-extraction.
    #[test]
    fn runs_partition_sorted_offsets(mut offsets in prop::collection::vec(0usize..50, 0..400)) {
        offsets.sort_unstable();
        let runs = UniqueRunExtractor::extract(&offsets);
        prop_assert_eq!(&runs, &UniqueRunExtractor::extract(&offsets));
        prop_assert_eq!(runs.counts().iter().sum::<usize>(), offsets.len());
        prop_assert!(runs.unique_offsets().windows(2).all(|w| w[0] < w[1]));
        for run in runs.iter() {
            prop_assert!(offsets[run.start..run.end()].iter().all(|&o| o == run.offset));
        }
    }
}
