//! Three-phase quantized reduction.
//
// Phase 1 stages each worker's sorted partial sums and folds them into the
// per-element reference magnitude and the per-row contribution count.
// Phase 2 scales every partial by `2^k / reference`, rounds it to an integer
// and adds it into the shared `i64` total. Integer addition commutes
// exactly, so the total is independent of arrival order. Phase 3 turns each
// total back into a float and writes it once.

use std::sync::atomic::{AtomicUsize, Ordering};

use ripple_core::{
    Accumulate, Element, Result, ScatterConfig, ScatterState, SharedOutput, UpdateTensor,
    WorkerPlan,
};

use super::scratch::{ScratchWorkspace, SharedScratch};
use crate::accumulate::PartialSumAccumulator;
use crate::index::{IndexSorter, ProjectedSlice, UniqueRunExtractor};
use crate::sync::Rendezvous;
use crate::utility::util::ratio;

/// `2^63` as a float; quantized magnitudes must stay strictly below it.
const I64_LIMIT: f64 = 9_223_372_036_854_775_808.0;

/// Why a partial sum could not be quantized.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum QuantizeFault {
    /// The partial sum or the scaled reference is NaN or infinite.
    NonFinite,
    /// The scaled value does not fit in an `i64`.
    OutOfRange,
}

/// Fixed-point conversion with scale `2^k`.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Quantizer {
    scale: f64,
}

impl Quantizer {
    #[must_use]
    pub fn new(scale_log2: u32) -> Self {
        Self { scale: f64::from(scale_log2).exp2() }
    }

    #[must_use]
    pub fn from_config(config: &ScatterConfig) -> Self {
        Self { scale: config.quantization_scale() }
    }

    #[inline]
    #[must_use]
    pub const fn scale(&self) -> f64 {
        self.scale
    }

    /// `rint(value / reference * scale)`; a zero reference quantizes to 0.
    #[inline]
    pub fn quantize(&self, value: f64, reference: f64) -> std::result::Result<i64, QuantizeFault> {
        if !value.is_finite() || !reference.is_finite() {
            return Err(QuantizeFault::NonFinite);
        }
        if reference == 0.0 {
            return Ok(0);
        }
        let scaled = (value / reference * self.scale).round_ties_even();
        if !scaled.is_finite() {
            return Err(QuantizeFault::NonFinite);
        }
        if scaled.abs() >= I64_LIMIT {
            return Err(QuantizeFault::OutOfRange);
        }
        #[allow(clippy::cast_possible_truncation, reason = "range checked above")]
        let q = scaled as i64;
        Ok(q)
    }

    /// Whether `count` quantized contributions, each at most `scale` in
    /// magnitude, always sum inside the `i64` range.
    #[inline]
    #[must_use]
    pub fn total_fits(&self, count: u32) -> bool {
        f64::from(count) * self.scale < I64_LIMIT
    }

    /// Inverse of [`quantize`](Self::quantize) for a summed total.
    #[inline]
    #[must_use]
    #[allow(clippy::cast_precision_loss, reason = "totals are bounded by count * scale")]
    pub fn dequantize(&self, total: i64, reference: f64) -> f64 {
        total as f64 * reference / self.scale
    }
}

/// How phase 3 divides destination rows among workers.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FinalizeStrategy {
    /// Each worker walks its own staged ids; the first to swap a row's count
    /// to zero writes it.
    ClaimByExchange,
    /// Destination rows are split evenly; each worker writes its range.
    PartitionRows,
}

impl FinalizeStrategy {
    /// Claiming wins when index rows are sparse relative to destinations.
    #[must_use]
    pub fn select(index_rows: usize, var_rows: usize, claim_ratio: f64) -> Self {
        if ratio(index_rows, var_rows) < claim_ratio {
            Self::ClaimByExchange
        } else {
            Self::PartitionRows
        }
    }
}

#[derive(Debug, Clone, Copy)]
pub struct DeterministicReducer<'a> {
    quantizer: Quantizer,
    sorter: IndexSorter,
    rendezvous: &'a Rendezvous,
}

impl<'a> DeterministicReducer<'a> {
    #[must_use]
    pub const fn new(quantizer: Quantizer, sorter: IndexSorter, rendezvous: &'a Rendezvous) -> Self {
        Self { quantizer, sorter, rendezvous }
    }

    #[must_use]
    pub fn from_config(config: &ScatterConfig, rendezvous: &'a Rendezvous) -> Self {
        Self::new(Quantizer::from_config(config), IndexSorter::from_config(config), rendezvous)
    }

    #[inline]
    #[must_use]
    pub const fn quantizer(&self) -> &Quantizer {
        &self.quantizer
    }

    /// Stage partial sums and accumulate reference magnitudes and counts.
    /// Returns the total number of runs across workers.
    pub fn phase1<T: Element>(
        &self,
        slices: &[ProjectedSlice],
        updates: &UpdateTensor<'_, T>,
        scratch: &mut ScratchWorkspace,
    ) -> Result<usize> {
        let (shared, staging) = scratch.split();
        let inner = shared.inner_width();
        let accumulator = PartialSumAccumulator::new(inner);
        let total_runs = AtomicUsize::new(0);
        self.rendezvous.run_stage_with(ScatterState::Phase1, staging, |w, buf| {
            buf.clear();
            let slice = &slices[w];
            if slice.is_empty() {
                return;
            }
            let sorted = self.sorter.sort(&slice.offsets, &slice.rows);
            let runs = UniqueRunExtractor::extract(&sorted.offsets);
            let partial = accumulator.accumulate(&sorted, &runs, updates);
            buf.sums = partial.sums.iter().map(|a| a.to_f64()).collect();
            buf.ids = partial.ids;
            for (i, &id) in buf.ids.iter().enumerate() {
                shared.record(id, buf.row(i, inner));
            }
            total_runs.fetch_add(runs.len(), Ordering::Relaxed);
        })?;
        Ok(total_runs.into_inner())
    }

    /// Quantize staged partials against the now-final references and counts.
    pub fn phase2(&self, scratch: &ScratchWorkspace) -> Result<()> {
        let shared = scratch.shared();
        let staging = scratch.staging();
        let inner = shared.inner_width();
        self.rendezvous.run_stage(ScatterState::Phase2, |w| {
            let buf = &staging[w];
            let mut q_row = vec![0i64; inner];
            'rows: for (i, &id) in buf.ids.iter().enumerate() {
                if shared.is_overflowed(id) {
                    continue;
                }
                let count = shared.count(id);
                if !self.quantizer.total_fits(count) {
                    log::warn!("destination row {id}: {count} contributions exceed the quantized total range");
                    shared.mark_overflow(id);
                    continue;
                }
                for (col, (&s, q)) in buf.row(i, inner).iter().zip(&mut q_row).enumerate() {
                    match self.quantizer.quantize(s, shared.reference(id, col)) {
                        Ok(v) => *q = v,
                        Err(fault) => {
                            log::warn!("destination row {id} column {col}: {fault:?} while quantizing {s}");
                            shared.mark_overflow(id);
                            continue 'rows;
                        }
                    }
                }
                for (col, &q) in q_row.iter().enumerate() {
                    shared.add_quantized(id, col, q);
                }
            }
        })
    }

    /// Dequantize each contributed row once and combine it into the output.
    pub fn phase3<T: Element>(
        &self,
        scratch: &ScratchWorkspace,
        out: &SharedOutput<T>,
        strategy: FinalizeStrategy,
    ) -> Result<()> {
        let shared = scratch.shared();
        match strategy {
            FinalizeStrategy::ClaimByExchange => {
                let staging = scratch.staging();
                self.rendezvous.run_stage(ScatterState::Phase3, |w| {
                    for &id in &staging[w].ids {
                        let count = shared.claim(id);
                        if count != 0 && !shared.is_overflowed(id) {
                            self.finalize_row(shared, id, out);
                        }
                    }
                })
            }
            FinalizeStrategy::PartitionRows => {
                let plan = WorkerPlan::even(shared.var_rows(), self.rendezvous.workers())?;
                self.rendezvous.run_stage(ScatterState::Phase3, |w| {
                    let Some(range) = plan.ranges().get(w) else {
                        return;
                    };
                    for id in range.clone() {
                        if shared.count(id) != 0 && !shared.is_overflowed(id) {
                            self.finalize_row(shared, id, out);
                        }
                    }
                })
            }
        }
    }

    fn finalize_row<T: Element>(&self, shared: &SharedScratch, id: usize, out: &SharedOutput<T>) {
        for col in 0..shared.inner_width() {
            let total = shared.quantized(id, col);
            let value = self.quantizer.dequantize(total, shared.reference(id, col));
            out.accumulate(id, col, T::from_f64(value));
        }
    }

    /// All three phases back to back. Returns total runs and the overflowed rows.
    pub fn run<T: Element>(
        &self,
        slices: &[ProjectedSlice],
        updates: &UpdateTensor<'_, T>,
        out: &SharedOutput<T>,
        var_rows: usize,
        strategy: FinalizeStrategy,
    ) -> Result<(usize, Vec<usize>)> {
        let mut scratch = ScratchWorkspace::new(var_rows, updates.inner_width, self.rendezvous.workers());
        let runs = self.phase1(slices, updates, &mut scratch)?;
        self.phase2(&scratch)?;
        self.phase3(&scratch, out, strategy)?;
        Ok((runs, scratch.shared().overflowed_rows()))
    }
}
