//! Per-run sums in the widened accumulator type.
//
// Each run is summed in sorted order, so a worker's partial sum for a
// destination depends only on its slice, never on timing.

use ripple_core::{Accumulate, Element, SharedOutput, UpdateTensor};

use super::direct::scatter_direct;
use crate::index::{IndexSorter, ProjectedSlice, Run, RunTable, SortedIndices, UniqueRunExtractor};

/// A worker's partial sums, one row of `inner_width` per unique destination.
#[derive(Debug, Clone, PartialEq)]
pub struct PartialSums<A> {
    pub ids: Vec<usize>,
    pub counts: Vec<usize>,
    pub sums: Vec<A>,
    inner_width: usize,
}

impl<A: Accumulate> PartialSums<A> {
    #[inline]
    #[must_use]
    pub fn len(&self) -> usize {
        self.ids.len()
    }

    #[inline]
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.ids.is_empty()
    }

    #[inline]
    #[must_use]
    pub fn row(&self, i: usize) -> &[A] {
        &self.sums[i * self.inner_width..(i + 1) * self.inner_width]
    }

    #[inline]
    #[must_use]
    pub const fn inner_width(&self) -> usize {
        self.inner_width
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PartialSumAccumulator {
    inner_width: usize,
}

impl PartialSumAccumulator {
    #[must_use]
    pub const fn new(inner_width: usize) -> Self {
        Self { inner_width }
    }

    fn sum_run<T: Element>(
        run: Run,
        sorted: &SortedIndices,
        updates: &UpdateTensor<'_, T>,
        acc: &mut [T::Acc],
        widened: &mut [T::Acc],
    ) {
        acc.fill(T::Acc::ZERO);
        for &row in &sorted.permutation[run.start..run.end()] {
            for (w, &u) in widened.iter_mut().zip(updates.row(row)) {
                *w = u.widen();
            }
            T::Acc::combine_slice(acc, widened);
        }
    }

    /// Partial sums for every run, kept for a later cross-worker combine.
    #[must_use]
    pub fn accumulate<T: Element>(
        &self,
        sorted: &SortedIndices,
        runs: &RunTable,
        updates: &UpdateTensor<'_, T>,
    ) -> PartialSums<T::Acc> {
        let w = self.inner_width;
        let mut sums = vec![T::Acc::ZERO; runs.len() * w];
        let mut widened = vec![T::Acc::ZERO; w];
        if w > 0 {
            for (run, acc) in runs.iter().zip(sums.chunks_exact_mut(w)) {
                Self::sum_run(run, sorted, updates, acc, &mut widened);
            }
        }
        PartialSums {
            ids: runs.unique_offsets().to_vec(),
            counts: runs.counts(),
            sums,
            inner_width: w,
        }
    }

    /// Sum each run and combine it into the output with one write per element.
    pub fn scatter_local<T: Element>(
        &self,
        sorted: &SortedIndices,
        runs: &RunTable,
        updates: &UpdateTensor<'_, T>,
        out: &SharedOutput<T>,
    ) {
        let w = self.inner_width;
        let mut acc = vec![T::Acc::ZERO; w];
        let mut widened = vec![T::Acc::ZERO; w];
        for run in runs.iter() {
            Self::sum_run(run, sorted, updates, &mut acc, &mut widened);
            out.accumulate_partial(run.offset, &acc);
        }
    }

    /// Sort, extract runs and scatter one worker slice. Short slices go
    /// straight to the direct scatter unless the element sums in a wider
    /// type. Returns the number of row writes issued.
    pub fn scatter_slice<T: Element>(
        &self,
        slice: &ProjectedSlice,
        sorter: &IndexSorter,
        min_sort_rows: usize,
        updates: &UpdateTensor<'_, T>,
        out: &SharedOutput<T>,
    ) -> usize {
        if !T::WIDENED && slice.len() < min_sort_rows {
            scatter_direct(slice, updates, out);
            return slice.len();
        }
        let sorted = sorter.sort(&slice.offsets, &slice.rows);
        let runs = UniqueRunExtractor::extract(&sorted.offsets);
        self.scatter_local(&sorted, &runs, updates, out);
        runs.len()
    }
}
