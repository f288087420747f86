//! Cheap duplicate-rate estimate from a hashed histogram of destination offsets.
//
// Offsets are right-shifted so destinations sharing a cache-line window land
// in the same bucket, then hashed (FNV-1a) into 256 buckets. The score is the
// fullest bucket's share of the slice; uniform unique offsets score about
// 1/256, heavy duplication pushes it toward 1.

use std::cell::RefCell;

use rayon::prelude::*;
use thread_local::ThreadLocal;

use super::projector::ProjectedSlice;
use crate::utility::util::{CACHE_LINE_BYTES, HISTOGRAM_BUCKETS};

const FNV_OFFSET: u64 = 0xcbf2_9ce4_8422_2325;
const FNV_PRIME: u64 = 0x0000_0100_0000_01b3;

pub type Histogram = [usize; HISTOGRAM_BUCKETS];

#[derive(Debug, Clone, PartialEq)]
pub struct DuplicateEstimate {
    /// Largest per-worker score; the one compared against the threshold.
    pub max_score: f32,
    pub per_worker: Vec<f32>,
}

impl DuplicateEstimate {
    #[inline]
    #[must_use]
    pub fn exceeds(&self, threshold: f32) -> bool {
        self.max_score > threshold
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct DuplicateRateEstimator {
    shift: u32,
}

impl DuplicateRateEstimator {
    /// Bucket window: as many destination rows as fit in one 128-byte line.
    #[must_use]
    pub fn new(inner_width: usize, elem_size: usize) -> Self {
        let row_bytes = inner_width.saturating_mul(elem_size).max(1);
        let rows_per_line = (CACHE_LINE_BYTES / row_bytes).max(1);
        Self { shift: rows_per_line.ilog2() }
    }

    #[must_use]
    pub fn for_element<T>(inner_width: usize) -> Self {
        Self::new(inner_width, std::mem::size_of::<T>())
    }

    #[inline]
    #[must_use]
    pub const fn shift(&self) -> u32 {
        self.shift
    }

    #[inline]
    #[must_use]
    pub fn bucket(&self, offset: usize) -> usize {
        let key = (offset >> self.shift) as u64;
        let mut h = FNV_OFFSET;
        for b in key.to_le_bytes() {
            h ^= u64::from(b);
            h = h.wrapping_mul(FNV_PRIME);
        }
        let h = h ^ (h >> 32);
        let h = h ^ (h >> 16);
        let h = h ^ (h >> 8);
        #[allow(clippy::cast_possible_truncation)]
        {
            (h as usize) & (HISTOGRAM_BUCKETS - 1)
        }
    }

    /// Score one slice using `hist` as scratch. Empty slices score 0.
    #[allow(clippy::cast_precision_loss)]
    pub fn score_with(&self, offsets: &[usize], hist: &mut Histogram) -> f32 {
        hist.fill(0);
        if offsets.is_empty() {
            return 0.0;
        }
        for &o in offsets {
            hist[self.bucket(o)] += 1;
        }
        let fullest = hist.iter().copied().max().unwrap_or(0);
        fullest as f32 / offsets.len() as f32
    }

    #[must_use]
    pub fn score(&self, offsets: &[usize]) -> f32 {
        let mut hist = [0usize; HISTOGRAM_BUCKETS];
        self.score_with(offsets, &mut hist)
    }

    /// Score every worker slice in parallel; histograms are reused per thread.
    #[must_use]
    pub fn estimate(&self, slices: &[ProjectedSlice]) -> DuplicateEstimate {
        let tls: ThreadLocal<RefCell<Histogram>> = ThreadLocal::new();
        let per_worker: Vec<f32> = slices
            .par_iter()
            .map(|slice| {
                let cell = tls.get_or(|| RefCell::new([0usize; HISTOGRAM_BUCKETS]));
                let mut hist = cell.borrow_mut();
                self.score_with(&slice.offsets, &mut hist)
            })
            .collect();
        let max_score = per_worker.iter().copied().fold(0.0f32, f32::max);
        DuplicateEstimate { max_score, per_worker }
    }
}
