//! Per-worker ordering of (offset, row) pairs.
//
// Every strategy yields the same sequence for the same input: pairs ordered
// by offset, ties by source row. Rows from the projector are already
// ascending, so a stable radix sort on the offset alone agrees with the
// comparison sorts on the full pair.

use rayon::prelude::*;
use ripple_core::{ScatterConfig, SortStrategy};

use crate::utility::util::{PARALLEL_SORT_MIN_LEN, RADIX_BITS, RADIX_BUCKETS, RADIX_MASK};

/// Destinations in ascending order with the source row behind each one.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct SortedIndices {
    pub offsets: Vec<usize>,
    pub permutation: Vec<usize>,
}

impl SortedIndices {
    #[inline]
    #[must_use]
    pub fn len(&self) -> usize {
        self.offsets.len()
    }

    #[inline]
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.offsets.is_empty()
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct IndexSorter {
    strategy: SortStrategy,
    radix_min_len: usize,
}

impl Default for IndexSorter {
    fn default() -> Self {
        Self::from_config(&ScatterConfig::default())
    }
}

impl IndexSorter {
    #[must_use]
    pub const fn new(strategy: SortStrategy, radix_min_len: usize) -> Self {
        Self { strategy, radix_min_len }
    }

    #[must_use]
    pub const fn from_config(config: &ScatterConfig) -> Self {
        Self::new(config.sort_strategy, config.radix_min_len)
    }

    /// The concrete strategy used for a slice of `len` pairs.
    #[must_use]
    pub fn resolve(&self, len: usize) -> SortStrategy {
        match self.strategy {
            SortStrategy::Auto if len >= PARALLEL_SORT_MIN_LEN => SortStrategy::Parallel,
            SortStrategy::Auto if len >= self.radix_min_len => SortStrategy::Radix,
            SortStrategy::Auto => SortStrategy::Comparison,
            s => s,
        }
    }

    /// Sort `offsets` carrying `rows` along. Both slices have equal length.
    #[must_use]
    pub fn sort(&self, offsets: &[usize], rows: &[usize]) -> SortedIndices {
        debug_assert_eq!(offsets.len(), rows.len());
        match self.resolve(offsets.len()) {
            SortStrategy::Radix => radix_sort(offsets, rows),
            SortStrategy::Parallel => {
                let mut pairs = zip_pairs(offsets, rows);
                pairs.par_sort_unstable();
                unzip_pairs(pairs)
            }
            SortStrategy::Comparison | SortStrategy::Auto => {
                let mut pairs = zip_pairs(offsets, rows);
                pairs.sort_unstable();
                unzip_pairs(pairs)
            }
        }
    }
}

fn zip_pairs(offsets: &[usize], rows: &[usize]) -> Vec<(usize, usize)> {
    offsets.iter().copied().zip(rows.iter().copied()).collect()
}

fn unzip_pairs(pairs: Vec<(usize, usize)>) -> SortedIndices {
    let (offsets, permutation) = pairs.into_iter().unzip();
    SortedIndices { offsets, permutation }
}

/// LSD radix sort on the offset, 8 bits per pass, only as many passes as the
/// largest key needs.
fn radix_sort(offsets: &[usize], rows: &[usize]) -> SortedIndices {
    let n = offsets.len();
    let mut src = zip_pairs(offsets, rows);
    let mut dst = vec![(0usize, 0usize); n];
    let max_key = offsets.iter().copied().max().unwrap_or(0);
    let passes = (usize::BITS - max_key.leading_zeros()).div_ceil(RADIX_BITS);
    for pass in 0..passes {
        let shift = pass * RADIX_BITS;
        let mut starts = [0usize; RADIX_BUCKETS];
        for &(k, _) in &src {
            starts[(k >> shift) & RADIX_MASK] += 1;
        }
        let mut sum = 0usize;
        for s in &mut starts {
            let c = *s;
            *s = sum;
            sum += c;
        }
        for &pair in &src {
            let b = (pair.0 >> shift) & RADIX_MASK;
            dst[starts[b]] = pair;
            starts[b] += 1;
        }
        std::mem::swap(&mut src, &mut dst);
    }
    unzip_pairs(src)
}
