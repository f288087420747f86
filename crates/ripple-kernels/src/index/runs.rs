//! Maximal runs of equal destinations in a sorted offset sequence

use super::sorter::SortedIndices;

/// One destination and the sorted positions `start..start + len` that target it.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Run {
    pub offset: usize,
    pub start: usize,
    pub len: usize,
}

impl Run {
    #[inline]
    #[must_use]
    pub const fn end(&self) -> usize {
        self.start + self.len
    }
}

/// Runs in ascending offset order; run boundaries are exactly where the offset changes.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct RunTable {
    starts: Vec<usize>,
    offsets: Vec<usize>,
    total: usize,
}

impl RunTable {
    #[inline]
    #[must_use]
    pub fn len(&self) -> usize {
        self.starts.len()
    }

    #[inline]
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.starts.is_empty()
    }

    #[must_use]
    pub fn run(&self, i: usize) -> Run {
        let start = self.starts[i];
        let end = self.starts.get(i + 1).copied().unwrap_or(self.total);
        Run { offset: self.offsets[i], start, len: end - start }
    }

    pub fn iter(&self) -> impl Iterator<Item = Run> + '_ {
        (0..self.len()).map(|i| self.run(i))
    }

    #[inline]
    #[must_use]
    pub fn starts(&self) -> &[usize] {
        &self.starts
    }

    /// Distinct destinations, ascending.
    #[inline]
    #[must_use]
    pub fn unique_offsets(&self) -> &[usize] {
        &self.offsets
    }

    #[must_use]
    pub fn counts(&self) -> Vec<usize> {
        self.iter().map(|r| r.len).collect()
    }

    /// First source row of run `i` in sorted order.
    #[must_use]
    pub fn representative_row(&self, i: usize, sorted: &SortedIndices) -> usize {
        sorted.permutation[self.starts[i]]
    }
}

pub struct UniqueRunExtractor;

impl UniqueRunExtractor {
    #[must_use]
    pub fn extract(sorted_offsets: &[usize]) -> RunTable {
        debug_assert!(sorted_offsets.windows(2).all(|w| w[0] <= w[1]));
        let mut starts = Vec::new();
        let mut offsets = Vec::new();
        let mut prev = None;
        for (k, &o) in sorted_offsets.iter().enumerate() {
            if prev != Some(o) {
                starts.push(k);
                offsets.push(o);
                prev = Some(o);
            }
        }
        RunTable { starts, offsets, total: sorted_offsets.len() }
    }
}
