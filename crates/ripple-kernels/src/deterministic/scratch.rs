//! Scratch buffers of the quantized path, sized to the destination tensor

use std::sync::atomic::{AtomicBool, AtomicI64, AtomicU32, Ordering};

use ripple_core::{AtomicCell, AtomicF64};

/// Per-destination state shared by all workers across the three phases.
#[derive(Debug)]
pub struct SharedScratch {
    inner_width: usize,
    /// Max |partial| per destination element.
    ref_magnitude: Vec<AtomicF64>,
    /// Workers that contributed to each destination row.
    contribution_count: Vec<AtomicU32>,
    quantized_sum: Vec<AtomicI64>,
    overflowed: Vec<AtomicBool>,
}

/// One worker's compacted destinations and their partial sums.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct StagingBuffer {
    pub ids: Vec<usize>,
    /// `ids.len() * inner_width` partial sums in `f64`.
    pub sums: Vec<f64>,
}

impl StagingBuffer {
    #[inline]
    #[must_use]
    pub fn row(&self, i: usize, inner_width: usize) -> &[f64] {
        &self.sums[i * inner_width..(i + 1) * inner_width]
    }

    pub fn clear(&mut self) {
        self.ids.clear();
        self.sums.clear();
    }
}

#[derive(Debug)]
pub struct ScratchWorkspace {
    shared: SharedScratch,
    staging: Vec<StagingBuffer>,
}

impl ScratchWorkspace {
    /// Zero-initialised scratch for `var_rows` destinations and `workers` stagings.
    #[must_use]
    pub fn new(var_rows: usize, inner_width: usize, workers: usize) -> Self {
        let cells = var_rows * inner_width;
        Self {
            shared: SharedScratch {
                inner_width,
                ref_magnitude: (0..cells).map(|_| AtomicF64::new(0.0)).collect(),
                contribution_count: (0..var_rows).map(|_| AtomicU32::new(0)).collect(),
                quantized_sum: (0..cells).map(|_| AtomicI64::new(0)).collect(),
                overflowed: (0..var_rows).map(|_| AtomicBool::new(false)).collect(),
            },
            staging: vec![StagingBuffer::default(); workers],
        }
    }

    #[inline]
    #[must_use]
    pub const fn shared(&self) -> &SharedScratch {
        &self.shared
    }

    #[inline]
    #[must_use]
    pub fn staging(&self) -> &[StagingBuffer] {
        &self.staging
    }

    /// Shared atomics and per-worker staging, borrowed together.
    #[inline]
    pub fn split(&mut self) -> (&SharedScratch, &mut [StagingBuffer]) {
        (&self.shared, &mut self.staging)
    }
}

impl SharedScratch {
    #[inline]
    #[must_use]
    pub const fn inner_width(&self) -> usize {
        self.inner_width
    }

    #[inline]
    #[must_use]
    pub fn var_rows(&self) -> usize {
        self.contribution_count.len()
    }

    /// Phase 1: fold one worker's partial row into the reference and bump the count.
    pub fn record(&self, id: usize, sums: &[f64]) {
        let base = id * self.inner_width;
        for (cell, &s) in self.ref_magnitude[base..base + self.inner_width].iter().zip(sums) {
            cell.fetch_max(s.abs());
        }
        self.contribution_count[id].fetch_add(1, Ordering::AcqRel);
    }

    #[inline]
    #[must_use]
    pub fn reference(&self, id: usize, col: usize) -> f64 {
        self.ref_magnitude[id * self.inner_width + col].load()
    }

    #[inline]
    #[must_use]
    pub fn count(&self, id: usize) -> u32 {
        self.contribution_count[id].load(Ordering::Acquire)
    }

    /// Take the count, leaving zero; only the first caller sees it non-zero.
    #[inline]
    pub fn claim(&self, id: usize) -> u32 {
        self.contribution_count[id].swap(0, Ordering::AcqRel)
    }

    #[inline]
    pub fn add_quantized(&self, id: usize, col: usize, q: i64) {
        self.quantized_sum[id * self.inner_width + col].fetch_add(q, Ordering::AcqRel);
    }

    #[inline]
    #[must_use]
    pub fn quantized(&self, id: usize, col: usize) -> i64 {
        self.quantized_sum[id * self.inner_width + col].load(Ordering::Acquire)
    }

    #[inline]
    pub fn mark_overflow(&self, id: usize) {
        self.overflowed[id].store(true, Ordering::Release);
    }

    #[inline]
    #[must_use]
    pub fn is_overflowed(&self, id: usize) -> bool {
        self.overflowed[id].load(Ordering::Acquire)
    }

    /// Overflowed destinations, ascending.
    #[must_use]
    pub fn overflowed_rows(&self) -> Vec<usize> {
        self.overflowed
            .iter()
            .enumerate()
            .filter(|(_, f)| f.load(Ordering::Acquire))
            .map(|(id, _)| id)
            .collect()
    }
}
