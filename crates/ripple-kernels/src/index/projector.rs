//! Index tuples to flat destination rows

use core::ops::Range;

use ripple_core::{IndexElement, IndexTensor, OutOfBoundsIndex, ScatterGeometry, StrideTable};

use crate::utility::util::i64_to_usize;

/// In-range destinations of one worker's index rows, in row order.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ProjectedSlice {
    pub offsets: Vec<usize>,
    /// Source row of each offset, strictly increasing.
    pub rows: Vec<usize>,
    /// Rows dropped for projecting outside `[0, var_rows)`.
    pub skipped: usize,
}

impl ProjectedSlice {
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

    /// Smallest and largest destination touched, if any.
    #[must_use]
    pub fn bounds(&self) -> Option<(usize, usize)> {
        let min = self.offsets.iter().copied().min()?;
        let max = self.offsets.iter().copied().max()?;
        Some((min, max))
    }
}

#[derive(Debug, Clone, Copy)]
pub struct OffsetProjector<'a> {
    strides: &'a StrideTable,
    var_rows: usize,
}

impl<'a> OffsetProjector<'a> {
    #[must_use]
    pub fn new(geometry: &'a ScatterGeometry) -> Self {
        Self { strides: &geometry.strides, var_rows: geometry.var_rows }
    }

    /// `offset = Σ tuple[d] · stride[d]`, rejected unless `0 <= offset < var_rows`.
    #[inline]
    pub fn project<I: IndexElement>(&self, row: usize, tuple: &[I]) -> Result<usize, OutOfBoundsIndex> {
        let offset = self.strides.project(tuple);
        if offset >= 0 && i64_to_usize(offset) < self.var_rows {
            Ok(i64_to_usize(offset))
        } else {
            Err(OutOfBoundsIndex { row, offset, var_rows: self.var_rows })
        }
    }

    /// Project a contiguous row range, dropping and counting out-of-range rows.
    #[must_use]
    pub fn project_slice<I: IndexElement>(
        &self,
        index: &IndexTensor<'_, I>,
        rows: Range<usize>,
    ) -> ProjectedSlice {
        let mut slice = ProjectedSlice {
            offsets: Vec::with_capacity(rows.len()),
            rows: Vec::with_capacity(rows.len()),
            skipped: 0,
        };
        for row in rows {
            match self.project(row, index.tuple(row)) {
                Ok(offset) => {
                    slice.offsets.push(offset);
                    slice.rows.push(row);
                }
                Err(oob) => {
                    log::trace!("skipping {oob}");
                    slice.skipped += 1;
                }
            }
        }
        slice
    }
}
