//! Borrowed views over the caller's index, update and output buffers

use crate::atomic::AtomicCell;
use crate::element::{Element, ElementKind, IndexElement};
use crate::error::{Result, ScatterError};
use crate::geometry::MAX_RANK;

/// `rows` index tuples of `rank` coordinates each, flattened row-major.
#[derive(Debug, Clone, Copy)]
#[non_exhaustive]
pub struct IndexTensor<'a, I> {
    pub data: &'a [I],
    pub rank: usize,
}

impl<'a, I: IndexElement> IndexTensor<'a, I> {
    pub fn from_parts(data: &'a [I], rank: usize) -> Result<Self> {
        if rank == 0 || rank > MAX_RANK {
            return Err(ScatterError::RankOutOfRange { rank, max: MAX_RANK });
        }
        if data.len() % rank != 0 {
            return Err(ScatterError::IndexShape { len: data.len(), rank });
        }
        Ok(Self { data, rank })
    }

    #[inline]
    #[must_use]
    pub const fn rows(&self) -> usize {
        self.data.len() / self.rank
    }

    #[inline]
    #[must_use]
    pub const fn is_empty(&self) -> bool {
        self.data.is_empty()
    }

    #[inline]
    #[must_use]
    pub fn tuple(&self, row: usize) -> &'a [I] {
        &self.data[row * self.rank..(row + 1) * self.rank]
    }
}

/// One update row of `inner_width` elements per index tuple.
#[derive(Debug, Clone, Copy)]
#[non_exhaustive]
pub struct UpdateTensor<'a, T> {
    pub data: &'a [T],
    pub rows: usize,
    pub inner_width: usize,
}

impl<'a, T: Element> UpdateTensor<'a, T> {
    pub fn from_parts(data: &'a [T], rows: usize, inner_width: usize) -> Result<Self> {
        let expected = rows.checked_mul(inner_width).ok_or_else(|| {
            ScatterError::Geometry(format!("{rows} x {inner_width} update rows overflow usize"))
        })?;
        if data.len() != expected {
            return Err(ScatterError::UpdateShape { expected, got: data.len() });
        }
        Ok(Self { data, rows, inner_width })
    }

    #[inline]
    #[must_use]
    pub fn row(&self, row: usize) -> &'a [T] {
        &self.data[row * self.inner_width..(row + 1) * self.inner_width]
    }
}

/// The mutable destination: `var_rows` rows of `inner_width` elements.
#[derive(Debug)]
#[non_exhaustive]
pub struct OutputAccumulator<'a, T> {
    pub data: &'a mut [T],
    pub var_rows: usize,
    pub inner_width: usize,
}

impl<'a, T: Element> OutputAccumulator<'a, T> {
    pub fn from_parts(data: &'a mut [T], var_rows: usize, inner_width: usize) -> Result<Self> {
        let expected = var_rows.checked_mul(inner_width).ok_or_else(|| {
            ScatterError::Geometry(format!("{var_rows} x {inner_width} output overflows usize"))
        })?;
        if data.len() != expected {
            return Err(ScatterError::OutputShape { expected, got: data.len() });
        }
        Ok(Self { data, var_rows, inner_width })
    }

    /// Copy the current contents into a shared atomic arena.
    #[must_use]
    pub fn share(&self) -> SharedOutput<T> {
        SharedOutput {
            cells: self.data.iter().map(|&v| T::Cell::new(v)).collect(),
            inner_width: self.inner_width,
        }
    }

    /// Write an arena produced by [`share`](Self::share) back into the buffer.
    pub fn store(&mut self, shared: SharedOutput<T>) {
        debug_assert_eq!(shared.cells.len(), self.data.len());
        for (dst, cell) in self.data.iter_mut().zip(shared.cells) {
            *dst = cell.into_inner();
        }
    }
}

/// Output rows as atomic cells, writable from every worker at once.
#[derive(Debug)]
pub struct SharedOutput<T: Element> {
    cells: Vec<T::Cell>,
    inner_width: usize,
}

impl<T: Element> SharedOutput<T> {
    #[inline]
    #[must_use]
    pub const fn inner_width(&self) -> usize {
        self.inner_width
    }

    #[inline]
    #[must_use]
    pub fn len(&self) -> usize {
        self.cells.len()
    }

    #[inline]
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.cells.is_empty()
    }

    /// Combine one element; logical outputs take the max, everything else adds.
    #[inline]
    pub fn accumulate(&self, id: usize, col: usize, value: T) {
        let cell = &self.cells[id * self.inner_width + col];
        if T::KIND == ElementKind::Logical {
            cell.fetch_max(value);
        } else {
            cell.fetch_add(value);
        }
    }

    /// Combine a whole update row into destination row `id`.
    #[inline]
    pub fn accumulate_row(&self, id: usize, row: &[T]) {
        for (col, &v) in row.iter().enumerate() {
            self.accumulate(id, col, v);
        }
    }

    /// Narrow a widened partial sum and combine it, one atomic per element.
    #[inline]
    pub fn accumulate_partial(&self, id: usize, sums: &[T::Acc]) {
        for (col, &acc) in sums.iter().enumerate() {
            self.accumulate(id, col, T::narrow(acc));
        }
    }

    #[inline]
    #[must_use]
    pub fn load(&self, id: usize, col: usize) -> T {
        self.cells[id * self.inner_width + col].load()
    }
}
