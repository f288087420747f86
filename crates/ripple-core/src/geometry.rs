//! Stride tables and the shape relation between index, update and output tensors

use crate::element::IndexElement;
use crate::error::{Result, ScatterError};

/// Largest supported index rank.
pub const MAX_RANK: usize = 7;

/// Per-dimension multipliers projecting an index tuple to a flat destination row.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StrideTable {
    strides: Vec<i64>,
}

impl StrideTable {
    pub fn new(strides: Vec<i64>) -> Result<Self> {
        let rank = strides.len();
        if rank == 0 || rank > MAX_RANK {
            return Err(ScatterError::RankOutOfRange { rank, max: MAX_RANK });
        }
        if strides.iter().any(|&s| s < 0) {
            return Err(ScatterError::StrideTable("strides must be non-negative".into()));
        }
        Ok(Self { strides })
    }

    /// Row-major strides over the indexed leading dimensions: the last stride is 1.
    pub fn row_major(dims: &[usize]) -> Result<Self> {
        let rank = dims.len();
        if rank == 0 || rank > MAX_RANK {
            return Err(ScatterError::RankOutOfRange { rank, max: MAX_RANK });
        }
        let mut strides = vec![1i64; rank];
        for d in (0..rank - 1).rev() {
            let dim = i64::try_from(dims[d + 1])
                .map_err(|_| ScatterError::StrideTable(format!("dimension {} too large", d + 1)))?;
            strides[d] = strides[d + 1]
                .checked_mul(dim)
                .ok_or_else(|| ScatterError::StrideTable("stride overflows i64".into()))?;
        }
        Ok(Self { strides })
    }

    #[inline]
    #[must_use]
    pub fn rank(&self) -> usize {
        self.strides.len()
    }

    #[inline]
    #[must_use]
    pub fn as_slice(&self) -> &[i64] {
        &self.strides
    }

    /// Saturating dot product; a saturated offset is always out of range.
    #[inline]
    #[must_use]
    pub fn project<I: IndexElement>(&self, tuple: &[I]) -> i64 {
        debug_assert_eq!(tuple.len(), self.strides.len());
        tuple
            .iter()
            .zip(&self.strides)
            .fold(0i64, |acc, (&c, &s)| acc.saturating_add(c.to_i64().saturating_mul(s)))
    }
}

/// Derived layout of one scatter: destination rows, row width and strides.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ScatterGeometry {
    pub var_rows: usize,
    pub inner_width: usize,
    pub strides: StrideTable,
}

impl ScatterGeometry {
    #[must_use]
    pub const fn new(var_rows: usize, inner_width: usize, strides: StrideTable) -> Self {
        Self { var_rows, inner_width, strides }
    }

    /// Derive the layout from full tensor shapes.
    ///
    /// `indices_shape` ends in the rank; `updates_shape` must equal
    /// `indices_shape[..-1] ++ var_shape[rank..]`.
    pub fn from_shapes(
        var_shape: &[usize],
        indices_shape: &[usize],
        updates_shape: &[usize],
    ) -> Result<Self> {
        let Some((&rank, batch)) = indices_shape.split_last() else {
            return Err(ScatterError::Geometry("indices must have at least one dimension".into()));
        };
        if rank == 0 || rank > MAX_RANK {
            return Err(ScatterError::RankOutOfRange { rank, max: MAX_RANK });
        }
        if rank > var_shape.len() {
            return Err(ScatterError::Geometry(format!(
                "index rank {rank} exceeds output rank {}",
                var_shape.len()
            )));
        }
        let (leading, inner) = var_shape.split_at(rank);
        let expected: Vec<usize> = batch.iter().chain(inner).copied().collect();
        if expected != updates_shape {
            return Err(ScatterError::ShapeMismatch {
                expected,
                got: updates_shape.to_vec(),
            });
        }
        let product = |dims: &[usize]| {
            dims.iter().try_fold(1usize, |acc, &d| acc.checked_mul(d)).ok_or_else(|| {
                ScatterError::Geometry(format!("shape {dims:?} overflows usize"))
            })
        };
        Ok(Self {
            var_rows: product(leading)?,
            inner_width: product(inner)?,
            strides: StrideTable::row_major(leading)?,
        })
    }

    #[inline]
    #[must_use]
    pub fn rank(&self) -> usize {
        self.strides.rank()
    }
}
