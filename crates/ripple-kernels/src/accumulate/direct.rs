//! One atomic combine per update element, no preprocessing

use ripple_core::{Element, SharedOutput, UpdateTensor};

use crate::index::ProjectedSlice;

/// Scatter a worker's rows in row order straight into the shared output.
pub fn scatter_direct<T: Element>(
    slice: &ProjectedSlice,
    updates: &UpdateTensor<'_, T>,
    out: &SharedOutput<T>,
) {
    for (&offset, &row) in slice.offsets.iter().zip(&slice.rows) {
        out.accumulate_row(offset, updates.row(row));
    }
}
