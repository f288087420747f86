//! Index preprocessing: projection, duplicate estimation, sorting and run extraction

pub mod estimator;
pub mod projector;
pub mod runs;
pub mod sorter;

pub use estimator::{DuplicateEstimate, DuplicateRateEstimator};
pub use projector::{OffsetProjector, ProjectedSlice};
pub use runs::{Run, RunTable, UniqueRunExtractor};
pub use sorter::{IndexSorter, SortedIndices};
