//! Parallel scatter-add kernels with a bit-reproducible accumulation path (pure Rust)
//!
//! Rows of an update tensor are added into an output tensor at destinations
//! named by an index tensor. Heavy-duplicate workloads sort each worker's
//! slice and sum runs locally; when bit-identical float results are required
//! across schedules, partial sums are combined through fixed-point integers.

pub mod accumulate;
pub mod deterministic;
pub mod index;
pub mod orchestrator;
pub mod sync;
pub mod utility;

pub use accumulate::{scatter_direct, PartialSumAccumulator, PartialSums};
pub use deterministic::{
    DeterministicReducer, FinalizeStrategy, QuantizeFault, Quantizer, ScratchWorkspace,
    SharedScratch, StagingBuffer,
};
pub use index::{
    DuplicateEstimate, DuplicateRateEstimator, IndexSorter, OffsetProjector, ProjectedSlice, Run,
    RunTable, SortedIndices, UniqueRunExtractor,
};
pub use orchestrator::{scatter_add, slices_confined, ExecutionPath, ScatterAddOrchestrator, ScatterReport};
pub use sync::Rendezvous;
