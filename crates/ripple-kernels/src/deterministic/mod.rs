//! Bit-reproducible cross-worker combine through fixed-point quantization

pub mod reducer;
pub mod scratch;

pub use reducer::{DeterministicReducer, FinalizeStrategy, QuantizeFault, Quantizer};
pub use scratch::{ScratchWorkspace, SharedScratch, StagingBuffer};
