//! Non-quantized accumulation: direct atomic scatter and sorted local sums

pub mod direct;
pub mod partial;

pub use direct::scatter_direct;
pub use partial::{PartialSumAccumulator, PartialSums};
