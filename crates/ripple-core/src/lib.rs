//! Core data model for deterministic parallel scatter-add (pure Rust)

pub const VERSION: &str = env!("CARGO_PKG_VERSION");

pub mod atomic;
pub mod config;
pub mod element;
pub mod error;
pub mod geometry;
pub mod plan;
pub mod state;
pub mod tensor;

pub use atomic::{AtomicBf16, AtomicCell, AtomicF16, AtomicF32, AtomicF64};
pub use config::{ConfigError, ScatterConfig, SortStrategy};
pub use element::{Accumulate, Element, ElementKind, IndexElement};
pub use error::{OutOfBoundsIndex, Result, ScatterError};
pub use geometry::{ScatterGeometry, StrideTable, MAX_RANK};
pub use plan::{ScatterOptions, Schedule, WorkerPlan};
pub use state::ScatterState;
pub use tensor::{IndexTensor, OutputAccumulator, SharedOutput, UpdateTensor};
