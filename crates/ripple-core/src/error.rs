//! Error types shared by the core model and the kernels

use thiserror::Error;

use crate::config::ConfigError;
use crate::state::ScatterState;

pub type Result<T> = std::result::Result<T, ScatterError>;

#[derive(Debug, Error)]
pub enum ScatterError {
    #[error("index rank {rank} is outside 1..={max}")]
    RankOutOfRange { rank: usize, max: usize },

    #[error("index buffer of length {len} is not a multiple of rank {rank}")]
    IndexShape { len: usize, rank: usize },

    #[error("update buffer has length {got}, expected {expected}")]
    UpdateShape { expected: usize, got: usize },

    #[error("output buffer has length {got}, expected {expected}")]
    OutputShape { expected: usize, got: usize },

    #[error("shape mismatch: expected {expected:?}, got {got:?}")]
    ShapeMismatch { expected: Vec<usize>, got: Vec<usize> },

    #[error("invalid stride table: {0}")]
    StrideTable(String),

    #[error("invalid worker plan: {0}")]
    InvalidWorkerPlan(String),

    #[error("inconsistent operands: {0}")]
    Geometry(String),

    /// Rows whose quantized totals could not be represented; they were left untouched.
    #[error("quantization overflow on {} destination row(s)", .rows.len())]
    QuantizationOverflow { rows: Vec<usize> },

    #[error("worker desync in {stage}: {arrived} of {expected} workers reached the barrier")]
    WorkerDesync {
        stage: ScatterState,
        arrived: usize,
        expected: usize,
    },

    /// The orchestrator reached `state` without the buffers that state needs.
    #[error("scatter-add state machine broken in {state}: {detail}")]
    StateMachine { state: ScatterState, detail: &'static str },

    #[error(transparent)]
    Config(#[from] ConfigError),
}

/// An index tuple that projects outside `[0, var_rows)`.
///
/// Never escalated: the row is skipped and counted in the report.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Error)]
#[error("index row {row} projects to offset {offset}, outside 0..{var_rows}")]
pub struct OutOfBoundsIndex {
    pub row: usize,
    pub offset: i64,
    pub var_rows: usize,
}
