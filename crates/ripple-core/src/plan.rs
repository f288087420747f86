//! Worker partitioning of index rows and the scheduling knobs of one invocation

use core::ops::Range;

use crate::error::{Result, ScatterError};

/// Contiguous, disjoint index-row ranges, one per worker, covering `0..rows`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct WorkerPlan {
    ranges: Vec<Range<usize>>,
    rows: usize,
}

impl WorkerPlan {
    /// `ceil(rows / workers)` rows per worker with a shorter tail; trailing
    /// workers that would get nothing are dropped, but at least one remains.
    pub fn even(rows: usize, workers: usize) -> Result<Self> {
        if workers == 0 {
            return Err(ScatterError::InvalidWorkerPlan("at least one worker is required".into()));
        }
        if rows == 0 {
            return Ok(Self { ranges: vec![0..0], rows });
        }
        let per = rows.div_ceil(workers);
        let ranges = (0..rows.div_ceil(per))
            .map(|w| w * per..((w + 1) * per).min(rows))
            .collect();
        Ok(Self { ranges, rows })
    }

    /// Explicit ranges; they must tile `0..rows` in order. Empty ranges are allowed.
    pub fn from_ranges(ranges: Vec<Range<usize>>, rows: usize) -> Result<Self> {
        if ranges.is_empty() {
            return Err(ScatterError::InvalidWorkerPlan("at least one worker is required".into()));
        }
        let mut next = 0usize;
        for (w, r) in ranges.iter().enumerate() {
            if r.start != next || r.end < r.start {
                return Err(ScatterError::InvalidWorkerPlan(format!(
                    "worker {w} range {r:?} does not continue at row {next}"
                )));
            }
            next = r.end;
        }
        if next != rows {
            return Err(ScatterError::InvalidWorkerPlan(format!(
                "ranges cover 0..{next}, expected 0..{rows}"
            )));
        }
        Ok(Self { ranges, rows })
    }

    #[inline]
    #[must_use]
    pub fn workers(&self) -> usize {
        self.ranges.len()
    }

    #[inline]
    #[must_use]
    pub const fn rows(&self) -> usize {
        self.rows
    }

    #[inline]
    #[must_use]
    pub fn range(&self, worker: usize) -> Range<usize> {
        self.ranges[worker].clone()
    }

    #[inline]
    #[must_use]
    pub fn ranges(&self) -> &[Range<usize>] {
        &self.ranges
    }
}

/// How workers are driven through each stage.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub enum Schedule {
    /// Rayon tasks; arrival order is whatever the pool produces.
    #[default]
    Parallel,
    /// One worker at a time in the given order, for reproducing interleavings.
    Sequential(Vec<usize>),
}

impl Schedule {
    /// A sequential order must name every worker exactly once.
    pub fn validate(&self, workers: usize) -> Result<()> {
        let Self::Sequential(order) = self else {
            return Ok(());
        };
        let mut seen = vec![false; workers];
        for &w in order {
            match seen.get_mut(w) {
                Some(s) if !*s => *s = true,
                Some(_) => {
                    return Err(ScatterError::InvalidWorkerPlan(format!(
                        "worker {w} appears twice in the schedule"
                    )))
                }
                None => {
                    return Err(ScatterError::InvalidWorkerPlan(format!(
                        "worker {w} is not in the plan ({workers} workers)"
                    )))
                }
            }
        }
        if order.len() != workers {
            return Err(ScatterError::InvalidWorkerPlan(format!(
                "schedule names {} of {workers} workers",
                order.len()
            )));
        }
        Ok(())
    }
}

/// Per-call switches.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ScatterOptions {
    /// Require bit-identical results across runs and schedules.
    pub require_determinism: bool,
    pub schedule: Schedule,
}

impl Default for ScatterOptions {
    fn default() -> Self {
        Self { require_determinism: true, schedule: Schedule::Parallel }
    }
}

impl ScatterOptions {
    #[must_use]
    pub fn fast() -> Self {
        Self { require_determinism: false, schedule: Schedule::Parallel }
    }

    #[must_use]
    pub fn with_schedule(mut self, schedule: Schedule) -> Self {
        self.schedule = schedule;
        self
    }
}
