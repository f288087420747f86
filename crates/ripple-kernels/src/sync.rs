//! Stage barrier for the worker set.
//
// A stage runs every worker to completion before returning, which is the
// barrier between phases. Each worker that finishes without panicking counts
// as arrived; anything short of the full set is a desync.

use std::panic::{catch_unwind, AssertUnwindSafe};
use std::sync::atomic::{AtomicUsize, Ordering};

use rayon::prelude::*;
use ripple_core::{Result, ScatterError, ScatterState, Schedule};

#[derive(Debug, Clone)]
pub struct Rendezvous {
    workers: usize,
    schedule: Schedule,
}

impl Rendezvous {
    pub fn new(workers: usize, schedule: Schedule) -> Result<Self> {
        if workers == 0 {
            return Err(ScatterError::InvalidWorkerPlan("at least one worker is required".into()));
        }
        schedule.validate(workers)?;
        Ok(Self { workers, schedule })
    }

    #[inline]
    #[must_use]
    pub const fn workers(&self) -> usize {
        self.workers
    }

    #[inline]
    #[must_use]
    pub const fn schedule(&self) -> &Schedule {
        &self.schedule
    }

    /// Run `f(worker, &mut states[worker])` for every worker and wait for all of them.
    pub fn run_stage_with<S, F>(&self, stage: ScatterState, states: &mut [S], f: F) -> Result<()>
    where
        S: Send,
        F: Fn(usize, &mut S) + Sync,
    {
        debug_assert_eq!(states.len(), self.workers);
        log::trace!("{stage}: dispatching {} workers", self.workers);
        let arrived = AtomicUsize::new(0);
        let arrive = |w: usize, s: &mut S| {
            if catch_unwind(AssertUnwindSafe(|| f(w, s))).is_ok() {
                arrived.fetch_add(1, Ordering::AcqRel);
            } else {
                log::warn!("{stage}: worker {w} panicked before the barrier");
            }
        };
        match &self.schedule {
            Schedule::Parallel => {
                states.par_iter_mut().enumerate().for_each(|(w, s)| arrive(w, s));
            }
            Schedule::Sequential(order) => {
                for &w in order {
                    arrive(w, &mut states[w]);
                }
            }
        }
        let arrived = arrived.into_inner();
        if arrived == self.workers {
            Ok(())
        } else {
            log::warn!("{stage}: {arrived} of {} workers arrived", self.workers);
            Err(ScatterError::WorkerDesync { stage, arrived, expected: self.workers })
        }
    }

    /// A stage whose workers only touch shared state.
    pub fn run_stage<F>(&self, stage: ScatterState, f: F) -> Result<()>
    where
        F: Fn(usize) + Sync,
    {
        let mut unit = vec![(); self.workers];
        self.run_stage_with(stage, &mut unit, |w, _| f(w))
    }
}
