//! Drives one scatter-add invocation through its lifecycle states

use std::sync::atomic::{AtomicUsize, Ordering};

use ripple_core::{
    Element, ElementKind, IndexElement, IndexTensor, OutputAccumulator, Result, ScatterConfig,
    ScatterError, ScatterGeometry, ScatterOptions, ScatterState, SharedOutput, UpdateTensor,
    WorkerPlan,
};

use crate::accumulate::{scatter_direct, PartialSumAccumulator};
use crate::deterministic::{DeterministicReducer, FinalizeStrategy, ScratchWorkspace};
use crate::index::{DuplicateEstimate, DuplicateRateEstimator, IndexSorter, OffsetProjector, ProjectedSlice};
use crate::sync::Rendezvous;

/// Which accumulation strategy an invocation ended up using.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ExecutionPath {
    /// No in-range index rows; the output was not touched.
    Empty,
    Direct,
    SortedLocal,
    Deterministic,
}

#[derive(Debug, Clone, PartialEq)]
pub struct ScatterReport {
    pub path: ExecutionPath,
    pub duplicate_score: f32,
    /// No destination is touched by more than one worker.
    pub confined: bool,
    pub rows: usize,
    pub skipped_rows: usize,
    /// Unique destinations summed (sorted paths) or rows written directly.
    pub runs: usize,
    pub finalize: Option<FinalizeStrategy>,
    /// Destination rows left untouched because quantization overflowed.
    pub overflowed_rows: Vec<usize>,
}

impl ScatterReport {
    fn new(rows: usize) -> Self {
        Self {
            path: ExecutionPath::Empty,
            duplicate_score: 0.0,
            confined: true,
            rows,
            skipped_rows: 0,
            runs: 0,
            finalize: None,
            overflowed_rows: Vec::new(),
        }
    }

    /// Turn a non-empty overflow list into an error.
    pub fn ensure_complete(&self) -> Result<()> {
        if self.overflowed_rows.is_empty() {
            Ok(())
        } else {
            Err(ScatterError::QuantizationOverflow { rows: self.overflowed_rows.clone() })
        }
    }
}

/// True when the `[min, max]` destination ranges of non-empty slices are pairwise disjoint.
#[must_use]
pub fn slices_confined(slices: &[ProjectedSlice]) -> bool {
    let mut bounds: Vec<(usize, usize)> = slices.iter().filter_map(ProjectedSlice::bounds).collect();
    bounds.sort_unstable();
    bounds.windows(2).all(|w| w[0].1 < w[1].0)
}

/// Explicit state machine over one invocation.
///
/// Each [`step`](Self::step) performs the work of the current state and
/// advances. On reaching [`ScatterState::Done`] the shared arena is written
/// back into the caller's buffer. A failed stage leaves the state where it
/// was and the caller's buffer unwritten.
pub struct ScatterAddOrchestrator<'a, I, T: Element> {
    state: ScatterState,
    index: IndexTensor<'a, I>,
    updates: UpdateTensor<'a, T>,
    output: OutputAccumulator<'a, T>,
    shared: Option<SharedOutput<T>>,
    geometry: &'a ScatterGeometry,
    plan: &'a WorkerPlan,
    require_determinism: bool,
    config: &'a ScatterConfig,
    rendezvous: Rendezvous,
    slices: Vec<ProjectedSlice>,
    estimate: Option<DuplicateEstimate>,
    scratch: Option<ScratchWorkspace>,
    report: ScatterReport,
}

impl<'a, I: IndexElement, T: Element> ScatterAddOrchestrator<'a, I, T> {
    /// Validate operands against each other; nothing is written on failure.
    pub fn new(
        index: IndexTensor<'a, I>,
        updates: UpdateTensor<'a, T>,
        output: OutputAccumulator<'a, T>,
        geometry: &'a ScatterGeometry,
        plan: &'a WorkerPlan,
        options: ScatterOptions,
        config: &'a ScatterConfig,
    ) -> Result<Self> {
        config.validate()?;
        if index.rank != geometry.rank() {
            return Err(ScatterError::Geometry(format!(
                "index rank {} does not match stride table rank {}",
                index.rank,
                geometry.rank()
            )));
        }
        let rows = index.rows();
        if updates.rows != rows || updates.inner_width != geometry.inner_width {
            return Err(ScatterError::UpdateShape {
                expected: rows * geometry.inner_width,
                got: updates.data.len(),
            });
        }
        if output.var_rows != geometry.var_rows || output.inner_width != geometry.inner_width {
            return Err(ScatterError::OutputShape {
                expected: geometry.var_rows * geometry.inner_width,
                got: output.data.len(),
            });
        }
        if plan.rows() != rows {
            return Err(ScatterError::InvalidWorkerPlan(format!(
                "plan covers {} rows, index has {rows}",
                plan.rows()
            )));
        }
        let rendezvous = Rendezvous::new(plan.workers(), options.schedule)?;
        let shared = Some(output.share());
        Ok(Self {
            state: ScatterState::Idle,
            index,
            updates,
            output,
            shared,
            geometry,
            plan,
            require_determinism: options.require_determinism,
            config,
            rendezvous,
            slices: Vec::new(),
            estimate: None,
            scratch: None,
            report: ScatterReport::new(rows),
        })
    }

    #[inline]
    #[must_use]
    pub const fn state(&self) -> ScatterState {
        self.state
    }

    #[inline]
    #[must_use]
    pub const fn report(&self) -> &ScatterReport {
        &self.report
    }

    #[must_use]
    pub fn estimate(&self) -> Option<&DuplicateEstimate> {
        self.estimate.as_ref()
    }

    /// Run the current state's work and advance. A no-op once `Done`.
    pub fn step(&mut self) -> Result<ScatterState> {
        let next = match self.state {
            ScatterState::Idle => {
                self.project_and_estimate()?;
                ScatterState::Estimating
            }
            ScatterState::Estimating => self.select_path(),
            ScatterState::DirectScatter => {
                self.direct_scatter()?;
                ScatterState::Done
            }
            ScatterState::SortedLocalSum => {
                self.sorted_local_sum()?;
                ScatterState::Done
            }
            ScatterState::Phase1 => {
                let reducer = DeterministicReducer::from_config(self.config, &self.rendezvous);
                let mut scratch = ScratchWorkspace::new(
                    self.geometry.var_rows,
                    self.geometry.inner_width,
                    self.rendezvous.workers(),
                );
                self.report.runs = reducer.phase1(&self.slices, &self.updates, &mut scratch)?;
                self.scratch = Some(scratch);
                ScatterState::Phase2
            }
            ScatterState::Phase2 => {
                let reducer = DeterministicReducer::from_config(self.config, &self.rendezvous);
                if let Some(scratch) = &self.scratch {
                    reducer.phase2(scratch)?;
                }
                ScatterState::Phase3
            }
            ScatterState::Phase3 => {
                self.finalize()?;
                ScatterState::Done
            }
            ScatterState::Done => return Ok(ScatterState::Done),
        };
        log::trace!("scatter-add: {} -> {next}", self.state);
        self.state = next;
        if next == ScatterState::Done {
            if let Some(shared) = self.shared.take() {
                self.output.store(shared);
            }
        }
        Ok(next)
    }

    /// Step until `Done` and return the report.
    pub fn run(mut self) -> Result<ScatterReport> {
        while !self.state.is_terminal() {
            self.step()?;
        }
        Ok(self.report)
    }

    fn project_and_estimate(&mut self) -> Result<()> {
        let projector = OffsetProjector::new(self.geometry);
        let index = &self.index;
        let plan = self.plan;
        let mut slices = vec![ProjectedSlice::default(); self.rendezvous.workers()];
        self.rendezvous.run_stage_with(ScatterState::Estimating, &mut slices, |w, slot| {
            *slot = projector.project_slice(index, plan.range(w));
        })?;
        let estimator = DuplicateRateEstimator::for_element::<T>(self.geometry.inner_width);
        let estimate = estimator.estimate(&slices);
        self.report.skipped_rows = slices.iter().map(|s| s.skipped).sum();
        self.report.duplicate_score = estimate.max_score;
        self.report.confined = slices_confined(&slices);
        self.estimate = Some(estimate);
        self.slices = slices;
        Ok(())
    }

    fn select_path(&mut self) -> ScatterState {
        let live = self.slices.iter().any(|s| !s.is_empty());
        let confined = self.report.confined;
        let score = self.report.duplicate_score;
        let (path, state) = if !live {
            (ExecutionPath::Empty, ScatterState::Done)
        } else if self.require_determinism && T::KIND == ElementKind::Float && !confined {
            (ExecutionPath::Deterministic, ScatterState::Phase1)
        } else if (self.require_determinism && confined) || score > self.config.duplicate_threshold {
            (ExecutionPath::SortedLocal, ScatterState::SortedLocalSum)
        } else {
            (ExecutionPath::Direct, ScatterState::DirectScatter)
        };
        log::debug!(
            "scatter-add<{}>: {} rows, {} skipped, score {score:.4}, confined {confined}, path {path:?}",
            T::NAME,
            self.report.rows,
            self.report.skipped_rows,
        );
        self.report.path = path;
        state
    }

    fn shared_output(&self) -> Result<&SharedOutput<T>> {
        self.shared.as_ref().ok_or(ScatterError::StateMachine {
            state: self.state,
            detail: "output arena already written back",
        })
    }

    fn direct_scatter(&mut self) -> Result<()> {
        let out = self.shared_output()?;
        let slices = &self.slices;
        let updates = &self.updates;
        self.rendezvous.run_stage(ScatterState::DirectScatter, |w| {
            scatter_direct(&slices[w], updates, out);
        })?;
        self.report.runs = slices.iter().map(ProjectedSlice::len).sum();
        Ok(())
    }

    fn sorted_local_sum(&mut self) -> Result<()> {
        let out = self.shared_output()?;
        let slices = &self.slices;
        let updates = &self.updates;
        let accumulator = PartialSumAccumulator::new(self.geometry.inner_width);
        let sorter = IndexSorter::from_config(self.config);
        let min_sort_rows = self.config.min_sort_rows;
        let writes = AtomicUsize::new(0);
        self.rendezvous.run_stage(ScatterState::SortedLocalSum, |w| {
            let n = accumulator.scatter_slice(&slices[w], &sorter, min_sort_rows, updates, out);
            writes.fetch_add(n, Ordering::Relaxed);
        })?;
        self.report.runs = writes.into_inner();
        Ok(())
    }

    fn finalize(&mut self) -> Result<()> {
        let out = self.shared_output()?;
        let Some(scratch) = self.scratch.as_ref() else {
            return Err(ScatterError::StateMachine {
                state: self.state,
                detail: "no staged partials to finalize",
            });
        };
        let strategy = FinalizeStrategy::select(
            self.report.rows.saturating_sub(self.report.skipped_rows),
            self.geometry.var_rows,
            self.config.claim_ratio,
        );
        let reducer = DeterministicReducer::from_config(self.config, &self.rendezvous);
        reducer.phase3(scratch, out, strategy)?;
        let overflowed = scratch.shared().overflowed_rows();
        if !overflowed.is_empty() {
            log::warn!("scatter-add: {} destination row(s) overflowed during quantization", overflowed.len());
        }
        self.report.finalize = Some(strategy);
        self.report.overflowed_rows = overflowed;
        self.scratch = None;
        Ok(())
    }
}

/// Scatter-add `updates` into `output` at the rows named by `index`.
///
/// Out-of-range index rows are skipped and counted. Overflowed rows are
/// reported, not raised; see [`ScatterReport::ensure_complete`].
#[allow(clippy::too_many_arguments)]
pub fn scatter_add<I: IndexElement, T: Element>(
    index: IndexTensor<'_, I>,
    updates: UpdateTensor<'_, T>,
    output: OutputAccumulator<'_, T>,
    geometry: &ScatterGeometry,
    plan: &WorkerPlan,
    options: ScatterOptions,
    config: &ScatterConfig,
) -> Result<ScatterReport> {
    ScatterAddOrchestrator::new(index, updates, output, geometry, plan, options, config)?.run()
}
