//! Parallel DEHB: the asynchronous scheduler.
//!
//! [`Pdehb`] runs Hyperband brackets whose rungs are filled by Differential
//! Evolution instead of random sampling. Jobs go to a bounded
//! [`Dispatcher`]; as soon as a worker frees up the scheduler hands it the
//! next slot of the oldest open bracket, or opens the next bracket of the
//! cycle. Completions may arrive in any order.
//!
//! # Slot candidates
//!
//! Rung `r` of a bracket works on slots `0..n_r` of the population at its
//! budget level. For each slot:
//!
//! - empty slot: evaluate the best promoted parent not yet placed, or a
//!   uniform random vector in the first rung;
//! - occupied slot: evaluate a DE proposal whose target is the occupant and
//!   whose donors are the level population plus the promoted parents.
//!
//! The result is installed by greedy selection. When every slot of a rung has
//! completed, the best `n_{r+1}` slots are promoted into the next rung.
//!
//! # Example
//!
//! ```
//! use dehb::prelude::*;
//!
//! let space = SearchSpace::builder()
//!     .add(FloatParam::new("x", -5.0, 5.0))
//!     .add(FloatParam::new("y", -5.0, 5.0))
//!     .build()
//!     .unwrap();
//!
//! let mut dehb = Pdehb::builder()
//!     .min_budget(1.0)
//!     .max_budget(9.0)
//!     .seed(42)
//!     .space(space)
//!     .evaluator(|c: &Configuration, budget: Option<f64>| {
//!         let x = c.get_float("x").unwrap_or(0.0);
//!         let y = c.get_float("y").unwrap_or(0.0);
//!         Ok::<_, String>(Evaluation::new(x * x + y * y, budget.unwrap_or(1.0)))
//!     })
//!     .build()
//!     .unwrap();
//!
//! let result = dehb.run(StopCriteria::new().fevals(40)).unwrap();
//! assert_eq!(result.history.len(), 40);
//! let best = dehb.incumbent_config().unwrap().unwrap();
//! assert!(best.get_float("x").is_some());
//! ```

mod builder;
mod state;
mod stop;

use core::time::Duration;
use std::time::Instant;

pub use builder::PdehbBuilder;
pub use state::SchedulerState;
pub use stop::StopCriteria;

use state::{BracketRun, RunState, SlotRef, SlotStatus};
use stop::Progress;

use crate::bracket::BracketPlan;
use crate::codec::VectorCodec;
use crate::de::{DifferentialEvolution, Donor};
use crate::dispatcher::{Completion, Dispatcher, Job};
use crate::error::{Error, Result};
use crate::history::{History, Incumbent, Record, RunResult};
use crate::population::{Individual, Population};
use crate::rng_util;
use crate::space::Configuration;

/// How long to block on the dispatcher when no job could be submitted.
const POLL_INTERVAL: Duration = Duration::from_millis(100);

/// Outcome of trying to dispatch one slot.
enum Dispatch {
    Submitted,
    /// The vector could not be decoded; recorded as a failure.
    FailedInline,
    Rejected,
}

/// The DEHB optimizer with an asynchronous worker pool.
///
/// Build one with [`Pdehb::builder()`], call [`run`](Self::run) with a
/// [`StopCriteria`], and [`reset`](Self::reset) between independent runs.
pub struct Pdehb {
    de: DifferentialEvolution,
    plan: BracketPlan,
    codec: VectorCodec,
    dispatcher: Box<dyn Dispatcher>,
    seed: Option<u64>,
    drain_timeout: Duration,
    state: RunState,
}

impl Pdehb {
    /// Returns a builder with the default DE and Hyperband parameters.
    #[must_use]
    pub fn builder() -> PdehbBuilder {
        PdehbBuilder::new()
    }

    /// Run until a bound in `stop` is reached, then wait for the outstanding
    /// evaluations.
    ///
    /// Calling `run` again without [`reset`](Self::reset) continues from the
    /// current state; the bounds count from the start of each call while the
    /// returned history covers everything since the last reset.
    ///
    /// # Errors
    ///
    /// Returns [`Error::Unbounded`] if `stop` sets no bound. Evaluation
    /// failures are recorded in the history, never returned as errors.
    ///
    /// Blocks the calling thread. It may be called from inside a tokio
    /// runtime, but async code should move it to
    /// [`spawn_blocking`](tokio::task::spawn_blocking) to keep the executor
    /// responsive.
    pub fn run(&mut self, stop: StopCriteria) -> Result<RunResult> {
        if stop.is_unbounded() {
            return Err(Error::Unbounded);
        }

        #[cfg(feature = "tracing")]
        let _span = tracing::info_span!(
            "run",
            fevals = ?stop.fevals,
            brackets = ?stop.brackets,
            total_cost = ?stop.total_cost,
        )
        .entered();
        trace_info!(
            strategy = %self.de.strategy(),
            n_workers = self.dispatcher.capacity(),
            n_brackets = self.plan.n_brackets(),
            "run started"
        );

        self.state.started.get_or_insert_with(Instant::now);
        self.state.phase = SchedulerState::BracketActive;
        let mut progress = Progress::default();

        while !stop.reached(&progress) {
            let dispatched = self.fill_workers(&stop, &mut progress);
            if stop.reached(&progress) {
                break;
            }
            if self.dispatcher.outstanding_count() == 0 {
                if dispatched == 0 {
                    trace_warn!("nothing left to schedule; stopping early");
                    break;
                }
                continue;
            }
            let completions = if dispatched > 0 {
                self.dispatcher.poll_completed()
            } else {
                self.dispatcher.wait_completed(POLL_INTERVAL)
            };
            for completion in completions {
                self.absorb(completion, &mut progress);
            }
        }

        self.state.phase = SchedulerState::Draining;
        self.drain(&mut progress);
        self.state.phase = SchedulerState::Terminated;

        trace_info!(
            evaluations = progress.completed,
            finished_brackets = progress.finished_brackets,
            cost = progress.cost,
            incumbent = self.state.history.incumbent_fitness(),
            "run finished"
        );
        Ok(self.state.history.to_result())
    }

    /// Wait for outstanding work, discard all run state and return to
    /// [`SchedulerState::Idle`].
    ///
    /// The space, evaluator, dispatcher and DE/Hyperband parameters are
    /// kept. With a fixed seed the next run repeats the previous one.
    pub fn reset(&mut self) {
        if self.dispatcher.outstanding_count() > 0 {
            let late = self.dispatcher.drain(Some(self.drain_timeout));
            trace_debug!(discarded = late.len(), "discarded results on reset");
            drop(late);
        }
        self.dispatcher.abandon();
        self.state = RunState::new(&self.plan, self.seed);
        trace_debug!("state reset");
    }

    /// Seed used by the next [`reset`](Self::reset).
    pub fn reseed(&mut self, seed: u64) {
        self.seed = Some(seed);
    }

    /// Current lifecycle state.
    #[must_use]
    pub fn state(&self) -> SchedulerState {
        self.state.phase
    }

    /// Best evaluation so far.
    #[must_use]
    pub fn incumbent(&self) -> Option<&Incumbent> {
        self.state.history.incumbent()
    }

    /// Decoded configuration of the incumbent.
    ///
    /// # Errors
    ///
    /// Returns [`Error::ConfigCodec`] if the space cannot decode the vector.
    pub fn incumbent_config(&self) -> Result<Option<Configuration>> {
        self.incumbent()
            .map(|inc| self.codec.decode(&inc.vector))
            .transpose()
    }

    /// Every evaluation since the last reset.
    #[must_use]
    pub fn history(&self) -> &History {
        &self.state.history
    }

    /// Map a unit-hypercube vector (e.g. from the history) to a configuration.
    ///
    /// # Errors
    ///
    /// Returns [`Error::DimensionMismatch`] on a wrong length and
    /// [`Error::ConfigCodec`] on non-finite components.
    pub fn vector_to_config(&self, vector: &[f64]) -> Result<Configuration> {
        self.codec.decode(vector)
    }

    /// The bracket plan.
    #[must_use]
    pub fn plan(&self) -> &BracketPlan {
        &self.plan
    }

    /// The DE operator.
    #[must_use]
    pub fn de(&self) -> &DifferentialEvolution {
        &self.de
    }

    /// The vector codec.
    #[must_use]
    pub fn codec(&self) -> &VectorCodec {
        &self.codec
    }

    /// Population at budget `level` (an index into [`BracketPlan::budgets`]).
    #[must_use]
    pub fn population(&self, level: usize) -> Option<&Population> {
        self.state.populations.level(level)
    }

    /// How long a stopped run waits for outstanding evaluations.
    #[must_use]
    pub fn drain_timeout(&self) -> Duration {
        self.drain_timeout
    }

    /// Maximum concurrent evaluations.
    #[must_use]
    pub fn n_workers(&self) -> usize {
        self.dispatcher.capacity()
    }

    /// Brackets opened since the last reset.
    #[must_use]
    pub fn brackets_opened(&self) -> u64 {
        self.state.opened
    }

    /// Brackets finished since the last reset.
    #[must_use]
    pub fn brackets_finished(&self) -> u64 {
        self.state.finished
    }

    /// Submit jobs while workers are free; returns how many were handled.
    fn fill_workers(&mut self, stop: &StopCriteria, progress: &mut Progress) -> usize {
        let mut handled = 0;
        while self.dispatcher.has_capacity()
            && stop.allows_submission(progress)
            && !stop.reached(progress)
        {
            let Some(slot) = self.next_slot(stop, progress) else {
                break;
            };
            let vector = self.candidate(slot);
            match self.dispatch(slot, vector, progress) {
                Dispatch::Submitted | Dispatch::FailedInline => handled += 1,
                Dispatch::Rejected => break,
            }
        }
        handled
    }

    /// Next pending slot of the oldest open bracket, opening a new bracket
    /// if every open one is waiting on results.
    fn next_slot(&mut self, stop: &StopCriteria, progress: &mut Progress) -> Option<SlotRef> {
        let state = &mut self.state;
        if let Some((run, slot)) = state
            .active
            .iter()
            .find_map(|b| b.next_pending().map(|s| (b, s)))
        {
            return Some(SlotRef {
                seq: run.seq,
                rung: run.rung,
                slot,
                level: run.current().level,
            });
        }
        if !stop.allows_bracket(progress) {
            return None;
        }

        let bracket = self.plan.bracket(state.next_bracket).clone();
        state.next_bracket = (state.next_bracket + 1) % self.plan.n_brackets();
        let run = BracketRun::new(state.opened, bracket);
        state.opened += 1;
        progress.opened_brackets += 1;
        trace_debug!(
            bracket = run.bracket.id,
            rungs = run.bracket.rungs.len(),
            "bracket opened"
        );

        let slot = run.next_pending().map(|slot| SlotRef {
            seq: run.seq,
            rung: 0,
            slot,
            level: run.current().level,
        });
        state.active.push(run);
        slot
    }

    /// Vector to evaluate for `slot`.
    fn candidate(&mut self, slot: SlotRef) -> Vec<f64> {
        let dims = self.codec.dimensions();
        let state = &mut self.state;
        let occupied = state
            .populations
            .level(slot.level)
            .is_some_and(|p| p.get(slot.slot).is_some());

        if !occupied {
            let parent = state
                .active
                .iter_mut()
                .find(|b| b.seq == slot.seq)
                .and_then(|b| b.parent_for(slot.slot))
                .map(<[f64]>::to_vec);
            return parent.unwrap_or_else(|| rng_util::unit_vector(&mut state.rng, dims));
        }

        let parents: &[Vec<f64>] = state
            .active
            .iter()
            .find(|b| b.seq == slot.seq)
            .map(|b| b.parents.as_slice())
            .unwrap_or_default();
        let Some(population) = state.populations.level(slot.level) else {
            return rng_util::unit_vector(&mut state.rng, dims);
        };
        let Some(target) = population.get(slot.slot) else {
            return rng_util::unit_vector(&mut state.rng, dims);
        };

        let mut pool: Vec<Donor<'_>> = Vec::with_capacity(population.capacity() + parents.len());
        let mut exclude = None;
        for (i, individual) in population.iter() {
            if i == slot.slot {
                exclude = Some(pool.len());
            }
            pool.push(individual.as_donor());
        }
        pool.extend(parents.iter().map(|p| Donor::new(p, None)));
        self.de
            .propose(&target.vector, &pool, exclude, &mut state.rng)
    }

    fn dispatch(&mut self, slot: SlotRef, vector: Vec<f64>, progress: &mut Progress) -> Dispatch {
        let budget = self.plan.budgets()[slot.level];
        match self.codec.decode(&vector) {
            Ok(config) => {
                let job = Job {
                    vector,
                    config,
                    budget,
                };
                let Ok(handle) = self.dispatcher.submit(job) else {
                    trace_warn!("dispatcher rejected a job; waiting for a completion");
                    return Dispatch::Rejected;
                };
                self.mark(slot, SlotStatus::Submitted);
                self.state.pending.insert(handle, slot);
                progress.submitted += 1;
                Dispatch::Submitted
            }
            Err(err) => {
                trace_warn!(error = %err, "candidate could not be decoded");
                self.mark(slot, SlotStatus::Submitted);
                progress.submitted += 1;
                let record = Record {
                    vector,
                    fitness: f64::INFINITY,
                    budget,
                    cost: 0.0,
                    wall_clock_time: self.state.elapsed_secs(),
                    failure: Some(err.to_string()),
                };
                self.record(slot, record, progress);
                Dispatch::FailedInline
            }
        }
    }

    fn absorb(&mut self, completion: Completion, progress: &mut Progress) {
        let Some(slot) = self.state.pending.remove(&completion.handle) else {
            trace_debug!(job = %completion.handle, "ignoring completion of unknown job");
            return;
        };
        let Completion {
            job,
            fitness,
            cost,
            failure,
            ..
        } = completion;
        let record = Record {
            vector: job.vector,
            fitness,
            budget: job.budget,
            cost,
            wall_clock_time: self.state.elapsed_secs(),
            failure,
        };
        self.record(slot, record, progress);
    }

    /// Append to the history, install into the population and advance the
    /// bracket.
    #[allow(clippy::cast_possible_truncation)]
    fn record(&mut self, slot: SlotRef, record: Record, progress: &mut Progress) {
        progress.completed += 1;
        progress.cost += record.cost;

        let individual = Individual {
            vector: record.vector.clone(),
            fitness: Some(record.fitness),
            budget: record.budget,
            cost: record.cost,
            birth_generation: self.state.history.len() as u64,
        };
        if self.state.history.push(record) {
            trace_info!(
                fitness = self.state.history.incumbent_fitness(),
                evaluations = self.state.history.len(),
                "incumbent improved"
            );
        }
        if let Some(population) = self.state.populations.level_mut(slot.level) {
            population.offer(slot.slot, individual);
        }
        self.complete_slot(slot, progress);
    }

    fn mark(&mut self, slot: SlotRef, status: SlotStatus) {
        if let Some(run) = self
            .state
            .active
            .iter_mut()
            .find(|b| b.seq == slot.seq && b.rung == slot.rung)
            && let Some(s) = run.slots.get_mut(slot.slot)
        {
            *s = status;
        }
    }

    /// Mark `slot` done; promote or finish the bracket when its rung is
    /// complete.
    fn complete_slot(&mut self, slot: SlotRef, progress: &mut Progress) {
        self.mark(slot, SlotStatus::Done);

        let state = &mut self.state;
        let Some(idx) = state
            .active
            .iter()
            .position(|b| b.seq == slot.seq && b.rung == slot.rung)
        else {
            return;
        };
        let run = &mut state.active[idx];
        if !run.rung_complete() {
            return;
        }

        if let Some(k) = run.next_rung().map(|r| r.population_size) {
            let size = run.current().population_size;
            let parents: Vec<Vec<f64>> = state
                .populations
                .level(slot.level)
                .map(|p| {
                    p.top_k(k, size)
                        .into_iter()
                        .map(|ind| ind.vector.clone())
                        .collect()
                })
                .unwrap_or_default();
            trace_debug!(
                bracket = run.bracket.id,
                rung = run.rung + 1,
                promoted = parents.len(),
                "rung promoted"
            );
            run.advance(parents);
        } else {
            trace_info!(bracket = run.bracket.id, seq = run.seq, "bracket finished");
            state.active.remove(idx);
            state.finished += 1;
            progress.finished_brackets += 1;
        }
    }

    /// Collect outstanding results; abandon the rest after the drain timeout.
    fn drain(&mut self, progress: &mut Progress) {
        for completion in self.dispatcher.drain(Some(self.drain_timeout)) {
            self.absorb(completion, progress);
        }
        if self.state.pending.is_empty() && self.dispatcher.outstanding_count() == 0 {
            return;
        }

        trace_warn!(
            abandoned = self.state.pending.len(),
            "drain timed out; abandoning outstanding evaluations"
        );
        self.dispatcher.abandon();
        let abandoned: Vec<SlotRef> = self.state.pending.drain().map(|(_, s)| s).collect();
        for slot in abandoned {
            self.mark(slot, SlotStatus::Pending);
        }
    }
}

impl core::fmt::Debug for Pdehb {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        f.debug_struct("Pdehb")
            .field("strategy", &self.de.strategy())
            .field("plan", &self.plan)
            .field("n_workers", &self.dispatcher.capacity())
            .field("state", &self.state.phase)
            .field("evaluations", &self.state.history.len())
            .finish_non_exhaustive()
    }
}
