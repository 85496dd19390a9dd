//! Asynchronous job dispatch.
//!
//! The scheduler hands [`Job`]s to a [`Dispatcher`] and later collects
//! [`Completion`]s, in whatever order the evaluations finish. The built-in
//! [`WorkerPool`] runs jobs on a fixed number of blocking threads; custom
//! dispatchers (remote queues, deterministic test doubles) implement the
//! trait directly.
//!
//! Evaluation failures are values: a failed job produces a completion with
//! `fitness = +∞` and the failure message, never an `Err`.

mod pool;

use core::fmt;
use core::time::Duration;
use std::time::Instant;

pub use pool::WorkerPool;

use crate::error::Result;
use crate::evaluator::Evaluation;
use crate::space::Configuration;

/// Opaque identifier of a submitted job.
#[derive(Clone, Copy, Debug, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct JobHandle(u64);

impl JobHandle {
    /// Creates a handle from a raw id. Dispatchers must not reuse ids.
    #[must_use]
    pub const fn new(id: u64) -> Self {
        Self(id)
    }

    /// The raw id.
    #[must_use]
    pub const fn id(self) -> u64 {
        self.0
    }
}

impl fmt::Display for JobHandle {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "job#{}", self.0)
    }
}

/// One configuration to evaluate at one budget.
#[derive(Clone, Debug)]
pub struct Job {
    /// Unit-hypercube vector the configuration was decoded from.
    pub vector: Vec<f64>,
    /// Decoded configuration passed to the evaluator.
    pub config: Configuration,
    /// Fidelity to evaluate at.
    pub budget: f64,
}

/// Outcome of one job.
#[derive(Clone, Debug)]
pub struct Completion {
    /// Handle returned by [`Dispatcher::submit`].
    pub handle: JobHandle,
    /// The job as submitted.
    pub job: Job,
    /// Objective value, `+∞` on failure.
    pub fitness: f64,
    /// Reported cost, `0` if the evaluator failed before reporting one.
    pub cost: f64,
    /// Failure message, if the evaluation failed.
    pub failure: Option<String>,
    /// Time between submission and completion.
    pub elapsed: Duration,
}

impl Completion {
    /// Build a completion from an evaluator outcome.
    ///
    /// Errors and non-finite fitness or cost become failures.
    #[must_use]
    pub fn from_outcome(
        handle: JobHandle,
        job: Job,
        outcome: core::result::Result<Evaluation, String>,
        elapsed: Duration,
    ) -> Self {
        match outcome {
            Ok(eval) if eval.fitness.is_finite() && eval.cost.is_finite() => Self {
                handle,
                job,
                fitness: eval.fitness,
                cost: eval.cost,
                failure: None,
                elapsed,
            },
            Ok(eval) => {
                let cost = if eval.cost.is_finite() { eval.cost } else { 0.0 };
                let message = format!(
                    "non-finite evaluation (fitness {}, cost {})",
                    eval.fitness, eval.cost
                );
                Self::failure(handle, job, message, elapsed).with_cost(cost)
            }
            Err(message) => Self::failure(handle, job, message, elapsed),
        }
    }

    /// A failed completion.
    #[must_use]
    pub fn failure(
        handle: JobHandle,
        job: Job,
        message: impl Into<String>,
        elapsed: Duration,
    ) -> Self {
        Self {
            handle,
            job,
            fitness: f64::INFINITY,
            cost: 0.0,
            failure: Some(message.into()),
            elapsed,
        }
    }

    fn with_cost(mut self, cost: f64) -> Self {
        self.cost = cost;
        self
    }

    /// Returns `true` if the evaluation failed.
    #[must_use]
    pub fn is_failure(&self) -> bool {
        self.failure.is_some()
    }
}

/// Polling period used by [`Dispatcher::drain`].
const DRAIN_TICK: Duration = Duration::from_millis(50);

/// A bounded pool that evaluates jobs asynchronously.
///
/// Invariant: [`outstanding_count`](Dispatcher::outstanding_count) never
/// exceeds [`capacity`](Dispatcher::capacity).
pub trait Dispatcher: Send {
    /// Start evaluating `job`.
    ///
    /// # Errors
    ///
    /// Returns [`Error::WorkerPoolSaturated`](crate::Error::WorkerPoolSaturated)
    /// when all workers are busy.
    fn submit(&mut self, job: Job) -> Result<JobHandle>;

    /// Completions that are ready now, without blocking.
    fn poll_completed(&mut self) -> Vec<Completion>;

    /// Block until at least one completion is ready or `timeout` elapses,
    /// then return everything that is ready.
    fn wait_completed(&mut self, timeout: Duration) -> Vec<Completion>;

    /// Jobs submitted but not yet returned by a poll.
    fn outstanding_count(&self) -> usize;

    /// Maximum number of outstanding jobs.
    fn capacity(&self) -> usize;

    /// Forget every outstanding job; their completions are discarded.
    fn abandon(&mut self);

    /// Returns `true` if another job can be submitted.
    fn has_capacity(&self) -> bool {
        self.outstanding_count() < self.capacity()
    }

    /// Collect completions until nothing is outstanding or `timeout`
    /// elapses (`None` waits indefinitely). Jobs still running afterwards
    /// remain outstanding.
    fn drain(&mut self, timeout: Option<Duration>) -> Vec<Completion> {
        let deadline = timeout.map(|t| Instant::now() + t);
        let mut collected = self.poll_completed();
        while self.outstanding_count() > 0 {
            let tick = match deadline {
                Some(deadline) => {
                    let left = deadline.saturating_duration_since(Instant::now());
                    if left.is_zero() {
                        break;
                    }
                    left.min(DRAIN_TICK)
                }
                None => DRAIN_TICK,
            };
            collected.extend(self.wait_completed(tick));
        }
        collected
    }
}

impl<D: Dispatcher + ?Sized> Dispatcher for Box<D> {
    fn submit(&mut self, job: Job) -> Result<JobHandle> {
        (**self).submit(job)
    }

    fn poll_completed(&mut self) -> Vec<Completion> {
        (**self).poll_completed()
    }

    fn wait_completed(&mut self, timeout: Duration) -> Vec<Completion> {
        (**self).wait_completed(timeout)
    }

    fn outstanding_count(&self) -> usize {
        (**self).outstanding_count()
    }

    fn capacity(&self) -> usize {
        (**self).capacity()
    }

    fn abandon(&mut self) {
        (**self).abandon();
    }

    fn drain(&mut self, timeout: Option<Duration>) -> Vec<Completion> {
        (**self).drain(timeout)
    }
}
