use core::time::Duration;
use std::panic::{self, AssertUnwindSafe};
use std::sync::mpsc::{self, RecvTimeoutError};
use std::sync::Arc;
use std::time::Instant;

use tokio::runtime::{Builder, Handle, Runtime};

use super::{Completion, Dispatcher, Job, JobHandle};
use crate::error::{Error, Result};
use crate::evaluator::{self, BoxedEvaluator, Evaluator};

/// A completion tagged with the epoch its job was submitted in.
type Message = (u64, Completion);

/// Fixed-size pool of worker threads evaluating jobs with one evaluator.
///
/// Each job runs in [`spawn_blocking`](tokio::runtime::Handle::spawn_blocking)
/// on a private tokio runtime whose blocking pool is capped at `n_workers`.
/// Results come back over a channel that the caller reads without entering
/// the runtime, so the pool also works when driven from inside another tokio
/// runtime. Waiting blocks the calling thread; async callers should drive
/// the optimizer from [`spawn_blocking`](tokio::task::spawn_blocking).
/// Panics, evaluator errors and non-finite results are reported as failed
/// completions.
///
/// # Examples
///
/// ```
/// use core::time::Duration;
///
/// use dehb::dispatcher::{Dispatcher, Job, WorkerPool};
/// use dehb::evaluator::Evaluation;
/// use dehb::space::Configuration;
///
/// let mut pool = WorkerPool::new(
///     |_: &Configuration, budget: Option<f64>| {
///         Ok::<_, String>(Evaluation::new(1.0, budget.unwrap_or(0.0)))
///     },
///     2,
/// )
/// .unwrap();
///
/// pool.submit(Job { vector: vec![], config: Configuration::new(), budget: 3.0 }).unwrap();
/// let done = pool.drain(Some(Duration::from_secs(5)));
/// assert_eq!(done.len(), 1);
/// assert_eq!(done[0].cost, 3.0);
/// ```
pub struct WorkerPool {
    runtime: Option<Runtime>,
    handle: Handle,
    evaluator: BoxedEvaluator,
    n_workers: usize,
    outstanding: usize,
    epoch: u64,
    next_id: u64,
    tx: mpsc::Sender<Message>,
    rx: mpsc::Receiver<Message>,
}

impl WorkerPool {
    /// Creates a pool of `n_workers` threads calling `evaluator`.
    ///
    /// # Errors
    ///
    /// Returns [`Error::InvalidWorkerCount`] if `n_workers` is zero and
    /// [`Error::TaskError`] if the runtime cannot be started.
    pub fn new<E>(evaluator: E, n_workers: usize) -> Result<Self>
    where
        E: Evaluator + 'static,
    {
        Self::from_boxed(evaluator::boxed(evaluator), n_workers)
    }

    pub(crate) fn from_boxed(evaluator: BoxedEvaluator, n_workers: usize) -> Result<Self> {
        if n_workers == 0 {
            return Err(Error::InvalidWorkerCount);
        }
        let runtime = Builder::new_multi_thread()
            .worker_threads(1)
            .max_blocking_threads(n_workers)
            .thread_name("dehb-worker")
            .build()
            .map_err(|e| Error::TaskError(e.to_string()))?;
        let handle = runtime.handle().clone();
        let (tx, rx) = mpsc::channel();

        Ok(Self {
            runtime: Some(runtime),
            handle,
            evaluator,
            n_workers,
            outstanding: 0,
            epoch: 0,
            next_id: 0,
            tx,
            rx,
        })
    }

    /// Keep completions of the current epoch; count them off.
    fn accept(&mut self, (epoch, completion): Message, out: &mut Vec<Completion>) {
        if epoch != self.epoch {
            trace_debug!(job = %completion.handle, "discarding stale completion");
            return;
        }
        self.outstanding = self.outstanding.saturating_sub(1);
        if completion.is_failure() {
            trace_debug!(job = %completion.handle, reason = ?completion.failure, "evaluation failed");
        }
        out.push(completion);
    }
}

impl Dispatcher for WorkerPool {
    fn submit(&mut self, job: Job) -> Result<JobHandle> {
        if self.outstanding >= self.n_workers {
            return Err(Error::WorkerPoolSaturated {
                n_workers: self.n_workers,
            });
        }
        let handle = JobHandle::new(self.next_id);
        self.next_id += 1;
        self.outstanding += 1;

        let evaluator = Arc::clone(&self.evaluator);
        let tx = self.tx.clone();
        let epoch = self.epoch;
        self.handle.spawn_blocking(move || {
            let started = Instant::now();
            let outcome = panic::catch_unwind(AssertUnwindSafe(|| {
                evaluator(&job.config, Some(job.budget))
            }))
            .unwrap_or_else(|payload| Err(panic_message(payload.as_ref())));
            let completion = Completion::from_outcome(handle, job, outcome, started.elapsed());
            // the receiver is gone only once the pool is dropped
            let _ = tx.send((epoch, completion));
        });

        Ok(handle)
    }

    fn poll_completed(&mut self) -> Vec<Completion> {
        let mut out = Vec::new();
        while let Ok(message) = self.rx.try_recv() {
            self.accept(message, &mut out);
        }
        out
    }

    fn wait_completed(&mut self, timeout: Duration) -> Vec<Completion> {
        let mut out = self.poll_completed();
        if !out.is_empty() || self.outstanding == 0 {
            return out;
        }
        let deadline = Instant::now() + timeout;
        while out.is_empty() {
            let left = deadline.saturating_duration_since(Instant::now());
            if left.is_zero() {
                break;
            }
            match self.rx.recv_timeout(left) {
                Ok(message) => self.accept(message, &mut out),
                Err(RecvTimeoutError::Timeout | RecvTimeoutError::Disconnected) => break,
            }
        }
        out.extend(self.poll_completed());
        out
    }

    fn outstanding_count(&self) -> usize {
        self.outstanding
    }

    fn capacity(&self) -> usize {
        self.n_workers
    }

    fn abandon(&mut self) {
        if self.outstanding > 0 {
            trace_warn!(
                abandoned = self.outstanding,
                "abandoning outstanding evaluations"
            );
        }
        self.epoch += 1;
        self.outstanding = 0;
    }
}

impl Drop for WorkerPool {
    fn drop(&mut self) {
        // Abandoned evaluations may still be running; do not wait for them.
        if let Some(runtime) = self.runtime.take() {
            runtime.shutdown_background();
        }
    }
}

impl core::fmt::Debug for WorkerPool {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        f.debug_struct("WorkerPool")
            .field("n_workers", &self.n_workers)
            .field("outstanding", &self.outstanding)
            .field("epoch", &self.epoch)
            .finish_non_exhaustive()
    }
}

fn panic_message(payload: &(dyn core::any::Any + Send)) -> String {
    if let Some(s) = payload.downcast_ref::<&str>() {
        format!("evaluator panicked: {s}")
    } else if let Some(s) = payload.downcast_ref::<String>() {
        format!("evaluator panicked: {s}")
    } else {
        "evaluator panicked".to_owned()
    }
}
