use core::time::Duration;
use std::sync::Arc;
use std::sync::atomic::{AtomicUsize, Ordering};

use dehb::dispatcher::{Completion, Dispatcher, Job, JobHandle};
use dehb::prelude::*;

/// `d` float dimensions `x0..x{d-1}`, each on `[0, 1]`.
pub fn unit_space(d: usize) -> SearchSpace {
    let mut builder = SearchSpace::builder();
    for i in 0..d {
        builder = builder.add(FloatParam::new(format!("x{i}"), 0.0, 1.0));
    }
    builder.build().unwrap()
}

/// Sum of all float values of a configuration.
pub fn sum_of(config: &Configuration) -> f64 {
    config.iter().filter_map(|(name, _)| config.get_float(name)).sum()
}

/// Fitness = sum of the coordinates, cost = budget.
pub fn sum_evaluator(config: &Configuration, budget: Option<f64>) -> Result<Evaluation> {
    Ok(Evaluation::new(sum_of(config), budget.unwrap_or(1.0)))
}

/// Eta 3 over budgets 1..9 with a single worker.
pub fn sequential(d: usize, seed: u64) -> Pdehb {
    Pdehb::builder()
        .min_budget(1.0)
        .max_budget(9.0)
        .seed(seed)
        .space(unit_space(d))
        .evaluator(sum_evaluator)
        .build()
        .unwrap()
}

pub fn assert_incumbent_is_history_min(result: &RunResult) {
    let best = result
        .history
        .iter()
        .map(|r| r.fitness)
        .filter(|f| f.is_finite())
        .fold(f64::INFINITY, f64::min);
    match &result.incumbent {
        Some(inc) => assert_eq!(inc.fitness, best),
        None => assert!(best.is_infinite()),
    }
}

/// Holds jobs until every slot is busy (or the scheduler waits), then
/// completes them newest first.
pub struct ReverseDispatcher {
    capacity: usize,
    queue: Vec<(JobHandle, Job)>,
    next_id: u64,
}

impl ReverseDispatcher {
    pub fn new(capacity: usize) -> Self {
        Self {
            capacity,
            queue: Vec::new(),
            next_id: 0,
        }
    }

    fn release(&mut self) -> Vec<Completion> {
        self.queue
            .drain(..)
            .rev()
            .map(|(handle, job)| {
                let outcome = sum_evaluator(&job.config, Some(job.budget)).map_err(|e| e.to_string());
                Completion::from_outcome(handle, job, outcome, Duration::ZERO)
            })
            .collect()
    }
}

impl Dispatcher for ReverseDispatcher {
    fn submit(&mut self, job: Job) -> Result<JobHandle> {
        if self.queue.len() >= self.capacity {
            return Err(Error::WorkerPoolSaturated {
                n_workers: self.capacity,
            });
        }
        let handle = JobHandle::new(self.next_id);
        self.next_id += 1;
        self.queue.push((handle, job));
        Ok(handle)
    }

    fn poll_completed(&mut self) -> Vec<Completion> {
        if self.queue.len() == self.capacity {
            self.release()
        } else {
            Vec::new()
        }
    }

    fn wait_completed(&mut self, _timeout: Duration) -> Vec<Completion> {
        self.release()
    }

    fn outstanding_count(&self) -> usize {
        self.queue.len()
    }

    fn capacity(&self) -> usize {
        self.capacity
    }

    fn abandon(&mut self) {
        self.queue.clear();
    }
}

/// Completes the first job it receives and never any other.
pub struct StuckDispatcher {
    queue: Vec<(JobHandle, Job)>,
    next_id: u64,
    abandoned: Arc<AtomicUsize>,
}

impl StuckDispatcher {
    /// `abandoned` counts the jobs dropped by [`Dispatcher::abandon`].
    pub fn new(abandoned: Arc<AtomicUsize>) -> Self {
        Self {
            queue: Vec::new(),
            next_id: 0,
            abandoned,
        }
    }
}

impl Dispatcher for StuckDispatcher {
    fn submit(&mut self, job: Job) -> Result<JobHandle> {
        if self.queue.len() >= 2 {
            return Err(Error::WorkerPoolSaturated { n_workers: 2 });
        }
        let handle = JobHandle::new(self.next_id);
        self.next_id += 1;
        self.queue.push((handle, job));
        Ok(handle)
    }

    fn poll_completed(&mut self) -> Vec<Completion> {
        match self.queue.iter().position(|(h, _)| h.id() == 0) {
            Some(i) => {
                let (handle, job) = self.queue.remove(i);
                let eval = Evaluation::new(0.5, 1.0);
                vec![Completion::from_outcome(handle, job, Ok(eval), Duration::ZERO)]
            }
            None => Vec::new(),
        }
    }

    fn wait_completed(&mut self, timeout: Duration) -> Vec<Completion> {
        let ready = self.poll_completed();
        if ready.is_empty() {
            std::thread::sleep(timeout.min(Duration::from_millis(5)));
        }
        ready
    }

    fn outstanding_count(&self) -> usize {
        self.queue.len()
    }

    fn capacity(&self) -> usize {
        2
    }

    fn abandon(&mut self) {
        self.abandoned.fetch_add(self.queue.len(), Ordering::SeqCst);
        self.queue.clear();
    }
}
