//! Evaluation history, incumbent tracking and run output.

#[cfg(feature = "serde")]
use serde::{Deserialize, Serialize};

/// One completed evaluation.
#[derive(Clone, Debug, PartialEq)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub struct Record {
    /// Unit-hypercube vector that was evaluated.
    pub vector: Vec<f64>,
    /// Objective value (`+∞` for failures).
    pub fitness: f64,
    /// Budget it was evaluated at.
    pub budget: f64,
    /// Cost reported by the evaluator.
    pub cost: f64,
    /// Seconds since the run started when the result was collected.
    pub wall_clock_time: f64,
    /// Failure message, if the evaluation failed.
    #[cfg_attr(feature = "serde", serde(default, skip_serializing_if = "Option::is_none"))]
    pub failure: Option<String>,
}

/// Best evaluation seen so far, at any budget.
#[derive(Clone, Debug, PartialEq)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub struct Incumbent {
    /// Unit-hypercube vector of the best configuration.
    pub vector: Vec<f64>,
    /// Its fitness.
    pub fitness: f64,
    /// The budget it was evaluated at.
    pub budget: f64,
}

/// Append-only log of completed evaluations in completion order.
///
/// Alongside the records it keeps the incumbent, the trajectory (incumbent
/// fitness after each record) and the per-record runtime.
#[derive(Clone, Debug, Default)]
pub struct History {
    records: Vec<Record>,
    trajectory: Vec<f64>,
    runtime: Vec<f64>,
    incumbent: Option<Incumbent>,
}

impl History {
    /// Creates an empty history.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Append `record`; returns `true` if it became the new incumbent.
    ///
    /// Only finite fitness strictly better than the incumbent replaces it.
    pub fn push(&mut self, record: Record) -> bool {
        let improved = record.fitness.is_finite()
            && self
                .incumbent
                .as_ref()
                .is_none_or(|inc| record.fitness < inc.fitness);
        if improved {
            self.incumbent = Some(Incumbent {
                vector: record.vector.clone(),
                fitness: record.fitness,
                budget: record.budget,
            });
        }
        self.trajectory.push(self.incumbent_fitness());
        self.runtime.push(record.cost);
        self.records.push(record);
        improved
    }

    /// All records.
    #[must_use]
    pub fn records(&self) -> &[Record] {
        &self.records
    }

    /// Number of records.
    #[must_use]
    pub fn len(&self) -> usize {
        self.records.len()
    }

    /// Returns `true` if nothing has been recorded.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.records.is_empty()
    }

    /// The current incumbent, if any evaluation succeeded.
    #[must_use]
    pub fn incumbent(&self) -> Option<&Incumbent> {
        self.incumbent.as_ref()
    }

    /// Incumbent fitness, `+∞` before the first success.
    #[must_use]
    pub fn incumbent_fitness(&self) -> f64 {
        self.incumbent.as_ref().map_or(f64::INFINITY, |i| i.fitness)
    }

    /// Sum of all recorded costs.
    #[must_use]
    pub fn total_cost(&self) -> f64 {
        self.runtime.iter().sum()
    }

    /// Snapshot as a [`RunResult`].
    #[must_use]
    pub fn to_result(&self) -> RunResult {
        RunResult {
            trajectory: self.trajectory.clone(),
            runtime: self.runtime.clone(),
            history: self.records.clone(),
            incumbent: self.incumbent.clone(),
        }
    }
}

/// What [`Pdehb::run`](crate::Pdehb::run) returns.
///
/// `trajectory[i]` is the incumbent fitness after the `i`-th completed
/// evaluation and `runtime[i]` that evaluation's cost; both line up with
/// `history`.
#[derive(Clone, Debug, Default, PartialEq)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub struct RunResult {
    /// Incumbent fitness after each evaluation.
    pub trajectory: Vec<f64>,
    /// Cost of each evaluation.
    pub runtime: Vec<f64>,
    /// Every completed evaluation in completion order.
    pub history: Vec<Record>,
    /// Best evaluation of the run.
    pub incumbent: Option<Incumbent>,
}

impl RunResult {
    /// Running sum of `runtime`.
    ///
    /// ```
    /// let result = dehb::RunResult {
    ///     runtime: vec![1.0, 3.0, 9.0],
    ///     ..Default::default()
    /// };
    /// assert_eq!(result.cumulative_runtime(), vec![1.0, 4.0, 13.0]);
    /// ```
    #[must_use]
    pub fn cumulative_runtime(&self) -> Vec<f64> {
        self.runtime
            .iter()
            .scan(0.0, |acc, &c| {
                *acc += c;
                Some(*acc)
            })
            .collect()
    }

    /// Indices into `history` where the incumbent improved.
    ///
    /// Callers use these to re-score each new incumbent, e.g. on a test set.
    #[must_use]
    pub fn improvements(&self) -> Vec<usize> {
        let mut best = f64::INFINITY;
        let mut out = Vec::new();
        for (i, &t) in self.trajectory.iter().enumerate() {
            if t < best {
                best = t;
                out.push(i);
            }
        }
        out
    }

    /// Number of completed evaluations.
    #[must_use]
    pub fn len(&self) -> usize {
        self.history.len()
    }

    /// Returns `true` if no evaluation completed.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.history.is_empty()
    }
}
