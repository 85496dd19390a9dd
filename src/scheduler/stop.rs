#[cfg(feature = "serde")]
use serde::{Deserialize, Serialize};

/// Bounds that end a call to [`Pdehb::run`](crate::Pdehb::run).
///
/// Every bound counts from the start of the call. The run stops as soon as
/// any set bound is reached; at least one must be set.
///
/// ```
/// use dehb::StopCriteria;
///
/// let stop = StopCriteria::new().fevals(100).total_cost(3600.0);
/// assert_eq!(stop.fevals, Some(100));
/// assert!(!stop.is_unbounded());
/// assert!(StopCriteria::new().is_unbounded());
/// ```
#[derive(Clone, Copy, Debug, Default, PartialEq)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub struct StopCriteria {
    /// Maximum number of function evaluations. Also caps submissions.
    pub fevals: Option<usize>,
    /// Number of brackets to finish. Also caps how many are opened.
    pub brackets: Option<usize>,
    /// Cumulative evaluation cost.
    pub total_cost: Option<f64>,
}

impl StopCriteria {
    /// No bounds set.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Stop after `n` evaluations.
    #[must_use]
    pub fn fevals(mut self, n: usize) -> Self {
        self.fevals = Some(n);
        self
    }

    /// Stop after `n` finished brackets.
    #[must_use]
    pub fn brackets(mut self, n: usize) -> Self {
        self.brackets = Some(n);
        self
    }

    /// Stop once the summed evaluation cost reaches `cost`.
    #[must_use]
    pub fn total_cost(mut self, cost: f64) -> Self {
        self.total_cost = Some(cost);
        self
    }

    /// Returns `true` if no bound is set.
    #[must_use]
    pub fn is_unbounded(&self) -> bool {
        self.fevals.is_none() && self.brackets.is_none() && self.total_cost.is_none()
    }

    /// Whether any bound is reached by the given per-call progress.
    pub(crate) fn reached(&self, progress: &Progress) -> bool {
        self.fevals.is_some_and(|n| progress.completed >= n)
            || self.brackets.is_some_and(|n| progress.finished_brackets >= n)
            || self.total_cost.is_some_and(|c| progress.cost >= c)
    }

    /// Whether another job may be dispatched.
    pub(crate) fn allows_submission(&self, progress: &Progress) -> bool {
        self.fevals.is_none_or(|n| progress.submitted < n)
    }

    /// Whether another bracket may be opened.
    pub(crate) fn allows_bracket(&self, progress: &Progress) -> bool {
        self.brackets.is_none_or(|n| progress.opened_brackets < n)
    }
}

/// Counters for one call to `run`.
#[derive(Clone, Copy, Debug, Default)]
pub(crate) struct Progress {
    pub(crate) submitted: usize,
    pub(crate) completed: usize,
    pub(crate) opened_brackets: usize,
    pub(crate) finished_brackets: usize,
    pub(crate) cost: f64,
}
