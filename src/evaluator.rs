//! The [`Evaluator`] trait defines what gets optimized.
//!
//! An evaluator receives a decoded [`Configuration`] and the budget (fidelity)
//! to train it at, and returns an [`Evaluation`]: a fitness to minimize and
//! the cost it took. Evaluators run on worker threads and may be called
//! concurrently, hence `Send + Sync`.
//!
//! Plain closures work directly:
//!
//! ```
//! use dehb::evaluator::{Evaluation, Evaluator};
//! use dehb::space::Configuration;
//!
//! let f = |config: &Configuration, budget: Option<f64>| {
//!     let x = config.get_float("x").unwrap_or(0.0);
//!     Ok::<_, String>(Evaluation::new(x * x, budget.unwrap_or(1.0)))
//! };
//! let config = Configuration::new().with("x", dehb::ParamValue::Float(2.0));
//! let eval = f.evaluate(&config, Some(3.0)).unwrap();
//! assert_eq!(eval.fitness, 4.0);
//! assert_eq!(eval.cost, 3.0);
//! ```
//!
//! Stateful evaluators that cannot be called concurrently implement
//! [`EvaluateMut`] and are shared through [`Serialized`], which lets one
//! worker in at a time.

use std::sync::Arc;

use parking_lot::Mutex;

#[cfg(feature = "serde")]
use serde::{Deserialize, Serialize};

use crate::space::Configuration;

/// Result of one evaluation.
#[derive(Clone, Copy, Debug, PartialEq)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub struct Evaluation {
    /// Objective value; lower is better.
    pub fitness: f64,
    /// Cost of the evaluation (usually wall-clock seconds).
    pub cost: f64,
}

impl Evaluation {
    /// Creates an evaluation result.
    #[must_use]
    pub fn new(fitness: f64, cost: f64) -> Self {
        Self { fitness, cost }
    }
}

/// A thread-safe objective function.
///
/// # Thread safety
///
/// Workers call [`evaluate`](Evaluator::evaluate) from several threads at
/// once. Wrap stateful objectives in [`Serialized`].
pub trait Evaluator: Send + Sync {
    /// The error type returned by [`evaluate`](Evaluator::evaluate).
    type Error: ToString + 'static;

    /// Evaluate `config` at `budget`.
    ///
    /// # Errors
    ///
    /// Any error whose type implements `ToString`. An error marks the
    /// evaluation as failed; the run continues.
    fn evaluate(&self, config: &Configuration, budget: Option<f64>)
    -> Result<Evaluation, Self::Error>;
}

impl<F, E> Evaluator for F
where
    F: Fn(&Configuration, Option<f64>) -> Result<Evaluation, E> + Send + Sync,
    E: ToString + 'static,
{
    type Error = E;

    fn evaluate(&self, config: &Configuration, budget: Option<f64>) -> Result<Evaluation, E> {
        self(config, budget)
    }
}

/// An objective that needs exclusive access while it runs.
pub trait EvaluateMut: Send {
    /// The error type returned by [`evaluate_mut`](EvaluateMut::evaluate_mut).
    type Error: ToString + 'static;

    /// Evaluate `config` at `budget`.
    ///
    /// # Errors
    ///
    /// Any error whose type implements `ToString`.
    fn evaluate_mut(
        &mut self,
        config: &Configuration,
        budget: Option<f64>,
    ) -> Result<Evaluation, Self::Error>;
}

/// Shared proxy that serializes calls into an [`EvaluateMut`] objective.
///
/// Clones share the same inner objective.
///
/// ```
/// use dehb::evaluator::{EvaluateMut, Evaluation, Evaluator, Serialized};
/// use dehb::space::Configuration;
///
/// struct Counter(u32);
///
/// impl EvaluateMut for Counter {
///     type Error = String;
///
///     fn evaluate_mut(&mut self, _: &Configuration, _: Option<f64>) -> Result<Evaluation, String> {
///         self.0 += 1;
///         Ok(Evaluation::new(f64::from(self.0), 1.0))
///     }
/// }
///
/// let proxy = Serialized::new(Counter(0));
/// let config = Configuration::new();
/// proxy.evaluate(&config, None).unwrap();
/// assert_eq!(proxy.evaluate(&config, None).unwrap().fitness, 2.0);
/// assert_eq!(proxy.into_inner().map(|c| c.0), Some(2));
/// ```
#[derive(Debug)]
pub struct Serialized<E> {
    inner: Arc<Mutex<E>>,
}

impl<E> Serialized<E> {
    /// Wraps `evaluator`.
    #[must_use]
    pub fn new(evaluator: E) -> Self {
        Self {
            inner: Arc::new(Mutex::new(evaluator)),
        }
    }

    /// Unwraps the objective if this is the last handle to it.
    #[must_use]
    pub fn into_inner(self) -> Option<E> {
        Arc::into_inner(self.inner).map(Mutex::into_inner)
    }
}

impl<E> Clone for Serialized<E> {
    fn clone(&self) -> Self {
        Self {
            inner: Arc::clone(&self.inner),
        }
    }
}

impl<E: EvaluateMut> Evaluator for Serialized<E> {
    type Error = E::Error;

    fn evaluate(
        &self,
        config: &Configuration,
        budget: Option<f64>,
    ) -> Result<Evaluation, Self::Error> {
        self.inner.lock().evaluate_mut(config, budget)
    }
}

/// Type-erased evaluator used by the worker pool.
pub(crate) type BoxedEvaluator =
    Arc<dyn Fn(&Configuration, Option<f64>) -> Result<Evaluation, String> + Send + Sync>;

/// Erase the error type of `evaluator`.
pub(crate) fn boxed<E>(evaluator: E) -> BoxedEvaluator
where
    E: Evaluator + 'static,
{
    Arc::new(move |config: &Configuration, budget: Option<f64>| {
        evaluator
            .evaluate(config, budget)
            .map_err(|e| e.to_string())
    })
}
