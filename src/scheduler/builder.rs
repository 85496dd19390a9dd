use core::time::Duration;
use std::sync::Arc;

use crate::bracket;
use crate::codec::VectorCodec;
use crate::de::{DeStrategy, DifferentialEvolution};
use crate::dispatcher::{Dispatcher, WorkerPool};
use crate::error::{Error, Result};
use crate::evaluator::{self, BoxedEvaluator, Evaluator};
use crate::space::ConfigSpace;

use super::Pdehb;
use super::state::RunState;

enum Backend {
    Evaluator(BoxedEvaluator),
    Dispatcher(Box<dyn Dispatcher>),
}

/// A builder for constructing [`Pdehb`] instances with a fluent API.
///
/// Created via [`Pdehb::builder()`]. Collects the DE and Hyperband
/// parameters, the configuration space and the evaluator (or a custom
/// [`Dispatcher`]) before constructing the optimizer.
///
/// # Defaults
///
/// - Strategy: `rand1_bin`
/// - Mutation factor `F`: 0.5
/// - Crossover probability `CR`: 0.5
/// - `eta`: 3
/// - Workers: 1
/// - Seed: random
/// - Drain timeout: [`DEFAULT_DRAIN_TIMEOUT`](Self::DEFAULT_DRAIN_TIMEOUT)
///
/// `min_budget`, `max_budget`, the space and the evaluator are required.
///
/// # Examples
///
/// ```
/// use dehb::prelude::*;
///
/// let space = SearchSpace::builder()
///     .add(FloatParam::new("x", -5.0, 5.0))
///     .build()
///     .unwrap();
///
/// let dehb = Pdehb::builder()
///     .strategy(DeStrategy::CurrentToBest1Bin)
///     .min_budget(1.0)
///     .max_budget(27.0)
///     .n_workers(2)
///     .seed(7)
///     .space(space)
///     .evaluator(|c: &Configuration, b: Option<f64>| {
///         let x = c.get_float("x").unwrap_or(0.0);
///         Ok::<_, String>(Evaluation::new(x * x, b.unwrap_or(1.0)))
///     })
///     .build()
///     .unwrap();
///
/// assert_eq!(dehb.plan().n_brackets(), 4);
/// ```
pub struct PdehbBuilder {
    strategy: DeStrategy,
    mutation_factor: f64,
    crossover_prob: f64,
    eta: f64,
    min_budget: Option<f64>,
    max_budget: Option<f64>,
    n_workers: usize,
    seed: Option<u64>,
    drain_timeout: Duration,
    space: Option<Arc<dyn ConfigSpace>>,
    backend: Option<Backend>,
}

impl PdehbBuilder {
    /// How long a stopped run waits for outstanding evaluations before
    /// abandoning them, unless overridden with
    /// [`drain_timeout`](Self::drain_timeout).
    pub const DEFAULT_DRAIN_TIMEOUT: Duration = Duration::from_secs(10);

    pub(super) fn new() -> Self {
        Self {
            strategy: DeStrategy::default(),
            mutation_factor: 0.5,
            crossover_prob: 0.5,
            eta: 3.0,
            min_budget: None,
            max_budget: None,
            n_workers: 1,
            seed: None,
            drain_timeout: Self::DEFAULT_DRAIN_TIMEOUT,
            space: None,
            backend: None,
        }
    }

    /// Set the DE strategy.
    #[must_use]
    pub fn strategy(mut self, strategy: DeStrategy) -> Self {
        self.strategy = strategy;
        self
    }

    /// Set the mutation factor `F ∈ (0, 2]`.
    #[must_use]
    pub fn mutation_factor(mut self, f: f64) -> Self {
        self.mutation_factor = f;
        self
    }

    /// Set the crossover probability `CR ∈ [0, 1]`.
    #[must_use]
    pub fn crossover_prob(mut self, cr: f64) -> Self {
        self.crossover_prob = cr;
        self
    }

    /// Set the Hyperband reduction factor (`> 1`).
    #[must_use]
    pub fn eta(mut self, eta: f64) -> Self {
        self.eta = eta;
        self
    }

    /// Set the smallest budget.
    #[must_use]
    pub fn min_budget(mut self, budget: f64) -> Self {
        self.min_budget = Some(budget);
        self
    }

    /// Set the largest budget.
    #[must_use]
    pub fn max_budget(mut self, budget: f64) -> Self {
        self.max_budget = Some(budget);
        self
    }

    /// Set the number of concurrent evaluations of the built-in worker pool.
    ///
    /// Ignored when a custom [`dispatcher`](Self::dispatcher) is given.
    #[must_use]
    pub fn n_workers(mut self, n: usize) -> Self {
        self.n_workers = n;
        self
    }

    /// Seed the random number generator for reproducible runs.
    #[must_use]
    pub fn seed(mut self, seed: u64) -> Self {
        self.seed = Some(seed);
        self
    }

    /// Give up on outstanding evaluations this long after a stop bound fires.
    #[must_use]
    pub fn drain_timeout(mut self, timeout: Duration) -> Self {
        self.drain_timeout = timeout;
        self
    }

    /// Set the configuration space.
    #[must_use]
    pub fn space(mut self, space: impl ConfigSpace + 'static) -> Self {
        self.space = Some(Arc::new(space));
        self
    }

    /// Set the objective, evaluated on the built-in [`WorkerPool`].
    #[must_use]
    pub fn evaluator(mut self, evaluator: impl Evaluator + 'static) -> Self {
        self.backend = Some(Backend::Evaluator(evaluator::boxed(evaluator)));
        self
    }

    /// Use a custom dispatcher instead of the built-in worker pool.
    #[must_use]
    pub fn dispatcher(mut self, dispatcher: impl Dispatcher + 'static) -> Self {
        self.backend = Some(Backend::Dispatcher(Box::new(dispatcher)));
        self
    }

    /// Build the [`Pdehb`] with the configured options.
    ///
    /// # Errors
    ///
    /// Returns [`Error::MissingComponent`] if a budget, the space or the
    /// evaluator is missing, and the validation errors of
    /// [`DifferentialEvolution::new`], [`bracket::plan`] and
    /// [`WorkerPool::new`] for out-of-range parameters.
    pub fn build(self) -> Result<Pdehb> {
        let min_budget = self
            .min_budget
            .ok_or(Error::MissingComponent("min_budget"))?;
        let max_budget = self
            .max_budget
            .ok_or(Error::MissingComponent("max_budget"))?;
        let space = self.space.ok_or(Error::MissingComponent("space"))?;
        if space.dimensions() == 0 {
            return Err(Error::EmptySpace);
        }

        let de = DifferentialEvolution::new(self.strategy, self.mutation_factor, self.crossover_prob)?;
        let plan = bracket::plan(self.eta, min_budget, max_budget)?;

        let dispatcher: Box<dyn Dispatcher> = match self.backend {
            Some(Backend::Evaluator(evaluator)) => {
                Box::new(WorkerPool::from_boxed(evaluator, self.n_workers)?)
            }
            Some(Backend::Dispatcher(dispatcher)) => dispatcher,
            None => return Err(Error::MissingComponent("evaluator")),
        };

        let state = RunState::new(&plan, self.seed);
        Ok(Pdehb {
            de,
            plan,
            codec: VectorCodec::new(space),
            dispatcher,
            seed: self.seed,
            drain_timeout: self.drain_timeout,
            state,
        })
    }
}

impl core::fmt::Debug for PdehbBuilder {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        f.debug_struct("PdehbBuilder")
            .field("strategy", &self.strategy)
            .field("mutation_factor", &self.mutation_factor)
            .field("crossover_prob", &self.crossover_prob)
            .field("eta", &self.eta)
            .field("min_budget", &self.min_budget)
            .field("max_budget", &self.max_budget)
            .field("n_workers", &self.n_workers)
            .field("seed", &self.seed)
            .field("drain_timeout", &self.drain_timeout)
            .finish_non_exhaustive()
    }
}
