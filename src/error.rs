/// Errors raised by configuration, planning and the worker pool.
///
/// Individual evaluation failures are never reported through this type: a
/// failed evaluation becomes a [`Completion`](crate::dispatcher::Completion)
/// carrying the worst possible fitness, and the run carries on.
#[derive(Debug, thiserror::Error)]
pub enum Error {
    /// Returned when the budget range cannot produce a bracket table.
    #[error(
        "invalid budget range: min_budget ({min_budget}) and max_budget ({max_budget}) must be positive with min_budget < max_budget"
    )]
    InvalidBudgetRange {
        /// The requested minimum budget.
        min_budget: f64,
        /// The requested maximum budget.
        max_budget: f64,
    },

    /// Returned when the reduction factor is not greater than one.
    #[error("invalid eta: {0} must be greater than 1")]
    InvalidEta(f64),

    /// Returned when the mutation factor is outside `(0, 2]`.
    #[error("invalid mutation factor: {0} must be in (0.0, 2.0]")]
    InvalidMutationFactor(f64),

    /// Returned when the crossover probability is outside `[0, 1]`.
    #[error("invalid crossover probability: {0} must be in [0.0, 1.0]")]
    InvalidCrossoverProb(f64),

    /// Returned when a worker pool is requested with zero workers.
    #[error("invalid worker count: at least one worker is required")]
    InvalidWorkerCount,

    /// Returned when a strategy name does not match any of the 14 DE strategies.
    #[error("unknown DE strategy '{0}'")]
    UnknownStrategy(String),

    /// Returned when the lower bound is greater than the upper bound.
    #[error("invalid bounds: low ({low}) must be less than high ({high})")]
    InvalidBounds {
        /// The lower bound value.
        low: f64,
        /// The upper bound value.
        high: f64,
    },

    /// Returned when log scale is used with non-positive bounds.
    #[error("invalid log bounds: low must be positive for log scale")]
    InvalidLogBounds,

    /// Returned when step size is not positive.
    #[error("invalid step: step must be positive")]
    InvalidStep,

    /// Returned when categorical choices are empty.
    #[error("categorical choices cannot be empty")]
    EmptyChoices,

    /// Returned when a search space has no hyperparameters.
    #[error("search space must contain at least one hyperparameter")]
    EmptySpace,

    /// Returned when two hyperparameters share a name.
    #[error("duplicate hyperparameter '{0}'")]
    DuplicateParameter(String),

    /// Returned when a vector or configuration has the wrong number of dimensions.
    #[error("dimension mismatch: expected {expected} dimensions, got {got}")]
    DimensionMismatch {
        /// The dimensionality of the search space.
        expected: usize,
        /// The dimensionality that was supplied.
        got: usize,
    },

    /// Returned when a vector cannot be mapped back to a configuration.
    #[error("configuration codec error: {0}")]
    ConfigCodec(String),

    /// Returned by a dispatcher asked to accept a job while every worker is busy.
    #[error("worker pool saturated: all {n_workers} workers are busy")]
    WorkerPoolSaturated {
        /// The pool capacity.
        n_workers: usize,
    },

    /// Returned when a run is started without any stopping bound.
    #[error("no stopping bound configured: set fevals, brackets or total_cost")]
    Unbounded,

    /// Returned when the builder is missing a required component.
    #[error("missing component: {0}")]
    MissingComponent(&'static str),

    /// Returned when the worker runtime cannot be started.
    #[error("worker runtime error: {0}")]
    TaskError(String),
}

pub type Result<T> = core::result::Result<T, Error>;
