#![forbid(unsafe_code)]
#![deny(clippy::all)]
#![deny(unreachable_pub)]
#![deny(clippy::correctness)]
#![deny(clippy::suspicious)]
#![deny(clippy::style)]
#![deny(clippy::complexity)]
#![deny(clippy::perf)]
#![deny(clippy::pedantic)]
#![deny(clippy::std_instead_of_core)]

//! Multi-fidelity hyperparameter optimization with DEHB: Differential
//! Evolution driven by Hyperband brackets, evaluated asynchronously on a
//! fixed-size worker pool.
//!
//! Cheap, low-budget evaluations (few epochs, a data subset) weed out poor
//! configurations early; the survivors are promoted to larger budgets. Unlike
//! plain Hyperband, new configurations are not sampled at random but evolved
//! from the populations kept at every budget, so information carries over
//! from one bracket to the next.
//!
//! # Getting Started
//!
//! ```
//! use dehb::prelude::*;
//!
//! let space = SearchSpace::builder()
//!     .add(FloatParam::new("lr", 1e-4, 1e-1).log_scale())
//!     .add(IntParam::new("layers", 1, 6))
//!     .add(CategoricalParam::new("act", ["relu", "tanh"]))
//!     .build()
//!     .unwrap();
//!
//! let mut dehb = Pdehb::builder()
//!     .min_budget(1.0)
//!     .max_budget(27.0)
//!     .n_workers(2)
//!     .seed(0)
//!     .space(space)
//!     .evaluator(|c: &Configuration, budget: Option<f64>| {
//!         let lr = c.get_float("lr").unwrap_or(1.0);
//!         let layers = c.get_int("layers").unwrap_or(1) as f64;
//!         let loss = (lr.log10() + 2.0).powi(2) + (layers - 3.0).abs() / budget.unwrap_or(1.0);
//!         Ok::<_, String>(Evaluation::new(loss, budget.unwrap_or(1.0)))
//!     })
//!     .build()
//!     .unwrap();
//!
//! let result = dehb.run(StopCriteria::new().brackets(2)).unwrap();
//! assert!(!result.history.is_empty());
//! println!("best: {:?}", dehb.incumbent_config().unwrap());
//! ```
//!
//! # Core Concepts
//!
//! | Type | Role |
//! |------|------|
//! | [`Pdehb`] | The optimizer: schedules brackets, proposes candidates, tracks the incumbent. |
//! | [`SearchSpace`](space::SearchSpace) | Typed hyperparameters; any [`ConfigSpace`](space::ConfigSpace) works. |
//! | [`Evaluator`](evaluator::Evaluator) | The objective: configuration + budget → fitness and cost. |
//! | [`BracketPlan`](bracket::BracketPlan) | Hyperband brackets and rung sizes for `(eta, min_budget, max_budget)`. |
//! | [`DeStrategy`](de::DeStrategy) | One of 14 mutation/crossover combinations. |
//! | [`Dispatcher`](dispatcher::Dispatcher) | Bounded asynchronous evaluation; [`WorkerPool`](dispatcher::WorkerPool) is built in. |
//! | [`RunResult`] | Trajectory, per-evaluation cost and the full history of a run. |
//!
//! # Feature Flags
//!
//! | Flag | What it enables | Default |
//! |------|----------------|---------|
//! | `serde` | `Serialize`/`Deserialize` on configurations, results and plans | off |
//! | `tracing` | Structured log events via [`tracing`](https://docs.rs/tracing) at key scheduling points | off |

/// Emit a `tracing::info!` event when the `tracing` feature is enabled.
/// No-op otherwise.
#[cfg(feature = "tracing")]
macro_rules! trace_info {
    ($($arg:tt)*) => { tracing::info!($($arg)*) };
}

#[cfg(not(feature = "tracing"))]
macro_rules! trace_info {
    ($($arg:tt)*) => {};
}

/// Emit a `tracing::debug!` event when the `tracing` feature is enabled.
/// No-op otherwise.
#[cfg(feature = "tracing")]
macro_rules! trace_debug {
    ($($arg:tt)*) => { tracing::debug!($($arg)*) };
}

#[cfg(not(feature = "tracing"))]
macro_rules! trace_debug {
    ($($arg:tt)*) => {};
}

/// Emit a `tracing::warn!` event when the `tracing` feature is enabled.
/// No-op otherwise.
#[cfg(feature = "tracing")]
macro_rules! trace_warn {
    ($($arg:tt)*) => { tracing::warn!($($arg)*) };
}

#[cfg(not(feature = "tracing"))]
macro_rules! trace_warn {
    ($($arg:tt)*) => {};
}

pub mod bracket;
pub mod codec;
pub mod de;
pub mod dispatcher;
mod error;
pub mod evaluator;
pub mod history;
pub mod parameter;
pub mod population;
mod rng_util;
mod scheduler;
pub mod space;

pub use error::{Error, Result};
pub use history::{Incumbent, Record, RunResult};
pub use space::ParamValue;
pub use scheduler::{Pdehb, PdehbBuilder, SchedulerState, StopCriteria};

/// Convenient wildcard import for the most common types.
///
/// ```
/// use dehb::prelude::*;
/// ```
pub mod prelude {
    pub use crate::bracket::{Bracket, BracketPlan, Rung};
    pub use crate::de::DeStrategy;
    pub use crate::dispatcher::{Dispatcher, WorkerPool};
    pub use crate::error::{Error, Result};
    pub use crate::evaluator::{EvaluateMut, Evaluation, Evaluator, Serialized};
    pub use crate::history::{Incumbent, Record, RunResult};
    pub use crate::parameter::{BoolParam, CategoricalParam, FloatParam, IntParam, Parameter};
    pub use crate::scheduler::{Pdehb, PdehbBuilder, SchedulerState, StopCriteria};
    pub use crate::space::{ConfigSpace, Configuration, ParamValue, SearchSpace};
}
