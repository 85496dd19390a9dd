//! Typed hyperparameter definitions.
//!
//! Each hyperparameter names one dimension of a
//! [`SearchSpace`](crate::space::SearchSpace) and fixes its domain. The
//! optimizer itself only ever sees the unit-hypercube encoding of these
//! domains (see [`codec`](crate::codec)).
//!
//! # Example
//!
//! ```
//! use dehb::parameter::{BoolParam, CategoricalParam, FloatParam, IntParam};
//! use dehb::space::SearchSpace;
//!
//! let space = SearchSpace::builder()
//!     .add(FloatParam::new("lr", 1e-5, 1e-1).log_scale())
//!     .add(IntParam::new("layers", 1, 8))
//!     .add(CategoricalParam::new("optimizer", ["sgd", "adam", "rmsprop"]))
//!     .add(BoolParam::new("batch_norm"))
//!     .build()
//!     .unwrap();
//! assert_eq!(space.len(), 4);
//! ```

use core::fmt::Debug;

use crate::codec::{Domain, FloatDomain, IntDomain};
use crate::error::{Error, Result};

/// A named hyperparameter with a fixed domain.
pub trait Parameter: Debug {
    /// The name of the dimension inside its search space.
    fn name(&self) -> &str;

    /// The domain values are drawn from.
    fn domain(&self) -> Domain;

    /// Labels for categorical options, in index order.
    ///
    /// Defaults to `None` for numeric parameters.
    fn choices(&self) -> Option<Vec<String>> {
        None
    }

    /// Validates the parameter configuration.
    ///
    /// The default implementation accepts all configurations.
    ///
    /// # Errors
    ///
    /// Returns an error if the parameter configuration is invalid.
    fn validate(&self) -> Result<()> {
        Ok(())
    }
}

/// A floating-point hyperparameter with optional log-scale and step size.
///
/// # Example
///
/// ```
/// use dehb::parameter::FloatParam;
///
/// let dropout = FloatParam::new("dropout", 0.0, 0.5);
/// let lr = FloatParam::new("lr", 1e-5, 1e-1).log_scale();
/// let momentum = FloatParam::new("momentum", 0.0, 1.0).step(0.25);
/// ```
#[derive(Clone, Debug)]
pub struct FloatParam {
    name: String,
    low: f64,
    high: f64,
    log_scale: bool,
    step: Option<f64>,
}

impl FloatParam {
    /// Creates a new float hyperparameter with the given bounds.
    #[must_use]
    pub fn new(name: impl Into<String>, low: f64, high: f64) -> Self {
        Self {
            name: name.into(),
            low,
            high,
            log_scale: false,
            step: None,
        }
    }

    /// Spreads values uniformly in log space.
    #[must_use]
    pub fn log_scale(mut self) -> Self {
        self.log_scale = true;
        self
    }

    /// Restricts values to the grid `low + k * step`.
    #[must_use]
    pub fn step(mut self, step: f64) -> Self {
        self.step = Some(step);
        self
    }
}

impl Parameter for FloatParam {
    fn name(&self) -> &str {
        &self.name
    }

    fn domain(&self) -> Domain {
        Domain::Float(FloatDomain {
            low: self.low,
            high: self.high,
            log_scale: self.log_scale,
            step: self.step,
        })
    }

    fn validate(&self) -> Result<()> {
        // the span must be finite too, or decoding yields NaN
        if !self.low.is_finite()
            || !self.high.is_finite()
            || self.low >= self.high
            || !(self.high - self.low).is_finite()
        {
            return Err(Error::InvalidBounds {
                low: self.low,
                high: self.high,
            });
        }
        if self.log_scale && self.low <= 0.0 {
            return Err(Error::InvalidLogBounds);
        }
        if let Some(step) = self.step
            && (step <= 0.0 || !step.is_finite())
        {
            return Err(Error::InvalidStep);
        }
        Ok(())
    }
}

/// An integer hyperparameter with optional log-scale and step size.
///
/// # Example
///
/// ```
/// use dehb::parameter::IntParam;
///
/// let layers = IntParam::new("layers", 1, 10);
/// let batch = IntParam::new("batch", 1, 1024).log_scale();
/// let units = IntParam::new("units", 32, 512).step(32);
/// ```
#[derive(Clone, Debug)]
pub struct IntParam {
    name: String,
    low: i64,
    high: i64,
    log_scale: bool,
    step: Option<i64>,
}

impl IntParam {
    /// Creates a new integer hyperparameter with the given inclusive bounds.
    #[must_use]
    pub fn new(name: impl Into<String>, low: i64, high: i64) -> Self {
        Self {
            name: name.into(),
            low,
            high,
            log_scale: false,
            step: None,
        }
    }

    /// Spreads values uniformly in log space.
    #[must_use]
    pub fn log_scale(mut self) -> Self {
        self.log_scale = true;
        self
    }

    /// Restricts values to the grid `low + k * step`.
    #[must_use]
    pub fn step(mut self, step: i64) -> Self {
        self.step = Some(step);
        self
    }
}

impl Parameter for IntParam {
    fn name(&self) -> &str {
        &self.name
    }

    fn domain(&self) -> Domain {
        Domain::Int(IntDomain {
            low: self.low,
            high: self.high,
            log_scale: self.log_scale,
            step: self.step,
        })
    }

    #[allow(clippy::cast_precision_loss)]
    fn validate(&self) -> Result<()> {
        if self.low > self.high {
            return Err(Error::InvalidBounds {
                low: self.low as f64,
                high: self.high as f64,
            });
        }
        if self.log_scale && self.low < 1 {
            return Err(Error::InvalidLogBounds);
        }
        if let Some(step) = self.step
            && step <= 0
        {
            return Err(Error::InvalidStep);
        }
        Ok(())
    }
}

/// A categorical hyperparameter that selects one of a list of labels.
///
/// # Example
///
/// ```
/// use dehb::parameter::CategoricalParam;
///
/// let opt = CategoricalParam::new("optimizer", ["sgd", "adam", "rmsprop"]);
/// ```
#[derive(Clone, Debug)]
pub struct CategoricalParam {
    name: String,
    choices: Vec<String>,
}

impl CategoricalParam {
    /// Creates a new categorical hyperparameter with the given choices.
    #[must_use]
    pub fn new<I, S>(name: impl Into<String>, choices: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self {
            name: name.into(),
            choices: choices.into_iter().map(Into::into).collect(),
        }
    }
}

impl Parameter for CategoricalParam {
    fn name(&self) -> &str {
        &self.name
    }

    fn domain(&self) -> Domain {
        Domain::Categorical {
            n_choices: self.choices.len(),
        }
    }

    fn choices(&self) -> Option<Vec<String>> {
        Some(self.choices.clone())
    }

    fn validate(&self) -> Result<()> {
        if self.choices.is_empty() {
            return Err(Error::EmptyChoices);
        }
        Ok(())
    }
}

/// A boolean hyperparameter (a categorical over `[false, true]`).
#[derive(Clone, Debug)]
pub struct BoolParam {
    name: String,
}

impl BoolParam {
    /// Creates a new boolean hyperparameter.
    #[must_use]
    pub fn new(name: impl Into<String>) -> Self {
        Self { name: name.into() }
    }
}

impl Parameter for BoolParam {
    fn name(&self) -> &str {
        &self.name
    }

    fn domain(&self) -> Domain {
        Domain::Categorical { n_choices: 2 }
    }

    fn choices(&self) -> Option<Vec<String>> {
        Some(vec!["false".to_owned(), "true".to_owned()])
    }
}
