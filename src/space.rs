//! Configuration spaces and configurations.
//!
//! The optimizer treats the configuration space as an external service
//! reached through the [`ConfigSpace`] trait. [`SearchSpace`] is the
//! built-in implementation, assembled from typed
//! [`Parameter`](crate::parameter::Parameter)s.

use crate::codec::Domain;
use crate::error::{Error, Result};
use crate::parameter::Parameter;
use crate::rng_util;

#[cfg(feature = "serde")]
use serde::{Deserialize, Serialize};

/// A concrete hyperparameter value inside a [`Configuration`].
///
/// Categorical and boolean hyperparameters store the index of the chosen
/// option (`false = 0`, `true = 1`).
#[derive(Clone, Debug, PartialEq)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub enum ParamValue {
    /// A floating-point value.
    Float(f64),
    /// An integer value.
    Int(i64),
    /// Index of the chosen categorical option.
    Categorical(usize),
}

/// A concrete assignment of values to the dimensions of a space.
///
/// Values keep the order of the space they were decoded from.
#[derive(Clone, Debug, Default, PartialEq)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub struct Configuration {
    values: Vec<(String, ParamValue)>,
}

impl Configuration {
    /// Creates an empty configuration.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Adds (or overwrites) a named value.
    #[must_use]
    pub fn with(mut self, name: impl Into<String>, value: ParamValue) -> Self {
        self.insert(name, value);
        self
    }

    /// Inserts a named value, replacing any previous value of that name.
    pub fn insert(&mut self, name: impl Into<String>, value: ParamValue) {
        let name = name.into();
        if let Some(slot) = self.values.iter_mut().find(|(n, _)| *n == name) {
            slot.1 = value;
        } else {
            self.values.push((name, value));
        }
    }

    /// Returns the raw value for `name`.
    #[must_use]
    pub fn get(&self, name: &str) -> Option<&ParamValue> {
        self.values.iter().find(|(n, _)| n == name).map(|(_, v)| v)
    }

    /// Returns the value for `name` if it is a float.
    #[must_use]
    pub fn get_float(&self, name: &str) -> Option<f64> {
        match self.get(name)? {
            ParamValue::Float(v) => Some(*v),
            _ => None,
        }
    }

    /// Returns the value for `name` if it is an integer.
    #[must_use]
    pub fn get_int(&self, name: &str) -> Option<i64> {
        match self.get(name)? {
            ParamValue::Int(v) => Some(*v),
            _ => None,
        }
    }

    /// Returns the choice index for `name` if it is categorical.
    #[must_use]
    pub fn get_index(&self, name: &str) -> Option<usize> {
        match self.get(name)? {
            ParamValue::Categorical(i) => Some(*i),
            _ => None,
        }
    }

    /// Returns the value for `name` interpreted as a boolean hyperparameter.
    #[must_use]
    pub fn get_bool(&self, name: &str) -> Option<bool> {
        self.get_index(name).map(|i| i != 0)
    }

    /// Iterates over `(name, value)` pairs in space order.
    pub fn iter(&self) -> impl Iterator<Item = (&str, &ParamValue)> {
        self.values.iter().map(|(n, v)| (n.as_str(), v))
    }

    /// Number of values.
    #[must_use]
    pub fn len(&self) -> usize {
        self.values.len()
    }

    /// Whether the configuration holds no values.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.values.is_empty()
    }
}

/// Contract between the optimizer and a configuration space.
///
/// Implementations map configurations to and from vectors in the unit
/// hypercube `[0, 1]^d`. `from_vector` may assume every component is already
/// inside `[0, 1]`; the [`VectorCodec`](crate::codec::VectorCodec) clips
/// before calling it.
pub trait ConfigSpace: Send + Sync {
    /// Number of dimensions `d` of the encoded vectors.
    fn dimensions(&self) -> usize;

    /// Draws a configuration uniformly from the space.
    fn sample(&self, rng: &mut fastrand::Rng) -> Configuration;

    /// Encodes a configuration as a vector in `[0, 1]^d`.
    ///
    /// # Errors
    ///
    /// Returns an error if the configuration does not belong to the space.
    fn to_vector(&self, config: &Configuration) -> Result<Vec<f64>>;

    /// Decodes a vector in `[0, 1]^d` into a configuration.
    ///
    /// # Errors
    ///
    /// Returns an error if the vector has the wrong length.
    fn from_vector(&self, vector: &[f64]) -> Result<Configuration>;
}

/// One named dimension of a [`SearchSpace`].
#[derive(Clone, Debug)]
struct Dimension {
    name: String,
    domain: Domain,
    choices: Option<Vec<String>>,
}

/// A configuration space built from typed hyperparameters.
///
/// # Examples
///
/// ```
/// use dehb::parameter::{FloatParam, IntParam};
/// use dehb::space::{ConfigSpace, SearchSpace};
///
/// let space = SearchSpace::builder()
///     .add(FloatParam::new("x", -5.0, 5.0))
///     .add(IntParam::new("n", 1, 4))
///     .build()
///     .unwrap();
///
/// let config = space.from_vector(&[0.5, 0.0]).unwrap();
/// assert_eq!(config.get_float("x"), Some(0.0));
/// assert_eq!(config.get_int("n"), Some(1));
/// ```
#[derive(Clone, Debug)]
pub struct SearchSpace {
    dimensions: Vec<Dimension>,
}

impl SearchSpace {
    /// Creates a builder for a search space.
    #[must_use]
    pub fn builder() -> SearchSpaceBuilder {
        SearchSpaceBuilder::default()
    }

    /// Number of hyperparameters.
    #[must_use]
    pub fn len(&self) -> usize {
        self.dimensions.len()
    }

    /// Always `false` for a built space; kept for API symmetry with `len`.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.dimensions.is_empty()
    }

    /// Hyperparameter names in dimension order.
    pub fn names(&self) -> impl Iterator<Item = &str> {
        self.dimensions.iter().map(|d| d.name.as_str())
    }

    /// Domain of the hyperparameter called `name`.
    #[must_use]
    pub fn domain(&self, name: &str) -> Option<&Domain> {
        self.dimensions
            .iter()
            .find(|d| d.name == name)
            .map(|d| &d.domain)
    }

    /// Label of the categorical choice selected by `config` for `name`.
    #[must_use]
    pub fn choice_label<'a>(&'a self, config: &Configuration, name: &str) -> Option<&'a str> {
        let index = config.get_index(name)?;
        self.dimensions
            .iter()
            .find(|d| d.name == name)?
            .choices
            .as_ref()?
            .get(index)
            .map(String::as_str)
    }
}

impl ConfigSpace for SearchSpace {
    fn dimensions(&self) -> usize {
        self.dimensions.len()
    }

    fn sample(&self, rng: &mut fastrand::Rng) -> Configuration {
        let unit = rng_util::unit_vector(rng, self.dimensions.len());
        let values = self
            .dimensions
            .iter()
            .zip(unit)
            .map(|(dim, u)| (dim.name.clone(), dim.domain.decode(u)))
            .collect();
        Configuration { values }
    }

    fn to_vector(&self, config: &Configuration) -> Result<Vec<f64>> {
        if config.len() != self.dimensions.len() {
            return Err(Error::DimensionMismatch {
                expected: self.dimensions.len(),
                got: config.len(),
            });
        }
        self.dimensions
            .iter()
            .map(|dim| {
                let value = config.get(&dim.name).ok_or_else(|| {
                    Error::ConfigCodec(format!("missing value for '{}'", dim.name))
                })?;
                dim.domain.encode(value)
                    .map_err(|e| Error::ConfigCodec(format!("'{}': {e}", dim.name)))
            })
            .collect()
    }

    fn from_vector(&self, vector: &[f64]) -> Result<Configuration> {
        if vector.len() != self.dimensions.len() {
            return Err(Error::DimensionMismatch {
                expected: self.dimensions.len(),
                got: vector.len(),
            });
        }
        let values = self
            .dimensions
            .iter()
            .zip(vector)
            .map(|(dim, &u)| (dim.name.clone(), dim.domain.decode(u)))
            .collect();
        Ok(Configuration { values })
    }
}

/// Builder for a [`SearchSpace`].
///
/// Parameters are validated when [`build`](Self::build) is called.
#[derive(Debug, Default)]
pub struct SearchSpaceBuilder {
    params: Vec<Box<dyn Parameter + Send + Sync>>,
}

impl SearchSpaceBuilder {
    /// Appends a hyperparameter as the next dimension.
    #[must_use]
    pub fn add(mut self, param: impl Parameter + Send + Sync + 'static) -> Self {
        self.params.push(Box::new(param));
        self
    }

    /// Validates every hyperparameter and builds the space.
    ///
    /// # Errors
    ///
    /// Returns [`Error::EmptySpace`] when no hyperparameter was added,
    /// [`Error::DuplicateParameter`] when two share a name, or the
    /// validation error of the first invalid hyperparameter.
    pub fn build(self) -> Result<SearchSpace> {
        if self.params.is_empty() {
            return Err(Error::EmptySpace);
        }
        let mut dimensions: Vec<Dimension> = Vec::with_capacity(self.params.len());
        for param in self.params {
            param.validate()?;
            if dimensions.iter().any(|d| d.name == param.name()) {
                return Err(Error::DuplicateParameter(param.name().to_owned()));
            }
            dimensions.push(Dimension {
                name: param.name().to_owned(),
                domain: param.domain(),
                choices: param.choices(),
            });
        }
        Ok(SearchSpace { dimensions })
    }
}
