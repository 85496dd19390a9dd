//! Unit-hypercube encoding of configurations.
//!
//! DE operates on vectors in `[0, 1]^d`. Each dimension is normalized from
//! its hyperparameter [`Domain`]:
//!
//! | Domain | Encoding |
//! |--------|----------|
//! | Float | `(v - low) / (high - low)`, in log space when `log_scale` |
//! | Float with step | grid index binned like an integer |
//! | Int | `n` equal bins over `[0, 1]`; value `k` encodes to `(k + 0.5) / n` |
//! | Int with log scale | `(ln v - ln low) / (ln high - ln low)`, rounded on decode |
//! | Categorical | `n` equal bins, like integers |
//!
//! Binned dimensions decode by taking the bin `floor(u * n)`, so
//! `decode(encode(c)) == c` holds exactly for them. Stepped domains only
//! encode values on their grid `low + k * step`.

use std::sync::Arc;

#[cfg(feature = "serde")]
use serde::{Deserialize, Serialize};

use crate::error::{Error, Result};
use crate::space::{ConfigSpace, Configuration, ParamValue};

/// How far a stepped float may sit from its grid point, in steps.
const GRID_TOLERANCE: f64 = 1e-6;

/// Bin index of `u` among `n` equal bins of `[0, 1]`.
#[allow(
    clippy::cast_precision_loss,
    clippy::cast_possible_truncation,
    clippy::cast_sign_loss
)]
fn bin_of(u: f64, n: usize) -> usize {
    let bin = (u.clamp(0.0, 1.0) * n as f64).floor() as usize;
    bin.min(n.saturating_sub(1))
}

/// Centre of bin `k` among `n` equal bins of `[0, 1]`.
#[allow(clippy::cast_precision_loss)]
fn bin_centre(k: usize, n: usize) -> f64 {
    (k as f64 + 0.5) / n as f64
}

/// Snap `value` to the nearest of the `n` grid points `low + k * step`.
#[allow(clippy::cast_precision_loss)]
fn snap(value: f64, low: f64, step: f64, n: usize) -> f64 {
    let k = ((value - low) / step).round().clamp(0.0, n.saturating_sub(1) as f64);
    low + k * step
}

fn outside(v: impl core::fmt::Display, low: impl core::fmt::Display, high: impl core::fmt::Display) -> Error {
    Error::ConfigCodec(format!("{v} outside [{low}, {high}]"))
}

fn off_grid(v: impl core::fmt::Display, step: impl core::fmt::Display) -> Error {
    Error::ConfigCodec(format!("{v} is not on the step-{step} grid"))
}

/// Domain of a floating-point hyperparameter.
#[derive(Clone, Debug, PartialEq)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub struct FloatDomain {
    /// Lower bound (inclusive).
    pub low: f64,
    /// Upper bound (inclusive).
    pub high: f64,
    /// Whether the encoding is linear in `ln v`.
    pub log_scale: bool,
    /// Grid spacing; values are restricted to `low + k * step`.
    pub step: Option<f64>,
}

impl FloatDomain {
    /// Number of grid points `low + k * step` inside `[low, high]`.
    #[allow(
        clippy::cast_possible_truncation,
        clippy::cast_sign_loss,
        clippy::cast_precision_loss
    )]
    fn grid_size(&self, step: f64) -> usize {
        ((self.high - self.low) / step + 1e-9).floor() as usize + 1
    }

    fn encode(&self, v: f64) -> Result<f64> {
        if !v.is_finite() || v < self.low || v > self.high {
            return Err(outside(v, self.low, self.high));
        }
        if let Some(step) = self.step {
            let k = (v - self.low) / step;
            if (k - k.round()).abs() > GRID_TOLERANCE {
                return Err(off_grid(v, step));
            }
        }
        if self.log_scale {
            Ok((v.ln() - self.low.ln()) / (self.high.ln() - self.low.ln()))
        } else if let Some(step) = self.step {
            let n = self.grid_size(step);
            #[allow(clippy::cast_possible_truncation, clippy::cast_sign_loss)]
            let k = (((v - self.low) / step).round().max(0.0) as usize).min(n - 1);
            Ok(bin_centre(k, n))
        } else {
            Ok((v - self.low) / (self.high - self.low))
        }
    }

    #[allow(clippy::cast_precision_loss)]
    fn decode(&self, u: f64) -> f64 {
        let v = if self.log_scale {
            let (lo, hi) = (self.low.ln(), self.high.ln());
            let v = (lo + u * (hi - lo)).exp();
            match self.step {
                Some(step) => snap(v, self.low, step, self.grid_size(step)),
                None => v,
            }
        } else if let Some(step) = self.step {
            let k = bin_of(u, self.grid_size(step));
            self.low + k as f64 * step
        } else {
            self.low + u * (self.high - self.low)
        };
        v.clamp(self.low, self.high)
    }
}

/// Domain of an integer hyperparameter.
#[derive(Clone, Debug, PartialEq)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub struct IntDomain {
    /// Lower bound (inclusive).
    pub low: i64,
    /// Upper bound (inclusive).
    pub high: i64,
    /// Whether the encoding is linear in `ln v`.
    pub log_scale: bool,
    /// Grid spacing; values are restricted to `low + k * step`.
    pub step: Option<i64>,
}

impl IntDomain {
    fn stride(&self) -> u64 {
        self.step.map_or(1, |s| s.unsigned_abs().max(1))
    }

    /// Number of grid points inside `[low, high]`; saturates for spans
    /// wider than `usize`.
    fn grid_size(&self) -> usize {
        let points = self.high.abs_diff(self.low) / self.stride();
        usize::try_from(points).map_or(usize::MAX, |p| p.saturating_add(1))
    }

    #[allow(clippy::cast_precision_loss)]
    fn encode(&self, v: i64) -> Result<f64> {
        if v < self.low || v > self.high {
            return Err(outside(v, self.low, self.high));
        }
        let offset = v.abs_diff(self.low);
        if offset % self.stride() != 0 {
            return Err(off_grid(v, self.stride()));
        }
        if self.log_scale {
            if self.low == self.high {
                return Ok(0.5);
            }
            let (lo, hi) = ((self.low as f64).ln(), (self.high as f64).ln());
            Ok(((v as f64).ln() - lo) / (hi - lo))
        } else {
            let n = self.grid_size();
            let k = usize::try_from(offset / self.stride()).map_or(n - 1, |k| k.min(n - 1));
            Ok(bin_centre(k, n))
        }
    }

    #[allow(
        clippy::cast_precision_loss,
        clippy::cast_possible_truncation,
        clippy::cast_possible_wrap
    )]
    fn decode(&self, u: f64) -> i64 {
        let (low, high) = (i128::from(self.low), i128::from(self.high));
        let v = if self.log_scale {
            let (lo, hi) = ((self.low as f64).ln(), (self.high as f64).ln());
            let raw = (lo + u * (hi - lo)).exp();
            let last = self.grid_size().saturating_sub(1) as f64;
            let k = ((raw - self.low as f64) / self.stride() as f64)
                .round()
                .clamp(0.0, last);
            low + (k as i128) * i128::from(self.stride())
        } else {
            let k = bin_of(u, self.grid_size()) as i128;
            low + k * i128::from(self.stride())
        };
        v.clamp(low, high) as i64
    }
}

/// Domain of one hyperparameter, with its unit-interval encoding.
///
/// # Examples
///
/// ```
/// use dehb::ParamValue;
/// use dehb::codec::{Domain, IntDomain};
///
/// let d = Domain::Int(IntDomain { low: 0, high: 9, log_scale: false, step: Some(3) });
/// let u = d.encode(&ParamValue::Int(6)).unwrap();
/// assert_eq!(d.decode(u), ParamValue::Int(6));
/// // 7 is inside the bounds but not on the grid
/// assert!(d.encode(&ParamValue::Int(7)).is_err());
/// ```
#[derive(Clone, Debug, PartialEq)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub enum Domain {
    /// A floating-point domain.
    Float(FloatDomain),
    /// An integer domain.
    Int(IntDomain),
    /// One of `n_choices` unordered options.
    Categorical {
        /// Number of options.
        n_choices: usize,
    },
}

impl Domain {
    /// Encode `value` into `[0, 1]`.
    ///
    /// # Errors
    ///
    /// Returns [`Error::ConfigCodec`] if the value has the wrong kind, lies
    /// outside the bounds, or misses the step grid.
    pub fn encode(&self, value: &ParamValue) -> Result<f64> {
        match (self, value) {
            (Self::Float(d), ParamValue::Float(v)) => d.encode(*v),
            (Self::Int(d), ParamValue::Int(v)) => d.encode(*v),
            (Self::Categorical { n_choices }, ParamValue::Categorical(i)) => {
                if *i >= *n_choices {
                    return Err(Error::ConfigCodec(format!(
                        "choice {i} out of {n_choices} choices"
                    )));
                }
                Ok(bin_centre(*i, *n_choices))
            }
            (_, other) => Err(Error::ConfigCodec(format!(
                "value {other:?} does not match its domain"
            ))),
        }
    }

    /// Decode a component `u ∈ [0, 1]`; components outside are clamped first.
    #[must_use]
    pub fn decode(&self, u: f64) -> ParamValue {
        let u = u.clamp(0.0, 1.0);
        match self {
            Self::Float(d) => ParamValue::Float(d.decode(u)),
            Self::Int(d) => ParamValue::Int(d.decode(u)),
            Self::Categorical { n_choices } => ParamValue::Categorical(bin_of(u, *n_choices)),
        }
    }
}

/// Clip a vector into `[0, 1]^d` in place.
///
/// # Errors
///
/// Returns [`Error::ConfigCodec`] if a component is NaN or infinite; such a
/// vector has no meaningful nearest point in the hypercube.
pub fn clip(vector: &mut [f64]) -> Result<()> {
    for (i, x) in vector.iter_mut().enumerate() {
        if !x.is_finite() {
            return Err(Error::ConfigCodec(format!(
                "component {i} is not finite ({x})"
            )));
        }
        *x = x.clamp(0.0, 1.0);
    }
    Ok(())
}

/// Bidirectional mapping between unit vectors and configurations of a space.
///
/// Decoding always clips first, so mutation overshoot never reaches the
/// evaluator as an out-of-domain configuration.
///
/// # Examples
///
/// ```
/// use std::sync::Arc;
///
/// use dehb::codec::VectorCodec;
/// use dehb::parameter::FloatParam;
/// use dehb::space::SearchSpace;
///
/// let space = SearchSpace::builder()
///     .add(FloatParam::new("x", 0.0, 10.0))
///     .build()
///     .unwrap();
/// let codec = VectorCodec::new(Arc::new(space));
///
/// // 1.2 is outside the hypercube and gets clipped to the upper bound.
/// let config = codec.decode(&[1.2]).unwrap();
/// assert_eq!(config.get_float("x"), Some(10.0));
/// ```
#[derive(Clone)]
pub struct VectorCodec {
    space: Arc<dyn ConfigSpace>,
}

impl VectorCodec {
    /// Creates a codec for `space`.
    #[must_use]
    pub fn new(space: Arc<dyn ConfigSpace>) -> Self {
        Self { space }
    }

    /// Number of dimensions of the encoded vectors.
    #[must_use]
    pub fn dimensions(&self) -> usize {
        self.space.dimensions()
    }

    /// The wrapped space.
    #[must_use]
    pub fn space(&self) -> &Arc<dyn ConfigSpace> {
        &self.space
    }

    /// Encode a configuration into `[0, 1]^d`.
    ///
    /// # Errors
    ///
    /// Propagates the space's encoding error for foreign configurations.
    pub fn encode(&self, config: &Configuration) -> Result<Vec<f64>> {
        let mut vector = self.space.to_vector(config)?;
        clip(&mut vector)?;
        Ok(vector)
    }

    /// Clip `vector` into `[0, 1]^d` and decode it.
    ///
    /// # Errors
    ///
    /// Returns [`Error::DimensionMismatch`] for a vector of the wrong length
    /// and [`Error::ConfigCodec`] for non-finite components.
    pub fn decode(&self, vector: &[f64]) -> Result<Configuration> {
        if vector.len() != self.space.dimensions() {
            return Err(Error::DimensionMismatch {
                expected: self.space.dimensions(),
                got: vector.len(),
            });
        }
        let mut clipped = vector.to_vec();
        clip(&mut clipped)?;
        self.space.from_vector(&clipped)
    }
}

impl core::fmt::Debug for VectorCodec {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        f.debug_struct("VectorCodec")
            .field("dimensions", &self.space.dimensions())
            .finish()
    }
}
