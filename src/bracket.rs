//! Hyperband bracket planning.
//!
//! A bracket is a Successive Halving schedule: a list of rungs with growing
//! budget and shrinking population. The plan holds `s_max + 1` brackets,
//! from the most aggressive one (many configurations at `min_budget`) down to
//! the one that evaluates a few configurations at `max_budget` only:
//!
//! ```text
//! s_max = floor(log(max_budget / min_budget) / log(eta))
//! n_s   = ceil((s_max + 1) / (s + 1)) * eta^s
//! b_s   = max_budget / eta^s
//! rung i in 0..=s: population floor(n_s / eta^i) at budget b_s * eta^i
//! ```
//!
//! Every rung budget is one of `s_max + 1` **levels** `max_budget / eta^k`.
//! Populations are shared per level across brackets, so the plan also
//! reports each level's capacity (its largest rung).
//!
//! # Example
//!
//! ```
//! use dehb::bracket::plan;
//!
//! let plan = plan(3.0, 1.0, 9.0).unwrap();
//! assert_eq!(plan.n_brackets(), 3);
//! let first: Vec<(f64, usize)> = plan.bracket(0).rungs
//!     .iter()
//!     .map(|r| (r.budget, r.population_size))
//!     .collect();
//! assert_eq!(first, vec![(1.0, 9), (3.0, 3), (9.0, 1)]);
//! assert_eq!(plan.capacity(0), 9);
//! ```

#[cfg(feature = "serde")]
use serde::{Deserialize, Serialize};

use crate::error::{Error, Result};

/// Slack for floor/ceil on values that should be exact integers.
const EPS: f64 = 1e-9;

/// One stage of a bracket.
#[derive(Clone, Debug, PartialEq)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub struct Rung {
    /// Budget every configuration in this rung is evaluated at.
    pub budget: f64,
    /// Number of configurations evaluated in this rung.
    pub population_size: usize,
    /// Index of `budget` in [`BracketPlan::budgets`].
    pub level: usize,
}

/// A Successive Halving schedule; immutable once planned.
#[derive(Clone, Debug, PartialEq)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub struct Bracket {
    /// Position of the bracket in the plan's cycle.
    pub id: usize,
    /// Rungs in increasing budget order.
    pub rungs: Vec<Rung>,
}

impl Bracket {
    /// Total evaluations the bracket performs.
    #[must_use]
    pub fn n_evaluations(&self) -> usize {
        self.rungs.iter().map(|r| r.population_size).sum()
    }

    /// Total budget spent if every evaluation costs its budget.
    #[must_use]
    #[allow(clippy::cast_precision_loss)]
    pub fn total_budget(&self) -> f64 {
        self.rungs
            .iter()
            .map(|r| r.budget * r.population_size as f64)
            .sum()
    }
}

/// The full cycle of brackets for one `(eta, min_budget, max_budget)`.
#[derive(Clone, Debug, PartialEq)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub struct BracketPlan {
    eta: f64,
    min_budget: f64,
    max_budget: f64,
    s_max: usize,
    budgets: Vec<f64>,
    capacities: Vec<usize>,
    brackets: Vec<Bracket>,
}

/// Plan the Hyperband brackets.
///
/// # Errors
///
/// Returns [`Error::InvalidBudgetRange`] when the budgets are not finite,
/// not positive, or `min_budget >= max_budget`, and [`Error::InvalidEta`]
/// when `eta <= 1`.
#[allow(
    clippy::cast_precision_loss,
    clippy::cast_possible_truncation,
    clippy::cast_sign_loss,
    clippy::cast_possible_wrap
)]
pub fn plan(eta: f64, min_budget: f64, max_budget: f64) -> Result<BracketPlan> {
    if !(min_budget.is_finite()
        && max_budget.is_finite()
        && min_budget > 0.0
        && min_budget < max_budget)
    {
        return Err(Error::InvalidBudgetRange {
            min_budget,
            max_budget,
        });
    }
    if !(eta.is_finite() && eta > 1.0) {
        return Err(Error::InvalidEta(eta));
    }

    let s_max = ((max_budget / min_budget).ln() / eta.ln() + EPS).floor() as usize;

    // level l sits at max_budget / eta^(s_max - l)
    let budgets: Vec<f64> = (0..=s_max)
        .map(|l| max_budget / eta.powi((s_max - l) as i32))
        .collect();
    let mut capacities = vec![0usize; s_max + 1];

    let mut brackets = Vec::with_capacity(s_max + 1);
    for (id, s) in (0..=s_max).rev().enumerate() {
        let n_s = ((s_max + 1) as f64 / (s + 1) as f64 - EPS).ceil() * eta.powi(s as i32);
        let rungs: Vec<Rung> = (0..=s)
            .map(|i| {
                let level = s_max - s + i;
                let population_size = ((n_s / eta.powi(i as i32) + EPS).floor() as usize).max(1);
                capacities[level] = capacities[level].max(population_size);
                Rung {
                    budget: budgets[level],
                    population_size,
                    level,
                }
            })
            .collect();
        brackets.push(Bracket { id, rungs });
    }

    Ok(BracketPlan {
        eta,
        min_budget,
        max_budget,
        s_max,
        budgets,
        capacities,
        brackets,
    })
}

impl BracketPlan {
    /// The reduction factor.
    #[must_use]
    pub fn eta(&self) -> f64 {
        self.eta
    }

    /// The smallest budget requested at planning time.
    #[must_use]
    pub fn min_budget(&self) -> f64 {
        self.min_budget
    }

    /// The largest budget; the last rung of every bracket runs at it.
    #[must_use]
    pub fn max_budget(&self) -> f64 {
        self.max_budget
    }

    /// `floor(log(max/min) / log(eta))`.
    #[must_use]
    pub fn s_max(&self) -> usize {
        self.s_max
    }

    /// Number of brackets in one cycle (`s_max + 1`).
    #[must_use]
    pub fn n_brackets(&self) -> usize {
        self.brackets.len()
    }

    /// Distinct budget levels in ascending order.
    #[must_use]
    pub fn budgets(&self) -> &[f64] {
        &self.budgets
    }

    /// Level index of `budget`, compared with a relative tolerance.
    #[must_use]
    pub fn level_of(&self, budget: f64) -> Option<usize> {
        self.budgets
            .iter()
            .position(|&b| (b - budget).abs() <= EPS * b.abs().max(1.0))
    }

    /// Largest rung planned at `level` over all brackets (0 if out of range).
    #[must_use]
    pub fn capacity(&self, level: usize) -> usize {
        self.capacities.get(level).copied().unwrap_or(0)
    }

    /// The `i`-th bracket of the cycle, wrapping around after the last one.
    #[must_use]
    pub fn bracket(&self, i: usize) -> &Bracket {
        &self.brackets[i % self.brackets.len()]
    }

    /// All brackets of one cycle.
    #[must_use]
    pub fn brackets(&self) -> &[Bracket] {
        &self.brackets
    }
}
