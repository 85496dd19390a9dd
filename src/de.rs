//! Differential Evolution (DE) operator.
//!
//! DE creates a candidate from a population through **mutation** (combining
//! difference vectors of existing members) and **crossover** (mixing the
//! mutant with a target). The candidate replaces its target only if it is no
//! worse once evaluated (greedy selection).
//!
//! All vectors live in the unit hypercube `[0, 1]^d`; candidates are clamped
//! back into it after crossover.
//!
//! # Strategies
//!
//! A [`DeStrategy`] pairs one of seven mutations with one of two crossovers:
//!
//! | Mutation | Mutant | Donors |
//! |----------|--------|--------|
//! | `rand1` | `x_r1 + F (x_r2 - x_r3)` | 3 |
//! | `rand2` | `x_r1 + F (x_r2 - x_r3) + F (x_r4 - x_r5)` | 5 |
//! | `rand2dir` | `x_r1 + F/2 (x_r1 - x_r2 - x_r3)`, donors ranked by fitness | 3 |
//! | `best1` | `x_best + F (x_r1 - x_r2)` | 2 |
//! | `best2` | `x_best + F (x_r1 - x_r2) + F (x_r3 - x_r4)` | 4 |
//! | `currenttobest1` | `x_i + F (x_best - x_i) + F (x_r1 - x_r2)` | 2 |
//! | `randtobest1` | `x_r1 + F (x_best - x_r1) + F (x_r2 - x_r3)` | 3 |
//!
//! | Crossover | Rule |
//! |-----------|------|
//! | `bin` | each dimension from the mutant with probability CR, one dimension always |
//! | `exp` | a contiguous (wrapping) run from a random start, extended while `U < CR` |
//!
//! When the pool holds fewer members than a mutation needs, the missing
//! donors are drawn uniformly from the unit hypercube, so small early rungs
//! still make progress.
//!
//! # Examples
//!
//! ```
//! use dehb::de::{DeStrategy, DifferentialEvolution, Donor};
//!
//! let de = DifferentialEvolution::new(DeStrategy::Best1Bin, 0.5, 0.9).unwrap();
//! let members = [vec![0.1, 0.2], vec![0.8, 0.4], vec![0.5, 0.5]];
//! let fitness = [3.0, 1.0, 2.0];
//! let pool: Vec<Donor<'_>> = members
//!     .iter()
//!     .zip(fitness)
//!     .map(|(v, f)| Donor::new(v, Some(f)))
//!     .collect();
//!
//! let mut rng = fastrand::Rng::with_seed(7);
//! let candidate = de.propose(&members[0], &pool, Some(0), &mut rng);
//! assert_eq!(candidate.len(), 2);
//! assert!(candidate.iter().all(|x| (0.0..=1.0).contains(x)));
//! ```

use core::fmt;
use core::str::FromStr;

use crate::error::{Error, Result};
use crate::rng_util;

#[cfg(feature = "serde")]
use serde::{Deserialize, Serialize};

/// Mutation half of a [`DeStrategy`].
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum Mutation {
    /// `x_r1 + F (x_r2 - x_r3)`
    Rand1,
    /// `x_r1 + F (x_r2 - x_r3) + F (x_r4 - x_r5)`
    Rand2,
    /// `x_r1 + F/2 (x_r1 - x_r2 - x_r3)` with `r1` the fittest donor.
    Rand2Dir,
    /// `x_best + F (x_r1 - x_r2)`
    Best1,
    /// `x_best + F (x_r1 - x_r2) + F (x_r3 - x_r4)`
    Best2,
    /// `x_i + F (x_best - x_i) + F (x_r1 - x_r2)`
    CurrentToBest1,
    /// `x_r1 + F (x_best - x_r1) + F (x_r2 - x_r3)`
    RandToBest1,
}

impl Mutation {
    /// Number of distinct donors drawn from the pool.
    #[must_use]
    pub const fn n_donors(self) -> usize {
        match self {
            Self::Rand2 => 5,
            Self::Best2 => 4,
            Self::Rand1 | Self::Rand2Dir | Self::RandToBest1 => 3,
            Self::Best1 | Self::CurrentToBest1 => 2,
        }
    }

    /// Whether the mutation reads the pool's best member.
    #[must_use]
    pub const fn uses_best(self) -> bool {
        matches!(
            self,
            Self::Best1 | Self::Best2 | Self::CurrentToBest1 | Self::RandToBest1
        )
    }

    const fn name(self) -> &'static str {
        match self {
            Self::Rand1 => "rand1",
            Self::Rand2 => "rand2",
            Self::Rand2Dir => "rand2dir",
            Self::Best1 => "best1",
            Self::Best2 => "best2",
            Self::CurrentToBest1 => "currenttobest1",
            Self::RandToBest1 => "randtobest1",
        }
    }

    const fn index(self) -> usize {
        self as usize
    }
}

/// Crossover half of a [`DeStrategy`].
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum Crossover {
    /// Binomial: independent per-dimension coin flips.
    Bin,
    /// Exponential: one contiguous run of dimensions.
    Exp,
}

impl Crossover {
    const fn name(self) -> &'static str {
        match self {
            Self::Bin => "bin",
            Self::Exp => "exp",
        }
    }
}

/// The 14 named DE strategies (`<mutation>_<crossover>`).
///
/// Parses from and displays as the conventional names, e.g. `"rand1_bin"`.
///
/// ```
/// use dehb::de::{Crossover, DeStrategy, Mutation};
///
/// let s: DeStrategy = "currenttobest1_exp".parse().unwrap();
/// assert_eq!(s, DeStrategy::CurrentToBest1Exp);
/// assert_eq!(s.mutation(), Mutation::CurrentToBest1);
/// assert_eq!(s.crossover(), Crossover::Exp);
/// assert_eq!(s.to_string(), "currenttobest1_exp");
/// ```
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Hash)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
#[cfg_attr(feature = "serde", serde(try_from = "String", into = "String"))]
pub enum DeStrategy {
    /// `rand1_bin`
    #[default]
    Rand1Bin,
    /// `rand2_bin`
    Rand2Bin,
    /// `rand2dir_bin`
    Rand2DirBin,
    /// `best1_bin`
    Best1Bin,
    /// `best2_bin`
    Best2Bin,
    /// `currenttobest1_bin`
    CurrentToBest1Bin,
    /// `randtobest1_bin`
    RandToBest1Bin,
    /// `rand1_exp`
    Rand1Exp,
    /// `rand2_exp`
    Rand2Exp,
    /// `rand2dir_exp`
    Rand2DirExp,
    /// `best1_exp`
    Best1Exp,
    /// `best2_exp`
    Best2Exp,
    /// `currenttobest1_exp`
    CurrentToBest1Exp,
    /// `randtobest1_exp`
    RandToBest1Exp,
}

impl DeStrategy {
    /// Every strategy, binomial variants first.
    pub const ALL: [Self; 14] = [
        Self::Rand1Bin,
        Self::Rand2Bin,
        Self::Rand2DirBin,
        Self::Best1Bin,
        Self::Best2Bin,
        Self::CurrentToBest1Bin,
        Self::RandToBest1Bin,
        Self::Rand1Exp,
        Self::Rand2Exp,
        Self::Rand2DirExp,
        Self::Best1Exp,
        Self::Best2Exp,
        Self::CurrentToBest1Exp,
        Self::RandToBest1Exp,
    ];

    /// The mutation component.
    #[must_use]
    pub const fn mutation(self) -> Mutation {
        match self {
            Self::Rand1Bin | Self::Rand1Exp => Mutation::Rand1,
            Self::Rand2Bin | Self::Rand2Exp => Mutation::Rand2,
            Self::Rand2DirBin | Self::Rand2DirExp => Mutation::Rand2Dir,
            Self::Best1Bin | Self::Best1Exp => Mutation::Best1,
            Self::Best2Bin | Self::Best2Exp => Mutation::Best2,
            Self::CurrentToBest1Bin | Self::CurrentToBest1Exp => Mutation::CurrentToBest1,
            Self::RandToBest1Bin | Self::RandToBest1Exp => Mutation::RandToBest1,
        }
    }

    /// The crossover component.
    #[must_use]
    pub const fn crossover(self) -> Crossover {
        match self {
            Self::Rand1Bin
            | Self::Rand2Bin
            | Self::Rand2DirBin
            | Self::Best1Bin
            | Self::Best2Bin
            | Self::CurrentToBest1Bin
            | Self::RandToBest1Bin => Crossover::Bin,
            _ => Crossover::Exp,
        }
    }
}

impl fmt::Display for DeStrategy {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}_{}", self.mutation().name(), self.crossover().name())
    }
}

impl FromStr for DeStrategy {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        let wanted = s.trim().to_ascii_lowercase();
        Self::ALL
            .into_iter()
            .find(|strategy| strategy.to_string() == wanted)
            .ok_or_else(|| Error::UnknownStrategy(s.to_owned()))
    }
}

impl TryFrom<String> for DeStrategy {
    type Error = Error;

    fn try_from(value: String) -> Result<Self> {
        value.parse()
    }
}

impl From<DeStrategy> for String {
    fn from(value: DeStrategy) -> Self {
        value.to_string()
    }
}

/// A pool member as seen by the DE operator.
#[derive(Clone, Copy, Debug)]
pub struct Donor<'a> {
    /// Position in the unit hypercube.
    pub vector: &'a [f64],
    /// Fitness, or `None` if not evaluated yet (ranks last).
    pub fitness: Option<f64>,
}

impl<'a> Donor<'a> {
    /// Creates a donor view.
    #[must_use]
    pub fn new(vector: &'a [f64], fitness: Option<f64>) -> Self {
        Self { vector, fitness }
    }

    fn rank_key(&self) -> f64 {
        self.fitness.unwrap_or(f64::INFINITY)
    }
}

/// Inputs shared by every mutation function.
struct MutationInput<'a> {
    target: &'a [f64],
    best: &'a [f64],
    donors: &'a [Vec<f64>],
    f: f64,
}

type MutationFn = fn(&MutationInput<'_>) -> Vec<f64>;

/// Mutation lookup table, indexed by [`Mutation`] discriminant.
const MUTATIONS: [MutationFn; 7] = [
    rand1,
    rand2,
    rand2dir,
    best1,
    best2,
    current_to_best1,
    rand_to_best1,
];

fn rand1(m: &MutationInput<'_>) -> Vec<f64> {
    let d = m.donors;
    (0..m.target.len())
        .map(|j| d[0][j] + m.f * (d[1][j] - d[2][j]))
        .collect()
}

fn rand2(m: &MutationInput<'_>) -> Vec<f64> {
    let d = m.donors;
    (0..m.target.len())
        .map(|j| d[0][j] + m.f * (d[1][j] - d[2][j]) + m.f * (d[3][j] - d[4][j]))
        .collect()
}

fn rand2dir(m: &MutationInput<'_>) -> Vec<f64> {
    let d = m.donors;
    (0..m.target.len())
        .map(|j| d[0][j] + m.f / 2.0 * (d[0][j] - d[1][j] - d[2][j]))
        .collect()
}

fn best1(m: &MutationInput<'_>) -> Vec<f64> {
    let d = m.donors;
    (0..m.target.len())
        .map(|j| m.best[j] + m.f * (d[0][j] - d[1][j]))
        .collect()
}

fn best2(m: &MutationInput<'_>) -> Vec<f64> {
    let d = m.donors;
    (0..m.target.len())
        .map(|j| m.best[j] + m.f * (d[0][j] - d[1][j]) + m.f * (d[2][j] - d[3][j]))
        .collect()
}

fn current_to_best1(m: &MutationInput<'_>) -> Vec<f64> {
    let d = m.donors;
    let x = m.target;
    (0..x.len())
        .map(|j| x[j] + m.f * (m.best[j] - x[j]) + m.f * (d[0][j] - d[1][j]))
        .collect()
}

fn rand_to_best1(m: &MutationInput<'_>) -> Vec<f64> {
    let d = m.donors;
    (0..m.target.len())
        .map(|j| d[0][j] + m.f * (m.best[j] - d[0][j]) + m.f * (d[1][j] - d[2][j]))
        .collect()
}

/// Index of the first member with the lowest fitness.
fn best_index(pool: &[Donor<'_>]) -> Option<usize> {
    let mut best: Option<(usize, f64)> = None;
    for (i, member) in pool.iter().enumerate() {
        let key = member.rank_key();
        if best.is_none_or(|(_, b)| key < b) {
            best = Some((i, key));
        }
    }
    best.map(|(i, _)| i)
}

/// Draw `count` distinct pool indices other than `exclude` (partial
/// Fisher-Yates); returns fewer when the pool is too small.
fn draw_indices(
    rng: &mut fastrand::Rng,
    n: usize,
    count: usize,
    exclude: Option<usize>,
) -> Vec<usize> {
    let mut candidates: Vec<usize> = (0..n).filter(|&i| Some(i) != exclude).collect();
    let take = count.min(candidates.len());
    for k in 0..take {
        let j = rng.usize(k..candidates.len());
        candidates.swap(k, j);
    }
    candidates.truncate(take);
    candidates
}

/// Mutation + crossover over a pool of vectors at one budget.
#[derive(Clone, Debug)]
pub struct DifferentialEvolution {
    strategy: DeStrategy,
    mutation_factor: f64,
    crossover_prob: f64,
}

impl DifferentialEvolution {
    /// Creates an operator with the given strategy, mutation factor `F` and
    /// crossover probability `CR`.
    ///
    /// # Errors
    ///
    /// Returns [`Error::InvalidMutationFactor`] unless `F ∈ (0, 2]` and
    /// [`Error::InvalidCrossoverProb`] unless `CR ∈ [0, 1]`.
    pub fn new(strategy: DeStrategy, mutation_factor: f64, crossover_prob: f64) -> Result<Self> {
        if !(mutation_factor > 0.0 && mutation_factor <= 2.0) {
            return Err(Error::InvalidMutationFactor(mutation_factor));
        }
        if !(0.0..=1.0).contains(&crossover_prob) {
            return Err(Error::InvalidCrossoverProb(crossover_prob));
        }
        Ok(Self {
            strategy,
            mutation_factor,
            crossover_prob,
        })
    }

    /// The configured strategy.
    #[must_use]
    pub fn strategy(&self) -> DeStrategy {
        self.strategy
    }

    /// The mutation factor `F`.
    #[must_use]
    pub fn mutation_factor(&self) -> f64 {
        self.mutation_factor
    }

    /// The crossover probability `CR`.
    #[must_use]
    pub fn crossover_prob(&self) -> f64 {
        self.crossover_prob
    }

    /// Build a mutant for `target` from `pool`.
    ///
    /// `exclude` is the target's own index in `pool`, if it is a member.
    /// The mutant is not clamped.
    #[must_use]
    pub fn mutate(
        &self,
        target: &[f64],
        pool: &[Donor<'_>],
        exclude: Option<usize>,
        rng: &mut fastrand::Rng,
    ) -> Vec<f64> {
        let dims = target.len();
        let mutation = self.strategy.mutation();
        let needed = mutation.n_donors();

        let mut drawn: Vec<Donor<'_>> = draw_indices(rng, pool.len(), needed, exclude)
            .into_iter()
            .map(|i| pool[i])
            .collect();
        if mutation == Mutation::Rand2Dir {
            drawn.sort_by(|a, b| a.rank_key().total_cmp(&b.rank_key()));
        }
        let mut donors: Vec<Vec<f64>> = drawn.iter().map(|d| d.vector.to_vec()).collect();
        while donors.len() < needed {
            donors.push(rng_util::unit_vector(rng, dims));
        }

        let best = if mutation.uses_best() {
            match best_index(pool) {
                Some(i) => pool[i].vector.to_vec(),
                None => rng_util::unit_vector(rng, dims),
            }
        } else {
            Vec::new()
        };

        let input = MutationInput {
            target,
            best: &best,
            donors: &donors,
            f: self.mutation_factor,
        };
        MUTATIONS[mutation.index()](&input)
    }

    /// Cross `mutant` into `target` according to the strategy's crossover.
    #[must_use]
    pub fn crossover(&self, target: &[f64], mutant: &[f64], rng: &mut fastrand::Rng) -> Vec<f64> {
        let dims = target.len();
        if dims == 0 {
            return Vec::new();
        }
        let mut trial = target.to_vec();
        match self.strategy.crossover() {
            Crossover::Bin => {
                let j_rand = rng.usize(0..dims);
                for j in 0..dims {
                    if j == j_rand || rng.f64() < self.crossover_prob {
                        trial[j] = mutant[j];
                    }
                }
            }
            Crossover::Exp => {
                let start = rng.usize(0..dims);
                let mut len = 1;
                while len < dims && rng.f64() < self.crossover_prob {
                    len += 1;
                }
                for offset in 0..len {
                    let j = (start + offset) % dims;
                    trial[j] = mutant[j];
                }
            }
        }
        trial
    }

    /// Propose a candidate for `target`: mutation, crossover, then clamping
    /// into `[0, 1]^d`.
    #[must_use]
    pub fn propose(
        &self,
        target: &[f64],
        pool: &[Donor<'_>],
        exclude: Option<usize>,
        rng: &mut fastrand::Rng,
    ) -> Vec<f64> {
        let mutant = self.mutate(target, pool, exclude, rng);
        let mut trial = self.crossover(target, &mutant, rng);
        for x in &mut trial {
            *x = if x.is_finite() { x.clamp(0.0, 1.0) } else { rng.f64() };
        }
        trial
    }

    /// Greedy selection: whether a trial with `trial_fitness` replaces a
    /// target with `target_fitness`. Ties favour the trial.
    #[must_use]
    pub fn select(target_fitness: Option<f64>, trial_fitness: f64) -> bool {
        target_fitness.is_none_or(|t| trial_fitness <= t)
    }
}
