//! Per-budget populations.
//!
//! Each budget level of a [`BracketPlan`] owns one [`Population`] with a
//! fixed number of slots (the level's capacity). A rung of size `n` at that
//! level works on slots `0..n`, so brackets that revisit a level warm-start
//! from whatever earlier brackets left there.
//!
//! Individuals are never modified after evaluation: an update installs a
//! new [`Individual`] into the slot.

use crate::bracket::BracketPlan;
use crate::de::{DifferentialEvolution, Donor};

/// An evaluated (or pending) point of the unit hypercube.
#[derive(Clone, Debug, PartialEq)]
pub struct Individual {
    /// Position in `[0, 1]^d`.
    pub vector: Vec<f64>,
    /// Objective value; `None` until evaluated.
    pub fitness: Option<f64>,
    /// Budget the fitness was measured at.
    pub budget: f64,
    /// Cost reported by the evaluator.
    pub cost: f64,
    /// Number of completed evaluations when this individual was installed.
    pub birth_generation: u64,
}

impl Individual {
    /// Ranking key: unset fitness ranks last.
    #[must_use]
    pub fn rank_key(&self) -> f64 {
        self.fitness.unwrap_or(f64::INFINITY)
    }

    /// View as a DE donor.
    #[must_use]
    pub fn as_donor(&self) -> Donor<'_> {
        Donor::new(&self.vector, self.fitness)
    }
}

/// Fixed-capacity slots of individuals at one budget level.
#[derive(Clone, Debug, Default)]
pub struct Population {
    slots: Vec<Option<Individual>>,
}

impl Population {
    /// Creates an empty population with `capacity` slots.
    #[must_use]
    pub fn new(capacity: usize) -> Self {
        Self {
            slots: vec![None; capacity],
        }
    }

    /// Number of slots.
    #[must_use]
    pub fn capacity(&self) -> usize {
        self.slots.len()
    }

    /// Number of occupied slots.
    #[must_use]
    pub fn len(&self) -> usize {
        self.slots.iter().filter(|s| s.is_some()).count()
    }

    /// Returns `true` if no slot is occupied.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.slots.iter().all(Option::is_none)
    }

    /// The individual in `slot`, if any.
    #[must_use]
    pub fn get(&self, slot: usize) -> Option<&Individual> {
        self.slots.get(slot).and_then(Option::as_ref)
    }

    /// Put `individual` into `slot` unconditionally, returning the previous
    /// occupant. Slots beyond the capacity are ignored.
    pub fn install(&mut self, slot: usize, individual: Individual) -> Option<Individual> {
        debug_assert!(slot < self.slots.len(), "slot {slot} out of range");
        self.slots.get_mut(slot)?.replace(individual)
    }

    /// Greedy selection: install `trial` into `slot` if the slot is empty
    /// or the trial is no worse than the occupant. Returns whether it was
    /// installed.
    pub fn offer(&mut self, slot: usize, trial: Individual) -> bool {
        let Some(current) = self.slots.get_mut(slot) else {
            return false;
        };
        let trial_fitness = trial.rank_key();
        let replace = current
            .as_ref()
            .is_none_or(|c| DifferentialEvolution::select(c.fitness, trial_fitness));
        if replace {
            *current = Some(trial);
        }
        replace
    }

    /// Occupied slots among the first `limit`, ranked by ascending fitness.
    /// The sort is stable, so ties keep slot order.
    #[must_use]
    pub fn ranked_within(&self, limit: usize) -> Vec<usize> {
        let mut ranked: Vec<usize> = self
            .slots
            .iter()
            .take(limit)
            .enumerate()
            .filter_map(|(i, s)| s.as_ref().map(|_| i))
            .collect();
        ranked.sort_by(|&a, &b| self.key(a).total_cmp(&self.key(b)));
        ranked
    }

    /// All occupied slots, ranked by ascending fitness.
    #[must_use]
    pub fn ranked(&self) -> Vec<usize> {
        self.ranked_within(self.slots.len())
    }

    /// The `k` best individuals among the first `limit` slots.
    #[must_use]
    pub fn top_k(&self, k: usize, limit: usize) -> Vec<&Individual> {
        self.ranked_within(limit)
            .into_iter()
            .take(k)
            .filter_map(|i| self.get(i))
            .collect()
    }

    /// First individual with the lowest fitness.
    #[must_use]
    pub fn best(&self) -> Option<&Individual> {
        self.ranked().first().and_then(|&i| self.get(i))
    }

    /// Occupied slots with their individuals, in slot order.
    pub fn iter(&self) -> impl Iterator<Item = (usize, &Individual)> {
        self.slots
            .iter()
            .enumerate()
            .filter_map(|(i, s)| s.as_ref().map(|ind| (i, ind)))
    }

    fn key(&self, slot: usize) -> f64 {
        self.get(slot).map_or(f64::INFINITY, Individual::rank_key)
    }
}

/// One [`Population`] per budget level.
#[derive(Clone, Debug, Default)]
pub struct PopulationStore {
    levels: Vec<Population>,
}

impl PopulationStore {
    /// Creates empty populations sized by the plan's level capacities.
    #[must_use]
    pub fn new(plan: &BracketPlan) -> Self {
        Self {
            levels: (0..plan.budgets().len())
                .map(|l| Population::new(plan.capacity(l)))
                .collect(),
        }
    }

    /// Number of levels.
    #[must_use]
    pub fn n_levels(&self) -> usize {
        self.levels.len()
    }

    /// Population at `level`.
    #[must_use]
    pub fn level(&self, level: usize) -> Option<&Population> {
        self.levels.get(level)
    }

    /// Mutable population at `level`.
    pub fn level_mut(&mut self, level: usize) -> Option<&mut Population> {
        self.levels.get_mut(level)
    }

    /// Total occupied slots over all levels.
    #[must_use]
    pub fn n_individuals(&self) -> usize {
        self.levels.iter().map(Population::len).sum()
    }
}
