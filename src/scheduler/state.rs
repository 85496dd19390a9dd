use std::collections::HashMap;
use std::time::Instant;

use crate::bracket::{Bracket, BracketPlan, Rung};
use crate::dispatcher::JobHandle;
use crate::history::History;
use crate::population::PopulationStore;

/// Lifecycle of a [`Pdehb`](crate::Pdehb) run.
///
/// `Idle → BracketActive → Draining → Terminated`; [`reset`](crate::Pdehb::reset)
/// returns to `Idle`.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Hash)]
pub enum SchedulerState {
    /// Nothing has run since construction or the last reset.
    #[default]
    Idle,
    /// Brackets are being scheduled.
    BracketActive,
    /// A stop bound fired; collecting outstanding results.
    Draining,
    /// The last `run` returned.
    Terminated,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub(crate) enum SlotStatus {
    Pending,
    Submitted,
    Done,
}

/// Progress of one opened bracket.
#[derive(Clone, Debug)]
pub(crate) struct BracketRun {
    /// Opening order over the lifetime of the state.
    pub(crate) seq: u64,
    pub(crate) bracket: Bracket,
    pub(crate) rung: usize,
    pub(crate) slots: Vec<SlotStatus>,
    /// Vectors promoted into the current rung, best first.
    pub(crate) parents: Vec<Vec<f64>>,
    /// Parent placed into each slot of the current rung.
    placed: Vec<Option<usize>>,
    next_parent: usize,
}

impl BracketRun {
    pub(crate) fn new(seq: u64, bracket: Bracket) -> Self {
        let size = bracket.rungs.first().map_or(0, |r| r.population_size);
        Self {
            seq,
            bracket,
            rung: 0,
            slots: vec![SlotStatus::Pending; size],
            parents: Vec::new(),
            placed: vec![None; size],
            next_parent: 0,
        }
    }

    pub(crate) fn current(&self) -> &Rung {
        &self.bracket.rungs[self.rung]
    }

    pub(crate) fn next_rung(&self) -> Option<&Rung> {
        self.bracket.rungs.get(self.rung + 1)
    }

    pub(crate) fn next_pending(&self) -> Option<usize> {
        self.slots.iter().position(|&s| s == SlotStatus::Pending)
    }

    pub(crate) fn rung_complete(&self) -> bool {
        self.slots.iter().all(|&s| s == SlotStatus::Done)
    }

    /// Move to the next rung with the given promoted parents.
    pub(crate) fn advance(&mut self, parents: Vec<Vec<f64>>) {
        self.rung += 1;
        let size = self.current().population_size;
        self.slots = vec![SlotStatus::Pending; size];
        self.parents = parents;
        self.placed = vec![None; size];
        self.next_parent = 0;
    }

    /// Parent to evaluate in the empty population slot `slot`.
    ///
    /// Empty slots receive the parents in rank order, whatever their index,
    /// so the best promotion is never skipped because its own index is
    /// occupied. A slot keeps its parent if it is dispatched again.
    pub(crate) fn parent_for(&mut self, slot: usize) -> Option<&[f64]> {
        let index = match self.placed.get(slot).copied().flatten() {
            Some(index) => index,
            None => {
                if self.next_parent >= self.parents.len() {
                    return None;
                }
                let index = self.next_parent;
                self.next_parent += 1;
                if let Some(p) = self.placed.get_mut(slot) {
                    *p = Some(index);
                }
                index
            }
        };
        self.parents.get(index).map(Vec::as_slice)
    }
}

/// Where a dispatched job belongs.
#[derive(Clone, Copy, Debug)]
pub(crate) struct SlotRef {
    pub(crate) seq: u64,
    pub(crate) rung: usize,
    pub(crate) slot: usize,
    pub(crate) level: usize,
}

/// Everything a run mutates. Rebuilt from scratch by `reset`.
#[derive(Debug)]
pub(crate) struct RunState {
    pub(crate) phase: SchedulerState,
    pub(crate) rng: fastrand::Rng,
    pub(crate) populations: PopulationStore,
    pub(crate) history: History,
    /// Open brackets, oldest first.
    pub(crate) active: Vec<BracketRun>,
    pub(crate) pending: HashMap<JobHandle, SlotRef>,
    /// Position in the bracket cycle of the next bracket to open.
    pub(crate) next_bracket: usize,
    pub(crate) opened: u64,
    pub(crate) finished: u64,
    pub(crate) started: Option<Instant>,
}

impl RunState {
    pub(crate) fn new(plan: &BracketPlan, seed: Option<u64>) -> Self {
        Self {
            phase: SchedulerState::Idle,
            rng: crate::rng_util::make_rng(seed),
            populations: PopulationStore::new(plan),
            history: History::new(),
            active: Vec::new(),
            pending: HashMap::new(),
            next_bracket: 0,
            opened: 0,
            finished: 0,
            started: None,
        }
    }

    /// Seconds since the first `run` on this state.
    pub(crate) fn elapsed_secs(&self) -> f64 {
        self.started.map_or(0.0, |t| t.elapsed().as_secs_f64())
    }
}
