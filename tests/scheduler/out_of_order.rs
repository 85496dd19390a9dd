use dehb::prelude::*;

use crate::common::{ReverseDispatcher, assert_incumbent_is_history_min, unit_space};

fn reversed(capacity: usize, seed: u64) -> Pdehb {
    Pdehb::builder()
        .min_budget(1.0)
        .max_budget(9.0)
        .seed(seed)
        .space(unit_space(3))
        .dispatcher(ReverseDispatcher::new(capacity))
        .build()
        .unwrap()
}

#[test]
fn reverse_completion_order_finishes_brackets() {
    let mut dehb = reversed(4, 1);
    assert_eq!(dehb.n_workers(), 4);
    let result = dehb.run(StopCriteria::new().brackets(2)).unwrap();

    // bracket 0: 9 + 3 + 1, bracket 1: 6 + 2
    assert_eq!(result.history.len(), 21);
    assert_eq!(dehb.brackets_opened(), 2);
    assert_eq!(dehb.brackets_finished(), 2);
    assert_incumbent_is_history_min(&result);
}

#[test]
fn populations_respect_capacity_under_reordering() {
    let mut dehb = reversed(5, 2);
    dehb.run(StopCriteria::new().fevals(70)).unwrap();
    for (level, _) in dehb.plan().budgets().iter().enumerate() {
        let pop = dehb.population(level).unwrap();
        assert!(pop.len() <= dehb.plan().capacity(level));
        assert_eq!(pop.capacity(), dehb.plan().capacity(level));
    }
}

#[test]
fn fevals_is_exact_with_batched_completions() {
    let mut dehb = reversed(4, 3);
    let result = dehb.run(StopCriteria::new().fevals(30)).unwrap();
    assert_eq!(result.history.len(), 30);
    for w in result.trajectory.windows(2) {
        assert!(w[1] <= w[0]);
    }
}

#[test]
fn population_members_come_from_history() {
    let mut dehb = reversed(3, 4);
    let result = dehb.run(StopCriteria::new().fevals(40)).unwrap();
    for (level, &budget) in dehb.plan().budgets().iter().enumerate() {
        for (_, ind) in dehb.population(level).unwrap().iter() {
            assert_eq!(ind.budget, budget);
            assert!(
                result
                    .history
                    .iter()
                    .any(|r| r.vector == ind.vector && r.budget == budget),
                "population member was never evaluated at its budget"
            );
        }
    }
}
