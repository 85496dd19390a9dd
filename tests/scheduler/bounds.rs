use dehb::prelude::*;

use crate::common::{sequential, sum_evaluator, unit_space};

#[test]
fn no_bound_is_a_configuration_error() {
    let mut dehb = sequential(2, 0);
    assert!(matches!(
        dehb.run(StopCriteria::new()),
        Err(Error::Unbounded)
    ));
}

#[test]
fn bracket_bound_counts_whole_brackets() {
    let mut dehb = sequential(2, 1);
    let result = dehb.run(StopCriteria::new().brackets(1)).unwrap();
    assert_eq!(result.history.len(), 13);

    dehb.reset();
    let result = dehb.run(StopCriteria::new().brackets(3)).unwrap();
    // 13 + (6 + 2) + 3
    assert_eq!(result.history.len(), 24);
    assert_eq!(dehb.brackets_finished(), 3);
}

#[test]
fn bracket_cycle_wraps_around() {
    let mut dehb = sequential(2, 2);
    let result = dehb.run(StopCriteria::new().brackets(4)).unwrap();
    assert_eq!(result.history.len(), 24 + 13);
    assert_eq!(dehb.brackets_opened(), 4);
    // the fourth bracket starts again at the smallest budget
    assert!(result.history[24..33].iter().all(|r| r.budget == 1.0));
}

#[test]
fn total_cost_bound() {
    let mut dehb = sequential(2, 3);
    let result = dehb.run(StopCriteria::new().total_cost(20.0)).unwrap();
    let total: f64 = result.runtime.iter().sum();
    let last = *result.runtime.last().unwrap();
    assert!(total >= 20.0);
    assert!(total - last < 20.0);
    // 9 x 1 + 3 x 3 = 18, then the budget-9 evaluation crosses 20
    assert_eq!(result.history.len(), 13);
}

#[test]
fn zero_fevals_runs_nothing() {
    let mut dehb = sequential(2, 4);
    let result = dehb.run(StopCriteria::new().fevals(0)).unwrap();
    assert!(result.is_empty());
    assert_eq!(dehb.state(), SchedulerState::Terminated);
}

#[test]
fn fevals_caps_submissions_with_many_workers() {
    let mut dehb = Pdehb::builder()
        .min_budget(1.0)
        .max_budget(27.0)
        .n_workers(6)
        .seed(5)
        .space(unit_space(2))
        .evaluator(sum_evaluator)
        .build()
        .unwrap();
    for n in [1, 7, 25] {
        dehb.reset();
        let result = dehb.run(StopCriteria::new().fevals(n)).unwrap();
        assert_eq!(result.history.len(), n);
    }
}

#[test]
fn first_bound_reached_wins() {
    let mut dehb = sequential(2, 6);
    let result = dehb
        .run(StopCriteria::new().fevals(5).brackets(10).total_cost(1e9))
        .unwrap();
    assert_eq!(result.history.len(), 5);
}

#[test]
fn builder_rejects_bad_configuration() {
    let base = || {
        Pdehb::builder()
            .min_budget(1.0)
            .max_budget(9.0)
            .space(unit_space(1))
            .evaluator(sum_evaluator)
    };
    assert!(matches!(
        base().min_budget(10.0).build(),
        Err(Error::InvalidBudgetRange { .. })
    ));
    assert!(matches!(base().eta(1.0).build(), Err(Error::InvalidEta(_))));
    assert!(matches!(
        base().mutation_factor(0.0).build(),
        Err(Error::InvalidMutationFactor(_))
    ));
    assert!(matches!(
        base().crossover_prob(-0.1).build(),
        Err(Error::InvalidCrossoverProb(_))
    ));
    assert!(matches!(
        base().n_workers(0).build(),
        Err(Error::InvalidWorkerCount)
    ));
    assert!(matches!(
        Pdehb::builder().max_budget(9.0).build(),
        Err(Error::MissingComponent("min_budget"))
    ));
    assert!(matches!(
        Pdehb::builder()
            .min_budget(1.0)
            .max_budget(9.0)
            .space(unit_space(1))
            .build(),
        Err(Error::MissingComponent("evaluator"))
    ));
}
