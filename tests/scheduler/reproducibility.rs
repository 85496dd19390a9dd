use dehb::prelude::*;

use crate::common::sequential;

fn vectors(result: &RunResult) -> Vec<Vec<f64>> {
    result.history.iter().map(|r| r.vector.clone()).collect()
}

#[test]
fn same_seed_same_history() {
    let a = sequential(3, 42).run(StopCriteria::new().fevals(40)).unwrap();
    let b = sequential(3, 42).run(StopCriteria::new().fevals(40)).unwrap();
    assert_eq!(vectors(&a), vectors(&b));
    assert_eq!(a.trajectory, b.trajectory);
}

#[test]
fn reset_reproduces_a_fresh_run() {
    let mut dehb = sequential(3, 9);
    let first = dehb.run(StopCriteria::new().fevals(30)).unwrap();
    dehb.reset();
    assert_eq!(dehb.state(), SchedulerState::Idle);
    let second = dehb.run(StopCriteria::new().fevals(30)).unwrap();
    assert_eq!(vectors(&first), vectors(&second));
}

#[test]
fn reseed_changes_the_next_run() {
    let mut dehb = sequential(3, 9);
    let first = dehb.run(StopCriteria::new().fevals(20)).unwrap();
    dehb.reseed(10);
    dehb.reset();
    let second = dehb.run(StopCriteria::new().fevals(20)).unwrap();
    assert_ne!(vectors(&first), vectors(&second));

    let fresh = sequential(3, 10).run(StopCriteria::new().fevals(20)).unwrap();
    assert_eq!(vectors(&second), vectors(&fresh));
}

#[test]
fn run_without_reset_continues() {
    let mut dehb = sequential(2, 13);
    let first = dehb.run(StopCriteria::new().fevals(10)).unwrap();
    let second = dehb.run(StopCriteria::new().fevals(10)).unwrap();
    assert_eq!(second.history.len(), 20);
    assert_eq!(vectors(&first)[..], vectors(&second)[..10]);

    // splitting a run is the same as one long run
    let whole = sequential(2, 13).run(StopCriteria::new().fevals(20)).unwrap();
    assert_eq!(vectors(&whole), vectors(&second));
}

#[test]
fn promotions_are_deterministic() {
    let mut a = sequential(3, 77);
    let mut b = sequential(3, 77);
    a.run(StopCriteria::new().brackets(3)).unwrap();
    b.run(StopCriteria::new().brackets(3)).unwrap();

    for level in 0..a.plan().budgets().len() {
        let pa: Vec<(usize, Vec<f64>)> = a
            .population(level)
            .unwrap()
            .iter()
            .map(|(i, ind)| (i, ind.vector.clone()))
            .collect();
        let pb: Vec<(usize, Vec<f64>)> = b
            .population(level)
            .unwrap()
            .iter()
            .map(|(i, ind)| (i, ind.vector.clone()))
            .collect();
        assert_eq!(pa, pb, "level {level}");
        assert!(!pa.is_empty());
    }
}
