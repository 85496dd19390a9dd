use core::time::Duration;
use std::sync::Arc;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::time::Instant;

use dehb::prelude::*;

use crate::common::{StuckDispatcher, assert_incumbent_is_history_min, sum_of, unit_space};

fn with_evaluator(evaluator: impl Evaluator + 'static, workers: usize) -> Pdehb {
    Pdehb::builder()
        .min_budget(1.0)
        .max_budget(9.0)
        .n_workers(workers)
        .seed(21)
        .space(unit_space(2))
        .evaluator(evaluator)
        .build()
        .unwrap()
}

fn check_failures(result: &RunResult) -> usize {
    let failures: Vec<&Record> = result.history.iter().filter(|r| r.failure.is_some()).collect();
    for f in &failures {
        assert_eq!(f.fitness, f64::INFINITY);
    }
    if let Some(inc) = &result.incumbent {
        assert!(inc.fitness.is_finite());
    }
    assert_incumbent_is_history_min(result);
    failures.len()
}

#[test]
fn evaluator_errors_are_recorded_and_skipped() {
    let mut dehb = with_evaluator(
        |c: &Configuration, b: Option<f64>| {
            let x0 = c.get_float("x0").unwrap_or(0.0);
            if x0 < 0.3 {
                return Err(format!("x0 too small: {x0}"));
            }
            Ok(Evaluation::new(sum_of(c), b.unwrap_or(1.0)))
        },
        1,
    );
    let result = dehb.run(StopCriteria::new().fevals(40)).unwrap();
    assert_eq!(result.history.len(), 40);
    let n = check_failures(&result);
    assert!(
        result
            .history
            .iter()
            .filter_map(|r| r.failure.as_deref())
            .all(|m| m.starts_with("x0 too small"))
    );
    assert!(n < 40);
}

#[test]
fn panicking_evaluator_does_not_abort_the_run() {
    let mut dehb = with_evaluator(
        |c: &Configuration, b: Option<f64>| {
            assert!(c.get_float("x1").unwrap_or(0.0) <= 0.7, "x1 out of range");
            Ok::<_, String>(Evaluation::new(sum_of(c), b.unwrap_or(1.0)))
        },
        2,
    );
    let result = dehb.run(StopCriteria::new().fevals(30)).unwrap();
    assert_eq!(result.history.len(), 30);
    check_failures(&result);
    assert!(
        result
            .history
            .iter()
            .filter_map(|r| r.failure.as_deref())
            .all(|m| m.contains("panicked"))
    );
}

#[test]
fn non_finite_results_are_failures() {
    let mut dehb = with_evaluator(
        |c: &Configuration, b: Option<f64>| {
            let s = sum_of(c);
            let fitness = if s > 1.0 { f64::NAN } else { s };
            Ok::<_, String>(Evaluation::new(fitness, b.unwrap_or(1.0)))
        },
        1,
    );
    let result = dehb.run(StopCriteria::new().fevals(30)).unwrap();
    check_failures(&result);
    for r in &result.history {
        assert!(r.fitness.is_infinite() || r.fitness <= 1.0);
    }
}

#[test]
fn all_failures_leave_no_incumbent() {
    let mut dehb = with_evaluator(
        |_: &Configuration, _: Option<f64>| Err::<Evaluation, _>("always"),
        2,
    );
    let result = dehb.run(StopCriteria::new().fevals(15)).unwrap();
    assert_eq!(result.history.len(), 15);
    assert!(result.incumbent.is_none());
    assert!(result.trajectory.iter().all(|t| t.is_infinite()));
    assert!(result.improvements().is_empty());
}

#[test]
fn drain_timeout_abandons_stuck_jobs() {
    let abandoned = Arc::new(AtomicUsize::new(0));
    let mut dehb = Pdehb::builder()
        .min_budget(1.0)
        .max_budget(9.0)
        .seed(1)
        .drain_timeout(Duration::from_millis(50))
        .space(unit_space(2))
        .dispatcher(StuckDispatcher::new(Arc::clone(&abandoned)))
        .build()
        .unwrap();

    let result = dehb.run(StopCriteria::new().total_cost(1.0)).unwrap();
    assert_eq!(result.history.len(), 1);
    assert_eq!(abandoned.load(Ordering::SeqCst), 1);
    assert_eq!(dehb.state(), SchedulerState::Terminated);
}

#[test]
fn default_drain_timeout_bounds_a_stalled_run() {
    let abandoned = Arc::new(AtomicUsize::new(0));
    let mut dehb = Pdehb::builder()
        .min_budget(1.0)
        .max_budget(9.0)
        .seed(2)
        .space(unit_space(2))
        .dispatcher(StuckDispatcher::new(Arc::clone(&abandoned)))
        .build()
        .unwrap();
    assert_eq!(dehb.drain_timeout(), PdehbBuilder::DEFAULT_DRAIN_TIMEOUT);

    let start = Instant::now();
    let result = dehb.run(StopCriteria::new().total_cost(1.0)).unwrap();
    let elapsed = start.elapsed();

    assert_eq!(result.history.len(), 1);
    assert_eq!(abandoned.load(Ordering::SeqCst), 1);
    assert!(elapsed >= PdehbBuilder::DEFAULT_DRAIN_TIMEOUT);
    assert!(elapsed < PdehbBuilder::DEFAULT_DRAIN_TIMEOUT + Duration::from_secs(5));

    // reset drains with the same bound
    dehb.reset();
    assert_eq!(dehb.state(), SchedulerState::Idle);
}
