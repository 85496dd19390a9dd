use core::time::Duration;
use std::sync::Arc;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::thread;

use dehb::prelude::*;

use crate::common::{assert_incumbent_is_history_min, sum_evaluator, sum_of, unit_space};

fn run_with_workers(k: usize, fevals: usize) -> (RunResult, usize) {
    let running = Arc::new(AtomicUsize::new(0));
    let peak = Arc::new(AtomicUsize::new(0));
    let (r, p) = (Arc::clone(&running), Arc::clone(&peak));

    let mut dehb = Pdehb::builder()
        .min_budget(1.0)
        .max_budget(27.0)
        .n_workers(k)
        .seed(5)
        .space(unit_space(3))
        .evaluator(move |c: &Configuration, b: Option<f64>| {
            let now = r.fetch_add(1, Ordering::SeqCst) + 1;
            p.fetch_max(now, Ordering::SeqCst);
            thread::sleep(Duration::from_millis(2));
            r.fetch_sub(1, Ordering::SeqCst);
            Ok::<_, String>(Evaluation::new(sum_of(c), b.unwrap_or(1.0)))
        })
        .build()
        .unwrap();
    assert_eq!(dehb.n_workers(), k);

    let result = dehb.run(StopCriteria::new().fevals(fevals)).unwrap();
    assert_eq!(running.load(Ordering::SeqCst), 0);
    (result, peak.load(Ordering::SeqCst))
}

#[test]
fn outstanding_jobs_never_exceed_workers() {
    for k in [1, 2, 8] {
        let (result, peak) = run_with_workers(k, 60);
        assert!(peak <= k, "k={k} peak={peak}");
        assert!(peak >= 1);
        assert_eq!(result.history.len(), 60, "k={k}");
        assert_incumbent_is_history_min(&result);
    }
}

#[test]
fn parallel_run_keeps_trajectory_monotone() {
    let (result, _) = run_with_workers(4, 80);
    for w in result.trajectory.windows(2) {
        assert!(w[1] <= w[0]);
    }
    let times: Vec<f64> = result.history.iter().map(|r| r.wall_clock_time).collect();
    let mut sorted = times.clone();
    sorted.sort_by(f64::total_cmp);
    assert_eq!(times, sorted);
}

#[test]
fn serialized_stateful_evaluator() {
    struct Counting {
        calls: Arc<AtomicUsize>,
    }

    impl EvaluateMut for Counting {
        type Error = String;

        fn evaluate_mut(
            &mut self,
            config: &Configuration,
            budget: Option<f64>,
        ) -> std::result::Result<Evaluation, String> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            Ok(Evaluation::new(sum_of(config), budget.unwrap_or(1.0)))
        }
    }

    let calls = Arc::new(AtomicUsize::new(0));
    let proxy = Serialized::new(Counting {
        calls: Arc::clone(&calls),
    });
    let mut dehb = Pdehb::builder()
        .min_budget(1.0)
        .max_budget(9.0)
        .n_workers(4)
        .seed(1)
        .space(unit_space(2))
        .evaluator(proxy)
        .build()
        .unwrap();
    let result = dehb.run(StopCriteria::new().fevals(30)).unwrap();
    assert_eq!(calls.load(Ordering::SeqCst), 30);
    assert_eq!(result.history.len(), 30);
}

#[tokio::test]
async fn run_inside_a_current_thread_runtime() {
    let mut dehb = Pdehb::builder()
        .min_budget(1.0)
        .max_budget(9.0)
        .n_workers(2)
        .seed(8)
        .space(unit_space(2))
        .evaluator(sum_evaluator)
        .build()
        .unwrap();
    let result = dehb.run(StopCriteria::new().fevals(10)).unwrap();
    assert_eq!(result.history.len(), 10);
}

#[tokio::test(flavor = "multi_thread", worker_threads = 2)]
async fn run_from_spawn_blocking() {
    let result = tokio::task::spawn_blocking(|| {
        let mut dehb = Pdehb::builder()
            .min_budget(1.0)
            .max_budget(9.0)
            .n_workers(3)
            .seed(9)
            .space(unit_space(2))
            .evaluator(sum_evaluator)
            .build()
            .unwrap();
        dehb.run(StopCriteria::new().fevals(20)).unwrap()
    })
    .await
    .unwrap();
    assert_eq!(result.history.len(), 20);
}
