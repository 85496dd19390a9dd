use dehb::prelude::*;

use crate::common::{assert_incumbent_is_history_min, sequential, sum_of};

#[test]
fn fevals_bound_gives_exact_history() {
    let mut dehb = sequential(4, 1);
    let result = dehb.run(StopCriteria::new().fevals(50)).unwrap();

    assert_eq!(result.history.len(), 50);
    assert_eq!(result.trajectory.len(), 50);
    assert_eq!(result.runtime.len(), 50);
    assert_eq!(dehb.state(), SchedulerState::Terminated);
}

#[test]
fn trajectory_is_non_increasing() {
    let mut dehb = sequential(4, 2);
    let result = dehb.run(StopCriteria::new().fevals(50)).unwrap();
    for w in result.trajectory.windows(2) {
        assert!(w[1] <= w[0], "trajectory went up: {w:?}");
    }
    assert_incumbent_is_history_min(&result);
    assert_eq!(
        result.trajectory.last().copied(),
        result.incumbent.as_ref().map(|i| i.fitness)
    );
}

#[test]
fn history_stays_on_planned_budgets_and_in_bounds() {
    let mut dehb = sequential(3, 3);
    let result = dehb.run(StopCriteria::new().fevals(40)).unwrap();
    let budgets = dehb.plan().budgets().to_vec();
    for record in &result.history {
        assert!(budgets.contains(&record.budget), "{}", record.budget);
        assert!(record.vector.iter().all(|x| (0.0..=1.0).contains(x)));
        assert_eq!(record.cost, record.budget);
        assert!(record.failure.is_none());
    }
}

#[test]
fn history_vectors_map_back_to_evaluated_configs() {
    let mut dehb = sequential(4, 4);
    let result = dehb.run(StopCriteria::new().fevals(30)).unwrap();
    for record in &result.history {
        let config = dehb.vector_to_config(&record.vector).unwrap();
        assert!((sum_of(&config) - record.fitness).abs() < 1e-9);
    }
}

#[test]
fn incumbent_config_matches_incumbent() {
    let mut dehb = sequential(2, 5);
    dehb.run(StopCriteria::new().fevals(20)).unwrap();
    let inc = dehb.incumbent().unwrap().clone();
    let config = dehb.incumbent_config().unwrap().unwrap();
    assert!((sum_of(&config) - inc.fitness).abs() < 1e-9);
}

#[test]
fn search_improves_on_random_start() {
    // minimum of the sum over [0,1]^2 is 0
    let mut dehb = sequential(2, 6);
    let result = dehb.run(StopCriteria::new().fevals(150)).unwrap();
    let first_rung_best = result.history[..9]
        .iter()
        .map(|r| r.fitness)
        .fold(f64::INFINITY, f64::min);
    let final_best = result.incumbent.unwrap().fitness;
    assert!(final_best <= first_rung_best);
    assert!(final_best < 0.5, "final best {final_best}");
}

#[test]
fn improvements_point_at_strict_decreases() {
    let mut dehb = sequential(3, 7);
    let result = dehb.run(StopCriteria::new().fevals(40)).unwrap();
    let improvements = result.improvements();
    assert_eq!(improvements.first(), Some(&0));
    for &i in &improvements[1..] {
        assert!(result.trajectory[i] < result.trajectory[i - 1]);
    }
    let cumulative = result.cumulative_runtime();
    let total: f64 = result.runtime.iter().sum();
    assert!((cumulative.last().unwrap() - total).abs() < 1e-9);
}

#[test]
fn mixed_space_runs_with_every_strategy() {
    for strategy in dehb::de::DeStrategy::ALL {
        let space = SearchSpace::builder()
            .add(FloatParam::new("lr", 1e-4, 1.0).log_scale())
            .add(IntParam::new("depth", 1, 8))
            .add(CategoricalParam::new("opt", ["sgd", "adam", "rmsprop"]))
            .add(BoolParam::new("bn"))
            .build()
            .unwrap();
        let mut dehb = Pdehb::builder()
            .strategy(strategy)
            .min_budget(1.0)
            .max_budget(9.0)
            .seed(11)
            .space(space)
            .evaluator(|c: &Configuration, b: Option<f64>| {
                let lr = c.get_float("lr").ok_or("lr")?;
                let depth = c.get_int("depth").ok_or("depth")?;
                let opt = c.get_index("opt").ok_or("opt")?;
                let bn = c.get_bool("bn").ok_or("bn")?;
                let loss = lr.log10().abs() + depth as f64 + opt as f64 + f64::from(u8::from(bn));
                Ok::<_, &'static str>(Evaluation::new(loss, b.unwrap_or(1.0)))
            })
            .build()
            .unwrap();
        let result = dehb.run(StopCriteria::new().fevals(25)).unwrap();
        assert_eq!(result.history.len(), 25, "{strategy}");
        assert!(
            result.history.iter().all(|r| r.failure.is_none()),
            "{strategy}"
        );
    }
}

#[test]
fn best_promotion_is_evaluated_at_the_next_budget() {
    for seed in 0..10 {
        let mut dehb = sequential(2, seed);
        let result = dehb.run(StopCriteria::new().brackets(2)).unwrap();
        let history = &result.history;
        assert_eq!(history.len(), 21);

        // bracket 1 promotes from the budget-3 population into budget 9,
        // where slot 0 is already held by bracket 0's survivor
        let best = history[9..19]
            .iter()
            .filter(|r| r.budget == 3.0)
            .min_by(|a, b| a.fitness.total_cmp(&b.fitness))
            .unwrap();
        assert!(
            history[19..21]
                .iter()
                .any(|r| r.budget == 9.0 && r.vector == best.vector),
            "seed {seed}: best budget-3 configuration was not promoted"
        );
    }
}
