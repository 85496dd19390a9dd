/// Sample a point uniformly from the unit hypercube `[0, 1)^dims`.
pub(crate) fn unit_vector(rng: &mut fastrand::Rng, dims: usize) -> Vec<f64> {
    (0..dims).map(|_| rng.f64()).collect()
}

/// Build an RNG from an optional seed.
pub(crate) fn make_rng(seed: Option<u64>) -> fastrand::Rng {
    seed.map_or_else(fastrand::Rng::new, fastrand::Rng::with_seed)
}
