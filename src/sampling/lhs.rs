use nalgebra::DMatrix;
use rand::rngs::StdRng;
use rand::seq::SliceRandom;
use rand::{Rng, SeedableRng};

/// Latin hypercube on [0, 1]^d: every column hits each of the `n` strata exactly once.
/// Points are placed at random inside their stratum, or at its centre when `centered`.
/// The same seed always produces the same design.
pub fn latin_hypercube(n: usize, d: usize, seed: u64, centered: bool) -> DMatrix<f64> {
    let mut rng = StdRng::seed_from_u64(seed);
    let mut design = DMatrix::zeros(n, d);
    let width = 1.0 / n as f64;
    for c in 0..d {
        let mut strata: Vec<usize> = (0..n).collect();
        strata.shuffle(&mut rng);
        for (r, &k) in strata.iter().enumerate() {
            let offset = if centered { 0.5 } else { rng.random::<f64>() };
            design[(r, c)] = (k as f64 + offset) * width;
        }
    }
    design
}
