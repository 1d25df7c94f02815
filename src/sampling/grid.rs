use crate::error::SweepError;
use itertools::Itertools;
use nalgebra::DMatrix;

/// one entry means "the same number of levels for every dimension"
pub fn expand_levels(levels: &[usize], dimension: usize) -> Result<Vec<usize>, SweepError> {
    let expanded = match levels.len() {
        1 => vec![levels[0]; dimension],
        n if n == dimension => levels.to_vec(),
        n => {
            return Err(SweepError::Config(format!(
                "grid has {} level counts for {} parameters",
                n, dimension
            )));
        }
    };
    if expanded.iter().any(|&l| l == 0) {
        return Err(SweepError::Config(
            "grid needs at least one level per parameter".to_string(),
        ));
    }
    Ok(expanded)
}

/// evenly spaced points of [0, 1] including both ends; a single level is the midpoint
pub fn unit_levels(n: usize) -> Vec<f64> {
    match n {
        0 => Vec::new(),
        1 => vec![0.5],
        _ => (0..n).map(|k| k as f64 / (n - 1) as f64).collect(),
    }
}

/// full factorial design, the last dimension varies fastest
pub fn unit_grid(levels: &[usize]) -> DMatrix<f64> {
    let axes: Vec<Vec<f64>> = levels.iter().map(|&n| unit_levels(n)).collect();
    let rows: Vec<Vec<f64>> = axes.into_iter().multi_cartesian_product().collect();
    DMatrix::from_fn(rows.len(), levels.len(), |r, c| rows[r][c])
}
