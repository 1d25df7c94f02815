//! Rank based sensitivity measures between sampled inputs and a scalar output.
use crate::error::SweepError;
use nalgebra::DMatrix;

/// Sensitivity of one output to one sampled parameter. `None` marks a measure that
/// cannot be computed from the data, e.g. a constant column.
#[derive(Debug, Clone, PartialEq)]
pub struct SensitivityIndex {
    pub parameter: String,
    pub pearson: Option<f64>,
    pub spearman: Option<f64>,
    pub prcc: Option<f64>,
}

/// 1-based ranks, ties share the average of their positions
pub fn rank(values: &[f64]) -> Vec<f64> {
    let n = values.len();
    let mut order: Vec<usize> = (0..n).collect();
    order.sort_by(|&a, &b| values[a].total_cmp(&values[b]));
    let mut ranks = vec![0.0; n];
    let mut start = 0;
    while start < n {
        let mut end = start + 1;
        while end < n && values[order[end]] == values[order[start]] {
            end += 1;
        }
        let average = (start + end + 1) as f64 / 2.0;
        for &idx in &order[start..end] {
            ranks[idx] = average;
        }
        start = end;
    }
    ranks
}

/// None for fewer than two points or a constant input
pub fn pearson(x: &[f64], y: &[f64]) -> Option<f64> {
    let n = x.len().min(y.len());
    if n < 2 {
        return None;
    }
    let mean_x = x[..n].iter().sum::<f64>() / n as f64;
    let mean_y = y[..n].iter().sum::<f64>() / n as f64;
    let (mut sxy, mut sxx, mut syy) = (0.0, 0.0, 0.0);
    for (xi, yi) in x[..n].iter().zip(&y[..n]) {
        let dx = xi - mean_x;
        let dy = yi - mean_y;
        sxy += dx * dy;
        sxx += dx * dx;
        syy += dy * dy;
    }
    if sxx <= 0.0 || syy <= 0.0 {
        return None;
    }
    Some((sxy / (sxx * syy).sqrt()).clamp(-1.0, 1.0))
}

pub fn spearman(x: &[f64], y: &[f64]) -> Option<f64> {
    pearson(&rank(x), &rank(y))
}

/// Partial rank correlation of every input column with `y`, each controlling for the
/// other inputs. Computed from the inverse of the rank correlation matrix of [X | y].
pub fn prcc(inputs: &DMatrix<f64>, y: &[f64]) -> Result<Vec<f64>, SweepError> {
    let (n, k) = inputs.shape();
    if y.len() != n {
        return Err(SweepError::NotEnoughData(format!(
            "{} input rows but {} outputs",
            n,
            y.len()
        )));
    }
    if n < k + 2 {
        return Err(SweepError::NotEnoughData(format!(
            "PRCC of {} inputs needs at least {} runs, got {}",
            k,
            k + 2,
            n
        )));
    }
    let mut ranked: Vec<Vec<f64>> = (0..k)
        .map(|c| {
            let column: Vec<f64> = inputs.column(c).iter().cloned().collect();
            rank(&column)
        })
        .collect();
    ranked.push(rank(y));
    let dim = k + 1;
    let mut corr = DMatrix::<f64>::identity(dim, dim);
    for i in 0..dim {
        for j in (i + 1)..dim {
            let r = pearson(&ranked[i], &ranked[j]).ok_or(SweepError::SingularCorrelation)?;
            corr[(i, j)] = r;
            corr[(j, i)] = r;
        }
    }
    let inverse = corr.try_inverse().ok_or(SweepError::SingularCorrelation)?;
    let out = k;
    let mut result = Vec::with_capacity(k);
    for j in 0..k {
        let denom = inverse[(j, j)] * inverse[(out, out)];
        if !(denom > 0.0) || !denom.is_finite() {
            return Err(SweepError::SingularCorrelation);
        }
        result.push((-inverse[(j, out)] / denom.sqrt()).clamp(-1.0, 1.0));
    }
    Ok(result)
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;
    use rand::rngs::StdRng;
    use rand::{Rng, SeedableRng};

    #[test]
    fn test_rank_with_ties() {
        assert_eq!(rank(&[10.0, 30.0, 20.0]), vec![1.0, 3.0, 2.0]);
        assert_eq!(rank(&[1.0, 2.0, 2.0, 3.0]), vec![1.0, 2.5, 2.5, 4.0]);
        assert_eq!(rank(&[5.0, 5.0, 5.0]), vec![2.0, 2.0, 2.0]);
        assert!(rank(&[]).is_empty());
    }

    #[test]
    fn test_pearson() {
        let x = [1.0, 2.0, 3.0, 4.0];
        assert_relative_eq!(pearson(&x, &[2.0, 4.0, 6.0, 8.0]).unwrap(), 1.0);
        assert_relative_eq!(pearson(&x, &[8.0, 6.0, 4.0, 2.0]).unwrap(), -1.0);
        assert!(pearson(&x, &[1.0, 1.0, 1.0, 1.0]).is_none());
        assert!(pearson(&[1.0], &[2.0]).is_none());
    }

    #[test]
    fn test_spearman_monotone() {
        let x: Vec<f64> = (1..=10).map(|v| v as f64).collect();
        let y: Vec<f64> = x.iter().map(|v| v.powi(3)).collect();
        assert_relative_eq!(spearman(&x, &y).unwrap(), 1.0);
        assert!(pearson(&x, &y).unwrap() < 1.0);
    }

    #[test]
    fn test_prcc_separates_influential_inputs() {
        let mut rng = StdRng::seed_from_u64(11);
        let n = 400;
        let inputs = DMatrix::from_fn(n, 3, |_, _| rng.random::<f64>());
        // increasing in x0, decreasing in x1, independent of x2
        let y: Vec<f64> = (0..n)
            .map(|r| inputs[(r, 0)].exp() - inputs[(r, 1)])
            .collect();
        let p = prcc(&inputs, &y).unwrap();
        assert!(p[0] > 0.7, "{:?}", p);
        assert!(p[1] < -0.7, "{:?}", p);
        assert!(p[2].abs() < 0.2, "{:?}", p);
    }

    #[test]
    fn test_prcc_errors() {
        let inputs = DMatrix::from_row_slice(3, 2, &[0.0, 1.0, 1.0, 0.0, 2.0, 2.0]);
        assert!(matches!(
            prcc(&inputs, &[1.0, 2.0, 3.0]),
            Err(SweepError::NotEnoughData(_))
        ));
        let constant = DMatrix::from_row_slice(5, 1, &[1.0, 1.0, 1.0, 1.0, 1.0]);
        assert!(matches!(
            prcc(&constant, &[1.0, 2.0, 3.0, 4.0, 5.0]),
            Err(SweepError::SingularCorrelation)
        ));
    }
}
