//! Sobol' sequence in Gray code order with Joe-Kuo direction numbers.
use crate::error::SweepError;
use nalgebra::DMatrix;

const BITS: usize = 32;
pub const MAX_DIMENSION: usize = 16;

/// (degree s, coefficient a, initial m_1..m_s) for dimensions 2..=16;
/// dimension 1 is the van der Corput sequence
const PRIMITIVES: [(usize, u32, &[u32]); MAX_DIMENSION - 1] = [
    (1, 0, &[1]),
    (2, 1, &[1, 3]),
    (3, 1, &[1, 3, 1]),
    (3, 2, &[1, 1, 1]),
    (4, 1, &[1, 1, 3, 3]),
    (4, 4, &[1, 3, 5, 13]),
    (5, 2, &[1, 1, 5, 5, 17]),
    (5, 4, &[1, 1, 5, 5, 5]),
    (5, 7, &[1, 1, 7, 11, 19]),
    (5, 11, &[1, 1, 5, 1, 1]),
    (5, 13, &[1, 1, 1, 3, 11]),
    (5, 14, &[1, 3, 5, 5, 31]),
    (6, 1, &[1, 3, 3, 9, 7, 49]),
    (6, 13, &[1, 1, 1, 15, 21, 21]),
    (6, 16, &[1, 3, 1, 13, 27, 49]),
];

#[derive(Debug, Clone)]
pub struct SobolSequence {
    directions: Vec<[u32; BITS]>,
}

impl SobolSequence {
    pub fn new(dimension: usize) -> Result<Self, SweepError> {
        if dimension == 0 {
            return Err(SweepError::Config(
                "Sobol sequence needs at least one dimension".to_string(),
            ));
        }
        if dimension > MAX_DIMENSION {
            return Err(SweepError::TooManyDimensions {
                requested: dimension,
                max: MAX_DIMENSION,
            });
        }
        let mut directions = Vec::with_capacity(dimension);
        let mut first = [0u32; BITS];
        for (k, v) in first.iter_mut().enumerate() {
            *v = 1 << (BITS - 1 - k);
        }
        directions.push(first);
        for &(s, a, m) in PRIMITIVES.iter().take(dimension - 1) {
            directions.push(direction_numbers(s, a, m));
        }
        Ok(SobolSequence { directions })
    }

    pub fn dimension(&self) -> usize {
        self.directions.len()
    }

    /// `n` points after discarding the first `skip` (the first point is the origin).
    /// With 32-bit direction numbers the sequence has 2^32 distinct points.
    pub fn points(&self, n: usize, skip: usize) -> Result<DMatrix<f64>, SweepError> {
        let total = n
            .checked_add(skip)
            .filter(|&total| total as u128 <= 1u128 << BITS)
            .ok_or_else(|| {
                SweepError::Config(format!(
                    "Sobol sequence has 2^{} points, cannot take {} after skipping {}",
                    BITS, n, skip
                ))
            })?;
        let d = self.dimension();
        let scale = 2f64.powi(BITS as i32);
        let mut x = vec![0u32; d];
        let mut design = DMatrix::zeros(n, d);
        for i in 0..total {
            if i >= skip {
                for (c, xc) in x.iter().enumerate() {
                    design[(i - skip, c)] = *xc as f64 / scale;
                }
            }
            let bit = (!i).trailing_zeros() as usize;
            // only after the last point of the sequence
            if bit >= BITS {
                break;
            }
            for (xc, v) in x.iter_mut().zip(&self.directions) {
                *xc ^= v[bit];
            }
        }
        Ok(design)
    }
}

fn direction_numbers(s: usize, a: u32, m: &[u32]) -> [u32; BITS] {
    let mut v = [0u32; BITS];
    for k in 0..s.min(BITS) {
        v[k] = m[k] << (BITS - 1 - k);
    }
    for k in s..BITS {
        let mut value = v[k - s] ^ (v[k - s] >> s);
        for l in 1..s {
            if (a >> (s - 1 - l)) & 1 == 1 {
                value ^= v[k - l];
            }
        }
        v[k] = value;
    }
    v
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_first_points_two_dimensions() {
        let seq = SobolSequence::new(2).unwrap();
        let p = seq.points(4, 0).unwrap();
        let expected = [[0.0, 0.0], [0.5, 0.5], [0.75, 0.25], [0.25, 0.75]];
        for (r, row) in expected.iter().enumerate() {
            assert_eq!(p[(r, 0)], row[0]);
            assert_eq!(p[(r, 1)], row[1]);
        }
    }

    #[test]
    fn test_skip_drops_leading_points() {
        let seq = SobolSequence::new(3).unwrap();
        let all = seq.points(8, 0).unwrap();
        let skipped = seq.points(7, 1).unwrap();
        for r in 0..7 {
            for c in 0..3 {
                assert_eq!(all[(r + 1, c)], skipped[(r, c)]);
            }
        }
    }

    #[test]
    fn test_one_point_per_dyadic_interval() {
        // the first 2^k points of every coordinate fill each interval of width 2^-k once
        let n = 64;
        let seq = SobolSequence::new(MAX_DIMENSION).unwrap();
        let p = seq.points(n, 0).unwrap();
        for c in 0..MAX_DIMENSION {
            let mut cells: Vec<usize> = p
                .column(c)
                .iter()
                .map(|v| (v * n as f64).floor() as usize)
                .collect();
            cells.sort();
            assert_eq!(cells, (0..n).collect::<Vec<_>>(), "dimension {}", c + 1);
        }
    }

    #[test]
    fn test_dimension_limits() {
        assert!(SobolSequence::new(0).is_err());
        assert!(matches!(
            SobolSequence::new(17),
            Err(SweepError::TooManyDimensions {
                requested: 17,
                max: 16
            })
        ));
    }

    #[test]
    fn test_skip_beyond_sequence_length_is_rejected() {
        let seq = SobolSequence::new(2).unwrap();
        assert!(matches!(
            seq.points(10, usize::MAX),
            Err(SweepError::Config(_))
        ));
        let limit = 1usize << BITS;
        assert!(matches!(seq.points(2, limit - 1), Err(SweepError::Config(_))));
        assert!(matches!(seq.points(limit, 1), Err(SweepError::Config(_))));
    }
}
