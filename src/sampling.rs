//! Parameter spaces and experimental designs over them.
//!
//! Every design is first built on the unit hypercube (rows = points, columns = parameters)
//! and then mapped into the parameter ranges, linearly or geometrically.
/// full factorial designs
pub mod grid;
/// Latin hypercube designs
pub mod lhs;
/// Sobol' low discrepancy sequence
pub mod sobol;

use crate::error::SweepError;
use nalgebra::DMatrix;
use std::collections::HashSet;
use strum_macros::{Display, EnumString};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Display, EnumString)]
#[strum(serialize_all = "lowercase")]
pub enum Scale {
    Linear,
    Log,
}

#[derive(Debug, Clone, PartialEq)]
pub struct ParameterRange {
    pub name: String,
    pub lower: f64,
    pub upper: f64,
    pub scale: Scale,
}

impl ParameterRange {
    pub fn new(name: &str, lower: f64, upper: f64) -> Self {
        ParameterRange {
            name: name.to_string(),
            lower,
            upper,
            scale: Scale::Linear,
        }
    }

    pub fn log(name: &str, lower: f64, upper: f64) -> Self {
        ParameterRange {
            scale: Scale::Log,
            ..ParameterRange::new(name, lower, upper)
        }
    }

    pub fn validate(&self) -> Result<(), SweepError> {
        let bad = !self.lower.is_finite()
            || !self.upper.is_finite()
            || self.lower > self.upper
            || (self.scale == Scale::Log && self.lower <= 0.0);
        if bad {
            return Err(SweepError::InvalidRange {
                name: self.name.clone(),
                lower: self.lower,
                upper: self.upper,
            });
        }
        Ok(())
    }

    /// maps u in [0, 1] into the range
    pub fn map_unit(&self, u: f64) -> f64 {
        match self.scale {
            Scale::Linear => self.lower + u * (self.upper - self.lower),
            Scale::Log => (self.lower.ln() + u * (self.upper.ln() - self.lower.ln())).exp(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Default)]
pub struct ParameterSpace {
    pub ranges: Vec<ParameterRange>,
}

impl ParameterSpace {
    pub fn new(ranges: Vec<ParameterRange>) -> Result<Self, SweepError> {
        let space = ParameterSpace { ranges };
        space.validate()?;
        Ok(space)
    }

    pub fn validate(&self) -> Result<(), SweepError> {
        if self.ranges.is_empty() {
            return Err(SweepError::Config(
                "parameter space has no parameters".to_string(),
            ));
        }
        let mut seen = HashSet::new();
        for range in &self.ranges {
            range.validate()?;
            if !seen.insert(range.name.as_str()) {
                return Err(SweepError::Config(format!(
                    "parameter `{}` appears more than once",
                    range.name
                )));
            }
        }
        Ok(())
    }

    pub fn dimension(&self) -> usize {
        self.ranges.len()
    }

    pub fn names(&self) -> Vec<String> {
        self.ranges.iter().map(|r| r.name.clone()).collect()
    }

    pub fn scale_unit_design(&self, unit: &DMatrix<f64>) -> DMatrix<f64> {
        DMatrix::from_fn(unit.nrows(), unit.ncols(), |r, c| {
            self.ranges[c].map_unit(unit[(r, c)])
        })
    }
}

#[derive(Debug, Clone, PartialEq)]
pub enum SamplingMethod {
    /// points per dimension; a single entry applies to every dimension
    Grid { levels: Vec<usize> },
    LHS {
        samples: usize,
        seed: u64,
        centered: bool,
    },
    Sobol { samples: usize, skip: usize },
}

impl SamplingMethod {
    pub fn name(&self) -> &'static str {
        match self {
            SamplingMethod::Grid { .. } => "Grid",
            SamplingMethod::LHS { .. } => "LHS",
            SamplingMethod::Sobol { .. } => "Sobol",
        }
    }

    /// design matrix in parameter units; rows are parameter combinations
    pub fn design(&self, space: &ParameterSpace) -> Result<DMatrix<f64>, SweepError> {
        space.validate()?;
        let d = space.dimension();
        let unit = match self {
            SamplingMethod::Grid { levels } => {
                let levels = grid::expand_levels(levels, d)?;
                grid::unit_grid(&levels)
            }
            SamplingMethod::LHS {
                samples,
                seed,
                centered,
            } => {
                if *samples == 0 {
                    return Err(SweepError::Config(
                        "LHS needs at least one sample".to_string(),
                    ));
                }
                lhs::latin_hypercube(*samples, d, *seed, *centered)
            }
            SamplingMethod::Sobol { samples, skip } => {
                if *samples == 0 {
                    return Err(SweepError::Config(
                        "Sobol design needs at least one sample".to_string(),
                    ));
                }
                sobol::SobolSequence::new(d)?.points(*samples, *skip)?
            }
        };
        Ok(space.scale_unit_design(&unit))
    }
}
