//! SEIR and SEmIR compartmental models written in population fractions.
//!
//! SEIR:
//! ```text
//! S' = mu - beta*S*I - mu*S
//! E' = beta*S*I - (sigma + mu)*E
//! I' = sigma*E - (gamma + mu)*I
//! R' = gamma*I - mu*R
//! ```
//! SEmIR splits E into m sequential stages E1..Em, each left at rate m*sigma, so the latent
//! period is Erlang distributed with the same mean 1/sigma.
use crate::error::SweepError;
use nalgebra::DVector;
use std::fmt::Debug;
use std::sync::Arc;
use strum_macros::{Display, EnumIter, EnumString};

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct EpiParameters {
    /// transmission rate
    pub beta: f64,
    /// rate of leaving the latent class, 1/mean latent period
    pub sigma: f64,
    /// recovery rate, 1/mean infectious period
    pub gamma: f64,
    /// per-capita birth and death rate
    pub mu: f64,
    /// initial infectious fraction
    pub i0: f64,
}

impl Default for EpiParameters {
    fn default() -> Self {
        EpiParameters {
            beta: 0.5,
            sigma: 0.2,
            gamma: 0.1,
            mu: 0.0,
            i0: 1e-3,
        }
    }
}

impl EpiParameters {
    pub fn validate(&self) -> Result<(), SweepError> {
        let rates = [
            ("beta", self.beta),
            ("sigma", self.sigma),
            ("gamma", self.gamma),
            ("mu", self.mu),
        ];
        for (name, value) in rates {
            if !value.is_finite() || value < 0.0 {
                return Err(SweepError::InvalidParameters(format!(
                    "{} must be finite and non-negative, got {}",
                    name, value
                )));
            }
        }
        if self.sigma == 0.0 {
            return Err(SweepError::InvalidParameters(
                "sigma must be positive".to_string(),
            ));
        }
        if self.gamma + self.mu <= 0.0 {
            return Err(SweepError::InvalidParameters(
                "gamma + mu must be positive".to_string(),
            ));
        }
        if !(self.i0 > 0.0 && self.i0 < 1.0) {
            return Err(SweepError::InvalidParameters(format!(
                "i0 must lie in (0, 1), got {}",
                self.i0
            )));
        }
        Ok(())
    }
}

pub trait CompartmentalModel: Debug + Send + Sync {
    fn compartment_names(&self) -> Vec<String>;

    fn dimension(&self) -> usize {
        self.compartment_names().len()
    }

    fn parameters(&self) -> &EpiParameters;

    fn initial_state(&self) -> DVector<f64> {
        let mut y0 = DVector::zeros(self.dimension());
        let i0 = self.parameters().i0;
        y0[0] = 1.0 - i0;
        y0[self.infectious_index()] = i0;
        y0
    }

    fn rhs(&self, t: f64, y: &DVector<f64>) -> DVector<f64>;

    fn infectious_index(&self) -> usize;

    fn recovered_index(&self) -> usize {
        self.dimension() - 1
    }

    fn basic_reproduction_number(&self) -> f64;
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Display, EnumString, EnumIter)]
pub enum ModelKind {
    SEIR,
    SEmIR,
}

#[derive(Debug, Clone, PartialEq)]
pub struct SEIR {
    pub params: EpiParameters,
}

impl SEIR {
    pub fn new(params: EpiParameters) -> Result<Self, SweepError> {
        params.validate()?;
        Ok(SEIR { params })
    }
}

impl CompartmentalModel for SEIR {
    fn compartment_names(&self) -> Vec<String> {
        ["S", "E", "I", "R"].iter().map(|s| s.to_string()).collect()
    }

    fn dimension(&self) -> usize {
        4
    }

    fn parameters(&self) -> &EpiParameters {
        &self.params
    }

    fn rhs(&self, _t: f64, y: &DVector<f64>) -> DVector<f64> {
        let EpiParameters {
            beta,
            sigma,
            gamma,
            mu,
            ..
        } = self.params;
        let (s, e, i, r) = (y[0], y[1], y[2], y[3]);
        let infection = beta * s * i;
        DVector::from_vec(vec![
            mu - infection - mu * s,
            infection - (sigma + mu) * e,
            sigma * e - (gamma + mu) * i,
            gamma * i - mu * r,
        ])
    }

    fn infectious_index(&self) -> usize {
        2
    }

    fn basic_reproduction_number(&self) -> f64 {
        let p = &self.params;
        p.beta * p.sigma / ((p.sigma + p.mu) * (p.gamma + p.mu))
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct SEmIR {
    pub params: EpiParameters,
    /// number of latent stages m
    pub stages: usize,
}

impl SEmIR {
    pub fn new(params: EpiParameters, stages: usize) -> Result<Self, SweepError> {
        params.validate()?;
        if stages == 0 {
            return Err(SweepError::InvalidParameters(
                "SEmIR needs at least one latent stage".to_string(),
            ));
        }
        Ok(SEmIR { params, stages })
    }
}

impl CompartmentalModel for SEmIR {
    fn compartment_names(&self) -> Vec<String> {
        let mut names = vec!["S".to_string()];
        names.extend((1..=self.stages).map(|k| format!("E{}", k)));
        names.push("I".to_string());
        names.push("R".to_string());
        names
    }

    fn dimension(&self) -> usize {
        self.stages + 3
    }

    fn parameters(&self) -> &EpiParameters {
        &self.params
    }

    fn rhs(&self, _t: f64, y: &DVector<f64>) -> DVector<f64> {
        let EpiParameters {
            beta,
            sigma,
            gamma,
            mu,
            ..
        } = self.params;
        let m = self.stages;
        let stage_rate = m as f64 * sigma;
        let i_idx = m + 1;
        let r_idx = m + 2;
        let s = y[0];
        let i = y[i_idx];
        let infection = beta * s * i;

        let mut dydt = DVector::zeros(m + 3);
        dydt[0] = mu - infection - mu * s;
        // E1 is fed by new infections, Ek by E(k-1)
        let mut inflow = infection;
        for k in 1..=m {
            dydt[k] = inflow - (stage_rate + mu) * y[k];
            inflow = stage_rate * y[k];
        }
        dydt[i_idx] = inflow - (gamma + mu) * i;
        dydt[r_idx] = gamma * i - mu * y[r_idx];
        dydt
    }

    fn infectious_index(&self) -> usize {
        self.stages + 1
    }

    fn basic_reproduction_number(&self) -> f64 {
        let p = &self.params;
        let stage_rate = self.stages as f64 * p.sigma;
        let survival = (stage_rate / (stage_rate + p.mu)).powi(self.stages as i32);
        p.beta / (p.gamma + p.mu) * survival
    }
}

/// `stages` is ignored for SEIR
pub fn build_model(
    kind: ModelKind,
    stages: usize,
    params: EpiParameters,
) -> Result<Arc<dyn CompartmentalModel>, SweepError> {
    match kind {
        ModelKind::SEIR => Ok(Arc::new(SEIR::new(params)?)),
        ModelKind::SEmIR => Ok(Arc::new(SEmIR::new(params, stages)?)),
    }
}

/// beta giving the requested R0 with the remaining parameters of `params`
pub fn beta_for_r0(kind: ModelKind, stages: usize, params: &EpiParameters, r0: f64) -> f64 {
    let survival = match kind {
        ModelKind::SEIR => params.sigma / (params.sigma + params.mu),
        ModelKind::SEmIR => {
            let stage_rate = stages.max(1) as f64 * params.sigma;
            (stage_rate / (stage_rate + params.mu)).powi(stages.max(1) as i32)
        }
    };
    r0 * (params.gamma + params.mu) / survival
}
