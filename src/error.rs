//! error types shared by the integrators and the sweep machinery
use thiserror::Error;

/// failures of a single ODE integration
#[derive(Debug, Error, Clone, PartialEq)]
pub enum SolverError {
    #[error("integration interval is empty: t0 = {t0}, t_bound = {t_bound}")]
    InvalidInterval { t0: f64, t_bound: f64 },
    #[error("state became non-finite at t = {t}")]
    NonFinite { t: f64 },
    #[error("maximum number of steps ({max_steps}) exceeded at t = {t}")]
    MaxStepsExceeded { max_steps: usize, t: f64 },
    #[error("step size {h:e} too small at t = {t}")]
    StepSizeTooSmall { h: f64, t: f64 },
    #[error("invalid solver settings: {0}")]
    InvalidSettings(String),
}

/// failures of model construction, designs, sweeps and their output
#[derive(Debug, Error)]
pub enum SweepError {
    #[error("configuration error: {0}")]
    Config(String),
    #[error("invalid model parameters: {0}")]
    InvalidParameters(String),
    #[error("unknown parameter `{0}`")]
    UnknownParameter(String),
    #[error("invalid range for `{name}`: [{lower}, {upper}]")]
    InvalidRange { name: String, lower: f64, upper: f64 },
    #[error("design needs {requested} dimensions, at most {max} are supported")]
    TooManyDimensions { requested: usize, max: usize },
    #[error("rank correlation matrix is singular")]
    SingularCorrelation,
    #[error("not enough data: {0}")]
    NotEnoughData(String),
    #[error("all {0} runs failed")]
    AllRunsFailed(usize),
    #[error(transparent)]
    Solver(#[from] SolverError),
    #[error("plotting failed: {0}")]
    Plot(String),
    #[error(transparent)]
    Io(#[from] std::io::Error),
    #[error(transparent)]
    Csv(#[from] csv::Error),
}
