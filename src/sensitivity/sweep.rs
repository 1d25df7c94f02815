//! Sampling-and-simulation sweep: one deterministic run per design row, reduced to a
//! table of run summaries and rank based sensitivity measures.
use crate::Utils::plots;
use crate::epidemic::compartments::{EpiParameters, ModelKind, beta_for_r0, build_model};
use crate::epidemic::simulation::{
    RunSummary, SimulationOutcome, SimulationSettings, SummaryMetric, simulate,
};
use crate::error::SweepError;
use crate::sampling::grid::{expand_levels, unit_levels};
use crate::sampling::{ParameterRange, ParameterSpace, SamplingMethod};
use crate::sensitivity::correlation::{SensitivityIndex, pearson, prcc, spearman};
use csv::Writer;
use log::{debug, info, warn};
use nalgebra::DMatrix;
use rayon::prelude::*;
use std::fs;
use std::path::{Path, PathBuf};
use std::time::Instant;
use strum::IntoEnumIterator;
use tabled::{builder::Builder, settings::Style};

/// names a parameter space may use
pub const PARAMETER_NAMES: [&str; 8] = [
    "beta",
    "sigma",
    "gamma",
    "mu",
    "i0",
    "R0",
    "latent_period",
    "infectious_period",
];

pub fn check_parameter_names(names: &[String]) -> Result<(), SweepError> {
    match names
        .iter()
        .find(|n| !PARAMETER_NAMES.contains(&n.as_str()))
    {
        Some(unknown) => Err(SweepError::UnknownParameter(unknown.clone())),
        None => Ok(()),
    }
}

/// Copy of `base` with the named values applied: rates first, then periods, then R0
/// (which sets beta from everything else).
pub fn apply_parameters(
    kind: ModelKind,
    stages: usize,
    base: &EpiParameters,
    names: &[String],
    values: &[f64],
) -> Result<EpiParameters, SweepError> {
    let mut p = *base;
    let mut latent_period = None;
    let mut infectious_period = None;
    let mut r0 = None;
    for (name, &value) in names.iter().zip(values) {
        match name.as_str() {
            "beta" => p.beta = value,
            "sigma" => p.sigma = value,
            "gamma" => p.gamma = value,
            "mu" => p.mu = value,
            "i0" => p.i0 = value,
            "latent_period" => latent_period = Some(value),
            "infectious_period" => infectious_period = Some(value),
            "R0" => r0 = Some(value),
            other => return Err(SweepError::UnknownParameter(other.to_string())),
        }
    }
    if let Some(period) = latent_period {
        if !(period > 0.0) {
            return Err(SweepError::InvalidParameters(format!(
                "latent_period must be positive, got {}",
                period
            )));
        }
        p.sigma = 1.0 / period;
    }
    if let Some(period) = infectious_period {
        if !(period > 0.0) {
            return Err(SweepError::InvalidParameters(format!(
                "infectious_period must be positive, got {}",
                period
            )));
        }
        p.gamma = 1.0 / period;
    }
    if let Some(r0) = r0 {
        if !(r0 >= 0.0) {
            return Err(SweepError::InvalidParameters(format!(
                "R0 must be non-negative, got {}",
                r0
            )));
        }
        p.beta = beta_for_r0(kind, stages, &p, r0);
    }
    Ok(p)
}

fn run_once(
    kind: ModelKind,
    stages: usize,
    params: EpiParameters,
    simulation: &SimulationSettings,
) -> Result<RunSummary, SweepError> {
    let model = build_model(kind, stages, params)?;
    Ok(simulate(&model, simulation)?.summary)
}

#[derive(Debug, Clone)]
pub struct SensitivitySweep {
    pub model: ModelKind,
    /// latent stages of SEmIR; ignored for SEIR
    pub stages: usize,
    /// values of every parameter the space does not vary
    pub base: EpiParameters,
    pub space: ParameterSpace,
    pub sampling: SamplingMethod,
    pub simulation: SimulationSettings,
    pub parallel: bool,
}

impl SensitivitySweep {
    pub fn new(
        model: ModelKind,
        stages: usize,
        base: EpiParameters,
        space: ParameterSpace,
        sampling: SamplingMethod,
    ) -> Self {
        SensitivitySweep {
            model,
            stages,
            base,
            space,
            sampling,
            simulation: SimulationSettings::default(),
            parallel: true,
        }
    }

    pub fn validate(&self) -> Result<(), SweepError> {
        if self.model == ModelKind::SEmIR && self.stages == 0 {
            return Err(SweepError::Config(
                "SEmIR needs at least one latent stage".to_string(),
            ));
        }
        self.space.validate()?;
        check_parameter_names(&self.space.names())?;
        if !(self.simulation.t_end > 0.0) || !self.simulation.t_end.is_finite() {
            return Err(SweepError::Config(format!(
                "t_end must be positive and finite, got {}",
                self.simulation.t_end
            )));
        }
        self.simulation.solver.validate()?;
        Ok(())
    }

    /// parameters of one design row
    pub fn parameters_for(&self, row: &[f64]) -> Result<EpiParameters, SweepError> {
        apply_parameters(
            self.model,
            self.stages,
            &self.base,
            &self.space.names(),
            row,
        )
    }

    fn run_row(&self, row: &[f64]) -> Result<RunSummary, String> {
        self.parameters_for(row)
            .and_then(|p| run_once(self.model, self.stages, p, &self.simulation))
            .map_err(|e| e.to_string())
    }

    pub fn run(&self) -> Result<SweepResult, SweepError> {
        self.validate()?;
        let design = self.sampling.design(&self.space)?;
        let names = self.space.names();
        let n = design.nrows();
        info!(
            "sweep of {} with {} sampling: {} runs over {:?}",
            self.model,
            self.sampling.name(),
            n,
            names
        );
        let rows: Vec<Vec<f64>> = design
            .row_iter()
            .map(|r| r.iter().copied().collect())
            .collect();
        let begin = Instant::now();
        let runs: Vec<Result<RunSummary, String>> = if self.parallel {
            rows.par_iter().map(|row| self.run_row(row)).collect()
        } else {
            rows.iter().map(|row| self.run_row(row)).collect()
        };
        let elapsed = begin.elapsed();
        let mut failed = 0;
        for (i, run) in runs.iter().enumerate() {
            match run {
                Ok(summary) => debug!("run {}: {:?} -> {:?}", i, rows[i], summary),
                Err(e) => {
                    failed += 1;
                    warn!("run {} with {:?} failed: {}", i, rows[i], e);
                }
            }
        }
        if failed == n {
            return Err(SweepError::AllRunsFailed(n));
        }
        info!(
            "sweep finished in {:.3} s: {} runs, {} failed",
            elapsed.as_secs_f64(),
            n,
            failed
        );
        Ok(SweepResult {
            names,
            design,
            runs,
            sampling: self.sampling.clone(),
        })
    }
}

#[derive(Debug, Clone)]
pub struct SweepResult {
    pub names: Vec<String>,
    /// one row per run, columns in `names` order
    pub design: DMatrix<f64>,
    /// design-row order; failures keep their error message
    pub runs: Vec<Result<RunSummary, String>>,
    pub sampling: SamplingMethod,
}

impl SweepResult {
    pub fn len(&self) -> usize {
        self.runs.len()
    }

    pub fn is_empty(&self) -> bool {
        self.runs.is_empty()
    }

    /// NaN where the run failed
    pub fn metric_column(&self, metric: SummaryMetric) -> Vec<f64> {
        self.runs
            .iter()
            .map(|r| match r {
                Ok(s) => s.metric(metric),
                Err(_) => f64::NAN,
            })
            .collect()
    }

    pub fn successful(&self) -> usize {
        self.runs.iter().filter(|r| r.is_ok()).count()
    }

    pub fn failed(&self) -> usize {
        self.len() - self.successful()
    }

    /// Pearson, Spearman and PRCC of every parameter against `metric`, ignoring runs whose
    /// metric is not finite.
    pub fn sensitivity(&self, metric: SummaryMetric) -> Vec<SensitivityIndex> {
        let y_all = self.metric_column(metric);
        let keep: Vec<usize> = (0..y_all.len()).filter(|&i| y_all[i].is_finite()).collect();
        let y: Vec<f64> = keep.iter().map(|&i| y_all[i]).collect();
        let x = DMatrix::from_fn(keep.len(), self.names.len(), |r, c| {
            self.design[(keep[r], c)]
        });
        let partial = match prcc(&x, &y) {
            Ok(p) => p.into_iter().map(Some).collect(),
            Err(e) => {
                warn!("PRCC of {} not available: {}", metric, e);
                vec![None; self.names.len()]
            }
        };
        self.names
            .iter()
            .enumerate()
            .map(|(c, name)| {
                let column: Vec<f64> = x.column(c).iter().copied().collect();
                SensitivityIndex {
                    parameter: name.clone(),
                    pearson: pearson(&column, &y),
                    spearman: spearman(&column, &y),
                    prcc: partial[c],
                }
            })
            .collect()
    }

    pub fn summary_table(&self, metric: SummaryMetric) -> String {
        let values: Vec<f64> = self
            .metric_column(metric)
            .into_iter()
            .filter(|v| v.is_finite())
            .collect();
        let (min, max) = values
            .iter()
            .fold((f64::INFINITY, f64::NEG_INFINITY), |(lo, hi), &v| {
                (lo.min(v), hi.max(v))
            });
        let mean = values.iter().sum::<f64>() / values.len().max(1) as f64;
        let fmt = |v: Option<f64>| v.map_or("-".to_string(), |v| format!("{:+.4}", v));

        let mut builder = Builder::default();
        builder.push_record(["parameter", "pearson", "spearman", "PRCC"]);
        for index in self.sensitivity(metric) {
            builder.push_record([
                index.parameter.clone(),
                fmt(index.pearson),
                fmt(index.spearman),
                fmt(index.prcc),
            ]);
        }
        let mut table = builder.build();
        table.with(Style::modern_rounded());
        format!(
            "{} over {} runs ({} failed): min {:.6}, mean {:.6}, max {:.6}\n{}",
            metric,
            self.len(),
            self.failed(),
            min,
            mean,
            max,
            table
        )
    }

    /// one row per run: parameters, every summary metric and the run status
    pub fn save_csv<P: AsRef<Path>>(&self, path: P) -> Result<(), SweepError> {
        let path = path.as_ref();
        let mut writer = Writer::from_path(path)?;
        let mut header = vec!["run".to_string()];
        header.extend(self.names.iter().cloned());
        header.extend(SummaryMetric::iter().map(|m| m.to_string()));
        header.push("status".to_string());
        writer.write_record(&header)?;
        for (i, run) in self.runs.iter().enumerate() {
            let mut record = vec![i.to_string()];
            record.extend(self.design.row(i).iter().map(|v| v.to_string()));
            match run {
                Ok(summary) => {
                    record.extend(SummaryMetric::iter().map(|m| summary.metric(m).to_string()));
                    record.push("ok".to_string());
                }
                Err(e) => {
                    record.extend(SummaryMetric::iter().map(|_| "NaN".to_string()));
                    record.push(e.clone());
                }
            }
            writer.write_record(&record)?;
        }
        writer.flush()?;
        info!("sweep table saved to {}", path.display());
        Ok(())
    }

    /// `<dir>/<metric>_vs_<parameter>.png` for every parameter
    pub fn plot_scatter<P: AsRef<Path>>(
        &self,
        dir: P,
        metric: SummaryMetric,
    ) -> Result<Vec<PathBuf>, SweepError> {
        fs::create_dir_all(dir.as_ref())?;
        let y = self.metric_column(metric);
        let metric_name = metric.to_string();
        let mut written = Vec::with_capacity(self.names.len());
        for (c, name) in self.names.iter().enumerate() {
            let path = dir.as_ref().join(format!("{}_vs_{}.png", metric_name, name));
            let x: Vec<f64> = self.design.column(c).iter().copied().collect();
            plots::plot_scatter(name, &metric_name, &x, &y, &path)?;
            written.push(path);
        }
        Ok(written)
    }

    /// Metric over a two parameter grid; the first parameter runs along x.
    pub fn heatmap(
        &self,
        metric: SummaryMetric,
    ) -> Result<(Vec<f64>, Vec<f64>, DMatrix<f64>), SweepError> {
        let levels = match &self.sampling {
            SamplingMethod::Grid { levels } if self.names.len() == 2 => expand_levels(levels, 2)?,
            _ => {
                return Err(SweepError::Config(
                    "a heatmap needs a grid design over exactly two parameters".to_string(),
                ));
            }
        };
        let (nx, ny) = (levels[0], levels[1]);
        let xs: Vec<f64> = (0..nx).map(|i| self.design[(i * ny, 0)]).collect();
        let ys: Vec<f64> = (0..ny).map(|j| self.design[(j, 1)]).collect();
        let y = self.metric_column(metric);
        let z = DMatrix::from_fn(nx, ny, |i, j| y[i * ny + j]);
        Ok((xs, ys, z))
    }

    pub fn plot_heatmap<P: AsRef<Path>>(
        &self,
        path: P,
        metric: SummaryMetric,
    ) -> Result<(), SweepError> {
        let (xs, ys, z) = self.heatmap(metric)?;
        plots::plot_heatmap(
            &self.names[0],
            &self.names[1],
            &xs,
            &ys,
            &z,
            &metric.to_string(),
            path.as_ref(),
        )
    }
}

/// Response of the model to one parameter moved across its range, the rest held at base.
#[derive(Debug, Clone)]
pub struct OatProfile {
    pub parameter: String,
    pub values: Vec<f64>,
    pub summaries: Vec<Result<RunSummary, String>>,
}

impl OatProfile {
    pub fn metric_column(&self, metric: SummaryMetric) -> Vec<f64> {
        self.summaries
            .iter()
            .map(|r| r.as_ref().map_or(f64::NAN, |s| s.metric(metric)))
            .collect()
    }

    pub fn plot<P: AsRef<Path>>(&self, path: P, metric: SummaryMetric) -> Result<(), SweepError> {
        plots::plot_line(
            &self.parameter,
            &metric.to_string(),
            &self.values,
            &self.metric_column(metric),
            path.as_ref(),
        )
    }
}

/// `points` evenly spaced values of `range` (geometrically spaced on a log scale)
pub fn one_at_a_time(
    model: ModelKind,
    stages: usize,
    base: &EpiParameters,
    range: &ParameterRange,
    points: usize,
    simulation: &SimulationSettings,
) -> Result<OatProfile, SweepError> {
    if points == 0 {
        return Err(SweepError::Config(
            "one-at-a-time profile needs at least one point".to_string(),
        ));
    }
    range.validate()?;
    let names = vec![range.name.clone()];
    check_parameter_names(&names)?;
    simulation.solver.validate()?;
    let values: Vec<f64> = unit_levels(points)
        .into_iter()
        .map(|u| range.map_unit(u))
        .collect();
    let summaries: Vec<Result<RunSummary, String>> = values
        .iter()
        .map(|&v| {
            apply_parameters(model, stages, base, &names, &[v])
                .and_then(|p| run_once(model, stages, p, simulation))
                .map_err(|e| {
                    warn!("{} = {} failed: {}", range.name, v, e);
                    e.to_string()
                })
        })
        .collect();
    if summaries.iter().all(|s| s.is_err()) {
        return Err(SweepError::AllRunsFailed(points));
    }
    info!("profile of {} over {} points done", range.name, points);
    Ok(OatProfile {
        parameter: range.name.clone(),
        values,
        summaries,
    })
}

/// single run keeping the whole trajectory
pub fn trajectory_for(
    model: ModelKind,
    stages: usize,
    params: EpiParameters,
    simulation: &SimulationSettings,
) -> Result<SimulationOutcome, SweepError> {
    let model = build_model(model, stages, params)?;
    let outcome = simulate(&model, simulation)?;
    info!(
        "R0 = {:.3}, peak {:.5} at t = {:.2}, final size {:.5}",
        outcome.summary.r0,
        outcome.summary.peak_infected,
        outcome.summary.peak_time,
        outcome.summary.final_size
    );
    Ok(outcome)
}
