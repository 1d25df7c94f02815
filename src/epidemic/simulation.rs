//! one deterministic run of a compartment model and its reduction to scalar summaries
use crate::epidemic::compartments::CompartmentalModel;
use crate::Utils::logger::save_matrix_to_csv;
use crate::Utils::plots::plot_trajectory;
use crate::error::{SolverError, SweepError};
use crate::numerical::NonStiff_api::{RhsFn, SolverSettings, Trajectory, nonstiffODE};
use std::path::Path;
use std::rc::Rc;
use std::sync::Arc;
use strum_macros::{Display, EnumIter, EnumString};

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct RunSummary {
    /// maximum infectious fraction
    pub peak_infected: f64,
    pub peak_time: f64,
    /// recovered fraction at the end of the horizon
    pub final_size: f64,
    pub r0: f64,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Display, EnumString, EnumIter)]
#[strum(serialize_all = "snake_case")]
pub enum SummaryMetric {
    PeakInfected,
    PeakTime,
    FinalSize,
    R0,
}

impl RunSummary {
    pub fn metric(&self, metric: SummaryMetric) -> f64 {
        match metric {
            SummaryMetric::PeakInfected => self.peak_infected,
            SummaryMetric::PeakTime => self.peak_time,
            SummaryMetric::FinalSize => self.final_size,
            SummaryMetric::R0 => self.r0,
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct SimulationSettings {
    pub t_end: f64,
    pub solver: SolverSettings,
}

impl Default for SimulationSettings {
    fn default() -> Self {
        SimulationSettings {
            t_end: 365.0,
            solver: SolverSettings::default(),
        }
    }
}

#[derive(Debug, Clone)]
pub struct SimulationOutcome {
    pub trajectory: Trajectory,
    pub summary: RunSummary,
    pub names: Vec<String>,
}

impl SimulationOutcome {
    /// time column `t` followed by one column per compartment
    pub fn save_csv<P: AsRef<Path>>(&self, path: P) -> Result<(), SweepError> {
        save_matrix_to_csv(&self.trajectory.y, &self.names, path, &self.trajectory.t, "t")?;
        Ok(())
    }

    pub fn plot<P: AsRef<Path>>(&self, path: P) -> Result<(), SweepError> {
        plot_trajectory(
            "t",
            &self.names,
            &self.trajectory.t,
            &self.trajectory.y,
            path.as_ref(),
        )
    }
}

pub fn simulate(
    model: &Arc<dyn CompartmentalModel>,
    settings: &SimulationSettings,
) -> Result<SimulationOutcome, SolverError> {
    let m = Arc::clone(model);
    let rhs: RhsFn = Rc::new(move |t, y| m.rhs(t, y));
    let mut solver = nonstiffODE::new(
        rhs,
        0.0,
        model.initial_state(),
        settings.t_end,
        settings.solver.clone(),
    );
    let trajectory = solver.solve()?;
    let summary = summarize(&trajectory, model.as_ref());
    Ok(SimulationOutcome {
        trajectory,
        summary,
        names: model.compartment_names(),
    })
}

pub fn summarize(trajectory: &Trajectory, model: &dyn CompartmentalModel) -> RunSummary {
    let infectious = trajectory.column(model.infectious_index());
    let (peak_time, peak_infected) = refine_peak(trajectory.t.as_slice(), &infectious);
    let final_size = trajectory.y[(trajectory.y.nrows() - 1, model.recovered_index())];
    RunSummary {
        peak_infected,
        peak_time,
        final_size,
        r0: model.basic_reproduction_number(),
    }
}

/// (time, value) of the maximum; interior maxima are refined with a parabola through the
/// neighbouring samples, never reporting less than the sampled maximum
pub fn refine_peak(t: &[f64], values: &[f64]) -> (f64, f64) {
    let (idx, &max) = values
        .iter()
        .enumerate()
        .fold((0, &f64::NEG_INFINITY), |best, cur| {
            if *cur.1 > *best.1 { cur } else { best }
        });
    if idx == 0 || idx + 1 >= values.len() {
        return (t[idx], max);
    }
    let (t0, t1, t2) = (t[idx - 1], t[idx], t[idx + 1]);
    let (y0, y1, y2) = (values[idx - 1], values[idx], values[idx + 1]);
    // Lagrange form of the vertex of the interpolating parabola
    let d0 = (t0 - t1) * (t0 - t2);
    let d1 = (t1 - t0) * (t1 - t2);
    let d2 = (t2 - t0) * (t2 - t1);
    let a = y0 / d0 + y1 / d1 + y2 / d2;
    if !(a < 0.0) {
        return (t1, max);
    }
    let b = -(y0 * (t1 + t2) / d0 + y1 * (t0 + t2) / d1 + y2 * (t0 + t1) / d2);
    let c = y0 * t1 * t2 / d0 + y1 * t0 * t2 / d1 + y2 * t0 * t1 / d2;
    let t_vertex = -b / (2.0 * a);
    if !(t_vertex >= t0 && t_vertex <= t2) {
        return (t1, max);
    }
    let y_vertex = a * t_vertex * t_vertex + b * t_vertex + c;
    if y_vertex.is_finite() && y_vertex >= max {
        (t_vertex, y_vertex)
    } else {
        (t1, max)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::epidemic::compartments::{EpiParameters, ModelKind, build_model};
    use crate::numerical::NonStiff_api::SolverMethod;
    use approx::assert_relative_eq;
    use strum::IntoEnumIterator;

    fn closed_params() -> EpiParameters {
        EpiParameters {
            beta: 0.5,
            sigma: 0.2,
            gamma: 0.1,
            mu: 0.0,
            i0: 1e-4,
        }
    }

    #[test]
    fn test_refine_peak_exact_parabola() {
        // y = 1 - (t - 1.3)^2 sampled on an integer grid
        let t: Vec<f64> = (0..5).map(|k| k as f64).collect();
        let y: Vec<f64> = t.iter().map(|t| 1.0 - (t - 1.3).powi(2)).collect();
        let (tp, yp) = refine_peak(&t, &y);
        assert_relative_eq!(tp, 1.3, epsilon = 1e-12);
        assert_relative_eq!(yp, 1.0, epsilon = 1e-12);
    }

    #[test]
    fn test_refine_peak_at_boundary() {
        let t = vec![0.0, 1.0, 2.0];
        let y = vec![3.0, 2.0, 1.0];
        assert_eq!(refine_peak(&t, &y), (0.0, 3.0));
        let y = vec![1.0, 2.0, 3.0];
        assert_eq!(refine_peak(&t, &y), (2.0, 3.0));
    }

    #[test]
    fn test_population_conserved_along_trajectory() {
        let model = build_model(ModelKind::SEmIR, 3, closed_params()).unwrap();
        let out = simulate(&model, &SimulationSettings::default()).unwrap();
        for row in out.trajectory.y.row_iter() {
            assert_relative_eq!(row.sum(), 1.0, epsilon = 1e-8);
            assert!(row.iter().all(|&x| x > -1e-8));
        }
        assert_eq!(out.names.len(), 6);
    }

    #[test]
    fn test_final_size_relation_closed_seir() {
        // closed SEIR obeys the final size relation s_inf = s0 * exp(-R0 * (1 - s_inf))
        let model = build_model(ModelKind::SEIR, 1, closed_params()).unwrap();
        let settings = SimulationSettings {
            t_end: 2000.0,
            ..SimulationSettings::default()
        };
        let out = simulate(&model, &settings).unwrap();
        let s_inf = out.trajectory.final_state()[0];
        let r0 = out.summary.r0;
        assert_relative_eq!(r0, 5.0, epsilon = 1e-12);
        // i0 leaves the susceptible class but is part of the epidemic
        let s0 = 1.0 - 1e-4;
        let rhs = s0 * (-r0 * (1.0 - s_inf)).exp();
        assert_relative_eq!(s_inf, rhs, epsilon = 1e-4);
        assert_relative_eq!(out.summary.final_size, 1.0 - s_inf, epsilon = 1e-6);
    }

    #[test]
    fn test_peak_is_interior_and_bounded() {
        let model = build_model(ModelKind::SEIR, 1, closed_params()).unwrap();
        let out = simulate(&model, &SimulationSettings::default()).unwrap();
        let s = out.summary;
        assert!(s.peak_time > 0.0 && s.peak_time < 365.0);
        assert!(s.peak_infected > 1e-4 && s.peak_infected < 1.0);
        let sampled_max = out
            .trajectory
            .column(2)
            .into_iter()
            .fold(f64::NEG_INFINITY, f64::max);
        assert!(s.peak_infected >= sampled_max);
    }

    #[test]
    fn test_subcritical_epidemic_peaks_at_start() {
        let p = EpiParameters {
            beta: 0.05,
            ..closed_params()
        };
        let model = build_model(ModelKind::SEIR, 1, p).unwrap();
        let out = simulate(&model, &SimulationSettings::default()).unwrap();
        assert!(out.summary.r0 < 1.0);
        assert_eq!(out.summary.peak_time, 0.0);
        assert_relative_eq!(out.summary.peak_infected, 1e-4);
    }

    #[test]
    fn test_methods_agree_on_peak() {
        let model = build_model(ModelKind::SEIR, 1, closed_params()).unwrap();
        let mut peaks = Vec::new();
        for method in SolverMethod::iter() {
            let settings = SimulationSettings {
                t_end: 365.0,
                solver: SolverSettings {
                    method,
                    h_step: Some(0.05),
                    max_step: 0.5,
                    ..SolverSettings::default()
                },
            };
            peaks.push(simulate(&model, &settings).unwrap().summary.peak_infected);
        }
        for p in &peaks[1..] {
            assert_relative_eq!(*p, peaks[0], epsilon = 1e-4);
        }
    }

    #[test]
    fn test_more_stages_keep_final_size_and_delay_peak() {
        // same mean latent period and R0: final size is unchanged, the less dispersed
        // Erlang latency slows early growth and pushes the peak later
        let seir = build_model(ModelKind::SEmIR, 1, closed_params()).unwrap();
        let semir = build_model(ModelKind::SEmIR, 8, closed_params()).unwrap();
        let settings = SimulationSettings {
            solver: SolverSettings {
                max_step: 0.5,
                ..SolverSettings::default()
            },
            ..SimulationSettings::default()
        };
        let a = simulate(&seir, &settings).unwrap().summary;
        let b = simulate(&semir, &settings).unwrap().summary;
        assert_relative_eq!(a.r0, b.r0, epsilon = 1e-12);
        assert_relative_eq!(a.final_size, b.final_size, epsilon = 1e-4);
        assert!(b.peak_time > a.peak_time);
    }

    #[test]
    fn test_save_csv_writes_every_step() {
        let model = build_model(ModelKind::SEIR, 1, closed_params()).unwrap();
        let settings = SimulationSettings {
            t_end: 10.0,
            ..SimulationSettings::default()
        };
        let out = simulate(&model, &settings).unwrap();
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("seir.csv");
        out.save_csv(&path).unwrap();
        let content = std::fs::read_to_string(&path).unwrap();
        let mut lines = content.lines();
        assert_eq!(lines.next().unwrap(), "t,S,E,I,R");
        assert_eq!(lines.count(), out.trajectory.len());
    }

    #[test]
    fn test_metric_names() {
        assert_eq!(
            "peak_infected".parse::<SummaryMetric>().unwrap(),
            SummaryMetric::PeakInfected
        );
        assert_eq!(SummaryMetric::FinalSize.to_string(), "final_size");
        let s = RunSummary {
            peak_infected: 0.1,
            peak_time: 50.0,
            final_size: 0.8,
            r0: 2.0,
        };
        assert_eq!(s.metric(SummaryMetric::PeakTime), 50.0);
        assert_eq!(s.metric(SummaryMetric::R0), 2.0);
    }
}
