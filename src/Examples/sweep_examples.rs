// Copyright (c)  by Gleb E. Zaslavkiy
//MIT License
#![allow(non_snake_case)]

use crate::Utils::logger::init_logger;
use crate::epidemic::compartments::{EpiParameters, ModelKind};
use crate::epidemic::simulation::{SimulationSettings, SummaryMetric};
use crate::error::SweepError;
use crate::numerical::NonStiff_api::{SolverMethod, SolverSettings};
use crate::sampling::{ParameterRange, ParameterSpace, SamplingMethod};
use crate::sensitivity::sweep::{SensitivitySweep, one_at_a_time, trajectory_for};
use log::info;
use simplelog::LevelFilter;
use std::fs;
use std::path::Path;
use tabled::{builder::Builder, settings::Style};

const OUT: &str = "sweep_results";

pub fn sweep_examples(example: usize) -> Result<(), SweepError> {
    init_logger(LevelFilter::Info, false, true);
    let out = Path::new(OUT);
    fs::create_dir_all(out)?;
    match example {
        0 => {
            // a single SEIR epidemic: R0 = 5, mean latent period 5 days, infectious 10 days
            let params = EpiParameters::default();
            let outcome =
                trajectory_for(ModelKind::SEIR, 1, params, &SimulationSettings::default())?;
            outcome.save_csv(out.join("seir_trajectory.csv"))?;
            outcome.plot(out.join("seir_trajectory.png"))?;
            println!(
                "peak infected {:.4} on day {:.1}, final size {:.4}",
                outcome.summary.peak_infected, outcome.summary.peak_time, outcome.summary.final_size
            );
        }
        1 => {
            // Latin hypercube over the three rates, PRCC of the peak
            let space = ParameterSpace::new(vec![
                ParameterRange::new("beta", 0.1, 1.0),
                ParameterRange::new("sigma", 0.1, 0.5),
                ParameterRange::new("gamma", 0.05, 0.5),
            ])?;
            let sweep = SensitivitySweep::new(
                ModelKind::SEIR,
                1,
                EpiParameters::default(),
                space,
                SamplingMethod::LHS {
                    samples: 200,
                    seed: 42,
                    centered: false,
                },
            );
            let result = sweep.run()?;
            println!("{}", result.summary_table(SummaryMetric::PeakInfected));
            result.save_csv(out.join("lhs_sweep.csv"))?;
            result.plot_scatter(out.join("lhs_scatter"), SummaryMetric::PeakInfected)?;
        }
        2 => {
            // peak as a function of R0 and the infectious period on a 12 x 12 grid
            let space = ParameterSpace::new(vec![
                ParameterRange::new("R0", 1.1, 4.0),
                ParameterRange::new("infectious_period", 3.0, 14.0),
            ])?;
            let sweep = SensitivitySweep::new(
                ModelKind::SEIR,
                1,
                EpiParameters::default(),
                space,
                SamplingMethod::Grid { levels: vec![12] },
            );
            let result = sweep.run()?;
            result.plot_heatmap(out.join("heatmap_peak.png"), SummaryMetric::PeakInfected)?;
            result.plot_heatmap(out.join("heatmap_peak_time.png"), SummaryMetric::PeakTime)?;
            result.save_csv(out.join("grid_sweep.csv"))?;
        }
        3 => {
            // more latent stages at the same mean latent period: same R0, later peak
            let params = EpiParameters {
                i0: 1e-4,
                ..EpiParameters::default()
            };
            let mut builder = Builder::default();
            builder.push_record(["stages", "R0", "peak infected", "peak time", "final size"]);
            for stages in 1..=6 {
                let outcome = trajectory_for(
                    ModelKind::SEmIR,
                    stages,
                    params,
                    &SimulationSettings::default(),
                )?;
                let s = outcome.summary;
                builder.push_record([
                    stages.to_string(),
                    format!("{:.3}", s.r0),
                    format!("{:.5}", s.peak_infected),
                    format!("{:.2}", s.peak_time),
                    format!("{:.5}", s.final_size),
                ]);
                if stages == 6 {
                    outcome.plot(out.join("semir6_trajectory.png"))?;
                }
            }
            let mut table = builder.build();
            table.with(Style::modern_rounded());
            println!("{}", table);
        }
        4 => {
            // Sobol design over periods, R0 and the initial seed, fixed step Adams-Bashforth
            let space = ParameterSpace::new(vec![
                ParameterRange::new("R0", 1.2, 6.0),
                ParameterRange::new("latent_period", 1.0, 10.0),
                ParameterRange::new("infectious_period", 2.0, 14.0),
                ParameterRange::log("i0", 1e-6, 1e-2),
            ])?;
            let mut sweep = SensitivitySweep::new(
                ModelKind::SEmIR,
                4,
                EpiParameters::default(),
                space,
                SamplingMethod::Sobol {
                    samples: 256,
                    skip: 1,
                },
            );
            sweep.simulation = SimulationSettings {
                t_end: 730.0,
                solver: SolverSettings {
                    method: SolverMethod::AB4,
                    h_step: Some(0.1),
                    ..SolverSettings::default()
                },
            };
            let result = sweep.run()?;
            println!("{}", result.summary_table(SummaryMetric::PeakTime));
            println!("{}", result.summary_table(SummaryMetric::PeakInfected));
            result.save_csv(out.join("sobol_sweep.csv"))?;
        }
        5 => {
            // one-at-a-time profile: everything at base, R0 from 0.8 to 5
            let range = ParameterRange::new("R0", 0.8, 5.0);
            let profile = one_at_a_time(
                ModelKind::SEIR,
                1,
                &EpiParameters::default(),
                &range,
                25,
                &SimulationSettings::default(),
            )?;
            profile.plot(out.join("oat_R0_peak.png"), SummaryMetric::PeakInfected)?;
            profile.plot(out.join("oat_R0_final_size.png"), SummaryMetric::FinalSize)?;
            for (r0, peak) in profile
                .values
                .iter()
                .zip(profile.metric_column(SummaryMetric::PeakInfected))
            {
                println!("R0 = {:.3}  peak = {:.5}", r0, peak);
            }
        }
        _ => {
            return Err(SweepError::Config(format!(
                "there is no example {}, choose 0..=5",
                example
            )));
        }
    }
    info!("example {} done, results in {}", example, OUT);
    Ok(())
}
