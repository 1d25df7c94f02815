//! Sweep described by a task document:
//!
//! ```text
//! model       kind: SEmIR  stages: 3  beta: 0.5  sigma: 0.2  gamma: 0.1  mu: 0  i0: 0.001
//! solver      method: DOPRI  t_end: 365  max_step: 1  rtol: 1e-6  atol: 1e-9
//! sampling    method: LHS  samples: 100  seed: 42  centered: false
//! parameters  beta: 0.1, 1.0  gamma: 0.05, 0.5, log
//! output      metric: peak_infected  csv: sweep.csv  plots: plots  parallel: true  loglevel: info
//! ```
//! `model`, `sampling` and `parameters` are required, every key has a default.
use crate::Utils::logger::{init_logger, parse_log_level};
use crate::Utils::task_parser::{
    DocumentMap, Section, SectionMap, Value, into_document, parse_sections, template_from,
};
use crate::epidemic::compartments::{EpiParameters, ModelKind};
use crate::epidemic::simulation::{SimulationSettings, SummaryMetric};
use crate::error::SweepError;
use crate::numerical::NonStiff_api::SolverSettings;
use crate::sampling::{ParameterRange, ParameterSpace, SamplingMethod, Scale};
use crate::sensitivity::sweep::{SensitivitySweep, SweepResult};
use log::info;
use simplelog::LevelFilter;
use std::fs;
use std::path::{Path, PathBuf};
use std::str::FromStr;

const MODEL_KEYS: &[&str] = &["kind", "stages", "beta", "sigma", "gamma", "mu", "i0"];
const SOLVER_KEYS: &[&str] = &[
    "method",
    "t_end",
    "step",
    "max_step",
    "rtol",
    "atol",
    "max_steps",
];
const SAMPLING_KEYS: &[&str] = &["method", "samples", "seed", "centered", "levels", "skip"];
const OUTPUT_KEYS: &[&str] = &["metric", "csv", "plots", "parallel", "loglevel", "logfile"];
const REQUIRED: &[&str] = &["model", "sampling", "parameters"];

#[derive(Debug, Clone, PartialEq)]
pub struct OutputSettings {
    pub metric: SummaryMetric,
    pub csv: Option<PathBuf>,
    /// directory for scatter plots (and the heatmap of two parameter grids)
    pub plots: Option<PathBuf>,
    pub loglevel: LevelFilter,
    pub logfile: bool,
}

impl Default for OutputSettings {
    fn default() -> Self {
        OutputSettings {
            metric: SummaryMetric::PeakInfected,
            csv: None,
            plots: None,
            loglevel: LevelFilter::Info,
            logfile: false,
        }
    }
}

#[derive(Debug, Clone)]
pub struct SweepTask {
    pub sweep: SensitivitySweep,
    pub output: OutputSettings,
}

fn config_err(section: &str, key: &str, expected: &str, values: &[Value]) -> SweepError {
    let got: Vec<String> = values.iter().map(|v| v.to_string()).collect();
    SweepError::Config(format!(
        "{}.{}: expected {}, got `{}`",
        section,
        key,
        expected,
        got.join(", ")
    ))
}

/// typed access to one section of the document
struct SectionReader<'a> {
    title: &'a str,
    map: &'a SectionMap,
}

impl<'a> SectionReader<'a> {
    fn new(doc: &'a DocumentMap, title: &'a str) -> Result<Self, SweepError> {
        let map = doc
            .get(title)
            .ok_or_else(|| SweepError::Config(format!("missing section `{}`", title)))?;
        Ok(SectionReader { title, map })
    }

    fn values(&self, key: &str) -> Option<&'a Vec<Value>> {
        self.map.get(key).and_then(|v| v.as_ref())
    }

    fn single(&self, key: &str, expected: &str) -> Result<Option<&'a Value>, SweepError> {
        match self.values(key) {
            None => Ok(None),
            Some(values) if values.len() == 1 => Ok(Some(&values[0])),
            Some(values) => Err(config_err(self.title, key, expected, values)),
        }
    }

    fn f64_or(&self, key: &str, default: f64) -> Result<f64, SweepError> {
        match self.single(key, "a number")? {
            None => Ok(default),
            Some(v) => v
                .as_f64()
                .ok_or_else(|| config_err(self.title, key, "a number", std::slice::from_ref(v))),
        }
    }

    fn usize_or(&self, key: &str, default: usize) -> Result<usize, SweepError> {
        match self.single(key, "a non-negative integer")? {
            None => Ok(default),
            Some(v) => v.as_usize().ok_or_else(|| {
                config_err(
                    self.title,
                    key,
                    "a non-negative integer",
                    std::slice::from_ref(v),
                )
            }),
        }
    }

    fn bool_or(&self, key: &str, default: bool) -> Result<bool, SweepError> {
        match self.single(key, "true or false")? {
            None => Ok(default),
            Some(v) => v.as_boolean().ok_or_else(|| {
                config_err(self.title, key, "true or false", std::slice::from_ref(v))
            }),
        }
    }

    fn string(&self, key: &str) -> Result<Option<String>, SweepError> {
        Ok(self.single(key, "a single value")?.map(|v| v.to_string_value()))
    }

    fn parsed_or<T: FromStr>(&self, key: &str, default: T, expected: &str) -> Result<T, SweepError> {
        match self.single(key, expected)? {
            None => Ok(default),
            Some(v) => v
                .to_string_value()
                .parse::<T>()
                .map_err(|_| config_err(self.title, key, expected, std::slice::from_ref(v))),
        }
    }
}

fn template() -> DocumentMap {
    template_from(&[
        ("model", MODEL_KEYS),
        ("solver", SOLVER_KEYS),
        ("sampling", SAMPLING_KEYS),
        ("output", OUTPUT_KEYS),
    ])
}

fn check_structure(sections: &[Section]) -> Result<(), SweepError> {
    let template = template();
    for (title, pairs) in sections {
        match template.get(title) {
            Some(keys) => {
                if let Some((key, _)) = pairs.iter().find(|(k, _)| !keys.contains_key(k)) {
                    return Err(SweepError::Config(format!(
                        "unknown key `{}` in section `{}`",
                        key, title
                    )));
                }
            }
            None if title == "parameters" => {}
            None => {
                return Err(SweepError::Config(format!("unknown section `{}`", title)));
            }
        }
    }
    for required in REQUIRED {
        if !sections.iter().any(|(title, _)| title == required) {
            return Err(SweepError::Config(format!(
                "missing section `{}`",
                required
            )));
        }
    }
    Ok(())
}

fn read_model(doc: &DocumentMap) -> Result<(ModelKind, usize, EpiParameters), SweepError> {
    let model = SectionReader::new(doc, "model")?;
    let kind = model.parsed_or("kind", ModelKind::SEIR, "SEIR or SEmIR")?;
    let stages = model.usize_or("stages", 1)?;
    let d = EpiParameters::default();
    let params = EpiParameters {
        beta: model.f64_or("beta", d.beta)?,
        sigma: model.f64_or("sigma", d.sigma)?,
        gamma: model.f64_or("gamma", d.gamma)?,
        mu: model.f64_or("mu", d.mu)?,
        i0: model.f64_or("i0", d.i0)?,
    };
    Ok((kind, stages, params))
}

fn read_solver(doc: &DocumentMap) -> Result<SimulationSettings, SweepError> {
    let solver = SectionReader::new(doc, "solver")?;
    let d = SolverSettings::default();
    let step = match solver.single("step", "a number")? {
        None => None,
        Some(_) => Some(solver.f64_or("step", 0.0)?),
    };
    let settings = SolverSettings {
        method: solver.parsed_or("method", d.method, "RK45, DOPRI or AB4")?,
        h_step: step,
        max_step: solver.f64_or("max_step", d.max_step)?,
        rtol: solver.f64_or("rtol", d.rtol)?,
        atol: solver.f64_or("atol", d.atol)?,
        max_steps: solver.usize_or("max_steps", d.max_steps)?,
    };
    Ok(SimulationSettings {
        t_end: solver.f64_or("t_end", SimulationSettings::default().t_end)?,
        solver: settings,
    })
}

fn read_sampling(doc: &DocumentMap) -> Result<SamplingMethod, SweepError> {
    let sampling = SectionReader::new(doc, "sampling")?;
    let method = sampling
        .string("method")?
        .unwrap_or_else(|| "LHS".to_string());
    match method.to_lowercase().as_str() {
        "grid" => {
            let levels = match sampling.values("levels") {
                None => vec![5],
                Some(values) => values
                    .iter()
                    .map(|v| v.as_usize())
                    .collect::<Option<Vec<usize>>>()
                    .ok_or_else(|| {
                        config_err("sampling", "levels", "non-negative integers", values)
                    })?,
            };
            Ok(SamplingMethod::Grid { levels })
        }
        "lhs" => Ok(SamplingMethod::LHS {
            samples: sampling.usize_or("samples", 100)?,
            seed: sampling.usize_or("seed", 42)? as u64,
            centered: sampling.bool_or("centered", false)?,
        }),
        "sobol" => Ok(SamplingMethod::Sobol {
            samples: sampling.usize_or("samples", 128)?,
            skip: sampling.usize_or("skip", 1)?,
        }),
        other => Err(SweepError::Config(format!(
            "sampling.method: expected Grid, LHS or Sobol, got `{}`",
            other
        ))),
    }
}

/// ranges in the order they are written; repeated `parameters` sections are concatenated
fn read_parameters(sections: &[Section]) -> Result<ParameterSpace, SweepError> {
    let mut ranges = Vec::new();
    for (_, pairs) in sections.iter().filter(|(title, _)| title == "parameters") {
        for (name, values) in pairs {
            let expected = "lower, upper[, linear|log]";
            let bound = |i: usize| values.get(i).and_then(|v| v.as_f64());
            let (lower, upper) = match (values.len(), bound(0), bound(1)) {
                (2 | 3, Some(lower), Some(upper)) => (lower, upper),
                _ => return Err(config_err("parameters", name, expected, values)),
            };
            let scale = match values.get(2) {
                None => Scale::Linear,
                Some(v) => Scale::from_str(&v.to_string_value().to_lowercase())
                    .map_err(|_| config_err("parameters", name, expected, values))?,
            };
            ranges.push(ParameterRange {
                name: name.clone(),
                lower,
                upper,
                scale,
            });
        }
    }
    ParameterSpace::new(ranges)
}

fn read_output(doc: &DocumentMap) -> Result<(OutputSettings, bool), SweepError> {
    let output = SectionReader::new(doc, "output")?;
    let d = OutputSettings::default();
    let loglevel = match output.string("loglevel")? {
        None => d.loglevel,
        Some(level) => parse_log_level(&level)?,
    };
    let settings = OutputSettings {
        metric: output.parsed_or(
            "metric",
            d.metric,
            "peak_infected, peak_time, final_size or r0",
        )?,
        csv: output.string("csv")?.map(PathBuf::from),
        plots: output.string("plots")?.map(PathBuf::from),
        loglevel,
        logfile: output.bool_or("logfile", d.logfile)?,
    };
    Ok((settings, output.bool_or("parallel", true)?))
}

impl FromStr for SweepTask {
    type Err = SweepError;

    fn from_str(input: &str) -> Result<Self, Self::Err> {
        let sections = parse_sections(input)?;
        check_structure(&sections)?;
        let doc = into_document(&sections, Some(&template()));
        let (model, stages, base) = read_model(&doc)?;
        let (output, parallel) = read_output(&doc)?;
        let sweep = SensitivitySweep {
            model,
            stages,
            base,
            space: read_parameters(&sections)?,
            sampling: read_sampling(&doc)?,
            simulation: read_solver(&doc)?,
            parallel,
        };
        sweep.validate()?;
        Ok(SweepTask { sweep, output })
    }
}

impl SweepTask {
    pub fn from_file<P: AsRef<Path>>(path: P) -> Result<Self, SweepError> {
        let content = fs::read_to_string(path)?;
        content.parse()
    }

    /// Runs the sweep, prints the sensitivity table and writes the requested files.
    pub fn execute(&self) -> Result<SweepResult, SweepError> {
        if let Some(name) = init_logger(self.output.loglevel, self.output.logfile, true) {
            info!("logging to {}", name);
        }
        let result = self.sweep.run()?;
        let metric = self.output.metric;
        let table = result.summary_table(metric);
        println!("{}", table);
        if let Some(path) = &self.output.csv {
            result.save_csv(path)?;
        }
        if let Some(dir) = &self.output.plots {
            let written = result.plot_scatter(dir, metric)?;
            info!("{} scatter plots written to {}", written.len(), dir.display());
            if result.heatmap(metric).is_ok() {
                let path = dir.join(format!("heatmap_{}.png", metric));
                result.plot_heatmap(&path, metric)?;
            }
        }
        Ok(result)
    }
}
