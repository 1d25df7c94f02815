use crate::error::SweepError;
use chrono::Local;
use csv::Writer;
use nalgebra::{DMatrix, DVector};
use simplelog::{
    ColorChoice, CombinedLogger, Config, LevelFilter, SharedLogger, TermLogger, TerminalMode,
    WriteLogger,
};
use std::fs::File;
use std::io;
use std::path::Path;

/// writes `arg` column followed by the matrix columns named by `headers`
pub fn save_matrix_to_csv<P: AsRef<Path>>(
    matrix: &DMatrix<f64>,
    headers: &[String],
    filename: P,
    x_mesh: &DVector<f64>,
    arg: &str,
) -> io::Result<()> {
    let file = File::create(filename)?;
    let mut writer = Writer::from_writer(file);

    let mut headers_with_x = Vec::with_capacity(headers.len() + 1);
    headers_with_x.push(arg.to_string());
    headers_with_x.extend(headers.iter().cloned());
    writer.write_record(&headers_with_x)?;

    for (i, row) in matrix.row_iter().enumerate() {
        let mut row_data = Vec::with_capacity(row.len() + 1);
        row_data.push(x_mesh[i].to_string());
        row_data.extend(row.iter().map(|&val| val.to_string()));
        writer.write_record(&row_data)?;
    }

    writer.flush()?;
    Ok(())
}

pub fn parse_log_level(level: &str) -> Result<LevelFilter, SweepError> {
    match level.trim().to_lowercase().as_str() {
        "trace" => Ok(LevelFilter::Trace),
        "debug" => Ok(LevelFilter::Debug),
        "info" => Ok(LevelFilter::Info),
        "warn" => Ok(LevelFilter::Warn),
        "error" => Ok(LevelFilter::Error),
        "off" | "none" => Ok(LevelFilter::Off),
        other => Err(SweepError::Config(format!(
            "loglevel must be debug, info, warn, error or off, got `{}`",
            other
        ))),
    }
}

/// Installs the global logger once per process; later calls are ignored.
/// Returns the name of the log file when one was created.
pub fn init_logger(level: LevelFilter, log_file: bool, console: bool) -> Option<String> {
    let mut loggers: Vec<Box<dyn SharedLogger>> = Vec::new();
    if console {
        loggers.push(TermLogger::new(
            level,
            Config::default(),
            TerminalMode::Mixed,
            ColorChoice::Auto,
        ));
    }
    let mut file_name = None;
    if log_file {
        if let Some((logger, name)) = file_logger(level, Path::new(".")) {
            loggers.push(logger);
            file_name = Some(name);
        }
    }
    if !loggers.is_empty() {
        let _ = CombinedLogger::init(loggers);
    }
    file_name
}

/// `WriteLogger` into `dir/log_<date>_<time>.txt`
fn file_logger(level: LevelFilter, dir: &Path) -> Option<(Box<dyn SharedLogger>, String)> {
    let date_and_time = Local::now().format("%Y-%m-%d_%H-%M-%S");
    let path = dir.join(format!("log_{}.txt", date_and_time));
    let file = File::create(&path).ok()?;
    let name = path.file_name()?.to_string_lossy().into_owned();
    let logger: Box<dyn SharedLogger> = WriteLogger::new(level, Config::default(), file);
    Some((logger, name))
}
