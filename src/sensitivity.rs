//! Sensitivity analysis of epidemic summaries to sampled parameters.
/// Pearson, Spearman and partial rank correlation coefficients
pub mod correlation;
/// runs a design through the model and collects one summary per run
pub mod sweep;
/// builds and executes a sweep from a task document
pub mod task_sweep;
