//! examples of usage of RustedEpiSweep
/// SEIR/SEmIR trajectories, sampled sweeps and one-at-a-time profiles
pub mod sweep_examples;
