/// SEIR and SEmIR models expressed in population fractions
pub mod compartments;
/// solving a model and reducing the trajectory to peak, timing and final size
pub mod simulation;
