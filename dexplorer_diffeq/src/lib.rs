//! Fixed-step integration of first order ODE models.
//!
//! A model's physics is described by an [`OdeModel`] implementation, wrapped
//! with its parameter values in a [`Model`]. A [`Simulation`] integrates one
//! configuration (solving type, parameter step, range) into a [`Trajectory`].

pub mod model;
pub mod simulation;
pub mod solving;
pub mod stepper;
pub mod trajectory;
pub mod variable;

pub use model::{Capabilities, Model, ModelError, OdeModel};
pub use simulation::{
    MAX_ITERATIONS, ParameterRange, RangePolicy, Simulation, SimulationConfig, SimulationError,
};
pub use solving::{SolvingType, SolvingTypeError};
pub use trajectory::Trajectory;
pub use variable::Variable;

/// Threshold under which a coefficient is treated as zero when a model picks
/// between closed-form branches.
pub const EPSILON: f64 = 1.0e-7;
