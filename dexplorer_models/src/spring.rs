use dexplorer_diffeq::{OdeModel, RangePolicy};
use nalgebra::Vector2;
use serde::{Deserialize, Serialize};

use crate::ModelParameters;

/// Undamped mass on a spring. The variable is `(length, speed)`.
#[derive(Debug, Clone, Copy, Default)]
pub struct Spring;

impl Spring {
    pub const MASS: usize = 0;
    pub const STIFFNESS: usize = 1;
    pub const NEUTRAL_LENGTH: usize = 2;
    pub const INITIAL_LENGTH: usize = 3;
    pub const INITIAL_SPEED: usize = 4;

    const NATURAL_FREQUENCY: usize = 0;
    const PHASE: usize = 1;
    const AMPLITUDE: usize = 2;
}

impl OdeModel for Spring {
    type Variable = Vector2<f64>;

    fn name(&self) -> &str {
        "spring"
    }

    fn parameter_count(&self) -> usize {
        5
    }

    fn derived_count(&self) -> usize {
        3
    }

    fn short_description(&self) -> String {
        "Classic spring model".to_string()
    }

    fn long_description(&self) -> String {
        "Parameter :\n-> Elapsed Time [s]\n\n\
         Parameter Step :\n-> Time Step [s]\n\n\
         Mean Absolute Errors :\n-> Spring length [m]\n-> Spring speed [m/s]"
            .to_string()
    }

    fn range_policy(&self) -> RangePolicy {
        RangePolicy::ZeroOrigin
    }

    fn init_analysis(&self, p: &[f64], derived: &mut [f64]) {
        let displacement = p[Self::INITIAL_LENGTH] - p[Self::NEUTRAL_LENGTH];
        let omega = (p[Self::STIFFNESS] / p[Self::MASS]).sqrt();
        let scaled_speed = p[Self::INITIAL_SPEED] / omega;

        derived[Self::NATURAL_FREQUENCY] = omega;
        derived[Self::PHASE] = (-scaled_speed).atan2(displacement);
        derived[Self::AMPLITUDE] = displacement.hypot(scaled_speed);
    }

    fn initial_variable(&self, p: &[f64], _derived: &[f64]) -> Vector2<f64> {
        Vector2::new(p[Self::INITIAL_LENGTH], p[Self::INITIAL_SPEED])
    }

    fn derivative(&self, p: &[f64], _derived: &[f64], x: &Vector2<f64>, _t: f64) -> Vector2<f64> {
        let acceleration = p[Self::STIFFNESS] * (p[Self::NEUTRAL_LENGTH] - x.x) / p[Self::MASS];
        Vector2::new(x.y, acceleration)
    }

    fn analytical_solution(&self, p: &[f64], derived: &[f64], t: f64) -> Vector2<f64> {
        let omega = derived[Self::NATURAL_FREQUENCY];
        let amplitude = derived[Self::AMPLITUDE];
        let angle = omega * t + derived[Self::PHASE];
        Vector2::new(
            p[Self::NEUTRAL_LENGTH] + amplitude * angle.cos(),
            -amplitude * omega * angle.sin(),
        )
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct SpringParameters {
    pub mass: f64,
    pub stiffness: f64,
    pub neutral_length: f64,
    pub initial_length: f64,
    pub initial_speed: f64,
}

impl Default for SpringParameters {
    fn default() -> Self {
        Self {
            mass: 1.0,
            stiffness: 10.0,
            neutral_length: 1.0,
            initial_length: 1.5,
            initial_speed: 0.0,
        }
    }
}

impl ModelParameters for SpringParameters {
    type Behavior = Spring;

    fn to_vec(&self) -> Vec<f64> {
        vec![
            self.mass,
            self.stiffness,
            self.neutral_length,
            self.initial_length,
            self.initial_speed,
        ]
    }
}
