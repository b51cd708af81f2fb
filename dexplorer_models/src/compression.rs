use dexplorer_diffeq::{Capabilities, OdeModel, RangePolicy, Variable};
use nalgebra::Vector2;
use serde::{Deserialize, Serialize};

use crate::ModelParameters;

/// Force of an adiabatically compressed gas on a piston of surface `s`,
/// balanced by the outer pressure.
fn piston_force(
    length: f64,
    surface: f64,
    heat_capacity_ratio: f64,
    incompressible_length: f64,
    outer_pressure: f64,
    initial_pressure: f64,
    initial_length: f64,
) -> f64 {
    let coefficient = surface
        * initial_pressure
        * (initial_length - incompressible_length).powf(heat_capacity_ratio);
    coefficient / (length - incompressible_length).powf(heat_capacity_ratio)
        - surface * outer_pressure
}

/// Free piston pushed by a compressed gas. The variable is
/// `(piston speed, piston length)`; there is no simple closed form.
#[derive(Debug, Clone, Copy, Default)]
pub struct SimpleCompression;

impl SimpleCompression {
    pub const MASS: usize = 0;
    pub const SURFACE: usize = 1;
    pub const HEAT_CAPACITY_RATIO: usize = 2;
    pub const INCOMPRESSIBLE_LENGTH: usize = 3;
    pub const MAX_COMPRESSIBLE_LENGTH: usize = 4;
    pub const OUTER_PRESSURE: usize = 5;
    pub const INITIAL_PRESSURE: usize = 6;
    pub const INITIAL_LENGTH: usize = 7;
    pub const INITIAL_SPEED: usize = 8;

    const COEFFICIENT_A: usize = 0;
}

impl OdeModel for SimpleCompression {
    type Variable = Vector2<f64>;

    fn name(&self) -> &str {
        "simple compression"
    }

    fn parameter_count(&self) -> usize {
        9
    }

    fn derived_count(&self) -> usize {
        1
    }

    fn capabilities(&self) -> Capabilities {
        Capabilities::POST_STEP
    }

    fn short_description(&self) -> String {
        "Classic compression model".to_string()
    }

    fn long_description(&self) -> String {
        "Parameter :\n-> Elapsed Time [s]\n\n\
         Parameter Step :\n-> Time Step [s]\n\n\
         Variable :\n-> Piston speed [m/s]\n-> Piston position [m]\n\n\
         NB : There is no simple analytical solution"
            .to_string()
    }

    fn range_policy(&self) -> RangePolicy {
        RangePolicy::ZeroOrigin
    }

    fn init_analysis(&self, p: &[f64], derived: &mut [f64]) {
        derived[Self::COEFFICIENT_A] = p[Self::SURFACE]
            * p[Self::INITIAL_PRESSURE]
            * (p[Self::INITIAL_LENGTH] - p[Self::INCOMPRESSIBLE_LENGTH])
                .powf(p[Self::HEAT_CAPACITY_RATIO])
            / p[Self::MASS];
    }

    fn initial_variable(&self, p: &[f64], _derived: &[f64]) -> Vector2<f64> {
        Vector2::new(p[Self::INITIAL_SPEED], p[Self::INITIAL_LENGTH])
    }

    fn derivative(&self, p: &[f64], derived: &[f64], x: &Vector2<f64>, _t: f64) -> Vector2<f64> {
        let gas = derived[Self::COEFFICIENT_A]
            / (x.y - p[Self::INCOMPRESSIBLE_LENGTH]).powf(p[Self::HEAT_CAPACITY_RATIO]);
        let outer = p[Self::SURFACE] * p[Self::OUTER_PRESSURE] / p[Self::MASS];
        Vector2::new(gas - outer, x.x)
    }

    fn analytical_solution(&self, _p: &[f64], _derived: &[f64], _t: f64) -> Vector2<f64> {
        Vector2::undefined()
    }

    /// Stops the piston at both ends of its travel.
    fn post_step(&self, p: &[f64], _derived: &mut [f64], next: &mut Vector2<f64>) -> Vector2<f64> {
        let max_length = p[Self::MAX_COMPRESSIBLE_LENGTH];
        if next.y <= 0.0 {
            *next = Vector2::zeros();
        } else if next.y >= max_length {
            *next = Vector2::new(0.0, max_length);
        }
        *next
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct SimpleCompressionParameters {
    pub mass: f64,
    pub surface: f64,
    pub heat_capacity_ratio: f64,
    pub incompressible_length: f64,
    pub max_compressible_length: f64,
    pub outer_pressure: f64,
    pub initial_pressure: f64,
    pub initial_length: f64,
    pub initial_speed: f64,
}

impl Default for SimpleCompressionParameters {
    fn default() -> Self {
        Self {
            mass: 0.5,
            surface: 0.005,
            heat_capacity_ratio: 1.4,
            incompressible_length: 0.01,
            max_compressible_length: 0.3,
            outer_pressure: 101_325.0,
            initial_pressure: 500_000.0,
            initial_length: 0.05,
            initial_speed: 0.0,
        }
    }
}

impl ModelParameters for SimpleCompressionParameters {
    type Behavior = SimpleCompression;

    fn to_vec(&self) -> Vec<f64> {
        vec![
            self.mass,
            self.surface,
            self.heat_capacity_ratio,
            self.incompressible_length,
            self.max_compressible_length,
            self.outer_pressure,
            self.initial_pressure,
            self.initial_length,
            self.initial_speed,
        ]
    }
}

/// Piston driving a crankshaft through a connecting rod. The variable is
/// `(axle angular speed, axle angular position)`; there is no simple closed
/// form.
#[derive(Debug, Clone, Copy, Default)]
pub struct CrankshaftCompression;

impl CrankshaftCompression {
    pub const SURFACE: usize = 0;
    pub const HEAT_CAPACITY_RATIO: usize = 1;
    pub const INCOMPRESSIBLE_LENGTH: usize = 2;
    pub const OUTER_PRESSURE: usize = 3;
    pub const INITIAL_PRESSURE: usize = 4;
    pub const INERTIA_MOMENT: usize = 5;
    pub const CRANK_RADIUS: usize = 6;
    pub const CONNECTING_ROD_LENGTH: usize = 7;
    pub const INITIAL_ANGULAR_POSITION: usize = 8;
    pub const INITIAL_ANGULAR_SPEED: usize = 9;

    const INITIAL_PISTON_LENGTH: usize = 0;

    /// Piston travel for a crank angle.
    pub fn piston_length(
        angular_position: f64,
        crank_radius: f64,
        connecting_rod_length: f64,
    ) -> f64 {
        let offset = crank_radius * angular_position.sin();
        crank_radius * (1.0 - angular_position.cos()) + connecting_rod_length
            - (connecting_rod_length.powi(2) - offset.powi(2)).sqrt()
    }

    /// Torque on the axle for a force along the piston axis.
    pub fn torque(
        piston_force: f64,
        angular_position: f64,
        crank_radius: f64,
        connecting_rod_length: f64,
    ) -> f64 {
        let beta = (crank_radius * angular_position.sin() / connecting_rod_length).asin();
        crank_radius * piston_force * (angular_position + beta).sin() / beta.cos()
    }
}

impl OdeModel for CrankshaftCompression {
    type Variable = Vector2<f64>;

    fn name(&self) -> &str {
        "crankshaft compression"
    }

    fn parameter_count(&self) -> usize {
        10
    }

    fn derived_count(&self) -> usize {
        1
    }

    fn short_description(&self) -> String {
        "Crankshaft compression model".to_string()
    }

    fn long_description(&self) -> String {
        "Parameter :\n-> Elapsed Time [s]\n\n\
         Parameter Step :\n-> Time Step [s]\n\n\
         Variable :\n-> Axle angular speed [rad/s]\n-> Axle angular position [rad]\n\n\
         NB : There is no simple analytical solution"
            .to_string()
    }

    fn range_policy(&self) -> RangePolicy {
        RangePolicy::ZeroOrigin
    }

    fn init_analysis(&self, p: &[f64], derived: &mut [f64]) {
        derived[Self::INITIAL_PISTON_LENGTH] = Self::piston_length(
            p[Self::INITIAL_ANGULAR_POSITION],
            p[Self::CRANK_RADIUS],
            p[Self::CONNECTING_ROD_LENGTH],
        );
    }

    fn initial_variable(&self, p: &[f64], _derived: &[f64]) -> Vector2<f64> {
        Vector2::new(p[Self::INITIAL_ANGULAR_SPEED], p[Self::INITIAL_ANGULAR_POSITION])
    }

    fn derivative(&self, p: &[f64], derived: &[f64], x: &Vector2<f64>, _t: f64) -> Vector2<f64> {
        let angular_position = x.y;
        let length = Self::piston_length(
            angular_position,
            p[Self::CRANK_RADIUS],
            p[Self::CONNECTING_ROD_LENGTH],
        );
        let force = piston_force(
            length,
            p[Self::SURFACE],
            p[Self::HEAT_CAPACITY_RATIO],
            p[Self::INCOMPRESSIBLE_LENGTH],
            p[Self::OUTER_PRESSURE],
            p[Self::INITIAL_PRESSURE],
            derived[Self::INITIAL_PISTON_LENGTH],
        );
        let torque = Self::torque(
            force,
            angular_position,
            p[Self::CRANK_RADIUS],
            p[Self::CONNECTING_ROD_LENGTH],
        );
        Vector2::new(torque / p[Self::INERTIA_MOMENT], x.x)
    }

    fn analytical_solution(&self, _p: &[f64], _derived: &[f64], _t: f64) -> Vector2<f64> {
        Vector2::undefined()
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct CrankshaftCompressionParameters {
    pub surface: f64,
    pub heat_capacity_ratio: f64,
    pub incompressible_length: f64,
    pub outer_pressure: f64,
    pub initial_pressure: f64,
    pub inertia_moment: f64,
    pub crank_radius: f64,
    pub connecting_rod_length: f64,
    pub initial_angular_position: f64,
    pub initial_angular_speed: f64,
}

impl Default for CrankshaftCompressionParameters {
    fn default() -> Self {
        Self {
            surface: 0.005,
            heat_capacity_ratio: 1.4,
            incompressible_length: -0.01,
            outer_pressure: 101_325.0,
            initial_pressure: 300_000.0,
            inertia_moment: 0.2,
            crank_radius: 0.05,
            connecting_rod_length: 0.15,
            initial_angular_position: 0.2,
            initial_angular_speed: 0.0,
        }
    }
}

impl ModelParameters for CrankshaftCompressionParameters {
    type Behavior = CrankshaftCompression;

    fn to_vec(&self) -> Vec<f64> {
        vec![
            self.surface,
            self.heat_capacity_ratio,
            self.incompressible_length,
            self.outer_pressure,
            self.initial_pressure,
            self.inertia_moment,
            self.crank_radius,
            self.connecting_rod_length,
            self.initial_angular_position,
            self.initial_angular_speed,
        ]
    }
}
