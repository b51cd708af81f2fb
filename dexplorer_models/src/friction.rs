use dexplorer_diffeq::{Capabilities, OdeModel, RangePolicy};
use serde::{Deserialize, Serialize};

use crate::ModelParameters;

/// Spinning wheel slowed by viscous friction, integrated as `u' = -u` with
/// `u = ω / ω0` and `τ = c r t / I`.
#[derive(Debug, Clone, Copy, Default)]
pub struct ViscousFriction;

impl ViscousFriction {
    pub const INERTIA_MOMENT: usize = 0;
    pub const RADIUS: usize = 1;
    pub const FRICTION_COEFFICIENT: usize = 2;
    pub const INITIAL_ANGULAR_SPEED: usize = 3;

    const COEFFICIENT_A: usize = 0;
}

impl OdeModel for ViscousFriction {
    type Variable = f64;

    fn name(&self) -> &str {
        "viscous friction"
    }

    fn parameter_count(&self) -> usize {
        4
    }

    fn derived_count(&self) -> usize {
        1
    }

    fn capabilities(&self) -> Capabilities {
        Capabilities::DIMENSIONALIZATION
    }

    fn short_description(&self) -> String {
        "Classic viscous friction model".to_string()
    }

    fn long_description(&self) -> String {
        "Parameter :\n-> Elapsed Time [s]\n\n\
         Parameter Step :\n-> Time Step [s]\n\n\
         Mean Absolute Errors :\n-> Object angular speed [rad/s]"
            .to_string()
    }

    fn range_policy(&self) -> RangePolicy {
        RangePolicy::ZeroOrigin
    }

    fn init_analysis(&self, p: &[f64], derived: &mut [f64]) {
        derived[Self::COEFFICIENT_A] =
            p[Self::FRICTION_COEFFICIENT] * p[Self::RADIUS] / p[Self::INERTIA_MOMENT];
    }

    fn initial_variable(&self, _p: &[f64], _derived: &[f64]) -> f64 {
        1.0
    }

    fn derivative(&self, _p: &[f64], _derived: &[f64], u: &f64, _tau: f64) -> f64 {
        -u
    }

    fn analytical_solution(&self, _p: &[f64], _derived: &[f64], tau: f64) -> f64 {
        (-tau).exp()
    }

    fn dimensionalize_variable(&self, p: &[f64], _derived: &[f64], u: &f64) -> f64 {
        u * p[Self::INITIAL_ANGULAR_SPEED]
    }

    fn nondimensionalize_parameter(&self, _p: &[f64], derived: &[f64], t: f64) -> f64 {
        t * derived[Self::COEFFICIENT_A]
    }

    fn dimensionalize_parameter(&self, _p: &[f64], derived: &[f64], tau: f64) -> f64 {
        tau / derived[Self::COEFFICIENT_A]
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ViscousFrictionParameters {
    pub inertia_moment: f64,
    pub radius: f64,
    pub friction_coefficient: f64,
    pub initial_angular_speed: f64,
}

impl Default for ViscousFrictionParameters {
    fn default() -> Self {
        Self {
            inertia_moment: 1.0,
            radius: 0.5,
            friction_coefficient: 0.8,
            initial_angular_speed: 50.0,
        }
    }
}

impl ModelParameters for ViscousFrictionParameters {
    type Behavior = ViscousFriction;

    fn to_vec(&self) -> Vec<f64> {
        vec![
            self.inertia_moment,
            self.radius,
            self.friction_coefficient,
            self.initial_angular_speed,
        ]
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_abs_diff_eq;

    #[test]
    fn test_dimensional_angular_speed() {
        let mut model = ViscousFrictionParameters::default().model().unwrap();
        model.init_analysis();
        let (p, d) = (model.parameters(), model.derived());

        // ω(t) = ω0 exp(-c r t / I)
        let t = 2.0;
        let tau = ViscousFriction.nondimensionalize_parameter(p, d, t);
        let u = ViscousFriction.analytical_solution(p, d, tau);
        let omega = ViscousFriction.dimensionalize_variable(p, d, &u);
        assert_abs_diff_eq!(omega, 50.0 * (-0.4_f64 * t).exp(), epsilon = 1e-12);
        assert_abs_diff_eq!(
            ViscousFriction.dimensionalize_parameter(p, d, tau),
            t,
            epsilon = 1e-12
        );
    }
}
