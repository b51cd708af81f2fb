use dexplorer_diffeq::{Capabilities, EPSILON, OdeModel, RangePolicy};
use serde::{Deserialize, Serialize};

use crate::ModelParameters;

/// `½ ρ S Cd`
fn drag_factor(fluid_density: f64, reference_surface: f64, drag_coefficient: f64) -> f64 {
    0.5 * fluid_density * reference_surface * drag_coefficient
}

/// Quadratic drag only, integrated as `u' = -u²` with `u = v / v0` and
/// `τ = v0 a t`, `a = ½ ρ S Cd / m`.
#[derive(Debug, Clone, Copy, Default)]
pub struct SimpleDrag;

impl SimpleDrag {
    pub const MASS: usize = 0;
    pub const FLUID_DENSITY: usize = 1;
    pub const REFERENCE_SURFACE: usize = 2;
    pub const DRAG_COEFFICIENT: usize = 3;
    pub const INITIAL_SPEED: usize = 4;

    const COEFFICIENT_A: usize = 0;
}

impl OdeModel for SimpleDrag {
    type Variable = f64;

    fn name(&self) -> &str {
        "simple drag"
    }

    fn parameter_count(&self) -> usize {
        5
    }

    fn derived_count(&self) -> usize {
        1
    }

    fn capabilities(&self) -> Capabilities {
        Capabilities::DIMENSIONALIZATION
    }

    fn short_description(&self) -> String {
        "Classic drag model".to_string()
    }

    fn long_description(&self) -> String {
        "Parameter :\n-> Elapsed Time [s]\n\n\
         Parameter Step :\n-> Time Step [s]\n\n\
         Variable :\n-> Object speed [m/s]"
            .to_string()
    }

    fn range_policy(&self) -> RangePolicy {
        RangePolicy::ZeroOrigin
    }

    fn init_analysis(&self, p: &[f64], derived: &mut [f64]) {
        derived[Self::COEFFICIENT_A] = drag_factor(
            p[Self::FLUID_DENSITY],
            p[Self::REFERENCE_SURFACE],
            p[Self::DRAG_COEFFICIENT],
        ) / p[Self::MASS];
    }

    fn initial_variable(&self, _p: &[f64], _derived: &[f64]) -> f64 {
        1.0
    }

    fn derivative(&self, _p: &[f64], _derived: &[f64], u: &f64, _tau: f64) -> f64 {
        -u * u
    }

    fn analytical_solution(&self, _p: &[f64], _derived: &[f64], tau: f64) -> f64 {
        1.0 / (tau + 1.0)
    }

    fn dimensionalize_variable(&self, p: &[f64], _derived: &[f64], u: &f64) -> f64 {
        u * p[Self::INITIAL_SPEED]
    }

    fn nondimensionalize_parameter(&self, p: &[f64], derived: &[f64], t: f64) -> f64 {
        p[Self::INITIAL_SPEED] * derived[Self::COEFFICIENT_A] * t
    }

    fn dimensionalize_parameter(&self, p: &[f64], derived: &[f64], tau: f64) -> f64 {
        tau / (p[Self::INITIAL_SPEED] * derived[Self::COEFFICIENT_A])
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct SimpleDragParameters {
    pub mass: f64,
    pub fluid_density: f64,
    pub reference_surface: f64,
    pub drag_coefficient: f64,
    pub initial_speed: f64,
}

impl Default for SimpleDragParameters {
    fn default() -> Self {
        Self {
            mass: 1.0,
            fluid_density: 1.225,
            reference_surface: 0.1,
            drag_coefficient: 0.47,
            initial_speed: 20.0,
        }
    }
}

impl ModelParameters for SimpleDragParameters {
    type Behavior = SimpleDrag;

    fn to_vec(&self) -> Vec<f64> {
        vec![
            self.mass,
            self.fluid_density,
            self.reference_surface,
            self.drag_coefficient,
            self.initial_speed,
        ]
    }
}

/// Sign of the additional force relative to the motion.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum DragRegime {
    /// `u' = 1 - u²`, speed relaxes to the limit speed.
    Propelled,
    /// `u' = -(1 + u²)`
    Braked,
    /// `v' = -v²`, additional force negligible.
    Free,
}

/// Quadratic drag plus a constant additional force `F` along the motion.
///
/// With `b = F / m` the model picks one of three closed forms. When `|b|`
/// is above [`EPSILON`], speeds are scaled by the limit speed
/// `sqrt(|F| / a)` and time by `sqrt(|F| a) / m`, `a = ½ ρ S Cd`. Otherwise
/// the speed stays dimensional and time is scaled by `a / m`.
#[derive(Debug, Clone, Copy, Default)]
pub struct Drag;

impl Drag {
    pub const MASS: usize = 0;
    pub const FLUID_DENSITY: usize = 1;
    pub const REFERENCE_SURFACE: usize = 2;
    pub const DRAG_COEFFICIENT: usize = 3;
    pub const INITIAL_SPEED: usize = 4;
    pub const ADDITIONAL_FORCE: usize = 5;

    const COEFFICIENT_A: usize = 0;
    const COEFFICIENT_B: usize = 1;
    const INITIAL_VARIABLE: usize = 2;

    fn regime(derived: &[f64]) -> DragRegime {
        let b = derived[Self::COEFFICIENT_B];
        if b > EPSILON {
            DragRegime::Propelled
        } else if b < -EPSILON {
            DragRegime::Braked
        } else {
            DragRegime::Free
        }
    }

    fn limit_speed(p: &[f64], derived: &[f64]) -> f64 {
        (p[Self::ADDITIONAL_FORCE].abs() / derived[Self::COEFFICIENT_A]).sqrt()
    }

    /// Ratio between nondimensional and dimensional time.
    fn time_scale(p: &[f64], derived: &[f64]) -> f64 {
        let a = derived[Self::COEFFICIENT_A];
        match Self::regime(derived) {
            DragRegime::Propelled | DragRegime::Braked => {
                (p[Self::ADDITIONAL_FORCE].abs() * a).sqrt() / p[Self::MASS]
            }
            DragRegime::Free => a / p[Self::MASS],
        }
    }
}

impl OdeModel for Drag {
    type Variable = f64;

    fn name(&self) -> &str {
        "drag"
    }

    fn parameter_count(&self) -> usize {
        6
    }

    fn derived_count(&self) -> usize {
        3
    }

    fn capabilities(&self) -> Capabilities {
        Capabilities::DIMENSIONALIZATION
    }

    fn short_description(&self) -> String {
        "Classic drag model with additional force".to_string()
    }

    fn long_description(&self) -> String {
        "Parameter :\n-> Elapsed Time [s]\n\n\
         Parameter Step :\n-> Time Step [s]\n\n\
         Mean Absolute Errors :\n-> Object speed [m/s]"
            .to_string()
    }

    fn range_policy(&self) -> RangePolicy {
        RangePolicy::ZeroOrigin
    }

    fn init_analysis(&self, p: &[f64], derived: &mut [f64]) {
        derived[Self::COEFFICIENT_A] = drag_factor(
            p[Self::FLUID_DENSITY],
            p[Self::REFERENCE_SURFACE],
            p[Self::DRAG_COEFFICIENT],
        );
        derived[Self::COEFFICIENT_B] = p[Self::ADDITIONAL_FORCE] / p[Self::MASS];
        let initial_variable = match Self::regime(derived) {
            DragRegime::Propelled | DragRegime::Braked => {
                p[Self::INITIAL_SPEED] / Self::limit_speed(p, derived)
            }
            DragRegime::Free => p[Self::INITIAL_SPEED],
        };
        derived[Self::INITIAL_VARIABLE] = initial_variable;
    }

    fn initial_variable(&self, _p: &[f64], derived: &[f64]) -> f64 {
        derived[Self::INITIAL_VARIABLE]
    }

    fn derivative(&self, _p: &[f64], derived: &[f64], u: &f64, _tau: f64) -> f64 {
        match Self::regime(derived) {
            DragRegime::Propelled => 1.0 - u * u,
            DragRegime::Braked => -(u * u + 1.0),
            DragRegime::Free => -u * u,
        }
    }

    fn analytical_solution(&self, _p: &[f64], derived: &[f64], tau: f64) -> f64 {
        let u0 = derived[Self::INITIAL_VARIABLE];
        match Self::regime(derived) {
            DragRegime::Propelled => {
                let c = (u0 - 1.0) / (u0 + 1.0) * (-2.0 * tau).exp();
                (1.0 + c) / (1.0 - c)
            }
            DragRegime::Braked => (u0.atan() - tau).tan(),
            DragRegime::Free => 1.0 / (tau + 1.0 / u0),
        }
    }

    fn dimensionalize_variable(&self, p: &[f64], derived: &[f64], u: &f64) -> f64 {
        match Self::regime(derived) {
            DragRegime::Propelled | DragRegime::Braked => u * Self::limit_speed(p, derived),
            DragRegime::Free => *u,
        }
    }

    fn nondimensionalize_parameter(&self, p: &[f64], derived: &[f64], t: f64) -> f64 {
        t * Self::time_scale(p, derived)
    }

    fn dimensionalize_parameter(&self, p: &[f64], derived: &[f64], tau: f64) -> f64 {
        tau / Self::time_scale(p, derived)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct DragParameters {
    pub mass: f64,
    pub fluid_density: f64,
    pub reference_surface: f64,
    pub drag_coefficient: f64,
    pub initial_speed: f64,
    pub additional_force: f64,
}

impl Default for DragParameters {
    fn default() -> Self {
        Self {
            mass: 1.0,
            fluid_density: 1.225,
            reference_surface: 0.1,
            drag_coefficient: 0.47,
            initial_speed: 20.0,
            additional_force: 5.0,
        }
    }
}

impl ModelParameters for DragParameters {
    type Behavior = Drag;

    fn to_vec(&self) -> Vec<f64> {
        vec![
            self.mass,
            self.fluid_density,
            self.reference_surface,
            self.drag_coefficient,
            self.initial_speed,
            self.additional_force,
        ]
    }
}

/// Quadratic drag with a constant braking force `F` that keeps its direction
/// after the object turns around (a vertical throw when `F` is the weight).
///
/// Integrated as `u' = -(1 + u|u|)` with `u = v / sqrt(F / a)` and
/// `τ = sqrt(F a) t / m`. The rising branch is `u = tan(atan(u0) - τ)`. Once
/// the speed crosses zero the pre-step hook restarts the local clock so the
/// falling branch `u = -tanh(τ')` continues from the current speed.
#[derive(Debug, Clone, Copy, Default)]
pub struct BrakedDrag;

impl BrakedDrag {
    pub const MASS: usize = 0;
    pub const FLUID_DENSITY: usize = 1;
    pub const REFERENCE_SURFACE: usize = 2;
    pub const DRAG_COEFFICIENT: usize = 3;
    pub const BRAKING_FORCE: usize = 4;
    pub const INITIAL_SPEED: usize = 5;

    const COEFFICIENT_A: usize = 0;
    const LIMIT_SPEED: usize = 1;
    const TIME_SCALE: usize = 2;
    /// Per-run flag, `1.0` once the object has turned around.
    const TURNED: usize = 3;

    fn turned(derived: &[f64]) -> bool {
        derived[Self::TURNED] > 0.5
    }
}

impl OdeModel for BrakedDrag {
    type Variable = f64;

    fn name(&self) -> &str {
        "braked drag"
    }

    fn parameter_count(&self) -> usize {
        6
    }

    fn derived_count(&self) -> usize {
        4
    }

    fn capabilities(&self) -> Capabilities {
        Capabilities::PRE_STEP | Capabilities::DIMENSIONALIZATION
    }

    fn short_description(&self) -> String {
        "Drag model with a constant braking force".to_string()
    }

    fn long_description(&self) -> String {
        "Parameter :\n-> Elapsed Time [s]\n\n\
         Parameter Step :\n-> Time Step [s]\n\n\
         Variable :\n-> Object speed [m/s], positive along the initial motion"
            .to_string()
    }

    fn range_policy(&self) -> RangePolicy {
        RangePolicy::ZeroOrigin
    }

    fn init_analysis(&self, p: &[f64], derived: &mut [f64]) {
        let a = drag_factor(
            p[Self::FLUID_DENSITY],
            p[Self::REFERENCE_SURFACE],
            p[Self::DRAG_COEFFICIENT],
        );
        let force = p[Self::BRAKING_FORCE];
        derived[Self::COEFFICIENT_A] = a;
        derived[Self::LIMIT_SPEED] = (force / a).sqrt();
        derived[Self::TIME_SCALE] = (force * a).sqrt() / p[Self::MASS];
        derived[Self::TURNED] = 0.0;
    }

    fn initial_variable(&self, p: &[f64], derived: &[f64]) -> f64 {
        p[Self::INITIAL_SPEED] / derived[Self::LIMIT_SPEED]
    }

    fn derivative(&self, _p: &[f64], _derived: &[f64], u: &f64, _tau: f64) -> f64 {
        -(1.0 + u * u.abs())
    }

    fn analytical_solution(&self, p: &[f64], derived: &[f64], tau: f64) -> f64 {
        if Self::turned(derived) {
            -tau.tanh()
        } else {
            (self.initial_variable(p, derived).atan() - tau).tan()
        }
    }

    fn pre_step(&self, _p: &[f64], derived: &mut [f64], u: &mut f64, local: &mut f64) {
        if !Self::turned(derived) && *u <= 0.0 {
            derived[Self::TURNED] = 1.0;
            *local = (-*u).clamp(0.0, 1.0 - EPSILON).atanh();
        }
    }

    fn dimensionalize_variable(&self, _p: &[f64], derived: &[f64], u: &f64) -> f64 {
        u * derived[Self::LIMIT_SPEED]
    }

    fn nondimensionalize_parameter(&self, _p: &[f64], derived: &[f64], t: f64) -> f64 {
        t * derived[Self::TIME_SCALE]
    }

    fn dimensionalize_parameter(&self, _p: &[f64], derived: &[f64], tau: f64) -> f64 {
        tau / derived[Self::TIME_SCALE]
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct BrakedDragParameters {
    pub mass: f64,
    pub fluid_density: f64,
    pub reference_surface: f64,
    pub drag_coefficient: f64,
    pub braking_force: f64,
    pub initial_speed: f64,
}

impl Default for BrakedDragParameters {
    fn default() -> Self {
        Self {
            mass: 1.0,
            fluid_density: 1.225,
            reference_surface: 0.1,
            drag_coefficient: 0.47,
            braking_force: 9.81,
            initial_speed: 20.0,
        }
    }
}

impl ModelParameters for BrakedDragParameters {
    type Behavior = BrakedDrag;

    fn to_vec(&self) -> Vec<f64> {
        vec![
            self.mass,
            self.fluid_density,
            self.reference_surface,
            self.drag_coefficient,
            self.braking_force,
            self.initial_speed,
        ]
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_abs_diff_eq;
    use dexplorer_diffeq::{Model, ModelError};

    fn initialized<M: OdeModel>(model: Result<Model<M>, ModelError>) -> Model<M> {
        let mut model = model.unwrap();
        model.init_analysis();
        model
    }

    #[test]
    fn test_simple_drag_closed_form_solves_ode() {
        let model = initialized(SimpleDragParameters::default().model());
        let (p, d) = (model.parameters(), model.derived());
        let h = 1e-6;
        for tau in [0.0, 0.5, 3.0] {
            let u = SimpleDrag.analytical_solution(p, d, tau);
            let slope = (SimpleDrag.analytical_solution(p, d, tau + h) - u) / h;
            assert_abs_diff_eq!(slope, SimpleDrag.derivative(p, d, &u, tau), epsilon = 1e-5);
        }
    }

    #[test]
    fn test_simple_drag_dimensionalization_round_trip() {
        let model = initialized(SimpleDragParameters::default().model());
        let (p, d) = (model.parameters(), model.derived());
        for t in [0.0, 0.7, 12.0] {
            let tau = SimpleDrag.nondimensionalize_parameter(p, d, t);
            assert_abs_diff_eq!(SimpleDrag.dimensionalize_parameter(p, d, tau), t, epsilon = 1e-12);
        }
        assert_abs_diff_eq!(SimpleDrag.dimensionalize_variable(p, d, &0.5), 10.0);
    }

    #[test]
    fn test_drag_regimes() {
        for (force, start) in [(5.0, 20.0), (-5.0, 20.0), (0.0, 20.0), (5.0, 0.5)] {
            let parameters = DragParameters {
                additional_force: force,
                initial_speed: start,
                ..Default::default()
            };
            let model = initialized(parameters.model());
            let (p, d) = (model.parameters(), model.derived());

            // closed form starts at the initial variable and solves the ode
            let u0 = Drag.initial_variable(p, d);
            assert_abs_diff_eq!(Drag.analytical_solution(p, d, 0.0), u0, epsilon = 1e-12);
            let h = 1e-7;
            let tau = 0.1;
            let u = Drag.analytical_solution(p, d, tau);
            let slope = (Drag.analytical_solution(p, d, tau + h)
                - Drag.analytical_solution(p, d, tau - h))
                / (2.0 * h);
            assert_abs_diff_eq!(slope, Drag.derivative(p, d, &u, tau), epsilon = 1e-4);

            // dimensional initial speed is recovered
            assert_abs_diff_eq!(Drag.dimensionalize_variable(p, d, &u0), start, epsilon = 1e-9);
            let tau = Drag.nondimensionalize_parameter(p, d, 2.5);
            let t = Drag.dimensionalize_parameter(p, d, tau);
            assert_abs_diff_eq!(t, 2.5, epsilon = 1e-12);
        }
    }

    #[test]
    fn test_tiny_force_uses_free_regime() {
        let parameters = DragParameters {
            additional_force: 1e-9,
            ..Default::default()
        };
        let model = initialized(parameters.model());
        assert_eq!(Drag::regime(model.derived()), DragRegime::Free);
        assert_eq!(Drag.initial_variable(model.parameters(), model.derived()), 20.0);
    }

    #[test]
    fn test_braked_drag_turns_around() {
        let model = initialized(BrakedDragParameters::default().model());
        let p = model.parameters();
        let mut d = model.derived().to_vec();
        let u0 = BrakedDrag.initial_variable(p, &d);
        let apex = u0.atan();

        let mut u = BrakedDrag.analytical_solution(p, &d, apex + 0.01);
        assert!(u < 0.0);
        let mut local = apex + 0.01;
        BrakedDrag.pre_step(p, &mut d, &mut u, &mut local);
        assert!(BrakedDrag::turned(&d));
        assert_abs_diff_eq!(BrakedDrag.analytical_solution(p, &d, local), u, epsilon = 1e-12);

        // falling speed tends to the limit speed
        let falling = BrakedDrag.analytical_solution(p, &d, local + 20.0);
        assert_abs_diff_eq!(falling, -1.0, epsilon = 1e-9);
        assert_abs_diff_eq!(BrakedDrag.derivative(p, &d, &-1.0, 0.0), 0.0);
    }
}
