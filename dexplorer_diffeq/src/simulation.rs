use std::sync::Arc;

use log::debug;
use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::{
    model::{Capabilities, Model, ModelError, OdeModel},
    solving::SolvingType,
    stepper,
    trajectory::Trajectory,
};

#[derive(Debug, Error, PartialEq)]
pub enum SimulationError {
    #[error("parameter step must be positive and finite, got {0}")]
    InvalidStep(f64),
    #[error("invalid parameter range [{min}, {max}]")]
    InvalidRange { min: f64, max: f64 },
    #[error("parameter step {step} needs {count} samples, at most {max} are allowed")]
    TooManySamples { step: f64, count: f64, max: usize },
    #[error("model '{0}' does not support nondimensionalized simulation")]
    DimensionalizationUnsupported(String),
    #[error(transparent)]
    Model(#[from] ModelError),
}

/// Upper bound on the samples of one run, each run preallocates its buffer.
pub const MAX_ITERATIONS: usize = 1 << 26;

/// Constraint a model puts on the parameter range it is simulated over.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum RangePolicy {
    Free,
    /// Time-like parameter starting at zero.
    ZeroOrigin,
}

/// Closed interval `[min, max]` of the integration parameter.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct ParameterRange {
    min: f64,
    max: f64,
}

impl ParameterRange {
    pub fn new(min: f64, max: f64) -> Result<Self, SimulationError> {
        if !min.is_finite() || !max.is_finite() || min > max {
            return Err(SimulationError::InvalidRange { min, max });
        }
        Ok(Self { min, max })
    }

    pub fn min(&self) -> f64 {
        self.min
    }

    pub fn max(&self) -> f64 {
        self.max
    }

    /// Sets the lower bound, clamped to stay at or below `max`.
    pub fn set_min(&mut self, min: f64) {
        self.min = min.min(self.max);
    }

    /// Sets the upper bound, clamped to stay at or above `min`.
    pub fn set_max(&mut self, max: f64) {
        self.max = max.max(self.min);
    }

    pub fn constrained(mut self, policy: RangePolicy) -> Self {
        if policy == RangePolicy::ZeroOrigin {
            self.min = 0.0;
            self.max = self.max.max(0.0);
        }
        self
    }

    /// Number of evenly spaced samples, `floor((max - min) / step) + 1`.
    ///
    /// # Errors
    ///
    /// [`SimulationError::TooManySamples`] above [`MAX_ITERATIONS`].
    pub fn iteration_count(&self, step: f64) -> Result<usize, SimulationError> {
        let count = ((self.max - self.min) / step).floor() + 1.0;
        if !count.is_finite() || count > MAX_ITERATIONS as f64 {
            return Err(SimulationError::TooManySamples {
                step,
                count,
                max: MAX_ITERATIONS,
            });
        }
        Ok(count as usize)
    }

    /// Last sampled parameter, `min + (count - 1) * step`.
    pub fn realized_max(&self, step: f64) -> Result<f64, SimulationError> {
        Ok(self.min + (self.iteration_count(step)? - 1) as f64 * step)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct SimulationConfig {
    pub solving_type: SolvingType,
    pub parameter_step: f64,
    pub range: ParameterRange,
    /// Integrate in the model's nondimensional form and convert samples back.
    pub nondimensionalized: bool,
}

/// One fully validated configuration ready to produce a trajectory.
#[derive(Debug)]
pub struct Simulation<M: OdeModel> {
    model: Arc<Model<M>>,
    config: SimulationConfig,
    iteration_count: usize,
}

impl<M: OdeModel> Simulation<M> {
    pub fn new(model: Arc<Model<M>>, config: SimulationConfig) -> Result<Self, SimulationError> {
        let step = config.parameter_step;
        if !step.is_finite() || step <= 0.0 {
            return Err(SimulationError::InvalidStep(step));
        }
        // re-check in case the range was built by deserialization
        let range = ParameterRange::new(config.range.min(), config.range.max())?;
        model.ensure_initialized()?;
        if config.nondimensionalized && !model.supports_dimensionalization() {
            return Err(SimulationError::DimensionalizationUnsupported(
                model.name().to_string(),
            ));
        }

        Ok(Self {
            iteration_count: range.iteration_count(step)?,
            model,
            config,
        })
    }

    pub fn config(&self) -> &SimulationConfig {
        &self.config
    }

    pub fn solving_type(&self) -> SolvingType {
        self.config.solving_type
    }

    pub fn iteration_count(&self) -> usize {
        self.iteration_count
    }

    /// Integrates the configuration from `min` and returns every sample.
    ///
    /// Each call works on its own copy of the derived coefficients, so
    /// concurrent runs over the same model never observe each other's
    /// hook state.
    pub fn run(&self) -> Trajectory<M::Variable> {
        let behavior = self.model.behavior();
        let parameters = self.model.parameters();
        let capabilities = behavior.capabilities();
        let mut derived = self.model.derived().to_vec();

        let min = self.config.range.min();
        let (start, h) = if self.config.nondimensionalized {
            let start = behavior.nondimensionalize_parameter(parameters, &derived, min);
            let end = behavior.nondimensionalize_parameter(
                parameters,
                &derived,
                min + self.config.parameter_step,
            );
            (start, end - start)
        } else {
            (min, self.config.parameter_step)
        };

        let mut trajectory = Trajectory::with_capacity(self.iteration_count);
        let mut current = behavior.initial_variable(parameters, &derived);
        let (parameter, variable) = self.export(&derived, start, &current);
        trajectory.push(parameter, variable);

        // the global parameter only indexes samples; the local one is what
        // the model sees and may be reset by the pre-step hook
        let mut local = start;
        for index in 1..self.iteration_count {
            if capabilities.contains(Capabilities::PRE_STEP) {
                behavior.pre_step(parameters, &mut derived, &mut current, &mut local);
            }

            let mut next = {
                let derived: &[f64] = &derived;
                stepper::step(
                    self.config.solving_type,
                    |x, t| behavior.derivative(parameters, derived, x, t),
                    |t| behavior.analytical_solution(parameters, derived, t),
                    &current,
                    local,
                    h,
                )
            };

            let exported = if capabilities.contains(Capabilities::POST_STEP) {
                behavior.post_step(parameters, &mut derived, &mut next)
            } else {
                next
            };

            local += h;
            let global = start + index as f64 * h;
            let (parameter, variable) = self.export(&derived, global, &exported);
            trajectory.push(parameter, variable);

            current = next;
        }

        debug!(
            "{} {} h={} finished with {} samples",
            self.model.name(),
            self.config.solving_type,
            self.config.parameter_step,
            trajectory.len()
        );
        trajectory
    }

    fn export(
        &self,
        derived: &[f64],
        parameter: f64,
        variable: &M::Variable,
    ) -> (f64, M::Variable) {
        if self.config.nondimensionalized {
            let behavior = self.model.behavior();
            let parameters = self.model.parameters();
            (
                behavior.dimensionalize_parameter(parameters, derived, parameter),
                behavior.dimensionalize_variable(parameters, derived, variable),
            )
        } else {
            (parameter, *variable)
        }
    }
}
