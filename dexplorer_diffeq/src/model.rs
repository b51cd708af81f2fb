use std::{fmt::Debug, sync::Arc};

use bitflags::bitflags;
use log::warn;
use thiserror::Error;

use crate::{simulation::RangePolicy, variable::Variable};

#[derive(Debug, Error, PartialEq)]
pub enum ModelError {
    #[error("model '{model}' expects {expected} parameters, got {got}")]
    ParameterCount {
        model: String,
        expected: usize,
        got: usize,
    },
    #[error("model '{0}' must provide every dimensionalization hook or none of them")]
    PartialDimensionalization(String),
    #[error("parameter index {index} out of range for model '{model}' ({count} parameters)")]
    ParameterIndex {
        model: String,
        index: usize,
        count: usize,
    },
    #[error("model '{0}' changed since its last init_analysis")]
    NotInitialized(String),
}

bitflags! {
    /// Optional behaviors a model implements on top of the required ones.
    #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
    pub struct Capabilities: u8 {
        const PRE_STEP = 1 << 0;
        const POST_STEP = 1 << 1;
        const DIMENSIONALIZE_VARIABLE = 1 << 2;
        const NONDIMENSIONALIZE_PARAMETER = 1 << 3;
        const DIMENSIONALIZE_PARAMETER = 1 << 4;
        const DIMENSIONALIZATION = Self::DIMENSIONALIZE_VARIABLE.bits()
            | Self::NONDIMENSIONALIZE_PARAMETER.bits()
            | Self::DIMENSIONALIZE_PARAMETER.bits();
    }
}

/// Physics of one first order ODE.
///
/// Implementors are stateless: everything a run needs comes from the
/// parameter slice (fixed for the whole analysis) and the derived slice
/// (computed by [`OdeModel::init_analysis`], then private to each run).
///
/// The optional hooks are only called when the matching flag is present in
/// [`OdeModel::capabilities`].
pub trait OdeModel: Debug + Send + Sync {
    type Variable: Variable;

    fn name(&self) -> &str;

    fn parameter_count(&self) -> usize;

    fn derived_count(&self) -> usize {
        0
    }

    fn capabilities(&self) -> Capabilities {
        Capabilities::empty()
    }

    fn short_description(&self) -> String {
        String::new()
    }

    fn long_description(&self) -> String {
        String::new()
    }

    fn range_policy(&self) -> RangePolicy {
        RangePolicy::Free
    }

    /// Fills the derived coefficients from the parameters.
    fn init_analysis(&self, _parameters: &[f64], _derived: &mut [f64]) {}

    fn initial_variable(&self, parameters: &[f64], derived: &[f64]) -> Self::Variable;

    fn derivative(
        &self,
        parameters: &[f64],
        derived: &[f64],
        variable: &Self::Variable,
        parameter: f64,
    ) -> Self::Variable;

    /// Closed-form value, [`Variable::undefined`] when there is none.
    fn analytical_solution(&self, parameters: &[f64], derived: &[f64], parameter: f64)
    -> Self::Variable;

    /// Runs before every step. May move the local parameter origin and
    /// rewrite the current variable.
    fn pre_step(
        &self,
        _parameters: &[f64],
        _derived: &mut [f64],
        _variable: &mut Self::Variable,
        _local_parameter: &mut f64,
    ) {
    }

    /// Runs after every step. May rewrite the integrated value in place and
    /// returns the value exported to the trajectory.
    fn post_step(
        &self,
        _parameters: &[f64],
        _derived: &mut [f64],
        next: &mut Self::Variable,
    ) -> Self::Variable {
        *next
    }

    fn dimensionalize_variable(
        &self,
        _parameters: &[f64],
        _derived: &[f64],
        variable: &Self::Variable,
    ) -> Self::Variable {
        *variable
    }

    fn nondimensionalize_parameter(
        &self,
        _parameters: &[f64],
        _derived: &[f64],
        parameter: f64,
    ) -> f64 {
        parameter
    }

    fn dimensionalize_parameter(
        &self,
        _parameters: &[f64],
        _derived: &[f64],
        parameter: f64,
    ) -> f64 {
        parameter
    }
}

/// A validated model behavior together with its parameter values and
/// derived coefficients.
#[derive(Debug)]
pub struct Model<M: OdeModel> {
    behavior: Arc<M>,
    parameters: Vec<f64>,
    derived: Vec<f64>,
    initialized: bool,
}

impl<M: OdeModel> Clone for Model<M> {
    fn clone(&self) -> Self {
        Self {
            behavior: Arc::clone(&self.behavior),
            parameters: self.parameters.clone(),
            derived: self.derived.clone(),
            initialized: self.initialized,
        }
    }
}

impl<M: OdeModel> Model<M> {
    /// Validates the parameter count and the dimensionalization triple.
    pub fn new(behavior: M, parameters: Vec<f64>) -> Result<Self, ModelError> {
        let expected = behavior.parameter_count();
        if parameters.len() != expected {
            return Err(ModelError::ParameterCount {
                model: behavior.name().to_string(),
                expected,
                got: parameters.len(),
            });
        }

        let dimensionalization = behavior.capabilities() & Capabilities::DIMENSIONALIZATION;
        if !dimensionalization.is_empty()
            && dimensionalization != Capabilities::DIMENSIONALIZATION
        {
            warn!(
                "model '{}' declares an incomplete dimensionalization set {:?}",
                behavior.name(),
                dimensionalization
            );
            return Err(ModelError::PartialDimensionalization(behavior.name().to_string()));
        }

        let derived = vec![0.0; behavior.derived_count()];
        Ok(Self {
            behavior: Arc::new(behavior),
            parameters,
            derived,
            initialized: false,
        })
    }

    pub fn behavior(&self) -> &M {
        &self.behavior
    }

    pub fn name(&self) -> &str {
        self.behavior.name()
    }

    pub fn parameters(&self) -> &[f64] {
        &self.parameters
    }

    pub fn derived(&self) -> &[f64] {
        &self.derived
    }

    pub fn parameter(&self, index: usize) -> Result<f64, ModelError> {
        self.parameters
            .get(index)
            .copied()
            .ok_or_else(|| self.index_error(index))
    }

    /// Changes one parameter. The derived coefficients become stale until the
    /// next [`Model::init_analysis`].
    pub fn set_parameter(&mut self, index: usize, value: f64) -> Result<(), ModelError> {
        if index >= self.parameters.len() {
            return Err(self.index_error(index));
        }
        self.parameters[index] = value;
        self.initialized = false;
        Ok(())
    }

    pub fn init_analysis(&mut self) {
        self.derived.iter_mut().for_each(|d| *d = 0.0);
        self.behavior.init_analysis(&self.parameters, &mut self.derived);
        self.initialized = true;
    }

    pub fn is_initialized(&self) -> bool {
        self.initialized
    }

    pub fn ensure_initialized(&self) -> Result<(), ModelError> {
        if self.initialized {
            Ok(())
        } else {
            Err(ModelError::NotInitialized(self.name().to_string()))
        }
    }

    pub fn capabilities(&self) -> Capabilities {
        self.behavior.capabilities()
    }

    pub fn supports_dimensionalization(&self) -> bool {
        self.capabilities().contains(Capabilities::DIMENSIONALIZATION)
    }

    pub fn range_policy(&self) -> RangePolicy {
        self.behavior.range_policy()
    }

    fn index_error(&self, index: usize) -> ModelError {
        ModelError::ParameterIndex {
            model: self.name().to_string(),
            index,
            count: self.parameters.len(),
        }
    }
}
