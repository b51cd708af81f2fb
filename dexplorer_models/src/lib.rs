//! Physical models explored by the analyser.
//!
//! Each model is a stateless [`OdeModel`] behavior paired with a named,
//! serde-friendly parameter struct. [`ModelConfig`] lists them all so a
//! configuration file can pick one by name.

use compression::{
    CrankshaftCompression, CrankshaftCompressionParameters, SimpleCompression,
    SimpleCompressionParameters,
};
use dexplorer_diffeq::{Model, ModelError, OdeModel};
use drag::{
    BrakedDrag, BrakedDragParameters, Drag, DragParameters, SimpleDrag, SimpleDragParameters,
};
use friction::{ViscousFriction, ViscousFrictionParameters};
use serde::{Deserialize, Serialize};
use spring::{Spring, SpringParameters};

pub mod compression;
pub mod drag;
pub mod friction;
pub mod spring;

/// Named parameter values that build a validated [`Model`].
pub trait ModelParameters {
    type Behavior: OdeModel + Default;

    /// Parameter values in the order the behavior indexes them.
    fn to_vec(&self) -> Vec<f64>;

    fn model(&self) -> Result<Model<Self::Behavior>, ModelError> {
        Model::new(Self::Behavior::default(), self.to_vec())
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub enum ModelConfig {
    SimpleDrag(SimpleDragParameters),
    Drag(DragParameters),
    BrakedDrag(BrakedDragParameters),
    Spring(SpringParameters),
    ViscousFriction(ViscousFrictionParameters),
    SimpleCompression(SimpleCompressionParameters),
    CrankshaftCompression(CrankshaftCompressionParameters),
}

impl ModelConfig {
    /// Every model with its default parameters.
    pub fn all() -> Vec<Self> {
        vec![
            Self::SimpleDrag(SimpleDragParameters::default()),
            Self::Drag(DragParameters::default()),
            Self::BrakedDrag(BrakedDragParameters::default()),
            Self::Spring(SpringParameters::default()),
            Self::ViscousFriction(ViscousFrictionParameters::default()),
            Self::SimpleCompression(SimpleCompressionParameters::default()),
            Self::CrankshaftCompression(CrankshaftCompressionParameters::default()),
        ]
    }

    /// Name of the configuration variant, as written in a config file.
    pub fn variant(&self) -> &'static str {
        match self {
            Self::SimpleDrag(_) => "SimpleDrag",
            Self::Drag(_) => "Drag",
            Self::BrakedDrag(_) => "BrakedDrag",
            Self::Spring(_) => "Spring",
            Self::ViscousFriction(_) => "ViscousFriction",
            Self::SimpleCompression(_) => "SimpleCompression",
            Self::CrankshaftCompression(_) => "CrankshaftCompression",
        }
    }

    pub fn name(&self) -> String {
        match self {
            Self::SimpleDrag(_) => SimpleDrag.name().to_string(),
            Self::Drag(_) => Drag.name().to_string(),
            Self::BrakedDrag(_) => BrakedDrag.name().to_string(),
            Self::Spring(_) => Spring.name().to_string(),
            Self::ViscousFriction(_) => ViscousFriction.name().to_string(),
            Self::SimpleCompression(_) => SimpleCompression.name().to_string(),
            Self::CrankshaftCompression(_) => CrankshaftCompression.name().to_string(),
        }
    }

    pub fn short_description(&self) -> String {
        match self {
            Self::SimpleDrag(_) => SimpleDrag.short_description(),
            Self::Drag(_) => Drag.short_description(),
            Self::BrakedDrag(_) => BrakedDrag.short_description(),
            Self::Spring(_) => Spring.short_description(),
            Self::ViscousFriction(_) => ViscousFriction.short_description(),
            Self::SimpleCompression(_) => SimpleCompression.short_description(),
            Self::CrankshaftCompression(_) => CrankshaftCompression.short_description(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_every_default_builds() {
        for config in ModelConfig::all() {
            let built = match &config {
                ModelConfig::SimpleDrag(p) => p.model().map(|_| ()),
                ModelConfig::Drag(p) => p.model().map(|_| ()),
                ModelConfig::BrakedDrag(p) => p.model().map(|_| ()),
                ModelConfig::Spring(p) => p.model().map(|_| ()),
                ModelConfig::ViscousFriction(p) => p.model().map(|_| ()),
                ModelConfig::SimpleCompression(p) => p.model().map(|_| ()),
                ModelConfig::CrankshaftCompression(p) => p.model().map(|_| ()),
            };
            assert!(built.is_ok(), "{} failed to build", config.variant());
            assert!(!config.short_description().is_empty());
        }
    }
}
