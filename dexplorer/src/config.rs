use std::{fs::File, path::Path};

use anyhow::{Context, Result};
use dexplorer_analysis::AnalysisRequest;
use dexplorer_diffeq::{ParameterRange, SolvingType};
use dexplorer_models::ModelConfig;
use serde::{Deserialize, Serialize};

/// One analysis as written in a `.ron` file.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AnalysisConfig {
    pub name: String,
    pub model: ModelConfig,
    #[serde(default)]
    pub min: f64,
    pub max: f64,
    pub parameter_steps: Vec<f64>,
    pub solving_types: Vec<SolvingType>,
    #[serde(default)]
    pub full_report: bool,
    #[serde(default)]
    pub nondimensionalized: bool,
}

impl AnalysisConfig {
    pub fn from_path(path: &Path) -> Result<Self> {
        let file = File::open(path).with_context(|| format!("could not open {}", path.display()))?;
        let config = ron::de::from_reader(file)
            .with_context(|| format!("could not parse {}", path.display()))?;
        Ok(config)
    }

    pub fn request(&self) -> Result<AnalysisRequest> {
        let range = ParameterRange::new(self.min, self.max)?;
        Ok(AnalysisRequest::new(self.name.clone(), range)
            .with_parameter_steps(self.parameter_steps.iter().copied())
            .with_solving_types(self.solving_types.iter().copied())
            .with_full_report(self.full_report)
            .with_nondimensionalized(self.nondimensionalized))
    }
}
