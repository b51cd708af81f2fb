use std::collections::BTreeMap;

use chrono::{DateTime, Utc};
use dexplorer_diffeq::{SolvingType, Trajectory, Variable};
use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::aggregation::MeanAbsoluteError;

#[derive(Debug, Error, PartialEq)]
pub enum ReportError {
    #[error("report has no values for {0}")]
    UnknownSolvingType(SolvingType),
    #[error("parameter step index {index} out of range for {solving_type} ({count} steps)")]
    StepIndex {
        solving_type: SolvingType,
        index: usize,
        count: usize,
    },
    #[error("report does not retain trajectories")]
    NotFullReport,
}

/// Aggregated result of one (parameter step, solving type) configuration.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AnalysisValue<V> {
    pub parameter_step: f64,
    pub mean_absolute_error: MeanAbsoluteError<V>,
    /// Only kept for full reports.
    pub trajectory: Option<Trajectory<V>>,
}

/// One sample read back from a full report.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct SimulationSample<V> {
    pub parameter_step: f64,
    pub parameter: f64,
    pub variable: V,
}

/// Outcome of one analysis session.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Report<V> {
    name: String,
    short_description: String,
    long_description: String,
    created_at: DateTime<Utc>,
    min_parameter: f64,
    max_parameter: f64,
    full_report: bool,
    values: BTreeMap<SolvingType, Vec<AnalysisValue<V>>>,
}

impl<V: Variable> Report<V> {
    pub fn new(
        name: impl Into<String>,
        short_description: impl Into<String>,
        long_description: impl Into<String>,
        min_parameter: f64,
        max_parameter: f64,
        full_report: bool,
    ) -> Self {
        Self {
            name: name.into(),
            short_description: short_description.into(),
            long_description: long_description.into(),
            created_at: Utc::now(),
            min_parameter,
            max_parameter,
            full_report,
            values: BTreeMap::new(),
        }
    }

    /// Adds a value, keeping each solving type's values sorted by parameter
    /// step. Trajectories are dropped unless this is a full report.
    pub fn add_value(&mut self, solving_type: SolvingType, mut value: AnalysisValue<V>) {
        if !self.full_report {
            value.trajectory = None;
        }
        let values = self.values.entry(solving_type).or_default();
        let position = values.partition_point(|v| v.parameter_step < value.parameter_step);
        values.insert(position, value);
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn short_description(&self) -> &str {
        &self.short_description
    }

    pub fn long_description(&self) -> &str {
        &self.long_description
    }

    pub fn created_at(&self) -> DateTime<Utc> {
        self.created_at
    }

    pub fn min_parameter(&self) -> f64 {
        self.min_parameter
    }

    pub fn max_parameter(&self) -> f64 {
        self.max_parameter
    }

    pub fn is_full_report(&self) -> bool {
        self.full_report
    }

    pub fn solving_types(&self) -> impl Iterator<Item = SolvingType> + '_ {
        self.values.keys().copied()
    }

    /// Number of values across all solving types.
    pub fn len(&self) -> usize {
        self.values.values().map(Vec::len).sum()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Values of one solving type in ascending parameter step order.
    pub fn analysis_values(
        &self,
        solving_type: SolvingType,
    ) -> Result<&[AnalysisValue<V>], ReportError> {
        self.values
            .get(&solving_type)
            .map(Vec::as_slice)
            .ok_or(ReportError::UnknownSolvingType(solving_type))
    }

    pub fn analysis_value(
        &self,
        solving_type: SolvingType,
        step_index: usize,
    ) -> Result<&AnalysisValue<V>, ReportError> {
        let values = self.analysis_values(solving_type)?;
        values.get(step_index).ok_or(ReportError::StepIndex {
            solving_type,
            index: step_index,
            count: values.len(),
        })
    }

    /// `(parameter step, mae)` pairs of one solving type.
    pub fn mean_absolute_errors(
        &self,
        solving_type: SolvingType,
    ) -> Result<Vec<(f64, MeanAbsoluteError<V>)>, ReportError> {
        Ok(self
            .analysis_values(solving_type)?
            .iter()
            .map(|v| (v.parameter_step, v.mean_absolute_error))
            .collect())
    }

    /// Retained trajectory of one configuration.
    pub fn trajectory(
        &self,
        solving_type: SolvingType,
        step_index: usize,
    ) -> Result<&Trajectory<V>, ReportError> {
        self.analysis_value(solving_type, step_index)?
            .trajectory
            .as_ref()
            .ok_or(ReportError::NotFullReport)
    }

    /// Every `(parameter, variable)` sample of one configuration, empty when
    /// the report is not full.
    pub fn simulation_values(
        &self,
        solving_type: SolvingType,
        step_index: usize,
    ) -> Result<Vec<(f64, V)>, ReportError> {
        let value = self.analysis_value(solving_type, step_index)?;
        Ok(value
            .trajectory
            .as_ref()
            .map(|t| t.iter().collect())
            .unwrap_or_default())
    }

    /// One sample, `None` past the end or when trajectories were not kept.
    pub fn simulation_value(
        &self,
        solving_type: SolvingType,
        step_index: usize,
        sample_index: usize,
    ) -> Option<SimulationSample<V>> {
        let value = self.analysis_value(solving_type, step_index).ok()?;
        let (parameter, variable) = value.trajectory.as_ref()?.get(sample_index)?;
        Some(SimulationSample {
            parameter_step: value.parameter_step,
            parameter,
            variable,
        })
    }
}
