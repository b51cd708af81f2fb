//! Error analysis of numerical solving types against analytical solutions.
//!
//! An [`Analyser`] runs every (parameter step, solving type) configuration
//! of a request concurrently, compares each trajectory with the analytical
//! trajectory of the same parameter step and collects the mean absolute
//! errors into a [`Report`].

pub mod aggregation;
pub mod analyser;
pub mod playback;
pub mod progress;
pub mod report;

pub use aggregation::{MeanAbsoluteError, mean_absolute_error};
pub use analyser::{Analyser, AnalysisError, AnalysisHandle, AnalysisRequest};
pub use playback::Playback;
pub use progress::{AnalysisProgress, AnalysisStatus};
pub use report::{AnalysisValue, Report, ReportError, SimulationSample};
