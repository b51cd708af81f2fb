use std::{
    any::Any,
    collections::BTreeSet,
    sync::{Arc, OnceLock},
    thread::{self, JoinHandle},
};

use dexplorer_diffeq::{
    Model, OdeModel, ParameterRange, Simulation, SimulationConfig, SimulationError, SolvingType,
    Trajectory,
};
use flume::Receiver;
use log::{debug, info, warn};
use rayon::{ThreadPool, ThreadPoolBuildError, ThreadPoolBuilder, prelude::*};
use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::{
    aggregation::mean_absolute_error,
    progress::{AnalysisProgress, AnalysisStatus, ProgressReporter, ProgressTracker},
    report::{AnalysisValue, Report},
};

/// Progress events buffered for a consumer that polls slower than tasks finish.
const PROGRESS_CAPACITY: usize = 64;

#[derive(Debug, Error)]
pub enum AnalysisError {
    #[error("an analysis is already running on this analyser")]
    AlreadyRunning,
    #[error("parameter step must be positive and finite, got {0}")]
    InvalidStep(f64),
    #[error(transparent)]
    Simulation(#[from] SimulationError),
    #[error("analysis task panicked: {0}")]
    TaskPanicked(String),
    #[error("failed to spawn the analysis thread: {0}")]
    Spawn(#[from] std::io::Error),
    #[error("failed to build the analysis thread pool: {0}")]
    ThreadPool(#[from] ThreadPoolBuildError),
}

/// What to analyse: a sweep of parameter steps times a set of solving types
/// over one parameter range.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AnalysisRequest {
    pub name: String,
    pub parameter_steps: Vec<f64>,
    pub solving_types: BTreeSet<SolvingType>,
    pub range: ParameterRange,
    #[serde(default)]
    pub full_report: bool,
    #[serde(default)]
    pub nondimensionalized: bool,
}

impl AnalysisRequest {
    pub fn new(name: impl Into<String>, range: ParameterRange) -> Self {
        Self {
            name: name.into(),
            parameter_steps: Vec::new(),
            solving_types: BTreeSet::new(),
            range,
            full_report: false,
            nondimensionalized: false,
        }
    }

    pub fn with_parameter_steps(mut self, steps: impl IntoIterator<Item = f64>) -> Self {
        self.parameter_steps.extend(steps);
        self
    }

    pub fn with_solving_types(
        mut self,
        solving_types: impl IntoIterator<Item = SolvingType>,
    ) -> Self {
        self.solving_types.extend(solving_types);
        self
    }

    pub fn with_full_report(mut self, full_report: bool) -> Self {
        self.full_report = full_report;
        self
    }

    pub fn with_nondimensionalized(mut self, nondimensionalized: bool) -> Self {
        self.nondimensionalized = nondimensionalized;
        self
    }

    /// Ascending, deduplicated parameter steps.
    pub fn distinct_parameter_steps(&self) -> Vec<f64> {
        let mut steps = self.parameter_steps.clone();
        steps.sort_by(f64::total_cmp);
        steps.dedup();
        steps
    }
}

/// All runs of one parameter step. Every requested solving type is compared
/// against the single analytical run of the step.
struct StepPlan<M: OdeModel> {
    parameter_step: f64,
    analytical: Simulation<M>,
    requested: Vec<Simulation<M>>,
}

impl<M: OdeModel> StepPlan<M> {
    /// Trajectories are dropped right after their error is computed unless
    /// `full_report` asks to keep them.
    fn execute(
        &self,
        full_report: bool,
        progress: &ProgressReporter<'_>,
    ) -> Vec<(SolvingType, AnalysisValue<M::Variable>)> {
        let reference: OnceLock<Trajectory<M::Variable>> = OnceLock::new();
        let reference_run = || reference.get_or_init(|| self.analytical.run());

        self.requested
            .par_iter()
            .map(|simulation| {
                let solving_type = simulation.solving_type();
                let (own, exact) = rayon::join(
                    || simulation.solving_type().is_numerical().then(|| simulation.run()),
                    reference_run,
                );
                let own = own.unwrap_or_else(|| exact.clone());
                let value = AnalysisValue {
                    parameter_step: self.parameter_step,
                    mean_absolute_error: mean_absolute_error(exact, &own),
                    trajectory: full_report.then_some(own),
                };
                debug!(
                    "{} h={} analysed ({} samples)",
                    solving_type,
                    self.parameter_step,
                    exact.len()
                );
                progress.task_completed();
                (solving_type, value)
            })
            .collect()
    }
}

/// Everything the background thread needs to produce a report.
struct Session<M: OdeModel> {
    request: AnalysisRequest,
    range: ParameterRange,
    model: Arc<Model<M>>,
    plans: Vec<StepPlan<M>>,
    tracker: Arc<ProgressTracker>,
    pool: Arc<ThreadPool>,
}

/// Resets the analyser to `Idle` when the session thread unwinds.
struct SessionGuard(Arc<ProgressTracker>);

impl Drop for SessionGuard {
    fn drop(&mut self) {
        if thread::panicking() {
            self.0.set_status(AnalysisStatus::Idle);
        }
    }
}

impl<M: OdeModel + 'static> Session<M> {
    fn run(self, sender: flume::Sender<AnalysisProgress>) -> Report<M::Variable> {
        let _guard = SessionGuard(Arc::clone(&self.tracker));
        let progress = ProgressReporter::new(&self.tracker, sender);

        let behavior = self.model.behavior();
        let mut report = Report::new(
            self.request.name.clone(),
            behavior.short_description(),
            behavior.long_description(),
            self.range.min(),
            self.range.max(),
            self.request.full_report,
        );

        if self.plans.iter().all(|plan| plan.requested.is_empty()) {
            progress.enter(AnalysisStatus::Done);
            info!("analysis '{}' had nothing to run", report.name());
            return report;
        }
        progress.publish();

        let full_report = self.request.full_report;
        let values: Vec<_> = self.pool.install(|| {
            self.plans
                .par_iter()
                .map(|plan| plan.execute(full_report, &progress))
                .collect()
        });

        progress.enter(AnalysisStatus::Collecting);
        for (solving_type, value) in values.into_iter().flatten() {
            report.add_value(solving_type, value);
        }
        progress.enter(AnalysisStatus::Done);

        info!(
            "analysis '{}' of {} finished with {} values",
            report.name(),
            self.model.name(),
            report.len()
        );
        report
    }
}

/// Handle on a running analysis session.
#[derive(Debug)]
pub struct AnalysisHandle<V> {
    thread: JoinHandle<Report<V>>,
    progress: Receiver<AnalysisProgress>,
}

impl<V> AnalysisHandle<V> {
    /// Progress events in emission order. Events may be dropped when nobody
    /// reads them; the last one of a successful session has ratio `1.0`.
    pub fn progress(&self) -> &Receiver<AnalysisProgress> {
        &self.progress
    }

    pub fn is_finished(&self) -> bool {
        self.thread.is_finished()
    }

    /// Blocks until the report is ready.
    pub fn wait(self) -> Result<Report<V>, AnalysisError> {
        self.thread
            .join()
            .map_err(|payload| AnalysisError::TaskPanicked(panic_message(payload.as_ref())))
    }
}

fn panic_message(payload: &(dyn Any + Send)) -> String {
    if let Some(message) = payload.downcast_ref::<&str>() {
        message.to_string()
    } else if let Some(message) = payload.downcast_ref::<String>() {
        message.clone()
    } else {
        "unknown panic".to_string()
    }
}

/// Runs parameter-step by solving-type sweeps of one model and reports the
/// mean absolute error of each configuration against the analytical solution.
#[derive(Debug)]
///
/// Every analyser owns its worker pool, built on the first session, so a
/// caller blocked in [`AnalysisHandle::wait`] never holds a thread the
/// session needs.
pub struct Analyser<M: OdeModel> {
    model: Model<M>,
    tracker: Arc<ProgressTracker>,
    num_threads: usize,
    pool: OnceLock<Arc<ThreadPool>>,
}

impl<M: OdeModel + 'static> Analyser<M> {
    pub fn new(model: Model<M>) -> Self {
        Self {
            model,
            tracker: Arc::new(ProgressTracker::default()),
            num_threads: 0,
            pool: OnceLock::new(),
        }
    }

    /// Worker count of the pool, `0` lets rayon pick one per core. Only
    /// effective before the first session.
    pub fn with_num_threads(mut self, num_threads: usize) -> Self {
        self.num_threads = num_threads;
        self
    }

    pub fn model(&self) -> &Model<M> {
        &self.model
    }

    /// Parameter edits only affect sessions started afterwards.
    pub fn model_mut(&mut self) -> &mut Model<M> {
        &mut self.model
    }

    pub fn status(&self) -> AnalysisStatus {
        self.tracker.status()
    }

    /// Latest progress, for callers polling at their own cadence.
    pub fn progress(&self) -> AnalysisProgress {
        self.tracker.snapshot()
    }

    /// Validates the request, schedules every run on a background thread and
    /// returns immediately.
    ///
    /// # Errors
    ///
    /// Configuration errors are reported before anything is scheduled.
    /// [`AnalysisError::AlreadyRunning`] leaves the active session untouched.
    pub fn start(
        &self,
        request: AnalysisRequest,
    ) -> Result<AnalysisHandle<M::Variable>, AnalysisError> {
        if self.status().is_active() {
            warn!("analysis '{}' rejected: a session is already running", request.name);
            return Err(AnalysisError::AlreadyRunning);
        }
        let session = self.prepare(request)?;
        let total: usize = session.plans.iter().map(|p| p.requested.len()).sum();

        if !self.tracker.begin(total) {
            warn!("analysis '{}' rejected: a session is already running", session.request.name);
            return Err(AnalysisError::AlreadyRunning);
        }

        info!(
            "analysis '{}' of {} started: {} parameter steps, {} configurations",
            session.request.name,
            self.model.name(),
            session.plans.len(),
            total
        );

        let (sender, receiver) = flume::bounded(PROGRESS_CAPACITY);
        let spawned = thread::Builder::new()
            .name(format!("analysis-{}", session.request.name))
            .spawn(move || session.run(sender));

        match spawned {
            Ok(thread) => Ok(AnalysisHandle {
                thread,
                progress: receiver,
            }),
            Err(e) => {
                self.tracker.set_status(AnalysisStatus::Idle);
                Err(AnalysisError::Spawn(e))
            }
        }
    }

    /// Runs an analysis to completion on the calling thread's behalf.
    pub fn analyse(&self, request: AnalysisRequest) -> Result<Report<M::Variable>, AnalysisError> {
        self.start(request)?.wait()
    }

    fn prepare(&self, request: AnalysisRequest) -> Result<Session<M>, AnalysisError> {
        let steps = request.distinct_parameter_steps();
        if let Some(step) = steps.iter().find(|s| !s.is_finite() || **s <= 0.0) {
            return Err(AnalysisError::InvalidStep(*step));
        }

        let range = request.range.constrained(self.model.range_policy());

        // every session gets its own coefficients
        let mut model = self.model.clone();
        model.init_analysis();
        let model = Arc::new(model);

        let simulation = |solving_type: SolvingType, parameter_step: f64| {
            Simulation::new(
                Arc::clone(&model),
                SimulationConfig {
                    solving_type,
                    parameter_step,
                    range,
                    nondimensionalized: request.nondimensionalized,
                },
            )
        };

        let mut plans = Vec::with_capacity(steps.len());
        for parameter_step in steps {
            let requested = request
                .solving_types
                .iter()
                .map(|solving_type| simulation(*solving_type, parameter_step))
                .collect::<Result<Vec<_>, _>>()?;
            plans.push(StepPlan {
                parameter_step,
                analytical: simulation(SolvingType::Analytical, parameter_step)?,
                requested,
            });
        }

        Ok(Session {
            request,
            range,
            model,
            plans,
            tracker: Arc::clone(&self.tracker),
            pool: self.pool()?,
        })
    }

    fn pool(&self) -> Result<Arc<ThreadPool>, AnalysisError> {
        if let Some(pool) = self.pool.get() {
            return Ok(Arc::clone(pool));
        }
        let pool = ThreadPoolBuilder::new()
            .num_threads(self.num_threads)
            .thread_name(|i| format!("analysis-worker-{i}"))
            .build()?;
        Ok(Arc::clone(self.pool.get_or_init(|| Arc::new(pool))))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::aggregation::MeanAbsoluteError;
    use approx::assert_abs_diff_eq;
    use dexplorer_diffeq::RangePolicy;
    use std::sync::{Barrier, Mutex};

    /// `x' = -x`, `x(0) = 1`.
    #[derive(Debug)]
    struct Decay;

    impl OdeModel for Decay {
        type Variable = f64;

        fn name(&self) -> &str {
            "decay"
        }

        fn parameter_count(&self) -> usize {
            0
        }

        fn short_description(&self) -> String {
            "exponential decay".to_string()
        }

        fn range_policy(&self) -> RangePolicy {
            RangePolicy::ZeroOrigin
        }

        fn initial_variable(&self, _p: &[f64], _d: &[f64]) -> f64 {
            1.0
        }

        fn derivative(&self, _p: &[f64], _d: &[f64], x: &f64, _t: f64) -> f64 {
            -x
        }

        fn analytical_solution(&self, _p: &[f64], _d: &[f64], t: f64) -> f64 {
            (-t).exp()
        }
    }

    /// Blocks its first derivative evaluation until released.
    #[derive(Debug)]
    struct Gate {
        barrier: Arc<Barrier>,
        released: Mutex<bool>,
    }

    impl OdeModel for Gate {
        type Variable = f64;

        fn name(&self) -> &str {
            "gate"
        }

        fn parameter_count(&self) -> usize {
            0
        }

        fn initial_variable(&self, _p: &[f64], _d: &[f64]) -> f64 {
            0.0
        }

        fn derivative(&self, _p: &[f64], _d: &[f64], _x: &f64, _t: f64) -> f64 {
            let first = {
                let mut released = self.released.lock().unwrap();
                !std::mem::replace(&mut *released, true)
            };
            if first {
                self.barrier.wait();
            }
            1.0
        }

        fn analytical_solution(&self, _p: &[f64], _d: &[f64], t: f64) -> f64 {
            t
        }
    }

    #[derive(Debug)]
    struct Exploding;

    impl OdeModel for Exploding {
        type Variable = f64;

        fn name(&self) -> &str {
            "exploding"
        }

        fn parameter_count(&self) -> usize {
            0
        }

        fn initial_variable(&self, _p: &[f64], _d: &[f64]) -> f64 {
            0.0
        }

        fn derivative(&self, _p: &[f64], _d: &[f64], _x: &f64, _t: f64) -> f64 {
            panic!("derivative blew up")
        }

        fn analytical_solution(&self, _p: &[f64], _d: &[f64], t: f64) -> f64 {
            t
        }
    }

    fn decay_analyser() -> Analyser<Decay> {
        Analyser::new(Model::new(Decay, vec![]).unwrap())
    }

    fn request(steps: &[f64], solving_types: &[SolvingType]) -> AnalysisRequest {
        AnalysisRequest::new("test", ParameterRange::new(0.0, 1.0).unwrap())
            .with_parameter_steps(steps.iter().copied())
            .with_solving_types(solving_types.iter().copied())
    }

    #[test]
    fn test_distinct_parameter_steps() {
        let request = request(&[0.1, 0.05, 0.1, 0.2], &[]);
        assert_eq!(request.distinct_parameter_steps(), vec![0.05, 0.1, 0.2]);
    }

    #[test]
    fn test_report_matrix() {
        let analyser = decay_analyser();
        let report = analyser
            .analyse(request(
                &[0.1, 0.05, 0.1],
                &[SolvingType::ExplicitEuler, SolvingType::ExplicitRk2],
            ))
            .unwrap();

        assert_eq!(report.len(), 4);
        assert_eq!(report.short_description(), "exponential decay");
        assert!(report.analysis_values(SolvingType::Analytical).is_err());
        for solving_type in [SolvingType::ExplicitEuler, SolvingType::ExplicitRk2] {
            let maes = report.mean_absolute_errors(solving_type).unwrap();
            assert_eq!(maes.len(), 2);
            assert!(maes[0].0 < maes[1].0);
            let fine = maes[0].1.defined().unwrap();
            let coarse = maes[1].1.defined().unwrap();
            assert!(fine >= 0.0 && fine < coarse);
        }
        assert_eq!(analyser.status(), AnalysisStatus::Done);
        assert_eq!(analyser.progress().ratio, 1.0);
    }

    #[test]
    fn test_requested_analytical_is_compared_with_itself() {
        let report = decay_analyser()
            .analyse(request(&[0.1], &[SolvingType::Analytical]).with_full_report(true))
            .unwrap();
        let value = report.analysis_value(SolvingType::Analytical, 0).unwrap();
        assert_eq!(value.mean_absolute_error, MeanAbsoluteError::Defined(0.0));
        let trajectory = value.trajectory.as_ref().unwrap();
        assert_eq!(trajectory.len(), 11);
        assert_abs_diff_eq!(trajectory.variables[10], (-1.0_f64).exp(), epsilon = 1e-12);
    }

    #[test]
    fn test_full_report_keeps_trajectories() {
        let analyser = decay_analyser();
        let full = analyser
            .analyse(request(&[0.25], &[SolvingType::ExplicitRk4]).with_full_report(true))
            .unwrap();
        assert_eq!(
            full.simulation_values(SolvingType::ExplicitRk4, 0).unwrap().len(),
            5
        );

        let partial = analyser
            .analyse(request(&[0.25], &[SolvingType::ExplicitRk4]))
            .unwrap();
        assert!(partial.simulation_values(SolvingType::ExplicitRk4, 0).unwrap().is_empty());
    }

    #[test]
    fn test_range_policy_applied() {
        let analyser = decay_analyser();
        let mut request = request(&[0.5], &[SolvingType::ExplicitEuler]);
        request.range = ParameterRange::new(-2.0, 1.0).unwrap();
        let report = analyser.analyse(request).unwrap();
        assert_eq!(report.min_parameter(), 0.0);
        assert_eq!(report.max_parameter(), 1.0);
    }

    #[test]
    fn test_zero_work_completes_immediately() {
        let analyser = decay_analyser();
        let handle = analyser.start(request(&[], &[SolvingType::ExplicitEuler])).unwrap();
        let receiver = handle.progress().clone();
        let report = handle.wait().unwrap();
        assert!(report.is_empty());
        let last = receiver.drain().last().unwrap();
        assert_eq!(last.ratio, 1.0);
    }

    #[test]
    fn test_invalid_step_rejected_before_scheduling() {
        let analyser = decay_analyser();
        let err = analyser
            .start(request(&[0.1, -0.1], &[SolvingType::ExplicitEuler]))
            .unwrap_err();
        assert!(matches!(err, AnalysisError::InvalidStep(s) if s == -0.1));
        assert_eq!(analyser.status(), AnalysisStatus::Idle);
    }

    #[test]
    fn test_nondimensionalized_requires_capability() {
        let err = decay_analyser()
            .start(request(&[0.1], &[SolvingType::ExplicitEuler]).with_nondimensionalized(true))
            .unwrap_err();
        assert!(matches!(
            err,
            AnalysisError::Simulation(SimulationError::DimensionalizationUnsupported(_))
        ));
    }

    #[test]
    fn test_start_while_running_is_rejected() {
        let barrier = Arc::new(Barrier::new(2));
        let gate = Gate {
            barrier: Arc::clone(&barrier),
            released: Mutex::new(false),
        };
        let analyser = Analyser::new(Model::new(gate, vec![]).unwrap());

        let handle = analyser
            .start(request(&[0.5], &[SolvingType::ExplicitEuler]))
            .unwrap();
        assert!(analyser.status().is_active());
        assert!(matches!(
            analyser.start(request(&[0.5], &[SolvingType::ExplicitRk4])),
            Err(AnalysisError::AlreadyRunning)
        ));
        // busy wins over a bad configuration
        assert!(matches!(
            analyser.start(request(&[-1.0], &[SolvingType::ExplicitRk4])),
            Err(AnalysisError::AlreadyRunning)
        ));

        barrier.wait();
        let report = handle.wait().unwrap();
        assert_eq!(report.len(), 1);
        let mae = report.mean_absolute_errors(SolvingType::ExplicitEuler).unwrap();
        assert_abs_diff_eq!(mae[0].1.defined().unwrap(), 0.0, epsilon = 1e-12);
        assert_eq!(analyser.status(), AnalysisStatus::Done);
    }

    #[test]
    fn test_trajectories_dropped_after_aggregation() {
        let analyser = decay_analyser();
        let session = analyser
            .prepare(request(&[0.25], &[SolvingType::ExplicitEuler]))
            .unwrap();
        let (sender, _receiver) = flume::unbounded();
        let progress = ProgressReporter::new(&analyser.tracker, sender);

        let values = session.plans[0].execute(false, &progress);
        assert_eq!(values.len(), 1);
        assert!(values[0].1.trajectory.is_none());
        assert!(values[0].1.mean_absolute_error.defined().is_some());

        let values = session.plans[0].execute(true, &progress);
        assert_eq!(values[0].1.trajectory.as_ref().map(|t| t.len()), Some(5));
    }

    /// `x' = -x`, recording the threads that evaluate it.
    #[derive(Debug, Default)]
    struct Recorder {
        threads: Mutex<BTreeSet<String>>,
    }

    impl OdeModel for Recorder {
        type Variable = f64;

        fn name(&self) -> &str {
            "recorder"
        }

        fn parameter_count(&self) -> usize {
            0
        }

        fn initial_variable(&self, _p: &[f64], _d: &[f64]) -> f64 {
            1.0
        }

        fn derivative(&self, _p: &[f64], _d: &[f64], x: &f64, _t: f64) -> f64 {
            let name = thread::current().name().unwrap_or_default().to_string();
            self.threads.lock().unwrap().insert(name);
            -x
        }

        fn analytical_solution(&self, _p: &[f64], _d: &[f64], t: f64) -> f64 {
            (-t).exp()
        }
    }

    #[test]
    fn test_analyse_from_a_saturated_pool() {
        let caller = rayon::ThreadPoolBuilder::new()
            .num_threads(1)
            .build()
            .unwrap();
        let first =
            Analyser::new(Model::new(Recorder::default(), vec![]).unwrap()).with_num_threads(2);
        let second = decay_analyser().with_num_threads(1);
        let sweep = || {
            request(
                &[0.1, 0.05],
                &[SolvingType::ExplicitEuler, SolvingType::ExplicitRk4],
            )
        };

        // the only caller worker blocks in both waits
        let (a, b) = caller.install(|| {
            rayon::join(
                || first.analyse(sweep()).unwrap(),
                || second.analyse(sweep()).unwrap(),
            )
        });
        assert_eq!(a.len(), 4);
        assert_eq!(b.len(), 4);

        let threads = first.model().behavior().threads.lock().unwrap();
        assert!(!threads.is_empty());
        assert!(
            threads.iter().all(|name| name.starts_with("analysis-worker-")),
            "{threads:?}"
        );
    }

    #[test]
    fn test_task_panic_is_fatal() {
        let analyser = Analyser::new(Model::new(Exploding, vec![]).unwrap());
        let err = analyser
            .analyse(request(&[0.5], &[SolvingType::ExplicitEuler]))
            .unwrap_err();
        match err {
            AnalysisError::TaskPanicked(message) => assert!(message.contains("blew up")),
            other => panic!("unexpected error {other}"),
        }
        assert_eq!(analyser.status(), AnalysisStatus::Idle);
    }
}
