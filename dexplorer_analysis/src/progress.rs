use std::sync::atomic::{AtomicU8, AtomicUsize, Ordering};

use flume::Sender;
use serde::{Deserialize, Serialize};

/// Share of the progress bar given to simulations and analyses.
const RUNNING_SHARE: f64 = 0.9;

/// Advisory progress of an analysis session.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AnalysisProgress {
    /// In `[0, 1]`.
    pub ratio: f64,
    pub message: String,
}

#[repr(u8)]
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum AnalysisStatus {
    Idle = 0,
    Running = 1,
    /// Every task finished, the report is being assembled.
    Collecting = 2,
    Done = 3,
}

impl AnalysisStatus {
    fn from_u8(value: u8) -> Self {
        match value {
            1 => Self::Running,
            2 => Self::Collecting,
            3 => Self::Done,
            _ => Self::Idle,
        }
    }

    pub fn is_active(&self) -> bool {
        matches!(self, Self::Running | Self::Collecting)
    }
}

/// Status and task counters of the analyser, shared with the session thread.
#[derive(Debug)]
pub(crate) struct ProgressTracker {
    status: AtomicU8,
    completed: AtomicUsize,
    total: AtomicUsize,
}

impl Default for ProgressTracker {
    fn default() -> Self {
        Self {
            status: AtomicU8::new(AnalysisStatus::Idle as u8),
            completed: AtomicUsize::new(0),
            total: AtomicUsize::new(0),
        }
    }
}

impl ProgressTracker {
    pub fn status(&self) -> AnalysisStatus {
        AnalysisStatus::from_u8(self.status.load(Ordering::Acquire))
    }

    pub fn set_status(&self, status: AnalysisStatus) {
        self.status.store(status as u8, Ordering::Release);
    }

    /// Moves to `Running` unless a session is already active. Returns `false`
    /// when one is.
    pub fn begin(&self, total: usize) -> bool {
        let claimed = self
            .status
            .fetch_update(Ordering::AcqRel, Ordering::Acquire, |current| {
                (!AnalysisStatus::from_u8(current).is_active())
                    .then_some(AnalysisStatus::Running as u8)
            })
            .is_ok();
        if claimed {
            self.completed.store(0, Ordering::Release);
            self.total.store(total, Ordering::Release);
        }
        claimed
    }

    pub fn complete_task(&self) -> usize {
        self.completed.fetch_add(1, Ordering::AcqRel) + 1
    }

    pub fn snapshot(&self) -> AnalysisProgress {
        match self.status() {
            AnalysisStatus::Idle => AnalysisProgress {
                ratio: 0.0,
                message: "Idle".to_string(),
            },
            AnalysisStatus::Running => {
                let completed = self.completed.load(Ordering::Acquire);
                let total = self.total.load(Ordering::Acquire);
                let ratio = if total == 0 {
                    RUNNING_SHARE
                } else {
                    RUNNING_SHARE * completed as f64 / total as f64
                };
                AnalysisProgress {
                    ratio,
                    message: format!("Simulations and analyses ({completed}/{total})"),
                }
            }
            AnalysisStatus::Collecting => AnalysisProgress {
                ratio: RUNNING_SHARE,
                message: "Report generation...".to_string(),
            },
            AnalysisStatus::Done => AnalysisProgress {
                ratio: 1.0,
                message: "Finalization...".to_string(),
            },
        }
    }
}

/// Progress publisher of one session.
#[derive(Debug, Clone)]
pub(crate) struct ProgressReporter<'a> {
    tracker: &'a ProgressTracker,
    sender: Sender<AnalysisProgress>,
}

impl<'a> ProgressReporter<'a> {
    pub fn new(tracker: &'a ProgressTracker, sender: Sender<AnalysisProgress>) -> Self {
        Self { tracker, sender }
    }

    /// Publishes the current snapshot. A full or closed channel drops the
    /// event; the tracker still holds the latest state.
    pub fn publish(&self) {
        let _ = self.sender.try_send(self.tracker.snapshot());
    }

    pub fn task_completed(&self) {
        self.tracker.complete_task();
        self.publish();
    }

    pub fn enter(&self, status: AnalysisStatus) {
        self.tracker.set_status(status);
        self.publish();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_abs_diff_eq;

    #[test]
    fn test_begin_rejects_active_session() {
        let tracker = ProgressTracker::default();
        assert!(tracker.begin(4));
        assert!(!tracker.begin(4));
        tracker.set_status(AnalysisStatus::Collecting);
        assert!(!tracker.begin(4));
        tracker.set_status(AnalysisStatus::Done);
        assert!(tracker.begin(2));
        assert_eq!(tracker.status(), AnalysisStatus::Running);
    }

    #[test]
    fn test_progress_phases() {
        let tracker = ProgressTracker::default();
        assert_eq!(tracker.snapshot().ratio, 0.0);

        tracker.begin(4);
        tracker.complete_task();
        let progress = tracker.snapshot();
        assert_abs_diff_eq!(progress.ratio, 0.225, epsilon = 1e-12);
        assert_eq!(progress.message, "Simulations and analyses (1/4)");

        tracker.set_status(AnalysisStatus::Collecting);
        assert_abs_diff_eq!(tracker.snapshot().ratio, 0.9);
        tracker.set_status(AnalysisStatus::Done);
        assert_eq!(tracker.snapshot().ratio, 1.0);
        assert_eq!(tracker.snapshot().message, "Finalization...");
    }

    #[test]
    fn test_reporter_never_blocks_on_full_channel() {
        let tracker = ProgressTracker::default();
        tracker.begin(3);
        let (tx, rx) = flume::bounded(1);
        let reporter = ProgressReporter::new(&tracker, tx);
        reporter.task_completed();
        reporter.task_completed();
        reporter.task_completed();
        assert_eq!(rx.len(), 1);
        assert_eq!(
            rx.recv().unwrap().message,
            "Simulations and analyses (1/3)"
        );
        assert_abs_diff_eq!(tracker.snapshot().ratio, 0.9);
    }
}
