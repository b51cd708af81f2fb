use dexplorer_diffeq::{SolvingType, Trajectory, Variable};

use crate::report::{Report, ReportError};

/// Replays a retained trajectory against an external clock.
///
/// The cursor shows the last sample whose parameter has been reached and
/// starts over from the first sample once the last one has been shown.
#[derive(Debug, Clone)]
pub struct Playback<'a, V> {
    trajectory: &'a Trajectory<V>,
    parameter_step: f64,
    index: usize,
    elapsed: f64,
    speed: f64,
    paused: bool,
}

impl<'a, V: Variable> Playback<'a, V> {
    pub fn new(
        report: &'a Report<V>,
        solving_type: SolvingType,
        step_index: usize,
    ) -> Result<Self, ReportError> {
        let parameter_step = report.analysis_value(solving_type, step_index)?.parameter_step;
        let trajectory = report.trajectory(solving_type, step_index)?;
        Ok(Self {
            elapsed: trajectory.parameters.first().copied().unwrap_or_default(),
            trajectory,
            parameter_step,
            index: 0,
            speed: 1.0,
            paused: false,
        })
    }

    pub fn parameter_step(&self) -> f64 {
        self.parameter_step
    }

    pub fn index(&self) -> usize {
        self.index
    }

    pub fn speed(&self) -> f64 {
        self.speed
    }

    /// Negative speeds are clamped to zero.
    pub fn set_speed(&mut self, speed: f64) {
        self.speed = speed.max(0.0);
    }

    pub fn set_paused(&mut self, paused: bool) {
        self.paused = paused;
    }

    pub fn is_paused(&self) -> bool {
        self.paused
    }

    pub fn current(&self) -> Option<(f64, V)> {
        self.trajectory.get(self.index)
    }

    pub fn restart(&mut self) {
        self.index = 0;
        self.elapsed = self.trajectory.parameters.first().copied().unwrap_or_default();
    }

    /// Moves the clock forward by `dt` scaled by the playback speed.
    pub fn advance(&mut self, dt: f64) -> Option<(f64, V)> {
        if self.paused || self.speed == 0.0 || self.trajectory.is_empty() {
            return self.current();
        }

        if self.index + 1 >= self.trajectory.len() {
            self.restart();
            return self.current();
        }

        self.elapsed += dt * self.speed;
        while let Some(next) = self.trajectory.parameters.get(self.index + 1) {
            if *next >= self.elapsed {
                break;
            }
            self.index += 1;
        }
        self.current()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{aggregation::MeanAbsoluteError, report::AnalysisValue};

    fn report(full: bool) -> Report<f64> {
        let mut trajectory = Trajectory::with_capacity(4);
        for i in 0..4 {
            trajectory.push(i as f64 * 0.5, i as f64);
        }
        let mut report = Report::new("playback", "", "", 0.0, 1.5, full);
        report.add_value(
            SolvingType::ExplicitEuler,
            AnalysisValue {
                parameter_step: 0.5,
                mean_absolute_error: MeanAbsoluteError::Defined(0.0),
                trajectory: Some(trajectory),
            },
        );
        report
    }

    #[test]
    fn test_advance_and_loop() {
        let report = report(true);
        let mut playback = Playback::new(&report, SolvingType::ExplicitEuler, 0).unwrap();
        assert_eq!(playback.current(), Some((0.0, 0.0)));

        assert_eq!(playback.advance(0.4), Some((0.0, 0.0)));
        assert_eq!(playback.advance(0.2), Some((0.5, 1.0)));
        assert_eq!(playback.advance(1.0), Some((1.5, 3.0)));
        assert_eq!(playback.advance(0.1), Some((0.0, 0.0)));
        assert_eq!(playback.index(), 0);
    }

    #[test]
    fn test_pause_and_speed() {
        let report = report(true);
        let mut playback = Playback::new(&report, SolvingType::ExplicitEuler, 0).unwrap();

        playback.set_paused(true);
        assert_eq!(playback.advance(10.0), Some((0.0, 0.0)));
        playback.set_paused(false);

        playback.set_speed(-3.0);
        assert_eq!(playback.speed(), 0.0);
        assert_eq!(playback.advance(10.0), Some((0.0, 0.0)));

        playback.set_speed(2.0);
        assert_eq!(playback.advance(0.6), Some((1.0, 2.0)));
        assert_eq!(playback.parameter_step(), 0.5);
    }

    #[test]
    fn test_partial_report_cannot_play() {
        let report = report(false);
        assert!(matches!(
            Playback::new(&report, SolvingType::ExplicitEuler, 0),
            Err(ReportError::NotFullReport)
        ));
    }
}
