use serde::{Deserialize, Serialize};

use crate::variable::Variable;

/// Ordered `(parameter, variable)` samples produced by one simulation run.
///
/// The buffer is preallocated for the expected iteration count and only
/// grows by appending.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Trajectory<V> {
    /// Recorded parameters.
    pub parameters: Vec<f64>,
    /// Recorded variables.
    pub variables: Vec<V>,
}

impl<V: Variable> Trajectory<V> {
    pub fn with_capacity(n: usize) -> Self {
        Self {
            parameters: Vec::with_capacity(n),
            variables: Vec::with_capacity(n),
        }
    }

    pub fn push(&mut self, parameter: f64, variable: V) {
        self.parameters.push(parameter);
        self.variables.push(variable);
    }

    pub fn len(&self) -> usize {
        self.parameters.len()
    }

    pub fn is_empty(&self) -> bool {
        self.parameters.is_empty()
    }

    /// Returns the sample at `index`, `None` past the end.
    pub fn get(&self, index: usize) -> Option<(f64, V)> {
        Some((*self.parameters.get(index)?, *self.variables.get(index)?))
    }

    pub fn last(&self) -> Option<(f64, V)> {
        self.len().checked_sub(1).and_then(|i| self.get(i))
    }

    pub fn iter(&self) -> impl Iterator<Item = (f64, V)> + '_ {
        self.parameters
            .iter()
            .copied()
            .zip(self.variables.iter().copied())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_push_and_get() {
        let mut trajectory = Trajectory::with_capacity(2);
        assert!(trajectory.is_empty());
        assert_eq!(trajectory.last(), None);
        trajectory.push(0.0, 1.0);
        trajectory.push(0.5, 2.0);
        assert_eq!(trajectory.len(), 2);
        assert_eq!(trajectory.get(1), Some((0.5, 2.0)));
        assert_eq!(trajectory.get(2), None);
        assert_eq!(trajectory.last(), Some((0.5, 2.0)));
        assert_eq!(trajectory.iter().count(), 2);
    }
}
