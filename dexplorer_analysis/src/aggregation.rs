use dexplorer_diffeq::{Trajectory, Variable};
use serde::{Deserialize, Serialize};

/// Mean absolute error of one approximation against its reference.
///
/// `Undefined` means the reference (or the approximation) contained `NaN`,
/// i.e. there is nothing to compare against.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub enum MeanAbsoluteError<V> {
    Defined(V),
    Undefined,
}

impl<V: Variable> MeanAbsoluteError<V> {
    pub fn from_variable(value: V) -> Self {
        if value.is_undefined() {
            Self::Undefined
        } else {
            Self::Defined(value)
        }
    }

    pub fn defined(&self) -> Option<V> {
        match self {
            Self::Defined(value) => Some(*value),
            Self::Undefined => None,
        }
    }

    pub fn is_undefined(&self) -> bool {
        matches!(self, Self::Undefined)
    }
}

/// Componentwise `1/N * sum |exact[i] - approximation[i]|` over the common
/// samples of both trajectories. The zero variable when there are none.
pub fn mean_absolute_error<V: Variable>(
    exact: &Trajectory<V>,
    approximation: &Trajectory<V>,
) -> MeanAbsoluteError<V> {
    let n = exact.len().min(approximation.len());
    if n == 0 {
        return MeanAbsoluteError::Defined(V::zero());
    }

    let sum = exact
        .variables
        .iter()
        .zip(&approximation.variables)
        .fold(V::zero(), |acc, (e, a)| acc + (*e - *a).abs());

    MeanAbsoluteError::from_variable(sum * (1.0 / n as f64))
}
