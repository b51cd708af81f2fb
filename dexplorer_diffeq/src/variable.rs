use std::{
    fmt::Debug,
    ops::{Add, Mul, Sub},
};

use nalgebra::{Vector2, Vector3};

/// Trait representing the integrated state of a first order ODE.
///
/// A variable is either a scalar or a small fixed-size vector. Every stepper
/// formula is written once against this trait and applies identically to all
/// implementors.
///
/// The undefined value (every component `NaN`) marks a missing reference,
/// e.g. a model without a closed-form solution.
pub trait Variable:
    Copy
    + Debug
    + PartialEq
    + Send
    + Sync
    + Add<Output = Self>
    + Sub<Output = Self>
    + Mul<f64, Output = Self>
    + 'static
{
    /// Number of scalar components.
    const DIMENSION: usize;

    /// The zero variable.
    fn zero() -> Self;

    /// The undefined variable, `NaN` in every component.
    fn undefined() -> Self;

    /// Component-wise absolute value.
    fn abs(&self) -> Self;

    /// Returns the component at `index`.
    ///
    /// # Panics
    ///
    /// Panics if `index >= Self::DIMENSION`.
    fn component(&self, index: usize) -> f64;

    /// Returns `true` if any component is `NaN`.
    fn is_undefined(&self) -> bool {
        (0..Self::DIMENSION).any(|i| self.component(i).is_nan())
    }

    /// Collects the components in order.
    fn components(&self) -> Vec<f64> {
        (0..Self::DIMENSION)
            .map(|i| self.component(i))
            .collect()
    }
}

impl Variable for f64 {
    const DIMENSION: usize = 1;

    fn zero() -> Self {
        0.0
    }

    fn undefined() -> Self {
        f64::NAN
    }

    fn abs(&self) -> Self {
        f64::abs(*self)
    }

    fn component(&self, index: usize) -> f64 {
        assert!(index == 0, "scalar variable has a single component, got index {index}");
        *self
    }
}

impl Variable for Vector2<f64> {
    const DIMENSION: usize = 2;

    fn zero() -> Self {
        Vector2::zeros()
    }

    fn undefined() -> Self {
        Vector2::repeat(f64::NAN)
    }

    fn abs(&self) -> Self {
        Vector2::new(self.x.abs(), self.y.abs())
    }

    fn component(&self, index: usize) -> f64 {
        self[index]
    }
}

impl Variable for Vector3<f64> {
    const DIMENSION: usize = 3;

    fn zero() -> Self {
        Vector3::zeros()
    }

    fn undefined() -> Self {
        Vector3::repeat(f64::NAN)
    }

    fn abs(&self) -> Self {
        Vector3::new(self.x.abs(), self.y.abs(), self.z.abs())
    }

    fn component(&self, index: usize) -> f64 {
        self[index]
    }
}
