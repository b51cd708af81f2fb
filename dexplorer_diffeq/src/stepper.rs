//! Fixed-step explicit integration formulas.
//!
//! Every formula takes the right-hand side as a closure `f(&x, t)` so the
//! same code drives scalar and vector variables.

use crate::{solving::SolvingType, variable::Variable};

/// One explicit Euler step.
pub fn euler<V, F>(f: F, x: &V, t: f64, h: f64) -> V
where
    V: Variable,
    F: Fn(&V, f64) -> V,
{
    *x + f(x, t) * h
}

/// One explicit second order Runge-Kutta step (Heun).
pub fn rk2<V, F>(f: F, x: &V, t: f64, h: f64) -> V
where
    V: Variable,
    F: Fn(&V, f64) -> V,
{
    let k1 = f(x, t);
    let k2 = f(&(*x + k1 * h), t + h);
    *x + (k1 * 0.5 + k2 * 0.5) * h
}

/// One classic fourth order Runge-Kutta step.
pub fn rk4<V, F>(f: F, x: &V, t: f64, h: f64) -> V
where
    V: Variable,
    F: Fn(&V, f64) -> V,
{
    let half = 0.5 * h;
    let k1 = f(x, t);
    let k2 = f(&(*x + k1 * half), t + half);
    let k3 = f(&(*x + k2 * half), t + half);
    let k4 = f(&(*x + k3 * h), t + h);
    *x + (k1 + k2 * 2.0 + k3 * 2.0 + k4) * (h / 6.0)
}

/// Advances `x` from `t` to `t + h` with the selected method.
///
/// `analytical` is only evaluated for [`SolvingType::Analytical`], which
/// reads the closed form at `t + h` and ignores `x`.
pub fn step<V, F, A>(solving_type: SolvingType, f: F, analytical: A, x: &V, t: f64, h: f64) -> V
where
    V: Variable,
    F: Fn(&V, f64) -> V,
    A: Fn(f64) -> V,
{
    match solving_type {
        SolvingType::Analytical => analytical(t + h),
        SolvingType::ExplicitEuler => euler(f, x, t, h),
        SolvingType::ExplicitRk2 => rk2(f, x, t, h),
        SolvingType::ExplicitRk4 => rk4(f, x, t, h),
    }
}
