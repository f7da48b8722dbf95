use crate::CoreError;

/// Floating point type used throughout system
pub type Real = f64;

/// One tolerance for everything
#[derive(Clone, Copy, Debug)]
pub struct Tolerances {
    pub abs: Real,
    pub rel: Real,
}

impl Default for Tolerances {
    fn default() -> Self {
        Self {
            abs: 1e-12,
            rel: 1e-9,
        }
    }
}

pub fn nearly_equal(a: Real, b: Real, tol: Tolerances) -> bool {
    if a == b {
        return true;
    }
    // infinities only equal themselves
    if !a.is_finite() || !b.is_finite() {
        return false;
    }
    let diff = (a - b).abs();
    if diff <= tol.abs {
        return true;
    }
    diff <= tol.rel * a.abs().max(b.abs())
}

impl Tolerances {
    /// Rounding allowance for times built from steps of size `dt`.
    ///
    /// Scales with the step, not with elapsed time, so it stays well below
    /// one step however long a run gets.
    pub fn step_slack(&self, dt: Real) -> Real {
        self.abs.max(self.rel * dt.abs())
    }
}

/// True once `t` has reached `boundary`, allowing `slack` for rounding.
///
/// Used for save-point and horizon checks, where `t` is built from `dt`
/// steps and may land a few ulps short of the boundary. See
/// [`Tolerances::step_slack`].
pub fn reached(t: Real, boundary: Real, slack: Real) -> bool {
    t >= boundary || boundary - t <= slack
}

pub fn ensure_finite(v: Real, what: &str) -> Result<Real, CoreError> {
    if v.is_finite() {
        Ok(v)
    } else {
        Err(CoreError::NonFinite {
            what: what.to_string(),
            value: v,
        })
    }
}
