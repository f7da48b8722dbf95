//! Fixed-step integration for continuous-time models.

use crate::error::SimResult;
use crate::model::{Derivative, Input, State};

/// Trait for time integrators.
pub trait Integrator {
    /// Advance state by one time step using the model derivative.
    fn step(
        &self,
        model: &dyn Derivative,
        t: f64,
        x: &State,
        u: &Input,
        dt: f64,
    ) -> SimResult<State>;
}

/// Forward Euler (explicit, 1st order).
///
/// `x' = x + dx(t, x, u) * dt` for every state key. This is the default
/// state advance for continuous models; models needing more accuracy supply
/// a discrete transition instead.
#[derive(Clone, Copy, Debug, Default)]
pub struct ForwardEuler;

impl Integrator for ForwardEuler {
    fn step(
        &self,
        model: &dyn Derivative,
        t: f64,
        x: &State,
        u: &Input,
        dt: f64,
    ) -> SimResult<State> {
        let xdot = model.dx(t, x, u)?;
        Ok(x.add_scaled(&xdot, dt)?)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::SimError;

    /// dx/dt = -k * x for every key.
    struct Decay {
        k: f64,
    }

    impl Derivative for Decay {
        fn dx(&self, _t: f64, x: &State, _u: &Input) -> SimResult<State> {
            Ok(x.iter().map(|(key, v)| (key, -self.k * v)).collect())
        }
    }

    /// Returns a derivative for the wrong key.
    struct Broken;

    impl Derivative for Broken {
        fn dx(&self, _t: f64, _x: &State, _u: &Input) -> SimResult<State> {
            Ok([("other", 1.0)].into_iter().collect())
        }
    }

    #[test]
    fn euler_single_step() {
        let x: State = [("q", 2.0)].into_iter().collect();
        let next = ForwardEuler
            .step(&Decay { k: 0.5 }, 0.0, &x, &Input::new(), 0.1)
            .unwrap();
        // 2.0 + (-1.0 * 0.1)
        assert!((next["q"] - 1.9).abs() < 1e-12);
    }

    #[test]
    fn euler_converges_to_exponential() {
        let model = Decay { k: 1.0 };
        let dt = 1e-4;
        let mut x: State = [("q", 1.0)].into_iter().collect();
        for i in 0..10_000 {
            x = ForwardEuler
                .step(&model, i as f64 * dt, &x, &Input::new(), dt)
                .unwrap();
        }
        assert!((x["q"] - (-1.0_f64).exp()).abs() < 1e-4);
    }

    #[test]
    fn euler_rejects_mismatched_derivative() {
        let x: State = [("q", 1.0)].into_iter().collect();
        let err = ForwardEuler
            .step(&Broken, 0.0, &x, &Input::new(), 1.0)
            .unwrap_err();
        assert!(matches!(err, SimError::Core(_)));
    }
}
