//! Build models from plain closures.
//!
//! [`generate_model`] validates a set of [`Equations`] against declared
//! [`ModelKeysBuilder`] groups and returns an [`FnModel`], which satisfies
//! [`PrognosticsModel`] exactly like a hand-written model.

use std::fmt;

use crate::error::{SimError, SimResult};
use crate::model::{
    Derivative, Dynamics, EventStates, Input, ModelCore, ModelKeysBuilder, Output,
    PrognosticsModel, State, ThresholdsMet, Transition,
};
use crate::params::ParamMap;

pub type InitializeFn = Box<dyn Fn(&Input, &Output) -> SimResult<State> + Send + Sync>;
pub type OutputFn = Box<dyn Fn(f64, &State) -> SimResult<Output> + Send + Sync>;
pub type DxFn = Box<dyn Fn(f64, &State, &Input) -> SimResult<State> + Send + Sync>;
pub type NextStateFn = Box<dyn Fn(f64, &State, &Input, f64) -> SimResult<State> + Send + Sync>;
pub type EventStateFn = Box<dyn Fn(f64, &State) -> SimResult<EventStates> + Send + Sync>;
pub type ThresholdFn = Box<dyn Fn(f64, &State) -> SimResult<ThresholdsMet> + Send + Sync>;

/// Model equations collected for [`generate_model`].
///
/// `initialize`, `output` and exactly one of `dx` / `next_state` are
/// required; `event_state` and `threshold_met` fall back to the trait
/// defaults when absent.
#[derive(Default)]
pub struct Equations {
    initialize: Option<InitializeFn>,
    output: Option<OutputFn>,
    dx: Option<DxFn>,
    next_state: Option<NextStateFn>,
    event_state: Option<EventStateFn>,
    threshold_met: Option<ThresholdFn>,
}

impl Equations {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn initialize<F>(mut self, f: F) -> Self
    where
        F: Fn(&Input, &Output) -> SimResult<State> + Send + Sync + 'static,
    {
        self.initialize = Some(Box::new(f));
        self
    }

    pub fn output<F>(mut self, f: F) -> Self
    where
        F: Fn(f64, &State) -> SimResult<Output> + Send + Sync + 'static,
    {
        self.output = Some(Box::new(f));
        self
    }

    pub fn dx<F>(mut self, f: F) -> Self
    where
        F: Fn(f64, &State, &Input) -> SimResult<State> + Send + Sync + 'static,
    {
        self.dx = Some(Box::new(f));
        self
    }

    pub fn next_state<F>(mut self, f: F) -> Self
    where
        F: Fn(f64, &State, &Input, f64) -> SimResult<State> + Send + Sync + 'static,
    {
        self.next_state = Some(Box::new(f));
        self
    }

    pub fn event_state<F>(mut self, f: F) -> Self
    where
        F: Fn(f64, &State) -> SimResult<EventStates> + Send + Sync + 'static,
    {
        self.event_state = Some(Box::new(f));
        self
    }

    pub fn threshold_met<F>(mut self, f: F) -> Self
    where
        F: Fn(f64, &State) -> SimResult<ThresholdsMet> + Send + Sync + 'static,
    {
        self.threshold_met = Some(Box::new(f));
        self
    }
}

impl fmt::Debug for Equations {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Equations")
            .field("initialize", &self.initialize.is_some())
            .field("output", &self.output.is_some())
            .field("dx", &self.dx.is_some())
            .field("next_state", &self.next_state.is_some())
            .field("event_state", &self.event_state.is_some())
            .field("threshold_met", &self.threshold_met.is_some())
            .finish()
    }
}

struct DxEqn(DxFn);

impl Derivative for DxEqn {
    fn dx(&self, t: f64, x: &State, u: &Input) -> SimResult<State> {
        (self.0)(t, x, u)
    }
}

struct NextStateEqn(NextStateFn);

impl Transition for NextStateEqn {
    fn next_state(&self, t: f64, x: &State, u: &Input, dt: f64) -> SimResult<State> {
        (self.0)(t, x, u, dt)
    }
}

enum FnDynamics {
    Continuous(DxEqn),
    Discrete(NextStateEqn),
}

/// A model assembled from closures by [`generate_model`].
pub struct FnModel {
    core: ModelCore,
    initialize: InitializeFn,
    output: OutputFn,
    dynamics: FnDynamics,
    event_state: Option<EventStateFn>,
    threshold_met: Option<ThresholdFn>,
}

impl fmt::Debug for FnModel {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let dynamics = match self.dynamics {
            FnDynamics::Continuous(_) => "continuous",
            FnDynamics::Discrete(_) => "discrete",
        };
        f.debug_struct("FnModel")
            .field("core", &self.core)
            .field("dynamics", &dynamics)
            .field("event_state", &self.event_state.is_some())
            .field("threshold_met", &self.threshold_met.is_some())
            .finish()
    }
}

impl PrognosticsModel for FnModel {
    fn core(&self) -> &ModelCore {
        &self.core
    }

    fn core_mut(&mut self) -> &mut ModelCore {
        &mut self.core
    }

    fn initialize(&self, u: &Input, z: &Output) -> SimResult<State> {
        (self.initialize)(u, z)
    }

    fn output(&self, t: f64, x: &State) -> SimResult<Output> {
        (self.output)(t, x)
    }

    fn dynamics(&self) -> Dynamics<'_> {
        match &self.dynamics {
            FnDynamics::Continuous(f) => Dynamics::Continuous(f),
            FnDynamics::Discrete(f) => Dynamics::Discrete(f),
        }
    }

    fn event_state(&self, t: f64, x: &State) -> SimResult<EventStates> {
        match &self.event_state {
            Some(f) => f(t, x),
            None => Ok(EventStates::new()),
        }
    }

    fn threshold_met(&self, t: f64, x: &State) -> SimResult<ThresholdsMet> {
        match &self.threshold_met {
            Some(f) => f(t, x),
            None => Ok(self
                .event_state(t, x)?
                .iter()
                .map(|(key, es)| (key.to_string(), es <= 0.0))
                .collect()),
        }
    }
}

/// Build a model from key declarations, equations and parameter overrides.
///
/// # Errors
/// [`SimError::Construction`] when `initialize` or `output` is missing, when
/// not exactly one of `dx` / `next_state` is given, or when a required key
/// group is undeclared. Key and parameter problems surface as
/// [`SimError::Schema`] or [`SimError::Config`].
pub fn generate_model(
    keys: ModelKeysBuilder,
    equations: Equations,
    config: ParamMap,
) -> SimResult<FnModel> {
    let Equations {
        initialize,
        output,
        dx,
        next_state,
        event_state,
        threshold_met,
    } = equations;

    let initialize = initialize.ok_or(SimError::Construction {
        what: "model must have an `initialize` equation",
    })?;
    let output = output.ok_or(SimError::Construction {
        what: "model must have an `output` equation",
    })?;
    let dynamics = match (dx, next_state) {
        (Some(dx), None) => FnDynamics::Continuous(DxEqn(dx)),
        (None, Some(next)) => FnDynamics::Discrete(NextStateEqn(next)),
        (None, None) => {
            return Err(SimError::Construction {
                what: "model must have either a `next_state` or `dx` equation",
            });
        }
        (Some(_), Some(_)) => {
            return Err(SimError::Construction {
                what: "model cannot have both a `next_state` and `dx` equation",
            });
        }
    };
    if let Some(group) = keys.missing_group() {
        let what = match group {
            "inputs" => "keys must include `inputs`",
            "states" => "keys must include `states`",
            _ => "keys must include `outputs`",
        };
        return Err(SimError::Construction { what });
    }

    let core = ModelCore::new(keys.build()?, ParamMap::new(), config)?;
    tracing::debug!(
        continuous = matches!(dynamics, FnDynamics::Continuous(_)),
        "generated model"
    );
    Ok(FnModel {
        core,
        initialize,
        output,
        dynamics,
        event_state,
        threshold_met,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::ModelKeys;

    fn keys() -> ModelKeysBuilder {
        ModelKeys::builder()
            .inputs(["u1"])
            .states(["x1"])
            .outputs(["z1"])
    }

    fn base() -> Equations {
        Equations::new()
            .initialize(|_u, _z| Ok([("x1", 0.0)].into_iter().collect()))
            .output(|_t, x| Ok([("z1", x["x1"])].into_iter().collect()))
    }

    fn construction_message(err: SimError) -> &'static str {
        match err {
            SimError::Construction { what } => what,
            other => panic!("expected construction error, got {other:?}"),
        }
    }

    #[test]
    fn continuous_model_from_dx() {
        let m = generate_model(
            keys(),
            base().dx(|_t, _x, u| Ok([("x1", u["u1"])].into_iter().collect())),
            ParamMap::new(),
        )
        .unwrap();
        assert!(m.dynamics().is_continuous());

        let x: State = [("x1", 1.0)].into_iter().collect();
        let u: Input = [("u1", 2.0)].into_iter().collect();
        assert_eq!(m.next_state(0.0, &x, &u, 0.5).unwrap()["x1"], 2.0);
        assert!(m.event_state(0.0, &x).unwrap().is_empty());
        assert!(m.threshold_met(0.0, &x).unwrap().is_empty());
        assert_eq!(m.keys().events().len(), 0);
    }

    #[test]
    fn discrete_model_from_next_state() {
        let m = generate_model(
            keys().events(["done"]),
            base()
                .next_state(|_t, x, _u, _dt| Ok([("x1", x["x1"] + 1.0)].into_iter().collect()))
                .event_state(|_t, x| Ok([("done", 1.0 - x["x1"] / 2.0)].into_iter().collect())),
            ParamMap::new(),
        )
        .unwrap();
        assert!(!m.dynamics().is_continuous());

        let x: State = [("x1", 2.0)].into_iter().collect();
        assert_eq!(m.next_state(0.0, &x, &Input::new(), 1.0).unwrap()["x1"], 3.0);
        assert!(m.threshold_met(0.0, &x).unwrap()["done"]);
    }

    #[test]
    fn rejects_both_or_neither_dynamics() {
        let neither = generate_model(keys(), base(), ParamMap::new()).unwrap_err();
        assert!(construction_message(neither).contains("either"));

        let both = generate_model(
            keys(),
            base()
                .dx(|_t, x, _u| Ok(x.clone()))
                .next_state(|_t, x, _u, _dt| Ok(x.clone())),
            ParamMap::new(),
        )
        .unwrap_err();
        assert!(construction_message(both).contains("both"));
    }

    #[test]
    fn rejects_missing_equations_and_keys() {
        let err = generate_model(
            keys(),
            Equations::new().dx(|_t, x, _u| Ok(x.clone())),
            ParamMap::new(),
        )
        .unwrap_err();
        assert!(construction_message(err).contains("initialize"));

        let err = generate_model(
            keys(),
            Equations::new()
                .initialize(|_u, _z| Ok(State::new()))
                .dx(|_t, x, _u| Ok(x.clone())),
            ParamMap::new(),
        )
        .unwrap_err();
        assert!(construction_message(err).contains("output"));

        let err = generate_model(
            ModelKeys::builder().inputs(["u1"]).outputs(["z1"]),
            base().dx(|_t, x, _u| Ok(x.clone())),
            ParamMap::new(),
        )
        .unwrap_err();
        assert!(construction_message(err).contains("states"));
    }

    #[test]
    fn config_overrides_reach_parameters() {
        let m = generate_model(
            keys(),
            base().dx(|_t, x, _u| Ok(x.clone())),
            crate::params::param_map([("process_noise", 0.0), ("gain", 4.0)]),
        )
        .unwrap();
        assert_eq!(m.parameters().real("gain"), Some(4.0));
        assert_eq!(
            m.parameters().process_noise().scales().unwrap()["x1"],
            0.0
        );
    }
}
