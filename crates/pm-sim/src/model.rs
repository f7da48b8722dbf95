//! PrognosticsModel trait for pluggable degradation models.

use std::collections::BTreeMap;

use pm_core::{KeySet, NamedValues};
use rand::RngCore;

use crate::error::{SimError, SimResult};
use crate::integrator::{ForwardEuler, Integrator};
use crate::params::{ParamMap, ParamValue, Parameters};

/// State, keyed by `ModelKeys::states`.
pub type State = NamedValues;
/// Input (load), keyed by `ModelKeys::inputs`.
pub type Input = NamedValues;
/// Measured output, keyed by `ModelKeys::outputs`.
pub type Output = NamedValues;
/// Progress toward each event in [0, 1]; 0 means the event occurred.
pub type EventStates = NamedValues;
/// Whether each event threshold has been met.
pub type ThresholdsMet = BTreeMap<String, bool>;

/// The identifier sets a model is declared over.
#[derive(Clone, Debug, PartialEq)]
pub struct ModelKeys {
    inputs: KeySet,
    states: KeySet,
    outputs: KeySet,
    events: KeySet,
}

impl ModelKeys {
    pub fn builder() -> ModelKeysBuilder {
        ModelKeysBuilder::default()
    }

    /// Declare all four key sets at once.
    pub fn new<I, S, O, E>(inputs: I, states: S, outputs: O, events: E) -> SimResult<Self>
    where
        I: IntoIterator,
        I::Item: Into<String>,
        S: IntoIterator,
        S::Item: Into<String>,
        O: IntoIterator,
        O::Item: Into<String>,
        E: IntoIterator,
        E::Item: Into<String>,
    {
        Self::builder()
            .inputs(inputs)
            .states(states)
            .outputs(outputs)
            .events(events)
            .build()
    }

    pub fn inputs(&self) -> &KeySet {
        &self.inputs
    }

    pub fn states(&self) -> &KeySet {
        &self.states
    }

    pub fn outputs(&self) -> &KeySet {
        &self.outputs
    }

    pub fn events(&self) -> &KeySet {
        &self.events
    }
}

/// Incremental declaration of [`ModelKeys`].
///
/// `inputs`, `states` and `outputs` are required; `events` defaults to empty.
#[derive(Clone, Debug, Default)]
pub struct ModelKeysBuilder {
    inputs: Option<Vec<String>>,
    states: Option<Vec<String>>,
    outputs: Option<Vec<String>>,
    events: Option<Vec<String>>,
}

fn collect_keys<I>(keys: I) -> Option<Vec<String>>
where
    I: IntoIterator,
    I::Item: Into<String>,
{
    Some(keys.into_iter().map(Into::into).collect())
}

impl ModelKeysBuilder {
    pub fn inputs<I>(mut self, keys: I) -> Self
    where
        I: IntoIterator,
        I::Item: Into<String>,
    {
        self.inputs = collect_keys(keys);
        self
    }

    pub fn states<I>(mut self, keys: I) -> Self
    where
        I: IntoIterator,
        I::Item: Into<String>,
    {
        self.states = collect_keys(keys);
        self
    }

    pub fn outputs<I>(mut self, keys: I) -> Self
    where
        I: IntoIterator,
        I::Item: Into<String>,
    {
        self.outputs = collect_keys(keys);
        self
    }

    pub fn events<I>(mut self, keys: I) -> Self
    where
        I: IntoIterator,
        I::Item: Into<String>,
    {
        self.events = collect_keys(keys);
        self
    }

    /// Name of the first required key group not yet declared.
    pub fn missing_group(&self) -> Option<&'static str> {
        if self.inputs.is_none() {
            Some("inputs")
        } else if self.states.is_none() {
            Some("states")
        } else if self.outputs.is_none() {
            Some("outputs")
        } else {
            None
        }
    }

    pub fn build(self) -> SimResult<ModelKeys> {
        if let Some(group) = self.missing_group() {
            return Err(SimError::schema(format!("model must declare `{group}`")));
        }
        let set = |keys: Option<Vec<String>>, what: &'static str| {
            KeySet::new(keys.unwrap_or_default(), what).map_err(|e| SimError::schema(e.to_string()))
        };
        let keys = ModelKeys {
            inputs: set(self.inputs, "inputs")?,
            states: set(self.states, "states")?,
            outputs: set(self.outputs, "outputs")?,
            events: set(self.events, "events")?,
        };
        if keys.states.is_empty() {
            return Err(SimError::schema("`states` must have at least one state key"));
        }
        Ok(keys)
    }
}

/// Key sets plus parameters: the part every model shares.
///
/// Models embed one of these and hand it out through
/// [`PrognosticsModel::core`].
#[derive(Clone, Debug)]
pub struct ModelCore {
    keys: ModelKeys,
    parameters: Parameters,
}

impl ModelCore {
    /// Validate the keys and merge `model_defaults` then `overrides` into
    /// the base parameters.
    pub fn new(keys: ModelKeys, model_defaults: ParamMap, overrides: ParamMap) -> SimResult<Self> {
        let parameters = Parameters::new(&keys, model_defaults, overrides)?;
        Ok(Self { keys, parameters })
    }

    pub fn keys(&self) -> &ModelKeys {
        &self.keys
    }

    pub fn parameters(&self) -> &Parameters {
        &self.parameters
    }

    pub fn set_config(&mut self, name: &str, value: impl Into<ParamValue>) -> SimResult<()> {
        self.parameters.set_config(&self.keys, name, value.into())
    }
}

/// Continuous-time dynamics: the instantaneous derivative of every state.
pub trait Derivative {
    fn dx(&self, t: f64, x: &State, u: &Input) -> SimResult<State>;
}

/// Discrete dynamics: the state one step of size `dt` later.
pub trait Transition {
    fn next_state(&self, t: f64, x: &State, u: &Input, dt: f64) -> SimResult<State>;
}

/// How a model advances its state. Exactly one strategy per model.
#[derive(Clone, Copy)]
pub enum Dynamics<'a> {
    /// Integrated with forward Euler by [`PrognosticsModel::next_state`].
    Continuous(&'a dyn Derivative),
    Discrete(&'a dyn Transition),
}

impl Dynamics<'_> {
    pub fn is_continuous(&self) -> bool {
        matches!(self, Dynamics::Continuous(_))
    }
}

/// Trait for prognostics (degradation) models.
///
/// A model must implement:
/// - `core` / `core_mut` (key sets and parameters)
/// - `initialize`: first state from the first input and observed output
/// - `output`: measured output for a state
/// - `dynamics`: either a derivative or a discrete transition
///
/// Event modeling is optional: with the defaults a model declares no event
/// progress and no threshold ever fires.
pub trait PrognosticsModel {
    fn core(&self) -> &ModelCore;

    fn core_mut(&mut self) -> &mut ModelCore;

    /// Short display name. Defaults to the type name.
    fn name(&self) -> &str {
        let full = std::any::type_name::<Self>();
        full.rsplit("::").next().unwrap_or(full)
    }

    /// Compute the first state consistent with input `u` and output `z`.
    fn initialize(&self, u: &Input, z: &Output) -> SimResult<State>;

    /// Project state `x` to the measured output at time `t`.
    fn output(&self, t: f64, x: &State) -> SimResult<Output>;

    fn dynamics(&self) -> Dynamics<'_>;

    /// Progress toward each event. Default: no events.
    fn event_state(&self, _t: f64, _x: &State) -> SimResult<EventStates> {
        Ok(EventStates::new())
    }

    /// Default: an event's threshold is met once its event state is `<= 0`.
    fn threshold_met(&self, t: f64, x: &State) -> SimResult<ThresholdsMet> {
        Ok(self
            .event_state(t, x)?
            .iter()
            .map(|(key, es)| (key.to_string(), es <= 0.0))
            .collect())
    }

    /// Advance the state by `dt`.
    fn next_state(&self, t: f64, x: &State, u: &Input, dt: f64) -> SimResult<State> {
        match self.dynamics() {
            Dynamics::Continuous(f) => ForwardEuler.step(f, t, x, u, dt),
            Dynamics::Discrete(f) => f.next_state(t, x, u, dt),
        }
    }

    fn apply_process_noise(&self, x: &State, dt: f64, rng: &mut dyn RngCore) -> SimResult<State> {
        self.parameters().process_noise().apply_process(x, dt, rng)
    }

    fn apply_measurement_noise(&self, z: &Output, rng: &mut dyn RngCore) -> SimResult<Output> {
        self.parameters().measurement_noise().apply_measurement(z, rng)
    }

    fn keys(&self) -> &ModelKeys {
        self.core().keys()
    }

    fn parameters(&self) -> &Parameters {
        self.core().parameters()
    }

    /// The only sanctioned way to change a parameter after construction.
    fn set_config(&mut self, name: &str, value: ParamValue) -> SimResult<()> {
        self.core_mut().set_config(name, value)
    }

    fn describe(&self) -> String {
        let keys = self.keys();
        format!(
            "{} Prognostics Model\n\tEvents: {}\n\tInputs: {}\n\tOutputs: {}",
            self.name(),
            keys.events(),
            keys.inputs(),
            keys.outputs()
        )
    }
}
