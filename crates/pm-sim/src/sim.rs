//! Simulation runner and trajectory recording.

use std::fmt;
use std::sync::Arc;

use pm_core::{Tolerances, reached};
use rand::SeedableRng;
use rand::rngs::StdRng;

use crate::error::{SimError, SimResult};
use crate::model::{EventStates, Input, Output, PrognosticsModel, State, ThresholdsMet};

/// Custom termination predicate over the thresholds-met map.
pub type ThresholdPredicate = Arc<dyn Fn(&ThresholdsMet) -> bool + Send + Sync>;

/// Options for simulation runs.
#[derive(Clone)]
pub struct SimConfig {
    /// Fixed time step (seconds)
    pub dt: f64,
    /// Periodic save interval (seconds)
    pub save_freq: f64,
    /// Additional one-shot save times, ascending (seconds)
    pub save_pts: Vec<f64>,
    /// Maximum simulated time (seconds)
    pub horizon: f64,
    /// Initial state; `initialize` is used when absent
    pub x0: Option<State>,
    /// Overrides the event-based termination check
    pub thresholds_met_eqn: Option<ThresholdPredicate>,
    /// Apply process and measurement noise during the run
    pub noise: bool,
    /// Seed for the noise generator; entropy when absent
    pub seed: Option<u64>,
}

impl Default for SimConfig {
    fn default() -> Self {
        Self {
            dt: 1.0,
            save_freq: 10.0,
            save_pts: Vec::new(),
            horizon: f64::INFINITY,
            x0: None,
            thresholds_met_eqn: None,
            noise: false,
            seed: None,
        }
    }
}

impl SimConfig {
    pub fn with_dt(mut self, dt: f64) -> Self {
        self.dt = dt;
        self
    }

    pub fn with_save_freq(mut self, save_freq: f64) -> Self {
        self.save_freq = save_freq;
        self
    }

    pub fn with_save_pts(mut self, save_pts: impl Into<Vec<f64>>) -> Self {
        self.save_pts = save_pts.into();
        self
    }

    pub fn with_horizon(mut self, horizon: f64) -> Self {
        self.horizon = horizon;
        self
    }

    pub fn with_initial_state(mut self, x0: State) -> Self {
        self.x0 = Some(x0);
        self
    }

    pub fn with_thresholds_met_eqn<F>(mut self, f: F) -> Self
    where
        F: Fn(&ThresholdsMet) -> bool + Send + Sync + 'static,
    {
        self.thresholds_met_eqn = Some(Arc::new(f));
        self
    }

    /// Enable noise, optionally with a fixed seed for reproducible runs.
    pub fn with_noise(mut self, seed: Option<u64>) -> Self {
        self.noise = true;
        self.seed = seed;
        self
    }

    fn validate(&self) -> SimResult<()> {
        if !self.dt.is_finite() || self.dt <= 0.0 {
            return Err(SimError::input(format!(
                "'dt' must be a positive number, was {}",
                self.dt
            )));
        }
        if !self.save_freq.is_finite() || self.save_freq <= 0.0 {
            return Err(SimError::input(format!(
                "'save_freq' must be a positive number, was {}",
                self.save_freq
            )));
        }
        if self.horizon.is_nan() {
            return Err(SimError::input("'horizon' must be a number"));
        }
        if self.save_pts.iter().any(|p| !p.is_finite()) {
            return Err(SimError::input("'save_pts' must be finite"));
        }
        if self.save_pts.windows(2).any(|w| w[1] < w[0]) {
            return Err(SimError::input("'save_pts' must be in ascending order"));
        }
        Ok(())
    }
}

impl fmt::Debug for SimConfig {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("SimConfig")
            .field("dt", &self.dt)
            .field("save_freq", &self.save_freq)
            .field("save_pts", &self.save_pts)
            .field("horizon", &self.horizon)
            .field("x0", &self.x0)
            .field(
                "thresholds_met_eqn",
                &self.thresholds_met_eqn.as_ref().map(|_| ".."),
            )
            .field("noise", &self.noise)
            .field("seed", &self.seed)
            .finish()
    }
}

/// Record of simulation results: five parallel, time-ordered sequences.
#[derive(Clone, Debug, Default, PartialEq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct Trajectory {
    /// Time points (seconds)
    pub times: Vec<f64>,
    /// Input from the loading function at each time
    pub inputs: Vec<Input>,
    /// State snapshots
    pub states: Vec<State>,
    /// Outputs (measurement noise applied when enabled)
    pub outputs: Vec<Output>,
    /// Event states
    pub event_states: Vec<EventStates>,
}

impl Trajectory {
    pub fn len(&self) -> usize {
        self.times.len()
    }

    pub fn is_empty(&self) -> bool {
        self.times.is_empty()
    }

    pub fn final_time(&self) -> Option<f64> {
        self.times.last().copied()
    }

    pub fn final_state(&self) -> Option<&State> {
        self.states.last()
    }

    fn push(&mut self, t: f64, u: &Input, x: &State, z: Output, es: EventStates) {
        self.times.push(t);
        self.inputs.push(u.clone());
        self.states.push(x.clone());
        self.outputs.push(z);
        self.event_states.push(es);
    }
}

/// Resolved termination check.
enum StopCondition<'a> {
    Custom(ThresholdPredicate),
    AnyOf(&'a [&'a str]),
    AnyEvent,
}

impl StopCondition<'_> {
    /// A key absent from `met` counts as not met.
    fn is_met(&self, met: &ThresholdsMet) -> bool {
        match self {
            StopCondition::Custom(f) => f(met),
            StopCondition::AnyOf(keys) => keys.iter().any(|k| met.get(*k).copied().unwrap_or(false)),
            StopCondition::AnyEvent => met.values().any(|v| *v),
        }
    }
}

/// Per-run state shared by the stepping loop and the recorder.
struct Run<'m, M: ?Sized> {
    model: &'m M,
    rng: Option<StdRng>,
    trajectory: Trajectory,
}

impl<M: PrognosticsModel + ?Sized> Run<'_, M> {
    fn check_input(&self, u: &Input) -> SimResult<()> {
        self.model.keys().inputs().check_exact(u, "input")?;
        Ok(())
    }

    fn check_state(&self, x: &State) -> SimResult<()> {
        self.model.keys().states().check_exact(x, "state")?;
        x.ensure_finite("state")?;
        Ok(())
    }

    /// Event states may be empty (no progress reported); otherwise they
    /// cover exactly the declared events.
    fn check_event_states(&self, es: &EventStates) -> SimResult<()> {
        if !es.is_empty() {
            self.model.keys().events().check_exact(es, "event state")?;
        }
        Ok(())
    }

    fn thresholds_met(&self, t: f64, x: &State) -> SimResult<ThresholdsMet> {
        let met = self.model.threshold_met(t, x)?;
        self.model
            .keys()
            .events()
            .check_known(met.keys().map(String::as_str), "thresholds met")?;
        Ok(met)
    }

    fn process_noise(&mut self, x: State, dt: f64) -> SimResult<State> {
        match self.rng.as_mut() {
            Some(rng) => self.model.apply_process_noise(&x, dt, rng),
            None => Ok(x),
        }
    }

    fn record(&mut self, t: f64, u: &Input, x: &State) -> SimResult<()> {
        let z = self.model.output(t, x)?;
        self.model.keys().outputs().check_exact(&z, "output")?;
        let z = match self.rng.as_mut() {
            Some(rng) => self.model.apply_measurement_noise(&z, rng)?,
            None => z,
        };
        let es = self.model.event_state(t, x)?;
        self.check_event_states(&es)?;
        tracing::trace!(t, "recorded sample");
        self.trajectory.push(t, u, x, z, es);
        Ok(())
    }
}

/// Simulate for a fixed duration.
///
/// Runs until `time` unless `config` carries its own termination predicate;
/// event thresholds alone never stop the run.
pub fn simulate_to<M, L>(
    model: &M,
    time: f64,
    future_loading: L,
    first_output: &Output,
    config: SimConfig,
) -> SimResult<Trajectory>
where
    M: PrognosticsModel + ?Sized,
    L: FnMut(f64) -> Input,
{
    if !time.is_finite() || time <= 0.0 {
        return Err(SimError::input(format!(
            "'time' must be a number greater than 0, was {time}"
        )));
    }

    let mut config = config;
    config.horizon = time;
    if config.thresholds_met_eqn.is_none() {
        config.thresholds_met_eqn = Some(Arc::new(|_: &ThresholdsMet| false));
    }
    simulate_to_threshold(model, future_loading, first_output, config, &[])
}

/// Simulate until a threshold is met or the horizon is reached.
///
/// Termination, in priority order: `config.thresholds_met_eqn`; any of
/// `threshold_keys` when non-empty; any declared event.
pub fn simulate_to_threshold<M, L>(
    model: &M,
    mut future_loading: L,
    first_output: &Output,
    config: SimConfig,
    threshold_keys: &[&str],
) -> SimResult<Trajectory>
where
    M: PrognosticsModel + ?Sized,
    L: FnMut(f64) -> Input,
{
    let keys = model.keys();
    if let Some(missing) = keys.outputs().iter().find(|k| !first_output.contains_key(k)) {
        return Err(SimError::input(format!(
            "missing key '{missing}' in 'first_output', must have every key in model outputs"
        )));
    }
    if let Some(unknown) = threshold_keys.iter().find(|k| !keys.events().contains(k)) {
        return Err(SimError::input(format!(
            "threshold key '{unknown}' is not a model event"
        )));
    }
    config.validate()?;

    let SimConfig {
        dt,
        save_freq,
        save_pts,
        horizon,
        x0,
        thresholds_met_eqn,
        noise,
        seed,
    } = config;

    let stop = match thresholds_met_eqn {
        Some(f) => StopCondition::Custom(f),
        None if !threshold_keys.is_empty() => StopCondition::AnyOf(threshold_keys),
        None => StopCondition::AnyEvent,
    };
    let rng = noise.then(|| match seed {
        Some(seed) => StdRng::seed_from_u64(seed),
        None => StdRng::from_entropy(),
    });
    let slack = Tolerances::default().step_slack(dt);

    tracing::debug!(model = model.name(), dt, save_freq, horizon, noise, "starting simulation");

    let mut run = Run {
        model,
        rng,
        trajectory: Trajectory::default(),
    };

    let mut t = 0.0;
    let mut u = future_loading(t);
    run.check_input(&u)?;
    let mut x = match x0 {
        Some(x0) => x0,
        None => model.initialize(&u, first_output)?,
    };
    run.check_state(&x)?;
    run.record(t, &u, &x)?;

    let mut step: u64 = 0;
    let mut next_save: u64 = 1;
    let mut save_pt_index = 0;
    let mut threshold_met = false;

    while !threshold_met && t < horizon {
        step += 1;
        // t is derived from the step count, not accumulated; the last step
        // lands exactly on the horizon
        let mut t_next = (step as f64 * dt).min(horizon);
        if reached(t_next, horizon, slack) {
            t_next = horizon;
        }
        let h = t_next - t;
        t = t_next;

        u = future_loading(t);
        run.check_input(&u)?;
        x = model.next_state(t, &x, &u, h)?;
        x = run.process_noise(x, h)?;
        run.check_state(&x)?;
        threshold_met = stop.is_met(&run.thresholds_met(t, &x)?);

        let mut save = false;
        while reached(t, next_save as f64 * save_freq, slack) {
            next_save += 1;
            save = true;
        }
        while save_pts
            .get(save_pt_index)
            .is_some_and(|&pt| reached(t, pt, slack))
        {
            save_pt_index += 1;
            save = true;
        }
        if save {
            run.record(t, &u, &x)?;
        }
    }

    // Always record final state
    if run.trajectory.final_time() != Some(t) {
        run.record(t, &u, &x)?;
    }

    tracing::debug!(
        t,
        steps = step,
        samples = run.trajectory.len(),
        threshold_met,
        "simulation finished"
    );
    Ok(run.trajectory)
}
