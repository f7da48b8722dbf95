//! pm-sim: prognostics model contract and time-stepping simulation.
//!
//! This crate provides:
//! - The `PrognosticsModel` trait for degradation models
//! - Parameter storage with noise configuration
//! - Process and measurement noise strategies
//! - Fixed-step simulation to a horizon or to event thresholds
//! - A factory assembling models from closures

pub mod error;
pub mod factory;
pub mod integrator;
pub mod model;
pub mod noise;
pub mod params;
pub mod sim;

pub use error::{SimError, SimResult};
pub use factory::{Equations, FnModel, generate_model};
pub use integrator::{ForwardEuler, Integrator};
pub use model::{
    Derivative, Dynamics, EventStates, Input, ModelCore, ModelKeys, ModelKeysBuilder, Output,
    PrognosticsModel, State, ThresholdsMet, Transition,
};
pub use noise::{CustomNoise, NoiseDistribution, NoiseStrategy};
pub use params::{ParamMap, ParamValue, Parameters, default_parameters, param_map};
pub use sim::{SimConfig, ThresholdPredicate, Trajectory, simulate_to, simulate_to_threshold};
