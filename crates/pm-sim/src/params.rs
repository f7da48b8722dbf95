//! Model parameter store.
//!
//! Merges base defaults, model defaults and caller overrides, and keeps the
//! noise strategies in sync with the `*_noise` / `*_noise_dist` entries.
//! All post-construction changes go through [`Parameters::set_config`].

use std::collections::BTreeMap;

use pm_core::{KeySet, NamedValues};

use crate::error::{SimError, SimResult};
use crate::model::ModelKeys;
use crate::noise::{CustomNoise, NoiseDistribution, NoiseStrategy, validate_scales};

pub const PROCESS_NOISE: &str = "process_noise";
pub const MEASUREMENT_NOISE: &str = "measurement_noise";
pub const PROCESS_NOISE_DIST: &str = "process_noise_dist";
pub const MEASUREMENT_NOISE_DIST: &str = "measurement_noise_dist";

pub const DEFAULT_PROCESS_NOISE: f64 = 0.1;
pub const DEFAULT_MEASUREMENT_NOISE: f64 = 0.0;

/// A single configuration value.
#[derive(Clone, Debug, PartialEq)]
pub enum ParamValue {
    Real(f64),
    Flag(bool),
    Text(String),
    /// Per-key table, e.g. one noise scale per state.
    Table(NamedValues),
    /// Custom noise function (only meaningful for the noise entries).
    Noise(CustomNoise),
}

impl ParamValue {
    pub fn kind(&self) -> &'static str {
        match self {
            ParamValue::Real(_) => "real",
            ParamValue::Flag(_) => "flag",
            ParamValue::Text(_) => "text",
            ParamValue::Table(_) => "table",
            ParamValue::Noise(_) => "noise function",
        }
    }

    pub fn as_real(&self) -> Option<f64> {
        match self {
            ParamValue::Real(v) => Some(*v),
            _ => None,
        }
    }

    pub fn as_flag(&self) -> Option<bool> {
        match self {
            ParamValue::Flag(v) => Some(*v),
            _ => None,
        }
    }

    pub fn as_text(&self) -> Option<&str> {
        match self {
            ParamValue::Text(v) => Some(v),
            _ => None,
        }
    }

    pub fn as_table(&self) -> Option<&NamedValues> {
        match self {
            ParamValue::Table(v) => Some(v),
            _ => None,
        }
    }
}

impl From<f64> for ParamValue {
    fn from(v: f64) -> Self {
        ParamValue::Real(v)
    }
}

impl From<bool> for ParamValue {
    fn from(v: bool) -> Self {
        ParamValue::Flag(v)
    }
}

impl From<&str> for ParamValue {
    fn from(v: &str) -> Self {
        ParamValue::Text(v.to_string())
    }
}

impl From<String> for ParamValue {
    fn from(v: String) -> Self {
        ParamValue::Text(v)
    }
}

impl From<NamedValues> for ParamValue {
    fn from(v: NamedValues) -> Self {
        ParamValue::Table(v)
    }
}

impl From<CustomNoise> for ParamValue {
    fn from(v: CustomNoise) -> Self {
        ParamValue::Noise(v)
    }
}

/// Configuration name → value.
pub type ParamMap = BTreeMap<String, ParamValue>;

/// Build a [`ParamMap`] from `(name, value)` pairs.
pub fn param_map<I, K, V>(entries: I) -> ParamMap
where
    I: IntoIterator<Item = (K, V)>,
    K: Into<String>,
    V: Into<ParamValue>,
{
    entries
        .into_iter()
        .map(|(k, v)| (k.into(), v.into()))
        .collect()
}

/// Base defaults shared by every model.
pub fn default_parameters() -> ParamMap {
    param_map([
        (PROCESS_NOISE, DEFAULT_PROCESS_NOISE),
        (MEASUREMENT_NOISE, DEFAULT_MEASUREMENT_NOISE),
    ])
}

/// Which side of the model a noise entry perturbs.
#[derive(Clone, Copy, Debug)]
enum NoiseSide {
    Process,
    Measurement,
}

impl NoiseSide {
    fn of(name: &str) -> Option<Self> {
        match name {
            PROCESS_NOISE | PROCESS_NOISE_DIST => Some(NoiseSide::Process),
            MEASUREMENT_NOISE | MEASUREMENT_NOISE_DIST => Some(NoiseSide::Measurement),
            _ => None,
        }
    }

    fn scale_key(self) -> &'static str {
        match self {
            NoiseSide::Process => PROCESS_NOISE,
            NoiseSide::Measurement => MEASUREMENT_NOISE,
        }
    }

    fn dist_key(self) -> &'static str {
        match self {
            NoiseSide::Process => PROCESS_NOISE_DIST,
            NoiseSide::Measurement => MEASUREMENT_NOISE_DIST,
        }
    }

    fn keys(self, keys: &ModelKeys) -> &KeySet {
        match self {
            NoiseSide::Process => keys.states(),
            NoiseSide::Measurement => keys.outputs(),
        }
    }
}

/// Merged, normalized model configuration.
#[derive(Clone, Debug)]
pub struct Parameters {
    values: ParamMap,
    process_noise: NoiseStrategy,
    measurement_noise: NoiseStrategy,
}

impl Parameters {
    /// Merge `model_defaults` and then `overrides` over the base defaults.
    ///
    /// An override must have the same value kind as the default it replaces;
    /// the noise entries additionally accept tables and noise functions.
    pub fn new(keys: &ModelKeys, model_defaults: ParamMap, overrides: ParamMap) -> SimResult<Self> {
        let mut values = default_parameters();
        values.extend(model_defaults);
        for (name, value) in overrides {
            check_kind(&values, &name, &value)?;
            values.insert(name, value);
        }

        let process = values
            .get(PROCESS_NOISE)
            .cloned()
            .unwrap_or(ParamValue::Real(DEFAULT_PROCESS_NOISE));
        let measurement = values
            .get(MEASUREMENT_NOISE)
            .cloned()
            .unwrap_or(ParamValue::Real(DEFAULT_MEASUREMENT_NOISE));

        let mut params = Self {
            values,
            process_noise: NoiseStrategy::Custom(CustomNoise::new(|x, _| x.clone())),
            measurement_noise: NoiseStrategy::Custom(CustomNoise::new(|z, _| z.clone())),
        };
        params.set_config(keys, PROCESS_NOISE, process)?;
        params.set_config(keys, MEASUREMENT_NOISE, measurement)?;
        Ok(params)
    }

    /// Set one configuration entry.
    ///
    /// Setting a noise scale or a noise distribution re-normalizes that side
    /// and swaps the active strategy. On error nothing is changed.
    pub fn set_config(&mut self, keys: &ModelKeys, name: &str, value: ParamValue) -> SimResult<()> {
        let Some(side) = NoiseSide::of(name) else {
            check_kind(&self.values, name, &value)?;
            self.values.insert(name.to_string(), value);
            return Ok(());
        };

        let (scale, dist) = if name == side.scale_key() {
            (&value, self.values.get(side.dist_key()))
        } else {
            let scale = self
                .values
                .get(side.scale_key())
                .ok_or_else(|| SimError::schema(format!("missing '{}'", side.scale_key())))?;
            (scale, Some(&value))
        };

        let (normalized, strategy) = resolve_noise(side, scale, dist, side.keys(keys))?;
        tracing::debug!(
            entry = side.scale_key(),
            dist = strategy.distribution().map(|d| d.as_str()).unwrap_or("custom"),
            "noise strategy selected"
        );

        if name == side.dist_key() {
            self.values.insert(name.to_string(), value);
        }
        self.values.insert(side.scale_key().to_string(), normalized);
        match side {
            NoiseSide::Process => self.process_noise = strategy,
            NoiseSide::Measurement => self.measurement_noise = strategy,
        }
        Ok(())
    }

    pub fn get(&self, name: &str) -> Option<&ParamValue> {
        self.values.get(name)
    }

    /// Real-valued entry, if present and real.
    pub fn real(&self, name: &str) -> Option<f64> {
        self.get(name).and_then(ParamValue::as_real)
    }

    pub fn contains(&self, name: &str) -> bool {
        self.values.contains_key(name)
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, &ParamValue)> {
        self.values.iter().map(|(k, v)| (k.as_str(), v))
    }

    pub fn process_noise(&self) -> &NoiseStrategy {
        &self.process_noise
    }

    pub fn measurement_noise(&self) -> &NoiseStrategy {
        &self.measurement_noise
    }
}

fn check_kind(values: &ParamMap, name: &str, value: &ParamValue) -> SimResult<()> {
    if NoiseSide::of(name).is_some() {
        return Ok(());
    }
    match values.get(name) {
        Some(existing) if existing.kind() != value.kind() => Err(SimError::schema(format!(
            "cannot merge '{name}': expected {}, got {}",
            existing.kind(),
            value.kind()
        ))),
        _ => Ok(()),
    }
}

/// Normalize a noise entry and pick its strategy.
///
/// The distribution name is validated even when a custom function wins.
fn resolve_noise(
    side: NoiseSide,
    scale: &ParamValue,
    dist: Option<&ParamValue>,
    keys: &KeySet,
) -> SimResult<(ParamValue, NoiseStrategy)> {
    let dist = match dist {
        None => NoiseDistribution::Gaussian,
        Some(ParamValue::Text(name)) => name.parse()?,
        Some(other) => {
            return Err(SimError::config(format!(
                "'{}' must be text, got {}",
                side.dist_key(),
                other.kind()
            )));
        }
    };

    let scales = match scale {
        ParamValue::Noise(f) => {
            return Ok((scale.clone(), NoiseStrategy::Custom(f.clone())));
        }
        ParamValue::Real(v) => keys.broadcast(*v),
        ParamValue::Table(table) => {
            keys.check_exact(table, side.scale_key())?;
            table.clone()
        }
        other => {
            return Err(SimError::config(format!(
                "'{}' must be a number, a table or a noise function, got {}",
                side.scale_key(),
                other.kind()
            )));
        }
    };
    validate_scales(&scales, side.scale_key())?;

    Ok((
        ParamValue::Table(scales.clone()),
        NoiseStrategy::Sampled { dist, scales },
    ))
}
