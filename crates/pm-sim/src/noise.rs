//! Process and measurement noise strategies.
//!
//! A strategy is chosen once, when the parameter store normalizes the
//! `*_noise` / `*_noise_dist` configuration, and is then only invoked.
//! Process noise samples are multiplied by the step size so that noise
//! accumulates with elapsed time; measurement noise is applied as drawn.

use std::fmt;
use std::str::FromStr;
use std::sync::Arc;

use pm_core::NamedValues;
use rand::RngCore;
use rand_distr::{Distribution, Normal, Triangular, Uniform};

use crate::error::{SimError, SimResult};

/// Named noise distribution selectable through `*_noise_dist`.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub enum NoiseDistribution {
    /// Zero-mean normal, standard deviation = scale.
    #[default]
    Gaussian,
    /// Uniform on `[-scale, scale]`.
    Uniform,
    /// Triangular on `[-scale, scale]` with mode 0.
    Triangular,
}

impl NoiseDistribution {
    pub fn as_str(&self) -> &'static str {
        match self {
            NoiseDistribution::Gaussian => "gaussian",
            NoiseDistribution::Uniform => "uniform",
            NoiseDistribution::Triangular => "triangular",
        }
    }

    fn sample(&self, scale: f64, rng: &mut dyn RngCore) -> SimResult<f64> {
        let value = match self {
            NoiseDistribution::Gaussian => Normal::new(0.0, scale)
                .map_err(|e| SimError::config(format!("gaussian noise: {e}")))?
                .sample(rng),
            NoiseDistribution::Uniform => Uniform::new_inclusive(-scale, scale).sample(rng),
            NoiseDistribution::Triangular => Triangular::new(-scale, scale, 0.0)
                .map_err(|e| SimError::config(format!("triangular noise: {e}")))?
                .sample(rng),
        };
        Ok(value)
    }
}

impl FromStr for NoiseDistribution {
    type Err = SimError;

    /// Case-insensitive; `normal` is accepted as an alias for `gaussian`.
    fn from_str(s: &str) -> SimResult<Self> {
        match s.to_ascii_lowercase().as_str() {
            "gaussian" | "normal" => Ok(NoiseDistribution::Gaussian),
            "uniform" => Ok(NoiseDistribution::Uniform),
            "triangular" => Ok(NoiseDistribution::Triangular),
            other => Err(SimError::config(format!(
                "unsupported noise distribution '{other}'"
            ))),
        }
    }
}

impl fmt::Display for NoiseDistribution {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

type NoiseFn = dyn Fn(&NamedValues, f64) -> NamedValues + Send + Sync;

/// User-supplied noise function that replaces the built-in distributions.
///
/// Receives the clean values and a step size, and returns the perturbed
/// values. For process noise the step size is the simulation `dt`; for
/// measurement noise it is always `1.0`.
#[derive(Clone)]
pub struct CustomNoise(Arc<NoiseFn>);

impl CustomNoise {
    pub fn new<F>(f: F) -> Self
    where
        F: Fn(&NamedValues, f64) -> NamedValues + Send + Sync + 'static,
    {
        Self(Arc::new(f))
    }

    pub fn call(&self, values: &NamedValues, dt: f64) -> NamedValues {
        (self.0)(values, dt)
    }
}

impl fmt::Debug for CustomNoise {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("CustomNoise(..)")
    }
}

/// Two handles are equal when they share the same function.
impl PartialEq for CustomNoise {
    fn eq(&self, other: &Self) -> bool {
        Arc::ptr_eq(&self.0, &other.0)
    }
}

/// Active noise behaviour for one side (process or measurement).
#[derive(Clone, Debug, PartialEq)]
pub enum NoiseStrategy {
    /// Per-key scales fed to a named distribution.
    Sampled {
        dist: NoiseDistribution,
        scales: NamedValues,
    },
    /// Full override by a user function.
    Custom(CustomNoise),
}

impl NoiseStrategy {
    pub fn distribution(&self) -> Option<NoiseDistribution> {
        match self {
            NoiseStrategy::Sampled { dist, .. } => Some(*dist),
            NoiseStrategy::Custom(_) => None,
        }
    }

    pub fn scales(&self) -> Option<&NamedValues> {
        match self {
            NoiseStrategy::Sampled { scales, .. } => Some(scales),
            NoiseStrategy::Custom(_) => None,
        }
    }

    /// Perturb a state, scaling each sample by `dt`.
    pub fn apply_process(
        &self,
        x: &NamedValues,
        dt: f64,
        rng: &mut dyn RngCore,
    ) -> SimResult<NamedValues> {
        self.perturb(x, dt, rng)
    }

    /// Perturb an output; samples are not scaled.
    pub fn apply_measurement(
        &self,
        z: &NamedValues,
        rng: &mut dyn RngCore,
    ) -> SimResult<NamedValues> {
        self.perturb(z, 1.0, rng)
    }

    fn perturb(
        &self,
        values: &NamedValues,
        dt: f64,
        rng: &mut dyn RngCore,
    ) -> SimResult<NamedValues> {
        let (dist, scales) = match self {
            NoiseStrategy::Custom(f) => return Ok(f.call(values, dt)),
            NoiseStrategy::Sampled { dist, scales } => (dist, scales),
        };

        let mut out = values.clone();
        for (key, value) in values.iter() {
            let scale = scales.get(key).ok_or_else(|| pm_core::CoreError::MissingKey {
                what: "noise scales",
                key: key.to_string(),
            })?;
            // zero scale is an exact identity, no draw
            if scale == 0.0 {
                continue;
            }
            let noise = dist.sample(scale, rng)?;
            out.insert(key, value + dt * noise);
        }
        Ok(out)
    }
}

/// Reject negative or non-finite noise scales.
///
/// The sampling range `[-scale, scale]` must itself have a finite width.
pub(crate) fn validate_scales(scales: &NamedValues, what: &str) -> SimResult<()> {
    for (key, scale) in scales.iter() {
        if !scale.is_finite() || scale < 0.0 {
            return Err(SimError::config(format!(
                "{what} scale for '{key}' must be finite and non-negative, was {scale}"
            )));
        }
        if !(2.0 * scale).is_finite() {
            return Err(SimError::config(format!(
                "{what} scale for '{key}' is too large, was {scale}"
            )));
        }
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use rand::SeedableRng;
    use rand::rngs::StdRng;

    fn scales(a: f64, b: f64) -> NamedValues {
        [("a", a), ("b", b)].into_iter().collect()
    }

    #[test]
    fn parses_distribution_names() {
        assert_eq!(
            "Gaussian".parse::<NoiseDistribution>().unwrap(),
            NoiseDistribution::Gaussian
        );
        assert_eq!(
            "NORMAL".parse::<NoiseDistribution>().unwrap(),
            NoiseDistribution::Gaussian
        );
        assert_eq!(
            "uniform".parse::<NoiseDistribution>().unwrap(),
            NoiseDistribution::Uniform
        );
        assert_eq!(
            "Triangular".parse::<NoiseDistribution>().unwrap(),
            NoiseDistribution::Triangular
        );
        assert!(matches!(
            "cauchy".parse::<NoiseDistribution>(),
            Err(SimError::Config { .. })
        ));
    }

    #[test]
    fn uniform_process_noise_stays_in_scaled_band() {
        let strategy = NoiseStrategy::Sampled {
            dist: NoiseDistribution::Uniform,
            scales: scales(1.0, 2.0),
        };
        let x = scales(10.0, -10.0);
        let mut rng = StdRng::seed_from_u64(7);
        for _ in 0..200 {
            let noisy = strategy.apply_process(&x, 0.5, &mut rng).unwrap();
            assert!((noisy["a"] - 10.0).abs() <= 0.5 * 1.0);
            assert!((noisy["b"] + 10.0).abs() <= 0.5 * 2.0);
        }
    }

    #[test]
    fn triangular_measurement_noise_stays_in_band() {
        let strategy = NoiseStrategy::Sampled {
            dist: NoiseDistribution::Triangular,
            scales: scales(0.25, 0.0),
        };
        let z = scales(1.0, 2.0);
        let mut rng = StdRng::seed_from_u64(11);
        for _ in 0..200 {
            let noisy = strategy.apply_measurement(&z, &mut rng).unwrap();
            assert!((noisy["a"] - 1.0).abs() <= 0.25);
            assert_eq!(noisy["b"], 2.0);
        }
    }

    #[test]
    fn gaussian_noise_is_reproducible_with_seed() {
        let strategy = NoiseStrategy::Sampled {
            dist: NoiseDistribution::Gaussian,
            scales: scales(0.3, 0.3),
        };
        let x = scales(1.0, 1.0);
        let a = strategy
            .apply_process(&x, 1.0, &mut StdRng::seed_from_u64(3))
            .unwrap();
        let b = strategy
            .apply_process(&x, 1.0, &mut StdRng::seed_from_u64(3))
            .unwrap();
        assert_eq!(a, b);
        assert_ne!(a, x);
    }

    #[test]
    fn custom_noise_receives_dt() {
        let strategy = NoiseStrategy::Custom(CustomNoise::new(|x, dt| {
            x.iter().map(|(k, v)| (k, v + dt)).collect()
        }));
        let x = scales(1.0, 2.0);
        let mut rng = StdRng::seed_from_u64(0);
        let process = strategy.apply_process(&x, 0.25, &mut rng).unwrap();
        assert_eq!(process["a"], 1.25);
        let measured = strategy.apply_measurement(&x, &mut rng).unwrap();
        assert_eq!(measured["b"], 3.0);
    }

    #[test]
    fn missing_scale_is_an_error() {
        let strategy = NoiseStrategy::Sampled {
            dist: NoiseDistribution::Gaussian,
            scales: [("a", 0.1)].into_iter().collect(),
        };
        let x = scales(1.0, 2.0);
        let err = strategy
            .apply_process(&x, 1.0, &mut StdRng::seed_from_u64(0))
            .unwrap_err();
        assert!(matches!(err, SimError::Core(_)));
    }

    #[test]
    fn validate_scales_rejects_negative_and_nan() {
        assert!(validate_scales(&scales(0.0, 1.0), "process_noise").is_ok());
        assert!(validate_scales(&scales(-0.1, 1.0), "process_noise").is_err());
        assert!(validate_scales(&scales(f64::NAN, 1.0), "process_noise").is_err());
    }

    #[test]
    fn validate_scales_rejects_overflowing_range() {
        let err = validate_scales(&scales(0.1, f64::MAX), "measurement_noise").unwrap_err();
        assert!(matches!(err, SimError::Config { what } if what.contains("too large")));
        assert!(validate_scales(&scales(0.1, f64::MAX / 4.0), "measurement_noise").is_ok());
    }
}
