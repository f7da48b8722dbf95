//! Named scalar maps.
//!
//! States, inputs, outputs and event states all share one representation:
//! an identifier → `f64` map. Key-set conformance is checked against a
//! [`KeySet`](crate::KeySet), not enforced by the map itself.

use std::collections::BTreeMap;
use std::ops::Index;

use crate::error::{CoreError, CoreResult};
use crate::numeric::Real;

/// Map from identifier to real value.
#[derive(Clone, Debug, Default, PartialEq)]
#[cfg_attr(
    feature = "serde",
    derive(serde::Serialize, serde::Deserialize),
    serde(transparent)
)]
pub struct NamedValues(BTreeMap<String, Real>);

impl NamedValues {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn get(&self, key: &str) -> Option<Real> {
        self.0.get(key).copied()
    }

    pub fn get_mut(&mut self, key: &str) -> Option<&mut Real> {
        self.0.get_mut(key)
    }

    /// Insert a value, returning the previous one if the key existed.
    pub fn insert(&mut self, key: impl Into<String>, value: Real) -> Option<Real> {
        self.0.insert(key.into(), value)
    }

    pub fn contains_key(&self, key: &str) -> bool {
        self.0.contains_key(key)
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    pub fn keys(&self) -> impl Iterator<Item = &str> {
        self.0.keys().map(String::as_str)
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, Real)> {
        self.0.iter().map(|(k, v)| (k.as_str(), *v))
    }

    /// Element-wise `self + factor * other`.
    ///
    /// Both maps must carry the same keys.
    pub fn add_scaled(&self, other: &NamedValues, factor: Real) -> CoreResult<NamedValues> {
        let mut out = self.clone();
        for (key, value) in out.0.iter_mut() {
            let delta = other.get(key).ok_or_else(|| CoreError::MissingKey {
                what: "derivative",
                key: key.clone(),
            })?;
            *value += delta * factor;
        }
        if let Some(extra) = other.keys().find(|k| !self.contains_key(k)) {
            return Err(CoreError::UnexpectedKey {
                what: "derivative",
                key: extra.to_string(),
            });
        }
        Ok(out)
    }

    /// Fail on the first NaN or infinite entry.
    pub fn ensure_finite(&self, what: &str) -> CoreResult<()> {
        match self.0.iter().find(|(_, v)| !v.is_finite()) {
            Some((key, value)) => Err(CoreError::NonFinite {
                what: format!("{what}['{key}']"),
                value: *value,
            }),
            None => Ok(()),
        }
    }
}

impl<K: Into<String>> FromIterator<(K, Real)> for NamedValues {
    fn from_iter<I: IntoIterator<Item = (K, Real)>>(iter: I) -> Self {
        Self(iter.into_iter().map(|(k, v)| (k.into(), v)).collect())
    }
}

impl<K: Into<String>> Extend<(K, Real)> for NamedValues {
    fn extend<I: IntoIterator<Item = (K, Real)>>(&mut self, iter: I) {
        self.0.extend(iter.into_iter().map(|(k, v)| (k.into(), v)));
    }
}

impl From<BTreeMap<String, Real>> for NamedValues {
    fn from(map: BTreeMap<String, Real>) -> Self {
        Self(map)
    }
}

impl From<NamedValues> for BTreeMap<String, Real> {
    fn from(values: NamedValues) -> Self {
        values.0
    }
}

/// # Panics
///
/// Panics if `key` is absent. Use [`NamedValues::get`] for a fallible lookup.
impl Index<&str> for NamedValues {
    type Output = Real;

    fn index(&self, key: &str) -> &Real {
        match self.0.get(key) {
            Some(v) => v,
            None => panic!("no value named '{key}'"),
        }
    }
}

impl<'a> IntoIterator for &'a NamedValues {
    type Item = (&'a String, &'a Real);
    type IntoIter = std::collections::btree_map::Iter<'a, String, Real>;

    fn into_iter(self) -> Self::IntoIter {
        self.0.iter()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn add_scaled_is_euler_update() {
        let x: NamedValues = [("a", 1.0), ("b", -2.0)].into_iter().collect();
        let dx: NamedValues = [("a", 0.5), ("b", 4.0)].into_iter().collect();
        let next = x.add_scaled(&dx, 0.1).unwrap();
        assert!((next["a"] - 1.05).abs() < 1e-12);
        assert!((next["b"] - -1.6).abs() < 1e-12);
        // source untouched
        assert_eq!(x["a"], 1.0);
    }

    #[test]
    fn add_scaled_rejects_mismatched_keys() {
        let x: NamedValues = [("a", 1.0), ("b", 2.0)].into_iter().collect();
        let short: NamedValues = [("a", 1.0)].into_iter().collect();
        assert!(matches!(
            x.add_scaled(&short, 1.0),
            Err(CoreError::MissingKey { key, .. }) if key == "b"
        ));

        let long: NamedValues = [("a", 1.0), ("b", 2.0), ("c", 3.0)].into_iter().collect();
        assert!(matches!(
            x.add_scaled(&long, 1.0),
            Err(CoreError::UnexpectedKey { key, .. }) if key == "c"
        ));
    }

    #[test]
    fn ensure_finite_names_offending_key() {
        let x: NamedValues = [("a", 1.0), ("b", f64::INFINITY)].into_iter().collect();
        let err = x.ensure_finite("state").unwrap_err();
        assert!(err.to_string().contains("state['b']"));
    }

    #[test]
    #[should_panic(expected = "no value named 'missing'")]
    fn index_panics_on_missing_key() {
        let x = NamedValues::new();
        let _ = x["missing"];
    }
}
