//! Ordered identifier sets for model states, inputs, outputs and events.

use core::fmt;

use crate::error::{CoreError, CoreResult};
use crate::values::NamedValues;

/// Ordered set of unique string identifiers.
///
/// Declaration order is preserved; duplicates are rejected at construction.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
#[cfg_attr(
    feature = "serde",
    derive(serde::Serialize, serde::Deserialize),
    serde(try_from = "Vec<String>", into = "Vec<String>")
)]
pub struct KeySet {
    keys: Vec<String>,
}

impl KeySet {
    /// Build a key set, rejecting duplicate identifiers.
    ///
    /// `what` names the set in error messages (e.g. "states").
    pub fn new<I, S>(keys: I, what: &'static str) -> CoreResult<Self>
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        let mut out: Vec<String> = Vec::new();
        for key in keys {
            let key = key.into();
            if out.contains(&key) {
                return Err(CoreError::DuplicateKey { what, key });
            }
            out.push(key);
        }
        Ok(Self { keys: out })
    }

    pub fn empty() -> Self {
        Self::default()
    }

    pub fn len(&self) -> usize {
        self.keys.len()
    }

    pub fn is_empty(&self) -> bool {
        self.keys.is_empty()
    }

    pub fn contains(&self, key: &str) -> bool {
        self.keys.iter().any(|k| k == key)
    }

    pub fn iter(&self) -> impl Iterator<Item = &str> {
        self.keys.iter().map(String::as_str)
    }

    pub fn as_slice(&self) -> &[String] {
        &self.keys
    }

    /// Check that `values` has exactly these keys: none missing, none extra.
    pub fn check_exact(&self, values: &NamedValues, what: &'static str) -> CoreResult<()> {
        self.check_covers(values, what)?;
        self.check_known(values.keys(), what)
    }

    /// Check that every identifier in `keys` belongs to this set.
    pub fn check_known<'a, I>(&self, keys: I, what: &'static str) -> CoreResult<()>
    where
        I: IntoIterator<Item = &'a str>,
    {
        match keys.into_iter().find(|k| !self.contains(k)) {
            Some(extra) => Err(CoreError::UnexpectedKey {
                what,
                key: extra.to_string(),
            }),
            None => Ok(()),
        }
    }

    /// Check that every key of this set is present in `values`.
    ///
    /// Extra entries in `values` are tolerated.
    pub fn check_covers(&self, values: &NamedValues, what: &'static str) -> CoreResult<()> {
        match self.iter().find(|k| !values.contains_key(k)) {
            Some(missing) => Err(CoreError::MissingKey {
                what,
                key: missing.to_string(),
            }),
            None => Ok(()),
        }
    }

    /// Map every key to the same value.
    pub fn broadcast(&self, value: f64) -> NamedValues {
        self.iter().map(|k| (k, value)).collect()
    }
}

impl fmt::Display for KeySet {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "[{}]", self.keys.join(", "))
    }
}

impl TryFrom<Vec<String>> for KeySet {
    type Error = CoreError;

    fn try_from(keys: Vec<String>) -> CoreResult<Self> {
        Self::new(keys, "key set")
    }
}

impl From<KeySet> for Vec<String> {
    fn from(set: KeySet) -> Self {
        set.keys
    }
}

impl<'a> IntoIterator for &'a KeySet {
    type Item = &'a String;
    type IntoIter = std::slice::Iter<'a, String>;

    fn into_iter(self) -> Self::IntoIter {
        self.keys.iter()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn check_known_allows_subsets_only() {
        let events = KeySet::new(["eol", "fade"], "events").unwrap();
        assert!(events.check_known(["fade"], "thresholds").is_ok());
        assert!(events.check_known([], "thresholds").is_ok());
        assert_eq!(
            events.check_known(["eol", "bogus"], "thresholds"),
            Err(CoreError::UnexpectedKey {
                what: "thresholds",
                key: "bogus".to_string(),
            })
        );
    }

    #[test]
    fn preserves_declaration_order() {
        let set = KeySet::new(["b", "a", "c"], "states").unwrap();
        let keys: Vec<&str> = set.iter().collect();
        assert_eq!(keys, vec!["b", "a", "c"]);
        assert_eq!(set.to_string(), "[b, a, c]");
    }

    #[test]
    fn rejects_duplicates() {
        let err = KeySet::new(["x", "y", "x"], "states").unwrap_err();
        assert_eq!(
            err,
            CoreError::DuplicateKey {
                what: "states",
                key: "x".to_string()
            }
        );
    }

    #[test]
    fn check_exact_reports_missing_and_extra() {
        let set = KeySet::new(["a", "b"], "states").unwrap();

        let ok: NamedValues = [("a", 1.0), ("b", 2.0)].into_iter().collect();
        assert!(set.check_exact(&ok, "state").is_ok());

        let missing: NamedValues = [("a", 1.0)].into_iter().collect();
        assert!(matches!(
            set.check_exact(&missing, "state"),
            Err(CoreError::MissingKey { key, .. }) if key == "b"
        ));

        let extra: NamedValues = [("a", 1.0), ("b", 2.0), ("c", 3.0)].into_iter().collect();
        assert!(matches!(
            set.check_exact(&extra, "state"),
            Err(CoreError::UnexpectedKey { key, .. }) if key == "c"
        ));
        assert!(set.check_covers(&extra, "state").is_ok());
    }

    #[test]
    fn broadcast_assigns_every_key() {
        let set = KeySet::new(["a", "b"], "states").unwrap();
        let values = set.broadcast(0.2);
        assert_eq!(values.len(), 2);
        assert_eq!(values["a"], 0.2);
        assert_eq!(values["b"], 0.2);
    }
}
