//! Token to value mapping.

use crate::record::{stringify_value, Record};
use std::collections::HashMap;

/// Ordered mapping from placeholder tokens to replacement text.
///
/// Tokens are unique and always of the form `{key}`. Iteration follows
/// insertion order, which is the order substitution applies them in.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Replacements {
    pairs: Vec<(String, String)>,
    index: HashMap<String, usize>,
}

impl Replacements {
    /// Create an empty mapping.
    pub fn new() -> Self {
        Self::default()
    }

    /// Build the mapping for a record: `{key}` for every field, values stringified.
    pub fn from_record(record: &Record) -> Self {
        record
            .iter()
            .map(|(key, value)| (key.as_str(), stringify_value(value)))
            .collect()
    }

    /// Map `{key}` to `value`. An existing token keeps its position and
    /// takes the new value.
    pub fn insert(&mut self, key: &str, value: impl Into<String>) {
        let token = format!("{{{}}}", key);
        let value = value.into();
        match self.index.get(&token) {
            Some(&i) => self.pairs[i].1 = value,
            None => {
                self.index.insert(token.clone(), self.pairs.len());
                self.pairs.push((token, value));
            }
        }
    }

    /// Builder form of [`insert`](Self::insert).
    pub fn with(mut self, key: &str, value: impl Into<String>) -> Self {
        self.insert(key, value);
        self
    }

    /// Replacement for a token such as `{full_name}`.
    pub fn get(&self, token: &str) -> Option<&str> {
        self.index.get(token).map(|&i| self.pairs[i].1.as_str())
    }

    /// (token, value) pairs in application order.
    pub fn iter(&self) -> impl Iterator<Item = (&str, &str)> {
        self.pairs.iter().map(|(t, v)| (t.as_str(), v.as_str()))
    }

    /// Number of tokens.
    pub fn len(&self) -> usize {
        self.pairs.len()
    }

    /// Whether the mapping is empty.
    pub fn is_empty(&self) -> bool {
        self.pairs.is_empty()
    }
}

impl<K: AsRef<str>, V: Into<String>> FromIterator<(K, V)> for Replacements {
    fn from_iter<I: IntoIterator<Item = (K, V)>>(iter: I) -> Self {
        let mut replacements = Replacements::new();
        for (key, value) in iter {
            replacements.insert(key.as_ref(), value);
        }
        replacements
    }
}
