use crate::error::ProvisionError;
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

/// One key written by an operation, as raw encoded values
///
/// `before` is `None` for a new key, `after` is `None` for a removed one.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct StateDelta {
    pub key: String,
    pub before: Option<Vec<u8>>,
    pub after: Option<Vec<u8>>,
}

/// Persistent key-value state owned by exactly one instance or proxy
///
/// Values are bincode encoded. Logic modules that share a store across
/// upgrades must keep using the same keys and value types: entries are only
/// ever added by newer logic, never reinterpreted.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct StateStore {
    entries: BTreeMap<String, Vec<u8>>,
}

impl StateStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Read and decode a value; an absent key is `Ok(None)`
    pub fn get<T: DeserializeOwned>(&self, key: &str) -> Result<Option<T>, ProvisionError> {
        match self.entries.get(key) {
            Some(raw) => Ok(Some(bincode::deserialize(raw)?)),
            None => Ok(None),
        }
    }

    /// Read a value, falling back to `T::default()` for absent keys
    pub fn get_or_default<T: DeserializeOwned + Default>(
        &self,
        key: &str,
    ) -> Result<T, ProvisionError> {
        Ok(self.get(key)?.unwrap_or_default())
    }

    pub fn set<T: Serialize>(&mut self, key: impl Into<String>, value: &T) -> Result<(), ProvisionError> {
        let raw = bincode::serialize(value)?;
        self.entries.insert(key.into(), raw);
        Ok(())
    }

    /// Remove a key, returning whether it was present
    pub fn remove(&mut self, key: &str) -> bool {
        self.entries.remove(key).is_some()
    }

    pub fn contains(&self, key: &str) -> bool {
        self.entries.contains_key(key)
    }

    pub fn raw(&self, key: &str) -> Option<&[u8]> {
        self.entries.get(key).map(Vec::as_slice)
    }

    pub fn keys(&self) -> impl Iterator<Item = &str> {
        self.entries.keys().map(String::as_str)
    }

    /// Keys starting with `prefix`, in order
    pub fn keys_with_prefix<'a>(&'a self, prefix: &'a str) -> impl Iterator<Item = &'a str> + 'a {
        self.entries
            .range(prefix.to_string()..)
            .take_while(move |(key, _)| key.starts_with(prefix))
            .map(|(key, _)| key.as_str())
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Keys that differ between `self` and `after`, in key order
    pub fn delta_to(&self, after: &StateStore) -> Vec<StateDelta> {
        let mut deltas: Vec<StateDelta> = after
            .entries
            .iter()
            .filter(|(key, value)| self.entries.get(*key) != Some(*value))
            .map(|(key, value)| StateDelta {
                key: key.clone(),
                before: self.entries.get(key).cloned(),
                after: Some(value.clone()),
            })
            .collect();
        deltas.extend(
            self.entries
                .iter()
                .filter(|(key, _)| !after.entries.contains_key(*key))
                .map(|(key, value)| StateDelta {
                    key: key.clone(),
                    before: Some(value.clone()),
                    after: None,
                }),
        );
        deltas.sort_by(|a, b| a.key.cmp(&b.key));
        deltas
    }
}
