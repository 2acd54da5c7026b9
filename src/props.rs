//! String-keyed property bags attached to atoms, bonds and molecules.
//!
//! Each bag is split into user properties, which survive sanitization, and
//! computed properties, which the sanitizer's first stage wipes.

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum PropValue {
    Bool(bool),
    Int(i64),
    Float(f64),
    Str(String),
}

impl From<bool> for PropValue {
    fn from(v: bool) -> Self {
        Self::Bool(v)
    }
}

impl From<i64> for PropValue {
    fn from(v: i64) -> Self {
        Self::Int(v)
    }
}

impl From<i32> for PropValue {
    fn from(v: i32) -> Self {
        Self::Int(v as i64)
    }
}

impl From<f64> for PropValue {
    fn from(v: f64) -> Self {
        Self::Float(v)
    }
}

impl From<&str> for PropValue {
    fn from(v: &str) -> Self {
        Self::Str(v.to_owned())
    }
}

impl From<String> for PropValue {
    fn from(v: String) -> Self {
        Self::Str(v)
    }
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct PropertyBag {
    user: BTreeMap<String, PropValue>,
    computed: BTreeMap<String, PropValue>,
}

impl PropertyBag {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn is_empty(&self) -> bool {
        self.user.is_empty() && self.computed.is_empty()
    }

    /// Sets a user property. A computed property with the same key is
    /// shadowed, not removed.
    pub fn set(&mut self, key: impl Into<String>, value: impl Into<PropValue>) {
        self.user.insert(key.into(), value.into());
    }

    pub fn set_computed(&mut self, key: impl Into<String>, value: impl Into<PropValue>) {
        self.computed.insert(key.into(), value.into());
    }

    /// Looks up `key` among user properties first, then computed ones.
    pub fn get(&self, key: &str) -> Option<&PropValue> {
        self.user.get(key).or_else(|| self.computed.get(key))
    }

    pub fn has(&self, key: &str) -> bool {
        self.get(key).is_some()
    }

    pub fn is_computed(&self, key: &str) -> bool {
        !self.user.contains_key(key) && self.computed.contains_key(key)
    }

    /// Removes `key` from both partitions and returns the user value if any.
    pub fn clear(&mut self, key: &str) -> Option<PropValue> {
        let computed = self.computed.remove(key);
        self.user.remove(key).or(computed)
    }

    pub fn clear_computed(&mut self) {
        self.computed.clear();
    }

    pub fn get_int(&self, key: &str) -> Option<i64> {
        match self.get(key)? {
            PropValue::Int(v) => Some(*v),
            PropValue::Bool(b) => Some(*b as i64),
            _ => None,
        }
    }

    pub fn get_float(&self, key: &str) -> Option<f64> {
        match self.get(key)? {
            PropValue::Float(v) => Some(*v),
            PropValue::Int(v) => Some(*v as f64),
            _ => None,
        }
    }

    pub fn get_bool(&self, key: &str) -> Option<bool> {
        match self.get(key)? {
            PropValue::Bool(b) => Some(*b),
            _ => None,
        }
    }

    pub fn get_str(&self, key: &str) -> Option<&str> {
        match self.get(key)? {
            PropValue::Str(s) => Some(s),
            _ => None,
        }
    }

    /// All visible keys in sorted order, user and computed merged.
    pub fn keys(&self) -> Vec<&str> {
        let mut keys: Vec<&str> = self
            .user
            .keys()
            .chain(self.computed.keys())
            .map(String::as_str)
            .collect();
        keys.sort_unstable();
        keys.dedup();
        keys
    }

    pub fn user_props(&self) -> impl Iterator<Item = (&str, &PropValue)> {
        self.user.iter().map(|(k, v)| (k.as_str(), v))
    }

    pub(crate) fn computed_props(&self) -> impl Iterator<Item = (&str, &PropValue)> {
        self.computed.iter().map(|(k, v)| (k.as_str(), v))
    }

    pub(crate) fn merge_user_from(&mut self, other: &PropertyBag) {
        for (k, v) in &other.user {
            self.user.insert(k.clone(), v.clone());
        }
    }
}
