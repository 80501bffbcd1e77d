// src/settings.rs

//! Configuration axes: settings and options
//!
//! Both are ordered mappings from axis name to string value and both feed
//! the package identity. Settings (os, compiler, build_type, arch, ...)
//! propagate top-down from the consuming root profile, narrowed to each
//! recipe's declared axes; options are package-local booleans/enums unless
//! a dependent explicitly forces one on a named dependency.

use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fmt;

/// Root-profile settings, narrowed per node to its declared axes
///
/// Backed by a `BTreeMap` so iteration order is canonical regardless of
/// insertion order; identity hashing relies on this.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Settings {
    values: BTreeMap<String, String>,
}

impl Settings {
    pub fn new() -> Self {
        Self::default()
    }

    /// Build from (axis, value) pairs
    pub fn from_pairs<I, K, V>(pairs: I) -> Self
    where
        I: IntoIterator<Item = (K, V)>,
        K: Into<String>,
        V: Into<String>,
    {
        let mut settings = Self::new();
        for (axis, value) in pairs {
            settings.set(axis, value);
        }
        settings
    }

    /// Set an axis value; an empty value removes the axis
    ///
    /// Empty axes are never stored so they cannot leak into identity
    /// hashing as empty strings.
    pub fn set(&mut self, axis: impl Into<String>, value: impl Into<String>) {
        let axis = axis.into();
        let value = value.into();
        if value.is_empty() {
            self.values.remove(&axis);
        } else {
            self.values.insert(axis, value);
        }
    }

    pub fn get(&self, axis: &str) -> Option<&str> {
        self.values.get(axis).map(String::as_str)
    }

    pub fn remove(&mut self, axis: &str) -> Option<String> {
        self.values.remove(axis)
    }

    /// Restrict to the axes a recipe declares
    ///
    /// Axes outside the declared set are dropped entirely, so a recipe that
    /// narrows its axis set gets a smaller identity input rather than a
    /// drifted one.
    pub fn narrowed(&self, declared: &[String]) -> Self {
        let values = self
            .values
            .iter()
            .filter(|(axis, _)| declared.iter().any(|d| d == *axis))
            .map(|(axis, value)| (axis.clone(), value.clone()))
            .collect();
        Self { values }
    }

    /// Apply recipe-level pins on top of inherited values
    /// (e.g. a tool-only dependency fixing `build_type=Release`)
    pub fn apply_pins(&mut self, pins: &BTreeMap<String, String>) {
        for (axis, value) in pins {
            self.set(axis.clone(), value.clone());
        }
    }

    /// Iterate axes in canonical (sorted) order
    pub fn iter(&self) -> impl Iterator<Item = (&str, &str)> {
        self.values.iter().map(|(k, v)| (k.as_str(), v.as_str()))
    }

    pub fn is_empty(&self) -> bool {
        self.values.is_empty()
    }

    pub fn len(&self) -> usize {
        self.values.len()
    }
}

impl fmt::Display for Settings {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let rendered: Vec<String> = self.iter().map(|(k, v)| format!("{}={}", k, v)).collect();
        write!(f, "{}", rendered.join(", "))
    }
}

/// Package-local option values
///
/// Node-local unless a dependent explicitly forces a named option on a
/// named dependency; forced values are resolved during graph expansion.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Options {
    values: BTreeMap<String, String>,
}

impl Options {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn from_pairs<I, K, V>(pairs: I) -> Self
    where
        I: IntoIterator<Item = (K, V)>,
        K: Into<String>,
        V: Into<String>,
    {
        let mut options = Self::new();
        for (option, value) in pairs {
            options.set(option, value);
        }
        options
    }

    /// Set an option value; an empty value removes the option
    pub fn set(&mut self, option: impl Into<String>, value: impl Into<String>) {
        let option = option.into();
        let value = value.into();
        if value.is_empty() {
            self.values.remove(&option);
        } else {
            self.values.insert(option, value);
        }
    }

    pub fn get(&self, option: &str) -> Option<&str> {
        self.values.get(option).map(String::as_str)
    }

    /// Iterate options in canonical (sorted) order
    pub fn iter(&self) -> impl Iterator<Item = (&str, &str)> {
        self.values.iter().map(|(k, v)| (k.as_str(), v.as_str()))
    }

    pub fn is_empty(&self) -> bool {
        self.values.is_empty()
    }

    pub fn len(&self) -> usize {
        self.values.len()
    }
}

impl fmt::Display for Options {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let rendered: Vec<String> = self.iter().map(|(k, v)| format!("{}={}", k, v)).collect();
        write!(f, "{}", rendered.join(", "))
    }
}
