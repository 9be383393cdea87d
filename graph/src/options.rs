//! Pass configuration records.
//!
//! A configuration script hands each pass a free-form record of
//! string/bool/numeric options. The engine forwards the record verbatim to the
//! pass factory, which parses it into a typed configuration with
//! [`OptionReader`].
//!
//! # Example
//!
//! ```
//! use lumen_graph::{OptionReader, Options, Strictness};
//!
//! let options = Options::new().with("enabled", true).with("maxFrameCount", 64);
//!
//! let mut reader = OptionReader::new("AccumulatePass", &options);
//! let enabled = reader.bool("enabled", true).unwrap();
//! let max_frames = reader.uint("maxFrameCount", 0).unwrap();
//! reader.finish(Strictness::Strict).unwrap();
//!
//! assert!(enabled);
//! assert_eq!(max_frames, 64);
//! ```

use std::collections::{BTreeMap, BTreeSet};
use std::fmt;

use crate::error::{GraphError, Result};

/// A single configuration value.
#[derive(Debug, Clone, PartialEq)]
pub enum OptionValue {
    Bool(bool),
    Int(i64),
    Float(f64),
    String(String),
}

impl OptionValue {
    /// Name of the value type, used in error messages.
    pub fn type_name(&self) -> &'static str {
        match self {
            Self::Bool(_) => "bool",
            Self::Int(_) => "int",
            Self::Float(_) => "float",
            Self::String(_) => "string",
        }
    }

    pub fn as_bool(&self) -> Option<bool> {
        match self {
            Self::Bool(v) => Some(*v),
            _ => None,
        }
    }

    pub fn as_int(&self) -> Option<i64> {
        match self {
            Self::Int(v) => Some(*v),
            _ => None,
        }
    }

    /// Numeric value as a float. Integers are widened.
    pub fn as_float(&self) -> Option<f64> {
        match self {
            Self::Float(v) => Some(*v),
            Self::Int(v) => Some(*v as f64),
            _ => None,
        }
    }

    pub fn as_str(&self) -> Option<&str> {
        match self {
            Self::String(v) => Some(v),
            _ => None,
        }
    }
}

impl fmt::Display for OptionValue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Bool(v) => write!(f, "{v}"),
            Self::Int(v) => write!(f, "{v}"),
            Self::Float(v) => write!(f, "{v:?}"),
            Self::String(v) => write!(f, "'{v}'"),
        }
    }
}

impl From<bool> for OptionValue {
    fn from(value: bool) -> Self {
        Self::Bool(value)
    }
}

impl From<i32> for OptionValue {
    fn from(value: i32) -> Self {
        Self::Int(value.into())
    }
}

impl From<u32> for OptionValue {
    fn from(value: u32) -> Self {
        Self::Int(value.into())
    }
}

impl From<i64> for OptionValue {
    fn from(value: i64) -> Self {
        Self::Int(value)
    }
}

impl From<f32> for OptionValue {
    fn from(value: f32) -> Self {
        Self::Float(value.into())
    }
}

impl From<f64> for OptionValue {
    fn from(value: f64) -> Self {
        Self::Float(value)
    }
}

impl From<&str> for OptionValue {
    fn from(value: &str) -> Self {
        Self::String(value.to_string())
    }
}

impl From<String> for OptionValue {
    fn from(value: String) -> Self {
        Self::String(value)
    }
}

/// An ordered configuration record mapping option names to values.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Options {
    values: BTreeMap<String, OptionValue>,
}

impl Options {
    /// Create an empty record.
    pub fn new() -> Self {
        Self::default()
    }

    /// Add an option, builder style.
    pub fn with(mut self, name: impl Into<String>, value: impl Into<OptionValue>) -> Self {
        self.insert(name, value);
        self
    }

    /// Insert or replace an option, returning the previous value.
    pub fn insert(
        &mut self,
        name: impl Into<String>,
        value: impl Into<OptionValue>,
    ) -> Option<OptionValue> {
        self.values.insert(name.into(), value.into())
    }

    pub fn get(&self, name: &str) -> Option<&OptionValue> {
        self.values.get(name)
    }

    pub fn contains(&self, name: &str) -> bool {
        self.values.contains_key(name)
    }

    pub fn remove(&mut self, name: &str) -> Option<OptionValue> {
        self.values.remove(name)
    }

    pub fn len(&self) -> usize {
        self.values.len()
    }

    pub fn is_empty(&self) -> bool {
        self.values.is_empty()
    }

    /// Iterate options in name order.
    pub fn iter(&self) -> impl Iterator<Item = (&str, &OptionValue)> {
        self.values.iter().map(|(k, v)| (k.as_str(), v))
    }

    /// Overlay `other` on top of `self`; options in `other` win.
    pub fn merged(&self, other: &Options) -> Options {
        let mut merged = self.clone();
        for (name, value) in other.iter() {
            merged.insert(name, value.clone());
        }
        merged
    }
}

impl<K: Into<String>, V: Into<OptionValue>> FromIterator<(K, V)> for Options {
    fn from_iter<I: IntoIterator<Item = (K, V)>>(iter: I) -> Self {
        let mut options = Options::new();
        for (name, value) in iter {
            options.insert(name, value);
        }
        options
    }
}

impl fmt::Display for Options {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("{")?;
        for (i, (name, value)) in self.iter().enumerate() {
            if i > 0 {
                f.write_str(", ")?;
            }
            write!(f, "{name}: {value}")?;
        }
        f.write_str("}")
    }
}

/// How a pass treats options it does not recognize.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum Strictness {
    /// Fail with [`GraphError::UnrecognizedOption`].
    #[default]
    Strict,
    /// Log a warning and continue.
    Lenient,
}

/// Typed reader over an [`Options`] record.
///
/// Each accessor consumes one option and falls back to the documented default
/// when the option is absent. [`finish`](Self::finish) reports whatever was
/// left unconsumed.
pub struct OptionReader<'a> {
    pass_type: &'a str,
    options: &'a Options,
    consumed: BTreeSet<String>,
}

impl<'a> OptionReader<'a> {
    pub fn new(pass_type: &'a str, options: &'a Options) -> Self {
        Self {
            pass_type,
            options,
            consumed: BTreeSet::new(),
        }
    }

    fn take(&mut self, name: &str) -> Option<&'a OptionValue> {
        let value = self.options.get(name)?;
        self.consumed.insert(name.to_string());
        Some(value)
    }

    fn invalid(&self, name: &str, expected: impl Into<String>) -> GraphError {
        GraphError::InvalidOptionValue {
            pass_type: self.pass_type.to_string(),
            option: name.to_string(),
            expected: expected.into(),
        }
    }

    pub fn bool(&mut self, name: &str, default: bool) -> Result<bool> {
        match self.take(name) {
            None => Ok(default),
            Some(value) => value.as_bool().ok_or_else(|| self.invalid(name, "a bool")),
        }
    }

    pub fn int(&mut self, name: &str, default: i64) -> Result<i64> {
        match self.take(name) {
            None => Ok(default),
            Some(value) => value.as_int().ok_or_else(|| self.invalid(name, "an int")),
        }
    }

    /// Non-negative integer that fits in `u32`.
    pub fn uint(&mut self, name: &str, default: u32) -> Result<u32> {
        match self.take(name) {
            None => Ok(default),
            Some(value) => value
                .as_int()
                .and_then(|v| u32::try_from(v).ok())
                .ok_or_else(|| self.invalid(name, "a non-negative int")),
        }
    }

    /// Floating point value. Integers are accepted and widened.
    pub fn float(&mut self, name: &str, default: f64) -> Result<f64> {
        match self.take(name) {
            None => Ok(default),
            Some(value) => value
                .as_float()
                .ok_or_else(|| self.invalid(name, "a number")),
        }
    }

    pub fn string(&mut self, name: &str, default: &str) -> Result<String> {
        match self.take(name) {
            None => Ok(default.to_string()),
            Some(value) => value
                .as_str()
                .map(str::to_string)
                .ok_or_else(|| self.invalid(name, "a string")),
        }
    }

    /// String option restricted to a fixed set of names.
    pub fn choice<T: Copy>(&mut self, name: &str, default: T, choices: &[(&str, T)]) -> Result<T> {
        let Some(value) = self.take(name) else {
            return Ok(default);
        };
        let expected = || {
            let names: Vec<_> = choices.iter().map(|(n, _)| format!("'{n}'")).collect();
            format!("one of {}", names.join(", "))
        };
        let text = value
            .as_str()
            .ok_or_else(|| self.invalid(name, expected()))?;
        choices
            .iter()
            .find(|(n, _)| *n == text)
            .map(|&(_, v)| v)
            .ok_or_else(|| self.invalid(name, expected()))
    }

    /// Check for options that no accessor consumed.
    pub fn finish(self, strictness: Strictness) -> Result<()> {
        for (name, _) in self.options.iter() {
            if self.consumed.contains(name) {
                continue;
            }
            match strictness {
                Strictness::Strict => {
                    return Err(GraphError::UnrecognizedOption {
                        pass_type: self.pass_type.to_string(),
                        option: name.to_string(),
                    });
                }
                Strictness::Lenient => {
                    log::warn!("{}: ignoring unrecognized option '{}'", self.pass_type, name);
                }
            }
        }
        Ok(())
    }
}
