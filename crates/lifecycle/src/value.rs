//! Attribute values and attribute maps
//!
//! Desired and observed state are both projected into [`Attributes`] so the
//! change detector can compare them field by field without knowing the
//! concrete record types.

use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fmt;

/// A single attribute value
///
/// `Value` is totally ordered so unordered collections can be compared as
/// sorted multisets.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(untagged)]
pub enum Value {
    Null,
    Bool(bool),
    Int(i64),
    String(String),
    List(Vec<Value>),
    Object(BTreeMap<String, Value>),
}

impl Value {
    /// Check if the value is null
    pub fn is_null(&self) -> bool {
        matches!(self, Self::Null)
    }

    pub fn as_str(&self) -> Option<&str> {
        match self {
            Self::String(s) => Some(s),
            _ => None,
        }
    }

    pub fn as_bool(&self) -> Option<bool> {
        match self {
            Self::Bool(b) => Some(*b),
            _ => None,
        }
    }

    pub fn as_list(&self) -> Option<&[Value]> {
        match self {
            Self::List(items) => Some(items),
            _ => None,
        }
    }

    /// Build a list of strings
    pub fn string_list<I, S>(items: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self::List(items.into_iter().map(|s| Self::String(s.into())).collect())
    }

    /// Collect a list of strings, or `None` if this isn't a list of strings
    pub fn to_string_list(&self) -> Option<Vec<String>> {
        self.as_list()?
            .iter()
            .map(|v| v.as_str().map(str::to_string))
            .collect()
    }
}

impl From<bool> for Value {
    fn from(b: bool) -> Self {
        Self::Bool(b)
    }
}

impl From<i64> for Value {
    fn from(i: i64) -> Self {
        Self::Int(i)
    }
}

impl From<&str> for Value {
    fn from(s: &str) -> Self {
        Self::String(s.to_string())
    }
}

impl From<String> for Value {
    fn from(s: String) -> Self {
        Self::String(s)
    }
}

impl<T: Into<Value>> From<Option<T>> for Value {
    fn from(opt: Option<T>) -> Self {
        opt.map_or(Self::Null, Into::into)
    }
}

impl fmt::Display for Value {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Null => write!(f, "null"),
            Self::Bool(b) => write!(f, "{b}"),
            Self::Int(i) => write!(f, "{i}"),
            Self::String(s) => write!(f, "{s:?}"),
            Self::List(items) => {
                write!(f, "[")?;
                for (i, item) in items.iter().enumerate() {
                    if i > 0 {
                        write!(f, ", ")?;
                    }
                    write!(f, "{item}")?;
                }
                write!(f, "]")
            }
            Self::Object(map) => {
                write!(f, "{{")?;
                for (i, (k, v)) in map.iter().enumerate() {
                    if i > 0 {
                        write!(f, ", ")?;
                    }
                    write!(f, "{k} = {v}")?;
                }
                write!(f, "}}")
            }
        }
    }
}

static NULL: Value = Value::Null;

/// A map from attribute name to value
///
/// Null values are never stored: setting an attribute to [`Value::Null`]
/// removes it, and reading a missing attribute yields `Null`.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Attributes(BTreeMap<String, Value>);

impl Attributes {
    pub fn new() -> Self {
        Self::default()
    }

    /// Get an attribute, `Null` if absent
    pub fn get(&self, name: &str) -> &Value {
        self.0.get(name).unwrap_or(&NULL)
    }

    /// Set an attribute; `Null` removes it
    pub fn set(&mut self, name: impl Into<String>, value: impl Into<Value>) {
        let name = name.into();
        match value.into() {
            Value::Null => {
                self.0.remove(&name);
            }
            v => {
                self.0.insert(name, v);
            }
        }
    }

    /// Builder-style [`set`](Self::set)
    #[must_use]
    pub fn with(mut self, name: impl Into<String>, value: impl Into<Value>) -> Self {
        self.set(name, value);
        self
    }

    pub fn contains(&self, name: &str) -> bool {
        self.0.contains_key(name)
    }

    pub fn remove(&mut self, name: &str) -> Option<Value> {
        self.0.remove(name)
    }

    pub fn names(&self) -> impl Iterator<Item = &str> {
        self.0.keys().map(String::as_str)
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, &Value)> {
        self.0.iter().map(|(k, v)| (k.as_str(), v))
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    /// Keep only the named attributes
    pub fn restrict<'a, I>(&self, names: I) -> Self
    where
        I: IntoIterator<Item = &'a str>,
    {
        let mut out = Self::new();
        for name in names {
            if let Some(v) = self.0.get(name) {
                out.0.insert(name.to_string(), v.clone());
            }
        }
        out
    }
}

impl FromIterator<(String, Value)> for Attributes {
    fn from_iter<I: IntoIterator<Item = (String, Value)>>(iter: I) -> Self {
        let mut attrs = Self::new();
        for (k, v) in iter {
            attrs.set(k, v);
        }
        attrs
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_set_null_removes() {
        let mut attrs = Attributes::new().with("a", "x");
        assert!(attrs.contains("a"));
        attrs.set("a", Value::Null);
        assert!(!attrs.contains("a"));
        assert!(attrs.get("a").is_null());
    }

    #[test]
    fn test_option_into_value() {
        let none: Option<bool> = None;
        let attrs = Attributes::new().with("flag", none).with("on", Some(true));
        assert_eq!(attrs.len(), 1);
        assert_eq!(attrs.get("on").as_bool(), Some(true));
    }

    #[test]
    fn test_restrict() {
        let attrs = Attributes::new()
            .with("a", 1_i64)
            .with("b", 2_i64)
            .with("c", 3_i64);
        let only = attrs.restrict(["a", "c", "missing"]);
        assert_eq!(only.names().collect::<Vec<_>>(), vec!["a", "c"]);
    }

    #[test]
    fn test_string_list_round_trip() {
        let v = Value::string_list(["admin", "ops"]);
        assert_eq!(
            v.to_string_list(),
            Some(vec!["admin".to_string(), "ops".to_string()])
        );
        assert_eq!(Value::Int(1).to_string_list(), None);
    }

    #[test]
    fn test_display() {
        let v = Value::List(vec![Value::from("a"), Value::Bool(true)]);
        assert_eq!(v.to_string(), "[\"a\", true]");
    }
}
