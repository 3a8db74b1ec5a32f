//! Resource identifiers and import formats

use crate::error::TranslateError;
use serde::{Deserialize, Serialize};
use std::fmt;

/// Delimiter between the parts of a composite identifier
pub const DELIMITER: char = '/';

/// Stable identifier of a remote object
///
/// A composite key such as `broker-id/username`. Assigned once by create or
/// import and never changed afterwards; a different identifier means a
/// different object.
///
/// No part may contain [`DELIMITER`]: the string form, which is also the
/// serialized form, is split on it when read back.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(into = "String", from = "String")]
pub struct ResourceId {
    parts: Vec<String>,
}

impl ResourceId {
    /// Build an identifier from trusted parts
    ///
    /// Use [`ResourceId::try_new`] for parts that come from user input or a
    /// remote response.
    pub fn new<I, S>(parts: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self {
            parts: parts.into_iter().map(Into::into).collect(),
        }
    }

    /// Build an identifier, rejecting parts that contain [`DELIMITER`]
    pub fn try_new<I, S>(parts: I) -> Result<Self, TranslateError>
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        let id = Self::new(parts);
        id.check()?;
        Ok(id)
    }

    /// Fail if any part contains [`DELIMITER`]
    pub fn check(&self) -> Result<(), TranslateError> {
        match self.parts.iter().find(|p| p.contains(DELIMITER)) {
            Some(part) => Err(TranslateError::invalid(
                "id",
                format!("part {part:?} contains the delimiter '{DELIMITER}'"),
            )),
            None => Ok(()),
        }
    }

    pub fn parts(&self) -> &[String] {
        &self.parts
    }

    pub fn part(&self, index: usize) -> Option<&str> {
        self.parts.get(index).map(String::as_str)
    }

    /// Check that the identifier has the expected shape and no empty parts
    pub fn is_complete(&self, format: &ImportFormat) -> bool {
        self.parts.len() == format.parts.len() && self.parts.iter().all(|p| !p.is_empty())
    }
}

impl fmt::Display for ResourceId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        for (i, part) in self.parts.iter().enumerate() {
            if i > 0 {
                write!(f, "{DELIMITER}")?;
            }
            write!(f, "{part}")?;
        }
        Ok(())
    }
}

impl From<ResourceId> for String {
    fn from(id: ResourceId) -> Self {
        id.to_string()
    }
}

impl From<String> for ResourceId {
    fn from(s: String) -> Self {
        Self::new(s.split(DELIMITER))
    }
}

/// Documented shape of an import string
///
/// The part names double as the user-facing description, e.g.
/// `broker-id/username`.
#[derive(Debug, Clone, Copy)]
pub struct ImportFormat {
    pub parts: &'static [&'static str],
}

impl ImportFormat {
    pub const fn new(parts: &'static [&'static str]) -> Self {
        Self { parts }
    }

    /// Human-readable format, e.g. "broker-id/username"
    pub fn describe(&self) -> String {
        self.parts.join(&DELIMITER.to_string())
    }

    /// Parse a raw import string
    ///
    /// Returns `None` unless the string has exactly the expected number of
    /// delimiters and every part is non-empty.
    pub fn parse(&self, raw: &str) -> Option<ResourceId> {
        let parts: Vec<&str> = raw.split(DELIMITER).collect();
        if parts.len() != self.parts.len() || parts.iter().any(|p| p.is_empty()) {
            return None;
        }
        ResourceId::try_new(parts).ok()
    }
}
