//! Change detection between desired and observed state

use crate::schema::{FieldSpec, Schema};
use crate::value::{Attributes, Value};
use std::fmt;

/// One attribute whose desired value differs from the observed one
#[derive(Clone, PartialEq, Eq)]
pub struct AttributeChange {
    pub name: &'static str,
    pub before: Value,
    pub after: Value,
    pub sensitive: bool,
}

impl fmt::Debug for AttributeChange {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.sensitive {
            f.debug_struct("AttributeChange")
                .field("name", &self.name)
                .field("value", &"(sensitive)")
                .finish()
        } else {
            f.debug_struct("AttributeChange")
                .field("name", &self.name)
                .field("before", &self.before)
                .field("after", &self.after)
                .finish()
        }
    }
}

impl fmt::Display for AttributeChange {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.sensitive {
            write!(f, "{}: (sensitive value)", self.name)
        } else {
            write!(f, "{}: {} → {}", self.name, self.before, self.after)
        }
    }
}

/// Attributes that differ, split by how they can be applied
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ChangeSet {
    /// Changes an in-place update can apply
    pub updatable: Vec<AttributeChange>,
    /// Changes to immutable attributes; require delete + create
    pub force_replace: Vec<AttributeChange>,
}

impl ChangeSet {
    pub fn is_empty(&self) -> bool {
        self.updatable.is_empty() && self.force_replace.is_empty()
    }

    pub fn requires_replace(&self) -> bool {
        !self.force_replace.is_empty()
    }

    /// Check if an attribute is part of the in-place update
    pub fn updates(&self, name: &str) -> bool {
        self.updatable.iter().any(|c| c.name == name)
    }

    pub fn updatable_names(&self) -> Vec<&'static str> {
        self.updatable.iter().map(|c| c.name).collect()
    }

    pub fn force_replace_names(&self) -> Vec<&'static str> {
        self.force_replace.iter().map(|c| c.name).collect()
    }

    pub fn len(&self) -> usize {
        self.updatable.len() + self.force_replace.len()
    }
}

/// Compare desired against observed, field by field
///
/// Computed fields are never compared. Fields marked `remote_default` are
/// skipped when the desired value is absent. Unordered and normalized
/// fields compare by their canonical form.
pub fn diff(schema: &Schema, desired: &Attributes, observed: &Attributes) -> ChangeSet {
    let mut changes = ChangeSet::default();

    for field in schema.configurable() {
        let want = desired.get(field.name);
        if want.is_null() && field.remote_default {
            continue;
        }
        let have = observed.get(field.name);
        if equivalent(field, want, have) {
            continue;
        }

        let change = AttributeChange {
            name: field.name,
            before: have.clone(),
            after: want.clone(),
            sensitive: field.sensitive,
        };
        if field.immutable {
            changes.force_replace.push(change);
        } else {
            changes.updatable.push(change);
        }
    }

    changes
}

fn equivalent(field: &FieldSpec, a: &Value, b: &Value) -> bool {
    if field.normalize.is_none() && !field.unordered {
        return a == b;
    }
    field.canonical(a) == field.canonical(b)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::identifier::ImportFormat;
    use crate::schema::{FieldSpec, case_insensitive};

    static FIELDS: &[FieldSpec] = &[
        FieldSpec::new("parent").immutable(),
        FieldSpec::new("name").immutable(),
        FieldSpec::new("password").sensitive().write_only(),
        FieldSpec::new("groups").remote_default(),
        FieldSpec::new("zones").unordered(),
        FieldSpec::new("engine").normalized(case_insensitive),
        FieldSpec::new("enabled").remote_default(),
        FieldSpec::new("arn").computed(),
    ];

    static SCHEMA: Schema = Schema {
        type_name: "widget",
        display_name: "Widget",
        fields: FIELDS,
        import_format: ImportFormat::new(&["parent", "name"]),
    };

    fn desired() -> Attributes {
        Attributes::new()
            .with("parent", "p-1")
            .with("name", "w")
            .with("password", "correct-horse")
            .with("zones", Value::string_list(["a", "b"]))
            .with("engine", "ActiveMQ")
    }

    #[test]
    fn test_diff_identical_is_empty() {
        let d = desired();
        assert!(diff(&SCHEMA, &d, &d).is_empty());
    }

    #[test]
    fn test_diff_ignores_computed() {
        let d = desired();
        let observed = d.clone().with("arn", "arn:widget:1");
        assert!(diff(&SCHEMA, &d, &observed).is_empty());
    }

    #[test]
    fn test_diff_unordered_field() {
        let d = desired();
        let observed = d.clone().with("zones", Value::string_list(["b", "a"]));
        assert!(diff(&SCHEMA, &d, &observed).is_empty());
    }

    #[test]
    fn test_diff_ordered_field() {
        let d = desired().with("groups", Value::string_list(["x", "y"]));
        let observed = d.clone().with("groups", Value::string_list(["y", "x"]));
        let changes = diff(&SCHEMA, &d, &observed);
        assert_eq!(changes.updatable_names(), vec!["groups"]);
    }

    #[test]
    fn test_diff_normalized_field() {
        let d = desired();
        let observed = d.clone().with("engine", "activemq");
        assert!(diff(&SCHEMA, &d, &observed).is_empty());
    }

    #[test]
    fn test_diff_remote_default_absent_in_desired() {
        let d = desired();
        let observed = d.clone().with("enabled", false).with("groups", Value::List(vec![]));
        assert!(diff(&SCHEMA, &d, &observed).is_empty());

        let d = d.with("enabled", true);
        let changes = diff(&SCHEMA, &d, &observed);
        assert_eq!(changes.updatable_names(), vec!["enabled"]);
    }

    #[test]
    fn test_diff_partitions_immutable() {
        let d = desired();
        let observed = d
            .clone()
            .with("name", "other")
            .with("password", "old-password!");
        let changes = diff(&SCHEMA, &d, &observed);

        assert!(changes.requires_replace());
        assert_eq!(changes.force_replace_names(), vec!["name"]);
        assert_eq!(changes.updatable_names(), vec!["password"]);
        assert_eq!(changes.len(), 2);
    }

    #[test]
    fn test_sensitive_change_redacted() {
        let d = desired();
        let observed = d.clone().with("password", "old-password!");
        let changes = diff(&SCHEMA, &d, &observed);
        let change = &changes.updatable[0];

        let shown = format!("{change} {change:?}");
        assert!(!shown.contains("correct-horse"));
        assert!(!shown.contains("old-password!"));
        assert_eq!(change.to_string(), "password: (sensitive value)");
    }

    #[test]
    fn test_diff_removed_attribute() {
        let observed = desired().with("groups", Value::string_list(["admins"]));
        let d = desired().with("groups", Value::List(vec![]));
        let changes = diff(&SCHEMA, &d, &observed);
        assert!(changes.updates("groups"));
        assert_eq!(changes.updatable[0].after, Value::List(vec![]));
    }
}
