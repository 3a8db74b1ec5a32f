//! Declarative field tables
//!
//! Each resource kind describes its attributes once, as a static table of
//! [`FieldSpec`]s. The change detector, the redaction in logs, and the
//! completeness check on observed state all work from this table instead of
//! inspecting record types at runtime.

use crate::identifier::ImportFormat;
use crate::value::{Attributes, Value};

/// Normalization applied by the provider to a field's value
pub type Normalizer = fn(&Value) -> Value;

/// One attribute of a resource kind
#[derive(Debug, Clone, Copy)]
pub struct FieldSpec {
    pub name: &'static str,
    /// Changing this field requires delete + create
    pub immutable: bool,
    /// Never logged; redacted in change output
    pub sensitive: bool,
    /// Assigned by the provider; never part of desired state
    pub computed: bool,
    /// Accepted by the remote but never returned by it
    pub write_only: bool,
    /// List compared as a set
    pub unordered: bool,
    /// May be absent from observed state
    pub optional: bool,
    /// Absent in desired state means "whatever the provider picks"
    pub remote_default: bool,
    /// Provider normalization, applied to both sides before comparison
    pub normalize: Option<Normalizer>,
}

impl FieldSpec {
    pub const fn new(name: &'static str) -> Self {
        Self {
            name,
            immutable: false,
            sensitive: false,
            computed: false,
            write_only: false,
            unordered: false,
            optional: false,
            remote_default: false,
            normalize: None,
        }
    }

    pub const fn immutable(mut self) -> Self {
        self.immutable = true;
        self
    }

    pub const fn sensitive(mut self) -> Self {
        self.sensitive = true;
        self
    }

    pub const fn computed(mut self) -> Self {
        self.computed = true;
        self
    }

    pub const fn write_only(mut self) -> Self {
        self.write_only = true;
        self
    }

    pub const fn unordered(mut self) -> Self {
        self.unordered = true;
        self
    }

    pub const fn optional(mut self) -> Self {
        self.optional = true;
        self
    }

    /// Optional in both desired and observed state, provider fills a default
    pub const fn remote_default(mut self) -> Self {
        self.remote_default = true;
        self.optional = true;
        self
    }

    pub const fn normalized(mut self, f: Normalizer) -> Self {
        self.normalize = Some(f);
        self
    }

    /// Canonical form used for equality
    pub fn canonical(&self, value: &Value) -> Value {
        let value = match self.normalize {
            Some(f) => f(value),
            None => value.clone(),
        };
        match value {
            Value::List(mut items) if self.unordered => {
                items.sort();
                Value::List(items)
            }
            v => v,
        }
    }
}

/// Case-insensitive normalization for string (and list of string) fields
pub fn case_insensitive(value: &Value) -> Value {
    match value {
        Value::String(s) => Value::String(s.to_lowercase()),
        Value::List(items) => Value::List(items.iter().map(case_insensitive).collect()),
        v => v.clone(),
    }
}

/// Static description of a resource kind
#[derive(Debug)]
pub struct Schema {
    /// Stable type name, e.g. "mq_user"
    pub type_name: &'static str,
    /// Human-readable name used in diagnostics, e.g. "MQ User"
    pub display_name: &'static str,
    pub fields: &'static [FieldSpec],
    pub import_format: ImportFormat,
}

impl Schema {
    pub fn field(&self, name: &str) -> Option<&FieldSpec> {
        self.fields.iter().find(|f| f.name == name)
    }

    /// Fields that belong to desired state
    pub fn configurable(&self) -> impl Iterator<Item = &FieldSpec> {
        self.fields.iter().filter(|f| !f.computed)
    }

    /// Names of write-only fields
    pub fn write_only(&self) -> impl Iterator<Item = &'static str> + '_ {
        self.fields.iter().filter(|f| f.write_only).map(|f| f.name)
    }

    /// Project attributes through the field table, dropping unknown names
    pub fn project(&self, attrs: &Attributes) -> Attributes {
        attrs.restrict(self.fields.iter().map(|f| f.name))
    }

    /// Names of fields a complete observation must carry
    pub fn missing_from(&self, observed: &Attributes) -> Vec<&'static str> {
        self.fields
            .iter()
            .filter(|f| !f.write_only && !f.optional)
            .filter(|f| !observed.contains(f.name))
            .map(|f| f.name)
            .collect()
    }

    /// Copy write-only fields from a previously applied state
    pub fn carry_write_only(&self, observed: &mut Attributes, applied: &Attributes) {
        for name in self.write_only() {
            observed.set(name, applied.get(name).clone());
        }
    }

    /// Attributes with sensitive values replaced, for logging
    pub fn redacted(&self, attrs: &Attributes) -> Attributes {
        attrs
            .iter()
            .map(|(name, value)| {
                let shown = match self.field(name) {
                    Some(f) if f.sensitive => Value::from("(sensitive)"),
                    _ => value.clone(),
                };
                (name.to_string(), shown)
            })
            .collect()
    }
}

/// A typed desired-state record
///
/// Implementations project their fields into [`Attributes`] using the
/// names from the resource's [`Schema`]. Unset optional fields project to
/// `Null` (absent).
pub trait Record {
    fn attributes(&self) -> Attributes;
}
