//! Resource types grouped by service
//!
//! Consumers walk this table to learn which resource kinds exist, what they
//! are called in diagnostics and how their import strings are shaped.

use crate::resource::USER_SCHEMA;
use lifecycle::Schema;
use thiserror::Error;

/// One service and the resource kinds it provides
#[derive(Debug, Clone, Copy)]
pub struct ServicePackage {
    pub name: &'static str,
    pub resources: &'static [&'static Schema],
}

/// Every service this provider knows about
pub static SERVICE_PACKAGES: &[ServicePackage] = &[ServicePackage {
    name: "mq",
    resources: &[&USER_SCHEMA],
}];

#[derive(Debug, Error, PartialEq, Eq)]
pub enum RegistryError {
    #[error("unknown resource type: {0}")]
    UnknownType(String),
}

/// Look up a resource kind by type name
pub fn schema(type_name: &str) -> Result<&'static Schema, RegistryError> {
    service_for(type_name).and_then(|pkg| {
        pkg.resources
            .iter()
            .copied()
            .find(|s| s.type_name == type_name)
            .ok_or_else(|| RegistryError::UnknownType(type_name.to_string()))
    })
}

/// Service that owns a resource type
pub fn service_for(type_name: &str) -> Result<&'static ServicePackage, RegistryError> {
    SERVICE_PACKAGES
        .iter()
        .find(|pkg| pkg.resources.iter().any(|s| s.type_name == type_name))
        .ok_or_else(|| RegistryError::UnknownType(type_name.to_string()))
}

/// All registered type names, in table order
pub fn resource_types() -> impl Iterator<Item = &'static str> {
    SERVICE_PACKAGES
        .iter()
        .flat_map(|pkg| pkg.resources.iter().map(|s| s.type_name))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_lookup_mq_user() {
        let schema = schema("mq_user").unwrap();
        assert_eq!(schema.display_name, "MQ User");
        assert_eq!(schema.import_format.describe(), "broker-id/username");
        assert_eq!(service_for("mq_user").unwrap().name, "mq");
    }

    #[test]
    fn test_unknown_type() {
        assert_eq!(
            schema("mq_queue").unwrap_err(),
            RegistryError::UnknownType("mq_queue".to_string())
        );
        assert_eq!(
            schema("mq_queue").unwrap_err().to_string(),
            "unknown resource type: mq_queue"
        );
    }

    #[test]
    fn test_resource_types_unique() {
        let mut types: Vec<_> = resource_types().collect();
        let total = types.len();
        types.sort_unstable();
        types.dedup();
        assert_eq!(types.len(), total);
        assert!(types.contains(&"mq_user"));
    }
}
