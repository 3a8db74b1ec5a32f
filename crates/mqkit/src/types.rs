//! Request and response shapes for broker user management.
//!
//! Field names follow the broker API's camelCase wire format.

use serde::{Deserialize, Serialize};
use std::fmt;

/// Request body for creating a broker user.
#[derive(Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CreateUserInput {
    /// Broker the user belongs to
    pub broker_id: String,
    /// Username, unique within the broker
    pub username: String,
    /// Password; never returned by the API
    pub password: String,
    /// Whether the user may access the broker's web console
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub console_access: Option<bool>,
    /// Groups the user belongs to
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub groups: Option<Vec<String>>,
    /// Whether this is a cross-region data replication user
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub replication_user: Option<bool>,
}

impl CreateUserInput {
    /// Create a request with only the required fields set.
    pub fn new(
        broker_id: impl Into<String>,
        username: impl Into<String>,
        password: impl Into<String>,
    ) -> Self {
        Self {
            broker_id: broker_id.into(),
            username: username.into(),
            password: password.into(),
            console_access: None,
            groups: None,
            replication_user: None,
        }
    }
}

impl fmt::Debug for CreateUserInput {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("CreateUserInput")
            .field("broker_id", &self.broker_id)
            .field("username", &self.username)
            .field("password", &"(sensitive)")
            .field("console_access", &self.console_access)
            .field("groups", &self.groups)
            .field("replication_user", &self.replication_user)
            .finish()
    }
}

/// Request body for updating a broker user.
///
/// Unset fields are left as they are.
#[derive(Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct UpdateUserInput {
    /// Broker the user belongs to
    pub broker_id: String,
    /// Username of the user to update
    pub username: String,
    /// New password
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub password: Option<String>,
    /// New console access flag
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub console_access: Option<bool>,
    /// New group list, replacing the old one
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub groups: Option<Vec<String>>,
    /// New replication flag
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub replication_user: Option<bool>,
}

impl UpdateUserInput {
    /// Create an update that changes nothing yet.
    pub fn new(broker_id: impl Into<String>, username: impl Into<String>) -> Self {
        Self {
            broker_id: broker_id.into(),
            username: username.into(),
            ..Default::default()
        }
    }

    /// Whether the update carries no changes.
    pub fn is_empty(&self) -> bool {
        self.password.is_none()
            && self.console_access.is_none()
            && self.groups.is_none()
            && self.replication_user.is_none()
    }
}

impl fmt::Debug for UpdateUserInput {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("UpdateUserInput")
            .field("broker_id", &self.broker_id)
            .field("username", &self.username)
            .field("password", &self.password.as_ref().map(|_| "(sensitive)"))
            .field("console_access", &self.console_access)
            .field("groups", &self.groups)
            .field("replication_user", &self.replication_user)
            .finish()
    }
}

/// Response body of a user lookup.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DescribeUserOutput {
    /// Broker the user belongs to
    pub broker_id: String,
    /// Username
    pub username: String,
    /// Console access flag, if the broker reports one
    #[serde(default)]
    pub console_access: Option<bool>,
    /// Groups the user belongs to
    #[serde(default)]
    pub groups: Vec<String>,
    /// Replication flag, if the broker reports one
    #[serde(default)]
    pub replication_user: Option<bool>,
}

/// One entry of a user listing.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct UserSummary {
    /// Username
    pub username: String,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_create_input_wire_names() {
        let input = CreateUserInput {
            console_access: Some(true),
            ..CreateUserInput::new("b-1234", "alice", "correct-horse-battery")
        };
        let json = serde_json::to_value(&input).unwrap();

        assert_eq!(json["brokerId"], "b-1234");
        assert_eq!(json["consoleAccess"], true);
        assert!(json.get("groups").is_none());
        assert!(json.get("replicationUser").is_none());
    }

    #[test]
    fn test_debug_redacts_password() {
        let input = CreateUserInput::new("b-1234", "alice", "correct-horse-battery");
        assert!(!format!("{input:?}").contains("correct-horse-battery"));

        let update = UpdateUserInput {
            password: Some("another-secret-pw".into()),
            ..UpdateUserInput::new("b-1234", "alice")
        };
        assert!(!format!("{update:?}").contains("another-secret-pw"));
    }

    #[test]
    fn test_update_input_is_empty() {
        let mut update = UpdateUserInput::new("b-1234", "alice");
        assert!(update.is_empty());
        update.groups = Some(vec![]);
        assert!(!update.is_empty());
    }

    #[test]
    fn test_describe_output_defaults() {
        let out: DescribeUserOutput =
            serde_json::from_str(r#"{"brokerId":"b-1","username":"alice"}"#).unwrap();
        assert_eq!(out.console_access, None);
        assert!(out.groups.is_empty());
    }
}
