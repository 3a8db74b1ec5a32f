//! # mqkit
//!
//! Message broker user management.
//!
//! This crate provides:
//! - Request and response shapes for broker users
//! - An error type categorized by HTTP status for retry decisions
//! - The [`MqApi`](backend::MqApi) transport trait
//! - [`MemoryBroker`](backend::memory::MemoryBroker), an in-process broker
//!   with eventual-consistency and fault injection for tests
//!
//! ## Example
//!
//! ```
//! use mqkit::{Client, CreateUserInput};
//! use mqkit::backend::memory::MemoryBroker;
//! use std::sync::Arc;
//!
//! let broker = MemoryBroker::new();
//! broker.add_broker("b-1234");
//!
//! let client = Client::with_backend(Arc::new(broker));
//! client
//!     .create_user(&CreateUserInput::new("b-1234", "alice", "correct-horse-battery"))
//!     .unwrap();
//! assert_eq!(client.list_users("b-1234").unwrap().len(), 1);
//! ```

#![warn(missing_docs)]
#![warn(clippy::all)]

pub mod backend;
pub mod error;
pub mod types;

pub use error::{Error, ErrorCategory, Result};
pub use types::{CreateUserInput, DescribeUserOutput, UpdateUserInput, UserSummary};

use backend::MqApi;
use std::sync::Arc;

/// High-level client for broker user operations.
///
/// Wraps a transport and logs each call. Cloning is cheap; clones share
/// the transport.
#[derive(Clone)]
pub struct Client {
    backend: Arc<dyn MqApi>,
    endpoint: Option<String>,
}

impl Client {
    /// Create a client over the given transport.
    pub fn with_backend(backend: Arc<dyn MqApi>) -> Self {
        Self {
            backend,
            endpoint: None,
        }
    }

    /// Record the endpoint the transport talks to.
    #[must_use]
    pub fn with_endpoint(mut self, endpoint: impl Into<String>) -> Self {
        self.endpoint = Some(endpoint.into());
        self
    }

    /// Endpoint override in effect, if any.
    pub fn endpoint(&self) -> Option<&str> {
        self.endpoint.as_deref()
    }

    /// Create a user. The API returns no data on success.
    pub fn create_user(&self, input: &CreateUserInput) -> Result<()> {
        log::debug!("CreateUser {}/{}", input.broker_id, input.username);
        self.backend.create_user(input)
    }

    /// Look up a user.
    pub fn describe_user(&self, broker_id: &str, username: &str) -> Result<DescribeUserOutput> {
        log::debug!("DescribeUser {broker_id}/{username}");
        self.backend.describe_user(broker_id, username)
    }

    /// Apply the fields set in `input`.
    pub fn update_user(&self, input: &UpdateUserInput) -> Result<()> {
        log::debug!("UpdateUser {}/{}", input.broker_id, input.username);
        self.backend.update_user(input)
    }

    /// Delete a user.
    pub fn delete_user(&self, broker_id: &str, username: &str) -> Result<()> {
        log::debug!("DeleteUser {broker_id}/{username}");
        self.backend.delete_user(broker_id, username)
    }

    /// List the users of a broker.
    pub fn list_users(&self, broker_id: &str) -> Result<Vec<UserSummary>> {
        log::debug!("ListUsers {broker_id}");
        self.backend.list_users(broker_id)
    }
}

impl std::fmt::Debug for Client {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Client")
            .field("endpoint", &self.endpoint)
            .finish_non_exhaustive()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use backend::memory::{MemoryBroker, Operation};

    #[test]
    fn test_client_delegates_to_backend() {
        let broker = MemoryBroker::new();
        broker.add_broker("b-1");
        let client = Client::with_backend(Arc::new(broker.clone()));

        client
            .create_user(&CreateUserInput::new("b-1", "alice", "correct-horse-battery"))
            .unwrap();
        client.describe_user("b-1", "alice").unwrap();
        client.delete_user("b-1", "alice").unwrap();

        assert_eq!(broker.calls(Operation::CreateUser), 1);
        assert_eq!(broker.calls(Operation::DescribeUser), 1);
        assert_eq!(broker.calls(Operation::DeleteUser), 1);
    }

    #[test]
    fn test_client_endpoint() {
        let client = Client::with_backend(Arc::new(MemoryBroker::new()));
        assert_eq!(client.endpoint(), None);
        let client = client.with_endpoint("http://localhost:4566");
        assert_eq!(client.endpoint(), Some("http://localhost:4566"));
    }
}
