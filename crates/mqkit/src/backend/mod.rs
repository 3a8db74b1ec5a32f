//! Transport abstraction for broker API calls.
//!
//! The [`MqApi`] trait is the seam between request shapes and whatever
//! carries them to a broker. [`MemoryBroker`](memory::MemoryBroker) keeps
//! everything in process and is what the tests use.
//!
//! ```
//! use mqkit::backend::{MqApi, memory::MemoryBroker};
//! use mqkit::CreateUserInput;
//!
//! let broker = MemoryBroker::new();
//! broker.add_broker("b-1234");
//! broker
//!     .create_user(&CreateUserInput::new("b-1234", "alice", "correct-horse-battery"))
//!     .unwrap();
//!
//! let user = broker.describe_user("b-1234", "alice").unwrap();
//! assert_eq!(user.username, "alice");
//! ```

pub mod memory;

use crate::error::Result;
use crate::types::{CreateUserInput, DescribeUserOutput, UpdateUserInput, UserSummary};

/// Broker user management calls.
pub trait MqApi: Send + Sync {
    /// Create a user. The API returns no data on success.
    fn create_user(&self, input: &CreateUserInput) -> Result<()>;

    /// Look up a user.
    ///
    /// # Errors
    ///
    /// Returns `Error::NotFound` if the broker or the user doesn't exist.
    fn describe_user(&self, broker_id: &str, username: &str) -> Result<DescribeUserOutput>;

    /// Apply the fields set in `input`.
    fn update_user(&self, input: &UpdateUserInput) -> Result<()>;

    /// Delete a user.
    fn delete_user(&self, broker_id: &str, username: &str) -> Result<()>;

    /// List the users of a broker.
    fn list_users(&self, broker_id: &str) -> Result<Vec<UserSummary>>;
}
