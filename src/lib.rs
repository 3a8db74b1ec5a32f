//! # mqform
//!
//! Declarative management of message broker users.
//!
//! This crate wires the [`lifecycle`] engine to the broker API kit in
//! [`mqkit`]:
//! - [`resource::mq_user`]: the `mq_user` resource, imported as
//!   `broker-id/username`
//! - [`config`]: retry, stabilization and endpoint settings from TOML
//! - [`state`]: a file-backed state store
//! - [`session`]: per-run client construction and reconciler setup
//! - [`registry`]: resource kinds grouped by service
//! - [`refresh`]: parallel re-read of everything tracked
//!
//! ## Example
//!
//! ```no_run
//! use mqform::config::ProviderConfig;
//! use mqform::resource::User;
//! use mqform::session::{MemoryClientFactory, Session};
//! use mqform::state::FileStateStore;
//!
//! # fn main() -> anyhow::Result<()> {
//! let factory = MemoryClientFactory::default();
//! factory.broker().add_broker("b-1234");
//!
//! let session = Session::new(
//!     ProviderConfig::load()?,
//!     Box::new(factory),
//!     Box::new(FileStateStore::open_default()?),
//! );
//!
//! let users = session.mq_users()?;
//! let state = users.create(&User::new("b-1234", "alice", "correct-horse-battery"))?;
//! users.delete(&state.id)?;
//! # Ok(())
//! # }
//! ```

pub mod config;
pub mod refresh;
pub mod registry;
pub mod resource;
pub mod session;
pub mod state;

pub use config::ProviderConfig;
pub use refresh::{RefreshSummary, refresh_all};
pub use resource::{User, UserClient, UserResource};
pub use session::{ClientFactory, MemoryClientFactory, Session};
pub use state::FileStateStore;
