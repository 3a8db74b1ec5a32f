//! Resource adapters
//!
//! Each submodule pairs a [`lifecycle::Resource`] translator with a
//! [`lifecycle::RemoteClient`] over one service kit.

pub mod mq_user;

pub use mq_user::{USER_SCHEMA, User, UserClient, UserResource};
