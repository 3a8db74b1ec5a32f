//! In-process broker for tests and local runs.
//!
//! Behaves like the real service where it matters to callers: users are
//! scoped to a broker, passwords shorter than 12 characters are rejected,
//! and a newly created user can stay invisible to lookups for a few calls.
//! Failures can be injected per operation.

use super::MqApi;
use crate::error::{Error, Result};
use crate::types::{CreateUserInput, DescribeUserOutput, UpdateUserInput, UserSummary};
use std::collections::{BTreeMap, HashMap, VecDeque};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

/// Minimum accepted password length
pub const MIN_PASSWORD_LEN: usize = 12;

/// API operations, for fault injection and call counting
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Operation {
    /// `create_user`
    CreateUser,
    /// `describe_user`
    DescribeUser,
    /// `update_user`
    UpdateUser,
    /// `delete_user`
    DeleteUser,
    /// `list_users`
    ListUsers,
}

#[derive(Debug, Clone)]
struct StoredUser {
    password: String,
    console_access: bool,
    groups: Vec<String>,
    replication_user: bool,
}

#[derive(Debug, Default)]
struct State {
    brokers: BTreeMap<String, BTreeMap<String, StoredUser>>,
    /// Lookups of a new user that still report NotFound
    hidden: HashMap<(String, String), u32>,
    visibility_delay: u32,
    faults: HashMap<Operation, VecDeque<Error>>,
    calls: HashMap<Operation, usize>,
}

/// In-memory broker service.
///
/// Clones share the same state.
#[derive(Debug, Clone, Default)]
pub struct MemoryBroker {
    state: Arc<Mutex<State>>,
}

impl MemoryBroker {
    /// Create a broker service with no brokers.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Make each new user invisible to the next `lookups` describe calls.
    #[must_use]
    pub fn with_visibility_delay(self, lookups: u32) -> Self {
        self.lock().visibility_delay = lookups;
        self
    }

    /// Register a broker that users can be created in.
    pub fn add_broker(&self, broker_id: impl Into<String>) {
        self.lock().brokers.entry(broker_id.into()).or_default();
    }

    /// Fail the next call of `operation` with `error`.
    ///
    /// Injected failures queue up and are consumed in order.
    pub fn fail_next(&self, operation: Operation, error: Error) {
        self.lock()
            .faults
            .entry(operation)
            .or_default()
            .push_back(error);
    }

    /// Number of calls made to `operation`, including failed ones.
    pub fn calls(&self, operation: Operation) -> usize {
        self.lock().calls.get(&operation).copied().unwrap_or(0)
    }

    /// Total number of calls across all operations.
    pub fn total_calls(&self) -> usize {
        self.lock().calls.values().sum()
    }

    /// Current password of a user, bypassing the API.
    pub fn password(&self, broker_id: &str, username: &str) -> Option<String> {
        self.lock()
            .brokers
            .get(broker_id)
            .and_then(|users| users.get(username))
            .map(|u| u.password.clone())
    }

    /// Change a user's groups, bypassing the API.
    pub fn set_groups(&self, broker_id: &str, username: &str, groups: Vec<String>) {
        if let Some(user) = self
            .lock()
            .brokers
            .get_mut(broker_id)
            .and_then(|users| users.get_mut(username))
        {
            user.groups = groups;
        }
    }

    fn lock(&self) -> MutexGuard<'_, State> {
        self.state.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Count the call and return an injected failure, if any
    fn begin(&self, operation: Operation) -> Result<MutexGuard<'_, State>> {
        let mut state = self.lock();
        *state.calls.entry(operation).or_insert(0) += 1;
        if let Some(err) = state.faults.get_mut(&operation).and_then(VecDeque::pop_front) {
            log::debug!("MemoryBroker: injected failure for {operation:?}: {err}");
            return Err(err);
        }
        Ok(state)
    }
}

fn broker_not_found(broker_id: &str) -> Error {
    Error::NotFound {
        message: format!("Can't find requested broker [{broker_id}]"),
    }
}

fn user_not_found(broker_id: &str, username: &str) -> Error {
    Error::NotFound {
        message: format!("Can't find requested user [{username}] in broker [{broker_id}]"),
    }
}

fn check_password(password: &str) -> Result<()> {
    if password.chars().count() < MIN_PASSWORD_LEN {
        return Err(Error::BadRequest {
            message: format!("Password must be at least {MIN_PASSWORD_LEN} characters long"),
            attribute: Some("password".to_string()),
        });
    }
    Ok(())
}

impl MqApi for MemoryBroker {
    fn create_user(&self, input: &CreateUserInput) -> Result<()> {
        let mut state = self.begin(Operation::CreateUser)?;
        if input.username.is_empty() {
            return Err(Error::BadRequest {
                message: "Username must not be empty".to_string(),
                attribute: Some("username".to_string()),
            });
        }
        check_password(&input.password)?;

        let delay = state.visibility_delay;
        let users = state
            .brokers
            .get_mut(&input.broker_id)
            .ok_or_else(|| broker_not_found(&input.broker_id))?;
        if users.contains_key(&input.username) {
            return Err(Error::Conflict {
                message: format!(
                    "User [{}] already exists in broker [{}]",
                    input.username, input.broker_id
                ),
            });
        }

        users.insert(
            input.username.clone(),
            StoredUser {
                password: input.password.clone(),
                console_access: input.console_access.unwrap_or(false),
                groups: input.groups.clone().unwrap_or_default(),
                replication_user: input.replication_user.unwrap_or(false),
            },
        );
        if delay > 0 {
            state
                .hidden
                .insert((input.broker_id.clone(), input.username.clone()), delay);
        }
        log::debug!("MemoryBroker: created user {}/{}", input.broker_id, input.username);
        Ok(())
    }

    fn describe_user(&self, broker_id: &str, username: &str) -> Result<DescribeUserOutput> {
        let mut state = self.begin(Operation::DescribeUser)?;

        let key = (broker_id.to_string(), username.to_string());
        if let Some(remaining) = state.hidden.get_mut(&key) {
            *remaining -= 1;
            if *remaining == 0 {
                state.hidden.remove(&key);
            }
            return Err(user_not_found(broker_id, username));
        }

        let user = state
            .brokers
            .get(broker_id)
            .ok_or_else(|| broker_not_found(broker_id))?
            .get(username)
            .ok_or_else(|| user_not_found(broker_id, username))?;

        Ok(DescribeUserOutput {
            broker_id: broker_id.to_string(),
            username: username.to_string(),
            console_access: Some(user.console_access),
            groups: user.groups.clone(),
            replication_user: Some(user.replication_user),
        })
    }

    fn update_user(&self, input: &UpdateUserInput) -> Result<()> {
        let mut state = self.begin(Operation::UpdateUser)?;
        if let Some(password) = &input.password {
            check_password(password)?;
        }

        let user = state
            .brokers
            .get_mut(&input.broker_id)
            .ok_or_else(|| broker_not_found(&input.broker_id))?
            .get_mut(&input.username)
            .ok_or_else(|| user_not_found(&input.broker_id, &input.username))?;

        if let Some(password) = &input.password {
            user.password.clone_from(password);
        }
        if let Some(console_access) = input.console_access {
            user.console_access = console_access;
        }
        if let Some(groups) = &input.groups {
            user.groups.clone_from(groups);
        }
        if let Some(replication_user) = input.replication_user {
            user.replication_user = replication_user;
        }
        log::debug!("MemoryBroker: updated user {}/{}", input.broker_id, input.username);
        Ok(())
    }

    fn delete_user(&self, broker_id: &str, username: &str) -> Result<()> {
        let mut state = self.begin(Operation::DeleteUser)?;
        state
            .brokers
            .get_mut(broker_id)
            .ok_or_else(|| broker_not_found(broker_id))?
            .remove(username)
            .ok_or_else(|| user_not_found(broker_id, username))?;
        state
            .hidden
            .remove(&(broker_id.to_string(), username.to_string()));
        log::debug!("MemoryBroker: deleted user {broker_id}/{username}");
        Ok(())
    }

    fn list_users(&self, broker_id: &str) -> Result<Vec<UserSummary>> {
        let state = self.begin(Operation::ListUsers)?;
        let users = state
            .brokers
            .get(broker_id)
            .ok_or_else(|| broker_not_found(broker_id))?;
        Ok(users
            .keys()
            .map(|username| UserSummary {
                username: username.clone(),
            })
            .collect())
    }
}
