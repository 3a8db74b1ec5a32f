//! The lifecycle state machine
//!
//! A [`Reconciler`] drives one resource kind through create, stabilize,
//! read, update, delete and import against a [`RemoteClient`]. It owns no
//! cross-resource state: the store, the diagnostics sink and the client are
//! borrowed, so one reconciler can be shared across threads working on
//! distinct identifiers.

use crate::cancel::CancelToken;
use crate::change::{ChangeSet, diff};
use crate::config::ReconcileConfig;
use crate::diagnostics::{Action, Diagnostic, Diagnostics};
use crate::error::{ClassifiedError, Error, ErrorKind, Result};
use crate::finder::{Finder, Lookup};
use crate::identifier::ResourceId;
use crate::phase::{Lifecycle, Phase};
use crate::resource::{RemoteClient, Resource};
use crate::retry::{self, with_retry};
use crate::schema::Record;
use crate::store::{ResourceRecord, StateStore};
use crate::value::Attributes;
use std::time::Instant;

/// Identifier plus the complete observed attributes of a remote object
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ObservedState {
    pub id: ResourceId,
    pub attributes: Attributes,
}

/// Result of [`Reconciler::read`]
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ReadOutcome {
    Present(ObservedState),
    /// The object no longer exists; its record was removed
    Gone,
}

/// Result of [`Reconciler::update`]
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum UpdateOutcome {
    /// Desired already matched observed; nothing was sent
    Unchanged(ObservedState),
    Updated(ObservedState),
}

impl UpdateOutcome {
    pub fn state(&self) -> &ObservedState {
        match self {
            Self::Unchanged(s) | Self::Updated(s) => s,
        }
    }
}

/// Result of [`Reconciler::delete`]
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DeleteOutcome {
    Deleted,
    /// Nothing to delete; treated as success
    AlreadyAbsent,
}

/// Result of [`Reconciler::drift`]
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Drift {
    InSync,
    Changed(ChangeSet),
    Gone,
}

/// Drives the lifecycle of one resource kind
pub struct Reconciler<'a, R: Resource> {
    resource: &'a R,
    client: &'a R::Client,
    store: &'a dyn StateStore,
    diagnostics: &'a dyn Diagnostics,
    config: ReconcileConfig,
    cancel: CancelToken,
}

impl<'a, R: Resource> Reconciler<'a, R> {
    pub fn new(
        resource: &'a R,
        client: &'a R::Client,
        store: &'a dyn StateStore,
        diagnostics: &'a dyn Diagnostics,
    ) -> Self {
        Self {
            resource,
            client,
            store,
            diagnostics,
            config: ReconcileConfig::default(),
            cancel: CancelToken::never(),
        }
    }

    #[must_use]
    pub fn with_config(mut self, config: ReconcileConfig) -> Self {
        self.config = config;
        self
    }

    #[must_use]
    pub fn with_cancel(mut self, cancel: CancelToken) -> Self {
        self.cancel = cancel;
        self
    }

    pub fn config(&self) -> &ReconcileConfig {
        &self.config
    }

    fn resource_type(&self) -> &'static str {
        self.resource.resource_type()
    }

    fn finder(&self) -> Finder<'_, R> {
        Finder::new(self.resource, self.client)
    }

    /// Create the object, wait for it to become visible, and record it
    ///
    /// Failures before the remote assigns an identifier leave no state. Once
    /// the identifier is known it is kept, as an `Errored` record, even if
    /// stabilization times out or is cancelled.
    pub fn create(&self, desired: &R::Desired) -> Result<ObservedState> {
        let schema = self.resource.schema();
        let applied = desired.attributes();
        let mut lc = Lifecycle::new(self.resource.label(desired), Phase::Absent);
        lc.advance(Phase::Creating);

        log::debug!("Creating {} with {:?}", schema.display_name, schema.redacted(&applied));

        let request = self
            .resource
            .to_request(desired)
            .map_err(|e| self.fail(&mut lc, Action::Creating, e.into()))?;

        let created = with_retry(&self.config.retry, &self.cancel, retry::transient, |_| {
            self.client.create(&request).map_err(Error::from)
        })
        .map_err(|e| self.fail(&mut lc, Action::Creating, e))?;

        let id = self
            .resource
            .identifier(desired, &created)
            .and_then(|id| id.check().map(|()| id))
            .map_err(|e| self.fail(&mut lc, Action::Creating, e.into()))?;
        lc.rekey(id.to_string());
        lc.advance(Phase::Stabilizing);
        log::info!("Created {} {id}, waiting for it to become visible", schema.display_name);

        let attributes = match self.stabilize(&id, &applied) {
            Ok(attributes) => attributes,
            Err(e) => {
                let record = ResourceRecord::errored(id.clone(), None);
                if let Err(store_err) = self.store.put(self.resource_type(), &record) {
                    log::warn!("Failed to record errored {} {id}: {store_err}", schema.display_name);
                }
                return Err(self.fail(&mut lc, Action::WaitingForCreation, e));
            }
        };

        lc.advance(Phase::Present);
        self.store
            .put(self.resource_type(), &ResourceRecord::present(id.clone(), attributes.clone()))
            .map_err(|e| self.fail(&mut lc, Action::Creating, e.into()))?;

        Ok(ObservedState { id, attributes })
    }

    /// Poll until a freshly created object is readable
    fn stabilize(&self, id: &ResourceId, applied: &Attributes) -> Result<Attributes> {
        let schema = self.resource.schema();
        let config = &self.config.stabilize;
        let finder = self.finder();
        let started = Instant::now();
        let mut poll = 0;

        loop {
            if self.cancel.is_cancelled() {
                return Err(Error::Cancelled);
            }

            match finder.find(id) {
                Lookup::Found(mut attributes) => {
                    schema.carry_write_only(&mut attributes, applied);
                    log::debug!("{} {id} visible after {} polls", schema.display_name, poll + 1);
                    return Ok(attributes);
                }
                Lookup::NotFound => {
                    log::debug!("{} {id} not visible yet", schema.display_name);
                }
                Lookup::TransientFailure(e) => {
                    log::debug!("Transient failure reading {} {id}: {e}", schema.display_name);
                }
                Lookup::PermanentFailure(e) => return Err(e.into()),
            }

            let elapsed = started.elapsed();
            if elapsed >= config.timeout {
                return Err(Error::StabilizeTimeout {
                    id: id.clone(),
                    elapsed,
                });
            }
            let wait = config
                .interval_for_poll(poll)
                .min(config.timeout.saturating_sub(elapsed));
            self.cancel.sleep(wait).map_err(|_| Error::Cancelled)?;
            poll += 1;
        }
    }

    /// Refresh observed state from the remote
    ///
    /// Write-only attributes are carried over from the stored record. If
    /// the object is gone its record is removed and a warning reported.
    pub fn read(&self, id: &ResourceId) -> Result<ReadOutcome> {
        let schema = self.resource.schema();
        let key = id.to_string();
        let prior = self
            .store
            .get(self.resource_type(), id)
            .map_err(|e| self.report(Action::Reading, &key, e.into()))?;
        let mut lc = Lifecycle::new(
            key.as_str(),
            prior.as_ref().map_or(Phase::Absent, |r| r.phase),
        );

        match self.finder().find(id) {
            Lookup::Found(mut attributes) => {
                if let Some(previous) = prior.as_ref().and_then(|r| r.observed.as_ref()) {
                    schema.carry_write_only(&mut attributes, previous);
                }
                lc.advance(Phase::Present);
                self.store
                    .put(
                        self.resource_type(),
                        &ResourceRecord::present(id.clone(), attributes.clone()),
                    )
                    .map_err(|e| self.fail(&mut lc, Action::Reading, e.into()))?;
                Ok(ReadOutcome::Present(ObservedState {
                    id: id.clone(),
                    attributes,
                }))
            }
            Lookup::NotFound => {
                if lc.phase() != Phase::Absent {
                    lc.advance(Phase::Absent);
                }
                self.store
                    .remove(self.resource_type(), id)
                    .map_err(|e| self.fail(&mut lc, Action::Reading, e.into()))?;
                self.diagnostics.report(Diagnostic::warning(
                    Action::Reading,
                    self.resource_type(),
                    &key,
                    format!("{} ({key}) not found, removing from state", schema.display_name),
                    String::from("the remote object no longer exists"),
                ));
                Ok(ReadOutcome::Gone)
            }
            Lookup::TransientFailure(e) | Lookup::PermanentFailure(e) => {
                Err(self.report(Action::Reading, &key, e.into()))
            }
        }
    }

    /// Bring the remote object in line with `desired`
    ///
    /// Sends only the attributes that changed. Nothing is sent when there
    /// is no difference, or when an immutable attribute differs.
    pub fn update(&self, id: &ResourceId, desired: &R::Desired) -> Result<UpdateOutcome> {
        let schema = self.resource.schema();
        let key = id.to_string();
        let applied = desired.attributes();

        let prior = self
            .store
            .get(self.resource_type(), id)
            .map_err(|e| self.report(Action::Updating, &key, e.into()))?;
        let mut lc = Lifecycle::new(
            key.as_str(),
            prior.as_ref().map_or(Phase::Present, |r| r.phase),
        );

        let mut observed = match prior.and_then(|r| r.observed) {
            Some(observed) => observed,
            None => self
                .observe(id, None)
                .map_err(|e| self.fail(&mut lc, Action::Updating, e))?,
        };

        let mut changes = diff(schema, &applied, &observed);
        if changes.is_empty() {
            log::debug!("{} {key} is up to date", schema.display_name);
            return Ok(UpdateOutcome::Unchanged(ObservedState {
                id: id.clone(),
                attributes: observed,
            }));
        }
        if changes.requires_replace() {
            return Err(self.fail(&mut lc, Action::Updating, replacement(&changes)));
        }

        lc.advance(Phase::Updating);
        for change in &changes.updatable {
            log::debug!("{} {key}: {change}", schema.display_name);
        }

        let mut conflicted = false;
        let sent = with_retry(
            &self.config.retry,
            &self.cancel,
            retry::transient_or_conflict,
            |_| {
                if conflicted {
                    // Someone else changed the object; diff against what is there now
                    observed = self.observe(id, Some(&observed))?;
                    changes = diff(schema, &applied, &observed);
                    conflicted = false;
                    if changes.is_empty() {
                        return Ok(false);
                    }
                    if changes.requires_replace() {
                        return Err(replacement(&changes));
                    }
                }
                let patch = self.resource.to_patch(id, desired, &changes)?;
                self.client.update(id, &patch).map(|()| true).map_err(|e| {
                    conflicted = e.kind() == ErrorKind::Conflict;
                    Error::from(e)
                })
            },
        )
        .map_err(|e| self.fail(&mut lc, Action::Updating, e))?;

        if !sent {
            log::debug!("{} {key} already matched after refresh", schema.display_name);
        }

        let attributes = match self.observe(id, Some(&applied)) {
            Ok(attributes) => attributes,
            Err(e) => {
                let record = ResourceRecord::errored(id.clone(), Some(observed));
                if let Err(store_err) = self.store.put(self.resource_type(), &record) {
                    log::warn!("Failed to record errored {} {key}: {store_err}", schema.display_name);
                }
                return Err(self.fail(&mut lc, Action::Updating, e));
            }
        };

        lc.advance(Phase::Present);
        self.store
            .put(
                self.resource_type(),
                &ResourceRecord::present(id.clone(), attributes.clone()),
            )
            .map_err(|e| self.fail(&mut lc, Action::Updating, e.into()))?;

        log::info!("Updated {} {key}", schema.display_name);
        Ok(UpdateOutcome::Updated(ObservedState {
            id: id.clone(),
            attributes,
        }))
    }

    /// Delete the remote object
    ///
    /// Deleting something that is already gone succeeds. If retries run out
    /// the record is kept and marked `Errored`.
    pub fn delete(&self, id: &ResourceId) -> Result<DeleteOutcome> {
        let schema = self.resource.schema();
        let key = id.to_string();

        if !id.is_complete(&schema.import_format) {
            log::debug!("{} identifier {key:?} is incomplete, nothing to delete", schema.display_name);
            self.store
                .remove(self.resource_type(), id)
                .map_err(|e| self.report(Action::Deleting, &key, e.into()))?;
            return Ok(DeleteOutcome::AlreadyAbsent);
        }

        let prior = self
            .store
            .get(self.resource_type(), id)
            .map_err(|e| self.report(Action::Deleting, &key, e.into()))?;
        let mut lc = Lifecycle::new(
            key.as_str(),
            prior.as_ref().map_or(Phase::Present, |r| r.phase),
        );
        lc.advance(Phase::Deleting);

        let result = with_retry(
            &self.config.retry,
            &self.cancel,
            retry::transient_or_conflict,
            |attempt| match self.client.delete(id) {
                Ok(()) => Ok(DeleteOutcome::Deleted),
                // A not-found after a failed attempt may be our own earlier delete
                Err(e) if e.is_not_found() && attempt > 0 => Ok(DeleteOutcome::Deleted),
                Err(e) if e.is_not_found() => Ok(DeleteOutcome::AlreadyAbsent),
                Err(e) => Err(Error::from(e)),
            },
        );

        match result {
            Ok(outcome) => {
                lc.advance(Phase::Absent);
                self.store
                    .remove(self.resource_type(), id)
                    .map_err(|e| self.fail(&mut lc, Action::Deleting, e.into()))?;
                match outcome {
                    DeleteOutcome::Deleted => log::info!("Deleted {} {key}", schema.display_name),
                    DeleteOutcome::AlreadyAbsent => {
                        log::debug!("{} {key} was already gone", schema.display_name);
                    }
                }
                Ok(outcome)
            }
            Err(e @ Error::RetriesExhausted { .. }) => {
                let record = ResourceRecord::errored(id.clone(), prior.and_then(|r| r.observed));
                if let Err(store_err) = self.store.put(self.resource_type(), &record) {
                    log::warn!("Failed to record errored {} {key}: {store_err}", schema.display_name);
                }
                Err(self.fail(&mut lc, Action::Deleting, e))
            }
            Err(e) => Err(self.fail(&mut lc, Action::Deleting, e)),
        }
    }

    /// Adopt an existing remote object by its import string
    pub fn import(&self, raw: &str) -> Result<ObservedState> {
        let schema = self.resource.schema();
        let format = &schema.import_format;

        let Some(id) = format.parse(raw) else {
            let err = Error::InvalidImportId {
                raw: raw.to_string(),
                expected: format.describe(),
            };
            return Err(self.report(Action::Importing, raw, err));
        };

        let mut lc = Lifecycle::new(id.to_string(), Phase::Absent);
        match self.finder().find(&id) {
            Lookup::Found(attributes) => {
                lc.advance(Phase::Present);
                self.store
                    .put(
                        self.resource_type(),
                        &ResourceRecord::present(id.clone(), attributes.clone()),
                    )
                    .map_err(|e| self.fail(&mut lc, Action::Importing, e.into()))?;
                log::info!("Imported {} {id}", schema.display_name);
                Ok(ObservedState { id, attributes })
            }
            Lookup::NotFound => Err(self.fail(&mut lc, Action::Importing, Error::ImportNotFound { id })),
            Lookup::TransientFailure(e) | Lookup::PermanentFailure(e) => {
                Err(self.fail(&mut lc, Action::Importing, e.into()))
            }
        }
    }

    /// Read, then compare against `desired`
    pub fn drift(&self, id: &ResourceId, desired: &R::Desired) -> Result<Drift> {
        match self.read(id)? {
            ReadOutcome::Gone => Ok(Drift::Gone),
            ReadOutcome::Present(state) => {
                let changes = diff(self.resource.schema(), &desired.attributes(), &state.attributes);
                if changes.is_empty() {
                    Ok(Drift::InSync)
                } else {
                    Ok(Drift::Changed(changes))
                }
            }
        }
    }

    /// Delete `id`, then create `desired` under whatever identifier it gets
    pub fn replace(&self, id: &ResourceId, desired: &R::Desired) -> Result<ObservedState> {
        log::info!("Replacing {} {id}", self.resource.schema().display_name);
        self.delete(id)?;
        self.create(desired)
    }

    /// Remote objects under `parent` that are not tracked in the store
    pub fn discover(&self, parent: &str) -> Result<Vec<ResourceId>> {
        let remote = with_retry(&self.config.retry, &self.cancel, retry::transient, |_| {
            self.client.list(parent).map_err(Error::from)
        })
        .map_err(|e| self.report(Action::Listing, parent, e))?;

        let tracked = self
            .store
            .list(self.resource_type())
            .map_err(|e| self.report(Action::Listing, parent, e.into()))?;

        Ok(remote
            .into_iter()
            .filter(|id| !tracked.contains(id))
            .collect())
    }

    /// One lookup, as a `Result`; NotFound is an error here
    fn observe(&self, id: &ResourceId, carry_from: Option<&Attributes>) -> Result<Attributes> {
        let schema = self.resource.schema();
        match self.finder().find(id) {
            Lookup::Found(mut attributes) => {
                if let Some(applied) = carry_from {
                    schema.carry_write_only(&mut attributes, applied);
                }
                Ok(attributes)
            }
            Lookup::NotFound => Err(Error::Remote(ClassifiedError::not_found(format!(
                "{} {id} not found",
                schema.display_name
            )))),
            Lookup::TransientFailure(e) | Lookup::PermanentFailure(e) => Err(e.into()),
        }
    }

    fn fail(&self, lc: &mut Lifecycle, action: Action, err: Error) -> Error {
        lc.advance(Phase::Errored);
        let key = lc.key().to_string();
        self.report(action, &key, err)
    }

    fn report(&self, action: Action, key: &str, err: Error) -> Error {
        let schema = self.resource.schema();
        self.diagnostics.report(Diagnostic::error(
            action,
            schema.type_name,
            schema.display_name,
            key,
            &err,
        ));
        err
    }
}

fn replacement(changes: &ChangeSet) -> Error {
    Error::ReplacementRequired {
        attributes: changes
            .force_replace_names()
            .into_iter()
            .map(str::to_string)
            .collect(),
    }
}
