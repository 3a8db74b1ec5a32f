//! Per-session wiring
//!
//! A [`Session`] owns the configuration, the state store and a
//! [`ClientFactory`] chosen by the embedder. Service clients are built on
//! first use and reused for the rest of the session.

use crate::config::ProviderConfig;
use crate::refresh::{RefreshSummary, refresh_all};
use crate::resource::{USER_SCHEMA, UserClient, UserResource};
use anyhow::{Result, bail};
use lifecycle::{
    CancelToken, Diagnostics, LogDiagnostics, ReconcileConfig, Reconciler, StateStore,
};
use mqkit::backend::memory::MemoryBroker;
use std::sync::{Arc, OnceLock};

/// Builds service clients for a session
pub trait ClientFactory: Send + Sync {
    /// Connect to `service`, optionally at an overridden base endpoint
    fn connect(&self, service: &str, endpoint: Option<&str>) -> Result<mqkit::Client>;
}

/// Factory handing out clients over a shared [`MemoryBroker`]
#[derive(Debug, Clone, Default)]
pub struct MemoryClientFactory {
    broker: MemoryBroker,
}

impl MemoryClientFactory {
    pub fn new(broker: MemoryBroker) -> Self {
        Self { broker }
    }

    pub fn broker(&self) -> &MemoryBroker {
        &self.broker
    }
}

impl ClientFactory for MemoryClientFactory {
    fn connect(&self, service: &str, endpoint: Option<&str>) -> Result<mqkit::Client> {
        if service != "mq" {
            bail!("no {service} backend available in memory");
        }
        let client = mqkit::Client::with_backend(Arc::new(self.broker.clone()));
        Ok(match endpoint {
            Some(endpoint) => client.with_endpoint(endpoint),
            None => client,
        })
    }
}

/// Configuration, state and clients for one run
pub struct Session {
    config: ProviderConfig,
    factory: Box<dyn ClientFactory>,
    store: Box<dyn StateStore>,
    diagnostics: Box<dyn Diagnostics>,
    cancel: CancelToken,
    mq: OnceLock<UserClient>,
}

impl Session {
    /// Create a session that reports diagnostics through the log
    pub fn new(
        config: ProviderConfig,
        factory: Box<dyn ClientFactory>,
        store: Box<dyn StateStore>,
    ) -> Self {
        Self {
            config,
            factory,
            store,
            diagnostics: Box::new(LogDiagnostics),
            cancel: CancelToken::never(),
            mq: OnceLock::new(),
        }
    }

    #[must_use]
    pub fn with_diagnostics(mut self, diagnostics: Box<dyn Diagnostics>) -> Self {
        self.diagnostics = diagnostics;
        self
    }

    /// Abort every in-flight operation of this session when `cancel` fires
    #[must_use]
    pub fn with_cancel(mut self, cancel: CancelToken) -> Self {
        self.cancel = cancel;
        self
    }

    pub fn config(&self) -> &ProviderConfig {
        &self.config
    }

    pub fn store(&self) -> &dyn StateStore {
        self.store.as_ref()
    }

    pub fn reconcile_config(&self, type_name: &str) -> ReconcileConfig {
        self.config.reconcile_config(type_name)
    }

    /// MQ user client, connected on first call
    pub fn mq_client(&self) -> Result<&UserClient> {
        if let Some(client) = self.mq.get() {
            return Ok(client);
        }
        let endpoint = self.config.endpoint("mq");
        log::debug!(
            "Connecting to mq{}",
            endpoint.map(|e| format!(" at {e}")).unwrap_or_default()
        );
        let api = self.factory.connect("mq", endpoint)?;
        Ok(self.mq.get_or_init(|| UserClient::new(api)))
    }

    /// Reconciler for `mq_user`, tuned from configuration
    pub fn mq_users(&self) -> Result<Reconciler<'_, UserResource>> {
        let client = self.mq_client()?;
        Ok(
            Reconciler::new(&UserResource, client, self.store(), self.diagnostics.as_ref())
                .with_config(self.reconcile_config(USER_SCHEMA.type_name))
                .with_cancel(self.cancel.clone()),
        )
    }

    /// Re-read every tracked `mq_user` in parallel
    ///
    /// State changes are batched and persisted once at the end.
    pub fn refresh_mq_users(&self) -> Result<RefreshSummary> {
        let reconciler = self.mq_users()?;
        let ids = self.store.list(USER_SCHEMA.type_name)?;
        self.store.begin_batch();
        let summary = refresh_all(&reconciler, &ids, self.config.refresh_parallelism);
        self.store.end_batch()?;
        summary
    }
}

impl std::fmt::Debug for Session {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Session")
            .field("config", &self.config)
            .field("mq_connected", &self.mq.get().is_some())
            .finish_non_exhaustive()
    }
}
