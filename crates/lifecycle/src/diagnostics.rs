//! Diagnostics channel
//!
//! The reconciler reports one [`Diagnostic`] per failure. The only silent
//! cases are a delete that finds the object already gone and the
//! not-yet-visible reads while stabilizing.

use std::error::Error as StdError;
use std::fmt;
use std::sync::Mutex;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Severity {
    Warning,
    Error,
}

/// What the reconciler was doing when it failed
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Action {
    Creating,
    WaitingForCreation,
    Reading,
    Updating,
    Deleting,
    Importing,
    Listing,
}

impl Action {
    pub fn as_str(&self) -> &'static str {
        match self {
            Action::Creating => "creating",
            Action::WaitingForCreation => "waiting for creation of",
            Action::Reading => "reading",
            Action::Updating => "updating",
            Action::Deleting => "deleting",
            Action::Importing => "importing",
            Action::Listing => "listing",
        }
    }
}

impl fmt::Display for Action {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A structured report of one failure
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Diagnostic {
    pub severity: Severity,
    pub action: Action,
    pub resource_type: String,
    pub resource_key: String,
    /// e.g. "creating MQ User (b-1/alice)"
    pub summary: String,
    /// The underlying error, with its source chain
    pub detail: String,
}

impl Diagnostic {
    pub fn error(
        action: Action,
        resource_type: &str,
        display_name: &str,
        resource_key: &str,
        err: &(dyn StdError + 'static),
    ) -> Self {
        Self {
            severity: Severity::Error,
            action,
            resource_type: resource_type.to_string(),
            resource_key: resource_key.to_string(),
            summary: format!("{action} {display_name} ({resource_key})"),
            detail: error_chain(err),
        }
    }

    pub fn warning(
        action: Action,
        resource_type: &str,
        resource_key: &str,
        summary: String,
        detail: String,
    ) -> Self {
        Self {
            severity: Severity::Warning,
            action,
            resource_type: resource_type.to_string(),
            resource_key: resource_key.to_string(),
            summary,
            detail,
        }
    }

    pub fn is_error(&self) -> bool {
        self.severity == Severity::Error
    }
}

impl fmt::Display for Diagnostic {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}: {}", self.summary, self.detail)
    }
}

/// Render an error and its sources as "outer: inner: root"
pub fn error_chain(err: &(dyn StdError + 'static)) -> String {
    let mut out = err.to_string();
    let mut source = err.source();
    while let Some(e) = source {
        let msg = e.to_string();
        // thiserror messages often embed their source already
        if !out.contains(&msg) {
            out.push_str(": ");
            out.push_str(&msg);
        }
        source = e.source();
    }
    out
}

/// Receiver of diagnostics
pub trait Diagnostics: Send + Sync {
    fn report(&self, diagnostic: Diagnostic);
}

/// Writes diagnostics to the log
pub struct LogDiagnostics;

impl Diagnostics for LogDiagnostics {
    fn report(&self, diagnostic: Diagnostic) {
        match diagnostic.severity {
            Severity::Error => log::error!("{diagnostic}"),
            Severity::Warning => log::warn!("{diagnostic}"),
        }
    }
}

/// Collects diagnostics for the caller to inspect
#[derive(Debug, Default)]
pub struct CollectDiagnostics {
    items: Mutex<Vec<Diagnostic>>,
}

impl CollectDiagnostics {
    pub fn new() -> Self {
        Self::default()
    }

    /// Take everything reported so far
    pub fn take(&self) -> Vec<Diagnostic> {
        self.items
            .lock()
            .map(|mut items| std::mem::take(&mut *items))
            .unwrap_or_default()
    }

    pub fn len(&self) -> usize {
        self.items.lock().map(|items| items.len()).unwrap_or(0)
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    pub fn has_errors(&self) -> bool {
        self.items
            .lock()
            .map(|items| items.iter().any(Diagnostic::is_error))
            .unwrap_or(false)
    }
}

impl Diagnostics for CollectDiagnostics {
    fn report(&self, diagnostic: Diagnostic) {
        log::debug!("diagnostic: {diagnostic}");
        if let Ok(mut items) = self.items.lock() {
            items.push(diagnostic);
        }
    }
}
