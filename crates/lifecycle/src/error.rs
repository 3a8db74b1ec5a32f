//! Error taxonomy for lifecycle operations.
//!
//! Remote failures are classified once, at the client seam, into an
//! [`ErrorKind`]. The kind decides whether an operation is retried, treated
//! as "object absent", or surfaced to the caller. The provider's own error
//! is always kept as the `source()` for operator debugging.

use crate::identifier::ResourceId;
use std::fmt;
use std::time::Duration;
use thiserror::Error;

/// Boxed provider error
pub type BoxError = Box<dyn std::error::Error + Send + Sync + 'static>;

/// Classification of a failure.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ErrorKind {
    /// Remote object absent
    NotFound,
    /// Rate limits, eventual-consistency windows, network errors
    Transient,
    /// Concurrent modification
    Conflict,
    /// Malformed request, auth/permission denial, validation error
    Permanent,
    /// Caller-initiated abort
    Cancelled,
}

impl ErrorKind {
    /// Whether this kind is worth retrying after a backoff.
    pub fn is_retryable(&self) -> bool {
        matches!(self, Self::Transient)
    }

    pub fn description(&self) -> &'static str {
        match self {
            Self::NotFound => "not found",
            Self::Transient => "transient",
            Self::Conflict => "conflict",
            Self::Permanent => "permanent",
            Self::Cancelled => "cancelled",
        }
    }
}

impl fmt::Display for ErrorKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.description())
    }
}

/// A provider error with its classification.
#[derive(Debug, Error)]
#[error("{kind} error: {source}")]
pub struct ClassifiedError {
    kind: ErrorKind,
    #[source]
    source: BoxError,
}

impl ClassifiedError {
    pub fn new(kind: ErrorKind, source: impl Into<BoxError>) -> Self {
        Self {
            kind,
            source: source.into(),
        }
    }

    pub fn not_found(source: impl Into<BoxError>) -> Self {
        Self::new(ErrorKind::NotFound, source)
    }

    pub fn transient(source: impl Into<BoxError>) -> Self {
        Self::new(ErrorKind::Transient, source)
    }

    pub fn conflict(source: impl Into<BoxError>) -> Self {
        Self::new(ErrorKind::Conflict, source)
    }

    pub fn permanent(source: impl Into<BoxError>) -> Self {
        Self::new(ErrorKind::Permanent, source)
    }

    pub fn kind(&self) -> ErrorKind {
        self.kind
    }

    pub fn is_not_found(&self) -> bool {
        self.kind == ErrorKind::NotFound
    }

    /// The underlying provider error
    pub fn provider_error(&self) -> &(dyn std::error::Error + Send + Sync + 'static) {
        self.source.as_ref()
    }
}

/// Errors raised while translating between records and remote shapes.
///
/// These never come from the network.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum TranslateError {
    /// A required attribute is missing
    #[error("missing attribute: {0}")]
    MissingAttribute(String),

    /// An attribute failed validation
    #[error("invalid value for {name}: {reason}")]
    Invalid { name: String, reason: String },

    /// Response is missing attributes a full refresh must carry
    #[error("incomplete response, missing: {}", .0.join(", "))]
    Incomplete(Vec<String>),
}

impl TranslateError {
    pub fn invalid(name: impl Into<String>, reason: impl Into<String>) -> Self {
        Self::Invalid {
            name: name.into(),
            reason: reason.into(),
        }
    }
}

/// Error from a state store backend.
#[derive(Debug, Error)]
#[error("state store error: {0}")]
pub struct StoreError(#[source] BoxError);

impl StoreError {
    pub fn new(source: impl Into<BoxError>) -> Self {
        Self(source.into())
    }
}

/// Errors returned by [`Reconciler`](crate::Reconciler) operations.
#[derive(Debug, Error)]
pub enum Error {
    /// Remote call failed and was not retried
    #[error(transparent)]
    Remote(ClassifiedError),

    /// Remote call kept failing with retryable errors
    #[error("gave up after {attempts} attempts: {last}")]
    RetriesExhausted {
        attempts: u32,
        #[source]
        last: ClassifiedError,
    },

    /// Created object never became visible
    #[error("timed out after {elapsed:?} waiting for {id} to become visible")]
    StabilizeTimeout { id: ResourceId, elapsed: Duration },

    /// Caller aborted the operation
    #[error("operation cancelled")]
    Cancelled,

    /// In-place update impossible; immutable attributes changed
    #[error("replacement required, immutable attributes changed: {}", .attributes.join(", "))]
    ReplacementRequired { attributes: Vec<String> },

    /// Import string does not match the documented format
    #[error("wrong format of import ID ({raw}), use: {expected}")]
    InvalidImportId { raw: String, expected: String },

    /// Import target does not exist remotely
    #[error("cannot import non-existent remote object {id}")]
    ImportNotFound { id: ResourceId },

    #[error(transparent)]
    Translate(#[from] TranslateError),

    #[error(transparent)]
    Store(#[from] StoreError),
}

impl Error {
    /// Classification of this error for the caller.
    pub fn kind(&self) -> ErrorKind {
        match self {
            Error::Remote(e) => e.kind(),
            Error::RetriesExhausted { .. } | Error::StabilizeTimeout { .. } | Error::Store(_) => {
                ErrorKind::Transient
            }
            Error::Cancelled => ErrorKind::Cancelled,
            Error::ImportNotFound { .. } => ErrorKind::NotFound,
            Error::ReplacementRequired { .. }
            | Error::InvalidImportId { .. }
            | Error::Translate(_) => ErrorKind::Permanent,
        }
    }

    /// Whether this error means the object is gone.
    pub fn is_not_found(&self) -> bool {
        self.kind() == ErrorKind::NotFound
    }
}

impl From<ClassifiedError> for Error {
    fn from(e: ClassifiedError) -> Self {
        if e.kind() == ErrorKind::Cancelled {
            return Error::Cancelled;
        }
        Error::Remote(e)
    }
}

/// Result type for lifecycle operations.
pub type Result<T> = std::result::Result<T, Error>;
