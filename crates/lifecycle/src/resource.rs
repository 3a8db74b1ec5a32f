//! Resource adapter traits
//!
//! A resource kind plugs into the generic [`Reconciler`](crate::Reconciler)
//! by implementing two traits:
//!
//! - [`RemoteClient`]: the capability that talks to the provider for one
//!   remote object type, returning raw responses or a [`ClassifiedError`]
//! - [`Resource`]: the pure translation between the typed desired record
//!   and the client's request/response shapes, plus the field table
//!
//! # Example
//!
//! ```ignore
//! struct QueueResource;
//!
//! impl Resource for QueueResource {
//!     type Desired = Queue;
//!     type Client = QueueClient;
//!
//!     fn schema(&self) -> &'static Schema { &QUEUE_SCHEMA }
//!
//!     fn to_request(&self, desired: &Queue) -> Result<CreateQueue, TranslateError> {
//!         Ok(CreateQueue { name: desired.name.clone() })
//!     }
//!
//!     fn to_observed(&self, out: &QueueDescription) -> Result<Attributes, TranslateError> {
//!         Ok(Attributes::new().with("name", out.name.as_str()).with("arn", out.arn.as_str()))
//!     }
//!
//!     fn to_patch(&self, id: &ResourceId, desired: &Queue, changes: &ChangeSet)
//!         -> Result<QueuePatch, TranslateError> { /* only changed fields */ }
//!
//!     fn identifier(&self, desired: &Queue, _created: &()) -> Result<ResourceId, TranslateError> {
//!         Ok(ResourceId::new([desired.name.as_str()]))
//!     }
//! }
//! ```

use crate::change::ChangeSet;
use crate::error::{ClassifiedError, TranslateError};
use crate::identifier::ResourceId;
use crate::schema::{Record, Schema};
use crate::value::Attributes;

/// Calls against one remote resource type
///
/// Every call must be safe to repeat after a transient failure; callers do
/// not assume at-most-once delivery.
pub trait RemoteClient: Send + Sync {
    /// Create request body
    type Request;
    /// What a successful create returns (often nothing useful)
    type Created;
    /// Read response body
    type Response;
    /// Update request body carrying only changed fields
    type Patch;

    fn create(&self, request: &Self::Request) -> Result<Self::Created, ClassifiedError>;

    fn read(&self, id: &ResourceId) -> Result<Self::Response, ClassifiedError>;

    fn update(&self, id: &ResourceId, patch: &Self::Patch) -> Result<(), ClassifiedError>;

    fn delete(&self, id: &ResourceId) -> Result<(), ClassifiedError>;

    /// Identifiers of all objects under `parent`
    fn list(&self, parent: &str) -> Result<Vec<ResourceId>, ClassifiedError>;
}

/// Translation between a typed record and its remote representation
///
/// All methods are pure: no network access, no provider errors.
pub trait Resource: Send + Sync {
    type Desired: Record;
    type Client: RemoteClient;

    /// Field table for this resource kind
    fn schema(&self) -> &'static Schema;

    /// Stable type name
    fn resource_type(&self) -> &'static str {
        self.schema().type_name
    }

    /// Label for a desired record in diagnostics, before it has an identifier
    fn label(&self, _desired: &Self::Desired) -> String {
        String::from("(new)")
    }

    /// Build the create request, validating the desired record
    fn to_request(
        &self,
        desired: &Self::Desired,
    ) -> Result<<Self::Client as RemoteClient>::Request, TranslateError>;

    /// Project a read response into observed attributes
    fn to_observed(
        &self,
        response: &<Self::Client as RemoteClient>::Response,
    ) -> Result<Attributes, TranslateError>;

    /// Build an update request from the `updatable` part of a change set
    fn to_patch(
        &self,
        id: &ResourceId,
        desired: &Self::Desired,
        changes: &ChangeSet,
    ) -> Result<<Self::Client as RemoteClient>::Patch, TranslateError>;

    /// Identifier assigned by a successful create
    fn identifier(
        &self,
        desired: &Self::Desired,
        created: &<Self::Client as RemoteClient>::Created,
    ) -> Result<ResourceId, TranslateError>;
}
