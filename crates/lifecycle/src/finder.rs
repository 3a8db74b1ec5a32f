//! Lookup of a remote object by identifier

use crate::error::{ClassifiedError, ErrorKind, TranslateError};
use crate::identifier::ResourceId;
use crate::resource::{RemoteClient, Resource};
use crate::value::Attributes;

/// Outcome of a single lookup
#[derive(Debug)]
pub enum Lookup {
    /// Object exists; attributes are a complete projection
    Found(Attributes),
    /// Object does not exist (or the identifier can't name one)
    NotFound,
    /// Lookup failed in a way that may succeed later
    TransientFailure(ClassifiedError),
    /// Lookup can never succeed as issued
    PermanentFailure(ClassifiedError),
}

impl Lookup {
    pub fn is_found(&self) -> bool {
        matches!(self, Self::Found(_))
    }

    pub fn is_not_found(&self) -> bool {
        matches!(self, Self::NotFound)
    }
}

/// Reads one object and classifies the outcome
pub struct Finder<'a, R: Resource> {
    resource: &'a R,
    client: &'a R::Client,
}

impl<'a, R: Resource> Finder<'a, R> {
    pub fn new(resource: &'a R, client: &'a R::Client) -> Self {
        Self { resource, client }
    }

    /// Look up `id`
    ///
    /// An incomplete identifier is NotFound without a remote call. A
    /// response that doesn't project to a complete observation counts as a
    /// permanent failure, so callers never store partial state.
    pub fn find(&self, id: &ResourceId) -> Lookup {
        let schema = self.resource.schema();
        if !id.is_complete(&schema.import_format) {
            log::debug!(
                "Cannot find {} with incomplete identifier {:?}",
                schema.display_name,
                id.to_string()
            );
            return Lookup::NotFound;
        }

        let response = match self.client.read(id) {
            Ok(response) => response,
            Err(e) => return classify(e),
        };

        let attributes = match self.resource.to_observed(&response) {
            Ok(attrs) => schema.project(&attrs),
            Err(e) => return Lookup::PermanentFailure(ClassifiedError::permanent(e)),
        };

        let missing = schema.missing_from(&attributes);
        if !missing.is_empty() {
            let e = TranslateError::Incomplete(
                missing.into_iter().map(str::to_string).collect(),
            );
            return Lookup::PermanentFailure(ClassifiedError::permanent(e));
        }

        Lookup::Found(attributes)
    }
}

fn classify(err: ClassifiedError) -> Lookup {
    match err.kind() {
        ErrorKind::NotFound => Lookup::NotFound,
        ErrorKind::Permanent | ErrorKind::Cancelled => Lookup::PermanentFailure(err),
        ErrorKind::Transient | ErrorKind::Conflict => Lookup::TransientFailure(err),
    }
}
