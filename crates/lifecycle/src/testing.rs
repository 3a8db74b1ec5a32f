//! Test doubles shared by the unit tests in this crate

use crate::change::ChangeSet;
use crate::error::{ClassifiedError, TranslateError};
use crate::identifier::{ImportFormat, ResourceId};
use crate::resource::{RemoteClient, Resource};
use crate::schema::{FieldSpec, Record, Schema};
use crate::value::{Attributes, Value};
use std::collections::{BTreeMap, VecDeque};
use std::sync::Mutex;

static WIDGET_FIELDS: &[FieldSpec] = &[
    FieldSpec::new("parent").immutable(),
    FieldSpec::new("name").immutable(),
    FieldSpec::new("color"),
    FieldSpec::new("secret").sensitive().write_only(),
    FieldSpec::new("tags").remote_default(),
    FieldSpec::new("arn").computed(),
];

pub(crate) static WIDGET_SCHEMA: Schema = Schema {
    type_name: "widget",
    display_name: "Widget",
    fields: WIDGET_FIELDS,
    import_format: ImportFormat::new(&["parent", "name"]),
};

#[derive(Debug, Clone, Default, PartialEq)]
pub(crate) struct Widget {
    pub parent: String,
    pub name: String,
    pub color: String,
    pub secret: String,
    pub tags: Option<Vec<String>>,
}

impl Widget {
    pub(crate) fn new(name: &str, color: &str) -> Self {
        Self {
            parent: "p".into(),
            name: name.into(),
            color: color.into(),
            secret: "hunter2hunter2".into(),
            tags: None,
        }
    }

    pub(crate) fn id(&self) -> ResourceId {
        ResourceId::new([self.parent.as_str(), self.name.as_str()])
    }
}

impl Record for Widget {
    fn attributes(&self) -> Attributes {
        Attributes::new()
            .with("parent", self.parent.as_str())
            .with("name", self.name.as_str())
            .with("color", self.color.as_str())
            .with("secret", self.secret.as_str())
            .with("tags", self.tags.clone().map(Value::string_list))
    }
}

#[derive(Debug, Clone)]
pub(crate) struct WidgetRequest {
    pub parent: String,
    pub name: String,
    pub color: String,
    pub tags: Vec<String>,
}

#[derive(Debug, Clone, PartialEq)]
pub(crate) struct WidgetResponse {
    pub parent: String,
    pub name: String,
    pub color: String,
    pub tags: Vec<String>,
    pub arn: Option<String>,
}

pub(crate) fn widget_response(name: &str, color: &str) -> WidgetResponse {
    WidgetResponse {
        parent: "p".into(),
        name: name.into(),
        color: color.into(),
        tags: Vec::new(),
        arn: Some(format!("arn:widget:p/{name}")),
    }
}

#[derive(Debug, Clone, Default, PartialEq)]
pub(crate) struct WidgetPatch {
    pub color: Option<String>,
    pub secret: Option<String>,
    pub tags: Option<Vec<String>>,
}

pub(crate) struct WidgetResource;

impl Resource for WidgetResource {
    type Desired = Widget;
    type Client = StubClient;

    fn schema(&self) -> &'static Schema {
        &WIDGET_SCHEMA
    }

    fn label(&self, desired: &Widget) -> String {
        desired.id().to_string()
    }

    fn to_request(&self, desired: &Widget) -> Result<WidgetRequest, TranslateError> {
        if desired.color.is_empty() {
            return Err(TranslateError::invalid("color", "must not be empty"));
        }
        Ok(WidgetRequest {
            parent: desired.parent.clone(),
            name: desired.name.clone(),
            color: desired.color.clone(),
            tags: desired.tags.clone().unwrap_or_default(),
        })
    }

    fn to_observed(&self, response: &WidgetResponse) -> Result<Attributes, TranslateError> {
        Ok(Attributes::new()
            .with("parent", response.parent.as_str())
            .with("name", response.name.as_str())
            .with("color", response.color.as_str())
            .with("tags", Value::string_list(response.tags.iter().map(String::as_str)))
            .with("arn", response.arn.clone()))
    }

    fn to_patch(
        &self,
        _id: &ResourceId,
        desired: &Widget,
        changes: &ChangeSet,
    ) -> Result<WidgetPatch, TranslateError> {
        Ok(WidgetPatch {
            color: changes.updates("color").then(|| desired.color.clone()),
            secret: changes.updates("secret").then(|| desired.secret.clone()),
            tags: if changes.updates("tags") {
                desired.tags.clone()
            } else {
                None
            },
        })
    }

    fn identifier(&self, desired: &Widget, _created: &()) -> Result<ResourceId, TranslateError> {
        Ok(desired.id())
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum Call {
    Create,
    Read,
    Update,
    Delete,
    List,
}

type Scripted<T> = Mutex<VecDeque<Result<T, ClassifiedError>>>;

/// A fake remote: objects live in a map, and scripted results pushed onto a
/// per-call queue take precedence over the map.
#[derive(Default)]
pub(crate) struct StubClient {
    objects: Mutex<BTreeMap<ResourceId, WidgetResponse>>,
    calls: Mutex<Vec<Call>>,
    patches: Mutex<Vec<WidgetPatch>>,
    creates: Scripted<()>,
    reads: Scripted<WidgetResponse>,
    updates: Scripted<()>,
    deletes: Scripted<()>,
}

impl StubClient {
    pub(crate) fn new() -> Self {
        Self::default()
    }

    /// Seed an existing remote object
    pub(crate) fn with_object(self, response: WidgetResponse) -> Self {
        let id = ResourceId::new([response.parent.as_str(), response.name.as_str()]);
        self.objects.lock().unwrap().insert(id, response);
        self
    }

    pub(crate) fn object(&self, id: &ResourceId) -> Option<WidgetResponse> {
        self.objects.lock().unwrap().get(id).cloned()
    }

    /// Change a remote object behind the reconciler's back
    pub(crate) fn mutate(&self, id: &ResourceId, f: impl FnOnce(&mut WidgetResponse)) {
        if let Some(obj) = self.objects.lock().unwrap().get_mut(id) {
            f(obj);
        }
    }

    pub(crate) fn push_create(&self, result: Result<(), ClassifiedError>) {
        self.creates.lock().unwrap().push_back(result);
    }

    pub(crate) fn push_read(&self, result: Result<WidgetResponse, ClassifiedError>) {
        self.reads.lock().unwrap().push_back(result);
    }

    pub(crate) fn push_update(&self, result: Result<(), ClassifiedError>) {
        self.updates.lock().unwrap().push_back(result);
    }

    pub(crate) fn push_delete(&self, result: Result<(), ClassifiedError>) {
        self.deletes.lock().unwrap().push_back(result);
    }

    pub(crate) fn count(&self, call: Call) -> usize {
        self.calls.lock().unwrap().iter().filter(|c| **c == call).count()
    }

    pub(crate) fn total_calls(&self) -> usize {
        self.calls.lock().unwrap().len()
    }

    pub(crate) fn patches(&self) -> Vec<WidgetPatch> {
        self.patches.lock().unwrap().clone()
    }

    fn record(&self, call: Call) {
        self.calls.lock().unwrap().push(call);
    }
}

fn scripted<T>(queue: &Scripted<T>) -> Option<Result<T, ClassifiedError>> {
    queue.lock().unwrap().pop_front()
}

impl RemoteClient for StubClient {
    type Request = WidgetRequest;
    type Created = ();
    type Response = WidgetResponse;
    type Patch = WidgetPatch;

    fn create(&self, request: &WidgetRequest) -> Result<(), ClassifiedError> {
        self.record(Call::Create);
        if let Some(result) = scripted(&self.creates) {
            result?;
        }
        let id = ResourceId::new([request.parent.as_str(), request.name.as_str()]);
        let mut objects = self.objects.lock().unwrap();
        if objects.contains_key(&id) {
            return Err(ClassifiedError::conflict(format!("widget {id} already exists")));
        }
        objects.insert(
            id,
            WidgetResponse {
                parent: request.parent.clone(),
                name: request.name.clone(),
                color: request.color.clone(),
                tags: request.tags.clone(),
                arn: Some(format!("arn:widget:{}/{}", request.parent, request.name)),
            },
        );
        Ok(())
    }

    fn read(&self, id: &ResourceId) -> Result<WidgetResponse, ClassifiedError> {
        self.record(Call::Read);
        if let Some(result) = scripted(&self.reads) {
            return result;
        }
        self.objects
            .lock()
            .unwrap()
            .get(id)
            .cloned()
            .ok_or_else(|| ClassifiedError::not_found(format!("widget {id} not found")))
    }

    fn update(&self, id: &ResourceId, patch: &WidgetPatch) -> Result<(), ClassifiedError> {
        self.record(Call::Update);
        if let Some(result) = scripted(&self.updates) {
            result?;
        }
        self.patches.lock().unwrap().push(patch.clone());
        let mut objects = self.objects.lock().unwrap();
        let obj = objects
            .get_mut(id)
            .ok_or_else(|| ClassifiedError::not_found(format!("widget {id} not found")))?;
        if let Some(color) = &patch.color {
            obj.color.clone_from(color);
        }
        if let Some(tags) = &patch.tags {
            obj.tags.clone_from(tags);
        }
        Ok(())
    }

    fn delete(&self, id: &ResourceId) -> Result<(), ClassifiedError> {
        self.record(Call::Delete);
        if let Some(result) = scripted(&self.deletes) {
            result?;
        }
        self.objects
            .lock()
            .unwrap()
            .remove(id)
            .map(|_| ())
            .ok_or_else(|| ClassifiedError::not_found(format!("widget {id} not found")))
    }

    fn list(&self, parent: &str) -> Result<Vec<ResourceId>, ClassifiedError> {
        self.record(Call::List);
        Ok(self
            .objects
            .lock()
            .unwrap()
            .keys()
            .filter(|id| id.part(0) == Some(parent))
            .cloned()
            .collect())
    }
}
