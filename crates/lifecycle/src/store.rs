//! State store interface
//!
//! The reconciler writes state deltas through [`StateStore`] at well-defined
//! points: after create + stabilize, after read, after update + re-read,
//! after delete. Each write replaces the whole record.

use crate::error::StoreError;
use crate::identifier::ResourceId;
use crate::phase::Phase;
use crate::value::Attributes;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::sync::Mutex;

/// What the store holds for one resource
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ResourceRecord {
    pub id: ResourceId,
    /// `Present` or `Errored`
    pub phase: Phase,
    /// Last complete observation; `None` when the object was created but
    /// never read back
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub observed: Option<Attributes>,
}

impl ResourceRecord {
    pub fn present(id: ResourceId, observed: Attributes) -> Self {
        Self {
            id,
            phase: Phase::Present,
            observed: Some(observed),
        }
    }

    pub fn errored(id: ResourceId, observed: Option<Attributes>) -> Self {
        Self {
            id,
            phase: Phase::Errored,
            observed,
        }
    }
}

/// Persistence for resource records, keyed by resource type and identifier
///
/// Implementations must be safe to share across threads reconciling
/// distinct identifiers; per-identifier ordering is the caller's job.
pub trait StateStore: Send + Sync {
    fn get(&self, resource_type: &str, id: &ResourceId) -> Result<Option<ResourceRecord>, StoreError>;

    fn put(&self, resource_type: &str, record: &ResourceRecord) -> Result<(), StoreError>;

    fn remove(&self, resource_type: &str, id: &ResourceId) -> Result<(), StoreError>;

    /// Identifiers of all tracked resources of a type
    fn list(&self, resource_type: &str) -> Result<Vec<ResourceId>, StoreError>;

    /// Hold back persistence until the matching [`StateStore::end_batch`]
    ///
    /// Writes stay visible to `get` and `list` in the meantime. Batches
    /// nest. Stores with nothing to persist ignore this.
    fn begin_batch(&self) {}

    /// Persist everything written since the outermost `begin_batch`
    fn end_batch(&self) -> Result<(), StoreError> {
        Ok(())
    }
}

/// In-memory store
#[derive(Debug, Default)]
pub struct MemoryStore {
    records: Mutex<HashMap<(String, ResourceId), ResourceRecord>>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn len(&self) -> usize {
        self.records.lock().map(|r| r.len()).unwrap_or(0)
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

fn poisoned<T>(_: T) -> StoreError {
    StoreError::new("memory store lock poisoned")
}

impl StateStore for MemoryStore {
    fn get(&self, resource_type: &str, id: &ResourceId) -> Result<Option<ResourceRecord>, StoreError> {
        let records = self.records.lock().map_err(poisoned)?;
        Ok(records.get(&(resource_type.to_string(), id.clone())).cloned())
    }

    fn put(&self, resource_type: &str, record: &ResourceRecord) -> Result<(), StoreError> {
        let mut records = self.records.lock().map_err(poisoned)?;
        records.insert(
            (resource_type.to_string(), record.id.clone()),
            record.clone(),
        );
        Ok(())
    }

    fn remove(&self, resource_type: &str, id: &ResourceId) -> Result<(), StoreError> {
        let mut records = self.records.lock().map_err(poisoned)?;
        records.remove(&(resource_type.to_string(), id.clone()));
        Ok(())
    }

    fn list(&self, resource_type: &str) -> Result<Vec<ResourceId>, StoreError> {
        let records = self.records.lock().map_err(poisoned)?;
        let mut ids: Vec<ResourceId> = records
            .keys()
            .filter(|(t, _)| t == resource_type)
            .map(|(_, id)| id.clone())
            .collect();
        ids.sort();
        Ok(ids)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_memory_store_round_trip() {
        let store = MemoryStore::new();
        let id = ResourceId::new(["b-1", "alice"]);
        let record = ResourceRecord::present(id.clone(), Attributes::new().with("username", "alice"));

        store.put("mq_user", &record).unwrap();
        assert_eq!(store.get("mq_user", &id).unwrap(), Some(record));
        assert_eq!(store.get("other", &id).unwrap(), None);

        store.remove("mq_user", &id).unwrap();
        assert!(store.is_empty());
    }

    #[test]
    fn test_memory_store_list_by_type() {
        let store = MemoryStore::new();
        for name in ["carol", "alice"] {
            let id = ResourceId::new(["b-1", name]);
            store.put("mq_user", &ResourceRecord::errored(id, None)).unwrap();
        }
        store
            .put("other", &ResourceRecord::errored(ResourceId::new(["x"]), None))
            .unwrap();

        let ids = store.list("mq_user").unwrap();
        assert_eq!(
            ids.iter().map(ToString::to_string).collect::<Vec<_>>(),
            vec!["b-1/alice", "b-1/carol"]
        );
    }
}
