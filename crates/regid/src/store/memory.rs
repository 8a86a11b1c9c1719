use crate::{
    AllocationStore, Clock, CreateStatus, Document, Fields, IdFields, Result, ScanFilter,
    SystemClock, UpdateStatus, guard_patch,
};
use parking_lot::Mutex;
use std::collections::BTreeMap;

/// An in-process [`AllocationStore`].
///
/// All operations take a single mutex, so `create_if_absent` is atomic for
/// every task and thread sharing the store. Scans clone documents under the
/// lock and never observe a half-written record.
#[derive(Debug)]
pub struct MemoryStore<C = SystemClock> {
    docs: Mutex<BTreeMap<String, Document>>,
    id_fields: IdFields,
    clock: C,
}

impl MemoryStore {
    /// An empty store stamping records with the system clock.
    pub fn new() -> Self {
        Self::with_clock(SystemClock)
    }
}

impl Default for MemoryStore {
    fn default() -> Self {
        Self::new()
    }
}

impl<C: Clock> MemoryStore<C> {
    pub fn with_clock(clock: C) -> Self {
        Self {
            docs: Mutex::new(BTreeMap::new()),
            id_fields: IdFields::default(),
            clock,
        }
    }

    /// Replaces the ID attribute names guarded on update.
    #[must_use]
    pub fn with_id_fields(mut self, id_fields: IdFields) -> Self {
        self.id_fields = id_fields;
        self
    }

    /// Writes a document unconditionally, replacing anything at `key`.
    ///
    /// Intended for seeding legacy data; allocation never calls this.
    pub fn put(&self, key: impl Into<String>, fields: Fields) -> Document {
        let key = key.into();
        let doc = Document {
            key: key.clone(),
            created_at: self.clock.now_utc(),
            updated_at: None,
            fields,
        };
        self.docs.lock().insert(key, doc.clone());
        doc
    }

    pub fn len(&self) -> usize {
        self.docs.lock().len()
    }

    pub fn is_empty(&self) -> bool {
        self.docs.lock().is_empty()
    }

    /// Keys currently stored, in lexicographic order.
    pub fn keys(&self) -> Vec<String> {
        self.docs.lock().keys().cloned().collect()
    }
}

impl<C: Clock> AllocationStore for MemoryStore<C> {
    async fn scan(&self, filter: ScanFilter<'_>) -> Result<Vec<Document>> {
        let docs = self.docs.lock();
        Ok(docs.values().filter(|d| filter.matches(d)).cloned().collect())
    }

    async fn create_if_absent(&self, key: &str, fields: Fields) -> Result<CreateStatus> {
        let mut docs = self.docs.lock();
        if docs.contains_key(key) {
            return Ok(CreateStatus::Conflict);
        }
        let document = Document {
            key: key.to_owned(),
            created_at: self.clock.now_utc(),
            updated_at: None,
            fields,
        };
        docs.insert(key.to_owned(), document.clone());
        Ok(CreateStatus::Created { document })
    }

    async fn get(&self, key: &str) -> Result<Option<Document>> {
        Ok(self.docs.lock().get(key).cloned())
    }

    async fn update(&self, key: &str, patch: Fields) -> Result<UpdateStatus> {
        guard_patch(key, &patch, &self.id_fields)?;
        let mut docs = self.docs.lock();
        let Some(doc) = docs.get_mut(key) else {
            return Ok(UpdateStatus::NotFound);
        };
        doc.fields.extend(patch);
        doc.updated_at = Some(self.clock.now_utc());
        Ok(UpdateStatus::Updated {
            document: doc.clone(),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{Error, FixedClock};
    use serde_json::json;

    fn body(v: serde_json::Value) -> Fields {
        v.as_object().cloned().unwrap()
    }

    fn store() -> MemoryStore<FixedClock> {
        MemoryStore::with_clock(FixedClock::parse("2025-12-28T09:00:00+04:00").unwrap())
    }

    #[tokio::test]
    async fn second_create_at_same_key_conflicts() {
        let store = store();
        let first = store
            .create_if_absent("DGK-001", body(json!({ "uniqueId": "DGK-001" })))
            .await
            .unwrap();
        let CreateStatus::Created { document } = first else {
            panic!("expected created, got {first:?}");
        };
        assert_eq!(document.created_at.to_rfc3339(), "2025-12-28T05:00:00+00:00");

        let second = store
            .create_if_absent("DGK-001", body(json!({ "uniqueId": "DGK-001", "x": 1 })))
            .await
            .unwrap();
        assert!(second.is_conflict());
        let stored = store.get("DGK-001").await.unwrap().unwrap();
        assert!(!stored.fields.contains_key("x"));
    }

    #[tokio::test]
    async fn scan_matches_key_or_alias_fields() {
        let store = store();
        store.put("DGK-001", body(json!({ "uniqueId": "DGK-001" })));
        store.put("legacy-1", body(json!({ "studentId": "DGK-007" })));
        store.put("legacy-2", body(json!({ "familyId": "DGT-002" })));
        store.put("DGKX-1", Fields::new());

        let fields = IdFields::default();
        let filter = ScanFilter {
            prefix: "DGK",
            id_fields: &fields,
        };
        let mut keys: Vec<_> = store
            .scan(filter)
            .await
            .unwrap()
            .into_iter()
            .map(|d| d.key)
            .collect();
        keys.sort();
        assert_eq!(keys, ["DGK-001", "legacy-1"]);
    }

    #[tokio::test]
    async fn update_merges_and_stamps() {
        let store = store();
        store.put("DGK-001", body(json!({ "uniqueId": "DGK-001", "a": 1 })));
        let status = store
            .update("DGK-001", body(json!({ "b": 2 })))
            .await
            .unwrap();
        let UpdateStatus::Updated { document } = status else {
            panic!("expected updated");
        };
        assert_eq!(document.fields["a"], 1);
        assert_eq!(document.fields["b"], 2);
        assert!(document.updated_at.is_some());

        assert_eq!(
            store.update("DGK-404", Fields::new()).await.unwrap(),
            UpdateStatus::NotFound
        );
    }

    #[tokio::test]
    async fn update_cannot_reassign_an_id() {
        let store = store();
        store.put("DGK-001", body(json!({ "uniqueId": "DGK-001" })));
        let err = store
            .update("DGK-001", body(json!({ "uniqueId": "DGK-002" })))
            .await
            .unwrap_err();
        assert!(matches!(err, Error::ImmutableField { .. }));
        let stored = store.get("DGK-001").await.unwrap().unwrap();
        assert_eq!(stored.str_field("uniqueId"), Some("DGK-001"));
    }

    #[tokio::test]
    async fn update_cannot_restamp_a_record() {
        let store = store();
        let original = store.put("DGK-001", body(json!({ "uniqueId": "DGK-001" })));
        let err = store
            .update("DGK-001", body(json!({ "createdAt": "1999-01-01T00:00:00Z" })))
            .await
            .unwrap_err();
        assert_eq!(
            err,
            Error::ImmutableField {
                key: "DGK-001".into(),
                field: "createdAt".into(),
            }
        );
        let stored = store.get("DGK-001").await.unwrap().unwrap();
        assert_eq!(stored, original);
    }
}
