//! Fixtures and store doubles shared by the unit tests.

use crate::{
    AllocationStore, Clock, CreateStatus, Document, Error, Fields, MemoryStore, NO_CONDITION,
    Participant, Result, ScanFilter, UpdateStatus,
};
use parking_lot::Mutex;
use serde_json::json;
use std::sync::atomic::{AtomicUsize, Ordering};
use tokio::sync::Barrier;

/// Seeds `prefix-001..=prefix-{count}` the way the allocator would have.
pub fn seed<C: Clock>(store: &MemoryStore<C>, prefix: &str, count: u64) {
    for seq in 1..=count {
        let key = format!("{prefix}-{seq:03}");
        let body = json!({ "uniqueId": key, "prefix": prefix, "sequence": seq });
        store.put(key, body.as_object().cloned().unwrap_or_default());
    }
}

/// Refuses every create (optionally only within one prefix) as if a racer
/// always got there first, and remembers which keys were tried.
#[derive(Debug, Default)]
pub struct ContendedStore {
    pub inner: MemoryStore,
    pub only_prefix: Option<&'static str>,
    pub attempted: Mutex<Vec<String>>,
}

impl ContendedStore {
    pub fn for_prefix(prefix: &'static str) -> Self {
        Self {
            only_prefix: Some(prefix),
            ..Self::default()
        }
    }
}

impl AllocationStore for ContendedStore {
    async fn scan(&self, filter: ScanFilter<'_>) -> Result<Vec<Document>> {
        self.inner.scan(filter).await
    }

    async fn create_if_absent(&self, key: &str, fields: Fields) -> Result<CreateStatus> {
        if self.only_prefix.is_none_or(|prefix| key.starts_with(prefix)) {
            self.attempted.lock().push(key.to_owned());
            return Ok(CreateStatus::Conflict);
        }
        self.inner.create_if_absent(key, fields).await
    }

    async fn get(&self, key: &str) -> Result<Option<Document>> {
        self.inner.get(key).await
    }

    async fn update(&self, key: &str, patch: Fields) -> Result<UpdateStatus> {
        self.inner.update(key, patch).await
    }
}

/// Holds the first `gated` scans until that many callers have taken their
/// snapshot, so they all compute a candidate from the same view of the store.
#[derive(Debug)]
pub struct GatedStore {
    pub inner: MemoryStore,
    gated: usize,
    gate: Barrier,
    scans: AtomicUsize,
    pub creates: AtomicUsize,
}

impl GatedStore {
    pub fn new(inner: MemoryStore, gated: usize) -> Self {
        Self {
            inner,
            gated,
            gate: Barrier::new(gated),
            scans: AtomicUsize::new(0),
            creates: AtomicUsize::new(0),
        }
    }
}

impl AllocationStore for GatedStore {
    async fn scan(&self, filter: ScanFilter<'_>) -> Result<Vec<Document>> {
        let snapshot = self.inner.scan(filter).await?;
        if self.scans.fetch_add(1, Ordering::SeqCst) < self.gated {
            self.gate.wait().await;
        }
        Ok(snapshot)
    }

    async fn create_if_absent(&self, key: &str, fields: Fields) -> Result<CreateStatus> {
        self.creates.fetch_add(1, Ordering::SeqCst);
        self.inner.create_if_absent(key, fields).await
    }

    async fn get(&self, key: &str) -> Result<Option<Document>> {
        self.inner.get(key).await
    }

    async fn update(&self, key: &str, patch: Fields) -> Result<UpdateStatus> {
        self.inner.update(key, patch).await
    }
}

/// Fails the first `failing` updates; everything else goes to `inner`.
#[derive(Debug)]
pub struct FlakyUpdateStore {
    pub inner: MemoryStore,
    failing: AtomicUsize,
}

impl FlakyUpdateStore {
    pub fn new(failing: usize) -> Self {
        Self {
            inner: MemoryStore::new(),
            failing: AtomicUsize::new(failing),
        }
    }
}

impl AllocationStore for FlakyUpdateStore {
    async fn scan(&self, filter: ScanFilter<'_>) -> Result<Vec<Document>> {
        self.inner.scan(filter).await
    }

    async fn create_if_absent(&self, key: &str, fields: Fields) -> Result<CreateStatus> {
        self.inner.create_if_absent(key, fields).await
    }

    async fn get(&self, key: &str) -> Result<Option<Document>> {
        self.inner.get(key).await
    }

    async fn update(&self, key: &str, patch: Fields) -> Result<UpdateStatus> {
        let left = self.failing.load(Ordering::SeqCst);
        if left > 0 {
            self.failing.store(left - 1, Ordering::SeqCst);
            return Err(Error::store("write timed out"));
        }
        self.inner.update(key, patch).await
    }
}

/// Every call fails as if the backing service were unreachable.
#[derive(Debug, Default)]
pub struct UnavailableStore {
    pub calls: AtomicUsize,
}

impl UnavailableStore {
    fn fail<T>(&self) -> Result<T> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        Err(Error::store("connection refused"))
    }
}

impl AllocationStore for UnavailableStore {
    async fn scan(&self, _filter: ScanFilter<'_>) -> Result<Vec<Document>> {
        self.fail()
    }

    async fn create_if_absent(&self, _key: &str, _fields: Fields) -> Result<CreateStatus> {
        self.fail()
    }

    async fn get(&self, _key: &str) -> Result<Option<Document>> {
        self.fail()
    }

    async fn update(&self, _key: &str, _patch: Fields) -> Result<UpdateStatus> {
        self.fail()
    }
}

/// A participant that passes validation in any batch position.
pub fn participant(name: &str) -> Participant {
    Participant {
        participant_name: name.into(),
        age: Some(10),
        gender: "Female".into(),
        primary_contact_number: "0501234567".into(),
        primary_contact_relation: "Mother".into(),
        email: "family@example.com".into(),
        parent_agreement: true,
        medical_conditions: vec![NO_CONDITION.into()],
        ..Participant::default()
    }
}
