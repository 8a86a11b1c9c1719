use crate::{CreateStatus, Document, Fields, IdFields, Result, UpdateStatus, namespace_sequence};
use core::future::Future;
use std::sync::Arc;

/// Selects the documents relevant to one namespace.
#[derive(Clone, Copy, Debug)]
pub struct ScanFilter<'a> {
    /// Namespace prefix without the dash, e.g. `DGK`.
    pub prefix: &'a str,
    /// Attributes that may hold an ID besides the key.
    pub id_fields: &'a IdFields,
}

impl ScanFilter<'_> {
    /// `true` when the key or any known ID field lives in the namespace.
    pub fn matches(&self, doc: &Document) -> bool {
        doc.known_ids(self.id_fields)
            .any(|id| namespace_sequence(id, self.prefix).is_some())
    }
}

/// The shared persistence layer every allocating process coordinates through.
///
/// Only [`create_if_absent`](Self::create_if_absent) carries correctness: it
/// must be atomic with respect to every other committer, anywhere. Exactly one
/// concurrent create for a key may return [`CreateStatus::Created`]; all others
/// must observe [`CreateStatus::Conflict`].
///
/// Infrastructure faults are reported as
/// [`Error::StoreUnavailable`](crate::Error::StoreUnavailable) and are never
/// confused with a conflict.
pub trait AllocationStore: Send + Sync {
    /// Returns every document whose key or known ID fields match `filter`.
    ///
    /// Documents must be whole; read-your-writes across callers is not
    /// required.
    fn scan(&self, filter: ScanFilter<'_>) -> impl Future<Output = Result<Vec<Document>>> + Send;

    /// Creates a document at `key` only if none exists there.
    fn create_if_absent(
        &self,
        key: &str,
        fields: Fields,
    ) -> impl Future<Output = Result<CreateStatus>> + Send;

    /// Point read.
    fn get(&self, key: &str) -> impl Future<Output = Result<Option<Document>>> + Send;

    /// Merges `patch` into the document at `key`.
    ///
    /// Used by downstream collaborators after allocation (payload merge,
    /// export marking); never part of the allocation path itself.
    fn update(&self, key: &str, patch: Fields) -> impl Future<Output = Result<UpdateStatus>> + Send;
}

impl<S: AllocationStore> AllocationStore for Arc<S> {
    fn scan(&self, filter: ScanFilter<'_>) -> impl Future<Output = Result<Vec<Document>>> + Send {
        (**self).scan(filter)
    }

    fn create_if_absent(
        &self,
        key: &str,
        fields: Fields,
    ) -> impl Future<Output = Result<CreateStatus>> + Send {
        (**self).create_if_absent(key, fields)
    }

    fn get(&self, key: &str) -> impl Future<Output = Result<Option<Document>>> + Send {
        (**self).get(key)
    }

    fn update(&self, key: &str, patch: Fields) -> impl Future<Output = Result<UpdateStatus>> + Send {
        (**self).update(key, patch)
    }
}
