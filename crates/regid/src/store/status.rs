use crate::Document;

/// Outcome of [`AllocationStore::create_if_absent`].
///
/// - [`CreateStatus::Created`]: the key was free and the document now exists.
/// - [`CreateStatus::Conflict`]: a document already existed at the key when
///   the attempt ran. Nothing was written.
///
/// A conflict is the expected signal that another writer won the race; it is
/// not an error.
///
/// [`AllocationStore::create_if_absent`]: crate::AllocationStore::create_if_absent
#[derive(Clone, Debug, PartialEq)]
pub enum CreateStatus {
    Created {
        /// The stored document, carrying its store-assigned `created_at`.
        document: Document,
    },
    Conflict,
}

impl CreateStatus {
    pub fn is_conflict(&self) -> bool {
        matches!(self, Self::Conflict)
    }
}

/// Outcome of [`AllocationStore::update`].
///
/// [`AllocationStore::update`]: crate::AllocationStore::update
#[derive(Clone, Debug, PartialEq)]
pub enum UpdateStatus {
    Updated { document: Document },
    NotFound,
}
