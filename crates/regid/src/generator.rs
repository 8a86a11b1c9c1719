//! Candidate generation from a store snapshot.
//!
//! Nothing here is a source of correctness. The scan only makes the next
//! candidate *likely* to be free; the store's create-if-absent decides.

use crate::{CategoryCode, Document, IdFields, RegistrationId, namespace_sequence};
use std::collections::HashSet;

/// Every ID-like value visible for one namespace in a single snapshot.
///
/// Built from the key and every alias field of each document, so a candidate
/// never lands on an ID that only exists under a legacy attribute name. Has no
/// identity beyond one attempt: rebuild it after every scan.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct UsedIds {
    max_sequence: u64,
    ids: HashSet<String>,
}

impl UsedIds {
    pub fn from_documents<'a, I>(prefix: &str, docs: I, id_fields: &IdFields) -> Self
    where
        I: IntoIterator<Item = &'a Document>,
    {
        let mut used = Self::default();
        for doc in docs {
            for raw in doc.known_ids(id_fields) {
                if let Some(seq) = namespace_sequence(raw, prefix) {
                    used.max_sequence = used.max_sequence.max(seq);
                    used.ids.insert(raw.to_owned());
                }
            }
        }
        used
    }

    /// Greatest sequence number seen in the namespace, `0` when empty.
    pub fn max_sequence(&self) -> u64 {
        self.max_sequence
    }

    pub fn contains(&self, id: &str) -> bool {
        self.ids.contains(id)
    }

    pub fn len(&self) -> usize {
        self.ids.len()
    }

    pub fn is_empty(&self) -> bool {
        self.ids.is_empty()
    }
}

/// A proposed ID, not yet committed.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct Candidate {
    pub id: RegistrationId,
    /// Offset applied on top of `max_sequence + 1`.
    pub offset: u64,
    /// The snapshot already holds this ID (under the key or an alias); a
    /// commit would certainly conflict.
    pub occupied: bool,
}

/// Proposes `max_sequence + 1 + k` for successive attempts of one allocation.
///
/// `k` counts consecutive attempts that observed the same `max_sequence`.
/// Against a snapshot that does not move (a racer we cannot see yet, or a
/// store that keeps refusing) each attempt shifts one further ahead instead
/// of re-proposing the value that just failed. As soon as a rescan shows the
/// namespace advanced, `k` drops back to `0` and the first free number after
/// the new maximum is proposed.
#[derive(Clone, Debug)]
pub struct CandidateGenerator {
    code: CategoryCode,
    offset: u64,
    last_max: Option<u64>,
}

impl CandidateGenerator {
    pub fn new(code: CategoryCode) -> Self {
        Self {
            code,
            offset: 0,
            last_max: None,
        }
    }

    /// Derives the candidate for the next attempt from a fresh snapshot.
    pub fn next(&mut self, used: &UsedIds) -> Candidate {
        let max = used.max_sequence();
        self.offset = match self.last_max {
            Some(prev) if prev == max => self.offset.saturating_add(1),
            _ => 0,
        };
        self.last_max = Some(max);

        let sequence = max.saturating_add(1).saturating_add(self.offset);
        let id = RegistrationId::new(self.code, sequence);
        Candidate {
            id,
            offset: self.offset,
            occupied: used.contains(&id.to_string()),
        }
    }
}
