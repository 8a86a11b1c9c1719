use core::time::Duration;

/// A result type defaulting to the crate's [`Error`].
pub type Result<T, E = Error> = core::result::Result<T, E>;

/// All errors `regid` can surface to a caller.
///
/// A lost race on the store is not in this list: it is the
/// [`CreateStatus::Conflict`](crate::CreateStatus::Conflict) arm of a commit
/// and is absorbed by the allocator's retry loop. It only becomes visible as
/// [`Error::AllocationExhausted`] once every attempt has been spent.
#[derive(Clone, Debug, PartialEq, Eq, thiserror::Error)]
#[non_exhaustive]
pub enum Error {
    /// Caller input is missing a required field. Raised before any store
    /// interaction; never retried.
    #[error("Participant {participant}: {reason}")]
    Validation {
        /// 1-based position of the participant within the batch.
        participant: usize,
        reason: String,
    },

    /// A registration batch arrived without any participants.
    #[error("registration batch has no participants")]
    EmptyBatch,

    /// Every allocation attempt ended in a conflict or an occupied candidate.
    #[error(
        "failed to allocate a unique ID for {participant} after {attempts} attempts; \
         registration traffic is high, try again in a moment"
    )]
    AllocationExhausted { participant: String, attempts: u32 },

    /// The backing store failed for a reason other than a lost race.
    #[error("allocation store unavailable: {context}")]
    StoreUnavailable { context: String },

    /// The caller's cancellation token fired before a retry round.
    #[error("allocation for {participant} cancelled after {attempts} attempts")]
    Cancelled { participant: String, attempts: u32 },

    /// The allocation deadline passed before a retry round.
    #[error(
        "allocation for {participant} exceeded its deadline after {attempts} attempts ({elapsed:?})"
    )]
    DeadlineExceeded {
        participant: String,
        attempts: u32,
        elapsed: Duration,
    },

    /// A patch tried to change an ID field or a store-assigned attribute of a
    /// committed record.
    #[error("record {key}: field `{field}` is owned by the store and cannot be changed")]
    ImmutableField { key: String, field: String },

    /// A participant payload could not be turned into a record body.
    #[error("cannot encode record body: {context}")]
    Encoding { context: String },

    /// No record exists at the given key.
    #[error("no record with ID {key}")]
    NotFound { key: String },
}

impl Error {
    /// Shorthand for [`Error::StoreUnavailable`].
    pub fn store(context: impl Into<String>) -> Self {
        Self::StoreUnavailable {
            context: context.into(),
        }
    }

    /// Returns `true` for errors a caller may reasonably retry later: the
    /// registration itself was fine, the system was busy or interrupted.
    pub fn is_transient(&self) -> bool {
        matches!(
            self,
            Self::AllocationExhausted { .. }
                | Self::StoreUnavailable { .. }
                | Self::Cancelled { .. }
                | Self::DeadlineExceeded { .. }
        )
    }
}
