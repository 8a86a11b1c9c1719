//! The allocation loop: scan, propose, commit, retry.
//!
//! ```text
//! Scanning -> CandidateBuilt -> Committing -> Committed
//!    ^              |               |
//!    |              | occupied      | conflict
//!    +-- Retrying <-+---------------+ -> Failed (attempts exhausted)
//! ```
//!
//! There is no lock across the scan-then-commit window and no cached counter:
//! two callers may legitimately propose the same candidate from two snapshots.
//! The store's create-if-absent breaks the tie, so uniqueness holds no matter
//! how stale a scan was. Liveness does not: enough sustained contention on one
//! prefix exhausts `max_attempts` even though a free slot exists.

mod policy;

pub use policy::*;

use crate::{
    AllocationRecord, AllocationStore, CandidateGenerator, CategoryCode, CreateStatus, Error,
    IdFields, RegistrationId, Result, ScanFilter, SleepProvider, TokioSleep, UsedIds,
};
use chrono::{DateTime, Utc};
use core::time::Duration;
use tokio::time::Instant;
use tokio_util::sync::CancellationToken;

/// Who an allocation is for.
#[derive(Clone, Copy, Debug)]
pub struct AllocationRequest<'a> {
    pub code: CategoryCode,
    /// Stored on the allocation record to tie it to the participant payload.
    pub participant_ref: &'a str,
    /// Used in errors so a failure names the person it affected.
    pub participant_name: &'a str,
}

/// A committed allocation.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Allocation {
    pub record: AllocationRecord,
    /// Attempts used, including the successful one.
    pub attempts: u32,
}

impl Allocation {
    pub fn id(&self) -> RegistrationId {
        self.record.id
    }

    pub fn sequence(&self) -> u64 {
        self.record.id.sequence()
    }

    /// Store-assigned creation time.
    pub fn created_at(&self) -> DateTime<Utc> {
        self.record.created_at
    }
}

/// Converts racing, uncoordinated writers into unique, mostly sequential IDs.
///
/// Generic over the [`AllocationStore`] it coordinates through and the
/// [`SleepProvider`] used to wait out backoff intervals.
///
/// # Example
///
/// ```
/// use regid::{AllocationRequest, Allocator, CategoryCode, MemoryStore};
/// use tokio_util::sync::CancellationToken;
///
/// # tokio::runtime::Builder::new_current_thread().enable_time().build().unwrap().block_on(async {
/// let allocator = Allocator::new(MemoryStore::new());
/// let request = AllocationRequest {
///     code: CategoryCode::Kids,
///     participant_ref: "demo/0",
///     participant_name: "DEMO",
/// };
/// let first = allocator.allocate(request, &CancellationToken::new()).await.unwrap();
/// let second = allocator.allocate(request, &CancellationToken::new()).await.unwrap();
/// assert_eq!(first.id().to_string(), "DGK-001");
/// assert_eq!(second.id().to_string(), "DGK-002");
/// # });
/// ```
#[derive(Debug)]
pub struct Allocator<S, P = TokioSleep> {
    store: S,
    policy: RetryPolicy,
    id_fields: IdFields,
    sleeper: P,
}

impl<S: AllocationStore> Allocator<S> {
    /// An allocator with the default [`RetryPolicy`], [`IdFields`] and
    /// [`TokioSleep`].
    pub fn new(store: S) -> Self {
        Self {
            store,
            policy: RetryPolicy::default(),
            id_fields: IdFields::default(),
            sleeper: TokioSleep,
        }
    }
}

impl<S, P> Allocator<S, P>
where
    S: AllocationStore,
    P: SleepProvider,
{
    #[must_use]
    pub fn with_policy(mut self, policy: RetryPolicy) -> Self {
        self.policy = policy;
        self
    }

    #[must_use]
    pub fn with_id_fields(mut self, id_fields: IdFields) -> Self {
        self.id_fields = id_fields;
        self
    }

    /// Swaps the backoff sleep strategy.
    pub fn with_sleeper<Q: SleepProvider>(self, sleeper: Q) -> Allocator<S, Q> {
        Allocator {
            store: self.store,
            policy: self.policy,
            id_fields: self.id_fields,
            sleeper,
        }
    }

    pub fn store(&self) -> &S {
        &self.store
    }

    pub fn policy(&self) -> &RetryPolicy {
        &self.policy
    }

    pub fn id_fields(&self) -> &IdFields {
        &self.id_fields
    }

    /// Allocates a fresh ID in `request.code`'s namespace.
    ///
    /// Every round rescans the store, so no state survives between calls.
    /// `cancel` and the policy deadline are checked before each round, and
    /// either one also cuts a pending backoff short.
    ///
    /// # Errors
    ///
    /// - [`Error::AllocationExhausted`] after `max_attempts` failed rounds.
    /// - [`Error::Cancelled`] / [`Error::DeadlineExceeded`] when interrupted.
    /// - [`Error::StoreUnavailable`] as soon as the store fails; store faults
    ///   are not retried here.
    #[cfg_attr(
        feature = "tracing",
        tracing::instrument(
            level = "debug",
            skip_all,
            fields(prefix = %request.code, participant = request.participant_ref)
        )
    )]
    pub async fn allocate(
        &self,
        request: AllocationRequest<'_>,
        cancel: &CancellationToken,
    ) -> Result<Allocation> {
        let started = Instant::now();
        let deadline = self.policy.deadline.map(|budget| started + budget);
        let prefix = request.code.prefix();
        let filter = ScanFilter {
            prefix,
            id_fields: &self.id_fields,
        };
        let mut generator = CandidateGenerator::new(request.code);
        let mut attempts = 0u32;

        loop {
            if cancel.is_cancelled() {
                #[cfg(feature = "tracing")]
                tracing::warn!(attempts, "allocation cancelled");
                return Err(Error::Cancelled {
                    participant: request.participant_name.to_owned(),
                    attempts,
                });
            }
            if deadline.is_some_and(|deadline| Instant::now() >= deadline) {
                #[cfg(feature = "tracing")]
                tracing::warn!(attempts, "allocation deadline exceeded");
                return Err(Error::DeadlineExceeded {
                    participant: request.participant_name.to_owned(),
                    attempts,
                    elapsed: started.elapsed(),
                });
            }

            let snapshot = self.store.scan(filter).await?;
            let used = UsedIds::from_documents(prefix, &snapshot, &self.id_fields);
            let candidate = generator.next(&used);
            attempts += 1;

            #[cfg(feature = "tracing")]
            tracing::debug!(
                attempts,
                candidate = %candidate.id,
                max_sequence = used.max_sequence(),
                occupied = candidate.occupied,
                "candidate built"
            );

            if !candidate.occupied {
                let key = candidate.id.to_string();
                let fields = AllocationRecord::fields(candidate.id, request.participant_ref);
                match self.store.create_if_absent(&key, fields).await? {
                    CreateStatus::Created { document } => {
                        #[cfg(feature = "tracing")]
                        tracing::info!(id = %key, attempts, "allocation committed");
                        return Ok(Allocation {
                            record: AllocationRecord {
                                id: candidate.id,
                                created_at: document.created_at,
                                participant_ref: request.participant_ref.to_owned(),
                            },
                            attempts,
                        });
                    }
                    CreateStatus::Conflict => {
                        #[cfg(feature = "tracing")]
                        tracing::debug!(id = %key, attempts, "lost commit race");
                    }
                }
            }

            if attempts >= self.policy.max_attempts {
                #[cfg(feature = "tracing")]
                tracing::warn!(attempts, "allocation attempts exhausted");
                return Err(Error::AllocationExhausted {
                    participant: request.participant_name.to_owned(),
                    attempts,
                });
            }

            self.backoff(self.policy.backoff.delay(attempts), deadline, cancel)
                .await;
        }
    }

    async fn backoff(&self, delay: Duration, deadline: Option<Instant>, cancel: &CancellationToken) {
        let sleep = self.sleeper.sleep_for(delay);
        match deadline {
            Some(deadline) => tokio::select! {
                () = sleep => {}
                () = tokio::time::sleep_until(deadline) => {}
                () = cancel.cancelled() => {}
            },
            None => tokio::select! {
                () = sleep => {}
                () = cancel.cancelled() => {}
            },
        }
    }
}
