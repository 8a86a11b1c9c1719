//! Persists registration batches, one participant at a time.

use crate::{
    AgeBands, AllocationRequest, AllocationStore, Allocator, CategoryCode, Classification, Clock,
    DISPLAY_FORMAT, Error, Fields, PARTICIPANT_REF_FIELD, PREFIX_FIELD, Participant,
    RegistrationId, Result, SEQUENCE_FIELD, STORE_FIELDS, SleepProvider, SystemClock, TokioSleep,
    UpdateStatus, validate_batch,
};
use chrono::{DateTime, NaiveDate, Utc};
use core::{fmt, str::FromStr};
use serde::Serialize;
use serde_json::Value;
use tokio_util::sync::CancellationToken;
use uuid::Uuid;

/// Set on records committed in a batch that later failed, under
/// [`BatchFailurePolicy::MarkAbandoned`].
pub const BATCH_ABANDONED_FIELD: &str = "batchAbandoned";

/// What happens to participants already committed when a later participant in
/// the same batch fails.
///
/// Neither policy deletes or renumbers anything: a committed ID stays
/// occupied either way.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub enum BatchFailurePolicy {
    /// Leave earlier records exactly as committed.
    #[default]
    KeepCommitted,
    /// Patch `batchAbandoned: true` onto every record the batch committed,
    /// including the failing participant's if its ID was already allocated,
    /// so they can be reviewed.
    MarkAbandoned,
}

impl fmt::Display for BatchFailurePolicy {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            Self::KeepCommitted => "keep-committed",
            Self::MarkAbandoned => "mark-abandoned",
        })
    }
}

impl FromStr for BatchFailurePolicy {
    type Err = String;

    fn from_str(s: &str) -> core::result::Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "keep" | "keep-committed" => Ok(Self::KeepCommitted),
            "mark" | "mark-abandoned" => Ok(Self::MarkAbandoned),
            other => Err(format!(
                "unknown batch failure policy `{other}` (expected keep-committed or mark-abandoned)"
            )),
        }
    }
}

#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct WriterConfig {
    /// Bands used to pick the ID namespace.
    pub age_bands: AgeBands,
    pub on_batch_failure: BatchFailurePolicy,
}

/// One participant's committed registration.
#[derive(Clone, Debug, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Registration {
    pub id: RegistrationId,
    pub sequence: u64,
    pub category: CategoryCode,
    pub category_label: &'static str,
    pub age: Option<u32>,
    pub participant: Participant,
    /// Authoritative creation time assigned by the store.
    pub registered_at: DateTime<Utc>,
    /// The caller's local clock at submission, for display only.
    pub registered_at_display: String,
    pub submission_id: Uuid,
    pub attempts: u32,
}

/// Writes a batch of participants: classify, allocate, then attach the
/// payload to the allocated record.
///
/// Participants are processed strictly in order. Each one's allocation
/// finishes (success or failure) before the next starts.
#[derive(Debug)]
pub struct RegistrationWriter<S, C = SystemClock, P = TokioSleep> {
    allocator: Allocator<S, P>,
    clock: C,
    config: WriterConfig,
}

impl<S, C, P> RegistrationWriter<S, C, P>
where
    S: AllocationStore,
    C: Clock,
    P: SleepProvider,
{
    pub fn new(allocator: Allocator<S, P>, clock: C) -> Self {
        Self {
            allocator,
            clock,
            config: WriterConfig::default(),
        }
    }

    #[must_use]
    pub fn with_config(mut self, config: WriterConfig) -> Self {
        self.config = config;
        self
    }

    pub fn allocator(&self) -> &Allocator<S, P> {
        &self.allocator
    }

    pub fn store(&self) -> &S {
        self.allocator.store()
    }

    pub fn clock(&self) -> &C {
        &self.clock
    }

    pub fn config(&self) -> &WriterConfig {
        &self.config
    }

    /// Registers every participant of a batch.
    ///
    /// The whole batch is validated before the store is touched. After that,
    /// the first failure aborts the rest of the batch; participants committed
    /// before it keep their IDs and are handled per
    /// [`WriterConfig::on_batch_failure`].
    ///
    /// # Errors
    ///
    /// [`Error::EmptyBatch`] and [`Error::Validation`] before any allocation,
    /// otherwise whatever the failing participant's allocation or update
    /// returned.
    #[cfg_attr(
        feature = "tracing",
        tracing::instrument(level = "info", skip_all, fields(size = participants.len()))
    )]
    pub async fn register_batch(
        &self,
        participants: &[Participant],
        device: Option<&str>,
        cancel: &CancellationToken,
    ) -> Result<Vec<Registration>> {
        validate_batch(participants)?;

        let submitted = self.clock.now();
        let batch = Batch {
            submission_id: Uuid::new_v4(),
            display: submitted.format(DISPLAY_FORMAT).to_string(),
            today: submitted.date_naive(),
            device,
        };

        let mut committed = Vec::with_capacity(participants.len());
        for (index, participant) in participants.iter().enumerate() {
            match self.register_one(&batch, index, participant, cancel).await {
                Ok(registration) => committed.push(registration),
                Err(Failure { error, allocated }) => {
                    #[cfg(feature = "tracing")]
                    tracing::warn!(
                        failed = index + 1,
                        committed = committed.len(),
                        policy = %self.config.on_batch_failure,
                        error = %error,
                        "registration batch aborted"
                    );
                    let keys = committed
                        .iter()
                        .map(|registration| registration.id)
                        .chain(allocated);
                    self.settle_partial(keys).await;
                    return Err(error);
                }
            }
        }
        Ok(committed)
    }

    async fn register_one(
        &self,
        batch: &Batch<'_>,
        index: usize,
        participant: &Participant,
        cancel: &CancellationToken,
    ) -> core::result::Result<Registration, Failure> {
        let classification = participant.classify(&self.config.age_bands, batch.today);
        let participant_ref = format!("{}/{index}", batch.submission_id);
        let request = AllocationRequest {
            code: classification.code,
            participant_ref: &participant_ref,
            participant_name: &participant.participant_name,
        };
        let allocation = self.allocator.allocate(request, cancel).await?;

        // From here on the ID is committed whatever happens to the payload.
        self.attach(allocation.id(), participant, classification, batch)
            .await
            .map_err(|error| Failure {
                error,
                allocated: Some(allocation.id()),
            })?;

        Ok(Registration {
            id: allocation.id(),
            sequence: allocation.sequence(),
            category: classification.code,
            category_label: classification.code.label(),
            age: classification.age,
            participant: participant.clone(),
            registered_at: allocation.created_at(),
            registered_at_display: batch.display.clone(),
            submission_id: batch.submission_id,
            attempts: allocation.attempts,
        })
    }

    async fn attach(
        &self,
        id: RegistrationId,
        participant: &Participant,
        classification: Classification,
        batch: &Batch<'_>,
    ) -> Result<()> {
        let key = id.to_string();
        let patch = self.payload(participant, classification, batch)?;
        match self.store().update(&key, patch).await? {
            UpdateStatus::Updated { .. } => Ok(()),
            UpdateStatus::NotFound => Err(Error::NotFound { key }),
        }
    }

    /// The participant's payload plus the derived and submission attributes.
    ///
    /// Attributes owned by the allocation record or the store are dropped
    /// from the payload so a client can never overwrite them.
    fn payload(
        &self,
        participant: &Participant,
        classification: Classification,
        batch: &Batch<'_>,
    ) -> Result<Fields> {
        let mut fields = match serde_json::to_value(participant) {
            Ok(Value::Object(fields)) => fields,
            Ok(other) => {
                return Err(Error::Encoding {
                    context: format!("participant encoded as {other}, expected an object"),
                });
            }
            Err(err) => {
                return Err(Error::Encoding {
                    context: err.to_string(),
                });
            }
        };
        for name in self.allocator.id_fields().iter() {
            fields.remove(name);
        }
        for name in [PREFIX_FIELD, SEQUENCE_FIELD, PARTICIPANT_REF_FIELD]
            .into_iter()
            .chain(STORE_FIELDS)
        {
            fields.remove(name);
        }

        let code = classification.code;
        fields.insert("category".into(), code.label().into());
        fields.insert("categoryLabel".into(), code.label().into());
        fields.insert("categoryCode".into(), code.prefix().into());
        fields.insert("age".into(), classification.age.into());
        fields.insert("registrationAtDisplay".into(), batch.display.clone().into());
        if let Some(device) = batch.device {
            fields.insert("registrationDevice".into(), device.into());
        }
        fields.insert("submissionId".into(), batch.submission_id.to_string().into());
        Ok(fields)
    }

    async fn settle_partial(&self, ids: impl Iterator<Item = RegistrationId>) {
        if self.config.on_batch_failure != BatchFailurePolicy::MarkAbandoned {
            return;
        }
        for id in ids {
            let mut patch = Fields::new();
            patch.insert(BATCH_ABANDONED_FIELD.into(), true.into());
            let key = id.to_string();
            if let Err(_err) = self.store().update(&key, patch).await {
                #[cfg(feature = "tracing")]
                tracing::warn!(id = %key, error = %_err, "failed to mark abandoned record");
            }
        }
    }
}

/// Why one participant failed, and the ID it already holds if allocation
/// succeeded before the failure.
struct Failure {
    error: Error,
    allocated: Option<RegistrationId>,
}

impl From<Error> for Failure {
    fn from(error: Error) -> Self {
        Self {
            error,
            allocated: None,
        }
    }
}

/// Values shared by every participant of one submission.
struct Batch<'a> {
    submission_id: Uuid,
    display: String,
    today: NaiveDate,
    device: Option<&'a str>,
}
