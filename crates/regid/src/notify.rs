use crate::Registration;
use core::future::Future;
use serde::Serialize;

/// Confirmation sent to the primary participant once a batch is committed.
#[derive(Clone, Debug, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct RegistrationNotice {
    pub email: String,
    pub participant_name: String,
    pub id: String,
    pub category: String,
    pub event_name: String,
    pub contact_number: String,
    /// The caller's display time of the submission.
    pub registered_at: String,
}

impl RegistrationNotice {
    /// Builds the notice for a committed batch, addressed to its primary
    /// participant. `None` when the batch is empty or carries no email.
    pub fn for_batch(registrations: &[Registration], event_name: &str) -> Option<Self> {
        let primary = registrations.first()?;
        let email = primary.participant.email.trim();
        if email.is_empty() {
            return None;
        }
        Some(Self {
            email: email.to_owned(),
            participant_name: primary.participant.participant_name.clone(),
            id: primary.id.to_string(),
            category: primary.category_label.to_owned(),
            event_name: event_name.to_owned(),
            contact_number: primary.participant.primary_contact_number.clone(),
            registered_at: primary.registered_at_display.clone(),
        })
    }
}

#[derive(Clone, Debug, PartialEq, Eq, thiserror::Error)]
#[error("failed to notify {email}: {reason}")]
pub struct NotifyError {
    pub email: String,
    pub reason: String,
}

/// Delivers registration confirmations.
///
/// Called fire-and-forget after a successful batch: a failed delivery never
/// fails the registration that triggered it.
pub trait Notifier: Send + Sync {
    fn notify(
        &self,
        notice: RegistrationNotice,
    ) -> impl Future<Output = Result<(), NotifyError>> + Send;
}

/// A [`Notifier`] that only logs the notice.
#[derive(Clone, Copy, Debug, Default)]
pub struct LogNotifier;

impl Notifier for LogNotifier {
    async fn notify(&self, _notice: RegistrationNotice) -> Result<(), NotifyError> {
        #[cfg(feature = "tracing")]
        tracing::info!(
            email = %_notice.email,
            id = %_notice.id,
            category = %_notice.category,
            event = %_notice.event_name,
            "registration notice"
        );
        Ok(())
    }
}
