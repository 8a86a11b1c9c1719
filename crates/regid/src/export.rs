use crate::{
    AllocationStore, Clock, Document, Error, NO_CONDITION, PRIMARY_ID_FIELD, Registration, Result,
    UpdateStatus,
};
use serde::Serialize;
use serde_json::Value;

pub const ID_GENERATED_FIELD: &str = "idGenerated";
pub const GENERATED_ID_FIELD: &str = "generatedId";
pub const ID_GENERATED_AT_DISPLAY_FIELD: &str = "idGeneratedAtDisplay";

/// What a card renderer needs to print one participant's badge.
#[derive(Clone, Debug, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Badge {
    pub id: String,
    pub participant_name: String,
    pub category: String,
    /// Declared conditions; empty when nothing was declared.
    pub medical_flags: Vec<String>,
}

impl From<&Registration> for Badge {
    fn from(registration: &Registration) -> Self {
        Self {
            id: registration.id.to_string(),
            participant_name: registration.participant.participant_name.clone(),
            category: registration.category_label.to_owned(),
            medical_flags: registration
                .participant
                .medical_flags()
                .map(str::to_owned)
                .collect(),
        }
    }
}

impl Badge {
    /// Reads a badge back from a stored registration record.
    ///
    /// Legacy records without `uniqueId` fall back to the document key.
    pub fn from_document(doc: &Document) -> Self {
        let text = |name: &str| doc.str_field(name).unwrap_or_default().to_owned();
        let medical_flags = match doc.fields.get("medicalConditions") {
            Some(Value::Array(items)) => items
                .iter()
                .filter_map(Value::as_str)
                .filter(|c| *c != NO_CONDITION)
                .map(str::to_owned)
                .collect(),
            Some(Value::String(one)) if one != NO_CONDITION && !one.is_empty() => {
                vec![one.clone()]
            }
            _ => Vec::new(),
        };
        Self {
            id: doc
                .str_field(PRIMARY_ID_FIELD)
                .unwrap_or(&doc.key)
                .to_owned(),
            participant_name: text("participantName"),
            category: doc
                .str_field("categoryLabel")
                .or_else(|| doc.str_field("category"))
                .unwrap_or_default()
                .to_owned(),
            medical_flags,
        }
    }
}

/// Records that a participant's card has been exported.
///
/// Writes `idGenerated`, `generatedId` and the caller's display time; the
/// store's `updatedAt` is the authoritative time. The allocated ID itself is
/// not touched.
///
/// # Errors
///
/// [`Error::NotFound`] when no record exists at `key`, or the store's error.
pub async fn mark_exported<S, C>(store: &S, key: &str, clock: &C) -> Result<Document>
where
    S: AllocationStore,
    C: Clock,
{
    let mut patch = crate::Fields::new();
    patch.insert(ID_GENERATED_FIELD.into(), true.into());
    patch.insert(GENERATED_ID_FIELD.into(), key.into());
    patch.insert(ID_GENERATED_AT_DISPLAY_FIELD.into(), clock.display().into());

    match store.update(key, patch).await? {
        UpdateStatus::Updated { document } => {
            #[cfg(feature = "tracing")]
            tracing::info!(id = key, "card exported");
            Ok(document)
        }
        UpdateStatus::NotFound => Err(Error::NotFound {
            key: key.to_owned(),
        }),
    }
}
