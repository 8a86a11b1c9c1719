use crate::{Error, RegistrationId, Result};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::collections::BTreeSet;

/// Free-form document body, keyed by attribute name.
pub type Fields = serde_json::Map<String, Value>;

/// Attribute holding the canonical ID on records written by this crate.
pub const PRIMARY_ID_FIELD: &str = "uniqueId";
pub const PREFIX_FIELD: &str = "prefix";
pub const SEQUENCE_FIELD: &str = "sequence";
pub const PARTICIPANT_REF_FIELD: &str = "participantRef";

/// Attributes the store assigns itself. They are serialized alongside the
/// body, so a body may never carry them.
pub const STORE_FIELDS: [&str; 3] = ["docId", "createdAt", "updatedAt"];

/// One stored record: a key, store-assigned timestamps and a body.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Document {
    #[serde(rename = "docId")]
    pub key: String,
    pub created_at: DateTime<Utc>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub updated_at: Option<DateTime<Utc>>,
    #[serde(flatten)]
    pub fields: Fields,
}

impl Document {
    /// Every value on this record that may encode an ID: the key itself plus
    /// each string-valued attribute named in `id_fields`.
    pub fn known_ids<'a, 'b>(
        &'a self,
        id_fields: &'b IdFields,
    ) -> impl Iterator<Item = &'a str> + use<'a, 'b> {
        core::iter::once(self.key.as_str()).chain(
            id_fields
                .iter()
                .filter_map(|name| self.fields.get(name).and_then(Value::as_str)),
        )
    }

    pub fn str_field(&self, name: &str) -> Option<&str> {
        self.fields.get(name).and_then(Value::as_str)
    }
}

/// The set of attribute names that may hold an ID on a stored record.
///
/// Records written over the years carry the same logical identifier under
/// different names (`uniqueId`, `studentId`, `familyId`). Candidate generation
/// treats all of them as occupying the namespace, and updates may never point
/// any of them at a different ID.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct IdFields(BTreeSet<String>);

impl IdFields {
    /// Builds a field set; [`PRIMARY_ID_FIELD`] is always included.
    pub fn new<I, S>(names: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        let mut set: BTreeSet<String> = names.into_iter().map(Into::into).collect();
        set.insert(PRIMARY_ID_FIELD.to_owned());
        Self(set)
    }

    pub fn iter(&self) -> impl Iterator<Item = &str> {
        self.0.iter().map(String::as_str)
    }

    pub fn contains(&self, name: &str) -> bool {
        self.0.contains(name)
    }
}

impl Default for IdFields {
    fn default() -> Self {
        Self::new(["uniqueId", "studentId", "familyId"])
    }
}

/// Rejects a patch that would set any ID field of `key` to another value or
/// touch one of the [`STORE_FIELDS`].
///
/// # Errors
///
/// Returns [`Error::ImmutableField`] naming the first offending field.
pub fn guard_patch(key: &str, patch: &Fields, id_fields: &IdFields) -> Result<()> {
    if let Some(name) = STORE_FIELDS.iter().find(|name| patch.contains_key(**name)) {
        return Err(Error::ImmutableField {
            key: key.to_owned(),
            field: (*name).to_owned(),
        });
    }
    for name in id_fields.iter() {
        if let Some(value) = patch.get(name) {
            if value.as_str() != Some(key) {
                return Err(Error::ImmutableField {
                    key: key.to_owned(),
                    field: name.to_owned(),
                });
            }
        }
    }
    Ok(())
}

/// The persisted unit of truth for an allocated ID.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct AllocationRecord {
    pub id: RegistrationId,
    pub created_at: DateTime<Utc>,
    pub participant_ref: String,
}

impl AllocationRecord {
    /// Body written by the allocator's create-if-absent commit.
    pub fn fields(id: RegistrationId, participant_ref: &str) -> Fields {
        let mut fields = Fields::new();
        fields.insert(PRIMARY_ID_FIELD.into(), id.to_string().into());
        fields.insert(PREFIX_FIELD.into(), id.prefix().into());
        fields.insert(SEQUENCE_FIELD.into(), id.sequence().into());
        fields.insert(PARTICIPANT_REF_FIELD.into(), participant_ref.into());
        fields
    }

    /// Reads an allocation record back from a document keyed by a canonical
    /// ID. Returns `None` for legacy documents whose key is not canonical.
    pub fn from_document(doc: &Document) -> Option<Self> {
        Some(Self {
            id: doc.key.parse().ok()?,
            created_at: doc.created_at,
            participant_ref: doc
                .str_field(PARTICIPANT_REF_FIELD)
                .unwrap_or_default()
                .to_owned(),
        })
    }

    pub fn sequence(&self) -> u64 {
        self.id.sequence()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn doc(key: &str, body: Value) -> Document {
        Document {
            key: key.into(),
            created_at: DateTime::UNIX_EPOCH,
            updated_at: None,
            fields: body.as_object().cloned().unwrap_or_default(),
        }
    }

    #[test]
    fn known_ids_cover_key_and_aliases_only() {
        let d = doc(
            "auto-7f3a",
            json!({ "studentId": "DGK-010", "familyId": 12, "notes": "DGK-999" }),
        );
        let ids: Vec<_> = d.known_ids(&IdFields::default()).collect();
        assert_eq!(ids, ["auto-7f3a", "DGK-010"]);
    }

    #[test]
    fn primary_field_is_always_known() {
        let fields = IdFields::new(["legacyId"]);
        assert!(fields.contains("legacyId"));
        assert!(fields.contains(PRIMARY_ID_FIELD));
    }

    #[test]
    fn patch_may_repeat_but_not_change_an_id() {
        let fields = IdFields::default();
        let same = json!({ "uniqueId": "DGK-001", "email": "a@b.c" });
        assert!(guard_patch("DGK-001", same.as_object().unwrap(), &fields).is_ok());

        let other = json!({ "studentId": "DGK-002" });
        assert_eq!(
            guard_patch("DGK-001", other.as_object().unwrap(), &fields),
            Err(Error::ImmutableField {
                key: "DGK-001".into(),
                field: "studentId".into()
            })
        );
    }

    #[test]
    fn patch_may_not_touch_store_fields() {
        let fields = IdFields::default();
        for name in STORE_FIELDS {
            let patch = json!({ name: "1999-01-01T00:00:00Z" });
            assert_eq!(
                guard_patch("DGK-001", patch.as_object().unwrap(), &fields),
                Err(Error::ImmutableField {
                    key: "DGK-001".into(),
                    field: name.into()
                })
            );
        }
    }

    #[test]
    fn allocation_record_round_trips_through_a_document() {
        let id: RegistrationId = "DGT-005".parse().unwrap();
        let d = Document {
            key: id.to_string(),
            created_at: DateTime::UNIX_EPOCH,
            updated_at: None,
            fields: AllocationRecord::fields(id, "sub-1/0"),
        };
        let record = AllocationRecord::from_document(&d).unwrap();
        assert_eq!(record.id, id);
        assert_eq!(record.sequence(), 5);
        assert_eq!(record.participant_ref, "sub-1/0");
        assert_eq!(d.str_field(PREFIX_FIELD), Some("DGT"));
    }
}
