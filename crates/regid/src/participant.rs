use crate::{AgeBands, CategoryCode, Classification, Error, Fields, Result, parse_dob};
use chrono::NaiveDate;
use serde::{Deserialize, Deserializer, Serialize};

/// Medical condition that, once selected, requires free-text notes.
pub const OTHER_CONDITION: &str = "Other";

/// Medical condition meaning "nothing to declare".
pub const NO_CONDITION: &str = "N/A";

/// One person's registration payload as submitted by the form.
///
/// Owned by the caller until persisted. Attributes the form sends that are not
/// modelled here are kept in [`Participant::extra`] and written back verbatim.
#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct Participant {
    #[serde(alias = "name", alias = "siblingName")]
    pub participant_name: String,
    /// ISO `YYYY-MM-DD`; anything unparsable is treated as absent.
    pub dob: String,
    #[serde(
        deserialize_with = "lenient_age",
        skip_serializing_if = "Option::is_none"
    )]
    pub age: Option<u32>,
    pub gender: String,
    /// Category the form displayed. A hint only; allocation re-derives it.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub category: Option<String>,
    pub primary_contact_number: String,
    pub primary_contact_relation: String,
    pub secondary_contact_number: String,
    pub secondary_contact_relationship: String,
    pub email: String,
    pub residence: String,
    pub parent_agreement: bool,
    pub parent_signature: String,
    #[serde(deserialize_with = "one_or_many")]
    pub medical_conditions: Vec<String>,
    pub additional_medical_notes: String,
    #[serde(flatten)]
    pub extra: Fields,
}

/// Category hint shown on the form while the date of birth is typed.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize)]
pub struct CategoryHint {
    pub code: CategoryCode,
    pub label: &'static str,
    pub color: Option<&'static str>,
}

impl Participant {
    pub fn dob_date(&self) -> Option<NaiveDate> {
        parse_dob(&self.dob)
    }

    /// Derives the allocation category; the client's `category` is ignored.
    pub fn classify(&self, bands: &AgeBands, today: NaiveDate) -> Classification {
        bands.classify_at(self.age, self.dob_date(), today)
    }

    /// The looser form-side hint from [`AgeBands::PRELIMINARY`]. `None` outside
    /// both preliminary bands.
    pub fn preliminary_hint(&self, today: NaiveDate) -> Option<CategoryHint> {
        let age = crate::resolve_age(self.age, self.dob_date(), today);
        AgeBands::PRELIMINARY.band(age).map(|code| CategoryHint {
            code,
            label: code.label(),
            color: code.color(),
        })
    }

    /// Declared conditions, without the "nothing to declare" marker.
    pub fn medical_flags(&self) -> impl Iterator<Item = &str> {
        self.medical_conditions
            .iter()
            .map(String::as_str)
            .filter(|c| *c != NO_CONDITION)
    }

    /// Checks the fields required before an ID may be allocated.
    ///
    /// `index` is the 0-based position in the batch; the primary participant
    /// (index 0) must also provide an email and the parent agreement.
    ///
    /// # Errors
    ///
    /// [`Error::Validation`] for the first missing field.
    pub fn validate(&self, index: usize) -> Result<()> {
        let fail = |reason: &str| {
            Err(Error::Validation {
                participant: index + 1,
                reason: reason.to_owned(),
            })
        };

        if blank(&self.participant_name) {
            return fail("Name is required");
        }
        if self.age.is_none() && self.dob_date().is_none() {
            return fail("Age or date of birth is required");
        }
        if blank(&self.gender) {
            return fail("Gender is required");
        }
        if self.medical_conditions.is_empty() {
            return fail("Please select a medical condition");
        }
        if self.medical_conditions.iter().any(|c| c == OTHER_CONDITION)
            && blank(&self.additional_medical_notes)
        {
            return fail("Specify other medical condition");
        }
        if blank(&self.primary_contact_number) {
            return fail("Primary contact number is required");
        }
        if blank(&self.primary_contact_relation) {
            return fail("Primary contact relationship is required");
        }
        if index == 0 {
            if blank(&self.email) {
                return fail("Email is required");
            }
            if !self.parent_agreement {
                return fail("Parent agreement is required");
            }
        }
        Ok(())
    }
}

/// Validates a whole batch before anything touches the store.
///
/// # Errors
///
/// [`Error::EmptyBatch`] or the first participant's [`Error::Validation`].
pub fn validate_batch(participants: &[Participant]) -> Result<()> {
    if participants.is_empty() {
        return Err(Error::EmptyBatch);
    }
    participants
        .iter()
        .enumerate()
        .try_for_each(|(index, p)| p.validate(index))
}

fn blank(value: &str) -> bool {
    value.trim().is_empty()
}

/// Accepts `12`, `"12"`, `""` or `null`.
fn lenient_age<'de, D>(deserializer: D) -> core::result::Result<Option<u32>, D::Error>
where
    D: Deserializer<'de>,
{
    #[derive(Deserialize)]
    #[serde(untagged)]
    enum Raw {
        Whole(u64),
        Fractional(f64),
        Text(String),
    }

    Ok(match Option::<Raw>::deserialize(deserializer)? {
        Some(Raw::Whole(n)) => u32::try_from(n).ok(),
        Some(Raw::Fractional(f)) if f.is_finite() && f >= 0.0 => Some(f as u32),
        Some(Raw::Text(s)) => s.trim().parse().ok(),
        _ => None,
    })
}

/// Accepts a list of conditions or a single one; an empty string is none.
fn one_or_many<'de, D>(deserializer: D) -> core::result::Result<Vec<String>, D::Error>
where
    D: Deserializer<'de>,
{
    #[derive(Deserialize)]
    #[serde(untagged)]
    enum Raw {
        Many(Vec<String>),
        One(String),
    }

    Ok(match Option::<Raw>::deserialize(deserializer)? {
        Some(Raw::Many(list)) => list,
        Some(Raw::One(one)) if !blank(&one) => vec![one],
        _ => Vec::new(),
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testing::participant as complete;
    use serde_json::json;

    fn today() -> NaiveDate {
        NaiveDate::from_ymd_opt(2025, 12, 28).unwrap()
    }

    #[test]
    fn deserializes_form_payload() {
        let p: Participant = serde_json::from_value(json!({
            "participantName": "Ada",
            "dob": "2014-03-01",
            "age": "11",
            "gender": "Female",
            "medicalConditions": "Asthma",
            "tShirtSize": "M",
        }))
        .unwrap();

        assert_eq!(p.participant_name, "Ada");
        assert_eq!(p.age, Some(11));
        assert_eq!(p.medical_conditions, ["Asthma"]);
        assert_eq!(p.extra["tShirtSize"], "M");
        assert_eq!(p.dob_date(), NaiveDate::from_ymd_opt(2014, 3, 1));
    }

    #[test]
    fn blank_or_missing_age_is_absent() {
        for age in [json!(""), json!(null), json!("n/a")] {
            let p: Participant = serde_json::from_value(json!({ "age": age })).unwrap();
            assert_eq!(p.age, None, "{age}");
        }
        let p: Participant = serde_json::from_value(json!({ "age": 14 })).unwrap();
        assert_eq!(p.age, Some(14));
    }

    #[test]
    fn extra_fields_survive_a_round_trip() {
        let raw = json!({ "participantName": "Ben", "church": "St. Mary" });
        let p: Participant = serde_json::from_value(raw).unwrap();
        let back = serde_json::to_value(&p).unwrap();
        assert_eq!(back["church"], "St. Mary");
        assert_eq!(back["participantName"], "Ben");
    }

    #[test]
    fn complete_primary_participant_passes() {
        assert_eq!(complete("Ada").validate(0), Ok(()));
    }

    #[test]
    fn missing_fields_are_reported_with_position() {
        let mut p = complete("Ada");
        p.participant_name = "  ".into();
        assert_eq!(
            p.validate(1),
            Err(Error::Validation {
                participant: 2,
                reason: "Name is required".into(),
            })
        );

        let mut p = complete("Ada");
        p.age = None;
        p.dob = "not a date".into();
        assert!(matches!(p.validate(0), Err(Error::Validation { participant: 1, .. })));

        let mut p = complete("Ada");
        p.medical_conditions = vec![OTHER_CONDITION.into()];
        let err = p.validate(0).unwrap_err();
        assert_eq!(err.to_string(), "Participant 1: Specify other medical condition");
    }

    #[test]
    fn only_the_primary_needs_email_and_agreement() {
        let mut sibling = complete("Cy");
        sibling.email.clear();
        sibling.parent_agreement = false;
        assert_eq!(sibling.validate(1), Ok(()));
        assert!(sibling.validate(0).is_err());
    }

    #[test]
    fn batch_validation_stops_at_first_failure() {
        assert_eq!(validate_batch(&[]), Err(Error::EmptyBatch));

        let mut second = complete("Di");
        second.gender.clear();
        let err = validate_batch(&[complete("Ed"), second]).unwrap_err();
        assert_eq!(err.to_string(), "Participant 2: Gender is required");
    }

    #[test]
    fn client_category_is_ignored() {
        let mut p = complete("Fay");
        p.category = Some("Teen".into());
        p.age = Some(9);
        assert_eq!(p.classify(&AgeBands::ALLOCATION, today()).code, CategoryCode::Kids);
    }

    #[test]
    fn preliminary_hint_uses_looser_bands() {
        let mut p = complete("Gus");
        p.age = Some(7);
        let hint = p.preliminary_hint(today()).unwrap();
        assert_eq!((hint.label, hint.color), ("Kids", Some("red")));
        assert_eq!(p.classify(&AgeBands::ALLOCATION, today()).code, CategoryCode::Other);

        p.age = Some(30);
        assert_eq!(p.preliminary_hint(today()), None);
    }

    #[test]
    fn medical_flags_skip_the_none_marker() {
        let mut p = complete("Hal");
        p.medical_conditions = vec!["N/A".into(), "Asthma".into()];
        assert_eq!(p.medical_flags().collect::<Vec<_>>(), ["Asthma"]);
    }
}
