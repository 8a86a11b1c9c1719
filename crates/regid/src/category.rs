use chrono::{Datelike, NaiveDate};
use core::{fmt, ops::RangeInclusive, str::FromStr};
use serde::{Deserialize, Serialize};

/// The namespace a participant's ID is drawn from.
///
/// Always derived from age at allocation time; a category string supplied by
/// the client is never trusted.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(into = "&'static str", try_from = "String")]
pub enum CategoryCode {
    Kids,
    Teen,
    /// Fallback for every age outside the configured bands, and for unknown
    /// ages.
    Other,
}

impl CategoryCode {
    pub const ALL: [Self; 3] = [Self::Kids, Self::Teen, Self::Other];

    /// Three-letter namespace prefix (`DGK`, `DGT`, `DGX`).
    pub const fn prefix(self) -> &'static str {
        match self {
            Self::Kids => "DGK",
            Self::Teen => "DGT",
            Self::Other => "DGX",
        }
    }

    /// Human-readable label (`Kids`, `Teen`, `Other`).
    pub const fn label(self) -> &'static str {
        match self {
            Self::Kids => "Kids",
            Self::Teen => "Teen",
            Self::Other => "Other",
        }
    }

    /// Colour the registration form uses for the category badge.
    pub const fn color(self) -> Option<&'static str> {
        match self {
            Self::Kids => Some("red"),
            Self::Teen => Some("blue"),
            Self::Other => None,
        }
    }
}

impl fmt::Display for CategoryCode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.prefix())
    }
}

/// Error returned when a string is neither a known prefix nor a known label.
#[derive(Clone, Debug, PartialEq, Eq, thiserror::Error)]
#[error("unknown category `{0}`")]
pub struct UnknownCategory(pub String);

impl FromStr for CategoryCode {
    type Err = UnknownCategory;

    /// Accepts either the prefix (`DGK`) or the label (`Kids`).
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::ALL
            .into_iter()
            .find(|code| code.prefix() == s || code.label() == s)
            .ok_or_else(|| UnknownCategory(s.to_owned()))
    }
}

impl From<CategoryCode> for &'static str {
    fn from(code: CategoryCode) -> Self {
        code.prefix()
    }
}

impl TryFrom<String> for CategoryCode {
    type Error = UnknownCategory;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        value.parse()
    }
}

/// Inclusive age ranges for the two non-fallback categories.
///
/// Two independent sets exist and must not be unified:
/// [`AgeBands::ALLOCATION`] decides the ID namespace, while the looser
/// [`AgeBands::PRELIMINARY`] only drives the hint shown on the form while the
/// date of birth is being typed.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct AgeBands {
    pub kids: RangeInclusive<u32>,
    pub teen: RangeInclusive<u32>,
}

impl AgeBands {
    /// Bands used when a participant is classified for ID allocation.
    pub const ALLOCATION: Self = Self {
        kids: 8..=12,
        teen: 13..=18,
    };

    /// Bands used by the registration form's live category hint.
    pub const PRELIMINARY: Self = Self {
        kids: 7..=12,
        teen: 13..=25,
    };

    /// Returns the banded category for `age`, or `None` when the age is
    /// unknown or outside both bands. Kids is checked first.
    pub fn band(&self, age: Option<u32>) -> Option<CategoryCode> {
        let age = age?;
        if self.kids.contains(&age) {
            Some(CategoryCode::Kids)
        } else if self.teen.contains(&age) {
            Some(CategoryCode::Teen)
        } else {
            None
        }
    }

    /// Classifies `age`, falling back to [`CategoryCode::Other`].
    ///
    /// # Example
    ///
    /// ```
    /// use regid::{AgeBands, CategoryCode};
    ///
    /// let bands = AgeBands::ALLOCATION;
    /// assert_eq!(bands.classify(Some(12)), CategoryCode::Kids);
    /// assert_eq!(bands.classify(Some(13)), CategoryCode::Teen);
    /// assert_eq!(bands.classify(None), CategoryCode::Other);
    /// ```
    pub fn classify(&self, age: Option<u32>) -> CategoryCode {
        self.band(age).unwrap_or(CategoryCode::Other)
    }

    /// Classifies from an explicit age or, failing that, a date of birth.
    pub fn classify_at(
        &self,
        age: Option<u32>,
        dob: Option<NaiveDate>,
        today: NaiveDate,
    ) -> Classification {
        let age = resolve_age(age, dob, today);
        Classification {
            code: self.classify(age),
            age,
        }
    }
}

impl Default for AgeBands {
    fn default() -> Self {
        Self::ALLOCATION
    }
}

/// Outcome of classifying a participant.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct Classification {
    pub code: CategoryCode,
    /// The age the decision was based on, if one could be determined.
    pub age: Option<u32>,
}

/// Picks the explicit age when present, otherwise derives it from `dob`.
pub fn resolve_age(age: Option<u32>, dob: Option<NaiveDate>, today: NaiveDate) -> Option<u32> {
    age.or_else(|| dob.and_then(|dob| age_on(dob, today)))
}

/// Whole years between `dob` and `today`, counting a year only once the
/// birthday has been reached. `None` for dates of birth in the future.
pub fn age_on(dob: NaiveDate, today: NaiveDate) -> Option<u32> {
    let mut years = today.year() - dob.year();
    if (today.month(), today.day()) < (dob.month(), dob.day()) {
        years -= 1;
    }
    u32::try_from(years).ok()
}

/// Parses an ISO `YYYY-MM-DD` date of birth; anything else counts as absent.
pub fn parse_dob(raw: &str) -> Option<NaiveDate> {
    NaiveDate::parse_from_str(raw.trim(), "%Y-%m-%d").ok()
}
