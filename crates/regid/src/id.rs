use crate::CategoryCode;
use core::{fmt, str::FromStr};
use serde::{Deserialize, Serialize};

/// Minimum width of the zero-padded sequence part. Wider sequences are
/// printed in full (`DGK-1000`).
pub const SEQUENCE_WIDTH: usize = 3;

/// A canonical registration ID, `PREFIX-NNN`.
///
/// # Example
///
/// ```
/// use regid::{CategoryCode, RegistrationId};
///
/// let id = RegistrationId::new(CategoryCode::Kids, 4);
/// assert_eq!(id.to_string(), "DGK-004");
/// assert_eq!("DGT-1234".parse::<RegistrationId>().unwrap().sequence(), 1234);
/// ```
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(into = "String", try_from = "String")]
pub struct RegistrationId {
    code: CategoryCode,
    sequence: u64,
}

impl RegistrationId {
    pub const fn new(code: CategoryCode, sequence: u64) -> Self {
        Self { code, sequence }
    }

    pub const fn code(&self) -> CategoryCode {
        self.code
    }

    pub const fn prefix(&self) -> &'static str {
        self.code.prefix()
    }

    pub const fn sequence(&self) -> u64 {
        self.sequence
    }
}

impl fmt::Display for RegistrationId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{}-{:0width$}",
            self.code.prefix(),
            self.sequence,
            width = SEQUENCE_WIDTH
        )
    }
}

/// Reasons a string is not a canonical registration ID.
#[derive(Clone, Debug, PartialEq, Eq, thiserror::Error)]
pub enum ParseIdError {
    #[error("`{0}` is not of the form PREFIX-NNN")]
    Malformed(String),
    #[error("`{0}` has an unknown prefix")]
    UnknownPrefix(String),
}

impl FromStr for RegistrationId {
    type Err = ParseIdError;

    /// Strict parse: a known prefix, a dash, and at least three digits.
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let malformed = || ParseIdError::Malformed(s.to_owned());
        let (prefix, digits) = s.split_once('-').ok_or_else(malformed)?;
        let code = CategoryCode::ALL
            .into_iter()
            .find(|code| code.prefix() == prefix)
            .ok_or_else(|| ParseIdError::UnknownPrefix(s.to_owned()))?;
        if digits.len() < SEQUENCE_WIDTH || !digits.bytes().all(|b| b.is_ascii_digit()) {
            return Err(malformed());
        }
        let sequence = digits.parse().map_err(|_| malformed())?;
        Ok(Self { code, sequence })
    }
}

impl From<RegistrationId> for String {
    fn from(id: RegistrationId) -> Self {
        id.to_string()
    }
}

impl TryFrom<String> for RegistrationId {
    type Error = ParseIdError;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        value.parse()
    }
}

/// Lenient sequence extraction used while scanning the store.
///
/// Returns `None` when `raw` does not live in `prefix`'s namespace. Inside the
/// namespace, the leading digits after the dash are the sequence and a suffix
/// without leading digits counts as `0`, so legacy or hand-edited values still
/// occupy the namespace without breaking the scan.
pub fn namespace_sequence(raw: &str, prefix: &str) -> Option<u64> {
    let suffix = raw.strip_prefix(prefix)?.strip_prefix('-')?;
    let digits = suffix
        .find(|c: char| !c.is_ascii_digit())
        .map_or(suffix, |end| &suffix[..end]);
    Some(digits.parse().unwrap_or(0))
}
