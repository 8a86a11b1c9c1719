use chrono::{DateTime, FixedOffset, Local, NaiveDate, Utc};

/// Format used for the human-readable timestamps stored next to the
/// authoritative server time, e.g. `28/12/2025, 09:05:41`.
pub const DISPLAY_FORMAT: &str = "%d/%m/%Y, %H:%M:%S";

/// A source of wall-clock time.
///
/// The writer reads the caller's local time through this trait (for display
/// strings and for deriving ages from dates of birth), and the in-memory store
/// uses it to stamp records. Tests plug in a [`FixedClock`].
///
/// # Example
///
/// ```
/// use regid::{Clock, FixedClock};
///
/// let clock = FixedClock::parse("2025-12-28T09:05:41+04:00").unwrap();
/// assert_eq!(clock.display(), "28/12/2025, 09:05:41");
/// assert_eq!(clock.today().to_string(), "2025-12-28");
/// ```
pub trait Clock: Send + Sync {
    /// Returns the current time with the clock's local offset.
    fn now(&self) -> DateTime<FixedOffset>;

    /// Returns the current time in UTC.
    fn now_utc(&self) -> DateTime<Utc> {
        self.now().with_timezone(&Utc)
    }

    /// Returns the local calendar date.
    fn today(&self) -> NaiveDate {
        self.now().date_naive()
    }

    /// Returns the local time rendered with [`DISPLAY_FORMAT`].
    fn display(&self) -> String {
        self.now().format(DISPLAY_FORMAT).to_string()
    }
}

/// The host's local clock.
#[derive(Clone, Copy, Debug, Default)]
pub struct SystemClock;

impl Clock for SystemClock {
    fn now(&self) -> DateTime<FixedOffset> {
        Local::now().fixed_offset()
    }
}

/// A clock frozen at a single instant.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct FixedClock(pub DateTime<FixedOffset>);

impl FixedClock {
    /// Parses an RFC 3339 timestamp into a frozen clock.
    ///
    /// # Errors
    ///
    /// Returns the underlying parse error if `rfc3339` is malformed.
    pub fn parse(rfc3339: &str) -> Result<Self, chrono::ParseError> {
        DateTime::parse_from_rfc3339(rfc3339).map(Self)
    }
}

impl Clock for FixedClock {
    fn now(&self) -> DateTime<FixedOffset> {
        self.0
    }
}

impl<C: Clock + ?Sized> Clock for std::sync::Arc<C> {
    fn now(&self) -> DateTime<FixedOffset> {
        (**self).now()
    }
}
