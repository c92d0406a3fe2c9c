//! Second-precision timestamps without offset.

use crate::error::{ProtocolError, ProtocolResult};
use chrono::{Datelike, Duration, Local, NaiveDateTime, SubsecRound};
use serde::{de, Deserialize, Deserializer, Serialize, Serializer};
use std::fmt;
use std::str::FromStr;

/// Wire format: `YYYY-MM-DDTHH:MM:SS`.
const FORMAT: &str = "%Y-%m-%dT%H:%M:%S";

/// Years representable with four digits and no sign.
const YEARS: std::ops::RangeInclusive<i32> = 0..=9999;

/// An instant with one-second resolution and no timezone offset.
///
/// Sub-second precision is dropped on construction so that the textual
/// form round-trips exactly and can be used as a lookup key.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct Timestamp(NaiveDateTime);

impl Timestamp {
    /// Creates a timestamp, truncating sub-second precision.
    pub fn new(datetime: NaiveDateTime) -> Self {
        Self(datetime.trunc_subsecs(0))
    }

    /// Current local wall-clock time.
    pub fn now() -> Self {
        Self::new(Local::now().naive_local())
    }

    /// Parses the wire format.
    pub fn parse(text: &str) -> ProtocolResult<Self> {
        let datetime = NaiveDateTime::parse_from_str(text, FORMAT).map_err(|e| {
            ProtocolError::Validation(format!("invalid timestamp {:?}: {}", text, e))
        })?;
        Self::in_range(datetime)
    }

    /// Returns a timestamp `seconds` later.
    ///
    /// Fails when the result leaves the four-digit year range.
    pub fn plus_seconds(self, seconds: i64) -> ProtocolResult<Self> {
        let later = Duration::try_seconds(seconds)
            .and_then(|delta| self.0.checked_add_signed(delta))
            .ok_or_else(|| {
                ProtocolError::Validation(format!("{} plus {}s overflows", self, seconds))
            })?;
        Self::in_range(later)
    }

    fn in_range(datetime: NaiveDateTime) -> ProtocolResult<Self> {
        if !YEARS.contains(&datetime.year()) {
            return Err(ProtocolError::Validation(format!(
                "timestamp year {} outside 0000..=9999",
                datetime.year()
            )));
        }
        Ok(Self::new(datetime))
    }

    /// Returns the underlying datetime.
    pub fn datetime(self) -> NaiveDateTime {
        self.0
    }
}

impl fmt::Display for Timestamp {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0.format(FORMAT))
    }
}

impl FromStr for Timestamp {
    type Err = ProtocolError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::parse(s)
    }
}

impl Serialize for Timestamp {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.collect_str(self)
    }
}

impl<'de> Deserialize<'de> for Timestamp {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let text = String::deserialize(deserializer)?;
        Self::parse(&text).map_err(de::Error::custom)
    }
}
