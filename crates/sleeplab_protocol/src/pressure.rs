//! CPAP pressure setting.

use crate::error::{ProtocolError, ProtocolResult};
use serde::{Deserialize, Serialize};
use std::fmt;

/// A CPAP pressure setting in cmH2O, always within `4..=25`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(try_from = "i64", into = "i64")]
pub struct CpapPressure(u8);

impl CpapPressure {
    /// Lowest accepted setting.
    pub const MIN: u8 = 4;
    /// Highest accepted setting.
    pub const MAX: u8 = 25;

    /// Validates a raw pressure value.
    pub fn new(value: i64) -> ProtocolResult<Self> {
        if (i64::from(Self::MIN)..=i64::from(Self::MAX)).contains(&value) {
            Ok(Self(value as u8))
        } else {
            Err(ProtocolError::Validation(format!(
                "CPAP value {} out of range, must be between {} and {} inclusive",
                value,
                Self::MIN,
                Self::MAX
            )))
        }
    }

    /// Returns the setting in cmH2O.
    pub fn value(self) -> u8 {
        self.0
    }
}

impl TryFrom<i64> for CpapPressure {
    type Error = ProtocolError;

    fn try_from(value: i64) -> Result<Self, Self::Error> {
        Self::new(value)
    }
}

impl From<CpapPressure> for i64 {
    fn from(pressure: CpapPressure) -> Self {
        i64::from(pressure.0)
    }
}

impl fmt::Display for CpapPressure {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} cmH2O", self.0)
    }
}
