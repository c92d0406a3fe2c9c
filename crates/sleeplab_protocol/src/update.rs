//! Explicit optional-field updates.

use serde::{Deserialize, Deserializer, Serialize, Serializer};

/// A field in an update request: either absent (leave unchanged) or present.
///
/// On the wire an absent field is simply omitted. A JSON `null` is not an
/// absent field; it fails to decode as `T` and the request is rejected.
///
/// Fields of this type must be annotated with
/// `#[serde(default, skip_serializing_if = "FieldUpdate::is_absent")]`.
#[derive(Debug, Clone, PartialEq)]
pub enum FieldUpdate<T> {
    /// The field is not being updated.
    Absent,
    /// The field is set to this value.
    Present(T),
}

impl<T> FieldUpdate<T> {
    /// Returns true if the field was omitted.
    pub fn is_absent(&self) -> bool {
        matches!(self, FieldUpdate::Absent)
    }

    /// Returns true if the field carries a value.
    pub fn is_present(&self) -> bool {
        !self.is_absent()
    }

    /// Borrows the carried value.
    pub fn as_ref(&self) -> FieldUpdate<&T> {
        match self {
            FieldUpdate::Absent => FieldUpdate::Absent,
            FieldUpdate::Present(value) => FieldUpdate::Present(value),
        }
    }

    /// Converts into an `Option`.
    pub fn into_option(self) -> Option<T> {
        match self {
            FieldUpdate::Absent => None,
            FieldUpdate::Present(value) => Some(value),
        }
    }

    /// Maps the carried value.
    pub fn map<U>(self, f: impl FnOnce(T) -> U) -> FieldUpdate<U> {
        match self {
            FieldUpdate::Absent => FieldUpdate::Absent,
            FieldUpdate::Present(value) => FieldUpdate::Present(f(value)),
        }
    }

    /// Writes the value into `slot` if present. Returns true if it did.
    pub fn apply_to(self, slot: &mut Option<T>) -> bool {
        match self {
            FieldUpdate::Absent => false,
            FieldUpdate::Present(value) => {
                *slot = Some(value);
                true
            }
        }
    }
}

impl<T> Default for FieldUpdate<T> {
    fn default() -> Self {
        FieldUpdate::Absent
    }
}

impl<T> From<Option<T>> for FieldUpdate<T> {
    fn from(value: Option<T>) -> Self {
        match value {
            Some(value) => FieldUpdate::Present(value),
            None => FieldUpdate::Absent,
        }
    }
}

impl<T: Serialize> Serialize for FieldUpdate<T> {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        match self {
            FieldUpdate::Absent => serializer.serialize_none(),
            FieldUpdate::Present(value) => value.serialize(serializer),
        }
    }
}

impl<'de, T: Deserialize<'de>> Deserialize<'de> for FieldUpdate<T> {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        T::deserialize(deserializer).map(FieldUpdate::Present)
    }
}
