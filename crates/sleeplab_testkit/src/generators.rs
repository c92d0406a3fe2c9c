//! Property-based test generators using proptest.
//!
//! Provides strategies for generating random test data
//! that maintains required invariants.

use proptest::prelude::*;
use sleeplab_protocol::{CalculatedData, CpapPressure, PatientUpsert, Timestamp};

/// Strategy for in-range pressure settings.
pub fn cpap_pressure_strategy() -> impl Strategy<Value = CpapPressure> {
    (CpapPressure::MIN as i64..=CpapPressure::MAX as i64)
        .prop_map(|v| CpapPressure::new(v).expect("in range"))
}

/// Strategy for raw pressure values, mostly near the valid range.
pub fn raw_pressure_strategy() -> impl Strategy<Value = i64> {
    prop_oneof![
        3 => 0i64..30,
        1 => any::<i64>(),
    ]
}

/// Strategy for timestamps in November 2024.
pub fn timestamp_strategy() -> impl Strategy<Value = Timestamp> {
    (1u32..=30, 0u32..24, 0u32..60, 0u32..60).prop_map(|(d, h, m, s)| {
        Timestamp::parse(&format!("2024-11-{:02}T{:02}:{:02}:{:02}", d, h, m, s))
            .expect("valid timestamp")
    })
}

/// Strategy for patient names.
pub fn name_strategy() -> impl Strategy<Value = String> {
    prop::string::string_regex("[A-Z][a-z]{1,11} [A-Z][a-z]{1,13}").expect("Invalid regex")
}

/// Strategy for valid analysis results with a small fake image.
pub fn calculated_data_strategy() -> impl Strategy<Value = CalculatedData> {
    (
        cpap_pressure_strategy(),
        0.0f64..40.0,
        0u32..30,
        prop::collection::vec(any::<u8>(), 1..64),
        timestamp_strategy(),
    )
        .prop_map(|(pressure, rate, apneas, png, ts)| {
            CalculatedData::new(pressure, (rate * 10.0).round() / 10.0, apneas, &png, ts)
        })
}

/// Strategy for upserts over a small identity space, so that merges and
/// conflicts are common.
pub fn patient_upsert_strategy() -> impl Strategy<Value = PatientUpsert> {
    (
        1u64..6,
        1u32..4,
        prop::option::of(name_strategy()),
        prop::option::of(cpap_pressure_strategy()),
        prop::option::of(calculated_data_strategy()),
    )
        .prop_map(|(mrn, room, name, pressure, data)| {
            let mut upsert = PatientUpsert::new(mrn, room);
            if let Some(name) = name {
                upsert = upsert.with_name(name);
            }
            if let Some(pressure) = pressure {
                upsert = upsert.with_cpap_pressure(pressure);
            }
            if let Some(data) = data {
                upsert = upsert.with_data(data);
            }
            upsert
        })
}

/// An operation against the store.
#[derive(Debug, Clone)]
pub enum StoreOperation {
    /// Create or merge a patient.
    Upsert(PatientUpsert),
    /// Change a room's pressure.
    UpdatePressure {
        /// Room number.
        room: u32,
        /// Requested value, possibly out of range.
        value: i64,
    },
    /// Read everything about a room.
    ReadRoom {
        /// Room number.
        room: u32,
    },
}

/// Strategy for generating store operations.
pub fn store_operation_strategy() -> impl Strategy<Value = StoreOperation> {
    prop_oneof![
        4 => patient_upsert_strategy().prop_map(StoreOperation::Upsert),
        2 => (1u32..4, raw_pressure_strategy())
            .prop_map(|(room, value)| StoreOperation::UpdatePressure { room, value }),
        1 => (1u32..4).prop_map(|room| StoreOperation::ReadRoom { room }),
    ]
}

/// Strategy for generating a sequence of operations.
pub fn operation_sequence_strategy(
    min_ops: usize,
    max_ops: usize,
) -> impl Strategy<Value = Vec<StoreOperation>> {
    prop::collection::vec(store_operation_strategy(), min_ops..max_ops)
}

/// Strategy for arbitrary bounded flow values.
pub fn flow_values_strategy(max_len: usize) -> impl Strategy<Value = Vec<f64>> {
    prop::collection::vec(-5.0f64..5.0, 1..max_len.max(2))
}

/// Configuration for property tests.
#[derive(Debug, Clone)]
pub struct PropTestConfig {
    /// Number of test cases to run.
    pub cases: u32,
    /// Maximum shrink iterations.
    pub max_shrink_iters: u32,
}

impl Default for PropTestConfig {
    fn default() -> Self {
        Self {
            cases: 256,
            max_shrink_iters: 1000,
        }
    }
}

impl PropTestConfig {
    /// Creates a configuration for quick tests.
    #[must_use]
    pub fn quick() -> Self {
        Self {
            cases: 32,
            max_shrink_iters: 100,
        }
    }

    /// Creates a configuration for thorough tests.
    #[must_use]
    pub fn thorough() -> Self {
        Self {
            cases: 1024,
            max_shrink_iters: 10000,
        }
    }

    /// Converts to proptest config.
    #[must_use]
    pub fn to_proptest_config(&self) -> ProptestConfig {
        ProptestConfig {
            cases: self.cases,
            max_shrink_iters: self.max_shrink_iters,
            ..ProptestConfig::default()
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    proptest! {
        #![proptest_config(PropTestConfig::quick().to_proptest_config())]

        #[test]
        fn generated_data_is_valid(data in calculated_data_strategy()) {
            prop_assert!(data.validate().is_ok());
        }

        #[test]
        fn generated_upserts_are_valid(upsert in patient_upsert_strategy()) {
            prop_assert!(upsert.validate().is_ok());
        }

        #[test]
        fn timestamps_round_trip_text(ts in timestamp_strategy()) {
            prop_assert_eq!(Timestamp::parse(&ts.to_string()).unwrap(), ts);
        }
    }
}
