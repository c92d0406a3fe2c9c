//! Store configuration.

/// Configuration for the patient store.
#[derive(Debug, Clone)]
pub struct StoreConfig {
    /// Largest accepted request body in bytes.
    pub max_body_bytes: usize,
    /// Whether admitting a new patient into an occupied room discharges the
    /// previous occupant. When false the admission is rejected.
    pub discharge_on_admit: bool,
}

impl StoreConfig {
    /// Creates a configuration with default limits.
    pub fn new() -> Self {
        Self {
            max_body_bytes: 16 * 1024 * 1024,
            discharge_on_admit: true,
        }
    }

    /// Sets the largest accepted request body.
    pub fn with_max_body_bytes(mut self, max: usize) -> Self {
        self.max_body_bytes = max;
        self
    }

    /// Sets whether a new admission replaces the room's occupant.
    pub fn with_discharge_on_admit(mut self, discharge: bool) -> Self {
        self.discharge_on_admit = discharge;
        self
    }
}

impl Default for StoreConfig {
    fn default() -> Self {
        Self::new()
    }
}
