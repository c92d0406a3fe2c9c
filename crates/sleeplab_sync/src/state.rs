//! Station state machines.

use std::fmt;

/// State of the patient station.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PatientState {
    /// Nothing uploaded yet, or the last upload failed.
    Idle,
    /// An upload is in flight.
    PendingPush,
    /// The last upload was accepted by the store.
    Synced,
}

impl PatientState {
    /// Returns true if an upload is in flight.
    pub fn is_active(&self) -> bool {
        matches!(self, PatientState::PendingPush)
    }

    /// Returns true if a new upload may start.
    pub fn can_push(&self) -> bool {
        matches!(self, PatientState::Idle | PatientState::Synced)
    }
}

impl fmt::Display for PatientState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        fmt::Debug::fmt(self, f)
    }
}

/// State of the monitoring station.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MonitorState {
    /// No room is displayed.
    Idle,
    /// A room refresh is in flight.
    PendingPull,
    /// A room view is on screen.
    Displayed,
}

impl MonitorState {
    /// Returns true if a pull is in flight.
    pub fn is_active(&self) -> bool {
        matches!(self, MonitorState::PendingPull)
    }

    /// Returns true if a new pull may start.
    pub fn can_pull(&self) -> bool {
        matches!(self, MonitorState::Idle | MonitorState::Displayed)
    }
}

impl fmt::Display for MonitorState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        fmt::Debug::fmt(self, f)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn patient_state_checks() {
        assert!(PatientState::Idle.can_push());
        assert!(PatientState::Synced.can_push());
        assert!(!PatientState::PendingPush.can_push());
        assert!(PatientState::PendingPush.is_active());
    }

    #[test]
    fn monitor_state_checks() {
        assert!(MonitorState::Idle.can_pull());
        assert!(MonitorState::Displayed.can_pull());
        assert!(!MonitorState::PendingPull.can_pull());
        assert_eq!(MonitorState::Displayed.to_string(), "Displayed");
    }
}
