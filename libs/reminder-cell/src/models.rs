use std::fmt;

use serde::Serialize;
use thiserror::Error;
use uuid::Uuid;

use appointment_cell::AppointmentError;
use notification_cell::NotificationError;

/// Outcome of one sweep run.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct SweepReport {
    /// Unflagged pending/confirmed rows the sweep looked at.
    pub examined: usize,
    pub sent: usize,
    pub failed: usize,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SweepKind {
    DayAhead,
    SameDay,
}

impl fmt::Display for SweepKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            SweepKind::DayAhead => write!(f, "day-ahead"),
            SweepKind::SameDay => write!(f, "same-day"),
        }
    }
}

#[derive(Debug, Error)]
pub enum ReminderError {
    #[error("Appointment store error: {0}")]
    Store(#[from] AppointmentError),

    #[error("Profile {0} not found")]
    MissingProfile(Uuid),

    #[error("Delivery failed: {0}")]
    Delivery(#[from] NotificationError),

    #[error("Scheduler is already running")]
    AlreadyRunning,

    #[error("No {0} reminder times configured")]
    EmptySchedule(SweepKind),
}
