use async_trait::async_trait;
use uuid::Uuid;

use crate::models::Appointment;

/// Hook for components that react to appointments entering or leaving the
/// schedule. The reminder cell implements it to arm and cancel timers.
#[async_trait]
pub trait AppointmentEvents: Send + Sync {
    async fn appointment_booked(&self, appointment: &Appointment);

    /// Deleted, cancelled or completed.
    async fn appointment_withdrawn(&self, appointment_id: Uuid);
}

pub struct NoopEvents;

#[async_trait]
impl AppointmentEvents for NoopEvents {
    async fn appointment_booked(&self, _appointment: &Appointment) {}

    async fn appointment_withdrawn(&self, _appointment_id: Uuid) {}
}
