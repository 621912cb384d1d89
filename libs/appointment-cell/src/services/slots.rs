use std::collections::HashSet;
use std::sync::Arc;

use chrono::{Duration, FixedOffset, NaiveDate, NaiveTime, Utc};
use tracing::{debug, info, instrument, warn};
use uuid::Uuid;

use shared_models::auth::{UserProfile, UserRole};

use crate::models::{reminder_due, Appointment, AppointmentError, AppointmentStatus, NewAppointment, SlotPolicy};
use crate::services::directory::UserDirectory;
use crate::services::room::generate_room_id;
use crate::services::store::AppointmentStore;

/// Bookable grid of a clinic day: `[open, close)` in fixed steps.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct BusinessHours {
    pub open: NaiveTime,
    pub close: NaiveTime,
    pub step_minutes: i64,
}

impl Default for BusinessHours {
    fn default() -> Self {
        Self {
            open: NaiveTime::from_hms_opt(9, 0, 0).unwrap_or(NaiveTime::MIN),
            close: NaiveTime::from_hms_opt(17, 0, 0).unwrap_or(NaiveTime::MIN),
            step_minutes: 30,
        }
    }
}

impl BusinessHours {
    pub fn grid(&self) -> Vec<NaiveTime> {
        let mut slots = Vec::new();
        if self.step_minutes <= 0 {
            return slots;
        }

        let mut current = self.open;
        while current < self.close {
            slots.push(current);
            let (next, wrapped) = current.overflowing_add_signed(Duration::minutes(self.step_minutes));
            if wrapped != 0 {
                break;
            }
            current = next;
        }
        slots
    }
}

/// Creates appointments without double-booking a doctor.
pub struct SlotAllocator {
    store: Arc<dyn AppointmentStore>,
    directory: Arc<dyn UserDirectory>,
    policy: SlotPolicy,
    hours: BusinessHours,
    offset: FixedOffset,
}

impl SlotAllocator {
    pub fn new(
        store: Arc<dyn AppointmentStore>,
        directory: Arc<dyn UserDirectory>,
        offset: FixedOffset,
    ) -> Self {
        Self {
            store,
            directory,
            policy: SlotPolicy::default(),
            hours: BusinessHours::default(),
            offset,
        }
    }

    pub fn with_policy(mut self, policy: SlotPolicy) -> Self {
        self.policy = policy;
        self
    }

    pub async fn require_doctor(&self, doctor_id: Uuid) -> Result<UserProfile, AppointmentError> {
        self.directory
            .find_with_role(doctor_id, UserRole::Doctor)
            .await?
            .ok_or(AppointmentError::DoctorNotFound)
    }

    /// Books the slot and returns the stored appointment with the doctor's
    /// profile. Losing a race for the slot yields `SlotUnavailable`.
    #[instrument(skip(self, request), fields(doctor_id = %request.doctor_id, day = %request.day, time = %request.time))]
    pub async fn allocate(
        &self,
        request: NewAppointment,
    ) -> Result<(Appointment, UserProfile), AppointmentError> {
        let doctor = self.require_doctor(request.doctor_id).await?;

        let existing = self.store.find_for_doctor_on(request.doctor_id, request.day).await?;
        if existing
            .iter()
            .any(|a| a.time == request.time && self.policy.blocks(a.status))
        {
            warn!("Slot already booked");
            return Err(AppointmentError::SlotUnavailable);
        }

        let now = Utc::now();
        let mut appointment = Appointment {
            id: Uuid::new_v4(),
            patient_id: request.patient_id,
            doctor_id: request.doctor_id,
            day: request.day,
            time: request.time,
            description: request.description,
            symptoms: request.symptoms,
            room_id: generate_room_id(),
            status: AppointmentStatus::Pending,
            follow_up_notification_sent: false,
            same_day_reminder_sent: false,
            follow_up_instructions: request.follow_up_instructions,
            follow_up_of: request.follow_up_of,
            reminder_due_at: None,
            created_at: now,
            updated_at: now,
        };
        appointment.reminder_due_at = appointment.starts_at(self.offset).map(reminder_due);

        let stored = self.store.insert_if_free(appointment, self.policy).await?;
        info!("Appointment {} booked in room {}", stored.id, stored.room_id);

        Ok((stored, doctor))
    }

    /// Grid times for `day` not taken under the current policy.
    pub async fn available_slots(
        &self,
        doctor_id: Uuid,
        day: NaiveDate,
    ) -> Result<Vec<NaiveTime>, AppointmentError> {
        self.require_doctor(doctor_id).await?;

        let booked: HashSet<NaiveTime> = self
            .store
            .find_for_doctor_on(doctor_id, day)
            .await?
            .into_iter()
            .filter(|a| self.policy.blocks(a.status))
            .map(|a| a.time)
            .collect();

        let free: Vec<NaiveTime> = self
            .hours
            .grid()
            .into_iter()
            .filter(|slot| !booked.contains(slot))
            .collect();

        debug!("{} of {} slots free for doctor {} on {}", free.len(), self.hours.grid().len(), doctor_id, day);
        Ok(free)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_grid_is_nine_to_five_half_hourly() {
        let grid = BusinessHours::default().grid();
        assert_eq!(grid.len(), 16);
        assert_eq!(grid.first(), NaiveTime::from_hms_opt(9, 0, 0).as_ref());
        assert_eq!(grid.last(), NaiveTime::from_hms_opt(16, 30, 0).as_ref());
    }

    #[test]
    fn test_grid_stops_at_midnight() {
        let hours = BusinessHours {
            open: NaiveTime::from_hms_opt(23, 0, 0).unwrap(),
            close: NaiveTime::from_hms_opt(23, 59, 0).unwrap(),
            step_minutes: 45,
        };
        assert_eq!(hours.grid().len(), 2);
    }
}
