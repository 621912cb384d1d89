use std::collections::HashMap;

use async_trait::async_trait;
use chrono::{NaiveDate, NaiveTime, Utc};
use tokio::sync::RwLock;
use tracing::debug;
use uuid::Uuid;

use shared_models::auth::UserRole;

use crate::models::{Appointment, AppointmentError, AppointmentStatus, SlotPolicy};

/// Persistence for appointments. `insert_if_free` is the only way rows are
/// created and must check the slot and insert as one step.
#[async_trait]
pub trait AppointmentStore: Send + Sync {
    async fn insert_if_free(
        &self,
        appointment: Appointment,
        policy: SlotPolicy,
    ) -> Result<Appointment, AppointmentError>;

    async fn get(&self, id: Uuid) -> Result<Option<Appointment>, AppointmentError>;

    /// All rows for a doctor on a day, any status.
    async fn find_for_doctor_on(
        &self,
        doctor_id: Uuid,
        day: NaiveDate,
    ) -> Result<Vec<Appointment>, AppointmentError>;

    /// Doctors see the appointments assigned to them, everyone else the ones
    /// they booked. Newest first.
    async fn list_for_user(
        &self,
        user_id: Uuid,
        role: UserRole,
    ) -> Result<Vec<Appointment>, AppointmentError>;

    /// Rows on `day` whose status is in `statuses`, ordered by time.
    async fn find_by_day(
        &self,
        day: NaiveDate,
        statuses: &[AppointmentStatus],
    ) -> Result<Vec<Appointment>, AppointmentError>;

    /// Pending or confirmed rows on or after `from_day`.
    async fn find_upcoming(&self, from_day: NaiveDate) -> Result<Vec<Appointment>, AppointmentError>;

    async fn update_status(
        &self,
        id: Uuid,
        status: AppointmentStatus,
    ) -> Result<Appointment, AppointmentError>;

    async fn mark_follow_up_notified(&self, id: Uuid) -> Result<(), AppointmentError>;

    async fn mark_same_day_notified(&self, id: Uuid) -> Result<(), AppointmentError>;

    async fn delete(&self, id: Uuid) -> Result<(), AppointmentError>;
}

/// Newest first: day descending, then time descending.
pub fn sort_newest_first(appointments: &mut [Appointment]) {
    appointments.sort_by(|a, b| (b.day, b.time).cmp(&(a.day, a.time)));
}

fn occupies(existing: &Appointment, doctor_id: Uuid, day: NaiveDate, time: NaiveTime) -> bool {
    existing.doctor_id == doctor_id && existing.day == day && existing.time == time
}

#[derive(Default)]
pub struct InMemoryAppointmentStore {
    rows: RwLock<HashMap<Uuid, Appointment>>,
}

impl InMemoryAppointmentStore {
    pub fn new() -> Self {
        Self::default()
    }

    async fn modify<F>(&self, id: Uuid, apply: F) -> Result<Appointment, AppointmentError>
    where
        F: FnOnce(&mut Appointment) + Send,
    {
        let mut rows = self.rows.write().await;
        let row = rows.get_mut(&id).ok_or(AppointmentError::NotFound)?;
        apply(row);
        row.updated_at = Utc::now();
        Ok(row.clone())
    }
}

#[async_trait]
impl AppointmentStore for InMemoryAppointmentStore {
    async fn insert_if_free(
        &self,
        appointment: Appointment,
        policy: SlotPolicy,
    ) -> Result<Appointment, AppointmentError> {
        let mut rows = self.rows.write().await;

        let taken = rows.values().any(|existing| {
            occupies(existing, appointment.doctor_id, appointment.day, appointment.time)
                && policy.blocks(existing.status)
        });
        if taken {
            return Err(AppointmentError::SlotUnavailable);
        }

        rows.insert(appointment.id, appointment.clone());
        debug!("Stored appointment {}", appointment.id);
        Ok(appointment)
    }

    async fn get(&self, id: Uuid) -> Result<Option<Appointment>, AppointmentError> {
        Ok(self.rows.read().await.get(&id).cloned())
    }

    async fn find_for_doctor_on(
        &self,
        doctor_id: Uuid,
        day: NaiveDate,
    ) -> Result<Vec<Appointment>, AppointmentError> {
        let rows = self.rows.read().await;
        let mut found: Vec<Appointment> = rows
            .values()
            .filter(|a| a.doctor_id == doctor_id && a.day == day)
            .cloned()
            .collect();
        found.sort_by_key(|a| a.time);
        Ok(found)
    }

    async fn list_for_user(
        &self,
        user_id: Uuid,
        role: UserRole,
    ) -> Result<Vec<Appointment>, AppointmentError> {
        let rows = self.rows.read().await;
        let mut found: Vec<Appointment> = rows
            .values()
            .filter(|a| match role {
                UserRole::Doctor => a.doctor_id == user_id,
                _ => a.patient_id == user_id,
            })
            .cloned()
            .collect();
        sort_newest_first(&mut found);
        Ok(found)
    }

    async fn find_by_day(
        &self,
        day: NaiveDate,
        statuses: &[AppointmentStatus],
    ) -> Result<Vec<Appointment>, AppointmentError> {
        let rows = self.rows.read().await;
        let mut found: Vec<Appointment> = rows
            .values()
            .filter(|a| a.day == day && statuses.contains(&a.status))
            .cloned()
            .collect();
        found.sort_by_key(|a| (a.time, a.created_at));
        Ok(found)
    }

    async fn find_upcoming(&self, from_day: NaiveDate) -> Result<Vec<Appointment>, AppointmentError> {
        let rows = self.rows.read().await;
        let mut found: Vec<Appointment> = rows
            .values()
            .filter(|a| a.day >= from_day && a.status.is_upcoming())
            .cloned()
            .collect();
        found.sort_by_key(|a| (a.day, a.time));
        Ok(found)
    }

    async fn update_status(
        &self,
        id: Uuid,
        status: AppointmentStatus,
    ) -> Result<Appointment, AppointmentError> {
        self.modify(id, |a| a.status = status).await
    }

    async fn mark_follow_up_notified(&self, id: Uuid) -> Result<(), AppointmentError> {
        self.modify(id, |a| a.follow_up_notification_sent = true).await.map(|_| ())
    }

    async fn mark_same_day_notified(&self, id: Uuid) -> Result<(), AppointmentError> {
        self.modify(id, |a| a.same_day_reminder_sent = true).await.map(|_| ())
    }

    async fn delete(&self, id: Uuid) -> Result<(), AppointmentError> {
        self.rows
            .write()
            .await
            .remove(&id)
            .map(|_| ())
            .ok_or(AppointmentError::NotFound)
    }
}
