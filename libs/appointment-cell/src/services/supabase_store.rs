use std::sync::Arc;

use async_trait::async_trait;
use chrono::{NaiveDate, NaiveTime, Utc};
use reqwest::Method;
use serde_json::{json, Value};
use tracing::{debug, warn};
use uuid::Uuid;

use shared_database::supabase::SupabaseClient;
use shared_models::auth::UserRole;

use crate::models::{Appointment, AppointmentError, AppointmentStatus, SlotPolicy};
use crate::services::store::AppointmentStore;

const TABLE: &str = "/rest/v1/appointments";

/// PostgREST-backed store. Slot uniqueness for active rows comes from the
/// `appointments_active_slot_idx` partial unique index; a violation arrives
/// as HTTP 409.
pub struct SupabaseAppointmentStore {
    supabase: Arc<SupabaseClient>,
}

impl SupabaseAppointmentStore {
    pub fn new(supabase: Arc<SupabaseClient>) -> Self {
        Self { supabase }
    }

    async fn select(&self, query: &str) -> Result<Vec<Appointment>, AppointmentError> {
        let path = format!("{}?{}", TABLE, query);
        debug!("Querying appointments: {}", query);
        Ok(self.supabase.request(Method::GET, &path, None, None).await?)
    }

    async fn patch(&self, id: Uuid, changes: Value) -> Result<Appointment, AppointmentError> {
        let path = format!("{}?id=eq.{}", TABLE, id);
        let rows: Vec<Appointment> = self
            .supabase
            .request_with_headers(
                Method::PATCH,
                &path,
                None,
                Some(changes),
                Some(SupabaseClient::return_representation()),
            )
            .await?;

        rows.into_iter().next().ok_or(AppointmentError::NotFound)
    }
}

fn pg_time(time: NaiveTime) -> String {
    time.format("%H:%M:%S").to_string()
}

fn status_list(statuses: &[AppointmentStatus]) -> String {
    statuses
        .iter()
        .map(ToString::to_string)
        .collect::<Vec<_>>()
        .join(",")
}

#[async_trait]
impl AppointmentStore for SupabaseAppointmentStore {
    async fn insert_if_free(
        &self,
        appointment: Appointment,
        policy: SlotPolicy,
    ) -> Result<Appointment, AppointmentError> {
        // The index only covers active rows; cancelled ones are checked here.
        if policy == SlotPolicy::AnyStatus {
            let existing = self
                .select(&format!(
                    "doctor_id=eq.{}&day=eq.{}&time=eq.{}&limit=1",
                    appointment.doctor_id,
                    appointment.day,
                    pg_time(appointment.time)
                ))
                .await?;
            if !existing.is_empty() {
                return Err(AppointmentError::SlotUnavailable);
            }
        }

        let body = serde_json::to_value(&appointment)
            .map_err(|e| AppointmentError::Database(e.to_string()))?;

        let rows: Vec<Appointment> = self
            .supabase
            .request_with_headers(
                Method::POST,
                TABLE,
                None,
                Some(body),
                Some(SupabaseClient::return_representation()),
            )
            .await
            .map_err(|e| {
                let err = AppointmentError::from(e);
                if matches!(err, AppointmentError::SlotUnavailable) {
                    warn!(
                        "Slot {} {} for doctor {} taken concurrently",
                        appointment.day, appointment.time, appointment.doctor_id
                    );
                }
                err
            })?;

        rows.into_iter()
            .next()
            .ok_or_else(|| AppointmentError::Database("Insert returned no row".to_string()))
    }

    async fn get(&self, id: Uuid) -> Result<Option<Appointment>, AppointmentError> {
        let rows = self.select(&format!("id=eq.{}&limit=1", id)).await?;
        Ok(rows.into_iter().next())
    }

    async fn find_for_doctor_on(
        &self,
        doctor_id: Uuid,
        day: NaiveDate,
    ) -> Result<Vec<Appointment>, AppointmentError> {
        self.select(&format!("doctor_id=eq.{}&day=eq.{}&order=time.asc", doctor_id, day))
            .await
    }

    async fn list_for_user(
        &self,
        user_id: Uuid,
        role: UserRole,
    ) -> Result<Vec<Appointment>, AppointmentError> {
        let column = match role {
            UserRole::Doctor => "doctor_id",
            _ => "patient_id",
        };
        self.select(&format!("{}=eq.{}&order=day.desc,time.desc", column, user_id))
            .await
    }

    async fn find_by_day(
        &self,
        day: NaiveDate,
        statuses: &[AppointmentStatus],
    ) -> Result<Vec<Appointment>, AppointmentError> {
        self.select(&format!(
            "day=eq.{}&status=in.({})&order=time.asc,created_at.asc",
            day,
            status_list(statuses)
        ))
        .await
    }

    async fn find_upcoming(&self, from_day: NaiveDate) -> Result<Vec<Appointment>, AppointmentError> {
        self.select(&format!(
            "day=gte.{}&status=in.({})&order=day.asc,time.asc",
            from_day,
            status_list(&AppointmentStatus::UPCOMING)
        ))
        .await
    }

    async fn update_status(
        &self,
        id: Uuid,
        status: AppointmentStatus,
    ) -> Result<Appointment, AppointmentError> {
        self.patch(id, json!({ "status": status, "updated_at": Utc::now() }))
            .await
    }

    async fn mark_follow_up_notified(&self, id: Uuid) -> Result<(), AppointmentError> {
        self.patch(
            id,
            json!({ "follow_up_notification_sent": true, "updated_at": Utc::now() }),
        )
        .await
        .map(|_| ())
    }

    async fn mark_same_day_notified(&self, id: Uuid) -> Result<(), AppointmentError> {
        self.patch(
            id,
            json!({ "same_day_reminder_sent": true, "updated_at": Utc::now() }),
        )
        .await
        .map(|_| ())
    }

    async fn delete(&self, id: Uuid) -> Result<(), AppointmentError> {
        let path = format!("{}?id=eq.{}", TABLE, id);
        let deleted: Vec<Value> = self
            .supabase
            .request_with_headers(
                Method::DELETE,
                &path,
                None,
                None,
                Some(SupabaseClient::return_representation()),
            )
            .await?;

        if deleted.is_empty() {
            return Err(AppointmentError::NotFound);
        }
        Ok(())
    }
}
