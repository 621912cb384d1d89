use std::sync::Arc;

use chrono::{NaiveDate, NaiveTime};
use tracing::{info, instrument, warn};
use uuid::Uuid;

use notification_cell::services::templates;
use notification_cell::Notifier;
use shared_config::AppConfig;
use shared_models::auth::{UserProfile, UserRole};
use shared_models::contact::Contact;

use crate::models::{
    parse_day, Appointment, AppointmentError, AppointmentStatus, BookAppointmentRequest,
    FollowUpRequest, NewAppointment, SlotPolicy,
};
use crate::services::directory::UserDirectory;
use crate::services::events::AppointmentEvents;
use crate::services::slots::SlotAllocator;
use crate::services::store::AppointmentStore;
use crate::services::visit::visit_details;

/// Caller identity as the service sees it.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Caller {
    pub id: Uuid,
    pub role: UserRole,
}

impl Caller {
    pub fn new(id: Uuid, role: UserRole) -> Self {
        Self { id, role }
    }
}

pub struct AppointmentBookingService {
    store: Arc<dyn AppointmentStore>,
    directory: Arc<dyn UserDirectory>,
    allocator: SlotAllocator,
    notifier: Notifier,
    events: Arc<dyn AppointmentEvents>,
    video_base_url: String,
}

impl AppointmentBookingService {
    pub fn new(
        config: &AppConfig,
        store: Arc<dyn AppointmentStore>,
        directory: Arc<dyn UserDirectory>,
        notifier: Notifier,
        events: Arc<dyn AppointmentEvents>,
    ) -> Self {
        let allocator = SlotAllocator::new(
            Arc::clone(&store),
            Arc::clone(&directory),
            config.clinic_offset(),
        );

        Self {
            store,
            directory,
            allocator,
            notifier,
            events,
            video_base_url: config.video_base_url.clone(),
        }
    }

    pub fn with_slot_policy(mut self, policy: SlotPolicy) -> Self {
        self.allocator = self.allocator.with_policy(policy);
        self
    }

    /// Books a visit for the caller. The appointment exists (and its
    /// immediate reminder is armed) before the confirmation goes out, so a
    /// failed confirmation returns `ConfirmationFailed` without rolling back.
    #[instrument(skip(self, request), fields(patient_id = %caller.id))]
    pub async fn book(
        &self,
        caller: Caller,
        request: BookAppointmentRequest,
    ) -> Result<Appointment, AppointmentError> {
        let new_appointment = NewAppointment::from_request(caller.id, &request)?;
        let patient = self.profile(caller.id, AppointmentError::PatientNotFound).await?;

        let (appointment, doctor) = self.allocator.allocate(new_appointment).await?;
        self.events.appointment_booked(&appointment).await;

        self.send_confirmation(&appointment, &patient, &doctor)
            .await
            .map_err(|reason| AppointmentError::ConfirmationFailed {
                appointment_id: appointment.id,
                reason,
            })?;

        Ok(appointment)
    }

    async fn send_confirmation(
        &self,
        appointment: &Appointment,
        patient: &UserProfile,
        doctor: &UserProfile,
    ) -> Result<(), String> {
        let visit = visit_details(appointment, patient, doctor, &self.video_base_url);

        self.notifier
            .deliver(&patient.contact, &templates::booking_confirmation_patient(&visit))
            .await
            .map_err(|e| e.to_string())?;

        // Doctors are only told directly when the booking came in by email.
        if let Contact::Email(_) = patient.contact {
            let notice = templates::booking_confirmation_doctor(&visit, patient.contact.as_str());
            self.notifier
                .deliver(&doctor.contact, &notice)
                .await
                .map_err(|e| e.to_string())?;
        }

        info!("Confirmation sent for appointment {}", appointment.id);
        Ok(())
    }

    pub async fn list_mine(&self, caller: Caller) -> Result<Vec<Appointment>, AppointmentError> {
        self.store.list_for_user(caller.id, caller.role).await
    }

    pub async fn get(&self, caller: Caller, id: Uuid) -> Result<Appointment, AppointmentError> {
        let appointment = self.load(id).await?;
        if !appointment.is_participant(caller.id) && caller.role != UserRole::Admin {
            return Err(AppointmentError::Forbidden(
                "Not authorized to view this appointment".to_string(),
            ));
        }
        Ok(appointment)
    }

    #[instrument(skip(self), fields(requester = %caller.id))]
    pub async fn delete(&self, caller: Caller, id: Uuid) -> Result<(), AppointmentError> {
        let appointment = self.load(id).await?;
        if appointment.patient_id != caller.id {
            return Err(AppointmentError::Forbidden(
                "Only the patient who booked an appointment can delete it".to_string(),
            ));
        }
        if appointment.status == AppointmentStatus::Completed {
            return Err(AppointmentError::Validation(
                "Completed appointments cannot be deleted".to_string(),
            ));
        }

        self.store.delete(id).await?;
        self.events.appointment_withdrawn(id).await;
        info!("Appointment {} deleted", id);
        Ok(())
    }

    #[instrument(skip(self), fields(doctor_id = %caller.id))]
    pub async fn mark_complete(&self, caller: Caller, id: Uuid) -> Result<Appointment, AppointmentError> {
        let appointment = self.load_as_doctor(caller, id, "complete").await?;
        if !appointment.status.is_upcoming() {
            return Err(AppointmentError::InvalidStatusTransition {
                from: appointment.status,
                action: "complete",
            });
        }

        let completed = self.store.update_status(id, AppointmentStatus::Completed).await?;
        self.events.appointment_withdrawn(id).await;
        info!("Appointment {} completed", id);

        self.notify_patient_quietly(&completed, "completion notice", templates::completion_notice)
            .await;

        Ok(completed)
    }

    pub async fn confirm(&self, caller: Caller, id: Uuid) -> Result<Appointment, AppointmentError> {
        let appointment = self.load_as_doctor(caller, id, "confirm").await?;
        if appointment.status != AppointmentStatus::Pending {
            return Err(AppointmentError::InvalidStatusTransition {
                from: appointment.status,
                action: "confirm",
            });
        }

        let confirmed = self.store.update_status(id, AppointmentStatus::Confirmed).await?;
        info!("Appointment {} confirmed", id);
        Ok(confirmed)
    }

    pub async fn cancel(&self, caller: Caller, id: Uuid) -> Result<Appointment, AppointmentError> {
        let appointment = self.load(id).await?;
        if !appointment.is_participant(caller.id) {
            return Err(AppointmentError::Forbidden(
                "Only the patient or the assigned doctor can cancel".to_string(),
            ));
        }
        if !appointment.status.is_upcoming() {
            return Err(AppointmentError::InvalidStatusTransition {
                from: appointment.status,
                action: "cancel",
            });
        }

        let cancelled = self.store.update_status(id, AppointmentStatus::Cancelled).await?;
        self.events.appointment_withdrawn(id).await;
        info!("Appointment {} cancelled by {}", id, caller.id);
        Ok(cancelled)
    }

    #[instrument(skip(self, request), fields(doctor_id = %caller.id, parent_id = %parent_id))]
    pub async fn schedule_follow_up(
        &self,
        caller: Caller,
        parent_id: Uuid,
        request: FollowUpRequest,
    ) -> Result<Appointment, AppointmentError> {
        let parent = self.load_as_doctor(caller, parent_id, "follow up").await?;
        if parent.status == AppointmentStatus::Cancelled {
            return Err(AppointmentError::InvalidStatusTransition {
                from: parent.status,
                action: "follow up",
            });
        }

        let new_appointment = NewAppointment::follow_up(&parent, &request)?;
        let (follow_up, _) = self.allocator.allocate(new_appointment).await?;
        self.events.appointment_booked(&follow_up).await;

        self.notify_patient_quietly(&follow_up, "follow-up notice", templates::follow_up_scheduled)
            .await;

        Ok(follow_up)
    }

    pub async fn available_slots(
        &self,
        doctor_id: Uuid,
        day: &str,
    ) -> Result<(NaiveDate, Vec<NaiveTime>), AppointmentError> {
        let day = parse_day(day)?;
        let slots = self.allocator.available_slots(doctor_id, day).await?;
        Ok((day, slots))
    }

    /// Tells the patient their doctor is waiting in the video room. Unlike the
    /// other notices a delivery failure is reported to the caller.
    pub async fn notify_doctor_joined(&self, caller: Caller, id: Uuid) -> Result<(), AppointmentError> {
        let appointment = self.load_as_doctor(caller, id, "join").await?;
        if !appointment.status.is_upcoming() {
            return Err(AppointmentError::InvalidStatusTransition {
                from: appointment.status,
                action: "join",
            });
        }

        let (patient, doctor) = self.participants(&appointment).await?;
        let visit = visit_details(&appointment, &patient, &doctor, &self.video_base_url);

        self.notifier
            .deliver(&patient.contact, &templates::doctor_joined(&visit))
            .await
            .map_err(|e| AppointmentError::NotificationFailed(e.to_string()))?;

        info!("Patient {} notified that doctor {} joined", patient.id, doctor.id);
        Ok(())
    }

    async fn load(&self, id: Uuid) -> Result<Appointment, AppointmentError> {
        self.store.get(id).await?.ok_or(AppointmentError::NotFound)
    }

    async fn load_as_doctor(
        &self,
        caller: Caller,
        id: Uuid,
        action: &str,
    ) -> Result<Appointment, AppointmentError> {
        let appointment = self.load(id).await?;
        if appointment.doctor_id != caller.id {
            return Err(AppointmentError::Forbidden(format!(
                "Only the assigned doctor can {} this appointment",
                action
            )));
        }
        Ok(appointment)
    }

    async fn profile(&self, id: Uuid, missing: AppointmentError) -> Result<UserProfile, AppointmentError> {
        self.directory.find_by_id(id).await?.ok_or(missing)
    }

    async fn participants(
        &self,
        appointment: &Appointment,
    ) -> Result<(UserProfile, UserProfile), AppointmentError> {
        let patient = self.profile(appointment.patient_id, AppointmentError::PatientNotFound).await?;
        let doctor = self.profile(appointment.doctor_id, AppointmentError::DoctorNotFound).await?;
        Ok((patient, doctor))
    }

    async fn notify_patient_quietly<F>(&self, appointment: &Appointment, what: &str, render: F)
    where
        F: Fn(&notification_cell::VisitDetails) -> notification_cell::Notification,
    {
        let (patient, doctor) = match self.participants(appointment).await {
            Ok(pair) => pair,
            Err(e) => {
                warn!("Skipping {} for appointment {}: {}", what, appointment.id, e);
                return;
            }
        };

        let visit = visit_details(appointment, &patient, &doctor, &self.video_base_url);
        if let Err(e) = self.notifier.deliver(&patient.contact, &render(&visit)).await {
            warn!("Failed to send {} for appointment {}: {}", what, appointment.id, e);
        }
    }
}
