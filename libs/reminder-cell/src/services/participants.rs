use uuid::Uuid;

use appointment_cell::{Appointment, UserDirectory};
use shared_models::auth::UserProfile;

use crate::models::ReminderError;

async fn profile(directory: &dyn UserDirectory, id: Uuid) -> Result<UserProfile, ReminderError> {
    directory
        .find_by_id(id)
        .await?
        .ok_or(ReminderError::MissingProfile(id))
}

pub async fn patient_of(
    directory: &dyn UserDirectory,
    appointment: &Appointment,
) -> Result<UserProfile, ReminderError> {
    profile(directory, appointment.patient_id).await
}

pub async fn doctor_of(
    directory: &dyn UserDirectory,
    appointment: &Appointment,
) -> Result<UserProfile, ReminderError> {
    profile(directory, appointment.doctor_id).await
}
