use notification_cell::VisitDetails;
use shared_models::auth::UserProfile;

use crate::models::{clock_time, Appointment};
use crate::services::room::video_room_url;

/// Template data for one appointment and its two participants.
pub fn visit_details(
    appointment: &Appointment,
    patient: &UserProfile,
    doctor: &UserProfile,
    video_base_url: &str,
) -> VisitDetails {
    VisitDetails {
        patient_name: patient.name.clone(),
        doctor_name: doctor.name.trim_start_matches("Dr. ").to_string(),
        speciality: doctor.speciality.clone(),
        day: appointment.day.format("%Y-%m-%d").to_string(),
        time: clock_time::format(&appointment.time),
        description: appointment.description.clone(),
        symptoms: appointment.symptoms.clone(),
        room_id: appointment.room_id.clone(),
        room_url: video_room_url(video_base_url, &appointment.room_id),
        instructions: appointment.follow_up_instructions.clone(),
    }
}
