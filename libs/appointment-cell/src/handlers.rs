// libs/appointment-cell/src/handlers.rs
use std::sync::Arc;

use axum::{
    extract::{Extension, Path, State},
    http::StatusCode,
    Json,
};
use serde_json::{json, Value};
use uuid::Uuid;

use shared_config::AppConfig;
use shared_models::auth::User;
use shared_models::error::AppError;
use shared_utils::extractor::caller_id;

use crate::models::{clock_time, BookAppointmentRequest, FollowUpRequest};
use crate::services::booking::{AppointmentBookingService, Caller};

pub struct AppointmentState {
    pub config: Arc<AppConfig>,
    pub booking: Arc<AppointmentBookingService>,
}

impl AppointmentState {
    pub fn new(config: Arc<AppConfig>, booking: Arc<AppointmentBookingService>) -> Arc<Self> {
        Arc::new(Self { config, booking })
    }
}

fn caller(user: &User) -> Result<Caller, AppError> {
    Ok(Caller::new(caller_id(user)?, user.user_role()))
}

fn parse_id(raw: &str) -> Result<Uuid, AppError> {
    Uuid::parse_str(raw).map_err(|_| AppError::BadRequest(format!("Invalid appointment id: {}", raw)))
}

// ==============================================================================
// BOOKING
// ==============================================================================

#[axum::debug_handler]
pub async fn book_appointment(
    State(state): State<Arc<AppointmentState>>,
    Extension(user): Extension<User>,
    Json(request): Json<BookAppointmentRequest>,
) -> Result<(StatusCode, Json<Value>), AppError> {
    let appointment = state.booking.book(caller(&user)?, request).await?;

    Ok((
        StatusCode::CREATED,
        Json(json!({
            "success": true,
            "message": "Appointment booked successfully",
            "appointment": appointment
        })),
    ))
}

pub async fn get_my_appointments(
    State(state): State<Arc<AppointmentState>>,
    Extension(user): Extension<User>,
) -> Result<Json<Value>, AppError> {
    let appointments = state.booking.list_mine(caller(&user)?).await?;

    Ok(Json(json!({
        "success": true,
        "count": appointments.len(),
        "appointments": appointments
    })))
}

pub async fn get_appointment(
    State(state): State<Arc<AppointmentState>>,
    Path(appointment_id): Path<String>,
    Extension(user): Extension<User>,
) -> Result<Json<Value>, AppError> {
    let appointment = state
        .booking
        .get(caller(&user)?, parse_id(&appointment_id)?)
        .await?;

    Ok(Json(json!({
        "success": true,
        "appointment": appointment
    })))
}

pub async fn delete_appointment(
    State(state): State<Arc<AppointmentState>>,
    Path(appointment_id): Path<String>,
    Extension(user): Extension<User>,
) -> Result<Json<Value>, AppError> {
    state
        .booking
        .delete(caller(&user)?, parse_id(&appointment_id)?)
        .await?;

    Ok(Json(json!({
        "success": true,
        "message": "Appointment deleted successfully"
    })))
}

// ==============================================================================
// DOCTOR ACTIONS
// ==============================================================================

pub async fn complete_appointment(
    State(state): State<Arc<AppointmentState>>,
    Path(appointment_id): Path<String>,
    Extension(user): Extension<User>,
) -> Result<Json<Value>, AppError> {
    let appointment = state
        .booking
        .mark_complete(caller(&user)?, parse_id(&appointment_id)?)
        .await?;

    Ok(Json(json!({
        "success": true,
        "message": "Appointment marked as completed successfully",
        "appointment": appointment
    })))
}

pub async fn confirm_appointment(
    State(state): State<Arc<AppointmentState>>,
    Path(appointment_id): Path<String>,
    Extension(user): Extension<User>,
) -> Result<Json<Value>, AppError> {
    let appointment = state
        .booking
        .confirm(caller(&user)?, parse_id(&appointment_id)?)
        .await?;

    Ok(Json(json!({
        "success": true,
        "message": "Appointment confirmed",
        "appointment": appointment
    })))
}

pub async fn cancel_appointment(
    State(state): State<Arc<AppointmentState>>,
    Path(appointment_id): Path<String>,
    Extension(user): Extension<User>,
) -> Result<Json<Value>, AppError> {
    let appointment = state
        .booking
        .cancel(caller(&user)?, parse_id(&appointment_id)?)
        .await?;

    Ok(Json(json!({
        "success": true,
        "message": "Appointment cancelled",
        "appointment": appointment
    })))
}

#[axum::debug_handler]
pub async fn schedule_follow_up(
    State(state): State<Arc<AppointmentState>>,
    Path(appointment_id): Path<String>,
    Extension(user): Extension<User>,
    Json(request): Json<FollowUpRequest>,
) -> Result<(StatusCode, Json<Value>), AppError> {
    let follow_up = state
        .booking
        .schedule_follow_up(caller(&user)?, parse_id(&appointment_id)?, request)
        .await?;

    Ok((
        StatusCode::CREATED,
        Json(json!({
            "success": true,
            "message": "Follow-up appointment scheduled",
            "appointment": follow_up
        })),
    ))
}

pub async fn doctor_joined(
    State(state): State<Arc<AppointmentState>>,
    Path(appointment_id): Path<String>,
    Extension(user): Extension<User>,
) -> Result<Json<Value>, AppError> {
    state
        .booking
        .notify_doctor_joined(caller(&user)?, parse_id(&appointment_id)?)
        .await?;

    Ok(Json(json!({
        "success": true,
        "message": "Patient notified that the doctor has joined"
    })))
}

// ==============================================================================
// PUBLIC
// ==============================================================================

pub async fn get_available_slots(
    State(state): State<Arc<AppointmentState>>,
    Path((doctor_id, date)): Path<(String, String)>,
) -> Result<Json<Value>, AppError> {
    let doctor_id = Uuid::parse_str(&doctor_id)
        .map_err(|_| AppError::BadRequest(format!("Invalid doctor id: {}", doctor_id)))?;

    let (day, slots) = state.booking.available_slots(doctor_id, &date).await?;
    let slots: Vec<String> = slots.iter().map(clock_time::format).collect();

    Ok(Json(json!({
        "success": true,
        "doctor_id": doctor_id,
        "date": day,
        "available_slots": slots
    })))
}
