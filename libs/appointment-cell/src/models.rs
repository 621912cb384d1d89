use std::fmt;

use chrono::{DateTime, Duration, FixedOffset, NaiveDate, NaiveTime, TimeZone, Utc};
use serde::{Deserialize, Serialize};
use thiserror::Error;
use uuid::Uuid;

use shared_models::error::AppError;

/// How long before the start the immediate reminder goes out.
pub const IMMEDIATE_REMINDER_LEAD_MINUTES: i64 = 5;

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct Appointment {
    pub id: Uuid,
    pub patient_id: Uuid,
    pub doctor_id: Uuid,
    pub day: NaiveDate,
    #[serde(with = "clock_time")]
    pub time: NaiveTime,
    pub description: String,
    #[serde(default)]
    pub symptoms: Option<String>,
    pub room_id: String,
    pub status: AppointmentStatus,
    #[serde(default)]
    pub follow_up_notification_sent: bool,
    #[serde(default)]
    pub same_day_reminder_sent: bool,
    #[serde(default)]
    pub follow_up_instructions: Option<String>,
    #[serde(default)]
    pub follow_up_of: Option<Uuid>,
    #[serde(default)]
    pub reminder_due_at: Option<DateTime<Utc>>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl Appointment {
    /// Start instant, reading `day`/`time` as clinic wall-clock time.
    pub fn starts_at(&self, offset: FixedOffset) -> Option<DateTime<Utc>> {
        offset
            .from_local_datetime(&self.day.and_time(self.time))
            .single()
            .map(|local| local.with_timezone(&Utc))
    }

    pub fn is_participant(&self, user_id: Uuid) -> bool {
        self.patient_id == user_id || self.doctor_id == user_id
    }
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash)]
#[serde(rename_all = "snake_case")]
pub enum AppointmentStatus {
    Pending,
    Confirmed,
    Completed,
    Cancelled,
}

impl AppointmentStatus {
    /// Statuses the reminder sweeps consider.
    pub const UPCOMING: [AppointmentStatus; 2] =
        [AppointmentStatus::Pending, AppointmentStatus::Confirmed];

    pub fn is_upcoming(self) -> bool {
        Self::UPCOMING.contains(&self)
    }
}

impl fmt::Display for AppointmentStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            AppointmentStatus::Pending => write!(f, "pending"),
            AppointmentStatus::Confirmed => write!(f, "confirmed"),
            AppointmentStatus::Completed => write!(f, "completed"),
            AppointmentStatus::Cancelled => write!(f, "cancelled"),
        }
    }
}

/// Which existing rows occupy a `(doctor, day, time)` slot.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum SlotPolicy {
    /// Cancelled appointments free their slot.
    #[default]
    ActiveOnly,
    /// Every row blocks, whatever its status.
    AnyStatus,
}

impl SlotPolicy {
    pub fn blocks(self, status: AppointmentStatus) -> bool {
        match self {
            SlotPolicy::ActiveOnly => status != AppointmentStatus::Cancelled,
            SlotPolicy::AnyStatus => true,
        }
    }
}

// ==============================================================================
// REQUEST MODELS
// ==============================================================================

/// Booking payload. Every field is optional at the wire level so that missing
/// values surface as validation errors rather than extractor rejections.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct BookAppointmentRequest {
    pub doctor_id: Option<String>,
    pub day: Option<String>,
    pub time: Option<String>,
    pub description: Option<String>,
    pub symptoms: Option<String>,
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct FollowUpRequest {
    pub day: Option<String>,
    pub time: Option<String>,
    pub instructions: Option<String>,
    pub description: Option<String>,
}

/// A validated booking, ready for the slot allocator.
#[derive(Debug, Clone, PartialEq)]
pub struct NewAppointment {
    pub patient_id: Uuid,
    pub doctor_id: Uuid,
    pub day: NaiveDate,
    pub time: NaiveTime,
    pub description: String,
    pub symptoms: Option<String>,
    pub follow_up_of: Option<Uuid>,
    pub follow_up_instructions: Option<String>,
}

impl NewAppointment {
    pub fn from_request(
        patient_id: Uuid,
        request: &BookAppointmentRequest,
    ) -> Result<Self, AppointmentError> {
        let doctor_id = required(&request.doctor_id, "doctor_id")?;
        let doctor_id = Uuid::parse_str(doctor_id)
            .map_err(|_| AppointmentError::Validation(format!("doctor_id {:?} is not a valid id", doctor_id)))?;

        Ok(Self {
            patient_id,
            doctor_id,
            day: parse_day(required(&request.day, "day")?)?,
            time: parse_time(required(&request.time, "time")?)?,
            description: required(&request.description, "description")?.to_string(),
            symptoms: non_blank(&request.symptoms),
            follow_up_of: None,
            follow_up_instructions: None,
        })
    }

    pub fn follow_up(parent: &Appointment, request: &FollowUpRequest) -> Result<Self, AppointmentError> {
        let description = non_blank(&request.description)
            .unwrap_or_else(|| format!("Follow-up: {}", parent.description));

        Ok(Self {
            patient_id: parent.patient_id,
            doctor_id: parent.doctor_id,
            day: parse_day(required(&request.day, "day")?)?,
            time: parse_time(required(&request.time, "time")?)?,
            description,
            symptoms: None,
            follow_up_of: Some(parent.id),
            follow_up_instructions: non_blank(&request.instructions),
        })
    }
}

fn required<'a>(value: &'a Option<String>, field: &str) -> Result<&'a str, AppointmentError> {
    value
        .as_deref()
        .map(str::trim)
        .filter(|v| !v.is_empty())
        .ok_or_else(|| AppointmentError::Validation(format!("{} is required", field)))
}

fn non_blank(value: &Option<String>) -> Option<String> {
    value
        .as_deref()
        .map(str::trim)
        .filter(|v| !v.is_empty())
        .map(str::to_string)
}

pub fn parse_day(raw: &str) -> Result<NaiveDate, AppointmentError> {
    NaiveDate::parse_from_str(raw.trim(), "%Y-%m-%d")
        .map_err(|_| AppointmentError::Validation(format!("day {:?} must be YYYY-MM-DD", raw)))
}

pub fn parse_time(raw: &str) -> Result<NaiveTime, AppointmentError> {
    clock_time::parse(raw.trim())
        .ok_or_else(|| AppointmentError::Validation(format!("time {:?} must be HH:MM", raw)))
}

/// `HH:MM` on the wire; `HH:MM:SS` (as Postgres returns `time` columns) is
/// accepted on input.
pub mod clock_time {
    use chrono::{NaiveTime, Timelike};
    use serde::{de, Deserialize, Deserializer, Serializer};

    /// Seconds are dropped; a slot is identified by its minute.
    pub fn parse(raw: &str) -> Option<NaiveTime> {
        let time = NaiveTime::parse_from_str(raw, "%H:%M")
            .or_else(|_| NaiveTime::parse_from_str(raw, "%H:%M:%S"))
            .ok()?;
        NaiveTime::from_hms_opt(time.hour(), time.minute(), 0)
    }

    pub fn format(time: &NaiveTime) -> String {
        time.format("%H:%M").to_string()
    }

    pub fn serialize<S: Serializer>(time: &NaiveTime, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_str(&format(time))
    }

    pub fn deserialize<'de, D: Deserializer<'de>>(deserializer: D) -> Result<NaiveTime, D::Error> {
        let raw = String::deserialize(deserializer)?;
        parse(&raw).ok_or_else(|| de::Error::custom(format!("invalid time {:?}", raw)))
    }
}

/// When the immediate reminder for a visit starting at `starts_at` is due.
pub fn reminder_due(starts_at: DateTime<Utc>) -> DateTime<Utc> {
    starts_at - Duration::minutes(IMMEDIATE_REMINDER_LEAD_MINUTES)
}

// ==============================================================================
// ERRORS
// ==============================================================================

#[derive(Debug, Error)]
pub enum AppointmentError {
    #[error("Validation error: {0}")]
    Validation(String),

    #[error("Appointment not found")]
    NotFound,

    #[error("Doctor not found")]
    DoctorNotFound,

    #[error("Patient profile not found")]
    PatientNotFound,

    #[error("This time slot is already booked")]
    SlotUnavailable,

    #[error("User {user_id} has no usable contact: {reason}")]
    UnusableContact { user_id: Uuid, reason: String },

    #[error("Forbidden: {0}")]
    Forbidden(String),

    #[error("Cannot {action} an appointment that is {from}")]
    InvalidStatusTransition {
        from: AppointmentStatus,
        action: &'static str,
    },

    #[error("Database error: {0}")]
    Database(String),

    #[error("Appointment {appointment_id} was created but the confirmation could not be sent: {reason}")]
    ConfirmationFailed { appointment_id: Uuid, reason: String },

    #[error("Notification failed: {0}")]
    NotificationFailed(String),
}

impl From<shared_database::supabase::DatabaseError> for AppointmentError {
    fn from(err: shared_database::supabase::DatabaseError) -> Self {
        match err {
            shared_database::supabase::DatabaseError::Conflict(_) => AppointmentError::SlotUnavailable,
            other => AppointmentError::Database(other.to_string()),
        }
    }
}

impl From<AppointmentError> for AppError {
    fn from(err: AppointmentError) -> Self {
        let message = err.to_string();
        match err {
            AppointmentError::Validation(msg) => AppError::ValidationError(msg),
            AppointmentError::UnusableContact { .. } => AppError::ValidationError(message),
            AppointmentError::NotFound
            | AppointmentError::DoctorNotFound
            | AppointmentError::PatientNotFound => AppError::NotFound(message),
            AppointmentError::SlotUnavailable => AppError::Conflict(message),
            AppointmentError::Forbidden(msg) => AppError::Forbidden(msg),
            AppointmentError::InvalidStatusTransition { .. } => AppError::BadRequest(message),
            AppointmentError::Database(msg) => AppError::Database(msg),
            AppointmentError::ConfirmationFailed { .. } | AppointmentError::NotificationFailed(_) => {
                AppError::Internal(message)
            }
        }
    }
}
