use std::fmt;

use serde::{Deserialize, Serialize};
use thiserror::Error;

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct EmailMessage {
    pub to: String,
    pub subject: String,
    pub body: String,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct SmsMessage {
    pub to: String,
    pub body: String,
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash)]
#[serde(rename_all = "snake_case")]
pub enum Channel {
    Email,
    Sms,
}

impl fmt::Display for Channel {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Channel::Email => write!(f, "email"),
            Channel::Sms => write!(f, "sms"),
        }
    }
}

/// A message rendered for both channels; the recipient's contact decides
/// which variant goes out.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Notification {
    pub subject: String,
    pub email_body: String,
    pub sms_body: String,
}

/// Everything the templates need to know about a visit.
#[derive(Debug, Clone, Default)]
pub struct VisitDetails {
    pub patient_name: String,
    pub doctor_name: String,
    pub speciality: Option<String>,
    pub day: String,
    pub time: String,
    pub description: String,
    pub symptoms: Option<String>,
    pub room_id: String,
    pub room_url: String,
    pub instructions: Option<String>,
}

#[derive(Debug, Error)]
pub enum NotificationError {
    #[error("Notification provider is not configured for {0}")]
    NotConfigured(Channel),

    #[error("Notification provider rejected {channel} to {to}: HTTP {status}: {message}")]
    Rejected {
        channel: Channel,
        to: String,
        status: u16,
        message: String,
    },

    #[error("Notification transport error: {0}")]
    Transport(#[from] reqwest::Error),

    #[error("Recipient {0} cannot receive {1}")]
    UnsupportedRecipient(String, Channel),

    #[error("Delivery failed: {0}")]
    Delivery(String),
}
