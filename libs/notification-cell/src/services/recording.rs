use std::collections::HashSet;
use std::sync::Mutex;

use async_trait::async_trait;

use crate::models::{Channel, EmailMessage, NotificationError, SmsMessage};
use crate::services::gateway::NotificationGateway;

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SentMessage {
    pub channel: Channel,
    pub to: String,
    pub subject: Option<String>,
    pub body: String,
}

/// In-process gateway that keeps every accepted message. Recipients marked
/// with [`fail_for`](Self::fail_for) are rejected instead.
#[derive(Debug, Default)]
pub struct RecordingGateway {
    sent: Mutex<Vec<SentMessage>>,
    failing: Mutex<HashSet<String>>,
}

impl RecordingGateway {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn fail_for(&self, recipient: impl Into<String>) {
        if let Ok(mut failing) = self.failing.lock() {
            failing.insert(recipient.into());
        }
    }

    pub fn sent(&self) -> Vec<SentMessage> {
        self.sent.lock().map(|s| s.clone()).unwrap_or_default()
    }

    pub fn sent_to(&self, recipient: &str) -> Vec<SentMessage> {
        self.sent()
            .into_iter()
            .filter(|m| m.to == recipient)
            .collect()
    }

    pub fn count(&self) -> usize {
        self.sent.lock().map(|s| s.len()).unwrap_or(0)
    }

    pub fn clear(&self) {
        if let Ok(mut sent) = self.sent.lock() {
            sent.clear();
        }
    }

    fn record(&self, message: SentMessage) -> Result<(), NotificationError> {
        let rejected = self
            .failing
            .lock()
            .map(|f| f.contains(&message.to))
            .unwrap_or(false);
        if rejected {
            return Err(NotificationError::Delivery(format!(
                "{} to {} rejected",
                message.channel, message.to
            )));
        }

        self.sent
            .lock()
            .map_err(|e| NotificationError::Delivery(e.to_string()))?
            .push(message);
        Ok(())
    }
}

#[async_trait]
impl NotificationGateway for RecordingGateway {
    async fn send_email(&self, message: &EmailMessage) -> Result<(), NotificationError> {
        self.record(SentMessage {
            channel: Channel::Email,
            to: message.to.clone(),
            subject: Some(message.subject.clone()),
            body: message.body.clone(),
        })
    }

    async fn send_sms(&self, message: &SmsMessage) -> Result<(), NotificationError> {
        self.record(SentMessage {
            channel: Channel::Sms,
            to: message.to.clone(),
            subject: None,
            body: message.body.clone(),
        })
    }
}
