use std::sync::Arc;

use tracing::debug;

use shared_models::contact::Contact;

use crate::models::{Channel, EmailMessage, Notification, NotificationError, SmsMessage};
use crate::services::gateway::NotificationGateway;

/// Routes a rendered notification to the channel the recipient's contact
/// allows: email addresses get the email body, phone numbers get the SMS body
/// with the country code prepended when missing.
#[derive(Clone)]
pub struct Notifier {
    gateway: Arc<dyn NotificationGateway>,
    country_code: String,
}

impl Notifier {
    pub fn new(gateway: Arc<dyn NotificationGateway>, country_code: impl Into<String>) -> Self {
        Self {
            gateway,
            country_code: country_code.into(),
        }
    }

    pub async fn deliver(
        &self,
        contact: &Contact,
        notification: &Notification,
    ) -> Result<Channel, NotificationError> {
        match contact {
            Contact::Email(address) => {
                debug!("Delivering {:?} by email to {}", notification.subject, address);
                self.gateway
                    .send_email(&EmailMessage {
                        to: address.clone(),
                        subject: notification.subject.clone(),
                        body: notification.email_body.clone(),
                    })
                    .await?;
                Ok(Channel::Email)
            }
            Contact::Phone(_) => {
                let number = contact.sms_number(&self.country_code).ok_or_else(|| {
                    NotificationError::UnsupportedRecipient(contact.to_string(), Channel::Sms)
                })?;
                debug!("Delivering {:?} by SMS to {}", notification.subject, number);
                self.gateway
                    .send_sms(&SmsMessage {
                        to: number,
                        body: notification.sms_body.clone(),
                    })
                    .await?;
                Ok(Channel::Sms)
            }
        }
    }
}
