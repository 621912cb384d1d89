use async_trait::async_trait;
use reqwest::Client;
use serde_json::json;
use tracing::{debug, error, info};

use shared_config::AppConfig;

use crate::models::{Channel, EmailMessage, NotificationError, SmsMessage};

/// Outbound email/SMS delivery. Implementations report failure through the
/// returned `Result` only; callers decide whether a failure matters.
#[async_trait]
pub trait NotificationGateway: Send + Sync {
    async fn send_email(&self, message: &EmailMessage) -> Result<(), NotificationError>;

    async fn send_sms(&self, message: &SmsMessage) -> Result<(), NotificationError>;
}

/// JSON-over-HTTP provider client: one endpoint for email, one for SMS, both
/// authenticated with a bearer key.
pub struct HttpNotificationGateway {
    client: Client,
    email_api_url: String,
    email_api_key: String,
    email_from: String,
    sms_api_url: String,
    sms_api_key: String,
    sms_sender_id: String,
}

impl HttpNotificationGateway {
    pub fn new(config: &AppConfig) -> Self {
        Self {
            client: Client::new(),
            email_api_url: config.email_api_url.clone(),
            email_api_key: config.email_api_key.clone(),
            email_from: config.email_from.clone(),
            sms_api_url: config.sms_api_url.clone(),
            sms_api_key: config.sms_api_key.clone(),
            sms_sender_id: config.sms_sender_id.clone(),
        }
    }

    async fn post(
        &self,
        channel: Channel,
        url: &str,
        api_key: &str,
        to: &str,
        body: serde_json::Value,
    ) -> Result<(), NotificationError> {
        if url.is_empty() {
            return Err(NotificationError::NotConfigured(channel));
        }

        debug!("Sending {} to {} via {}", channel, to, url);

        let response = self
            .client
            .post(url)
            .bearer_auth(api_key)
            .json(&body)
            .send()
            .await?;

        let status = response.status();
        if !status.is_success() {
            let message = response.text().await.unwrap_or_default();
            error!("{} provider returned {} for {}: {}", channel, status, to, message);
            return Err(NotificationError::Rejected {
                channel,
                to: to.to_string(),
                status: status.as_u16(),
                message,
            });
        }

        info!("{} accepted for delivery to {}", channel, to);
        Ok(())
    }
}

#[async_trait]
impl NotificationGateway for HttpNotificationGateway {
    async fn send_email(&self, message: &EmailMessage) -> Result<(), NotificationError> {
        let body = json!({
            "from": self.email_from,
            "to": message.to,
            "subject": message.subject,
            "text": message.body,
        });
        self.post(Channel::Email, &self.email_api_url, &self.email_api_key, &message.to, body)
            .await
    }

    async fn send_sms(&self, message: &SmsMessage) -> Result<(), NotificationError> {
        let body = json!({
            "sender": self.sms_sender_id,
            "to": message.to,
            "body": message.body,
        });
        self.post(Channel::Sms, &self.sms_api_url, &self.sms_api_key, &message.to, body)
            .await
    }
}

/// Writes every message to the log instead of delivering it. Used when no
/// provider is configured.
#[derive(Debug, Default)]
pub struct TracingNotificationGateway;

#[async_trait]
impl NotificationGateway for TracingNotificationGateway {
    async fn send_email(&self, message: &EmailMessage) -> Result<(), NotificationError> {
        info!(to = %message.to, subject = %message.subject, "email (not delivered, no provider)");
        Ok(())
    }

    async fn send_sms(&self, message: &SmsMessage) -> Result<(), NotificationError> {
        info!(to = %message.to, "sms (not delivered, no provider): {}", message.body);
        Ok(())
    }
}
