use std::env;
use std::str::FromStr;

use chrono::{FixedOffset, NaiveTime, Offset, Utc};
use tracing::warn;

#[derive(Debug, Clone)]
pub struct AppConfig {
    pub supabase_url: String,
    pub supabase_anon_key: String,
    pub supabase_jwt_secret: String,
    pub supabase_service_role_key: String,
    pub video_base_url: String,
    pub email_api_url: String,
    pub email_api_key: String,
    pub email_from: String,
    pub sms_api_url: String,
    pub sms_api_key: String,
    pub sms_sender_id: String,
    pub sms_country_code: String,
    pub clinic_utc_offset_minutes: i32,
    pub day_ahead_reminder_times: Vec<NaiveTime>,
    pub same_day_reminder_times: Vec<NaiveTime>,
    pub reminder_throttle_ms: u64,
    pub server_port: u16,
}

impl AppConfig {
    pub fn from_env() -> Self {
        let config = Self {
            supabase_url: env::var("SUPABASE_URL")
                .unwrap_or_else(|_| {
                    warn!("SUPABASE_URL not set, using empty value");
                    String::new()
                }),
            supabase_anon_key: env::var("SUPABASE_ANON_PUBLIC_KEY")
                .unwrap_or_else(|_| {
                    warn!("SUPABASE_ANON_PUBLIC_KEY not set, using empty value");
                    String::new()
                }),
            supabase_jwt_secret: env::var("SUPABASE_JWT_SECRET")
                .unwrap_or_else(|_| {
                    warn!("SUPABASE_JWT_SECRET not set, using empty value");
                    String::new()
                }),
            supabase_service_role_key: env::var("SUPABASE_SERVICE_ROLE_KEY")
                .unwrap_or_else(|_| {
                    warn!("SUPABASE_SERVICE_ROLE_KEY not set, using empty value");
                    String::new()
                }),
            video_base_url: env::var("VIDEO_BASE_URL")
                .unwrap_or_else(|_| {
                    warn!("VIDEO_BASE_URL not set, using default");
                    "https://video.localhost".to_string()
                }),
            email_api_url: env::var("EMAIL_API_URL")
                .unwrap_or_else(|_| {
                    warn!("EMAIL_API_URL not set, using empty value");
                    String::new()
                }),
            email_api_key: env::var("EMAIL_API_KEY").unwrap_or_default(),
            email_from: env::var("EMAIL_FROM")
                .unwrap_or_else(|_| "TeleConnect <no-reply@teleconnect.local>".to_string()),
            sms_api_url: env::var("SMS_API_URL")
                .unwrap_or_else(|_| {
                    warn!("SMS_API_URL not set, using empty value");
                    String::new()
                }),
            sms_api_key: env::var("SMS_API_KEY").unwrap_or_default(),
            sms_sender_id: env::var("SMS_SENDER_ID").unwrap_or_else(|_| "TLCNCT".to_string()),
            sms_country_code: env::var("SMS_COUNTRY_CODE").unwrap_or_else(|_| "+91".to_string()),
            clinic_utc_offset_minutes: parse_or("CLINIC_UTC_OFFSET_MINUTES", 330),
            day_ahead_reminder_times: times_or("DAY_AHEAD_REMINDER_TIMES", "09:00"),
            same_day_reminder_times: times_or(
                "SAME_DAY_REMINDER_TIMES",
                "09:00,11:00,13:00,15:00,17:00",
            ),
            reminder_throttle_ms: parse_or("REMINDER_THROTTLE_MS", 1000),
            server_port: parse_or("SERVER_PORT", 3000),
        };

        if !config.is_configured() {
            warn!("Application not fully configured - missing environment variables");
        }

        config
    }

    pub fn is_configured(&self) -> bool {
        !self.supabase_url.is_empty()
            && !self.supabase_anon_key.is_empty()
            && !self.supabase_jwt_secret.is_empty()
    }

    pub fn is_notification_configured(&self) -> bool {
        !self.email_api_url.is_empty() && !self.sms_api_url.is_empty()
    }

    /// The clinic's wall-clock offset. Out-of-range values fall back to UTC.
    pub fn clinic_offset(&self) -> FixedOffset {
        FixedOffset::east_opt(self.clinic_utc_offset_minutes * 60).unwrap_or_else(|| {
            warn!(
                "CLINIC_UTC_OFFSET_MINUTES {} out of range, using UTC",
                self.clinic_utc_offset_minutes
            );
            Utc.fix()
        })
    }
}

fn parse_or<T>(key: &str, default: T) -> T
where
    T: FromStr + std::fmt::Display,
{
    match env::var(key) {
        Ok(raw) => raw.trim().parse().unwrap_or_else(|_| {
            warn!("{} has invalid value {:?}, using default {}", key, raw, default);
            default
        }),
        Err(_) => default,
    }
}

/// Parses a comma separated list of `HH:MM` times.
pub fn parse_times(raw: &str) -> Result<Vec<NaiveTime>, String> {
    let mut times = raw
        .split(',')
        .map(str::trim)
        .filter(|part| !part.is_empty())
        .map(|part| {
            NaiveTime::parse_from_str(part, "%H:%M")
                .map_err(|e| format!("invalid time {:?}: {}", part, e))
        })
        .collect::<Result<Vec<_>, _>>()?;

    if times.is_empty() {
        return Err("at least one time is required".to_string());
    }

    times.sort();
    times.dedup();
    Ok(times)
}

fn times_or(key: &str, default: &str) -> Vec<NaiveTime> {
    let raw = env::var(key).unwrap_or_else(|_| default.to_string());
    parse_times(&raw).unwrap_or_else(|e| {
        warn!("{} is invalid ({}), using default {}", key, e, default);
        parse_times(default).unwrap_or_default()
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_times_sorts_and_dedups() {
        let times = parse_times("17:00, 09:00,11:00,09:00").unwrap();
        assert_eq!(
            times,
            vec![
                NaiveTime::from_hms_opt(9, 0, 0).unwrap(),
                NaiveTime::from_hms_opt(11, 0, 0).unwrap(),
                NaiveTime::from_hms_opt(17, 0, 0).unwrap(),
            ]
        );
    }

    #[test]
    fn test_clinic_offset_defaults_to_utc_when_out_of_range() {
        let mut config = AppConfig::from_env();
        config.clinic_utc_offset_minutes = 330;
        assert_eq!(config.clinic_offset().local_minus_utc(), 330 * 60);

        config.clinic_utc_offset_minutes = 60 * 30;
        assert_eq!(config.clinic_offset().local_minus_utc(), 0);
    }

    #[test]
    fn test_parse_times_rejects_garbage() {
        assert!(parse_times("nine o'clock").is_err());
        assert!(parse_times(" , ").is_err());
    }
}
