use std::fmt;
use std::sync::OnceLock;

use regex::Regex;
use serde::{Deserialize, Serialize};
use thiserror::Error;

static EMAIL_PATTERN: OnceLock<Option<Regex>> = OnceLock::new();

fn email_regex() -> Option<&'static Regex> {
    EMAIL_PATTERN
        .get_or_init(|| {
            Regex::new(r"^[A-Za-z0-9.!#$%&'*+/=?^_`{|}~-]+@[A-Za-z0-9](?:[A-Za-z0-9-]{0,61}[A-Za-z0-9])?(?:\.[A-Za-z0-9](?:[A-Za-z0-9-]{0,61}[A-Za-z0-9])?)+$").ok()
        })
        .as_ref()
}

#[derive(Debug, Error, Clone, PartialEq, Eq)]
#[error("Invalid contact {0:?}: expected an email address or a phone number")]
pub struct InvalidContact(pub String);

/// How a user is reached. Registration stores a single contact string; it is
/// classified here and never re-inspected at send time.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub enum Contact {
    Email(String),
    Phone(String),
}

impl Contact {
    pub fn parse(raw: &str) -> Result<Self, InvalidContact> {
        let trimmed = raw.trim();

        if is_email_address(trimmed) {
            return Ok(Contact::Email(trimmed.to_string()));
        }

        let (plus, digits): (bool, String) = {
            let plus = trimmed.starts_with('+');
            let body = trimmed.trim_start_matches('+');
            let cleaned: String = body
                .chars()
                .filter(|c| !matches!(c, ' ' | '-' | '(' | ')' | '.'))
                .collect();
            (plus, cleaned)
        };

        if (6..=15).contains(&digits.len()) && digits.chars().all(|c| c.is_ascii_digit()) {
            let number = if plus { format!("+{}", digits) } else { digits };
            return Ok(Contact::Phone(number));
        }

        Err(InvalidContact(raw.to_string()))
    }

    pub fn as_str(&self) -> &str {
        match self {
            Contact::Email(value) | Contact::Phone(value) => value,
        }
    }

    /// Phone number in dialable form. Numbers stored without an international
    /// prefix get `country_code` prepended.
    pub fn sms_number(&self, country_code: &str) -> Option<String> {
        match self {
            Contact::Phone(number) if number.starts_with('+') => Some(number.clone()),
            Contact::Phone(number) => Some(format!("{}{}", country_code, number)),
            Contact::Email(_) => None,
        }
    }
}

pub fn is_email_address(candidate: &str) -> bool {
    candidate.len() <= 254 && email_regex().is_some_and(|re| re.is_match(candidate))
}

impl TryFrom<String> for Contact {
    type Error = InvalidContact;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        Contact::parse(&value)
    }
}

impl From<Contact> for String {
    fn from(contact: Contact) -> Self {
        match contact {
            Contact::Email(value) | Contact::Phone(value) => value,
        }
    }
}

impl fmt::Display for Contact {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}
