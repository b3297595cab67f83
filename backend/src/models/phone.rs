//! Canonical phone numbers.
//!
//! Every lookup and every rate-limit scan keys on the canonical form, so the
//! same handset typed as `090-1234-5678`, `090 1234 5678` or `09012345678`
//! always lands on the same rows.

use serde::{Deserialize, Serialize};
use std::fmt;
use validator::ValidationError;

const MIN_DIGITS: usize = 10;
const MAX_DIGITS: usize = 15;

#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct PhoneNumber(String);

impl PhoneNumber {
    /// Strips hyphens and whitespace and checks what is left is a plausible
    /// phone number (digits, optionally one leading `+`).
    pub fn parse(raw: &str) -> Result<Self, ValidationError> {
        let normalized = normalize(raw);
        let digits = normalized.strip_prefix('+').unwrap_or(&normalized);

        if digits.is_empty() || !digits.chars().all(|c| c.is_ascii_digit()) {
            return Err(ValidationError::new("phone_invalid_characters"));
        }
        if !(MIN_DIGITS..=MAX_DIGITS).contains(&digits.len()) {
            return Err(ValidationError::new("phone_invalid_length"));
        }

        Ok(Self(normalized))
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// Masked form for logs: keeps the last four digits only.
    pub fn masked(&self) -> String {
        let visible = self.0.len().saturating_sub(4);
        format!("{}{}", "*".repeat(visible), &self.0[visible..])
    }
}

impl fmt::Display for PhoneNumber {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// Removes hyphens (ASCII and the common full-width variants) and whitespace.
pub fn normalize(raw: &str) -> String {
    raw.chars()
        .filter(|c| !c.is_whitespace() && !matches!(c, '-' | '‐' | '−' | 'ー' | '－'))
        .collect()
}

/// `validator` hook for request payloads that carry a phone number.
pub fn validate_phone(raw: &str) -> Result<(), ValidationError> {
    PhoneNumber::parse(raw).map(|_| ())
}
