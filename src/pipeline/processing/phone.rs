//! Phone canonicalization.
//!
//! The only rule shipped is tuned for Indian mobile numbers: a bare ten-digit
//! number gets the `91` country code. Other locales need their own
//! [`PhoneRule`]; the Indian heuristic must not be applied to them.

use crate::constants::DEFAULT_COUNTRY_CODE;

pub const MIN_DIALABLE_DIGITS: usize = 10;

/// Locale-specific canonicalization of free-form phone strings
pub trait PhoneRule: Send + Sync {
    /// Map a phone candidate to its dialable digits-only form, or an empty
    /// string when the candidate is unusable.
    fn canonicalize(&self, candidate: &str) -> String;

    fn is_usable(&self, canonical: &str) -> bool {
        is_usable(canonical)
    }
}

/// Indian dialing convention: drop a single trunk `0`, prefix bare ten-digit
/// numbers with the country code.
#[derive(Debug, Clone)]
pub struct IndiaRule {
    pub country_code: String,
}

impl Default for IndiaRule {
    fn default() -> Self {
        Self {
            country_code: DEFAULT_COUNTRY_CODE.to_string(),
        }
    }
}

impl IndiaRule {
    pub fn new(country_code: impl Into<String>) -> Self {
        Self {
            country_code: country_code.into(),
        }
    }
}

impl PhoneRule for IndiaRule {
    fn canonicalize(&self, candidate: &str) -> String {
        let stripped: String = candidate
            .chars()
            .filter(|c| !c.is_whitespace() && !matches!(c, '-' | '(' | ')'))
            .collect();
        let mut digits = stripped.trim_start_matches('+');

        if digits.starts_with('0') && !digits.starts_with("00") {
            digits = &digits[1..];
        }
        if digits.is_empty() || !digits.chars().all(|c| c.is_ascii_digit()) {
            return String::new();
        }

        let canonical = if digits.len() == 10 && !digits.starts_with(&self.country_code) {
            format!("{}{}", self.country_code, digits)
        } else {
            digits.to_string()
        };

        if canonical.len() < MIN_DIALABLE_DIGITS {
            return String::new();
        }
        canonical
    }
}

/// Canonicalize with the default (Indian) rule
pub fn canonicalize(candidate: &str) -> String {
    IndiaRule::default().canonicalize(candidate)
}

/// A canonical phone is usable when it holds at least ten digits
pub fn is_usable(canonical: &str) -> bool {
    canonical.len() >= MIN_DIALABLE_DIGITS && canonical.chars().all(|c| c.is_ascii_digit())
}
