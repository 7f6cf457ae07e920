//! # Consultation Date and Time
//!
//! The consultation date is a calendar date chosen by the patient at booking.
//! The consultation time is assigned by the admin on approval and is kept as
//! free text (`"09:00"`, `"09:00 - 09:30"`), matching what clinic staff type.
//!
//! Both are rejected at construction when empty, so a stored value is never
//! blank.

use chrono::NaiveDate;
use serde::{Deserialize, Serialize};

use crate::error::ValidationError;

const MAX_TIME_LEN: usize = 32;

/// Calendar date of a consultation.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct ConsultationDate(NaiveDate);

impl ConsultationDate {
    /// Parse a `YYYY-MM-DD` date from form input.
    pub fn parse(input: &str) -> Result<Self, ValidationError> {
        let trimmed = input.trim();
        if trimmed.is_empty() {
            return Err(ValidationError::MissingField("date"));
        }
        NaiveDate::parse_from_str(trimmed, "%Y-%m-%d")
            .map(Self)
            .map_err(|_| ValidationError::InvalidDate(trimmed.to_string()))
    }

    pub fn from_naive(date: NaiveDate) -> Self {
        Self(date)
    }

    pub fn as_naive(&self) -> NaiveDate {
        self.0
    }
}

impl std::fmt::Display for ConsultationDate {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0.format("%Y-%m-%d"))
    }
}

/// Time slot of a consultation, assigned together with the doctor.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct ConsultationTime(String);

impl ConsultationTime {
    /// Parse a non-empty time slot from form input.
    pub fn parse(input: &str) -> Result<Self, ValidationError> {
        let trimmed = input.trim();
        if trimmed.is_empty() {
            return Err(ValidationError::MissingField("time"));
        }
        if trimmed.chars().count() > MAX_TIME_LEN {
            return Err(ValidationError::TooLong {
                field: "time",
                max: MAX_TIME_LEN,
            });
        }
        Ok(Self(trimmed.to_string()))
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl std::fmt::Display for ConsultationTime {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(&self.0)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn date_parses_iso() {
        let date = ConsultationDate::parse("2025-06-01").unwrap();
        assert_eq!(date.to_string(), "2025-06-01");
    }

    #[test]
    fn date_rejects_empty() {
        assert_eq!(
            ConsultationDate::parse("  "),
            Err(ValidationError::MissingField("date"))
        );
    }

    #[test]
    fn date_rejects_impossible_day() {
        assert!(matches!(
            ConsultationDate::parse("2025-02-30"),
            Err(ValidationError::InvalidDate(_))
        ));
    }

    #[test]
    fn date_rejects_other_formats() {
        assert!(ConsultationDate::parse("01/06/2025").is_err());
    }

    #[test]
    fn time_requires_content() {
        assert_eq!(
            ConsultationTime::parse(""),
            Err(ValidationError::MissingField("time"))
        );
        assert_eq!(ConsultationTime::parse(" 09:00 ").unwrap().as_str(), "09:00");
    }

    #[test]
    fn time_length_is_bounded() {
        assert!(ConsultationTime::parse(&"9".repeat(33)).is_err());
    }
}
