//! # Identity Newtypes
//!
//! Newtype wrappers for the identifiers of the clinic system. Database keys
//! are `i64` (Postgres `BIGSERIAL`); the national-ID and the registration
//! number are validated strings.

use std::str::FromStr;

use chrono::NaiveDateTime;
use serde::{Deserialize, Serialize};

use crate::error::ValidationError;

/// Required length of a national-ID (NIK).
pub const NIK_LEN: usize = 16;

/// Minimum password length accepted at registration.
pub const MIN_PASSWORD_LEN: usize = 6;

const MAX_NAME_LEN: usize = 100;

/// Primary key of a user record.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct UserId(pub i64);

/// Primary key of an appointment record.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct AppointmentId(pub i64);

macro_rules! numeric_id {
    ($ty:ident, $field:literal) => {
        impl $ty {
            /// Access the raw database key.
            pub fn get(&self) -> i64 {
                self.0
            }
        }

        impl FromStr for $ty {
            type Err = ValidationError;

            fn from_str(s: &str) -> Result<Self, Self::Err> {
                s.trim()
                    .parse::<i64>()
                    .ok()
                    .filter(|v| *v > 0)
                    .map(Self)
                    .ok_or_else(|| ValidationError::InvalidId {
                        field: $field,
                        value: s.to_string(),
                    })
            }
        }

        impl std::fmt::Display for $ty {
            fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
                write!(f, "{}", self.0)
            }
        }
    };
}

numeric_id!(UserId, "user id");
numeric_id!(AppointmentId, "appointment id");

/// Indonesian national-ID number (NIK), the login username.
///
/// Always exactly 16 ASCII digits.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct Nik(String);

impl Nik {
    /// Parse a NIK from form input. Surrounding whitespace is ignored.
    pub fn parse(input: &str) -> Result<Self, ValidationError> {
        let trimmed = input.trim();
        if trimmed.len() != NIK_LEN || !trimmed.bytes().all(|b| b.is_ascii_digit()) {
            return Err(ValidationError::InvalidNik {
                expected: NIK_LEN,
                actual: trimmed.to_string(),
            });
        }
        Ok(Self(trimmed.to_string()))
    }

    /// The digits as a string slice.
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl TryFrom<String> for Nik {
    type Error = ValidationError;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        Self::parse(&value)
    }
}

impl From<Nik> for String {
    fn from(nik: Nik) -> Self {
        nik.0
    }
}

impl std::fmt::Display for Nik {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(&self.0)
    }
}

/// Human-facing booking reference, `REG-{patient_id}-{YYYYmmddHHMMSS}`.
///
/// Second resolution: two bookings by the same patient within one second
/// collide, which the store rejects as a duplicate.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct RegistrationNumber(String);

impl RegistrationNumber {
    /// Prefix shared by every registration number.
    pub const PREFIX: &'static str = "REG";

    /// Derive the registration number for a booking made at `at`.
    pub fn generate(patient: UserId, at: NaiveDateTime) -> Self {
        Self(format!(
            "{}-{}-{}",
            Self::PREFIX,
            patient.0,
            at.format("%Y%m%d%H%M%S")
        ))
    }

    /// Wrap a value loaded from the store.
    pub fn from_stored(value: String) -> Self {
        Self(value)
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl std::fmt::Display for RegistrationNumber {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(&self.0)
    }
}

/// Check a password and its confirmation at registration.
pub fn validate_password(password: &str, confirmation: &str) -> Result<(), ValidationError> {
    if password != confirmation {
        return Err(ValidationError::PasswordMismatch);
    }
    if password.chars().count() < MIN_PASSWORD_LEN {
        return Err(ValidationError::PasswordTooShort(MIN_PASSWORD_LEN));
    }
    Ok(())
}

/// Check and normalise a display name.
pub fn validate_name(name: &str) -> Result<String, ValidationError> {
    let trimmed = name.trim();
    if trimmed.is_empty() {
        return Err(ValidationError::MissingField("name"));
    }
    if trimmed.chars().count() > MAX_NAME_LEN {
        return Err(ValidationError::TooLong {
            field: "name",
            max: MAX_NAME_LEN,
        });
    }
    Ok(trimmed.to_string())
}
