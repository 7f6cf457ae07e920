//! # Validation Errors
//!
//! Every rejection of malformed form input is a [`ValidationError`]. The
//! message is safe to show to the caller: it names the field and the rule,
//! never the stored data.

use thiserror::Error;

/// Input failed a domain validation rule.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum ValidationError {
    /// National-ID is not exactly 16 digits.
    #[error("NIK must be exactly {expected} digits, got {actual:?}")]
    InvalidNik {
        /// Required length.
        expected: usize,
        /// The rejected input.
        actual: String,
    },

    /// A required field was empty or missing.
    #[error("{0} must not be empty")]
    MissingField(&'static str),

    /// A field exceeded its maximum length.
    #[error("{field} must be at most {max} characters")]
    TooLong {
        /// Field name.
        field: &'static str,
        /// Maximum accepted length.
        max: usize,
    },

    /// Consultation date is not a `YYYY-MM-DD` calendar date.
    #[error("invalid consultation date {0:?}, expected YYYY-MM-DD")]
    InvalidDate(String),

    /// Password and confirmation differ.
    #[error("password and confirmation do not match")]
    PasswordMismatch,

    /// Password is shorter than the minimum.
    #[error("password must be at least {0} characters")]
    PasswordTooShort(usize),

    /// Role string is not one of the known roles.
    #[error("unknown role {0:?}")]
    UnknownRole(String),

    /// Numeric identifier could not be parsed.
    #[error("invalid {field} {value:?}")]
    InvalidId {
        /// Field name.
        field: &'static str,
        /// The rejected input.
        value: String,
    },
}
