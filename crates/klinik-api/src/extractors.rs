//! # Form Extraction & Validation
//!
//! Every state-changing endpoint takes an `application/x-www-form-urlencoded`
//! body. Handlers accept `Result<Form<T>, FormRejection>` and pass it through
//! [`extract_form`] so that a malformed body becomes a plain-text 400 rather
//! than axum's default rejection.

use axum::extract::rejection::FormRejection;
use axum::Form;

use crate::error::AppError;

/// Trait for form types that can validate their rules beyond what serde
/// deserialization checks.
pub trait Validate {
    /// Validate the form. Returns an error message on failure.
    fn validate(&self) -> Result<(), AppError>;
}

/// Extract a form body, mapping deserialization errors to
/// [`AppError::Validation`].
///
/// ```ignore
/// async fn handler(body: Result<Form<T>, FormRejection>) -> Result<..., AppError> {
///     let form = extract_form(body)?;
/// }
/// ```
pub fn extract_form<T>(result: Result<Form<T>, FormRejection>) -> Result<T, AppError> {
    result
        .map(|Form(v)| v)
        .map_err(|err| AppError::Validation(err.body_text()))
}

/// Extract a form body and validate it using the [`Validate`] trait.
pub fn extract_validated_form<T: Validate>(
    result: Result<Form<T>, FormRejection>,
) -> Result<T, AppError> {
    let value = extract_form(result)?;
    value.validate()?;
    Ok(value)
}
