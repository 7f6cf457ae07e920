//! # API Error Types
//!
//! Error type implementing `axum::response::IntoResponse`. Maps domain
//! errors from klinik-core, klinik-state and the store to HTTP status codes
//! with a plain-text body. Store and internal failures are logged and
//! answered with a generic message; the driver error never reaches the
//! client.

use axum::http::StatusCode;
use axum::response::{IntoResponse, Redirect, Response};
use thiserror::Error;

use klinik_core::ValidationError;
use klinik_state::AppointmentError;

use crate::store::StoreError;

/// Application-level error type that implements [`IntoResponse`] for Axum.
#[derive(Error, Debug)]
pub enum AppError {
    /// User or appointment does not exist (404).
    #[error("not found: {0}")]
    NotFound(String),

    /// Malformed or missing form fields (400).
    #[error("validation failed: {0}")]
    Validation(String),

    /// No valid session. Answered with a redirect to the login page.
    #[error("not signed in")]
    Unauthenticated,

    /// Bad credentials (401).
    #[error("unauthorized: {0}")]
    Unauthorized(String),

    /// Role mismatch or acting on someone else's appointment (403).
    #[error("forbidden: {0}")]
    Forbidden(String),

    /// Duplicate NIK, or a transition the current status does not allow (409).
    #[error("conflict: {0}")]
    Conflict(String),

    /// Persistence failure (500). Message is logged but not returned to client.
    #[error("store failure: {0}")]
    Store(String),

    /// Any other server-side failure (500). Message is logged but not returned.
    #[error("internal error: {0}")]
    Internal(String),
}

impl AppError {
    /// HTTP status for this error.
    fn status(&self) -> StatusCode {
        match self {
            Self::NotFound(_) => StatusCode::NOT_FOUND,
            Self::Validation(_) => StatusCode::BAD_REQUEST,
            Self::Unauthenticated => StatusCode::SEE_OTHER,
            Self::Unauthorized(_) => StatusCode::UNAUTHORIZED,
            Self::Forbidden(_) => StatusCode::FORBIDDEN,
            Self::Conflict(_) => StatusCode::CONFLICT,
            Self::Store(_) | Self::Internal(_) => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }
}

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        let status = self.status();
        match &self {
            Self::Unauthenticated => Redirect::to("/").into_response(),
            Self::Store(_) | Self::Internal(_) => {
                tracing::error!(error = %self, "request failed on the server side");
                (status, "An internal error occurred").into_response()
            }
            other => (status, other.to_string()).into_response(),
        }
    }
}

/// Convert klinik-core validation errors to API errors.
impl From<ValidationError> for AppError {
    fn from(err: ValidationError) -> Self {
        Self::Validation(err.to_string())
    }
}

/// Convert lifecycle errors to API errors.
impl From<AppointmentError> for AppError {
    fn from(err: AppointmentError) -> Self {
        match &err {
            AppointmentError::InvalidTransition { .. } | AppointmentError::TerminalState { .. } => {
                Self::Conflict(err.to_string())
            }
            AppointmentError::NotAssignedDoctor { .. } => Self::Forbidden(err.to_string()),
            AppointmentError::UnknownStatus(_) | AppointmentError::InvariantViolated { .. } => {
                Self::Internal(err.to_string())
            }
        }
    }
}

/// Convert store errors to API errors.
impl From<StoreError> for AppError {
    fn from(err: StoreError) -> Self {
        match &err {
            StoreError::Duplicate(_) => Self::Conflict(err.to_string()),
            StoreError::MissingReference(_) => Self::NotFound(err.to_string()),
            StoreError::Corrupt(_) | StoreError::Database(_) => Self::Store(err.to_string()),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use http_body_util::BodyExt;
    use klinik_core::{AppointmentId, UserId};
    use klinik_state::AppointmentStatus;

    async fn body_text(response: Response) -> String {
        let bytes = response.into_body().collect().await.unwrap().to_bytes();
        String::from_utf8(bytes.to_vec()).unwrap()
    }

    #[test]
    fn status_codes() {
        assert_eq!(AppError::NotFound("x".into()).status(), StatusCode::NOT_FOUND);
        assert_eq!(AppError::Validation("x".into()).status(), StatusCode::BAD_REQUEST);
        assert_eq!(AppError::Unauthorized("x".into()).status(), StatusCode::UNAUTHORIZED);
        assert_eq!(AppError::Forbidden("x".into()).status(), StatusCode::FORBIDDEN);
        assert_eq!(AppError::Conflict("x".into()).status(), StatusCode::CONFLICT);
        assert_eq!(
            AppError::Store("x".into()).status(),
            StatusCode::INTERNAL_SERVER_ERROR
        );
    }

    #[test]
    fn unauthenticated_redirects_to_login() {
        let response = AppError::Unauthenticated.into_response();
        assert_eq!(response.status(), StatusCode::SEE_OTHER);
        assert_eq!(response.headers()["location"], "/");
    }

    #[tokio::test]
    async fn client_errors_carry_message() {
        let response = AppError::Validation("NIK must be exactly 16 digits".into()).into_response();
        assert_eq!(response.status(), StatusCode::BAD_REQUEST);
        assert!(body_text(response).await.contains("16 digits"));
    }

    #[tokio::test]
    async fn store_failure_hides_driver_message() {
        let response =
            AppError::Store("connection refused to 10.0.0.5:5432".into()).into_response();
        assert_eq!(response.status(), StatusCode::INTERNAL_SERVER_ERROR);
        let body = body_text(response).await;
        assert!(!body.contains("10.0.0.5"));
        assert_eq!(body, "An internal error occurred");
    }

    #[test]
    fn validation_error_maps_to_400() {
        let err: AppError = ValidationError::PasswordMismatch.into();
        assert!(matches!(err, AppError::Validation(_)));
    }

    #[test]
    fn terminal_transition_maps_to_conflict() {
        let err: AppError = AppointmentError::TerminalState {
            id: AppointmentId(1),
            state: AppointmentStatus::Completed,
        }
        .into();
        assert!(matches!(err, AppError::Conflict(_)));
    }

    #[test]
    fn wrong_doctor_maps_to_forbidden() {
        let err: AppError = AppointmentError::NotAssignedDoctor {
            id: AppointmentId(1),
            doctor: UserId(9),
        }
        .into();
        assert!(matches!(err, AppError::Forbidden(_)));
    }

    #[test]
    fn duplicate_maps_to_conflict() {
        let err: AppError = StoreError::Duplicate("nik").into();
        assert!(matches!(err, AppError::Conflict(_)));
        let err: AppError = StoreError::Corrupt("bad row".into()).into();
        assert!(matches!(err, AppError::Store(_)));
    }
}
