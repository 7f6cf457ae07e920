//! # Route Modules
//!
//! One module per audience. Each exposes a `router()` whose routes carry
//! their own gate:
//!
//! | Module    | Prefix      | Gate                          |
//! |-----------|-------------|-------------------------------|
//! | `auth`    | `/`         | public                        |
//! | `patient` | `/pasien/*` | `require_auth` + patient role |
//! | `admin`   | `/admin/*`  | `require_auth` + admin role   |
//! | `doctor`  | `/dokter/*` | `require_auth` + doctor role  |
//!
//! Forms keep the field names of the clinic's HTML forms (`tanggal`,
//! `waktu`, `gejala`, ...).

pub mod admin;
pub mod auth;
pub mod doctor;
pub mod patient;

use axum::extract::rejection::PathRejection;
use axum::extract::Path;

use klinik_core::AppointmentId;

use crate::error::AppError;

/// Parse the `{id}` path segment of appointment routes.
pub(crate) fn appointment_id(
    path: Result<Path<String>, PathRejection>,
) -> Result<AppointmentId, AppError> {
    let Path(raw) = path.map_err(|e| AppError::Validation(e.body_text()))?;
    Ok(raw.parse()?)
}
