//! # Doctor Routes
//!
//! Today's schedule and the consultation form. All routes require a doctor
//! session, and a consultation is only visible to its assigned doctor.

use axum::extract::rejection::{FormRejection, PathRejection};
use axum::extract::{Path, State};
use axum::middleware::from_fn;
use axum::response::Redirect;
use axum::routing::get;
use axum::{Form, Json, Router};
use serde::Deserialize;
use utoipa::ToSchema;

use klinik_core::Role;
use klinik_state::ClinicalNotes;

use crate::error::AppError;
use crate::extractors::{extract_validated_form, Validate};
use crate::lifecycle::today;
use crate::routes::appointment_id;
use crate::session::{require_auth, require_doctor, SessionContext};
use crate::state::AppState;
use crate::views::{self, AppointmentView, ConsultationPage, DoctorDashboard};

/// Consultation result form.
#[derive(Debug, Deserialize, ToSchema)]
pub struct ConsultationForm {
    #[serde(default)]
    pub gejala: String,
    #[serde(default)]
    pub diagnosa: String,
    #[serde(default)]
    pub resep: String,
}

impl ConsultationForm {
    fn notes(&self) -> Result<ClinicalNotes, AppError> {
        Ok(ClinicalNotes::new(&self.gejala, &self.diagnosa, &self.resep)?)
    }
}

impl Validate for ConsultationForm {
    fn validate(&self) -> Result<(), AppError> {
        self.notes().map(|_| ())
    }
}

pub fn router() -> Router<AppState> {
    Router::new()
        .route("/dokter/dashboard", get(dashboard))
        .route("/dokter/konsultasi/{id}", get(consultation_page).post(complete))
        .route_layer(from_fn(require_doctor))
        .route_layer(from_fn(require_auth))
}

/// GET /dokter/dashboard: Today's approved appointments for the caller.
#[utoipa::path(
    get,
    path = "/dokter/dashboard",
    responses(
        (status = 200, description = "Doctor dashboard", body = DoctorDashboard),
        (status = 303, description = "Not signed in"),
        (status = 403, description = "Not a doctor"),
    ),
    tag = "doctor"
)]
pub async fn dashboard(
    State(state): State<AppState>,
    ctx: SessionContext,
) -> Result<Json<DoctorDashboard>, AppError> {
    let today = today();
    let schedule = state.clinic.schedule(&ctx, today).await?;
    Ok(Json(DoctorDashboard {
        name: ctx.name,
        today,
        appointments: views::appointments(&schedule),
    }))
}

/// GET /dokter/konsultasi/{id}: Consultation form.
#[utoipa::path(
    get,
    path = "/dokter/konsultasi/{id}",
    params(("id" = i64, Path, description = "Appointment ID")),
    responses(
        (status = 200, description = "Consultation page", body = ConsultationPage),
        (status = 403, description = "Appointment assigned to another doctor"),
        (status = 404, description = "Appointment not found"),
    ),
    tag = "doctor"
)]
pub async fn consultation_page(
    State(state): State<AppState>,
    ctx: SessionContext,
    path: Result<Path<String>, PathRejection>,
) -> Result<Json<ConsultationPage>, AppError> {
    let id = appointment_id(path)?;
    let listing = state.clinic.consultation(&ctx, id).await?;
    Ok(Json(ConsultationPage {
        action: format!("/dokter/konsultasi/{id}"),
        appointment: AppointmentView::from(&listing),
    }))
}

/// POST /dokter/konsultasi/{id}: Record symptoms, diagnosis and prescription.
#[utoipa::path(
    post,
    path = "/dokter/konsultasi/{id}",
    params(("id" = i64, Path, description = "Appointment ID")),
    request_body(content = ConsultationForm, content_type = "application/x-www-form-urlencoded"),
    responses(
        (status = 303, description = "Completed, redirect to the doctor dashboard"),
        (status = 400, description = "A clinical field is empty"),
        (status = 403, description = "Appointment assigned to another doctor"),
        (status = 404, description = "Appointment not found"),
        (status = 409, description = "Appointment is not approved"),
    ),
    tag = "doctor"
)]
pub async fn complete(
    State(state): State<AppState>,
    ctx: SessionContext,
    path: Result<Path<String>, PathRejection>,
    body: Result<Form<ConsultationForm>, FormRejection>,
) -> Result<Redirect, AppError> {
    let id = appointment_id(path)?;
    let form = extract_validated_form(body)?;
    state.clinic.complete(&ctx, id, form.notes()?).await?;
    Ok(Redirect::to(Role::Doctor.dashboard_path()))
}
