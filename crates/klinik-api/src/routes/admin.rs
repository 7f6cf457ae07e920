//! # Admin Routes
//!
//! Triage dashboard, doctor assignment, rescheduling and cancellation.
//! All routes require an admin session.

use axum::extract::rejection::{FormRejection, PathRejection};
use axum::extract::{Path, State};
use axum::middleware::from_fn;
use axum::response::Redirect;
use axum::routing::{get, post};
use axum::{Form, Json, Router};
use serde::Deserialize;
use utoipa::ToSchema;

use klinik_core::{AppointmentId, Role};

use crate::error::AppError;
use crate::extractors::extract_form;
use crate::routes::appointment_id;
use crate::routes::patient::CancelForm;
use crate::session::{require_admin, require_auth, SessionContext};
use crate::state::AppState;
use crate::views::{self, AdminDashboard, AppointmentView, AssignmentPage};

/// Approval form.
#[derive(Debug, Deserialize, ToSchema)]
pub struct ApproveForm {
    #[serde(default)]
    pub doctor_id: String,
    /// Time slot, free text such as `09:00`.
    #[serde(default)]
    pub waktu: String,
}

/// Reschedule form.
#[derive(Debug, Deserialize, ToSchema)]
pub struct RescheduleForm {
    #[serde(default)]
    pub doctor_id: String,
    /// New consultation date, `YYYY-MM-DD`.
    #[serde(default)]
    pub tanggal: String,
    #[serde(default)]
    pub waktu: String,
}

pub fn router() -> Router<AppState> {
    Router::new()
        .route("/admin/dashboard", get(dashboard))
        .route("/admin/approve/{id}", get(approve_page).post(approve))
        .route("/admin/reschedule/{id}", get(reschedule_page).post(reschedule))
        .route("/admin/cancel-appointment", post(cancel))
        .route_layer(from_fn(require_admin))
        .route_layer(from_fn(require_auth))
}

/// GET /admin/dashboard: Pending queue and the full appointment list.
#[utoipa::path(
    get,
    path = "/admin/dashboard",
    responses(
        (status = 200, description = "Admin dashboard", body = AdminDashboard),
        (status = 303, description = "Not signed in"),
        (status = 403, description = "Not an admin"),
    ),
    tag = "admin"
)]
pub async fn dashboard(
    State(state): State<AppState>,
    ctx: SessionContext,
) -> Result<Json<AdminDashboard>, AppError> {
    let pending = state.clinic.pending().await?;
    let all = state.clinic.overview().await?;
    Ok(Json(AdminDashboard {
        name: ctx.name,
        pending: views::appointments(&pending),
        appointments: views::appointments(&all),
    }))
}

/// GET /admin/approve/{id}: Approval form with the doctor list.
#[utoipa::path(
    get,
    path = "/admin/approve/{id}",
    params(("id" = i64, Path, description = "Appointment ID")),
    responses(
        (status = 200, description = "Approval page", body = AssignmentPage),
        (status = 404, description = "Appointment not found"),
    ),
    tag = "admin"
)]
pub async fn approve_page(
    State(state): State<AppState>,
    path: Result<Path<String>, PathRejection>,
) -> Result<Json<AssignmentPage>, AppError> {
    let id = appointment_id(path)?;
    assignment_page(&state, format!("/admin/approve/{id}"), id).await
}

/// POST /admin/approve/{id}: Assign doctor and time.
#[utoipa::path(
    post,
    path = "/admin/approve/{id}",
    params(("id" = i64, Path, description = "Appointment ID")),
    request_body(content = ApproveForm, content_type = "application/x-www-form-urlencoded"),
    responses(
        (status = 303, description = "Approved, redirect to the admin dashboard"),
        (status = 400, description = "Missing time or invalid doctor"),
        (status = 404, description = "Appointment or doctor not found"),
        (status = 409, description = "Appointment already completed or cancelled"),
    ),
    tag = "admin"
)]
pub async fn approve(
    State(state): State<AppState>,
    ctx: SessionContext,
    path: Result<Path<String>, PathRejection>,
    body: Result<Form<ApproveForm>, FormRejection>,
) -> Result<Redirect, AppError> {
    let id = appointment_id(path)?;
    let form = extract_form(body)?;
    state
        .clinic
        .approve(&ctx, id, &form.doctor_id, &form.waktu)
        .await?;
    Ok(Redirect::to(Role::Admin.dashboard_path()))
}

/// GET /admin/reschedule/{id}: Reschedule form with the doctor list.
#[utoipa::path(
    get,
    path = "/admin/reschedule/{id}",
    params(("id" = i64, Path, description = "Appointment ID")),
    responses(
        (status = 200, description = "Reschedule page", body = AssignmentPage),
        (status = 404, description = "Appointment not found"),
    ),
    tag = "admin"
)]
pub async fn reschedule_page(
    State(state): State<AppState>,
    path: Result<Path<String>, PathRejection>,
) -> Result<Json<AssignmentPage>, AppError> {
    let id = appointment_id(path)?;
    assignment_page(&state, format!("/admin/reschedule/{id}"), id).await
}

/// POST /admin/reschedule/{id}: Move to a new doctor, date and time.
#[utoipa::path(
    post,
    path = "/admin/reschedule/{id}",
    params(("id" = i64, Path, description = "Appointment ID")),
    request_body(content = RescheduleForm, content_type = "application/x-www-form-urlencoded"),
    responses(
        (status = 303, description = "Rescheduled, redirect to the admin dashboard"),
        (status = 400, description = "Missing date or time, or invalid doctor"),
        (status = 404, description = "Appointment or doctor not found"),
        (status = 409, description = "Appointment already completed or cancelled"),
    ),
    tag = "admin"
)]
pub async fn reschedule(
    State(state): State<AppState>,
    ctx: SessionContext,
    path: Result<Path<String>, PathRejection>,
    body: Result<Form<RescheduleForm>, FormRejection>,
) -> Result<Redirect, AppError> {
    let id = appointment_id(path)?;
    let form = extract_form(body)?;
    state
        .clinic
        .reschedule(&ctx, id, &form.doctor_id, &form.tanggal, &form.waktu)
        .await?;
    Ok(Redirect::to(Role::Admin.dashboard_path()))
}

/// POST /admin/cancel-appointment: Cancel any pending or approved appointment.
#[utoipa::path(
    post,
    path = "/admin/cancel-appointment",
    request_body(content = CancelForm, content_type = "application/x-www-form-urlencoded"),
    responses(
        (status = 303, description = "Cancelled, redirect to the admin dashboard"),
        (status = 404, description = "Appointment not found"),
        (status = 409, description = "Appointment already completed or cancelled"),
    ),
    tag = "admin"
)]
pub async fn cancel(
    State(state): State<AppState>,
    ctx: SessionContext,
    body: Result<Form<CancelForm>, FormRejection>,
) -> Result<Redirect, AppError> {
    let form = extract_form(body)?;
    state.clinic.cancel(&ctx, form.id()?).await?;
    Ok(Redirect::to(Role::Admin.dashboard_path()))
}

async fn assignment_page(
    state: &AppState,
    action: String,
    id: AppointmentId,
) -> Result<Json<AssignmentPage>, AppError> {
    let listing = state.clinic.appointment(id).await?;
    let doctors = state.clinic.doctors().await?;
    Ok(Json(AssignmentPage {
        action,
        appointment: AppointmentView::from(&listing),
        doctors: views::doctor_options(&doctors),
    }))
}
