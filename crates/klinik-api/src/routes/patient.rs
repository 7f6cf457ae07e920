//! # Patient Routes
//!
//! Dashboard of active appointments, booking, medical history and
//! cancellation. All routes require a patient session.

use axum::extract::rejection::FormRejection;
use axum::extract::State;
use axum::middleware::from_fn;
use axum::response::Redirect;
use axum::routing::{get, post};
use axum::{Form, Json, Router};
use serde::Deserialize;
use utoipa::ToSchema;

use klinik_core::{AppointmentId, Role};

use crate::error::AppError;
use crate::extractors::extract_form;
use crate::lifecycle::today;
use crate::session::{require_auth, require_patient, SessionContext};
use crate::state::AppState;
use crate::views::{self, BookingPage, HistoryEntryView, HistoryPage, PatientDashboard};

/// Booking form.
#[derive(Debug, Deserialize, ToSchema)]
pub struct BookingForm {
    /// Consultation date, `YYYY-MM-DD`.
    #[serde(default)]
    pub tanggal: String,
}

/// Cancellation form, shared with the admin route.
#[derive(Debug, Deserialize, ToSchema)]
pub struct CancelForm {
    #[serde(default)]
    pub appointment_id: String,
}

impl CancelForm {
    pub fn id(&self) -> Result<AppointmentId, AppError> {
        Ok(self.appointment_id.parse()?)
    }
}

pub fn router() -> Router<AppState> {
    Router::new()
        .route("/pasien/dashboard", get(dashboard))
        .route("/pasien/booking", get(booking_page).post(book))
        .route("/pasien/riwayat", get(history))
        .route("/pasien/cancel-appointment", post(cancel))
        .route_layer(from_fn(require_patient))
        .route_layer(from_fn(require_auth))
}

/// GET /pasien/dashboard: Pending and approved appointments.
#[utoipa::path(
    get,
    path = "/pasien/dashboard",
    responses(
        (status = 200, description = "Patient dashboard", body = PatientDashboard),
        (status = 303, description = "Not signed in"),
        (status = 403, description = "Not a patient"),
    ),
    tag = "patient"
)]
pub async fn dashboard(
    State(state): State<AppState>,
    ctx: SessionContext,
) -> Result<Json<PatientDashboard>, AppError> {
    let active = state.clinic.active_for(ctx.user_id).await?;
    Ok(Json(PatientDashboard {
        name: ctx.name,
        appointments: views::appointments(&active),
    }))
}

/// GET /pasien/booking: Booking form.
#[utoipa::path(
    get,
    path = "/pasien/booking",
    responses((status = 200, description = "Booking page", body = BookingPage)),
    tag = "patient"
)]
pub async fn booking_page(ctx: SessionContext) -> Json<BookingPage> {
    Json(BookingPage {
        name: ctx.name,
        action: "/pasien/booking".into(),
        min_date: today(),
    })
}

/// POST /pasien/booking: Book a consultation.
#[utoipa::path(
    post,
    path = "/pasien/booking",
    request_body(content = BookingForm, content_type = "application/x-www-form-urlencoded"),
    responses(
        (status = 303, description = "Booked, redirect to the patient dashboard"),
        (status = 400, description = "Missing or malformed date"),
    ),
    tag = "patient"
)]
pub async fn book(
    State(state): State<AppState>,
    ctx: SessionContext,
    body: Result<Form<BookingForm>, FormRejection>,
) -> Result<Redirect, AppError> {
    let form = extract_form(body)?;
    state.clinic.book(&ctx, &form.tanggal).await?;
    Ok(Redirect::to(Role::Patient.dashboard_path()))
}

/// GET /pasien/riwayat: Every appointment, most recent first.
#[utoipa::path(
    get,
    path = "/pasien/riwayat",
    responses((status = 200, description = "Medical history", body = HistoryPage)),
    tag = "patient"
)]
pub async fn history(
    State(state): State<AppState>,
    ctx: SessionContext,
) -> Result<Json<HistoryPage>, AppError> {
    let rows = state.clinic.history_for(ctx.user_id).await?;
    Ok(Json(HistoryPage {
        name: ctx.name,
        history: rows.iter().map(HistoryEntryView::from).collect(),
    }))
}

/// POST /pasien/cancel-appointment: Cancel one of the caller's appointments.
#[utoipa::path(
    post,
    path = "/pasien/cancel-appointment",
    request_body(content = CancelForm, content_type = "application/x-www-form-urlencoded"),
    responses(
        (status = 303, description = "Cancelled, redirect to the patient dashboard"),
        (status = 404, description = "Appointment not found or not the caller's"),
        (status = 409, description = "Appointment already completed or cancelled"),
    ),
    tag = "patient"
)]
pub async fn cancel(
    State(state): State<AppState>,
    ctx: SessionContext,
    body: Result<Form<CancelForm>, FormRejection>,
) -> Result<Redirect, AppError> {
    let form = extract_form(body)?;
    state.clinic.cancel(&ctx, form.id()?).await?;
    Ok(Redirect::to(Role::Patient.dashboard_path()))
}
