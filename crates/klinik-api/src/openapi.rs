//! # OpenAPI Specification Assembly
//!
//! Assembles all utoipa-documented routes into a single OpenAPI spec,
//! served at `/openapi.json`.

use axum::routing::get;
use axum::{Json, Router};
use utoipa::OpenApi;

use crate::state::AppState;

/// Assembled OpenAPI spec for the clinic API.
#[derive(OpenApi)]
#[openapi(
    info(
        title = "Klinik API",
        version = "0.1.0",
        description = "Clinic appointment service: patient booking, admin triage and rescheduling, doctor consultations.",
        license(name = "AGPL-3.0-or-later")
    ),
    paths(
        // Public
        crate::routes::auth::login_page,
        crate::routes::auth::login,
        crate::routes::auth::logout,
        crate::routes::auth::register_page,
        crate::routes::auth::register,
        // Patient
        crate::routes::patient::dashboard,
        crate::routes::patient::booking_page,
        crate::routes::patient::book,
        crate::routes::patient::history,
        crate::routes::patient::cancel,
        // Admin
        crate::routes::admin::dashboard,
        crate::routes::admin::approve_page,
        crate::routes::admin::approve,
        crate::routes::admin::reschedule_page,
        crate::routes::admin::reschedule,
        crate::routes::admin::cancel,
        // Doctor
        crate::routes::doctor::dashboard,
        crate::routes::doctor::consultation_page,
        crate::routes::doctor::complete,
    ),
    components(schemas(
        // Pages
        crate::views::LoginPage,
        crate::views::RegisterPage,
        crate::views::PatientDashboard,
        crate::views::BookingPage,
        crate::views::HistoryPage,
        crate::views::AdminDashboard,
        crate::views::AssignmentPage,
        crate::views::DoctorDashboard,
        crate::views::ConsultationPage,
        crate::views::AppointmentView,
        crate::views::HistoryEntryView,
        crate::views::DoctorOption,
        // Forms
        crate::routes::auth::LoginForm,
        crate::routes::auth::RegisterForm,
        crate::routes::patient::BookingForm,
        crate::routes::patient::CancelForm,
        crate::routes::admin::ApproveForm,
        crate::routes::admin::RescheduleForm,
        crate::routes::doctor::ConsultationForm,
    )),
    tags(
        (name = "auth", description = "Login, logout and patient registration"),
        (name = "patient", description = "Booking, history and cancellation"),
        (name = "admin", description = "Triage, doctor assignment and rescheduling"),
        (name = "doctor", description = "Daily schedule and consultation records"),
    )
)]
pub struct ApiDoc;

/// Build the OpenAPI router.
pub fn router() -> Router<AppState> {
    Router::new().route("/openapi.json", get(openapi_json))
}

/// GET /openapi.json: Return the generated OpenAPI specification.
async fn openapi_json() -> Json<utoipa::openapi::OpenApi> {
    Json(ApiDoc::openapi())
}
