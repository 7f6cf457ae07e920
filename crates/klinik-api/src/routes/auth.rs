//! # Public Routes
//!
//! Login, logout and patient self-registration. Successful login and
//! registration write a fresh session cookie and redirect to the role's
//! dashboard.

use axum::extract::rejection::FormRejection;
use axum::extract::State;
use axum::response::Redirect;
use axum::routing::{get, post};
use axum::{Form, Json, Router};
use axum_extra::extract::PrivateCookieJar;
use chrono::Utc;
use serde::Deserialize;
use utoipa::ToSchema;

use klinik_core::{validate_name, validate_password, Nik};

use crate::error::AppError;
use crate::extractors::{extract_form, extract_validated_form, Validate};
use crate::lifecycle::Registration;
use crate::session;
use crate::state::AppState;
use crate::views::{LoginPage, RegisterPage};

/// Login form.
#[derive(Deserialize, ToSchema)]
pub struct LoginForm {
    #[serde(default)]
    pub nik: String,
    #[serde(default)]
    pub password: String,
}

/// Patient registration form.
#[derive(Deserialize, ToSchema)]
pub struct RegisterForm {
    #[serde(default)]
    pub nik: String,
    #[serde(default)]
    pub nama: String,
    #[serde(default)]
    pub password: String,
    #[serde(default)]
    pub confirm_password: String,
}

impl Validate for RegisterForm {
    fn validate(&self) -> Result<(), AppError> {
        Nik::parse(&self.nik)?;
        validate_name(&self.nama)?;
        validate_password(&self.password, &self.confirm_password)?;
        Ok(())
    }
}

pub fn router() -> Router<AppState> {
    Router::new()
        .route("/", get(login_page))
        .route("/login", post(login))
        .route("/logout", get(logout))
        .route("/register", get(register_page).post(register))
}

/// GET /: Login page.
#[utoipa::path(
    get,
    path = "/",
    responses((status = 200, description = "Login page", body = LoginPage)),
    tag = "auth"
)]
pub async fn login_page() -> Json<LoginPage> {
    Json(LoginPage::default())
}

/// POST /login: Verify NIK and password, start a session.
#[utoipa::path(
    post,
    path = "/login",
    request_body(content = LoginForm, content_type = "application/x-www-form-urlencoded"),
    responses(
        (status = 303, description = "Signed in, redirect to the role dashboard"),
        (status = 401, description = "Invalid NIK or password"),
    ),
    tag = "auth"
)]
pub async fn login(
    State(state): State<AppState>,
    jar: PrivateCookieJar,
    body: Result<Form<LoginForm>, FormRejection>,
) -> Result<(PrivateCookieJar, Redirect), AppError> {
    let form = extract_form(body)?;
    let user = state.clinic.authenticate(&form.nik, &form.password).await?;
    let jar = session::start(jar, &state.session, &user, Utc::now());
    Ok((jar, Redirect::to(user.role.dashboard_path())))
}

/// GET /logout: End the session.
#[utoipa::path(
    get,
    path = "/logout",
    responses((status = 303, description = "Signed out, redirect to the login page")),
    tag = "auth"
)]
pub async fn logout(
    State(state): State<AppState>,
    jar: PrivateCookieJar,
) -> (PrivateCookieJar, Redirect) {
    (session::end(jar, &state.session), Redirect::to("/"))
}

/// GET /register: Registration page.
#[utoipa::path(
    get,
    path = "/register",
    responses((status = 200, description = "Registration page", body = RegisterPage)),
    tag = "auth"
)]
pub async fn register_page() -> Json<RegisterPage> {
    Json(RegisterPage::default())
}

/// POST /register: Create a patient account and sign it in.
#[utoipa::path(
    post,
    path = "/register",
    request_body(content = RegisterForm, content_type = "application/x-www-form-urlencoded"),
    responses(
        (status = 303, description = "Registered, redirect to the patient dashboard"),
        (status = 400, description = "Invalid NIK, name or password"),
        (status = 409, description = "NIK already registered"),
    ),
    tag = "auth"
)]
pub async fn register(
    State(state): State<AppState>,
    jar: PrivateCookieJar,
    body: Result<Form<RegisterForm>, FormRejection>,
) -> Result<(PrivateCookieJar, Redirect), AppError> {
    let form = extract_validated_form(body)?;
    let user = state
        .clinic
        .register(Registration {
            nik: &form.nik,
            name: &form.nama,
            password: &form.password,
            confirm_password: &form.confirm_password,
        })
        .await?;
    let jar = session::start(jar, &state.session, &user, Utc::now());
    Ok((jar, Redirect::to(user.role.dashboard_path())))
}
