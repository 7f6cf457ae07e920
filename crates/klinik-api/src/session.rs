//! # Session & Role Gate
//!
//! Sessions live in a single private cookie (`klinik_session`), encrypted
//! and authenticated with the key held in [`SessionConfig`]. The payload is
//! small JSON:
//!
//! ```text
//! { "authenticated": true, "user_id": 12, "name": "Siti", "role": "patient", "issued_at": 1717200000 }
//! ```
//!
//! ## Gate
//!
//! - [`require_auth`] decrypts the cookie and inserts a typed
//!   [`SessionContext`] into request extensions. A missing, tampered,
//!   expired or signed-out session redirects to `/`.
//! - [`require_role`] compares the context's role with the role the route
//!   group requires. A mismatch is a 403.
//!
//! Handlers pull the context with the [`SessionContext`] extractor.
//! Logout rewrites the cookie with `authenticated = false`.

use axum::extract::{FromRequestParts, Request};
use axum::http::request::Parts;
use axum::middleware::Next;
use axum::response::{IntoResponse, Response};
use axum_extra::extract::cookie::{Cookie, Key, SameSite};
use axum_extra::extract::PrivateCookieJar;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use klinik_core::{Role, UserId};
use klinik_state::User;

use crate::error::AppError;

/// Name of the session cookie.
pub const SESSION_COOKIE: &str = "klinik_session";

/// Default session lifetime: one clinic shift.
pub const DEFAULT_SESSION_TTL_SECS: u64 = 8 * 60 * 60;

// ── Configuration ───────────────────────────────────────────────────────────

/// Cookie key, lifetime and transport flag, injected into request
/// extensions.
///
/// Custom `Debug` redacts the key.
#[derive(Clone)]
pub struct SessionConfig {
    key: Key,
    ttl_secs: i64,
    secure: bool,
}

impl SessionConfig {
    /// A config issuing `Secure` cookies.
    pub fn new(key: Key, ttl_secs: u64) -> Self {
        Self {
            key,
            ttl_secs: i64::try_from(ttl_secs).unwrap_or(i64::MAX),
            secure: true,
        }
    }

    /// Whether the cookie carries the `Secure` attribute. Turn off only for
    /// plain-HTTP development.
    pub fn with_secure(mut self, secure: bool) -> Self {
        self.secure = secure;
        self
    }

    pub fn secure(&self) -> bool {
        self.secure
    }

    pub fn key(&self) -> &Key {
        &self.key
    }

    pub fn ttl_secs(&self) -> i64 {
        self.ttl_secs
    }
}

impl std::fmt::Debug for SessionConfig {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SessionConfig")
            .field("key", &"[REDACTED]")
            .field("ttl_secs", &self.ttl_secs)
            .field("secure", &self.secure)
            .finish()
    }
}

// ── Session data ────────────────────────────────────────────────────────────

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
struct SessionPayload {
    authenticated: bool,
    user_id: UserId,
    name: String,
    role: Role,
    issued_at: i64,
}

/// The signed-in user, as seen by handlers.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SessionContext {
    pub user_id: UserId,
    pub name: String,
    pub role: Role,
}

impl SessionContext {
    pub fn for_user(user: &User) -> Self {
        Self {
            user_id: user.id,
            name: user.name.clone(),
            role: user.role,
        }
    }

    /// Fail with 403 unless the caller holds `role`.
    pub fn require(&self, role: Role) -> Result<(), AppError> {
        if self.role == role {
            Ok(())
        } else {
            Err(AppError::Forbidden(format!(
                "role '{role}' required, caller has '{}'",
                self.role
            )))
        }
    }
}

/// Axum `FromRequestParts` implementation for `SessionContext`.
///
/// Extracts the context that [`require_auth`] injected into extensions.
/// Redirects to the login page if none is present.
impl<S: Send + Sync> FromRequestParts<S> for SessionContext {
    type Rejection = AppError;

    async fn from_request_parts(parts: &mut Parts, _state: &S) -> Result<Self, Self::Rejection> {
        parts
            .extensions
            .get::<SessionContext>()
            .cloned()
            .ok_or(AppError::Unauthenticated)
    }
}

// ── Cookie handling ─────────────────────────────────────────────────────────

/// Write a fresh authenticated session for `user`.
pub fn start(
    jar: PrivateCookieJar,
    config: &SessionConfig,
    user: &User,
    now: DateTime<Utc>,
) -> PrivateCookieJar {
    let payload = SessionPayload {
        authenticated: true,
        user_id: user.id,
        name: user.name.clone(),
        role: user.role,
        issued_at: now.timestamp(),
    };
    write(jar, config, &payload)
}

/// Mark the current session as signed out. A jar without a session is
/// returned unchanged.
pub fn end(jar: PrivateCookieJar, config: &SessionConfig) -> PrivateCookieJar {
    match read(&jar) {
        Some(mut payload) => {
            payload.authenticated = false;
            write(jar, config, &payload)
        }
        None => jar,
    }
}

/// The signed-in user, if the jar holds a live authenticated session.
pub fn current(
    jar: &PrivateCookieJar,
    ttl_secs: i64,
    now: DateTime<Utc>,
) -> Option<SessionContext> {
    let payload = read(jar)?;
    if !payload.authenticated {
        return None;
    }
    let age = now.timestamp().saturating_sub(payload.issued_at);
    if !(0..=ttl_secs).contains(&age) {
        tracing::debug!(user_id = %payload.user_id, age, "session expired");
        return None;
    }
    Some(SessionContext {
        user_id: payload.user_id,
        name: payload.name,
        role: payload.role,
    })
}

fn read(jar: &PrivateCookieJar) -> Option<SessionPayload> {
    let cookie = jar.get(SESSION_COOKIE)?;
    serde_json::from_str(cookie.value()).ok()
}

fn write(
    jar: PrivateCookieJar,
    config: &SessionConfig,
    payload: &SessionPayload,
) -> PrivateCookieJar {
    let value = match serde_json::to_string(payload) {
        Ok(v) => v,
        Err(e) => {
            tracing::error!(error = %e, "failed to encode session payload");
            return jar;
        }
    };
    let cookie = Cookie::build((SESSION_COOKIE, value))
        .path("/")
        .http_only(true)
        .secure(config.secure())
        .same_site(SameSite::Lax);
    jar.add(cookie)
}

// ── Middleware ───────────────────────────────────────────────────────────────

/// Require a live authenticated session.
///
/// Reads [`SessionConfig`] from request extensions, decrypts the session
/// cookie and injects [`SessionContext`] for downstream handlers.
pub async fn require_auth(mut request: Request, next: Next) -> Response {
    let Some(config) = request.extensions().get::<SessionConfig>().cloned() else {
        return AppError::Internal("session config not installed".into()).into_response();
    };

    let jar = PrivateCookieJar::from_headers(request.headers(), config.key().clone());
    match current(&jar, config.ttl_secs(), Utc::now()) {
        Some(context) => {
            request.extensions_mut().insert(context);
            next.run(request).await
        }
        None => {
            tracing::debug!(path = %request.uri().path(), "no live session, redirecting to login");
            AppError::Unauthenticated.into_response()
        }
    }
}

/// Require the session's role to be exactly `required`.
pub async fn require_role(required: Role, request: Request, next: Next) -> Response {
    let outcome = match request.extensions().get::<SessionContext>() {
        Some(context) => context.require(required).map_err(|e| {
            tracing::warn!(
                user_id = %context.user_id,
                role = %context.role,
                required = %required,
                path = %request.uri().path(),
                "role mismatch"
            );
            e
        }),
        None => Err(AppError::Unauthenticated),
    };
    match outcome {
        Ok(()) => next.run(request).await,
        Err(e) => e.into_response(),
    }
}

pub async fn require_patient(request: Request, next: Next) -> Response {
    require_role(Role::Patient, request, next).await
}

pub async fn require_admin(request: Request, next: Next) -> Response {
    require_role(Role::Admin, request, next).await
}

pub async fn require_doctor(request: Request, next: Next) -> Response {
    require_role(Role::Doctor, request, next).await
}
