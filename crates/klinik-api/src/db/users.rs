//! User persistence operations.
//!
//! All functions take a `&PgPool` and operate on the `users` table. NIK
//! uniqueness is enforced by the column constraint and surfaces as
//! [`StoreError::Duplicate`].

use chrono::{DateTime, Utc};
use sqlx::PgPool;

use klinik_core::{Nik, Role, UserId};
use klinik_state::{NewUser, User};

use crate::store::StoreError;

const USER_COLUMNS: &str = "user_id, nik, nama, password_hash, role, created_at";

/// Insert a new account and return it with its assigned ID.
pub async fn insert(pool: &PgPool, new: &NewUser) -> Result<User, StoreError> {
    let row = sqlx::query_as::<_, UserRow>(&format!(
        "INSERT INTO users (nik, nama, password_hash, role)
         VALUES ($1, $2, $3, $4)
         RETURNING {USER_COLUMNS}"
    ))
    .bind(new.nik.as_str())
    .bind(&new.name)
    .bind(&new.password_hash)
    .bind(new.role.as_str())
    .fetch_one(pool)
    .await
    .map_err(|e| super::map_write_error(e, "nik"))?;

    row.into_user()
}

/// Fetch an account by national-ID.
pub async fn get_by_nik(pool: &PgPool, nik: &Nik) -> Result<Option<User>, StoreError> {
    let row = sqlx::query_as::<_, UserRow>(&format!(
        "SELECT {USER_COLUMNS} FROM users WHERE nik = $1"
    ))
    .bind(nik.as_str())
    .fetch_optional(pool)
    .await?;

    row.map(UserRow::into_user).transpose()
}

/// Fetch an account by ID.
pub async fn get_by_id(pool: &PgPool, id: UserId) -> Result<Option<User>, StoreError> {
    let row = sqlx::query_as::<_, UserRow>(&format!(
        "SELECT {USER_COLUMNS} FROM users WHERE user_id = $1"
    ))
    .bind(id.get())
    .fetch_optional(pool)
    .await?;

    row.map(UserRow::into_user).transpose()
}

/// All doctors, ordered by name.
pub async fn list_doctors(pool: &PgPool) -> Result<Vec<User>, StoreError> {
    let rows = sqlx::query_as::<_, UserRow>(&format!(
        "SELECT {USER_COLUMNS} FROM users WHERE role = $1 ORDER BY nama, user_id"
    ))
    .bind(Role::Doctor.as_str())
    .fetch_all(pool)
    .await?;

    rows.into_iter().map(UserRow::into_user).collect()
}

/// Internal row type for SQLx mapping.
#[derive(sqlx::FromRow)]
struct UserRow {
    user_id: i64,
    nik: String,
    nama: String,
    password_hash: String,
    role: String,
    created_at: DateTime<Utc>,
}

impl UserRow {
    fn into_user(self) -> Result<User, StoreError> {
        let nik = Nik::parse(&self.nik).map_err(|e| {
            tracing::error!(user_id = self.user_id, error = %e, "malformed NIK in users table");
            StoreError::Corrupt(format!("user {}: {e}", self.user_id))
        })?;
        let role: Role = self.role.parse().map_err(|e| {
            tracing::error!(user_id = self.user_id, role = %self.role, "unknown role in users table");
            StoreError::Corrupt(format!("user {}: {e}", self.user_id))
        })?;
        Ok(User {
            id: UserId(self.user_id),
            nik,
            name: self.nama,
            password_hash: self.password_hash,
            role,
            created_at: self.created_at,
        })
    }
}
