//! # User Records
//!
//! Accounts are created once. Patients self-register; doctors and admins are
//! provisioned by an operator. The password is stored only as a bcrypt hash.

use chrono::{DateTime, Utc};
use serde::Serialize;

use klinik_core::{Nik, Role, UserId};

/// A registered account.
///
/// Custom `Debug` redacts the password hash to keep it out of logs. Only
/// serialized outward; accounts are loaded from store rows, never from JSON.
#[derive(Clone, PartialEq, Eq, Serialize)]
pub struct User {
    pub id: UserId,
    pub nik: Nik,
    pub name: String,
    #[serde(skip_serializing)]
    pub password_hash: String,
    pub role: Role,
    pub created_at: DateTime<Utc>,
}

impl User {
    pub fn is_doctor(&self) -> bool {
        self.role == Role::Doctor
    }
}

impl std::fmt::Debug for User {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("User")
            .field("id", &self.id)
            .field("nik", &self.nik)
            .field("name", &self.name)
            .field("password_hash", &"[REDACTED]")
            .field("role", &self.role)
            .field("created_at", &self.created_at)
            .finish()
    }
}

/// Account data before the store assigns an ID.
#[derive(Clone)]
pub struct NewUser {
    pub nik: Nik,
    pub name: String,
    pub password_hash: String,
    pub role: Role,
}

impl std::fmt::Debug for NewUser {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("NewUser")
            .field("nik", &self.nik)
            .field("name", &self.name)
            .field("password_hash", &"[REDACTED]")
            .field("role", &self.role)
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn doctor() -> User {
        User {
            id: UserId(3),
            nik: Nik::parse("3201000000000003").unwrap(),
            name: "dr. Budi".into(),
            password_hash: "$2b$12$abcdefghijklmnopqrstuv".into(),
            role: Role::Doctor,
            created_at: Utc::now(),
        }
    }

    #[test]
    fn debug_redacts_hash() {
        let rendered = format!("{:?}", doctor());
        assert!(rendered.contains("[REDACTED]"));
        assert!(!rendered.contains("$2b$12$"));
    }

    #[test]
    fn serialization_skips_hash() {
        let json = serde_json::to_string(&doctor()).unwrap();
        assert!(!json.contains("password_hash"));
        assert!(json.contains("\"role\":\"doctor\""));
        assert!(json.contains("\"name\":\"dr. Budi\""));
    }

    #[test]
    fn is_doctor_checks_role() {
        let mut user = doctor();
        assert!(user.is_doctor());
        user.role = Role::Admin;
        assert!(!user.is_doctor());
    }
}
