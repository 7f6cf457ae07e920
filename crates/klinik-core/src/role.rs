//! # Roles
//!
//! The three roles of the clinic. A role decides which routes a session may
//! reach and which appointment transitions it may drive. Roles are compared
//! for exact equality; there is no privilege ordering.

use std::str::FromStr;

use serde::{Deserialize, Serialize};

use crate::error::ValidationError;

/// Role attached to a user account and carried in the session.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Role {
    /// Books, views and cancels own appointments.
    Patient,
    /// Records consultation results for assigned appointments.
    Doctor,
    /// Approves, reschedules and cancels any appointment.
    Admin,
}

impl Role {
    /// All roles, in declaration order.
    pub const ALL: [Role; 3] = [Role::Patient, Role::Doctor, Role::Admin];

    /// Stored and serialized form.
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Patient => "patient",
            Self::Doctor => "doctor",
            Self::Admin => "admin",
        }
    }

    /// Landing page after login.
    pub fn dashboard_path(&self) -> &'static str {
        match self {
            Self::Patient => "/pasien/dashboard",
            Self::Doctor => "/dokter/dashboard",
            Self::Admin => "/admin/dashboard",
        }
    }
}

impl FromStr for Role {
    type Err = ValidationError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "patient" => Ok(Self::Patient),
            "doctor" => Ok(Self::Doctor),
            "admin" => Ok(Self::Admin),
            other => Err(ValidationError::UnknownRole(other.to_string())),
        }
    }
}

impl std::fmt::Display for Role {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}
