//! # Clinic Store
//!
//! One handle over the two persistence backends:
//!
//! - **Postgres** when `DATABASE_URL` is set (`crate::db`).
//! - **Memory** otherwise, for development and tests (`memory`).
//!
//! Every appointment update is conditional on the status it expects to find
//! (see [`UpdateGuard`]) and reports whether a row was written. A `false`
//! return means another writer got there first; the caller turns that into
//! a conflict instead of silently overwriting.

pub mod memory;

use chrono::{DateTime, NaiveDate, Utc};
use sqlx::PgPool;
use thiserror::Error;

use klinik_core::{AppointmentId, ConsultationDate, Nik, RegistrationNumber, UserId};
use klinik_state::{Appointment, AppointmentStatus, NewUser, User};

use crate::db;
pub use memory::MemoryStore;

/// Persistence failures.
#[derive(Error, Debug)]
pub enum StoreError {
    /// A unique column already holds this value.
    #[error("{0} already exists")]
    Duplicate(&'static str),

    /// A referenced row does not exist.
    #[error("referenced {0} does not exist")]
    MissingReference(&'static str),

    /// A stored row could not be mapped back into the domain model.
    #[error("stored record is corrupt: {0}")]
    Corrupt(String),

    /// The database driver reported an error.
    #[error("database error: {0}")]
    Database(#[from] sqlx::Error),
}

/// Appointment data before the store assigns an ID.
#[derive(Debug, Clone)]
pub struct NewAppointment {
    pub registration_number: RegistrationNumber,
    pub patient_id: UserId,
    pub consultation_date: ConsultationDate,
    pub created_at: DateTime<Utc>,
}

/// An appointment joined with the display names of its patient and doctor.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AppointmentListing {
    pub appointment: Appointment,
    pub patient_name: String,
    pub doctor_name: Option<String>,
}

/// Precondition an update re-checks against the stored row.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum UpdateGuard {
    /// Stored status is pending or approved.
    Approval,
    /// Stored status is pending or approved.
    Reschedule,
    /// Stored status is approved and the stored doctor is the completing one.
    Completion,
    /// Stored status is pending or approved.
    Cancellation,
}

impl UpdateGuard {
    /// Whether `stored` may be replaced by `updated`.
    pub fn admits(&self, stored: &Appointment, updated: &Appointment) -> bool {
        match self {
            Self::Approval | Self::Reschedule | Self::Cancellation => stored.status.is_active(),
            Self::Completion => {
                stored.status == AppointmentStatus::Approved
                    && stored.assigned_doctor().is_some()
                    && stored.assigned_doctor() == updated.assigned_doctor()
            }
        }
    }
}

/// Persistence handle shared by all request handlers.
#[derive(Debug, Clone)]
pub enum ClinicStore {
    Postgres(PgPool),
    Memory(MemoryStore),
}

impl ClinicStore {
    /// An empty in-memory store.
    pub fn in_memory() -> Self {
        Self::Memory(MemoryStore::new())
    }

    /// Name of the active backend, for logs.
    pub fn backend(&self) -> &'static str {
        match self {
            Self::Postgres(_) => "postgres",
            Self::Memory(_) => "memory",
        }
    }

    /// Cheap connectivity probe for readiness checks.
    pub async fn ping(&self) -> Result<(), StoreError> {
        match self {
            Self::Postgres(pool) => {
                sqlx::query("SELECT 1").execute(pool).await?;
                Ok(())
            }
            Self::Memory(_) => Ok(()),
        }
    }

    // -- Users ---------------------------------------------------------------

    pub async fn create_user(&self, new: NewUser) -> Result<User, StoreError> {
        match self {
            Self::Postgres(pool) => db::users::insert(pool, &new).await,
            Self::Memory(mem) => mem.create_user(new),
        }
    }

    pub async fn find_user_by_nik(&self, nik: &Nik) -> Result<Option<User>, StoreError> {
        match self {
            Self::Postgres(pool) => db::users::get_by_nik(pool, nik).await,
            Self::Memory(mem) => Ok(mem.find_user_by_nik(nik)),
        }
    }

    pub async fn find_user_by_id(&self, id: UserId) -> Result<Option<User>, StoreError> {
        match self {
            Self::Postgres(pool) => db::users::get_by_id(pool, id).await,
            Self::Memory(mem) => Ok(mem.find_user_by_id(id)),
        }
    }

    /// All users with the doctor role, ordered by name.
    pub async fn list_doctors(&self) -> Result<Vec<User>, StoreError> {
        match self {
            Self::Postgres(pool) => db::users::list_doctors(pool).await,
            Self::Memory(mem) => Ok(mem.list_doctors()),
        }
    }

    // -- Appointments: writes ------------------------------------------------

    /// Insert a pending appointment.
    pub async fn create_appointment(
        &self,
        new: NewAppointment,
    ) -> Result<Appointment, StoreError> {
        match self {
            Self::Postgres(pool) => db::appointments::insert(pool, &new).await,
            Self::Memory(mem) => mem.create_appointment(new),
        }
    }

    /// Persist doctor and time of an approved appointment.
    pub async fn update_approval(&self, apt: &Appointment) -> Result<bool, StoreError> {
        match self {
            Self::Postgres(pool) => db::appointments::update_approval(pool, apt).await,
            Self::Memory(mem) => Ok(mem.update_guarded(apt, UpdateGuard::Approval)),
        }
    }

    /// Persist doctor, date and time of a rescheduled appointment.
    pub async fn update_reschedule(&self, apt: &Appointment) -> Result<bool, StoreError> {
        match self {
            Self::Postgres(pool) => db::appointments::update_reschedule(pool, apt).await,
            Self::Memory(mem) => Ok(mem.update_guarded(apt, UpdateGuard::Reschedule)),
        }
    }

    /// Persist the clinical notes of a completed appointment.
    pub async fn update_completion(&self, apt: &Appointment) -> Result<bool, StoreError> {
        match self {
            Self::Postgres(pool) => db::appointments::update_completion(pool, apt).await,
            Self::Memory(mem) => Ok(mem.update_guarded(apt, UpdateGuard::Completion)),
        }
    }

    /// Persist a cancellation.
    pub async fn update_cancellation(&self, apt: &Appointment) -> Result<bool, StoreError> {
        match self {
            Self::Postgres(pool) => db::appointments::update_cancellation(pool, apt).await,
            Self::Memory(mem) => Ok(mem.update_guarded(apt, UpdateGuard::Cancellation)),
        }
    }

    // -- Appointments: queries -----------------------------------------------

    pub async fn find_appointment(
        &self,
        id: AppointmentId,
    ) -> Result<Option<AppointmentListing>, StoreError> {
        match self {
            Self::Postgres(pool) => db::appointments::get_by_id(pool, id).await,
            Self::Memory(mem) => Ok(mem.find_appointment(id)),
        }
    }

    /// Pending appointments, oldest booking first.
    pub async fn find_pending(&self) -> Result<Vec<AppointmentListing>, StoreError> {
        match self {
            Self::Postgres(pool) => db::appointments::list_pending(pool).await,
            Self::Memory(mem) => Ok(mem.find_pending()),
        }
    }

    /// Approved appointments of `doctor` on `date`, by time slot.
    pub async fn find_by_doctor_on(
        &self,
        doctor: UserId,
        date: NaiveDate,
    ) -> Result<Vec<AppointmentListing>, StoreError> {
        match self {
            Self::Postgres(pool) => db::appointments::list_for_doctor_on(pool, doctor, date).await,
            Self::Memory(mem) => Ok(mem.find_by_doctor_on(doctor, date)),
        }
    }

    /// Pending and approved appointments of `patient`, soonest first.
    pub async fn find_active_by_patient(
        &self,
        patient: UserId,
    ) -> Result<Vec<AppointmentListing>, StoreError> {
        match self {
            Self::Postgres(pool) => db::appointments::list_active_for_patient(pool, patient).await,
            Self::Memory(mem) => Ok(mem.find_active_by_patient(patient)),
        }
    }

    /// Every appointment of `patient`, most recent consultation date first.
    pub async fn find_history_by_patient(
        &self,
        patient: UserId,
    ) -> Result<Vec<AppointmentListing>, StoreError> {
        match self {
            Self::Postgres(pool) => db::appointments::list_history_for_patient(pool, patient).await,
            Self::Memory(mem) => Ok(mem.find_history_by_patient(patient)),
        }
    }

    /// Every appointment: pending, approved, completed, cancelled; each
    /// group by consultation date ascending.
    pub async fn find_all(&self) -> Result<Vec<AppointmentListing>, StoreError> {
        match self {
            Self::Postgres(pool) => db::appointments::list_all(pool).await,
            Self::Memory(mem) => Ok(mem.find_all()),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use klinik_core::ConsultationTime;
    use klinik_state::DoctorAssignment;

    fn pending() -> Appointment {
        Appointment::book(
            AppointmentId(1),
            RegistrationNumber::from_stored("REG-1-20250601090000".into()),
            UserId(1),
            ConsultationDate::parse("2025-06-01").unwrap(),
            Utc::now(),
        )
    }

    fn assigned(doctor: i64) -> DoctorAssignment {
        DoctorAssignment {
            doctor_id: UserId(doctor),
            time: ConsultationTime::parse("09:00").unwrap(),
        }
    }

    #[test]
    fn approval_guard_admits_active_rows() {
        let stored = pending();
        let mut updated = stored.clone();
        updated.approve(assigned(2)).unwrap();
        assert!(UpdateGuard::Approval.admits(&stored, &updated));
        assert!(UpdateGuard::Approval.admits(&updated, &updated));
    }

    #[test]
    fn cancellation_guard_refuses_terminal_rows() {
        let mut stored = pending();
        stored.cancel().unwrap();
        assert!(!UpdateGuard::Cancellation.admits(&stored, &stored));
    }

    #[test]
    fn completion_guard_requires_same_doctor() {
        let mut stored = pending();
        stored.approve(assigned(2)).unwrap();

        let mut other = stored.clone();
        other.assignment = Some(assigned(3));
        assert!(!UpdateGuard::Completion.admits(&stored, &other));
        assert!(UpdateGuard::Completion.admits(&stored, &stored));
        assert!(!UpdateGuard::Completion.admits(&pending(), &stored));
    }

    #[tokio::test]
    async fn memory_backend_ping_succeeds() {
        let store = ClinicStore::in_memory();
        assert_eq!(store.backend(), "memory");
        assert!(store.ping().await.is_ok());
    }
}
