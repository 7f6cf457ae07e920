//! # Appointment Lifecycle State Machine
//!
//! Models a clinic appointment from booking to consultation.
//!
//! ## States
//!
//! ```text
//! (book) ──▶ Pending ──▶ Approved ──▶ Completed (terminal)
//!               │  ▲         │ ▲
//!               │  └─reschedule┘ └─ approve / reschedule (overwrite doctor, time)
//!               │            │
//!               └────────────┴──▶ Cancelled (terminal)
//! ```
//!
//! ## Invariants
//!
//! - A doctor is assigned if and only if the status is `Approved` or `Completed`.
//! - The consultation time travels with the doctor in [`DoctorAssignment`], so
//!   it is present exactly when a doctor is.
//! - Clinical notes are present if and only if the status is `Completed`.
//!
//! Every transition method validates the source state before mutating and
//! leaves the record untouched when it returns an error.

use std::str::FromStr;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use thiserror::Error;

use klinik_core::{
    AppointmentId, ConsultationDate, ConsultationTime, RegistrationNumber, UserId,
    ValidationError,
};

const MAX_NOTE_LEN: usize = 4000;

// ─── Status ──────────────────────────────────────────────────────────

/// Lifecycle status of an appointment.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AppointmentStatus {
    /// Booked by the patient, waiting for admin triage.
    Pending,
    /// Doctor and time assigned by the admin.
    Approved,
    /// Consultation recorded by the assigned doctor (terminal).
    Completed,
    /// Cancelled by the patient or an admin (terminal).
    Cancelled,
}

impl AppointmentStatus {
    pub const ALL: [AppointmentStatus; 4] = [
        AppointmentStatus::Pending,
        AppointmentStatus::Approved,
        AppointmentStatus::Completed,
        AppointmentStatus::Cancelled,
    ];

    /// Stored form, also used in the `status` column.
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Pending => "pending",
            Self::Approved => "approved",
            Self::Completed => "completed",
            Self::Cancelled => "cancelled",
        }
    }

    /// Whether no further transition is possible.
    pub fn is_terminal(&self) -> bool {
        matches!(self, Self::Completed | Self::Cancelled)
    }

    /// Whether the appointment still occupies the patient's schedule.
    pub fn is_active(&self) -> bool {
        matches!(self, Self::Pending | Self::Approved)
    }

    /// Sort key for the admin overview: pending first, cancelled last.
    pub fn priority(&self) -> u8 {
        match self {
            Self::Pending => 1,
            Self::Approved => 2,
            Self::Completed => 3,
            Self::Cancelled => 4,
        }
    }

    /// Whether a transition from `self` to `to` is legal.
    ///
    /// `Approved → Approved` is legal: re-approval and rescheduling
    /// overwrite the assignment without changing the status.
    pub fn can_transition_to(&self, to: AppointmentStatus) -> bool {
        use AppointmentStatus::*;
        matches!(
            (self, to),
            (Pending, Approved)
                | (Approved, Approved)
                | (Approved, Completed)
                | (Pending, Cancelled)
                | (Approved, Cancelled)
        )
    }
}

impl FromStr for AppointmentStatus {
    type Err = AppointmentError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "pending" => Ok(Self::Pending),
            "approved" => Ok(Self::Approved),
            "completed" => Ok(Self::Completed),
            "cancelled" => Ok(Self::Cancelled),
            other => Err(AppointmentError::UnknownStatus(other.to_string())),
        }
    }
}

impl std::fmt::Display for AppointmentStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

// ─── Errors ──────────────────────────────────────────────────────────

/// Errors raised by appointment transitions.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum AppointmentError {
    /// The transition is not legal from the current status.
    #[error("appointment {id}: cannot move from {from} to {to}")]
    InvalidTransition {
        id: AppointmentId,
        from: AppointmentStatus,
        to: AppointmentStatus,
    },

    /// The appointment is completed or cancelled.
    #[error("appointment {id} is {state} and can no longer change")]
    TerminalState {
        id: AppointmentId,
        state: AppointmentStatus,
    },

    /// A doctor tried to complete an appointment assigned to someone else.
    #[error("appointment {id} is not assigned to doctor {doctor}")]
    NotAssignedDoctor { id: AppointmentId, doctor: UserId },

    /// A stored status string is not recognised.
    #[error("unknown appointment status {0:?}")]
    UnknownStatus(String),

    /// A record violates one of the lifecycle invariants.
    #[error("appointment {id} violates invariant: {reason}")]
    InvariantViolated {
        id: AppointmentId,
        reason: &'static str,
    },
}

// ─── Assignment & clinical notes ─────────────────────────────────────

/// Doctor and time slot, assigned together on approval or reschedule.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DoctorAssignment {
    pub doctor_id: UserId,
    pub time: ConsultationTime,
}

/// Consultation results recorded by the doctor.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ClinicalNotes {
    symptoms: String,
    diagnosis: String,
    prescription: String,
}

impl ClinicalNotes {
    /// Build notes from form input. All three fields are required.
    pub fn new(
        symptoms: &str,
        diagnosis: &str,
        prescription: &str,
    ) -> Result<Self, ValidationError> {
        Ok(Self {
            symptoms: note_field("symptoms", symptoms)?,
            diagnosis: note_field("diagnosis", diagnosis)?,
            prescription: note_field("prescription", prescription)?,
        })
    }

    pub fn symptoms(&self) -> &str {
        &self.symptoms
    }

    pub fn diagnosis(&self) -> &str {
        &self.diagnosis
    }

    pub fn prescription(&self) -> &str {
        &self.prescription
    }
}

fn note_field(field: &'static str, value: &str) -> Result<String, ValidationError> {
    let trimmed = value.trim();
    if trimmed.is_empty() {
        return Err(ValidationError::MissingField(field));
    }
    if trimmed.chars().count() > MAX_NOTE_LEN {
        return Err(ValidationError::TooLong {
            field,
            max: MAX_NOTE_LEN,
        });
    }
    Ok(trimmed.to_string())
}

// ─── Appointment ─────────────────────────────────────────────────────

/// An appointment and its lifecycle state.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Appointment {
    pub id: AppointmentId,
    pub registration_number: RegistrationNumber,
    pub patient_id: UserId,
    pub consultation_date: ConsultationDate,
    pub status: AppointmentStatus,
    pub assignment: Option<DoctorAssignment>,
    pub clinical_notes: Option<ClinicalNotes>,
    pub created_at: DateTime<Utc>,
}

impl Appointment {
    /// A freshly booked appointment: pending, no doctor, no notes.
    pub fn book(
        id: AppointmentId,
        registration_number: RegistrationNumber,
        patient_id: UserId,
        consultation_date: ConsultationDate,
        created_at: DateTime<Utc>,
    ) -> Self {
        Self {
            id,
            registration_number,
            patient_id,
            consultation_date,
            status: AppointmentStatus::Pending,
            assignment: None,
            clinical_notes: None,
            created_at,
        }
    }

    /// Assign doctor and time (PENDING or APPROVED → APPROVED).
    ///
    /// Approving an already approved appointment overwrites the assignment.
    pub fn approve(&mut self, assignment: DoctorAssignment) -> Result<(), AppointmentError> {
        self.require_one_of(
            &[AppointmentStatus::Pending, AppointmentStatus::Approved],
            AppointmentStatus::Approved,
        )?;
        self.assignment = Some(assignment);
        self.status = AppointmentStatus::Approved;
        Ok(())
    }

    /// Move to a new doctor, date and time (PENDING or APPROVED → APPROVED).
    ///
    /// A pending appointment that is rescheduled receives a doctor and
    /// therefore becomes approved.
    pub fn reschedule(
        &mut self,
        assignment: DoctorAssignment,
        date: ConsultationDate,
    ) -> Result<(), AppointmentError> {
        self.require_one_of(
            &[AppointmentStatus::Pending, AppointmentStatus::Approved],
            AppointmentStatus::Approved,
        )?;
        self.assignment = Some(assignment);
        self.consultation_date = date;
        self.status = AppointmentStatus::Approved;
        Ok(())
    }

    /// Record consultation results (APPROVED → COMPLETED).
    ///
    /// Only the assigned doctor may complete the appointment.
    pub fn complete(
        &mut self,
        doctor: UserId,
        notes: ClinicalNotes,
    ) -> Result<(), AppointmentError> {
        self.require_one_of(&[AppointmentStatus::Approved], AppointmentStatus::Completed)?;
        if self.assigned_doctor() != Some(doctor) {
            return Err(AppointmentError::NotAssignedDoctor {
                id: self.id,
                doctor,
            });
        }
        self.clinical_notes = Some(notes);
        self.status = AppointmentStatus::Completed;
        Ok(())
    }

    /// Cancel the appointment (PENDING or APPROVED → CANCELLED).
    ///
    /// The doctor assignment is released.
    pub fn cancel(&mut self) -> Result<(), AppointmentError> {
        self.require_one_of(
            &[AppointmentStatus::Pending, AppointmentStatus::Approved],
            AppointmentStatus::Cancelled,
        )?;
        self.assignment = None;
        self.status = AppointmentStatus::Cancelled;
        Ok(())
    }

    pub fn assigned_doctor(&self) -> Option<UserId> {
        self.assignment.as_ref().map(|a| a.doctor_id)
    }

    pub fn consultation_time(&self) -> Option<&ConsultationTime> {
        self.assignment.as_ref().map(|a| &a.time)
    }

    pub fn is_owned_by(&self, patient: UserId) -> bool {
        self.patient_id == patient
    }

    /// Verify the lifecycle invariants hold for this record.
    pub fn check_invariants(&self) -> Result<(), AppointmentError> {
        let doctor_expected = matches!(
            self.status,
            AppointmentStatus::Approved | AppointmentStatus::Completed
        );
        if self.assignment.is_some() != doctor_expected {
            return Err(AppointmentError::InvariantViolated {
                id: self.id,
                reason: "doctor assigned iff approved or completed",
            });
        }
        let notes_expected = self.status == AppointmentStatus::Completed;
        if self.clinical_notes.is_some() != notes_expected {
            return Err(AppointmentError::InvariantViolated {
                id: self.id,
                reason: "clinical notes present iff completed",
            });
        }
        Ok(())
    }

    fn require_one_of(
        &self,
        allowed: &[AppointmentStatus],
        target: AppointmentStatus,
    ) -> Result<(), AppointmentError> {
        if self.status.is_terminal() {
            return Err(AppointmentError::TerminalState {
                id: self.id,
                state: self.status,
            });
        }
        if !allowed.contains(&self.status) {
            return Err(AppointmentError::InvalidTransition {
                id: self.id,
                from: self.status,
                to: target,
            });
        }
        Ok(())
    }
}

// ─── Tests ───────────────────────────────────────────────────────────
