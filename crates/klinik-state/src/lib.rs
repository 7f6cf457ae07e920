//! # klinik-state: Appointment Lifecycle
//!
//! The state machine at the centre of the clinic system, plus the user
//! record it refers to.
//!
//! ## State Machines
//!
//! - **Appointment** (`appointment.rs`): `Pending → Approved → Completed`,
//!   with `Cancelled` reachable from `Pending` and `Approved`. Completed and
//!   cancelled appointments are terminal.
//!
//! ## Design
//!
//! The status is an enum with validated transitions rather than typestate
//! types: appointments are loaded from the database with a runtime status
//! and transitions are driven by HTTP requests, so the check has to happen
//! at runtime anyway. Doctor and time live together in `DoctorAssignment`,
//! which makes "time present iff doctor assigned" structural.

pub mod appointment;
pub mod user;

pub use appointment::{
    Appointment, AppointmentError, AppointmentStatus, ClinicalNotes, DoctorAssignment,
};
pub use user::{NewUser, User};
