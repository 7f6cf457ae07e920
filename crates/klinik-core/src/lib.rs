//! # klinik-core: Foundational Types for the Clinic System
//!
//! Defines the domain primitives every other crate in the workspace builds on.
//! It depends on nothing internal.
//!
//! ## Key Design Principles
//!
//! 1. **Newtype wrappers for identifiers.** `UserId`, `AppointmentId`, `Nik`,
//!    `RegistrationNumber` are distinct types. You cannot pass a patient's
//!    user ID where an appointment ID is expected.
//!
//! 2. **Validated constructors.** `Nik::parse`, `ConsultationDate::parse` and
//!    `ConsultationTime::parse` are the only ways to build those values from
//!    form input, so a value that exists has already been validated.
//!
//! 3. **Single `Role` enum.** Exhaustive `match` on the three roles everywhere
//!    a role decides a route or a transition.
//!
//! ## Crate Policy
//!
//! - No dependencies on other `klinik-*` crates.
//! - No `unsafe` code.
//! - No `panic!()` or `.unwrap()` outside tests.

pub mod error;
pub mod identity;
pub mod role;
pub mod temporal;

pub use error::ValidationError;
pub use identity::{
    validate_name, validate_password, AppointmentId, Nik, RegistrationNumber, UserId,
    MIN_PASSWORD_LEN, NIK_LEN,
};
pub use role::Role;
pub use temporal::{ConsultationDate, ConsultationTime};
