//! # Page View Models
//!
//! One typed struct per page. GET handlers return these as JSON; a
//! front-end renders them. Names are resolved at read time and an
//! unassigned doctor is shown as [`UNASSIGNED_DOCTOR`].

use chrono::{DateTime, NaiveDate, Utc};
use serde::Serialize;
use utoipa::ToSchema;

use klinik_core::{MIN_PASSWORD_LEN, NIK_LEN};
use klinik_state::User;

use crate::store::AppointmentListing;

/// Display value for an appointment without a doctor.
pub const UNASSIGNED_DOCTOR: &str = "not yet assigned";

/// One appointment row as shown on dashboards.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, ToSchema)]
pub struct AppointmentView {
    pub id: i64,
    pub registration_number: String,
    pub patient_name: String,
    pub doctor_name: String,
    pub consultation_date: NaiveDate,
    pub consultation_time: Option<String>,
    /// `pending`, `approved`, `completed` or `cancelled`.
    pub status: String,
    pub created_at: DateTime<Utc>,
}

impl From<&AppointmentListing> for AppointmentView {
    fn from(listing: &AppointmentListing) -> Self {
        let apt = &listing.appointment;
        Self {
            id: apt.id.get(),
            registration_number: apt.registration_number.to_string(),
            patient_name: listing.patient_name.clone(),
            doctor_name: doctor_name(listing),
            consultation_date: apt.consultation_date.as_naive(),
            consultation_time: apt.consultation_time().map(|t| t.to_string()),
            status: apt.status.to_string(),
            created_at: apt.created_at,
        }
    }
}

/// One row of the patient's medical history.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, ToSchema)]
pub struct HistoryEntryView {
    pub id: i64,
    pub registration_number: String,
    pub consultation_date: NaiveDate,
    pub status: String,
    pub doctor_name: String,
    pub symptoms: Option<String>,
    pub diagnosis: Option<String>,
    pub prescription: Option<String>,
}

impl From<&AppointmentListing> for HistoryEntryView {
    fn from(listing: &AppointmentListing) -> Self {
        let apt = &listing.appointment;
        let notes = apt.clinical_notes.as_ref();
        Self {
            id: apt.id.get(),
            registration_number: apt.registration_number.to_string(),
            consultation_date: apt.consultation_date.as_naive(),
            status: apt.status.to_string(),
            doctor_name: doctor_name(listing),
            symptoms: notes.map(|n| n.symptoms().to_string()),
            diagnosis: notes.map(|n| n.diagnosis().to_string()),
            prescription: notes.map(|n| n.prescription().to_string()),
        }
    }
}

/// Entry in the doctor picker of the approve and reschedule forms.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, ToSchema)]
pub struct DoctorOption {
    pub id: i64,
    pub name: String,
}

impl From<&User> for DoctorOption {
    fn from(user: &User) -> Self {
        Self {
            id: user.id.get(),
            name: user.name.clone(),
        }
    }
}

fn doctor_name(listing: &AppointmentListing) -> String {
    listing
        .doctor_name
        .clone()
        .unwrap_or_else(|| UNASSIGNED_DOCTOR.to_string())
}

pub fn appointments(listings: &[AppointmentListing]) -> Vec<AppointmentView> {
    listings.iter().map(AppointmentView::from).collect()
}

pub fn doctor_options(doctors: &[User]) -> Vec<DoctorOption> {
    doctors.iter().map(DoctorOption::from).collect()
}

// ── Pages ───────────────────────────────────────────────────────────────────

/// `GET /`
#[derive(Debug, Clone, Serialize, ToSchema)]
pub struct LoginPage {
    pub title: String,
    pub action: String,
    pub register_path: String,
}

impl Default for LoginPage {
    fn default() -> Self {
        Self {
            title: "Login".into(),
            action: "/login".into(),
            register_path: "/register".into(),
        }
    }
}

/// `GET /register`
#[derive(Debug, Clone, Serialize, ToSchema)]
pub struct RegisterPage {
    pub title: String,
    pub action: String,
    pub nik_length: usize,
    pub min_password_length: usize,
}

impl Default for RegisterPage {
    fn default() -> Self {
        Self {
            title: "Patient registration".into(),
            action: "/register".into(),
            nik_length: NIK_LEN,
            min_password_length: MIN_PASSWORD_LEN,
        }
    }
}

/// `GET /pasien/dashboard`
#[derive(Debug, Clone, Serialize, ToSchema)]
pub struct PatientDashboard {
    pub name: String,
    /// Pending and approved appointments, soonest first.
    pub appointments: Vec<AppointmentView>,
}

/// `GET /pasien/booking`
#[derive(Debug, Clone, Serialize, ToSchema)]
pub struct BookingPage {
    pub name: String,
    pub action: String,
    /// Earliest date offered by the date picker.
    pub min_date: NaiveDate,
}

/// `GET /pasien/riwayat`
#[derive(Debug, Clone, Serialize, ToSchema)]
pub struct HistoryPage {
    pub name: String,
    pub history: Vec<HistoryEntryView>,
}

/// `GET /admin/dashboard`
#[derive(Debug, Clone, Serialize, ToSchema)]
pub struct AdminDashboard {
    pub name: String,
    /// Waiting for triage, oldest booking first.
    pub pending: Vec<AppointmentView>,
    /// Everything, grouped by status then by date.
    pub appointments: Vec<AppointmentView>,
}

/// `GET /admin/approve/{id}` and `GET /admin/reschedule/{id}`
#[derive(Debug, Clone, Serialize, ToSchema)]
pub struct AssignmentPage {
    pub action: String,
    pub appointment: AppointmentView,
    pub doctors: Vec<DoctorOption>,
}

/// `GET /dokter/dashboard`
#[derive(Debug, Clone, Serialize, ToSchema)]
pub struct DoctorDashboard {
    pub name: String,
    pub today: NaiveDate,
    pub appointments: Vec<AppointmentView>,
}

/// `GET /dokter/konsultasi/{id}`
#[derive(Debug, Clone, Serialize, ToSchema)]
pub struct ConsultationPage {
    pub action: String,
    pub appointment: AppointmentView,
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Utc;
    use klinik_core::{
        AppointmentId, ConsultationDate, ConsultationTime, RegistrationNumber, UserId,
    };
    use klinik_state::{Appointment, ClinicalNotes, DoctorAssignment};

    fn listing() -> AppointmentListing {
        AppointmentListing {
            appointment: Appointment::book(
                AppointmentId(4),
                RegistrationNumber::from_stored("REG-2-20250601080000".into()),
                UserId(2),
                ConsultationDate::parse("2025-06-01").unwrap(),
                Utc::now(),
            ),
            patient_name: "Siti".into(),
            doctor_name: None,
        }
    }

    #[test]
    fn unassigned_doctor_placeholder() {
        let view = AppointmentView::from(&listing());
        assert_eq!(view.doctor_name, UNASSIGNED_DOCTOR);
        assert_eq!(view.status, "pending");
        assert_eq!(view.consultation_time, None);
    }

    #[test]
    fn history_entry_carries_notes() {
        let mut l = listing();
        l.appointment
            .approve(DoctorAssignment {
                doctor_id: UserId(3),
                time: ConsultationTime::parse("09:00").unwrap(),
            })
            .unwrap();
        l.appointment
            .complete(
                UserId(3),
                ClinicalNotes::new("cough", "bronchitis", "rest").unwrap(),
            )
            .unwrap();
        l.doctor_name = Some("dr. Andi".into());

        let entry = HistoryEntryView::from(&l);
        assert_eq!(entry.doctor_name, "dr. Andi");
        assert_eq!(entry.status, "completed");
        assert_eq!(entry.diagnosis.as_deref(), Some("bronchitis"));
    }

    #[test]
    fn appointment_view_serializes_date_as_iso() {
        let json = serde_json::to_value(AppointmentView::from(&listing())).unwrap();
        assert_eq!(json["consultation_date"], "2025-06-01");
    }
}
