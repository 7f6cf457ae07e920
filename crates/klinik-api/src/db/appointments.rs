//! Appointment persistence operations.
//!
//! All functions take a `&PgPool` and operate on the `appointments` table,
//! joined with `users` for patient and doctor names. Lifecycle rules are
//! enforced by `klinik_state::Appointment`; each UPDATE repeats the source
//! status check in its `WHERE` clause so that a concurrent transition makes
//! it affect zero rows instead of overwriting.

use chrono::{DateTime, NaiveDate, Utc};
use sqlx::PgPool;

use klinik_core::{
    AppointmentId, ConsultationDate, ConsultationTime, RegistrationNumber, UserId,
};
use klinik_state::{Appointment, AppointmentStatus, ClinicalNotes, DoctorAssignment};

use crate::store::{AppointmentListing, NewAppointment, StoreError};

const LISTING_SELECT: &str = "SELECT a.appointment_id, a.nomor_registrasi, a.patient_id, a.doctor_id,
            a.tanggal_konsultasi, a.waktu_konsultasi, a.status,
            a.gejala, a.diagnosa, a.resep_obat, a.created_at,
            up.nama AS nama_pasien, ud.nama AS nama_dokter
     FROM appointments a
     JOIN users up ON up.user_id = a.patient_id
     LEFT JOIN users ud ON ud.user_id = a.doctor_id";

/// Insert a pending appointment and return it with its assigned ID.
pub async fn insert(pool: &PgPool, new: &NewAppointment) -> Result<Appointment, StoreError> {
    let (id,): (i64,) = sqlx::query_as(
        "INSERT INTO appointments (nomor_registrasi, patient_id, tanggal_konsultasi, status, created_at)
         VALUES ($1, $2, $3, $4, $5)
         RETURNING appointment_id",
    )
    .bind(new.registration_number.as_str())
    .bind(new.patient_id.get())
    .bind(new.consultation_date.as_naive())
    .bind(AppointmentStatus::Pending.as_str())
    .bind(new.created_at)
    .fetch_one(pool)
    .await
    .map_err(|e| super::map_write_error(e, "registration number"))?;

    Ok(Appointment::book(
        AppointmentId(id),
        new.registration_number.clone(),
        new.patient_id,
        new.consultation_date,
        new.created_at,
    ))
}

/// Assign doctor and time; valid only from pending or approved.
pub async fn update_approval(pool: &PgPool, apt: &Appointment) -> Result<bool, StoreError> {
    let (doctor, time) = assignment_columns(apt)?;
    let result = sqlx::query(
        "UPDATE appointments
         SET doctor_id = $1, waktu_konsultasi = $2, status = $3
         WHERE appointment_id = $4 AND status IN ('pending', 'approved')",
    )
    .bind(doctor)
    .bind(time)
    .bind(apt.status.as_str())
    .bind(apt.id.get())
    .execute(pool)
    .await?;

    Ok(result.rows_affected() > 0)
}

/// Assign doctor, date and time; valid only from pending or approved.
pub async fn update_reschedule(pool: &PgPool, apt: &Appointment) -> Result<bool, StoreError> {
    let (doctor, time) = assignment_columns(apt)?;
    let result = sqlx::query(
        "UPDATE appointments
         SET doctor_id = $1, tanggal_konsultasi = $2, waktu_konsultasi = $3, status = $4
         WHERE appointment_id = $5 AND status IN ('pending', 'approved')",
    )
    .bind(doctor)
    .bind(apt.consultation_date.as_naive())
    .bind(time)
    .bind(apt.status.as_str())
    .bind(apt.id.get())
    .execute(pool)
    .await?;

    Ok(result.rows_affected() > 0)
}

/// Record clinical notes; valid only when approved for the same doctor.
pub async fn update_completion(pool: &PgPool, apt: &Appointment) -> Result<bool, StoreError> {
    let (doctor, _) = assignment_columns(apt)?;
    let notes = apt.clinical_notes.as_ref().ok_or_else(|| {
        StoreError::Corrupt(format!("appointment {} completed without notes", apt.id))
    })?;
    let result = sqlx::query(
        "UPDATE appointments
         SET gejala = $1, diagnosa = $2, resep_obat = $3, status = $4
         WHERE appointment_id = $5 AND status = 'approved' AND doctor_id = $6",
    )
    .bind(notes.symptoms())
    .bind(notes.diagnosis())
    .bind(notes.prescription())
    .bind(apt.status.as_str())
    .bind(apt.id.get())
    .bind(doctor)
    .execute(pool)
    .await?;

    Ok(result.rows_affected() > 0)
}

/// Cancel and release the doctor assignment; valid only from pending or
/// approved.
pub async fn update_cancellation(pool: &PgPool, apt: &Appointment) -> Result<bool, StoreError> {
    let result = sqlx::query(
        "UPDATE appointments
         SET status = $1, doctor_id = NULL, waktu_konsultasi = NULL
         WHERE appointment_id = $2 AND status IN ('pending', 'approved')",
    )
    .bind(apt.status.as_str())
    .bind(apt.id.get())
    .execute(pool)
    .await?;

    Ok(result.rows_affected() > 0)
}

/// Fetch one appointment by ID.
pub async fn get_by_id(
    pool: &PgPool,
    id: AppointmentId,
) -> Result<Option<AppointmentListing>, StoreError> {
    let row = sqlx::query_as::<_, ListingRow>(&format!(
        "{LISTING_SELECT} WHERE a.appointment_id = $1"
    ))
    .bind(id.get())
    .fetch_optional(pool)
    .await?;

    row.map(ListingRow::into_listing).transpose()
}

/// Pending appointments, oldest booking first.
pub async fn list_pending(pool: &PgPool) -> Result<Vec<AppointmentListing>, StoreError> {
    let rows = sqlx::query_as::<_, ListingRow>(&format!(
        "{LISTING_SELECT}
         WHERE a.status = 'pending'
         ORDER BY a.created_at ASC, a.appointment_id ASC"
    ))
    .fetch_all(pool)
    .await?;

    collect(rows)
}

/// Approved appointments of one doctor on one date.
pub async fn list_for_doctor_on(
    pool: &PgPool,
    doctor: UserId,
    date: NaiveDate,
) -> Result<Vec<AppointmentListing>, StoreError> {
    let rows = sqlx::query_as::<_, ListingRow>(&format!(
        "{LISTING_SELECT}
         WHERE a.doctor_id = $1 AND a.tanggal_konsultasi = $2 AND a.status = 'approved'
         ORDER BY a.waktu_konsultasi ASC, a.appointment_id ASC"
    ))
    .bind(doctor.get())
    .bind(date)
    .fetch_all(pool)
    .await?;

    collect(rows)
}

/// Pending and approved appointments of one patient, soonest first.
pub async fn list_active_for_patient(
    pool: &PgPool,
    patient: UserId,
) -> Result<Vec<AppointmentListing>, StoreError> {
    let rows = sqlx::query_as::<_, ListingRow>(&format!(
        "{LISTING_SELECT}
         WHERE a.patient_id = $1 AND a.status IN ('pending', 'approved')
         ORDER BY a.tanggal_konsultasi ASC, a.appointment_id ASC"
    ))
    .bind(patient.get())
    .fetch_all(pool)
    .await?;

    collect(rows)
}

/// Every appointment of one patient, most recent consultation first.
pub async fn list_history_for_patient(
    pool: &PgPool,
    patient: UserId,
) -> Result<Vec<AppointmentListing>, StoreError> {
    let rows = sqlx::query_as::<_, ListingRow>(&format!(
        "{LISTING_SELECT}
         WHERE a.patient_id = $1
         ORDER BY a.tanggal_konsultasi DESC, a.appointment_id DESC"
    ))
    .bind(patient.get())
    .fetch_all(pool)
    .await?;

    collect(rows)
}

/// Every appointment, grouped by status priority then by date.
pub async fn list_all(pool: &PgPool) -> Result<Vec<AppointmentListing>, StoreError> {
    let rows = sqlx::query_as::<_, ListingRow>(&format!(
        "{LISTING_SELECT}
         ORDER BY CASE a.status
                      WHEN 'pending' THEN 1
                      WHEN 'approved' THEN 2
                      WHEN 'completed' THEN 3
                      ELSE 4
                  END,
                  a.tanggal_konsultasi ASC,
                  a.appointment_id ASC"
    ))
    .fetch_all(pool)
    .await?;

    collect(rows)
}

fn assignment_columns(apt: &Appointment) -> Result<(i64, &str), StoreError> {
    apt.assignment
        .as_ref()
        .map(|a| (a.doctor_id.get(), a.time.as_str()))
        .ok_or_else(|| {
            StoreError::Corrupt(format!("appointment {} has no doctor assignment", apt.id))
        })
}

fn collect(rows: Vec<ListingRow>) -> Result<Vec<AppointmentListing>, StoreError> {
    rows.into_iter().map(ListingRow::into_listing).collect()
}

/// Internal row type for SQLx mapping.
#[derive(sqlx::FromRow)]
struct ListingRow {
    appointment_id: i64,
    nomor_registrasi: String,
    patient_id: i64,
    doctor_id: Option<i64>,
    tanggal_konsultasi: NaiveDate,
    waktu_konsultasi: Option<String>,
    status: String,
    gejala: Option<String>,
    diagnosa: Option<String>,
    resep_obat: Option<String>,
    created_at: DateTime<Utc>,
    nama_pasien: String,
    nama_dokter: Option<String>,
}

impl ListingRow {
    fn into_listing(self) -> Result<AppointmentListing, StoreError> {
        let id = AppointmentId(self.appointment_id);
        let corrupt = |what: String| {
            tracing::error!(appointment_id = %id, problem = %what, "corrupt appointment row");
            StoreError::Corrupt(format!("appointment {id}: {what}"))
        };

        let status: AppointmentStatus = self.status.parse().map_err(|e| corrupt(format!("{e}")))?;

        let assignment = match (self.doctor_id, self.waktu_konsultasi) {
            (Some(doctor), Some(time)) => Some(DoctorAssignment {
                doctor_id: UserId(doctor),
                time: ConsultationTime::parse(&time).map_err(|e| corrupt(e.to_string()))?,
            }),
            (None, None) => None,
            _ => return Err(corrupt("doctor and time must be set together".into())),
        };

        let clinical_notes = match (self.gejala, self.diagnosa, self.resep_obat) {
            (Some(symptoms), Some(diagnosis), Some(prescription)) => Some(
                ClinicalNotes::new(&symptoms, &diagnosis, &prescription)
                    .map_err(|e| corrupt(e.to_string()))?,
            ),
            _ => None,
        };

        let appointment = Appointment {
            id,
            registration_number: RegistrationNumber::from_stored(self.nomor_registrasi),
            patient_id: UserId(self.patient_id),
            consultation_date: ConsultationDate::from_naive(self.tanggal_konsultasi),
            status,
            assignment,
            clinical_notes,
            created_at: self.created_at,
        };
        if let Err(e) = appointment.check_invariants() {
            return Err(corrupt(e.to_string()));
        }

        Ok(AppointmentListing {
            appointment,
            patient_name: self.nama_pasien,
            doctor_name: self.nama_dokter,
        })
    }
}
