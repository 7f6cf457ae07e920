//! # Appointment Lifecycle Controller
//!
//! [`Clinic`] is the single entry point for everything the HTTP handlers do:
//! account registration and login, the five appointment transitions, and
//! the read queries behind each dashboard.
//!
//! Each transition loads the appointment, applies the state machine from
//! `klinik_state`, and persists through a status-guarded store update. If
//! the guard finds the row changed underneath, the request fails with a
//! conflict instead of overwriting a concurrent writer.
//!
//! Role checks happen twice: once in the route gate and again here, so the
//! controller is safe to call from other entry points (the CLI, tests).

use chrono::{Local, NaiveDate, Utc};

use klinik_core::{
    validate_name, validate_password, AppointmentId, ConsultationDate, ConsultationTime, Nik,
    RegistrationNumber, Role, UserId,
};
use klinik_state::{Appointment, ClinicalNotes, DoctorAssignment, NewUser, User};

use crate::error::AppError;
use crate::session::SessionContext;
use crate::store::{AppointmentListing, ClinicStore, NewAppointment};

/// Verified against when the NIK is unknown, so a failed login costs the
/// same whether or not the account exists.
const DUMMY_HASH: &str = "$2b$12$R9h/cIPz0gi.URNNX3kh2OPST9/PgBkqquzi.Ss7KIUgO2t0jWMUW";

const INVALID_CREDENTIALS: &str = "invalid NIK or password";

/// Registration form input, already split into fields.
#[derive(Debug, Clone)]
pub struct Registration<'a> {
    pub nik: &'a str,
    pub name: &'a str,
    pub password: &'a str,
    pub confirm_password: &'a str,
}

/// Clinic workflow over an injected store.
#[derive(Debug, Clone)]
pub struct Clinic {
    store: ClinicStore,
    bcrypt_cost: u32,
}

impl Clinic {
    pub fn new(store: ClinicStore, bcrypt_cost: u32) -> Self {
        Self { store, bcrypt_cost }
    }

    pub fn store(&self) -> &ClinicStore {
        &self.store
    }

    // -- Accounts --------------------------------------------------------------

    /// Self-registration. Always creates a patient.
    pub async fn register(&self, form: Registration<'_>) -> Result<User, AppError> {
        let nik = Nik::parse(form.nik)?;
        let name = validate_name(form.name)?;
        validate_password(form.password, form.confirm_password)?;
        let user = self.provision(nik, name, form.password, Role::Patient).await?;
        tracing::info!(user_id = %user.id, "patient registered");
        Ok(user)
    }

    /// Create an account with any role. Used by registration and by the
    /// operator CLI for doctor and admin accounts.
    pub async fn provision(
        &self,
        nik: Nik,
        name: String,
        password: &str,
        role: Role,
    ) -> Result<User, AppError> {
        if self.store.find_user_by_nik(&nik).await?.is_some() {
            return Err(AppError::Conflict(format!("NIK {nik} is already registered")));
        }
        let password_hash = hash_password(password, self.bcrypt_cost).await?;
        let user = self
            .store
            .create_user(NewUser {
                nik,
                name,
                password_hash,
                role,
            })
            .await?;
        Ok(user)
    }

    /// Check a NIK and password. Unknown NIK and wrong password are
    /// indistinguishable to the caller.
    pub async fn authenticate(&self, nik: &str, password: &str) -> Result<User, AppError> {
        let user = match Nik::parse(nik) {
            Ok(nik) => self.store.find_user_by_nik(&nik).await?,
            Err(_) => None,
        };
        let hash = user
            .as_ref()
            .map_or(DUMMY_HASH, |u| u.password_hash.as_str())
            .to_string();
        let matches = verify_password(password.to_string(), hash).await?;

        match user {
            Some(user) if matches => {
                tracing::info!(user_id = %user.id, role = %user.role, "login succeeded");
                Ok(user)
            }
            _ => {
                tracing::info!("login failed");
                Err(AppError::Unauthorized(INVALID_CREDENTIALS.into()))
            }
        }
    }

    // -- Transitions -----------------------------------------------------------

    /// Book a consultation for the calling patient.
    pub async fn book(&self, actor: &SessionContext, date: &str) -> Result<Appointment, AppError> {
        actor.require(Role::Patient)?;
        let consultation_date = ConsultationDate::parse(date)?;
        let now = Utc::now();
        let apt = self
            .store
            .create_appointment(NewAppointment {
                registration_number: RegistrationNumber::generate(
                    actor.user_id,
                    now.with_timezone(&Local).naive_local(),
                ),
                patient_id: actor.user_id,
                consultation_date,
                created_at: now,
            })
            .await?;
        tracing::info!(
            appointment_id = %apt.id,
            patient_id = %actor.user_id,
            registration_number = %apt.registration_number,
            date = %apt.consultation_date,
            "appointment booked"
        );
        Ok(apt)
    }

    /// Assign a doctor and time slot.
    pub async fn approve(
        &self,
        actor: &SessionContext,
        id: AppointmentId,
        doctor: &str,
        time: &str,
    ) -> Result<Appointment, AppError> {
        actor.require(Role::Admin)?;
        let assignment = self.assignment(doctor, time).await?;
        let mut apt = self.load(id).await?.appointment;
        apt.approve(assignment)?;
        if !self.store.update_approval(&apt).await? {
            return Err(changed_underneath(id));
        }
        tracing::info!(
            appointment_id = %id,
            doctor_id = ?apt.assigned_doctor(),
            admin_id = %actor.user_id,
            "appointment approved"
        );
        Ok(apt)
    }

    /// Move to a new doctor, date and time slot.
    pub async fn reschedule(
        &self,
        actor: &SessionContext,
        id: AppointmentId,
        doctor: &str,
        date: &str,
        time: &str,
    ) -> Result<Appointment, AppError> {
        actor.require(Role::Admin)?;
        let assignment = self.assignment(doctor, time).await?;
        let date = ConsultationDate::parse(date)?;
        let mut apt = self.load(id).await?.appointment;
        apt.reschedule(assignment, date)?;
        if !self.store.update_reschedule(&apt).await? {
            return Err(changed_underneath(id));
        }
        tracing::info!(
            appointment_id = %id,
            doctor_id = ?apt.assigned_doctor(),
            date = %apt.consultation_date,
            admin_id = %actor.user_id,
            "appointment rescheduled"
        );
        Ok(apt)
    }

    /// Record the consultation. Only the assigned doctor may do this.
    pub async fn complete(
        &self,
        actor: &SessionContext,
        id: AppointmentId,
        notes: ClinicalNotes,
    ) -> Result<Appointment, AppError> {
        actor.require(Role::Doctor)?;
        let mut apt = self.load(id).await?.appointment;
        apt.complete(actor.user_id, notes)?;
        if !self.store.update_completion(&apt).await? {
            return Err(changed_underneath(id));
        }
        tracing::info!(appointment_id = %id, doctor_id = %actor.user_id, "consultation completed");
        Ok(apt)
    }

    /// Cancel a pending or approved appointment. Patients may cancel only
    /// their own; admins may cancel any. Another patient's appointment is
    /// reported as not found, the same as an unknown id.
    pub async fn cancel(
        &self,
        actor: &SessionContext,
        id: AppointmentId,
    ) -> Result<Appointment, AppError> {
        let mut apt = self.load(id).await?.appointment;
        match actor.role {
            Role::Admin => {}
            Role::Patient if apt.is_owned_by(actor.user_id) => {}
            Role::Patient => {
                tracing::warn!(appointment_id = %id, user_id = %actor.user_id, "cancel of foreign appointment");
                return Err(AppError::NotFound(format!("appointment {id}")));
            }
            Role::Doctor => {
                return Err(AppError::Forbidden("doctors cannot cancel appointments".into()))
            }
        }
        apt.cancel()?;
        if !self.store.update_cancellation(&apt).await? {
            return Err(changed_underneath(id));
        }
        tracing::info!(appointment_id = %id, by = %actor.role, user_id = %actor.user_id, "appointment cancelled");
        Ok(apt)
    }

    // -- Queries ---------------------------------------------------------------

    pub async fn appointment(&self, id: AppointmentId) -> Result<AppointmentListing, AppError> {
        self.load(id).await
    }

    /// An appointment the calling doctor is assigned to.
    pub async fn consultation(
        &self,
        actor: &SessionContext,
        id: AppointmentId,
    ) -> Result<AppointmentListing, AppError> {
        actor.require(Role::Doctor)?;
        let listing = self.load(id).await?;
        if listing.appointment.assigned_doctor() != Some(actor.user_id) {
            return Err(AppError::Forbidden(format!(
                "appointment {id} is not assigned to you"
            )));
        }
        Ok(listing)
    }

    pub async fn pending(&self) -> Result<Vec<AppointmentListing>, AppError> {
        Ok(self.store.find_pending().await?)
    }

    pub async fn overview(&self) -> Result<Vec<AppointmentListing>, AppError> {
        Ok(self.store.find_all().await?)
    }

    /// Approved appointments of the calling doctor on `date`.
    pub async fn schedule(
        &self,
        actor: &SessionContext,
        date: NaiveDate,
    ) -> Result<Vec<AppointmentListing>, AppError> {
        actor.require(Role::Doctor)?;
        Ok(self.store.find_by_doctor_on(actor.user_id, date).await?)
    }

    pub async fn active_for(&self, patient: UserId) -> Result<Vec<AppointmentListing>, AppError> {
        Ok(self.store.find_active_by_patient(patient).await?)
    }

    pub async fn history_for(&self, patient: UserId) -> Result<Vec<AppointmentListing>, AppError> {
        Ok(self.store.find_history_by_patient(patient).await?)
    }

    pub async fn doctors(&self) -> Result<Vec<User>, AppError> {
        Ok(self.store.list_doctors().await?)
    }

    // -- Helpers ---------------------------------------------------------------

    async fn load(&self, id: AppointmentId) -> Result<AppointmentListing, AppError> {
        self.store
            .find_appointment(id)
            .await?
            .ok_or_else(|| AppError::NotFound(format!("appointment {id}")))
    }

    /// Parse and check the doctor/time pair of an approve or reschedule form.
    async fn assignment(&self, doctor: &str, time: &str) -> Result<DoctorAssignment, AppError> {
        let doctor_id: UserId = doctor.parse()?;
        let time = ConsultationTime::parse(time)?;
        match self.store.find_user_by_id(doctor_id).await? {
            Some(user) if user.is_doctor() => Ok(DoctorAssignment { doctor_id, time }),
            Some(_) => Err(AppError::Validation(format!("user {doctor_id} is not a doctor"))),
            None => Err(AppError::NotFound(format!("doctor {doctor_id}"))),
        }
    }
}

fn changed_underneath(id: AppointmentId) -> AppError {
    tracing::warn!(appointment_id = %id, "guarded update matched no row");
    AppError::Conflict(format!("appointment {id} was changed by another request"))
}

/// The calendar date used for "today" on the doctor dashboard.
pub fn today() -> NaiveDate {
    Local::now().date_naive()
}

/// Hash a password on the blocking pool.
pub async fn hash_password(password: &str, cost: u32) -> Result<String, AppError> {
    let password = password.to_string();
    tokio::task::spawn_blocking(move || bcrypt::hash(password, cost))
        .await
        .map_err(|e| AppError::Internal(format!("hashing task failed: {e}")))?
        .map_err(|e| AppError::Internal(format!("bcrypt: {e}")))
}

async fn verify_password(password: String, hash: String) -> Result<bool, AppError> {
    let verified = tokio::task::spawn_blocking(move || bcrypt::verify(password, &hash))
        .await
        .map_err(|e| AppError::Internal(format!("verification task failed: {e}")))?;
    // A malformed stored hash fails the login rather than the request.
    Ok(verified.unwrap_or(false))
}

#[cfg(test)]
mod tests {
    use super::*;
    use klinik_state::AppointmentStatus;

    const COST: u32 = 4;

    fn clinic() -> Clinic {
        Clinic::new(ClinicStore::in_memory(), COST)
    }

    async fn account(clinic: &Clinic, nik: &str, name: &str, role: Role) -> SessionContext {
        let user = clinic
            .provision(Nik::parse(nik).unwrap(), name.into(), "secret1", role)
            .await
            .unwrap();
        SessionContext::for_user(&user)
    }

    struct Cast {
        clinic: Clinic,
        patient: SessionContext,
        other_patient: SessionContext,
        doctor: SessionContext,
        other_doctor: SessionContext,
        admin: SessionContext,
    }

    async fn cast() -> Cast {
        let clinic = clinic();
        Cast {
            patient: account(&clinic, "3201000000000001", "Siti", Role::Patient).await,
            other_patient: account(&clinic, "3201000000000002", "Budi", Role::Patient).await,
            doctor: account(&clinic, "3201000000000003", "dr. Andi", Role::Doctor).await,
            other_doctor: account(&clinic, "3201000000000004", "dr. Sari", Role::Doctor).await,
            admin: account(&clinic, "3201000000000005", "Admin", Role::Admin).await,
            clinic,
        }
    }

    fn notes() -> ClinicalNotes {
        ClinicalNotes::new("fever", "influenza", "paracetamol").unwrap()
    }

    #[tokio::test]
    async fn register_creates_patient() {
        let clinic = clinic();
        let user = clinic
            .register(Registration {
                nik: "3201000000000001",
                name: "Siti",
                password: "secret1",
                confirm_password: "secret1",
            })
            .await
            .unwrap();
        assert_eq!(user.role, Role::Patient);
        assert_ne!(user.password_hash, "secret1");
    }

    #[tokio::test]
    async fn register_rejects_bad_input() {
        let clinic = clinic();
        for (nik, pw, confirm) in [
            ("320100000000001", "secret1", "secret1"),
            ("32010000000000011", "secret1", "secret1"),
            ("3201000000000001", "secret1", "secret2"),
            ("3201000000000001", "abc", "abc"),
        ] {
            let err = clinic
                .register(Registration {
                    nik,
                    name: "Siti",
                    password: pw,
                    confirm_password: confirm,
                })
                .await
                .unwrap_err();
            assert!(matches!(err, AppError::Validation(_)), "{nik} {pw} {confirm}");
        }
    }

    #[tokio::test]
    async fn register_duplicate_nik_conflicts() {
        let clinic = clinic();
        let form = Registration {
            nik: "3201000000000001",
            name: "Siti",
            password: "secret1",
            confirm_password: "secret1",
        };
        clinic.register(form.clone()).await.unwrap();
        let err = clinic.register(form).await.unwrap_err();
        assert!(matches!(err, AppError::Conflict(_)));
    }

    #[tokio::test]
    async fn authenticate_hides_account_existence() {
        let c = cast().await;
        let user = c.clinic.authenticate("3201000000000003", "secret1").await.unwrap();
        assert_eq!(user.role, Role::Doctor);

        let wrong_pw = c.clinic.authenticate("3201000000000003", "nope").await.unwrap_err();
        let unknown = c.clinic.authenticate("3201999999999999", "secret1").await.unwrap_err();
        let malformed = c.clinic.authenticate("123", "secret1").await.unwrap_err();
        assert_eq!(wrong_pw.to_string(), unknown.to_string());
        assert_eq!(unknown.to_string(), malformed.to_string());
        assert!(matches!(wrong_pw, AppError::Unauthorized(_)));
    }

    #[tokio::test]
    async fn full_lifecycle() {
        let c = cast().await;
        let apt = c.clinic.book(&c.patient, "2025-06-01").await.unwrap();
        assert_eq!(apt.status, AppointmentStatus::Pending);
        assert!(apt
            .registration_number
            .as_str()
            .starts_with(&format!("REG-{}-", c.patient.user_id)));

        let pending = c.clinic.pending().await.unwrap();
        assert_eq!(pending.len(), 1);

        let doctor = c.doctor.user_id.to_string();
        c.clinic.approve(&c.admin, apt.id, &doctor, "09:00").await.unwrap();

        let day = NaiveDate::from_ymd_opt(2025, 6, 1).unwrap();
        let schedule = c.clinic.schedule(&c.doctor, day).await.unwrap();
        assert_eq!(schedule.len(), 1);
        assert!(c
            .clinic
            .schedule(&c.doctor, day.succ_opt().unwrap())
            .await
            .unwrap()
            .is_empty());
        assert!(c.clinic.schedule(&c.other_doctor, day).await.unwrap().is_empty());

        c.clinic.complete(&c.doctor, apt.id, notes()).await.unwrap();

        let history = c.clinic.history_for(c.patient.user_id).await.unwrap();
        assert_eq!(history.len(), 1);
        let done = &history[0].appointment;
        assert_eq!(done.status, AppointmentStatus::Completed);
        let recorded = done.clinical_notes.as_ref().unwrap();
        assert_eq!(recorded.diagnosis(), "influenza");
        assert!(c.clinic.active_for(c.patient.user_id).await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn only_patients_book() {
        let c = cast().await;
        let err = c.clinic.book(&c.admin, "2025-06-01").await.unwrap_err();
        assert!(matches!(err, AppError::Forbidden(_)));
        let err = c.clinic.book(&c.patient, "").await.unwrap_err();
        assert!(matches!(err, AppError::Validation(_)));
    }

    #[tokio::test]
    async fn approve_requires_a_doctor() {
        let c = cast().await;
        let apt = c.clinic.book(&c.patient, "2025-06-01").await.unwrap();

        let admin_id = c.admin.user_id.to_string();
        let err = c.clinic.approve(&c.admin, apt.id, &admin_id, "09:00").await.unwrap_err();
        assert!(matches!(err, AppError::Validation(_)));

        let err = c.clinic.approve(&c.admin, apt.id, "999", "09:00").await.unwrap_err();
        assert!(matches!(err, AppError::NotFound(_)));

        let doctor = c.doctor.user_id.to_string();
        let err = c.clinic.approve(&c.admin, apt.id, &doctor, "  ").await.unwrap_err();
        assert!(matches!(err, AppError::Validation(_)));

        let err = c.clinic.approve(&c.admin, AppointmentId(999), &doctor, "09:00").await.unwrap_err();
        assert!(matches!(err, AppError::NotFound(_)));
    }

    #[tokio::test]
    async fn reapproval_overwrites_assignment() {
        let c = cast().await;
        let apt = c.clinic.book(&c.patient, "2025-06-01").await.unwrap();
        let first = c.doctor.user_id.to_string();
        let second = c.other_doctor.user_id.to_string();
        c.clinic.approve(&c.admin, apt.id, &first, "09:00").await.unwrap();
        let apt = c.clinic.approve(&c.admin, apt.id, &second, "10:00").await.unwrap();
        assert_eq!(apt.assigned_doctor(), Some(c.other_doctor.user_id));
        assert_eq!(apt.consultation_time().unwrap().as_str(), "10:00");
    }

    #[tokio::test]
    async fn reschedule_moves_date_and_approves() {
        let c = cast().await;
        let apt = c.clinic.book(&c.patient, "2025-06-01").await.unwrap();
        let doctor = c.doctor.user_id.to_string();
        let apt = c
            .clinic
            .reschedule(&c.admin, apt.id, &doctor, "2025-06-03", "13:00")
            .await
            .unwrap();
        assert_eq!(apt.status, AppointmentStatus::Approved);
        assert_eq!(apt.consultation_date.to_string(), "2025-06-03");

        c.clinic.cancel(&c.admin, apt.id).await.unwrap();
        let err = c
            .clinic
            .reschedule(&c.admin, apt.id, &doctor, "2025-06-04", "13:00")
            .await
            .unwrap_err();
        assert!(matches!(err, AppError::Conflict(_)));
    }

    #[tokio::test]
    async fn only_assigned_doctor_completes() {
        let c = cast().await;
        let apt = c.clinic.book(&c.patient, "2025-06-01").await.unwrap();
        let err = c.clinic.complete(&c.doctor, apt.id, notes()).await.unwrap_err();
        assert!(matches!(err, AppError::Conflict(_)));

        let doctor = c.doctor.user_id.to_string();
        c.clinic.approve(&c.admin, apt.id, &doctor, "09:00").await.unwrap();
        let err = c.clinic.complete(&c.other_doctor, apt.id, notes()).await.unwrap_err();
        assert!(matches!(err, AppError::Forbidden(_)));
        let err = c.clinic.consultation(&c.other_doctor, apt.id).await.unwrap_err();
        assert!(matches!(err, AppError::Forbidden(_)));
        assert!(c.clinic.consultation(&c.doctor, apt.id).await.is_ok());
    }

    #[tokio::test]
    async fn cancel_rules() {
        let c = cast().await;
        let apt = c.clinic.book(&c.patient, "2025-06-01").await.unwrap();

        let foreign = c.clinic.cancel(&c.other_patient, apt.id).await.unwrap_err();
        let unknown = c
            .clinic
            .cancel(&c.other_patient, AppointmentId(apt.id.get() + 100))
            .await
            .unwrap_err();
        assert!(matches!(foreign, AppError::NotFound(_)));
        assert!(matches!(unknown, AppError::NotFound(_)));
        let err = c.clinic.cancel(&c.doctor, apt.id).await.unwrap_err();
        assert!(matches!(err, AppError::Forbidden(_)));

        let cancelled = c.clinic.cancel(&c.patient, apt.id).await.unwrap();
        assert_eq!(cancelled.status, AppointmentStatus::Cancelled);
        assert_eq!(cancelled.assigned_doctor(), None);
    }

    #[tokio::test]
    async fn cancelling_completed_is_rejected_and_status_kept() {
        let c = cast().await;
        let apt = c.clinic.book(&c.patient, "2025-06-01").await.unwrap();
        let doctor = c.doctor.user_id.to_string();
        c.clinic.approve(&c.admin, apt.id, &doctor, "09:00").await.unwrap();
        c.clinic.complete(&c.doctor, apt.id, notes()).await.unwrap();

        let err = c.clinic.cancel(&c.admin, apt.id).await.unwrap_err();
        assert!(matches!(err, AppError::Conflict(_)));
        let stored = c.clinic.appointment(apt.id).await.unwrap();
        assert_eq!(stored.appointment.status, AppointmentStatus::Completed);
    }

    #[tokio::test]
    async fn pending_list_is_fifo() {
        let c = cast().await;
        let first = c.clinic.book(&c.patient, "2025-06-20").await.unwrap();
        let second = c.clinic.book(&c.other_patient, "2025-06-01").await.unwrap();
        let ids: Vec<_> = c
            .clinic
            .pending()
            .await
            .unwrap()
            .into_iter()
            .map(|l| l.appointment.id)
            .collect();
        assert_eq!(ids, vec![first.id, second.id]);
    }

    #[tokio::test]
    async fn patient_lists_are_ordered_by_consultation_date() {
        let c = cast().await;
        let mut booked = Vec::new();
        for (n, date) in ["2025-06-20", "2025-06-01", "2025-06-10"].into_iter().enumerate() {
            let apt = c
                .clinic
                .store()
                .create_appointment(NewAppointment {
                    registration_number: RegistrationNumber::from_stored(format!(
                        "REG-{}-2025050108000{n}",
                        c.patient.user_id
                    )),
                    patient_id: c.patient.user_id,
                    consultation_date: ConsultationDate::parse(date).unwrap(),
                    created_at: Utc::now(),
                })
                .await
                .unwrap();
            booked.push(apt);
        }
        let (june_20, june_01, june_10) = (booked[0].id, booked[1].id, booked[2].id);
        c.clinic.cancel(&c.patient, june_10).await.unwrap();

        let ids = |rows: Vec<AppointmentListing>| -> Vec<AppointmentId> {
            rows.into_iter().map(|l| l.appointment.id).collect()
        };
        let history = ids(c.clinic.history_for(c.patient.user_id).await.unwrap());
        assert_eq!(history, vec![june_20, june_10, june_01]);

        let active = ids(c.clinic.active_for(c.patient.user_id).await.unwrap());
        assert_eq!(active, vec![june_01, june_20]);
    }
}
