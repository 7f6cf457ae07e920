//! In-memory backend.
//!
//! Used when `DATABASE_URL` is absent and by the test suites. Records live in
//! [`Table`]s keyed by a monotonically increasing `i64`, mirroring the
//! `BIGSERIAL` keys of the Postgres schema.

use std::collections::BTreeMap;
use std::sync::atomic::{AtomicI64, Ordering};
use std::sync::Arc;

use chrono::NaiveDate;
use parking_lot::RwLock;

use klinik_core::{AppointmentId, Nik, Role, UserId};
use klinik_state::{Appointment, AppointmentStatus, NewUser, User};

use super::{AppointmentListing, NewAppointment, StoreError, UpdateGuard};

// -- Generic table -------------------------------------------------------------

/// Thread-safe, cloneable table with store-assigned keys.
///
/// The lock is `parking_lot` and is never held across `.await`.
#[derive(Debug)]
pub struct Table<T: Clone + Send + Sync> {
    data: Arc<RwLock<BTreeMap<i64, T>>>,
    next_id: Arc<AtomicI64>,
}

impl<T: Clone + Send + Sync> Clone for Table<T> {
    fn clone(&self) -> Self {
        Self {
            data: Arc::clone(&self.data),
            next_id: Arc::clone(&self.next_id),
        }
    }
}

impl<T: Clone + Send + Sync> Table<T> {
    pub fn new() -> Self {
        Self {
            data: Arc::new(RwLock::new(BTreeMap::new())),
            next_id: Arc::new(AtomicI64::new(1)),
        }
    }

    /// Insert a record built from a freshly allocated key.
    ///
    /// `conflicts` is checked against every existing row under the same
    /// write lock as the insert; when it matches, nothing is written and
    /// no key is consumed.
    pub fn insert_unique(
        &self,
        conflicts: impl Fn(&T) -> bool,
        build: impl FnOnce(i64) -> T,
    ) -> Option<T> {
        let mut guard = self.data.write();
        if guard.values().any(conflicts) {
            return None;
        }
        let id = self.next_id.fetch_add(1, Ordering::Relaxed);
        let record = build(id);
        guard.insert(id, record.clone());
        Some(record)
    }

    pub fn get(&self, id: i64) -> Option<T> {
        self.data.read().get(&id).cloned()
    }

    /// All records in key order.
    pub fn list(&self) -> Vec<T> {
        self.data.read().values().cloned().collect()
    }

    /// Records matching `predicate`, in key order.
    pub fn filter(&self, predicate: impl Fn(&T) -> bool) -> Vec<T> {
        self.data
            .read()
            .values()
            .filter(|v| predicate(v))
            .cloned()
            .collect()
    }

    /// Atomically read-validate-update a record.
    ///
    /// Returns `None` if the record doesn't exist, or `Some(result)` with
    /// the closure's `Result`.
    pub fn try_update<R, E>(
        &self,
        id: i64,
        f: impl FnOnce(&mut T) -> Result<R, E>,
    ) -> Option<Result<R, E>> {
        self.data.write().get_mut(&id).map(f)
    }

    #[cfg(test)]
    pub fn len(&self) -> usize {
        self.data.read().len()
    }
}

impl<T: Clone + Send + Sync> Default for Table<T> {
    fn default() -> Self {
        Self::new()
    }
}

// -- Clinic tables -------------------------------------------------------------

/// Users and appointments held in process memory.
#[derive(Debug, Clone, Default)]
pub struct MemoryStore {
    users: Table<User>,
    appointments: Table<Appointment>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn create_user(&self, new: NewUser) -> Result<User, StoreError> {
        let created_at = chrono::Utc::now();
        self.users
            .insert_unique(
                |u| u.nik == new.nik,
                |id| User {
                    id: UserId(id),
                    nik: new.nik.clone(),
                    name: new.name.clone(),
                    password_hash: new.password_hash.clone(),
                    role: new.role,
                    created_at,
                },
            )
            .ok_or(StoreError::Duplicate("nik"))
    }

    pub fn find_user_by_nik(&self, nik: &Nik) -> Option<User> {
        self.users.filter(|u| &u.nik == nik).into_iter().next()
    }

    pub fn find_user_by_id(&self, id: UserId) -> Option<User> {
        self.users.get(id.get())
    }

    pub fn list_doctors(&self) -> Vec<User> {
        let mut doctors = self.users.filter(|u| u.role == Role::Doctor);
        doctors.sort_by(|a, b| a.name.cmp(&b.name).then(a.id.cmp(&b.id)));
        doctors
    }

    pub fn create_appointment(&self, new: NewAppointment) -> Result<Appointment, StoreError> {
        if self.users.get(new.patient_id.get()).is_none() {
            return Err(StoreError::MissingReference("patient"));
        }
        self.appointments
            .insert_unique(
                |a| a.registration_number == new.registration_number,
                |id| {
                    Appointment::book(
                        AppointmentId(id),
                        new.registration_number.clone(),
                        new.patient_id,
                        new.consultation_date,
                        new.created_at,
                    )
                },
            )
            .ok_or(StoreError::Duplicate("registration number"))
    }

    pub fn find_appointment(&self, id: AppointmentId) -> Option<AppointmentListing> {
        self.appointments.get(id.get()).map(|a| self.join(a))
    }

    pub fn find_pending(&self) -> Vec<AppointmentListing> {
        let mut rows = self
            .appointments
            .filter(|a| a.status == AppointmentStatus::Pending);
        rows.sort_by(|a, b| a.created_at.cmp(&b.created_at).then(a.id.cmp(&b.id)));
        self.join_all(rows)
    }

    pub fn find_by_doctor_on(&self, doctor: UserId, date: NaiveDate) -> Vec<AppointmentListing> {
        let mut rows = self.appointments.filter(|a| {
            a.status == AppointmentStatus::Approved
                && a.assigned_doctor() == Some(doctor)
                && a.consultation_date.as_naive() == date
        });
        rows.sort_by(|a, b| {
            a.consultation_time()
                .map(|t| t.as_str())
                .cmp(&b.consultation_time().map(|t| t.as_str()))
                .then(a.id.cmp(&b.id))
        });
        self.join_all(rows)
    }

    pub fn find_active_by_patient(&self, patient: UserId) -> Vec<AppointmentListing> {
        let mut rows = self
            .appointments
            .filter(|a| a.patient_id == patient && a.status.is_active());
        rows.sort_by(|a, b| {
            a.consultation_date
                .cmp(&b.consultation_date)
                .then(a.id.cmp(&b.id))
        });
        self.join_all(rows)
    }

    pub fn find_history_by_patient(&self, patient: UserId) -> Vec<AppointmentListing> {
        let mut rows = self.appointments.filter(|a| a.patient_id == patient);
        rows.sort_by(|a, b| {
            b.consultation_date
                .cmp(&a.consultation_date)
                .then(b.id.cmp(&a.id))
        });
        self.join_all(rows)
    }

    pub fn find_all(&self) -> Vec<AppointmentListing> {
        let mut rows = self.appointments.list();
        rows.sort_by(|a, b| {
            a.status
                .priority()
                .cmp(&b.status.priority())
                .then(a.consultation_date.cmp(&b.consultation_date))
                .then(a.id.cmp(&b.id))
        });
        self.join_all(rows)
    }

    /// Copy the columns `guard` owns from `updated` onto the stored record if
    /// the stored record still passes `guard`. Returns whether a row was
    /// written.
    pub fn update_guarded(&self, updated: &Appointment, guard: UpdateGuard) -> bool {
        self.appointments
            .try_update(updated.id.get(), |stored| {
                if !guard.admits(stored, updated) {
                    return Err(());
                }
                write_columns(stored, updated, guard);
                Ok(())
            })
            .is_some_and(|r| r.is_ok())
    }

    fn join(&self, appointment: Appointment) -> AppointmentListing {
        let patient_name = self
            .users
            .get(appointment.patient_id.get())
            .map(|u| u.name)
            .unwrap_or_default();
        let doctor_name = appointment
            .assigned_doctor()
            .and_then(|d| self.users.get(d.get()))
            .map(|u| u.name);
        AppointmentListing {
            appointment,
            patient_name,
            doctor_name,
        }
    }

    fn join_all(&self, rows: Vec<Appointment>) -> Vec<AppointmentListing> {
        rows.into_iter().map(|a| self.join(a)).collect()
    }
}

/// The `SET` list of each guarded `UPDATE` in `db::appointments`.
fn write_columns(stored: &mut Appointment, updated: &Appointment, guard: UpdateGuard) {
    match guard {
        UpdateGuard::Approval => {
            stored.assignment = updated.assignment.clone();
        }
        UpdateGuard::Reschedule => {
            stored.assignment = updated.assignment.clone();
            stored.consultation_date = updated.consultation_date;
        }
        UpdateGuard::Completion => {
            stored.clinical_notes = updated.clinical_notes.clone();
        }
        UpdateGuard::Cancellation => {
            stored.assignment = None;
        }
    }
    stored.status = updated.status;
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Utc;
    use klinik_core::{ConsultationDate, ConsultationTime, RegistrationNumber};
    use klinik_state::DoctorAssignment;

    fn user(store: &MemoryStore, nik: &str, name: &str, role: Role) -> User {
        store
            .create_user(NewUser {
                nik: Nik::parse(nik).unwrap(),
                name: name.into(),
                password_hash: "hash".into(),
                role,
            })
            .unwrap()
    }

    fn booking(patient: UserId, reg: &str, date: &str) -> NewAppointment {
        NewAppointment {
            registration_number: RegistrationNumber::from_stored(reg.into()),
            patient_id: patient,
            consultation_date: ConsultationDate::parse(date).unwrap(),
            created_at: Utc::now(),
        }
    }

    #[test]
    fn table_assigns_increasing_keys() {
        let table: Table<i64> = Table::new();
        let a = table.insert_unique(|_| false, |id| id).unwrap();
        let b = table.insert_unique(|_| false, |id| id).unwrap();
        assert!(b > a);
        assert_eq!(table.len(), 2);
    }

    #[test]
    fn table_conflict_consumes_no_key() {
        let table: Table<i64> = Table::new();
        table.insert_unique(|_| false, |id| id).unwrap();
        assert!(table.insert_unique(|_| true, |id| id).is_none());
        assert_eq!(table.insert_unique(|_| false, |id| id), Some(2));
    }

    #[test]
    fn duplicate_nik_rejected() {
        let store = MemoryStore::new();
        user(&store, "3201000000000001", "Siti", Role::Patient);
        let err = store
            .create_user(NewUser {
                nik: Nik::parse("3201000000000001").unwrap(),
                name: "Other".into(),
                password_hash: "hash".into(),
                role: Role::Patient,
            })
            .unwrap_err();
        assert!(matches!(err, StoreError::Duplicate("nik")));
    }

    #[test]
    fn booking_requires_existing_patient() {
        let store = MemoryStore::new();
        let err = store
            .create_appointment(booking(UserId(99), "REG-99-1", "2025-06-01"))
            .unwrap_err();
        assert!(matches!(err, StoreError::MissingReference("patient")));
    }

    #[test]
    fn duplicate_registration_number_rejected() {
        let store = MemoryStore::new();
        let p = user(&store, "3201000000000001", "Siti", Role::Patient);
        store
            .create_appointment(booking(p.id, "REG-1-1", "2025-06-01"))
            .unwrap();
        let err = store
            .create_appointment(booking(p.id, "REG-1-1", "2025-06-02"))
            .unwrap_err();
        assert!(matches!(err, StoreError::Duplicate(_)));
    }

    #[test]
    fn doctors_listed_by_name() {
        let store = MemoryStore::new();
        user(&store, "3201000000000001", "dr. Sari", Role::Doctor);
        user(&store, "3201000000000002", "Admin", Role::Admin);
        user(&store, "3201000000000003", "dr. Andi", Role::Doctor);
        let names: Vec<_> = store.list_doctors().into_iter().map(|u| u.name).collect();
        assert_eq!(names, vec!["dr. Andi", "dr. Sari"]);
    }

    #[test]
    fn listing_joins_names() {
        let store = MemoryStore::new();
        let p = user(&store, "3201000000000001", "Siti", Role::Patient);
        let d = user(&store, "3201000000000002", "dr. Andi", Role::Doctor);
        let mut apt = store
            .create_appointment(booking(p.id, "REG-1-1", "2025-06-01"))
            .unwrap();

        let listing = store.find_appointment(apt.id).unwrap();
        assert_eq!(listing.patient_name, "Siti");
        assert_eq!(listing.doctor_name, None);

        apt.approve(DoctorAssignment {
            doctor_id: d.id,
            time: ConsultationTime::parse("09:00").unwrap(),
        })
        .unwrap();
        assert!(store.update_guarded(&apt, UpdateGuard::Approval));
        let listing = store.find_appointment(apt.id).unwrap();
        assert_eq!(listing.doctor_name.as_deref(), Some("dr. Andi"));
    }

    #[test]
    fn guarded_update_refuses_stale_state() {
        let store = MemoryStore::new();
        let p = user(&store, "3201000000000001", "Siti", Role::Patient);
        let apt = store
            .create_appointment(booking(p.id, "REG-1-1", "2025-06-01"))
            .unwrap();

        let mut cancelled = apt.clone();
        cancelled.cancel().unwrap();
        assert!(store.update_guarded(&cancelled, UpdateGuard::Cancellation));

        // A second writer working from the stale pending copy loses.
        let mut stale = apt;
        stale.cancel().unwrap();
        assert!(!store.update_guarded(&stale, UpdateGuard::Cancellation));
    }

    #[test]
    fn update_of_missing_row_writes_nothing() {
        let store = MemoryStore::new();
        let apt = Appointment::book(
            AppointmentId(42),
            RegistrationNumber::from_stored("REG-1-1".into()),
            UserId(1),
            ConsultationDate::parse("2025-06-01").unwrap(),
            Utc::now(),
        );
        assert!(!store.update_guarded(&apt, UpdateGuard::Approval));
    }

    #[test]
    fn overview_orders_by_status_then_date() {
        let store = MemoryStore::new();
        let p = user(&store, "3201000000000001", "Siti", Role::Patient);
        let d = user(&store, "3201000000000002", "dr. Andi", Role::Doctor);
        let late = store
            .create_appointment(booking(p.id, "REG-1-1", "2025-06-20"))
            .unwrap();
        let mut approved = store
            .create_appointment(booking(p.id, "REG-1-2", "2025-06-01"))
            .unwrap();
        let early = store
            .create_appointment(booking(p.id, "REG-1-3", "2025-06-05"))
            .unwrap();
        approved
            .approve(DoctorAssignment {
                doctor_id: d.id,
                time: ConsultationTime::parse("10:00").unwrap(),
            })
            .unwrap();
        assert!(store.update_guarded(&approved, UpdateGuard::Approval));

        let ids: Vec<_> = store
            .find_all()
            .into_iter()
            .map(|l| l.appointment.id)
            .collect();
        assert_eq!(ids, vec![early.id, late.id, approved.id]);
    }

    #[test]
    fn completion_keeps_columns_written_by_reschedule() {
        let store = MemoryStore::new();
        let p = user(&store, "3201000000000001", "Siti", Role::Patient);
        let d = user(&store, "3201000000000002", "dr. Andi", Role::Doctor);
        let mut apt = store
            .create_appointment(booking(p.id, "REG-1-1", "2025-06-01"))
            .unwrap();
        apt.approve(DoctorAssignment {
            doctor_id: d.id,
            time: ConsultationTime::parse("09:00").unwrap(),
        })
        .unwrap();
        assert!(store.update_guarded(&apt, UpdateGuard::Approval));

        // Doctor opens the consultation before the admin moves it.
        let mut doctor_copy = store.find_appointment(apt.id).unwrap().appointment;

        let mut moved = apt.clone();
        moved
            .reschedule(
                DoctorAssignment {
                    doctor_id: d.id,
                    time: ConsultationTime::parse("14:00").unwrap(),
                },
                ConsultationDate::parse("2025-06-03").unwrap(),
            )
            .unwrap();
        assert!(store.update_guarded(&moved, UpdateGuard::Reschedule));

        doctor_copy
            .complete(
                d.id,
                klinik_state::ClinicalNotes::new("cough", "bronchitis", "rest").unwrap(),
            )
            .unwrap();
        assert!(store.update_guarded(&doctor_copy, UpdateGuard::Completion));

        let stored = store.find_appointment(apt.id).unwrap().appointment;
        assert_eq!(stored.status, AppointmentStatus::Completed);
        assert_eq!(stored.consultation_date.to_string(), "2025-06-03");
        assert_eq!(stored.consultation_time().map(|t| t.as_str()), Some("14:00"));
        assert_eq!(
            stored.clinical_notes.as_ref().map(|n| n.diagnosis()),
            Some("bronchitis")
        );
        stored.check_invariants().unwrap();
    }

    #[test]
    fn cancellation_clears_assignment_whatever_the_copy_holds() {
        let store = MemoryStore::new();
        let p = user(&store, "3201000000000001", "Siti", Role::Patient);
        let d = user(&store, "3201000000000002", "dr. Andi", Role::Doctor);
        let apt = store
            .create_appointment(booking(p.id, "REG-1-1", "2025-06-01"))
            .unwrap();

        // Patient cancels from the pending copy after the admin approved.
        let mut approved = apt.clone();
        approved
            .approve(DoctorAssignment {
                doctor_id: d.id,
                time: ConsultationTime::parse("09:00").unwrap(),
            })
            .unwrap();
        assert!(store.update_guarded(&approved, UpdateGuard::Approval));

        let mut cancelled = apt;
        cancelled.cancel().unwrap();
        assert!(store.update_guarded(&cancelled, UpdateGuard::Cancellation));

        let stored = store.find_appointment(cancelled.id).unwrap().appointment;
        assert_eq!(stored.status, AppointmentStatus::Cancelled);
        assert_eq!(stored.assigned_doctor(), None);
        stored.check_invariants().unwrap();
    }
}
