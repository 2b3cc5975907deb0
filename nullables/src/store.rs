//! Nullable store — thread-safe in-memory storage for testing.

use rollcall_store::{
    AlertStore, AttendanceRecord, AttendanceStore, CampusSite, EncryptedTemplate, EnrollmentStore,
    SecurityAlert, SecurityState, SecurityStateStore, SessionInfo, SessionStore, StoreError,
    TemplateStore, VoucherRecord, VoucherStore,
};
use rollcall_types::{CourseId, SessionId, StudentId, Timestamp};
use std::collections::{HashMap, HashSet};
use std::sync::Mutex;

/// An in-memory implementation of every pipeline store trait.
///
/// Each table sits behind its own mutex. `update_exclusive` holds the
/// voucher table's mutex across the whole closure — a coarse stand-in
/// for a row lock, but it delivers the same guarantee the contract asks
/// for: concurrent updates on one token serialize.
#[derive(Default)]
pub struct MemoryStore {
    vouchers: Mutex<HashMap<String, VoucherRecord>>,
    templates: Mutex<HashMap<StudentId, EncryptedTemplate>>,
    attendance: Mutex<HashMap<(StudentId, SessionId), AttendanceRecord>>,
    sessions: Mutex<HashMap<SessionId, SessionInfo>>,
    enrollments: Mutex<HashSet<(StudentId, CourseId)>>,
    alerts: Mutex<Vec<SecurityAlert>>,
    security: Mutex<HashMap<StudentId, SecurityState>>,
    /// When set, every operation fails with a backend error.
    poisoned: Mutex<Option<String>>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    // ── Test fixtures ──────────────────────────────────────────────────

    pub fn add_session(&self, info: SessionInfo) {
        self.sessions.lock().unwrap().insert(info.id, info);
    }

    pub fn enroll_student(&self, student: StudentId, course: CourseId) {
        self.enrollments.lock().unwrap().insert((student, course));
    }

    /// Simulate a backend outage; every subsequent call errors.
    pub fn poison(&self, message: &str) {
        *self.poisoned.lock().unwrap() = Some(message.to_string());
    }

    // ── Test inspection ────────────────────────────────────────────────

    pub fn voucher(&self, token: &str) -> Option<VoucherRecord> {
        self.vouchers.lock().unwrap().get(token).cloned()
    }

    pub fn voucher_count(&self) -> usize {
        self.vouchers.lock().unwrap().len()
    }

    pub fn alerts(&self) -> Vec<SecurityAlert> {
        self.alerts.lock().unwrap().clone()
    }

    pub fn records(&self) -> Vec<AttendanceRecord> {
        self.attendance.lock().unwrap().values().cloned().collect()
    }

    fn check_poisoned(&self) -> Result<(), StoreError> {
        match self.poisoned.lock().unwrap().as_ref() {
            Some(msg) => Err(StoreError::Backend(msg.clone())),
            None => Ok(()),
        }
    }
}

/// A convenient session fixture: opens at `starts_at`, runs `duration`
/// seconds, sited at the given coordinates with the given radius.
pub fn session_fixture(
    id: SessionId,
    course: CourseId,
    starts_at: Timestamp,
    duration_secs: u64,
    latitude: f64,
    longitude: f64,
    radius_m: f64,
) -> SessionInfo {
    SessionInfo {
        id,
        course,
        course_name: format!("Course {}", course.0),
        starts_at,
        ends_at: starts_at.plus(duration_secs),
        site: CampusSite {
            latitude,
            longitude,
            radius_m,
        },
    }
}

impl VoucherStore for MemoryStore {
    fn purge_expired(&self, now: Timestamp) -> Result<u64, StoreError> {
        self.check_poisoned()?;
        let mut vouchers = self.vouchers.lock().unwrap();
        let before = vouchers.len();
        vouchers.retain(|_, v| !v.expires_at.is_past(now));
        Ok((before - vouchers.len()) as u64)
    }

    fn insert_voucher(&self, voucher: &VoucherRecord) -> Result<(), StoreError> {
        self.check_poisoned()?;
        let mut vouchers = self.vouchers.lock().unwrap();
        if vouchers.contains_key(&voucher.token) {
            return Err(StoreError::Duplicate(voucher.token.clone()));
        }
        vouchers.insert(voucher.token.clone(), voucher.clone());
        Ok(())
    }

    fn update_exclusive(
        &self,
        token: &str,
        apply: &mut dyn FnMut(Option<&mut VoucherRecord>),
    ) -> Result<(), StoreError> {
        self.check_poisoned()?;
        let mut vouchers = self.vouchers.lock().unwrap();
        apply(vouchers.get_mut(token));
        Ok(())
    }
}

impl TemplateStore for MemoryStore {
    fn put_template(&self, template: &EncryptedTemplate) -> Result<(), StoreError> {
        self.check_poisoned()?;
        self.templates
            .lock()
            .unwrap()
            .insert(template.owner, template.clone());
        Ok(())
    }

    fn get_template(&self, owner: StudentId) -> Result<Option<EncryptedTemplate>, StoreError> {
        self.check_poisoned()?;
        Ok(self.templates.lock().unwrap().get(&owner).cloned())
    }
}

impl AttendanceStore for MemoryStore {
    fn is_marked(&self, student: StudentId, session: SessionId) -> Result<bool, StoreError> {
        self.check_poisoned()?;
        Ok(self
            .attendance
            .lock()
            .unwrap()
            .contains_key(&(student, session)))
    }

    fn insert_record(&self, record: &AttendanceRecord) -> Result<(), StoreError> {
        self.check_poisoned()?;
        let mut attendance = self.attendance.lock().unwrap();
        let key = (record.student, record.session);
        if attendance.contains_key(&key) {
            return Err(StoreError::Duplicate(format!(
                "{}/{}",
                record.student, record.session
            )));
        }
        attendance.insert(key, record.clone());
        Ok(())
    }
}

impl SessionStore for MemoryStore {
    fn get_session(&self, id: SessionId) -> Result<Option<SessionInfo>, StoreError> {
        self.check_poisoned()?;
        Ok(self.sessions.lock().unwrap().get(&id).cloned())
    }
}

impl EnrollmentStore for MemoryStore {
    fn is_enrolled(&self, student: StudentId, course: CourseId) -> Result<bool, StoreError> {
        self.check_poisoned()?;
        Ok(self.enrollments.lock().unwrap().contains(&(student, course)))
    }
}

impl AlertStore for MemoryStore {
    fn insert_alert(&self, alert: &SecurityAlert) -> Result<(), StoreError> {
        self.check_poisoned()?;
        self.alerts.lock().unwrap().push(alert.clone());
        Ok(())
    }
}

impl SecurityStateStore for MemoryStore {
    fn get_security_state(&self, identity: StudentId) -> Result<SecurityState, StoreError> {
        self.check_poisoned()?;
        Ok(self
            .security
            .lock()
            .unwrap()
            .get(&identity)
            .cloned()
            .unwrap_or_default())
    }

    fn update_security_state(
        &self,
        identity: StudentId,
        apply: &mut dyn FnMut(&mut SecurityState),
    ) -> Result<SecurityState, StoreError> {
        self.check_poisoned()?;
        let mut security = self.security.lock().unwrap();
        let state = security.entry(identity).or_default();
        apply(state);
        Ok(state.clone())
    }
}
