//! Attendance record storage trait.

use crate::StoreError;
use rollcall_types::{SessionId, StudentId, Timestamp};
use serde::{Deserialize, Serialize};

/// One successfully verified attendance marking.
///
/// Backends enforce a unique (student, session) constraint; a second
/// insert for the same pair fails with [`StoreError::Duplicate`].
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct AttendanceRecord {
    pub student: StudentId,
    pub session: SessionId,
    pub marked_at: Timestamp,
    pub similarity: f32,
    pub distance_m: f64,
    pub client_ip: String,
    /// Which factors verified this marking, e.g. `face+geo+token+liveness`.
    pub method: String,
}

/// Trait for attendance record operations.
pub trait AttendanceStore: Send + Sync {
    /// Whether the student already holds a record for this session.
    fn is_marked(&self, student: StudentId, session: SessionId) -> Result<bool, StoreError>;

    fn insert_record(&self, record: &AttendanceRecord) -> Result<(), StoreError>;
}
