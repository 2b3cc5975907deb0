//! Session and enrollment lookup traits.

use crate::StoreError;
use rollcall_types::{CourseId, SessionId, StudentId, Timestamp};
use serde::{Deserialize, Serialize};

/// The reference location a session's attendance must be marked near.
#[derive(Clone, Copy, Debug, PartialEq, Serialize, Deserialize)]
pub struct CampusSite {
    pub latitude: f64,
    pub longitude: f64,
    pub radius_m: f64,
}

/// The slice of a session the pipeline needs: its marking window and the
/// campus site of the owning course's department.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct SessionInfo {
    pub id: SessionId,
    pub course: CourseId,
    pub course_name: String,
    pub starts_at: Timestamp,
    pub ends_at: Timestamp,
    pub site: CampusSite,
}

pub trait SessionStore: Send + Sync {
    fn get_session(&self, id: SessionId) -> Result<Option<SessionInfo>, StoreError>;
}

pub trait EnrollmentStore: Send + Sync {
    /// Whether the student holds an active enrollment in the course.
    fn is_enrolled(&self, student: StudentId, course: CourseId) -> Result<bool, StoreError>;
}
