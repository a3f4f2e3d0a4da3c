//! Wire types for the attendance backend.
//!
//! Field names follow the backend's camelCase JSON; Mongo-style `_id`
//! fields are exposed as `id`.
use chrono::{DateTime, NaiveDate, Utc};
use serde::{Deserialize, Serialize};
use session::{Role, User};

use crate::error::ClientError;

// =========================
// Shared
// =========================

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Coordinates {
    pub latitude: f64,
    pub longitude: f64,
}

impl Coordinates {
    pub fn new(latitude: f64, longitude: f64) -> Result<Self, ClientError> {
        let c = Self {
            latitude,
            longitude,
        };
        c.validate()?;
        Ok(c)
    }

    pub fn validate(&self) -> Result<(), ClientError> {
        if !self.latitude.is_finite() || !(-90.0..=90.0).contains(&self.latitude) {
            return Err(ClientError::validation(format!(
                "latitude {} is out of range",
                self.latitude
            )));
        }
        if !self.longitude.is_finite() || !(-180.0..=180.0).contains(&self.longitude) {
            return Err(ClientError::validation(format!(
                "longitude {} is out of range",
                self.longitude
            )));
        }
        Ok(())
    }
}

/// Reference that the backend sends either as a bare id or populated.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum Ref<T> {
    Id(String),
    Populated(T),
}

#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct MessageResponse {
    #[serde(default)]
    pub message: Option<String>,
}

// =========================
// Auth
// =========================

/// Login body. Exactly one identifier is expected; the backend accepts either.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Credentials {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub enrollment_no: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub email: Option<String>,
    pub password: String,
}

impl Credentials {
    pub fn enrollment(enrollment_no: impl Into<String>, password: impl Into<String>) -> Self {
        Self {
            enrollment_no: Some(enrollment_no.into()),
            email: None,
            password: password.into(),
        }
    }

    pub fn email(email: impl Into<String>, password: impl Into<String>) -> Self {
        Self {
            enrollment_no: None,
            email: Some(email.into()),
            password: password.into(),
        }
    }

    /// Anything containing `@` is treated as an email address.
    pub fn from_identifier(identifier: &str, password: impl Into<String>) -> Self {
        let identifier = identifier.trim();
        if identifier.contains('@') {
            Self::email(identifier, password)
        } else {
            Self::enrollment(identifier, password)
        }
    }

    pub fn validate(&self) -> Result<(), ClientError> {
        let has_id = [&self.enrollment_no, &self.email]
            .iter()
            .any(|v| v.as_deref().is_some_and(|s| !s.trim().is_empty()));
        if !has_id {
            return Err(ClientError::validation(
                "enter your enrollment number or email",
            ));
        }
        if self.password.is_empty() {
            return Err(ClientError::validation("enter your password"));
        }
        Ok(())
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Registration {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub enrollment_no: Option<String>,
    pub email: String,
    pub password: String,
    pub full_name: String,
    pub role: Role,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub face_embedding: Option<Vec<f64>>,
}

impl Registration {
    pub fn validate(&self) -> Result<(), ClientError> {
        if self.full_name.trim().is_empty() {
            return Err(ClientError::validation("full name is required"));
        }
        if !self.email.contains('@') {
            return Err(ClientError::validation("a valid email is required"));
        }
        if self.password.len() < MIN_PASSWORD_LEN {
            return Err(ClientError::validation(format!(
                "password must be at least {MIN_PASSWORD_LEN} characters long"
            )));
        }
        if self.role == Role::Student
            && self
                .enrollment_no
                .as_deref()
                .is_none_or(|n| n.trim().is_empty())
        {
            return Err(ClientError::validation(
                "students must register with an enrollment number",
            ));
        }
        Ok(())
    }

    pub fn credentials(&self) -> Credentials {
        match &self.enrollment_no {
            Some(no) if !no.trim().is_empty() => Credentials::enrollment(no, &self.password),
            _ => Credentials::email(&self.email, &self.password),
        }
    }
}

/// Login/registration response. Fields are optional on the wire so a
/// malformed response can be reported instead of failing to decode.
#[derive(Debug, Clone, Deserialize)]
pub struct AuthResponse {
    #[serde(default)]
    pub token: Option<String>,
    #[serde(default)]
    pub user: Option<User>,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ForgotPassword {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub email: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub enrollment_no: Option<String>,
}

impl ForgotPassword {
    pub fn from_identifier(identifier: &str) -> Result<Self, ClientError> {
        let identifier = identifier.trim();
        if identifier.is_empty() {
            return Err(ClientError::validation(
                "enter your email or enrollment number",
            ));
        }
        let is_email = identifier.contains('@');
        Ok(Self {
            email: is_email.then(|| identifier.to_string()),
            enrollment_no: (!is_email).then(|| identifier.to_string()),
        })
    }
}

pub const MIN_PASSWORD_LEN: usize = 6;

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ChangePassword {
    pub current_password: String,
    pub new_password: String,
}

impl ChangePassword {
    /// Checks the form before anything is sent.
    pub fn new(current: &str, new: &str, confirm: &str) -> Result<Self, ClientError> {
        if current.is_empty() || new.is_empty() || confirm.is_empty() {
            return Err(ClientError::validation("please fill out all fields"));
        }
        if new != confirm {
            return Err(ClientError::validation("new passwords do not match"));
        }
        if new.len() < MIN_PASSWORD_LEN {
            return Err(ClientError::validation(format!(
                "new password must be at least {MIN_PASSWORD_LEN} characters long"
            )));
        }
        Ok(Self {
            current_password: current.to_string(),
            new_password: new.to_string(),
        })
    }
}

// =========================
// QR
// =========================

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct GenerateQr {
    pub class_id: String,
    pub schedule_id: String,
    pub coordinates: Coordinates,
}

/// Rotating token issued for one class session. Opaque to the client.
#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct QrGrant {
    pub session_id: String,
    pub token: String,
    pub expired_at: DateTime<Utc>,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ValidateQr<'a> {
    pub token: &'a str,
}

#[derive(Debug, Clone, PartialEq, Default, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct QrValidation {
    pub valid: bool,
    pub session_id: Option<String>,
    pub class_id: Option<String>,
    pub schedule_id: Option<String>,
}

// =========================
// Attendance
// =========================

/// One check-in. Immutable once built: a retry sends a clone, never an
/// edited value.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AttendanceSubmission {
    session_id: String,
    class_id: String,
    schedule_id: String,
    student_coordinates: Coordinates,
    liveness_passed: bool,
    #[serde(default)]
    face_embedding: Vec<f64>,
}

impl AttendanceSubmission {
    pub fn new(
        session_id: impl Into<String>,
        class_id: impl Into<String>,
        schedule_id: impl Into<String>,
        student_coordinates: Coordinates,
        liveness_passed: bool,
        face_embedding: Vec<f64>,
    ) -> Self {
        Self {
            session_id: session_id.into(),
            class_id: class_id.into(),
            schedule_id: schedule_id.into(),
            student_coordinates,
            liveness_passed,
            face_embedding,
        }
    }

    pub fn session_id(&self) -> &str {
        &self.session_id
    }

    pub fn class_id(&self) -> &str {
        &self.class_id
    }

    pub fn schedule_id(&self) -> &str {
        &self.schedule_id
    }

    pub fn student_coordinates(&self) -> Coordinates {
        self.student_coordinates
    }

    pub fn liveness_passed(&self) -> bool {
        self.liveness_passed
    }

    pub fn face_embedding(&self) -> &[f64] {
        &self.face_embedding
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct SyncBatch<'a> {
    pub attendances: &'a [AttendanceSubmission],
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SyncStatus {
    Success,
    Failed,
    Skipped,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SyncItem {
    pub status: SyncStatus,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
    pub data: AttendanceSubmission,
}

#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
pub struct SyncResult {
    pub success: u32,
    pub failed: u32,
    pub skipped: u32,
    #[serde(default)]
    pub details: Vec<SyncItem>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum AttendanceStatus {
    Present,
    Late,
    Absent,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct UserSummary {
    #[serde(rename = "_id", alias = "id")]
    pub id: String,
    #[serde(default)]
    pub full_name: Option<String>,
    #[serde(default)]
    pub email: Option<String>,
    #[serde(default)]
    pub enrollment_no: Option<String>,
    #[serde(default)]
    pub role: Option<Role>,
}

/// Populated class as embedded in attendance records; the backend may
/// project only some fields.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ClassSummary {
    #[serde(rename = "_id", alias = "id")]
    pub id: String,
    #[serde(default)]
    pub class_number: Option<String>,
    #[serde(default)]
    pub subject_code: Option<String>,
    #[serde(default)]
    pub subject_name: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ScheduleSummary {
    #[serde(rename = "_id", alias = "id")]
    pub id: String,
    #[serde(default)]
    pub day_of_week: Option<String>,
    #[serde(default)]
    pub start_time: Option<String>,
    #[serde(default)]
    pub end_time: Option<String>,
    #[serde(default)]
    pub room_number: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AttendanceRecord {
    #[serde(rename = "_id")]
    pub id: String,
    #[serde(rename = "studentId")]
    pub student: Ref<UserSummary>,
    #[serde(rename = "classId")]
    pub class: Ref<ClassSummary>,
    #[serde(rename = "scheduleId")]
    pub schedule: Ref<ScheduleSummary>,
    #[serde(default, rename = "sessionId")]
    pub session: Option<serde_json::Value>,
    #[serde(default)]
    pub student_coordinates: Option<Coordinates>,
    pub attended_at: DateTime<Utc>,
    #[serde(default)]
    pub liveness_passed: bool,
    #[serde(default)]
    pub synced: bool,
    #[serde(default)]
    pub manual_entry: bool,
    pub status: AttendanceStatus,
}

#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AttendanceStats {
    pub total: u32,
    pub present: u32,
    pub late: u32,
    pub absent: u32,
    #[serde(default)]
    pub manual_entries: Option<u32>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ClassAttendance {
    pub attendance: Vec<AttendanceRecord>,
    pub stats: AttendanceStats,
}

#[derive(Debug, Clone, PartialEq, Default, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct AttendanceFilters {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub start_date: Option<NaiveDate>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub end_date: Option<NaiveDate>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub status: Option<AttendanceStatus>,
}

/// Teacher/admin entry for a student who could not scan.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ManualAttendance {
    pub student_id: String,
    pub class_id: String,
    pub schedule_id: String,
    pub status: AttendanceStatus,
    pub attended_at: DateTime<Utc>,
}

impl ManualAttendance {
    pub fn validate(&self) -> Result<(), ClientError> {
        if [&self.student_id, &self.class_id, &self.schedule_id]
            .iter()
            .any(|v| v.trim().is_empty())
        {
            return Err(ClientError::validation(
                "student id, schedule id and class id are required",
            ));
        }
        Ok(())
    }
}

// =========================
// Audit
// =========================

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum AuditStatus {
    Success,
    Failed,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AuditLog {
    #[serde(rename = "_id")]
    pub id: String,
    #[serde(default, rename = "userId")]
    pub user: Option<Ref<UserSummary>>,
    pub action: String,
    pub status: AuditStatus,
    pub timestamp: DateTime<Utc>,
    #[serde(default)]
    pub details: Option<serde_json::Value>,
    #[serde(default)]
    pub ip_address: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Default, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct AuditFilters {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub user_id: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub action: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub start_date: Option<NaiveDate>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub end_date: Option<NaiveDate>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub status: Option<AuditStatus>,
}

// =========================
// Classes & schedules
// =========================

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Class {
    #[serde(rename = "_id")]
    pub id: String,
    #[serde(flatten)]
    pub details: NewClass,
    #[serde(default)]
    pub teacher_id: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct NewClass {
    pub class_number: String,
    pub subject_code: String,
    pub subject_name: String,
    pub class_year: String,
    pub semester: String,
    pub division: String,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Enrollment {
    pub class_id: String,
    pub student_id: String,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Schedule {
    #[serde(rename = "_id")]
    pub id: String,
    #[serde(flatten)]
    pub details: NewSchedule,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct NewSchedule {
    pub class_id: String,
    pub session_type: String,
    pub day_of_week: String,
    pub start_time: String,
    pub end_time: String,
    pub room_number: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub semester: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub academic_year: Option<String>,
    pub location: Coordinates,
}
