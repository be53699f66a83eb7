// libs/appointment-cell/src/models.rs
use serde::{Deserialize, Deserializer, Serialize, Serializer};
use uuid::Uuid;
use chrono::{DateTime, Duration, NaiveDate, NaiveTime, Utc};
use std::fmt;
use std::str::FromStr;

// ==============================================================================
// CLINIC CATALOGUE MODELS
// ==============================================================================

/// A bookable clinic service. Read-only to scheduling.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct Service {
    pub id: Uuid,
    pub name: String,
    #[serde(default)]
    pub description: Option<String>,
    pub duration_minutes: i32,
    pub is_active: bool,
}

// ==============================================================================
// TIME MODELS
// ==============================================================================

/// Wall-clock interval on a single day, `start < end`. The end is exclusive,
/// so an interval ending at 10:45 does not touch one starting at 10:45.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct TimeInterval {
    pub start: NaiveTime,
    pub end: NaiveTime,
}

impl TimeInterval {
    pub fn new(start: NaiveTime, end: NaiveTime) -> Result<Self, AppointmentError> {
        if start >= end {
            return Err(AppointmentError::ValidationError(format!(
                "Interval start {} must be before end {}", start, end
            )));
        }
        Ok(Self { start, end })
    }

    /// The interval of `duration_minutes` starting at `start`, or `None` when
    /// the duration is not positive or the end would spill past midnight.
    pub fn starting_at(start: NaiveTime, duration_minutes: i32) -> Option<Self> {
        if duration_minutes <= 0 {
            return None;
        }
        let (end, wrapped_seconds) = start.overflowing_add_signed(Duration::minutes(duration_minutes as i64));
        if wrapped_seconds != 0 || end <= start {
            return None;
        }
        Some(Self { start, end })
    }

    pub fn duration_minutes(&self) -> i64 {
        (self.end - self.start).num_minutes()
    }
}

impl fmt::Display for TimeInterval {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}-{}", self.start.format("%H:%M"), self.end.format("%H:%M"))
    }
}

/// A computed, unstored start time at which a service fits.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Serialize)]
pub struct Slot {
    #[serde(serialize_with = "wire_time::serialize_hhmm")]
    pub start_time: NaiveTime,
}

impl Slot {
    pub fn label(&self) -> String {
        self.start_time.format("%H:%M").to_string()
    }
}

// ==============================================================================
// CORE APPOINTMENT MODELS
// ==============================================================================

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct Appointment {
    pub id: Uuid,
    pub service_id: Uuid,
    pub patient_name: String,
    pub patient_email: String,
    pub patient_phone: String,
    pub appointment_date: NaiveDate,
    #[serde(deserialize_with = "wire_time::deserialize")]
    pub start_time: NaiveTime,
    #[serde(deserialize_with = "wire_time::deserialize")]
    pub end_time: NaiveTime,
    pub status: AppointmentStatus,
    #[serde(default)]
    pub notes: Option<String>,
    #[serde(default)]
    pub created_at: Option<DateTime<Utc>>,
}

impl Appointment {
    pub fn interval(&self) -> TimeInterval {
        TimeInterval { start: self.start_time, end: self.end_time }
    }

    pub fn occupies_slot(&self) -> bool {
        self.status.occupies_slot()
    }
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash)]
#[serde(rename_all = "snake_case")]
pub enum AppointmentStatus {
    Pending,
    Approved,
    Rescheduled,
    Cancelled,
}

impl AppointmentStatus {
    pub const ALL: [AppointmentStatus; 4] = [
        AppointmentStatus::Pending,
        AppointmentStatus::Approved,
        AppointmentStatus::Rescheduled,
        AppointmentStatus::Cancelled,
    ];

    /// Every status except `cancelled` holds its interval, including `pending`.
    pub fn occupies_slot(&self) -> bool {
        !matches!(self, AppointmentStatus::Cancelled)
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            AppointmentStatus::Pending => "pending",
            AppointmentStatus::Approved => "approved",
            AppointmentStatus::Rescheduled => "rescheduled",
            AppointmentStatus::Cancelled => "cancelled",
        }
    }
}

impl fmt::Display for AppointmentStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for AppointmentStatus {
    type Err = AppointmentError;

    fn from_str(raw: &str) -> Result<Self, Self::Err> {
        match raw.trim().to_ascii_lowercase().as_str() {
            "pending" => Ok(AppointmentStatus::Pending),
            "approved" => Ok(AppointmentStatus::Approved),
            "rescheduled" => Ok(AppointmentStatus::Rescheduled),
            "cancelled" => Ok(AppointmentStatus::Cancelled),
            other => Err(AppointmentError::ValidationError(format!("Unknown appointment status '{}'", other))),
        }
    }
}

// ==============================================================================
// REQUEST/RESPONSE MODELS
// ==============================================================================

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PatientInfo {
    pub name: String,
    pub email: String,
    pub phone: String,
}

#[derive(Debug, Clone, Deserialize)]
pub struct BookAppointmentRequest {
    pub service_id: Uuid,
    pub appointment_date: NaiveDate,
    #[serde(deserialize_with = "wire_time::deserialize")]
    pub start_time: NaiveTime,
    pub patient_name: String,
    pub patient_email: String,
    pub patient_phone: String,
}

impl BookAppointmentRequest {
    pub fn patient(&self) -> PatientInfo {
        PatientInfo {
            name: self.patient_name.clone(),
            email: self.patient_email.clone(),
            phone: self.patient_phone.clone(),
        }
    }
}

/// Row written by a booking commit. Status is always `pending` on insert.
#[derive(Debug, Clone, Serialize, PartialEq)]
pub struct NewAppointment {
    pub service_id: Uuid,
    pub patient_name: String,
    pub patient_email: String,
    pub patient_phone: String,
    pub appointment_date: NaiveDate,
    pub start_time: NaiveTime,
    pub end_time: NaiveTime,
    pub status: AppointmentStatus,
}

impl NewAppointment {
    pub fn interval(&self) -> TimeInterval {
        TimeInterval { start: self.start_time, end: self.end_time }
    }
}

#[derive(Debug, Clone, Deserialize)]
pub struct UpdateStatusRequest {
    pub status: AppointmentStatus,
    #[serde(default)]
    pub notes: Option<String>,
}

/// Read-only projection used by list and calendar views.
#[derive(Debug, Clone, Default)]
pub struct AppointmentQuery {
    pub from_date: Option<NaiveDate>,
    pub to_date: Option<NaiveDate>,
    /// Empty means every status.
    pub statuses: Vec<AppointmentStatus>,
}

impl AppointmentQuery {
    pub fn matches(&self, appointment: &Appointment) -> bool {
        self.from_date.map_or(true, |from| appointment.appointment_date >= from)
            && self.to_date.map_or(true, |to| appointment.appointment_date <= to)
            && (self.statuses.is_empty() || self.statuses.contains(&appointment.status))
    }
}

#[derive(Debug, Clone, Serialize)]
pub struct AvailabilityResponse {
    pub service_id: Uuid,
    pub date: NaiveDate,
    pub slots: Vec<String>,
}

// ==============================================================================
// ERROR TYPES
// ==============================================================================

#[derive(Debug, Clone, PartialEq, thiserror::Error)]
pub enum AppointmentError {
    #[error("Validation error: {0}")]
    ValidationError(String),

    #[error("This time slot was just taken. Please select another.")]
    SlotAlreadyBooked,

    #[error("Appointment storage unavailable: {0}")]
    StorageUnavailable(String),

    #[error("Appointment not found")]
    NotFound,

    #[error("Appointment cannot move from {from} to {to}")]
    InvalidStatusTransition { from: AppointmentStatus, to: AppointmentStatus },

    #[error("Appointment was changed by someone else. Reload it and try again.")]
    ConcurrentUpdate,

    /// The store refused the request for a reason retrying will not fix.
    #[error("Appointment storage rejected the request: {0}")]
    StorageRejected(String),
}

impl AppointmentError {
    pub fn is_retryable(&self) -> bool {
        matches!(self, AppointmentError::StorageUnavailable(_))
    }
}

// ==============================================================================
// WIRE FORMAT
// ==============================================================================

/// Times travel as `HH:MM` or `HH:MM:SS` on a 24-hour clock.
pub mod wire_time {
    use super::*;

    pub fn parse(raw: &str) -> Result<NaiveTime, AppointmentError> {
        shared_config::parse_clock(raw).ok_or_else(|| {
            AppointmentError::ValidationError(format!("Invalid time '{}', expected HH:MM or HH:MM:SS", raw))
        })
    }

    pub fn deserialize<'de, D>(deserializer: D) -> Result<NaiveTime, D::Error>
    where
        D: Deserializer<'de>,
    {
        let raw = String::deserialize(deserializer)?;
        parse(&raw).map_err(serde::de::Error::custom)
    }

    pub fn serialize_hhmm<S>(time: &NaiveTime, serializer: S) -> Result<S::Ok, S::Error>
    where
        S: Serializer,
    {
        serializer.serialize_str(&time.format("%H:%M").to_string())
    }
}
