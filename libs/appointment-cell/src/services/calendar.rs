// libs/appointment-cell/src/services/calendar.rs
use chrono::{Datelike, FixedOffset, NaiveDate, NaiveDateTime, NaiveTime, Offset, Utc, Weekday};

use shared_config::{AppConfig, ClinicHoursConfig};

use crate::models::AppointmentError;

/// Granularity at which candidate start times are tried.
pub const SLOT_STEP_MINUTES: i64 = 30;

/// Static operating-hours policy of the clinic.
#[derive(Debug, Clone)]
pub struct ClinicCalendar {
    pub opening_time: NaiveTime,
    pub closing_time: NaiveTime,
    pub closed_weekdays: Vec<Weekday>,
    pub step_minutes: i64,
    utc_offset: FixedOffset,
}

impl ClinicCalendar {
    pub fn new(
        opening_time: NaiveTime,
        closing_time: NaiveTime,
        closed_weekdays: Vec<Weekday>,
    ) -> Result<Self, AppointmentError> {
        if opening_time >= closing_time {
            return Err(AppointmentError::ValidationError(format!(
                "Opening time {} must be before closing time {}", opening_time, closing_time
            )));
        }

        Ok(Self {
            opening_time,
            closing_time,
            closed_weekdays,
            step_minutes: SLOT_STEP_MINUTES,
            utc_offset: Utc.fix(),
        })
    }

    pub fn from_hours(hours: &ClinicHoursConfig) -> Result<Self, AppointmentError> {
        let calendar = Self::new(hours.opening_time, hours.closing_time, hours.closed_weekdays.clone())?;
        Ok(calendar.with_utc_offset_minutes(hours.utc_offset_minutes))
    }

    pub fn from_config(config: &AppConfig) -> Result<Self, AppointmentError> {
        Self::from_hours(&config.clinic_hours)
    }

    pub fn with_utc_offset_minutes(mut self, minutes: i32) -> Self {
        if let Some(offset) = FixedOffset::east_opt(minutes * 60) {
            self.utc_offset = offset;
        }
        self
    }

    pub fn is_closed_on(&self, date: NaiveDate) -> bool {
        self.closed_weekdays.contains(&date.weekday())
    }

    /// Current wall-clock time at the clinic.
    pub fn now(&self) -> NaiveDateTime {
        Utc::now().with_timezone(&self.utc_offset).naive_local()
    }
}

impl Default for ClinicCalendar {
    fn default() -> Self {
        let hours = ClinicHoursConfig::default();
        Self {
            opening_time: hours.opening_time,
            closing_time: hours.closing_time,
            closed_weekdays: hours.closed_weekdays,
            step_minutes: SLOT_STEP_MINUTES,
            utc_offset: Utc.fix(),
        }
    }
}
