use std::env;
use std::time::Duration;

use chrono::{NaiveTime, Weekday};
use tracing::warn;

const DEFAULT_OPENING_TIME: &str = "09:00";
const DEFAULT_CLOSING_TIME: &str = "17:00";
const DEFAULT_STORAGE_TIMEOUT_MS: u64 = 5000;
const DEFAULT_SERVER_PORT: u16 = 3000;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StorageBackend {
    Supabase,
    Memory,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TransitionPolicySetting {
    Permissive,
    Strict,
}

/// Operating-hours policy of the clinic, as loaded from the environment.
#[derive(Debug, Clone)]
pub struct ClinicHoursConfig {
    pub opening_time: NaiveTime,
    pub closing_time: NaiveTime,
    pub closed_weekdays: Vec<Weekday>,
    pub utc_offset_minutes: i32,
}

impl Default for ClinicHoursConfig {
    fn default() -> Self {
        Self {
            opening_time: parse_clock(DEFAULT_OPENING_TIME).unwrap_or(NaiveTime::MIN),
            closing_time: parse_clock(DEFAULT_CLOSING_TIME).unwrap_or(NaiveTime::MIN),
            closed_weekdays: vec![Weekday::Sun],
            utc_offset_minutes: 0,
        }
    }
}

#[derive(Debug, Clone)]
pub struct AppConfig {
    pub supabase_url: String,
    pub supabase_anon_key: String,
    pub supabase_service_role_key: Option<String>,
    pub storage_backend: StorageBackend,
    pub storage_timeout: Duration,
    pub clinic_hours: ClinicHoursConfig,
    pub transition_policy: TransitionPolicySetting,
    pub server_port: u16,
}

impl AppConfig {
    pub fn from_env() -> Self {
        let supabase_url = env::var("SUPABASE_URL")
            .unwrap_or_else(|_| {
                warn!("SUPABASE_URL not set, using empty value");
                String::new()
            });
        let supabase_anon_key = env::var("SUPABASE_ANON_PUBLIC_KEY")
            .unwrap_or_else(|_| {
                warn!("SUPABASE_ANON_PUBLIC_KEY not set, using empty value");
                String::new()
            });
        let supabase_service_role_key = env::var("SUPABASE_SERVICE_ROLE_KEY").ok()
            .filter(|key| !key.is_empty());

        let has_supabase = !supabase_url.is_empty() && !supabase_anon_key.is_empty();
        let storage_backend = match env::var("STORAGE_BACKEND").ok().as_deref() {
            Some("supabase") => StorageBackend::Supabase,
            Some("memory") => StorageBackend::Memory,
            Some(other) => {
                warn!("Unknown STORAGE_BACKEND '{}', choosing from available credentials", other);
                if has_supabase { StorageBackend::Supabase } else { StorageBackend::Memory }
            }
            None if has_supabase => StorageBackend::Supabase,
            None => {
                warn!("STORAGE_BACKEND not set and Supabase not configured, using in-memory store");
                StorageBackend::Memory
            }
        };

        let storage_timeout_ms = env::var("STORAGE_TIMEOUT_MS").ok()
            .and_then(|raw| raw.parse::<u64>().ok().filter(|ms| *ms > 0))
            .unwrap_or_else(|| {
                warn!("STORAGE_TIMEOUT_MS not set or invalid, using {}ms", DEFAULT_STORAGE_TIMEOUT_MS);
                DEFAULT_STORAGE_TIMEOUT_MS
            });

        let transition_policy = match env::var("APPOINTMENT_TRANSITION_POLICY").ok().as_deref() {
            Some("strict") => TransitionPolicySetting::Strict,
            Some("permissive") | None => TransitionPolicySetting::Permissive,
            Some(other) => {
                warn!("Unknown APPOINTMENT_TRANSITION_POLICY '{}', using permissive", other);
                TransitionPolicySetting::Permissive
            }
        };

        let server_port = env::var("SERVER_PORT").ok()
            .and_then(|raw| raw.parse::<u16>().ok())
            .unwrap_or(DEFAULT_SERVER_PORT);

        let config = Self {
            supabase_url,
            supabase_anon_key,
            supabase_service_role_key,
            storage_backend,
            storage_timeout: Duration::from_millis(storage_timeout_ms),
            clinic_hours: ClinicHoursConfig::from_env(),
            transition_policy,
            server_port,
        };

        if config.storage_backend == StorageBackend::Supabase && !config.is_configured() {
            warn!("Application not fully configured - missing environment variables");
        }

        config
    }

    pub fn is_configured(&self) -> bool {
        !self.supabase_url.is_empty()
            && !self.supabase_anon_key.is_empty()
    }
}

impl ClinicHoursConfig {
    pub fn from_env() -> Self {
        let defaults = Self::default();

        let opening_time = clock_var("CLINIC_OPENING_TIME", defaults.opening_time);
        let closing_time = clock_var("CLINIC_CLOSING_TIME", defaults.closing_time);
        let (opening_time, closing_time) = if opening_time < closing_time {
            (opening_time, closing_time)
        } else {
            warn!("Clinic opening time {} is not before closing time {}, using defaults",
                  opening_time, closing_time);
            (defaults.opening_time, defaults.closing_time)
        };

        let closed_weekdays = match env::var("CLINIC_CLOSED_WEEKDAYS") {
            Ok(raw) => parse_weekdays(&raw).unwrap_or_else(|bad| {
                warn!("Invalid weekday '{}' in CLINIC_CLOSED_WEEKDAYS, using default", bad);
                defaults.closed_weekdays.clone()
            }),
            Err(_) => defaults.closed_weekdays.clone(),
        };

        let utc_offset_minutes = env::var("CLINIC_UTC_OFFSET_MINUTES").ok()
            .and_then(|raw| raw.parse::<i32>().ok())
            .filter(|offset| offset.abs() < 24 * 60)
            .unwrap_or(defaults.utc_offset_minutes);

        Self {
            opening_time,
            closing_time,
            closed_weekdays,
            utc_offset_minutes,
        }
    }
}

fn clock_var(name: &str, default: NaiveTime) -> NaiveTime {
    match env::var(name) {
        Ok(raw) => parse_clock(&raw).unwrap_or_else(|| {
            warn!("{} has invalid value '{}', using {}", name, raw, default);
            default
        }),
        Err(_) => default,
    }
}

/// Parses `HH:MM` or `HH:MM:SS` on a 24-hour clock.
pub fn parse_clock(raw: &str) -> Option<NaiveTime> {
    let raw = raw.trim();
    NaiveTime::parse_from_str(raw, "%H:%M:%S")
        .or_else(|_| NaiveTime::parse_from_str(raw, "%H:%M"))
        .ok()
}

/// Parses a comma-separated weekday list ("sun,sat"). Returns the first bad entry on failure.
pub fn parse_weekdays(raw: &str) -> Result<Vec<Weekday>, String> {
    let mut weekdays = Vec::new();
    for entry in raw.split(',').map(str::trim).filter(|entry| !entry.is_empty()) {
        let weekday = entry.parse::<Weekday>().map_err(|_| entry.to_string())?;
        if !weekdays.contains(&weekday) {
            weekdays.push(weekday);
        }
    }
    Ok(weekdays)
}
