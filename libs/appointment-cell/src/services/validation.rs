// libs/appointment-cell/src/services/validation.rs
use regex::Regex;
use tracing::debug;

use crate::models::{AppointmentError, PatientInfo};

const EMAIL_PATTERN: &str = r"^[^\s@]+@[^\s@]+\.[^\s@]+$";
pub const MAX_NOTES_LENGTH: usize = 2000;

/// Contact-detail checks applied to booking requests before storage is touched.
pub struct PatientValidator {
    email_pattern: Regex,
}

impl PatientValidator {
    pub fn new() -> Self {
        Self {
            email_pattern: Regex::new(EMAIL_PATTERN).expect("email pattern compiles"),
        }
    }

    /// Returns the trimmed patient details, or every problem found.
    pub fn validate(&self, patient: &PatientInfo) -> Result<PatientInfo, AppointmentError> {
        let name = patient.name.trim();
        let email = patient.email.trim();
        let phone = patient.phone.trim();

        let mut issues = Vec::new();

        let name_len = name.chars().count();
        if name_len < 2 {
            issues.push("Name must be at least 2 characters");
        } else if name_len > 100 {
            issues.push("Name must be at most 100 characters");
        }

        if email.len() > 255 {
            issues.push("Email must be at most 255 characters");
        } else if !self.email_pattern.is_match(email) {
            issues.push("Please enter a valid email");
        }

        let phone_len = phone.chars().count();
        if !(7..=20).contains(&phone_len) {
            issues.push("Please enter a valid phone number");
        }

        if !issues.is_empty() {
            debug!("Patient details rejected: {:?}", issues);
            return Err(AppointmentError::ValidationError(issues.join("; ")));
        }

        Ok(PatientInfo {
            name: name.to_string(),
            email: email.to_string(),
            phone: phone.to_string(),
        })
    }
}

impl Default for PatientValidator {
    fn default() -> Self {
        Self::new()
    }
}

pub fn validate_notes(notes: Option<String>) -> Result<Option<String>, AppointmentError> {
    match notes {
        Some(text) if text.chars().count() > MAX_NOTES_LENGTH => Err(AppointmentError::ValidationError(
            format!("Notes must be at most {} characters", MAX_NOTES_LENGTH)
        )),
        Some(text) => Ok(Some(text.trim().to_string())),
        None => Ok(None),
    }
}
