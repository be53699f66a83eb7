use std::time::Duration;

use chrono::Utc;
use serde_json::{json, Value};
use uuid::Uuid;

use shared_config::{AppConfig, ClinicHoursConfig, StorageBackend, TransitionPolicySetting};

pub struct TestConfig {
    pub supabase_url: String,
    pub supabase_anon_key: String,
    pub storage_timeout: Duration,
}

impl Default for TestConfig {
    fn default() -> Self {
        Self {
            supabase_url: "http://localhost:54321".to_string(),
            supabase_anon_key: "test-anon-key".to_string(),
            storage_timeout: Duration::from_secs(2),
        }
    }
}

impl TestConfig {
    pub fn with_supabase_url(url: &str) -> Self {
        Self {
            supabase_url: url.to_string(),
            ..Self::default()
        }
    }

    pub fn to_app_config(&self) -> AppConfig {
        AppConfig {
            supabase_url: self.supabase_url.clone(),
            supabase_anon_key: self.supabase_anon_key.clone(),
            supabase_service_role_key: None,
            storage_backend: StorageBackend::Supabase,
            storage_timeout: self.storage_timeout,
            clinic_hours: ClinicHoursConfig::default(),
            transition_policy: TransitionPolicySetting::Permissive,
            server_port: 0,
        }
    }
}

pub struct MockSupabaseResponses;

impl MockSupabaseResponses {
    pub fn service_response(service_id: &str, name: &str, duration_minutes: i32) -> Value {
        json!({
            "id": service_id,
            "name": name,
            "description": format!("{} at the clinic", name),
            "duration_minutes": duration_minutes,
            "is_active": true,
            "created_at": Utc::now().to_rfc3339()
        })
    }

    pub fn appointment_response(
        service_id: &str,
        date: &str,
        start_time: &str,
        end_time: &str,
        status: &str,
    ) -> Value {
        json!({
            "id": Uuid::new_v4().to_string(),
            "service_id": service_id,
            "patient_name": "Test Patient",
            "patient_email": "patient@example.com",
            "patient_phone": "5551234567",
            "appointment_date": date,
            "start_time": start_time,
            "end_time": end_time,
            "status": status,
            "notes": null,
            "created_at": Utc::now().to_rfc3339(),
            "slot": format!("[\"{} {}\",\"{} {}\")", date, start_time, date, end_time)
        })
    }

    pub fn booked_slot_response(start_time: &str, end_time: &str) -> Value {
        json!({
            "start_time": start_time,
            "end_time": end_time
        })
    }

    pub fn exclusion_violation() -> Value {
        json!({
            "code": "23P01",
            "details": "Key conflicts with existing key.",
            "hint": null,
            "message": "conflicting key value violates exclusion constraint \"appointments_no_overlap\""
        })
    }

    pub fn foreign_key_violation() -> Value {
        json!({
            "code": "23503",
            "details": "Key is not present in table \"services\".",
            "hint": null,
            "message": "insert or update on table \"appointments\" violates foreign key constraint \"appointments_service_id_fkey\""
        })
    }
}
