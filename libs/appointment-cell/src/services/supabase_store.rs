// libs/appointment-cell/src/services/supabase_store.rs
use std::sync::Arc;

use async_trait::async_trait;
use chrono::{NaiveDate, NaiveTime};
use reqwest::header::{HeaderMap, HeaderValue};
use reqwest::Method;
use serde::Deserialize;
use serde_json::{json, Value};
use tracing::{debug, warn};
use uuid::Uuid;

use shared_config::AppConfig;
use shared_database::{DatabaseError, SupabaseClient};

use crate::models::{
    wire_time, Appointment, AppointmentQuery, AppointmentStatus, NewAppointment, Service,
    TimeInterval,
};
use crate::services::store::{AppointmentStore, StoreError};

/// Appointment store backed by Supabase/PostgREST.
///
/// Overlap protection lives in the database: the `appointments_no_overlap`
/// exclusion constraint (see `supabase/migrations`) rejects any insert or
/// status change that would give two non-cancelled rows intersecting ranges on
/// the same date. PostgREST reports that as 409 / SQLSTATE 23P01.
pub struct SupabaseAppointmentStore {
    supabase: Arc<SupabaseClient>,
}

#[derive(Debug, Deserialize)]
struct BookedSlotRow {
    #[serde(deserialize_with = "wire_time::deserialize")]
    start_time: NaiveTime,
    #[serde(deserialize_with = "wire_time::deserialize")]
    end_time: NaiveTime,
}

impl SupabaseAppointmentStore {
    pub fn new(config: &AppConfig) -> Self {
        Self {
            supabase: Arc::new(SupabaseClient::new(config)),
        }
    }

    pub fn with_client(supabase: Arc<SupabaseClient>) -> Self {
        Self { supabase }
    }

    fn representation_headers() -> HeaderMap {
        let mut headers = HeaderMap::new();
        headers.insert("Prefer", HeaderValue::from_static("return=representation"));
        headers
    }

    async fn fetch_appointments(&self, path: &str) -> Result<Vec<Appointment>, StoreError> {
        let result: Vec<Value> = self.supabase.request(
            Method::GET,
            path,
            None,
            None,
        ).await.map_err(map_database_error)?;

        parse_rows(result)
    }
}

/// Only transport-level failures are worth retrying; anything PostgREST
/// refused outright is permanent.
fn map_database_error(err: DatabaseError) -> StoreError {
    if err.is_constraint_violation() {
        StoreError::Overlap
    } else if err.is_foreign_key_violation() {
        StoreError::InvalidReference(err.to_string())
    } else if err.is_transient() {
        StoreError::Unavailable(err.to_string())
    } else {
        StoreError::Rejected(err.to_string())
    }
}

fn parse_rows<T: serde::de::DeserializeOwned>(rows: Vec<Value>) -> Result<Vec<T>, StoreError> {
    rows.into_iter()
        .map(serde_json::from_value)
        .collect::<Result<Vec<T>, _>>()
        .map_err(|e| StoreError::Rejected(format!("Failed to parse rows: {}", e)))
}

fn first_row<T: serde::de::DeserializeOwned>(rows: Vec<Value>) -> Result<Option<T>, StoreError> {
    Ok(parse_rows(rows)?.into_iter().next())
}

#[async_trait]
impl AppointmentStore for SupabaseAppointmentStore {
    async fn get_service(&self, service_id: Uuid) -> Result<Option<Service>, StoreError> {
        let path = format!("/rest/v1/services?id=eq.{}", service_id);
        let result: Vec<Value> = self.supabase.request(
            Method::GET,
            &path,
            None,
            None,
        ).await.map_err(map_database_error)?;

        first_row(result)
    }

    async fn list_active_services(&self) -> Result<Vec<Service>, StoreError> {
        let result: Vec<Value> = self.supabase.request(
            Method::GET,
            "/rest/v1/services?is_active=eq.true&order=name.asc",
            None,
            None,
        ).await.map_err(map_database_error)?;

        parse_rows(result)
    }

    async fn booked_intervals(&self, date: NaiveDate) -> Result<Vec<TimeInterval>, StoreError> {
        debug!("Fetching booked slots for {}", date);

        let rows: Vec<BookedSlotRow> = self.supabase.rpc(
            "get_booked_slots",
            json!({ "target_date": date.format("%Y-%m-%d").to_string() }),
            None,
        ).await.map_err(map_database_error)?;

        let mut intervals: Vec<TimeInterval> = rows.into_iter()
            .filter_map(|row| match TimeInterval::new(row.start_time, row.end_time) {
                Ok(interval) => Some(interval),
                Err(_) => {
                    warn!("Skipping degenerate booked slot {}-{} on {}", row.start_time, row.end_time, date);
                    None
                }
            })
            .collect();
        intervals.sort_by_key(|interval| interval.start);
        Ok(intervals)
    }

    async fn insert_if_free(&self, appointment: NewAppointment) -> Result<Appointment, StoreError> {
        let service_id = appointment.service_id;
        let body = serde_json::to_value(&appointment)
            .map_err(|e| StoreError::Rejected(format!("Failed to encode appointment: {}", e)))?;

        let result: Vec<Value> = self.supabase.request_with_headers(
            Method::POST,
            "/rest/v1/appointments",
            None,
            Some(body),
            Some(Self::representation_headers()),
        ).await.map_err(|err| match map_database_error(err) {
            StoreError::InvalidReference(_) => StoreError::InvalidReference(format!("Unknown service {}", service_id)),
            other => other,
        })?;

        first_row(result)?
            .ok_or_else(|| StoreError::Rejected("Insert returned no representation".to_string()))
    }

    async fn get_appointment(&self, appointment_id: Uuid) -> Result<Option<Appointment>, StoreError> {
        let path = format!("/rest/v1/appointments?id=eq.{}", appointment_id);
        Ok(self.fetch_appointments(&path).await?.into_iter().next())
    }

    async fn update_status(
        &self,
        appointment_id: Uuid,
        expected: AppointmentStatus,
        status: AppointmentStatus,
        notes: Option<String>,
    ) -> Result<Appointment, StoreError> {
        let mut update_data = serde_json::Map::new();
        update_data.insert("status".to_string(), json!(status));
        if let Some(notes) = notes {
            update_data.insert("notes".to_string(), json!(notes));
        }

        // The status filter makes the PATCH a compare-and-set.
        let path = format!("/rest/v1/appointments?id=eq.{}&status=eq.{}", appointment_id, expected.as_str());
        let result: Vec<Value> = self.supabase.request_with_headers(
            Method::PATCH,
            &path,
            None,
            Some(Value::Object(update_data)),
            Some(Self::representation_headers()),
        ).await.map_err(map_database_error)?;

        if let Some(updated) = first_row(result)? {
            return Ok(updated);
        }

        // Nothing matched: either the row is gone or its status moved on.
        match self.get_appointment(appointment_id).await? {
            Some(current) => {
                debug!("Appointment {} is {}, expected {}", appointment_id, current.status, expected);
                Err(StoreError::Stale)
            }
            None => Err(StoreError::NotFound),
        }
    }

    async fn list_appointments(&self, query: &AppointmentQuery) -> Result<Vec<Appointment>, StoreError> {
        let mut query_parts = Vec::new();
        if let Some(from) = query.from_date {
            query_parts.push(format!("appointment_date=gte.{}", from));
        }
        if let Some(to) = query.to_date {
            query_parts.push(format!("appointment_date=lte.{}", to));
        }
        if !query.statuses.is_empty() {
            let statuses: Vec<&str> = query.statuses.iter().map(AppointmentStatus::as_str).collect();
            query_parts.push(format!("status=in.({})", statuses.join(",")));
        }
        query_parts.push("order=appointment_date.asc,start_time.asc".to_string());

        let path = format!("/rest/v1/appointments?{}", query_parts.join("&"));
        self.fetch_appointments(&path).await
    }
}
