// libs/appointment-cell/src/handlers.rs
use std::convert::Infallible;
use std::sync::Arc;

use axum::{
    extract::{Path, Query, State},
    http::StatusCode,
    response::sse::{Event, KeepAlive, Sse},
    Json,
};
use chrono::NaiveDate;
use futures::stream::{self, Stream};
use serde::Deserialize;
use serde_json::{json, Value};
use tokio::sync::broadcast::error::RecvError;
use tracing::warn;
use uuid::Uuid;

use shared_models::error::AppError;

use crate::models::{
    AppointmentError, AppointmentQuery, AppointmentStatus, AvailabilityResponse,
    BookAppointmentRequest, UpdateStatusRequest,
};
use crate::state::SchedulingState;

// ==============================================================================
// QUERY PARAMETER STRUCTS
// ==============================================================================

#[derive(Debug, Deserialize)]
pub struct AvailabilityQueryParams {
    pub service_id: Uuid,
    pub date: String,
}

#[derive(Debug, Deserialize)]
pub struct AppointmentQueryParams {
    pub from: Option<String>,
    pub to: Option<String>,
    /// Comma-separated statuses, e.g. `pending,approved`.
    pub status: Option<String>,
}

impl From<AppointmentError> for AppError {
    fn from(e: AppointmentError) -> Self {
        match e {
            AppointmentError::ValidationError(msg) => AppError::ValidationError(msg),
            AppointmentError::NotFound => AppError::NotFound("Appointment not found".to_string()),
            AppointmentError::SlotAlreadyBooked
            | AppointmentError::InvalidStatusTransition { .. }
            | AppointmentError::ConcurrentUpdate => AppError::Conflict(e.to_string()),
            AppointmentError::StorageUnavailable(_) => {
                AppError::ServiceUnavailable("Scheduling is temporarily unavailable, please retry".to_string())
            }
            AppointmentError::StorageRejected(_) => {
                AppError::Internal("Scheduling could not complete the request".to_string())
            }
        }
    }
}

fn parse_date(field: &str, raw: &str) -> Result<NaiveDate, AppError> {
    NaiveDate::parse_from_str(raw.trim(), "%Y-%m-%d")
        .map_err(|_| AppError::ValidationError(format!("{} must be a YYYY-MM-DD date, got '{}'", field, raw)))
}

fn parse_statuses(raw: &str) -> Result<Vec<AppointmentStatus>, AppError> {
    raw.split(',')
        .map(str::trim)
        .filter(|s| !s.is_empty())
        .map(|s| s.parse::<AppointmentStatus>().map_err(AppError::from))
        .collect()
}

// ==============================================================================
// CATALOGUE HANDLERS
// ==============================================================================

pub async fn list_services(
    State(state): State<Arc<SchedulingState>>,
) -> Result<Json<Value>, AppError> {
    let services = state.store.list_active_services().await?;
    Ok(Json(json!({ "services": services })))
}

// ==============================================================================
// AVAILABILITY & BOOKING HANDLERS
// ==============================================================================

pub async fn get_available_slots(
    State(state): State<Arc<SchedulingState>>,
    Query(params): Query<AvailabilityQueryParams>,
) -> Result<Json<AvailabilityResponse>, AppError> {
    let date = parse_date("date", &params.date)?;

    let slots = state.availability.available_slots(params.service_id, date).await?;

    Ok(Json(AvailabilityResponse {
        service_id: params.service_id,
        date,
        slots: slots.iter().map(|slot| slot.label()).collect(),
    }))
}

pub async fn book_appointment(
    State(state): State<Arc<SchedulingState>>,
    Json(request): Json<BookAppointmentRequest>,
) -> Result<(StatusCode, Json<Value>), AppError> {
    let appointment = state.booking.book_appointment(request).await?;

    Ok((StatusCode::CREATED, Json(json!({
        "success": true,
        "appointment": appointment,
        "message": "Appointment requested. We'll confirm your appointment soon."
    }))))
}

// ==============================================================================
// ADMIN HANDLERS
// ==============================================================================

pub async fn list_appointments(
    State(state): State<Arc<SchedulingState>>,
    Query(params): Query<AppointmentQueryParams>,
) -> Result<Json<Value>, AppError> {
    let query = AppointmentQuery {
        from_date: params.from.as_deref().map(|raw| parse_date("from", raw)).transpose()?,
        to_date: params.to.as_deref().map(|raw| parse_date("to", raw)).transpose()?,
        statuses: params.status.as_deref().map(parse_statuses).transpose()?.unwrap_or_default(),
    };

    if let (Some(from), Some(to)) = (query.from_date, query.to_date) {
        if from > to {
            return Err(AppError::ValidationError("from must not be after to".to_string()));
        }
    }

    let appointments = state.store.list_appointments(&query).await?;
    Ok(Json(json!({
        "appointments": appointments,
        "count": appointments.len()
    })))
}

pub async fn get_appointment(
    State(state): State<Arc<SchedulingState>>,
    Path(appointment_id): Path<Uuid>,
) -> Result<Json<Value>, AppError> {
    let appointment = state.store.get_appointment(appointment_id).await?
        .ok_or(AppointmentError::NotFound)?;
    Ok(Json(json!(appointment)))
}

pub async fn update_appointment_status(
    State(state): State<Arc<SchedulingState>>,
    Path(appointment_id): Path<Uuid>,
    Json(request): Json<UpdateStatusRequest>,
) -> Result<Json<Value>, AppError> {
    let appointment = state.lifecycle
        .set_status(appointment_id, request.status, request.notes)
        .await?;

    Ok(Json(json!({
        "success": true,
        "appointment": appointment,
        "message": format!("Appointment {}", appointment.status)
    })))
}

/// Server-sent events for every committed booking or status change.
pub async fn stream_schedule_changes(
    State(state): State<Arc<SchedulingState>>,
) -> Sse<impl Stream<Item = Result<Event, Infallible>>> {
    let receiver = state.notifier.subscribe();

    let events = stream::unfold(receiver, |mut receiver| async move {
        let event = match receiver.recv().await {
            Ok(change) => Event::default()
                .event("schedule_change")
                .json_data(&change)
                .unwrap_or_else(|e| {
                    warn!("Failed to encode schedule change: {}", e);
                    Event::default().event("resync")
                }),
            Err(RecvError::Lagged(skipped)) => {
                warn!("Change stream subscriber lagged by {} events", skipped);
                Event::default().event("resync").data(skipped.to_string())
            }
            Err(RecvError::Closed) => return None,
        };
        Some((Ok(event), receiver))
    });

    Sse::new(events).keep_alive(KeepAlive::default())
}
