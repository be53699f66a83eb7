mod common;

use std::sync::Arc;
use std::time::Duration;

use assert_matches::assert_matches;
use serde_json::json;
use uuid::Uuid;
use wiremock::matchers::{body_json, header, method, path, query_param};
use wiremock::{Mock, MockServer, ResponseTemplate};

use appointment_cell::models::{AppointmentError, AppointmentQuery, AppointmentStatus};
use appointment_cell::services::{
    AppointmentStore, ClinicCalendar, StoreError, SupabaseAppointmentStore, TransitionPolicy,
};
use appointment_cell::SchedulingState;
use shared_utils::test_utils::{MockSupabaseResponses, TestConfig};
use common::{book_request, d, interval, MONDAY};

const SERVICE_ID: &str = "7d3f4b0e-8a57-4c57-9d8c-2b6a3f1c9e01";

fn store_for(server: &MockServer) -> SupabaseAppointmentStore {
    SupabaseAppointmentStore::new(&TestConfig::with_supabase_url(&server.uri()).to_app_config())
}

fn state_for(server: &MockServer) -> SchedulingState {
    SchedulingState::new(
        Arc::new(store_for(server)),
        ClinicCalendar::default(),
        Duration::from_secs(2),
        TransitionPolicy::Permissive,
    )
}

async fn mount_service(server: &MockServer, duration_minutes: i32) {
    Mock::given(method("GET"))
        .and(path("/rest/v1/services"))
        .and(query_param("id", format!("eq.{}", SERVICE_ID)))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!([
            MockSupabaseResponses::service_response(SERVICE_ID, "General consultation", duration_minutes)
        ])))
        .mount(server)
        .await;
}

fn service_id() -> Uuid {
    Uuid::parse_str(SERVICE_ID).unwrap()
}

#[tokio::test]
async fn test_get_service_parses_row() {
    let server = MockServer::start().await;
    mount_service(&server, 45).await;

    let service = store_for(&server).get_service(service_id()).await.unwrap().unwrap();

    assert_eq!(service.name, "General consultation");
    assert_eq!(service.duration_minutes, 45);
    assert!(service.is_active);
}

#[tokio::test]
async fn test_missing_service_is_none() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/rest/v1/services"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!([])))
        .mount(&server)
        .await;

    let service = store_for(&server).get_service(Uuid::new_v4()).await.unwrap();
    assert!(service.is_none());
}

#[tokio::test]
async fn test_booked_intervals_come_from_rpc_sorted() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/rest/v1/rpc/get_booked_slots"))
        .and(body_json(json!({ "target_date": MONDAY })))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!([
            MockSupabaseResponses::booked_slot_response("14:00:00", "14:30:00"),
            MockSupabaseResponses::booked_slot_response("10:00:00", "10:45:00"),
            MockSupabaseResponses::booked_slot_response("12:00:00", "12:00:00")
        ])))
        .expect(1)
        .mount(&server)
        .await;

    let booked = store_for(&server).booked_intervals(d(MONDAY)).await.unwrap();

    assert_eq!(booked, vec![interval((10, 0), (10, 45)), interval((14, 0), (14, 30))]);
}

#[tokio::test]
async fn test_availability_reflects_remote_bookings() {
    let server = MockServer::start().await;
    mount_service(&server, 30).await;
    Mock::given(method("POST"))
        .and(path("/rest/v1/rpc/get_booked_slots"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!([
            MockSupabaseResponses::booked_slot_response("10:00:00", "10:45:00")
        ])))
        .mount(&server)
        .await;

    let state = state_for(&server);
    let labels: Vec<String> = state.availability
        .available_slots(service_id(), d(MONDAY))
        .await
        .unwrap()
        .iter()
        .map(|slot| slot.label())
        .collect();

    assert_eq!(labels.len(), 14);
    assert!(!labels.contains(&"10:30".to_string()));
    assert!(labels.contains(&"11:00".to_string()));
}

#[tokio::test]
async fn test_booking_posts_pending_row_and_returns_representation() {
    let server = MockServer::start().await;
    mount_service(&server, 30).await;
    Mock::given(method("POST"))
        .and(path("/rest/v1/appointments"))
        .and(header("Prefer", "return=representation"))
        .and(body_json(json!({
            "service_id": SERVICE_ID,
            "patient_name": "Ana Silva",
            "patient_email": "ana@example.com",
            "patient_phone": "(555) 123-4567",
            "appointment_date": MONDAY,
            "start_time": "10:00:00",
            "end_time": "10:30:00",
            "status": "pending"
        })))
        .respond_with(ResponseTemplate::new(201).set_body_json(json!([
            MockSupabaseResponses::appointment_response(SERVICE_ID, MONDAY, "10:00:00", "10:30:00", "pending")
        ])))
        .expect(1)
        .mount(&server)
        .await;

    let appointment = state_for(&server).booking
        .book_appointment(book_request(service_id(), MONDAY, 10, 0))
        .await
        .unwrap();

    assert_eq!(appointment.status, AppointmentStatus::Pending);
    assert_eq!(appointment.end_time, common::t(10, 30));
}

#[tokio::test]
async fn test_exclusion_violation_maps_to_slot_already_booked() {
    let server = MockServer::start().await;
    mount_service(&server, 30).await;
    Mock::given(method("POST"))
        .and(path("/rest/v1/appointments"))
        .respond_with(ResponseTemplate::new(409).set_body_json(MockSupabaseResponses::exclusion_violation()))
        .mount(&server)
        .await;

    let result = state_for(&server).booking
        .book_appointment(book_request(service_id(), MONDAY, 10, 0))
        .await;

    assert_matches!(result, Err(AppointmentError::SlotAlreadyBooked));
}

#[tokio::test]
async fn test_insert_conflict_is_an_overlap_at_store_level() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/rest/v1/appointments"))
        .respond_with(ResponseTemplate::new(409).set_body_json(MockSupabaseResponses::exclusion_violation()))
        .mount(&server)
        .await;

    let result = store_for(&server).insert_if_free(appointment_cell::models::NewAppointment {
        service_id: service_id(),
        patient_name: "Ana Silva".to_string(),
        patient_email: "ana@example.com".to_string(),
        patient_phone: "5551234567".to_string(),
        appointment_date: d(MONDAY),
        start_time: common::t(10, 0),
        end_time: common::t(10, 30),
        status: AppointmentStatus::Pending,
    }).await;

    assert_matches!(result, Err(StoreError::Overlap));
}

#[tokio::test]
async fn test_server_error_maps_to_storage_unavailable() {
    let server = MockServer::start().await;
    mount_service(&server, 30).await;
    Mock::given(method("POST"))
        .and(path("/rest/v1/rpc/get_booked_slots"))
        .respond_with(ResponseTemplate::new(503).set_body_string("service unavailable"))
        .mount(&server)
        .await;

    let result = state_for(&server).availability.available_slots(service_id(), d(MONDAY)).await;

    assert_matches!(result, Err(AppointmentError::StorageUnavailable(_)));
}

#[tokio::test]
async fn test_status_update_patches_row() {
    let server = MockServer::start().await;
    let appointment_id = Uuid::new_v4();
    let mut row = MockSupabaseResponses::appointment_response(SERVICE_ID, MONDAY, "14:00:00", "14:30:00", "cancelled");
    row["id"] = json!(appointment_id.to_string());
    row["notes"] = json!("Patient called");

    Mock::given(method("PATCH"))
        .and(path("/rest/v1/appointments"))
        .and(query_param("id", format!("eq.{}", appointment_id)))
        .and(query_param("status", "eq.pending"))
        .and(body_json(json!({ "status": "cancelled", "notes": "Patient called" })))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!([row])))
        .expect(1)
        .mount(&server)
        .await;

    let updated = store_for(&server)
        .update_status(
            appointment_id,
            AppointmentStatus::Pending,
            AppointmentStatus::Cancelled,
            Some("Patient called".to_string()),
        )
        .await
        .unwrap();

    assert_eq!(updated.id, appointment_id);
    assert_eq!(updated.status, AppointmentStatus::Cancelled);
    assert_eq!(updated.notes.as_deref(), Some("Patient called"));
}

#[tokio::test]
async fn test_status_update_of_missing_row_is_not_found() {
    let server = MockServer::start().await;
    Mock::given(method("PATCH"))
        .and(path("/rest/v1/appointments"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!([])))
        .mount(&server)
        .await;
    Mock::given(method("GET"))
        .and(path("/rest/v1/appointments"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!([])))
        .mount(&server)
        .await;

    let result = store_for(&server)
        .update_status(Uuid::new_v4(), AppointmentStatus::Pending, AppointmentStatus::Approved, None)
        .await;

    assert_matches!(result, Err(StoreError::NotFound));
}

#[tokio::test]
async fn test_status_update_of_row_in_another_status_is_stale() {
    let server = MockServer::start().await;
    let appointment_id = Uuid::new_v4();
    let mut row = MockSupabaseResponses::appointment_response(SERVICE_ID, MONDAY, "14:00:00", "14:30:00", "cancelled");
    row["id"] = json!(appointment_id.to_string());

    // The status filter matches nothing because the row was cancelled meanwhile.
    Mock::given(method("PATCH"))
        .and(path("/rest/v1/appointments"))
        .and(query_param("status", "eq.pending"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!([])))
        .expect(1)
        .mount(&server)
        .await;
    Mock::given(method("GET"))
        .and(path("/rest/v1/appointments"))
        .and(query_param("id", format!("eq.{}", appointment_id)))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!([row])))
        .mount(&server)
        .await;

    let store = store_for(&server);
    let result = store
        .update_status(appointment_id, AppointmentStatus::Pending, AppointmentStatus::Approved, None)
        .await;
    assert_matches!(result, Err(StoreError::Stale));

    let err: AppointmentError = StoreError::Stale.into();
    assert_matches!(err, AppointmentError::ConcurrentUpdate);
}

#[tokio::test]
async fn test_insert_for_unknown_service_is_a_validation_error() {
    let server = MockServer::start().await;
    mount_service(&server, 30).await;
    Mock::given(method("POST"))
        .and(path("/rest/v1/appointments"))
        .respond_with(ResponseTemplate::new(409).set_body_json(MockSupabaseResponses::foreign_key_violation()))
        .mount(&server)
        .await;

    let err = state_for(&server).booking
        .book_appointment(book_request(service_id(), MONDAY, 10, 0))
        .await
        .unwrap_err();

    assert_matches!(&err, AppointmentError::ValidationError(msg) if msg.contains("Unknown service"));
    assert!(!err.is_retryable());
}

#[tokio::test]
async fn test_refused_requests_are_not_reported_as_outages() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/rest/v1/services"))
        .respond_with(ResponseTemplate::new(401).set_body_json(json!({ "message": "Invalid API key" })))
        .mount(&server)
        .await;
    Mock::given(method("GET"))
        .and(path("/rest/v1/appointments"))
        .respond_with(ResponseTemplate::new(400).set_body_json(json!({
            "code": "PGRST100",
            "message": "failed to parse filter"
        })))
        .mount(&server)
        .await;

    let state = state_for(&server);

    let err = state.availability.available_slots(service_id(), d(MONDAY)).await.unwrap_err();
    assert_matches!(err, AppointmentError::StorageRejected(_));
    assert!(!err.is_retryable());

    let err = state.lifecycle
        .set_status(Uuid::new_v4(), AppointmentStatus::Cancelled, None)
        .await
        .unwrap_err();
    assert_matches!(err, AppointmentError::StorageRejected(_));
}

#[tokio::test]
async fn test_malformed_rows_are_rejected_not_retried() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/rest/v1/services"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!([{ "id": "not-a-uuid" }])))
        .mount(&server)
        .await;

    let result = store_for(&server).get_service(service_id()).await;
    assert_matches!(result, Err(StoreError::Rejected(_)));
}

#[tokio::test]
async fn test_list_appointments_builds_filters() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/rest/v1/appointments"))
        .and(query_param("status", "in.(pending,approved)"))
        .and(query_param("order", "appointment_date.asc,start_time.asc"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!([
            MockSupabaseResponses::appointment_response(SERVICE_ID, MONDAY, "09:00:00", "09:30:00", "pending"),
            MockSupabaseResponses::appointment_response(SERVICE_ID, MONDAY, "11:00:00", "11:30:00", "approved")
        ])))
        .expect(1)
        .mount(&server)
        .await;

    let query = AppointmentQuery {
        from_date: Some(d(MONDAY)),
        to_date: Some(d("2099-06-05")),
        statuses: vec![AppointmentStatus::Pending, AppointmentStatus::Approved],
    };
    let appointments = store_for(&server).list_appointments(&query).await.unwrap();

    assert_eq!(appointments.len(), 2);
    assert_eq!(appointments[1].status, AppointmentStatus::Approved);
}
