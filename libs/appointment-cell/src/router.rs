// libs/appointment-cell/src/router.rs
use std::sync::Arc;

use axum::{
    Router,
    routing::{get, patch},
};

use crate::handlers;
use crate::state::SchedulingState;

pub fn appointment_routes(state: Arc<SchedulingState>) -> Router {
    Router::new()
        .route("/", get(handlers::list_appointments).post(handlers::book_appointment))
        .route("/availability", get(handlers::get_available_slots))
        .route("/changes", get(handlers::stream_schedule_changes))
        .route("/{appointment_id}", get(handlers::get_appointment))
        .route("/{appointment_id}/status", patch(handlers::update_appointment_status))
        .with_state(state)
}

pub fn service_routes(state: Arc<SchedulingState>) -> Router {
    Router::new()
        .route("/", get(handlers::list_services))
        .with_state(state)
}
