#![allow(dead_code)]

use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use chrono::{NaiveDate, NaiveDateTime, NaiveTime};
use uuid::Uuid;

use appointment_cell::models::{
    Appointment, AppointmentQuery, AppointmentStatus, BookAppointmentRequest, NewAppointment,
    Service, TimeInterval,
};
use appointment_cell::services::{
    AppointmentStore, ClinicCalendar, InMemoryAppointmentStore, StoreError, TransitionPolicy,
};
use appointment_cell::SchedulingState;

/// A Monday, far enough ahead to never be "in the past".
pub const MONDAY: &str = "2099-06-01";
/// Saturday of the same week; the default clinic is open.
pub const SATURDAY: &str = "2099-06-06";
/// Sunday of the same week; the default clinic is closed.
pub const SUNDAY: &str = "2099-06-07";

pub fn t(h: u32, m: u32) -> NaiveTime {
    NaiveTime::from_hms_opt(h, m, 0).unwrap()
}

pub fn d(raw: &str) -> NaiveDate {
    NaiveDate::parse_from_str(raw, "%Y-%m-%d").unwrap()
}

pub fn at(date: &str, h: u32, m: u32) -> NaiveDateTime {
    d(date).and_time(t(h, m))
}

/// A clinic clock reading well before any test date.
pub fn early_now() -> NaiveDateTime {
    at("2099-05-01", 8, 0)
}

pub fn interval(start: (u32, u32), end: (u32, u32)) -> TimeInterval {
    TimeInterval::new(t(start.0, start.1), t(end.0, end.1)).unwrap()
}

pub fn service(name: &str, duration_minutes: i32) -> Service {
    Service {
        id: Uuid::new_v4(),
        name: name.to_string(),
        description: None,
        duration_minutes,
        is_active: true,
    }
}

pub fn book_request(service_id: Uuid, date: &str, h: u32, m: u32) -> BookAppointmentRequest {
    BookAppointmentRequest {
        service_id,
        appointment_date: d(date),
        start_time: t(h, m),
        patient_name: "Ana Silva".to_string(),
        patient_email: "ana@example.com".to_string(),
        patient_phone: "(555) 123-4567".to_string(),
    }
}

pub fn state_with(store: Arc<dyn AppointmentStore>, policy: TransitionPolicy) -> SchedulingState {
    SchedulingState::new(store, ClinicCalendar::default(), Duration::from_secs(2), policy)
}

/// In-memory state seeded with the given services, default clinic hours.
pub fn memory_state(services: Vec<Service>) -> (Arc<InMemoryAppointmentStore>, SchedulingState) {
    memory_state_with_policy(services, TransitionPolicy::Permissive)
}

pub fn memory_state_with_policy(
    services: Vec<Service>,
    policy: TransitionPolicy,
) -> (Arc<InMemoryAppointmentStore>, SchedulingState) {
    let store = Arc::new(InMemoryAppointmentStore::with_services(services));
    let state = state_with(store.clone(), policy);
    (store, state)
}

/// Writes an appointment straight into the store, bypassing booking rules.
pub async fn seed_appointment(
    store: &InMemoryAppointmentStore,
    service_id: Uuid,
    date: &str,
    slot: TimeInterval,
    status: AppointmentStatus,
) -> Appointment {
    let appointment = store.insert_if_free(NewAppointment {
        service_id,
        patient_name: "Seeded Patient".to_string(),
        patient_email: "seeded@example.com".to_string(),
        patient_phone: "5550000000".to_string(),
        appointment_date: d(date),
        start_time: slot.start,
        end_time: slot.end,
        status: AppointmentStatus::Pending,
    }).await.unwrap();

    if status == AppointmentStatus::Pending {
        appointment
    } else {
        store.update_status(appointment.id, AppointmentStatus::Pending, status, None).await.unwrap()
    }
}

/// Store whose backing database cannot be reached.
pub struct UnreachableStore;

#[async_trait]
impl AppointmentStore for UnreachableStore {
    async fn get_service(&self, _service_id: Uuid) -> Result<Option<Service>, StoreError> {
        Err(StoreError::Unavailable("connection refused".to_string()))
    }

    async fn list_active_services(&self) -> Result<Vec<Service>, StoreError> {
        Err(StoreError::Unavailable("connection refused".to_string()))
    }

    async fn booked_intervals(&self, _date: NaiveDate) -> Result<Vec<TimeInterval>, StoreError> {
        Err(StoreError::Unavailable("connection refused".to_string()))
    }

    async fn insert_if_free(&self, _appointment: NewAppointment) -> Result<Appointment, StoreError> {
        Err(StoreError::Unavailable("connection refused".to_string()))
    }

    async fn get_appointment(&self, _appointment_id: Uuid) -> Result<Option<Appointment>, StoreError> {
        Err(StoreError::Unavailable("connection refused".to_string()))
    }

    async fn update_status(
        &self,
        _appointment_id: Uuid,
        _expected: AppointmentStatus,
        _status: AppointmentStatus,
        _notes: Option<String>,
    ) -> Result<Appointment, StoreError> {
        Err(StoreError::Unavailable("connection refused".to_string()))
    }

    async fn list_appointments(&self, _query: &AppointmentQuery) -> Result<Vec<Appointment>, StoreError> {
        Err(StoreError::Unavailable("connection refused".to_string()))
    }
}

/// Serves services normally but hangs on every appointment read or write.
pub struct HangingStore {
    pub inner: InMemoryAppointmentStore,
    pub delay: Duration,
}

#[async_trait]
impl AppointmentStore for HangingStore {
    async fn get_service(&self, service_id: Uuid) -> Result<Option<Service>, StoreError> {
        self.inner.get_service(service_id).await
    }

    async fn list_active_services(&self) -> Result<Vec<Service>, StoreError> {
        self.inner.list_active_services().await
    }

    async fn booked_intervals(&self, date: NaiveDate) -> Result<Vec<TimeInterval>, StoreError> {
        tokio::time::sleep(self.delay).await;
        self.inner.booked_intervals(date).await
    }

    async fn insert_if_free(&self, appointment: NewAppointment) -> Result<Appointment, StoreError> {
        tokio::time::sleep(self.delay).await;
        self.inner.insert_if_free(appointment).await
    }

    async fn get_appointment(&self, appointment_id: Uuid) -> Result<Option<Appointment>, StoreError> {
        tokio::time::sleep(self.delay).await;
        self.inner.get_appointment(appointment_id).await
    }

    async fn update_status(
        &self,
        appointment_id: Uuid,
        expected: AppointmentStatus,
        status: AppointmentStatus,
        notes: Option<String>,
    ) -> Result<Appointment, StoreError> {
        tokio::time::sleep(self.delay).await;
        self.inner.update_status(appointment_id, expected, status, notes).await
    }

    async fn list_appointments(&self, query: &AppointmentQuery) -> Result<Vec<Appointment>, StoreError> {
        tokio::time::sleep(self.delay).await;
        self.inner.list_appointments(query).await
    }
}

/// Counts `booked_intervals` calls so tests can prove a query was skipped.
pub struct CountingStore {
    pub inner: InMemoryAppointmentStore,
    pub booked_queries: std::sync::atomic::AtomicUsize,
}

impl CountingStore {
    pub fn new(services: Vec<Service>) -> Self {
        Self {
            inner: InMemoryAppointmentStore::with_services(services),
            booked_queries: std::sync::atomic::AtomicUsize::new(0),
        }
    }

    pub fn booked_queries(&self) -> usize {
        self.booked_queries.load(std::sync::atomic::Ordering::SeqCst)
    }
}

#[async_trait]
impl AppointmentStore for CountingStore {
    async fn get_service(&self, service_id: Uuid) -> Result<Option<Service>, StoreError> {
        self.inner.get_service(service_id).await
    }

    async fn list_active_services(&self) -> Result<Vec<Service>, StoreError> {
        self.inner.list_active_services().await
    }

    async fn booked_intervals(&self, date: NaiveDate) -> Result<Vec<TimeInterval>, StoreError> {
        self.booked_queries.fetch_add(1, std::sync::atomic::Ordering::SeqCst);
        self.inner.booked_intervals(date).await
    }

    async fn insert_if_free(&self, appointment: NewAppointment) -> Result<Appointment, StoreError> {
        self.inner.insert_if_free(appointment).await
    }

    async fn get_appointment(&self, appointment_id: Uuid) -> Result<Option<Appointment>, StoreError> {
        self.inner.get_appointment(appointment_id).await
    }

    async fn update_status(
        &self,
        appointment_id: Uuid,
        expected: AppointmentStatus,
        status: AppointmentStatus,
        notes: Option<String>,
    ) -> Result<Appointment, StoreError> {
        self.inner.update_status(appointment_id, expected, status, notes).await
    }

    async fn list_appointments(&self, query: &AppointmentQuery) -> Result<Vec<Appointment>, StoreError> {
        self.inner.list_appointments(query).await
    }
}

/// Hands out the row as it was read, then cancels it before the caller can
/// write, the way a second admin acting at the same moment would.
pub struct InterleavingStore {
    pub inner: InMemoryAppointmentStore,
}

#[async_trait]
impl AppointmentStore for InterleavingStore {
    async fn get_service(&self, service_id: Uuid) -> Result<Option<Service>, StoreError> {
        self.inner.get_service(service_id).await
    }

    async fn list_active_services(&self) -> Result<Vec<Service>, StoreError> {
        self.inner.list_active_services().await
    }

    async fn booked_intervals(&self, date: NaiveDate) -> Result<Vec<TimeInterval>, StoreError> {
        self.inner.booked_intervals(date).await
    }

    async fn insert_if_free(&self, appointment: NewAppointment) -> Result<Appointment, StoreError> {
        self.inner.insert_if_free(appointment).await
    }

    async fn get_appointment(&self, appointment_id: Uuid) -> Result<Option<Appointment>, StoreError> {
        let snapshot = self.inner.get_appointment(appointment_id).await?;
        if let Some(read) = &snapshot {
            if read.status != AppointmentStatus::Cancelled {
                self.inner
                    .update_status(appointment_id, read.status, AppointmentStatus::Cancelled, None)
                    .await?;
            }
        }
        Ok(snapshot)
    }

    async fn update_status(
        &self,
        appointment_id: Uuid,
        expected: AppointmentStatus,
        status: AppointmentStatus,
        notes: Option<String>,
    ) -> Result<Appointment, StoreError> {
        self.inner.update_status(appointment_id, expected, status, notes).await
    }

    async fn list_appointments(&self, query: &AppointmentQuery) -> Result<Vec<Appointment>, StoreError> {
        self.inner.list_appointments(query).await
    }
}

/// Store that refuses every call for a reason retrying will not fix.
pub struct RejectingStore;

fn rejected() -> StoreError {
    StoreError::Rejected("permission denied for table appointments".to_string())
}

#[async_trait]
impl AppointmentStore for RejectingStore {
    async fn get_service(&self, _service_id: Uuid) -> Result<Option<Service>, StoreError> {
        Err(rejected())
    }

    async fn list_active_services(&self) -> Result<Vec<Service>, StoreError> {
        Err(rejected())
    }

    async fn booked_intervals(&self, _date: NaiveDate) -> Result<Vec<TimeInterval>, StoreError> {
        Err(rejected())
    }

    async fn insert_if_free(&self, _appointment: NewAppointment) -> Result<Appointment, StoreError> {
        Err(rejected())
    }

    async fn get_appointment(&self, _appointment_id: Uuid) -> Result<Option<Appointment>, StoreError> {
        Err(rejected())
    }

    async fn update_status(
        &self,
        _appointment_id: Uuid,
        _expected: AppointmentStatus,
        _status: AppointmentStatus,
        _notes: Option<String>,
    ) -> Result<Appointment, StoreError> {
        Err(rejected())
    }

    async fn list_appointments(&self, _query: &AppointmentQuery) -> Result<Vec<Appointment>, StoreError> {
        Err(rejected())
    }
}
