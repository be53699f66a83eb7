// libs/appointment-cell/src/services/store.rs
use std::collections::HashMap;
use std::future::Future;
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use chrono::{NaiveDate, Utc};
use thiserror::Error;
use tokio::sync::RwLock;
use tracing::{debug, error, warn};
use uuid::Uuid;

use crate::models::{
    Appointment, AppointmentError, AppointmentQuery, AppointmentStatus, NewAppointment,
    Service, TimeInterval,
};
use crate::services::conflict;

#[derive(Error, Debug, Clone, PartialEq)]
pub enum StoreError {
    #[error("interval overlaps an existing booking")]
    Overlap,

    #[error("record not found")]
    NotFound,

    /// Conditional update found the row in a different status than expected.
    #[error("record changed since it was read")]
    Stale,

    #[error("referenced record does not exist: {0}")]
    InvalidReference(String),

    #[error("store unavailable: {0}")]
    Unavailable(String),

    #[error("store rejected request: {0}")]
    Rejected(String),
}

impl From<StoreError> for AppointmentError {
    fn from(err: StoreError) -> Self {
        match err {
            StoreError::Overlap => AppointmentError::SlotAlreadyBooked,
            StoreError::NotFound => AppointmentError::NotFound,
            StoreError::Stale => AppointmentError::ConcurrentUpdate,
            StoreError::InvalidReference(msg) => AppointmentError::ValidationError(msg),
            StoreError::Unavailable(msg) => AppointmentError::StorageUnavailable(msg),
            StoreError::Rejected(msg) => AppointmentError::StorageRejected(msg),
        }
    }
}

/// Persistent appointment storage.
///
/// `insert_if_free` and `update_status` must perform their overlap check in the
/// same atomic unit as the write: of two racing writes whose intervals overlap
/// on the same date, at most one may succeed and the other gets
/// `StoreError::Overlap`.
#[async_trait]
pub trait AppointmentStore: Send + Sync {
    async fn get_service(&self, service_id: Uuid) -> Result<Option<Service>, StoreError>;

    async fn list_active_services(&self) -> Result<Vec<Service>, StoreError>;

    /// Intervals of all non-cancelled appointments on `date`, across services.
    async fn booked_intervals(&self, date: NaiveDate) -> Result<Vec<TimeInterval>, StoreError>;

    async fn insert_if_free(&self, appointment: NewAppointment) -> Result<Appointment, StoreError>;

    async fn get_appointment(&self, appointment_id: Uuid) -> Result<Option<Appointment>, StoreError>;

    /// Sets status and, when given, notes, provided the row is still in
    /// `expected`; otherwise fails with `StoreError::Stale` and writes nothing.
    /// Moving a cancelled appointment to an occupying status re-checks its
    /// interval atomically.
    async fn update_status(
        &self,
        appointment_id: Uuid,
        expected: AppointmentStatus,
        status: AppointmentStatus,
        notes: Option<String>,
    ) -> Result<Appointment, StoreError>;

    /// Matching appointments ordered by date, then start time, ascending.
    async fn list_appointments(&self, query: &AppointmentQuery) -> Result<Vec<Appointment>, StoreError>;
}

// ==============================================================================
// BOUNDED ACCESS
// ==============================================================================

/// Store handle whose every call is cut off after `timeout`.
#[derive(Clone)]
pub struct BoundedStore {
    inner: Arc<dyn AppointmentStore>,
    timeout: Duration,
}

impl BoundedStore {
    pub fn new(inner: Arc<dyn AppointmentStore>, timeout: Duration) -> Self {
        Self { inner, timeout }
    }

    async fn bounded<T, F>(&self, operation: &str, fut: F) -> Result<T, AppointmentError>
    where
        F: Future<Output = Result<T, StoreError>>,
    {
        match tokio::time::timeout(self.timeout, fut).await {
            Ok(Ok(value)) => Ok(value),
            Ok(Err(StoreError::Unavailable(msg))) => {
                error!("Store {} failed: {}", operation, msg);
                Err(AppointmentError::StorageUnavailable(msg))
            }
            Ok(Err(StoreError::Rejected(msg))) => {
                error!("Store {} rejected: {}", operation, msg);
                Err(AppointmentError::StorageRejected(msg))
            }
            Ok(Err(err)) => Err(err.into()),
            Err(_) => {
                error!("Store {} timed out after {:?}", operation, self.timeout);
                Err(AppointmentError::StorageUnavailable(format!(
                    "{} timed out after {}ms", operation, self.timeout.as_millis()
                )))
            }
        }
    }

    pub async fn get_service(&self, service_id: Uuid) -> Result<Option<Service>, AppointmentError> {
        self.bounded("get_service", self.inner.get_service(service_id)).await
    }

    pub async fn list_active_services(&self) -> Result<Vec<Service>, AppointmentError> {
        self.bounded("list_active_services", self.inner.list_active_services()).await
    }

    pub async fn booked_intervals(&self, date: NaiveDate) -> Result<Vec<TimeInterval>, AppointmentError> {
        self.bounded("booked_intervals", self.inner.booked_intervals(date)).await
    }

    pub async fn insert_if_free(&self, appointment: NewAppointment) -> Result<Appointment, AppointmentError> {
        self.bounded("insert_if_free", self.inner.insert_if_free(appointment)).await
    }

    pub async fn get_appointment(&self, appointment_id: Uuid) -> Result<Option<Appointment>, AppointmentError> {
        self.bounded("get_appointment", self.inner.get_appointment(appointment_id)).await
    }

    pub async fn update_status(
        &self,
        appointment_id: Uuid,
        expected: AppointmentStatus,
        status: AppointmentStatus,
        notes: Option<String>,
    ) -> Result<Appointment, AppointmentError> {
        self.bounded("update_status", self.inner.update_status(appointment_id, expected, status, notes)).await
    }

    pub async fn list_appointments(&self, query: &AppointmentQuery) -> Result<Vec<Appointment>, AppointmentError> {
        self.bounded("list_appointments", self.inner.list_appointments(query)).await
    }
}

// ==============================================================================
// IN-MEMORY STORE
// ==============================================================================

/// Process-local store for development and tests. The overlap check and the
/// write happen under one write lock, which gives the same linearizable commit
/// as the database exclusion constraint, but only within a single process.
#[derive(Default)]
pub struct InMemoryAppointmentStore {
    services: RwLock<HashMap<Uuid, Service>>,
    appointments: RwLock<HashMap<Uuid, Appointment>>,
}

impl InMemoryAppointmentStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_services(services: Vec<Service>) -> Self {
        Self {
            services: RwLock::new(services.into_iter().map(|s| (s.id, s)).collect()),
            appointments: RwLock::new(HashMap::new()),
        }
    }

    pub async fn upsert_service(&self, service: Service) {
        self.services.write().await.insert(service.id, service);
    }

    fn occupied_on<'a>(
        appointments: &'a HashMap<Uuid, Appointment>,
        date: NaiveDate,
        exclude: Option<Uuid>,
    ) -> impl Iterator<Item = TimeInterval> + 'a {
        appointments.values()
            .filter(move |apt| apt.appointment_date == date && apt.occupies_slot())
            .filter(move |apt| Some(apt.id) != exclude)
            .map(Appointment::interval)
    }
}

#[async_trait]
impl AppointmentStore for InMemoryAppointmentStore {
    async fn get_service(&self, service_id: Uuid) -> Result<Option<Service>, StoreError> {
        Ok(self.services.read().await.get(&service_id).cloned())
    }

    async fn list_active_services(&self) -> Result<Vec<Service>, StoreError> {
        let mut services: Vec<Service> = self.services.read().await.values()
            .filter(|service| service.is_active)
            .cloned()
            .collect();
        services.sort_by(|a, b| a.name.cmp(&b.name));
        Ok(services)
    }

    async fn booked_intervals(&self, date: NaiveDate) -> Result<Vec<TimeInterval>, StoreError> {
        let appointments = self.appointments.read().await;
        let mut intervals: Vec<TimeInterval> = Self::occupied_on(&appointments, date, None).collect();
        intervals.sort_by_key(|interval| interval.start);
        Ok(intervals)
    }

    async fn insert_if_free(&self, new: NewAppointment) -> Result<Appointment, StoreError> {
        let mut appointments = self.appointments.write().await;

        let candidate = new.interval();
        let booked: Vec<TimeInterval> = Self::occupied_on(&appointments, new.appointment_date, None).collect();
        if new.status.occupies_slot() && !conflict::is_available(&candidate, &booked) {
            warn!("Rejected insert on {} at {}: overlaps existing booking", new.appointment_date, candidate);
            return Err(StoreError::Overlap);
        }

        let appointment = Appointment {
            id: Uuid::new_v4(),
            service_id: new.service_id,
            patient_name: new.patient_name,
            patient_email: new.patient_email,
            patient_phone: new.patient_phone,
            appointment_date: new.appointment_date,
            start_time: new.start_time,
            end_time: new.end_time,
            status: new.status,
            notes: None,
            created_at: Some(Utc::now()),
        };
        appointments.insert(appointment.id, appointment.clone());
        debug!("Stored appointment {} on {} at {}", appointment.id, appointment.appointment_date, candidate);

        Ok(appointment)
    }

    async fn get_appointment(&self, appointment_id: Uuid) -> Result<Option<Appointment>, StoreError> {
        Ok(self.appointments.read().await.get(&appointment_id).cloned())
    }

    async fn update_status(
        &self,
        appointment_id: Uuid,
        expected: AppointmentStatus,
        status: AppointmentStatus,
        notes: Option<String>,
    ) -> Result<Appointment, StoreError> {
        let mut appointments = self.appointments.write().await;

        let current = appointments.get(&appointment_id).ok_or(StoreError::NotFound)?;
        if current.status != expected {
            warn!("Rejected update of appointment {}: status is {}, expected {}",
                  appointment_id, current.status, expected);
            return Err(StoreError::Stale);
        }
        if status.occupies_slot() && !current.occupies_slot() {
            let booked: Vec<TimeInterval> =
                Self::occupied_on(&appointments, current.appointment_date, Some(appointment_id)).collect();
            if !conflict::is_available(&current.interval(), &booked) {
                warn!("Rejected re-opening appointment {}: interval taken", appointment_id);
                return Err(StoreError::Overlap);
            }
        }

        let appointment = appointments.get_mut(&appointment_id).ok_or(StoreError::NotFound)?;
        appointment.status = status;
        if notes.is_some() {
            appointment.notes = notes;
        }
        Ok(appointment.clone())
    }

    async fn list_appointments(&self, query: &AppointmentQuery) -> Result<Vec<Appointment>, StoreError> {
        let mut matching: Vec<Appointment> = self.appointments.read().await.values()
            .filter(|apt| query.matches(apt))
            .cloned()
            .collect();
        matching.sort_by(|a, b| {
            (a.appointment_date, a.start_time).cmp(&(b.appointment_date, b.start_time))
        });
        Ok(matching)
    }
}
