// libs/appointment-cell/src/services/availability.rs
use chrono::{NaiveDate, NaiveDateTime, NaiveTime};
use tracing::{debug, warn};
use uuid::Uuid;

use crate::models::{AppointmentError, Service, Slot, TimeInterval};
use crate::services::calendar::ClinicCalendar;
use crate::services::conflict;
use crate::services::slots::generate_candidates;
use crate::services::store::BoundedStore;

pub struct AvailabilityService {
    store: BoundedStore,
    calendar: ClinicCalendar,
}

impl AvailabilityService {
    pub fn new(store: BoundedStore, calendar: ClinicCalendar) -> Self {
        Self { store, calendar }
    }

    /// Free start times for `service_id` on `date`, ascending.
    pub async fn available_slots(
        &self,
        service_id: Uuid,
        date: NaiveDate,
    ) -> Result<Vec<Slot>, AppointmentError> {
        let service = bookable_service(&self.store, service_id).await?;
        self.available_slots_at(&service, date, self.calendar.now()).await
    }

    /// Same as `available_slots`, evaluated as if the clinic clock read `now`.
    pub async fn available_slots_at(
        &self,
        service: &Service,
        date: NaiveDate,
        now: NaiveDateTime,
    ) -> Result<Vec<Slot>, AppointmentError> {
        debug!("Calculating available slots for service {} on {}", service.id, date);

        if service.duration_minutes <= 0 {
            return Err(AppointmentError::ValidationError(format!(
                "Service {} has a non-positive duration", service.id
            )));
        }

        if date < now.date() {
            debug!("{} is in the past, no slots", date);
            return Ok(vec![]);
        }
        if self.calendar.is_closed_on(date) {
            debug!("Clinic closed on {}, no slots", date);
            return Ok(vec![]);
        }

        let booked = self.store.booked_intervals(date).await?;
        let not_before = (date == now.date()).then(|| now.time());

        Ok(free_slots(&self.calendar, service.duration_minutes, &booked, not_before))
    }
}

/// Candidate slots that clear every booked interval. When `not_before` is set
/// (the requested date is today) starts at or before that time are dropped.
pub fn free_slots(
    calendar: &ClinicCalendar,
    duration_minutes: i32,
    booked: &[TimeInterval],
    not_before: Option<NaiveTime>,
) -> Vec<Slot> {
    generate_candidates(
        duration_minutes,
        calendar.opening_time,
        calendar.closing_time,
        calendar.step_minutes,
    )
    .filter(|start| not_before.map_or(true, |cutoff| *start > cutoff))
    .filter_map(|start| TimeInterval::starting_at(start, duration_minutes))
    .filter(|candidate| conflict::is_available(candidate, booked))
    .map(|candidate| Slot { start_time: candidate.start })
    .collect()
}

/// Looks up a service that scheduling may book: known, active, positive duration.
pub async fn bookable_service(store: &BoundedStore, service_id: Uuid) -> Result<Service, AppointmentError> {
    let service = store.get_service(service_id).await?
        .ok_or_else(|| {
            warn!("Unknown service {}", service_id);
            AppointmentError::ValidationError(format!("Unknown service {}", service_id))
        })?;

    if !service.is_active {
        return Err(AppointmentError::ValidationError(format!(
            "Service '{}' is not currently offered", service.name
        )));
    }
    if service.duration_minutes <= 0 {
        return Err(AppointmentError::ValidationError(format!(
            "Service '{}' has a non-positive duration", service.name
        )));
    }

    Ok(service)
}
