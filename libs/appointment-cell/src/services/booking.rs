// libs/appointment-cell/src/services/booking.rs
use chrono::{NaiveDate, NaiveDateTime, NaiveTime};
use tracing::{debug, info, warn};

use crate::models::{
    Appointment, AppointmentError, AppointmentStatus, BookAppointmentRequest, NewAppointment,
    PatientInfo, Service, TimeInterval,
};
use crate::services::availability::bookable_service;
use crate::services::calendar::ClinicCalendar;
use crate::services::notifier::{ChangeKind, ScheduleChange, ScheduleNotifier};
use crate::services::slots::generate_candidates;
use crate::services::store::BoundedStore;
use crate::services::validation::PatientValidator;

/// Accepts booking requests and commits them against live state.
///
/// There is no read-then-insert here: the overlap check is part of the store's
/// `insert_if_free`, so two racing requests for intersecting intervals resolve
/// to exactly one `pending` appointment and one `SlotAlreadyBooked`.
pub struct AppointmentBookingService {
    store: BoundedStore,
    calendar: ClinicCalendar,
    notifier: ScheduleNotifier,
    validator: PatientValidator,
}

impl AppointmentBookingService {
    pub fn new(store: BoundedStore, calendar: ClinicCalendar, notifier: ScheduleNotifier) -> Self {
        Self {
            store,
            calendar,
            notifier,
            validator: PatientValidator::new(),
        }
    }

    pub async fn book_appointment(
        &self,
        request: BookAppointmentRequest,
    ) -> Result<Appointment, AppointmentError> {
        self.book_appointment_at(request, self.calendar.now()).await
    }

    /// Books as if the clinic clock read `now`.
    pub async fn book_appointment_at(
        &self,
        request: BookAppointmentRequest,
        now: NaiveDateTime,
    ) -> Result<Appointment, AppointmentError> {
        info!("Booking service {} on {} at {}",
              request.service_id, request.appointment_date, request.start_time.format("%H:%M"));

        // **Step 1: Validate patient details**
        let patient = self.validator.validate(&request.patient())?;

        // **Step 2: Resolve the service**
        let service = bookable_service(&self.store, request.service_id).await?;

        // **Step 3: Validate date and slot against clinic hours**
        let interval = self.validate_slot(&service, request.appointment_date, request.start_time, now)?;

        // **Step 4: Atomic commit**
        let new_appointment = NewAppointment {
            service_id: service.id,
            patient_name: patient.name,
            patient_email: patient.email,
            patient_phone: patient.phone,
            appointment_date: request.appointment_date,
            start_time: interval.start,
            end_time: interval.end,
            status: AppointmentStatus::Pending,
        };

        let appointment = match self.store.insert_if_free(new_appointment).await {
            Ok(appointment) => appointment,
            Err(AppointmentError::SlotAlreadyBooked) => {
                warn!("Slot {} on {} was taken before commit", interval, request.appointment_date);
                return Err(AppointmentError::SlotAlreadyBooked);
            }
            Err(e) => return Err(e),
        };

        // **Step 5: Notify observers**
        self.notifier.publish(ScheduleChange::for_appointment(ChangeKind::Booked, &appointment));

        info!("Appointment {} booked for {} on {}", appointment.id, interval, appointment.appointment_date);
        Ok(appointment)
    }

    /// Checks that `start_time` is a generated candidate for `service` on
    /// `date` and returns the interval it would occupy.
    pub fn validate_slot(
        &self,
        service: &Service,
        date: NaiveDate,
        start_time: NaiveTime,
        now: NaiveDateTime,
    ) -> Result<TimeInterval, AppointmentError> {
        if date < now.date() {
            return Err(AppointmentError::ValidationError(format!(
                "Appointment date {} is in the past", date
            )));
        }
        if self.calendar.is_closed_on(date) {
            return Err(AppointmentError::ValidationError(format!(
                "The clinic is closed on {}", date.format("%A")
            )));
        }
        if date == now.date() && start_time <= now.time() {
            return Err(AppointmentError::ValidationError(format!(
                "Start time {} has already passed", start_time.format("%H:%M")
            )));
        }

        let on_grid = generate_candidates(
            service.duration_minutes,
            self.calendar.opening_time,
            self.calendar.closing_time,
            self.calendar.step_minutes,
        )
        .any(|candidate| candidate == start_time);

        if !on_grid {
            debug!("{} is not a candidate start for a {} minute service",
                   start_time, service.duration_minutes);
            return Err(AppointmentError::ValidationError(format!(
                "{} is not an available start time for {}", start_time.format("%H:%M"), service.name
            )));
        }

        TimeInterval::starting_at(start_time, service.duration_minutes).ok_or_else(|| {
            AppointmentError::ValidationError("Appointment would run past midnight".to_string())
        })
    }

    pub fn validate_patient(&self, patient: &PatientInfo) -> Result<PatientInfo, AppointmentError> {
        self.validator.validate(patient)
    }
}
