// libs/appointment-cell/src/services/lifecycle.rs
use tracing::{debug, info, warn};
use uuid::Uuid;

use shared_config::TransitionPolicySetting;

use crate::models::{Appointment, AppointmentError, AppointmentStatus};
use crate::services::notifier::{ChangeKind, ScheduleChange, ScheduleNotifier};
use crate::services::store::BoundedStore;
use crate::services::validation::validate_notes;

/// Which status changes staff may make.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum TransitionPolicy {
    /// Any status may follow any other.
    #[default]
    Permissive,
    /// pending -> {approved, rescheduled, cancelled}, approved -> {rescheduled, cancelled},
    /// rescheduled -> {approved, cancelled}, cancelled -> {pending}.
    Strict,
}

impl From<TransitionPolicySetting> for TransitionPolicy {
    fn from(setting: TransitionPolicySetting) -> Self {
        match setting {
            TransitionPolicySetting::Permissive => TransitionPolicy::Permissive,
            TransitionPolicySetting::Strict => TransitionPolicy::Strict,
        }
    }
}

pub struct AppointmentLifecycleService {
    store: BoundedStore,
    notifier: ScheduleNotifier,
    policy: TransitionPolicy,
}

impl AppointmentLifecycleService {
    pub fn new(store: BoundedStore, notifier: ScheduleNotifier, policy: TransitionPolicy) -> Self {
        Self { store, notifier, policy }
    }

    pub fn policy(&self) -> TransitionPolicy {
        self.policy
    }

    /// Validate that a status transition is allowed
    pub fn validate_status_transition(
        &self,
        current_status: AppointmentStatus,
        new_status: AppointmentStatus,
    ) -> Result<(), AppointmentError> {
        debug!("Validating status transition from {} to {}", current_status, new_status);

        // Same status is a notes-only update.
        if current_status == new_status {
            return Ok(());
        }

        if !self.get_valid_transitions(current_status).contains(&new_status) {
            warn!("Invalid status transition attempted: {} -> {}", current_status, new_status);
            return Err(AppointmentError::InvalidStatusTransition {
                from: current_status,
                to: new_status,
            });
        }

        Ok(())
    }

    /// Get all valid next statuses for a given current status
    pub fn get_valid_transitions(&self, current_status: AppointmentStatus) -> Vec<AppointmentStatus> {
        match self.policy {
            TransitionPolicy::Permissive => AppointmentStatus::ALL.into_iter()
                .filter(|status| *status != current_status)
                .collect(),
            TransitionPolicy::Strict => match current_status {
                AppointmentStatus::Pending => vec![
                    AppointmentStatus::Approved,
                    AppointmentStatus::Rescheduled,
                    AppointmentStatus::Cancelled,
                ],
                AppointmentStatus::Approved => vec![
                    AppointmentStatus::Rescheduled,
                    AppointmentStatus::Cancelled,
                ],
                AppointmentStatus::Rescheduled => vec![
                    AppointmentStatus::Approved,
                    AppointmentStatus::Cancelled,
                ],
                AppointmentStatus::Cancelled => vec![
                    AppointmentStatus::Pending,
                ],
            },
        }
    }

    /// Moves an appointment to `new_status`. Cancelling frees its interval;
    /// leaving `cancelled` re-occupies it and fails with `SlotAlreadyBooked`
    /// if another appointment took the interval meanwhile.
    pub async fn set_status(
        &self,
        appointment_id: Uuid,
        new_status: AppointmentStatus,
        notes: Option<String>,
    ) -> Result<Appointment, AppointmentError> {
        debug!("Setting appointment {} to {}", appointment_id, new_status);

        let notes = validate_notes(notes)?;

        let current = self.store.get_appointment(appointment_id).await?
            .ok_or(AppointmentError::NotFound)?;

        self.validate_status_transition(current.status, new_status)?;

        // Conditional on the status just validated against.
        let updated = match self.store.update_status(appointment_id, current.status, new_status, notes).await {
            Ok(appointment) => appointment,
            Err(AppointmentError::SlotAlreadyBooked) => {
                warn!("Cannot restore appointment {}: {} on {} is taken",
                      appointment_id, current.interval(), current.appointment_date);
                return Err(AppointmentError::SlotAlreadyBooked);
            }
            Err(AppointmentError::ConcurrentUpdate) => {
                warn!("Appointment {} left {} before it could move to {}",
                      appointment_id, current.status, new_status);
                return Err(AppointmentError::ConcurrentUpdate);
            }
            Err(e) => return Err(e),
        };

        if current.status != updated.status {
            self.notifier.publish(ScheduleChange::for_appointment(ChangeKind::StatusChanged, &updated));
        }

        info!("Appointment {} status {} -> {}", appointment_id, current.status, updated.status);
        Ok(updated)
    }
}
