// libs/appointment-cell/src/state.rs
use std::sync::Arc;
use std::time::Duration;

use tracing::info;

use shared_config::{AppConfig, StorageBackend};

use crate::models::AppointmentError;
use crate::services::{
    AppointmentBookingService, AppointmentLifecycleService, AppointmentStore, AvailabilityService,
    BoundedStore, ClinicCalendar, InMemoryAppointmentStore, ScheduleNotifier,
    SupabaseAppointmentStore, TransitionPolicy,
};

/// Everything the scheduling routes share. Services are stateless apart from
/// the store handle and the notifier.
pub struct SchedulingState {
    pub availability: AvailabilityService,
    pub booking: AppointmentBookingService,
    pub lifecycle: AppointmentLifecycleService,
    pub store: BoundedStore,
    pub notifier: ScheduleNotifier,
}

impl SchedulingState {
    pub fn new(
        store: Arc<dyn AppointmentStore>,
        calendar: ClinicCalendar,
        storage_timeout: Duration,
        policy: TransitionPolicy,
    ) -> Self {
        let store = BoundedStore::new(store, storage_timeout);
        let notifier = ScheduleNotifier::default();

        Self {
            availability: AvailabilityService::new(store.clone(), calendar.clone()),
            booking: AppointmentBookingService::new(store.clone(), calendar, notifier.clone()),
            lifecycle: AppointmentLifecycleService::new(store.clone(), notifier.clone(), policy),
            store,
            notifier,
        }
    }

    pub fn from_config(config: &AppConfig) -> Result<Self, AppointmentError> {
        let calendar = ClinicCalendar::from_config(config)?;

        let store: Arc<dyn AppointmentStore> = match config.storage_backend {
            StorageBackend::Supabase => {
                info!("Using Supabase appointment store at {}", config.supabase_url);
                Arc::new(SupabaseAppointmentStore::new(config))
            }
            StorageBackend::Memory => {
                info!("Using in-memory appointment store");
                Arc::new(InMemoryAppointmentStore::new())
            }
        };

        info!("Clinic open {}-{}, closed on {:?}",
              calendar.opening_time.format("%H:%M"),
              calendar.closing_time.format("%H:%M"),
              calendar.closed_weekdays);

        Ok(Self::new(store, calendar, config.storage_timeout, config.transition_policy.into()))
    }
}
