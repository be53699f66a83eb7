pub mod availability;
pub mod booking;
pub mod calendar;
pub mod conflict;
pub mod lifecycle;
pub mod notifier;
pub mod slots;
pub mod store;
pub mod supabase_store;
pub mod validation;

pub use availability::AvailabilityService;
pub use booking::AppointmentBookingService;
pub use calendar::ClinicCalendar;
pub use lifecycle::{AppointmentLifecycleService, TransitionPolicy};
pub use notifier::{ScheduleChange, ScheduleNotifier};
pub use store::{AppointmentStore, BoundedStore, InMemoryAppointmentStore, StoreError};
pub use supabase_store::SupabaseAppointmentStore;
