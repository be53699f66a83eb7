// libs/appointment-cell/src/services/notifier.rs
use chrono::{DateTime, NaiveDate, Utc};
use serde::Serialize;
use tokio::sync::broadcast;
use tracing::debug;
use uuid::Uuid;

use crate::models::{Appointment, AppointmentStatus};

pub type ScheduleReceiver = broadcast::Receiver<ScheduleChange>;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum ChangeKind {
    Booked,
    StatusChanged,
}

/// Published after every committed booking or status change.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ScheduleChange {
    pub kind: ChangeKind,
    pub date: NaiveDate,
    pub appointment_id: Uuid,
    pub status: AppointmentStatus,
    pub occurred_at: DateTime<Utc>,
}

impl ScheduleChange {
    pub fn for_appointment(kind: ChangeKind, appointment: &Appointment) -> Self {
        Self {
            kind,
            date: appointment.appointment_date,
            appointment_id: appointment.id,
            status: appointment.status,
            occurred_at: Utc::now(),
        }
    }
}

/// In-process observer hook so views can refresh a date without polling.
/// Lagging subscribers lose the oldest changes, never block publishers.
#[derive(Clone)]
pub struct ScheduleNotifier {
    sender: broadcast::Sender<ScheduleChange>,
}

impl ScheduleNotifier {
    pub fn new(capacity: usize) -> Self {
        let (sender, _) = broadcast::channel(capacity.max(1));
        Self { sender }
    }

    pub fn subscribe(&self) -> ScheduleReceiver {
        self.sender.subscribe()
    }

    pub fn publish(&self, change: ScheduleChange) {
        match self.sender.send(change) {
            Ok(receivers) => debug!("Schedule change delivered to {} subscriber(s)", receivers),
            Err(_) => debug!("Schedule change dropped: no subscribers"),
        }
    }

    pub fn subscriber_count(&self) -> usize {
        self.sender.receiver_count()
    }
}

impl Default for ScheduleNotifier {
    fn default() -> Self {
        Self::new(256)
    }
}
