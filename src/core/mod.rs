//! Acquisition scheduling, client state and the per-instance event loop

mod client;
mod display;
mod instance;
mod notifier;
mod scheduler;

pub use client::{AcquisitionClient, ClientPhase, PollOutcome};
pub use display::{DisplayContent, DisplayUpdate};
pub use instance::{InstanceCommand, InstanceHandle, InstanceStatus, WidgetInstance};
pub use notifier::{
    reading_notifications, Notification, NotificationHub, NotificationKind, PeerLatch,
};
pub use scheduler::{PollScheduler, ScheduleState};
