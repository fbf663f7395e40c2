//! Notification fan-out between widget instances and peer components
//!
//! All components share one broadcast channel. Instances publish their
//! readings on it and listen for the peer-ready notification.

use dht_sens_core::{SensorReading, WidgetConfig};
use serde::{Deserialize, Serialize};
use tokio::sync::broadcast;

/// Default channel capacity for the hub
pub const DEFAULT_CHANNEL_CAPACITY: usize = 256;

/// Notification payloads, tagged with the names peers listen for
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "notification", content = "payload", rename_all = "SCREAMING_SNAKE_CASE")]
pub enum NotificationKind {
    /// Temperature in the sender's configured unit
    IndoorTemperature(f64),
    /// Relative humidity in percent
    IndoorHumidity(f64),
    /// A weather component announced its own data; used as "peer ready"
    #[serde(rename = "CURRENTWEATHER_DATA")]
    CurrentWeatherData,
}

/// A notification together with the name of the component that sent it
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Notification {
    pub sender: String,
    #[serde(flatten)]
    pub kind: NotificationKind,
}

impl Notification {
    pub fn new(sender: impl Into<String>, kind: NotificationKind) -> Self {
        Self {
            sender: sender.into(),
            kind,
        }
    }
}

/// Notifications announcing a reading, filtered by the send flags
pub fn reading_notifications(
    sender: &str,
    reading: &SensorReading,
    config: &WidgetConfig,
) -> Vec<Notification> {
    let mut notifications = Vec::with_capacity(2);
    if config.send_temperature {
        notifications.push(Notification::new(
            sender,
            NotificationKind::IndoorTemperature(reading.temperature(config.temperature_unit())),
        ));
    }
    if config.send_humidity {
        notifications.push(Notification::new(
            sender,
            NotificationKind::IndoorHumidity(reading.humidity),
        ));
    }
    notifications
}

/// Broadcast hub shared by every component
#[derive(Clone)]
pub struct NotificationHub {
    tx: broadcast::Sender<Notification>,
}

impl NotificationHub {
    pub fn new() -> Self {
        Self::with_capacity(DEFAULT_CHANNEL_CAPACITY)
    }

    pub fn with_capacity(capacity: usize) -> Self {
        let (tx, _) = broadcast::channel(capacity);
        Self { tx }
    }

    pub fn subscriber_count(&self) -> usize {
        self.tx.receiver_count()
    }

    /// Publish to all subscribers.
    ///
    /// Returns `true` if there was at least one subscriber; otherwise the
    /// notification is discarded.
    pub fn publish(&self, notification: Notification) -> bool {
        self.tx.send(notification).is_ok()
    }

    /// Subscribe to all notifications published from now on
    pub fn subscribe(&self) -> broadcast::Receiver<Notification> {
        self.tx.subscribe()
    }
}

impl Default for NotificationHub {
    fn default() -> Self {
        Self::new()
    }
}

/// One-shot latch for the peer-ready re-broadcast
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq)]
pub struct PeerLatch {
    consumed: bool,
}

impl PeerLatch {
    /// Returns `true` the first time only
    pub fn take(&mut self) -> bool {
        !std::mem::replace(&mut self.consumed, true)
    }
}
