//! dht-sens: DHT11/DHT22 temperature and humidity acquisition
//!
//! This library wires the acquisition server to any number of widget
//! instances:
//! - Poll scheduling with suspend/resume and stale-data catch-up
//! - Correlated requests with a bounded retry loop
//! - Display output and notification fan-out
//! - Configuration management

pub mod config;
pub mod core;

// Re-export commonly used types
pub use config::{AppConfig, InstanceConfig};
pub use core::{DisplayUpdate, NotificationHub, WidgetInstance};
