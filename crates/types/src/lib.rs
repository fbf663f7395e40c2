//! dht-sens-types: Shared data types for the dht-sens widget.
//!
//! This crate contains pure data types (pin table, unit enums, readings,
//! validated configuration) shared across all dht-sens crates. It has no
//! runtime or process dependencies.

pub mod config;
pub mod pin;
pub mod reading;
pub mod units;

// Re-export commonly used types at the crate root for convenience
pub use config::{WidgetConfig, MAX_ATTEMPTS};
pub use pin::{PinScheme, PinTableEntry, PIN_TABLE, PIN_TABLE_LEN};
pub use reading::{celsius_to_fahrenheit, celsius_to_kelvin, SensorReading, KELVIN_OFFSET};
pub use units::{FontSize, TemperatureUnit, UnitSystem};
