//! Sensor reading snapshot.

use crate::units::TemperatureUnit;
use serde::{Deserialize, Serialize};

/// Offset between the Celsius and Kelvin scales
pub const KELVIN_OFFSET: f64 = 273.15;

/// Convert Celsius to Fahrenheit
pub fn celsius_to_fahrenheit(celsius: f64) -> f64 {
    celsius * 9.0 / 5.0 + 32.0
}

/// Convert Celsius to Kelvin
pub fn celsius_to_kelvin(celsius: f64) -> f64 {
    celsius + KELVIN_OFFSET
}

/// One successful acquisition.
///
/// Replaced wholesale on every successful poll, never patched field by field.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct SensorReading {
    pub celsius: f64,
    pub fahrenheit: f64,
    pub kelvin: f64,
    /// Relative humidity in percent
    pub humidity: f64,
}

impl SensorReading {
    /// Build a reading from Celsius, deriving the other scales
    pub fn from_celsius(celsius: f64, humidity: f64) -> Self {
        Self {
            celsius,
            fahrenheit: celsius_to_fahrenheit(celsius),
            kelvin: celsius_to_kelvin(celsius),
            humidity,
        }
    }

    /// Temperature in the requested unit
    pub fn temperature(&self, unit: TemperatureUnit) -> f64 {
        match unit {
            TemperatureUnit::Celsius => self.celsius,
            TemperatureUnit::Fahrenheit => self.fahrenheit,
            TemperatureUnit::Kelvin => self.kelvin,
        }
    }

    /// All values are finite numbers
    pub fn is_finite(&self) -> bool {
        self.celsius.is_finite()
            && self.fahrenheit.is_finite()
            && self.kelvin.is_finite()
            && self.humidity.is_finite()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_reference_conversion() {
        let reading = SensorReading::from_celsius(20.0, 45.0);
        assert!((reading.temperature(TemperatureUnit::Celsius) - 20.0).abs() < 1e-9);
        assert!((reading.temperature(TemperatureUnit::Fahrenheit) - 68.0).abs() < 1e-9);
        assert!((reading.temperature(TemperatureUnit::Kelvin) - 293.15).abs() < 1e-9);
    }

    #[test]
    fn test_freezing_and_boiling_points() {
        assert!((celsius_to_fahrenheit(0.0) - 32.0).abs() < 1e-9);
        assert!((celsius_to_fahrenheit(100.0) - 212.0).abs() < 1e-9);
        assert!((celsius_to_fahrenheit(-40.0) + 40.0).abs() < 1e-9);
        assert!(celsius_to_kelvin(-273.15).abs() < 1e-9);
    }

    #[test]
    fn test_non_finite_reading() {
        let reading = SensorReading::from_celsius(f64::NAN, 40.0);
        assert!(!reading.is_finite());
        assert!(SensorReading::from_celsius(21.5, 40.0).is_finite());
    }
}
