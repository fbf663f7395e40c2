//! Validated widget configuration.

use crate::pin::PinScheme;
use crate::units::{FontSize, TemperatureUnit, UnitSystem};
use serde::{Deserialize, Serialize};
use std::path::PathBuf;
use std::time::Duration;

/// Number of acquisition attempts per poll cycle
pub const MAX_ATTEMPTS: u32 = 3;

/// Configuration of one widget instance after validation.
///
/// Produced by the config validator; every field already holds either a
/// user value that passed its checks or the documented default.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct WidgetConfig {
    /// Pin in the configured scheme, `None` when not configured
    pub sensor_pin: Option<u32>,
    pub pin_scheme: PinScheme,
    pub units: UnitSystem,
    /// Run the reader program through `sudo`
    pub use_sudo: bool,
    pub script_path: PathBuf,
    pub update_interval: Duration,
    pub retry_delay: Duration,
    pub initial_load_delay: Duration,
    pub max_attempts: u32,
    pub send_temperature: bool,
    pub send_humidity: bool,
    pub show_temperature: bool,
    pub show_humidity: bool,
    pub icon_view: bool,
    pub temperature_text: String,
    pub humidity_text: String,
    pub font_size: FontSize,
    pub decimal_symbol: String,
    pub round_temperature: bool,
    pub round_humidity: bool,
}

impl WidgetConfig {
    /// Temperature unit selected by the unit system
    pub fn temperature_unit(&self) -> TemperatureUnit {
        self.units.temperature_unit()
    }

    /// Decimal places used for the temperature value
    pub fn temperature_decimals(&self) -> usize {
        if self.round_temperature {
            0
        } else {
            1
        }
    }

    /// Decimal places used for the humidity value
    pub fn humidity_decimals(&self) -> usize {
        if self.round_humidity {
            0
        } else {
            1
        }
    }

    /// Whether the widget renders anything at all
    pub fn is_visible(&self) -> bool {
        self.show_temperature || self.show_humidity
    }
}
