//! Normalization of raw widget settings
//!
//! Every field is checked on its own: an invalid value is replaced by the
//! field's default and never affects any other field. Keys are accepted in
//! snake_case (`sensor_pin`) or in the camelCase form used by older layouts
//! (`sensorPin`).

use crate::constants::{
    DEFAULT_INITIAL_LOAD_DELAY_SECS, DEFAULT_RETRY_DELAY_SECS, DEFAULT_SCRIPT_NAME,
    DEFAULT_UPDATE_INTERVAL_MINUTES, MIN_RETRY_DELAY_SECS, MIN_UPDATE_INTERVAL_MINUTES,
};
use crate::error::ConfigError;
use dht_sens_types::{FontSize, PinScheme, TemperatureUnit, UnitSystem, WidgetConfig, MAX_ATTEMPTS};
use serde::de::DeserializeOwned;
use serde_json::Value;
use std::collections::HashMap;
use std::path::PathBuf;
use std::time::Duration;

/// Defaults that depend on the host environment
#[derive(Debug, Clone, PartialEq)]
pub struct ValidatorDefaults {
    pub script_path: PathBuf,
    pub decimal_symbol: String,
    pub units: UnitSystem,
}

impl Default for ValidatorDefaults {
    fn default() -> Self {
        Self {
            script_path: PathBuf::from(DEFAULT_SCRIPT_NAME),
            decimal_symbol: ".".to_string(),
            units: UnitSystem::Metric,
        }
    }
}

/// Default temperature template for a unit
pub fn default_temperature_text(unit: TemperatureUnit) -> String {
    format!("{{temperature}}{}", unit.symbol())
}

/// Default humidity template
pub fn default_humidity_text() -> String {
    "{humidity}% humidity".to_string()
}

/// Validates raw settings into a [`WidgetConfig`]
#[derive(Debug, Clone, Default)]
pub struct ConfigValidator {
    defaults: ValidatorDefaults,
}

impl ConfigValidator {
    pub fn new(defaults: ValidatorDefaults) -> Self {
        Self { defaults }
    }

    /// Validate raw settings, logging every substituted field at debug level
    pub fn validate(&self, raw: &HashMap<String, Value>) -> WidgetConfig {
        let (config, errors) = self.validate_with_errors(raw);
        for error in errors {
            log::debug!("{}", error);
        }
        config
    }

    /// Validate raw settings, returning the rejected fields alongside
    pub fn validate_with_errors(&self, raw: &HashMap<String, Value>) -> (WidgetConfig, Vec<ConfigError>) {
        let mut fields = RawFields {
            raw,
            errors: Vec::new(),
        };

        let units = fields.enumeration("units", self.defaults.units);
        let temperature_unit = units.temperature_unit();

        let config = WidgetConfig {
            sensor_pin: fields.pin("sensor_pin"),
            pin_scheme: fields.enumeration("pin_scheme", PinScheme::default()),
            units,
            use_sudo: fields.boolean("use_sudo", false),
            script_path: fields
                .non_empty_string("script_path")
                .map(PathBuf::from)
                .unwrap_or_else(|| self.defaults.script_path.clone()),
            update_interval: fields.duration(
                "update_interval",
                60.0,
                MIN_UPDATE_INTERVAL_MINUTES,
                DEFAULT_UPDATE_INTERVAL_MINUTES,
            ),
            retry_delay: fields.duration(
                "retry_delay",
                1.0,
                MIN_RETRY_DELAY_SECS,
                DEFAULT_RETRY_DELAY_SECS,
            ),
            initial_load_delay: fields.duration(
                "initial_load_delay",
                1.0,
                0.0,
                DEFAULT_INITIAL_LOAD_DELAY_SECS,
            ),
            max_attempts: MAX_ATTEMPTS,
            send_temperature: fields.boolean("send_temperature", true),
            send_humidity: fields.boolean("send_humidity", true),
            show_temperature: fields.boolean("show_temperature", false),
            show_humidity: fields.boolean("show_humidity", false),
            icon_view: fields.boolean("icon_view", true),
            temperature_text: fields
                .non_empty_string("temperature_text")
                .unwrap_or_else(|| default_temperature_text(temperature_unit)),
            humidity_text: fields
                .non_empty_string("humidity_text")
                .unwrap_or_else(default_humidity_text),
            font_size: fields.enumeration("font_size", FontSize::default()),
            decimal_symbol: fields
                .string("decimal_symbol")
                .unwrap_or_else(|| self.defaults.decimal_symbol.clone()),
            round_temperature: fields.boolean("round_temperature", false),
            round_humidity: fields.boolean("round_humidity", false),
        };

        (config, fields.errors)
    }
}

/// Convert a snake_case key to its camelCase alias
fn camel_case(key: &str) -> String {
    let mut out = String::with_capacity(key.len());
    let mut upper = false;
    for c in key.chars() {
        if c == '_' {
            upper = true;
        } else if upper {
            out.extend(c.to_uppercase());
            upper = false;
        } else {
            out.push(c);
        }
    }
    out
}

/// Field accessors that record rejected values
struct RawFields<'a> {
    raw: &'a HashMap<String, Value>,
    errors: Vec<ConfigError>,
}

impl<'a> RawFields<'a> {
    /// Look up a field; `null` counts as absent
    fn get(&self, key: &str) -> Option<&'a Value> {
        self.raw
            .get(key)
            .or_else(|| self.raw.get(&camel_case(key)))
            .filter(|value| !value.is_null())
    }

    fn reject(&mut self, field: &'static str, reason: impl Into<String>) {
        self.errors.push(ConfigError::new(field, reason));
    }

    fn boolean(&mut self, field: &'static str, default: bool) -> bool {
        match self.get(field) {
            None => default,
            Some(Value::Bool(value)) => *value,
            Some(other) => {
                self.reject(field, format!("expected a boolean, got {}", other));
                default
            }
        }
    }

    fn string(&mut self, field: &'static str) -> Option<String> {
        match self.get(field)? {
            Value::String(value) => Some(value.clone()),
            other => {
                self.reject(field, format!("expected a string, got {}", other));
                None
            }
        }
    }

    fn non_empty_string(&mut self, field: &'static str) -> Option<String> {
        let value = self.string(field)?;
        if value.is_empty() {
            self.reject(field, "empty string");
            None
        } else {
            Some(value)
        }
    }

    fn enumeration<T: DeserializeOwned>(&mut self, field: &'static str, default: T) -> T {
        let Some(value) = self.get(field) else {
            return default;
        };
        match serde_json::from_value(value.clone()) {
            Ok(parsed) => parsed,
            Err(e) => {
                self.reject(field, e.to_string());
                default
            }
        }
    }

    /// A finite number no smaller than `minimum`
    fn number(&mut self, field: &'static str, minimum: f64) -> Option<f64> {
        let value = self.get(field)?;
        match value.as_f64() {
            Some(n) if n.is_finite() && n >= minimum => Some(n),
            Some(n) => {
                self.reject(field, format!("{} is below the minimum of {}", n, minimum));
                None
            }
            None => {
                self.reject(field, format!("expected a number, got {}", value));
                None
            }
        }
    }

    /// A time value given in raw units of `unit_secs` seconds each
    fn duration(&mut self, field: &'static str, unit_secs: f64, minimum: f64, default: f64) -> Duration {
        let fallback = Duration::from_secs_f64(default * unit_secs);
        let Some(raw) = self.number(field, minimum) else {
            return fallback;
        };
        match Duration::try_from_secs_f64(raw * unit_secs) {
            Ok(duration) => duration,
            Err(e) => {
                self.reject(field, e.to_string());
                fallback
            }
        }
    }

    fn pin(&mut self, field: &'static str) -> Option<u32> {
        let value = self.get(field)?;
        let pin = value
            .as_f64()
            .filter(|n| n.is_finite() && n.fract() == 0.0 && *n >= 0.0 && *n <= f64::from(u32::MAX))
            .map(|n| n as u32);
        if pin.is_none() {
            self.reject(field, format!("expected a pin number, got {}", value));
        }
        pin
    }
}
