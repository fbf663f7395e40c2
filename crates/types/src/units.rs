//! Unit system and presentation enums.

use serde::{Deserialize, Serialize};

/// Unit system selected for the widget
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Default)]
pub enum UnitSystem {
    #[serde(rename = "metric")]
    #[default]
    Metric,
    #[serde(rename = "imperial")]
    Imperial,
    /// Absolute temperature; "default" is the historical name
    #[serde(rename = "default", alias = "kelvin")]
    Kelvin,
}

impl UnitSystem {
    /// Temperature unit shown for this unit system
    pub fn temperature_unit(&self) -> TemperatureUnit {
        match self {
            UnitSystem::Metric => TemperatureUnit::Celsius,
            UnitSystem::Imperial => TemperatureUnit::Fahrenheit,
            UnitSystem::Kelvin => TemperatureUnit::Kelvin,
        }
    }
}

/// Temperature unit for display (with lowercase serde names)
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Default)]
pub enum TemperatureUnit {
    #[serde(rename = "celsius")]
    #[default]
    Celsius,
    #[serde(rename = "fahrenheit")]
    Fahrenheit,
    #[serde(rename = "kelvin")]
    Kelvin,
}

impl TemperatureUnit {
    /// Unit suffix as HTML, appended directly after the value
    pub fn symbol(&self) -> &'static str {
        match self {
            TemperatureUnit::Celsius => "&deg;C",
            TemperatureUnit::Fahrenheit => "&deg;F",
            TemperatureUnit::Kelvin => " K",
        }
    }
}

/// Font size class applied to the widget wrapper
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Default)]
pub enum FontSize {
    #[serde(rename = "x-small")]
    XSmall,
    #[serde(rename = "small")]
    Small,
    #[serde(rename = "medium")]
    #[default]
    Medium,
    #[serde(rename = "large")]
    Large,
    #[serde(rename = "x-large")]
    XLarge,
}

impl FontSize {
    pub fn css_class(&self) -> &'static str {
        match self {
            FontSize::XSmall => "x-small",
            FontSize::Small => "small",
            FontSize::Medium => "medium",
            FontSize::Large => "large",
            FontSize::XLarge => "x-large",
        }
    }
}
