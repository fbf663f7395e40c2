//! Unit selection, rounding and template rendering
//!
//! Templates may contain `{temperature}`, `{humidity}` and icon
//! placeholders of the form `{icon-<style>-<name>}` or `{icon-<name>}`.
//! All placeholders are substituted in one left-to-right pass, so text
//! produced by a substitution is never scanned again.

use dht_sens_types::{SensorReading, WidgetConfig};
use once_cell::sync::Lazy;
use regex::{Captures, Regex};

static PLACEHOLDER: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"\{(?:(temperature|humidity)|icon-(?:(regular|solid|brand)-)?([A-Za-z0-9_-]+))\}")
        .expect("Invalid regex")
});

/// Round half away from zero to `precision` decimal places.
///
/// The shift is applied to the decimal representation instead of
/// multiplying, so values like `1.005` round the way they are written.
/// A negative precision rounds left of the decimal point.
pub fn round_number(number: f64, precision: i32) -> f64 {
    if !number.is_finite() {
        return number;
    }
    let shifted: f64 = format!("{}e{}", number, precision)
        .parse()
        .unwrap_or(number * 10f64.powi(precision));
    let rounded = shifted.round();
    format!("{}e{}", rounded, -precision)
        .parse()
        .unwrap_or(rounded / 10f64.powi(precision))
}

/// Round and print with a fixed number of decimals and a custom separator
pub fn format_decimal(value: f64, decimals: usize, decimal_symbol: &str) -> String {
    let rounded = round_number(value, decimals as i32);
    // Avoid printing "-0.0" for values that round to zero
    let rounded = if rounded == 0.0 { 0.0 } else { rounded };
    format!("{:.*}", decimals, rounded).replace('.', decimal_symbol)
}

/// Markup for an icon placeholder
pub fn icon_markup(style: Option<&str>, name: &str) -> String {
    let class = match style {
        Some("regular") => "far",
        Some("solid") => "fas",
        Some("brand") => "fab",
        _ => "fa",
    };
    format!("<span class=\"{} fa-{}\"></span>", class, name)
}

/// Formatted values ready for template substitution
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FormattedValues {
    pub temperature: String,
    pub humidity: String,
}

impl FormattedValues {
    /// Convert and format a reading according to the configuration
    pub fn new(reading: &SensorReading, config: &WidgetConfig) -> Self {
        Self {
            temperature: format_decimal(
                reading.temperature(config.temperature_unit()),
                config.temperature_decimals(),
                &config.decimal_symbol,
            ),
            humidity: format_decimal(
                reading.humidity,
                config.humidity_decimals(),
                &config.decimal_symbol,
            ),
        }
    }
}

/// Substitute every placeholder in `template` in a single pass
pub fn substitute_placeholders(template: &str, values: &FormattedValues) -> String {
    PLACEHOLDER
        .replace_all(template, |caps: &Captures| {
            match caps.get(1).map(|m| m.as_str()) {
                Some("temperature") => values.temperature.clone(),
                Some(_) => values.humidity.clone(),
                None => icon_markup(caps.get(2).map(|m| m.as_str()), &caps[3]),
            }
        })
        .into_owned()
}

/// Render the visible lines for a reading.
///
/// In icon view a single compact line is produced; otherwise one line per
/// enabled value, each from its configured template.
pub fn render(reading: &SensorReading, config: &WidgetConfig) -> Vec<String> {
    let values = FormattedValues::new(reading, config);

    if config.icon_view {
        let mut parts = Vec::new();
        if config.show_temperature {
            parts.push(format!(
                "{} {}{}",
                icon_markup(None, "thermometer-half"),
                values.temperature,
                config.temperature_unit().symbol()
            ));
        }
        if config.show_humidity {
            parts.push(format!("{} {}%", icon_markup(None, "tint"), values.humidity));
        }
        if parts.is_empty() {
            return Vec::new();
        }
        return vec![parts.join(" ")];
    }

    let mut lines = Vec::new();
    if config.show_temperature {
        lines.push(substitute_placeholders(&config.temperature_text, &values));
    }
    if config.show_humidity {
        lines.push(substitute_placeholders(&config.humidity_text, &values));
    }
    lines
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::validator::ConfigValidator;
    use dht_sens_types::UnitSystem;
    use std::collections::HashMap;

    fn config() -> WidgetConfig {
        ConfigValidator::default().validate(&HashMap::new())
    }

    #[test]
    fn test_round_half_away_from_zero() {
        assert_eq!(round_number(2.25, 1), 2.3);
        assert_eq!(round_number(-2.25, 1), -2.3);
        assert_eq!(round_number(2.449, 1), 2.4);
        assert_eq!(round_number(2.5, 0), 3.0);
        assert_eq!(round_number(-2.5, 0), -3.0);
    }

    #[test]
    fn test_round_uses_decimal_representation() {
        // 1.005 * 100 is 100.49999999999999 in binary floating point
        assert_eq!(round_number(1.005, 2), 1.01);
        assert_eq!(round_number(1234.5, -2), 1200.0);
    }

    #[test]
    fn test_format_decimal() {
        assert_eq!(format_decimal(21.04, 1, "."), "21.0");
        assert_eq!(format_decimal(21.05, 1, ","), "21,1");
        assert_eq!(format_decimal(21.5, 0, ","), "22");
        assert_eq!(format_decimal(-0.04, 1, "."), "0.0");
    }

    #[test]
    fn test_substitution_is_exhaustive() {
        let values = FormattedValues {
            temperature: "20.0".to_string(),
            humidity: "45.0".to_string(),
        };
        let out = substitute_placeholders(
            "{temperature} / {temperature} {icon-solid-tint}",
            &values,
        );
        assert_eq!(out, "20.0 / 20.0 <span class=\"fas fa-tint\"></span>");
        assert!(!out.contains('{'));
    }

    #[test]
    fn test_icon_styles() {
        let values = FormattedValues {
            temperature: String::new(),
            humidity: String::new(),
        };
        assert_eq!(
            substitute_placeholders("{icon-regular-snowflake}{icon-brand-raspberry-pi}{icon-tint}", &values),
            "<span class=\"far fa-snowflake\"></span>\
             <span class=\"fab fa-raspberry-pi\"></span>\
             <span class=\"fa fa-tint\"></span>"
        );
    }

    #[test]
    fn test_substituted_text_is_not_rescanned() {
        let values = FormattedValues {
            temperature: "{humidity}".to_string(),
            humidity: "45".to_string(),
        };
        assert_eq!(
            substitute_placeholders("{temperature} {humidity} {unknown}", &values),
            "{humidity} 45 {unknown}"
        );
    }

    #[test]
    fn test_render_text_view() {
        let mut config = config();
        config.icon_view = false;
        config.show_temperature = true;
        config.show_humidity = true;
        config.units = UnitSystem::Imperial;
        config.temperature_text = "{icon-thermometer-half} {temperature}&deg;F".to_string();

        let reading = SensorReading::from_celsius(20.0, 45.25);
        let lines = render(&reading, &config);
        assert_eq!(
            lines,
            vec![
                "<span class=\"fa fa-thermometer-half\"></span> 68.0&deg;F".to_string(),
                "45.3% humidity".to_string(),
            ]
        );
    }

    #[test]
    fn test_render_icon_view() {
        let mut config = config();
        config.show_temperature = true;
        config.show_humidity = true;
        config.round_humidity = true;
        config.units = UnitSystem::Kelvin;

        let reading = SensorReading::from_celsius(20.0, 45.5);
        assert_eq!(
            render(&reading, &config),
            vec![
                "<span class=\"fa fa-thermometer-half\"></span> 293.2 K \
                 <span class=\"fa fa-tint\"></span> 46%"
                    .to_string()
            ]
        );
    }

    #[test]
    fn test_render_nothing_visible() {
        let reading = SensorReading::from_celsius(20.0, 45.0);
        assert!(render(&reading, &config()).is_empty());
    }
}
