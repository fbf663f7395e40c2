//! Presentation output of a widget instance

use dht_sens_core::constants::LOADING_TEXT;
use dht_sens_core::{render, InstanceId, SensorReading, WidgetConfig};
use dht_sens_types::FontSize;
use serde::{Deserialize, Serialize};

/// What the widget currently shows
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "state", content = "lines", rename_all = "snake_case")]
pub enum DisplayContent {
    /// Neither temperature nor humidity is enabled
    Hidden,
    /// No reading has been obtained yet
    Loading,
    /// Rendered lines for the cached reading
    Lines(Vec<String>),
}

impl DisplayContent {
    /// Build the content for the current cached reading
    pub fn build(reading: Option<&SensorReading>, config: &WidgetConfig) -> Self {
        if !config.is_visible() {
            return Self::Hidden;
        }
        match reading {
            Some(reading) => Self::Lines(render(reading, config)),
            None => Self::Loading,
        }
    }

    /// Lines as they would be printed
    pub fn lines(&self) -> Vec<String> {
        match self {
            Self::Hidden => Vec::new(),
            Self::Loading => vec![LOADING_TEXT.to_string()],
            Self::Lines(lines) => lines.clone(),
        }
    }
}

/// Display refresh sent by an instance to the presentation layer
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DisplayUpdate {
    pub instance_id: InstanceId,
    pub name: String,
    pub font_size: FontSize,
    pub content: DisplayContent,
}
