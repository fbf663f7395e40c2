//! Application and widget instance configuration

use anyhow::Result;
use dht_sens_core::constants::DEFAULT_SCRIPT_NAME;
use serde::{Deserialize, Serialize};
use serde_json::{json, Value};
use std::collections::HashMap;
use std::path::{Path, PathBuf};

/// Project directories for config and data files
pub fn project_dirs() -> Result<directories::ProjectDirs> {
    directories::ProjectDirs::from("com", "github.dht_sens", "dht-sens")
        .ok_or_else(|| anyhow::anyhow!("Could not determine config directory"))
}

/// Reader program location used when an instance does not name one
pub fn default_script_path() -> PathBuf {
    match project_dirs() {
        Ok(dirs) => dirs.data_dir().join(DEFAULT_SCRIPT_NAME),
        Err(_) => PathBuf::from(DEFAULT_SCRIPT_NAME),
    }
}

/// Application-wide configuration
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AppConfig {
    /// Version of the config format
    pub version: u32,
    /// Widget instances
    pub instances: Vec<InstanceConfig>,
}

impl AppConfig {
    /// Load configuration from disk
    pub fn load() -> Result<Self> {
        let config_path = Self::config_path()?;

        if !config_path.exists() {
            return Ok(Self::default());
        }

        Self::load_from_path(&config_path)
    }

    /// Get the configuration file path
    pub fn config_path() -> Result<PathBuf> {
        Ok(project_dirs()?.config_dir().join("config.json"))
    }

    /// Load configuration from a specific file path
    pub fn load_from_path(path: &Path) -> Result<Self> {
        let content = std::fs::read_to_string(path)?;
        let config = serde_json::from_str(&content)?;
        Ok(config)
    }

    /// Save configuration to a specific file path
    pub fn save_to_path(&self, path: &Path) -> Result<()> {
        // Ensure parent directory exists
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent)?;
        }

        let content = serde_json::to_string_pretty(self)?;
        std::fs::write(path, content)?;
        Ok(())
    }
}

impl Default for AppConfig {
    fn default() -> Self {
        Self {
            version: 1,
            instances: vec![InstanceConfig::default()],
        }
    }
}

/// One widget instance
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct InstanceConfig {
    /// Name used in logs, notifications and console commands
    pub name: String,
    /// Raw settings, normalized by the config validator at startup
    #[serde(default)]
    pub settings: HashMap<String, Value>,
}

impl Default for InstanceConfig {
    fn default() -> Self {
        let settings = json!({
            "sensor_pin": 4,
            "pin_scheme": "BCMv2",
            "units": "metric",
            "update_interval": 5,
            "show_temperature": true,
            "show_humidity": true,
        });
        let settings = match settings {
            Value::Object(map) => map.into_iter().collect(),
            _ => HashMap::new(),
        };
        Self {
            name: "indoor".to_string(),
            settings,
        }
    }
}
