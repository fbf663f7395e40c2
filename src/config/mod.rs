//! Configuration management

mod settings;

pub use settings::{default_script_path, project_dirs, AppConfig, InstanceConfig};
