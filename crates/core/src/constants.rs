//! Shared constants for validation and acquisition

/// Shortest accepted poll interval, in minutes (raw config unit)
pub const MIN_UPDATE_INTERVAL_MINUTES: f64 = 0.5;

/// Poll interval used when the configured one is invalid, in minutes
pub const DEFAULT_UPDATE_INTERVAL_MINUTES: f64 = 5.0;

/// Shortest accepted retry delay, in seconds
pub const MIN_RETRY_DELAY_SECS: f64 = 10.0;

/// Retry delay used when the configured one is invalid, in seconds
pub const DEFAULT_RETRY_DELAY_SECS: f64 = 10.0;

/// Initial load delay used when the configured one is invalid, in seconds
pub const DEFAULT_INITIAL_LOAD_DELAY_SECS: f64 = 0.0;

/// File name of the reader program inside the data directory
pub const DEFAULT_SCRIPT_NAME: &str = "DHT";

/// Arguments appended after the pin: JSON output mode, three sensor attempts
pub const READER_ARGS: [&str; 4] = ["-m", "j", "-a", "3"];

/// Program used for privilege elevation
pub const SUDO_PROGRAM: &str = "sudo";

/// Markup shown until the first reading arrives
pub const LOADING_TEXT: &str = "Loading&hellip;";
