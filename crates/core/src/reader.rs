//! Sensor reader trait and related types

use crate::error::AcquisitionError;
use crate::protocol::PollRequest;
use dht_sens_types::SensorReading;
use std::path::PathBuf;
use std::sync::Arc;

/// Metadata about a sensor reader
#[derive(Debug, Clone)]
pub struct ReaderMetadata {
    /// Unique identifier for this reader type
    pub id: String,
    /// Human-readable name
    pub name: String,
    /// Description of how this reader obtains data
    pub description: String,
}

/// Everything a reader needs for one acquisition
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ReadCommand {
    pub script_path: PathBuf,
    pub canonical_pin: u8,
    pub use_sudo: bool,
}

impl From<&PollRequest> for ReadCommand {
    fn from(request: &PollRequest) -> Self {
        Self {
            script_path: request.script_path.clone(),
            canonical_pin: request.canonical_pin,
            use_sudo: request.use_sudo,
        }
    }
}

/// Trait for all sensor readers
///
/// A reader performs exactly one blocking acquisition per call. It is run
/// on a worker thread by the acquisition server and must never retry on
/// its own: retry policy belongs to the polling client.
pub trait SensorReader: Send + Sync {
    /// Get metadata about this reader
    fn metadata(&self) -> &ReaderMetadata;

    /// Acquire one reading
    fn read(&self, command: &ReadCommand) -> Result<SensorReading, AcquisitionError>;
}

/// Shared reader for use across worker threads
pub type SharedSensorReader = Arc<dyn SensorReader>;
