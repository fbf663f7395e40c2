//! dht-sens-core: Core protocol, validation and formatting for dht-sens.
//!
//! This crate contains the pin mapper, the configuration validator, the
//! formatter, the message protocol shared by instances and the server, the
//! error taxonomy and the `SensorReader` trait.

pub mod constants;
mod error;
pub mod format;
pub mod pin_mapper;
pub mod protocol;
mod reader;
pub mod validator;

pub use error::{AcquisitionError, ConfigError, InvalidPinError, ProtocolMismatchError};
pub use format::{render, substitute_placeholders, FormattedValues};
pub use protocol::{
    ClientMessage, Envelope, InstanceId, LogMessage, MessageType, PollRequest, PollResult,
    ReplyKind, ServerMessage, PROTOCOL_VERSION,
};
pub use reader::{ReadCommand, ReaderMetadata, SensorReader, SharedSensorReader};
pub use validator::{ConfigValidator, ValidatorDefaults};

// Re-export types used in trait signatures for convenience
pub use dht_sens_types::{SensorReading, WidgetConfig};
