//! Messages exchanged between widget instances and the acquisition server
//!
//! One server is shared by any number of instances. Requests travel on a
//! single queue; every server message is broadcast to all instances, which
//! keep only those carrying their own [`InstanceId`].

use crate::error::AcquisitionError;
use dht_sens_types::SensorReading;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::path::PathBuf;
use uuid::Uuid;

/// Version stamped on every [`Envelope`]
pub const PROTOCOL_VERSION: u16 = 1;

/// Opaque token identifying one running widget instance
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct InstanceId(String);

impl InstanceId {
    /// Generate a unique id derived from the instance name
    pub fn generate(name: &str) -> Self {
        Self(format!("{}_{}", name, Uuid::new_v4().simple()))
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl From<&str> for InstanceId {
    fn from(value: &str) -> Self {
        Self(value.to_string())
    }
}

impl fmt::Display for InstanceId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// Message kind the server uses to answer a [`PollRequest`]
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum ReplyKind {
    #[default]
    DataReceived,
}

/// Request for one sensor acquisition
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PollRequest {
    pub instance_id: InstanceId,
    /// 1-based attempt number within the current poll cycle
    pub attempt: u32,
    pub canonical_pin: u8,
    pub script_path: PathBuf,
    pub use_sudo: bool,
    pub reply: ReplyKind,
}

/// Outcome of one acquisition, correlated through the echoed request
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PollResult {
    pub original: PollRequest,
    pub outcome: Result<SensorReading, AcquisitionError>,
}

impl PollResult {
    pub fn new(original: PollRequest, outcome: Result<SensorReading, AcquisitionError>) -> Self {
        Self { original, outcome }
    }

    pub fn is_successful(&self) -> bool {
        self.outcome.is_ok()
    }
}

/// Severity of a diagnostic log message
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum MessageType {
    /// Developer detail, logged at debug level
    Dev,
    Info,
    Warn,
    Error,
}

impl MessageType {
    pub fn level(&self) -> log::Level {
        match self {
            MessageType::Dev => log::Level::Debug,
            MessageType::Info => log::Level::Info,
            MessageType::Warn => log::Level::Warn,
            MessageType::Error => log::Level::Error,
        }
    }
}

/// Free-form diagnostic sent by the server
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LogMessage {
    /// Instance the message concerns; `None` addresses everyone
    pub instance_id: Option<InstanceId>,
    pub message: String,
    pub message_type: MessageType,
}

/// Instance → server
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", content = "payload", rename_all = "SCREAMING_SNAKE_CASE")]
pub enum ClientMessage {
    /// Announce a new instance
    Init { instance_id: InstanceId },
    /// Ask for one acquisition
    GetData(PollRequest),
}

/// Server → instances
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", content = "payload", rename_all = "SCREAMING_SNAKE_CASE")]
pub enum ServerMessage {
    DataReceived(PollResult),
    Log(LogMessage),
}

impl ServerMessage {
    /// Reply to a request, using the kind the request asked for
    pub fn reply(result: PollResult) -> Self {
        match result.original.reply {
            ReplyKind::DataReceived => ServerMessage::DataReceived(result),
        }
    }

    /// Instance this message is addressed to, if any
    pub fn instance_id(&self) -> Option<&InstanceId> {
        match self {
            ServerMessage::DataReceived(result) => Some(&result.original.instance_id),
            ServerMessage::Log(log) => log.instance_id.as_ref(),
        }
    }
}

/// Versioned wrapper for every message on the wire
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Envelope<T> {
    pub version: u16,
    pub message: T,
}

impl<T> Envelope<T> {
    pub fn new(message: T) -> Self {
        Self {
            version: PROTOCOL_VERSION,
            message,
        }
    }

    pub fn is_supported(&self) -> bool {
        self.version == PROTOCOL_VERSION
    }
}
