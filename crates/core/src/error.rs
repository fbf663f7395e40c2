//! Error types for configuration, pin mapping and acquisition

use dht_sens_types::PinScheme;
use serde::{Deserialize, Serialize};
use thiserror::Error;

/// A raw configuration field that failed validation.
///
/// Never surfaced as a failure: the validator logs it and substitutes the
/// field's default.
#[derive(Debug, Clone, PartialEq, Error)]
#[error("invalid value for `{field}`: {reason}, using default")]
pub struct ConfigError {
    pub field: &'static str,
    pub reason: String,
}

impl ConfigError {
    pub fn new(field: &'static str, reason: impl Into<String>) -> Self {
        Self {
            field,
            reason: reason.into(),
        }
    }
}

/// No header row matches the configured scheme and pin.
///
/// Static configuration problem: polling never starts for the instance.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum InvalidPinError {
    #[error("no sensor pin configured")]
    Missing,
    #[error("pin {pin} is not a GPIO pin in the {scheme} numbering scheme")]
    NotFound { scheme: PinScheme, pin: u32 },
}

/// Failure of a single acquisition attempt. Retried by the client.
#[derive(Debug, Clone, PartialEq, Error, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum AcquisitionError {
    /// The reader program could not be started
    #[error("failed to start reader program: {message}")]
    Spawn { message: String },

    /// The reader program exited with a failure status
    #[error("reader program exited with {}: {}", describe_exit(.code), .stderr.trim())]
    ExitStatus { code: Option<i32>, stderr: String },

    /// The reader program succeeded but its output is not a reading
    #[error("unparsable reader output ({message}): {}", .output.trim())]
    Parse { message: String, output: String },

    /// The worker running the reader program died
    #[error("acquisition worker failed: {message}")]
    Worker { message: String },

    /// The reply was dropped because the instance fell behind the server
    #[error("reply lost, {skipped} server messages were dropped")]
    ReplyLost { skipped: u64 },
}

fn describe_exit(code: &Option<i32>) -> String {
    match code {
        Some(code) => format!("status {}", code),
        None => "no status (terminated by signal)".to_string(),
    }
}

impl AcquisitionError {
    /// Raw diagnostic text captured from the reader, if any
    pub fn diagnostic(&self) -> &str {
        match self {
            AcquisitionError::Spawn { message } | AcquisitionError::Worker { message } => message,
            AcquisitionError::ExitStatus { stderr, .. } => stderr,
            AcquisitionError::Parse { output, .. } => output,
            AcquisitionError::ReplyLost { .. } => "",
        }
    }
}

/// A server message addressed to another instance.
///
/// Expected whenever several instances share one backend; only logged at
/// debug level.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("message for instance `{received}` ignored by `{expected}`")]
pub struct ProtocolMismatchError {
    pub expected: String,
    pub received: String,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_invalid_pin_message() {
        let err = InvalidPinError::NotFound {
            scheme: PinScheme::Board,
            pin: 1,
        };
        assert_eq!(
            err.to_string(),
            "pin 1 is not a GPIO pin in the BOARD numbering scheme"
        );
    }

    #[test]
    fn test_exit_status_message_trims_stderr() {
        let err = AcquisitionError::ExitStatus {
            code: Some(1),
            stderr: "Failed to initialize wiringPi\n".to_string(),
        };
        assert_eq!(
            err.to_string(),
            "reader program exited with status 1: Failed to initialize wiringPi"
        );
        assert_eq!(err.diagnostic(), "Failed to initialize wiringPi\n");
    }

    #[test]
    fn test_acquisition_error_serialization() {
        let err = AcquisitionError::Parse {
            message: "expected value".to_string(),
            output: "garbage".to_string(),
        };
        let json = serde_json::to_string(&err).unwrap();
        assert!(json.contains("\"kind\":\"parse\""));

        let back: AcquisitionError = serde_json::from_str(&json).unwrap();
        assert_eq!(back, err);
    }
}
