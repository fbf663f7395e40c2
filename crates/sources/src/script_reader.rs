//! External reader program
//!
//! Runs the DHT reader as `<script> <pin> -m j -a 3` (optionally through
//! `sudo`) and parses the single JSON record it prints on success.

use dht_sens_core::constants::{READER_ARGS, SUDO_PROGRAM};
use dht_sens_core::{AcquisitionError, ReadCommand, ReaderMetadata, SensorReader, SensorReading};
use serde::Deserialize;
use std::process::Command;

/// Record printed by the reader program in JSON mode
#[derive(Debug, Deserialize)]
struct ReaderRecord {
    humidity: f64,
    // The reference reader spells it "celcius"
    #[serde(alias = "celcius")]
    celsius: f64,
    #[serde(default)]
    fahrenheit: Option<f64>,
    #[serde(default)]
    kelvin: Option<f64>,
}

/// Parse the reader's standard output into a reading
pub fn parse_reader_output(stdout: &str) -> Result<SensorReading, AcquisitionError> {
    let record: ReaderRecord =
        serde_json::from_str(stdout.trim()).map_err(|e| AcquisitionError::Parse {
            message: e.to_string(),
            output: stdout.to_string(),
        })?;

    let mut reading = SensorReading::from_celsius(record.celsius, record.humidity);
    if let Some(fahrenheit) = record.fahrenheit {
        reading.fahrenheit = fahrenheit;
    }
    if let Some(kelvin) = record.kelvin {
        reading.kelvin = kelvin;
    }

    if !reading.is_finite() {
        return Err(AcquisitionError::Parse {
            message: "non-finite value".to_string(),
            output: stdout.to_string(),
        });
    }

    Ok(reading)
}

/// Sensor reader backed by an external program
pub struct ScriptReader {
    metadata: ReaderMetadata,
}

impl Default for ScriptReader {
    fn default() -> Self {
        Self::new()
    }
}

impl ScriptReader {
    pub fn new() -> Self {
        Self {
            metadata: ReaderMetadata {
                id: "dht_script".to_string(),
                name: "DHT Reader Program".to_string(),
                description: "DHT11/DHT22 reading obtained from an external program".to_string(),
            },
        }
    }

    /// Build the process invocation for a read command
    pub fn command(&self, command: &ReadCommand) -> Command {
        let mut cmd = if command.use_sudo {
            let mut sudo = Command::new(SUDO_PROGRAM);
            sudo.arg(&command.script_path);
            sudo
        } else {
            Command::new(&command.script_path)
        };
        cmd.arg(command.canonical_pin.to_string()).args(READER_ARGS);
        cmd
    }
}

impl SensorReader for ScriptReader {
    fn metadata(&self) -> &ReaderMetadata {
        &self.metadata
    }

    fn read(&self, command: &ReadCommand) -> Result<SensorReading, AcquisitionError> {
        let output = self
            .command(command)
            .output()
            .map_err(|e| AcquisitionError::Spawn {
                message: format!("{}: {}", command.script_path.display(), e),
            })?;

        if !output.status.success() {
            return Err(AcquisitionError::ExitStatus {
                code: output.status.code(),
                stderr: String::from_utf8_lossy(&output.stderr).into_owned(),
            });
        }

        parse_reader_output(&String::from_utf8_lossy(&output.stdout))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::ffi::OsStr;
    use std::path::PathBuf;

    fn read_command(script: &str, use_sudo: bool) -> ReadCommand {
        ReadCommand {
            script_path: PathBuf::from(script),
            canonical_pin: 7,
            use_sudo,
        }
    }

    #[test]
    fn test_parse_reference_output() {
        let reading =
            parse_reader_output("{ \"humidity\": 45.2, \"celcius\": 20.0, \"fahrenheit\": 68.0 }\n").unwrap();
        assert_eq!(reading.humidity, 45.2);
        assert_eq!(reading.celsius, 20.0);
        assert_eq!(reading.fahrenheit, 68.0);
        assert!((reading.kelvin - 293.15).abs() < 1e-9);
    }

    #[test]
    fn test_parse_explicit_kelvin() {
        let reading =
            parse_reader_output(r#"{"humidity": 50, "celsius": 21.5, "kelvin": 294.6}"#).unwrap();
        assert_eq!(reading.kelvin, 294.6);
        assert!((reading.fahrenheit - 70.7).abs() < 1e-9);
    }

    #[test]
    fn test_parse_failure_keeps_raw_output() {
        let err = parse_reader_output("Data not good, skip\n").unwrap_err();
        match err {
            AcquisitionError::Parse { output, .. } => assert_eq!(output, "Data not good, skip\n"),
            other => panic!("unexpected error: {:?}", other),
        }

        assert!(parse_reader_output(r#"{"celsius": 20.0}"#).is_err());
    }

    #[test]
    fn test_command_line() {
        let reader = ScriptReader::new();

        let cmd = reader.command(&read_command("/opt/dht/DHT", false));
        assert_eq!(cmd.get_program(), OsStr::new("/opt/dht/DHT"));
        let args: Vec<&OsStr> = cmd.get_args().collect();
        assert_eq!(args, ["7", "-m", "j", "-a", "3"]);

        let cmd = reader.command(&read_command("/opt/dht/DHT", true));
        assert_eq!(cmd.get_program(), OsStr::new("sudo"));
        let args: Vec<&OsStr> = cmd.get_args().collect();
        assert_eq!(args, ["/opt/dht/DHT", "7", "-m", "j", "-a", "3"]);
    }

    #[cfg(unix)]
    #[test]
    fn test_non_zero_exit_is_failure() {
        let err = ScriptReader::new().read(&read_command("false", false)).unwrap_err();
        assert!(matches!(err, AcquisitionError::ExitStatus { code: Some(1), .. }));
    }

    #[cfg(unix)]
    #[test]
    fn test_malformed_output_is_failure() {
        // echo succeeds but prints its arguments instead of a reading
        let err = ScriptReader::new().read(&read_command("echo", false)).unwrap_err();
        match err {
            AcquisitionError::Parse { output, .. } => assert_eq!(output.trim(), "7 -m j -a 3"),
            other => panic!("unexpected error: {:?}", other),
        }
    }

    #[test]
    fn test_missing_program() {
        let err = ScriptReader::new()
            .read(&read_command("/nonexistent/dht-sens/DHT", false))
            .unwrap_err();
        assert!(matches!(err, AcquisitionError::Spawn { .. }));
    }
}
