//! Acquisition client: correlated requests and the bounded retry loop

use dht_sens_core::{
    AcquisitionError, InstanceId, PollRequest, PollResult, ProtocolMismatchError, ReplyKind,
    SensorReading,
};
use log::{debug, error, info, warn};
use std::path::PathBuf;
use std::time::Duration;

/// Where the client is within a poll cycle
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ClientPhase {
    /// No request outstanding
    Idle,
    /// Request with this attempt number awaiting its result
    Polling { attempt: u32 },
    /// Waiting for the retry delay before issuing this attempt
    RetryPending { attempt: u32 },
}

/// What the caller should do after a result was handled
#[derive(Debug, Clone, PartialEq)]
pub enum PollOutcome {
    /// A fresh reading was obtained
    Delivered { reading: SensorReading, attempts: u32 },
    /// Wait `delay`, then call [`AcquisitionClient::retry_due`]
    RetryScheduled { attempt: u32, delay: Duration },
    /// All attempts failed; wait for the next scheduled tick
    Exhausted { error: AcquisitionError },
    /// Result did not belong to the outstanding request
    Ignored,
}

/// Issues poll requests for one instance and drives retries
#[derive(Debug, Clone)]
pub struct AcquisitionClient {
    instance_id: InstanceId,
    canonical_pin: u8,
    script_path: PathBuf,
    use_sudo: bool,
    max_attempts: u32,
    retry_delay: Duration,
    phase: ClientPhase,
}

impl AcquisitionClient {
    pub fn new(
        instance_id: InstanceId,
        canonical_pin: u8,
        script_path: PathBuf,
        use_sudo: bool,
        max_attempts: u32,
        retry_delay: Duration,
    ) -> Self {
        Self {
            instance_id,
            canonical_pin,
            script_path,
            use_sudo,
            max_attempts,
            retry_delay,
            phase: ClientPhase::Idle,
        }
    }

    pub fn instance_id(&self) -> &InstanceId {
        &self.instance_id
    }

    pub fn phase(&self) -> ClientPhase {
        self.phase
    }

    /// A request or retry is outstanding
    pub fn is_busy(&self) -> bool {
        self.phase != ClientPhase::Idle
    }

    /// Start a new poll cycle.
    ///
    /// Returns `None` while a request or retry is outstanding, so at most
    /// one request per instance is ever in flight.
    pub fn poll(&mut self) -> Option<PollRequest> {
        if self.is_busy() {
            debug!(
                "{}: poll skipped, previous cycle still running ({:?})",
                self.instance_id, self.phase
            );
            return None;
        }
        Some(self.request(1))
    }

    /// Issue the pending retry once its delay has elapsed
    pub fn retry_due(&mut self) -> Option<PollRequest> {
        match self.phase {
            ClientPhase::RetryPending { attempt } => Some(self.request(attempt)),
            ClientPhase::Idle | ClientPhase::Polling { .. } => None,
        }
    }

    fn request(&mut self, attempt: u32) -> PollRequest {
        info!("{}: data requested (attempt {})", self.instance_id, attempt);
        self.phase = ClientPhase::Polling { attempt };
        PollRequest {
            instance_id: self.instance_id.clone(),
            attempt,
            canonical_pin: self.canonical_pin,
            script_path: self.script_path.clone(),
            use_sudo: self.use_sudo,
            reply: ReplyKind::DataReceived,
        }
    }

    /// Check that a server message is addressed to this instance
    pub fn accepts(&self, instance_id: &InstanceId) -> Result<(), ProtocolMismatchError> {
        if instance_id == &self.instance_id {
            Ok(())
        } else {
            Err(ProtocolMismatchError {
                expected: self.instance_id.to_string(),
                received: instance_id.to_string(),
            })
        }
    }

    /// Handle the result of the outstanding request
    pub fn handle_result(&mut self, result: PollResult) -> PollOutcome {
        if let Err(e) = self.accepts(&result.original.instance_id) {
            debug!("{}", e);
            return PollOutcome::Ignored;
        }

        let attempt = result.original.attempt;
        if self.phase != (ClientPhase::Polling { attempt }) {
            debug!(
                "{}: unexpected result for attempt {} while {:?}",
                self.instance_id, attempt, self.phase
            );
            return PollOutcome::Ignored;
        }

        match result.outcome {
            Ok(reading) => {
                self.phase = ClientPhase::Idle;
                info!(
                    "{}: data received after {} attempt(s)",
                    self.instance_id, attempt
                );
                PollOutcome::Delivered {
                    reading,
                    attempts: attempt,
                }
            }
            Err(e) => self.fail(attempt, e),
        }
    }

    /// Count the outstanding request as failed when its reply was dropped.
    ///
    /// Without this the client would stay in `Polling` and skip every
    /// later tick.
    pub fn reply_lost(&mut self, skipped: u64) -> PollOutcome {
        match self.phase {
            ClientPhase::Polling { attempt } => {
                warn!(
                    "{}: reply to attempt {} may have been dropped",
                    self.instance_id, attempt
                );
                self.fail(attempt, AcquisitionError::ReplyLost { skipped })
            }
            ClientPhase::Idle | ClientPhase::RetryPending { .. } => PollOutcome::Ignored,
        }
    }

    fn fail(&mut self, attempt: u32, e: AcquisitionError) -> PollOutcome {
        if attempt < self.max_attempts {
            self.phase = ClientPhase::RetryPending {
                attempt: attempt + 1,
            };
            info!(
                "{}: failed to read sensor data, retrying in {} seconds: {}",
                self.instance_id,
                self.retry_delay.as_secs_f64(),
                e
            );
            PollOutcome::RetryScheduled {
                attempt: attempt + 1,
                delay: self.retry_delay,
            }
        } else {
            self.phase = ClientPhase::Idle;
            error!(
                "{}: failed to read sensor data after {} attempts: {}",
                self.instance_id, attempt, e
            );
            PollOutcome::Exhausted { error: e }
        }
    }
}
