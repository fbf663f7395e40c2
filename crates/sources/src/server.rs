//! Acquisition server
//!
//! Receives requests from any number of widget instances on one queue and
//! broadcasts every reply. Each acquisition runs on a blocking worker so a
//! slow or hung sensor never stalls the instances' event loops. The server
//! never retries; that is the client's job.

use anyhow::{anyhow, Result};
use dht_sens_core::{
    AcquisitionError, ClientMessage, Envelope, InstanceId, LogMessage, MessageType, PollRequest,
    PollResult, ReadCommand, ServerMessage, SharedSensorReader,
};
use log::{debug, info, trace, warn};
use tokio::sync::{broadcast, mpsc};
use tokio::task::JoinHandle;

/// Capacity of the instance → server request queue
pub const REQUEST_QUEUE_CAPACITY: usize = 64;

/// Capacity of the server → instances broadcast channel
pub const RESPONSE_CHANNEL_CAPACITY: usize = 256;

/// Handle used by instances to reach a running server
#[derive(Clone)]
pub struct ServerHandle {
    requests: mpsc::Sender<Envelope<ClientMessage>>,
    responses: broadcast::Sender<Envelope<ServerMessage>>,
}

impl ServerHandle {
    /// Create a handle together with the receiving end of its request queue
    pub fn channel() -> (Self, mpsc::Receiver<Envelope<ClientMessage>>) {
        let (requests, inbound) = mpsc::channel(REQUEST_QUEUE_CAPACITY);
        let (responses, _) = broadcast::channel(RESPONSE_CHANNEL_CAPACITY);
        (Self { requests, responses }, inbound)
    }

    /// Queue a message for the server
    pub async fn send(&self, message: ClientMessage) -> Result<()> {
        self.requests
            .send(Envelope::new(message))
            .await
            .map_err(|_| anyhow!("acquisition server is not running"))
    }

    /// Sender side of the request queue
    pub fn requests(&self) -> mpsc::Sender<Envelope<ClientMessage>> {
        self.requests.clone()
    }

    /// Subscribe to every message the server sends
    pub fn subscribe(&self) -> broadcast::Receiver<Envelope<ServerMessage>> {
        self.responses.subscribe()
    }

    /// Broadcast a message to every subscribed instance.
    ///
    /// Returns `false` when nobody is listening.
    pub fn publish(&self, message: ServerMessage) -> bool {
        self.responses.send(Envelope::new(message)).is_ok()
    }
}

/// Executes poll requests with a sensor reader
#[derive(Clone)]
pub struct AcquisitionServer {
    reader: SharedSensorReader,
    responses: broadcast::Sender<Envelope<ServerMessage>>,
}

impl AcquisitionServer {
    /// Start a server task and return the handle instances talk to
    pub fn spawn(reader: SharedSensorReader) -> (ServerHandle, JoinHandle<()>) {
        let (handle, inbound) = ServerHandle::channel();

        let server = Self {
            reader,
            responses: handle.responses.clone(),
        };
        let metadata = server.reader.metadata();
        info!(
            "Starting acquisition server with reader '{}' ({})",
            metadata.name, metadata.id
        );
        let task = tokio::spawn(server.run(inbound));

        (handle, task)
    }

    /// Run one acquisition and correlate the outcome with its request
    pub async fn execute(&self, request: PollRequest) -> PollResult {
        let reader = self.reader.clone();
        let command = ReadCommand::from(&request);
        debug!(
            "Reading pin {} for {} (attempt {})",
            command.canonical_pin, request.instance_id, request.attempt
        );

        let outcome = match tokio::task::spawn_blocking(move || reader.read(&command)).await {
            Ok(outcome) => outcome,
            Err(e) => Err(AcquisitionError::Worker {
                message: e.to_string(),
            }),
        };

        PollResult::new(request, outcome)
    }

    async fn run(self, mut inbound: mpsc::Receiver<Envelope<ClientMessage>>) {
        while let Some(envelope) = inbound.recv().await {
            if !envelope.is_supported() {
                warn!(
                    "Dropping message with unsupported protocol version {}",
                    envelope.version
                );
                continue;
            }

            match envelope.message {
                ClientMessage::Init { instance_id } => self.greet(instance_id),
                ClientMessage::GetData(request) => {
                    let server = self.clone();
                    tokio::spawn(async move {
                        let result = server.execute(request).await;
                        server.publish(ServerMessage::reply(result));
                    });
                }
            }
        }

        info!("Request queue closed, acquisition server stopping");
    }

    fn greet(&self, instance_id: InstanceId) {
        self.log(
            Some(instance_id.clone()),
            format!("INIT received from: {}.", instance_id),
        );
        self.log(
            Some(instance_id),
            format!("Acquisition server ready ({}).", self.reader.metadata().description),
        );
    }

    fn log(&self, instance_id: Option<InstanceId>, message: String) {
        self.publish(ServerMessage::Log(LogMessage {
            instance_id,
            message,
            message_type: MessageType::Dev,
        }));
    }

    fn publish(&self, message: ServerMessage) {
        if self.responses.send(Envelope::new(message)).is_err() {
            trace!("No instance listening for server messages");
        }
    }
}
