//! Widget instance: the per-instance context and its event loop
//!
//! Each instance owns its scheduler, client, cached reading and peer latch
//! and runs them on a single task. Everything it reacts to (timers, server
//! replies, notifications, console commands) is multiplexed with
//! `tokio::select!`, so no state is shared across tasks.

use super::client::{AcquisitionClient, ClientPhase, PollOutcome};
use super::display::{DisplayContent, DisplayUpdate};
use super::notifier::{
    reading_notifications, Notification, NotificationHub, NotificationKind, PeerLatch,
};
use super::scheduler::{PollScheduler, ScheduleState};
use anyhow::{anyhow, Result};
use chrono::{DateTime, Utc};
use dht_sens_core::pin_mapper;
use dht_sens_core::{
    ClientMessage, Envelope, InstanceId, PollRequest, SensorReading, ServerMessage, WidgetConfig,
};
use dht_sens_sources::ServerHandle;
use log::{debug, error, info, log, warn};
use std::future::pending;
use std::pin::Pin;
use std::time::Duration;
use tokio::sync::broadcast::error::RecvError;
use tokio::sync::{broadcast, mpsc, oneshot};
use tokio::task::JoinHandle;
use tokio::time::{interval_at, sleep, Instant, Interval, MissedTickBehavior, Sleep};

/// Capacity of an instance's command queue
const COMMAND_QUEUE_CAPACITY: usize = 16;

/// Commands accepted by a running instance
#[derive(Debug)]
pub enum InstanceCommand {
    /// Widget hidden: stop scheduling new polls
    Suspend,
    /// Widget shown again
    Resume,
    /// Report the current state
    Status(oneshot::Sender<InstanceStatus>),
    Shutdown,
}

/// Snapshot of an instance's state
#[derive(Debug, Clone, PartialEq)]
pub struct InstanceStatus {
    pub name: String,
    pub instance_id: InstanceId,
    /// `None` when the pin could not be resolved
    pub canonical_pin: Option<u8>,
    pub schedule: ScheduleState,
    pub phase: Option<ClientPhase>,
    pub last_successful_poll: DateTime<Utc>,
    pub reading: Option<SensorReading>,
}

/// Handle for talking to a spawned instance
#[derive(Clone)]
pub struct InstanceHandle {
    name: String,
    instance_id: InstanceId,
    commands: mpsc::Sender<InstanceCommand>,
}

impl InstanceHandle {
    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn instance_id(&self) -> &InstanceId {
        &self.instance_id
    }

    pub async fn send(&self, command: InstanceCommand) -> Result<()> {
        self.commands
            .send(command)
            .await
            .map_err(|_| anyhow!("instance '{}' is not running", self.name))
    }

    pub async fn status(&self) -> Result<InstanceStatus> {
        let (tx, rx) = oneshot::channel();
        self.send(InstanceCommand::Status(tx)).await?;
        rx.await
            .map_err(|_| anyhow!("instance '{}' stopped before answering", self.name))
    }
}

/// Per-instance context
pub struct WidgetInstance {
    instance_id: InstanceId,
    name: String,
    config: WidgetConfig,
    canonical_pin: Option<u8>,
    scheduler: PollScheduler,
    /// `None` when polling is disabled by an invalid pin
    client: Option<AcquisitionClient>,
    reading: Option<SensorReading>,
    peer_latch: PeerLatch,
    hub: NotificationHub,
    display: mpsc::Sender<DisplayUpdate>,
}

impl WidgetInstance {
    pub fn new(
        name: impl Into<String>,
        config: WidgetConfig,
        hub: NotificationHub,
        display: mpsc::Sender<DisplayUpdate>,
    ) -> Self {
        let name = name.into();
        let instance_id = InstanceId::generate(&name);

        let canonical_pin = match pin_mapper::resolve(config.pin_scheme, config.sensor_pin) {
            Ok(pin) => {
                debug!("{}: {} pin {:?} is WPI pin {}", name, config.pin_scheme, config.sensor_pin, pin);
                Some(pin)
            }
            Err(e) => {
                error!("{}: {}; polling disabled", name, e);
                None
            }
        };

        let client = canonical_pin.map(|pin| {
            AcquisitionClient::new(
                instance_id.clone(),
                pin,
                config.script_path.clone(),
                config.use_sudo,
                config.max_attempts,
                config.retry_delay,
            )
        });

        Self {
            instance_id,
            name,
            scheduler: PollScheduler::new(config.update_interval),
            config,
            canonical_pin,
            client,
            reading: None,
            peer_latch: PeerLatch::default(),
            hub,
            display,
        }
    }

    pub fn instance_id(&self) -> &InstanceId {
        &self.instance_id
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    /// Start the event loop on its own task
    pub fn spawn(self, server: ServerHandle) -> (InstanceHandle, JoinHandle<()>) {
        let (commands, inbound) = mpsc::channel(COMMAND_QUEUE_CAPACITY);
        let handle = InstanceHandle {
            name: self.name.clone(),
            instance_id: self.instance_id.clone(),
            commands,
        };

        // Subscribe before returning so nothing sent after spawn() is missed
        let responses = server.subscribe();
        let notifications = self.hub.subscribe();
        let task = tokio::spawn(self.run(server, responses, notifications, inbound));

        (handle, task)
    }

    async fn run(
        mut self,
        server: ServerHandle,
        mut responses: broadcast::Receiver<Envelope<ServerMessage>>,
        mut notifications: broadcast::Receiver<Notification>,
        mut commands: mpsc::Receiver<InstanceCommand>,
    ) {
        if let Err(e) = server
            .send(ClientMessage::Init {
                instance_id: self.instance_id.clone(),
            })
            .await
        {
            error!("{}: {}", self.name, e);
            return;
        }
        self.refresh_display().await;

        let mut start_delay = self
            .client
            .is_some()
            .then(|| Box::pin(sleep(self.config.initial_load_delay)));
        let mut retry: Option<Pin<Box<Sleep>>> = None;
        let mut ticker: Option<Interval> = None;
        let mut armed_token: Option<u64> = None;

        loop {
            let token = self.scheduler.timer_token();
            if token != armed_token {
                armed_token = token;
                ticker = token.map(|_| repeating(self.scheduler.poll_interval()));
            }

            // Biased so replies and notifications already queued are handled
            // before a later command
            let request = tokio::select! {
                biased;

                _ = sleep_or_pending(&mut start_delay) => {
                    start_delay = None;
                    if self.scheduler.start() {
                        self.begin_poll()
                    } else {
                        None
                    }
                }
                _ = tick_or_pending(&mut ticker) => self.begin_poll(),
                _ = sleep_or_pending(&mut retry) => {
                    retry = None;
                    self.client.as_mut().and_then(AcquisitionClient::retry_due)
                }
                message = responses.recv() => match message {
                    Ok(envelope) => {
                        if let Some(delay) = self.handle_server_message(envelope).await {
                            retry = Some(Box::pin(sleep(delay)));
                        }
                        None
                    }
                    Err(RecvError::Lagged(skipped)) => {
                        warn!("{}: missed {} server messages", self.name, skipped);
                        if let Some(delay) = self.reply_lost(skipped) {
                            retry = Some(Box::pin(sleep(delay)));
                        }
                        None
                    }
                    Err(RecvError::Closed) => {
                        info!("{}: acquisition server went away", self.name);
                        break;
                    }
                },
                notification = notifications.recv() => match notification {
                    Ok(notification) => {
                        self.handle_notification(notification);
                        None
                    }
                    Err(RecvError::Lagged(skipped)) => {
                        warn!("{}: missed {} notifications", self.name, skipped);
                        None
                    }
                    Err(RecvError::Closed) => break,
                },
                command = commands.recv() => match command {
                    Some(InstanceCommand::Suspend) => {
                        info!("{}: suspended", self.name);
                        self.scheduler.suspend();
                        None
                    }
                    Some(InstanceCommand::Resume) => {
                        info!("{}: resumed", self.name);
                        if self.scheduler.resume(Utc::now()) {
                            self.begin_poll()
                        } else {
                            None
                        }
                    }
                    Some(InstanceCommand::Status(reply)) => {
                        let _ = reply.send(self.status());
                        None
                    }
                    Some(InstanceCommand::Shutdown) | None => break,
                },
            };

            if let Some(request) = request {
                if let Err(e) = server.send(ClientMessage::GetData(request)).await {
                    error!("{}: {}", self.name, e);
                    break;
                }
            }
        }

        debug!("{}: event loop stopped", self.name);
    }

    fn begin_poll(&mut self) -> Option<PollRequest> {
        self.client.as_mut().and_then(AcquisitionClient::poll)
    }

    /// Returns the retry delay when a retry has to be scheduled
    async fn handle_server_message(&mut self, envelope: Envelope<ServerMessage>) -> Option<Duration> {
        if !envelope.is_supported() {
            warn!(
                "{}: ignoring server message with protocol version {}",
                self.name, envelope.version
            );
            return None;
        }

        match envelope.message {
            ServerMessage::Log(message) => {
                let addressed = message
                    .instance_id
                    .as_ref()
                    .map_or(true, |id| id == &self.instance_id);
                if addressed {
                    log!(message.message_type.level(), "{}: {}", self.name, message.message);
                }
                None
            }
            ServerMessage::DataReceived(result) => {
                let client = self.client.as_mut()?;
                match client.handle_result(result) {
                    PollOutcome::Delivered { reading, .. } => {
                        self.scheduler.record_success(Utc::now());
                        self.reading = Some(reading);
                        self.broadcast_reading();
                        self.refresh_display().await;
                        None
                    }
                    PollOutcome::RetryScheduled { delay, .. } => Some(delay),
                    // The last good reading (or the loading state) stays on screen
                    PollOutcome::Exhausted { .. } | PollOutcome::Ignored => None,
                }
            }
        }
    }

    /// A lagged receiver may have dropped the outstanding reply
    fn reply_lost(&mut self, skipped: u64) -> Option<Duration> {
        match self.client.as_mut()?.reply_lost(skipped) {
            PollOutcome::RetryScheduled { delay, .. } => Some(delay),
            PollOutcome::Delivered { .. } | PollOutcome::Exhausted { .. } | PollOutcome::Ignored => {
                None
            }
        }
    }

    fn handle_notification(&mut self, notification: Notification) {
        match notification.kind {
            NotificationKind::CurrentWeatherData => {
                if notification.sender == self.name || !self.peer_latch.take() {
                    return;
                }
                debug!("{}: peer ready ({})", self.name, notification.sender);
                self.broadcast_reading();
            }
            NotificationKind::IndoorTemperature(_) | NotificationKind::IndoorHumidity(_) => {}
        }
    }

    fn broadcast_reading(&self) {
        let Some(reading) = &self.reading else {
            return;
        };
        for notification in reading_notifications(&self.name, reading, &self.config) {
            if !self.hub.publish(notification) {
                debug!("{}: no notification subscribers", self.name);
            }
        }
    }

    async fn refresh_display(&self) {
        let update = DisplayUpdate {
            instance_id: self.instance_id.clone(),
            name: self.name.clone(),
            font_size: self.config.font_size,
            content: DisplayContent::build(self.reading.as_ref(), &self.config),
        };
        if self.display.send(update).await.is_err() {
            debug!("{}: display output closed", self.name);
        }
    }

    fn status(&self) -> InstanceStatus {
        InstanceStatus {
            name: self.name.clone(),
            instance_id: self.instance_id.clone(),
            canonical_pin: self.canonical_pin,
            schedule: self.scheduler.state(),
            phase: self.client.as_ref().map(AcquisitionClient::phase),
            last_successful_poll: self.scheduler.last_successful_poll(),
            reading: self.reading,
        }
    }
}

/// Longest timer period; anything above effectively never fires
const MAX_TIMER_PERIOD: Duration = Duration::from_secs(86_400 * 365 * 30);

/// Repeating timer whose first tick is one full period away
fn repeating(period: Duration) -> Interval {
    let period = period.min(MAX_TIMER_PERIOD);
    let mut interval = interval_at(Instant::now() + period, period);
    interval.set_missed_tick_behavior(MissedTickBehavior::Delay);
    interval
}

async fn sleep_or_pending(sleep: &mut Option<Pin<Box<Sleep>>>) {
    match sleep {
        Some(sleep) => sleep.as_mut().await,
        None => pending().await,
    }
}

async fn tick_or_pending(interval: &mut Option<Interval>) {
    match interval {
        Some(interval) => {
            interval.tick().await;
        }
        None => pending().await,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use dht_sens_core::{AcquisitionError, ConfigValidator, LogMessage, MessageType, PollResult};
    use dht_sens_sources::RESPONSE_CHANNEL_CAPACITY;
    use serde_json::json;
    use std::collections::HashMap;
    use tokio::sync::mpsc::error::TryRecvError;

    struct Harness {
        server: ServerHandle,
        requests: mpsc::Receiver<Envelope<ClientMessage>>,
        display: mpsc::Receiver<DisplayUpdate>,
        hub: NotificationHub,
        handle: InstanceHandle,
        started: Instant,
    }

    impl Harness {
        fn start(settings: serde_json::Value) -> Self {
            let raw: HashMap<String, serde_json::Value> = serde_json::from_value(settings).unwrap();
            let config = ConfigValidator::default().validate(&raw);

            let (server, requests) = ServerHandle::channel();
            let (display_tx, display) = mpsc::channel(16);
            let hub = NotificationHub::new();
            let instance = WidgetInstance::new("indoor", config, hub.clone(), display_tx);
            let (handle, _task) = instance.spawn(server.clone());

            Self {
                server,
                requests,
                display,
                hub,
                handle,
                started: Instant::now(),
            }
        }

        async fn next_request(&mut self) -> (u64, PollRequest) {
            loop {
                match self.requests.recv().await.unwrap().message {
                    ClientMessage::GetData(request) => {
                        return (self.started.elapsed().as_secs(), request)
                    }
                    ClientMessage::Init { .. } => continue,
                }
            }
        }

        fn reply(&self, request: PollRequest, outcome: Result<SensorReading, AcquisitionError>) {
            assert!(self
                .server
                .publish(ServerMessage::reply(PollResult::new(request, outcome))));
        }
    }

    fn failure() -> Result<SensorReading, AcquisitionError> {
        Err(AcquisitionError::ExitStatus {
            code: Some(1),
            stderr: "Data not good, skip".to_string(),
        })
    }

    fn settings() -> serde_json::Value {
        json!({
            "sensor_pin": 4,
            "pin_scheme": "BCMv2",
            "update_interval": 0.5,
            "retry_delay": 10,
            "show_temperature": true,
            "icon_view": false,
        })
    }

    #[tokio::test(start_paused = true)]
    async fn test_failing_reader_retries_then_waits_for_tick() {
        let mut harness = Harness::start(settings());

        let mut seen = Vec::new();
        for _ in 0..4 {
            let (at, request) = harness.next_request().await;
            seen.push((at, request.attempt));
            harness.reply(request, failure());
        }

        assert_eq!(seen, vec![(0, 1), (10, 2), (20, 3), (30, 1)]);
    }

    #[tokio::test(start_paused = true)]
    async fn test_loading_state_survives_exhaustion() {
        let mut harness = Harness::start(settings());
        for _ in 0..3 {
            let (_, request) = harness.next_request().await;
            harness.reply(request, failure());
        }
        tokio::time::sleep(Duration::from_secs(5)).await;

        let first = harness.display.recv().await.unwrap();
        assert_eq!(first.content, DisplayContent::Loading);
        assert!(matches!(harness.display.try_recv(), Err(TryRecvError::Empty)));
    }

    #[tokio::test(start_paused = true)]
    async fn test_success_updates_display_and_notifies() {
        let mut harness = Harness::start(settings());
        let mut notifications = harness.hub.subscribe();

        let (_, request) = harness.next_request().await;
        // BCMv2 pin 4 is physical pin 7, WPI pin 7
        assert_eq!(request.canonical_pin, 7);
        harness.reply(request, Ok(SensorReading::from_celsius(21.0, 40.0)));

        assert_eq!(harness.display.recv().await.unwrap().content, DisplayContent::Loading);
        assert_eq!(
            harness.display.recv().await.unwrap().content,
            DisplayContent::Lines(vec!["21.0&deg;C".to_string()])
        );
        assert_eq!(
            notifications.recv().await.unwrap().kind,
            NotificationKind::IndoorTemperature(21.0)
        );
        assert_eq!(
            notifications.recv().await.unwrap().kind,
            NotificationKind::IndoorHumidity(40.0)
        );

        let status = harness.handle.status().await.unwrap();
        assert_eq!(status.phase, Some(ClientPhase::Idle));
        assert_eq!(status.schedule, ScheduleState::Scheduled);
        assert!(status.last_successful_poll > DateTime::<Utc>::UNIX_EPOCH);
    }

    #[tokio::test(start_paused = true)]
    async fn test_peer_ready_rebroadcasts_once() {
        let mut harness = Harness::start(settings());
        let (_, request) = harness.next_request().await;
        harness.reply(request, Ok(SensorReading::from_celsius(21.0, 40.0)));
        // Wait for the reading to be cached before subscribing
        harness.handle.status().await.unwrap();

        let mut notifications = harness.hub.subscribe();
        for _ in 0..2 {
            harness
                .hub
                .publish(Notification::new("weather", NotificationKind::CurrentWeatherData));
        }
        tokio::time::sleep(Duration::from_secs(1)).await;

        let mut rebroadcast = Vec::new();
        while let Ok(notification) = notifications.try_recv() {
            if notification.sender == "indoor" {
                rebroadcast.push(notification.kind);
            }
        }
        assert_eq!(
            rebroadcast,
            vec![
                NotificationKind::IndoorTemperature(21.0),
                NotificationKind::IndoorHumidity(40.0),
            ]
        );
    }

    #[tokio::test(start_paused = true)]
    async fn test_peer_ready_before_first_reading_consumes_latch() {
        let mut harness = Harness::start(settings());
        let (_, request) = harness.next_request().await;
        harness
            .hub
            .publish(Notification::new("weather", NotificationKind::CurrentWeatherData));
        harness.handle.status().await.unwrap();

        harness.reply(request, Ok(SensorReading::from_celsius(21.0, 40.0)));
        harness.handle.status().await.unwrap();

        let mut notifications = harness.hub.subscribe();
        harness
            .hub
            .publish(Notification::new("weather", NotificationKind::CurrentWeatherData));
        tokio::time::sleep(Duration::from_secs(1)).await;

        while let Ok(notification) = notifications.try_recv() {
            assert_eq!(notification.sender, "weather");
        }
    }

    #[tokio::test(start_paused = true)]
    async fn test_suspend_stops_polling_until_resume() {
        let mut harness = Harness::start(settings());
        let (_, request) = harness.next_request().await;
        harness.reply(request, Ok(SensorReading::from_celsius(21.0, 40.0)));
        harness.handle.status().await.unwrap();

        harness.handle.send(InstanceCommand::Suspend).await.unwrap();
        tokio::time::sleep(Duration::from_secs(300)).await;
        assert!(matches!(harness.requests.try_recv(), Err(TryRecvError::Empty)));

        // The last success is only moments old on the wall clock, so resuming
        // waits for the next tick instead of polling immediately
        harness.handle.send(InstanceCommand::Resume).await.unwrap();
        let resumed = harness.started.elapsed().as_secs();
        let (at, request) = harness.next_request().await;
        assert_eq!(at, resumed + 30);
        assert_eq!(request.attempt, 1);
    }

    #[tokio::test(start_paused = true)]
    async fn test_resume_before_first_success_polls_immediately() {
        let mut harness = Harness::start(settings());
        let (_, request) = harness.next_request().await;
        harness.reply(request, failure());
        let (_, request) = harness.next_request().await;
        harness.reply(request, failure());
        let (_, request) = harness.next_request().await;
        harness.reply(request, failure());
        harness.handle.status().await.unwrap();

        harness.handle.send(InstanceCommand::Suspend).await.unwrap();
        harness.handle.send(InstanceCommand::Resume).await.unwrap();
        let resumed = harness.started.elapsed().as_secs();
        let (at, request) = harness.next_request().await;
        assert_eq!(at, resumed);
        assert_eq!(request.attempt, 1);
    }

    #[tokio::test(start_paused = true)]
    async fn test_invalid_pin_never_polls() {
        let mut harness = Harness::start(json!({
            "sensor_pin": 1,
            "pin_scheme": "BOARD",
            "show_temperature": true,
        }));

        assert!(matches!(
            harness.requests.recv().await.unwrap().message,
            ClientMessage::Init { .. }
        ));
        tokio::time::sleep(Duration::from_secs(3600)).await;
        assert!(matches!(harness.requests.try_recv(), Err(TryRecvError::Empty)));

        let status = harness.handle.status().await.unwrap();
        assert_eq!(status.canonical_pin, None);
        assert_eq!(status.phase, None);
        assert_eq!(status.schedule, ScheduleState::Idle);
        assert_eq!(harness.display.recv().await.unwrap().content, DisplayContent::Loading);
    }

    #[tokio::test(start_paused = true)]
    async fn test_results_for_other_instances_are_discarded() {
        let mut harness = Harness::start(settings());
        let (_, request) = harness.next_request().await;

        let mut foreign = request.clone();
        foreign.instance_id = InstanceId::from("someone-else");
        harness.reply(foreign, Ok(SensorReading::from_celsius(99.0, 99.0)));
        let status = harness.handle.status().await.unwrap();
        assert_eq!(status.reading, None);
        assert_eq!(status.phase, Some(ClientPhase::Polling { attempt: 1 }));

        harness.reply(request, Ok(SensorReading::from_celsius(21.0, 40.0)));
        let status = harness.handle.status().await.unwrap();
        assert_eq!(status.reading.map(|r| r.celsius), Some(21.0));
    }

    #[tokio::test(start_paused = true)]
    async fn test_reply_dropped_by_lagging_receiver_is_retried() {
        let mut harness = Harness::start(settings());
        let (_, request) = harness.next_request().await;
        harness.reply(request, Ok(SensorReading::from_celsius(21.0, 40.0)));

        // Flood the channel before the instance runs so the reply is overwritten
        for i in 0..RESPONSE_CHANNEL_CAPACITY + 44 {
            harness.server.publish(ServerMessage::Log(LogMessage {
                instance_id: Some(InstanceId::from("someone-else")),
                message: format!("noise {}", i),
                message_type: MessageType::Dev,
            }));
        }

        let (at, request) = harness.next_request().await;
        assert_eq!((at, request.attempt), (10, 2));
        harness.reply(request, Ok(SensorReading::from_celsius(21.0, 40.0)));

        let status = harness.handle.status().await.unwrap();
        assert_eq!(status.phase, Some(ClientPhase::Idle));
        assert_eq!(status.reading.map(|r| r.celsius), Some(21.0));

        // Regular ticks continue afterwards
        let (at, request) = harness.next_request().await;
        assert_eq!((at, request.attempt), (30, 1));
    }

    #[tokio::test(start_paused = true)]
    async fn test_huge_update_interval_does_not_overflow() {
        let mut harness = Harness::start(json!({
            "sensor_pin": 4,
            "update_interval": 1e12,
            "show_temperature": true,
        }));
        let (_, request) = harness.next_request().await;
        harness.reply(request, Ok(SensorReading::from_celsius(21.0, 40.0)));
        harness.handle.status().await.unwrap();

        harness.handle.send(InstanceCommand::Suspend).await.unwrap();
        harness.handle.send(InstanceCommand::Resume).await.unwrap();
        let status = harness.handle.status().await.unwrap();
        assert_eq!(status.schedule, ScheduleState::Scheduled);
        assert_eq!(status.phase, Some(ClientPhase::Idle));

        tokio::time::sleep(Duration::from_secs(86_400)).await;
        assert!(matches!(harness.requests.try_recv(), Err(TryRecvError::Empty)));
    }

    #[tokio::test(start_paused = true)]
    async fn test_timer_period_is_clamped() {
        assert_eq!(repeating(Duration::MAX).period(), MAX_TIMER_PERIOD);
        assert_eq!(repeating(Duration::from_secs(30)).period(), Duration::from_secs(30));
    }
}
