//! MQTT bridge between the garage doors and Home Assistant.
//!
//! **Subscribe Topics:**
//! - `garage/<id>/set` - `open`, `close` or `stop` (case-insensitive)
//!
//! **Publish Topics:**
//! - `garage/<id>/state` - `open`, `closed`, `opening`, `closing`, `unknown` (retained)
//! - `homeassistant/cover/<id>/config` - discovery JSON (retained, once per connect)
//!
//! On every connect (including reconnects) the handler subscribes, publishes
//! discovery and then force-publishes every door's state. Retained messages
//! on command topics are ignored so that a stale command kept by the broker
//! cannot move a door.
//!
//! # Example
//!
//! ```ignore
//! let state = Arc::new(SharedGarageState::new(controllers));
//! let handler = GarageMqttHandler::new(state, MqttRuntimeConfig::from_config(&config));
//! handler.run(shutdown_rx).await?;
//! ```

use std::sync::Arc;
use std::time::Duration;

use rumqttc::{AsyncClient, Event, MqttOptions, Packet, QoS, SubscribeFilter};
use tokio::sync::{mpsc, watch};

use crate::config::{Config, DoorConfig, TopicConfig};
use crate::error::CommandError;
use crate::traits::DoorHardware;
use crate::{DoorCommand, DoorState};

use super::discovery::HaCoverDiscovery;
use super::poller::run_poller;
use super::shared::SharedGarageState;
use super::worker::{sample_and_publish, DoorWorkers};

/// Capacity of the outbound publish queue.
const OUTBOUND_QUEUE_DEPTH: usize = 64;

/// Upper bound for in-flight pulses and the final disconnect on shutdown.
const SHUTDOWN_GRACE: Duration = Duration::from_secs(2);

// ============================================================================
// Configuration
// ============================================================================

/// Runtime MQTT client configuration for `rumqttc`.
///
/// This struct uses `String` for runtime compatibility with the `rumqttc` library.
/// Build it from the fixed-size [`crate::config::Config`] with
/// [`MqttRuntimeConfig::from_config`].
#[derive(Debug, Clone)]
pub struct MqttRuntimeConfig {
    /// MQTT broker hostname
    pub host: String,
    /// MQTT broker port
    pub port: u16,
    /// Client ID
    pub client_id: String,
    /// Username and password, if the broker requires them
    pub credentials: Option<(String, String)>,
    /// Keep-alive interval in seconds
    pub keep_alive_secs: u16,
    /// Sensor polling interval in milliseconds
    pub poll_interval_ms: u64,
    /// Back-off after a connection error in milliseconds
    pub reconnect_delay_ms: u64,
    /// Topic layout
    pub topics: TopicConfig,
}

impl Default for MqttRuntimeConfig {
    fn default() -> Self {
        Self::from_config(&Config::default())
    }
}

impl MqttRuntimeConfig {
    /// Create a new config with the given broker address
    pub fn new(host: impl Into<String>, port: u16) -> Self {
        Self {
            host: host.into(),
            port,
            ..Default::default()
        }
    }

    /// Create from the shared config
    pub fn from_config(config: &Config) -> Self {
        let mqtt = &config.mqtt;
        Self {
            host: mqtt.host.as_str().to_string(),
            port: mqtt.port,
            client_id: mqtt.client_id.as_str().to_string(),
            credentials: mqtt.has_auth().then(|| {
                (
                    mqtt.username.as_str().to_string(),
                    mqtt.password.as_str().to_string(),
                )
            }),
            keep_alive_secs: mqtt.keep_alive_secs,
            poll_interval_ms: u64::from(mqtt.poll_interval_ms),
            reconnect_delay_ms: u64::from(mqtt.reconnect_delay_ms),
            topics: config.topics.clone(),
        }
    }

    /// Set the client ID
    pub fn client_id(mut self, id: impl Into<String>) -> Self {
        self.client_id = id.into();
        self
    }

    /// Set the polling interval
    pub fn poll_interval_ms(mut self, ms: u64) -> Self {
        self.poll_interval_ms = ms;
        self
    }

    /// Set the topic layout
    pub fn topics(mut self, topics: TopicConfig) -> Self {
        self.topics = topics;
        self
    }

    fn options(&self) -> MqttOptions {
        let mut options = MqttOptions::new(&self.client_id, &self.host, self.port);
        options.set_keep_alive(Duration::from_secs(u64::from(self.keep_alive_secs)));
        if let Some((username, password)) = &self.credentials {
            options.set_credentials(username, password);
        }
        options
    }
}

// ============================================================================
// Messages
// ============================================================================

/// A message queued for the publisher task.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct OutboundMessage {
    /// Destination topic
    pub topic: String,
    /// UTF-8 payload
    pub payload: String,
    /// Broker should retain the message
    pub retain: bool,
}

impl OutboundMessage {
    /// Retained state message for one door.
    pub fn state(topics: &TopicConfig, door: &str, state: DoorState) -> Self {
        Self {
            topic: topics.state_topic(door).as_str().to_string(),
            payload: state.as_str().to_string(),
            retain: true,
        }
    }

    /// Retained discovery message for one door.
    pub fn discovery(topics: &TopicConfig, door: &DoorConfig) -> Result<Self, MqttError> {
        Ok(Self {
            topic: topics.discovery_topic(door.id.as_str()).as_str().to_string(),
            payload: HaCoverDiscovery::new(door, topics).to_json()?,
            retain: true,
        })
    }
}

/// What to do with an inbound publish.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Inbound<'a> {
    /// Retained on the broker; never acted upon.
    RetainedEcho,
    /// A command for one door.
    Command {
        /// Door id from the topic
        door: &'a str,
        /// Parsed command
        command: DoorCommand,
    },
}

/// Classify an inbound publish.
///
/// Retained messages are rejected before the topic or payload is looked at.
pub fn parse_inbound<'a>(
    topics: &TopicConfig,
    topic: &'a str,
    payload: &[u8],
    retain: bool,
) -> Result<Inbound<'a>, CommandError> {
    if retain {
        return Ok(Inbound::RetainedEcho);
    }
    let door = topics
        .parse_command_topic(topic)
        .ok_or_else(|| CommandError::UnknownTopic(topic.to_string()))?;
    let command = DoorCommand::from_payload(payload).ok_or_else(|| {
        CommandError::InvalidPayload(String::from_utf8_lossy(payload).into_owned())
    })?;
    Ok(Inbound::Command { door, command })
}

/// Publish discovery for every door, then every door's current state.
///
/// Sensors are sampled on the blocking pool since a door may be mid-pulse.
/// The state snapshot becomes the change-detection baseline.
pub async fn announce<H>(
    state: Arc<SharedGarageState<H>>,
    topics: TopicConfig,
    tx: mpsc::Sender<OutboundMessage>,
) -> Result<(), MqttError>
where
    H: DoorHardware + Send + 'static,
    H::Error: Send + 'static,
{
    for door in state.door_configs() {
        let msg = OutboundMessage::discovery(&topics, door)?;
        tx.send(msg).await.map_err(|_| MqttError::ChannelClosed)?;
    }

    sample_and_publish(&state, &topics, &tx, SharedGarageState::snapshot_all).await?;
    Ok(())
}

// ============================================================================
// MQTT Handler
// ============================================================================

/// MQTT handler that bridges the broker to the door controllers.
pub struct GarageMqttHandler<H: DoorHardware> {
    state: Arc<SharedGarageState<H>>,
    config: MqttRuntimeConfig,
}

impl<H> GarageMqttHandler<H>
where
    H: DoorHardware + Send + 'static,
    H::Error: Send + 'static,
{
    /// Create a handler over shared door state.
    pub fn new(state: Arc<SharedGarageState<H>>, config: MqttRuntimeConfig) -> Self {
        Self { state, config }
    }

    /// Get a reference to the shared state.
    pub fn state(&self) -> Arc<SharedGarageState<H>> {
        Arc::clone(&self.state)
    }

    /// The runtime configuration.
    pub fn config(&self) -> &MqttRuntimeConfig {
        &self.config
    }

    /// Command topic filters for every door.
    pub fn subscriptions(&self) -> Vec<SubscribeFilter> {
        self.state
            .door_ids()
            .map(|id| {
                SubscribeFilter::new(
                    self.config.topics.command_topic(id).as_str().to_string(),
                    QoS::AtLeastOnce,
                )
            })
            .collect()
    }

    /// Subscribe to every command topic and announce the doors.
    ///
    /// Runs on every ConnAck. The announcement is spawned so the event loop
    /// keeps draining the client queue while it is sent.
    fn on_connected(
        &self,
        client: &AsyncClient,
        tx: &mpsc::Sender<OutboundMessage>,
    ) -> Result<(), MqttError> {
        client.try_subscribe_many(self.subscriptions())?;
        let announcer = announce(Arc::clone(&self.state), self.config.topics.clone(), tx.clone());
        tokio::spawn(async move {
            if let Err(err) = announcer.await {
                tracing::warn!(%err, "failed to announce doors");
            }
        });
        Ok(())
    }

    /// Route one inbound publish to its door worker.
    ///
    /// Retained messages are dropped. Errors are returned for logging; they
    /// never reach a door.
    pub fn handle_message(
        &self,
        topic: &str,
        payload: &[u8],
        retain: bool,
        workers: &DoorWorkers,
    ) -> Result<(), CommandError> {
        match parse_inbound(&self.config.topics, topic, payload, retain)? {
            Inbound::RetainedEcho => {
                tracing::debug!(topic, "ignoring retained command");
                Ok(())
            }
            Inbound::Command { door, command } => {
                tracing::info!(door, %command, "command received");
                workers.dispatch(door, command)
            }
        }
    }

    /// Run the MQTT handler.
    ///
    /// Connection errors are logged and retried after the configured delay.
    /// Returns when `shutdown` flips to `true` or its sender is dropped.
    pub async fn run(self, mut shutdown: watch::Receiver<bool>) -> Result<(), MqttError> {
        let (client, mut eventloop) = AsyncClient::new(self.config.options(), 10);
        let (tx, rx) = mpsc::channel::<OutboundMessage>(OUTBOUND_QUEUE_DEPTH);

        let publisher = tokio::spawn(run_publisher(client.clone(), rx));
        let workers =
            DoorWorkers::spawn(Arc::clone(&self.state), self.config.topics.clone(), tx.clone());
        let poller = tokio::spawn(run_poller(
            Arc::clone(&self.state),
            self.config.topics.clone(),
            Duration::from_millis(self.config.poll_interval_ms),
            tx.clone(),
            shutdown.clone(),
        ));

        tracing::info!(
            host = %self.config.host,
            port = self.config.port,
            client_id = %self.config.client_id,
            doors = self.state.len(),
            "MQTT handler starting"
        );

        loop {
            tokio::select! {
                changed = shutdown.changed() => {
                    if changed.is_err() || *shutdown.borrow() {
                        break;
                    }
                }
                event = eventloop.poll() => {
                    match event {
                        Ok(Event::Incoming(Packet::ConnAck(ack))) => {
                            tracing::info!(code = ?ack.code, "MQTT connected");
                            if let Err(err) = self.on_connected(&client, &tx) {
                                tracing::warn!(%err, "failed to subscribe");
                            }
                        }
                        Ok(Event::Incoming(Packet::Publish(publish))) => {
                            if let Err(err) = self.handle_message(
                                &publish.topic,
                                &publish.payload,
                                publish.retain,
                                &workers,
                            ) {
                                tracing::warn!(topic = %publish.topic, %err, "command rejected");
                            }
                        }
                        Ok(_) => {}
                        Err(err) => {
                            tracing::warn!(%err, "MQTT connection error");
                            let delay = Duration::from_millis(self.config.reconnect_delay_ms);
                            if back_off(delay, &mut shutdown).await {
                                break;
                            }
                        }
                    }
                }
            }
        }

        tracing::info!("MQTT handler shutting down");
        poller.abort();
        if tokio::time::timeout(SHUTDOWN_GRACE, workers.shutdown()).await.is_err() {
            tracing::warn!("door workers did not stop in time");
        }
        drop(tx);
        let _ = client.try_disconnect();
        // Flush the disconnect before the event loop is dropped
        let _ = tokio::time::timeout(SHUTDOWN_GRACE, eventloop.poll()).await;
        publisher.abort();
        Ok(())
    }
}

/// Wait out a reconnect delay. Returns true if shutdown was requested
/// meanwhile.
async fn back_off(delay: Duration, shutdown: &mut watch::Receiver<bool>) -> bool {
    if *shutdown.borrow() {
        return true;
    }
    tokio::select! {
        _ = tokio::time::sleep(delay) => false,
        changed = shutdown.changed() => changed.is_err() || *shutdown.borrow(),
    }
}

async fn run_publisher(client: AsyncClient, mut rx: mpsc::Receiver<OutboundMessage>) {
    while let Some(msg) = rx.recv().await {
        tracing::debug!(topic = %msg.topic, payload = %msg.payload, "publishing");
        if let Err(err) = client
            .publish(msg.topic, QoS::AtLeastOnce, msg.retain, msg.payload.into_bytes())
            .await
        {
            tracing::warn!(%err, "MQTT publish failed");
        }
    }
}

// ============================================================================
// Errors
// ============================================================================

/// MQTT-related errors
#[derive(Debug, thiserror::Error)]
pub enum MqttError {
    /// The client request queue rejected a request
    #[error("MQTT client error: {0}")]
    Client(#[from] rumqttc::ClientError),
    /// A discovery payload could not be serialized
    #[error("MQTT discovery encoding error: {0}")]
    Encode(#[from] serde_json::Error),
    /// The publisher task is gone
    #[error("MQTT publish queue closed")]
    ChannelClosed,
    /// A background task panicked or was cancelled
    #[error("MQTT background task failed: {0}")]
    Task(String),
}
