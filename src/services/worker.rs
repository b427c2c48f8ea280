//! Per-door command workers.
//!
//! A relay pulse blocks for its whole duration. Every door gets a task that
//! receives commands over a channel and runs the controller on tokio's
//! blocking pool, so a pulse on one door never delays the MQTT event loop
//! or another door.
//!
//! After each command the worker publishes the declared transient state (if
//! any) as soon as the pulse is done, then a forced snapshot of every door.

use std::collections::HashMap;
use std::sync::Arc;

use tokio::sync::mpsc;
use tokio::task::JoinHandle;

use crate::config::TopicConfig;
use crate::error::CommandError;
use crate::traits::DoorHardware;
use crate::{CommandOutcome, DoorCommand};

use super::mqtt::{MqttError, OutboundMessage};
use super::shared::{DoorSnapshot, SharedGarageState};

/// Commands a door may have queued before new ones are rejected.
pub const COMMAND_QUEUE_DEPTH: usize = 8;

/// Handles to the running door workers.
///
/// Dropping this closes every command channel; each worker then finishes
/// its current command and exits.
pub struct DoorWorkers {
    senders: HashMap<String, mpsc::Sender<DoorCommand>>,
    handles: Vec<JoinHandle<()>>,
}

impl DoorWorkers {
    /// Spawn one worker per door in `state`.
    ///
    /// Must be called from within a tokio runtime.
    pub fn spawn<H>(
        state: Arc<SharedGarageState<H>>,
        topics: TopicConfig,
        tx: mpsc::Sender<OutboundMessage>,
    ) -> Self
    where
        H: DoorHardware + Send + 'static,
        H::Error: Send + 'static,
    {
        let mut senders = HashMap::new();
        let mut handles = Vec::new();

        for id in state.door_ids() {
            let (cmd_tx, cmd_rx) = mpsc::channel(COMMAND_QUEUE_DEPTH);
            senders.insert(id.to_string(), cmd_tx);
            handles.push(tokio::spawn(run_worker(
                id.to_string(),
                Arc::clone(&state),
                topics.clone(),
                cmd_rx,
                tx.clone(),
            )));
        }

        Self { senders, handles }
    }

    /// Queue a command for a door without waiting.
    pub fn dispatch(&self, door: &str, command: DoorCommand) -> Result<(), CommandError> {
        let sender = self
            .senders
            .get(door)
            .ok_or_else(|| CommandError::UnknownDoor(door.to_string()))?;
        sender
            .try_send(command)
            .map_err(|_| CommandError::DoorBusy(door.to_string()))
    }

    /// Number of running workers.
    pub fn len(&self) -> usize {
        self.handles.len()
    }

    /// True if no workers are running.
    pub fn is_empty(&self) -> bool {
        self.handles.is_empty()
    }

    /// Close all command channels and wait for in-flight commands to finish.
    pub async fn shutdown(self) {
        drop(self.senders);
        for handle in self.handles {
            let _ = handle.await;
        }
    }
}

async fn run_worker<H>(
    id: String,
    state: Arc<SharedGarageState<H>>,
    topics: TopicConfig,
    mut commands: mpsc::Receiver<DoorCommand>,
    tx: mpsc::Sender<OutboundMessage>,
) where
    H: DoorHardware + Send + 'static,
    H::Error: Send + 'static,
{
    while let Some(command) = commands.recv().await {
        let door_state = Arc::clone(&state);
        let door_id = id.clone();

        // Only this door's lock is held here, for the whole pulse
        let result =
            tokio::task::spawn_blocking(move || door_state.handle_command(&door_id, command))
                .await;

        match result {
            Ok(Some(Ok(outcome))) => {
                log_outcome(&id, command, outcome);
                if let Some(declared) = outcome.declared_state() {
                    let msg = OutboundMessage::state(&topics, &id, declared);
                    if tx.send(msg).await.is_err() {
                        break;
                    }
                }
            }
            Ok(Some(Err(err))) => {
                tracing::warn!(door = %id, %command, %err, "command failed");
            }
            Ok(None) => {
                tracing::warn!(door = %id, "worker has no matching door");
                break;
            }
            Err(err) => {
                tracing::error!(door = %id, %err, "door worker task failed");
                continue;
            }
        }

        // The snapshot may wait on doors that are mid-pulse
        match sample_and_publish(&state, &topics, &tx, SharedGarageState::snapshot_all).await {
            Ok(_) => {}
            Err(MqttError::ChannelClosed) => break,
            Err(err) => tracing::error!(door = %id, %err, "snapshot after command failed"),
        }
    }
    tracing::debug!(door = %id, "door worker stopped");
}

fn log_outcome(id: &str, command: DoorCommand, outcome: CommandOutcome) {
    match outcome {
        CommandOutcome::Unchanged => {
            tracing::debug!(door = id, %command, "door already there, no pulse");
        }
        CommandOutcome::Started(state) => {
            tracing::info!(door = id, %command, %state, "relay pulsed");
        }
        CommandOutcome::Stopped => {
            tracing::info!(door = id, %command, "relay pulsed to stop door");
        }
    }
}

/// Sample doors on the blocking pool and queue one retained state message
/// per returned entry.
///
/// The publish gate is held from sampling until the last message is queued,
/// so no other sample can be queued in between. Returns what was queued.
pub async fn sample_and_publish<H>(
    state: &Arc<SharedGarageState<H>>,
    topics: &TopicConfig,
    tx: &mpsc::Sender<OutboundMessage>,
    sample: fn(&SharedGarageState<H>) -> Vec<DoorSnapshot>,
) -> Result<Vec<DoorSnapshot>, MqttError>
where
    H: DoorHardware + Send + 'static,
    H::Error: Send + 'static,
{
    let _gate = state.publish_gate().await;

    let sampler = Arc::clone(state);
    let snapshot = tokio::task::spawn_blocking(move || sample(&sampler))
        .await
        .map_err(|e| MqttError::Task(e.to_string()))?;

    for door in &snapshot {
        tx.send(OutboundMessage::state(topics, &door.id, door.state))
            .await
            .map_err(|_| MqttError::ChannelClosed)?;
    }
    Ok(snapshot)
}
