//! Periodic sensor polling.
//!
//! Every tick samples all doors and publishes only the doors whose state
//! changed since the last publish. The loop stops when the shutdown watch
//! flips to `true` or its sender is dropped.

use std::sync::Arc;
use std::time::Duration;

use tokio::sync::{mpsc, watch};
use tokio::time::MissedTickBehavior;

use crate::config::TopicConfig;
use crate::traits::DoorHardware;

use super::mqtt::{MqttError, OutboundMessage};
use super::shared::SharedGarageState;
use super::worker::sample_and_publish;

/// Sample all doors once and queue the changed ones.
///
/// Returns the number of doors queued for publishing, or `None` once the
/// publisher is gone.
pub async fn publish_changes<H>(
    state: &Arc<SharedGarageState<H>>,
    topics: &TopicConfig,
    tx: &mpsc::Sender<OutboundMessage>,
) -> Option<usize>
where
    H: DoorHardware + Send + 'static,
    H::Error: Send + 'static,
{
    let changes =
        match sample_and_publish(state, topics, tx, SharedGarageState::check_changes).await {
            Ok(changes) => changes,
            Err(MqttError::ChannelClosed) => return None,
            Err(err) => {
                tracing::error!(%err, "sensor sampling failed");
                return Some(0);
            }
        };

    for change in &changes {
        tracing::info!(door = %change.id, state = %change.state, "door state changed");
    }
    Some(changes.len())
}

/// Run the poller until shutdown.
///
/// The first sample is taken one full interval after start; the forced
/// publish on connect covers the initial state.
pub async fn run_poller<H>(
    state: Arc<SharedGarageState<H>>,
    topics: TopicConfig,
    interval: Duration,
    tx: mpsc::Sender<OutboundMessage>,
    mut shutdown: watch::Receiver<bool>,
) where
    H: DoorHardware + Send + 'static,
    H::Error: Send + 'static,
{
    let start = tokio::time::Instant::now() + interval;
    let mut ticker = tokio::time::interval_at(start, interval);
    ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);

    tracing::debug!(interval_ms = interval.as_millis() as u64, "poller started");

    loop {
        tokio::select! {
            changed = shutdown.changed() => {
                if changed.is_err() || *shutdown.borrow() {
                    break;
                }
            }
            _ = ticker.tick() => {
                if publish_changes(&state, &topics, &tx).await.is_none() {
                    break;
                }
            }
        }
    }

    tracing::debug!("poller stopped");
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::hal::MockDoorHardware;
    use crate::{DoorConfig, DoorController};

    fn garage() -> Arc<SharedGarageState<MockDoorHardware>> {
        Arc::new(SharedGarageState::new([
            DoorController::new(
                DoorConfig::new("tor_mitte", "Tor Mitte", 16, 27, 22),
                MockDoorHardware::closed(),
            ),
            DoorController::new(
                DoorConfig::new("tor_rechts", "Tor Rechts", 26, 24, 23),
                MockDoorHardware::open(),
            ),
        ]))
    }

    #[tokio::test]
    async fn test_publish_changes_only_changed() {
        let state = garage();
        let topics = TopicConfig::default();
        let (tx, mut rx) = mpsc::channel(8);

        state.snapshot_all();
        assert_eq!(publish_changes(&state, &topics, &tx).await, Some(0));

        state.with_door("tor_mitte", |d| d.hardware_mut().set_limits(false, false));
        assert_eq!(publish_changes(&state, &topics, &tx).await, Some(1));

        let msg = rx.recv().await.unwrap();
        assert_eq!(msg.topic, "garage/tor_mitte/state");
        assert_eq!(msg.payload, "opening");
        assert!(rx.try_recv().is_err());
    }

    #[tokio::test]
    async fn test_publish_changes_without_publisher() {
        let state = garage();
        let (tx, rx) = mpsc::channel(8);
        drop(rx);
        assert_eq!(publish_changes(&state, &TopicConfig::default(), &tx).await, None);
    }

    #[tokio::test(start_paused = true)]
    async fn test_poller_ticks_and_stops() {
        let state = garage();
        let (tx, mut rx) = mpsc::channel(8);
        let (shutdown_tx, shutdown_rx) = watch::channel(false);

        let poller = tokio::spawn(run_poller(
            Arc::clone(&state),
            TopicConfig::default(),
            Duration::from_secs(5),
            tx,
            shutdown_rx,
        ));

        // First tick publishes both doors (no baseline yet)
        let first = rx.recv().await.unwrap();
        assert_eq!(first.payload, "closed");
        let second = rx.recv().await.unwrap();
        assert_eq!(second.payload, "open");

        // Door starts closing; the next tick reports it once
        state.with_door("tor_rechts", |d| d.hardware_mut().set_limits(false, false));
        let change = rx.recv().await.unwrap();
        assert_eq!(change.topic, "garage/tor_rechts/state");
        assert_eq!(change.payload, "closing");

        shutdown_tx.send(true).unwrap();
        poller.await.unwrap();
        assert!(rx.recv().await.is_none());
    }

    #[tokio::test(start_paused = true)]
    async fn test_poller_silent_when_nothing_changes() {
        let state = garage();
        state.snapshot_all();
        let (tx, mut rx) = mpsc::channel(8);
        let (shutdown_tx, shutdown_rx) = watch::channel(false);

        let poller = tokio::spawn(run_poller(
            Arc::clone(&state),
            TopicConfig::default(),
            Duration::from_secs(5),
            tx,
            shutdown_rx,
        ));

        tokio::time::sleep(Duration::from_secs(60)).await;
        drop(shutdown_tx);
        poller.await.unwrap();
        assert!(rx.recv().await.is_none());
    }
}
