//! Shared state for all garage services.
//!
//! `SharedGarageState` owns every door's [`DoorController`] and is shared
//! between the MQTT event loop, the per-door command workers and the
//! periodic poller.
//!
//! Each door sits behind its own mutex: inference and command handling for
//! one door never interleave, while different doors never wait on each
//! other.
//!
//! Publishers additionally hold the async publish gate from sampling until
//! the samples are queued, so samples reach the broker in the order they
//! were taken.
//!
//! # Example
//!
//! ```
//! use std::sync::Arc;
//! use garage_cover::{DoorConfig, DoorController, DoorState, hal::MockDoorHardware};
//! use garage_cover::services::SharedGarageState;
//!
//! let door = DoorController::new(
//!     DoorConfig::new("tor_mitte", "Tor Mitte", 16, 27, 22),
//!     MockDoorHardware::closed(),
//! );
//! let state = Arc::new(SharedGarageState::new([door]));
//!
//! // Forced snapshot on connect
//! let snapshot = state.snapshot_all();
//! assert_eq!(snapshot[0].state, DoorState::Closed);
//!
//! // Nothing changed since
//! assert!(state.check_changes().is_empty());
//! ```

use std::sync::{Mutex, MutexGuard, PoisonError};

use crate::config::DoorConfig;
use crate::traits::DoorHardware;
use crate::{CommandOutcome, DoorCommand, DoorController, DoorError, DoorState};

// ============================================================================
// Snapshot
// ============================================================================

/// One door's state, ready to publish.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct DoorSnapshot {
    /// Door id
    pub id: String,
    /// Inferred state
    pub state: DoorState,
}

impl DoorSnapshot {
    /// Create a snapshot
    pub fn new(id: impl Into<String>, state: DoorState) -> Self {
        Self {
            id: id.into(),
            state,
        }
    }
}

// ============================================================================
// Door Slot
// ============================================================================

struct DoorSlot<H: DoorHardware> {
    config: DoorConfig,
    controller: Mutex<DoorController<H>>,
    /// Last state handed to the publisher (change detection)
    last_published: Mutex<Option<DoorState>>,
}

fn lock<T>(mutex: &Mutex<T>) -> MutexGuard<'_, T> {
    // Controller fields are updated by single assignments, so a poisoned
    // lock still guards consistent state.
    mutex.lock().unwrap_or_else(PoisonError::into_inner)
}

// ============================================================================
// Shared Garage State
// ============================================================================

/// Per-door locked controllers plus change detection for publishing.
pub struct SharedGarageState<H: DoorHardware> {
    doors: Vec<DoorSlot<H>>,
    publish_gate: tokio::sync::Mutex<()>,
}

impl<H: DoorHardware> SharedGarageState<H> {
    /// Wrap a set of controllers. Publish order follows iteration order.
    pub fn new(controllers: impl IntoIterator<Item = DoorController<H>>) -> Self {
        let doors = controllers
            .into_iter()
            .map(|controller| DoorSlot {
                config: controller.config().clone(),
                controller: Mutex::new(controller),
                last_published: Mutex::new(None),
            })
            .collect();
        Self {
            doors,
            publish_gate: tokio::sync::Mutex::new(()),
        }
    }

    fn slot(&self, id: &str) -> Option<&DoorSlot<H>> {
        self.doors.iter().find(|slot| slot.config.id.as_str() == id)
    }

    /// Number of doors.
    pub fn len(&self) -> usize {
        self.doors.len()
    }

    /// True if no doors are configured.
    pub fn is_empty(&self) -> bool {
        self.doors.is_empty()
    }

    /// True if a door with this id exists.
    pub fn contains(&self, id: &str) -> bool {
        self.slot(id).is_some()
    }

    /// Door ids in publish order.
    pub fn door_ids(&self) -> impl Iterator<Item = &str> {
        self.doors.iter().map(|slot| slot.config.id.as_str())
    }

    /// Door configurations in publish order.
    pub fn door_configs(&self) -> impl Iterator<Item = &DoorConfig> {
        self.doors.iter().map(|slot| &slot.config)
    }

    /// Wait for exclusive use of the outbound state queue.
    ///
    /// Hold the guard from sampling until every sample is queued.
    pub async fn publish_gate(&self) -> tokio::sync::MutexGuard<'_, ()> {
        self.publish_gate.lock().await
    }

    /// Access one door's controller under its lock.
    ///
    /// Returns `None` for an unknown id. The closure pattern prevents
    /// holding the lock across await points.
    pub fn with_door<R, F>(&self, id: &str, f: F) -> Option<R>
    where
        F: FnOnce(&mut DoorController<H>) -> R,
    {
        let slot = self.slot(id)?;
        let mut guard = lock(&slot.controller);
        Some(f(&mut guard))
    }

    /// Run a command on one door. Blocks for the relay pulse.
    pub fn handle_command(
        &self,
        id: &str,
        command: DoorCommand,
    ) -> Option<Result<CommandOutcome, DoorError<H::Error>>> {
        self.with_door(id, |door| door.handle_command(command))
    }

    /// Sample one door.
    pub fn infer_state(&self, id: &str) -> Option<Result<DoorState, DoorError<H::Error>>> {
        self.with_door(id, |door| door.infer_state())
    }

    /// Sample every door and return all states, changed or not.
    ///
    /// Used for the forced publish after connect and after a command. The
    /// returned states become the change-detection baseline. Doors whose
    /// hardware fails are logged and left out.
    pub fn snapshot_all(&self) -> Vec<DoorSnapshot> {
        self.sample(|_, _| true)
    }

    /// Sample every door and return only those whose state differs from
    /// the last published one.
    pub fn check_changes(&self) -> Vec<DoorSnapshot> {
        self.sample(|last, state| last != Some(state))
    }

    fn sample<F>(&self, mut include: F) -> Vec<DoorSnapshot>
    where
        F: FnMut(Option<DoorState>, DoorState) -> bool,
    {
        let mut out = Vec::new();
        for slot in &self.doors {
            let id = slot.config.id.as_str();
            let state = match lock(&slot.controller).infer_state() {
                Ok(state) => state,
                Err(err) => {
                    tracing::warn!(door = id, %err, "failed to read door sensors");
                    continue;
                }
            };
            let mut last = lock(&slot.last_published);
            if include(*last, state) {
                *last = Some(state);
                out.push(DoorSnapshot::new(id, state));
            }
        }
        out
    }

    /// Last state handed to the publisher, if any.
    pub fn last_published(&self, id: &str) -> Option<DoorState> {
        self.slot(id).and_then(|slot| *lock(&slot.last_published))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::hal::MockDoorHardware;
    use std::sync::Arc;

    fn two_doors() -> SharedGarageState<MockDoorHardware> {
        SharedGarageState::new([
            DoorController::new(
                DoorConfig::new("tor_mitte", "Tor Mitte", 16, 27, 22),
                MockDoorHardware::closed(),
            ),
            DoorController::new(
                DoorConfig::new("tor_rechts", "Tor Rechts", 26, 24, 23),
                MockDoorHardware::open(),
            ),
        ])
    }

    // ========================================================================
    // Lookup
    // ========================================================================

    #[test]
    fn test_door_ids_in_order() {
        let state = two_doors();
        assert_eq!(state.len(), 2);
        assert!(!state.is_empty());
        assert_eq!(state.door_ids().collect::<Vec<_>>(), ["tor_mitte", "tor_rechts"]);
        assert!(state.contains("tor_rechts"));
        assert!(!state.contains("tor_links"));
    }

    #[test]
    fn test_with_door_unknown_id() {
        let state = two_doors();
        assert!(state.with_door("nope", |_| ()).is_none());
        assert!(state.handle_command("nope", DoorCommand::Open).is_none());
    }

    #[test]
    fn test_handle_command_routes_to_door() {
        let state = two_doors();
        let outcome = state.handle_command("tor_mitte", DoorCommand::Open).unwrap();
        assert_eq!(outcome.unwrap(), CommandOutcome::Started(DoorState::Opening));
        assert_eq!(state.with_door("tor_mitte", |d| d.hardware().pulse_count), Some(1));
        assert_eq!(state.with_door("tor_rechts", |d| d.hardware().pulse_count), Some(0));
    }

    // ========================================================================
    // Change detection
    // ========================================================================

    #[test]
    fn test_snapshot_all_reports_every_door() {
        let state = two_doors();
        assert_eq!(
            state.snapshot_all(),
            vec![
                DoorSnapshot::new("tor_mitte", DoorState::Closed),
                DoorSnapshot::new("tor_rechts", DoorState::Open),
            ]
        );
        // Forced again even though nothing changed
        assert_eq!(state.snapshot_all().len(), 2);
    }

    #[test]
    fn test_first_check_changes_reports_everything() {
        let state = two_doors();
        assert_eq!(state.check_changes().len(), 2);
        assert!(state.check_changes().is_empty());
    }

    #[test]
    fn test_check_changes_only_changed_doors() {
        let state = two_doors();
        state.snapshot_all();

        state.with_door("tor_rechts", |d| d.hardware_mut().set_limits(false, false));
        assert_eq!(
            state.check_changes(),
            vec![DoorSnapshot::new("tor_rechts", DoorState::Closing)]
        );
        assert!(state.check_changes().is_empty());
        assert_eq!(state.last_published("tor_rechts"), Some(DoorState::Closing));
    }

    #[test]
    fn test_failing_door_is_skipped() {
        let state = two_doors();
        state.with_door("tor_mitte", |d| d.hardware_mut().fail = true);
        assert_eq!(
            state.snapshot_all(),
            vec![DoorSnapshot::new("tor_rechts", DoorState::Open)]
        );
        assert_eq!(state.last_published("tor_mitte"), None);
        assert!(state.infer_state("tor_mitte").unwrap().is_err());
    }

    #[test]
    fn test_concurrent_access_across_doors() {
        use std::thread;

        let state = Arc::new(two_doors());
        let handles: Vec<_> = ["tor_mitte", "tor_rechts"]
            .into_iter()
            .map(|id| {
                let state = Arc::clone(&state);
                thread::spawn(move || {
                    for _ in 0..10 {
                        let _ = state.infer_state(id);
                        let _ = state.check_changes();
                    }
                })
            })
            .collect();
        for handle in handles {
            handle.join().unwrap();
        }
        assert_eq!(state.with_door("tor_mitte", |d| d.last_confirmed()), Some(DoorState::Closed));
    }
}
