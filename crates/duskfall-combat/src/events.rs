//! Event bus and messaging seams for the combat core.
//!
//! The combat core never talks to sessions or sockets directly. Text meant
//! for players goes through the [`MessageSink`] trait; semantic events for
//! whatever owns the game loop go through the [`EventBus`].

use crossbeam_channel::{bounded, Receiver, Sender};
use parking_lot::Mutex;
use serde::{Deserialize, Serialize};

use duskfall_common::EntityId;

/// Event types emitted by the combat core.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub enum CombatEvent {
    /// An attack was fully resolved.
    AttackResolved {
        /// Attacking entity
        attacker: EntityId,
        /// Defending entity
        defender: EntityId,
        /// Whether the attack landed
        hit: bool,
        /// Whether the hit only landed through a power advantage
        power_assisted: bool,
        /// Damage dealt (0 on a miss)
        damage: i32,
    },
    /// Entity took damage.
    EntityDamaged {
        /// Entity that was damaged
        entity: EntityId,
        /// Damage actually applied after clamping
        damage: i32,
        /// Source entity (if any)
        source: Option<EntityId>,
    },
    /// Entity died in combat.
    EntityDied {
        /// Entity that died
        entity: EntityId,
        /// Entity that landed the killing blow
        killer: EntityId,
    },
    /// Experience was awarded for a kill.
    ExperienceAwarded {
        /// Entity receiving the experience
        entity: EntityId,
        /// Amount awarded
        amount: i32,
    },
    /// A roundtime lock started.
    RoundtimeStarted {
        /// Locked entity
        entity: EntityId,
        /// Lock duration in seconds
        duration: f64,
    },
    /// An existing roundtime lock was extended.
    RoundtimeExtended {
        /// Locked entity
        entity: EntityId,
        /// Seconds added to the lock
        added: f64,
    },
    /// A roundtime lock expired naturally.
    RoundtimeExpired {
        /// Entity released from the lock
        entity: EntityId,
    },
    /// A roundtime lock was stopped programmatically.
    RoundtimeStopped {
        /// Entity released from the lock
        entity: EntityId,
    },
    /// A vulnerability window opened.
    VulnerabilityApplied {
        /// Exposed entity
        entity: EntityId,
        /// Window duration in seconds
        duration: f64,
        /// Defense reduction percentage (0-50)
        reduction: f64,
    },
    /// A vulnerability window expired naturally.
    VulnerabilityExpired {
        /// Entity whose guard recovered
        entity: EntityId,
    },
    /// A vulnerability window was stopped programmatically.
    VulnerabilityStopped {
        /// Entity whose guard recovered
        entity: EntityId,
    },
    /// A defeated NPC was converted into a corpse.
    CorpseCreated {
        /// The corpse entity
        entity: EntityId,
    },
    /// A corpse decayed and was removed from the world.
    CorpseDecayed {
        /// The removed entity
        entity: EntityId,
    },
}

/// Event bus for broadcasting combat events to the game loop.
#[derive(Debug)]
pub struct EventBus {
    /// Sender for publishing events
    sender: Sender<CombatEvent>,
    /// Receiver for collecting events
    receiver: Receiver<CombatEvent>,
    /// Channel capacity
    capacity: usize,
}

impl Default for EventBus {
    fn default() -> Self {
        Self::new(1024)
    }
}

impl EventBus {
    /// Creates a new event bus with the given capacity.
    #[must_use]
    pub fn new(capacity: usize) -> Self {
        let (sender, receiver) = bounded(capacity);
        Self {
            sender,
            receiver,
            capacity,
        }
    }

    /// Publishes an event to the bus.
    pub fn publish(&self, event: CombatEvent) {
        // Non-blocking send - if full, event is dropped
        let _ = self.sender.try_send(event);
    }

    /// Drains all pending events.
    pub fn drain(&self) -> Vec<CombatEvent> {
        let mut events = Vec::new();
        while let Ok(event) = self.receiver.try_recv() {
            events.push(event);
        }
        events
    }

    /// Returns the number of pending events.
    #[must_use]
    pub fn pending_count(&self) -> usize {
        self.receiver.len()
    }

    /// Returns the channel capacity.
    #[must_use]
    pub const fn capacity(&self) -> usize {
        self.capacity
    }

    /// Creates a new sender handle for publishing events.
    #[must_use]
    pub fn sender(&self) -> Sender<CombatEvent> {
        self.sender.clone()
    }
}

/// Outbound text messaging seam.
///
/// `send` delivers one line to one entity; `broadcast_from` delivers one
/// line to every entity colocated with `origin`, skipping the ids in
/// `exclude` (which already received a personalized line).
pub trait MessageSink: Send + Sync {
    /// Sends a line of text to a specific entity.
    fn send(&self, entity: EntityId, text: &str);

    /// Broadcasts a line of text to everyone colocated with `origin`.
    fn broadcast_from(&self, origin: EntityId, text: &str, exclude: &[EntityId]);
}

/// A sink that discards everything.
#[derive(Debug, Default, Clone, Copy)]
pub struct NullSink;

impl MessageSink for NullSink {
    fn send(&self, _entity: EntityId, _text: &str) {}

    fn broadcast_from(&self, _origin: EntityId, _text: &str, _exclude: &[EntityId]) {}
}

/// A sink that records everything, for tests and simulations.
#[derive(Debug, Default)]
pub struct RecordingSink {
    sent: Mutex<Vec<(EntityId, String)>>,
    broadcasts: Mutex<Vec<(EntityId, String)>>,
}

impl RecordingSink {
    /// Creates an empty recording sink.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Returns every directed message recorded so far.
    #[must_use]
    pub fn sent(&self) -> Vec<(EntityId, String)> {
        self.sent.lock().clone()
    }

    /// Returns the messages sent to a specific entity.
    #[must_use]
    pub fn sent_to(&self, entity: EntityId) -> Vec<String> {
        self.sent
            .lock()
            .iter()
            .filter(|(id, _)| *id == entity)
            .map(|(_, text)| text.clone())
            .collect()
    }

    /// Returns every broadcast recorded so far, keyed by origin.
    #[must_use]
    pub fn broadcasts(&self) -> Vec<(EntityId, String)> {
        self.broadcasts.lock().clone()
    }

    /// Clears all recorded messages.
    pub fn clear(&self) {
        self.sent.lock().clear();
        self.broadcasts.lock().clear();
    }
}

impl MessageSink for RecordingSink {
    fn send(&self, entity: EntityId, text: &str) {
        self.sent.lock().push((entity, text.to_owned()));
    }

    fn broadcast_from(&self, origin: EntityId, text: &str, _exclude: &[EntityId]) {
        self.broadcasts.lock().push((origin, text.to_owned()));
    }
}
