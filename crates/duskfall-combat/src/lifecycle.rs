//! Entity lifecycle hand-off after death.
//!
//! The resolver does not delete anything itself. Death hands the entity to
//! a [`Lifecycle`] implementation: corpse removal scheduling for NPCs,
//! the opaque deletion/respawn path for players. [`CorpseScheduler`] is
//! the in-repo implementation that sweeps decayed corpses out of the
//! registry on its own once-per-second tick.

use parking_lot::Mutex;
use std::sync::Arc;
use tracing::{debug, info};

use duskfall_common::EntityId;

use crate::clock::GameClock;
use crate::events::{CombatEvent, EventBus, MessageSink};
use crate::registry::EntityRegistry;

/// Receives dead entities from the resolver.
pub trait Lifecycle: Send + Sync {
    /// A defeated NPC has been converted to a corpse; remove it from the
    /// world after `decay_after` seconds.
    fn on_npc_corpse(&self, entity: EntityId, decay_after: f64);

    /// A player died; hand off to the external deletion/respawn path.
    fn on_player_death(&self, entity: EntityId);
}

#[derive(Debug, Clone, Copy)]
struct PendingCorpse {
    entity: EntityId,
    remove_at: f64,
}

/// Removes decayed corpses from the registry on a once-per-second tick.
pub struct CorpseScheduler {
    clock: GameClock,
    registry: Arc<EntityRegistry>,
    sink: Arc<dyn MessageSink>,
    bus: Arc<EventBus>,
    pending: Mutex<Vec<PendingCorpse>>,
}

impl CorpseScheduler {
    /// Creates a scheduler sweeping the given registry.
    #[must_use]
    pub fn new(
        clock: GameClock,
        registry: Arc<EntityRegistry>,
        sink: Arc<dyn MessageSink>,
        bus: Arc<EventBus>,
    ) -> Self {
        Self {
            clock,
            registry,
            sink,
            bus,
            pending: Mutex::new(Vec::new()),
        }
    }

    /// Number of corpses awaiting removal.
    #[must_use]
    pub fn pending_count(&self) -> usize {
        self.pending.lock().len()
    }

    /// Removes corpses whose decay delay has elapsed. Called once per
    /// second by the game loop.
    pub fn tick(&self) {
        let now = self.clock.now();
        let due: Vec<PendingCorpse> = {
            let mut pending = self.pending.lock();
            let (due, remaining): (Vec<_>, Vec<_>) = pending
                .drain(..)
                .partition(|corpse| corpse.remove_at <= now);
            *pending = remaining;
            due
        };

        for corpse in due {
            let name = self
                .registry
                .read(corpse.entity, |entity| entity.name().to_owned());
            let Ok(name) = name else {
                // Already gone; privileged deletion beat the decay
                continue;
            };

            self.sink
                .broadcast_from(corpse.entity, &format!("{name} crumbles to dust."), &[]);
            let _ = self.registry.remove(corpse.entity);
            debug!(entity = %corpse.entity, "corpse decayed");
            self.bus.publish(CombatEvent::CorpseDecayed {
                entity: corpse.entity,
            });
        }
    }
}

impl Lifecycle for CorpseScheduler {
    fn on_npc_corpse(&self, entity: EntityId, decay_after: f64) {
        let remove_at = self.clock.now() + decay_after.max(0.0);
        self.pending.lock().push(PendingCorpse { entity, remove_at });
        debug!(%entity, decay_after, "corpse removal scheduled");
    }

    fn on_player_death(&self, entity: EntityId) {
        // Deletion/respawn lives outside the combat core
        info!(%entity, "player death handed off");
    }
}

impl std::fmt::Debug for CorpseScheduler {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("CorpseScheduler")
            .field("pending", &self.pending_count())
            .finish()
    }
}

/// A lifecycle that records hand-offs, for tests.
#[derive(Debug, Default)]
pub struct RecordingLifecycle {
    corpses: Mutex<Vec<(EntityId, f64)>>,
    player_deaths: Mutex<Vec<EntityId>>,
}

impl RecordingLifecycle {
    /// Creates an empty recording lifecycle.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Returns recorded corpse hand-offs.
    #[must_use]
    pub fn corpses(&self) -> Vec<(EntityId, f64)> {
        self.corpses.lock().clone()
    }

    /// Returns recorded player death hand-offs.
    #[must_use]
    pub fn player_deaths(&self) -> Vec<EntityId> {
        self.player_deaths.lock().clone()
    }
}

impl Lifecycle for RecordingLifecycle {
    fn on_npc_corpse(&self, entity: EntityId, decay_after: f64) {
        self.corpses.lock().push((entity, decay_after));
    }

    fn on_player_death(&self, entity: EntityId) {
        self.player_deaths.lock().push(entity);
    }
}
