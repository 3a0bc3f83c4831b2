//! Roundtime and vulnerability timers.
//!
//! Both timers are deadline-based: state is `{started_at, duration}` in
//! clock-seconds, and a shared once-per-second [`CombatTimers::tick`]
//! compares the deadline against the clock. A delayed tick delays the
//! notification; it never skips it.
//!
//! At most one timer of each kind exists per entity. Stopping is
//! idempotent and fires the stop notification exactly once, whether the
//! stop was programmatic or by natural expiry.

use dashmap::DashMap;
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use tracing::debug;

use duskfall_common::EntityId;

use crate::clock::GameClock;
use crate::events::{CombatEvent, EventBus, MessageSink};

/// Line sent when a roundtime lock expires.
pub const ROUNDTIME_RECOVERED: &str = "You have recovered.";

/// Line sent when a vulnerability window closes.
pub const GUARD_RECOVERED: &str = "You manage to recover your guard.";

/// A roundtime lock: blocks further attacks until it elapses.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct ActionTimer {
    started_at: f64,
    duration: f64,
}

impl ActionTimer {
    /// Creates a lock starting now for the given duration.
    #[must_use]
    pub fn new(now: f64, duration: f64) -> Self {
        Self {
            started_at: now,
            duration: duration.max(0.0),
        }
    }

    /// Returns when the lock started.
    #[must_use]
    pub const fn started_at(&self) -> f64 {
        self.started_at
    }

    /// Returns the total lock duration.
    #[must_use]
    pub const fn duration(&self) -> f64 {
        self.duration
    }

    /// Adds seconds to the lock without restarting it.
    pub fn extend(&mut self, seconds: f64) {
        self.duration += seconds.max(0.0);
    }

    /// Seconds remaining before the lock elapses.
    #[must_use]
    pub fn time_remaining(&self, now: f64) -> f64 {
        (self.started_at + self.duration - now).max(0.0)
    }

    /// Checks whether the deadline has passed.
    #[must_use]
    pub fn is_expired(&self, now: f64) -> bool {
        now >= self.started_at + self.duration
    }
}

/// A vulnerability window: temporarily weakens an entity's defense.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct VulnerabilityTimer {
    started_at: f64,
    duration: f64,
    defense_reduction: f64,
}

impl VulnerabilityTimer {
    /// Creates a window starting now.
    ///
    /// `defense_reduction` is a percentage and is clamped to 0-100.
    #[must_use]
    pub fn new(now: f64, duration: f64, defense_reduction: f64) -> Self {
        Self {
            started_at: now,
            duration: duration.max(0.0),
            defense_reduction: defense_reduction.clamp(0.0, 100.0),
        }
    }

    /// Returns the defense reduction percentage.
    #[must_use]
    pub const fn defense_reduction(&self) -> f64 {
        self.defense_reduction
    }

    /// Multiplier applied to the victim's defense while the window is
    /// open: `max(0, 1 - reduction/100)`.
    #[must_use]
    pub fn defense_modifier(&self) -> f64 {
        (1.0 - self.defense_reduction / 100.0).max(0.0)
    }

    /// Seconds remaining before the window closes.
    #[must_use]
    pub fn time_remaining(&self, now: f64) -> f64 {
        (self.started_at + self.duration - now).max(0.0)
    }

    /// Checks whether the deadline has passed.
    #[must_use]
    pub fn is_expired(&self, now: f64) -> bool {
        now >= self.started_at + self.duration
    }
}

/// Shared timer table for both timer kinds, keyed by entity.
///
/// One instance serves the whole world; the game loop calls [`tick`] once
/// per second. This replaces a scheduled object per live timer.
///
/// [`tick`]: CombatTimers::tick
pub struct CombatTimers {
    clock: GameClock,
    sink: Arc<dyn MessageSink>,
    bus: Arc<EventBus>,
    action: DashMap<EntityId, ActionTimer>,
    vulnerability: DashMap<EntityId, VulnerabilityTimer>,
}

impl CombatTimers {
    /// Creates a timer table.
    #[must_use]
    pub fn new(clock: GameClock, sink: Arc<dyn MessageSink>, bus: Arc<EventBus>) -> Self {
        Self {
            clock,
            sink,
            bus,
            action: DashMap::new(),
            vulnerability: DashMap::new(),
        }
    }

    // ------------------------------------------------------------------
    // Roundtime
    // ------------------------------------------------------------------

    /// Sets or extends an entity's roundtime lock, returning the live lock.
    ///
    /// With `extend` and a live lock, the duration grows in place.
    /// Otherwise any live lock is stopped (firing its stop notification)
    /// and a fresh one installed.
    pub fn set_action(&self, entity: EntityId, duration: f64, extend: bool) -> ActionTimer {
        if extend {
            if let Some(mut existing) = self.action.get_mut(&entity) {
                existing.extend(duration);
                let updated = *existing;
                drop(existing);
                self.bus.publish(CombatEvent::RoundtimeExtended {
                    entity,
                    added: duration,
                });
                return updated;
            }
        } else if self.action.contains_key(&entity) {
            self.stop_action(entity);
        }

        let timer = ActionTimer::new(self.clock.now(), duration);
        self.action.insert(entity, timer);
        debug!(%entity, duration, "roundtime started");
        self.bus
            .publish(CombatEvent::RoundtimeStarted { entity, duration });
        timer
    }

    /// Seconds of roundtime remaining, or `None` when the entity is free.
    #[must_use]
    pub fn action_remaining(&self, entity: EntityId) -> Option<f64> {
        let now = self.clock.now();
        self.action
            .get(&entity)
            .map(|timer| timer.time_remaining(now))
    }

    /// Returns whether the entity has a live roundtime lock.
    #[must_use]
    pub fn is_locked(&self, entity: EntityId) -> bool {
        self.action.contains_key(&entity)
    }

    /// Stops an entity's roundtime lock. Idempotent; notifies once.
    pub fn stop_action(&self, entity: EntityId) {
        if self.action.remove(&entity).is_some() {
            debug!(%entity, "roundtime stopped");
            self.bus.publish(CombatEvent::RoundtimeStopped { entity });
        }
    }

    // ------------------------------------------------------------------
    // Vulnerability
    // ------------------------------------------------------------------

    /// Opens (or replaces) a vulnerability window on an entity.
    pub fn set_vulnerability(
        &self,
        entity: EntityId,
        duration: f64,
        defense_reduction: f64,
    ) -> VulnerabilityTimer {
        if self.vulnerability.contains_key(&entity) {
            self.stop_vulnerability(entity);
        }

        let timer = VulnerabilityTimer::new(self.clock.now(), duration, defense_reduction);
        self.vulnerability.insert(entity, timer);
        debug!(%entity, duration, defense_reduction, "vulnerability opened");
        self.bus.publish(CombatEvent::VulnerabilityApplied {
            entity,
            duration,
            reduction: timer.defense_reduction(),
        });
        timer
    }

    /// The entity's current defense multiplier, if a window is open.
    ///
    /// The reduction stops applying the instant the timer is removed.
    #[must_use]
    pub fn vulnerability_modifier(&self, entity: EntityId) -> Option<f64> {
        self.vulnerability
            .get(&entity)
            .map(|timer| timer.defense_modifier())
    }

    /// Returns whether the entity has an open vulnerability window.
    #[must_use]
    pub fn is_vulnerable(&self, entity: EntityId) -> bool {
        self.vulnerability.contains_key(&entity)
    }

    /// Closes an entity's vulnerability window. Idempotent; notifies once.
    pub fn stop_vulnerability(&self, entity: EntityId) {
        if self.vulnerability.remove(&entity).is_some() {
            debug!(%entity, "vulnerability stopped");
            self.sink.send(entity, GUARD_RECOVERED);
            self.bus
                .publish(CombatEvent::VulnerabilityStopped { entity });
        }
    }

    // ------------------------------------------------------------------
    // Driving
    // ------------------------------------------------------------------

    /// Expires due timers. Called once per second by the game loop.
    pub fn tick(&self) {
        let now = self.clock.now();

        let due: Vec<EntityId> = self
            .action
            .iter()
            .filter(|entry| entry.value().is_expired(now))
            .map(|entry| *entry.key())
            .collect();
        for entity in due {
            if self
                .action
                .remove_if(&entity, |_, timer| timer.is_expired(now))
                .is_some()
            {
                debug!(%entity, "roundtime expired");
                self.sink.send(entity, ROUNDTIME_RECOVERED);
                self.bus.publish(CombatEvent::RoundtimeExpired { entity });
            }
        }

        let due: Vec<EntityId> = self
            .vulnerability
            .iter()
            .filter(|entry| entry.value().is_expired(now))
            .map(|entry| *entry.key())
            .collect();
        for entity in due {
            if self
                .vulnerability
                .remove_if(&entity, |_, timer| timer.is_expired(now))
                .is_some()
            {
                debug!(%entity, "vulnerability expired");
                self.sink.send(entity, GUARD_RECOVERED);
                self.bus
                    .publish(CombatEvent::VulnerabilityExpired { entity });
            }
        }
    }

    /// Stops every live timer, firing each stop notification.
    ///
    /// Called on server shutdown or reload so no lock state dangles
    /// across a restart.
    pub fn shutdown(&self) {
        let locked: Vec<EntityId> = self.action.iter().map(|entry| *entry.key()).collect();
        for entity in locked {
            self.stop_action(entity);
        }

        let open: Vec<EntityId> = self.vulnerability.iter().map(|entry| *entry.key()).collect();
        for entity in open {
            self.stop_vulnerability(entity);
        }
    }

    /// Stops both timers for one entity (corpse conversion, deletion).
    pub fn clear_entity(&self, entity: EntityId) {
        self.stop_action(entity);
        self.stop_vulnerability(entity);
    }
}

impl std::fmt::Debug for CombatTimers {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("CombatTimers")
            .field("action", &self.action.len())
            .field("vulnerability", &self.vulnerability.len())
            .finish()
    }
}
