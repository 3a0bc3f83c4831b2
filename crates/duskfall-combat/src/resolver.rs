//! Combat resolution.
//!
//! [`CombatResolver::process_attack`] orchestrates one attack end-to-end:
//! roundtime gate, derived ratings, opposed rolls, the power check,
//! damage and death handling, and the vulnerability roll on plain misses.
//!
//! Attacks for the same attacker are serialized through a per-entity
//! mutex; attacks between different pairs resolve concurrently. The
//! resolver never holds two entity guards at once: it snapshots what it
//! needs from one combatant before touching the other.

use dashmap::DashMap;
use parking_lot::Mutex;
use std::sync::Arc;
use thiserror::Error;
use tracing::{debug, info};

use duskfall_common::EntityId;

use crate::combatant::{Combatant, Entity, StatView};
use crate::effects::StatEffectEngine;
use crate::events::{CombatEvent, EventBus, MessageSink};
use crate::hit::{
    apply_defense_modifier, resolve_attack, vulnerability_chance, vulnerability_duration,
    vulnerability_reduction, AttackRolls, HitOutcome, MissKind,
};
use crate::lifecycle::Lifecycle;
use crate::registry::{EntityRegistry, RegistryError};
use crate::timers::{ActionTimer, CombatTimers};

/// Roundtime charged for every attack attempt, in seconds.
pub const ROUNDTIME_SECS: f64 = 5.0;

/// Delay before a corpse is removed from the world, in seconds.
pub const CORPSE_DECAY_SECS: f64 = 60.0;

/// Combat error types.
#[derive(Debug, Clone, Error)]
pub enum CombatError {
    /// Combatant not found
    #[error("combatant not found: {0}")]
    NotFound(EntityId),
    /// Entity cannot fight or be fought (e.g. a corpse)
    #[error("entity cannot take part in combat: {0}")]
    NotCombatReady(EntityId),
}

impl From<RegistryError> for CombatError {
    fn from(error: RegistryError) -> Self {
        match error {
            RegistryError::NotFound(id) => Self::NotFound(id),
        }
    }
}

/// Result type for combat operations.
pub type CombatResult<T> = Result<T, CombatError>;

/// What one call to [`CombatResolver::process_attack`] produced.
///
/// A rejection (attacker still in roundtime) is a normal outcome, not an
/// error: `hit` is false, `damage` is 0, and `roundtime` is `None`.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct AttackOutcome {
    /// Whether the attack landed.
    pub hit: bool,
    /// Damage dealt (0 on a miss or rejection).
    pub damage: i32,
    /// The roundtime lock charged for the attempt; `None` when the
    /// attempt was rejected.
    pub roundtime: Option<ActionTimer>,
}

impl AttackOutcome {
    const fn rejected() -> Self {
        Self {
            hit: false,
            damage: 0,
            roundtime: None,
        }
    }

    /// Returns whether the attempt was rejected without resolving.
    #[must_use]
    pub const fn was_rejected(&self) -> bool {
        self.roundtime.is_none()
    }
}

struct AttackerView {
    name: String,
    attack_base: i32,
    power: i32,
    finesse: i32,
    weapon_speed: i32,
}

struct DefenderView {
    name: String,
    defense_base: i32,
    power: i32,
    experience: i32,
    is_npc: bool,
}

/// Resolves attacks between combatants.
///
/// Constructed once and handed by reference to whatever owns the game
/// loop; nothing here is looked up through global state.
pub struct CombatResolver {
    registry: Arc<EntityRegistry>,
    effects: Arc<StatEffectEngine>,
    timers: Arc<CombatTimers>,
    sink: Arc<dyn MessageSink>,
    bus: Arc<EventBus>,
    lifecycle: Arc<dyn Lifecycle>,
    action_locks: DashMap<EntityId, Arc<Mutex<()>>>,
    rng: Mutex<fastrand::Rng>,
}

impl CombatResolver {
    /// Creates a resolver over the given collaborators.
    #[must_use]
    pub fn new(
        registry: Arc<EntityRegistry>,
        effects: Arc<StatEffectEngine>,
        timers: Arc<CombatTimers>,
        sink: Arc<dyn MessageSink>,
        bus: Arc<EventBus>,
        lifecycle: Arc<dyn Lifecycle>,
    ) -> Self {
        Self {
            registry,
            effects,
            timers,
            sink,
            bus,
            lifecycle,
            action_locks: DashMap::new(),
            rng: Mutex::new(fastrand::Rng::new()),
        }
    }

    /// Seeds the roll source, for reproducible simulations.
    #[must_use]
    pub fn with_seed(self, seed: u64) -> Self {
        *self.rng.lock() = fastrand::Rng::with_seed(seed);
        self
    }

    /// Processes a complete attack sequence.
    ///
    /// Returns the outcome, or an error when either party is missing or
    /// locked out of combat. A rejection for roundtime is an `Ok`
    /// outcome with nothing mutated.
    pub fn process_attack(
        &self,
        attacker: EntityId,
        defender: EntityId,
    ) -> CombatResult<AttackOutcome> {
        let lock = self.action_lock(attacker);
        let _guard = lock.lock();

        // 1. Roundtime gate: no state is touched on rejection
        if let Some(remaining) = self.timers.action_remaining(attacker) {
            self.sink.send(
                attacker,
                &format!(
                    "You are still recovering from your last action! ({}s remaining)",
                    remaining.ceil() as i64
                ),
            );
            return Ok(AttackOutcome::rejected());
        }

        let atk = self.attacker_view(attacker)?;
        let def = self.defender_view(defender)?;

        // 2. An attempt past the gate always costs the full action window
        let roundtime = self.timers.set_action(attacker, ROUNDTIME_SECS, false);

        // 3. Ratings; an open vulnerability window weakens the defender
        let defense_base = match self.timers.vulnerability_modifier(defender) {
            Some(modifier) => apply_defense_modifier(def.defense_base, modifier),
            None => def.defense_base,
        };

        // 4-6. Opposed rolls and the power check
        let rolls = AttackRolls {
            attacker: self.roll_d100(),
            defender: self.roll_d100(),
        };
        let resolution = resolve_attack(atk.attack_base, defense_base, atk.power, def.power, rolls);
        debug!(
            %attacker,
            %defender,
            end_roll = resolution.end_roll,
            power_diff = resolution.power_diff,
            "attack resolved"
        );

        let outcome = match resolution.outcome {
            HitOutcome::Clean { damage } => {
                self.apply_hit(attacker, defender, &atk, &def, damage, false)?;
                AttackOutcome {
                    hit: true,
                    damage,
                    roundtime: Some(roundtime),
                }
            }
            HitOutcome::PowerAssisted { damage } => {
                self.apply_hit(attacker, defender, &atk, &def, damage, true)?;
                AttackOutcome {
                    hit: true,
                    damage,
                    roundtime: Some(roundtime),
                }
            }
            HitOutcome::Miss { kind } => {
                self.apply_miss(attacker, defender, &atk, &def, kind);
                AttackOutcome {
                    hit: false,
                    damage: 0,
                    roundtime: Some(roundtime),
                }
            }
        };

        self.bus.publish(CombatEvent::AttackResolved {
            attacker,
            defender,
            hit: outcome.hit,
            power_assisted: matches!(resolution.outcome, HitOutcome::PowerAssisted { .. }),
            damage: outcome.damage,
        });

        Ok(outcome)
    }

    /// Stops every live timer; called on server shutdown or reload.
    pub fn shutdown(&self) {
        self.timers.shutdown();
    }

    fn attacker_view(&self, attacker: EntityId) -> CombatResult<AttackerView> {
        self.registry.read(attacker, |entity| {
            if !entity.is_combat_ready() {
                return Err(CombatError::NotCombatReady(attacker));
            }
            let view = StatView::new(&self.effects, entity);
            Ok(AttackerView {
                name: entity.name().to_owned(),
                attack_base: view.attack_rating(),
                power: view.power(),
                finesse: entity.weapon_finesse(),
                weapon_speed: view.weapon_speed(),
            })
        })?
    }

    fn defender_view(&self, defender: EntityId) -> CombatResult<DefenderView> {
        self.registry.read(defender, |entity| {
            if !entity.is_combat_ready() {
                return Err(CombatError::NotCombatReady(defender));
            }
            let view = StatView::new(&self.effects, entity);
            Ok(DefenderView {
                name: entity.name().to_owned(),
                defense_base: view.defense_rating(),
                power: view.power(),
                experience: entity.experience(),
                is_npc: entity.is_npc(),
            })
        })?
    }

    fn apply_hit(
        &self,
        attacker: EntityId,
        defender: EntityId,
        atk: &AttackerView,
        def: &DefenderView,
        damage: i32,
        power_assisted: bool,
    ) -> CombatResult<()> {
        let (dealt, died) = self.registry.write(defender, |entity| {
            let was_alive = entity.current_health() > 0;
            let dealt = entity.take_damage(damage);
            (dealt, was_alive && entity.current_health() == 0)
        })?;

        if power_assisted {
            self.sink.send(
                attacker,
                &format!(
                    "You muscle through {}'s guard, striking for {damage} damage!",
                    def.name
                ),
            );
            self.sink.send(
                defender,
                &format!(
                    "{} muscles through your guard, striking for {damage} damage!",
                    atk.name
                ),
            );
            self.sink.broadcast_from(
                attacker,
                &format!("{} muscles through {}'s guard!", atk.name, def.name),
                &[attacker, defender],
            );
        } else {
            self.sink.send(
                attacker,
                &format!("You hit {} for {damage} damage!", def.name),
            );
            self.sink.send(
                defender,
                &format!("{} hits you for {damage} damage!", atk.name),
            );
            self.sink.broadcast_from(
                attacker,
                &format!("{} hits {} for {damage} damage!", atk.name, def.name),
                &[attacker, defender],
            );
        }

        self.bus.publish(CombatEvent::EntityDamaged {
            entity: defender,
            damage: dealt,
            source: Some(attacker),
        });

        if died {
            self.handle_death(attacker, defender, atk, def);
        }
        Ok(())
    }

    fn apply_miss(
        &self,
        attacker: EntityId,
        defender: EntityId,
        atk: &AttackerView,
        def: &DefenderView,
        kind: MissKind,
    ) {
        match kind {
            MissKind::PowerChecked => {
                self.sink.send(
                    attacker,
                    &format!(
                        "You miss {}, your strength not enough to push through!",
                        def.name
                    ),
                );
                self.sink.send(
                    defender,
                    &format!("{} misses you despite the weight of the blow!", atk.name),
                );
            }
            MissKind::Plain => {
                if self.roll_fraction() < vulnerability_chance(atk.finesse) {
                    let duration = vulnerability_duration(atk.weapon_speed, atk.finesse);
                    let reduction = vulnerability_reduction(atk.finesse);
                    self.timers.set_vulnerability(attacker, duration, reduction);

                    self.sink.send(
                        attacker,
                        &format!("You miss {} wildly, leaving yourself open!", def.name),
                    );
                    self.sink.send(
                        defender,
                        &format!("{} misses you, guard broken by the wild swing!", atk.name),
                    );
                } else {
                    self.sink
                        .send(attacker, &format!("You miss {}!", def.name));
                    self.sink
                        .send(defender, &format!("{} misses you!", atk.name));
                }
            }
        }

        self.sink.broadcast_from(
            attacker,
            &format!("{} misses {}!", atk.name, def.name),
            &[attacker, defender],
        );
    }

    fn handle_death(
        &self,
        attacker: EntityId,
        defender: EntityId,
        atk: &AttackerView,
        def: &DefenderView,
    ) {
        info!(%attacker, %defender, "combatant slain");

        if def.experience > 0
            && self
                .registry
                .write(attacker, |entity| entity.gain_experience(def.experience))
                .is_ok()
        {
            self.sink.send(
                attacker,
                &format!("You gain {} experience points!", def.experience),
            );
            self.bus.publish(CombatEvent::ExperienceAwarded {
                entity: attacker,
                amount: def.experience,
            });
        }

        self.sink.broadcast_from(
            attacker,
            &format!("{} has been slain by {}!", def.name, atk.name),
            &[],
        );
        self.bus.publish(CombatEvent::EntityDied {
            entity: defender,
            killer: attacker,
        });

        if def.is_npc {
            let converted = self
                .registry
                .write(defender, |entity| match entity {
                    Entity::Npc(npc) => {
                        npc.make_corpse();
                        true
                    }
                    Entity::Player(_) => false,
                })
                .unwrap_or(false);

            if converted {
                self.timers.clear_entity(defender);
                self.effects.remove_entity(defender);
                self.bus.publish(CombatEvent::CorpseCreated { entity: defender });
                self.lifecycle.on_npc_corpse(defender, CORPSE_DECAY_SECS);
            }
        } else {
            self.lifecycle.on_player_death(defender);
        }
    }

    fn action_lock(&self, entity: EntityId) -> Arc<Mutex<()>> {
        let entry = self.action_locks.entry(entity).or_default();
        Arc::clone(&entry)
    }

    fn roll_d100(&self) -> i32 {
        self.rng.lock().i32(1..=100)
    }

    fn roll_fraction(&self) -> f64 {
        self.rng.lock().f64()
    }
}

impl std::fmt::Debug for CombatResolver {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("CombatResolver")
            .field("action_locks", &self.action_locks.len())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::clock::GameClock;
    use crate::combatant::{Attributes, CombatantState, Npc, Player, Skills};
    use crate::events::RecordingSink;
    use crate::lifecycle::RecordingLifecycle;

    struct Harness {
        clock: GameClock,
        registry: Arc<EntityRegistry>,
        timers: Arc<CombatTimers>,
        sink: Arc<RecordingSink>,
        bus: Arc<EventBus>,
        lifecycle: Arc<RecordingLifecycle>,
        resolver: CombatResolver,
    }

    fn harness() -> Harness {
        let clock = GameClock::manual();
        let registry = Arc::new(EntityRegistry::new());
        let effects = Arc::new(StatEffectEngine::new(clock.clone()));
        let sink = Arc::new(RecordingSink::new());
        let bus = Arc::new(EventBus::default());
        let timers = Arc::new(CombatTimers::new(
            clock.clone(),
            sink.clone(),
            bus.clone(),
        ));
        let lifecycle = Arc::new(RecordingLifecycle::new());
        let resolver = CombatResolver::new(
            registry.clone(),
            effects,
            timers.clone(),
            sink.clone(),
            bus.clone(),
            lifecycle.clone(),
        )
        .with_seed(1234);

        Harness {
            clock,
            registry,
            timers,
            sink,
            bus,
            lifecycle,
            resolver,
        }
    }

    fn brawler(name: &str, agility: i32, speed: i32, weapons: i32, health: i32) -> CombatantState {
        CombatantState::new(name)
            .with_attributes(Attributes {
                agility,
                speed,
                ..Default::default()
            })
            .with_skills(Skills {
                weapons,
                ..Default::default()
            })
            .with_health(health)
    }

    /// Attack rating 200 guarantees a hit against defense 6 whatever the
    /// rolls: end_roll >= 200 + 1 - 6 - 100 = 95.
    fn spawn_overwhelming_attacker(harness: &Harness) -> EntityId {
        harness
            .registry
            .insert(Entity::Player(Player {
                state: brawler("Wren", 100, 98, 2, 50),
            }))
    }

    fn spawn_weak_npc(harness: &Harness, health: i32, experience: i32) -> EntityId {
        let state = brawler("a cave rat", 3, 3, 1, health).with_experience(experience);
        let mut npc = Npc::new("placeholder");
        npc.state = state;
        harness.registry.insert(Entity::Npc(npc))
    }

    fn wait_out_roundtime(harness: &Harness) {
        harness.clock.advance(ROUNDTIME_SECS);
        harness.timers.tick();
    }

    #[test]
    fn test_overwhelming_attack_always_hits() {
        let harness = harness();
        let attacker = spawn_overwhelming_attacker(&harness);
        let defender = spawn_weak_npc(&harness, 1000, 0);

        let outcome = harness
            .resolver
            .process_attack(attacker, defender)
            .expect("attack should resolve");

        assert!(outcome.hit);
        assert!(outcome.damage >= 95);
        assert!(outcome.roundtime.is_some());

        let health = harness
            .registry
            .read(defender, |entity| entity.current_health())
            .expect("defender should exist");
        assert_eq!(health, 1000 - outcome.damage);
        assert!(harness
            .sink
            .sent_to(attacker)
            .iter()
            .any(|line| line.starts_with("You hit a cave rat for")));
    }

    #[test]
    fn test_second_attack_is_rejected_while_locked() {
        let harness = harness();
        let attacker = spawn_overwhelming_attacker(&harness);
        let defender = spawn_weak_npc(&harness, 1000, 0);

        let first = harness
            .resolver
            .process_attack(attacker, defender)
            .expect("attack should resolve");
        assert!(!first.was_rejected());

        let health_before = harness
            .registry
            .read(defender, |entity| entity.current_health())
            .expect("defender should exist");

        let second = harness
            .resolver
            .process_attack(attacker, defender)
            .expect("rejection is not an error");
        assert!(second.was_rejected());
        assert!(!second.hit);
        assert_eq!(second.damage, 0);

        let health_after = harness
            .registry
            .read(defender, |entity| entity.current_health())
            .expect("defender should exist");
        assert_eq!(health_before, health_after);
        assert!(harness
            .sink
            .sent_to(attacker)
            .iter()
            .any(|line| line.contains("still recovering")));
    }

    #[test]
    fn test_attack_allowed_again_after_roundtime_expires() {
        let harness = harness();
        let attacker = spawn_overwhelming_attacker(&harness);
        let defender = spawn_weak_npc(&harness, 1000, 0);

        let _ = harness
            .resolver
            .process_attack(attacker, defender)
            .expect("attack should resolve");
        wait_out_roundtime(&harness);

        let outcome = harness
            .resolver
            .process_attack(attacker, defender)
            .expect("attack should resolve");
        assert!(!outcome.was_rejected());
    }

    #[test]
    fn test_hopeless_attack_always_misses() {
        let harness = harness();
        // Attack rating 6 vs defense 200: end_roll <= 6 + 100 - 200 - 1 < 0,
        // and equal power means the plain-miss path
        let attacker = harness.registry.insert(Entity::Player(Player {
            state: brawler("Wren", 2, 2, 2, 50),
        }));
        let mut golem = Npc::new("placeholder");
        golem.state = brawler("a stone golem", 100, 100, 1, 500);
        let defender = harness.registry.insert(Entity::Npc(golem));

        let outcome = harness
            .resolver
            .process_attack(attacker, defender)
            .expect("attack should resolve");

        assert!(!outcome.hit);
        assert_eq!(outcome.damage, 0);
        assert!(outcome.roundtime.is_some());

        let health = harness
            .registry
            .read(defender, |entity| entity.current_health())
            .expect("defender should exist");
        assert_eq!(health, 500);
    }

    #[test]
    fn test_vulnerability_halves_defense_in_resolution() {
        let harness = harness();
        // Attack rating 100 vs defense 200: always a miss normally, but a
        // 100% defense reduction makes it always a hit
        let attacker = harness.registry.insert(Entity::Player(Player {
            state: brawler("Wren", 50, 49, 1, 50),
        }));
        let mut golem = Npc::new("placeholder");
        golem.state = brawler("a stone golem", 100, 100, 1, 5000);
        let defender = harness.registry.insert(Entity::Npc(golem));

        harness.timers.set_vulnerability(defender, 600.0, 100.0);
        let outcome = harness
            .resolver
            .process_attack(attacker, defender)
            .expect("attack should resolve");
        assert!(outcome.hit);

        harness.timers.stop_vulnerability(defender);
        wait_out_roundtime(&harness);

        let outcome = harness
            .resolver
            .process_attack(attacker, defender)
            .expect("attack should resolve");
        assert!(!outcome.hit);
    }

    #[test]
    fn test_death_awards_experience_and_converts_corpse() {
        let harness = harness();
        let attacker = spawn_overwhelming_attacker(&harness);
        let defender = spawn_weak_npc(&harness, 1, 7);

        let outcome = harness
            .resolver
            .process_attack(attacker, defender)
            .expect("attack should resolve");
        assert!(outcome.hit);

        let experience = harness
            .registry
            .read(attacker, |entity| entity.experience())
            .expect("attacker should exist");
        assert_eq!(experience, 7);
        assert!(harness
            .sink
            .sent_to(attacker)
            .contains(&"You gain 7 experience points!".to_owned()));

        // The NPC is converted in place, not removed
        assert!(harness.registry.contains(defender));
        let (name, ready) = harness
            .registry
            .read(defender, |entity| {
                (entity.name().to_owned(), entity.is_combat_ready())
            })
            .expect("corpse should exist");
        assert_eq!(name, "the corpse of a cave rat");
        assert!(!ready);

        assert_eq!(harness.lifecycle.corpses(), vec![(defender, CORPSE_DECAY_SECS)]);

        let events = harness.bus.drain();
        let deaths = events
            .iter()
            .filter(|event| matches!(event, CombatEvent::EntityDied { .. }))
            .count();
        assert_eq!(deaths, 1);
        assert!(events
            .iter()
            .any(|event| matches!(event, CombatEvent::CorpseCreated { entity } if *entity == defender)));
    }

    #[test]
    fn test_death_fires_exactly_once() {
        let harness = harness();
        let attacker = spawn_overwhelming_attacker(&harness);
        let defender = spawn_weak_npc(&harness, 1, 7);

        let _ = harness
            .resolver
            .process_attack(attacker, defender)
            .expect("attack should resolve");
        wait_out_roundtime(&harness);

        // The corpse is no longer a valid target
        let result = harness.resolver.process_attack(attacker, defender);
        assert!(matches!(result, Err(CombatError::NotCombatReady(id)) if id == defender));

        let experience = harness
            .registry
            .read(attacker, |entity| entity.experience())
            .expect("attacker should exist");
        assert_eq!(experience, 7);
    }

    #[test]
    fn test_player_death_hands_off_to_lifecycle() {
        let harness = harness();
        let attacker = spawn_overwhelming_attacker(&harness);
        let defender = harness.registry.insert(Entity::Player(Player {
            state: brawler("Moss", 3, 3, 1, 1),
        }));

        let outcome = harness
            .resolver
            .process_attack(attacker, defender)
            .expect("attack should resolve");
        assert!(outcome.hit);

        assert_eq!(harness.lifecycle.player_deaths(), vec![defender]);
        assert!(harness.lifecycle.corpses().is_empty());
        // Players are not converted or removed by the combat core
        assert!(harness.registry.contains(defender));
    }

    #[test]
    fn test_missing_entities_error() {
        let harness = harness();
        let attacker = spawn_overwhelming_attacker(&harness);
        let ghost = EntityId::new();

        assert!(matches!(
            harness.resolver.process_attack(ghost, attacker),
            Err(CombatError::NotFound(id)) if id == ghost
        ));
        assert!(matches!(
            harness.resolver.process_attack(attacker, ghost),
            Err(CombatError::NotFound(id)) if id == ghost
        ));
    }

    #[test]
    fn test_corpse_cannot_attack() {
        let harness = harness();
        let attacker = spawn_overwhelming_attacker(&harness);
        let defender = spawn_weak_npc(&harness, 1, 0);

        let _ = harness
            .resolver
            .process_attack(attacker, defender)
            .expect("attack should resolve");

        let result = harness.resolver.process_attack(defender, attacker);
        assert!(matches!(result, Err(CombatError::NotCombatReady(id)) if id == defender));
    }

    #[test]
    fn test_attack_locks_attacker() {
        let harness = harness();
        let attacker = spawn_overwhelming_attacker(&harness);
        let defender = spawn_weak_npc(&harness, 1000, 0);

        assert!(!harness.timers.is_locked(attacker));
        let outcome = harness
            .resolver
            .process_attack(attacker, defender)
            .expect("attack should resolve");
        assert!(harness.timers.is_locked(attacker));

        let roundtime = outcome.roundtime.expect("roundtime should be charged");
        assert_eq!(roundtime.duration(), ROUNDTIME_SECS);
    }

    #[test]
    fn test_shutdown_clears_locks() {
        let harness = harness();
        let attacker = spawn_overwhelming_attacker(&harness);
        let defender = spawn_weak_npc(&harness, 1000, 0);

        let _ = harness
            .resolver
            .process_attack(attacker, defender)
            .expect("attack should resolve");
        assert!(harness.timers.is_locked(attacker));

        harness.resolver.shutdown();
        assert!(!harness.timers.is_locked(attacker));
    }
}
