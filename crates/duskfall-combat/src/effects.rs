//! Stat effect system.
//!
//! This module provides:
//! - [`StatEffect`]: one timed or permanent modifier on one stat
//! - [`StatEffectEngine`]: per-entity, per-stat effect lists with a
//!   memoized derived-value cache and a periodic expiry sweep
//!
//! Application order: flat modifiers first (ascending priority), then
//! percentage modifiers compounding in ascending priority, truncated to an
//! integer toward zero at the end. Equal-priority effects keep insertion
//! order.

use ahash::AHashMap;
use dashmap::DashMap;
use std::sync::Arc;
use thiserror::Error;
use tracing::warn;

use duskfall_common::EntityId;

use crate::clock::GameClock;
use crate::combatant::Combatant;

/// Error produced by an effect's applicability predicate.
///
/// A failing predicate never propagates out of stat calculation; the
/// effect is simply treated as inapplicable for that evaluation.
#[derive(Debug, Clone, Error)]
#[error("effect condition failed: {0}")]
pub struct ConditionError(pub String);

/// Applicability predicate evaluated against the target entity.
pub type EffectCondition = Arc<dyn Fn(&dyn Combatant) -> Result<bool, ConditionError> + Send + Sync>;

/// A single stat modification effect. Immutable once added.
#[derive(Clone)]
pub struct StatEffect {
    stat: String,
    value: f64,
    is_percentage: bool,
    duration: Option<f64>,
    applied_at: f64,
    source: Option<String>,
    stacks: bool,
    priority: i32,
    condition: Option<EffectCondition>,
}

impl std::fmt::Debug for StatEffect {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("StatEffect")
            .field("stat", &self.stat)
            .field("value", &self.value)
            .field("is_percentage", &self.is_percentage)
            .field("duration", &self.duration)
            .field("applied_at", &self.applied_at)
            .field("source", &self.source)
            .field("stacks", &self.stacks)
            .field("priority", &self.priority)
            .field("has_condition", &self.condition.is_some())
            .finish()
    }
}

impl StatEffect {
    /// Creates a permanent flat modifier on a stat.
    #[must_use]
    pub fn flat(stat: impl Into<String>, value: f64) -> Self {
        Self {
            stat: stat.into(),
            value,
            is_percentage: false,
            duration: None,
            applied_at: 0.0,
            source: None,
            stacks: false,
            priority: 1,
            condition: None,
        }
    }

    /// Creates a permanent percentage modifier on a stat.
    ///
    /// A value of 50.0 multiplies the stat by 1.5.
    #[must_use]
    pub fn percent(stat: impl Into<String>, value: f64) -> Self {
        Self {
            is_percentage: true,
            ..Self::flat(stat, value)
        }
    }

    /// Sets a duration in seconds; effects without one are permanent.
    #[must_use]
    pub fn with_duration(mut self, seconds: f64) -> Self {
        self.duration = Some(seconds.max(0.0));
        self
    }

    /// Tags the effect with its source (spell name, item, etc.) for
    /// non-stacking replacement and source-wide removal.
    #[must_use]
    pub fn with_source(mut self, source: impl Into<String>) -> Self {
        self.source = Some(source.into());
        self
    }

    /// Allows multiple instances of this effect to coexist.
    #[must_use]
    pub fn stacking(mut self) -> Self {
        self.stacks = true;
        self
    }

    /// Sets the application priority (ascending order).
    #[must_use]
    pub fn with_priority(mut self, priority: i32) -> Self {
        self.priority = priority;
        self
    }

    /// Attaches an applicability predicate.
    #[must_use]
    pub fn with_condition(
        mut self,
        condition: impl Fn(&dyn Combatant) -> Result<bool, ConditionError> + Send + Sync + 'static,
    ) -> Self {
        self.condition = Some(Arc::new(condition));
        self
    }

    /// Returns the modified stat name.
    #[must_use]
    pub fn stat(&self) -> &str {
        &self.stat
    }

    /// Returns the modification value.
    #[must_use]
    pub const fn value(&self) -> f64 {
        self.value
    }

    /// Returns whether this is a percentage modifier.
    #[must_use]
    pub const fn is_percentage(&self) -> bool {
        self.is_percentage
    }

    /// Returns the source tag, if any.
    #[must_use]
    pub fn source(&self) -> Option<&str> {
        self.source.as_deref()
    }

    /// Returns whether this effect stacks.
    #[must_use]
    pub const fn stacks(&self) -> bool {
        self.stacks
    }

    /// Returns the application priority.
    #[must_use]
    pub const fn priority(&self) -> i32 {
        self.priority
    }

    /// Checks if the effect has expired at the given time.
    #[must_use]
    pub fn is_expired(&self, now: f64) -> bool {
        match self.duration {
            None => false,
            Some(duration) => now >= self.applied_at + duration,
        }
    }

    /// Remaining duration in seconds; `None` for permanent effects.
    #[must_use]
    pub fn remaining(&self, now: f64) -> Option<f64> {
        self.duration
            .map(|duration| (self.applied_at + duration - now).max(0.0))
    }

    /// Checks if the effect currently applies to the entity.
    ///
    /// A predicate error is logged and treated as "does not apply".
    fn should_apply(&self, entity: &dyn Combatant, now: f64) -> bool {
        if self.is_expired(now) {
            return false;
        }
        match &self.condition {
            None => true,
            Some(condition) => match condition(entity) {
                Ok(applies) => applies,
                Err(error) => {
                    warn!(
                        entity = %entity.id(),
                        stat = %self.stat,
                        %error,
                        "stat effect condition failed; treating as inapplicable"
                    );
                    false
                }
            },
        }
    }
}

/// A snapshot of one live effect, for display layers.
#[derive(Debug, Clone, PartialEq)]
pub struct EffectSummary {
    /// Modified stat name.
    pub stat: String,
    /// Modification value.
    pub value: f64,
    /// Whether the value is a percentage.
    pub is_percentage: bool,
    /// Remaining duration in seconds; `None` for permanent effects.
    pub remaining: Option<f64>,
    /// Source tag, if any.
    pub source: Option<String>,
}

type EffectTable = AHashMap<String, Vec<StatEffect>>;
type CacheTable = AHashMap<String, i32>;

/// Maintains stat effects and derived values for every entity.
///
/// Storage shape: entity-id → stat-name → effect list, with a parallel
/// per-entity per-stat cache of derived values. Safe to share across
/// threads; per-stat operations for different entities do not contend.
#[derive(Debug)]
pub struct StatEffectEngine {
    clock: GameClock,
    effects: DashMap<EntityId, EffectTable>,
    cache: DashMap<EntityId, CacheTable>,
}

impl StatEffectEngine {
    /// Creates an engine driven by the given clock.
    #[must_use]
    pub fn new(clock: GameClock) -> Self {
        Self {
            clock,
            effects: DashMap::new(),
            cache: DashMap::new(),
        }
    }

    /// Adds an effect to the entity's list for the effect's stat.
    ///
    /// Non-stacking effects first remove any existing effect on that stat
    /// sharing the same source, whatever that effect's own stacking flag,
    /// so a refresh never leaves duplicates.
    pub fn add_effect(&self, entity: EntityId, mut effect: StatEffect) {
        effect.applied_at = self.clock.now();
        let stat = effect.stat.clone();

        let mut table = self.effects.entry(entity).or_default();
        let list = table.entry(stat.clone()).or_default();
        if !effect.stacks {
            list.retain(|existing| existing.source() != effect.source());
        }
        list.push(effect);
        drop(table);

        self.invalidate(entity, &stat);
    }

    /// Removes effects from an entity.
    ///
    /// With both `source` and `stat`, removes effects matching both; with
    /// only `stat`, clears that stat's list; with only `source`, removes
    /// matching effects across all stats. With neither, does nothing.
    pub fn remove_effects(&self, entity: EntityId, source: Option<&str>, stat: Option<&str>) {
        let Some(mut table) = self.effects.get_mut(&entity) else {
            return;
        };

        let mut touched = Vec::new();
        match (stat, source) {
            (Some(stat), Some(source)) => {
                if let Some(list) = table.get_mut(stat) {
                    let before = list.len();
                    list.retain(|effect| effect.source() != Some(source));
                    if list.len() != before {
                        touched.push(stat.to_owned());
                    }
                }
            }
            (Some(stat), None) => {
                if table.remove(stat).is_some() {
                    touched.push(stat.to_owned());
                }
            }
            (None, Some(source)) => {
                for (stat, list) in table.iter_mut() {
                    let before = list.len();
                    list.retain(|effect| effect.source() != Some(source));
                    if list.len() != before {
                        touched.push(stat.clone());
                    }
                }
            }
            (None, None) => {}
        }
        drop(table);

        for stat in touched {
            self.invalidate(entity, &stat);
        }
    }

    /// Drops all effect and cache state for a destroyed entity.
    pub fn remove_entity(&self, entity: EntityId) {
        self.effects.remove(&entity);
        self.cache.remove(&entity);
    }

    /// Calculates the final value of a stat including all live effects.
    ///
    /// Returns `None` when the entity has no such base stat; callers fall
    /// back to the raw attribute default. Results are cached until an
    /// effect on the stat is added, removed, or swept as expired.
    pub fn calculate_stat(&self, entity: &dyn Combatant, stat: &str) -> Option<i32> {
        let id = entity.id();

        if let Some(cached) = self
            .cache
            .get(&id)
            .and_then(|table| table.get(stat).copied())
        {
            return Some(cached);
        }

        let base = entity.base_stat(stat)?;

        let now = self.clock.now();
        let mut active: Vec<StatEffect> = match self.effects.get(&id) {
            None => return Some(base),
            Some(table) => match table.get(stat) {
                None => return Some(base),
                Some(list) => list
                    .iter()
                    .filter(|effect| effect.should_apply(entity, now))
                    .cloned()
                    .collect(),
            },
        };

        // Stable sort keeps insertion order among equal priorities
        active.sort_by_key(StatEffect::priority);

        let mut value = f64::from(base);
        for effect in active.iter().filter(|e| !e.is_percentage) {
            value += effect.value;
        }
        for effect in active.iter().filter(|e| e.is_percentage) {
            value *= 1.0 + effect.value / 100.0;
        }

        // Truncate toward zero for integer combat math
        let result = value as i32;
        self.cache
            .entry(id)
            .or_default()
            .insert(stat.to_owned(), result);
        Some(result)
    }

    /// Lists an entity's live effects for display.
    #[must_use]
    pub fn effect_summaries(&self, entity: EntityId) -> Vec<EffectSummary> {
        let now = self.clock.now();
        let Some(table) = self.effects.get(&entity) else {
            return Vec::new();
        };

        let mut summaries = Vec::new();
        for (stat, list) in table.iter() {
            for effect in list.iter().filter(|effect| !effect.is_expired(now)) {
                summaries.push(EffectSummary {
                    stat: stat.clone(),
                    value: effect.value(),
                    is_percentage: effect.is_percentage(),
                    remaining: effect.remaining(now),
                    source: effect.source().map(str::to_owned),
                });
            }
        }
        summaries
    }

    /// Purges expired effects and invalidates their caches.
    ///
    /// Invoked once per second by whoever owns the game loop; this is the
    /// only place caches are invalidated purely by the passage of time.
    pub fn clean_expired(&self) {
        let now = self.clock.now();
        let mut touched: Vec<(EntityId, String)> = Vec::new();

        for mut entry in self.effects.iter_mut() {
            let entity = *entry.key();
            let table = entry.value_mut();
            for (stat, list) in table.iter_mut() {
                let before = list.len();
                list.retain(|effect| !effect.is_expired(now));
                if list.len() != before {
                    touched.push((entity, stat.clone()));
                }
            }
            table.retain(|_, list| !list.is_empty());
        }

        for (entity, stat) in touched {
            self.invalidate(entity, &stat);
        }
    }

    /// Returns the number of live effects on a stat (expired included
    /// until the next sweep).
    #[must_use]
    pub fn effect_count(&self, entity: EntityId, stat: &str) -> usize {
        self.effects
            .get(&entity)
            .and_then(|table| table.get(stat).map(Vec::len))
            .unwrap_or(0)
    }

    fn invalidate(&self, entity: EntityId, stat: &str) {
        if let Some(mut table) = self.cache.get_mut(&entity) {
            table.remove(stat);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::combatant::CombatantState;

    fn engine() -> (StatEffectEngine, GameClock) {
        let clock = GameClock::manual();
        (StatEffectEngine::new(clock.clone()), clock)
    }

    #[test]
    fn test_flat_and_percent_application_order() {
        let (engine, _clock) = engine();
        let target = CombatantState::new("target");
        let id = target.id();

        // Percentage carries a lower priority than the flat, but flats
        // still resolve first: (1 + 9) * 1.5 = 15
        engine.add_effect(id, StatEffect::percent("power", 50.0).with_priority(1));
        engine.add_effect(id, StatEffect::flat("power", 9.0).with_priority(5).with_source("belt"));

        assert_eq!(engine.calculate_stat(&target, "power"), Some(15));
    }

    #[test]
    fn test_percent_effects_compound() {
        let (engine, _clock) = engine();
        let target = CombatantState::new("target").with_attributes(crate::combatant::Attributes {
            power: 10,
            ..Default::default()
        });
        let id = target.id();

        engine.add_effect(id, StatEffect::percent("power", 50.0).with_source("a").stacking());
        engine.add_effect(id, StatEffect::percent("power", 50.0).with_source("b").stacking());

        // 10 * 1.5 * 1.5 = 22.5, truncated toward zero
        assert_eq!(engine.calculate_stat(&target, "power"), Some(22));
    }

    #[test]
    fn test_unknown_stat_is_undefined() {
        let (engine, _clock) = engine();
        let target = CombatantState::new("target");
        assert_eq!(engine.calculate_stat(&target, "luck"), None);
    }

    #[test]
    fn test_cache_is_idempotent_between_invalidations() {
        let (engine, _clock) = engine();
        let target = CombatantState::new("target");
        let id = target.id();

        engine.add_effect(id, StatEffect::flat("speed", 3.0));
        let first = engine.calculate_stat(&target, "speed");
        let second = engine.calculate_stat(&target, "speed");
        assert_eq!(first, second);
        assert_eq!(first, Some(4));

        engine.add_effect(id, StatEffect::flat("speed", 2.0).with_source("boots"));
        assert_eq!(engine.calculate_stat(&target, "speed"), Some(6));
    }

    #[test]
    fn test_non_stacking_source_replacement() {
        let (engine, _clock) = engine();
        let target = CombatantState::new("target");
        let id = target.id();

        engine.add_effect(id, StatEffect::flat("agility", 2.0).with_source("haste"));
        engine.add_effect(id, StatEffect::flat("agility", 4.0).with_source("haste"));

        assert_eq!(engine.effect_count(id, "agility"), 1);
        assert_eq!(engine.calculate_stat(&target, "agility"), Some(5));
    }

    #[test]
    fn test_remove_and_readd_never_duplicates() {
        let (engine, _clock) = engine();
        let target = CombatantState::new("target");
        let id = target.id();

        engine.add_effect(id, StatEffect::flat("agility", 2.0).with_source("haste"));
        engine.remove_effects(id, Some("haste"), None);
        engine.add_effect(id, StatEffect::flat("agility", 2.0).with_source("haste"));

        assert_eq!(engine.effect_count(id, "agility"), 1);
    }

    #[test]
    fn test_remove_by_stat_and_by_source() {
        let (engine, _clock) = engine();
        let target = CombatantState::new("target");
        let id = target.id();

        engine.add_effect(id, StatEffect::flat("agility", 2.0).with_source("haste"));
        engine.add_effect(id, StatEffect::flat("speed", 2.0).with_source("haste"));
        engine.add_effect(id, StatEffect::flat("speed", 1.0).with_source("boots"));

        engine.remove_effects(id, Some("haste"), Some("speed"));
        assert_eq!(engine.effect_count(id, "speed"), 1);
        assert_eq!(engine.effect_count(id, "agility"), 1);

        engine.remove_effects(id, Some("haste"), None);
        assert_eq!(engine.effect_count(id, "agility"), 0);

        engine.remove_effects(id, None, Some("speed"));
        assert_eq!(engine.effect_count(id, "speed"), 0);
    }

    #[test]
    fn test_expiry_requires_sweep() {
        let (engine, clock) = engine();
        let target = CombatantState::new("target");
        let id = target.id();

        engine.add_effect(id, StatEffect::flat("power", 5.0).with_duration(10.0));
        assert_eq!(engine.calculate_stat(&target, "power"), Some(6));

        clock.advance(11.0);
        // Cached value still reflects the pre-expiry calculation
        assert_eq!(engine.calculate_stat(&target, "power"), Some(6));

        engine.clean_expired();
        assert_eq!(engine.effect_count(id, "power"), 0);
        assert_eq!(engine.calculate_stat(&target, "power"), Some(1));
    }

    #[test]
    fn test_fresh_calculation_skips_expired_effects() {
        let (engine, clock) = engine();
        let target = CombatantState::new("target");
        let id = target.id();

        engine.add_effect(id, StatEffect::flat("power", 5.0).with_duration(10.0));
        clock.advance(11.0);

        // No cached value yet: the expired effect is filtered out even
        // before the sweep runs
        assert_eq!(engine.calculate_stat(&target, "power"), Some(1));
    }

    #[test]
    fn test_failing_condition_is_inapplicable() {
        let (engine, _clock) = engine();
        let target = CombatantState::new("target");
        let id = target.id();

        engine.add_effect(
            id,
            StatEffect::flat("power", 5.0)
                .with_condition(|_| Err(ConditionError("missing aura".to_owned()))),
        );

        assert_eq!(engine.calculate_stat(&target, "power"), Some(1));
    }

    #[test]
    fn test_condition_gates_application() {
        let (engine, _clock) = engine();
        let target = CombatantState::new("target");
        let id = target.id();

        engine.add_effect(
            id,
            StatEffect::flat("power", 5.0)
                .with_source("last stand")
                .with_condition(|entity| Ok(entity.current_health() < entity.max_health())),
        );
        assert_eq!(engine.calculate_stat(&target, "power"), Some(1));

        let mut hurt = target.clone();
        let _ = hurt.take_damage(3);
        engine.remove_effects(id, Some("last stand"), None);
        engine.add_effect(
            id,
            StatEffect::flat("power", 5.0)
                .with_source("last stand")
                .with_condition(|entity| Ok(entity.current_health() < entity.max_health())),
        );
        assert_eq!(engine.calculate_stat(&hurt, "power"), Some(6));
    }

    #[test]
    fn test_equal_priority_flats_sum_commutatively() {
        let (engine, _clock) = engine();
        let target = CombatantState::new("target");
        let id = target.id();

        engine.add_effect(id, StatEffect::flat("power", 2.0).with_source("a").stacking());
        engine.add_effect(id, StatEffect::flat("power", 3.0).with_source("b").stacking());
        assert_eq!(engine.calculate_stat(&target, "power"), Some(6));
    }

    #[test]
    fn test_effect_summaries_report_remaining_time() {
        let (engine, clock) = engine();
        let target = CombatantState::new("target");
        let id = target.id();

        engine.add_effect(id, StatEffect::flat("power", 2.0).with_duration(30.0));
        engine.add_effect(id, StatEffect::percent("speed", 10.0).with_source("wind"));
        clock.advance(10.0);

        let mut summaries = engine.effect_summaries(id);
        summaries.sort_by(|a, b| a.stat.cmp(&b.stat));
        assert_eq!(summaries.len(), 2);
        assert_eq!(summaries[0].stat, "power");
        assert_eq!(summaries[0].remaining, Some(20.0));
        assert_eq!(summaries[1].remaining, None);
        assert_eq!(summaries[1].source.as_deref(), Some("wind"));
    }

    #[test]
    fn test_remove_entity_drops_all_state() {
        let (engine, _clock) = engine();
        let target = CombatantState::new("target");
        let id = target.id();

        engine.add_effect(id, StatEffect::flat("power", 2.0));
        let _ = engine.calculate_stat(&target, "power");

        engine.remove_entity(id);
        assert_eq!(engine.effect_count(id, "power"), 0);
        assert_eq!(engine.calculate_stat(&target, "power"), Some(1));
    }
}
