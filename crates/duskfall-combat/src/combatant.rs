//! Combatant entities and the read contract combat needs from them.
//!
//! This module provides:
//! - Core attributes and trained skills with their defaults
//! - Equipment slots and the two item kinds combat reads
//! - Wound and scar bookkeeping per body location
//! - The narrow [`Combatant`] capability implemented by both entity
//!   variants ([`Player`], [`Npc`])
//! - [`StatView`]: derived attack/defense/power values through the stat
//!   effect engine

use serde::{Deserialize, Serialize};
use std::collections::HashMap;

use duskfall_common::{BodyPart, EntityId};

use crate::effects::StatEffectEngine;

/// Weapon speed assumed when the attacker is unarmed or the equipped item
/// carries no speed attribute.
pub const DEFAULT_WEAPON_SPEED: i32 = 5;

// ============================================================================
// Attributes and Skills
// ============================================================================

/// Core attributes for a combatant. All default to 1.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct Attributes {
    /// Raw physical strength and damage potential.
    pub power: i32,
    /// Dexterity, balance, and fine motor control.
    pub agility: i32,
    /// Movement and action speed.
    pub speed: i32,
    /// Health and stamina.
    pub vitality: i32,
    /// Physical and mental resilience.
    pub resistance: i32,
    /// Mental acuity and concentration.
    pub focus: i32,
    /// Self-control and training.
    pub discipline: i32,
    /// Problem solving and knowledge.
    pub intelligence: i32,
    /// Insight and decision making.
    pub wisdom: i32,
    /// Personality and leadership.
    pub charisma: i32,
}

impl Default for Attributes {
    fn default() -> Self {
        Self {
            power: 1,
            agility: 1,
            speed: 1,
            vitality: 1,
            resistance: 1,
            focus: 1,
            discipline: 1,
            intelligence: 1,
            wisdom: 1,
            charisma: 1,
        }
    }
}

/// Trained skills for a combatant. All default to 1.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct Skills {
    /// Proficiency with weapons.
    pub weapons: i32,
    /// Proficiency with shields.
    pub shields: i32,
    /// Proficiency with armor.
    pub armor: i32,
    /// Physical fitness level.
    pub physical_fitness: i32,
    /// Combat prowess.
    pub combat_prowess: i32,
    /// Skill in evasive maneuvers.
    pub evasive_maneuvers: i32,
}

impl Default for Skills {
    fn default() -> Self {
        Self {
            weapons: 1,
            shields: 1,
            armor: 1,
            physical_fitness: 1,
            combat_prowess: 1,
            evasive_maneuvers: 1,
        }
    }
}

// ============================================================================
// Items
// ============================================================================

/// What kind of item occupies an equipment slot.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum ItemKind {
    /// A weapon with a speed attribute driving vulnerability windows.
    Weapon {
        /// Swing speed; higher is slower.
        speed: i32,
    },
    /// A shield; its defensive value comes from the wielder's shields skill.
    Shield,
    /// Anything else a combatant might hold.
    Other,
}

/// An item held in an equipment slot.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Item {
    /// Display name.
    pub name: String,
    /// Item kind.
    pub kind: ItemKind,
}

impl Item {
    /// Creates a weapon with the given speed.
    #[must_use]
    pub fn weapon(name: impl Into<String>, speed: i32) -> Self {
        Self {
            name: name.into(),
            kind: ItemKind::Weapon { speed },
        }
    }

    /// Creates a shield.
    #[must_use]
    pub fn shield(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            kind: ItemKind::Shield,
        }
    }

    /// Creates a miscellaneous item.
    #[must_use]
    pub fn other(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            kind: ItemKind::Other,
        }
    }

    /// Returns the weapon speed attribute, if this is a weapon.
    #[must_use]
    pub const fn weapon_speed(&self) -> Option<i32> {
        match self.kind {
            ItemKind::Weapon { speed } => Some(speed),
            _ => None,
        }
    }
}

// ============================================================================
// Combatant state
// ============================================================================

/// The structured per-entity state combat reads and writes.
///
/// Replaces the original's free-form attribute table with explicit fields;
/// the open-ended modifier system lives in the stat effect engine's side
/// table instead.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CombatantState {
    id: EntityId,
    name: String,
    attributes: Attributes,
    skills: Skills,
    max_health: i32,
    current_health: i32,
    experience: i32,
    left_hand: Option<Item>,
    right_hand: Option<Item>,
    wounds: HashMap<BodyPart, Vec<String>>,
    scars: HashMap<BodyPart, Vec<String>>,
    aim: Option<BodyPart>,
}

fn empty_location_table() -> HashMap<BodyPart, Vec<String>> {
    BodyPart::ALL.iter().map(|part| (*part, Vec::new())).collect()
}

impl CombatantState {
    /// Creates a combatant with default stats and 10 health.
    #[must_use]
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            id: EntityId::new(),
            name: name.into(),
            attributes: Attributes::default(),
            skills: Skills::default(),
            max_health: 10,
            current_health: 10,
            experience: 0,
            left_hand: None,
            right_hand: None,
            wounds: empty_location_table(),
            scars: empty_location_table(),
            aim: None,
        }
    }

    /// Sets the core attributes.
    #[must_use]
    pub fn with_attributes(mut self, attributes: Attributes) -> Self {
        self.attributes = attributes;
        self
    }

    /// Sets the trained skills.
    #[must_use]
    pub fn with_skills(mut self, skills: Skills) -> Self {
        self.skills = skills;
        self
    }

    /// Sets maximum health (and fills current health to match).
    #[must_use]
    pub fn with_health(mut self, max_health: i32) -> Self {
        self.max_health = max_health.max(1);
        self.current_health = self.max_health;
        self
    }

    /// Sets the experience value.
    #[must_use]
    pub fn with_experience(mut self, experience: i32) -> Self {
        self.experience = experience.max(0);
        self
    }

    /// Returns this combatant's id.
    #[must_use]
    pub const fn id(&self) -> EntityId {
        self.id
    }

    /// Returns the display name.
    #[must_use]
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Renames the combatant (used by corpse conversion).
    pub fn set_name(&mut self, name: impl Into<String>) {
        self.name = name.into();
    }

    /// Looks up a base stat or skill by name.
    ///
    /// Returns `None` when no such base value exists, which callers must
    /// treat as "fall back to the raw attribute default".
    #[must_use]
    pub fn base_stat(&self, stat: &str) -> Option<i32> {
        let value = match stat {
            "power" => self.attributes.power,
            "agility" => self.attributes.agility,
            "speed" => self.attributes.speed,
            "vitality" => self.attributes.vitality,
            "resistance" => self.attributes.resistance,
            "focus" => self.attributes.focus,
            "discipline" => self.attributes.discipline,
            "intelligence" => self.attributes.intelligence,
            "wisdom" => self.attributes.wisdom,
            "charisma" => self.attributes.charisma,
            "weapons" => self.skills.weapons,
            "shields" => self.skills.shields,
            "armor" => self.skills.armor,
            "physical_fitness" => self.skills.physical_fitness,
            "combat_prowess" => self.skills.combat_prowess,
            "evasive_maneuvers" => self.skills.evasive_maneuvers,
            _ => return None,
        };
        Some(value)
    }

    /// Returns current health.
    #[must_use]
    pub const fn current_health(&self) -> i32 {
        self.current_health
    }

    /// Returns maximum health.
    #[must_use]
    pub const fn max_health(&self) -> i32 {
        self.max_health
    }

    /// Checks if still alive.
    #[must_use]
    pub const fn is_alive(&self) -> bool {
        self.current_health > 0
    }

    /// Deals damage, clamped at 0. Returns damage actually dealt.
    pub fn take_damage(&mut self, amount: i32) -> i32 {
        let actual = amount.clamp(0, self.current_health);
        self.current_health -= actual;
        actual
    }

    /// Heals, clamped at max health. Returns health actually restored.
    pub fn heal(&mut self, amount: i32) -> i32 {
        let actual = amount.max(0).min(self.max_health - self.current_health);
        self.current_health += actual;
        actual
    }

    /// Returns the experience value.
    #[must_use]
    pub const fn experience(&self) -> i32 {
        self.experience
    }

    /// Adds experience points. Returns the new total.
    pub fn gain_experience(&mut self, amount: i32) -> i32 {
        self.experience += amount.max(0);
        self.experience
    }

    /// Returns the item in the left hand, if any.
    #[must_use]
    pub const fn left_hand(&self) -> Option<&Item> {
        self.left_hand.as_ref()
    }

    /// Returns the item in the right hand, if any.
    #[must_use]
    pub const fn right_hand(&self) -> Option<&Item> {
        self.right_hand.as_ref()
    }

    /// Puts an item in the left hand, returning what was there.
    pub fn equip_left(&mut self, item: Option<Item>) -> Option<Item> {
        std::mem::replace(&mut self.left_hand, item)
    }

    /// Puts an item in the right hand, returning what was there.
    pub fn equip_right(&mut self, item: Option<Item>) -> Option<Item> {
        std::mem::replace(&mut self.right_hand, item)
    }

    /// Returns the current aim location, if any.
    #[must_use]
    pub const fn aim(&self) -> Option<BodyPart> {
        self.aim
    }

    /// Sets or clears the aim location.
    pub fn set_aim(&mut self, aim: Option<BodyPart>) {
        self.aim = aim;
    }

    /// Adds a wound at the given location.
    pub fn add_wound(&mut self, location: BodyPart, description: impl Into<String>) {
        self.wounds.entry(location).or_default().push(description.into());
    }

    /// Heals a specific wound, with a 50% chance of leaving a scar.
    ///
    /// Returns true if the wound existed and was removed.
    pub fn heal_wound(&mut self, location: BodyPart, description: &str) -> bool {
        let Some(wounds) = self.wounds.get_mut(&location) else {
            return false;
        };
        let Some(index) = wounds.iter().position(|w| w == description) else {
            return false;
        };
        wounds.remove(index);
        if fastrand::bool() {
            self.scars
                .entry(location)
                .or_default()
                .push(format!("Scar from: {description}"));
        }
        true
    }

    /// Returns the wounds at a location.
    #[must_use]
    pub fn wounds_at(&self, location: BodyPart) -> &[String] {
        self.wounds.get(&location).map_or(&[], Vec::as_slice)
    }

    /// Returns the scars at a location.
    #[must_use]
    pub fn scars_at(&self, location: BodyPart) -> &[String] {
        self.scars.get(&location).map_or(&[], Vec::as_slice)
    }
}

// ============================================================================
// Combatant capability
// ============================================================================

/// The narrow contract combat resolution needs from an entity.
///
/// Implemented by both entity variants; combat code never depends on
/// anything beyond this surface.
pub trait Combatant {
    /// Returns this combatant's id.
    fn id(&self) -> EntityId;

    /// Returns the display name.
    fn name(&self) -> &str;

    /// Looks up a base stat or skill by name; `None` when undefined.
    fn base_stat(&self, stat: &str) -> Option<i32>;

    /// Returns current health.
    fn current_health(&self) -> i32;

    /// Returns maximum health.
    fn max_health(&self) -> i32;

    /// Deals damage, clamped at 0. Returns damage actually dealt.
    fn take_damage(&mut self, amount: i32) -> i32;

    /// Heals, clamped at max health. Returns health actually restored.
    fn heal(&mut self, amount: i32) -> i32;

    /// Returns the experience value awarded to (or held by) this entity.
    fn experience(&self) -> i32;

    /// Adds experience points. Returns the new total.
    fn gain_experience(&mut self, amount: i32) -> i32;

    /// Returns the item in the left hand, if any.
    fn left_hand(&self) -> Option<&Item>;

    /// Returns the item in the right hand, if any.
    fn right_hand(&self) -> Option<&Item>;

    /// Returns the weapon finesse talent value.
    ///
    /// Placeholder until the talent system is implemented.
    fn weapon_finesse(&self) -> i32 {
        0
    }
}

impl Combatant for CombatantState {
    fn id(&self) -> EntityId {
        self.id()
    }

    fn name(&self) -> &str {
        self.name()
    }

    fn base_stat(&self, stat: &str) -> Option<i32> {
        self.base_stat(stat)
    }

    fn current_health(&self) -> i32 {
        self.current_health()
    }

    fn max_health(&self) -> i32 {
        self.max_health()
    }

    fn take_damage(&mut self, amount: i32) -> i32 {
        self.take_damage(amount)
    }

    fn heal(&mut self, amount: i32) -> i32 {
        self.heal(amount)
    }

    fn experience(&self) -> i32 {
        self.experience()
    }

    fn gain_experience(&mut self, amount: i32) -> i32 {
        self.gain_experience(amount)
    }

    fn left_hand(&self) -> Option<&Item> {
        self.left_hand()
    }

    fn right_hand(&self) -> Option<&Item> {
        self.right_hand()
    }
}

// ============================================================================
// Entity variants
// ============================================================================

/// A player character.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Player {
    /// Shared combatant state.
    pub state: CombatantState,
}

impl Player {
    /// Creates a player with default stats.
    #[must_use]
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            state: CombatantState::new(name),
        }
    }
}

/// A hostile NPC.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Npc {
    /// Shared combatant state.
    pub state: CombatantState,
    /// False once converted to a corpse; corpses take no part in combat.
    active: bool,
}

impl Npc {
    /// Creates an NPC with default stats and an experience value of 1.
    #[must_use]
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            state: CombatantState::new(name).with_experience(1),
            active: true,
        }
    }

    /// Returns whether this NPC is still an active combatant.
    #[must_use]
    pub const fn is_active(&self) -> bool {
        self.active
    }

    /// Returns whether this NPC has been converted to a corpse.
    #[must_use]
    pub const fn is_corpse(&self) -> bool {
        !self.active
    }

    /// Converts this NPC in place into an inert corpse.
    ///
    /// Renames it and locks it out of all interaction except removal by
    /// the lifecycle manager.
    pub fn make_corpse(&mut self) {
        let name = format!("the corpse of {}", self.state.name());
        self.state.set_name(name);
        self.active = false;
    }
}

/// An entity that can take part in combat.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub enum Entity {
    /// A player character.
    Player(Player),
    /// A hostile NPC.
    Npc(Npc),
}

impl Entity {
    /// Returns this entity's id.
    #[must_use]
    pub const fn id(&self) -> EntityId {
        self.state().id()
    }

    /// Returns the display name.
    #[must_use]
    pub fn name(&self) -> &str {
        self.state().name()
    }

    /// Returns the shared combatant state.
    #[must_use]
    pub const fn state(&self) -> &CombatantState {
        match self {
            Self::Player(player) => &player.state,
            Self::Npc(npc) => &npc.state,
        }
    }

    /// Returns the shared combatant state mutably.
    pub fn state_mut(&mut self) -> &mut CombatantState {
        match self {
            Self::Player(player) => &mut player.state,
            Self::Npc(npc) => &mut npc.state,
        }
    }

    /// Returns true for the NPC variant.
    #[must_use]
    pub const fn is_npc(&self) -> bool {
        matches!(self, Self::Npc(_))
    }

    /// Returns whether this entity can currently attack or be attacked.
    ///
    /// Corpses are locked out of combat entirely.
    #[must_use]
    pub const fn is_combat_ready(&self) -> bool {
        match self {
            Self::Player(_) => true,
            Self::Npc(npc) => npc.is_active(),
        }
    }
}

impl Combatant for Entity {
    fn id(&self) -> EntityId {
        self.state().id()
    }

    fn name(&self) -> &str {
        self.state().name()
    }

    fn base_stat(&self, stat: &str) -> Option<i32> {
        self.state().base_stat(stat)
    }

    fn current_health(&self) -> i32 {
        self.state().current_health()
    }

    fn max_health(&self) -> i32 {
        self.state().max_health()
    }

    fn take_damage(&mut self, amount: i32) -> i32 {
        self.state_mut().take_damage(amount)
    }

    fn heal(&mut self, amount: i32) -> i32 {
        self.state_mut().heal(amount)
    }

    fn experience(&self) -> i32 {
        self.state().experience()
    }

    fn gain_experience(&mut self, amount: i32) -> i32 {
        self.state_mut().gain_experience(amount)
    }

    fn left_hand(&self) -> Option<&Item> {
        self.state().left_hand()
    }

    fn right_hand(&self) -> Option<&Item> {
        self.state().right_hand()
    }
}

// ============================================================================
// Derived stat view
// ============================================================================

/// Reads derived stats for a combatant through the stat effect engine.
pub struct StatView<'a> {
    engine: &'a StatEffectEngine,
    entity: &'a dyn Combatant,
}

impl<'a> StatView<'a> {
    /// Creates a view over the given combatant.
    #[must_use]
    pub fn new(engine: &'a StatEffectEngine, entity: &'a dyn Combatant) -> Self {
        Self { engine, entity }
    }

    /// Returns a stat after all live effects, falling back to the raw
    /// attribute default when the stat is undefined.
    #[must_use]
    pub fn stat(&self, name: &str) -> i32 {
        self.engine
            .calculate_stat(self.entity, name)
            .or_else(|| self.entity.base_stat(name))
            .unwrap_or(1)
    }

    /// Attack rating: agility + speed + weapons.
    #[must_use]
    pub fn attack_rating(&self) -> i32 {
        self.stat("agility") + self.stat("speed") + self.stat("weapons")
    }

    /// Defense rating: agility + speed, plus the shields skill when
    /// something occupies the left hand.
    #[must_use]
    pub fn defense_rating(&self) -> i32 {
        let shield_bonus = if self.entity.left_hand().is_some() {
            self.stat("shields")
        } else {
            0
        };
        self.stat("agility") + self.stat("speed") + shield_bonus
    }

    /// Derived power stat.
    #[must_use]
    pub fn power(&self) -> i32 {
        self.stat("power")
    }

    /// Speed of the equipped right-hand weapon, or the unarmed default.
    #[must_use]
    pub fn weapon_speed(&self) -> i32 {
        self.entity
            .right_hand()
            .and_then(Item::weapon_speed)
            .unwrap_or(DEFAULT_WEAPON_SPEED)
    }

    /// Collects the full derived stat sheet for display layers.
    #[must_use]
    pub fn summary(&self) -> StatSummary {
        StatSummary {
            power: self.stat("power"),
            agility: self.stat("agility"),
            speed: self.stat("speed"),
            vitality: self.stat("vitality"),
            resistance: self.stat("resistance"),
            focus: self.stat("focus"),
            discipline: self.stat("discipline"),
            intelligence: self.stat("intelligence"),
            wisdom: self.stat("wisdom"),
            charisma: self.stat("charisma"),
            attack: self.attack_rating(),
            defense: self.defense_rating(),
            current_health: self.entity.current_health(),
            max_health: self.entity.max_health(),
            experience: self.entity.experience(),
            weapons: self.stat("weapons"),
            shields: self.stat("shields"),
            armor: self.stat("armor"),
            physical_fitness: self.stat("physical_fitness"),
            combat_prowess: self.stat("combat_prowess"),
            evasive_maneuvers: self.stat("evasive_maneuvers"),
        }
    }
}

/// A combatant's derived stats, collected for display.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct StatSummary {
    /// Derived power.
    pub power: i32,
    /// Derived agility.
    pub agility: i32,
    /// Derived speed.
    pub speed: i32,
    /// Derived vitality.
    pub vitality: i32,
    /// Derived resistance.
    pub resistance: i32,
    /// Derived focus.
    pub focus: i32,
    /// Derived discipline.
    pub discipline: i32,
    /// Derived intelligence.
    pub intelligence: i32,
    /// Derived wisdom.
    pub wisdom: i32,
    /// Derived charisma.
    pub charisma: i32,
    /// Attack rating.
    pub attack: i32,
    /// Defense rating.
    pub defense: i32,
    /// Current health.
    pub current_health: i32,
    /// Maximum health.
    pub max_health: i32,
    /// Experience.
    pub experience: i32,
    /// Weapons skill.
    pub weapons: i32,
    /// Shields skill.
    pub shields: i32,
    /// Armor skill.
    pub armor: i32,
    /// Physical fitness skill.
    pub physical_fitness: i32,
    /// Combat prowess skill.
    pub combat_prowess: i32,
    /// Evasive maneuvers skill.
    pub evasive_maneuvers: i32,
}
