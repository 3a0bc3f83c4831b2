//! Attack resolution math.
//!
//! Pure functions shared by the resolver and its tests: end-roll
//! computation, the power-assist boundary, damage floors, and the
//! vulnerability tables. No state, no randomness; the resolver supplies
//! the rolls.

use serde::{Deserialize, Serialize};

/// The two opposed d100 rolls drawn for one attack.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct AttackRolls {
    /// Attacker's roll, uniform in 1..=100.
    pub attacker: i32,
    /// Defender's roll, uniform in 1..=100.
    pub defender: i32,
}

/// Why a miss missed, for messaging.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum MissKind {
    /// The attacker's power advantage was checked and fell short; no
    /// vulnerability roll follows.
    PowerChecked,
    /// A plain miss; the attacker may be left vulnerable.
    Plain,
}

/// Outcome of one resolved attack.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum HitOutcome {
    /// The roll alone carried the attack.
    Clean {
        /// Damage to deal, never less than 1.
        damage: i32,
    },
    /// The attack only landed through the attacker's power advantage.
    PowerAssisted {
        /// Damage to deal, never less than 1.
        damage: i32,
    },
    /// The attack missed.
    Miss {
        /// Which way it missed.
        kind: MissKind,
    },
}

impl HitOutcome {
    /// Returns whether the attack landed.
    #[must_use]
    pub const fn is_hit(&self) -> bool {
        matches!(self, Self::Clean { .. } | Self::PowerAssisted { .. })
    }

    /// Returns the damage to deal (0 on a miss).
    #[must_use]
    pub const fn damage(&self) -> i32 {
        match self {
            Self::Clean { damage } | Self::PowerAssisted { damage } => *damage,
            Self::Miss { .. } => 0,
        }
    }
}

/// A fully resolved attack with its intermediate values.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct HitResolution {
    /// attack_total - defense_total; the primary hit/miss signal.
    pub end_roll: i32,
    /// max(0, attacker power - defender power).
    pub power_diff: i32,
    /// The outcome.
    pub outcome: HitOutcome,
}

/// Resolves one attack from ratings, powers, and rolls.
///
/// A positive end roll is a hit for that amount. A non-positive end roll
/// may still land when the attacker's power advantage pushes
/// `end_roll + power_diff` to at least 1; such hits deal the power
/// difference instead of the end roll. Everything else misses.
#[must_use]
pub fn resolve_attack(
    attack_base: i32,
    defense_base: i32,
    attacker_power: i32,
    defender_power: i32,
    rolls: AttackRolls,
) -> HitResolution {
    let attack_total = attack_base + rolls.attacker;
    let defense_total = defense_base + rolls.defender;
    let end_roll = attack_total - defense_total;
    let power_diff = (attacker_power - defender_power).max(0);

    let outcome = if end_roll > 0 {
        HitOutcome::Clean {
            damage: end_roll.max(1),
        }
    } else if end_roll + power_diff >= 1 {
        HitOutcome::PowerAssisted {
            damage: power_diff.max(1),
        }
    } else {
        HitOutcome::Miss {
            kind: if power_diff > 0 {
                MissKind::PowerChecked
            } else {
                MissKind::Plain
            },
        }
    };

    HitResolution {
        end_roll,
        power_diff,
        outcome,
    }
}

/// Applies a vulnerability defense multiplier, truncating toward zero.
#[must_use]
pub fn apply_defense_modifier(defense_base: i32, modifier: f64) -> i32 {
    (f64::from(defense_base) * modifier) as i32
}

/// Chance in [0, 1] that a plain miss leaves the attacker vulnerable.
///
/// Keyed by the weapon finesse talent; only finesse 0 is reachable until
/// the talent system lands, so the higher breakpoints are uncalibrated.
#[must_use]
pub fn vulnerability_chance(finesse: i32) -> f64 {
    match finesse {
        i32::MIN..=1 => 0.5,
        2..=3 => 0.4,
        _ => 0.3,
    }
}

/// Duration in seconds of a vulnerability window.
///
/// Scales with the attacker's weapon speed; finesse shortens it. Never
/// below one second.
#[must_use]
pub fn vulnerability_duration(weapon_speed: i32, finesse: i32) -> f64 {
    let base = f64::from(weapon_speed) * 0.5;
    (base - f64::from(finesse) * 0.1 * base).max(1.0)
}

/// Defense reduction percentage of a vulnerability window, clamped 0-50.
#[must_use]
pub fn vulnerability_reduction(finesse: i32) -> f64 {
    f64::from(50 - finesse * 10).clamp(0.0, 50.0)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_standard_hit_scenario() {
        // attack_base 12 vs defense_base 6, rolls 50/10:
        // attack_total 62, defense_total 16, end_roll 46 -> hit for 46
        let resolution = resolve_attack(
            12,
            6,
            1,
            1,
            AttackRolls {
                attacker: 50,
                defender: 10,
            },
        );
        assert_eq!(resolution.end_roll, 46);
        assert_eq!(resolution.outcome, HitOutcome::Clean { damage: 46 });
    }

    #[test]
    fn test_positive_end_roll_always_hits() {
        let resolution = resolve_attack(
            10,
            10,
            1,
            1,
            AttackRolls {
                attacker: 2,
                defender: 1,
            },
        );
        assert_eq!(resolution.end_roll, 1);
        assert!(resolution.outcome.is_hit());
        assert_eq!(resolution.outcome.damage(), 1);
    }

    #[test]
    fn test_power_assist_boundary() {
        // end_roll -4, power_diff 5: -4 + 5 == 1 -> power-assisted hit
        let resolution = resolve_attack(
            10,
            10,
            6,
            1,
            AttackRolls {
                attacker: 3,
                defender: 7,
            },
        );
        assert_eq!(resolution.end_roll, -4);
        assert_eq!(resolution.power_diff, 5);
        assert_eq!(resolution.outcome, HitOutcome::PowerAssisted { damage: 5 });
    }

    #[test]
    fn test_power_assist_falls_short() {
        // end_roll -5, power_diff 5: -5 + 5 == 0 < 1 -> power-checked miss
        let resolution = resolve_attack(
            10,
            10,
            6,
            1,
            AttackRolls {
                attacker: 3,
                defender: 8,
            },
        );
        assert_eq!(
            resolution.outcome,
            HitOutcome::Miss {
                kind: MissKind::PowerChecked
            }
        );
    }

    #[test]
    fn test_plain_miss_without_power_advantage() {
        let resolution = resolve_attack(
            5,
            20,
            1,
            4,
            AttackRolls {
                attacker: 10,
                defender: 50,
            },
        );
        assert_eq!(resolution.power_diff, 0);
        assert_eq!(
            resolution.outcome,
            HitOutcome::Miss {
                kind: MissKind::Plain
            }
        );
    }

    #[test]
    fn test_zero_end_roll_is_not_a_standard_hit() {
        let resolution = resolve_attack(
            10,
            10,
            1,
            1,
            AttackRolls {
                attacker: 5,
                defender: 5,
            },
        );
        assert_eq!(resolution.end_roll, 0);
        assert!(!resolution.outcome.is_hit());
    }

    #[test]
    fn test_damage_floor_of_one() {
        // end_roll 0, power_diff 1: boundary hit deals max(1, 1) = 1
        let resolution = resolve_attack(
            10,
            10,
            2,
            1,
            AttackRolls {
                attacker: 5,
                defender: 5,
            },
        );
        assert_eq!(resolution.outcome, HitOutcome::PowerAssisted { damage: 1 });
    }

    #[test]
    fn test_defense_modifier_truncates_toward_zero() {
        assert_eq!(apply_defense_modifier(10, 0.5), 5);
        assert_eq!(apply_defense_modifier(7, 0.5), 3);
        assert_eq!(apply_defense_modifier(10, 0.0), 0);
        assert_eq!(apply_defense_modifier(10, 1.0), 10);
    }

    #[test]
    fn test_vulnerability_chance_breakpoints() {
        assert_eq!(vulnerability_chance(0), 0.5);
        assert_eq!(vulnerability_chance(1), 0.5);
        assert_eq!(vulnerability_chance(2), 0.4);
        assert_eq!(vulnerability_chance(3), 0.4);
        assert_eq!(vulnerability_chance(4), 0.3);
        assert_eq!(vulnerability_chance(9), 0.3);
    }

    #[test]
    fn test_vulnerability_duration() {
        // Unarmed default speed 5, finesse 0: 2.5 seconds
        assert_eq!(vulnerability_duration(5, 0), 2.5);
        // Slow weapon
        assert_eq!(vulnerability_duration(8, 0), 4.0);
        // Floor of one second
        assert_eq!(vulnerability_duration(1, 0), 1.0);
        // Finesse shortens the window: 4.0 * (1 - 0.2) = 3.2
        assert!((vulnerability_duration(8, 2) - 3.2).abs() < 1e-9);
    }

    #[test]
    fn test_vulnerability_reduction_clamps() {
        assert_eq!(vulnerability_reduction(0), 50.0);
        assert_eq!(vulnerability_reduction(2), 30.0);
        assert_eq!(vulnerability_reduction(5), 0.0);
        assert_eq!(vulnerability_reduction(9), 0.0);
        assert_eq!(vulnerability_reduction(-1), 50.0);
    }
}
