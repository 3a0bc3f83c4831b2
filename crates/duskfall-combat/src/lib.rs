//! # Duskfall Combat
//!
//! Combat resolution and timing core for Duskfall.
//!
//! This crate provides the real-time combat state machine shared by
//! players and hostile NPCs:
//! - Attack resolution (opposed rolls, the power check, damage, death)
//! - Roundtime locks and vulnerability windows driven by a shared
//!   once-per-second tick
//! - Timed and permanent stat effects with cached derived values
//! - Entity storage, combat events, and the messaging/lifecycle seams
//!   the surrounding world code plugs into
//!
//! Everything is wired by explicit construction: build a [`GameClock`],
//! a [`StatEffectEngine`], a [`CombatTimers`] table, and a
//! [`CombatResolver`] once, and drive the timer/effect/corpse ticks from
//! whatever owns the game loop.
//!
//! [`GameClock`]: clock::GameClock
//! [`StatEffectEngine`]: effects::StatEffectEngine
//! [`CombatTimers`]: timers::CombatTimers
//! [`CombatResolver`]: resolver::CombatResolver

#![warn(missing_docs)]
#![warn(clippy::all)]
#![deny(clippy::unwrap_used)]

pub mod clock;
pub mod combatant;
pub mod effects;
pub mod events;
pub mod hit;
pub mod lifecycle;
pub mod registry;
pub mod resolver;
pub mod timers;

/// Prelude for convenient imports
pub mod prelude {
    pub use crate::clock::*;
    pub use crate::combatant::*;
    pub use crate::effects::*;
    pub use crate::events::*;
    pub use crate::hit::*;
    pub use crate::lifecycle::*;
    pub use crate::registry::*;
    pub use crate::resolver::*;
    pub use crate::timers::*;
}

pub use prelude::*;
