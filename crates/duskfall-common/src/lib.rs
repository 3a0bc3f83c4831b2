//! # Duskfall Common
//!
//! Common types shared across Duskfall subsystems.
//!
//! This crate provides the foundational types used by the combat core and
//! the surrounding world code:
//! - ID types (`EntityId`)
//! - Body locations for targeting, wounds, and scars
//! - Common error types
//! - Prelude for convenient imports

#![warn(missing_docs)]
#![warn(clippy::all)]
#![deny(clippy::unwrap_used)]

pub mod body;
pub mod error;
pub mod ids;

/// Prelude module for convenient imports
pub mod prelude {
    pub use crate::body::*;
    pub use crate::error::*;
    pub use crate::ids::*;
}

pub use prelude::*;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_entity_id_generation() {
        let id1 = EntityId::new();
        let id2 = EntityId::new();
        assert_ne!(id1, id2);
        assert!(id1.is_valid());
        assert!(!EntityId::NULL.is_valid());
    }

    #[test]
    fn test_body_part_parse_error_keeps_input() {
        let err = "elbow".parse::<BodyPart>().expect_err("should reject");
        assert_eq!(err.input(), "elbow");
    }
}
