//! Body locations for targeting, wounds, and scars.

use crate::error::ParseBodyPartError;
use serde::{Deserialize, Serialize};
use std::str::FromStr;

/// A body location that can be aimed at, wounded, or scarred.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum BodyPart {
    /// Head.
    Head,
    /// Neck.
    Neck,
    /// Chest.
    Chest,
    /// Back.
    Back,
    /// Abdomen.
    Abdomen,
    /// Right arm.
    RightArm,
    /// Left arm.
    LeftArm,
    /// Right hand.
    RightHand,
    /// Left hand.
    LeftHand,
    /// Right leg.
    RightLeg,
    /// Left leg.
    LeftLeg,
    /// Right eye.
    RightEye,
    /// Left eye.
    LeftEye,
}

impl BodyPart {
    /// All valid body locations, in display order.
    pub const ALL: [Self; 13] = [
        Self::Head,
        Self::Neck,
        Self::Chest,
        Self::Back,
        Self::Abdomen,
        Self::RightArm,
        Self::LeftArm,
        Self::RightHand,
        Self::LeftHand,
        Self::RightLeg,
        Self::LeftLeg,
        Self::RightEye,
        Self::LeftEye,
    ];

    /// Returns the player-facing name, e.g. "right arm".
    #[must_use]
    pub const fn display_name(self) -> &'static str {
        match self {
            Self::Head => "head",
            Self::Neck => "neck",
            Self::Chest => "chest",
            Self::Back => "back",
            Self::Abdomen => "abdomen",
            Self::RightArm => "right arm",
            Self::LeftArm => "left arm",
            Self::RightHand => "right hand",
            Self::LeftHand => "left hand",
            Self::RightLeg => "right leg",
            Self::LeftLeg => "left leg",
            Self::RightEye => "right eye",
            Self::LeftEye => "left eye",
        }
    }
}

impl std::fmt::Display for BodyPart {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.display_name())
    }
}

impl FromStr for BodyPart {
    type Err = ParseBodyPartError;

    /// Parses either the display form ("right arm") or the key form
    /// ("right_arm"), case-insensitively.
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let normalized = s.trim().to_ascii_lowercase().replace('_', " ");
        Self::ALL
            .iter()
            .copied()
            .find(|part| part.display_name() == normalized)
            .ok_or_else(|| ParseBodyPartError::new(s))
    }
}
