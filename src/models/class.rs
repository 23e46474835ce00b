use serde::{Deserialize, Serialize};

pub const MIN_DISTANCE_MODIFIER: f64 = 1.0;
pub const MAX_DISTANCE_MODIFIER: f64 = 1.33;
pub const MIN_REWARD_MODIFIER: f64 = 1.0;
pub const MAX_REWARD_MODIFIER: f64 = 1.5;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum CharacterClass {
    Warrior,
    Ranger,
    Monk,
    Rogue,
    Paladin,
    Mage,
}

impl CharacterClass {
    pub const ALL: [CharacterClass; 6] = [
        CharacterClass::Warrior,
        CharacterClass::Ranger,
        CharacterClass::Monk,
        CharacterClass::Rogue,
        CharacterClass::Paladin,
        CharacterClass::Mage,
    ];

    pub fn modifier(self) -> ClassModifier {
        ClassModifier::for_class(self)
    }
}

/// Per-archetype multipliers applied to distance and rewards.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ClassModifier {
    distance: f64,
    reward: f64,
}

impl Default for ClassModifier {
    fn default() -> Self {
        Self::UNMODIFIED
    }
}

impl ClassModifier {
    pub const UNMODIFIED: ClassModifier = ClassModifier {
        distance: 1.0,
        reward: 1.0,
    };

    /// Build a modifier, refusing values outside the supported ranges.
    pub fn new(distance: f64, reward: f64) -> Option<Self> {
        let distance_ok = (MIN_DISTANCE_MODIFIER..=MAX_DISTANCE_MODIFIER).contains(&distance);
        let reward_ok = (MIN_REWARD_MODIFIER..=MAX_REWARD_MODIFIER).contains(&reward);
        (distance_ok && reward_ok).then_some(Self { distance, reward })
    }

    pub fn for_class(class: CharacterClass) -> Self {
        let (distance, reward) = match class {
            CharacterClass::Warrior => (1.0, 1.2),
            CharacterClass::Ranger => (1.33, 1.0),
            CharacterClass::Monk => (1.1, 1.1),
            CharacterClass::Rogue => (1.2, 1.05),
            CharacterClass::Paladin => (1.05, 1.15),
            CharacterClass::Mage => (1.0, 1.0),
        };
        Self { distance, reward }
    }

    pub fn distance(&self) -> f64 {
        self.distance
    }

    pub fn reward(&self) -> f64 {
        self.reward
    }

    /// Scale a base reward, rounding down.
    pub fn scale_reward(&self, base: u64) -> u64 {
        (base as f64 * self.reward).floor() as u64
    }
}
