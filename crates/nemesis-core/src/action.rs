//! Discrete fight-action space

use serde::{Deserialize, Serialize};

/// The nine discrete actions the policy can take.
///
/// Variant order matches the action indices the backbone was trained
/// with; do not reorder.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash)]
#[serde(rename_all = "PascalCase")]
pub enum FightAction {
    Idle,
    Left,
    Right,
    Jump,
    Crouch,
    Block,
    LightAttack,
    HeavyAttack,
    Special,
}

impl FightAction {
    /// Number of discrete actions.
    pub const COUNT: usize = 9;

    /// All actions in index order.
    pub const ALL: [FightAction; Self::COUNT] = [
        FightAction::Idle,
        FightAction::Left,
        FightAction::Right,
        FightAction::Jump,
        FightAction::Crouch,
        FightAction::Block,
        FightAction::LightAttack,
        FightAction::HeavyAttack,
        FightAction::Special,
    ];

    /// Action index as used on the wire and in experience records.
    pub fn index(self) -> usize {
        self as usize
    }

    /// Look up an action by wire index.
    pub fn from_index(index: usize) -> Option<Self> {
        Self::ALL.get(index).copied()
    }

    /// Short display name for intent overlays and logs.
    pub fn name(self) -> &'static str {
        match self {
            FightAction::Idle => "Idle",
            FightAction::Left => "Left",
            FightAction::Right => "Right",
            FightAction::Jump => "Jump",
            FightAction::Crouch => "Crouch",
            FightAction::Block => "Block",
            FightAction::LightAttack => "Light",
            FightAction::HeavyAttack => "Heavy",
            FightAction::Special => "Special",
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn index_round_trip() {
        for (i, action) in FightAction::ALL.iter().enumerate() {
            assert_eq!(action.index(), i);
            assert_eq!(FightAction::from_index(i), Some(*action));
        }
        assert_eq!(FightAction::from_index(FightAction::COUNT), None);
    }

    #[test]
    fn order_matches_training_indices() {
        assert_eq!(FightAction::Idle.index(), 0);
        assert_eq!(FightAction::Block.index(), 5);
        assert_eq!(FightAction::Special.index(), 8);
    }
}
