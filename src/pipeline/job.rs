use serde::Serialize;

use crate::world::direction::Direction;

/// Where a move job should take its monster.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum MoveTarget {
    /// Already planned, in step order.
    Path(Vec<Direction>),
    /// Planned at dispatch time from the monster's current position.
    Geohash(String),
}

/// One action decided for a monster, waiting to be sent to the action API.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "job", rename_all = "snake_case")]
pub enum JobDescriptor {
    PerformAbility {
        monster: String,
        target: String,
        ability: String,
    },
    PerformAttack {
        monster: String,
        target: String,
    },
    PerformMove {
        monster: String,
        destination: MoveTarget,
    },
}

impl JobDescriptor {
    pub fn monster(&self) -> &str {
        match self {
            JobDescriptor::PerformAbility { monster, .. }
            | JobDescriptor::PerformAttack { monster, .. }
            | JobDescriptor::PerformMove { monster, .. } => monster,
        }
    }

    pub fn target(&self) -> Option<&str> {
        match self {
            JobDescriptor::PerformAbility { target, .. }
            | JobDescriptor::PerformAttack { target, .. } => Some(target),
            JobDescriptor::PerformMove { .. } => None,
        }
    }

    /// Entities whose state may change once this job succeeds.
    pub fn touched_entities(&self) -> Vec<&str> {
        let mut touched = vec![self.monster()];
        if let Some(target) = self.target() {
            if target != self.monster() {
                touched.push(target);
            }
        }
        touched
    }

    pub fn kind(&self) -> &'static str {
        match self {
            JobDescriptor::PerformAbility { .. } => "ability",
            JobDescriptor::PerformAttack { .. } => "attack",
            JobDescriptor::PerformMove { .. } => "move",
        }
    }
}
