use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum AbilityType {
    Offensive,
    Healing,
    Defensive,
    Neutral,
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct Ability {
    pub id: &'static str,
    pub ability_type: AbilityType,
    pub description: &'static str,
    /// Chebyshev reach in unit cells.
    pub range: i64,
    pub aoe: i64,
}

const ABILITIES: [Ability; 6] = [
    Ability {
        id: "scratch",
        ability_type: AbilityType::Offensive,
        description: "Scratches the player.",
        range: 1,
        aoe: 0,
    },
    Ability {
        id: "bite",
        ability_type: AbilityType::Offensive,
        description: "Bites the player.",
        range: 1,
        aoe: 0,
    },
    Ability {
        id: "paralyze",
        ability_type: AbilityType::Offensive,
        description: "Paralyzes the player.",
        range: 1,
        aoe: 0,
    },
    Ability {
        id: "breathFire",
        ability_type: AbilityType::Offensive,
        description: "Breathes fire possibly burning the player.",
        range: 1,
        aoe: 1,
    },
    Ability {
        id: "blind",
        ability_type: AbilityType::Offensive,
        description: "Blinds the player.",
        range: 1,
        aoe: 0,
    },
    Ability {
        id: "bandage",
        ability_type: AbilityType::Healing,
        description: "Bandages the player's wounds.",
        range: 1,
        aoe: 0,
    },
];

pub fn ability(id: &str) -> Option<&'static Ability> {
    ABILITIES.iter().find(|a| a.id == id)
}

pub fn all() -> &'static [Ability] {
    &ABILITIES
}
