use serde::Serialize;

use crate::world::abilities::AbilityType;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum Alignment {
    Good,
    Neutral,
    Evil,
}

/// Static data for one kind of monster.
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct Beast {
    pub id: &'static str,
    pub description: &'static str,
    pub offensive: &'static [&'static str],
    pub healing: &'static [&'static str],
    pub defensive: &'static [&'static str],
    pub neutral: &'static [&'static str],
    pub behaviours: &'static [&'static str],
    pub alignment: Alignment,
    pub spawn_hostile_threshold: f64,
}

impl Beast {
    pub fn abilities(&self, category: AbilityType) -> &'static [&'static str] {
        match category {
            AbilityType::Offensive => self.offensive,
            AbilityType::Healing => self.healing,
            AbilityType::Defensive => self.defensive,
            AbilityType::Neutral => self.neutral,
        }
    }
}

const BESTIARY: [Beast; 3] = [
    Beast {
        id: "goblin",
        description: "A small, green creature that loves to steal shiny things.",
        offensive: &["scratch"],
        healing: &["bandage"],
        defensive: &[],
        neutral: &[],
        behaviours: &[],
        alignment: Alignment::Evil,
        spawn_hostile_threshold: 0.1,
    },
    Beast {
        id: "giantSpider",
        description: "A huge spider that can paralyze its prey.",
        offensive: &["bite", "paralyze"],
        healing: &[],
        defensive: &[],
        neutral: &[],
        behaviours: &[],
        alignment: Alignment::Neutral,
        spawn_hostile_threshold: 0.1,
    },
    Beast {
        id: "dragon",
        description: "A huge, fire-breathing lizard.",
        offensive: &["bite", "breathFire"],
        healing: &[],
        defensive: &["blind"],
        neutral: &[],
        behaviours: &[],
        alignment: Alignment::Evil,
        spawn_hostile_threshold: 0.5,
    },
];

pub fn beast(id: &str) -> Option<&'static Beast> {
    BESTIARY.iter().find(|b| b.id == id)
}
