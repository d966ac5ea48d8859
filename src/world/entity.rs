use serde::{Deserialize, Serialize};
use std::collections::HashMap;

/// Location tag for an entity standing on the map.
pub const GEOHASH_LOCATION: &str = "geohash";

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Player {
    #[serde(rename = "player")]
    pub id: String,
    #[serde(rename = "locT")]
    pub loc_type: String,
    pub loc: Vec<String>,
    #[serde(default)]
    pub skills: HashMap<String, u32>,
    #[serde(rename = "lgn", default)]
    pub logged_in: bool,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Monster {
    #[serde(rename = "monster")]
    pub id: String,
    #[serde(rename = "locT")]
    pub loc_type: String,
    pub loc: Vec<String>,
    pub beast: String,
    #[serde(default)]
    pub skills: HashMap<String, u32>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Item {
    #[serde(rename = "item")]
    pub id: String,
    #[serde(rename = "locT")]
    pub loc_type: String,
    pub loc: Vec<String>,
    #[serde(default)]
    pub prop: String,
    #[serde(rename = "cld", default)]
    pub collider: bool,
}

/// Any located thing in the world. Documents are told apart by which id key
/// (`player`, `monster`, `item`) they carry.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum Entity {
    Player(Player),
    Monster(Monster),
    Item(Item),
}

/// Where an entity is: on a map cell, or carried by another entity.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Location<'a> {
    Geohash(&'a str),
    Carried { container: &'a str },
}

fn location<'a>(loc_type: &str, loc: &'a [String]) -> Location<'a> {
    let first = loc.first().map(String::as_str).unwrap_or_default();
    if loc_type == GEOHASH_LOCATION {
        Location::Geohash(first)
    } else {
        Location::Carried { container: first }
    }
}

impl Entity {
    pub fn id(&self) -> &str {
        match self {
            Entity::Player(p) => &p.id,
            Entity::Monster(m) => &m.id,
            Entity::Item(i) => &i.id,
        }
    }

    pub fn location(&self) -> Location<'_> {
        match self {
            Entity::Player(p) => location(&p.loc_type, &p.loc),
            Entity::Monster(m) => location(&m.loc_type, &m.loc),
            Entity::Item(i) => location(&i.loc_type, &i.loc),
        }
    }

    /// The geohash the entity stands on, if it is on the map.
    pub fn geohash(&self) -> Option<&str> {
        match self.location() {
            Location::Geohash(g) if !g.is_empty() => Some(g),
            _ => None,
        }
    }
}

impl Player {
    pub fn geohash(&self) -> Option<&str> {
        match location(&self.loc_type, &self.loc) {
            Location::Geohash(g) if !g.is_empty() => Some(g),
            _ => None,
        }
    }
}

impl Monster {
    pub fn geohash(&self) -> Option<&str> {
        match location(&self.loc_type, &self.loc) {
            Location::Geohash(g) if !g.is_empty() => Some(g),
            _ => None,
        }
    }
}

impl From<Player> for Entity {
    fn from(p: Player) -> Self {
        Entity::Player(p)
    }
}

impl From<Monster> for Entity {
    fn from(m: Monster) -> Self {
        Entity::Monster(m)
    }
}

impl From<Item> for Entity {
    fn from(i: Item) -> Self {
        Entity::Item(i)
    }
}
