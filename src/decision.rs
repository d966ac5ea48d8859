use tracing::debug;

use crate::config::DungeonMasterConfig;
use crate::pathfinding::a_star;
use crate::pipeline::job::{JobDescriptor, MoveTarget};
use crate::world::abilities::{self, AbilityType};
use crate::world::bestiary;
use crate::world::direction::Direction;
use crate::world::entity::{Monster, Player};
use crate::world::geohash::{GeohashError, GridCell};
use crate::world::range::chebyshev;
use crate::world::terrain::{TerrainError, TerrainField};

/// Tunable thresholds for [`decide`].
#[derive(Debug, Clone, PartialEq)]
pub struct DecisionPolicy {
    /// Beyond this Chebyshev distance the monster ignores the player.
    pub disengage_range: i64,
    pub melee_range: i64,
    pub use_abilities: bool,
    /// Emit the player's geohash instead of a planned path.
    pub plan_at_dispatch: bool,
    pub max_path_iterations: usize,
}

impl Default for DecisionPolicy {
    fn default() -> Self {
        DecisionPolicy::from_config(&DungeonMasterConfig::default())
    }
}

impl DecisionPolicy {
    pub fn from_config(config: &DungeonMasterConfig) -> Self {
        DecisionPolicy {
            disengage_range: config.disengage_range,
            melee_range: config.melee_range,
            use_abilities: config.use_abilities,
            plan_at_dispatch: config.plan_at_dispatch,
            max_path_iterations: config.max_path_iterations,
        }
    }
}

#[derive(Debug)]
pub enum DecisionError {
    Geohash(GeohashError),
    Terrain(TerrainError),
    UnknownBeast { monster: String, beast: String },
    UnknownAbility { beast: String, ability: String },
    PrecisionMismatch { monster: usize, player: usize },
}

impl std::fmt::Display for DecisionError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            DecisionError::Geohash(e) => write!(f, "{}", e),
            DecisionError::Terrain(e) => write!(f, "{}", e),
            DecisionError::UnknownBeast { monster, beast } => {
                write!(f, "monster {} has unknown beast '{}'", monster, beast)
            }
            DecisionError::UnknownAbility { beast, ability } => {
                write!(f, "beast {} lists unknown ability '{}'", beast, ability)
            }
            DecisionError::PrecisionMismatch { monster, player } => write!(
                f,
                "monster geohash precision {} does not match player precision {}",
                monster, player
            ),
        }
    }
}

impl std::error::Error for DecisionError {}

impl From<GeohashError> for DecisionError {
    fn from(e: GeohashError) -> Self {
        DecisionError::Geohash(e)
    }
}

impl From<TerrainError> for DecisionError {
    fn from(e: TerrainError) -> Self {
        DecisionError::Terrain(e)
    }
}

/// Decide what `monster` does about `player`, if anything.
///
/// In order: ignore a player past the disengage range, cast the first
/// offensive ability in reach (when enabled), attack in melee range, otherwise
/// move toward the player. `Ok(None)` also covers "no path this cycle".
pub fn decide(
    monster: &Monster,
    player: &Player,
    policy: &DecisionPolicy,
    terrain: &TerrainField,
) -> Result<Option<JobDescriptor>, DecisionError> {
    let (Some(monster_geohash), Some(player_geohash)) = (monster.geohash(), player.geohash())
    else {
        return Ok(None);
    };

    let from = GridCell::from_geohash(monster_geohash)?;
    let to = GridCell::from_geohash(player_geohash)?;
    if from.precision != to.precision {
        return Err(DecisionError::PrecisionMismatch {
            monster: from.precision,
            player: to.precision,
        });
    }

    let distance = chebyshev(&from, &to);
    if distance > policy.disengage_range {
        return Ok(None);
    }

    let beast = bestiary::beast(&monster.beast).ok_or_else(|| DecisionError::UnknownBeast {
        monster: monster.id.clone(),
        beast: monster.beast.clone(),
    })?;

    if policy.use_abilities {
        for &id in beast.abilities(AbilityType::Offensive) {
            let ability = abilities::ability(id).ok_or_else(|| DecisionError::UnknownAbility {
                beast: beast.id.to_string(),
                ability: id.to_string(),
            })?;
            if distance <= ability.range {
                return Ok(Some(JobDescriptor::PerformAbility {
                    monster: monster.id.clone(),
                    target: player.id.clone(),
                    ability: ability.id.to_string(),
                }));
            }
        }
    }

    if distance <= policy.melee_range {
        return Ok(Some(JobDescriptor::PerformAttack {
            monster: monster.id.clone(),
            target: player.id.clone(),
        }));
    }

    if policy.plan_at_dispatch {
        return Ok(Some(JobDescriptor::PerformMove {
            monster: monster.id.clone(),
            destination: MoveTarget::Geohash(player_geohash.to_string()),
        }));
    }

    let path = plan_path(&from, &to, policy, terrain)?;
    if path.is_empty() {
        debug!(monster = %monster.id, player = %player.id, "No path toward player");
        return Ok(None);
    }
    Ok(Some(JobDescriptor::PerformMove {
        monster: monster.id.clone(),
        destination: MoveTarget::Path(path),
    }))
}

/// Path from `from` until within melee range of `to`, over the terrain.
pub fn plan_path(
    from: &GridCell,
    to: &GridCell,
    policy: &DecisionPolicy,
    terrain: &TerrainField,
) -> Result<Vec<Direction>, DecisionError> {
    if from.precision != terrain.unit_precision() {
        return Err(DecisionError::PrecisionMismatch {
            monster: from.precision,
            player: terrain.unit_precision(),
        });
    }
    let path = a_star(
        (from.row, from.col),
        (to.row, to.col),
        |r, c| terrain.traversal_cost(r, c),
        Some(policy.melee_range),
        policy.max_path_iterations,
    )?;
    Ok(path)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::world_seed::{ContinentSeed, WorldSeed};
    use crate::pathfinding::walk;
    use crate::world::geohash::col_row_to_geohash;
    use crate::world::topology::HeightTile;
    use std::collections::HashMap;

    const ORIGIN: &str = "w21z3m6k";

    fn terrain(intensity: u8) -> TerrainField {
        let mut seed = WorldSeed::default();
        seed.continents.insert(
            "w".to_string(),
            ContinentSeed {
                bio: 0.0,
                hostile: 1.0,
                water: 0.0,
            },
        );
        let field = TerrainField::new(seed, "/nonexistent", 8, 1024);
        field.insert_tile("w2", HeightTile::flat(16, 16, intensity));
        field
    }

    fn offset(dr: i64, dc: i64) -> String {
        let cell = GridCell::from_geohash(ORIGIN).unwrap();
        col_row_to_geohash(cell.col + dc, cell.row + dr, 8).unwrap()
    }

    fn monster(geohash: &str, beast: &str) -> Monster {
        Monster {
            id: "monster_1".to_string(),
            loc_type: "geohash".to_string(),
            loc: vec![geohash.to_string()],
            beast: beast.to_string(),
            skills: HashMap::new(),
        }
    }

    fn player(geohash: &str) -> Player {
        Player {
            id: "p1".to_string(),
            loc_type: "geohash".to_string(),
            loc: vec![geohash.to_string()],
            skills: HashMap::new(),
            logged_in: true,
        }
    }

    #[test]
    fn far_player_is_ignored() {
        let job = decide(
            &monster(&offset(0, 6), "goblin"),
            &player(ORIGIN),
            &DecisionPolicy::default(),
            &terrain(100),
        )
        .unwrap();
        assert_eq!(job, None);
    }

    #[test]
    fn adjacent_player_is_attacked() {
        let job = decide(
            &monster(&offset(1, 1), "goblin"),
            &player(ORIGIN),
            &DecisionPolicy::default(),
            &terrain(100),
        )
        .unwrap();
        assert_eq!(
            job,
            Some(JobDescriptor::PerformAttack {
                monster: "monster_1".into(),
                target: "p1".into(),
            })
        );
    }

    #[test]
    fn nearby_player_is_approached() {
        let start = offset(3, -4);
        let job = decide(
            &monster(&start, "goblin"),
            &player(ORIGIN),
            &DecisionPolicy::default(),
            &terrain(100),
        )
        .unwrap();

        let Some(JobDescriptor::PerformMove {
            destination: MoveTarget::Path(path),
            ..
        }) = job
        else {
            panic!("expected a planned move, got {:?}", job);
        };
        let from = GridCell::from_geohash(&start).unwrap();
        let to = GridCell::from_geohash(ORIGIN).unwrap();
        let (r, c) = walk((from.row, from.col), &path);
        assert!((r - to.row).abs() + (c - to.col).abs() <= 1);
    }

    #[test]
    fn deferred_planning_emits_geohash() {
        let policy = DecisionPolicy {
            plan_at_dispatch: true,
            ..DecisionPolicy::default()
        };
        let job = decide(&monster(&offset(3, 0), "goblin"), &player(ORIGIN), &policy, &terrain(100))
            .unwrap();
        assert_eq!(
            job,
            Some(JobDescriptor::PerformMove {
                monster: "monster_1".into(),
                destination: MoveTarget::Geohash(ORIGIN.into()),
            })
        );
    }

    #[test]
    fn flooded_terrain_has_no_move() {
        let job = decide(
            &monster(&offset(3, 0), "goblin"),
            &player(ORIGIN),
            &DecisionPolicy::default(),
            &terrain(0),
        )
        .unwrap();
        assert_eq!(job, None);
    }

    #[test]
    fn abilities_used_when_enabled() {
        let policy = DecisionPolicy {
            use_abilities: true,
            ..DecisionPolicy::default()
        };
        let job = decide(&monster(&offset(0, 1), "dragon"), &player(ORIGIN), &policy, &terrain(100))
            .unwrap();
        assert_eq!(
            job,
            Some(JobDescriptor::PerformAbility {
                monster: "monster_1".into(),
                target: "p1".into(),
                ability: "bite".into(),
            })
        );
    }

    #[test]
    fn unknown_beast_fails() {
        let err = decide(
            &monster(&offset(0, 1), "unicorn"),
            &player(ORIGIN),
            &DecisionPolicy::default(),
            &terrain(100),
        )
        .unwrap_err();
        assert!(matches!(err, DecisionError::UnknownBeast { .. }));
    }

    #[test]
    fn carried_monster_does_nothing() {
        let mut m = monster(ORIGIN, "goblin");
        m.loc_type = "inv".to_string();
        let job = decide(&m, &player(ORIGIN), &DecisionPolicy::default(), &terrain(100)).unwrap();
        assert_eq!(job, None);
    }

    #[test]
    fn mismatched_precision_fails() {
        let err = decide(
            &monster("w21z3m6", "goblin"),
            &player(ORIGIN),
            &DecisionPolicy::default(),
            &terrain(100),
        )
        .unwrap_err();
        assert!(matches!(err, DecisionError::PrecisionMismatch { .. }));
    }
}
