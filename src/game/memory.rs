use std::collections::BTreeMap;
use std::path::Path;
use std::sync::{Arc, RwLock};

use async_trait::async_trait;
use tracing::info;

use super::{ActionApi, ApiError, EntityIndex, EntityKind, EntityNamespace, EntityStore, IndexError, Page};
use crate::world::direction::Direction;
use crate::world::entity::{Entity, GEOHASH_LOCATION, Player};
use crate::world::geohash::neighbour;

/// In-process entity index and store, loaded from a JSON fixture.
///
/// Entities are kept ordered by id so pagination is stable.
#[derive(Default)]
pub struct MemoryWorld {
    entities: RwLock<BTreeMap<String, Entity>>,
}

impl MemoryWorld {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn from_entities(entities: impl IntoIterator<Item = Entity>) -> Self {
        let world = Self::new();
        for entity in entities {
            world.upsert(entity);
        }
        world
    }

    /// Load a JSON array of entity documents.
    pub fn from_json_file(path: &Path) -> Result<Self, String> {
        let content = std::fs::read_to_string(path)
            .map_err(|e| format!("Cannot read {}: {}", path.display(), e))?;
        let entities: Vec<Entity> = serde_json::from_str(&content)
            .map_err(|e| format!("Invalid entity JSON in {}: {}", path.display(), e))?;
        Ok(Self::from_entities(entities))
    }

    pub fn upsert(&self, entity: Entity) {
        let mut entities = self.entities.write().unwrap_or_else(|e| e.into_inner());
        entities.insert(entity.id().to_string(), entity);
    }

    pub fn remove(&self, id: &str) -> Option<Entity> {
        let mut entities = self.entities.write().unwrap_or_else(|e| e.into_inner());
        entities.remove(id)
    }

    pub fn get(&self, id: &str) -> Option<Entity> {
        let entities = self.entities.read().unwrap_or_else(|e| e.into_inner());
        entities.get(id).cloned()
    }

    pub fn len(&self) -> usize {
        self.entities.read().unwrap_or_else(|e| e.into_inner()).len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Step a monster along `path`. Stops early at a pole.
    pub fn walk_monster(&self, id: &str, path: &[Direction]) -> Result<(), ApiError> {
        let mut entities = self.entities.write().unwrap_or_else(|e| e.into_inner());
        let Some(Entity::Monster(monster)) = entities.get_mut(id) else {
            return Err(ApiError::Rejected(format!("no monster {}", id)));
        };
        let Some(mut geohash) = monster.geohash().map(str::to_string) else {
            return Err(ApiError::Rejected(format!("monster {} is not on the map", id)));
        };
        for &direction in path {
            match neighbour(&geohash, direction) {
                Ok(Some(next)) => geohash = next,
                Ok(None) => break,
                Err(e) => return Err(ApiError::Rejected(e.to_string())),
            }
        }
        monster.loc = vec![geohash];
        Ok(())
    }

    fn page_of<T>(items: Vec<T>, page: Page) -> Vec<T> {
        items.into_iter().skip(page.offset).take(page.size).collect()
    }
}

fn matches_kind(entity: &Entity, kind: EntityKind) -> bool {
    matches!(
        (entity, kind),
        (Entity::Player(_), EntityKind::Player)
            | (Entity::Monster(_), EntityKind::Monster)
            | (Entity::Item(_), EntityKind::Item)
    )
}

#[async_trait]
impl EntityIndex for MemoryWorld {
    async fn logged_in_players(&self, page: Page) -> Result<Vec<Player>, IndexError> {
        let players: Vec<Player> = {
            let entities = self.entities.read().unwrap_or_else(|e| e.into_inner());
            entities
                .values()
                .filter_map(|e| match e {
                    Entity::Player(p) if p.logged_in => Some(p.clone()),
                    _ => None,
                })
                .collect()
        };
        Ok(Self::page_of(players, page))
    }

    async fn entities_in(
        &self,
        kind: EntityKind,
        prefixes: &[String],
        page: Page,
    ) -> Result<Vec<Entity>, IndexError> {
        let found: Vec<Entity> = {
            let entities = self.entities.read().unwrap_or_else(|e| e.into_inner());
            entities
                .values()
                .filter(|e| matches_kind(e, kind))
                .filter(|e| {
                    e.geohash()
                        .is_some_and(|g| prefixes.iter().any(|p| g.starts_with(p.as_str())))
                })
                .cloned()
                .collect()
        };
        Ok(Self::page_of(found, page))
    }

    async fn count_colliders(&self, geohash: &str) -> Result<usize, IndexError> {
        let entities = self.entities.read().unwrap_or_else(|e| e.into_inner());
        Ok(entities
            .values()
            .filter(|e| match e {
                Entity::Item(item) => {
                    item.collider
                        && item.loc_type == GEOHASH_LOCATION
                        && item.loc.first().is_some_and(|g| g.starts_with(geohash))
                }
                _ => false,
            })
            .count())
    }
}

#[async_trait]
impl EntityStore for MemoryWorld {
    async fn fetch(
        &self,
        namespace: EntityNamespace,
        id: &str,
    ) -> Result<Option<Entity>, IndexError> {
        Ok(self
            .get(id)
            .filter(|e| EntityNamespace::for_id(e.id()) == namespace))
    }
}

/// Action API that only logs, optionally applying moves to a [`MemoryWorld`].
#[derive(Default)]
pub struct DryRunActionApi {
    world: Option<Arc<MemoryWorld>>,
}

impl DryRunActionApi {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn applying_to(world: Arc<MemoryWorld>) -> Self {
        DryRunActionApi { world: Some(world) }
    }
}

#[async_trait]
impl ActionApi for DryRunActionApi {
    async fn move_monster(&self, monster: &str, path: &[Direction]) -> Result<(), ApiError> {
        let steps: Vec<&str> = path.iter().map(|d| d.as_str()).collect();
        info!(monster, path = ?steps, "Dry run: move");
        match &self.world {
            Some(world) => world.walk_monster(monster, path),
            None => Ok(()),
        }
    }

    async fn perform_ability(
        &self,
        monster: &str,
        target: &str,
        ability: &str,
    ) -> Result<(), ApiError> {
        info!(monster, target, ability, "Dry run: ability");
        Ok(())
    }

    async fn perform_attack(&self, monster: &str, target: &str) -> Result<(), ApiError> {
        info!(monster, target, "Dry run: attack");
        Ok(())
    }

    async fn respawn_monsters(&self) -> Result<(), ApiError> {
        info!("Dry run: respawn monsters");
        Ok(())
    }
}
