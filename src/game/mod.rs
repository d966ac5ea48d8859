pub mod api;
pub mod memory;

use async_trait::async_trait;

use crate::world::direction::Direction;
use crate::world::entity::{Entity, Player};
use crate::world::geohash::{GeohashError, geohashes_nearby};

pub use api::HttpActionApi;
pub use memory::{DryRunActionApi, MemoryWorld};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum EntityKind {
    Player,
    Monster,
    Item,
}

/// Store namespace an entity id lives in.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum EntityNamespace {
    Player,
    Monster,
    Item,
}

impl EntityNamespace {
    pub fn for_id(id: &str) -> Self {
        if id.starts_with("monster") {
            EntityNamespace::Monster
        } else if id.starts_with("item") {
            EntityNamespace::Item
        } else {
            EntityNamespace::Player
        }
    }

    pub fn prefix(self) -> &'static str {
        match self {
            EntityNamespace::Player => "Player",
            EntityNamespace::Monster => "Monster",
            EntityNamespace::Item => "Item",
        }
    }
}

/// One window of a paginated index query.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Page {
    pub offset: usize,
    pub size: usize,
}

/// Which entity types a proximity query asks for. Exactly one must be set.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct NearbyQuery {
    pub players: bool,
    pub monsters: bool,
    pub items: bool,
}

impl NearbyQuery {
    pub fn players() -> Self {
        NearbyQuery {
            players: true,
            ..NearbyQuery::default()
        }
    }

    pub fn monsters() -> Self {
        NearbyQuery {
            monsters: true,
            ..NearbyQuery::default()
        }
    }

    pub fn items() -> Self {
        NearbyQuery {
            items: true,
            ..NearbyQuery::default()
        }
    }

    pub fn kind(&self) -> Result<EntityKind, IndexError> {
        match (self.players, self.monsters, self.items) {
            (true, false, false) => Ok(EntityKind::Player),
            (false, true, false) => Ok(EntityKind::Monster),
            (false, false, true) => Ok(EntityKind::Item),
            (false, false, false) => Err(IndexError::EmptyQuery),
            _ => Err(IndexError::AmbiguousQuery),
        }
    }
}

#[derive(Debug)]
pub enum IndexError {
    /// More than one entity type requested in one query.
    AmbiguousQuery,
    EmptyQuery,
    Geohash(GeohashError),
    Backend(String),
}

impl std::fmt::Display for IndexError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            IndexError::AmbiguousQuery => {
                write!(f, "choose only a single entity type to query")
            }
            IndexError::EmptyQuery => write!(f, "query either players, monsters or items"),
            IndexError::Geohash(e) => write!(f, "{}", e),
            IndexError::Backend(msg) => write!(f, "index backend error: {}", msg),
        }
    }
}

impl std::error::Error for IndexError {}

impl From<GeohashError> for IndexError {
    fn from(e: GeohashError) -> Self {
        IndexError::Geohash(e)
    }
}

#[derive(Debug)]
pub enum ApiError {
    Status {
        endpoint: String,
        status: u16,
        body: String,
    },
    Transport(String),
    /// Rejected locally before any request was made.
    Rejected(String),
}

impl std::fmt::Display for ApiError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            ApiError::Status {
                endpoint,
                status,
                body,
            } => write!(f, "{} returned status {}: {}", endpoint, status, body),
            ApiError::Transport(msg) => write!(f, "request failed: {}", msg),
            ApiError::Rejected(msg) => write!(f, "action rejected: {}", msg),
        }
    }
}

impl std::error::Error for ApiError {}

impl From<reqwest::Error> for ApiError {
    fn from(e: reqwest::Error) -> Self {
        ApiError::Transport(e.to_string())
    }
}

/// Spatial search over entity documents.
#[async_trait]
pub trait EntityIndex: Send + Sync {
    async fn logged_in_players(&self, page: Page) -> Result<Vec<Player>, IndexError>;

    /// Entities of `kind` on the map whose geohash starts with any of `prefixes`.
    async fn entities_in(
        &self,
        kind: EntityKind,
        prefixes: &[String],
        page: Page,
    ) -> Result<Vec<Entity>, IndexError>;

    /// Colliding entities located in or under `geohash`.
    async fn count_colliders(&self, geohash: &str) -> Result<usize, IndexError>;
}

/// Point lookup of entity documents by id.
#[async_trait]
pub trait EntityStore: Send + Sync {
    async fn fetch(
        &self,
        namespace: EntityNamespace,
        id: &str,
    ) -> Result<Option<Entity>, IndexError>;
}

/// The game backend that executes monster actions.
#[async_trait]
pub trait ActionApi: Send + Sync {
    async fn move_monster(&self, monster: &str, path: &[Direction]) -> Result<(), ApiError>;

    async fn perform_ability(
        &self,
        monster: &str,
        target: &str,
        ability: &str,
    ) -> Result<(), ApiError>;

    async fn perform_attack(&self, monster: &str, target: &str) -> Result<(), ApiError>;

    async fn respawn_monsters(&self) -> Result<(), ApiError>;
}

/// Fetch an entity, routing the id to its namespace.
pub async fn fetch_entity(
    store: &dyn EntityStore,
    id: &str,
) -> Result<Option<Entity>, IndexError> {
    store.fetch(EntityNamespace::for_id(id), id).await
}

/// Every logged-in player, paging until a short page.
pub async fn all_logged_in_players(
    index: &dyn EntityIndex,
    page_size: usize,
) -> Result<Vec<Player>, IndexError> {
    let mut players = Vec::new();
    let mut offset = 0;
    loop {
        let page = index
            .logged_in_players(Page {
                offset,
                size: page_size,
            })
            .await?;
        let count = page.len();
        players.extend(page);
        if count < page_size {
            return Ok(players);
        }
        offset += count;
    }
}

/// Entities of the requested type in the cell containing `geohash` at
/// `precision` and the cells around it.
pub async fn nearby_entities(
    index: &dyn EntityIndex,
    geohash: &str,
    query: NearbyQuery,
    precision: usize,
    page_size: usize,
) -> Result<Vec<Entity>, IndexError> {
    let kind = query.kind()?;
    let prefix: String = geohash.chars().take(precision).collect();
    let prefixes = geohashes_nearby(&prefix)?;

    let mut entities = Vec::new();
    let mut offset = 0;
    loop {
        let page = index
            .entities_in(
                kind,
                &prefixes,
                Page {
                    offset,
                    size: page_size,
                },
            )
            .await?;
        let count = page.len();
        entities.extend(page);
        if count < page_size {
            return Ok(entities);
        }
        offset += count;
    }
}

pub async fn has_colliders(index: &dyn EntityIndex, geohash: &str) -> Result<bool, IndexError> {
    Ok(index.count_colliders(geohash).await? > 0)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn namespace_routing() {
        assert_eq!(EntityNamespace::for_id("monster_goblin1"), EntityNamespace::Monster);
        assert_eq!(EntityNamespace::for_id("item_potion"), EntityNamespace::Item);
        assert_eq!(EntityNamespace::for_id("p1"), EntityNamespace::Player);
        assert_eq!(EntityNamespace::for_id(""), EntityNamespace::Player);
    }

    #[test]
    fn query_must_name_one_kind() {
        assert_eq!(NearbyQuery::monsters().kind().unwrap(), EntityKind::Monster);
        assert!(matches!(
            NearbyQuery::default().kind(),
            Err(IndexError::EmptyQuery)
        ));
        let both = NearbyQuery {
            players: true,
            monsters: true,
            items: false,
        };
        assert!(matches!(both.kind(), Err(IndexError::AmbiguousQuery)));
    }
}
