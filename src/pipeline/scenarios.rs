use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use std::time::Duration;

use async_trait::async_trait;
use tokio::sync::Notify;

use crate::config::{ContinentSeed, WorldSeed};
use crate::decision::DecisionPolicy;
use crate::game::{
    ActionApi, ApiError, DryRunActionApi, EntityIndex, EntityKind, EntityStore, IndexError,
    MemoryWorld, Page,
};
use crate::pipeline::{Collaborators, JobDescriptor, MoveTarget, PipelineSettings, TickPipeline};
use crate::world::direction::Direction;
use crate::world::entity::{Entity, Player};
use crate::world::geohash::{GridCell, col_row_to_geohash};
use crate::world::range::chebyshev;
use crate::world::terrain::TerrainField;
use crate::world::topology::HeightTile;

const PLAYER_CELL: &str = "w21z3m6k";

fn terrain() -> Arc<TerrainField> {
    let mut seed = WorldSeed::default();
    seed.continents.insert(
        "w".to_string(),
        ContinentSeed {
            bio: 0.0,
            hostile: 1.0,
            water: 0.0,
        },
    );
    let field = TerrainField::new(seed, "/nonexistent", 8, 4096);
    field.insert_tile("w2", HeightTile::flat(16, 16, 100));
    Arc::new(field)
}

/// Geohash `dcol` columns and `drow` rows away from the player's cell.
fn offset(dcol: i64, drow: i64) -> String {
    let cell = GridCell::from_geohash(PLAYER_CELL).unwrap();
    col_row_to_geohash(cell.col + dcol, cell.row + drow, 8).unwrap()
}

fn world(monsters: &[(&str, String)]) -> Arc<MemoryWorld> {
    let mut docs = vec![serde_json::json!(
        {"player": "p1", "locT": "geohash", "loc": [PLAYER_CELL], "lgn": true}
    )];
    for (id, geohash) in monsters {
        docs.push(serde_json::json!(
            {"monster": id, "locT": "geohash", "loc": [geohash], "beast": "goblin"}
        ));
    }
    let entities: Vec<Entity> = serde_json::from_value(serde_json::Value::Array(docs)).unwrap();
    Arc::new(MemoryWorld::from_entities(entities))
}

fn pipeline_with(
    index: Arc<dyn EntityIndex>,
    store: Arc<dyn EntityStore>,
    api: Arc<dyn ActionApi>,
    settings: PipelineSettings,
) -> TickPipeline {
    TickPipeline::new(
        Collaborators { index, store, api },
        terrain(),
        DecisionPolicy::default(),
        settings,
    )
}

fn dry_run_pipeline(world: Arc<MemoryWorld>) -> TickPipeline {
    pipeline_with(
        world.clone(),
        world.clone(),
        Arc::new(DryRunActionApi::applying_to(world)),
        PipelineSettings::default(),
    )
}

/// Fails every action for one monster.
struct RejectingApi {
    inner: DryRunActionApi,
    reject: &'static str,
}

impl RejectingApi {
    fn check(&self, monster: &str) -> Result<(), ApiError> {
        if monster == self.reject {
            return Err(ApiError::Status {
                endpoint: "crossover.dm.performMonsterAttack".to_string(),
                status: 500,
                body: "boom".to_string(),
            });
        }
        Ok(())
    }
}

#[async_trait]
impl ActionApi for RejectingApi {
    async fn move_monster(&self, monster: &str, path: &[Direction]) -> Result<(), ApiError> {
        self.check(monster)?;
        self.inner.move_monster(monster, path).await
    }

    async fn perform_ability(
        &self,
        monster: &str,
        target: &str,
        ability: &str,
    ) -> Result<(), ApiError> {
        self.check(monster)?;
        self.inner.perform_ability(monster, target, ability).await
    }

    async fn perform_attack(&self, monster: &str, target: &str) -> Result<(), ApiError> {
        self.check(monster)?;
        self.inner.perform_attack(monster, target).await
    }

    async fn respawn_monsters(&self) -> Result<(), ApiError> {
        self.inner.respawn_monsters().await
    }
}

/// Index that can be switched into a failing state.
struct FlakyIndex {
    world: Arc<MemoryWorld>,
    failing: AtomicBool,
}

#[async_trait]
impl EntityIndex for FlakyIndex {
    async fn logged_in_players(&self, page: Page) -> Result<Vec<Player>, IndexError> {
        if self.failing.load(Ordering::SeqCst) {
            return Err(IndexError::Backend("connection reset".to_string()));
        }
        self.world.logged_in_players(page).await
    }

    async fn entities_in(
        &self,
        kind: EntityKind,
        prefixes: &[String],
        page: Page,
    ) -> Result<Vec<Entity>, IndexError> {
        self.world.entities_in(kind, prefixes, page).await
    }

    async fn count_colliders(&self, geohash: &str) -> Result<usize, IndexError> {
        self.world.count_colliders(geohash).await
    }
}

/// Index that, once armed, pauses a single monster lookup after it has read
/// the world. The paused caller holds data that is already out of date.
struct GatedIndex {
    world: Arc<MemoryWorld>,
    armed: AtomicBool,
    reached: Notify,
    release: Notify,
}

#[async_trait]
impl EntityIndex for GatedIndex {
    async fn logged_in_players(&self, page: Page) -> Result<Vec<Player>, IndexError> {
        self.world.logged_in_players(page).await
    }

    async fn entities_in(
        &self,
        kind: EntityKind,
        prefixes: &[String],
        page: Page,
    ) -> Result<Vec<Entity>, IndexError> {
        let found = self.world.entities_in(kind, prefixes, page).await;
        if self.armed.swap(false, Ordering::SeqCst) {
            self.reached.notify_one();
            self.release.notified().await;
        }
        found
    }

    async fn count_colliders(&self, geohash: &str) -> Result<usize, IndexError> {
        self.world.count_colliders(geohash).await
    }
}

#[tokio::test]
async fn one_failed_job_does_not_affect_the_batch() {
    let monsters: Vec<(&str, String)> = vec![
        ("monster_a", offset(1, 0)),
        ("monster_b", offset(-1, 0)),
        ("monster_c", offset(0, 1)),
        ("monster_d", offset(0, -1)),
        ("monster_e", offset(1, 1)),
    ];
    let world = world(&monsters);
    let api = Arc::new(RejectingApi {
        inner: DryRunActionApi::applying_to(world.clone()),
        reject: "monster_c",
    });
    let pipeline = pipeline_with(world.clone(), world, api, PipelineSettings::default());

    pipeline.refresh().await.unwrap();
    let decided = pipeline.decide().await;
    assert_eq!(decided.queued, 5);

    let report = pipeline.dispatch_batch().await;
    assert_eq!(report.drained, 5);
    assert_eq!(report.dispatched, 4);
    assert_eq!(report.failed, 1);

    let context = pipeline.context();
    for (id, _) in &monsters {
        assert_eq!(context.is_dirty(id), *id != "monster_c", "{}", id);
    }
    assert!(context.is_dirty("p1"));

    let stats = pipeline.stats();
    assert_eq!(stats.jobs_dispatched, 4);
    assert_eq!(stats.jobs_failed, 1);
}

#[tokio::test]
async fn moved_monster_is_refetched_next_cycle() {
    let world = world(&[("monster_a", offset(3, 0))]);
    let pipeline = dry_run_pipeline(world.clone());

    pipeline.refresh().await.unwrap();
    assert_eq!(pipeline.decide().await.queued, 1);
    let report = pipeline.dispatch_batch().await;
    assert_eq!(report.dispatched, 1);

    let moved = world.get("monster_a").unwrap().geohash().unwrap().to_string();
    let player = GridCell::from_geohash(PLAYER_CELL).unwrap();
    assert_eq!(chebyshev(&GridCell::from_geohash(&moved).unwrap(), &player), 1);
    assert!(pipeline.context().is_dirty("monster_a"));

    let decided = pipeline.decide().await;
    assert_eq!(decided.refetched, 1);
    assert!(!pipeline.context().is_dirty("monster_a"));
    assert_eq!(pipeline.context().dirty_count(), 0);

    let cached = pipeline
        .context()
        .with_snapshot(|s| s.monsters["monster_a"].clone())
        .await;
    assert_eq!(cached.geohash(), Some(moved.as_str()));
}

#[tokio::test]
async fn failed_refresh_keeps_previous_snapshot() {
    let world = world(&[("monster_a", offset(1, 0))]);
    let index = Arc::new(FlakyIndex {
        world: world.clone(),
        failing: AtomicBool::new(false),
    });
    let pipeline = pipeline_with(
        index.clone(),
        world.clone(),
        Arc::new(DryRunActionApi::applying_to(world)),
        PipelineSettings::default(),
    );

    pipeline.refresh().await.unwrap();
    index.failing.store(true, Ordering::SeqCst);
    assert!(pipeline.refresh().await.is_err());

    let (players, monsters) = pipeline
        .context()
        .with_snapshot(|s| (s.players.len(), s.monsters.len()))
        .await;
    assert_eq!((players, monsters), (1, 1));

    let stats = pipeline.stats();
    assert_eq!(stats.refresh_cycles, 2);
    assert_eq!(stats.refresh_failures, 1);

    // Decisions keep running off the stale snapshot.
    assert_eq!(pipeline.decide().await.queued, 1);
}

#[tokio::test]
async fn pending_jobs_coalesce_and_overflow_drops() {
    let world = world(&[
        ("monster_a", offset(1, 0)),
        ("monster_b", offset(-1, 0)),
        ("monster_c", offset(0, 1)),
    ]);
    let settings = PipelineSettings {
        dispatch_batch_size: 2,
        max_queue_depth: 2,
        ..PipelineSettings::default()
    };
    let pipeline = pipeline_with(
        world.clone(),
        world.clone(),
        Arc::new(DryRunActionApi::applying_to(world)),
        settings,
    );

    pipeline.refresh().await.unwrap();
    let first = pipeline.decide().await;
    assert_eq!(first.queued, 2);
    assert_eq!(first.dropped, 1);

    let second = pipeline.decide().await;
    assert_eq!(second.coalesced, 2);
    assert_eq!(second.dropped, 1);
    assert_eq!(pipeline.queue().len(), 2);

    let stats = pipeline.stats();
    assert_eq!(stats.jobs_enqueued, 2);
    assert_eq!(stats.jobs_coalesced, 2);
    assert_eq!(stats.jobs_dropped, 2);
}

#[tokio::test]
async fn decision_waits_for_refresh_in_flight() {
    let world = world(&[("monster_a", offset(3, 0))]);
    let index = Arc::new(GatedIndex {
        world: world.clone(),
        armed: AtomicBool::new(false),
        reached: Notify::new(),
        release: Notify::new(),
    });
    let pipeline = Arc::new(pipeline_with(
        index.clone(),
        world.clone(),
        Arc::new(DryRunActionApi::applying_to(world.clone())),
        PipelineSettings::default(),
    ));

    pipeline.refresh().await.unwrap();
    assert_eq!(pipeline.decide().await.queued, 1);

    // A refresh reads the monster where it stands, then stalls.
    index.armed.store(true, Ordering::SeqCst);
    let refreshing = tokio::spawn({
        let pipeline = Arc::clone(&pipeline);
        async move { pipeline.refresh().await }
    });
    index.reached.notified().await;

    // The monster moves while the refresh still holds the old position.
    assert_eq!(pipeline.dispatch_batch().await.dispatched, 1);
    assert!(pipeline.context().is_dirty("monster_a"));
    let moved = world.get("monster_a").unwrap().geohash().unwrap().to_string();

    let mut deciding = tokio::spawn({
        let pipeline = Arc::clone(&pipeline);
        async move { pipeline.decide().await }
    });
    assert!(
        tokio::time::timeout(Duration::from_millis(50), &mut deciding)
            .await
            .is_err(),
        "decision ran while a refresh was in flight"
    );

    index.release.notify_one();
    refreshing.await.unwrap().unwrap();
    let decided = deciding.await.unwrap();
    assert_eq!(decided.refetched, 1);

    let cached = pipeline
        .context()
        .with_snapshot(|s| s.monsters["monster_a"].clone())
        .await;
    assert_eq!(cached.geohash(), Some(moved.as_str()));
    assert!(!pipeline.context().is_dirty("monster_a"));
}

#[tokio::test(flavor = "current_thread")]
async fn deferred_moves_in_a_batch_are_all_planned() {
    let world = world(&[("monster_a", offset(4, 0)), ("monster_b", offset(-4, 2))]);
    let pipeline = dry_run_pipeline(world.clone());
    pipeline.refresh().await.unwrap();

    for id in ["monster_a", "monster_b"] {
        pipeline.queue().push(JobDescriptor::PerformMove {
            monster: id.into(),
            destination: MoveTarget::Geohash(offset(0, 1)),
        });
    }
    let report = pipeline.dispatch_batch().await;
    assert_eq!((report.dispatched, report.skipped), (2, 0));

    let goal = GridCell::from_geohash(&offset(0, 1)).unwrap();
    for id in ["monster_a", "monster_b"] {
        let at = world.get(id).unwrap().geohash().unwrap().to_string();
        let at = GridCell::from_geohash(&at).unwrap();
        assert!(chebyshev(&at, &goal) <= 1, "{} stopped at {}", id, at.geohash);
    }
}
