pub mod context;
pub mod job;
pub mod queue;
pub mod statistics;

#[cfg(test)]
mod scenarios;

use std::collections::{HashMap, HashSet};
use std::future::Future;
use std::sync::Arc;
use std::time::{Duration, Instant};

use futures_util::future::join_all;
use tokio::sync::watch;
use tokio::task::JoinHandle;
use tracing::{debug, info, warn};

use crate::config::DungeonMasterConfig;
use crate::decision::{self, DecisionPolicy};
use crate::game::{
    ActionApi, ApiError, EntityIndex, EntityStore, IndexError, NearbyQuery, all_logged_in_players,
    fetch_entity, nearby_entities,
};
use crate::world::direction::Direction;
use crate::world::entity::{Entity, Monster, Player};
use crate::world::geohash::GridCell;
use crate::world::terrain::TerrainField;

pub use context::{EntitySnapshot, TickContext};
pub use job::{JobDescriptor, MoveTarget};
pub use queue::{Enqueued, JobQueue};
pub use statistics::{PipelineStats, StatsSnapshot};

/// Timing and sizing of the pipeline phases.
#[derive(Debug, Clone, PartialEq)]
pub struct PipelineSettings {
    pub refresh_interval: Duration,
    pub respawn_interval: Duration,
    pub decision_interval: Duration,
    pub dispatch_batch_size: usize,
    pub dispatch_idle_backoff: Duration,
    pub max_queue_depth: usize,
    pub page_size: usize,
    pub nearby_precision: usize,
}

impl PipelineSettings {
    pub fn from_config(config: &DungeonMasterConfig) -> Self {
        PipelineSettings {
            refresh_interval: config.refresh_interval(),
            respawn_interval: config.respawn_interval(),
            decision_interval: config.decision_interval(),
            dispatch_batch_size: config.dispatch_batch_size,
            dispatch_idle_backoff: config.dispatch_idle_backoff(),
            max_queue_depth: config.max_queue_depth,
            page_size: config.page_size,
            nearby_precision: config.nearby_precision,
        }
    }
}

impl Default for PipelineSettings {
    fn default() -> Self {
        PipelineSettings::from_config(&DungeonMasterConfig::default())
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct RefreshReport {
    pub players: usize,
    pub monsters: usize,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct DecisionReport {
    pub monsters_considered: usize,
    pub refetched: usize,
    pub queued: usize,
    pub coalesced: usize,
    pub dropped: usize,
    pub errors: usize,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct DispatchReport {
    pub drained: usize,
    pub dispatched: usize,
    pub failed: usize,
    pub skipped: usize,
}

/// The external systems the pipeline talks to.
pub struct Collaborators {
    pub index: Arc<dyn EntityIndex>,
    pub store: Arc<dyn EntityStore>,
    pub api: Arc<dyn ActionApi>,
}

/// Periodic refresh, respawn and decision phases feeding a dispatch loop.
pub struct TickPipeline {
    index: Arc<dyn EntityIndex>,
    store: Arc<dyn EntityStore>,
    api: Arc<dyn ActionApi>,
    terrain: Arc<TerrainField>,
    policy: Arc<DecisionPolicy>,
    settings: PipelineSettings,
    context: TickContext,
    queue: JobQueue,
    stats: PipelineStats,
}

impl TickPipeline {
    pub fn new(
        collaborators: Collaborators,
        terrain: Arc<TerrainField>,
        policy: DecisionPolicy,
        settings: PipelineSettings,
    ) -> Self {
        TickPipeline {
            index: collaborators.index,
            store: collaborators.store,
            api: collaborators.api,
            terrain,
            policy: Arc::new(policy),
            queue: JobQueue::new(settings.max_queue_depth),
            settings,
            context: TickContext::new(),
            stats: PipelineStats::default(),
        }
    }

    pub fn context(&self) -> &TickContext {
        &self.context
    }

    pub fn queue(&self) -> &JobQueue {
        &self.queue
    }

    pub fn stats(&self) -> StatsSnapshot {
        self.stats.snapshot()
    }

    /// Rebuild the snapshot of logged-in players and the monsters around them.
    ///
    /// The new snapshot is built aside and only swapped in once complete, so a
    /// failed refresh leaves the previous one in place. The cycle guard is held
    /// from the first read to the swap; a decision cycle cannot clear dirty
    /// markers in between and then see its refetch overwritten by stale data.
    pub async fn refresh(&self) -> Result<RefreshReport, IndexError> {
        let started = Instant::now();
        let _cycle = self.context.begin_cycle().await;
        let result = self.build_snapshot().await;
        let report = match result {
            Ok(fresh) => {
                let report = RefreshReport {
                    players: fresh.players.len(),
                    monsters: fresh.monsters.len(),
                };
                self.context.swap_snapshot(fresh).await;
                Ok(report)
            }
            Err(e) => Err(e),
        };
        self.stats.record_refresh(started.elapsed(), report.is_ok());
        report
    }

    async fn build_snapshot(&self) -> Result<EntitySnapshot, IndexError> {
        let mut fresh = EntitySnapshot::default();
        let players = all_logged_in_players(self.index.as_ref(), self.settings.page_size).await?;

        for player in players {
            let mut near = Vec::new();
            if let Some(geohash) = player.geohash() {
                let found = nearby_entities(
                    self.index.as_ref(),
                    geohash,
                    NearbyQuery::monsters(),
                    self.settings.nearby_precision,
                    self.settings.page_size,
                )
                .await?;
                for entity in found {
                    if let Entity::Monster(monster) = entity {
                        near.push(monster.id.clone());
                        fresh.monsters.insert(monster.id.clone(), monster);
                    }
                }
            }
            fresh.monsters_near_player.insert(player.id.clone(), near);
            fresh.players.insert(player.id.clone(), player);
        }
        Ok(fresh)
    }

    pub async fn respawn(&self) -> Result<(), ApiError> {
        let result = self.api.respawn_monsters().await;
        self.stats.record_respawn(result.is_ok());
        result
    }

    /// Decide once for every monster near a player and queue the results.
    ///
    /// Entities marked dirty are refetched first; their marker is cleared once
    /// the fresh copy is in hand.
    pub async fn decide(&self) -> DecisionReport {
        let started = Instant::now();
        let _cycle = self.context.begin_cycle().await;
        let snapshot = self.context.snapshot().await;
        let mut report = DecisionReport::default();

        let mut player_ids: Vec<&String> = snapshot.players.keys().collect();
        player_ids.sort();

        let mut visited: HashSet<&str> = HashSet::new();
        let mut fresh_players: HashMap<&str, Option<Player>> = HashMap::new();

        for player_id in player_ids {
            let Some(monster_ids) = snapshot.monsters_near_player.get(player_id) else {
                continue;
            };
            for monster_id in monster_ids {
                if !visited.insert(monster_id.as_str()) {
                    continue;
                }
                let Some(cached) = snapshot.monsters.get(monster_id) else {
                    continue;
                };
                report.monsters_considered += 1;

                let player = match fresh_players.get(player_id.as_str()) {
                    Some(p) => p.clone(),
                    None => {
                        let cached = &snapshot.players[player_id];
                        let p = self.current_player(cached, &mut report).await;
                        fresh_players.insert(player_id.as_str(), p.clone());
                        p
                    }
                };
                let Some(player) = player else {
                    continue;
                };
                let Some(monster) = self.current_monster(cached, &mut report).await else {
                    continue;
                };

                match self.decide_off_runtime(&monster, &player).await {
                    Ok(Ok(Some(job))) => match self.queue.push(job) {
                        Enqueued::Queued => report.queued += 1,
                        Enqueued::Coalesced => {
                            debug!(monster = %monster.id, "Coalesced pending job");
                            report.coalesced += 1;
                        }
                        Enqueued::Dropped => {
                            warn!(monster = %monster.id, depth = self.queue.len(), "Job queue full, dropping job");
                            report.dropped += 1;
                        }
                    },
                    Ok(Ok(None)) => {}
                    Ok(Err(e)) => {
                        warn!(monster = %monster.id, player = %player.id, error = %e, "Decision failed");
                        report.errors += 1;
                    }
                    Err(e) => {
                        warn!(monster = %monster.id, error = %e, "Decision task failed");
                        report.errors += 1;
                    }
                }
            }
        }

        let took = started.elapsed();
        self.stats.record_decision(took, report.errors);
        self.stats
            .record_enqueue(report.queued, report.coalesced, report.dropped);
        report
    }

    /// Decisions walk terrain and may run A*, so they go to the blocking pool.
    fn decide_off_runtime(
        &self,
        monster: &Monster,
        player: &Player,
    ) -> JoinHandle<Result<Option<JobDescriptor>, decision::DecisionError>> {
        let monster = monster.clone();
        let player = player.clone();
        let policy = Arc::clone(&self.policy);
        let terrain = Arc::clone(&self.terrain);
        tokio::task::spawn_blocking(move || decision::decide(&monster, &player, &policy, &terrain))
    }

    async fn current_monster(&self, cached: &Monster, report: &mut DecisionReport) -> Option<Monster> {
        if !self.context.is_dirty(&cached.id) {
            return Some(cached.clone());
        }
        match fetch_entity(self.store.as_ref(), &cached.id).await {
            Ok(Some(Entity::Monster(fresh))) => {
                report.refetched += 1;
                self.context.update_monster(fresh.clone()).await;
                self.context.clear_dirty(&cached.id);
                Some(fresh)
            }
            Ok(_) => {
                debug!(monster = %cached.id, "Monster gone from store");
                self.context.remove_entity(&cached.id).await;
                self.context.clear_dirty(&cached.id);
                None
            }
            Err(e) => {
                warn!(monster = %cached.id, error = %e, "Refetch failed");
                report.errors += 1;
                None
            }
        }
    }

    async fn current_player(&self, cached: &Player, report: &mut DecisionReport) -> Option<Player> {
        if !self.context.is_dirty(&cached.id) {
            return Some(cached.clone());
        }
        match fetch_entity(self.store.as_ref(), &cached.id).await {
            Ok(Some(Entity::Player(fresh))) => {
                report.refetched += 1;
                self.context.update_player(fresh.clone()).await;
                self.context.clear_dirty(&cached.id);
                fresh.logged_in.then_some(fresh)
            }
            Ok(_) => {
                self.context.remove_entity(&cached.id).await;
                self.context.clear_dirty(&cached.id);
                None
            }
            Err(e) => {
                warn!(player = %cached.id, error = %e, "Refetch failed");
                report.errors += 1;
                None
            }
        }
    }

    /// Drain one batch and send it concurrently. A failed job is logged and
    /// counted without affecting the rest of the batch.
    pub async fn dispatch_batch(&self) -> DispatchReport {
        let started = Instant::now();
        let jobs = self.queue.drain_batch(self.settings.dispatch_batch_size);
        let mut report = DispatchReport {
            drained: jobs.len(),
            ..DispatchReport::default()
        };
        if jobs.is_empty() {
            return report;
        }

        let snapshot = self.context.snapshot().await;
        let resolved = join_all(jobs.into_iter().map(|job| self.resolve(job, &snapshot))).await;
        let mut ready = Vec::with_capacity(resolved.len());
        for job in resolved {
            match job {
                Some(job) => ready.push(job),
                None => report.skipped += 1,
            }
        }

        let results = join_all(ready.iter().map(|job| self.execute(job))).await;
        for (job, result) in ready.iter().zip(results) {
            match result {
                Ok(()) => {
                    report.dispatched += 1;
                    self.context.mark_dirty(job.touched_entities());
                }
                Err(e) => {
                    report.failed += 1;
                    warn!(monster = %job.monster(), job = job.kind(), error = %e, "Job failed");
                }
            }
        }

        let took = started.elapsed();
        self.stats
            .record_dispatch(took, report.dispatched, report.failed, report.skipped);
        info!(
            drained = report.drained,
            dispatched = report.dispatched,
            failed = report.failed,
            skipped = report.skipped,
            took_ms = took.as_millis() as u64,
            "Dispatched batch"
        );
        report
    }

    /// Drop jobs about entities that left the snapshot and plan deferred moves.
    async fn resolve(&self, job: JobDescriptor, snapshot: &EntitySnapshot) -> Option<JobDescriptor> {
        let Some(monster) = snapshot.monsters.get(job.monster()) else {
            debug!(monster = %job.monster(), "Skipping job for monster no longer tracked");
            return None;
        };
        if let Some(target) = job.target() {
            if !snapshot.contains(target) {
                debug!(monster = %job.monster(), target, "Skipping job for target no longer tracked");
                return None;
            }
        }

        match job {
            JobDescriptor::PerformMove {
                monster: id,
                destination: MoveTarget::Geohash(dest),
            } => {
                let path = match self.plan_move(monster, &dest).await {
                    Ok(Ok(path)) => path,
                    Ok(Err(e)) => {
                        warn!(monster = %id, destination = %dest, error = %e, "Cannot plan move");
                        return None;
                    }
                    Err(e) => {
                        warn!(monster = %id, destination = %dest, error = %e, "Planning task failed");
                        return None;
                    }
                };
                if path.is_empty() {
                    debug!(monster = %id, destination = %dest, "No path at dispatch");
                    return None;
                }
                Some(JobDescriptor::PerformMove {
                    monster: id,
                    destination: MoveTarget::Path(path),
                })
            }
            JobDescriptor::PerformMove {
                destination: MoveTarget::Path(ref path),
                ..
            } if path.is_empty() => None,
            job => Some(job),
        }
    }

    fn plan_move(
        &self,
        monster: &Monster,
        destination: &str,
    ) -> JoinHandle<Result<Vec<Direction>, decision::DecisionError>> {
        let from = monster.geohash().map(str::to_string);
        let destination = destination.to_string();
        let policy = Arc::clone(&self.policy);
        let terrain = Arc::clone(&self.terrain);
        tokio::task::spawn_blocking(move || {
            let Some(from) = from else {
                return Ok(Vec::new());
            };
            let from = GridCell::from_geohash(&from)?;
            let to = GridCell::from_geohash(&destination)?;
            decision::plan_path(&from, &to, &policy, &terrain)
        })
    }

    async fn execute(&self, job: &JobDescriptor) -> Result<(), ApiError> {
        match job {
            JobDescriptor::PerformAbility {
                monster,
                target,
                ability,
            } => self.api.perform_ability(monster, target, ability).await,
            JobDescriptor::PerformAttack { monster, target } => {
                self.api.perform_attack(monster, target).await
            }
            JobDescriptor::PerformMove {
                monster,
                destination: MoveTarget::Path(path),
            } => self.api.move_monster(monster, path).await,
            JobDescriptor::PerformMove {
                destination: MoveTarget::Geohash(dest),
                ..
            } => Err(ApiError::Rejected(format!("move to {} was never planned", dest))),
        }
    }

    /// Run every phase until `shutdown` flips to true.
    pub async fn run(self: Arc<Self>, shutdown: watch::Receiver<bool>) {
        info!(
            refresh_ms = self.settings.refresh_interval.as_millis() as u64,
            respawn_ms = self.settings.respawn_interval.as_millis() as u64,
            decision_ms = self.settings.decision_interval.as_millis() as u64,
            batch = self.settings.dispatch_batch_size,
            "Pipeline running"
        );

        let refresh = {
            let pipeline = Arc::clone(&self);
            tokio::spawn(every(
                self.settings.refresh_interval,
                shutdown.clone(),
                move || {
                    let pipeline = Arc::clone(&pipeline);
                    async move {
                        match pipeline.refresh().await {
                            Ok(r) => info!(players = r.players, monsters = r.monsters, "Refreshed"),
                            Err(e) => warn!(error = %e, "Refresh failed, keeping previous snapshot"),
                        }
                    }
                },
            ))
        };

        let respawn = {
            let pipeline = Arc::clone(&self);
            tokio::spawn(every(
                self.settings.respawn_interval,
                shutdown.clone(),
                move || {
                    let pipeline = Arc::clone(&pipeline);
                    async move {
                        if let Err(e) = pipeline.respawn().await {
                            warn!(error = %e, "Respawn failed");
                        }
                    }
                },
            ))
        };

        let decide = {
            let pipeline = Arc::clone(&self);
            tokio::spawn(every(
                self.settings.decision_interval,
                shutdown.clone(),
                move || {
                    let pipeline = Arc::clone(&pipeline);
                    async move {
                        let r = pipeline.decide().await;
                        info!(
                            monsters = r.monsters_considered,
                            refetched = r.refetched,
                            queued = r.queued,
                            coalesced = r.coalesced,
                            dropped = r.dropped,
                            errors = r.errors,
                            "Decided"
                        );
                    }
                },
            ))
        };

        let dispatch = {
            let pipeline = Arc::clone(&self);
            let mut shutdown = shutdown.clone();
            tokio::spawn(async move {
                while !*shutdown.borrow() {
                    let report = pipeline.dispatch_batch().await;
                    if report.drained == 0 {
                        tokio::select! {
                            _ = tokio::time::sleep(pipeline.settings.dispatch_idle_backoff) => {}
                            changed = shutdown.changed() => {
                                if changed.is_err() {
                                    break;
                                }
                            }
                        }
                    }
                }
            })
        };

        for (name, handle) in [
            ("refresh", refresh),
            ("respawn", respawn),
            ("decision", decide),
            ("dispatch", dispatch),
        ] {
            if let Err(e) = handle.await {
                warn!(task = name, error = %e, "Pipeline task ended abnormally");
            }
        }
        info!("Pipeline stopped");
    }
}

/// Call `tick` every `interval`, sleeping only the time the tick left over.
async fn every<F, Fut>(interval: Duration, mut shutdown: watch::Receiver<bool>, mut tick: F)
where
    F: FnMut() -> Fut,
    Fut: Future<Output = ()>,
{
    loop {
        if *shutdown.borrow() {
            break;
        }
        let started = Instant::now();
        tick().await;

        let remaining = interval.saturating_sub(started.elapsed());
        tokio::select! {
            _ = tokio::time::sleep(remaining) => {}
            changed = shutdown.changed() => {
                if changed.is_err() {
                    break;
                }
            }
        }
    }
}
