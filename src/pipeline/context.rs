use std::collections::{HashMap, HashSet};
use std::sync::Mutex;

use tokio::sync::{MutexGuard, RwLock};

use crate::world::entity::{Monster, Player};

/// Entities seen by the latest refresh.
#[derive(Debug, Clone, Default)]
pub struct EntitySnapshot {
    pub players: HashMap<String, Player>,
    pub monsters: HashMap<String, Monster>,
    /// Player id to the ids of monsters found around that player.
    pub monsters_near_player: HashMap<String, Vec<String>>,
}

impl EntitySnapshot {
    pub fn contains(&self, id: &str) -> bool {
        self.players.contains_key(id) || self.monsters.contains_key(id)
    }
}

/// State shared between the pipeline phases.
///
/// A refresh builds a new snapshot and swaps it in whole. The cycle lock keeps
/// the swap from landing in the middle of a decision pass.
#[derive(Default)]
pub struct TickContext {
    snapshot: RwLock<EntitySnapshot>,
    cycle: tokio::sync::Mutex<()>,
    dirty: Mutex<HashSet<String>>,
}

impl TickContext {
    pub fn new() -> Self {
        Self::default()
    }

    pub async fn begin_cycle(&self) -> MutexGuard<'_, ()> {
        self.cycle.lock().await
    }

    /// Replace the snapshot. Call with the cycle guard held.
    pub async fn swap_snapshot(&self, fresh: EntitySnapshot) {
        *self.snapshot.write().await = fresh;
    }

    pub async fn snapshot(&self) -> EntitySnapshot {
        self.snapshot.read().await.clone()
    }

    pub async fn with_snapshot<R>(&self, f: impl FnOnce(&EntitySnapshot) -> R) -> R {
        f(&*self.snapshot.read().await)
    }

    pub async fn update_monster(&self, monster: Monster) {
        self.snapshot
            .write()
            .await
            .monsters
            .insert(monster.id.clone(), monster);
    }

    pub async fn update_player(&self, player: Player) {
        self.snapshot
            .write()
            .await
            .players
            .insert(player.id.clone(), player);
    }

    /// Forget an entity the store no longer has.
    pub async fn remove_entity(&self, id: &str) {
        let mut snapshot = self.snapshot.write().await;
        snapshot.players.remove(id);
        snapshot.monsters.remove(id);
    }

    pub fn mark_dirty<'a>(&self, ids: impl IntoIterator<Item = &'a str>) {
        let mut dirty = self.dirty.lock().unwrap_or_else(|e| e.into_inner());
        dirty.extend(ids.into_iter().map(str::to_string));
    }

    pub fn is_dirty(&self, id: &str) -> bool {
        self.dirty
            .lock()
            .unwrap_or_else(|e| e.into_inner())
            .contains(id)
    }

    pub fn clear_dirty(&self, id: &str) -> bool {
        self.dirty
            .lock()
            .unwrap_or_else(|e| e.into_inner())
            .remove(id)
    }

    pub fn dirty_count(&self) -> usize {
        self.dirty.lock().unwrap_or_else(|e| e.into_inner()).len()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn monster(id: &str, geohash: &str) -> Monster {
        Monster {
            id: id.to_string(),
            loc_type: "geohash".to_string(),
            loc: vec![geohash.to_string()],
            beast: "goblin".to_string(),
            skills: HashMap::new(),
        }
    }

    #[tokio::test]
    async fn swap_replaces_whole_snapshot() {
        let context = TickContext::new();
        let mut first = EntitySnapshot::default();
        first.monsters.insert("monster_a".into(), monster("monster_a", "w21z3m6k"));
        context.swap_snapshot(first).await;
        assert!(context.with_snapshot(|s| s.contains("monster_a")).await);

        context.swap_snapshot(EntitySnapshot::default()).await;
        assert!(!context.with_snapshot(|s| s.contains("monster_a")).await);
    }

    #[tokio::test]
    async fn update_and_remove() {
        let context = TickContext::new();
        context.update_monster(monster("monster_a", "w21z3m6k")).await;
        context.update_monster(monster("monster_a", "w21z3m6m")).await;
        let snapshot = context.snapshot().await;
        assert_eq!(snapshot.monsters["monster_a"].loc, vec!["w21z3m6m".to_string()]);

        context.remove_entity("monster_a").await;
        assert!(context.snapshot().await.monsters.is_empty());
    }

    #[test]
    fn dirty_markers() {
        let context = TickContext::new();
        context.mark_dirty(["monster_a", "p1", "monster_a"]);
        assert_eq!(context.dirty_count(), 2);
        assert!(context.is_dirty("p1"));
        assert!(context.clear_dirty("p1"));
        assert!(!context.clear_dirty("p1"));
        assert_eq!(context.dirty_count(), 1);
    }
}
