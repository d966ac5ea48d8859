use std::collections::{HashMap, VecDeque};
use std::sync::Mutex;

use super::job::JobDescriptor;

/// Outcome of [`JobQueue::push`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Enqueued {
    Queued,
    /// Replaced the job already pending for the same monster.
    Coalesced,
    /// The queue was full.
    Dropped,
}

#[derive(Default)]
struct QueueInner {
    order: VecDeque<String>,
    pending: HashMap<String, JobDescriptor>,
}

/// FIFO of jobs holding at most one pending job per monster.
pub struct JobQueue {
    max_depth: usize,
    inner: Mutex<QueueInner>,
}

impl JobQueue {
    pub fn new(max_depth: usize) -> Self {
        JobQueue {
            max_depth: max_depth.max(1),
            inner: Mutex::new(QueueInner::default()),
        }
    }

    /// A newer job for a monster takes the place of its pending one.
    pub fn push(&self, job: JobDescriptor) -> Enqueued {
        let mut inner = self.inner.lock().unwrap_or_else(|e| e.into_inner());
        let monster = job.monster().to_string();
        if let Some(pending) = inner.pending.get_mut(&monster) {
            *pending = job;
            return Enqueued::Coalesced;
        }
        if inner.order.len() >= self.max_depth {
            return Enqueued::Dropped;
        }
        inner.order.push_back(monster.clone());
        inner.pending.insert(monster, job);
        Enqueued::Queued
    }

    /// Remove up to `max` jobs from the front.
    pub fn drain_batch(&self, max: usize) -> Vec<JobDescriptor> {
        let mut inner = self.inner.lock().unwrap_or_else(|e| e.into_inner());
        let n = max.min(inner.order.len());
        let mut batch = Vec::with_capacity(n);
        for _ in 0..n {
            let Some(monster) = inner.order.pop_front() else {
                break;
            };
            if let Some(job) = inner.pending.remove(&monster) {
                batch.push(job);
            }
        }
        batch
    }

    pub fn len(&self) -> usize {
        self.inner.lock().unwrap_or_else(|e| e.into_inner()).order.len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn attack(monster: &str, target: &str) -> JobDescriptor {
        JobDescriptor::PerformAttack {
            monster: monster.into(),
            target: target.into(),
        }
    }

    #[test]
    fn fifo_order() {
        let queue = JobQueue::new(10);
        for m in ["monster_a", "monster_b", "monster_c"] {
            assert_eq!(queue.push(attack(m, "p1")), Enqueued::Queued);
        }
        let batch = queue.drain_batch(2);
        let ids: Vec<_> = batch.iter().map(|j| j.monster()).collect();
        assert_eq!(ids, vec!["monster_a", "monster_b"]);
        assert_eq!(queue.len(), 1);
        assert_eq!(queue.drain_batch(10).len(), 1);
        assert!(queue.drain_batch(10).is_empty());
    }

    #[test]
    fn coalesces_per_monster_in_place() {
        let queue = JobQueue::new(10);
        queue.push(attack("monster_a", "p1"));
        queue.push(attack("monster_b", "p1"));
        assert_eq!(queue.push(attack("monster_a", "p2")), Enqueued::Coalesced);
        assert_eq!(queue.len(), 2);

        let batch = queue.drain_batch(10);
        assert_eq!(batch[0], attack("monster_a", "p2"));
        assert_eq!(batch[1], attack("monster_b", "p1"));
    }

    #[test]
    fn full_queue_drops_new_monsters_but_still_coalesces() {
        let queue = JobQueue::new(2);
        queue.push(attack("monster_a", "p1"));
        queue.push(attack("monster_b", "p1"));
        assert_eq!(queue.push(attack("monster_c", "p1")), Enqueued::Dropped);
        assert_eq!(queue.push(attack("monster_b", "p2")), Enqueued::Coalesced);
        assert_eq!(queue.len(), 2);
    }
}
