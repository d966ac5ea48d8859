use std::sync::atomic::{AtomicU64, Ordering};
use std::time::Duration;

use serde::Serialize;

/// Running counters shared by the pipeline tasks.
#[derive(Debug, Default)]
pub struct PipelineStats {
    refresh_cycles: AtomicU64,
    refresh_failures: AtomicU64,
    respawn_cycles: AtomicU64,
    respawn_failures: AtomicU64,
    decision_cycles: AtomicU64,
    decision_errors: AtomicU64,
    dispatch_batches: AtomicU64,
    jobs_enqueued: AtomicU64,
    jobs_coalesced: AtomicU64,
    jobs_dropped: AtomicU64,
    jobs_dispatched: AtomicU64,
    jobs_failed: AtomicU64,
    jobs_skipped: AtomicU64,
    last_refresh_ms: AtomicU64,
    last_decision_ms: AtomicU64,
    last_dispatch_ms: AtomicU64,
}

/// Point-in-time copy of [`PipelineStats`].
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct StatsSnapshot {
    pub refresh_cycles: u64,
    pub refresh_failures: u64,
    pub respawn_cycles: u64,
    pub respawn_failures: u64,
    pub decision_cycles: u64,
    pub decision_errors: u64,
    pub dispatch_batches: u64,
    pub jobs_enqueued: u64,
    pub jobs_coalesced: u64,
    pub jobs_dropped: u64,
    pub jobs_dispatched: u64,
    pub jobs_failed: u64,
    pub jobs_skipped: u64,
    pub last_refresh_ms: u64,
    pub last_decision_ms: u64,
    pub last_dispatch_ms: u64,
}

fn add(counter: &AtomicU64, n: usize) {
    counter.fetch_add(n as u64, Ordering::Relaxed);
}

fn millis(d: Duration) -> u64 {
    d.as_millis().min(u64::MAX as u128) as u64
}

impl PipelineStats {
    pub fn record_refresh(&self, took: Duration, ok: bool) {
        add(&self.refresh_cycles, 1);
        if !ok {
            add(&self.refresh_failures, 1);
        }
        self.last_refresh_ms.store(millis(took), Ordering::Relaxed);
    }

    pub fn record_respawn(&self, ok: bool) {
        add(&self.respawn_cycles, 1);
        if !ok {
            add(&self.respawn_failures, 1);
        }
    }

    pub fn record_decision(&self, took: Duration, errors: usize) {
        add(&self.decision_cycles, 1);
        add(&self.decision_errors, errors);
        self.last_decision_ms.store(millis(took), Ordering::Relaxed);
    }

    pub fn record_enqueue(&self, queued: usize, coalesced: usize, dropped: usize) {
        add(&self.jobs_enqueued, queued);
        add(&self.jobs_coalesced, coalesced);
        add(&self.jobs_dropped, dropped);
    }

    pub fn record_dispatch(&self, took: Duration, dispatched: usize, failed: usize, skipped: usize) {
        add(&self.dispatch_batches, 1);
        add(&self.jobs_dispatched, dispatched);
        add(&self.jobs_failed, failed);
        add(&self.jobs_skipped, skipped);
        self.last_dispatch_ms.store(millis(took), Ordering::Relaxed);
    }

    pub fn snapshot(&self) -> StatsSnapshot {
        let get = |c: &AtomicU64| c.load(Ordering::Relaxed);
        StatsSnapshot {
            refresh_cycles: get(&self.refresh_cycles),
            refresh_failures: get(&self.refresh_failures),
            respawn_cycles: get(&self.respawn_cycles),
            respawn_failures: get(&self.respawn_failures),
            decision_cycles: get(&self.decision_cycles),
            decision_errors: get(&self.decision_errors),
            dispatch_batches: get(&self.dispatch_batches),
            jobs_enqueued: get(&self.jobs_enqueued),
            jobs_coalesced: get(&self.jobs_coalesced),
            jobs_dropped: get(&self.jobs_dropped),
            jobs_dispatched: get(&self.jobs_dispatched),
            jobs_failed: get(&self.jobs_failed),
            jobs_skipped: get(&self.jobs_skipped),
            last_refresh_ms: get(&self.last_refresh_ms),
            last_decision_ms: get(&self.last_decision_ms),
            last_dispatch_ms: get(&self.last_dispatch_ms),
        }
    }
}
