//! Worker liveness bookkeeping.

use std::collections::BTreeMap;
use std::time::{Duration, Instant};

use convoy_protocol::Heartbeat;
use tracing::{info, warn};

/// Live workers and when each was last heard from.
///
/// Private to the coordinator task; the sorted key order doubles as the
/// canonical snapshot ordering, and a `BTreeMap` cannot hold duplicate
/// ids.
#[derive(Debug, Default)]
pub struct MembershipTable {
    clients: BTreeMap<String, Instant>,
}

impl MembershipTable {
    /// Apply one heartbeat. Returns whether the membership set changed
    /// (a refresh of an already-known worker does not count).
    pub fn observe(&mut self, heartbeat: Heartbeat, now: Instant) -> bool {
        if heartbeat.active {
            let is_new = !self.clients.contains_key(&heartbeat.worker_id);
            if is_new {
                info!("new worker registered: {}", heartbeat.worker_id);
            }
            self.clients.insert(heartbeat.worker_id, now);
            is_new
        } else if self.clients.remove(&heartbeat.worker_id).is_some() {
            info!("worker {} disconnected gracefully", heartbeat.worker_id);
            true
        } else {
            false
        }
    }

    /// Drop every worker not seen within `threshold`. Returns whether
    /// anything was evicted.
    pub fn evict_stale(&mut self, now: Instant, threshold: Duration) -> bool {
        let stale: Vec<String> = self
            .clients
            .iter()
            .filter(|(_, last_seen)| now.duration_since(**last_seen) > threshold)
            .map(|(id, _)| id.clone())
            .collect();

        for id in &stale {
            warn!("evicting worker {id} (heartbeat timeout)");
            self.clients.remove(id);
        }
        !stale.is_empty()
    }

    /// The current snapshot, sorted by worker id.
    pub fn ids(&self) -> Vec<String> {
        self.clients.keys().cloned().collect()
    }

    pub fn len(&self) -> usize {
        self.clients.len()
    }

    pub fn is_empty(&self) -> bool {
        self.clients.is_empty()
    }
}
