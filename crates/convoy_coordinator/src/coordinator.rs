//! Heartbeat polling loop.

use std::sync::Arc;
use std::time::{Duration, Instant};

use convoy_bus::Bus;
use convoy_core::AsyncValue;
use convoy_protocol::{decode, Heartbeat, HeartbeatSubjects};
use futures_util::StreamExt;
use tracing::{debug, warn};

use crate::membership::MembershipTable;

/// How long a worker may stay silent before eviction.
///
/// The extra half second absorbs scheduling and transport jitter on the
/// last tolerated reply.
pub fn eviction_threshold(heartbeat_interval: Duration, missed_limit: u32) -> Duration {
    Duration::from_secs_f64(heartbeat_interval.as_secs_f64() * f64::from(missed_limit) + 0.5)
}

/// Run the coordinator until the task is cancelled or the bus stream
/// closes.
///
/// One task owns the membership table; heartbeat handling and the polling
/// tick are serialized through the select loop, so the table needs no
/// locking. Every membership change is written into `out`, from which the
/// responder task publishes.
///
/// On restart by the supervisor the table starts empty and workers are
/// re-learned from their next heartbeat replies.
pub async fn run_coordinator(
    bus: Bus,
    subjects: HeartbeatSubjects,
    heartbeat_interval: Duration,
    missed_limit: u32,
    out: Arc<AsyncValue<Vec<String>>>,
) -> anyhow::Result<()> {
    let mut table = MembershipTable::default();
    let threshold = eviction_threshold(heartbeat_interval, missed_limit);
    let mut responses = bus.subscribe(&subjects.response).await?;

    // Publish the initial (empty) membership before the first poll.
    out.put(table.ids());

    let mut tick = tokio::time::interval(heartbeat_interval);
    tick.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Delay);

    loop {
        tokio::select! {
            _ = tick.tick() => {
                bus.publish(&subjects.request, Vec::new()).await?;
                if table.evict_stale(Instant::now(), threshold) {
                    out.put(table.ids());
                }
                debug!("active workers: {}", table.len());
            }
            maybe = responses.next() => {
                let Some(msg) = maybe else {
                    // Subscription closed under us; let the supervisor
                    // rebuild the whole coordinator.
                    return Ok(());
                };
                match decode::<Heartbeat>(&msg.payload) {
                    Ok(heartbeat) => {
                        if table.observe(heartbeat, Instant::now()) {
                            out.put(table.ids());
                        }
                    }
                    Err(e) => warn!("dropping malformed heartbeat: {e}"),
                }
            }
        }
    }
}
