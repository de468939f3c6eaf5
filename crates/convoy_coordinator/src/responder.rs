//! Membership snapshot publication.

use std::sync::Arc;

use convoy_bus::Bus;
use convoy_core::AsyncValue;
use convoy_protocol::{encode, WorkerIds, WorkerListSubjects};
use futures_util::StreamExt;
use tracing::warn;

/// Serve the worker list: broadcast every snapshot change on `<WL>.b`,
/// answer on-demand requests on `<WL>.l`.
///
/// Broadcasts are serialized through this single task, so within one
/// coordinator process every change reaches the broadcast subject exactly
/// once, in order. Consecutive changes may collapse into one broadcast
/// carrying the latest snapshot (latch semantics).
pub async fn run_responder(
    bus: Bus,
    subjects: WorkerListSubjects,
    out: Arc<AsyncValue<Vec<String>>>,
) -> anyhow::Result<()> {
    let mut requests = bus.subscribe(&subjects.listen).await?;

    let (mut current, mut changed) = out.get();
    broadcast(&bus, &subjects, &current).await?;

    loop {
        tokio::select! {
            _ = changed.wait() => {
                (current, changed) = out.get();
                broadcast(&bus, &subjects, &current).await?;
            }
            maybe = requests.next() => {
                let Some(msg) = maybe else { return Ok(()) };
                let payload = encode(&WorkerIds { worker_ids: current.clone() })?;
                if let Err(e) = bus.respond(&msg, payload).await {
                    warn!("worker-list reply failed: {e}");
                }
            }
        }
    }
}

async fn broadcast(
    bus: &Bus,
    subjects: &WorkerListSubjects,
    worker_ids: &[String],
) -> anyhow::Result<()> {
    let payload = encode(&WorkerIds {
        worker_ids: worker_ids.to_vec(),
    })?;
    bus.publish(&subjects.broadcast, payload).await?;
    Ok(())
}
