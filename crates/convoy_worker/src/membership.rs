//! Worker-side membership client.

use std::sync::Arc;

use convoy_bus::Bus;
use convoy_core::AsyncValue;
use convoy_protocol::{decode, WorkerIds, WorkerListSubjects};
use futures_util::StreamExt;
use tracing::warn;

/// Mirror the coordinator's membership broadcasts into the local latch.
///
/// The subscription opens before the cold-state request, so a broadcast
/// racing the reply is not lost; whichever lands last simply wins the
/// latch slot.
pub async fn run_membership_listener(
    bus: Bus,
    subjects: WorkerListSubjects,
    out: Arc<AsyncValue<Vec<String>>>,
) -> anyhow::Result<()> {
    let mut broadcasts = bus.subscribe(&subjects.broadcast).await?;

    let reply = bus.request(&subjects.listen, Vec::new()).await?;
    out.put(decode::<WorkerIds>(&reply)?.worker_ids);

    while let Some(msg) = broadcasts.next().await {
        match decode::<WorkerIds>(&msg.payload) {
            Ok(list) => out.put(list.worker_ids),
            Err(e) => warn!("dropping malformed worker list: {e}"),
        }
    }

    Ok(())
}
