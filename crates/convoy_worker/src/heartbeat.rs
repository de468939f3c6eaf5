//! Worker-side heartbeat responder.

use convoy_bus::Bus;
use convoy_protocol::{encode, Heartbeat, HeartbeatSubjects};
use futures_util::StreamExt;
use tracing::warn;

/// Answer coordinator polls until cancelled.
///
/// One unsolicited `active` heartbeat goes out at startup so a freshly
/// started worker is registered without waiting for the next poll.
pub async fn run_heartbeat(
    bus: Bus,
    subjects: HeartbeatSubjects,
    worker_id: String,
) -> anyhow::Result<()> {
    let mut polls = bus.subscribe(&subjects.request).await?;

    send_heartbeat(&bus, &subjects, &worker_id, true).await?;
    while polls.next().await.is_some() {
        send_heartbeat(&bus, &subjects, &worker_id, true).await?;
    }

    Ok(())
}

async fn send_heartbeat(
    bus: &Bus,
    subjects: &HeartbeatSubjects,
    worker_id: &str,
    active: bool,
) -> anyhow::Result<()> {
    let payload = encode(&Heartbeat {
        worker_id: worker_id.to_string(),
        active,
    })?;
    bus.publish(&subjects.response, payload).await?;
    Ok(())
}

/// Best-effort `active = false` on orderly shutdown, so the coordinator
/// can drop this worker without waiting for eviction.
pub async fn send_farewell(bus: &Bus, subjects: &HeartbeatSubjects, worker_id: &str) {
    if let Err(e) = send_heartbeat(bus, subjects, worker_id, false).await {
        warn!("farewell heartbeat failed: {e}");
    }
}
