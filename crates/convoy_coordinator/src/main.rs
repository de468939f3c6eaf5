//! Convoy membership coordinator.
//!
//! Usage:
//!     convoy-coordinator --nats-url nats://127.0.0.1:4222
//!
//! All options can also come from the environment (`NATS_URL`,
//! `SUB_HEARTBEAT`, `SUB_WORKER_LIST`, `HEARTBEAT_INTERVAL`,
//! `HEARTBEAT_MISSED_LIMIT`).

use std::sync::Arc;
use std::time::Duration;

use clap::Parser;
use convoy_bus::Bus;
use convoy_core::{supervise, AsyncValue};
use convoy_coordinator::{run_coordinator, run_responder};
use convoy_protocol::{HeartbeatSubjects, WorkerListSubjects};

#[derive(Parser, Debug)]
#[command(name = "convoy-coordinator", about = "Membership coordinator for the Convoy cluster")]
struct Args {
    /// NATS server URL
    #[arg(long, env = "NATS_URL", default_value = "nats://127.0.0.1:4222")]
    nats_url: String,

    /// Base subject for heartbeat poll/response
    #[arg(long, env = "SUB_HEARTBEAT", default_value = "convoy.hb")]
    sub_heartbeat: String,

    /// Base subject for worker-list broadcast/on-demand
    #[arg(long, env = "SUB_WORKER_LIST", default_value = "convoy.workers")]
    sub_worker_list: String,

    /// Heartbeat polling period in seconds
    #[arg(long, env = "HEARTBEAT_INTERVAL", default_value_t = 1.0)]
    heartbeat_interval: f64,

    /// Missed polls tolerated before a worker is evicted
    #[arg(long, env = "HEARTBEAT_MISSED_LIMIT", default_value_t = 3)]
    heartbeat_missed_limit: u32,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    convoy_logging::init_logging();
    let args = Args::parse();

    tracing::info!("starting convoy coordinator");
    tracing::info!("  nats: {}", args.nats_url);
    tracing::info!(
        "  heartbeat: every {}s, evict after {} missed",
        args.heartbeat_interval,
        args.heartbeat_missed_limit
    );

    let bus = Bus::connect(&args.nats_url).await;
    let heartbeat_subjects = HeartbeatSubjects::new(&args.sub_heartbeat);
    let worker_list_subjects = WorkerListSubjects::new(&args.sub_worker_list);
    let interval = Duration::from_secs_f64(args.heartbeat_interval);
    let missed_limit = args.heartbeat_missed_limit;

    let out: Arc<AsyncValue<Vec<String>>> = Arc::new(AsyncValue::new(Vec::new()));

    let coordinator = {
        let bus = bus.clone();
        let out = out.clone();
        tokio::spawn(supervise("coordinator", move || {
            run_coordinator(
                bus.clone(),
                heartbeat_subjects.clone(),
                interval,
                missed_limit,
                out.clone(),
            )
        }))
    };

    let responder = {
        let bus = bus.clone();
        let out = out.clone();
        tokio::spawn(supervise("responder", move || {
            run_responder(bus.clone(), worker_list_subjects.clone(), out.clone())
        }))
    };

    tokio::signal::ctrl_c().await?;
    tracing::info!("shutting down");
    coordinator.abort();
    responder.abort();

    Ok(())
}
