//! Convoy vehicle-controller worker.
//!
//! Usage:
//!     convoy-worker --nats-url nats://127.0.0.1:4222
//!
//! All options can also come from the environment (`NATS_URL`,
//! `SUB_HEARTBEAT`, `SUB_WORKER_LIST`, `SUB_VEH_DELTAS`, `SUB_VEH_CMD`,
//! `SUB_VEH_STATUS`). The worker identity is a fresh UUID per process
//! start.

use std::sync::Arc;

use clap::Parser;
use convoy_bus::Bus;
use convoy_core::{supervise, AsyncValue};
use convoy_protocol::{DeltaSubjects, HeartbeatSubjects, WorkerListSubjects};
use convoy_worker::{heartbeat, run_dispatcher, run_heartbeat, run_membership_listener};

#[derive(Parser, Debug)]
#[command(name = "convoy-worker", about = "Vehicle-controller worker for the Convoy cluster")]
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

    /// Base subject for vehicle-delta broadcast/inventory
    #[arg(long, env = "SUB_VEH_DELTAS", default_value = "convoy.veh.deltas")]
    sub_veh_deltas: String,

    /// Base subject for per-vehicle commands
    #[arg(long, env = "SUB_VEH_CMD", default_value = "convoy.veh.cmd")]
    sub_veh_cmd: String,

    /// Base subject for per-vehicle status
    #[arg(long, env = "SUB_VEH_STATUS", default_value = "convoy.veh.status")]
    sub_veh_status: String,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    convoy_logging::init_logging();
    let args = Args::parse();

    let worker_id = uuid::Uuid::new_v4().to_string();
    tracing::info!("starting convoy worker {worker_id}");
    tracing::info!("  nats: {}", args.nats_url);

    let bus = Bus::connect(&args.nats_url).await;
    let heartbeat_subjects = HeartbeatSubjects::new(&args.sub_heartbeat);
    let worker_list_subjects = WorkerListSubjects::new(&args.sub_worker_list);
    let delta_subjects = DeltaSubjects::new(&args.sub_veh_deltas);

    let members: Arc<AsyncValue<Vec<String>>> = Arc::new(AsyncValue::new(Vec::new()));

    let listener = {
        let bus = bus.clone();
        let subjects = worker_list_subjects.clone();
        let members = members.clone();
        tokio::spawn(supervise("membership-listener", move || {
            run_membership_listener(bus.clone(), subjects.clone(), members.clone())
        }))
    };

    let heartbeat_task = {
        let bus = bus.clone();
        let subjects = heartbeat_subjects.clone();
        let worker_id = worker_id.clone();
        tokio::spawn(supervise("heartbeat", move || {
            run_heartbeat(bus.clone(), subjects.clone(), worker_id.clone())
        }))
    };

    let dispatcher = {
        let bus = bus.clone();
        let worker_id = worker_id.clone();
        let subjects = delta_subjects.clone();
        let cmd_base = args.sub_veh_cmd.clone();
        let status_base = args.sub_veh_status.clone();
        let members = members.clone();
        tokio::spawn(supervise("dispatcher", move || {
            run_dispatcher(
                bus.clone(),
                worker_id.clone(),
                subjects.clone(),
                cmd_base.clone(),
                status_base.clone(),
                members.clone(),
            )
        }))
    };

    tokio::signal::ctrl_c().await?;
    tracing::info!("shutting down worker {worker_id}");
    dispatcher.abort();
    listener.abort();
    heartbeat_task.abort();

    // Tell the coordinator we left on purpose.
    heartbeat::send_farewell(&bus, &heartbeat_subjects, &worker_id).await;

    Ok(())
}
