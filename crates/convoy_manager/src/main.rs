//! Convoy fleet manager.
//!
//! Usage:
//!     convoy-manager --nats-url nats://127.0.0.1:4222 --database-url sqlite:fleet.db?mode=rwc
//!
//! All options can also come from the environment (`NATS_URL`,
//! `DATABASE_URL`, `SUB_VEH_DELTAS`, `SUB_VEH_CMD`, `SUB_VEH_STATUS`).

use clap::Parser;
use convoy_bus::Bus;
use convoy_core::supervise;
use convoy_db::{ConvoyDb, DbConfig};
use convoy_manager::{run_inventory_responder, run_telemetry_listener};
use convoy_protocol::DeltaSubjects;

#[derive(Parser, Debug)]
#[command(name = "convoy-manager", about = "Fleet manager service for the Convoy cluster")]
struct Args {
    /// NATS server URL
    #[arg(long, env = "NATS_URL", default_value = "nats://127.0.0.1:4222")]
    nats_url: String,

    /// Database connection URL
    #[arg(long, env = "DATABASE_URL", default_value = "sqlite:convoy.db?mode=rwc")]
    database_url: String,

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

    tracing::info!("starting convoy manager");
    tracing::info!("  nats: {}", args.nats_url);
    tracing::info!("  database: {}", args.database_url);

    let db = ConvoyDb::connect(DbConfig::new(&args.database_url)).await?;
    db.ensure_schema().await?;

    let bus = Bus::connect(&args.nats_url).await;
    let delta_subjects = DeltaSubjects::new(&args.sub_veh_deltas);

    let telemetry = {
        let db = db.clone();
        let bus = bus.clone();
        let status_base = args.sub_veh_status.clone();
        let cmd_base = args.sub_veh_cmd.clone();
        tokio::spawn(supervise("telemetry-listener", move || {
            run_telemetry_listener(
                db.clone(),
                bus.clone(),
                status_base.clone(),
                cmd_base.clone(),
            )
        }))
    };

    let inventory = {
        let db = db.clone();
        let bus = bus.clone();
        let subjects = delta_subjects.clone();
        tokio::spawn(supervise("inventory-responder", move || {
            run_inventory_responder(db.clone(), bus.clone(), subjects.clone())
        }))
    };

    tokio::signal::ctrl_c().await?;
    tracing::info!("shutting down");
    telemetry.abort();
    inventory.abort();

    Ok(())
}
