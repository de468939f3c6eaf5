//! Convoy fleet manager.
//!
//! The stateful side of the cluster: consumes per-vehicle telemetry,
//! keeps the fleet store authoritative (last position, immobilizer state,
//! geofence membership), issues immobilizer commands back to the workers,
//! and feeds the worker fleet its inventory (broadcast deltas on CRUD
//! mutations, full snapshots on request).
//!
//! The HTTP CRUD surface lives elsewhere; it drives the store through
//! [`convoy_db`], creates geofences through
//! [`geofences::create_geofence`] (which rejects malformed GeoJSON), and
//! announces activation changes through
//! [`deltas::publish_vehicle_delta`].

pub mod deltas;
pub mod geo;
pub mod geofences;
pub mod telemetry;

pub use deltas::{publish_vehicle_delta, run_inventory_responder};
pub use geofences::create_geofence;
pub use telemetry::run_telemetry_listener;

/// Queue group shared by all manager replicas: one replica consumes each
/// status message and one answers each inventory request.
pub const QUEUE_GROUP: &str = "vm";
