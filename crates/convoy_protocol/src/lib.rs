//! Wire protocol for the Convoy vehicle-controller cluster.
//!
//! Everything on the bus is JSON/UTF-8. Two discrimination schemes are in
//! use:
//!
//! - Command and status messages carry an explicit `"type"` field
//!   (`"pos"` / `"immobilizer"`).
//! - Inventory deltas are discriminated by key presence: an object with a
//!   `"vehicles"` key is an update, one with `"vehicle_ids"` is a delete.
//!
//! Subject layout (dots significant):
//!
//! ```text
//! <HB>.req / <HB>.resp       heartbeat poll / worker replies
//! <WL>.b / <WL>.l            worker-list broadcast / on-demand request
//! <VD>.b / <VD>.l            vehicle-delta broadcast / full inventory
//! <VC_CMD>.<vehicle_id>      per-vehicle command
//! <VC_STATUS>.<vehicle_id>   per-vehicle status
//! ```

pub mod error;
pub mod subjects;
pub mod types;

pub use error::{decode, encode, ProtocolError};
pub use subjects::{
    vehicle_id_from_subject, vehicle_subject, DeltaSubjects, HeartbeatSubjects,
    WorkerListSubjects, STATUS_WILDCARD,
};
pub use types::{
    Heartbeat, ImmobilizerCorrelation, VehicleCommand, VehicleConfig, VehicleDelta,
    VehicleStatus, WorkerIds,
};
