//! Subject construction from the configured base names.
//!
//! Services receive base subjects through the environment (`SUB_HEARTBEAT`,
//! `SUB_WORKER_LIST`, `SUB_VEH_DELTAS`, `SUB_VEH_CMD`, `SUB_VEH_STATUS`)
//! and derive the concrete subjects here, so the suffix conventions live in
//! exactly one place.

use uuid::Uuid;

use crate::error::{ProtocolError, Result};

/// NATS wildcard matching one token, used for per-vehicle status subjects.
pub const STATUS_WILDCARD: &str = "*";

/// Heartbeat poll/response subjects.
#[derive(Debug, Clone)]
pub struct HeartbeatSubjects {
    /// Coordinator -> workers poll (empty payload).
    pub request: String,
    /// Workers -> coordinator replies (`Heartbeat` payload).
    pub response: String,
}

impl HeartbeatSubjects {
    pub fn new(base: &str) -> Self {
        Self {
            request: format!("{base}.req"),
            response: format!("{base}.resp"),
        }
    }
}

/// Worker-list broadcast and on-demand subjects.
#[derive(Debug, Clone)]
pub struct WorkerListSubjects {
    /// Coordinator -> all workers membership broadcast.
    pub broadcast: String,
    /// Request/reply subject returning the current snapshot.
    pub listen: String,
}

impl WorkerListSubjects {
    pub fn new(base: &str) -> Self {
        Self {
            broadcast: format!("{base}.b"),
            listen: format!("{base}.l"),
        }
    }
}

/// Vehicle-delta broadcast and full-inventory subjects.
#[derive(Debug, Clone)]
pub struct DeltaSubjects {
    /// Manager -> all workers add/remove broadcast.
    pub broadcast: String,
    /// Request/reply subject returning the full active inventory.
    pub listen: String,
}

impl DeltaSubjects {
    pub fn new(base: &str) -> Self {
        Self {
            broadcast: format!("{base}.b"),
            listen: format!("{base}.l"),
        }
    }
}

/// Build a per-vehicle subject: `<base>.<vehicle_id>`.
///
/// Used for both command and status subjects; the vehicle id is the last
/// dot-separated token.
pub fn vehicle_subject(base: &str, vehicle_id: &str) -> String {
    format!("{base}.{vehicle_id}")
}

/// Extract and parse the vehicle id from a per-vehicle subject.
pub fn vehicle_id_from_subject(subject: &str) -> Result<Uuid> {
    let token = subject
        .rsplit('.')
        .next()
        .filter(|t| !t.is_empty())
        .ok_or_else(|| ProtocolError::MissingVehicleId(subject.to_string()))?;

    Uuid::parse_str(token).map_err(|e| ProtocolError::InvalidVehicleId(token.to_string(), e))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_suffix_conventions() {
        let hb = HeartbeatSubjects::new("fleet.hb");
        assert_eq!(hb.request, "fleet.hb.req");
        assert_eq!(hb.response, "fleet.hb.resp");

        let wl = WorkerListSubjects::new("fleet.workers");
        assert_eq!(wl.broadcast, "fleet.workers.b");
        assert_eq!(wl.listen, "fleet.workers.l");

        let vd = DeltaSubjects::new("fleet.veh.deltas");
        assert_eq!(vd.broadcast, "fleet.veh.deltas.b");
        assert_eq!(vd.listen, "fleet.veh.deltas.l");
    }

    #[test]
    fn test_vehicle_id_roundtrip() {
        let id = Uuid::new_v4();
        let subject = vehicle_subject("fleet.veh.status", &id.to_string());
        assert_eq!(vehicle_id_from_subject(&subject).unwrap(), id);
    }

    #[test]
    fn test_vehicle_id_rejects_garbage() {
        assert!(vehicle_id_from_subject("fleet.veh.status.not-a-uuid").is_err());
        assert!(vehicle_id_from_subject("").is_err());
    }
}
