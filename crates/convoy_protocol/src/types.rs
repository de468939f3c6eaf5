//! Wire payload types.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Worker liveness message.
///
/// `active: true` is sent in response to a coordinator poll and once on
/// worker startup. `active: false` is sent best-effort on orderly shutdown
/// so the coordinator can drop the worker without waiting for eviction.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Heartbeat {
    pub worker_id: String,
    pub active: bool,
}

/// Membership snapshot broadcast by the coordinator.
///
/// Workers accept the list verbatim; it is the single authoritative view.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct WorkerIds {
    pub worker_ids: Vec<String>,
}

/// Static configuration of one registered vehicle.
///
/// Immutable with respect to the cluster while active; created and
/// destroyed only through manager deltas. `vdata` is opaque to everything
/// except the simulator that runs the vehicle.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct VehicleConfig {
    pub vehicle_id: String,
    pub vtype: String,
    pub vdata: serde_json::Value,
}

/// Inventory change event.
///
/// Discriminated by key presence: `{"vehicles": [...]}` is an update,
/// `{"vehicle_ids": [...]}` is a delete. A full inventory snapshot is a
/// single `Update` listing every active vehicle.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum VehicleDelta {
    Update { vehicles: Vec<VehicleConfig> },
    Delete { vehicle_ids: Vec<String> },
}

impl VehicleDelta {
    pub fn update(vehicles: Vec<VehicleConfig>) -> Self {
        Self::Update { vehicles }
    }

    pub fn delete(vehicle_ids: Vec<String>) -> Self {
        Self::Delete { vehicle_ids }
    }
}

/// Who (or what) requested an immobilizer change.
///
/// Exactly one of the two fields is set for commands issued today: a user
/// acting through the CRUD surface, or a geofence crossing.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ImmobilizerCorrelation {
    pub user_id: Option<String>,
    pub geofence_id: Option<Uuid>,
}

impl ImmobilizerCorrelation {
    pub fn user(user_id: impl Into<String>) -> Self {
        Self {
            user_id: Some(user_id.into()),
            geofence_id: None,
        }
    }

    pub fn geofence(geofence_id: Uuid) -> Self {
        Self {
            user_id: None,
            geofence_id: Some(geofence_id),
        }
    }
}

/// Command sent to one vehicle on `<VC_CMD>.<vehicle_id>`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type")]
pub enum VehicleCommand {
    #[serde(rename = "immobilizer")]
    Immobilizer {
        correlation: ImmobilizerCorrelation,
        active: bool,
    },
}

/// Telemetry published by one vehicle on `<VC_STATUS>.<vehicle_id>`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type")]
pub enum VehicleStatus {
    #[serde(rename = "pos")]
    Pos {
        lat: f64,
        lon: f64,
        ts: DateTime<Utc>,
    },
    #[serde(rename = "immobilizer")]
    Immobilizer {
        correlation: ImmobilizerCorrelation,
        active: bool,
        ts: DateTime<Utc>,
    },
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::decode;

    #[test]
    fn test_heartbeat_wire_shape() {
        let hb: Heartbeat = decode(br#"{"worker_id": "w1", "active": true}"#).unwrap();
        assert_eq!(hb.worker_id, "w1");
        assert!(hb.active);

        let json = serde_json::to_value(&Heartbeat {
            worker_id: "w2".into(),
            active: false,
        })
        .unwrap();
        assert_eq!(json, serde_json::json!({"worker_id": "w2", "active": false}));
    }

    #[test]
    fn test_delta_discriminated_by_key() {
        let update: VehicleDelta = decode(
            br#"{"vehicles": [{"vehicle_id": "v1", "vtype": "test", "vdata": {"lat": 1.0}}]}"#,
        )
        .unwrap();
        assert!(matches!(update, VehicleDelta::Update { ref vehicles } if vehicles.len() == 1));

        let delete: VehicleDelta = decode(br#"{"vehicle_ids": ["v1", "v2"]}"#).unwrap();
        assert!(
            matches!(delete, VehicleDelta::Delete { ref vehicle_ids } if vehicle_ids.len() == 2)
        );
    }

    #[test]
    fn test_empty_update_still_an_update() {
        // An empty inventory snapshot has a "vehicles" key and must not
        // fall through to the delete variant.
        let delta: VehicleDelta = decode(br#"{"vehicles": []}"#).unwrap();
        assert!(matches!(delta, VehicleDelta::Update { ref vehicles } if vehicles.is_empty()));
    }

    #[test]
    fn test_status_tagged_by_type() {
        let pos: VehicleStatus =
            decode(br#"{"type": "pos", "lat": 46.05, "lon": 14.5, "ts": "2025-06-01T12:00:00Z"}"#)
                .unwrap();
        assert!(matches!(pos, VehicleStatus::Pos { lat, .. } if (lat - 46.05).abs() < 1e-9));

        let imm: VehicleStatus = decode(
            br#"{"type": "immobilizer",
                 "correlation": {"user_id": null, "geofence_id": null},
                 "active": true, "ts": "2025-06-01T12:00:00Z"}"#,
        )
        .unwrap();
        assert!(matches!(imm, VehicleStatus::Immobilizer { active: true, .. }));
    }

    #[test]
    fn test_command_serializes_with_type_tag() {
        let cmd = VehicleCommand::Immobilizer {
            correlation: ImmobilizerCorrelation::geofence(Uuid::new_v4()),
            active: true,
        };
        let json = serde_json::to_value(&cmd).unwrap();
        assert_eq!(json["type"], "immobilizer");
        assert_eq!(json["active"], true);
        assert!(json["correlation"]["user_id"].is_null());

        let by_user = serde_json::to_value(&VehicleCommand::Immobilizer {
            correlation: ImmobilizerCorrelation::user("u1"),
            active: false,
        })
        .unwrap();
        assert_eq!(by_user["correlation"]["user_id"], "u1");
        assert!(by_user["correlation"]["geofence_id"].is_null());
    }

    #[test]
    fn test_malformed_body_is_an_error() {
        assert!(decode::<VehicleDelta>(b"{\"unrelated\": 1}").is_err());
        assert!(decode::<Heartbeat>(b"not json").is_err());
    }
}
