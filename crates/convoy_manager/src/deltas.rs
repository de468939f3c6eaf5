//! Inventory deltas: broadcast on CRUD mutations, full snapshot on
//! request.

use convoy_bus::Bus;
use convoy_core::{with_retries, DELTA_RETRIES, RETRY_DELAY};
use convoy_db::{ConvoyDb, VehicleRecord};
use convoy_protocol::{encode, DeltaSubjects, VehicleConfig, VehicleDelta};
use futures_util::StreamExt;
use tracing::{error, warn};

use crate::QUEUE_GROUP;

/// Wire form of a stored vehicle.
pub fn vehicle_to_wire(vehicle: &VehicleRecord) -> VehicleConfig {
    VehicleConfig {
        vehicle_id: vehicle.id.to_string(),
        vtype: vehicle.vtype.clone(),
        vdata: vehicle.vconfig.clone(),
    }
}

/// The delta announcing a vehicle's current activation state: an active
/// vehicle is announced as an update, a deactivated one as a delete.
pub fn activation_delta(vehicle: &VehicleRecord) -> VehicleDelta {
    if vehicle.active {
        VehicleDelta::update(vec![vehicle_to_wire(vehicle)])
    } else {
        VehicleDelta::delete(vec![vehicle.id.to_string()])
    }
}

/// One update delta carrying every active vehicle.
pub async fn inventory_snapshot(db: &ConvoyDb) -> anyhow::Result<VehicleDelta> {
    let vehicles = db.list_active_vehicles().await?;
    Ok(VehicleDelta::update(
        vehicles.iter().map(vehicle_to_wire).collect(),
    ))
}

/// Broadcast the activation delta for a vehicle whose state just changed,
/// retried under the delta policy. Called by the CRUD layer after its
/// transaction commits.
pub async fn publish_vehicle_delta(
    bus: &Bus,
    subjects: &DeltaSubjects,
    vehicle: &VehicleRecord,
) -> anyhow::Result<()> {
    let payload = encode(&activation_delta(vehicle))?;
    with_retries(DELTA_RETRIES, RETRY_DELAY, || {
        bus.publish(&subjects.broadcast, payload.clone())
    })
    .await?;
    Ok(())
}

/// Serve cold-state inventory requests from workers until cancelled.
///
/// Queue-group subscription: with several manager replicas, exactly one
/// answers each request.
pub async fn run_inventory_responder(
    db: ConvoyDb,
    bus: Bus,
    subjects: DeltaSubjects,
) -> anyhow::Result<()> {
    let mut requests = bus.queue_subscribe(&subjects.listen, QUEUE_GROUP).await?;

    while let Some(msg) = requests.next().await {
        match inventory_snapshot(&db).await {
            Ok(delta) => {
                if let Err(e) = bus.respond(&msg, encode(&delta)?).await {
                    warn!("inventory reply failed: {e}");
                }
            }
            Err(e) => error!("inventory query failed: {e:#}"),
        }
    }

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Utc;
    use convoy_db::NewVehicle;
    use serde_json::json;

    fn new_vehicle(name: &str) -> NewVehicle {
        NewVehicle {
            name: name.into(),
            vtype: "test".into(),
            vconfig: json!({"lat": 1.0, "lon": 2.0, "std": 0.1}),
        }
    }

    #[tokio::test]
    async fn test_activation_delta_direction() {
        let db = ConvoyDb::memory().await.unwrap();
        let vehicle = db
            .create_vehicle(new_vehicle("v"), "u1", Utc::now())
            .await
            .unwrap();

        // Newly active: an update carrying the config.
        match activation_delta(&vehicle) {
            VehicleDelta::Update { vehicles } => {
                assert_eq!(vehicles.len(), 1);
                assert_eq!(vehicles[0].vehicle_id, vehicle.id.to_string());
                assert_eq!(vehicles[0].vdata, vehicle.vconfig);
            }
            VehicleDelta::Delete { .. } => panic!("active vehicle produced a delete"),
        }

        // Newly inactive: a delete carrying the id.
        let gone = db
            .deactivate_vehicle(vehicle.id, "u1", Utc::now())
            .await
            .unwrap();
        match activation_delta(&gone) {
            VehicleDelta::Delete { vehicle_ids } => {
                assert_eq!(vehicle_ids, vec![vehicle.id.to_string()]);
            }
            VehicleDelta::Update { .. } => panic!("inactive vehicle produced an update"),
        }
    }

    #[tokio::test]
    async fn test_inventory_snapshot_lists_only_active() {
        let db = ConvoyDb::memory().await.unwrap();
        let keep = db
            .create_vehicle(new_vehicle("keep"), "u1", Utc::now())
            .await
            .unwrap();
        let drop = db
            .create_vehicle(new_vehicle("drop"), "u1", Utc::now())
            .await
            .unwrap();
        db.deactivate_vehicle(drop.id, "u1", Utc::now())
            .await
            .unwrap();

        match inventory_snapshot(&db).await.unwrap() {
            VehicleDelta::Update { vehicles } => {
                assert_eq!(vehicles.len(), 1);
                assert_eq!(vehicles[0].vehicle_id, keep.id.to_string());
            }
            VehicleDelta::Delete { .. } => panic!("snapshot must be an update"),
        }
    }

    #[tokio::test]
    async fn test_empty_inventory_is_an_empty_update() {
        let db = ConvoyDb::memory().await.unwrap();
        match inventory_snapshot(&db).await.unwrap() {
            VehicleDelta::Update { vehicles } => assert!(vehicles.is_empty()),
            VehicleDelta::Delete { .. } => panic!("snapshot must be an update"),
        }
    }
}
