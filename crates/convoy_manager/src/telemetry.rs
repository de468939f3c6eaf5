//! Telemetry ingestion: the authoritative side of vehicle state.
//!
//! One queue-group subscription over all per-vehicle status subjects, so
//! exactly one manager replica consumes each message. Each message is
//! processed in its own transaction; a vehicle deleted while telemetry
//! was in flight simply drops on the floor.
//!
//! No per-vehicle ordering is assumed across queue-group members:
//! position history is timestamped, and immobilization state is latched
//! by each new event.

use chrono::{DateTime, Utc};
use convoy_bus::Bus;
use convoy_core::{with_retries, RETRY_DELAY, TRANSPORT_RETRIES};
use convoy_db::{telemetry, ConvoyDb, DbTx};
use convoy_protocol::{
    decode, encode, vehicle_id_from_subject, vehicle_subject, ImmobilizerCorrelation,
    VehicleCommand, VehicleStatus, STATUS_WILDCARD,
};
use futures_util::StreamExt;
use tracing::{error, warn};
use uuid::Uuid;

use crate::geo::{crossing, parse_geometry};
use crate::QUEUE_GROUP;

/// An immobilizer command decided during telemetry processing, published
/// before the transaction commits.
#[derive(Debug, Clone, PartialEq)]
pub struct ImmobilizeRequest {
    pub correlation: ImmobilizerCorrelation,
    pub active: bool,
}

/// Consume `<VC_STATUS>.*` until cancelled.
pub async fn run_telemetry_listener(
    db: ConvoyDb,
    bus: Bus,
    status_base: String,
    cmd_base: String,
) -> anyhow::Result<()> {
    let wildcard = vehicle_subject(&status_base, STATUS_WILDCARD);
    let mut statuses = bus.queue_subscribe(&wildcard, QUEUE_GROUP).await?;

    while let Some(msg) = statuses.next().await {
        let vehicle_id = match vehicle_id_from_subject(msg.subject.as_str()) {
            Ok(id) => id,
            Err(e) => {
                warn!("dropping status with bad subject: {e}");
                continue;
            }
        };
        let status = match decode::<VehicleStatus>(&msg.payload) {
            Ok(status) => status,
            Err(e) => {
                warn!("vehicle {vehicle_id}: dropping malformed status: {e}");
                continue;
            }
        };

        let outcome = with_retries(TRANSPORT_RETRIES, RETRY_DELAY, || {
            handle_status(&db, &bus, &cmd_base, vehicle_id, status.clone())
        })
        .await;
        if let Err(e) = outcome {
            error!("vehicle {vehicle_id}: telemetry processing failed: {e:#}");
        }
    }

    Ok(())
}

async fn handle_status(
    db: &ConvoyDb,
    bus: &Bus,
    cmd_base: &str,
    vehicle_id: Uuid,
    status: VehicleStatus,
) -> anyhow::Result<()> {
    match status {
        VehicleStatus::Pos { lat, lon, ts } => {
            process_pos_telemetry(db, bus, cmd_base, vehicle_id, lat, lon, ts).await
        }
        VehicleStatus::Immobilizer {
            correlation,
            active,
            ts,
        } => process_immobilizer_telemetry(db, vehicle_id, correlation, active, ts).await,
    }
}

/// Persist a position report and evaluate geofence crossings.
pub async fn process_pos_telemetry(
    db: &ConvoyDb,
    bus: &Bus,
    cmd_base: &str,
    vehicle_id: Uuid,
    lat: f64,
    lon: f64,
    ts: DateTime<Utc>,
) -> anyhow::Result<()> {
    let mut tx = db.begin().await?;
    let requests = apply_pos_telemetry(&mut tx, vehicle_id, lat, lon, ts).await?;

    for request in &requests {
        transmit_immobilize(bus, cmd_base, vehicle_id, request.clone()).await?;
    }

    tx.commit().await?;
    Ok(())
}

/// The transactional part of position processing. Returns the immobilizer
/// commands the crossings call for.
pub async fn apply_pos_telemetry(
    tx: &mut DbTx,
    vehicle_id: Uuid,
    lat: f64,
    lon: f64,
    ts: DateTime<Utc>,
) -> anyhow::Result<Vec<ImmobilizeRequest>> {
    let Some(vehicle) = telemetry::vehicle(tx, vehicle_id).await? else {
        return Ok(Vec::new());
    };
    if !vehicle.active {
        return Ok(Vec::new());
    }

    let prev_pos = vehicle.position();
    telemetry::update_position(tx, vehicle_id, lat, lon).await?;
    telemetry::insert_pos_event(tx, vehicle_id, ts, lat, lon).await?;

    let geofences = telemetry::active_geofences_for(tx, vehicle_id).await?;
    let current = (lon, lat);
    let mut requests = Vec::new();

    for geofence in &geofences {
        let geometry = match parse_geometry(&geofence.data) {
            Ok(geometry) => geometry,
            Err(e) => {
                warn!("skipping geofence {} with malformed geometry: {e}", geofence.id);
                continue;
            }
        };

        let Some(entered) = crossing(&geometry, prev_pos, current) else {
            continue;
        };
        telemetry::insert_crossing_event(tx, vehicle_id, geofence.id, ts, entered).await?;

        if entered && geofence.immobilize_enter && !vehicle.immobilized {
            requests.push(ImmobilizeRequest {
                correlation: ImmobilizerCorrelation::geofence(geofence.id),
                active: true,
            });
        }
        if !entered && geofence.immobilize_leave && vehicle.immobilized {
            requests.push(ImmobilizeRequest {
                correlation: ImmobilizerCorrelation::geofence(geofence.id),
                active: false,
            });
        }
    }

    Ok(requests)
}

/// Persist an immobilizer state report and latch the live flag.
pub async fn process_immobilizer_telemetry(
    db: &ConvoyDb,
    vehicle_id: Uuid,
    correlation: ImmobilizerCorrelation,
    active: bool,
    ts: DateTime<Utc>,
) -> anyhow::Result<()> {
    let mut tx = db.begin().await?;

    let Some(vehicle) = telemetry::vehicle(&mut tx, vehicle_id).await? else {
        return Ok(());
    };
    if !vehicle.active {
        return Ok(());
    }

    telemetry::insert_immobilized_event(
        &mut tx,
        vehicle_id,
        ts,
        correlation.user_id.as_deref(),
        correlation.geofence_id,
        active,
    )
    .await?;

    tx.commit().await?;
    Ok(())
}

/// Publish an immobilizer command on the vehicle's command subject,
/// retried under the transport policy.
pub async fn transmit_immobilize(
    bus: &Bus,
    cmd_base: &str,
    vehicle_id: Uuid,
    request: ImmobilizeRequest,
) -> anyhow::Result<()> {
    let subject = vehicle_subject(cmd_base, &vehicle_id.to_string());
    let payload = encode(&VehicleCommand::Immobilizer {
        correlation: request.correlation,
        active: request.active,
    })?;

    with_retries(TRANSPORT_RETRIES, RETRY_DELAY, || {
        bus.publish(&subject, payload.clone())
    })
    .await?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Duration;
    use convoy_db::{EventRange, FleetEvent, NewGeofence, NewVehicle};
    use serde_json::json;

    fn unit_square() -> serde_json::Value {
        json!({
            "type": "Polygon",
            "coordinates": [[[0.0, 0.0], [1.0, 0.0], [1.0, 1.0], [0.0, 1.0], [0.0, 0.0]]]
        })
    }

    async fn seed(db: &ConvoyDb, immobilize_enter: bool, immobilize_leave: bool) -> (Uuid, Uuid) {
        let vehicle = db
            .create_vehicle(
                NewVehicle {
                    name: "v".into(),
                    vtype: "test".into(),
                    vconfig: json!({"lat": 0.5, "lon": 0.5, "std": 0.0}),
                },
                "u1",
                Utc::now() - Duration::seconds(60),
            )
            .await
            .unwrap();
        let geofence = db
            .create_geofence(
                NewGeofence {
                    name: "depot".into(),
                    data: unit_square(),
                    immobilize_enter,
                    immobilize_leave,
                },
                "u1",
                Utc::now() - Duration::seconds(60),
            )
            .await
            .unwrap();
        db.assign_vehicle_to_geofence(vehicle.id, geofence.id)
            .await
            .unwrap();
        (vehicle.id, geofence.id)
    }

    async fn apply(
        db: &ConvoyDb,
        vid: Uuid,
        lat: f64,
        lon: f64,
        ts: DateTime<Utc>,
    ) -> Vec<ImmobilizeRequest> {
        let mut tx = db.begin().await.unwrap();
        let requests = apply_pos_telemetry(&mut tx, vid, lat, lon, ts)
            .await
            .unwrap();
        tx.commit().await.unwrap();
        requests
    }

    fn crossings(events: &[FleetEvent]) -> Vec<bool> {
        events
            .iter()
            .filter_map(|e| match e {
                FleetEvent::GeofenceCrossing { entered, .. } => Some(*entered),
                _ => None,
            })
            .collect()
    }

    #[tokio::test]
    async fn test_entering_geofence_triggers_immobilize() {
        let db = ConvoyDb::memory().await.unwrap();
        let (vid, gid) = seed(&db, true, false).await;
        let t0 = Utc::now();

        // First report: outside the square.
        let requests = apply(&db, vid, 5.0, 5.0, t0).await;
        assert!(requests.is_empty());

        // Second report: inside. One crossing, one immobilize command.
        let requests = apply(&db, vid, 0.5, 0.5, t0 + Duration::seconds(1)).await;
        assert_eq!(
            requests,
            vec![ImmobilizeRequest {
                correlation: ImmobilizerCorrelation::geofence(gid),
                active: true,
            }]
        );

        let events = db.vehicle_events(vid, &EventRange::default()).await.unwrap();
        assert_eq!(crossings(&events), vec![true]);

        // Staying inside records nothing further.
        let requests = apply(&db, vid, 0.6, 0.6, t0 + Duration::seconds(2)).await;
        assert!(requests.is_empty());
        let events = db.vehicle_events(vid, &EventRange::default()).await.unwrap();
        assert_eq!(crossings(&events), vec![true]);
    }

    #[tokio::test]
    async fn test_leave_releases_only_when_immobilized() {
        let db = ConvoyDb::memory().await.unwrap();
        let (vid, gid) = seed(&db, false, true).await;
        let t0 = Utc::now();

        // Enter, then leave while not immobilized: crossings recorded,
        // no commands.
        apply(&db, vid, 0.5, 0.5, t0).await;
        let requests = apply(&db, vid, 5.0, 5.0, t0 + Duration::seconds(1)).await;
        assert!(requests.is_empty());

        // Re-enter, report immobilized, then leave: release command.
        apply(&db, vid, 0.5, 0.5, t0 + Duration::seconds(2)).await;
        process_immobilizer_telemetry(
            &db,
            vid,
            ImmobilizerCorrelation::geofence(gid),
            true,
            t0 + Duration::seconds(3),
        )
        .await
        .unwrap();

        let requests = apply(&db, vid, 5.0, 5.0, t0 + Duration::seconds(4)).await;
        assert_eq!(
            requests,
            vec![ImmobilizeRequest {
                correlation: ImmobilizerCorrelation::geofence(gid),
                active: false,
            }]
        );
    }

    #[tokio::test]
    async fn test_unknown_or_inactive_vehicle_drops_silently() {
        let db = ConvoyDb::memory().await.unwrap();
        let (vid, _) = seed(&db, true, true).await;

        let requests = apply(&db, Uuid::new_v4(), 0.5, 0.5, Utc::now()).await;
        assert!(requests.is_empty());

        db.deactivate_vehicle(vid, "u1", Utc::now()).await.unwrap();
        let requests = apply(&db, vid, 0.5, 0.5, Utc::now()).await;
        assert!(requests.is_empty());
        assert!(db
            .position_history(vid, &EventRange::default())
            .await
            .unwrap()
            .is_empty());
    }

    #[tokio::test]
    async fn test_malformed_geofence_is_skipped() {
        let db = ConvoyDb::memory().await.unwrap();
        let (vid, _) = seed(&db, true, false).await;
        let bad = db
            .create_geofence(
                NewGeofence {
                    name: "broken".into(),
                    data: json!({"type": "Nonsense"}),
                    immobilize_enter: true,
                    immobilize_leave: false,
                },
                "u1",
                Utc::now(),
            )
            .await
            .unwrap();
        db.assign_vehicle_to_geofence(vid, bad.id).await.unwrap();

        // The good geofence still triggers; the broken one is skipped.
        let requests = apply(&db, vid, 0.5, 0.5, Utc::now()).await;
        assert_eq!(requests.len(), 1);
    }

    #[tokio::test]
    async fn test_immobilizer_telemetry_latches_flag() {
        let db = ConvoyDb::memory().await.unwrap();
        let (vid, gid) = seed(&db, true, false).await;

        process_immobilizer_telemetry(
            &db,
            vid,
            ImmobilizerCorrelation::geofence(gid),
            true,
            Utc::now(),
        )
        .await
        .unwrap();

        let vehicle = db.vehicle(vid).await.unwrap().unwrap();
        assert!(vehicle.immobilized);

        // Once immobilized, entering again must not re-issue the command.
        let t = Utc::now();
        apply(&db, vid, 5.0, 5.0, t).await;
        let requests = apply(&db, vid, 0.5, 0.5, t + Duration::seconds(1)).await;
        assert!(requests.is_empty());
    }
}
