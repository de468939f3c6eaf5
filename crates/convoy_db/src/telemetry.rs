//! Transaction-scoped store operations for the telemetry pipeline.
//!
//! Each telemetry message is processed inside one transaction: the caller
//! opens it with [`ConvoyDb::begin`](crate::ConvoyDb::begin), threads it
//! through these functions, and commits once the whole message is
//! handled. Dropping the transaction on any failure rolls everything
//! back.

use chrono::{DateTime, Utc};
use uuid::Uuid;

use crate::error::Result;
use crate::pool::DbTx;
use crate::types::{row_to_geofence, row_to_vehicle, GeofenceRecord, VehicleRecord};

/// Fetch a vehicle inside the transaction.
pub async fn vehicle(tx: &mut DbTx, id: Uuid) -> Result<Option<VehicleRecord>> {
    let row = sqlx::query("SELECT * FROM vehicles WHERE id = ?")
        .bind(id.to_string())
        .fetch_optional(&mut **tx)
        .await?;

    row.as_ref().map(row_to_vehicle).transpose()
}

/// Update the live position of a vehicle.
pub async fn update_position(tx: &mut DbTx, id: Uuid, lat: f64, lon: f64) -> Result<()> {
    sqlx::query("UPDATE vehicles SET lat = ?, lon = ? WHERE id = ?")
        .bind(lat)
        .bind(lon)
        .bind(id.to_string())
        .execute(&mut **tx)
        .await?;
    Ok(())
}

/// Append one position sample to the history.
pub async fn insert_pos_event(
    tx: &mut DbTx,
    vehicle_id: Uuid,
    ts: DateTime<Utc>,
    lat: f64,
    lon: f64,
) -> Result<()> {
    sqlx::query("INSERT INTO vehicle_pos (vehicle_id, ts, lat, lon) VALUES (?, ?, ?, ?)")
        .bind(vehicle_id.to_string())
        .bind(ts)
        .bind(lat)
        .bind(lon)
        .execute(&mut **tx)
        .await?;
    Ok(())
}

/// Active geofences linked to a vehicle.
pub async fn active_geofences_for(
    tx: &mut DbTx,
    vehicle_id: Uuid,
) -> Result<Vec<GeofenceRecord>> {
    let rows = sqlx::query(
        r#"
        SELECT g.* FROM geofences g
        JOIN vehicle_geofences vg ON vg.geofence_id = g.id
        WHERE vg.vehicle_id = ? AND g.active = 1
        ORDER BY g.id
        "#,
    )
    .bind(vehicle_id.to_string())
    .fetch_all(&mut **tx)
    .await?;

    rows.iter().map(row_to_geofence).collect()
}

/// Record a geofence boundary crossing.
pub async fn insert_crossing_event(
    tx: &mut DbTx,
    vehicle_id: Uuid,
    geofence_id: Uuid,
    ts: DateTime<Utc>,
    entered: bool,
) -> Result<()> {
    sqlx::query(
        r#"
        INSERT INTO vehicle_geofence_events (vehicle_id, geofence_id, ts, entered)
        VALUES (?, ?, ?, ?)
        "#,
    )
    .bind(vehicle_id.to_string())
    .bind(geofence_id.to_string())
    .bind(ts)
    .bind(entered)
    .execute(&mut **tx)
    .await?;
    Ok(())
}

/// Record an immobilizer state change reported by the vehicle and latch
/// the live `immobilized` flag to it.
pub async fn insert_immobilized_event(
    tx: &mut DbTx,
    vehicle_id: Uuid,
    ts: DateTime<Utc>,
    user_id: Option<&str>,
    geofence_id: Option<Uuid>,
    active: bool,
) -> Result<()> {
    sqlx::query(
        r#"
        INSERT INTO vehicle_immobilized (vehicle_id, ts, user_id, geofence_id, immobilized)
        VALUES (?, ?, ?, ?, ?)
        "#,
    )
    .bind(vehicle_id.to_string())
    .bind(ts)
    .bind(user_id)
    .bind(geofence_id.map(|id| id.to_string()))
    .bind(active)
    .execute(&mut **tx)
    .await?;

    sqlx::query("UPDATE vehicles SET immobilized = ? WHERE id = ?")
        .bind(active)
        .bind(vehicle_id.to_string())
        .execute(&mut **tx)
        .await?;

    Ok(())
}
