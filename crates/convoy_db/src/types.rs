//! Record types and row conversions.
//!
//! Ids are stored as hyphenated TEXT and JSON columns as serialized TEXT,
//! which keeps the schema identical across SQLite and Postgres; the
//! conversions live here so query code stays flat.

use chrono::{DateTime, Utc};
use serde_json::Value;
use sqlx::Row;
use uuid::Uuid;

use crate::error::{DbError, Result};
use crate::pool::DbRow;

/// One registered vehicle, live position included.
#[derive(Debug, Clone, PartialEq)]
pub struct VehicleRecord {
    pub id: Uuid,
    pub active: bool,
    pub name: String,
    pub vtype: String,
    pub vconfig: Value,
    pub immobilized: bool,
    pub lat: Option<f64>,
    pub lon: Option<f64>,
}

impl VehicleRecord {
    /// Previous position, present once both coordinates have been set.
    pub fn position(&self) -> Option<(f64, f64)> {
        match (self.lon, self.lat) {
            (Some(lon), Some(lat)) => Some((lon, lat)),
            _ => None,
        }
    }
}

/// Fields for creating a vehicle.
#[derive(Debug, Clone)]
pub struct NewVehicle {
    pub name: String,
    pub vtype: String,
    pub vconfig: Value,
}

/// One geofence; `data` is the GeoJSON geometry.
#[derive(Debug, Clone, PartialEq)]
pub struct GeofenceRecord {
    pub id: Uuid,
    pub active: bool,
    pub name: String,
    pub data: Value,
    pub immobilize_enter: bool,
    pub immobilize_leave: bool,
}

/// Fields for creating a geofence.
#[derive(Debug, Clone)]
pub struct NewGeofence {
    pub name: String,
    pub data: Value,
    pub immobilize_enter: bool,
    pub immobilize_leave: bool,
}

/// Partial update of geofence attributes; `None` leaves a field alone.
#[derive(Debug, Clone, Default)]
pub struct GeofencePatch {
    pub name: Option<String>,
    pub immobilize_enter: Option<bool>,
    pub immobilize_leave: Option<bool>,
}

/// One persisted position sample.
#[derive(Debug, Clone, PartialEq)]
pub struct PosSample {
    pub ts: DateTime<Utc>,
    pub lat: f64,
    pub lon: f64,
}

/// Time-range + limit filter for history queries. `limit == 0` means
/// unlimited.
#[derive(Debug, Clone, Default)]
pub struct EventRange {
    pub start: Option<DateTime<Utc>>,
    pub end: Option<DateTime<Utc>>,
    pub limit: usize,
}

/// One entry in the merged audit/event history of a vehicle or geofence.
#[derive(Debug, Clone, PartialEq)]
pub enum FleetEvent {
    Created {
        ts: DateTime<Utc>,
        user_id: String,
    },
    Modified {
        ts: DateTime<Utc>,
        user_id: String,
    },
    Deleted {
        ts: DateTime<Utc>,
        user_id: String,
    },
    Immobilized {
        ts: DateTime<Utc>,
        vehicle_id: Uuid,
        user_id: Option<String>,
        geofence_id: Option<Uuid>,
        immobilized: bool,
    },
    GeofenceCrossing {
        ts: DateTime<Utc>,
        vehicle_id: Uuid,
        geofence_id: Uuid,
        entered: bool,
    },
}

impl FleetEvent {
    pub fn ts(&self) -> DateTime<Utc> {
        match self {
            Self::Created { ts, .. }
            | Self::Modified { ts, .. }
            | Self::Deleted { ts, .. }
            | Self::Immobilized { ts, .. }
            | Self::GeofenceCrossing { ts, .. } => *ts,
        }
    }
}

// --- Row conversions ---

pub(crate) fn parse_id(column: &str, raw: &str) -> Result<Uuid> {
    Uuid::parse_str(raw).map_err(|e| DbError::corrupt_row(format!("{column} {raw:?}: {e}")))
}

pub(crate) fn parse_json(column: &str, raw: &str) -> Result<Value> {
    serde_json::from_str(raw).map_err(|e| DbError::corrupt_row(format!("{column}: {e}")))
}

pub(crate) fn opt_id(column: &str, raw: Option<String>) -> Result<Option<Uuid>> {
    raw.map(|s| parse_id(column, &s)).transpose()
}

pub(crate) fn row_to_vehicle(row: &DbRow) -> Result<VehicleRecord> {
    Ok(VehicleRecord {
        id: parse_id("vehicles.id", &row.try_get::<String, _>("id")?)?,
        active: row.try_get("active")?,
        name: row.try_get("name")?,
        vtype: row.try_get("vtype")?,
        vconfig: parse_json("vehicles.vconfig", &row.try_get::<String, _>("vconfig")?)?,
        immobilized: row.try_get("immobilized")?,
        lat: row.try_get("lat")?,
        lon: row.try_get("lon")?,
    })
}

pub(crate) fn row_to_geofence(row: &DbRow) -> Result<GeofenceRecord> {
    Ok(GeofenceRecord {
        id: parse_id("geofences.id", &row.try_get::<String, _>("id")?)?,
        active: row.try_get("active")?,
        name: row.try_get("name")?,
        data: parse_json("geofences.data", &row.try_get::<String, _>("data")?)?,
        immobilize_enter: row.try_get("immobilize_enter")?,
        immobilize_leave: row.try_get("immobilize_leave")?,
    })
}
