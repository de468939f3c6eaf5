//! Geofence creation behind the CRUD surface.
//!
//! The HTTP layer creates geofences through this hook rather than
//! through the store directly, so a malformed geometry is rejected
//! before anything is persisted.

use chrono::{DateTime, Utc};
use convoy_db::{ConvoyDb, GeofenceRecord, NewGeofence};

use crate::geo::validate_before_create;

/// Validate the GeoJSON geometry, then create the geofence and its
/// `created` audit event.
pub async fn create_geofence(
    db: &ConvoyDb,
    new: NewGeofence,
    user_id: &str,
    ts: DateTime<Utc>,
) -> anyhow::Result<GeofenceRecord> {
    validate_before_create(&new)?;
    Ok(db.create_geofence(new, user_id, ts).await?)
}
