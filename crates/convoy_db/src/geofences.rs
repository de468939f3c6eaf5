//! Geofence store operations and vehicle assignments.

use chrono::{DateTime, Utc};
use sqlx::Row;
use uuid::Uuid;

use crate::error::{DbError, Result};
use crate::types::{parse_id, row_to_geofence, GeofencePatch, NewGeofence, GeofenceRecord};
use crate::ConvoyDb;

impl ConvoyDb {
    /// Create an active geofence and its `created` audit event.
    ///
    /// Stores `data` as given; the manager's creation path validates the
    /// GeoJSON before calling this.
    pub async fn create_geofence(
        &self,
        new: NewGeofence,
        user_id: &str,
        ts: DateTime<Utc>,
    ) -> Result<GeofenceRecord> {
        let id = Uuid::new_v4();

        let mut tx = self.begin().await?;
        sqlx::query(
            r#"
            INSERT INTO geofences (id, active, name, data, immobilize_enter, immobilize_leave)
            VALUES (?, 1, ?, ?, ?, ?)
            "#,
        )
        .bind(id.to_string())
        .bind(&new.name)
        .bind(new.data.to_string())
        .bind(new.immobilize_enter)
        .bind(new.immobilize_leave)
        .execute(&mut *tx)
        .await?;

        sqlx::query("INSERT INTO geofence_created (geofence_id, ts, user_id) VALUES (?, ?, ?)")
            .bind(id.to_string())
            .bind(ts)
            .bind(user_id)
            .execute(&mut *tx)
            .await?;
        tx.commit().await?;

        Ok(GeofenceRecord {
            id,
            active: true,
            name: new.name,
            data: new.data,
            immobilize_enter: new.immobilize_enter,
            immobilize_leave: new.immobilize_leave,
        })
    }

    /// Fetch one geofence, active or not.
    pub async fn geofence(&self, id: Uuid) -> Result<Option<GeofenceRecord>> {
        let row = sqlx::query("SELECT * FROM geofences WHERE id = ?")
            .bind(id.to_string())
            .fetch_optional(&self.pool)
            .await?;

        row.as_ref().map(row_to_geofence).transpose()
    }

    /// List geofence ids by activation state.
    pub async fn list_geofence_ids(&self, active: bool) -> Result<Vec<Uuid>> {
        let rows = sqlx::query("SELECT id FROM geofences WHERE active = ? ORDER BY id")
            .bind(active)
            .fetch_all(&self.pool)
            .await?;

        rows.iter()
            .map(|row| parse_id("geofences.id", &row.try_get::<String, _>("id")?))
            .collect()
    }

    /// Apply a partial update. Returns whether anything changed; a no-op
    /// patch records no audit event.
    pub async fn update_geofence(
        &self,
        id: Uuid,
        patch: GeofencePatch,
        user_id: &str,
        ts: DateTime<Utc>,
    ) -> Result<bool> {
        let current = self
            .geofence(id)
            .await?
            .filter(|g| g.active)
            .ok_or_else(|| DbError::not_found(format!("geofence {id}")))?;

        let name = patch.name.filter(|n| *n != current.name);
        let enter = patch
            .immobilize_enter
            .filter(|e| *e != current.immobilize_enter);
        let leave = patch
            .immobilize_leave
            .filter(|l| *l != current.immobilize_leave);

        if name.is_none() && enter.is_none() && leave.is_none() {
            return Ok(false);
        }

        let mut tx = self.begin().await?;
        sqlx::query(
            r#"
            UPDATE geofences SET
                name = COALESCE(?, name),
                immobilize_enter = COALESCE(?, immobilize_enter),
                immobilize_leave = COALESCE(?, immobilize_leave)
            WHERE id = ?
            "#,
        )
        .bind(name)
        .bind(enter)
        .bind(leave)
        .bind(id.to_string())
        .execute(&mut *tx)
        .await?;

        sqlx::query("INSERT INTO geofence_modified (geofence_id, ts, user_id) VALUES (?, ?, ?)")
            .bind(id.to_string())
            .bind(ts)
            .bind(user_id)
            .execute(&mut *tx)
            .await?;
        tx.commit().await?;

        Ok(true)
    }

    /// Deactivate a geofence and record the `deleted` audit event.
    pub async fn deactivate_geofence(
        &self,
        id: Uuid,
        user_id: &str,
        ts: DateTime<Utc>,
    ) -> Result<()> {
        self.geofence(id)
            .await?
            .filter(|g| g.active)
            .ok_or_else(|| DbError::not_found(format!("geofence {id}")))?;

        let mut tx = self.begin().await?;
        sqlx::query("UPDATE geofences SET active = 0 WHERE id = ?")
            .bind(id.to_string())
            .execute(&mut *tx)
            .await?;
        sqlx::query("INSERT INTO geofence_deleted (geofence_id, ts, user_id) VALUES (?, ?, ?)")
            .bind(id.to_string())
            .bind(ts)
            .bind(user_id)
            .execute(&mut *tx)
            .await?;
        tx.commit().await?;

        Ok(())
    }

    /// Link a vehicle to a geofence. Idempotent; both entities must be
    /// active.
    pub async fn assign_vehicle_to_geofence(
        &self,
        vehicle_id: Uuid,
        geofence_id: Uuid,
    ) -> Result<()> {
        self.vehicle(vehicle_id)
            .await?
            .filter(|v| v.active)
            .ok_or_else(|| DbError::not_found(format!("vehicle {vehicle_id}")))?;
        self.geofence(geofence_id)
            .await?
            .filter(|g| g.active)
            .ok_or_else(|| DbError::not_found(format!("geofence {geofence_id}")))?;

        sqlx::query(
            r#"
            INSERT INTO vehicle_geofences (vehicle_id, geofence_id)
            VALUES (?, ?)
            ON CONFLICT (vehicle_id, geofence_id) DO NOTHING
            "#,
        )
        .bind(vehicle_id.to_string())
        .bind(geofence_id.to_string())
        .execute(&self.pool)
        .await?;

        Ok(())
    }

    /// Remove a vehicle/geofence link if present.
    pub async fn unassign_vehicle_from_geofence(
        &self,
        vehicle_id: Uuid,
        geofence_id: Uuid,
    ) -> Result<()> {
        sqlx::query("DELETE FROM vehicle_geofences WHERE vehicle_id = ? AND geofence_id = ?")
            .bind(vehicle_id.to_string())
            .bind(geofence_id.to_string())
            .execute(&self.pool)
            .await?;
        Ok(())
    }

    /// Vehicles assigned to a geofence.
    pub async fn vehicle_ids_in_geofence(&self, geofence_id: Uuid) -> Result<Vec<Uuid>> {
        let rows =
            sqlx::query("SELECT vehicle_id FROM vehicle_geofences WHERE geofence_id = ?")
                .bind(geofence_id.to_string())
                .fetch_all(&self.pool)
                .await?;

        rows.iter()
            .map(|row| parse_id("vehicle_geofences.vehicle_id", &row.try_get::<String, _>("vehicle_id")?))
            .collect()
    }

    /// Geofences a vehicle is assigned to.
    pub async fn geofence_ids_for_vehicle(&self, vehicle_id: Uuid) -> Result<Vec<Uuid>> {
        let rows =
            sqlx::query("SELECT geofence_id FROM vehicle_geofences WHERE vehicle_id = ?")
                .bind(vehicle_id.to_string())
                .fetch_all(&self.pool)
                .await?;

        rows.iter()
            .map(|row| parse_id("vehicle_geofences.geofence_id", &row.try_get::<String, _>("geofence_id")?))
            .collect()
    }
}
