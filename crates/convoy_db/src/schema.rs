//! Schema creation for the fleet store.
//!
//! All CREATE TABLE statements live here - single source of truth. Event
//! tables are append-only and keyed by `(entity_id, ts)`.

use crate::error::Result;
use crate::ConvoyDb;
use tracing::info;

impl ConvoyDb {
    /// Ensure all tables exist.
    pub async fn ensure_schema(&self) -> Result<()> {
        self.create_fleet_tables().await?;
        self.create_event_tables().await?;
        info!("fleet store schema verified");
        Ok(())
    }

    async fn create_fleet_tables(&self) -> Result<()> {
        sqlx::query(
            r#"CREATE TABLE IF NOT EXISTS vehicles (
                id TEXT PRIMARY KEY,
                active INTEGER NOT NULL DEFAULT 1,
                name TEXT NOT NULL,
                vtype TEXT NOT NULL,
                vconfig TEXT NOT NULL,
                immobilized INTEGER NOT NULL DEFAULT 0,
                lat REAL,
                lon REAL
            )"#,
        )
        .execute(&self.pool)
        .await?;

        sqlx::query(
            r#"CREATE TABLE IF NOT EXISTS geofences (
                id TEXT PRIMARY KEY,
                active INTEGER NOT NULL DEFAULT 1,
                name TEXT NOT NULL,
                data TEXT NOT NULL,
                immobilize_enter INTEGER NOT NULL DEFAULT 0,
                immobilize_leave INTEGER NOT NULL DEFAULT 0
            )"#,
        )
        .execute(&self.pool)
        .await?;

        sqlx::query(
            r#"CREATE TABLE IF NOT EXISTS vehicle_geofences (
                vehicle_id TEXT NOT NULL REFERENCES vehicles(id),
                geofence_id TEXT NOT NULL REFERENCES geofences(id),
                PRIMARY KEY (vehicle_id, geofence_id)
            )"#,
        )
        .execute(&self.pool)
        .await?;

        Ok(())
    }

    async fn create_event_tables(&self) -> Result<()> {
        sqlx::query(
            r#"CREATE TABLE IF NOT EXISTS vehicle_pos (
                vehicle_id TEXT NOT NULL,
                ts TEXT NOT NULL,
                lat REAL NOT NULL,
                lon REAL NOT NULL,
                PRIMARY KEY (vehicle_id, ts)
            )"#,
        )
        .execute(&self.pool)
        .await?;

        // Audit events: who created/modified/deleted which entity, when.
        for table in [
            "vehicle_created",
            "vehicle_modified",
            "vehicle_deleted",
        ] {
            sqlx::query(&format!(
                r#"CREATE TABLE IF NOT EXISTS {table} (
                    vehicle_id TEXT NOT NULL,
                    ts TEXT NOT NULL,
                    user_id TEXT NOT NULL,
                    PRIMARY KEY (vehicle_id, ts)
                )"#
            ))
            .execute(&self.pool)
            .await?;
        }

        for table in [
            "geofence_created",
            "geofence_modified",
            "geofence_deleted",
        ] {
            sqlx::query(&format!(
                r#"CREATE TABLE IF NOT EXISTS {table} (
                    geofence_id TEXT NOT NULL,
                    ts TEXT NOT NULL,
                    user_id TEXT NOT NULL,
                    PRIMARY KEY (geofence_id, ts)
                )"#
            ))
            .execute(&self.pool)
            .await?;
        }

        sqlx::query(
            r#"CREATE TABLE IF NOT EXISTS vehicle_immobilized (
                vehicle_id TEXT NOT NULL,
                ts TEXT NOT NULL,
                user_id TEXT,
                geofence_id TEXT,
                immobilized INTEGER NOT NULL,
                PRIMARY KEY (vehicle_id, ts)
            )"#,
        )
        .execute(&self.pool)
        .await?;

        sqlx::query(
            r#"CREATE TABLE IF NOT EXISTS vehicle_geofence_events (
                vehicle_id TEXT NOT NULL,
                geofence_id TEXT NOT NULL,
                ts TEXT NOT NULL,
                entered INTEGER NOT NULL,
                PRIMARY KEY (vehicle_id, ts)
            )"#,
        )
        .execute(&self.pool)
        .await?;

        Ok(())
    }
}
