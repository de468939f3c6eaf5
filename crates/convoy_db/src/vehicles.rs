//! Vehicle store operations (CRUD side).

use chrono::{DateTime, Utc};
use uuid::Uuid;

use crate::error::{DbError, Result};
use crate::types::{row_to_vehicle, NewVehicle, VehicleRecord};
use crate::ConvoyDb;

impl ConvoyDb {
    /// Create an active vehicle and its `created` audit event.
    pub async fn create_vehicle(
        &self,
        new: NewVehicle,
        user_id: &str,
        ts: DateTime<Utc>,
    ) -> Result<VehicleRecord> {
        let id = Uuid::new_v4();
        let vconfig = new.vconfig.to_string();

        let mut tx = self.begin().await?;
        sqlx::query(
            r#"
            INSERT INTO vehicles (id, active, name, vtype, vconfig, immobilized, lat, lon)
            VALUES (?, 1, ?, ?, ?, 0, NULL, NULL)
            "#,
        )
        .bind(id.to_string())
        .bind(&new.name)
        .bind(&new.vtype)
        .bind(&vconfig)
        .execute(&mut *tx)
        .await?;

        sqlx::query("INSERT INTO vehicle_created (vehicle_id, ts, user_id) VALUES (?, ?, ?)")
            .bind(id.to_string())
            .bind(ts)
            .bind(user_id)
            .execute(&mut *tx)
            .await?;
        tx.commit().await?;

        Ok(VehicleRecord {
            id,
            active: true,
            name: new.name,
            vtype: new.vtype,
            vconfig: new.vconfig,
            immobilized: false,
            lat: None,
            lon: None,
        })
    }

    /// Fetch one vehicle, active or not.
    pub async fn vehicle(&self, id: Uuid) -> Result<Option<VehicleRecord>> {
        let row = sqlx::query("SELECT * FROM vehicles WHERE id = ?")
            .bind(id.to_string())
            .fetch_optional(&self.pool)
            .await?;

        row.as_ref().map(row_to_vehicle).transpose()
    }

    /// List vehicle ids by activation state.
    pub async fn list_vehicle_ids(&self, active: bool) -> Result<Vec<Uuid>> {
        let rows = sqlx::query("SELECT id FROM vehicles WHERE active = ? ORDER BY id")
            .bind(active)
            .fetch_all(&self.pool)
            .await?;

        rows.iter()
            .map(|row| {
                let raw: String = sqlx::Row::try_get(row, "id")?;
                crate::types::parse_id("vehicles.id", &raw)
            })
            .collect()
    }

    /// All active vehicles, the source of the inventory snapshot.
    pub async fn list_active_vehicles(&self) -> Result<Vec<VehicleRecord>> {
        let rows = sqlx::query("SELECT * FROM vehicles WHERE active = 1 ORDER BY id")
            .fetch_all(&self.pool)
            .await?;

        rows.iter().map(row_to_vehicle).collect()
    }

    /// Rename a vehicle. Returns whether anything changed; renaming to the
    /// current name records no audit event.
    pub async fn rename_vehicle(
        &self,
        id: Uuid,
        name: &str,
        user_id: &str,
        ts: DateTime<Utc>,
    ) -> Result<bool> {
        let vehicle = self
            .vehicle(id)
            .await?
            .filter(|v| v.active)
            .ok_or_else(|| DbError::not_found(format!("vehicle {id}")))?;

        if vehicle.name == name {
            return Ok(false);
        }

        let mut tx = self.begin().await?;
        sqlx::query("UPDATE vehicles SET name = ? WHERE id = ?")
            .bind(name)
            .bind(id.to_string())
            .execute(&mut *tx)
            .await?;
        sqlx::query("INSERT INTO vehicle_modified (vehicle_id, ts, user_id) VALUES (?, ?, ?)")
            .bind(id.to_string())
            .bind(ts)
            .bind(user_id)
            .execute(&mut *tx)
            .await?;
        tx.commit().await?;

        Ok(true)
    }

    /// Deactivate a vehicle and record the `deleted` audit event. Returns
    /// the updated record so the caller can publish the delta.
    pub async fn deactivate_vehicle(
        &self,
        id: Uuid,
        user_id: &str,
        ts: DateTime<Utc>,
    ) -> Result<VehicleRecord> {
        let mut vehicle = self
            .vehicle(id)
            .await?
            .filter(|v| v.active)
            .ok_or_else(|| DbError::not_found(format!("vehicle {id}")))?;

        let mut tx = self.begin().await?;
        sqlx::query("UPDATE vehicles SET active = 0 WHERE id = ?")
            .bind(id.to_string())
            .execute(&mut *tx)
            .await?;
        sqlx::query("INSERT INTO vehicle_deleted (vehicle_id, ts, user_id) VALUES (?, ?, ?)")
            .bind(id.to_string())
            .bind(ts)
            .bind(user_id)
            .execute(&mut *tx)
            .await?;
        tx.commit().await?;

        vehicle.active = false;
        Ok(vehicle)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn test_vehicle() -> NewVehicle {
        NewVehicle {
            name: "delivery-7".into(),
            vtype: "test".into(),
            vconfig: json!({"lat": 46.05, "lon": 14.5, "std": 0.001}),
        }
    }

    #[tokio::test]
    async fn test_create_and_fetch_vehicle() {
        let db = ConvoyDb::memory().await.unwrap();
        let created = db
            .create_vehicle(test_vehicle(), "u1", Utc::now())
            .await
            .unwrap();

        let fetched = db.vehicle(created.id).await.unwrap().unwrap();
        assert_eq!(fetched, created);
        assert!(fetched.active);
        assert!(!fetched.immobilized);
        assert_eq!(fetched.position(), None);
    }

    #[tokio::test]
    async fn test_deactivate_removes_from_inventory() {
        let db = ConvoyDb::memory().await.unwrap();
        let v = db
            .create_vehicle(test_vehicle(), "u1", Utc::now())
            .await
            .unwrap();
        assert_eq!(db.list_active_vehicles().await.unwrap().len(), 1);

        let gone = db.deactivate_vehicle(v.id, "u1", Utc::now()).await.unwrap();
        assert!(!gone.active);
        assert!(db.list_active_vehicles().await.unwrap().is_empty());
        assert_eq!(db.list_vehicle_ids(false).await.unwrap(), vec![v.id]);

        // A second deactivation is a not-found: the vehicle is inactive.
        assert!(matches!(
            db.deactivate_vehicle(v.id, "u1", Utc::now()).await,
            Err(DbError::NotFound(_))
        ));
    }

    #[tokio::test]
    async fn test_rename_records_event_only_on_change() {
        let db = ConvoyDb::memory().await.unwrap();
        let v = db
            .create_vehicle(test_vehicle(), "u1", Utc::now())
            .await
            .unwrap();

        assert!(!db
            .rename_vehicle(v.id, "delivery-7", "u1", Utc::now())
            .await
            .unwrap());
        assert!(db
            .rename_vehicle(v.id, "delivery-8", "u1", Utc::now())
            .await
            .unwrap());
        assert_eq!(db.vehicle(v.id).await.unwrap().unwrap().name, "delivery-8");
    }
}
