//! History queries over the append-only event tables.
//!
//! The merged views mirror what the CRUD surface exposes: per-table
//! queries, each ordered newest-first and individually limited, merged
//! and re-limited in memory.

use chrono::{DateTime, Utc};
use sqlx::Row;
use uuid::Uuid;

use crate::error::Result;
use crate::pool::DbRow;
use crate::types::{opt_id, parse_id, EventRange, FleetEvent, PosSample};
use crate::ConvoyDb;

fn range_sql(base: &str, range: &EventRange) -> String {
    let mut sql = String::from(base);
    if range.start.is_some() {
        sql.push_str(" AND ts >= ?");
    }
    if range.end.is_some() {
        sql.push_str(" AND ts <= ?");
    }
    sql.push_str(" ORDER BY ts DESC");
    if range.limit > 0 {
        sql.push_str(&format!(" LIMIT {}", range.limit));
    }
    sql
}

fn bind_range<'q>(
    query: sqlx::query::Query<'q, crate::pool::Db, <crate::pool::Db as sqlx::Database>::Arguments<'q>>,
    range: &EventRange,
) -> sqlx::query::Query<'q, crate::pool::Db, <crate::pool::Db as sqlx::Database>::Arguments<'q>> {
    let mut query = query;
    if let Some(start) = range.start {
        query = query.bind(start);
    }
    if let Some(end) = range.end {
        query = query.bind(end);
    }
    query
}

fn merge_limit(mut events: Vec<FleetEvent>, range: &EventRange) -> Vec<FleetEvent> {
    events.sort_by(|a, b| b.ts().cmp(&a.ts()));
    if range.limit > 0 {
        events.truncate(range.limit);
    }
    events
}

fn row_to_audit(row: &DbRow, kind: &str) -> Result<FleetEvent> {
    let ts: DateTime<Utc> = row.try_get("ts")?;
    let user_id: String = row.try_get("user_id")?;
    Ok(match kind {
        "created" => FleetEvent::Created { ts, user_id },
        "modified" => FleetEvent::Modified { ts, user_id },
        _ => FleetEvent::Deleted { ts, user_id },
    })
}

fn row_to_immobilized(row: &DbRow) -> Result<FleetEvent> {
    Ok(FleetEvent::Immobilized {
        ts: row.try_get("ts")?,
        vehicle_id: parse_id(
            "vehicle_immobilized.vehicle_id",
            &row.try_get::<String, _>("vehicle_id")?,
        )?,
        user_id: row.try_get("user_id")?,
        geofence_id: opt_id(
            "vehicle_immobilized.geofence_id",
            row.try_get("geofence_id")?,
        )?,
        immobilized: row.try_get("immobilized")?,
    })
}

fn row_to_crossing(row: &DbRow) -> Result<FleetEvent> {
    Ok(FleetEvent::GeofenceCrossing {
        ts: row.try_get("ts")?,
        vehicle_id: parse_id(
            "vehicle_geofence_events.vehicle_id",
            &row.try_get::<String, _>("vehicle_id")?,
        )?,
        geofence_id: parse_id(
            "vehicle_geofence_events.geofence_id",
            &row.try_get::<String, _>("geofence_id")?,
        )?,
        entered: row.try_get("entered")?,
    })
}

impl ConvoyDb {
    /// Position history of one vehicle, newest first.
    pub async fn position_history(
        &self,
        vehicle_id: Uuid,
        range: &EventRange,
    ) -> Result<Vec<PosSample>> {
        let sql = range_sql(
            "SELECT ts, lat, lon FROM vehicle_pos WHERE vehicle_id = ?",
            range,
        );
        let query = sqlx::query(&sql).bind(vehicle_id.to_string());
        let rows = bind_range(query, range).fetch_all(&self.pool).await?;

        rows.iter()
            .map(|row| {
                Ok(PosSample {
                    ts: row.try_get("ts")?,
                    lat: row.try_get("lat")?,
                    lon: row.try_get("lon")?,
                })
            })
            .collect()
    }

    /// Merged audit + immobilizer + crossing history of one vehicle.
    pub async fn vehicle_events(
        &self,
        vehicle_id: Uuid,
        range: &EventRange,
    ) -> Result<Vec<FleetEvent>> {
        let id = vehicle_id.to_string();
        let mut events = Vec::new();

        for (table, kind) in [
            ("vehicle_created", "created"),
            ("vehicle_modified", "modified"),
            ("vehicle_deleted", "deleted"),
        ] {
            let sql = range_sql(
                &format!("SELECT ts, user_id FROM {table} WHERE vehicle_id = ?"),
                range,
            );
            let rows = bind_range(sqlx::query(&sql).bind(&id), range)
                .fetch_all(&self.pool)
                .await?;
            for row in &rows {
                events.push(row_to_audit(row, kind)?);
            }
        }

        let sql = range_sql(
            "SELECT * FROM vehicle_immobilized WHERE vehicle_id = ?",
            range,
        );
        let rows = bind_range(sqlx::query(&sql).bind(&id), range)
            .fetch_all(&self.pool)
            .await?;
        for row in &rows {
            events.push(row_to_immobilized(row)?);
        }

        let sql = range_sql(
            "SELECT * FROM vehicle_geofence_events WHERE vehicle_id = ?",
            range,
        );
        let rows = bind_range(sqlx::query(&sql).bind(&id), range)
            .fetch_all(&self.pool)
            .await?;
        for row in &rows {
            events.push(row_to_crossing(row)?);
        }

        Ok(merge_limit(events, range))
    }

    /// Merged audit + immobilizer + crossing history of one geofence.
    pub async fn geofence_events(
        &self,
        geofence_id: Uuid,
        range: &EventRange,
    ) -> Result<Vec<FleetEvent>> {
        let id = geofence_id.to_string();
        let mut events = Vec::new();

        for (table, kind) in [
            ("geofence_created", "created"),
            ("geofence_modified", "modified"),
            ("geofence_deleted", "deleted"),
        ] {
            let sql = range_sql(
                &format!("SELECT ts, user_id FROM {table} WHERE geofence_id = ?"),
                range,
            );
            let rows = bind_range(sqlx::query(&sql).bind(&id), range)
                .fetch_all(&self.pool)
                .await?;
            for row in &rows {
                events.push(row_to_audit(row, kind)?);
            }
        }

        let sql = range_sql(
            "SELECT * FROM vehicle_immobilized WHERE geofence_id = ?",
            range,
        );
        let rows = bind_range(sqlx::query(&sql).bind(&id), range)
            .fetch_all(&self.pool)
            .await?;
        for row in &rows {
            events.push(row_to_immobilized(row)?);
        }

        let sql = range_sql(
            "SELECT * FROM vehicle_geofence_events WHERE geofence_id = ?",
            range,
        );
        let rows = bind_range(sqlx::query(&sql).bind(&id), range)
            .fetch_all(&self.pool)
            .await?;
        for row in &rows {
            events.push(row_to_crossing(row)?);
        }

        Ok(merge_limit(events, range))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::{NewGeofence, NewVehicle};
    use crate::telemetry;
    use chrono::Duration;
    use serde_json::json;

    async fn seed_vehicle(db: &ConvoyDb) -> Uuid {
        db.create_vehicle(
            NewVehicle {
                name: "v".into(),
                vtype: "test".into(),
                vconfig: json!({"lat": 0.0, "lon": 0.0, "std": 0.0}),
            },
            "u1",
            Utc::now() - Duration::seconds(60),
        )
        .await
        .unwrap()
        .id
    }

    #[tokio::test]
    async fn test_position_history_newest_first_with_limit() {
        let db = ConvoyDb::memory().await.unwrap();
        let vid = seed_vehicle(&db).await;
        let t0 = Utc::now();

        let mut tx = db.begin().await.unwrap();
        for i in 0..5 {
            telemetry::insert_pos_event(
                &mut tx,
                vid,
                t0 + Duration::seconds(i),
                f64::from(i as i32),
                0.0,
            )
            .await
            .unwrap();
        }
        tx.commit().await.unwrap();

        let history = db
            .position_history(
                vid,
                &EventRange {
                    limit: 3,
                    ..Default::default()
                },
            )
            .await
            .unwrap();
        assert_eq!(history.len(), 3);
        assert!((history[0].lat - 4.0).abs() < 1e-9);
        assert!(history.windows(2).all(|w| w[0].ts >= w[1].ts));
    }

    #[tokio::test]
    async fn test_vehicle_events_merge_sorted() {
        let db = ConvoyDb::memory().await.unwrap();
        let vid = seed_vehicle(&db).await;
        let gid = db
            .create_geofence(
                NewGeofence {
                    name: "g".into(),
                    data: json!({"type": "Polygon", "coordinates": [[[0.0,0.0],[1.0,0.0],[1.0,1.0],[0.0,0.0]]]}),
                    immobilize_enter: false,
                    immobilize_leave: false,
                },
                "u1",
                Utc::now() - Duration::seconds(50),
            )
            .await
            .unwrap()
            .id;

        let t = Utc::now();
        let mut tx = db.begin().await.unwrap();
        telemetry::insert_crossing_event(&mut tx, vid, gid, t, true)
            .await
            .unwrap();
        telemetry::insert_immobilized_event(
            &mut tx,
            vid,
            t + Duration::seconds(1),
            None,
            Some(gid),
            true,
        )
        .await
        .unwrap();
        tx.commit().await.unwrap();

        let events = db
            .vehicle_events(vid, &EventRange::default())
            .await
            .unwrap();
        // created + crossing + immobilized, newest first
        assert_eq!(events.len(), 3);
        assert!(matches!(events[0], FleetEvent::Immobilized { immobilized: true, .. }));
        assert!(matches!(events[1], FleetEvent::GeofenceCrossing { entered: true, .. }));
        assert!(matches!(events[2], FleetEvent::Created { .. }));

        // The immobilized event also latches the live flag.
        let v = db.vehicle(vid).await.unwrap().unwrap();
        assert!(v.immobilized);

        // The geofence view sees the crossing and the immobilization.
        let gevents = db
            .geofence_events(gid, &EventRange::default())
            .await
            .unwrap();
        assert_eq!(gevents.len(), 3);
    }
}
