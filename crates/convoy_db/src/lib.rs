//! Fleet store for the Convoy manager.
//!
//! Vehicles, geofences, their assignments, and the append-only event
//! history behind the CRUD surface and the telemetry pipeline. SQLite by
//! default (and for every test), Postgres behind a feature flag.
//!
//! # Example
//!
//! ```rust,ignore
//! use convoy_db::{ConvoyDb, DbConfig};
//!
//! let db = ConvoyDb::connect(DbConfig::new("sqlite:fleet.db?mode=rwc")).await?;
//! db.ensure_schema().await?;
//! let active = db.list_active_vehicles().await?;
//! ```

pub mod error;
pub mod events;
pub mod geofences;
pub mod pool;
pub mod schema;
pub mod telemetry;
pub mod types;
pub mod vehicles;

pub use error::{DbError, Result};
pub use pool::{create_pool, Db, DbConfig, DbPool, DbRow, DbTx};
pub use types::{
    EventRange, FleetEvent, GeofencePatch, GeofenceRecord, NewGeofence, NewVehicle, PosSample,
    VehicleRecord,
};

/// Handle onto the fleet store.
#[derive(Clone)]
pub struct ConvoyDb {
    pub(crate) pool: DbPool,
}

impl ConvoyDb {
    /// Connect and build a handle. Call [`ensure_schema`](Self::ensure_schema)
    /// before first use.
    pub async fn connect(config: DbConfig) -> Result<Self> {
        let pool = create_pool(&config).await?;
        Ok(Self { pool })
    }

    /// Wrap an existing pool.
    pub fn from_pool(pool: DbPool) -> Self {
        Self { pool }
    }

    /// Open a transaction. Each logical telemetry operation runs in its
    /// own transaction; drop without commit rolls back.
    pub async fn begin(&self) -> Result<DbTx> {
        Ok(self.pool.begin().await?)
    }

    /// In-memory store with schema applied (for testing).
    #[cfg(feature = "sqlite")]
    pub async fn memory() -> Result<Self> {
        let db = Self::connect(DbConfig::sqlite_memory()).await?;
        db.ensure_schema().await?;
        Ok(db)
    }
}
