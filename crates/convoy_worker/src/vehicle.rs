//! Per-vehicle simulator task.
//!
//! The placeholder physics: publish the configured position plus gaussian
//! noise on a fixed cadence, and echo immobilizer commands back as status
//! so the manager can latch the state change.

use std::time::Duration;

use chrono::Utc;
use convoy_bus::Bus;
use convoy_protocol::{decode, encode, VehicleCommand, VehicleConfig, VehicleStatus};
use futures_util::StreamExt;
use rand::SeedableRng;
use rand_distr::{Distribution, Normal};
use serde::Deserialize;
use tracing::warn;

/// Cadence of position reports.
const STATUS_INTERVAL: Duration = Duration::from_secs(1);

/// Simulator parameters carried in the opaque `vdata`.
#[derive(Debug, Deserialize)]
pub(crate) struct SimVehicleData {
    pub lat: f64,
    pub lon: f64,
    /// Standard deviation of the position noise, in degrees.
    pub std: f64,
}

/// Run one vehicle until cancelled.
///
/// Only the `"test"` vehicle type exists today; anything else is a
/// configuration error and surfaces through the supervisor log.
pub async fn run_vehicle(
    bus: Bus,
    config: VehicleConfig,
    cmd_subject: String,
    status_subject: String,
) -> anyhow::Result<()> {
    if config.vtype != "test" {
        anyhow::bail!("unsupported vehicle type {:?}", config.vtype);
    }
    let data: SimVehicleData = serde_json::from_value(config.vdata.clone())?;
    let noise = Normal::new(0.0, data.std)
        .map_err(|e| anyhow::anyhow!("invalid position noise std {}: {e}", data.std))?;
    let mut rng = rand::rngs::StdRng::from_os_rng();

    let mut commands = bus.subscribe(&cmd_subject).await?;
    let mut tick = tokio::time::interval(STATUS_INTERVAL);

    loop {
        tokio::select! {
            _ = tick.tick() => {
                let status = VehicleStatus::Pos {
                    lat: data.lat + noise.sample(&mut rng),
                    lon: data.lon + noise.sample(&mut rng),
                    ts: Utc::now(),
                };
                bus.publish(&status_subject, encode(&status)?).await?;
            }
            maybe = commands.next() => {
                let Some(msg) = maybe else { return Ok(()) };
                match decode::<VehicleCommand>(&msg.payload) {
                    Ok(VehicleCommand::Immobilizer { correlation, active }) => {
                        let status = VehicleStatus::Immobilizer {
                            correlation,
                            active,
                            ts: Utc::now(),
                        };
                        bus.publish(&status_subject, encode(&status)?).await?;
                    }
                    Err(e) => warn!(
                        "vehicle {}: dropping malformed command: {e}",
                        config.vehicle_id
                    ),
                }
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_vdata_shape() {
        let data: SimVehicleData =
            serde_json::from_value(json!({"lat": 46.05, "lon": 14.5, "std": 0.001})).unwrap();
        assert!((data.lat - 46.05).abs() < 1e-9);
        assert!((data.std - 0.001).abs() < 1e-12);

        assert!(serde_json::from_value::<SimVehicleData>(json!({"lat": 1.0})).is_err());
    }
}
