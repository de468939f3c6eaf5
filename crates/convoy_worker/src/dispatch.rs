//! Vehicle ownership dispatcher.
//!
//! One event loop per worker applies inventory deltas and membership
//! changes to the set of running simulator tasks. Both inputs are handled
//! by the same task, so the maps below need no locking.

use std::collections::{BTreeSet, HashMap};
use std::sync::Arc;

use convoy_bus::Bus;
use convoy_core::{supervise, AsyncValue};
use convoy_protocol::{decode, vehicle_subject, DeltaSubjects, VehicleConfig, VehicleDelta};
use futures_util::StreamExt;
use tokio::task::JoinHandle;
use tracing::{info, warn};

use crate::ring;
use crate::vehicle::run_vehicle;

/// Ownership state of one worker process.
///
/// `known_vehicles` is the full inventory regardless of ownership;
/// `tasks` holds a handle per simulator this worker actually runs. The
/// spawner is injected so tests can exercise the bookkeeping without a
/// bus.
///
/// Dropping the dispatcher aborts every simulator task: when the outer
/// supervisor restarts the dispatcher after a failure, no task from the
/// previous incarnation survives.
pub struct Dispatcher<S: FnMut(&VehicleConfig) -> JoinHandle<()>> {
    worker_id: String,
    members: BTreeSet<String>,
    known_vehicles: HashMap<String, VehicleConfig>,
    tasks: HashMap<String, JoinHandle<()>>,
    spawn_simulator: S,
}

impl<S: FnMut(&VehicleConfig) -> JoinHandle<()>> Dispatcher<S> {
    pub fn new(worker_id: String, spawn_simulator: S) -> Self {
        // A worker always includes itself in its own ring, even before
        // the first membership snapshot arrives.
        let members = BTreeSet::from([worker_id.clone()]);
        Self {
            worker_id,
            members,
            known_vehicles: HashMap::new(),
            tasks: HashMap::new(),
            spawn_simulator,
        }
    }

    fn cancel_task(&mut self, vehicle_id: &str) {
        if let Some(handle) = self.tasks.remove(vehicle_id) {
            handle.abort();
        }
    }

    fn start_task(&mut self, config: &VehicleConfig) {
        let handle = (self.spawn_simulator)(config);
        self.tasks.insert(config.vehicle_id.clone(), handle);
    }

    /// Record a declared vehicle and start its simulator if this worker
    /// owns it. A re-declaration restarts a running simulator so changed
    /// `vdata` takes effect.
    pub fn add_vehicle(&mut self, config: VehicleConfig) {
        let vehicle_id = config.vehicle_id.clone();
        self.known_vehicles
            .insert(vehicle_id.clone(), config.clone());

        if !ring::owns(&self.worker_id, &self.members, &vehicle_id) {
            self.cancel_task(&vehicle_id);
            return;
        }

        self.cancel_task(&vehicle_id);
        self.start_task(&config);
    }

    /// Forget a vehicle and cancel its simulator if running.
    pub fn remove_vehicle(&mut self, vehicle_id: &str) {
        self.known_vehicles.remove(vehicle_id);
        self.cancel_task(vehicle_id);
    }

    pub fn apply_delta(&mut self, delta: VehicleDelta) {
        match delta {
            VehicleDelta::Update { vehicles } => {
                for config in vehicles {
                    self.add_vehicle(config);
                }
            }
            VehicleDelta::Delete { vehicle_ids } => {
                for vehicle_id in vehicle_ids {
                    self.remove_vehicle(&vehicle_id);
                }
            }
        }
    }

    /// Apply a new membership snapshot: cancel simulators that moved to
    /// another worker, start the ones that moved here. Vehicles whose
    /// ownership did not change keep their running task.
    pub fn rebalance(&mut self, worker_ids: Vec<String>) {
        self.members = worker_ids.into_iter().collect();
        self.members.insert(self.worker_id.clone());

        let lost: Vec<String> = self
            .tasks
            .keys()
            .filter(|vid| !ring::owns(&self.worker_id, &self.members, vid))
            .cloned()
            .collect();
        for vehicle_id in lost {
            info!("vehicle {vehicle_id} reassigned away");
            self.cancel_task(&vehicle_id);
        }

        let gained: Vec<VehicleConfig> = self
            .known_vehicles
            .values()
            .filter(|config| {
                !self.tasks.contains_key(&config.vehicle_id)
                    && ring::owns(&self.worker_id, &self.members, &config.vehicle_id)
            })
            .cloned()
            .collect();
        for config in gained {
            info!("vehicle {} reassigned here", config.vehicle_id);
            self.start_task(&config);
        }
    }

    pub fn known_count(&self) -> usize {
        self.known_vehicles.len()
    }

    pub fn running_count(&self) -> usize {
        self.tasks.len()
    }

    pub fn is_running(&self, vehicle_id: &str) -> bool {
        self.tasks.contains_key(vehicle_id)
    }
}

impl<S: FnMut(&VehicleConfig) -> JoinHandle<()>> Drop for Dispatcher<S> {
    fn drop(&mut self) {
        for handle in self.tasks.values() {
            handle.abort();
        }
    }
}

/// Run the dispatcher until cancelled.
///
/// Startup order matters: the delta subscription opens first so nothing
/// is missed between the inventory request and the event loop; the
/// membership latch is read before the first ownership decision.
pub async fn run_dispatcher(
    bus: Bus,
    worker_id: String,
    subjects: DeltaSubjects,
    cmd_base: String,
    status_base: String,
    members: Arc<AsyncValue<Vec<String>>>,
) -> anyhow::Result<()> {
    let mut deltas = bus.subscribe(&subjects.broadcast).await?;

    let spawn_simulator = {
        let bus = bus.clone();
        move |config: &VehicleConfig| {
            let bus = bus.clone();
            let config = config.clone();
            let cmd_subject = vehicle_subject(&cmd_base, &config.vehicle_id);
            let status_subject = vehicle_subject(&status_base, &config.vehicle_id);
            let name = format!("vehicle-{}", config.vehicle_id);
            tokio::spawn(async move {
                supervise(&name, move || {
                    run_vehicle(
                        bus.clone(),
                        config.clone(),
                        cmd_subject.clone(),
                        status_subject.clone(),
                    )
                })
                .await
            })
        }
    };
    let mut dispatcher = Dispatcher::new(worker_id, spawn_simulator);

    let (ids, mut changed) = members.get();
    dispatcher.rebalance(ids);

    // Cold-start inventory: the reply is one update delta with the full
    // active set.
    let reply = bus.request(&subjects.listen, Vec::new()).await?;
    match decode::<VehicleDelta>(&reply)? {
        delta @ VehicleDelta::Update { .. } => dispatcher.apply_delta(delta),
        VehicleDelta::Delete { .. } => warn!("inventory reply was a delete delta, ignoring"),
    }

    loop {
        tokio::select! {
            _ = changed.wait() => {
                let (ids, next) = members.get();
                changed = next;
                dispatcher.rebalance(ids);
            }
            maybe = deltas.next() => {
                let Some(msg) = maybe else { return Ok(()) };
                match decode::<VehicleDelta>(&msg.payload) {
                    Ok(delta) => dispatcher.apply_delta(delta),
                    Err(e) => warn!("dropping malformed vehicle delta: {e}"),
                }
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn config(vehicle_id: &str) -> VehicleConfig {
        VehicleConfig {
            vehicle_id: vehicle_id.into(),
            vtype: "test".into(),
            vdata: json!({"lat": 0.0, "lon": 0.0, "std": 0.0}),
        }
    }

    fn parked() -> JoinHandle<()> {
        tokio::spawn(std::future::pending())
    }

    #[tokio::test]
    async fn test_single_worker_owns_declared_vehicle() {
        let mut dispatcher = Dispatcher::new("w1".into(), |_| parked());

        dispatcher.add_vehicle(config("v1"));
        assert!(dispatcher.is_running("v1"));
        assert_eq!(dispatcher.known_count(), 1);
    }

    #[tokio::test]
    async fn test_update_then_delete_leaves_nothing() {
        let mut dispatcher = Dispatcher::new("w1".into(), |_| parked());

        dispatcher.apply_delta(VehicleDelta::update(vec![config("v1")]));
        assert_eq!(dispatcher.running_count(), 1);

        dispatcher.apply_delta(VehicleDelta::delete(vec!["v1".into()]));
        assert_eq!(dispatcher.running_count(), 0);
        assert_eq!(dispatcher.known_count(), 0);
    }

    #[tokio::test]
    async fn test_delete_of_unowned_vehicle_is_harmless() {
        let mut dispatcher = Dispatcher::new("w1".into(), |_| parked());
        dispatcher.apply_delta(VehicleDelta::delete(vec!["ghost".into()]));
        assert_eq!(dispatcher.known_count(), 0);
    }

    #[tokio::test]
    async fn test_rebalance_moves_vehicles_between_workers() {
        // Two dispatchers observing the same membership agree on a
        // partition: every vehicle runs on exactly one of them.
        let mut a = Dispatcher::new("worker-a".into(), |_| parked());
        let mut b = Dispatcher::new("worker-b".into(), |_| parked());
        let membership = vec!["worker-a".to_string(), "worker-b".to_string()];
        a.rebalance(membership.clone());
        b.rebalance(membership.clone());

        let vids: Vec<String> = (0..20).map(|i| format!("vehicle-{i}")).collect();
        for vid in &vids {
            a.add_vehicle(config(vid));
            b.add_vehicle(config(vid));
        }
        assert_eq!(a.known_count(), 20);
        assert_eq!(b.known_count(), 20);
        for vid in &vids {
            assert!(
                a.is_running(vid) ^ b.is_running(vid),
                "vehicle {vid} must run on exactly one worker"
            );
        }

        // b leaves: everything must fall back to a.
        a.rebalance(vec!["worker-a".to_string()]);
        for vid in &vids {
            assert!(a.is_running(vid));
        }

        // b returns: a sheds exactly the vehicles b picks up.
        a.rebalance(membership.clone());
        b.rebalance(membership);
        for vid in &vids {
            assert!(a.is_running(vid) ^ b.is_running(vid));
        }
    }

    #[tokio::test]
    async fn test_redeclaration_restarts_simulator() {
        use std::sync::atomic::{AtomicU32, Ordering};

        let spawns = Arc::new(AtomicU32::new(0));
        let mut dispatcher = Dispatcher::new("w1".into(), {
            let spawns = spawns.clone();
            move |_| {
                spawns.fetch_add(1, Ordering::SeqCst);
                parked()
            }
        });

        dispatcher.add_vehicle(config("v1"));
        dispatcher.add_vehicle(config("v1"));
        assert_eq!(dispatcher.running_count(), 1);
        assert_eq!(spawns.load(Ordering::SeqCst), 2, "re-declaration restarts");

        // Rebalancing with unchanged ownership must not restart the task.
        dispatcher.rebalance(vec!["w1".to_string()]);
        assert_eq!(spawns.load(Ordering::SeqCst), 2);
    }
}
