//! Membership coordinator for the Convoy cluster.
//!
//! Owns the ground truth of which workers are alive. Every
//! `heartbeat_interval` it polls the fleet on `<HB>.req`; workers answer
//! on `<HB>.resp`. Workers that stay silent past the eviction threshold
//! are dropped. Every membership change lands in an [`AsyncValue`] latch,
//! from which a responder task broadcasts snapshots on `<WL>.b` and
//! serves on-demand requests on `<WL>.l`.
//!
//! [`AsyncValue`]: convoy_core::AsyncValue

pub mod coordinator;
pub mod membership;
pub mod responder;

pub use coordinator::{eviction_threshold, run_coordinator};
pub use membership::MembershipTable;
pub use responder::run_responder;
