//! Async building blocks shared by the Convoy services.
//!
//! Two small pieces that every service leans on:
//!
//! - [`AsyncValue`]: a single-slot latest-value register with
//!   wait-for-change semantics, used to fan membership snapshots out to
//!   consumers that only ever care about the newest value.
//! - [`supervise`] / [`with_retries`]: coarse reactive failure recovery.
//!   Background tasks restart forever with a fixed backoff; publishers
//!   retry a bounded number of times and re-raise.

pub mod async_value;
pub mod resilience;

pub use async_value::{AsyncValue, Changed};
pub use resilience::{
    supervise, with_retries, DELTA_RETRIES, RETRY_DELAY, TRANSPORT_RETRIES,
};
