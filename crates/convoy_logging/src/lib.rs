//! Shared logging setup for the Convoy binaries.
//!
//! The services run containerized, so everything goes to stderr and log
//! collection is the platform's problem. `RUST_LOG` overrides the default
//! filter.

use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

const DEFAULT_LOG_FILTER: &str =
    "convoy_coordinator=info,convoy_worker=info,convoy_manager=info,convoy_bus=info,convoy_db=info,convoy_core=warn";

/// Initialize tracing for one binary. Call once, first thing in `main`.
pub fn init_logging() {
    let filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(DEFAULT_LOG_FILTER));

    tracing_subscriber::registry()
        .with(filter)
        .with(
            tracing_subscriber::fmt::layer()
                .with_writer(std::io::stderr)
                .with_target(true),
        )
        .init();
}
