//! Logging setup for the `simpal` binary.
//!
//! The library crates log through the `log` facade; the subscriber installed
//! here also picks those records up and writes everything to stderr, so it
//! never mixes with the command output on stdout.

use tracing_subscriber::EnvFilter;

/// Default filter when neither `SIMPAL_LOG` nor `RUST_LOG` is set.
const DEFAULT_FILTER: &str = "warn";

pub fn init() {
    let filter = std::env::var("SIMPAL_LOG")
        .ok()
        .and_then(|spec| EnvFilter::try_new(spec).ok())
        .or_else(|| EnvFilter::try_from_default_env().ok())
        .unwrap_or_else(|| EnvFilter::new(DEFAULT_FILTER));

    // A second init (e.g. from tests) keeps the first subscriber.
    let _ = tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .with_target(false)
        .try_init();
}
