//! Logging initialization
//!
//! The level is controlled by `RUST_LOG` and defaults to `info`:
//!
//! ```bash
//! RUST_LOG=debug poolprobe --withPool
//! RUST_LOG=poolprobe_core=debug,hyper=warn poolprobe
//! ```

use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

/// Install the global subscriber, human-readable output.
///
/// # Panics
///
/// Panics if a global subscriber is already installed. Call it once, at
/// startup.
pub fn init_logging() {
    tracing_subscriber::registry()
        .with(env_filter())
        .with(tracing_subscriber::fmt::layer())
        .init();
}

/// Install the global subscriber with JSON lines output
///
/// # Panics
///
/// Same as [`init_logging`].
pub fn init_logging_json() {
    tracing_subscriber::registry()
        .with(env_filter())
        .with(tracing_subscriber::fmt::layer().json())
        .init();
}

fn env_filter() -> EnvFilter {
    EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"))
}
