//! Tracing initialization shared by the engine binary and tests
//!
//! Operator-facing diagnostics go through `tracing`; observer-facing
//! session progress goes through the engine's log stream. The two are
//! deliberately separate channels.

use tracing_subscriber::{fmt, EnvFilter};

/// Initialize a stdout tracing subscriber with an explicit base level
///
/// Noise from dependencies is pinned to `warn` regardless of the base
/// level, matching how the engine is run in development.
pub fn init_tracing_with_level(log_level: Option<&str>) {
    let base_level = log_level.unwrap_or("info");
    let filter = format!("engine={base_level},shared={base_level},warn");

    fmt()
        .with_env_filter(EnvFilter::new(filter))
        .with_target(false)
        .with_thread_ids(false)
        .with_file(false)
        .with_line_number(false)
        .init();
}
