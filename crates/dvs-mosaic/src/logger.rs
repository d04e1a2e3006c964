//! Logging setup for the reconstruction binary and benches.
//!
//! Library code only emits `tracing` events; installing a subscriber is left
//! to executables.

use tracing::Level;
use tracing_subscriber::EnvFilter;
use tracing_subscriber::fmt::time::SystemTime;

/// Install a stderr subscriber at INFO, overridable through `RUST_LOG`.
///
/// ```no_run
/// dvs_mosaic::init_logger();
/// tracing::info!("reconstruction started");
/// ```
///
/// Per-module filtering works as usual:
/// ```bash
/// RUST_LOG=dvs_mosaic::processor=debug cargo run --bin reconstruct -- ...
/// ```
pub fn init_logger() {
    init_logger_with_level(Level::INFO)
}

/// Like [`init_logger`] with a different fallback level.
///
/// Calling it again after a subscriber is installed is a no-op.
pub fn init_logger_with_level(default_level: Level) {
    let filter = EnvFilter::builder()
        .with_default_directive(default_level.into())
        .from_env_lossy();

    let installed = tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_timer(SystemTime)
        .with_writer(std::io::stderr)
        .with_target(true)
        .with_thread_ids(false)
        .try_init();
    if installed.is_err() {
        tracing::debug!("tracing subscriber already installed");
    }
}
