//! Tracing setup for binaries and tests embedding the storage.

use std::sync::Once;

static TRACING_INIT: Once = Once::new();

/// Initialize tracing for storage diagnostics.
///
/// Call this once at program start to enable log output. Uses the
/// `RUST_LOG` environment variable for filtering.
///
/// Example: `RUST_LOG=cas_arena=debug,cas_storage=trace`
pub fn init_tracing() {
    TRACING_INIT.call_once(|| {
        use tracing_subscriber::{fmt, prelude::*, EnvFilter};

        // Nothing is installed unless RUST_LOG asks for output
        if std::env::var("RUST_LOG").is_ok() {
            let filter = EnvFilter::from_default_env();
            tracing_subscriber::registry()
                .with(fmt::layer().with_target(true).with_level(true))
                .with(filter)
                .init();
        }
    });
}
