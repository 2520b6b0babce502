//! Logging setup.
//!
//! Logs go to **stderr**; stdout belongs to the plugin host. Waits log every
//! poll at `debug` and every retried failure at `warn`, so
//! `RUST_LOG=aiven_provider=debug` shows the full polling history.
//!
//! ```bash
//! # Waiter progress only
//! RUST_LOG=aiven_provider::waiter=debug ./terraform-provider-aiven
//!
//! # HTTP requests as well
//! RUST_LOG=aiven_provider=debug ./terraform-provider-aiven
//! ```

use tracing::Subscriber;
use tracing_subscriber::{fmt, prelude::*, EnvFilter};

/// Default filter when `RUST_LOG` is unset.
pub const DEFAULT_LEVEL: &str = "info";

fn subscriber(default_level: &str) -> impl Subscriber + Send + Sync + 'static {
    let filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default_level));

    tracing_subscriber::registry().with(filter).with(
        fmt::layer()
            .with_writer(std::io::stderr)
            .with_target(true)
            .with_thread_ids(false)
            .with_file(false)
            .with_line_number(false),
    )
}

/// Install the global subscriber, filtered by `RUST_LOG` or [`DEFAULT_LEVEL`].
///
/// # Panics
///
/// Panics if a global subscriber has already been set.
pub fn init_logging() {
    subscriber(DEFAULT_LEVEL).init();
}

/// Like [`init_logging`], with another default level.
///
/// ```ignore
/// aiven_provider::init_logging_with_default("debug");
/// ```
pub fn init_logging_with_default(default_level: &str) {
    subscriber(default_level).init();
}

/// Install the global subscriber unless one is already set.
///
/// Returns whether this call installed it.
pub fn try_init_logging() -> bool {
    subscriber(DEFAULT_LEVEL).try_init().is_ok()
}
