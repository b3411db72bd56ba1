use tracing::debug;
use tracing_subscriber::{prelude::*, EnvFilter};

/// Install the stderr log subscriber. `RUST_LOG` overrides the default `info` level.
///
/// Logs go to stderr so JSON printed on stdout stays machine readable.
/// Calling this more than once is harmless (tests do).
pub fn init_tracing() {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));

    let result = tracing_subscriber::registry()
        .with(
            tracing_subscriber::fmt::layer()
                .with_writer(std::io::stderr)
                .with_target(false),
        )
        .with(filter)
        .try_init();

    if result.is_err() {
        debug!("Tracing already initialized, skipping re-initialization");
    }
}
