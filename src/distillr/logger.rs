//! Tracing subscriber setup for binaries
//!
//! The library only emits `tracing` events. Installing a subscriber is left to
//! the program embedding it; the `datadistillr` CLI calls [`init_logging`].

use tracing_subscriber::EnvFilter;

/// Filter used when `RUST_LOG` is not set
fn default_directive(verbosity: u8) -> &'static str {
    match verbosity {
        0 => "warn",
        1 => "datadistillr=info",
        2 => "datadistillr=debug",
        _ => "datadistillr=trace,reqwest=debug",
    }
}

/// Install a stderr fmt subscriber
///
/// `RUST_LOG` takes precedence over `verbosity`. Calling this twice is a no-op.
pub fn init_logging(verbosity: u8) {
    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new(default_directive(verbosity)));

    let _ = tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .with_target(false)
        .try_init();
}
