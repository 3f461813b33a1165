//! Tracing setup for the bundle tools.
//!
//! `RUST_LOG` overrides the default filter. Span close events (with their
//! timings) are only printed when the filter enables debug output.

pub use tracing::{debug, error, info, warn, trace, instrument};
use tracing_subscriber::prelude::*;
use tracing_subscriber::{EnvFilter, fmt::{self, format::FmtSpan}};

/// Installs the global subscriber with an `info` default filter.
pub fn init() {
    init_with_default("info");
}

/// Installs the global subscriber, falling back to `default_filter` when
/// `RUST_LOG` is unset or invalid. A second call is a no-op.
pub fn init_with_default(default_filter: &str) {
    let env_filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new(default_filter));

    let is_debug = env_filter.to_string().contains("debug")
        || env_filter.to_string().contains("trace");

    let fmt_layer = fmt::layer()
        .with_target(false)
        .with_timer(fmt::time::uptime())
        .with_span_events(if is_debug {
            FmtSpan::CLOSE
        } else {
            FmtSpan::NONE
        });

    let _ = tracing_subscriber::registry()
        .with(env_filter)
        .with(fmt_layer)
        .try_init();
}
