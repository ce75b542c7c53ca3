//! Logging utilities with Vantage segment prefixes.
//!
//! Provides consistent logging setup across Vantage binaries.

use tracing_subscriber::{fmt, prelude::*, EnvFilter};

/// Initialize tracing with Vantage defaults.
///
/// Sets up tracing-subscriber with:
/// - Environment filter (RUST_LOG)
/// - Compact format suitable for terminal output
pub fn init() {
    init_with_filter("info");
}

/// Initialize tracing with a custom default filter.
///
/// `RUST_LOG` still wins when set.
pub fn init_with_filter(default_filter: &str) {
    let filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default_filter));

    // a subscriber may already be installed by tests or an embedding process
    let _ = tracing_subscriber::registry()
        .with(filter)
        .with(fmt::layer().compact().with_target(false))
        .try_init();
}

/// Vantage segment prefixes for logging.
pub mod prefix {
    /// Startup prefix
    pub const OPEN: &str = "▶";
    /// Shutdown prefix
    pub const CLOSE: &str = "■";
    /// Target acquired prefix
    pub const TARGET: &str = "⌖";
    /// Capture segment prefix
    pub const CAPTURE: &str = "◫";
}
