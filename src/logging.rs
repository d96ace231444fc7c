//! Diagnostic logging to stderr, filtered by `-v` or `CCROTATE_LOG`.

use tracing_subscriber::EnvFilter;
use tracing_subscriber::layer::SubscriberExt;
use tracing_subscriber::util::SubscriberInitExt;

/// Overrides the `-v` level when set, e.g. `CCROTATE_LOG=ccrotate=trace`
pub const LOG_ENV: &str = "CCROTATE_LOG";

/// Default directive for a `-v` count
pub fn default_directive(verbosity: u8) -> &'static str {
    match verbosity {
        0 => "ccrotate=warn",
        1 => "ccrotate=info",
        _ => "ccrotate=debug",
    }
}

/// Install the global subscriber. Logs go to stderr so stdout stays clean
/// for `export` output.
pub fn init(verbosity: u8, ansi: bool) {
    let filter = EnvFilter::try_from_env(LOG_ENV)
        .unwrap_or_else(|_| EnvFilter::new(default_directive(verbosity)));

    // a second init (tests) is harmless
    let _ = tracing_subscriber::registry()
        .with(filter)
        .with(
            tracing_subscriber::fmt::layer()
                .with_writer(std::io::stderr)
                .with_ansi(ansi)
                .with_target(false),
        )
        .try_init();
}
