use tracing_subscriber::{EnvFilter, fmt};

/// Environment variable controlling the log filter, e.g.
/// `NEKO_DASH_LOG=debug`.
pub const LOG_ENV_VAR: &str = "NEKO_DASH_LOG";

const DEFAULT_DIRECTIVE: &str = "info";

/// Installs the global tracing subscriber. Call once, before the UI starts.
pub fn init() {
    let filter = EnvFilter::try_from_env(LOG_ENV_VAR)
        .unwrap_or_else(|_| EnvFilter::new(DEFAULT_DIRECTIVE));

    fmt()
        .with_env_filter(filter)
        .with_target(true)
        .with_writer(std::io::stderr)
        .init();
}
