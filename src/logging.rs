use tracing_subscriber::EnvFilter;

const DEFAULT_LOG_FILTER: &str = "combat_recorder=info";

/// Installs the fmt subscriber. `RUST_LOG` overrides the default filter; a second call is
/// a no-op.
pub fn init_tracing() {
    let filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(DEFAULT_LOG_FILTER));

    if tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(true)
        .try_init()
        .is_err()
    {
        tracing::debug!("Tracing subscriber already installed");
    }
}
