//! Tracing subscriber setup.

use tracing_subscriber::EnvFilter;

use crate::config;

/// Install the fmt subscriber. `RUST_LOG` wins, then `filter`, then the
/// crate default. Returns false if a global subscriber was already set.
pub fn init(filter: Option<&str>) -> bool {
    let env_filter = EnvFilter::try_from_default_env()
        .or_else(|_| EnvFilter::try_new(filter.unwrap_or(config::default_log_filter())))
        .unwrap_or_else(|_| EnvFilter::new(config::default_log_filter()));

    let installed = tracing_subscriber::fmt()
        .with_env_filter(env_filter)
        .with_target(true)
        .try_init()
        .is_ok();

    if installed {
        tracing::info!("{} core starting v{}", config::APP_NAME, config::APP_VERSION);
    }
    installed
}
