use configurator_core::config::LoggingSettings;
use configurator_core::{ConfiguratorError, Result};
use tracing_subscriber::EnvFilter;
use tracing_subscriber::fmt;
use tracing_subscriber::layer::SubscriberExt;
use tracing_subscriber::util::SubscriberInitExt;

/// Installs the global subscriber.
///
/// `RUST_LOG` wins over the configured filter when it is set. Fails if the
/// filter does not parse or a global subscriber is already installed.
pub fn init_tracing(settings: &LoggingSettings) -> Result<()> {
    let filter = build_filter(settings, std::env::var("RUST_LOG").ok())?;
    let registry = tracing_subscriber::registry().with(filter);

    let installed = if settings.json {
        registry.with(fmt::layer().json()).try_init()
    } else {
        registry.with(fmt::layer()).try_init()
    };
    installed.map_err(|e| {
        ConfiguratorError::internal(format!("Failed to install tracing subscriber: {}", e))
    })
}

fn build_filter(settings: &LoggingSettings, env: Option<String>) -> Result<EnvFilter> {
    let directive = env
        .filter(|value| !value.trim().is_empty())
        .unwrap_or_else(|| settings.filter.clone());
    EnvFilter::try_new(&directive).map_err(|e| {
        ConfiguratorError::config(format!("Invalid log filter '{}': {}", directive, e))
    })
}
