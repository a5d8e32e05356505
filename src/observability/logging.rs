//! Structured logging.
//!
//! # Responsibilities
//! - Initialize the global `tracing` subscriber once at startup
//! - Pick the output format from the deployment mode
//!
//! # Design Decisions
//! - JSON format for production, pretty format for development
//! - `RUST_LOG` wins over the configured filter, which wins over the mode default

use tracing_subscriber::{
    fmt, layer::SubscriberExt, util::SubscriberInitExt, util::TryInitError, EnvFilter,
};

use crate::config::Settings;

const DEVELOPMENT_FILTER: &str = "property_api=debug,tower_http=debug";
const PRODUCTION_FILTER: &str = "property_api=info,tower_http=info";

/// Filter directive used when `RUST_LOG` is absent.
pub fn default_directive(settings: &Settings) -> &str {
    let configured = settings.observability.log_filter.trim();
    if !configured.is_empty() {
        configured
    } else if settings.is_production() {
        PRODUCTION_FILTER
    } else {
        DEVELOPMENT_FILTER
    }
}

/// Install the global subscriber. Fails if one is already set.
pub fn init_logging(settings: &Settings) -> Result<(), TryInitError> {
    let filter = EnvFilter::try_from_default_env()
        .or_else(|_| EnvFilter::try_new(default_directive(settings)))
        .unwrap_or_else(|_| EnvFilter::new("info"));

    let registry = tracing_subscriber::registry().with(filter);
    if settings.is_production() {
        registry
            .with(fmt::layer().json().with_target(false))
            .try_init()
    } else {
        registry.with(fmt::layer()).try_init()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::{ApiConfig, Mode};

    #[test]
    fn test_default_directive_per_mode() {
        let mut config = ApiConfig::default();
        assert_eq!(default_directive(&Settings::from_config(&config)), DEVELOPMENT_FILTER);

        config.server.mode = Mode::Production;
        assert_eq!(default_directive(&Settings::from_config(&config)), PRODUCTION_FILTER);

        config.observability.log_filter = "warn".into();
        assert_eq!(default_directive(&Settings::from_config(&config)), "warn");
    }
}
