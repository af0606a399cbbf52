use tracing_subscriber::EnvFilter;
use tracing_subscriber::layer::SubscriberExt;
use tracing_subscriber::util::SubscriberInitExt;

use crate::config::LogSettings;

#[derive(Debug, thiserror::Error)]
pub enum LogError {
    #[error("invalid log filter '{directive}': {source}")]
    Filter {
        directive: String,
        source:    tracing_subscriber::filter::ParseError,
    },

    #[error("a global subscriber is already installed")]
    AlreadyInstalled,
}

/// `RUST_LOG` if set, the configured level otherwise.
pub fn filter(settings: &LogSettings) -> Result<EnvFilter, LogError> {
    if let Ok(filter) = EnvFilter::try_from_default_env() {
        return Ok(filter);
    }
    EnvFilter::try_new(&settings.level).map_err(|source| LogError::Filter {
        directive: settings.level.clone(),
        source,
    })
}

/// Install the global subscriber. Fails if called twice.
pub fn init(settings: &LogSettings) -> Result<(), LogError> {
    let registry = tracing_subscriber::registry().with(filter(settings)?);
    let installed = if settings.json {
        registry
            .with(tracing_subscriber::fmt::layer().json())
            .try_init()
    } else {
        registry.with(tracing_subscriber::fmt::layer()).try_init()
    };
    installed.map_err(|_| LogError::AlreadyInstalled)
}
