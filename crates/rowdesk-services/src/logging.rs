//! Logging setup for rowdesk
//!
//! Console output through `tracing-subscriber`, filtered by `RUST_LOG` when it
//! is set and by [`LoggingConfig::default_filter`] otherwise.

use rowdesk_settings::LoggingSettings;
use tracing_subscriber::{
    EnvFilter,
    fmt::{self, format::FmtSpan},
    layer::SubscriberExt,
    util::SubscriberInitExt,
};

/// Logging configuration
#[derive(Debug, Clone)]
pub struct LoggingConfig {
    /// Whether to include file/line information in logs
    pub include_location: bool,

    /// Whether to log span open/close (commit and fetch timings)
    pub enable_spans: bool,

    /// Filter used when `RUST_LOG` is unset
    pub default_filter: String,
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            include_location: cfg!(debug_assertions),
            enable_spans: cfg!(debug_assertions),
            default_filter: "info,rowdesk_core=debug,rowdesk_services=debug,rowdesk_settings=debug"
                .to_string(),
        }
    }
}

impl LoggingConfig {
    pub fn production() -> Self {
        Self {
            include_location: false,
            enable_spans: false,
            default_filter: "warn,rowdesk_services=info,rowdesk_settings=info".to_string(),
        }
    }

    pub fn development() -> Self {
        Self::default()
    }

    /// Build-profile defaults with the filter from saved settings, if any
    pub fn from_settings(settings: &LoggingSettings) -> Self {
        let mut config = if cfg!(debug_assertions) {
            Self::development()
        } else {
            Self::production()
        };
        if let Some(filter) = &settings.filter {
            config.default_filter = filter.clone();
        }
        config
    }
}

/// Install the global subscriber.
///
/// Fails if a global subscriber is already installed.
pub fn init(config: LoggingConfig) -> anyhow::Result<()> {
    let env_filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new(&config.default_filter));

    // NEW/CLOSE rather than ENTER, which fires on every re-poll of an awaited future
    let span_events = if config.enable_spans {
        FmtSpan::NEW | FmtSpan::CLOSE
    } else {
        FmtSpan::NONE
    };

    let console_layer = fmt::layer()
        .with_target(true)
        .with_file(config.include_location)
        .with_line_number(config.include_location)
        .with_span_events(span_events);

    tracing_subscriber::registry()
        .with(env_filter)
        .with(console_layer)
        .try_init()?;

    tracing::debug!(filter = %config.default_filter, "logging initialized");
    Ok(())
}
