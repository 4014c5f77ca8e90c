//! Structured logging configuration.
//!
//! Logs go through `tracing-subscriber`, either as JSON objects (one per
//! line) or as pretty text for development:
//!
//! ```json
//! {"timestamp":"2024-01-15T10:30:00.000Z","level":"WARN","target":"rebac_domain::resolver::graph_resolver","fields":{"message":"resolution did not complete"}}
//! ```
//!
//! `RUST_LOG`, when set, wins over the configured level.

use serde::{Deserialize, Serialize};
use tracing_subscriber::{
    fmt::{self, format::FmtSpan},
    prelude::*,
    EnvFilter,
};

/// Configuration for structured logging.
#[derive(Debug, Clone, Deserialize, Serialize, PartialEq)]
pub struct LoggingConfig {
    /// Log level: "trace", "debug", "info", "warn", "error"
    #[serde(default = "default_log_level")]
    pub level: String,

    /// Use JSON format (true for production, false for development)
    #[serde(default)]
    pub json: bool,

    /// Emit span enter/exit events
    #[serde(default)]
    pub include_spans: bool,
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: default_log_level(),
            json: false,
            include_spans: false,
        }
    }
}

fn default_log_level() -> String {
    "info".to_string()
}

impl LoggingConfig {
    /// JSON output at the default level.
    pub fn json() -> Self {
        Self {
            json: true,
            ..Default::default()
        }
    }

    pub fn with_level(mut self, level: impl Into<String>) -> Self {
        self.level = level.into();
        self
    }

    fn filter(&self) -> EnvFilter {
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(&self.level))
    }
}

/// Initialize the logging subsystem with the given configuration.
///
/// Only the first call installs a subscriber; later calls have no effect.
pub fn init_logging(config: &LoggingConfig, service_name: &str) {
    let span_events = if config.include_spans {
        FmtSpan::ENTER | FmtSpan::EXIT
    } else {
        FmtSpan::NONE
    };

    let installed = if config.json {
        let subscriber = tracing_subscriber::registry().with(config.filter()).with(
            fmt::layer()
                .json()
                .with_writer(std::io::stderr)
                .with_span_events(span_events)
                .with_current_span(true)
                .with_target(true)
                .with_file(false)
                .with_line_number(false),
        );
        tracing::subscriber::set_global_default(subscriber).is_ok()
    } else {
        let subscriber = tracing_subscriber::registry().with(config.filter()).with(
            fmt::layer()
                .pretty()
                .with_writer(std::io::stderr)
                .with_span_events(span_events)
                .with_target(true),
        );
        tracing::subscriber::set_global_default(subscriber).is_ok()
    };

    if installed {
        tracing::debug!(service = service_name, json = config.json, "logging initialized");
    }
}

/// A JSON subscriber writing to `writer`, for capturing log output in tests.
pub fn create_json_layer<W>(writer: W) -> impl tracing::Subscriber + Send + Sync
where
    W: for<'writer> tracing_subscriber::fmt::MakeWriter<'writer> + Send + Sync + 'static,
{
    tracing_subscriber::registry()
        .with(EnvFilter::new("trace"))
        .with(
            fmt::layer()
                .json()
                .with_writer(writer)
                .with_target(true)
                .with_current_span(true),
        )
}
