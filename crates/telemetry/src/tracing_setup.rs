//! Tracing setup for structured logging.

use tracing_subscriber::{
    fmt::{self, format::FmtSpan},
    layer::SubscriberExt,
    util::SubscriberInitExt,
    EnvFilter,
};

/// Output format of the log stream.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LogFormat {
    /// Human-readable single line per event.
    Compact,
    /// One JSON object per event, with file/line and thread ids.
    Json,
}

impl LogFormat {
    /// Parse `LOG_FORMAT`/`LOG_JSON`-style values.
    pub fn parse(value: &str) -> Self {
        match value.to_lowercase().as_str() {
            "json" | "1" | "true" => Self::Json,
            _ => Self::Compact,
        }
    }
}

/// Tracing configuration.
#[derive(Debug, Clone)]
pub struct TracingConfig {
    /// Filter directive, e.g. "info" or "client=debug,worker=info".
    pub filter: String,
    pub format: LogFormat,
    /// Emit span open/close events (useful around request spans).
    pub span_events: bool,
}

impl Default for TracingConfig {
    fn default() -> Self {
        Self {
            filter: "info".to_string(),
            format: LogFormat::Compact,
            span_events: false,
        }
    }
}

impl TracingConfig {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_filter(mut self, filter: impl Into<String>) -> Self {
        self.filter = filter.into();
        self
    }

    pub fn with_format(mut self, format: LogFormat) -> Self {
        self.format = format;
        self
    }

    pub fn with_span_events(mut self, span_events: bool) -> Self {
        self.span_events = span_events;
        self
    }

    fn env_filter(&self) -> EnvFilter {
        EnvFilter::try_from_default_env()
            .or_else(|_| EnvFilter::try_new(&self.filter))
            .unwrap_or_else(|_| EnvFilter::new("info"))
    }
}

/// Install the global subscriber.
///
/// Returns `false` when a subscriber was already installed (tests, embedding
/// applications), which is not an error.
pub fn init_tracing(config: TracingConfig) -> bool {
    let span_events = if config.span_events {
        FmtSpan::NEW | FmtSpan::CLOSE
    } else {
        FmtSpan::NONE
    };

    let installed = match config.format {
        LogFormat::Json => tracing_subscriber::registry()
            .with(config.env_filter())
            .with(
                fmt::layer()
                    .json()
                    .with_span_events(span_events)
                    .with_target(true)
                    .with_thread_ids(true)
                    .with_file(true)
                    .with_line_number(true),
            )
            .try_init()
            .is_ok(),
        LogFormat::Compact => tracing_subscriber::registry()
            .with(config.env_filter())
            .with(
                fmt::layer()
                    .compact()
                    .with_span_events(span_events)
                    .with_target(true),
            )
            .try_init()
            .is_ok(),
    };

    if installed {
        tracing::info!(filter = %config.filter, format = ?config.format, "Tracing initialized");
    }
    installed
}

/// Initialize tracing from `RUST_LOG` and `LOG_FORMAT` (or legacy `LOG_JSON`).
pub fn init_tracing_from_env() -> bool {
    let format = std::env::var("LOG_FORMAT")
        .or_else(|_| std::env::var("LOG_JSON"))
        .map(|v| LogFormat::parse(&v))
        .unwrap_or(LogFormat::Compact);

    let filter = std::env::var("RUST_LOG").unwrap_or_else(|_| "info".to_string());

    init_tracing(TracingConfig::new().with_filter(filter).with_format(format))
}
