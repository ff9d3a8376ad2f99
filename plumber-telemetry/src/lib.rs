//! Logging setup for hosts embedding the Plumber runtime.
//!
//! [`init`] installs a `tracing-subscriber` fmt subscriber writing to stderr,
//! filtered by the `PLUMBER_LOG` environment variable (falling back to the
//! configured directive). Stdout is left to prompts.

#![warn(missing_docs, clippy::pedantic)]

use plumber_primitives::SessionId;
use serde::{Deserialize, Serialize};
use thiserror::Error;
use tracing::{Span, info_span};
use tracing_subscriber::EnvFilter;
use tracing_subscriber::layer::SubscriberExt;
use tracing_subscriber::util::SubscriberInitExt;

/// Environment variable holding the filter directives.
pub const LOG_ENV_VAR: &str = "PLUMBER_LOG";

/// Result alias for telemetry setup.
pub type TelemetryResult<T> = Result<T, TelemetryError>;

/// Errors raised while installing the subscriber.
#[derive(Debug, Error)]
pub enum TelemetryError {
    /// A filter directive could not be parsed.
    #[error("invalid log filter `{directive}`: {reason}")]
    InvalidFilter {
        /// Offending directive.
        directive: String,
        /// Parser message.
        reason: String,
    },

    /// A global subscriber is already installed.
    #[error("failed to install log subscriber: {reason}")]
    Init {
        /// Underlying error message.
        reason: String,
    },
}

/// Line format of emitted events.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum LogFormat {
    /// Default multi-field format.
    #[default]
    Full,
    /// Compact single-line format.
    Compact,
}

/// Telemetry configuration.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct TelemetryConfig {
    default_directive: String,
    format: LogFormat,
    ansi: bool,
}

impl Default for TelemetryConfig {
    fn default() -> Self {
        Self::new("info")
    }
}

impl TelemetryConfig {
    /// Creates a configuration with the directive used when `PLUMBER_LOG` is
    /// unset.
    #[must_use]
    pub fn new(default_directive: impl Into<String>) -> Self {
        Self {
            default_directive: default_directive.into(),
            format: LogFormat::default(),
            ansi: true,
        }
    }

    /// Sets the line format.
    #[must_use]
    pub fn with_format(mut self, format: LogFormat) -> Self {
        self.format = format;
        self
    }

    /// Disables ANSI colours.
    #[must_use]
    pub fn without_ansi(mut self) -> Self {
        self.ansi = false;
        self
    }

    /// Fallback filter directive.
    #[must_use]
    pub fn default_directive(&self) -> &str {
        &self.default_directive
    }

    /// Line format.
    #[must_use]
    pub const fn format(&self) -> LogFormat {
        self.format
    }

    /// Validates the fallback directive.
    ///
    /// # Errors
    ///
    /// Returns [`TelemetryError::InvalidFilter`] when it cannot be parsed.
    pub fn validate(&self) -> TelemetryResult<()> {
        self.filter(None).map(|_| ())
    }

    fn filter(&self, from_env: Option<String>) -> TelemetryResult<EnvFilter> {
        let directive = from_env
            .filter(|value| !value.trim().is_empty())
            .unwrap_or_else(|| self.default_directive.clone());
        EnvFilter::try_new(&directive).map_err(|err| TelemetryError::InvalidFilter {
            directive,
            reason: err.to_string(),
        })
    }
}

/// Installs the global subscriber.
///
/// # Errors
///
/// Returns [`TelemetryError::InvalidFilter`] for bad directives and
/// [`TelemetryError::Init`] when a subscriber is already installed.
pub fn init(config: &TelemetryConfig) -> TelemetryResult<()> {
    let filter = config.filter(std::env::var(LOG_ENV_VAR).ok())?;
    let layer = tracing_subscriber::fmt::layer()
        .with_writer(std::io::stderr)
        .with_ansi(config.ansi);

    let registry = tracing_subscriber::registry().with(filter);
    match config.format {
        LogFormat::Full => registry.with(layer).try_init(),
        LogFormat::Compact => registry.with(layer.compact()).try_init(),
    }
    .map_err(|err| TelemetryError::Init {
        reason: err.to_string(),
    })
}

/// Span carrying the `environment` and `session_id` fields.
#[must_use]
pub fn session_span(environment: &str, session_id: SessionId) -> Span {
    info_span!("session", environment, session_id = %session_id)
}
