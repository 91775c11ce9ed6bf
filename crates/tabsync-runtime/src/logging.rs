//! JSON log output for hosts that want cell diagnostics on stdout.
//!
//! Cells log through `tracing` regardless of this module. Installing a
//! subscriber here is optional; any other subscriber works as well.

use std::fmt;

use tracing_subscriber::layer::SubscriberExt;
use tracing_subscriber::util::SubscriberInitExt;
use tracing_subscriber::{EnvFilter, Layer};

/// Filter used when neither `RUST_LOG` nor an explicit filter is given.
pub const DEFAULT_FILTER: &str = "tabsync_runtime=info,tabsync_storage=warn";

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum LoggingError {
    /// The filter directive did not parse.
    Filter(String),
    /// A global subscriber is already installed.
    AlreadyInstalled(String),
}

impl fmt::Display for LoggingError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Filter(msg) => write!(f, "invalid log filter: {msg}"),
            Self::AlreadyInstalled(msg) => write!(f, "log subscriber already installed: {msg}"),
        }
    }
}

impl std::error::Error for LoggingError {}

/// Install a global JSON subscriber filtered by `filter`.
pub fn install_json_subscriber(filter: &str) -> Result<(), LoggingError> {
    let filter = EnvFilter::try_new(filter).map_err(|e| LoggingError::Filter(e.to_string()))?;
    install(filter)
}

/// Like [`install_json_subscriber`], taking the filter from `RUST_LOG` and
/// falling back to [`DEFAULT_FILTER`].
pub fn install_json_subscriber_from_env() -> Result<(), LoggingError> {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(DEFAULT_FILTER));
    install(filter)
}

fn install(filter: EnvFilter) -> Result<(), LoggingError> {
    let layer = tracing_subscriber::fmt::layer()
        .json()
        .with_target(true)
        .with_filter(filter);
    tracing_subscriber::registry()
        .with(layer)
        .try_init()
        .map_err(|e| LoggingError::AlreadyInstalled(e.to_string()))
}
